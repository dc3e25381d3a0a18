//! The client-side TLS 1.3 handshake: configuration, the state machine
//! driver, and the capability traits it calls back into.

use std::sync::Arc;

use crate::crypto::ActiveKeyExchange;
use crate::error::Error;
use crate::msgs::enums::{CipherSuite, NamedGroup, ProtocolVersion};
use crate::session::TlsSession;
use crate::suites::Tls13CipherSuite;

mod hs;
mod tls13;

pub use hs::{ClientContext, ClientHandshake, ClientState, OfferedHello, Status};
pub use tls13::process_new_session_ticket;

/// Default lifetime for sessions resumed with a PSK-DHE exchange:
/// two days, in seconds.
pub const DEFAULT_PSK_DHE_TIMEOUT: u32 = 2 * 24 * 60 * 60;

/// Common configuration for client connections.
///
/// The config is immutable once connections are driven from it, and is
/// shared by `Arc`.
pub struct ClientConfig {
    /// The cipher suites this client offered, in preference order.
    pub suites: Vec<&'static Tls13CipherSuite>,

    /// The key exchange groups this client supports.
    pub supported_groups: Vec<NamedGroup>,

    /// The negotiated TLS 1.3 code point.  Version selection happens
    /// before the state machine is entered; for pre-standard deployments
    /// this may be a draft code point.
    pub version: ProtocolVersion,

    /// Run the middlebox-compatibility variant: a TLS 1.2 record-layer
    /// version, a legacy session ID echo in ServerHello, and
    /// ChangeCipherSpec records interleaved at fixed points.
    pub middlebox_compat: bool,

    /// Lifetime assigned to sessions refreshed by a PSK-DHE resumption,
    /// in seconds.
    pub psk_dhe_timeout: u32,

    /// Whether tickets permitting 0-RTT should record their early-data
    /// allowance.
    pub enable_early_data: bool,

    /// The application-assigned context sessions are scoped to.
    pub session_id_context: Vec<u8>,

    /// Extension types the embedder registered custom handling for;
    /// these are tolerated in EncryptedExtensions.
    pub custom_extensions: Vec<u16>,

    /// Receives sessions minted by post-handshake tickets.
    pub session_store: Option<Arc<dyn SessionStore>>,

    /// Supplies the Channel ID assertion, if the connection offered one.
    pub channel_id: Option<Arc<dyn ChannelIdProvider>>,

    /// Observes state transitions, for diagnostics.
    pub state_listener: Option<Arc<dyn StateListener>>,
}

impl ClientConfig {
    /// A config with the given suites and groups and conservative
    /// defaults everywhere else.
    pub fn new(suites: Vec<&'static Tls13CipherSuite>, supported_groups: Vec<NamedGroup>) -> Self {
        Self {
            suites,
            supported_groups,
            version: ProtocolVersion::TLSv1_3,
            middlebox_compat: false,
            psk_dhe_timeout: DEFAULT_PSK_DHE_TIMEOUT,
            enable_early_data: false,
            session_id_context: Vec::new(),
            custom_extensions: Vec::new(),
            session_store: None,
            channel_id: None,
            state_listener: None,
        }
    }

    pub(crate) fn find_suite(&self, suite: CipherSuite) -> Option<&'static Tls13CipherSuite> {
        self.suites
            .iter()
            .copied()
            .find(|candidate| candidate.suite == suite)
    }

    /// What the `legacy_version` field of the ServerHello must carry.
    pub(crate) fn expected_legacy_version(&self) -> ProtocolVersion {
        match self.middlebox_compat {
            true => ProtocolVersion::TLSv1_2,
            false => self.version,
        }
    }
}

/// Receives sessions minted from post-handshake tickets.
///
/// Returning `true` means the store kept the session; `false` means it
/// was discarded.
pub trait SessionStore: Send + Sync {
    fn store_session(&self, session: TlsSession) -> bool;
}

/// Supplies the Channel ID assertion for the final client flight.
pub trait ChannelIdProvider: Send + Sync {
    /// Produce the Channel ID message body over the given transcript
    /// hash.
    ///
    /// Returns `Ok(None)` while the key is still being fetched, in which
    /// case the handshake suspends with [`Status::ChannelIdLookup`].
    fn assert_identity(&self, transcript_hash: &[u8]) -> Result<Option<Vec<u8>>, Error>;
}

/// Observes handshake state transitions, for diagnostics.  Called
/// exactly once per transition.
pub trait StateListener: Send + Sync {
    fn on_state_change(&self, state: ClientState);
}

/// Re-emission of the ClientHello after a HelloRetryRequest.
///
/// ClientHello construction lives outside this crate; the state machine
/// only dictates the retry parameters.
pub trait HelloRebuilder {
    /// Build the second ClientHello.
    ///
    /// `retry_group` is the group the server selected, or `None` if the
    /// HelloRetryRequest carried no key share (the original share is then
    /// reused).  `cookie` is echoed verbatim when present.
    fn second_client_hello(
        &mut self,
        retry_group: Option<NamedGroup>,
        cookie: Option<&[u8]>,
    ) -> Result<SecondClientHello, Error>;
}

/// The rebuilt ClientHello, ready for emission.
pub struct SecondClientHello {
    /// The full handshake encoding of the new ClientHello.
    pub encoding: Vec<u8>,
    /// The fresh key share, if the retry selected a new group.
    pub key_share: Option<Box<dyn ActiveKeyExchange>>,
}
