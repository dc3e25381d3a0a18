use std::sync::Arc;

use zeroize::Zeroize;

use crate::client::{ClientConfig, HelloRebuilder};
use crate::crypto::ActiveKeyExchange;
use crate::error::Error;
use crate::hash_hs::{HandshakeHashBuffer, Transcript};
use crate::key_schedule::KeySchedule;
use crate::log::trace;
use crate::msgs::enums::{AlertDescription, AlertLevel, HandshakeType, NamedGroup};
use crate::record_layer::{InboundMessage, RecordLayer};
use crate::session::TlsSession;
use crate::sign::{CertificateRequestDetails, ClientCredentials};
use crate::suites::Tls13CipherSuite;
use crate::verify::PeerVerifier;

/// The states of the client handshake.
///
/// The initial state is `ReadHelloRetryRequest`; `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    ReadHelloRetryRequest,
    SendSecondClientHello,
    ReadServerHello,
    ProcessChangeCipherSpec,
    ReadEncryptedExtensions,
    ReadCertificateRequest,
    ReadServerCertificate,
    ReadServerCertificateVerify,
    ReadServerFinished,
    SendEndOfEarlyData,
    SendClientCertificate,
    SendClientCertificateVerify,
    CompleteSecondFlight,
    Done,
}

impl ClientState {
    /// Human-readable state name, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadHelloRetryRequest => "TLS 1.3 client read_hello_retry_request",
            Self::SendSecondClientHello => "TLS 1.3 client send_second_client_hello",
            Self::ReadServerHello => "TLS 1.3 client read_server_hello",
            Self::ProcessChangeCipherSpec => "TLS 1.3 client process_change_cipher_spec",
            Self::ReadEncryptedExtensions => "TLS 1.3 client read_encrypted_extensions",
            Self::ReadCertificateRequest => "TLS 1.3 client read_certificate_request",
            Self::ReadServerCertificate => "TLS 1.3 client read_server_certificate",
            Self::ReadServerCertificateVerify => "TLS 1.3 client read_server_certificate_verify",
            Self::ReadServerFinished => "TLS 1.3 client read_server_finished",
            Self::SendEndOfEarlyData => "TLS 1.3 client send_end_of_early_data",
            Self::SendClientCertificate => "TLS 1.3 client send_client_certificate",
            Self::SendClientCertificateVerify => "TLS 1.3 client send_client_certificate_verify",
            Self::CompleteSecondFlight => "TLS 1.3 client complete_second_flight",
            Self::Done => "TLS 1.3 client done",
        }
    }
}

/// What the handshake needs from the embedder before it can continue.
///
/// Other than `Complete`, each value names the external condition to
/// satisfy before calling [`ClientHandshake::advance`] again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The handshake is complete.
    Complete,
    /// Another inbound handshake record is needed.
    ReadMessage,
    /// An inbound ChangeCipherSpec record is expected next.
    ReadChangeCipherSpec,
    /// The outbound buffer must be drained.
    Flush,
    /// The signing oracle is computing asynchronously.
    PrivateKeyOperation,
    /// The peer-certificate verifier is still running.
    CertificateVerify,
    /// The certificate-selection callback deferred.
    X509Lookup,
    /// The Channel ID key is still being fetched.
    ChannelIdLookup,
    /// The server rejected our early data; the embedder must drop any
    /// buffered early data and re-drive.  Not an error.
    EarlyDataRejected,
}

/// The capabilities the handshake calls out to while being driven.
pub struct ClientContext<'a> {
    pub records: &'a mut dyn RecordLayer,
    pub verifier: &'a mut dyn PeerVerifier,
    pub credentials: &'a mut dyn ClientCredentials,
    pub rebuilder: &'a mut dyn HelloRebuilder,
}

/// The ClientHello this connection opened with, as built by the external
/// ClientHello constructor.
pub struct OfferedHello {
    /// The full handshake encoding of the ClientHello, for the
    /// transcript.
    pub encoding: Vec<u8>,

    /// The ephemeral key share sent in the hello.
    pub key_share: Box<dyn ActiveKeyExchange>,

    /// The session offered for resumption, if any.
    pub session: Option<TlsSession>,

    /// Whether 0-RTT data is being sent under `early_session`.
    pub early_data: bool,

    /// The parameters early data was encrypted under; present iff early
    /// data was offered.
    pub early_session: Option<TlsSession>,
}

/// The client handshake state machine.
///
/// Exclusively owned by the driving call site; a connection is advanced
/// by calling [`advance`] until it reports [`Status::Complete`],
/// satisfying the returned suspension conditions in between.
///
/// [`advance`]: ClientHandshake::advance
pub struct ClientHandshake {
    pub(super) config: Arc<ClientConfig>,
    pub(super) state: ClientState,
    pub(super) error: Option<Error>,

    pub(super) transcript: Transcript,
    pub(super) key_schedule: Option<KeySchedule>,
    pub(super) suite: Option<&'static Tls13CipherSuite>,

    pub(super) key_share: Option<Box<dyn ActiveKeyExchange>>,
    pub(super) retry_group: Option<NamedGroup>,
    pub(super) cookie: Option<Vec<u8>>,
    pub(super) received_hello_retry_request: bool,

    pub(super) offered_session: Option<TlsSession>,
    pub(super) new_session: Option<TlsSession>,
    pub(super) early_session: Option<TlsSession>,
    pub(super) established_session: Option<TlsSession>,
    pub(super) session_reused: bool,

    pub(super) server_random: [u8; 32],
    pub(super) alpn_selected: Option<Vec<u8>>,
    pub(super) cert_request: Option<CertificateRequestDetails>,
    pub(super) channel_id_valid: bool,
    pub(super) received_custom_extension: bool,

    pub(super) early_data_offered: bool,
    pub(super) in_early_data: bool,
    pub(super) early_data_accepted: bool,
    pub(super) can_early_write: bool,

    pub(super) client_handshake_secret: Vec<u8>,
    pub(super) server_handshake_secret: Vec<u8>,
    pub(super) client_traffic_secret: Vec<u8>,
    pub(super) server_traffic_secret: Vec<u8>,

    pub(super) time_base: u64,
}

impl ClientHandshake {
    /// Start the state machine for a connection that has just sent
    /// `offer`.
    ///
    /// `now` is the wall clock in seconds since the unix epoch, used as
    /// the time base of any session minted by this handshake.
    pub fn new(config: Arc<ClientConfig>, offer: OfferedHello, now: u64) -> Self {
        let mut transcript = HandshakeHashBuffer::new();
        transcript.add_raw(&offer.encoding);

        let early_data = offer.early_data;
        Self {
            config,
            state: ClientState::ReadHelloRetryRequest,
            error: None,
            transcript: Transcript::Buffering(transcript),
            key_schedule: None,
            suite: None,
            key_share: Some(offer.key_share),
            retry_group: None,
            cookie: None,
            received_hello_retry_request: false,
            offered_session: offer.session,
            new_session: None,
            early_session: offer.early_session,
            established_session: None,
            session_reused: false,
            server_random: [0u8; 32],
            alpn_selected: None,
            cert_request: None,
            channel_id_valid: false,
            received_custom_extension: false,
            early_data_offered: early_data,
            in_early_data: early_data,
            early_data_accepted: false,
            can_early_write: early_data,
            client_handshake_secret: Vec::new(),
            server_handshake_secret: Vec::new(),
            client_traffic_secret: Vec::new(),
            server_traffic_secret: Vec::new(),
            time_base: now,
        }
    }

    /// Drive the state machine until it completes or suspends.
    ///
    /// A fatal error is sticky: once returned, every further call
    /// returns the same error without touching the wire.
    pub fn advance(&mut self, cx: &mut ClientContext<'_>) -> Result<Status, Error> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        while self.state != ClientState::Done {
            let state = self.state;
            trace!("handshake state {:?}", state);

            let outcome = match state {
                ClientState::ReadHelloRetryRequest => self.do_read_hello_retry_request(cx),
                ClientState::SendSecondClientHello => self.do_send_second_client_hello(cx),
                ClientState::ReadServerHello => self.do_read_server_hello(cx),
                ClientState::ProcessChangeCipherSpec => self.do_process_change_cipher_spec(cx),
                ClientState::ReadEncryptedExtensions => self.do_read_encrypted_extensions(cx),
                ClientState::ReadCertificateRequest => self.do_read_certificate_request(cx),
                ClientState::ReadServerCertificate => self.do_read_server_certificate(cx),
                ClientState::ReadServerCertificateVerify => {
                    self.do_read_server_certificate_verify(cx)
                }
                ClientState::ReadServerFinished => self.do_read_server_finished(cx),
                ClientState::SendEndOfEarlyData => self.do_send_end_of_early_data(cx),
                ClientState::SendClientCertificate => self.do_send_client_certificate(cx),
                ClientState::SendClientCertificateVerify => {
                    self.do_send_client_certificate_verify(cx)
                }
                ClientState::CompleteSecondFlight => self.do_complete_second_flight(cx),
                ClientState::Done => Ok(None),
            };

            let suspend = match outcome {
                Ok(suspend) => suspend,
                Err(err) => {
                    self.error = Some(err.clone());
                    return Err(err);
                }
            };

            if self.state != state {
                if let Some(listener) = &self.config.state_listener {
                    listener.on_state_change(self.state);
                }
            }

            if let Some(status) = suspend {
                return Ok(status);
            }
        }

        Ok(Status::Complete)
    }

    /// The current state, for diagnostics.
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// Whether the server resumed the offered session.
    pub fn session_reused(&self) -> bool {
        self.session_reused
    }

    /// Whether the server accepted our 0-RTT offer.
    pub fn early_data_accepted(&self) -> bool {
        self.early_data_accepted
    }

    /// Whether more early data may be written right now.
    pub fn can_early_write(&self) -> bool {
        self.can_early_write
    }

    /// Whether a HelloRetryRequest was processed on this connection.
    pub fn received_hello_retry_request(&self) -> bool {
        self.received_hello_retry_request
    }

    /// The server's random value, once a ServerHello has been processed.
    pub fn server_random(&self) -> &[u8; 32] {
        &self.server_random
    }

    /// The session established by a completed handshake.
    pub fn established_session(&self) -> Option<&TlsSession> {
        self.established_session.as_ref()
    }

    /// Take ownership of the established session.
    pub fn take_established_session(&mut self) -> Option<TlsSession> {
        self.established_session.take()
    }
}

impl Drop for ClientHandshake {
    fn drop(&mut self) {
        self.client_handshake_secret.zeroize();
        self.server_handshake_secret.zeroize();
        self.client_traffic_secret.zeroize();
        self.server_traffic_secret.zeroize();
    }
}

/// Send a fatal alert and convert `err` into the error to propagate.
pub(super) fn fatal(
    records: &mut dyn RecordLayer,
    desc: AlertDescription,
    err: impl Into<Error>,
) -> Error {
    records.add_alert(AlertLevel::Fatal, desc);
    err.into()
}

/// Require `msg` to have type `expected`, or fail the handshake.
pub(super) fn require_message(
    records: &mut dyn RecordLayer,
    msg: &InboundMessage,
    expected: HandshakeType,
) -> Result<(), Error> {
    if msg.typ != expected {
        return Err(fatal(
            records,
            AlertDescription::UnexpectedMessage,
            Error::InappropriateHandshakeMessage {
                expect_types: vec![expected],
                got_type: msg.typ,
            },
        ));
    }
    Ok(())
}
