use core::fmt;

use pki_types::CertificateDer;
use zeroize::Zeroize;

use crate::msgs::enums::ProtocolVersion;
use crate::suites::Tls13CipherSuite;

/// Authentication and resumption material exchanged by the handshake and
/// the post-handshake ticket flow.
///
/// A session is minted fresh for a full handshake, or duplicated from the
/// offered session (authentication fields only) on resumption.  Tickets
/// received after the handshake duplicate the established session and add
/// the ticket-only fields.
#[derive(Clone)]
pub struct TlsSession {
    /// The negotiated cipher suite, fixing the PRF hash identity.
    pub suite: Option<&'static Tls13CipherSuite>,

    /// The protocol version the session was established under.
    pub version: ProtocolVersion,

    /// The resumption secret; `hash_len` bytes once established.
    pub master_secret: Vec<u8>,

    /// The peer's certificate chain, end entity first.
    pub peer_certificates: Vec<CertificateDer<'static>>,

    /// The application protocol negotiated via ALPN, if any.
    pub alpn_protocol: Option<Vec<u8>>,

    /// Resumption ticket issued by the server; empty until a
    /// NewSessionTicket has been ingested.
    pub ticket: Vec<u8>,

    /// Obfuscation offset for the ticket age.
    pub ticket_age_add: u32,

    /// Whether `ticket_age_add` was received from the server.
    pub ticket_age_add_valid: bool,

    /// Largest amount of 0-RTT data the server will accept under this
    /// session's ticket.
    pub max_early_data_size: u32,

    /// Creation time, seconds since the unix epoch.
    pub time: u64,

    /// Lifetime in seconds from `time`.
    pub timeout: u32,

    /// Set until a ticket makes the session offerable again.
    pub not_resumable: bool,

    /// The application-assigned context this session is scoped to.
    pub session_id_context: Vec<u8>,
}

impl TlsSession {
    /// A fresh session with nothing negotiated yet.
    pub fn new(version: ProtocolVersion, session_id_context: Vec<u8>, now: u64) -> Self {
        Self {
            suite: None,
            version,
            master_secret: Vec::new(),
            peer_certificates: Vec::new(),
            alpn_protocol: None,
            ticket: Vec::new(),
            ticket_age_add: 0,
            ticket_age_add_valid: false,
            max_early_data_size: 0,
            time: now,
            timeout: 0,
            not_resumable: true,
            session_id_context,
        }
    }

    /// Duplicate carrying only the authentication fields.
    ///
    /// In TLS 1.3 only authentication information carries over into the
    /// session resumed from an offered one; key material is always fresh.
    pub fn dup_auth_only(&self) -> Self {
        Self {
            suite: None,
            version: self.version,
            master_secret: Vec::new(),
            peer_certificates: self.peer_certificates.clone(),
            alpn_protocol: None,
            ticket: Vec::new(),
            ticket_age_add: 0,
            ticket_age_add_valid: false,
            max_early_data_size: 0,
            time: self.time,
            timeout: self.timeout,
            not_resumable: true,
            session_id_context: self.session_id_context.clone(),
        }
    }

    /// Resumption incorporates fresh key material, so refresh the timeout.
    pub fn renew_timeout(&mut self, timeout: u32) {
        self.timeout = timeout;
    }

    /// Move the session's time base to `now`, preserving the absolute
    /// expiry instant.
    pub fn rebase_time(&mut self, now: u64) {
        if self.time > now || self.time + u64::from(self.timeout) < now {
            self.timeout = 0;
        } else {
            self.timeout = (self.time + u64::from(self.timeout) - now) as u32;
        }
        self.time = now;
    }

    /// Whether this session may be offered under the configured context.
    pub fn is_context_valid(&self, session_id_context: &[u8]) -> bool {
        self.session_id_context == session_id_context
    }
}

impl Drop for TlsSession {
    fn drop(&mut self) {
        self.master_secret.zeroize();
    }
}

impl fmt::Debug for TlsSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // secrets deliberately omitted
        f.debug_struct("TlsSession")
            .field("suite", &self.suite)
            .field("version", &self.version)
            .field("alpn_protocol", &self.alpn_protocol)
            .field("ticket_age_add_valid", &self.ticket_age_add_valid)
            .field("max_early_data_size", &self.max_early_data_size)
            .field("not_resumable", &self.not_resumable)
            .finish_non_exhaustive()
    }
}
