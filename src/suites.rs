use core::fmt;

use crate::crypto::{Hash, Hmac};
use crate::msgs::enums::CipherSuite;

/// A TLS 1.3 cipher suite, carrying its PRF hash identity.
///
/// The AEAD half of the suite is owned by the record layer; the handshake
/// only needs the suite identifier and the hash and HMAC providers that
/// drive the transcript and the key schedule.
pub struct Tls13CipherSuite {
    /// The TLS enumeration naming this cipher suite.
    pub suite: CipherSuite,

    /// Which hash function the suite uses as its PRF hash.
    pub hash_provider: &'static dyn Hash,

    /// HMAC over the same hash, used for HKDF and Finished computation.
    pub hmac_provider: &'static dyn Hmac,
}

impl Tls13CipherSuite {
    /// The length in bytes of the PRF hash output.
    pub fn hash_len(&self) -> usize {
        self.hash_provider.output_len()
    }

    /// Can a session using this suite be resumed into a handshake
    /// selecting `other`?
    ///
    /// Resumption carries the PSK through the new suite's HKDF, so the
    /// PRF hashes must agree.
    pub fn can_resume_from(&self, other: &Tls13CipherSuite) -> bool {
        self.hash_provider.algorithm() == other.hash_provider.algorithm()
    }
}

impl PartialEq for Tls13CipherSuite {
    fn eq(&self, other: &Self) -> bool {
        self.suite == other.suite
    }
}

impl fmt::Debug for Tls13CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tls13CipherSuite")
            .field("suite", &self.suite)
            .finish()
    }
}
