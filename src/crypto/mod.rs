//! Capability interfaces consumed by the handshake: the suite's PRF
//! hash, HMAC over it, and key exchange.  Concrete implementations are
//! supplied by the embedding TLS stack's crypto provider.
//!
//! The surface here is deliberately small: the transcript needs a
//! streaming hash it can sample without finishing, and the key schedule
//! needs one-shot MACs over concatenated parts.  Anything beyond that
//! belongs to the record layer's provider, not this crate.

use zeroize::Zeroize;

use crate::error::Error;
use crate::msgs::enums::{HashAlgorithm, NamedGroup};

/// A hash-sized byte value: a digest, a MAC tag, or Finished
/// verify_data.
#[derive(Clone)]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Digest {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// The hash function a cipher suite names as its PRF hash.
pub trait Hash: Send + Sync {
    /// The identity of this hash, used to decide whether two suites can
    /// share a resumption secret.
    fn algorithm(&self) -> HashAlgorithm;

    /// Output length in bytes; this is `hash_len` throughout the key
    /// schedule.
    fn output_len(&self) -> usize;

    /// Begin hashing a byte stream.
    fn start(&self) -> Box<dyn HashContext>;

    /// Hash `data` in a single call.
    fn compute(&self, data: &[u8]) -> Digest {
        let mut ctx = self.start();
        ctx.update(data);
        ctx.current()
    }
}

/// An in-progress hash over a growing byte stream.
///
/// The transcript samples the running value at many points while
/// continuing to absorb messages, so producing `current` must leave the
/// context usable.
pub trait HashContext: Send + Sync {
    /// Absorb `data`.
    fn update(&mut self, data: &[u8]);

    /// The hash of everything absorbed so far.
    fn current(&self) -> Digest;
}

/// HMAC under the same hash, keyed per use.
///
/// This is the primitive the key schedule builds HKDF-Extract and
/// HKDF-Expand out of, and what Finished values are computed with.
pub trait Hmac: Send + Sync {
    /// Prepare `key` for MAC computations.
    fn with_key(&self, key: &[u8]) -> Box<dyn MacKey>;
}

/// A ready HMAC key.
pub trait MacKey: Send + Sync {
    /// MAC the concatenation of `parts`.
    fn mac(&self, parts: &[&[u8]]) -> Digest;
}

/// A supported key exchange group.
///
/// This has a TLS-level name expressed using the [`NamedGroup`] enum, and
/// a function which produces an [`ActiveKeyExchange`].
pub trait SupportedKxGroup: Send + Sync {
    /// Start a key exchange.
    ///
    /// This will prepare an ephemeral secret key in the supported group,
    /// and a corresponding public key.  The key exchange must be completed
    /// by calling [`ActiveKeyExchange::complete`].
    fn start(&self) -> Result<Box<dyn ActiveKeyExchange>, Error>;

    /// Named group the construction is for.
    fn name(&self) -> NamedGroup;
}

/// An in-progress key exchange originating from a [`SupportedKxGroup`].
pub trait ActiveKeyExchange: Send + Sync {
    /// Completes the key exchange, given the peer's raw public key.
    ///
    /// The shared secret is returned as a [`SharedSecret`] which can be
    /// constructed from a `&[u8]`.  This consumes and so terminates the
    /// key exchange.
    fn complete(self: Box<Self>, peer_pub_key: &[u8]) -> Result<SharedSecret, Error>;

    /// Return the public key being used.
    fn pub_key(&self) -> &[u8];

    /// Return the group being used.
    fn group(&self) -> NamedGroup;
}

/// The result from [`ActiveKeyExchange::complete`].
pub struct SharedSecret {
    buf: Vec<u8>,
}

impl SharedSecret {
    /// Returns the shared secret as a slice of bytes.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl From<&[u8]> for SharedSecret {
    fn from(source: &[u8]) -> Self {
        Self {
            buf: source.to_vec(),
        }
    }
}

impl From<Vec<u8>> for SharedSecret {
    fn from(buf: Vec<u8>) -> Self {
        Self { buf }
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}
