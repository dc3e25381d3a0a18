use crate::crypto::{Digest, Hash, HashContext};
use crate::msgs::handshake::build_message_hash;
use crate::record_layer::InboundMessage;

/// Early stage buffering of handshake payloads.
///
/// Until the ServerHello fixes the cipher suite we do not know which hash
/// to run, so we buffer the raw message encodings.  If a HelloRetryRequest
/// arrives in the meantime, the prefix holding the first ClientHello is
/// marked for collapse into a synthetic `message_hash` message once the
/// hash is known (RFC 8446 section 4.4.1).
pub struct HandshakeHashBuffer {
    buffer: Vec<u8>,
    retry_offset: Option<usize>,
}

impl HandshakeHashBuffer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            retry_offset: None,
        }
    }

    /// Buffer a handshake message as received from the record layer.
    pub fn add_message(&mut self, m: &InboundMessage) {
        self.add_raw(&m.encoding());
    }

    /// Buffer an already-encoded handshake message.
    pub fn add_raw(&mut self, buf: &[u8]) {
        self.buffer.extend_from_slice(buf);
    }

    /// Mark everything buffered so far (the initial ClientHello) for
    /// replacement by a `message_hash` message when hashing starts.
    ///
    /// Must be called before the HelloRetryRequest itself is buffered,
    /// and at most once.
    pub fn set_retry_point(&mut self) {
        debug_assert!(self.retry_offset.is_none());
        self.retry_offset = Some(self.buffer.len());
    }

    /// We now know what hash function the transcript uses.
    pub fn start_hash(self, provider: &'static dyn Hash) -> HandshakeHash {
        let mut ctx = provider.start();
        match self.retry_offset {
            Some(offset) => {
                let first_hello_hash = provider.compute(&self.buffer[..offset]);
                ctx.update(&build_message_hash(first_hello_hash.as_ref()));
                ctx.update(&self.buffer[offset..]);
            }
            None => ctx.update(&self.buffer),
        }

        HandshakeHash { ctx }
    }
}

impl Default for HandshakeHashBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// This deals with keeping a running hash of the handshake payloads.
/// This is computed by buffering initially; once the cipher suite is
/// known we switch to incremental hashing.
pub struct HandshakeHash {
    ctx: Box<dyn HashContext>,
}

impl HandshakeHash {
    /// Hash a handshake message as received from the record layer.
    pub fn add_message(&mut self, m: &InboundMessage) {
        self.add_raw(&m.encoding());
    }

    /// Hash an already-encoded handshake message.
    pub fn add_raw(&mut self, buf: &[u8]) {
        self.ctx.update(buf);
    }

    /// Get the current hash value.
    pub fn current_hash(&self) -> Digest {
        self.ctx.current()
    }
}

/// The transcript over the handshake so far: buffered before the cipher
/// suite is known, hashing afterwards.
pub enum Transcript {
    Buffering(HandshakeHashBuffer),
    Hashing(HandshakeHash),
}

impl Transcript {
    pub fn add_message(&mut self, m: &InboundMessage) {
        match self {
            Self::Buffering(buf) => buf.add_message(m),
            Self::Hashing(hash) => hash.add_message(m),
        }
    }

    pub fn add_raw(&mut self, bytes: &[u8]) {
        match self {
            Self::Buffering(buf) => buf.add_raw(bytes),
            Self::Hashing(hash) => hash.add_raw(bytes),
        }
    }

    /// Mark the buffered first ClientHello for collapse; see
    /// [`HandshakeHashBuffer::set_retry_point`].
    pub fn set_retry_point(&mut self) {
        match self {
            Self::Buffering(buf) => buf.set_retry_point(),
            Self::Hashing(_) => unreachable!("retry after transcript hash selected"),
        }
    }

    /// Fix the hash algorithm, converting the buffered prefix.
    ///
    /// The hash algorithm is set exactly once for a connection.
    pub fn start_hash(&mut self, provider: &'static dyn Hash) {
        let buffer = match core::mem::replace(self, Self::Buffering(HandshakeHashBuffer::new())) {
            Self::Buffering(buf) => buf,
            Self::Hashing(_) => unreachable!("transcript hash selected twice"),
        };
        *self = Self::Hashing(buffer.start_hash(provider));
    }

    /// The running hash; only valid once the hash is started.
    pub fn current_hash(&self) -> Digest {
        match self {
            Self::Buffering(_) => unreachable!("transcript hash not yet selected"),
            Self::Hashing(hash) => hash.current_hash(),
        }
    }
}
