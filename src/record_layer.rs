use core::fmt;

use zeroize::Zeroize;

use crate::msgs::codec::{Codec, U24};
use crate::msgs::enums::{AlertDescription, AlertLevel, HandshakeType};
use crate::suites::Tls13CipherSuite;

/// One handshake message, as surfaced by the record layer after
/// deframing and (where applicable) decryption and joining.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundMessage {
    /// The handshake message type.
    pub typ: HandshakeType,
    /// The message body, without the four-byte header.
    pub payload: Vec<u8>,
}

impl InboundMessage {
    /// The full handshake encoding: type, u24 length, body.
    ///
    /// This is the byte sequence the transcript hash covers.
    pub fn encoding(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.payload.len());
        self.typ.encode(&mut bytes);
        U24(self.payload.len() as u32).encode(&mut bytes);
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// A traffic secret ready for installation at the record layer, which
/// expands it into AEAD key material for the epoch it opens.
pub struct TrafficKeys {
    /// The cipher suite whose AEAD and HKDF apply.
    pub suite: &'static Tls13CipherSuite,
    /// The traffic secret; `hash_len` bytes.
    pub secret: Vec<u8>,
}

impl Drop for TrafficKeys {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl fmt::Debug for TrafficKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // secret deliberately omitted
        f.debug_struct("TrafficKeys")
            .field("suite", &self.suite.suite)
            .finish()
    }
}

/// The record layer, as seen from the handshake.
///
/// All I/O is delegated here: the handshake never blocks, it returns a
/// suspension status instead.  Key installation through
/// [`set_read_state`]/[`set_write_state`] is the fence between epochs: it
/// must be observable before the next record is parsed or emitted.
///
/// [`set_read_state`]: RecordLayer::set_read_state
/// [`set_write_state`]: RecordLayer::set_write_state
pub trait RecordLayer {
    /// Return the current inbound handshake message, if one is buffered.
    ///
    /// This does not consume the message: repeated calls return the same
    /// message until [`RecordLayer::next_message`] is called.
    fn get_message(&mut self) -> Option<InboundMessage>;

    /// Consume the message last returned by [`RecordLayer::get_message`].
    fn next_message(&mut self);

    /// Install `keys` for protecting inbound records.
    fn set_read_state(&mut self, keys: TrafficKeys);

    /// Install `keys` for protecting outbound records.
    fn set_write_state(&mut self, keys: TrafficKeys);

    /// Restore the null cipher on the write side, removing any 0-RTT epoch.
    fn reset_write_state(&mut self);

    /// Queue an alert record.
    fn add_alert(&mut self, level: AlertLevel, desc: AlertDescription);

    /// Queue a ChangeCipherSpec record.
    fn add_change_cipher_spec(&mut self);

    /// Queue one encoded handshake message.
    fn add_message(&mut self, payload: &[u8]);

    /// Mark the end of a flight; queued records should be written out.
    fn flush(&mut self);
}
