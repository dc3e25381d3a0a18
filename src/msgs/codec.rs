use core::fmt::Debug;

use crate::error::InvalidMessage;

/// A decoding cursor over borrowed bytes.
///
/// Values are split off the front of the slice; a length-prefixed
/// substructure gets its own bounded `Reader`, so a malformed inner
/// length can never read past the structure that declared it.  Every
/// take names the field being decoded, so truncation errors say what
/// was missing.
pub struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Split `n` bytes off the front.
    pub fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], InvalidMessage> {
        if self.bytes.len() < n {
            return Err(InvalidMessage::MissingData(field));
        }
        let (taken, rest) = self.bytes.split_at(n);
        self.bytes = rest;
        Ok(taken)
    }

    /// Split a fixed-size array off the front.
    pub fn take_n<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], InvalidMessage> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    /// A bounded reader over the next `n` bytes.
    pub fn sub(&mut self, n: usize, field: &'static str) -> Result<Reader<'a>, InvalidMessage> {
        Ok(Reader::new(self.take(n, field)?))
    }

    /// Everything not yet decoded, consuming it.
    pub fn rest(&mut self) -> &'a [u8] {
        core::mem::take(&mut self.bytes)
    }

    /// Whether every byte has been decoded.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Fail with a trailing-data error unless the reader is exhausted.
    pub fn expect_empty(&self, message: &'static str) -> Result<(), InvalidMessage> {
        match self.bytes.is_empty() {
            true => Ok(()),
            false => Err(InvalidMessage::TrailingData(message)),
        }
    }
}

/// Two-way wire encoding for a handshake value.
pub trait Codec: Debug + Sized {
    /// Append the wire form of `self` to `bytes`.
    fn encode(&self, bytes: &mut Vec<u8>);

    /// Decode a value from the front of `r`.
    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage>;

    /// The wire form of `self` as a fresh buffer.
    fn encoded(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.encode(&mut bytes);
        bytes
    }

    /// Decode a value from the front of `bytes`.
    fn read_bytes(bytes: &[u8]) -> Result<Self, InvalidMessage> {
        Self::read(&mut Reader::new(bytes))
    }
}

impl Codec for u8 {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.push(*self);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let [byte] = r.take_n::<1>("u8")?;
        Ok(byte)
    }
}

impl Codec for u16 {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.to_be_bytes());
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self::from_be_bytes(r.take_n::<2>("u16")?))
    }
}

impl Codec for u32 {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.to_be_bytes());
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self::from_be_bytes(r.take_n::<4>("u32")?))
    }
}

/// The three-byte big-endian length used by handshake message framing
/// and certificate chains.
#[derive(Debug, Copy, Clone)]
pub struct U24(pub u32);

impl From<U24> for usize {
    #[inline]
    fn from(v: U24) -> Self {
        v.0 as Self
    }
}

impl Codec for U24 {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.0.to_be_bytes()[1..]);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let [a, b, c] = r.take_n::<3>("U24")?;
        Ok(Self(u32::from_be_bytes([0, a, b, c])))
    }
}

/// Encode a u8-length-prefixed structure; `fill` writes the body.
pub fn nested_u8(bytes: &mut Vec<u8>, fill: impl FnOnce(&mut Vec<u8>)) {
    let mut body = Vec::new();
    fill(&mut body);
    debug_assert!(body.len() <= usize::from(u8::MAX));
    (body.len() as u8).encode(bytes);
    bytes.extend_from_slice(&body);
}

/// Encode a u16-length-prefixed structure; `fill` writes the body.
pub fn nested_u16(bytes: &mut Vec<u8>, fill: impl FnOnce(&mut Vec<u8>)) {
    let mut body = Vec::new();
    fill(&mut body);
    debug_assert!(body.len() <= usize::from(u16::MAX));
    (body.len() as u16).encode(bytes);
    bytes.extend_from_slice(&body);
}

/// Encode `items` as a u16-length-prefixed list.
pub fn encode_list_u16<T: Codec>(items: &[T], bytes: &mut Vec<u8>) {
    nested_u16(bytes, |body| {
        for item in items {
            item.encode(body);
        }
    });
}

/// Decode a u16-length-prefixed list of `T`.
pub fn read_list_u16<T: Codec>(
    r: &mut Reader<'_>,
    field: &'static str,
) -> Result<Vec<T>, InvalidMessage> {
    let len = usize::from(u16::read(r)?);
    let mut sub = r.sub(len, field)?;
    let mut items = Vec::new();
    while !sub.is_empty() {
        items.push(T::read(&mut sub)?);
    }
    Ok(items)
}
