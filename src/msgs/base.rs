use core::fmt;
use core::marker::PhantomData;

use zeroize::Zeroize;

use crate::error::InvalidMessage;
use crate::msgs::codec::{Codec, Reader};

/// An arbitrary, unknown-content, u8-length-prefixed payload.
///
/// `C` controls the minimum length accepted when decoding.
#[derive(Clone, Eq, PartialEq)]
pub struct PayloadU8<C: Cardinality = MaybeEmpty>(pub Vec<u8>, PhantomData<C>);

impl<C: Cardinality> PayloadU8<C> {
    pub fn new(bytes: Vec<u8>) -> Self {
        debug_assert!(bytes.len() >= C::MIN);
        Self(bytes, PhantomData)
    }
}

impl PayloadU8<MaybeEmpty> {
    pub fn empty() -> Self {
        Self(Vec::new(), PhantomData)
    }
}

impl<C: Cardinality> Codec for PayloadU8<C> {
    fn encode(&self, bytes: &mut Vec<u8>) {
        debug_assert!(self.0.len() >= C::MIN);
        (self.0.len() as u8).encode(bytes);
        bytes.extend_from_slice(&self.0);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let len = usize::from(u8::read(r)?);
        if len < C::MIN {
            return Err(InvalidMessage::IllegalEmptyValue);
        }
        Ok(Self(r.take(len, "PayloadU8")?.to_vec(), PhantomData))
    }
}

impl<C: Cardinality> Zeroize for PayloadU8<C> {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl<C: Cardinality> AsRef<[u8]> for PayloadU8<C> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<C: Cardinality> fmt::Debug for PayloadU8<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        hex(f, &self.0)
    }
}

/// An arbitrary, unknown-content, u16-length-prefixed payload.
#[derive(Clone, Eq, PartialEq)]
pub struct PayloadU16<C: Cardinality = MaybeEmpty>(pub Vec<u8>, PhantomData<C>);

impl<C: Cardinality> PayloadU16<C> {
    pub fn new(bytes: Vec<u8>) -> Self {
        debug_assert!(bytes.len() >= C::MIN);
        Self(bytes, PhantomData)
    }
}

impl<C: Cardinality> Codec for PayloadU16<C> {
    fn encode(&self, bytes: &mut Vec<u8>) {
        debug_assert!(self.0.len() >= C::MIN);
        (self.0.len() as u16).encode(bytes);
        bytes.extend_from_slice(&self.0);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let len = usize::from(u16::read(r)?);
        if len < C::MIN {
            return Err(InvalidMessage::IllegalEmptyValue);
        }
        Ok(Self(r.take(len, "PayloadU16")?.to_vec(), PhantomData))
    }
}

impl<C: Cardinality> Zeroize for PayloadU16<C> {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl<C: Cardinality> AsRef<[u8]> for PayloadU16<C> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<C: Cardinality> fmt::Debug for PayloadU16<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        hex(f, &self.0)
    }
}

/// Minimum-length marker for decoding.
pub trait Cardinality: Clone + Eq + PartialEq {
    const MIN: usize;
}

#[derive(Clone, Eq, PartialEq)]
pub struct MaybeEmpty;

impl Cardinality for MaybeEmpty {
    const MIN: usize = 0;
}

#[derive(Clone, Eq, PartialEq)]
pub struct NonEmpty;

impl Cardinality for NonEmpty {
    const MIN: usize = 1;
}

// Format an iterator of u8 into a hex string
pub(crate) fn hex<'a>(
    f: &mut fmt::Formatter<'_>,
    payload: impl IntoIterator<Item = &'a u8>,
) -> fmt::Result {
    for b in payload {
        write!(f, "{:02x}", b)?;
    }
    Ok(())
}
