//! Wire-level encoding and decoding of TLS 1.3 handshake messages,
//! shared with the rest of the TLS stack.

#[macro_use]
mod macros;

pub mod base;
pub mod codec;
pub mod enums;
pub mod handshake;
