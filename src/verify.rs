use crate::error::Error;
use crate::msgs::enums::SignatureScheme;
use crate::msgs::handshake::CertificateChain;

/// The result of asking the external verifier about the peer's
/// certificate chain.
#[derive(Debug)]
pub enum VerifyOutcome {
    /// The chain is acceptable; the handshake continues.
    Valid,
    /// The chain was rejected; this is fatal.
    Invalid(Error),
    /// Verification is still running asynchronously; ask again after
    /// re-driving the handshake.
    Pending,
}

/// X.509 path building and verification, performed outside this crate.
///
/// Implementations hold whatever state they need across the
/// `process_certificate` / `verify_peer_cert` pair; `verify_peer_cert` may
/// defer by returning [`VerifyOutcome::Pending`], in which case the
/// handshake suspends and re-asks when re-driven.
pub trait PeerVerifier {
    /// Accept the peer's certificate chain for later verification.
    fn process_certificate(&mut self, chain: &CertificateChain) -> Result<(), Error>;

    /// Report the verification status of the previously processed chain.
    fn verify_peer_cert(&mut self) -> VerifyOutcome;

    /// Check `signature` over `message`, using the public key of the
    /// previously processed end-entity certificate and the signature
    /// scheme `scheme`.
    fn verify_signature(
        &self,
        scheme: SignatureScheme,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), Error>;
}

/// Constructs the signature input for a TLS 1.3 CertificateVerify
/// message, per RFC 8446 section 4.4.3.
fn construct_verify_message(context: &[u8], hs_hash: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(64 + context.len() + 1 + hs_hash.len());
    msg.resize(64, 0x20);
    msg.extend_from_slice(context);
    msg.push(0x00);
    msg.extend_from_slice(hs_hash);
    msg
}

pub(crate) fn construct_server_verify_message(hs_hash: &[u8]) -> Vec<u8> {
    construct_verify_message(b"TLS 1.3, server CertificateVerify", hs_hash)
}

pub(crate) fn construct_client_verify_message(hs_hash: &[u8]) -> Vec<u8> {
    construct_verify_message(b"TLS 1.3, client CertificateVerify", hs_hash)
}
