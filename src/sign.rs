use crate::msgs::enums::SignatureScheme;
use crate::msgs::handshake::{CertificateChain, DistinguishedName};

/// The server's certificate request, as surfaced to the credential source.
#[derive(Debug)]
pub struct CertificateRequestDetails {
    /// Signature schemes the server can verify, in preference order.
    pub sigschemes: Vec<SignatureScheme>,
    /// DER-encoded X.501 names of acceptable certificate authorities.
    pub ca_names: Vec<DistinguishedName>,
}

/// The credential source's answer to "which certificate, if any?".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectOutcome {
    /// A decision has been made; `has_certificate` reflects it.
    Ready,
    /// Selection is running asynchronously; ask again after re-driving
    /// the handshake.
    Pending,
    /// Selection failed; this is fatal.
    Abort,
}

/// One step of the asynchronous signing oracle.
pub enum SignOutcome {
    /// The signature is complete.
    Signature {
        /// The scheme the signature was made under.
        scheme: SignatureScheme,
        /// The signature bytes.
        signature: Vec<u8>,
    },
    /// The private-key operation is still in progress; ask again after
    /// re-driving the handshake.
    Pending,
    /// The private-key operation failed; this is fatal.
    Failure,
}

/// The client's certificate and private key, held outside this crate.
///
/// `select` is consulted once a CertificateRequest has been received and
/// may defer; `sign` drives the (possibly asynchronous) private-key
/// operation for the client CertificateVerify.
pub trait ClientCredentials {
    /// Choose a certificate for `request`, possibly none.
    fn select(&mut self, request: &CertificateRequestDetails) -> SelectOutcome;

    /// Whether a certificate was selected.
    fn has_certificate(&self) -> bool;

    /// The selected certificate chain, end entity first.  Only called
    /// when `has_certificate` returns true.
    fn certificate_chain(&self) -> CertificateChain;

    /// Sign `message` with the selected certificate's private key.
    fn sign(&mut self, message: &[u8]) -> SignOutcome;
}
