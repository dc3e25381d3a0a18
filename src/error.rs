//! Error types used throughout this crate.

use std::error::Error as StdError;
use std::fmt;

use crate::msgs::enums::{AlertDescription, HandshakeType};

/// This crate reports protocol errors using this type.
#[non_exhaustive]
#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// We received a TLS handshake message that isn't valid right now.
    /// `expect_types` lists the handshake message types we can expect
    /// right now.  `got_type` is the type we found.
    InappropriateHandshakeMessage {
        /// Which handshake type we expected
        expect_types: Vec<HandshakeType>,
        /// What handshake type we received
        got_type: HandshakeType,
    },

    /// The peer sent us a TLS message with invalid contents.
    InvalidMessage(InvalidMessage),

    /// The peer deviated from the standard TLS protocol.
    /// The parameter gives a hint where.
    PeerMisbehaved(PeerMisbehaved),

    /// We saw an invalid certificate.
    ///
    /// The contained error is from the certificate validation trait
    /// implementation.
    InvalidCertificate(CertificateError),

    /// The caller misused the API.
    ///
    /// This only results from the ordering, dependencies or parameter
    /// values of calls, never from the values of untrusted data.
    ApiMisuse(ApiMisuse),

    /// A catch-all error for unlikely errors.
    General(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InappropriateHandshakeMessage {
                expect_types,
                got_type,
            } => write!(
                f,
                "received unexpected handshake message: got {:?} when expecting {}",
                got_type,
                join::<HandshakeType>(expect_types)
            ),
            Self::InvalidMessage(typ) => {
                write!(f, "received corrupt message: {:?}", typ)
            }
            Self::PeerMisbehaved(why) => write!(f, "peer misbehaved: {:?}", why),
            Self::InvalidCertificate(err) => {
                write!(f, "invalid peer certificate: {:?}", err)
            }
            Self::ApiMisuse(why) => write!(f, "API misuse: {:?}", why),
            Self::General(err) => write!(f, "unexpected error: {}", err),
        }
    }
}

impl StdError for Error {}

fn join<T: fmt::Debug>(items: &[T]) -> String {
    items
        .iter()
        .map(|x| format!("{:?}", x))
        .collect::<Vec<String>>()
        .join(" or ")
}

/// A corrupt TLS message payload that resulted in an error.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidMessage {
    /// Missing data for the named handshake payload value
    MissingData(&'static str),
    /// Trailing data found for the named handshake payload value
    TrailingData(&'static str),
    /// A peer sent an empty value where a non-empty one is required.
    IllegalEmptyValue,
    /// A peer sent an empty list of items, but a non-empty list is required.
    ///
    /// The argument names the context.
    IllegalEmptyList(&'static str),
    /// Context was incorrectly attached to a certificate request during
    /// a handshake.
    InvalidCertRequest,
    /// A peer sent an empty list of signature schemes
    NoSignatureSchemes,
    /// A server sent an empty ticket
    EmptyTicketValue,
    /// A peer sent a message where a given extension type was repeated
    DuplicateExtension(u16),
    /// A server sent a HelloRetryRequest with an unknown extension
    UnknownHelloRetryRequestExtension,
    /// A server sent a ServerHello with an unknown extension
    UnknownServerHelloExtension,
    /// A peer sent a non-null compression method.
    UnsupportedCompression,
}

impl From<InvalidMessage> for Error {
    #[inline]
    fn from(e: InvalidMessage) -> Self {
        Self::InvalidMessage(e)
    }
}

impl From<InvalidMessage> for AlertDescription {
    fn from(e: InvalidMessage) -> Self {
        match e {
            InvalidMessage::DuplicateExtension(_) => Self::IllegalParameter,
            _ => Self::DecodeError,
        }
    }
}

/// The set of cases where we failed to make a connection because we thought
/// the peer was misbehaving.
///
/// This is `non_exhaustive`: we might add or stop using items here in minor
/// versions.  We also don't document what they mean.  Generally a user of
/// this crate shouldn't vary its behaviour on these error codes, and there
/// is nothing it can do to improve matters.
#[allow(missing_docs)]
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PeerMisbehaved {
    EarlyDataAcceptedWithUnexpectedExtension,
    EarlyDataOfferedWithVariedAlpn,
    EarlyDataOfferedWithVariedCipherSuite,
    IllegalHelloRetryRequestWithOfferedGroup,
    IllegalHelloRetryRequestWithUnsupportedGroup,
    IncorrectFinished,
    IncorrectLegacyVersion,
    MissingKeyShare,
    NoCertificatesPresented,
    ResumptionWithVariedPrfHash,
    ResumptionWithVariedVersion,
    SelectedIncompatibleCipherSuite,
    SelectedInvalidPsk,
    SelectedUnknownCipherSuite,
    UnsolicitedEncryptedExtension,
    UnsolicitedPreSharedKeyExtension,
    UnsolicitedSupportedVersionsExtension,
    WrongGroupForKeyShare,
}

impl From<PeerMisbehaved> for Error {
    #[inline]
    fn from(e: PeerMisbehaved) -> Self {
        Self::PeerMisbehaved(e)
    }
}

/// The ways in which certificate validators can express errors.
///
/// Note that the handshake code interprets specifically these error codes
/// to send specific TLS alerts.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum CertificateError {
    /// The certificate is not correctly encoded.
    BadEncoding,
    /// The current time is after the `notAfter` time in the certificate.
    Expired,
    /// The certificate is not issued by a known root certificate.
    UnknownIssuer,
    /// A signature inside the certificate or made by it is invalid.
    BadSignature,
    /// The application rejected the certificate for its own reasons.
    ApplicationVerificationFailure,
}

impl From<CertificateError> for Error {
    #[inline]
    fn from(e: CertificateError) -> Self {
        Self::InvalidCertificate(e)
    }
}

impl From<CertificateError> for AlertDescription {
    fn from(e: CertificateError) -> Self {
        match e {
            CertificateError::BadEncoding => Self::BadCertificate,
            CertificateError::Expired => Self::CertificateExpired,
            CertificateError::UnknownIssuer => Self::UnknownCA,
            CertificateError::BadSignature => Self::DecryptError,
            CertificateError::ApplicationVerificationFailure => Self::AccessDenied,
        }
    }
}

/// Ways in which the embedding application can misuse this crate.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ApiMisuse {
    /// The offered session was established under a different
    /// session-ID context than the one now configured.
    ResumedSessionInDifferentContext,
}

impl From<ApiMisuse> for Error {
    #[inline]
    fn from(e: ApiMisuse) -> Self {
        Self::ApiMisuse(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke() {
        let all = vec![
            Error::InappropriateHandshakeMessage {
                expect_types: vec![HandshakeType::ServerHello],
                got_type: HandshakeType::HelloRetryRequest,
            },
            Error::InvalidMessage(InvalidMessage::TrailingData("ServerHello")),
            Error::PeerMisbehaved(PeerMisbehaved::MissingKeyShare),
            Error::InvalidCertificate(CertificateError::UnknownIssuer),
            Error::ApiMisuse(ApiMisuse::ResumedSessionInDifferentContext),
            Error::General("undocumented error".to_string()),
        ];

        for err in all {
            assert_ne!(format!("{}", err), "");
        }
    }

    #[test]
    fn decode_failures_map_to_decode_error_alerts() {
        assert_eq!(
            AlertDescription::from(InvalidMessage::TrailingData("x")),
            AlertDescription::DecodeError
        );
        assert_eq!(
            AlertDescription::from(InvalidMessage::DuplicateExtension(0x33)),
            AlertDescription::IllegalParameter
        );
        assert_eq!(
            AlertDescription::from(CertificateError::BadSignature),
            AlertDescription::DecryptError
        );
    }
}
