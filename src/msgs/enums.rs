#![allow(clippy::upper_case_acronyms)]
#![allow(non_camel_case_types)]

use crate::msgs::codec::{Codec, Reader};

enum_builder! {
    /// The `HandshakeType` TLS protocol enum.  Values in this enum are taken
    /// from the various RFCs covering TLS, and are listed by IANA.
    /// The `Unknown` item is used when processing unrecognized ordinals.
    #[repr(u8)]
    pub enum HandshakeType {
        ClientHello => 0x01,
        ServerHello => 0x02,
        NewSessionTicket => 0x04,
        HelloRetryRequest => 0x06,
        EncryptedExtensions => 0x08,
        Certificate => 0x0b,
        CertificateRequest => 0x0d,
        CertificateVerify => 0x0f,
        Finished => 0x14,
        ChannelId => 0xcb,
        MessageHash => 0xfe,
    }
}

enum_builder! {
    /// The `AlertLevel` TLS protocol enum.
    #[repr(u8)]
    pub enum AlertLevel {
        Warning => 0x01,
        Fatal => 0x02,
    }
}

enum_builder! {
    /// The `AlertDescription` TLS protocol enum.  Values in this enum are
    /// taken from the various RFCs covering TLS, and are listed by IANA.
    /// The `Unknown` item is used when processing unrecognized ordinals.
    #[repr(u8)]
    pub enum AlertDescription {
        CloseNotify => 0x00,
        EndOfEarlyData => 0x01,
        UnexpectedMessage => 0x0a,
        BadRecordMac => 0x14,
        RecordOverflow => 0x16,
        HandshakeFailure => 0x28,
        BadCertificate => 0x2a,
        UnsupportedCertificate => 0x2b,
        CertificateRevoked => 0x2c,
        CertificateExpired => 0x2d,
        CertificateUnknown => 0x2e,
        IllegalParameter => 0x2f,
        UnknownCA => 0x30,
        AccessDenied => 0x31,
        DecodeError => 0x32,
        DecryptError => 0x33,
        ProtocolVersion => 0x46,
        InsufficientSecurity => 0x47,
        InternalError => 0x50,
        InappropriateFallback => 0x56,
        UserCanceled => 0x5a,
        MissingExtension => 0x6d,
        UnsupportedExtension => 0x6e,
        UnrecognizedName => 0x70,
        BadCertificateStatusResponse => 0x71,
        UnknownPSKIdentity => 0x73,
        CertificateRequired => 0x74,
        NoApplicationProtocol => 0x78,
    }
}

enum_builder! {
    /// TLS protocol version codes.
    ///
    /// `Unknown` carries pre-standard TLS 1.3 code points (for example the
    /// draft and experimental deployments), which embedders may configure.
    #[repr(u16)]
    pub enum ProtocolVersion {
        TLSv1_2 => 0x0303,
        TLSv1_3 => 0x0304,
    }
}

enum_builder! {
    /// The `CipherSuite` TLS protocol enum, restricted to the TLS 1.3
    /// registrations this crate can negotiate.
    #[repr(u16)]
    pub enum CipherSuite {
        TLS13_AES_128_GCM_SHA256 => 0x1301,
        TLS13_AES_256_GCM_SHA384 => 0x1302,
        TLS13_CHACHA20_POLY1305_SHA256 => 0x1303,
    }
}

enum_builder! {
    /// The `NamedGroup` TLS protocol enum.  Values in this enum are taken
    /// from the various RFCs covering TLS, and are listed by IANA.
    #[repr(u16)]
    pub enum NamedGroup {
        secp256r1 => 0x0017,
        secp384r1 => 0x0018,
        secp521r1 => 0x0019,
        X25519 => 0x001d,
        X448 => 0x001e,
    }
}

enum_builder! {
    /// The `SignatureScheme` TLS protocol enum.  Values in this enum are
    /// taken from the various RFCs covering TLS, and are listed by IANA.
    #[repr(u16)]
    pub enum SignatureScheme {
        RSA_PKCS1_SHA256 => 0x0401,
        RSA_PKCS1_SHA384 => 0x0501,
        RSA_PKCS1_SHA512 => 0x0601,
        ECDSA_NISTP256_SHA256 => 0x0403,
        ECDSA_NISTP384_SHA384 => 0x0503,
        ECDSA_NISTP521_SHA512 => 0x0603,
        RSA_PSS_SHA256 => 0x0804,
        RSA_PSS_SHA384 => 0x0805,
        RSA_PSS_SHA512 => 0x0806,
        ED25519 => 0x0807,
        ED448 => 0x0808,
    }
}

enum_builder! {
    /// The `ExtensionType` TLS protocol enum.  Values in this enum are
    /// taken from the various RFCs covering TLS, and are listed by IANA.
    #[repr(u16)]
    pub enum ExtensionType {
        ServerName => 0x0000,
        ALProtocolNegotiation => 0x0010,
        PreSharedKey => 0x0029,
        EarlyData => 0x002a,
        SupportedVersions => 0x002b,
        Cookie => 0x002c,
        TicketEarlyDataInfo => 0x002e,
        KeyShare => 0x0033,
        ChannelId => 0x754f,
    }
}

enum_builder! {
    /// The `HashAlgorithm` enum, naming the PRF hash of a cipher suite.
    #[repr(u8)]
    pub enum HashAlgorithm {
        NONE => 0,
        MD5 => 1,
        SHA1 => 2,
        SHA224 => 3,
        SHA256 => 4,
        SHA384 => 5,
        SHA512 => 6,
    }
}
