use pki_types::CertificateDer;

use crate::error::{Error, InvalidMessage, PeerMisbehaved};
use crate::msgs::base::{MaybeEmpty, NonEmpty, PayloadU16, PayloadU8};
use crate::msgs::codec::{
    encode_list_u16, nested_u16, nested_u8, read_list_u16, Codec, Reader, U24,
};
use crate::msgs::enums::{
    CipherSuite, ExtensionType, HandshakeType, NamedGroup, ProtocolVersion, SignatureScheme,
};

/// Frame `body` as one handshake message: type, u24 length, body.
pub fn frame_message(typ: HandshakeType, body: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + body.len());
    typ.encode(&mut bytes);
    U24(body.len() as u32).encode(&mut bytes);
    bytes.extend_from_slice(body);
    bytes
}

/// The synthetic `message_hash` message that replaces the first
/// ClientHello in the transcript after a HelloRetryRequest
/// (RFC 8446 section 4.4.1).
pub fn build_message_hash(hash: &[u8]) -> Vec<u8> {
    frame_message(HandshakeType::MessageHash, hash)
}

fn read_extension_header<'a>(
    r: &mut Reader<'a>,
) -> Result<(ExtensionType, Reader<'a>), InvalidMessage> {
    let typ = ExtensionType::read(r)?;
    let len = usize::from(u16::read(r)?);
    Ok((typ, r.sub(len, "Extension")?))
}

fn reject_duplicate<T>(slot: &Option<T>, typ: ExtensionType) -> Result<(), InvalidMessage> {
    match slot {
        Some(_) => Err(InvalidMessage::DuplicateExtension(u16::from(typ))),
        None => Ok(()),
    }
}

/// A server's HelloRetryRequest: a request to retry with different
/// parameters.
#[derive(Debug, PartialEq)]
pub struct HelloRetryRequestPayload {
    pub server_version: ProtocolVersion,
    pub key_share: Option<NamedGroup>,
    pub cookie: Option<PayloadU16<NonEmpty>>,
}

impl Codec for HelloRetryRequestPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.server_version.encode(bytes);
        nested_u16(bytes, |extensions| {
            if let Some(group) = &self.key_share {
                ExtensionType::KeyShare.encode(extensions);
                nested_u16(extensions, |ext| group.encode(ext));
            }
            if let Some(cookie) = &self.cookie {
                ExtensionType::Cookie.encode(extensions);
                nested_u16(extensions, |ext| cookie.encode(ext));
            }
        });
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let server_version = ProtocolVersion::read(r)?;

        let len = usize::from(u16::read(r)?);
        // HelloRetryRequest may not be empty
        if len == 0 {
            return Err(InvalidMessage::IllegalEmptyList(
                "HelloRetryRequestExtensions",
            ));
        }
        let mut extensions = r.sub(len, "HelloRetryRequestExtensions")?;

        let mut out = Self {
            server_version,
            key_share: None,
            cookie: None,
        };

        while !extensions.is_empty() {
            let (typ, mut body) = read_extension_header(&mut extensions)?;
            match typ {
                ExtensionType::KeyShare => {
                    reject_duplicate(&out.key_share, typ)?;
                    out.key_share = Some(NamedGroup::read(&mut body)?);
                }
                ExtensionType::Cookie => {
                    reject_duplicate(&out.cookie, typ)?;
                    out.cookie = Some(PayloadU16::read(&mut body)?);
                }
                _ => return Err(InvalidMessage::UnknownHelloRetryRequestExtension),
            }
            body.expect_empty("HelloRetryRequestExtension")?;
        }

        Ok(out)
    }
}

/// A key share offered by the server in its ServerHello.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerKeyShare {
    pub group: NamedGroup,
    pub payload: PayloadU16<NonEmpty>,
}

impl Codec for ServerKeyShare {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.group.encode(bytes);
        self.payload.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            group: NamedGroup::read(r)?,
            payload: PayloadU16::read(r)?,
        })
    }
}

/// The server's ServerHello, after the legacy framing differences of the
/// middlebox-compatibility profile have been absorbed.
#[derive(Debug, PartialEq)]
pub struct ServerHelloPayload {
    pub legacy_version: ProtocolVersion,
    pub random: [u8; 32],
    pub session_id: Option<PayloadU8>,
    pub cipher_suite: CipherSuite,
    pub key_share: Option<ServerKeyShare>,
    pub pre_shared_key: Option<u16>,
    pub supported_versions: Option<ProtocolVersion>,
}

impl ServerHelloPayload {
    /// Decode, absorbing the `legacy_session_id` and `compression_method`
    /// fields present only in the middlebox-compatibility profile.
    pub fn read_with(r: &mut Reader<'_>, compat: bool) -> Result<Self, InvalidMessage> {
        let legacy_version = ProtocolVersion::read(r)?;
        let random = r.take_n::<32>("ServerHello random")?;

        let session_id = match compat {
            true => Some(PayloadU8::read(r)?),
            false => None,
        };

        let cipher_suite = CipherSuite::read(r)?;

        if compat && u8::read(r)? != 0x00 {
            return Err(InvalidMessage::UnsupportedCompression);
        }

        let len = usize::from(u16::read(r)?);
        let mut extensions = r.sub(len, "ServerHelloExtensions")?;

        let mut out = Self {
            legacy_version,
            random,
            session_id,
            cipher_suite,
            key_share: None,
            pre_shared_key: None,
            supported_versions: None,
        };

        while !extensions.is_empty() {
            let (typ, mut body) = read_extension_header(&mut extensions)?;
            match typ {
                ExtensionType::KeyShare => {
                    reject_duplicate(&out.key_share, typ)?;
                    out.key_share = Some(ServerKeyShare::read(&mut body)?);
                }
                ExtensionType::PreSharedKey => {
                    reject_duplicate(&out.pre_shared_key, typ)?;
                    out.pre_shared_key = Some(u16::read(&mut body)?);
                }
                ExtensionType::SupportedVersions => {
                    reject_duplicate(&out.supported_versions, typ)?;
                    out.supported_versions = Some(ProtocolVersion::read(&mut body)?);
                }
                _ => return Err(InvalidMessage::UnknownServerHelloExtension),
            }
            body.expect_empty("ServerHelloExtension")?;
        }

        Ok(out)
    }

    /// Encode, emitting the compat-profile-only fields when asked.
    pub fn encode_with(&self, bytes: &mut Vec<u8>, compat: bool) {
        self.legacy_version.encode(bytes);
        bytes.extend_from_slice(&self.random);
        if compat {
            match &self.session_id {
                Some(id) => id.encode(bytes),
                None => PayloadU8::empty().encode(bytes),
            }
        }
        self.cipher_suite.encode(bytes);
        if compat {
            bytes.push(0x00);
        }

        nested_u16(bytes, |extensions| {
            if let Some(key_share) = &self.key_share {
                ExtensionType::KeyShare.encode(extensions);
                nested_u16(extensions, |ext| key_share.encode(ext));
            }
            if let Some(index) = &self.pre_shared_key {
                ExtensionType::PreSharedKey.encode(extensions);
                nested_u16(extensions, |ext| index.encode(ext));
            }
            if let Some(version) = &self.supported_versions {
                ExtensionType::SupportedVersions.encode(extensions);
                nested_u16(extensions, |ext| version.encode(ext));
            }
        });
    }
}

/// The extensions a server may place in EncryptedExtensions, decoded into
/// typed slots.
///
/// Unknown extension types are rejected unless the embedder registered
/// them as custom extensions for this connection, in which case their
/// receipt is recorded.
#[derive(Debug, Default)]
pub struct EncryptedExtensionsPayload {
    pub alpn_protocol: Option<Vec<u8>>,
    pub server_name_ack: bool,
    pub early_data: bool,
    pub channel_id: bool,
    pub received_custom: bool,
}

impl EncryptedExtensionsPayload {
    pub fn read_with(r: &mut Reader<'_>, custom_extensions: &[u16]) -> Result<Self, Error> {
        let len = usize::from(u16::read(r).map_err(Error::from)?);
        let mut extensions = r
            .sub(len, "EncryptedExtensions")
            .map_err(Error::from)?;

        let mut out = Self::default();
        let mut seen = Vec::new();

        while !extensions.is_empty() {
            let (typ, mut body) = read_extension_header(&mut extensions).map_err(Error::from)?;
            if seen.contains(&typ) {
                return Err(InvalidMessage::DuplicateExtension(u16::from(typ)).into());
            }
            seen.push(typ);

            match typ {
                ExtensionType::ALProtocolNegotiation => {
                    out.alpn_protocol = Some(read_single_protocol_name(&mut body)?);
                }
                ExtensionType::ServerName => {
                    out.server_name_ack = true;
                }
                ExtensionType::EarlyData => {
                    out.early_data = true;
                }
                ExtensionType::ChannelId => {
                    out.channel_id = true;
                }
                _ if custom_extensions.contains(&u16::from(typ)) => {
                    body.rest();
                    out.received_custom = true;
                }
                _ => return Err(PeerMisbehaved::UnsolicitedEncryptedExtension.into()),
            }
            body.expect_empty("EncryptedExtension")
                .map_err(Error::from)?;
        }

        Ok(out)
    }

    pub fn encode(&self, bytes: &mut Vec<u8>) {
        nested_u16(bytes, |extensions| {
            if let Some(protocol) = &self.alpn_protocol {
                ExtensionType::ALProtocolNegotiation.encode(extensions);
                nested_u16(extensions, |ext| {
                    nested_u16(ext, |list| {
                        nested_u8(list, |name| name.extend_from_slice(protocol));
                    });
                });
            }
            if self.server_name_ack {
                ExtensionType::ServerName.encode(extensions);
                0u16.encode(extensions);
            }
            if self.early_data {
                ExtensionType::EarlyData.encode(extensions);
                0u16.encode(extensions);
            }
            if self.channel_id {
                ExtensionType::ChannelId.encode(extensions);
                0u16.encode(extensions);
            }
        });
    }
}

/// The selected protocol of an ALPN response: a one-element
/// `ProtocolNameList`.
fn read_single_protocol_name(r: &mut Reader<'_>) -> Result<Vec<u8>, Error> {
    let len = usize::from(u16::read(r).map_err(Error::from)?);
    let mut list = r
        .sub(len, "ProtocolNameList")
        .map_err(Error::from)?;
    let name = PayloadU8::<NonEmpty>::read(&mut list).map_err(Error::from)?;
    list.expect_empty("ProtocolNameList")
        .map_err(Error::from)?;
    Ok(name.0)
}

/// A DER-encoded X.501 name, as listed in `certificate_authorities`.
#[derive(Debug, Clone, PartialEq)]
pub struct DistinguishedName(pub Vec<u8>);

impl Codec for DistinguishedName {
    fn encode(&self, bytes: &mut Vec<u8>) {
        (self.0.len() as u16).encode(bytes);
        bytes.extend_from_slice(&self.0);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let len = usize::from(u16::read(r)?);
        Ok(Self(r.take(len, "DistinguishedName")?.to_vec()))
    }
}

/// The server's request for client authentication.
#[derive(Debug, PartialEq)]
pub struct CertificateRequestPayload {
    pub sigschemes: Vec<SignatureScheme>,
    pub ca_names: Vec<DistinguishedName>,
}

impl Codec for CertificateRequestPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        PayloadU8::empty().encode(bytes);
        encode_list_u16(&self.sigschemes, bytes);
        encode_list_u16(&self.ca_names, bytes);
        // no extensions
        0u16.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let context = PayloadU8::<MaybeEmpty>::read(r)?;
        // The request context is always empty during the handshake.
        if !context.0.is_empty() {
            return Err(InvalidMessage::InvalidCertRequest);
        }

        let sigschemes = read_list_u16::<SignatureScheme>(r, "SignatureSchemeList")?;
        if sigschemes.is_empty() {
            return Err(InvalidMessage::NoSignatureSchemes);
        }

        let ca_names = read_list_u16::<DistinguishedName>(r, "CertificateAuthorities")?;

        // Ignore extensions, but the block must parse.
        let len = usize::from(u16::read(r)?);
        r.take(len, "CertificateRequestExtensions")?;

        Ok(Self {
            sigschemes,
            ca_names,
        })
    }
}

/// A certificate chain as it appears on the wire: each entry carries the
/// DER certificate and a per-entry extension block.
#[derive(Debug, Clone, Default)]
pub struct CertificateChain(pub Vec<CertificateDer<'static>>);

impl CertificateChain {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Codec for CertificateChain {
    fn encode(&self, bytes: &mut Vec<u8>) {
        let mut body = Vec::new();
        for cert in &self.0 {
            U24(cert.as_ref().len() as u32).encode(&mut body);
            body.extend_from_slice(cert.as_ref());
            // no per-entry extensions
            0u16.encode(&mut body);
        }
        U24(body.len() as u32).encode(bytes);
        bytes.extend_from_slice(&body);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let len = usize::from(U24::read(r)?);
        let mut list = r.sub(len, "CertificateList")?;

        let mut certs = Vec::new();
        while !list.is_empty() {
            let cert_len = usize::from(U24::read(&mut list)?);
            if cert_len == 0 {
                return Err(InvalidMessage::IllegalEmptyValue);
            }
            let cert = list.take(cert_len, "CertificateEntry")?;
            certs.push(CertificateDer::from(cert.to_vec()));

            // consume per-entry extensions
            let ext_len = usize::from(u16::read(&mut list)?);
            list.take(ext_len, "CertificateEntryExtensions")?;
        }

        Ok(Self(certs))
    }
}

/// A TLS 1.3 Certificate message.
#[derive(Debug)]
pub struct CertificatePayload {
    pub context: PayloadU8,
    pub chain: CertificateChain,
}

impl Codec for CertificatePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.context.encode(bytes);
        self.chain.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            context: PayloadU8::read(r)?,
            chain: CertificateChain::read(r)?,
        })
    }
}

/// A CertificateVerify message.
#[derive(Debug)]
pub struct CertificateVerifyPayload {
    pub scheme: SignatureScheme,
    pub signature: PayloadU16,
}

impl Codec for CertificateVerifyPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.scheme.encode(bytes);
        self.signature.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            scheme: SignatureScheme::read(r)?,
            signature: PayloadU16::read(r)?,
        })
    }
}

/// A post-handshake NewSessionTicket.
#[derive(Debug, PartialEq)]
pub struct NewSessionTicketPayload {
    pub lifetime: u32,
    pub age_add: u32,
    pub ticket: PayloadU16<NonEmpty>,
    pub max_early_data: Option<u32>,
}

impl Codec for NewSessionTicketPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.lifetime.encode(bytes);
        self.age_add.encode(bytes);
        self.ticket.encode(bytes);

        nested_u16(bytes, |extensions| {
            if let Some(max_early_data) = &self.max_early_data {
                ExtensionType::TicketEarlyDataInfo.encode(extensions);
                nested_u16(extensions, |ext| max_early_data.encode(ext));
            }
        });
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let lifetime = u32::read(r)?;
        let age_add = u32::read(r)?;
        let ticket = match PayloadU16::<NonEmpty>::read(r) {
            Err(InvalidMessage::IllegalEmptyValue) => Err(InvalidMessage::EmptyTicketValue),
            other => other,
        }?;

        let len = usize::from(u16::read(r)?);
        let mut extensions = r.sub(len, "NewSessionTicketExtensions")?;

        let mut max_early_data = None;
        while !extensions.is_empty() {
            let (typ, mut body) = read_extension_header(&mut extensions)?;
            match typ {
                ExtensionType::TicketEarlyDataInfo => {
                    reject_duplicate(&max_early_data, typ)?;
                    max_early_data = Some(u32::read(&mut body)?);
                    body.expect_empty("TicketEarlyDataInfo")?;
                }
                // unknown extensions are ignored
                _ => {
                    body.rest();
                }
            }
        }

        Ok(Self {
            lifetime,
            age_add,
            ticket,
            max_early_data,
        })
    }
}
