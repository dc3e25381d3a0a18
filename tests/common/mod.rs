//! A deterministic mock environment for driving the handshake in tests.
//!
//! The crypto here provides NO SECURITY; it exists so that both the
//! client under test and the test's mirror of the server compute the
//! same transcript hashes, schedule stages and Finished tags.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use pki_types::CertificateDer;

use tls13_client::crypto::{
    ActiveKeyExchange, Digest, Hash, HashContext, Hmac, MacKey, SharedSecret, SupportedKxGroup,
};
use tls13_client::internal::{KeySchedule, SecretKind};
use tls13_client::msgs::base::{PayloadU16, PayloadU8};
use tls13_client::msgs::codec::Codec;
use tls13_client::msgs::enums::HashAlgorithm;
use tls13_client::msgs::handshake::{
    frame_message, build_message_hash, CertificateChain, CertificatePayload,
    CertificateRequestPayload, CertificateVerifyPayload, DistinguishedName,
    EncryptedExtensionsPayload, HelloRetryRequestPayload, ServerHelloPayload, ServerKeyShare,
};
use tls13_client::record_layer::{InboundMessage, RecordLayer, TrafficKeys};
use tls13_client::sign::{
    CertificateRequestDetails, ClientCredentials, SelectOutcome, SignOutcome,
};
use tls13_client::verify::{PeerVerifier, VerifyOutcome};
use tls13_client::{
    AlertDescription, AlertLevel, ChannelIdProvider, CipherSuite, ClientConfig, ClientState,
    Error, HandshakeType, HelloRebuilder, NamedGroup, ProtocolVersion, SecondClientHello,
    SessionStore, SignatureScheme, StateListener, Tls13CipherSuite, TlsSession,
};

// ---------------------------------------------------------------------
// fake hash / hmac / key exchange

/// A toy streaming hash: deterministic and input-sensitive, nothing more.
pub struct TestHash;

#[derive(Clone)]
struct TestHashContext {
    state: [u8; 32],
    len: u64,
}

impl Hash for TestHash {
    fn algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Unknown(0xff)
    }

    fn output_len(&self) -> usize {
        32
    }

    fn start(&self) -> Box<dyn HashContext> {
        Box::new(TestHashContext {
            state: [0x5a; 32],
            len: 0,
        })
    }
}

impl HashContext for TestHashContext {
    fn update(&mut self, data: &[u8]) {
        for &b in data {
            let i = (self.len % 32) as usize;
            self.state[i] = self.state[i]
                .rotate_left(3)
                .wrapping_add(b)
                .wrapping_add(self.len as u8);
            self.len = self.len.wrapping_add(1);
        }
    }

    fn current(&self) -> Digest {
        let mut out = self.state;
        let len = self.len.to_be_bytes();
        for (i, b) in len.iter().enumerate() {
            out[i] ^= b;
        }
        Digest::from(out.to_vec())
    }
}

pub static TEST_HASH: TestHash = TestHash;

/// HMAC over [`TestHash`]: tag = H(key || 0x36 || parts).
pub struct TestHmac;

struct TestHmacKey(Vec<u8>);

impl Hmac for TestHmac {
    fn with_key(&self, key: &[u8]) -> Box<dyn MacKey> {
        Box::new(TestHmacKey(key.to_vec()))
    }
}

impl MacKey for TestHmacKey {
    fn mac(&self, parts: &[&[u8]]) -> Digest {
        let mut ctx = TEST_HASH.start();
        ctx.update(&self.0);
        ctx.update(&[0x36]);
        for part in parts {
            ctx.update(part);
        }
        ctx.current()
    }
}

pub static TEST_HMAC: TestHmac = TestHmac;

pub static TEST_SUITE: Tls13CipherSuite = Tls13CipherSuite {
    suite: CipherSuite::TLS13_AES_128_GCM_SHA256,
    hash_provider: &TEST_HASH,
    hmac_provider: &TEST_HMAC,
};

pub const CLIENT_KX_PUB: &[u8] = b"client-ephemeral-public";
pub const SERVER_KX_PUB: &[u8] = b"server-ephemeral-public";

/// What both sides agree the ECDHE result is.
pub fn ecdhe_shared_secret(client_pub: &[u8], server_pub: &[u8]) -> Vec<u8> {
    let mut ctx = TEST_HASH.start();
    ctx.update(client_pub);
    ctx.update(b"|");
    ctx.update(server_pub);
    ctx.current().into_vec()
}

#[derive(Debug)]
pub struct TestKxGroup(pub NamedGroup);

pub struct TestActiveKx {
    group: NamedGroup,
}

impl TestActiveKx {
    pub fn new(group: NamedGroup) -> Self {
        Self { group }
    }
}

impl SupportedKxGroup for TestKxGroup {
    fn start(&self) -> Result<Box<dyn ActiveKeyExchange>, Error> {
        Ok(Box::new(TestActiveKx::new(self.0)))
    }

    fn name(&self) -> NamedGroup {
        self.0
    }
}

impl ActiveKeyExchange for TestActiveKx {
    fn complete(self: Box<Self>, peer_pub_key: &[u8]) -> Result<SharedSecret, Error> {
        Ok(SharedSecret::from(ecdhe_shared_secret(
            CLIENT_KX_PUB,
            peer_pub_key,
        )))
    }

    fn pub_key(&self) -> &[u8] {
        CLIENT_KX_PUB
    }

    fn group(&self) -> NamedGroup {
        self.group
    }
}

// ---------------------------------------------------------------------
// fake signatures

pub fn fake_signature(key: &[u8], message: &[u8]) -> Vec<u8> {
    TEST_HMAC
        .with_key(key)
        .mac(&[message])
        .into_vec()
}

pub const SERVER_SIGNING_KEY: &[u8] = b"server-signing-key";
pub const CLIENT_SIGNING_KEY: &[u8] = b"client-signing-key";

/// RFC 8446 section 4.4.3 signature input; duplicated here so the test
/// checks the client's construction independently.
pub fn verify_message(context: &str, transcript_hash: &[u8]) -> Vec<u8> {
    let mut msg = vec![0x20; 64];
    msg.extend_from_slice(context.as_bytes());
    msg.push(0x00);
    msg.extend_from_slice(transcript_hash);
    msg
}

// ---------------------------------------------------------------------
// record layer mock

#[derive(Debug, PartialEq)]
pub enum Event {
    ReadKey(Vec<u8>),
    WriteKey(Vec<u8>),
    WriteReset,
    Alert(AlertLevel, AlertDescription),
    ChangeCipherSpec,
    Message(Vec<u8>),
    Flush,
}

#[derive(Default)]
pub struct MockRecords {
    pub inbound: VecDeque<InboundMessage>,
    pub events: Vec<Event>,
}

impl MockRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: InboundMessage) {
        self.inbound.push_back(msg);
    }

    pub fn alerts(&self) -> Vec<(AlertLevel, AlertDescription)> {
        self.events
            .iter()
            .filter_map(|ev| match ev {
                Event::Alert(level, desc) => Some((*level, *desc)),
                _ => None,
            })
            .collect()
    }

    /// Traffic secrets in installation order, tagged r/w.
    pub fn keys_installed(&self) -> Vec<(char, Vec<u8>)> {
        self.events
            .iter()
            .filter_map(|ev| match ev {
                Event::ReadKey(secret) => Some(('r', secret.clone())),
                Event::WriteKey(secret) => Some(('w', secret.clone())),
                _ => None,
            })
            .collect()
    }

    /// Encoded handshake messages queued for sending.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        self.events
            .iter()
            .filter_map(|ev| match ev {
                Event::Message(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    /// The types of the queued handshake messages.
    pub fn sent_types(&self) -> Vec<HandshakeType> {
        self.sent_messages()
            .iter()
            .map(|bytes| HandshakeType::from(bytes[0]))
            .collect()
    }
}

impl RecordLayer for MockRecords {
    fn get_message(&mut self) -> Option<InboundMessage> {
        self.inbound.front().cloned()
    }

    fn next_message(&mut self) {
        self.inbound.pop_front();
    }

    fn set_read_state(&mut self, keys: TrafficKeys) {
        self.events.push(Event::ReadKey(keys.secret.clone()));
    }

    fn set_write_state(&mut self, keys: TrafficKeys) {
        self.events.push(Event::WriteKey(keys.secret.clone()));
    }

    fn reset_write_state(&mut self) {
        self.events.push(Event::WriteReset);
    }

    fn add_alert(&mut self, level: AlertLevel, desc: AlertDescription) {
        self.events.push(Event::Alert(level, desc));
    }

    fn add_change_cipher_spec(&mut self) {
        self.events.push(Event::ChangeCipherSpec);
    }

    fn add_message(&mut self, payload: &[u8]) {
        self.events.push(Event::Message(payload.to_vec()));
    }

    fn flush(&mut self) {
        self.events.push(Event::Flush);
    }
}

// ---------------------------------------------------------------------
// verifier / credentials / rebuilder mocks

pub struct MockVerifier {
    pub outcomes: VecDeque<VerifyOutcome>,
    pub processed_chains: usize,
    pub verify_calls: usize,
}

impl MockVerifier {
    pub fn new() -> Self {
        Self {
            outcomes: VecDeque::new(),
            processed_chains: 0,
            verify_calls: 0,
        }
    }
}

impl PeerVerifier for MockVerifier {
    fn process_certificate(&mut self, chain: &CertificateChain) -> Result<(), Error> {
        assert!(!chain.is_empty());
        self.processed_chains += 1;
        Ok(())
    }

    fn verify_peer_cert(&mut self) -> VerifyOutcome {
        self.verify_calls += 1;
        self.outcomes
            .pop_front()
            .unwrap_or(VerifyOutcome::Valid)
    }

    fn verify_signature(
        &self,
        _scheme: SignatureScheme,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), Error> {
        match signature == fake_signature(SERVER_SIGNING_KEY, message) {
            true => Ok(()),
            false => Err(tls13_client::CertificateError::BadSignature.into()),
        }
    }
}

pub struct MockCredentials {
    pub select_script: VecDeque<SelectOutcome>,
    pub select_calls: usize,
    pub has_certificate: bool,
    pub chain: CertificateChain,
    pub pending_signs: usize,
}

impl MockCredentials {
    pub fn without_certificate() -> Self {
        Self {
            select_script: VecDeque::new(),
            select_calls: 0,
            has_certificate: false,
            chain: CertificateChain::default(),
            pending_signs: 0,
        }
    }

    pub fn with_certificate() -> Self {
        Self {
            has_certificate: true,
            chain: CertificateChain(vec![CertificateDer::from(
                b"client-certificate-der".to_vec(),
            )]),
            ..Self::without_certificate()
        }
    }
}

impl ClientCredentials for MockCredentials {
    fn select(&mut self, _request: &CertificateRequestDetails) -> SelectOutcome {
        self.select_calls += 1;
        self.select_script
            .pop_front()
            .unwrap_or(SelectOutcome::Ready)
    }

    fn has_certificate(&self) -> bool {
        self.has_certificate
    }

    fn certificate_chain(&self) -> CertificateChain {
        self.chain.clone()
    }

    fn sign(&mut self, message: &[u8]) -> SignOutcome {
        if self.pending_signs > 0 {
            self.pending_signs -= 1;
            return SignOutcome::Pending;
        }
        SignOutcome::Signature {
            scheme: SignatureScheme::ED25519,
            signature: fake_signature(CLIENT_SIGNING_KEY, message),
        }
    }
}

/// The bytes the rebuilder emits for given retry parameters; the test
/// server mirrors this to keep its transcript in sync.
pub fn second_hello_encoding(retry_group: Option<NamedGroup>, cookie: Option<&[u8]>) -> Vec<u8> {
    let mut body = b"second-client-hello".to_vec();
    if let Some(group) = retry_group {
        group.encode(&mut body);
    }
    if let Some(cookie) = cookie {
        PayloadU16::<tls13_client::msgs::base::MaybeEmpty>::new(cookie.to_vec()).encode(&mut body);
    }
    frame_message(HandshakeType::ClientHello, &body)
}

#[derive(Default)]
pub struct MockRebuilder {
    pub called_with: Option<(Option<NamedGroup>, Option<Vec<u8>>)>,
}

impl HelloRebuilder for MockRebuilder {
    fn second_client_hello(
        &mut self,
        retry_group: Option<NamedGroup>,
        cookie: Option<&[u8]>,
    ) -> Result<SecondClientHello, Error> {
        self.called_with = Some((retry_group, cookie.map(<[u8]>::to_vec)));
        Ok(SecondClientHello {
            encoding: second_hello_encoding(retry_group, cookie),
            key_share: retry_group.map(|group| {
                Box::new(TestActiveKx::new(group)) as Box<dyn ActiveKeyExchange>
            }),
        })
    }
}

// ---------------------------------------------------------------------
// application callbacks

#[derive(Default)]
pub struct CollectingStore {
    pub sessions: Mutex<Vec<TlsSession>>,
}

impl SessionStore for CollectingStore {
    fn store_session(&self, session: TlsSession) -> bool {
        self.sessions.lock().unwrap().push(session);
        true
    }
}

#[derive(Default)]
pub struct CollectingListener {
    pub states: Mutex<Vec<ClientState>>,
}

impl StateListener for CollectingListener {
    fn on_state_change(&self, state: ClientState) {
        self.states.lock().unwrap().push(state);
    }
}

pub struct TestChannelId {
    /// How many lookups report "key not ready yet" before succeeding.
    pub pending: Mutex<usize>,
}

impl ChannelIdProvider for TestChannelId {
    fn assert_identity(&self, transcript_hash: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let mut pending = self.pending.lock().unwrap();
        if *pending > 0 {
            *pending -= 1;
            return Ok(None);
        }
        Ok(Some(fake_signature(b"channel-id-key", transcript_hash)))
    }
}

// ---------------------------------------------------------------------
// the mirror server

pub const CLIENT_HELLO_ONE: &[u8] = b"client-hello-one";

pub fn client_hello_one() -> Vec<u8> {
    frame_message(HandshakeType::ClientHello, CLIENT_HELLO_ONE)
}

/// The test's model of the server: it emits handshake messages and
/// mirrors the transcript and key schedule so it can compute the same
/// secrets the client must install.
pub struct TestServer {
    pub compat: bool,
    transcript: Vec<u8>,
    schedule: Option<KeySchedule>,
    pub client_hs_secret: Vec<u8>,
    pub server_hs_secret: Vec<u8>,
    pub client_app_secret: Vec<u8>,
    pub server_app_secret: Vec<u8>,
}

impl TestServer {
    pub fn new() -> Self {
        Self {
            compat: false,
            transcript: client_hello_one(),
            schedule: None,
            client_hs_secret: Vec::new(),
            server_hs_secret: Vec::new(),
            client_app_secret: Vec::new(),
            server_app_secret: Vec::new(),
        }
    }

    fn hash(&self) -> Vec<u8> {
        TEST_HASH
            .compute(&self.transcript)
            .as_ref()
            .to_vec()
    }

    /// The mirror's current transcript hash.
    pub fn transcript_hash(&self) -> Vec<u8> {
        self.hash()
    }

    fn track(&mut self, msg: &InboundMessage) {
        self.transcript.extend_from_slice(&msg.encoding());
    }

    /// Also track a message the client sent (from the mock's event log).
    pub fn track_sent(&mut self, encoding: &[u8]) {
        self.transcript.extend_from_slice(encoding);
    }

    pub fn hello_retry_request(
        &mut self,
        key_share: Option<NamedGroup>,
        cookie: Option<&[u8]>,
    ) -> InboundMessage {
        let hrr = HelloRetryRequestPayload {
            server_version: ProtocolVersion::TLSv1_3,
            key_share,
            cookie: cookie.map(|value| PayloadU16::new(value.to_vec())),
        };
        let msg = InboundMessage {
            typ: HandshakeType::HelloRetryRequest,
            payload: hrr.encoded(),
        };

        // RFC 8446 4.4.1: collapse ClientHello1 into message_hash
        let first_hello_hash = TEST_HASH.compute(&self.transcript);
        self.transcript = build_message_hash(first_hello_hash.as_ref());
        self.track(&msg);

        // ...followed by the second ClientHello the rebuilder will emit
        self.transcript
            .extend_from_slice(&second_hello_encoding(key_share, cookie));
        msg
    }

    /// A well-formed ServerHello for this connection, before any
    /// per-test adjustments.
    pub fn default_server_hello(&self, psk: Option<&[u8]>) -> ServerHelloPayload {
        ServerHelloPayload {
            legacy_version: match self.compat {
                true => ProtocolVersion::TLSv1_2,
                false => ProtocolVersion::TLSv1_3,
            },
            random: [0x42; 32],
            session_id: match self.compat {
                true => Some(PayloadU8::new(vec![0x11; 32])),
                false => None,
            },
            cipher_suite: TEST_SUITE.suite,
            key_share: Some(ServerKeyShare {
                group: NamedGroup::X25519,
                payload: PayloadU16::new(SERVER_KX_PUB.to_vec()),
            }),
            pre_shared_key: psk.map(|_| 0),
            supported_versions: None,
        }
    }

    /// Build the ServerHello and run the mirror schedule up to the
    /// handshake-traffic secrets.
    pub fn server_hello(&mut self, psk: Option<&[u8]>) -> InboundMessage {
        let sh = self.default_server_hello(psk);
        self.server_hello_raw(sh, psk)
    }

    /// Like [`TestServer::server_hello`] but with full control over the
    /// payload.
    pub fn server_hello_raw(
        &mut self,
        sh: ServerHelloPayload,
        psk: Option<&[u8]>,
    ) -> InboundMessage {
        let mut payload = Vec::new();
        sh.encode_with(&mut payload, self.compat);
        let msg = InboundMessage {
            typ: HandshakeType::ServerHello,
            payload,
        };
        self.track(&msg);

        let first_input = match psk {
            Some(psk) => psk.to_vec(),
            None => vec![0u8; 32],
        };
        let mut schedule = KeySchedule::new(&TEST_SUITE, &first_input);
        schedule.input_secret(&ecdhe_shared_secret(CLIENT_KX_PUB, SERVER_KX_PUB));

        let hash = self.hash();
        self.client_hs_secret = schedule.derive(SecretKind::ClientHandshakeTrafficSecret, &hash);
        self.server_hs_secret = schedule.derive(SecretKind::ServerHandshakeTrafficSecret, &hash);
        self.schedule = Some(schedule);
        msg
    }

    pub fn encrypted_extensions(&mut self, ee: EncryptedExtensionsPayload) -> InboundMessage {
        let mut payload = Vec::new();
        ee.encode(&mut payload);
        let msg = InboundMessage {
            typ: HandshakeType::EncryptedExtensions,
            payload,
        };
        self.track(&msg);
        msg
    }

    pub fn certificate_request(&mut self) -> InboundMessage {
        let request = CertificateRequestPayload {
            sigschemes: vec![SignatureScheme::ECDSA_NISTP256_SHA256],
            ca_names: vec![DistinguishedName(b"test-ca".to_vec())],
        };
        let msg = InboundMessage {
            typ: HandshakeType::CertificateRequest,
            payload: request.encoded(),
        };
        self.track(&msg);
        msg
    }

    pub fn certificate(&mut self, cert_der: &[u8]) -> InboundMessage {
        let payload = CertificatePayload {
            context: PayloadU8::empty(),
            chain: CertificateChain(vec![CertificateDer::from(cert_der.to_vec())]),
        };
        let msg = InboundMessage {
            typ: HandshakeType::Certificate,
            payload: payload.encoded(),
        };
        self.track(&msg);
        msg
    }

    pub fn certificate_verify(&mut self) -> InboundMessage {
        let message = verify_message("TLS 1.3, server CertificateVerify", &self.hash());
        let verify = CertificateVerifyPayload {
            scheme: SignatureScheme::ECDSA_NISTP256_SHA256,
            signature: PayloadU16::new(fake_signature(SERVER_SIGNING_KEY, &message)),
        };
        let msg = InboundMessage {
            typ: HandshakeType::CertificateVerify,
            payload: verify.encoded(),
        };
        self.track(&msg);
        msg
    }

    /// The server Finished; afterwards the mirror advances to the master
    /// secret and derives the application traffic secrets.
    pub fn finished(&mut self) -> InboundMessage {
        let hash = self.hash();
        let tag = self
            .schedule
            .as_ref()
            .unwrap()
            .sign_finished(&self.server_hs_secret, &hash);
        let msg = InboundMessage {
            typ: HandshakeType::Finished,
            payload: tag.as_ref().to_vec(),
        };
        self.track(&msg);

        self.schedule.as_mut().unwrap().input_empty();
        let hash = self.hash();
        let schedule = self.schedule.as_ref().unwrap();
        self.server_app_secret = schedule.derive(SecretKind::ServerApplicationTrafficSecret, &hash);
        self.client_app_secret = schedule.derive(SecretKind::ClientApplicationTrafficSecret, &hash);
        msg
    }

    /// What the client's Finished must contain, given everything it sent
    /// after the server Finished (from the mock's event log).
    pub fn expected_client_finished(&self) -> Vec<u8> {
        self.schedule
            .as_ref()
            .unwrap()
            .sign_finished(&self.client_hs_secret, &self.hash())
            .as_ref()
            .to_vec()
    }

    /// The resumption secret over the mirrored transcript; track the
    /// client's Finished first.
    pub fn resumption_master_secret(&self) -> Vec<u8> {
        self.schedule
            .as_ref()
            .unwrap()
            .derive(SecretKind::ResumptionMasterSecret, &self.hash())
    }
}

// ---------------------------------------------------------------------
// fixtures

pub fn test_config() -> ClientConfig {
    ClientConfig::new(
        vec![&TEST_SUITE],
        vec![NamedGroup::X25519, NamedGroup::secp384r1],
    )
}

pub fn offered_hello() -> tls13_client::OfferedHello {
    tls13_client::OfferedHello {
        encoding: client_hello_one(),
        key_share: TestKxGroup(NamedGroup::X25519).start().unwrap(),
        session: None,
        early_data: false,
        early_session: None,
    }
}

pub fn resumable_session(now: u64) -> TlsSession {
    let mut session = TlsSession::new(ProtocolVersion::TLSv1_3, Vec::new(), now);
    session.suite = Some(&TEST_SUITE);
    session.master_secret = b"resumption-psk-resumption-psk-ab".to_vec();
    session.alpn_protocol = Some(b"h2".to_vec());
    session.ticket = b"a-ticket".to_vec();
    session.timeout = 600;
    session.not_resumable = false;
    session
}

pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .try_init();
}

/// Bundles the mocks so each `advance` call can re-borrow them.
pub struct Env {
    pub records: MockRecords,
    pub verifier: MockVerifier,
    pub credentials: MockCredentials,
    pub rebuilder: MockRebuilder,
}

impl Env {
    pub fn new() -> Self {
        Self {
            records: MockRecords::new(),
            verifier: MockVerifier::new(),
            credentials: MockCredentials::without_certificate(),
            rebuilder: MockRebuilder::default(),
        }
    }

    pub fn advance(
        &mut self,
        hs: &mut tls13_client::ClientHandshake,
    ) -> Result<tls13_client::Status, Error> {
        let mut cx = tls13_client::ClientContext {
            records: &mut self.records,
            verifier: &mut self.verifier,
            credentials: &mut self.credentials,
            rebuilder: &mut self.rebuilder,
        };
        hs.advance(&mut cx)
    }
}
