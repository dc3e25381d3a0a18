use crate::client::hs::{fatal, require_message, ClientContext, ClientState, Status};
use crate::client::{ClientConfig, ClientHandshake};
use crate::error::{ApiMisuse, Error, PeerMisbehaved};
use crate::key_schedule::{KeySchedule, SecretKind};
use crate::log::{debug, trace};
use crate::msgs::base::{PayloadU16, PayloadU8};
use crate::msgs::codec::{Codec, Reader};
use crate::msgs::enums::{AlertDescription, AlertLevel, CipherSuite, HandshakeType};
use crate::msgs::handshake::{
    frame_message, CertificateChain, CertificatePayload, CertificateRequestPayload,
    CertificateVerifyPayload, EncryptedExtensionsPayload, HelloRetryRequestPayload,
    NewSessionTicketPayload, ServerHelloPayload,
};
use crate::record_layer::{InboundMessage, RecordLayer, TrafficKeys};
use crate::session::TlsSession;
use crate::sign::{CertificateRequestDetails, SelectOutcome, SignOutcome};
use crate::suites::Tls13CipherSuite;
use crate::verify::{
    construct_client_verify_message, construct_server_verify_message, VerifyOutcome,
};

use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// `Ok(None)` re-enters the dispatch loop; `Ok(Some(_))` suspends.
type Outcome = Result<Option<Status>, Error>;

impl ClientHandshake {
    fn selected_suite(&self) -> Result<&'static Tls13CipherSuite, Error> {
        self.suite
            .ok_or_else(|| Error::General("cipher suite not yet selected".to_string()))
    }

    fn schedule(&self) -> Result<&KeySchedule, Error> {
        self.key_schedule
            .as_ref()
            .ok_or_else(|| Error::General("key schedule not yet running".to_string()))
    }

    fn session_mut(&mut self) -> Result<&mut TlsSession, Error> {
        self.new_session
            .as_mut()
            .ok_or_else(|| Error::General("no session in progress".to_string()))
    }

    fn traffic_keys(&self, secret: &[u8]) -> Result<TrafficKeys, Error> {
        Ok(TrafficKeys {
            suite: self.selected_suite()?,
            secret: secret.to_vec(),
        })
    }

    /// Queue an encoded handshake message and record it in the
    /// transcript.
    fn emit(&mut self, records: &mut dyn RecordLayer, typ: HandshakeType, body: &[u8]) {
        let encoded = frame_message(typ, body);
        self.transcript.add_raw(&encoded);
        records.add_message(&encoded);
    }

    pub(super) fn do_read_hello_retry_request(&mut self, cx: &mut ClientContext<'_>) -> Outcome {
        let msg = match cx.records.get_message() {
            Some(msg) => msg,
            None => return Ok(Some(Status::ReadMessage)),
        };
        if msg.typ != HandshakeType::HelloRetryRequest {
            self.state = ClientState::ReadServerHello;
            return Ok(None);
        }

        let mut rd = Reader::new(&msg.payload);
        let hrr = HelloRetryRequestPayload::read(&mut rd)
            .and_then(|hrr| {
                rd.expect_empty("HelloRetryRequest")?;
                Ok(hrr)
            })
            .map_err(|err| fatal(cx.records, err.into(), err))?;

        if let Some(cookie) = hrr.cookie {
            self.cookie = Some(cookie.0);
        }

        if let Some(group) = hrr.key_share {
            // The group must be supported.
            if !self.config.supported_groups.contains(&group) {
                return Err(fatal(
                    cx.records,
                    AlertDescription::IllegalParameter,
                    PeerMisbehaved::IllegalHelloRetryRequestWithUnsupportedGroup,
                ));
            }

            // The server may not request the key share that was provided
            // in the initial ClientHello.
            if self
                .key_share
                .as_ref()
                .map(|share| share.group())
                == Some(group)
            {
                return Err(fatal(
                    cx.records,
                    AlertDescription::IllegalParameter,
                    PeerMisbehaved::IllegalHelloRetryRequestWithOfferedGroup,
                ));
            }

            self.key_share = None;
            self.retry_group = Some(group);
        }

        debug!("got HelloRetryRequest, retry group {:?}", self.retry_group);

        self.transcript.set_retry_point();
        self.transcript.add_message(&msg);
        cx.records.next_message();
        self.received_hello_retry_request = true;
        self.state = ClientState::SendSecondClientHello;

        // 0-RTT is rejected if we receive a HelloRetryRequest.
        if self.in_early_data {
            self.in_early_data = false;
            self.can_early_write = false;
            return Ok(Some(Status::EarlyDataRejected));
        }
        Ok(None)
    }

    pub(super) fn do_send_second_client_hello(&mut self, cx: &mut ClientContext<'_>) -> Outcome {
        // Restore the null cipher.  We may have switched due to 0-RTT.
        cx.records.reset_write_state();

        let second = cx
            .rebuilder
            .second_client_hello(self.retry_group, self.cookie.as_deref())?;
        if let Some(key_share) = second.key_share {
            self.key_share = Some(key_share);
        }

        self.transcript.add_raw(&second.encoding);
        cx.records.add_message(&second.encoding);
        cx.records.flush();

        self.state = ClientState::ReadServerHello;
        Ok(Some(Status::Flush))
    }

    pub(super) fn do_read_server_hello(&mut self, cx: &mut ClientContext<'_>) -> Outcome {
        let msg = match cx.records.get_message() {
            Some(msg) => msg,
            None => return Ok(Some(Status::ReadMessage)),
        };
        require_message(cx.records, &msg, HandshakeType::ServerHello)?;

        let config = self.config.clone();
        let mut rd = Reader::new(&msg.payload);
        let sh = ServerHelloPayload::read_with(&mut rd, config.middlebox_compat)
            .and_then(|sh| {
                rd.expect_empty("ServerHello")?;
                Ok(sh)
            })
            .map_err(|err| fatal(cx.records, err.into(), err))?;

        if sh.legacy_version != config.expected_legacy_version() {
            return Err(fatal(
                cx.records,
                AlertDescription::DecodeError,
                PeerMisbehaved::IncorrectLegacyVersion,
            ));
        }
        self.server_random = sh.random;

        let suite = match sh.cipher_suite {
            CipherSuite::Unknown(_) => {
                return Err(fatal(
                    cx.records,
                    AlertDescription::IllegalParameter,
                    PeerMisbehaved::SelectedUnknownCipherSuite,
                ));
            }
            suite => config.find_suite(suite).ok_or_else(|| {
                fatal(
                    cx.records,
                    AlertDescription::IllegalParameter,
                    PeerMisbehaved::SelectedIncompatibleCipherSuite,
                )
            })?,
        };

        // supported_versions is used to select the pre-standard code
        // point before the state machine is entered; outside that
        // profile its appearance here is unexpected.
        if sh.supported_versions.is_some() && !config.middlebox_compat {
            return Err(fatal(
                cx.records,
                AlertDescription::UnsupportedExtension,
                PeerMisbehaved::UnsolicitedSupportedVersionsExtension,
            ));
        }

        let psk = match sh.pre_shared_key {
            Some(index) => {
                let offered = match self.offered_session.take() {
                    Some(offered) => offered,
                    None => {
                        return Err(fatal(
                            cx.records,
                            AlertDescription::UnsupportedExtension,
                            PeerMisbehaved::UnsolicitedPreSharedKeyExtension,
                        ));
                    }
                };

                if index != 0 {
                    return Err(fatal(
                        cx.records,
                        AlertDescription::IllegalParameter,
                        PeerMisbehaved::SelectedInvalidPsk,
                    ));
                }

                if offered.version != config.version {
                    return Err(fatal(
                        cx.records,
                        AlertDescription::IllegalParameter,
                        PeerMisbehaved::ResumptionWithVariedVersion,
                    ));
                }

                let prf_matches = offered
                    .suite
                    .map(|offered_suite| offered_suite.can_resume_from(suite))
                    .unwrap_or(false);
                if !prf_matches {
                    return Err(fatal(
                        cx.records,
                        AlertDescription::IllegalParameter,
                        PeerMisbehaved::ResumptionWithVariedPrfHash,
                    ));
                }

                if !offered.is_context_valid(&config.session_id_context) {
                    // This is actually a client application bug.
                    return Err(fatal(
                        cx.records,
                        AlertDescription::IllegalParameter,
                        ApiMisuse::ResumedSessionInDifferentContext,
                    ));
                }

                debug!("resuming session");
                self.session_reused = true;

                // Only authentication information carries over in TLS 1.3.
                let mut new_session = offered.dup_auth_only();

                // Resumption incorporates fresh key material, so refresh
                // the timeout.
                new_session.renew_timeout(config.psk_dhe_timeout);
                self.new_session = Some(new_session);

                Zeroizing::new(offered.master_secret.clone())
            }
            None => {
                debug!("not resuming");
                self.offered_session = None;
                let mut fresh = TlsSession::new(
                    config.version,
                    config.session_id_context.clone(),
                    self.time_base,
                );
                fresh.timeout = config.psk_dhe_timeout;
                self.new_session = Some(fresh);

                // the first key schedule stage absorbs zeroes instead
                Zeroizing::new(vec![0u8; suite.hash_len()])
            }
        };

        self.suite = Some(suite);
        self.session_mut()?.suite = Some(suite);

        // The PRF hash is now known.  Set up the transcript and key
        // schedule, incorporating the PSK (or zeroes) as the first stage.
        self.transcript.start_hash(suite.hash_provider);
        let mut key_schedule = KeySchedule::new(suite, &psk);

        // We do not support psk_ke and thus always require a key share.
        let their_share = sh.key_share.ok_or_else(|| {
            fatal(
                cx.records,
                AlertDescription::MissingExtension,
                PeerMisbehaved::MissingKeyShare,
            )
        })?;

        let our_share = self
            .key_share
            .take()
            .ok_or_else(|| Error::General("key share already consumed".to_string()))?;
        if their_share.group != our_share.group() {
            return Err(fatal(
                cx.records,
                AlertDescription::IllegalParameter,
                PeerMisbehaved::WrongGroupForKeyShare,
            ));
        }

        // Resolve ECDHE and incorporate it into the secret; the shared
        // secret is wiped as soon as it has been absorbed.
        let shared = our_share
            .complete(their_share.payload.as_ref())
            .map_err(|err| fatal(cx.records, AlertDescription::IllegalParameter, err))?;
        key_schedule.input_secret(shared.secret_bytes());
        drop(shared);

        self.transcript.add_message(&msg);
        let hs_hash = self.transcript.current_hash();
        self.client_handshake_secret =
            key_schedule.derive(SecretKind::ClientHandshakeTrafficSecret, hs_hash.as_ref());
        self.server_handshake_secret =
            key_schedule.derive(SecretKind::ServerHandshakeTrafficSecret, hs_hash.as_ref());
        self.key_schedule = Some(key_schedule);

        cx.records.next_message();
        self.state = ClientState::ProcessChangeCipherSpec;
        match config.middlebox_compat {
            true => Ok(Some(Status::ReadChangeCipherSpec)),
            false => Ok(None),
        }
    }

    pub(super) fn do_process_change_cipher_spec(&mut self, cx: &mut ClientContext<'_>) -> Outcome {
        let keys = self.traffic_keys(&self.server_handshake_secret)?;
        cx.records.set_read_state(keys);
        trace!("installed server handshake traffic key");

        if !self.early_data_offered {
            // If not sending early data, set client traffic keys now so
            // that subsequent alerts are encrypted.
            if self.config.middlebox_compat {
                cx.records.add_change_cipher_spec();
            }
            let keys = self.traffic_keys(&self.client_handshake_secret)?;
            cx.records.set_write_state(keys);
        }

        self.state = ClientState::ReadEncryptedExtensions;
        Ok(None)
    }

    pub(super) fn do_read_encrypted_extensions(&mut self, cx: &mut ClientContext<'_>) -> Outcome {
        let msg = match cx.records.get_message() {
            Some(msg) => msg,
            None => return Ok(Some(Status::ReadMessage)),
        };
        require_message(cx.records, &msg, HandshakeType::EncryptedExtensions)?;

        let mut rd = Reader::new(&msg.payload);
        let ee = EncryptedExtensionsPayload::read_with(&mut rd, &self.config.custom_extensions)
            .and_then(|ee| {
                rd.expect_empty("EncryptedExtensions")
                    .map_err(Error::from)?;
                Ok(ee)
            })
            .map_err(|err| {
                let desc = match &err {
                    Error::InvalidMessage(inner) => AlertDescription::from(*inner),
                    _ => AlertDescription::UnsupportedExtension,
                };
                fatal(cx.records, desc, err)
            })?;

        if ee.channel_id && self.config.channel_id.is_some() {
            self.channel_id_valid = true;
        }
        if ee.received_custom {
            self.received_custom_extension = true;
        }
        if ee.early_data && self.early_data_offered {
            self.early_data_accepted = true;
        }

        // Store the negotiated ALPN in the session.
        if let Some(protocol) = ee.alpn_protocol {
            debug!("ALPN protocol is {:?}", protocol);
            self.alpn_selected = Some(protocol.clone());
            self.session_mut()?.alpn_protocol = Some(protocol);
        }

        if self.early_data_accepted {
            // Early data committed to the offered session's parameters;
            // the server may not vary them and keep our early data.
            let early_suite = self
                .early_session
                .as_ref()
                .and_then(|early| early.suite.map(|suite| suite.suite));
            if early_suite != self.suite.map(|suite| suite.suite) {
                return Err(PeerMisbehaved::EarlyDataOfferedWithVariedCipherSuite.into());
            }

            let early_alpn = self
                .early_session
                .as_ref()
                .and_then(|early| early.alpn_protocol.as_deref())
                .unwrap_or(&[]);
            if early_alpn != self.alpn_selected.as_deref().unwrap_or(&[]) {
                return Err(PeerMisbehaved::EarlyDataOfferedWithVariedAlpn.into());
            }

            if self.channel_id_valid || self.received_custom_extension {
                return Err(PeerMisbehaved::EarlyDataAcceptedWithUnexpectedExtension.into());
            }
        }

        self.transcript.add_message(&msg);
        cx.records.next_message();
        self.state = ClientState::ReadCertificateRequest;

        if self.in_early_data && !self.early_data_accepted {
            self.in_early_data = false;
            self.can_early_write = false;
            return Ok(Some(Status::EarlyDataRejected));
        }
        Ok(None)
    }

    pub(super) fn do_read_certificate_request(&mut self, cx: &mut ClientContext<'_>) -> Outcome {
        // CertificateRequest may only be sent in non-resumption
        // handshakes.
        if self.session_reused {
            self.state = ClientState::ReadServerFinished;
            return Ok(None);
        }

        let msg = match cx.records.get_message() {
            Some(msg) => msg,
            None => return Ok(Some(Status::ReadMessage)),
        };

        // CertificateRequest is optional.
        if msg.typ != HandshakeType::CertificateRequest {
            self.state = ClientState::ReadServerCertificate;
            return Ok(None);
        }

        let mut rd = Reader::new(&msg.payload);
        let request = CertificateRequestPayload::read(&mut rd)
            .and_then(|request| {
                rd.expect_empty("CertificateRequest")?;
                Ok(request)
            })
            .map_err(|err| fatal(cx.records, err.into(), err))?;

        self.cert_request = Some(CertificateRequestDetails {
            sigschemes: request.sigschemes,
            ca_names: request.ca_names,
        });

        self.transcript.add_message(&msg);
        cx.records.next_message();
        self.state = ClientState::ReadServerCertificate;
        Ok(None)
    }

    pub(super) fn do_read_server_certificate(&mut self, cx: &mut ClientContext<'_>) -> Outcome {
        let msg = match cx.records.get_message() {
            Some(msg) => msg,
            None => return Ok(Some(Status::ReadMessage)),
        };
        require_message(cx.records, &msg, HandshakeType::Certificate)?;

        let mut rd = Reader::new(&msg.payload);
        let certificate = CertificatePayload::read(&mut rd)
            .and_then(|certificate| {
                rd.expect_empty("Certificate")?;
                Ok(certificate)
            })
            .map_err(|err| fatal(cx.records, err.into(), err))?;

        // The server must always authenticate at this point.
        if certificate.chain.is_empty() {
            return Err(fatal(
                cx.records,
                AlertDescription::CertificateRequired,
                PeerMisbehaved::NoCertificatesPresented,
            ));
        }

        cx.verifier
            .process_certificate(&certificate.chain)
            .map_err(|err| {
                let desc = cert_alert(&err);
                fatal(cx.records, desc, err)
            })?;
        self.session_mut()?.peer_certificates = certificate.chain.0.clone();

        self.transcript.add_message(&msg);
        cx.records.next_message();
        self.state = ClientState::ReadServerCertificateVerify;
        Ok(None)
    }

    pub(super) fn do_read_server_certificate_verify(
        &mut self,
        cx: &mut ClientContext<'_>,
    ) -> Outcome {
        let msg = match cx.records.get_message() {
            Some(msg) => msg,
            None => return Ok(Some(Status::ReadMessage)),
        };

        match cx.verifier.verify_peer_cert() {
            VerifyOutcome::Valid => {}
            VerifyOutcome::Invalid(err) => {
                let desc = cert_alert(&err);
                return Err(fatal(cx.records, desc, err));
            }
            VerifyOutcome::Pending => return Ok(Some(Status::CertificateVerify)),
        }

        require_message(cx.records, &msg, HandshakeType::CertificateVerify)?;

        let mut rd = Reader::new(&msg.payload);
        let verify = CertificateVerifyPayload::read(&mut rd)
            .and_then(|verify| {
                rd.expect_empty("CertificateVerify")?;
                Ok(verify)
            })
            .map_err(|err| fatal(cx.records, err.into(), err))?;

        let hs_hash = self.transcript.current_hash();
        let message = construct_server_verify_message(hs_hash.as_ref());
        cx.verifier
            .verify_signature(verify.scheme, &message, verify.signature.as_ref())
            .map_err(|err| fatal(cx.records, AlertDescription::DecryptError, err))?;

        self.transcript.add_message(&msg);
        cx.records.next_message();
        self.state = ClientState::ReadServerFinished;
        Ok(None)
    }

    pub(super) fn do_read_server_finished(&mut self, cx: &mut ClientContext<'_>) -> Outcome {
        let msg = match cx.records.get_message() {
            Some(msg) => msg,
            None => return Ok(Some(Status::ReadMessage)),
        };
        require_message(cx.records, &msg, HandshakeType::Finished)?;

        let hs_hash = self.transcript.current_hash();
        let expected = self
            .schedule()?
            .sign_finished(&self.server_handshake_secret, hs_hash.as_ref());
        if !bool::from(expected.as_ref().ct_eq(&msg.payload)) {
            return Err(fatal(
                cx.records,
                AlertDescription::DecryptError,
                PeerMisbehaved::IncorrectFinished,
            ));
        }
        trace!("server Finished verified");

        self.transcript.add_message(&msg);

        // Update the secret to the master secret and derive the
        // application traffic secrets.
        let schedule = self
            .key_schedule
            .as_mut()
            .ok_or_else(|| Error::General("key schedule not yet running".to_string()))?;
        schedule.input_empty();
        let hs_hash = self.transcript.current_hash();
        self.server_traffic_secret = schedule.derive(
            SecretKind::ServerApplicationTrafficSecret,
            hs_hash.as_ref(),
        );
        self.client_traffic_secret = schedule.derive(
            SecretKind::ClientApplicationTrafficSecret,
            hs_hash.as_ref(),
        );

        cx.records.next_message();
        self.state = ClientState::SendEndOfEarlyData;
        Ok(None)
    }

    pub(super) fn do_send_end_of_early_data(&mut self, cx: &mut ClientContext<'_>) -> Outcome {
        if self.early_data_accepted {
            self.can_early_write = false;
            cx.records
                .add_alert(AlertLevel::Warning, AlertDescription::EndOfEarlyData);
        }

        if self.early_data_offered {
            // Replace the early-data write key with the handshake one.
            if self.config.middlebox_compat {
                cx.records.add_change_cipher_spec();
            }
            let keys = self.traffic_keys(&self.client_handshake_secret)?;
            cx.records.set_write_state(keys);
        }

        self.state = ClientState::SendClientCertificate;
        Ok(None)
    }

    pub(super) fn do_send_client_certificate(&mut self, cx: &mut ClientContext<'_>) -> Outcome {
        // The peer didn't request a certificate.
        let request = match &self.cert_request {
            Some(request) => request,
            None => {
                self.state = ClientState::CompleteSecondFlight;
                return Ok(None);
            }
        };

        match cx.credentials.select(request) {
            SelectOutcome::Ready => {}
            SelectOutcome::Pending => return Ok(Some(Status::X509Lookup)),
            SelectOutcome::Abort => {
                return Err(fatal(
                    cx.records,
                    AlertDescription::InternalError,
                    Error::General("certificate selection failed".to_string()),
                ));
            }
        }

        let chain = match cx.credentials.has_certificate() {
            true => cx.credentials.certificate_chain(),
            false => CertificateChain::default(),
        };
        let certificate = CertificatePayload {
            context: PayloadU8::empty(),
            chain,
        };
        self.emit(
            cx.records,
            HandshakeType::Certificate,
            &certificate.encoded(),
        );

        self.state = ClientState::SendClientCertificateVerify;
        Ok(None)
    }

    pub(super) fn do_send_client_certificate_verify(
        &mut self,
        cx: &mut ClientContext<'_>,
    ) -> Outcome {
        // Don't send CertificateVerify if there is no certificate.
        if !cx.credentials.has_certificate() {
            self.state = ClientState::CompleteSecondFlight;
            return Ok(None);
        }

        let hs_hash = self.transcript.current_hash();
        let message = construct_client_verify_message(hs_hash.as_ref());
        match cx.credentials.sign(&message) {
            SignOutcome::Signature { scheme, signature } => {
                let verify = CertificateVerifyPayload {
                    scheme,
                    signature: PayloadU16::new(signature),
                };
                self.emit(
                    cx.records,
                    HandshakeType::CertificateVerify,
                    &verify.encoded(),
                );
                self.state = ClientState::CompleteSecondFlight;
                Ok(None)
            }
            SignOutcome::Pending => Ok(Some(Status::PrivateKeyOperation)),
            SignOutcome::Failure => Err(fatal(
                cx.records,
                AlertDescription::InternalError,
                Error::General("private key operation failed".to_string()),
            )),
        }
    }

    pub(super) fn do_complete_second_flight(&mut self, cx: &mut ClientContext<'_>) -> Outcome {
        // Send a Channel ID assertion if necessary.
        if self.channel_id_valid {
            let provider = self
                .config
                .channel_id
                .clone()
                .ok_or_else(|| Error::General("channel ID permitted but not offered".to_string()))?;

            let hs_hash = self.transcript.current_hash();
            match provider.assert_identity(hs_hash.as_ref())? {
                None => return Ok(Some(Status::ChannelIdLookup)),
                Some(body) => self.emit(cx.records, HandshakeType::ChannelId, &body),
            }
        }

        // Send the client Finished.
        let hs_hash = self.transcript.current_hash();
        let tag = self
            .schedule()?
            .sign_finished(&self.client_handshake_secret, hs_hash.as_ref());
        self.emit(cx.records, HandshakeType::Finished, tag.as_ref());

        // Derive the final keys and enable them.
        let keys = self.traffic_keys(&self.server_traffic_secret)?;
        cx.records.set_read_state(keys);
        let keys = self.traffic_keys(&self.client_traffic_secret)?;
        cx.records.set_write_state(keys);
        trace!("installed application traffic keys");

        // The resumption secret covers the whole handshake, client
        // Finished included.
        let hs_hash = self.transcript.current_hash();
        let resumption = self
            .schedule()?
            .derive(SecretKind::ResumptionMasterSecret, hs_hash.as_ref());
        self.session_mut()?.master_secret = resumption;
        self.established_session = self.new_session.take();

        cx.records.flush();
        self.state = ClientState::Done;
        Ok(Some(Status::Flush))
    }
}

fn cert_alert(err: &Error) -> AlertDescription {
    match err {
        Error::InvalidCertificate(inner) => AlertDescription::from(inner.clone()),
        _ => AlertDescription::BadCertificate,
    }
}

/// Ingest a NewSessionTicket received on an established connection.
///
/// A duplicate of the established session is rebased to `now`, filled
/// with the ticket fields and offered to the configured session store;
/// if the store declines (or none is configured) the duplicate is
/// dropped.
pub fn process_new_session_ticket(
    config: &ClientConfig,
    records: &mut dyn RecordLayer,
    established_session: &TlsSession,
    msg: &InboundMessage,
    now: u64,
) -> Result<(), Error> {
    require_message(records, msg, HandshakeType::NewSessionTicket)?;

    let mut session = established_session.clone();
    session.rebase_time(now);

    let mut rd = Reader::new(&msg.payload);
    let ticket = NewSessionTicketPayload::read(&mut rd)
        .and_then(|ticket| {
            rd.expect_empty("NewSessionTicket")?;
            Ok(ticket)
        })
        .map_err(|err| fatal(records, err.into(), err))?;

    // Cap the renewable lifetime by the server-advertised value.  This
    // avoids wasting bandwidth on 0-RTT when we know the server will
    // reject it.
    if session.timeout > ticket.lifetime {
        session.timeout = ticket.lifetime;
    }

    session.ticket_age_add = ticket.age_add;
    session.ticket = ticket.ticket.0;
    if config.enable_early_data {
        if let Some(max_early_data) = ticket.max_early_data {
            session.max_early_data_size = max_early_data;
        }
    }
    session.ticket_age_add_valid = true;
    session.not_resumable = false;

    debug!(
        "got NewSessionTicket, lifetime {}s, max early data {}",
        session.timeout, session.max_early_data_size
    );

    if let Some(store) = &config.session_store {
        if store.store_session(session) {
            trace!("session stored");
        }
    }

    Ok(())
}
