use zeroize::Zeroize;

use crate::crypto::Digest;
use crate::suites::Tls13CipherSuite;

/// The kinds of secret we can extract from `KeySchedule`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SecretKind {
    ClientHandshakeTrafficSecret,
    ServerHandshakeTrafficSecret,
    ClientApplicationTrafficSecret,
    ServerApplicationTrafficSecret,
    ResumptionMasterSecret,
    DerivedSecret,
}

impl SecretKind {
    fn to_bytes(self) -> &'static [u8] {
        use self::SecretKind::*;
        match self {
            ClientHandshakeTrafficSecret => b"c hs traffic",
            ServerHandshakeTrafficSecret => b"s hs traffic",
            ClientApplicationTrafficSecret => b"c ap traffic",
            ServerApplicationTrafficSecret => b"s ap traffic",
            ResumptionMasterSecret => b"res master",
            DerivedSecret => b"derived",
        }
    }
}

/// This is the TLS 1.3 key schedule.  It stores the current secret,
/// `hash_len` bytes long, and advances it through the three mandated
/// Extract stages: early (PSK or zeroes), handshake (ECDHE) and master
/// (zeroes).  Traffic secrets are derived off the current stage before
/// the next Extract.
pub struct KeySchedule {
    suite: &'static Tls13CipherSuite,
    current: Vec<u8>,
}

impl KeySchedule {
    /// Begin the schedule with the first Extract stage.
    ///
    /// `first_input` is the PSK when resuming, or `hash_len` zeroes
    /// otherwise.
    pub fn new(suite: &'static Tls13CipherSuite, first_input: &[u8]) -> Self {
        let zeroes = vec![0u8; suite.hash_len()];
        let mut schedule = Self {
            suite,
            current: zeroes,
        };
        schedule.current = schedule.hkdf_extract(first_input);
        schedule
    }

    /// Advance to the next Extract stage, mixing in `input`.
    pub fn input_secret(&mut self, input: &[u8]) {
        let empty_hash = self
            .suite
            .hash_provider
            .compute(&[]);
        let mut salt = self.derive(SecretKind::DerivedSecret, empty_hash.as_ref());
        std::mem::swap(&mut self.current, &mut salt);
        salt.zeroize();
        self.current = self.hkdf_extract(input);
    }

    /// Advance to the next Extract stage with an all-zeroes input.
    pub fn input_empty(&mut self) {
        let zeroes = vec![0u8; self.suite.hash_len()];
        self.input_secret(&zeroes);
    }

    /// `Derive-Secret(current, kind, handshake_hash)`.
    pub fn derive(&self, kind: SecretKind, hs_hash: &[u8]) -> Vec<u8> {
        self.expand_label(&self.current, kind.to_bytes(), hs_hash, self.suite.hash_len())
    }

    /// Calculate the Finished verify_data for `base_secret`, over the
    /// given transcript hash.
    pub fn sign_finished(&self, base_secret: &[u8], hs_hash: &[u8]) -> Digest {
        let mut finished_key =
            self.expand_label(base_secret, b"finished", &[], self.suite.hash_len());
        let tag = self
            .suite
            .hmac_provider
            .with_key(&finished_key)
            .mac(&[hs_hash]);
        finished_key.zeroize();
        tag
    }

    /// `HKDF-Extract(salt = current, ikm = input)`.
    fn hkdf_extract(&self, input: &[u8]) -> Vec<u8> {
        self.suite
            .hmac_provider
            .with_key(&self.current)
            .mac(&[input])
            .into_vec()
    }

    /// `HKDF-Expand-Label(secret, label, context, len)` per RFC 8446
    /// section 7.1.
    fn expand_label(&self, secret: &[u8], label: &[u8], context: &[u8], len: usize) -> Vec<u8> {
        const LABEL_PREFIX: &[u8] = b"tls13 ";

        let mut info =
            Vec::with_capacity(2 + 1 + LABEL_PREFIX.len() + label.len() + 1 + context.len());
        info.extend((len as u16).to_be_bytes());
        info.push((LABEL_PREFIX.len() + label.len()) as u8);
        info.extend_from_slice(LABEL_PREFIX);
        info.extend_from_slice(label);
        info.push(context.len() as u8);
        info.extend_from_slice(context);

        let key = self.suite.hmac_provider.with_key(secret);
        let mut output = vec![0u8; len];
        let mut term = Vec::new();
        for (n, chunk) in output
            .chunks_mut(self.suite.hash_len())
            .enumerate()
        {
            term = key
                .mac(&[&term, &info, &[(n + 1) as u8]])
                .into_vec();
            chunk.copy_from_slice(&term[..chunk.len()]);
        }
        output
    }
}

impl Drop for KeySchedule {
    fn drop(&mut self) {
        self.current.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::crypto::{Hash, HashContext, Hmac, MacKey};
    use crate::msgs::enums::{CipherSuite, HashAlgorithm};

    /// Records every HMAC invocation so the HKDF plumbing can be checked.
    struct RecordingHmac;

    thread_local! {
        static CALLS: RefCell<Vec<(Vec<u8>, Vec<u8>)>> = RefCell::new(Vec::new());
    }

    impl Hmac for RecordingHmac {
        fn with_key(&self, key: &[u8]) -> Box<dyn MacKey> {
            Box::new(RecordingKey(key.to_vec()))
        }
    }

    struct RecordingKey(Vec<u8>);

    impl MacKey for RecordingKey {
        fn mac(&self, parts: &[&[u8]]) -> Digest {
            let mut data = Vec::new();
            for part in parts {
                data.extend_from_slice(part);
            }
            CALLS.with(|calls| {
                calls
                    .borrow_mut()
                    .push((self.0.clone(), data.clone()))
            });

            // cheap but input-sensitive tag
            let mut state = [0u8; 8];
            for (i, b) in self
                .0
                .iter()
                .chain(data.iter())
                .enumerate()
            {
                state[i % 8] = state[i % 8]
                    .wrapping_mul(31)
                    .wrapping_add(*b);
            }
            Digest::from(state.to_vec())
        }
    }

    struct NullHash;

    impl Hash for NullHash {
        fn algorithm(&self) -> HashAlgorithm {
            HashAlgorithm::NONE
        }

        fn output_len(&self) -> usize {
            8
        }

        fn start(&self) -> Box<dyn HashContext> {
            unimplemented!("not used by these tests")
        }

        fn compute(&self, _data: &[u8]) -> Digest {
            Digest::from(vec![0u8; 8])
        }
    }

    static SUITE: Tls13CipherSuite = Tls13CipherSuite {
        suite: CipherSuite::TLS13_AES_128_GCM_SHA256,
        hash_provider: &NullHash,
        hmac_provider: &RecordingHmac,
    };

    #[test]
    fn expand_label_info_encoding() {
        CALLS.with(|calls| calls.borrow_mut().clear());
        let schedule = KeySchedule::new(&SUITE, &[0u8; 8]);
        let _secret = schedule.derive(SecretKind::ServerHandshakeTrafficSecret, b"hash-val");

        let calls = CALLS.with(|calls| calls.borrow().clone());
        let (_key, data) = calls.last().unwrap();

        // T(1) = HMAC(prk, info || 0x01): check the embedded HkdfLabel
        let mut expected = Vec::new();
        expected.extend(8u16.to_be_bytes());
        expected.push((6 + b"s hs traffic".len()) as u8);
        expected.extend_from_slice(b"tls13 s hs traffic");
        expected.push(8);
        expected.extend_from_slice(b"hash-val");
        expected.push(0x01);
        assert_eq!(data, &expected);
    }

    #[test]
    fn extract_stages_chain_through_derived_secret() {
        CALLS.with(|calls| calls.borrow_mut().clear());
        let mut schedule = KeySchedule::new(&SUITE, &[0u8; 8]);
        let early = schedule.current.clone();
        schedule.input_secret(b"ecdhered");
        assert_ne!(schedule.current, early);

        let calls = CALLS.with(|calls| calls.borrow().clone());
        // extract, derive (one expand block), extract
        assert_eq!(calls.len(), 3);
        // the final Extract keys off the "derived" secret, not the early one
        assert_ne!(calls[2].0, early);
        assert_eq!(calls[2].1, b"ecdhered");
    }
}
