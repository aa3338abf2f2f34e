//! Cryptographic oracles (spec.md §2.2, §6): the USIG device and the
//! ordinary signing/verification backend. Both are external collaborators
//! specified only by contract — generalized here from the teacher's
//! concrete `Signer`/`Verifier` (`context/crypto.rs`) into traits so a
//! real `k256`/HMAC-backed implementation and a `Nop` test implementation
//! can both satisfy the core's needs.

use crate::message::{ReplicaId, Ui};

/// The trusted Unique Sequential Identifier Generator (spec.md §6).
///
/// `assign_ui` is invoked under the generated-message handler's UI
/// mutex (spec.md §4.9) so implementations need not be internally
/// synchronized for monotonicity; `verify_ui` must be safe to invoke
/// concurrently.
pub trait Usig: Send + Sync {
    /// Assigns a fresh UI to `authenticated_bytes`. Counters from the
    /// same USIG instance are strictly monotone with step +1.
    fn assign_ui(&self, authenticated_bytes: &[u8]) -> Result<Ui, crate::error::FatalError>;

    /// Verifies that `ui` attests `authenticated_bytes` as having been
    /// produced by replica `replica_id`'s USIG.
    fn verify_ui(&self, authenticated_bytes: &[u8], ui: &Ui, replica_id: ReplicaId) -> bool;
}

/// Ordinary signing/verification backend for `SignedMessage`s (spec.md §6).
pub trait SignatureScheme: Send + Sync {
    fn sign(&self, authenticated_bytes: &[u8]) -> crate::message::Signature;

    /// `index` is `None` for client signatures (verified against the
    /// client's own key), `Some(replica_id)` for replica signatures.
    fn verify(
        &self,
        authenticated_bytes: &[u8],
        signature: &crate::message::Signature,
        replica_id: Option<ReplicaId>,
    ) -> bool;
}

/// Test/reference oracles that perform no cryptography, mirroring the
/// teacher's `Verifier::Nop` (`context/crypto.rs`).
pub mod nop {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// A USIG stub whose counters are a process-local monotone sequence.
    /// Not a substitute for a trusted device; exists so the ordering
    /// engine can be exercised without a real USIG.
    #[derive(Debug, Default)]
    pub struct NopUsig {
        counter: AtomicU64,
    }

    impl NopUsig {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Usig for NopUsig {
        fn assign_ui(&self, authenticated_bytes: &[u8]) -> Result<Ui, crate::error::FatalError> {
            let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Ui {
                counter,
                attestation: authenticated_bytes.to_vec(),
            })
        }

        fn verify_ui(&self, authenticated_bytes: &[u8], ui: &Ui, _replica_id: ReplicaId) -> bool {
            ui.attestation == authenticated_bytes
        }
    }

    #[derive(Debug, Default)]
    pub struct NopSignatureScheme;

    impl SignatureScheme for NopSignatureScheme {
        fn sign(&self, authenticated_bytes: &[u8]) -> crate::message::Signature {
            crate::message::Signature(authenticated_bytes.to_vec())
        }

        fn verify(
            &self,
            authenticated_bytes: &[u8],
            signature: &crate::message::Signature,
            _replica_id: Option<ReplicaId>,
        ) -> bool {
            signature.0 == authenticated_bytes
        }
    }
}

/// ECDSA/HMAC-backed oracles, generalized from the teacher's concrete
/// `Signer`/`Verifier` (`context/crypto.rs`): `sign_public`/`Standard`
/// becomes `K256Usig`/`K256SignatureScheme`, `sign_private`/`Signature::Hmac`
/// becomes `HmacSignatureScheme`.
pub mod standard {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    use hmac::{Hmac, Mac};
    use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
    use k256::schnorr::signature::{DigestSigner, DigestVerifier};
    use k256::sha2::{Digest, Sha256};

    use super::*;

    fn digest(counter: u64, authenticated_bytes: &[u8]) -> Sha256 {
        let mut hasher = Sha256::new();
        hasher.update(counter.to_le_bytes());
        hasher.update(authenticated_bytes);
        hasher
    }

    /// USIG backed by a per-replica ECDSA key (spec.md §6): `assign_ui`
    /// signs `(counter, authenticated_bytes)` with the local signing key;
    /// `verify_ui` checks the attestation against the claimed signer's
    /// verifying key, mirroring the teacher's `Signer::sign_public`/
    /// `Verifier::Standard` path but keyed on the UI counter rather than a
    /// message's own digest.
    pub struct K256Usig {
        signing_key: SigningKey,
        verifying_keys: HashMap<ReplicaId, VerifyingKey>,
        counter: AtomicU64,
    }

    impl K256Usig {
        pub fn new(signing_key: SigningKey, verifying_keys: HashMap<ReplicaId, VerifyingKey>) -> Self {
            Self {
                signing_key,
                verifying_keys,
                counter: AtomicU64::new(0),
            }
        }
    }

    impl Usig for K256Usig {
        fn assign_ui(&self, authenticated_bytes: &[u8]) -> Result<Ui, crate::error::FatalError> {
            let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            let signature: EcdsaSignature = self.signing_key.sign_digest(digest(counter, authenticated_bytes));
            Ok(Ui {
                counter,
                attestation: signature.to_bytes().to_vec(),
            })
        }

        fn verify_ui(&self, authenticated_bytes: &[u8], ui: &Ui, replica_id: ReplicaId) -> bool {
            let Some(verifying_key) = self.verifying_keys.get(&replica_id) else {
                return false;
            };
            let Ok(signature) = EcdsaSignature::try_from(ui.attestation.as_slice()) else {
                return false;
            };
            verifying_key
                .verify_digest(digest(ui.counter, authenticated_bytes), &signature)
                .is_ok()
        }
    }

    /// Publicly verifiable signature scheme over ECDSA, for client
    /// `Request`s and any replica signature an outside observer must be
    /// able to check (spec.md §6), mirroring `Signer::sign_public`.
    pub struct K256SignatureScheme {
        signing_key: SigningKey,
        verifying_keys: HashMap<Option<ReplicaId>, VerifyingKey>,
    }

    impl K256SignatureScheme {
        pub fn new(signing_key: SigningKey, verifying_keys: HashMap<Option<ReplicaId>, VerifyingKey>) -> Self {
            Self {
                signing_key,
                verifying_keys,
            }
        }
    }

    impl SignatureScheme for K256SignatureScheme {
        fn sign(&self, authenticated_bytes: &[u8]) -> crate::message::Signature {
            let mut hasher = Sha256::new();
            hasher.update(authenticated_bytes);
            let signature: EcdsaSignature = self.signing_key.sign_digest(hasher);
            crate::message::Signature(signature.to_bytes().to_vec())
        }

        fn verify(
            &self,
            authenticated_bytes: &[u8],
            signature: &crate::message::Signature,
            replica_id: Option<ReplicaId>,
        ) -> bool {
            let Some(verifying_key) = self.verifying_keys.get(&replica_id) else {
                return false;
            };
            let Ok(signature) = EcdsaSignature::try_from(signature.0.as_slice()) else {
                return false;
            };
            let mut hasher = Sha256::new();
            hasher.update(authenticated_bytes);
            verifying_key.verify_digest(hasher, &signature).is_ok()
        }
    }

    /// Symmetric alternative to `K256SignatureScheme`, mirroring
    /// `Signer::sign_private`/`Signature::Hmac`: cheaper than ECDSA but
    /// verifiable only by holders of the shared key, so it only fits
    /// verification contexts where that's acceptable (e.g. a closed set
    /// of replicas sharing a provisioned key out of band).
    pub struct HmacSignatureScheme {
        key: Vec<u8>,
    }

    impl HmacSignatureScheme {
        pub fn new(key: Vec<u8>) -> Self {
            Self { key }
        }

        fn mac(&self, authenticated_bytes: &[u8]) -> Hmac<Sha256> {
            let mut mac = Hmac::<Sha256>::new_from_slice(&self.key).expect("HMAC accepts any key length");
            mac.update(authenticated_bytes);
            mac
        }
    }

    impl SignatureScheme for HmacSignatureScheme {
        fn sign(&self, authenticated_bytes: &[u8]) -> crate::message::Signature {
            crate::message::Signature(self.mac(authenticated_bytes).finalize().into_bytes().to_vec())
        }

        fn verify(
            &self,
            authenticated_bytes: &[u8],
            signature: &crate::message::Signature,
            _replica_id: Option<ReplicaId>,
        ) -> bool {
            self.mac(authenticated_bytes).verify_slice(&signature.0).is_ok()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn keypair() -> (SigningKey, VerifyingKey) {
            let signing_key = SigningKey::from_bytes(&[7u8; 32].into()).unwrap();
            let verifying_key = *signing_key.verifying_key();
            (signing_key, verifying_key)
        }

        #[test]
        fn k256_usig_counters_are_monotone_and_attestations_verify() {
            let (signing_key, verifying_key) = keypair();
            let mut verifying_keys = HashMap::new();
            verifying_keys.insert(0, verifying_key);
            let usig = K256Usig::new(signing_key, verifying_keys);

            let a = usig.assign_ui(b"m1").unwrap();
            let b = usig.assign_ui(b"m2").unwrap();
            assert_eq!((a.counter, b.counter), (1, 2));
            assert!(usig.verify_ui(b"m1", &a, 0));
            assert!(!usig.verify_ui(b"m1", &b, 0));
            assert!(!usig.verify_ui(b"tampered", &a, 0));
        }

        #[test]
        fn k256_signature_scheme_rejects_the_wrong_key() {
            let (signing_key, verifying_key) = keypair();
            let (_other_signing_key, other_verifying_key) = {
                let signing_key = SigningKey::from_bytes(&[9u8; 32].into()).unwrap();
                let verifying_key = *signing_key.verifying_key();
                (signing_key, verifying_key)
            };
            let mut verifying_keys = HashMap::new();
            verifying_keys.insert(None, verifying_key);
            verifying_keys.insert(Some(0), other_verifying_key);
            let scheme = K256SignatureScheme::new(signing_key, verifying_keys);

            let signature = scheme.sign(b"payload");
            assert!(scheme.verify(b"payload", &signature, None));
            assert!(!scheme.verify(b"payload", &signature, Some(0)));
        }

        #[test]
        fn hmac_signature_scheme_round_trips_and_rejects_tampering() {
            let scheme = HmacSignatureScheme::new(b"shared-secret".to_vec());
            let signature = scheme.sign(b"payload");
            assert!(scheme.verify(b"payload", &signature, None));
            assert!(!scheme.verify(b"other", &signature, None));
        }
    }
}
