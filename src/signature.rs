//! Detached PGP signature verification over a commit or annotated-tag's
//! signature-stripped byte payload.

use std::io::Cursor;

use pgp::composed::{Deserializable, SignedPublicKey, SignedSecretKey, StandaloneSignature};
use pgp::crypto::hash::HashAlgorithm;
use pgp::packet::{SignatureConfig, SignatureType, SignatureVersion, Subpacket, SubpacketData};
use pgp::types::{KeyTrait, SecretKeyTrait};

use crate::error::{Error, Result};

/// A loaded PGP keypair used to sign commits and tags on write. Only the
/// public half is required for verification; the passphrase, if any, is
/// supplied separately at sign time via [`crate::types::CommitOptions`].
#[derive(Clone)]
pub struct PgpEntity {
    armored_secret_key: Vec<u8>,
}

impl std::fmt::Debug for PgpEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgpEntity").finish_non_exhaustive()
    }
}

impl PgpEntity {
    pub fn from_armored(bytes: impl Into<Vec<u8>>) -> Self {
        Self { armored_secret_key: bytes.into() }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.armored_secret_key
    }
}

/// Verifies `signature` (an armored detached signature) over `payload`
/// against each of `key_rings` in turn, returning the first signer's
/// fingerprint (hex-encoded key id) on success.
pub fn verify_detached(signature: &str, payload: &[u8], key_rings: &[&str]) -> Result<String> {
    if signature.is_empty() {
        return Err(Error::EmptySignature);
    }

    let (sig, _headers) = StandaloneSignature::from_armor_single(Cursor::new(signature.as_bytes()))
        .map_err(|e| Error::git_msg(format!("parsing detached signature: {e}")))?;

    for ring in key_rings {
        let (public_key, _headers) = match SignedPublicKey::from_armor_single(Cursor::new(ring.as_bytes())) {
            Ok(parsed) => parsed,
            Err(_) => continue,
        };
        if sig.verify(&public_key, payload).is_ok() {
            return Ok(hex::encode(public_key.key_id().as_ref()));
        }
    }

    Err(Error::SignatureVerificationFailed)
}

/// Produces an armored detached PGP signature over `payload` using `entity`'s
/// secret key, unlocked with `passphrase` (empty if the key is unencrypted).
/// This is the counterpart [`verify_detached`] checks against.
pub fn sign_detached(entity: &PgpEntity, passphrase: &str, payload: &[u8]) -> Result<String> {
    let (secret_key, _headers) = SignedSecretKey::from_armor_single(Cursor::new(entity.as_bytes()))
        .map_err(|e| Error::git_msg(format!("parsing PGP secret key: {e}")))?;

    let passphrase = passphrase.to_string();
    let sig_config = SignatureConfig::new_v4(
        SignatureVersion::V4,
        SignatureType::Binary,
        secret_key.algorithm(),
        HashAlgorithm::SHA2_256,
        vec![Subpacket::regular(SubpacketData::SignatureCreationTime(
            std::time::SystemTime::now().into(),
        ))],
        vec![Subpacket::regular(SubpacketData::Issuer(secret_key.key_id()))],
    );

    let signature_packet = sig_config
        .sign(&secret_key, move || passphrase.clone(), payload)
        .map_err(|e| Error::git_msg(format!("signing payload: {e}")))?;

    let standalone = StandaloneSignature::new(signature_packet);
    standalone
        .to_armored_string(None)
        .map_err(|e| Error::git_msg(format!("armoring signature: {e}")))
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_signature_is_rejected() {
        let err = verify_detached("", b"payload", &[]);
        assert!(matches!(err, Err(Error::EmptySignature)));
    }

    #[test]
    fn garbage_signature_fails_to_parse() {
        let err = verify_detached("not a signature", b"payload", &["also not a key"]);
        assert!(err.is_err());
    }
}
