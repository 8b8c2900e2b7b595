//! Signing identity: a secp256k1 keypair persisted as hex on disk.
//!
//! Events are authored under the x-only public key and signed with a
//! Schnorr signature over the event id.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use secp256k1::rand::thread_rng;
use secp256k1::{Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey};
use thiserror::Error;

use powstr_core::{Event, EventError, EventTemplate};

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("no key at {0}; create one with 'powstr new-key'")]
    Missing(PathBuf),
    #[error("malformed secret key: expected 64 hex characters")]
    Malformed,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Event(#[from] EventError),
}

/// A signing identity. Holds the secret key and its derived keypair.
#[derive(Debug)]
pub struct Keys {
    secret: SecretKey,
    keypair: Keypair,
}

impl Keys {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let secret = SecretKey::new(&mut thread_rng());
        let keypair = Keypair::from_secret_key(&secp, &secret);
        Self { secret, keypair }
    }

    /// Parse a 64-character hex secret key.
    pub fn from_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| KeyError::Malformed)?;
        let secret = SecretKey::from_slice(&bytes).map_err(|_| KeyError::Malformed)?;
        Ok(Self::from_secret(secret))
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &secret);
        Self { secret, keypair }
    }

    /// Hex secret key, for export and persistence.
    pub fn secret_hex(&self) -> String {
        self.secret.display_secret().to_string()
    }

    /// Hex x-only public key, the author field of every event.
    pub fn pubkey_hex(&self) -> String {
        let (xonly, _parity) = XOnlyPublicKey::from_keypair(&self.keypair);
        hex::encode(xonly.serialize())
    }

    /// Compute the template's id, sign it, and assemble the finished
    /// event. The template's pubkey must already be this identity's.
    pub fn sign(&self, template: &EventTemplate) -> Result<Event, KeyError> {
        template.nonce_index()?;
        let id = template.id();
        let mut digest = [0u8; 32];
        hex::decode_to_slice(&id, &mut digest).map_err(|_| KeyError::Malformed)?;

        let secp = Secp256k1::new();
        let msg = Message::from_digest(digest);
        let sig = secp.sign_schnorr(&msg, &self.keypair);
        Ok(template.clone().finalize(id, sig.to_string()))
    }

    /// Load from a file holding the hex secret key.
    pub fn load_from_file(path: &Path) -> Result<Self, KeyError> {
        if !path.exists() {
            return Err(KeyError::Missing(path.to_path_buf()));
        }
        let hex_key = fs::read_to_string(path)?;
        Self::from_hex(&hex_key)
    }

    /// Persist the hex secret key, creating parent directories. On unix
    /// the file is restricted to the owner.
    pub fn save_to_file(&self, path: &Path) -> Result<(), KeyError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.secret_hex())?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}

/// Default key location: `~/.powstr/key`.
#[cfg(feature = "cli")]
pub fn default_key_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".powstr").join("key"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use powstr_core::EventTemplate;

    #[test]
    fn generated_keys_round_trip_through_hex() {
        let keys = Keys::generate();
        let restored = Keys::from_hex(&keys.secret_hex()).unwrap();

        assert_eq!(keys.secret_hex(), restored.secret_hex());
        assert_eq!(keys.pubkey_hex(), restored.pubkey_hex());
        assert_eq!(keys.pubkey_hex().len(), 64);
    }

    #[test]
    fn malformed_hex_is_rejected() {
        assert!(matches!(Keys::from_hex("zz"), Err(KeyError::Malformed)));
        assert!(matches!(Keys::from_hex("abcd"), Err(KeyError::Malformed)));
        // All-zero is not a valid scalar.
        assert!(matches!(
            Keys::from_hex(&"0".repeat(64)),
            Err(KeyError::Malformed)
        ));
    }

    #[test]
    fn key_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("key");

        let keys = Keys::generate();
        keys.save_to_file(&path).unwrap();
        let loaded = Keys::load_from_file(&path).unwrap();

        assert_eq!(keys.secret_hex(), loaded.secret_hex());
    }

    #[test]
    fn missing_key_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");

        match Keys::load_from_file(&path) {
            Err(KeyError::Missing(p)) => assert_eq!(p, path),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn signed_event_verifies() {
        let keys = Keys::generate();
        let template =
            EventTemplate::text_note(&keys.pubkey_hex(), "signed note", 8, 1_700_000_000);
        let event = keys.sign(&template).unwrap();

        assert_eq!(event.id, template.id());
        assert_eq!(event.pubkey, keys.pubkey_hex());
        assert_eq!(event.sig.len(), 128);

        let secp = Secp256k1::new();
        let mut digest = [0u8; 32];
        hex::decode_to_slice(&event.id, &mut digest).unwrap();
        let msg = Message::from_digest(digest);
        let sig = secp256k1::schnorr::Signature::from_slice(&hex::decode(&event.sig).unwrap())
            .unwrap();
        let (xonly, _) = XOnlyPublicKey::from_keypair(&keys.keypair);
        assert!(secp.verify_schnorr(&sig, &msg, &xonly).is_ok());
    }
}
