//! Master password verification through an encrypted canary record.
//!
//! The canary is the account's first record. It holds a well-known marker
//! sealed under the master key; a password is correct iff the canary opens
//! and the marker matches.

use crate::crypto::{derive_key, open, seal, CryptoError, KdfParams, MasterKey};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Plaintext sealed into every canary.
pub const CANARY_MARKER: &[u8] = b"MASTER_PASSWORD_CHECK";

/// Cleartext metadata attached to the canary record.
pub const CANARY_METADATA: &str = r#"{"type":"MASTER_PASSWORD_CHECK"}"#;

/// Outcome of a failed password check.
#[derive(Error, Debug)]
pub enum KeyCheckError {
    /// The canary did not open, or opened to something other than the marker.
    #[error("Wrong master password")]
    WrongPassword,

    #[error(transparent)]
    Kdf(CryptoError),
}

/// Seal the canary marker under `key`.
pub fn create_canary(key: &MasterKey) -> Result<Vec<u8>, CryptoError> {
    seal(key, CANARY_MARKER)
}

/// Check an already derived key against the canary blob.
pub fn verify_key(key: &MasterKey, canary_blob: &[u8]) -> Result<(), KeyCheckError> {
    let matches: bool = match open(key, canary_blob) {
        Ok(plaintext) => plaintext.as_slice().ct_eq(CANARY_MARKER).into(),
        Err(_) => false,
    };

    if matches {
        Ok(())
    } else {
        Err(KeyCheckError::WrongPassword)
    }
}

/// Derive the key for `password` and verify it against the canary.
///
/// Returns the verified key so the caller does not derive it twice.
pub fn verify_password(
    password: &[u8],
    params: &KdfParams,
    canary_blob: &[u8],
) -> Result<MasterKey, KeyCheckError> {
    let key = derive_key(password, params).map_err(KeyCheckError::Kdf)?;
    verify_key(&key, canary_blob)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_password_verifies() {
        let params = KdfParams::interactive_test();
        let key = derive_key(b"correct horse", &params).unwrap();
        let canary = create_canary(&key).unwrap();

        let verified = verify_password(b"correct horse", &params, &canary).unwrap();
        assert_eq!(verified.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_wrong_password_rejected() {
        let params = KdfParams::interactive_test();
        let key = derive_key(b"correct horse", &params).unwrap();
        let canary = create_canary(&key).unwrap();

        assert!(matches!(
            verify_password(b"battery staple", &params, &canary),
            Err(KeyCheckError::WrongPassword)
        ));
    }

    #[test]
    fn test_mismatched_marker_is_wrong_password() {
        // Opens fine under the right key but holds the wrong content.
        let params = KdfParams::interactive_test();
        let key = derive_key(b"pw", &params).unwrap();
        let not_a_canary = seal(&key, b"SOMETHING_ELSE").unwrap();

        assert!(matches!(
            verify_password(b"pw", &params, &not_a_canary),
            Err(KeyCheckError::WrongPassword)
        ));
    }

    #[test]
    fn test_corrupted_canary_is_wrong_password() {
        let params = KdfParams::interactive_test();
        let key = derive_key(b"pw", &params).unwrap();
        let mut canary = create_canary(&key).unwrap();
        canary[0] ^= 0x01;

        assert!(matches!(
            verify_key(&key, &canary),
            Err(KeyCheckError::WrongPassword)
        ));
        assert!(matches!(
            verify_key(&key, b"short"),
            Err(KeyCheckError::WrongPassword)
        ));
    }
}
