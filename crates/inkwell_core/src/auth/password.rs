use bcrypt::BcryptError;
use log::warn;

/// Hashes `plaintext` with a fresh salt at the given bcrypt `cost`.
pub fn hash_password(plaintext: &str, cost: u32) -> Result<String, BcryptError> {
    bcrypt::hash(plaintext, cost)
}

/// Checks `plaintext` against a stored bcrypt hash.
///
/// A stored value that is not a valid bcrypt hash never matches.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    match bcrypt::verify(plaintext, hash) {
        Ok(matches) => matches,
        Err(err) => {
            warn!("event=password_verify module=auth status=invalid_hash error_kind={}", error_kind(&err));
            false
        }
    }
}

fn error_kind(err: &BcryptError) -> &'static str {
    match err {
        BcryptError::InvalidCost(_) => "invalid_cost",
        BcryptError::InvalidPrefix(_) => "invalid_prefix",
        BcryptError::InvalidHash(_) => "invalid_hash",
        BcryptError::InvalidBase64(_) => "invalid_base64",
        _ => "other",
    }
}
