use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use super::{AuthError, AuthResult};

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(hashing_failed)
}

fn hashing_failed(err: argon2::password_hash::Error) -> AuthError {
    AuthError::Internal(format!("password hashing failed: {err}"))
}

/// `Ok(false)` on a wrong password. A hash that does not parse is an error,
/// since it can only come from a corrupt row.
pub fn verify_password(password: &str, hash: &str) -> AuthResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        AuthError::Store(crate::store::StoreError::Corrupt(format!("password hash: {e}")))
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        assert_ne!(hash_password("secret1").unwrap(), hash_password("secret1").unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(matches!(verify_password("x", "not-a-hash"), Err(AuthError::Store(_))));
    }

    #[test]
    fn hashing_failure_is_a_server_error() {
        let err = hashing_failed(argon2::password_hash::Error::Password);
        assert!(matches!(err, AuthError::Internal(_)));
        let app = agora_shared::AppError::from(err);
        assert_eq!(app.code(), agora_shared::ErrorCode::InternalError);
    }

    #[test]
    fn minimum_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }
}
