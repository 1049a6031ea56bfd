use crate::error::AuthError;

/// Bcrypt work factor. §4.3 requires at least 12 rounds of bcrypt-equivalent
/// hardness; `bcrypt::DEFAULT_COST` is also 12, so this is explicit rather
/// than relying on the crate default staying put.
const BCRYPT_ROUNDS: u32 = 12;

/// Minimum password length (§4.3); the four required character classes are
/// checked by [`validate_password_policy`].
pub const PASSWORD_MIN_LEN: usize = 12;

/// Reject passwords that don't meet policy before they ever reach the
/// hasher (§4.3: "rejected passwords never reach the hasher").
pub fn validate_password_policy(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AuthError::WeakPassword);
    }
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_ascii_alphanumeric());

    if has_upper && has_lower && has_digit && has_special {
        Ok(())
    } else {
        Err(AuthError::WeakPassword)
    }
}

/// Hash a plaintext password with a per-entry salt and bcrypt work factor.
/// Returns a policy error rather than hashing a non-compliant password.
pub fn hash_password(plaintext: &str) -> Result<String, AuthError> {
    validate_password_policy(plaintext)?;
    bcrypt::hash(plaintext, BCRYPT_ROUNDS).map_err(|_| AuthError::InvalidCredentials)
}

/// Verify a plaintext password against its stored bcrypt form. `bcrypt`'s
/// constant-time comparison gives the constant-time guarantee §4.3 asks for.
pub fn verify_password(plaintext: &str, stored_form: &str) -> bool {
    bcrypt::verify(plaintext, stored_form).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_password() {
        assert!(validate_password_policy("Sh0rt!a").is_err());
    }

    #[test]
    fn accepts_compliant_password() {
        assert!(validate_password_policy("Correct-Horse9!").is_ok());
    }

    #[test]
    fn length_eleven_is_rejected_twelve_is_accepted() {
        assert!(validate_password_policy("Ab1!Ab1!Ab1").is_err()); // 11 chars
        assert!(validate_password_policy("Ab1!Ab1!Ab12").is_ok()); // 12 chars
    }

    #[test]
    fn hash_then_verify_round_trips() {
        let hashed = hash_password("Correct-Horse9!").unwrap();
        assert!(verify_password("Correct-Horse9!", &hashed));
        assert!(!verify_password("wrong-password", &hashed));
    }

    #[test]
    fn weak_password_never_reaches_hasher() {
        let result = hash_password("short");
        assert!(matches!(result, Err(AuthError::WeakPassword)));
    }
}
