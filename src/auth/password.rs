use bcrypt::{hash, verify, DEFAULT_COST};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password must be at least {0} characters long")]
    TooShort(usize),
    #[error("Password must be no more than {0} characters long")]
    TooLong(usize),
    #[error("Password must contain at least one uppercase letter")]
    NoUppercase,
    #[error("Password must contain at least one number")]
    NoNumber,
    #[error("Failed to hash password")]
    HashingFailed,
    #[error("Failed to verify password")]
    VerificationFailed,
}

impl PasswordError {
    /// Policy violations are the caller's fault, hashing failures are ours.
    pub fn is_policy_violation(&self) -> bool {
        !matches!(self, PasswordError::HashingFailed | PasswordError::VerificationFailed)
    }
}

/// Password strength requirements
#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_number: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_uppercase: false,
            require_number: true,
        }
    }
}

/// Validate password strength according to policy
pub fn validate_password_strength(password: &str, policy: &PasswordPolicy) -> Result<(), PasswordError> {
    let length = password.chars().count();

    if length < policy.min_length {
        return Err(PasswordError::TooShort(policy.min_length));
    }

    if length > policy.max_length {
        return Err(PasswordError::TooLong(policy.max_length));
    }

    if policy.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
        return Err(PasswordError::NoUppercase);
    }

    if policy.require_number && !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordError::NoNumber);
    }

    Ok(())
}

/// Hash a password using bcrypt after checking it against the default policy
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    validate_password_strength(password, &PasswordPolicy::default())?;

    hash(password, DEFAULT_COST).map_err(|_| PasswordError::HashingFailed)
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    verify(password, hash).map_err(|_| PasswordError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_default_policy() {
        let policy = PasswordPolicy::default();

        assert_matches!(validate_password_strength("short1", &policy), Err(PasswordError::TooShort(8)));
        assert_matches!(validate_password_strength("nodigitshere", &policy), Err(PasswordError::NoNumber));
        assert_matches!(
            validate_password_strength(&"a1".repeat(65), &policy),
            Err(PasswordError::TooLong(128))
        );
        assert!(validate_password_strength("password123", &policy).is_ok());
    }

    #[test]
    fn test_uppercase_policy() {
        let policy = PasswordPolicy {
            require_uppercase: true,
            ..PasswordPolicy::default()
        };

        assert_matches!(validate_password_strength("password123", &policy), Err(PasswordError::NoUppercase));
        assert!(validate_password_strength("Password123", &policy).is_ok());
    }

    #[test]
    fn test_hash_and_verify() {
        let hashed = hash_password("jab-cross-42").unwrap();

        assert_ne!(hashed, "jab-cross-42");
        assert!(verify_password("jab-cross-42", &hashed).unwrap());
        assert!(!verify_password("jab-cross-43", &hashed).unwrap());
    }

    #[test]
    fn test_hash_rejects_weak_password() {
        assert_matches!(hash_password("weak"), Err(PasswordError::TooShort(_)));
    }
}
