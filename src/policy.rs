//! Credential & Role Policy.
//!
//! Registration and login inputs are parsed into typed records before anything touches
//! storage. The only storage access on the registration path is the email uniqueness
//! lookup; the raw password goes straight to the hashing collaborator.

use crate::{
    error::AppError,
    hashing::PasswordHasher,
    models::{LoginRequest, NewUser, RegisterRequest, Role, User},
    repository::Repository,
};

pub const MIN_PASSWORD_LEN: usize = 8;

/// At least 8 characters with a lowercase letter, an uppercase letter and a digit.
pub fn is_valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// Emails are compared and stored trimmed and case-folded.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Accepts `poet` and `reader`; `cititor` is kept as an alias for older clients.
pub fn parse_role(raw: &str) -> Option<Role> {
    match raw.trim() {
        "poet" => Some(Role::Poet),
        "reader" | "cititor" => Some(Role::Reader),
        _ => None,
    }
}

/// Present and non-blank after trimming.
fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Registration
///
/// A registration request that passed every policy check. The password is still raw.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// validate_registration
///
/// Checks in order: all fields present, role known, password strong enough.
pub fn validate_registration(req: RegisterRequest) -> Result<Registration, AppError> {
    let (Some(name), Some(email), Some(password), Some(role)) = (
        required(req.name),
        required(req.email),
        req.password.filter(|p| !p.is_empty()),
        required(req.role),
    ) else {
        return Err(AppError::incomplete());
    };

    let role = parse_role(&role).ok_or(AppError::InvalidRole)?;

    if !is_valid_password(&password) {
        return Err(AppError::WeakPassword);
    }

    Ok(Registration {
        name: name.trim().to_string(),
        email: normalize_email(&email),
        password,
        role,
    })
}

/// LoginAttempt
///
/// A parsed login. `role` is the role the client claims to be signing in as, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginAttempt {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

pub fn validate_login(req: LoginRequest) -> Result<LoginAttempt, AppError> {
    let (Some(email), Some(password)) = (required(req.email), req.password.filter(|p| !p.is_empty()))
    else {
        return Err(AppError::incomplete());
    };

    let role = match required(req.role) {
        Some(raw) => Some(parse_role(&raw).ok_or(AppError::InvalidRole)?),
        None => None,
    };

    Ok(LoginAttempt {
        email: normalize_email(&email),
        password,
        role,
    })
}

/// A claimed role must match the stored one. This is reported separately from bad
/// credentials so the client can say "this account exists under the other role".
pub fn check_role(stored: Role, claimed: Option<Role>) -> Result<(), AppError> {
    match claimed {
        Some(claimed) if claimed != stored => Err(AppError::RoleMismatch),
        _ => Ok(()),
    }
}

/// register
///
/// Validate, check the email is unused, hash, persist. The storage-level unique
/// constraint still backs the pre-check against concurrent registrations.
pub async fn register(
    repo: &dyn Repository,
    hasher: &dyn PasswordHasher,
    req: RegisterRequest,
) -> Result<User, AppError> {
    let registration = validate_registration(req).inspect_err(|e| {
        tracing::debug!(reason = %e, "registration rejected by policy");
    })?;

    if repo.find_user_by_email(&registration.email).await?.is_some() {
        return Err(AppError::Conflict("Email already in use."));
    }

    let password_hash = hasher.hash(&registration.password).await?;

    let user = repo
        .create_user(NewUser {
            name: registration.name,
            email: registration.email,
            password_hash,
            role: registration.role,
        })
        .await?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "user registered");
    Ok(user)
}

/// login
///
/// Unknown email and wrong password are the same `InvalidCredentials` outcome. The role
/// check only runs once the password has matched.
pub async fn login(
    repo: &dyn Repository,
    hasher: &dyn PasswordHasher,
    req: LoginRequest,
) -> Result<User, AppError> {
    let attempt = validate_login(req)?;

    let record = repo
        .find_user_by_email(&attempt.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !hasher.verify(&attempt.password, &record.password_hash).await? {
        return Err(AppError::InvalidCredentials);
    }

    let user = record
        .to_user()
        .ok_or_else(|| AppError::Storage(format!("unknown role '{}'", record.role)))?;

    check_role(user.role, attempt.role)?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(password: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some("Ana".to_string()),
            email: Some("ana@example.com".to_string()),
            password: Some(password.to_string()),
            role: Some("poet".to_string()),
        }
    }

    #[test]
    fn password_rules() {
        assert!(is_valid_password("Password123"));
        assert!(!is_valid_password("weak"));
        assert!(!is_valid_password("password123"));
        assert!(!is_valid_password("PASSWORD123"));
        assert!(!is_valid_password("Passwordxyz"));
        assert!(!is_valid_password("Pass12"));
    }

    #[test]
    fn email_is_trimmed_and_folded() {
        assert_eq!(normalize_email("  A@B.com "), "a@b.com");
    }

    #[test]
    fn roles() {
        assert_eq!(parse_role("poet"), Some(Role::Poet));
        assert_eq!(parse_role("reader"), Some(Role::Reader));
        assert_eq!(parse_role("cititor"), Some(Role::Reader));
        assert_eq!(parse_role("admin"), None);
    }

    #[test]
    fn registration_checks_run_in_order() {
        let missing = RegisterRequest {
            role: Some("admin".to_string()),
            ..RegisterRequest::default()
        };
        assert!(matches!(
            validate_registration(missing),
            Err(AppError::Validation(_))
        ));

        let mut bad_role = request("weak");
        bad_role.role = Some("admin".to_string());
        assert!(matches!(
            validate_registration(bad_role),
            Err(AppError::InvalidRole)
        ));

        assert!(matches!(
            validate_registration(request("weak")),
            Err(AppError::WeakPassword)
        ));
    }

    #[test]
    fn valid_registration_is_normalized() {
        let mut req = request("Password123");
        req.name = Some("  Ana  ".to_string());
        req.email = Some(" Ana@Example.COM".to_string());

        let registration = validate_registration(req).unwrap();
        assert_eq!(registration.name, "Ana");
        assert_eq!(registration.email, "ana@example.com");
        assert_eq!(registration.role, Role::Poet);
        assert_eq!(registration.password, "Password123");
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let mut req = request("Password123");
        req.name = Some("   ".to_string());
        assert!(matches!(
            validate_registration(req),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn login_role_is_optional() {
        let attempt = validate_login(LoginRequest {
            email: Some("A@B.com".to_string()),
            password: Some("Password123".to_string()),
            role: Some(String::new()),
        })
        .unwrap();
        assert_eq!(attempt.email, "a@b.com");
        assert_eq!(attempt.role, None);
    }

    #[test]
    fn role_mismatch_is_its_own_error() {
        assert!(check_role(Role::Poet, None).is_ok());
        assert!(check_role(Role::Poet, Some(Role::Poet)).is_ok());
        assert!(matches!(
            check_role(Role::Poet, Some(Role::Reader)),
            Err(AppError::RoleMismatch)
        ));
    }
}
