use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Roles and account status
// ============================================================================

/// Dashboard role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role: '{0}' (expected: admin, instructor, student)")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "instructor" => Ok(Role::Instructor),
            "student" => Ok(Role::Student),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// Role as carried by a session.
///
/// Sessions may be issued by a newer build that knows roles this one does
/// not; those are kept verbatim so access decisions stay total.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoleName {
    Known(Role),
    Unrecognized(String),
}

impl RoleName {
    pub fn known(&self) -> Option<Role> {
        match self {
            RoleName::Known(role) => Some(*role),
            RoleName::Unrecognized(_) => None,
        }
    }

    pub fn is(&self, role: Role) -> bool {
        self.known() == Some(role)
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoleName::Known(role) => role.as_str(),
            RoleName::Unrecognized(raw) => raw,
        }
    }
}

impl From<Role> for RoleName {
    fn from(role: Role) -> Self {
        RoleName::Known(role)
    }
}

impl From<String> for RoleName {
    fn from(raw: String) -> Self {
        match raw.parse::<Role>() {
            Ok(role) => RoleName::Known(role),
            Err(_) => RoleName::Unrecognized(raw),
        }
    }
}

impl From<&str> for RoleName {
    fn from(raw: &str) -> Self {
        RoleName::from(raw.to_string())
    }
}

impl From<RoleName> for String {
    fn from(name: RoleName) -> Self {
        name.as_str().to_string()
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Inactive,
    Suspended,
    /// Registered but not yet activated by an administrator
    Pending,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Pending => "pending",
        }
    }

    /// Suspended and inactive accounts are soft-disabled.
    pub fn can_sign_in(&self) -> bool {
        matches!(self, AccountStatus::Active | AccountStatus::Pending)
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "suspended" => Ok(AccountStatus::Suspended),
            "pending" => Ok(AccountStatus::Pending),
            _ => Err(format!("invalid account status: '{s}'")),
        }
    }
}

// ============================================================================
// VM request lifecycle
// ============================================================================

/// Lifecycle status of a VM request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// Administrator verdict on a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("request has already been {0}")]
    AlreadyDecided(RequestStatus),
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_decided(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    /// Apply a decision. Only `pending` requests can be decided, and only once.
    pub fn decide(self, decision: RequestDecision) -> Result<RequestStatus, LifecycleError> {
        match (self, decision) {
            (RequestStatus::Pending, RequestDecision::Approve) => Ok(RequestStatus::Approved),
            (RequestStatus::Pending, RequestDecision::Reject) => Ok(RequestStatus::Rejected),
            (decided, _) => Err(LifecycleError::AlreadyDecided(decided)),
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            _ => Err(format!("invalid request status: '{s}'")),
        }
    }
}

// ============================================================================
// Input validation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: u32,
        max: u32,
        value: u32,
    },
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),
}

pub const MIN_PASSWORD_LEN: usize = 6;

/// Requested resource shape of a VM request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceShape {
    pub vcpus: u32,
    pub memory_mb: u32,
    pub storage_gb: u32,
    pub duration_days: u32,
}

impl ResourceShape {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("vcpus", self.vcpus, 1, 32)?;
        check_range("memory_mb", self.memory_mb, 512, 131_072)?;
        check_range("storage_gb", self.storage_gb, 1, 2048)?;
        check_range("duration_days", self.duration_days, 1, 365)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field, min, max, value })
    }
}

pub fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if valid && !email.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
