use serde::{Deserialize, Serialize};

use crate::access::{Decision, SessionUser};
use crate::models::{AccountStatus, RequestDecision, RequestStatus, ResourceShape, Role, RoleName};
use crate::vm_state::{VmAction, VmState};

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    /// Self-registration may pick `student` or `instructor` only
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserInfo,
}

/// Guard decision for a dashboard path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateResponse {
    pub path: String,
    #[serde(flatten)]
    pub decision: Decision,
    /// Where the browser should go, if not rendering
    pub redirect: Option<String>,
}

// ============================================================================
// Users
// ============================================================================

/// Information about a user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: RoleName,
    pub department: Option<String>,
    pub status: AccountStatus,
    pub created_at: Option<String>,
    pub last_active: Option<String>,
}

impl UserInfo {
    pub fn session_user(&self) -> SessionUser {
        SessionUser {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is(Role::Admin)
    }
}

/// Administrative update of a user. The only path that changes role or status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub status: Option<AccountStatus>,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

// ============================================================================
// VM requests
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVmRequest {
    pub purpose: String,
    #[serde(flatten)]
    pub shape: ResourceShape,
    #[serde(default)]
    pub course: Option<String>,
}

/// Information about a VM request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmRequestInfo {
    pub id: String,
    pub requester_id: String,
    pub requester_email: Option<String>,
    pub purpose: String,
    #[serde(flatten)]
    pub shape: ResourceShape,
    pub course: Option<String>,
    pub status: RequestStatus,
    pub response: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub decision: RequestDecision,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseUpdate {
    pub message: String,
}

// ============================================================================
// Virtual machines
// ============================================================================

/// Information about a virtual machine, with its canonical state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmInfo {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub raw_status: String,
    pub state: VmState,
    pub actions: Vec<VmAction>,
    pub os: String,
    pub vcpus: u32,
    pub memory_mb: u32,
    pub storage_gb: u32,
    /// Only present while the VM is running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub course: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionVmRequest {
    pub name: String,
    pub owner_id: String,
    #[serde(default)]
    pub vm_type_id: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    pub vcpus: u32,
    pub memory_mb: u32,
    pub storage_gb: u32,
    #[serde(default)]
    pub course: Option<String>,
}

/// Status reported by the VM manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    #[serde(default)]
    pub address: Option<String>,
}

// ============================================================================
// VM types
// ============================================================================

/// Provisioning template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmTypeInfo {
    pub id: String,
    pub name: String,
    pub os_family: String,
    pub iso_path: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVmType {
    pub name: String,
    pub os_family: String,
    #[serde(default)]
    pub iso_path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// Misc
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_vm_request_flattens_shape() {
        let json = r#"{"purpose":"OS lab","vcpus":2,"memory_mb":2048,"storage_gb":20,"duration_days":14}"#;
        let req: NewVmRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.shape.vcpus, 2);
        assert_eq!(req.shape.duration_days, 14);
        assert_eq!(req.course, None);
    }

    #[test]
    fn test_vm_info_hides_missing_address() {
        let info = VmInfo {
            id: "vm-1".to_string(),
            name: "lab-01".to_string(),
            owner_id: "u-1".to_string(),
            raw_status: "shut off".to_string(),
            state: VmState::Stopped,
            actions: vec![VmAction::Start],
            os: "ubuntu".to_string(),
            vcpus: 2,
            memory_mb: 2048,
            storage_gb: 20,
            address: None,
            course: None,
            created_at: None,
            updated_at: None,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("address").is_none());
        assert_eq!(json["state"], "stopped");
        assert_eq!(json["actions"][0], "start");
    }

    #[test]
    fn test_navigate_response_flattens_decision() {
        let resp = NavigateResponse {
            path: "/admin".to_string(),
            decision: Decision::RedirectToHome {
                location: "/student".to_string(),
            },
            redirect: Some("/student".to_string()),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["decision"], "redirect_to_home");
        assert_eq!(json["location"], "/student");
        assert_eq!(json["redirect"], "/student");
        assert_eq!(json["path"], "/admin");
    }

    #[test]
    fn test_user_info_session_user() {
        let json = r#"{"id":"u-1","email":"a@b.edu","display_name":"A","role":"admin","department":null,"status":"active","created_at":null,"last_active":null}"#;
        let info: UserInfo = serde_json::from_str(json).unwrap();
        assert!(info.is_admin());
        assert_eq!(info.session_user().role, RoleName::Known(Role::Admin));
    }
}
