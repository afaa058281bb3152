use anyhow::{anyhow, Result};
use shared::{
    map_status, AccountStatus, RequestStatus, ResourceShape, RoleName, UserInfo, VmInfo, VmRequestInfo, VmState,
    VmTypeInfo,
};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: String,
    pub department: Option<String>,
    pub status: String,
    pub created_at: Option<String>,
    pub last_active: Option<String>,
}

impl User {
    /// Unknown stored statuses are treated as inactive so they cannot sign in.
    pub fn account_status(&self) -> AccountStatus {
        self.status.parse().unwrap_or(AccountStatus::Inactive)
    }

    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: RoleName::from(self.role.as_str()),
            department: self.department.clone(),
            status: self.account_status(),
            created_at: self.created_at.clone(),
            last_active: self.last_active.clone(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct VmRequest {
    pub id: String,
    pub requester_id: String,
    pub requester_email: Option<String>,
    pub purpose: String,
    pub vcpus: u32,
    pub memory_mb: u32,
    pub storage_gb: u32,
    pub duration_days: u32,
    pub course: Option<String>,
    pub status: String,
    pub response: Option<String>,
    pub created_at: Option<String>,
}

impl VmRequest {
    pub fn info(&self) -> Result<VmRequestInfo> {
        let status: RequestStatus = self
            .status
            .parse()
            .map_err(|e: String| anyhow!("request {}: {}", self.id, e))?;

        Ok(VmRequestInfo {
            id: self.id.clone(),
            requester_id: self.requester_id.clone(),
            requester_email: self.requester_email.clone(),
            purpose: self.purpose.clone(),
            shape: ResourceShape {
                vcpus: self.vcpus,
                memory_mb: self.memory_mb,
                storage_gb: self.storage_gb,
                duration_days: self.duration_days,
            },
            course: self.course.clone(),
            status,
            response: self.response.clone(),
            created_at: self.created_at.clone(),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub status: String,
    pub os: String,
    pub vcpus: u32,
    pub memory_mb: u32,
    pub storage_gb: u32,
    pub address: Option<String>,
    pub course: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl VirtualMachine {
    pub fn state(&self) -> VmState {
        map_status(Some(&self.status))
    }

    /// API view. The address is only exposed while the VM is running.
    pub fn info(&self, is_admin: bool) -> VmInfo {
        let state = self.state();
        VmInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            owner_id: self.owner_id.clone(),
            raw_status: self.status.clone(),
            state,
            actions: state.available_actions(is_admin),
            os: self.os.clone(),
            vcpus: self.vcpus,
            memory_mb: self.memory_mb,
            storage_gb: self.storage_gb,
            address: self.address.clone().filter(|_| state == VmState::Running),
            course: self.course.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct VmType {
    pub id: String,
    pub name: String,
    pub os_family: String,
    pub iso_path: Option<String>,
    pub description: Option<String>,
}

impl VmType {
    pub fn info(&self) -> VmTypeInfo {
        VmTypeInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            os_family: self.os_family.clone(),
            iso_path: self.iso_path.clone(),
            description: self.description.clone(),
        }
    }
}
