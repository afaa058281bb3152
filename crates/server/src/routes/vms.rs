//! Virtual machine endpoints.
//!
//! The authoritative VM state lives in the VM manager; this service stores the
//! last status it reported and derives the canonical state from it on read.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use shared::{require_non_empty, ProvisionVmRequest, StatusReport, VmAction, VmInfo, VmState};
use uuid::Uuid;

use crate::{
    db::VirtualMachine,
    error::AppError,
    extract::{AppJson, AppPath},
    routes::auth::CurrentUser,
    state::AppState,
};

/// Administrators see every VM, everyone else their own
/// GET /vms
pub async fn list_vms(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<VmInfo>>, AppError> {
    let owner = if current.is_admin() { None } else { Some(current.id()) };
    let vms = state.db.list_vms(owner).await?;
    let is_admin = current.is_admin();
    Ok(Json(vms.iter().map(|vm| vm.info(is_admin)).collect()))
}

/// GET /vms/:id
pub async fn get_vm(
    State(state): State<AppState>,
    current: CurrentUser,
    AppPath(vm_id): AppPath<Uuid>,
) -> Result<Json<VmInfo>, AppError> {
    let vm = load_visible_vm(&state, &current, &vm_id.to_string()).await?;
    Ok(Json(vm.info(current.is_admin())))
}

/// Register a newly provisioned VM (admin only). Starts out `creating`.
/// POST /vms
pub async fn provision_vm(
    State(state): State<AppState>,
    current: CurrentUser,
    AppJson(req): AppJson<ProvisionVmRequest>,
) -> Result<(StatusCode, Json<VmInfo>), AppError> {
    current.require_admin()?;
    require_non_empty("name", &req.name)?;

    let owner = state
        .db
        .get_user_by_id(&req.owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Owner not found".to_string()))?;

    let template = match &req.vm_type_id {
        Some(type_id) => Some(
            state
                .db
                .get_vm_type(type_id)
                .await?
                .ok_or_else(|| AppError::NotFound("VM type not found".to_string()))?,
        ),
        None => None,
    };

    let os = req
        .os
        .clone()
        .filter(|os| !os.trim().is_empty())
        .or_else(|| template.as_ref().map(|t| t.os_family.clone()))
        .ok_or_else(|| AppError::BadRequest("os or vm_type_id is required".to_string()))?;

    let shape = shared::ResourceShape {
        vcpus: req.vcpus,
        memory_mb: req.memory_mb,
        storage_gb: req.storage_gb,
        duration_days: 1,
    };
    shape.validate()?;

    let vm = VirtualMachine {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        owner_id: owner.id.clone(),
        status: VmState::Creating.to_string(),
        os,
        vcpus: req.vcpus,
        memory_mb: req.memory_mb,
        storage_gb: req.storage_gb,
        address: None,
        course: req.course,
        created_at: None,
        updated_at: None,
    };
    state.db.create_vm(&vm).await?;

    tracing::info!(
        "VM {} ({}) provisioned for {}{}",
        vm.name,
        vm.id,
        owner.email,
        template.map(|t| format!(" from template {}", t.name)).unwrap_or_default()
    );

    let created = load_vm(&state, &vm.id).await?;
    Ok((StatusCode::CREATED, Json(created.info(true))))
}

/// Record the status reported by the VM manager (admin only)
/// PUT /vms/:id/status
pub async fn report_status(
    State(state): State<AppState>,
    current: CurrentUser,
    AppPath(vm_id): AppPath<Uuid>,
    AppJson(report): AppJson<StatusReport>,
) -> Result<Json<VmInfo>, AppError> {
    current.require_admin()?;
    let vm_id = vm_id.to_string();

    let canonical = shared::map_status(Some(&report.status));
    let address = report.address.as_deref().filter(|_| canonical == VmState::Running);
    if canonical == VmState::Error {
        tracing::warn!("VM {} reported unrecognized status '{}'", vm_id, report.status);
    }

    if !state.db.update_vm_status(&vm_id, report.status.trim(), address).await? {
        return Err(AppError::NotFound("VM not found".to_string()));
    }

    Ok(Json(load_vm(&state, &vm_id).await?.info(true)))
}

/// Apply a lifecycle action (owner or admin)
/// POST /vms/:id/actions/:action
pub async fn perform_action(
    State(state): State<AppState>,
    current: CurrentUser,
    AppPath((vm_id, action)): AppPath<(Uuid, String)>,
) -> Result<Json<VmInfo>, AppError> {
    let action: VmAction = action.parse().map_err(AppError::BadRequest)?;
    let vm = load_visible_vm(&state, &current, &vm_id.to_string()).await?;
    let vm_state = vm.state();
    let is_admin = current.is_admin();

    if !vm_state.allows(action, is_admin) {
        return Err(AppError::Conflict(format!(
            "Cannot {} a VM that is {}",
            action, vm_state
        )));
    }

    match action.reported_status() {
        Some(status) => {
            state.db.update_vm_status(&vm.id, status, None).await?;
            tracing::info!("{} VM {} by {}", action, vm.id, current.user.email);
            Ok(Json(load_vm(&state, &vm.id).await?.info(is_admin)))
        }
        None if action == VmAction::Delete => {
            state.db.delete_vm(&vm.id).await?;
            tracing::info!("Deleted VM {} by {}", vm.id, current.user.email);
            Ok(Json(vm.info(is_admin)))
        }
        // Connect does not change state; the caller gets the current address
        None => Ok(Json(vm.info(is_admin))),
    }
}

/// Delete a VM (admin only). Refused while the VM is still being created.
/// DELETE /vms/:id
pub async fn delete_vm(
    State(state): State<AppState>,
    current: CurrentUser,
    AppPath(vm_id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    current.require_admin()?;
    let vm = load_vm(&state, &vm_id.to_string()).await?;

    if !vm.state().allows(VmAction::Delete, true) {
        return Err(AppError::Conflict(format!(
            "Cannot delete a VM that is {}",
            vm.state()
        )));
    }

    state.db.delete_vm(&vm.id).await?;
    tracing::info!("Deleted VM {} by {}", vm.id, current.user.email);
    Ok(StatusCode::NO_CONTENT)
}

async fn load_vm(state: &AppState, id: &str) -> Result<VirtualMachine, AppError> {
    state
        .db
        .get_vm(id)
        .await?
        .ok_or_else(|| AppError::NotFound("VM not found".to_string()))
}

/// Other users' VMs are reported as missing rather than forbidden
async fn load_visible_vm(
    state: &AppState,
    current: &CurrentUser,
    id: &str,
) -> Result<VirtualMachine, AppError> {
    let vm = load_vm(state, id).await?;
    if !current.can_access(&vm.owner_id) {
        return Err(AppError::NotFound("VM not found".to_string()));
    }
    Ok(vm)
}
