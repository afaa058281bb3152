//! VM type (provisioning template) catalog

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use shared::{require_non_empty, NewVmType, VmTypeInfo};
use uuid::Uuid;

use crate::{
    db::VmType,
    error::AppError,
    extract::{AppJson, AppPath},
    routes::auth::CurrentUser,
    state::AppState,
};

/// GET /vm-types
pub async fn list_vm_types(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> Result<Json<Vec<VmTypeInfo>>, AppError> {
    let vm_types = state.db.list_vm_types().await?;
    Ok(Json(vm_types.iter().map(|t| t.info()).collect()))
}

/// Add a template (admin only). Names are unique.
/// POST /vm-types
pub async fn create_vm_type(
    State(state): State<AppState>,
    current: CurrentUser,
    AppJson(req): AppJson<NewVmType>,
) -> Result<(StatusCode, Json<VmTypeInfo>), AppError> {
    current.require_admin()?;
    require_non_empty("name", &req.name)?;
    require_non_empty("os_family", &req.os_family)?;

    let name = req.name.trim().to_string();
    if state.db.get_vm_type_by_name(&name).await?.is_some() {
        return Err(AppError::Conflict(format!("VM type '{}' already exists", name)));
    }

    let vm_type = VmType {
        id: Uuid::new_v4().to_string(),
        name,
        os_family: req.os_family.trim().to_string(),
        iso_path: req.iso_path,
        description: req.description,
    };
    if !state.db.create_vm_type(&vm_type).await? {
        return Err(AppError::Conflict(format!("VM type '{}' already exists", vm_type.name)));
    }
    tracing::info!("VM type {} added by {}", vm_type.name, current.user.email);

    Ok((StatusCode::CREATED, Json(vm_type.info())))
}

/// Remove a template (admin only). VMs built from it are unaffected.
/// DELETE /vm-types/:id
pub async fn delete_vm_type(
    State(state): State<AppState>,
    current: CurrentUser,
    AppPath(type_id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    current.require_admin()?;
    if !state.db.delete_vm_type(&type_id.to_string()).await? {
        return Err(AppError::NotFound("VM type not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
