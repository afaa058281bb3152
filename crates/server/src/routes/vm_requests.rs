//! VM request endpoints

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use shared::{
    require_non_empty, DecisionRequest, NewVmRequest, Policy, RequestStatus, ResponseUpdate, Role,
    VmRequestInfo,
};
use uuid::Uuid;

use crate::{
    db::VmRequest,
    error::AppError,
    extract::{AppJson, AppPath},
    routes::auth::CurrentUser,
    state::AppState,
};

/// Administrators see every request, everyone else their own
/// GET /requests
pub async fn list_requests(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<VmRequestInfo>>, AppError> {
    let requester = if current.is_admin() { None } else { Some(current.id()) };
    let requests = state.db.list_requests(requester).await?;
    let infos = requests
        .iter()
        .map(|r| r.info())
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(infos))
}

/// Submit a request for a VM
/// POST /requests
pub async fn create_request(
    State(state): State<AppState>,
    current: CurrentUser,
    AppJson(req): AppJson<NewVmRequest>,
) -> Result<(StatusCode, Json<VmRequestInfo>), AppError> {
    current.require(&Policy::AnyOf(vec![Role::Student, Role::Instructor]))?;
    require_non_empty("purpose", &req.purpose)?;
    req.shape.validate()?;

    let request = VmRequest {
        id: Uuid::new_v4().to_string(),
        requester_id: current.id().to_string(),
        requester_email: None,
        purpose: req.purpose.trim().to_string(),
        vcpus: req.shape.vcpus,
        memory_mb: req.shape.memory_mb,
        storage_gb: req.shape.storage_gb,
        duration_days: req.shape.duration_days,
        course: req.course,
        status: RequestStatus::Pending.to_string(),
        response: None,
        created_at: None,
    };
    state.db.create_request(&request).await?;

    tracing::info!(
        "VM request {} submitted by {} ({} vCPU, {} MiB, {} GiB, {} days)",
        request.id,
        current.user.email,
        request.vcpus,
        request.memory_mb,
        request.storage_gb,
        request.duration_days
    );

    let created = load_request(&state, &request.id).await?;
    Ok((StatusCode::CREATED, Json(created.info()?)))
}

/// Approve or reject a pending request (admin only)
/// POST /requests/:id/decision
pub async fn decide_request(
    State(state): State<AppState>,
    current: CurrentUser,
    AppPath(request_id): AppPath<Uuid>,
    AppJson(req): AppJson<DecisionRequest>,
) -> Result<Json<VmRequestInfo>, AppError> {
    current.require_admin()?;
    let request_id = request_id.to_string();

    let request = load_request(&state, &request_id).await?.info()?;
    let next = request.status.decide(req.decision)?;

    let message = req.message.as_deref().map(str::trim).filter(|m| !m.is_empty());
    let applied = state
        .db
        .decide_request(&request_id, next.as_str(), message)
        .await?;
    if !applied {
        // Someone else decided it between the read and the write
        let current_status = load_request(&state, &request_id).await?.info()?.status;
        return Err(shared::LifecycleError::AlreadyDecided(current_status).into());
    }

    tracing::info!("VM request {} {} by {}", request_id, next, current.user.email);

    Ok(Json(load_request(&state, &request_id).await?.info()?))
}

/// Edit the response message of a request (admin only). Status is untouched.
/// PATCH /requests/:id/response
pub async fn update_response(
    State(state): State<AppState>,
    current: CurrentUser,
    AppPath(request_id): AppPath<Uuid>,
    AppJson(req): AppJson<ResponseUpdate>,
) -> Result<Json<VmRequestInfo>, AppError> {
    current.require_admin()?;
    let request_id = request_id.to_string();

    if !state.db.update_request_response(&request_id, req.message.trim()).await? {
        return Err(AppError::NotFound("Request not found".to_string()));
    }
    Ok(Json(load_request(&state, &request_id).await?.info()?))
}

async fn load_request(state: &AppState, id: &str) -> Result<VmRequest, AppError> {
    state
        .db
        .get_request(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Request not found".to_string()))
}
