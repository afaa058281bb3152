use anyhow::Result;
use shared::{
    Decision, DecisionRequest, NewVmRequest, RequestDecision, RequestStatus, ResourceShape,
    ResponseUpdate, ViewTable, VmAction, VmInfo, VmRequestInfo, VmState,
};

use crate::auth::{self, SESSION_CHECK_TIMEOUT};
use crate::client::ApiClient;

fn state_color(state: VmState) -> &'static str {
    match state.badge() {
        "green" => "32",
        "amber" => "33",
        "blue" => "36",
        "red" => "31",
        _ => "90",
    }
}

pub fn format_vm_row(vm: &VmInfo) -> String {
    let actions = vm
        .actions
        .iter()
        .map(VmAction::as_str)
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{:<36}  {:<20}  {:<10}  {:>2} vCPU  {:>6} MiB  {:>5} GiB  {:<15}  {}",
        vm.id,
        vm.name,
        vm.state.label(),
        vm.vcpus,
        vm.memory_mb,
        vm.storage_gb,
        vm.address.as_deref().unwrap_or("-"),
        if actions.is_empty() { "-" } else { actions.as_str() },
    )
}

pub fn format_request_row(req: &VmRequestInfo) -> String {
    let status = match req.status {
        RequestStatus::Pending => "\x1b[33mpending\x1b[0m",
        RequestStatus::Approved => "\x1b[32mapproved\x1b[0m",
        RequestStatus::Rejected => "\x1b[31mrejected\x1b[0m",
    };
    format!(
        "{:<36}  {}  {} vCPU / {} MiB / {} GiB for {} days  {}{}",
        req.id,
        status,
        req.shape.vcpus,
        req.shape.memory_mb,
        req.shape.storage_gb,
        req.shape.duration_days,
        req.purpose,
        req.response
            .as_deref()
            .map(|r| format!("  \x1b[90m({})\x1b[0m", r))
            .unwrap_or_default(),
    )
}

pub fn describe_decision(decision: &Decision) -> String {
    match decision {
        Decision::Pending => "pending: session still resolving".to_string(),
        Decision::Render => "render".to_string(),
        Decision::RedirectToLogin { return_to } => {
            format!("redirect to /login (then back to {})", return_to)
        }
        Decision::RedirectToHome { location } => format!("redirect to {}", location),
    }
}

// ============================================================================
// VMs
// ============================================================================

pub async fn list_vms(client: &ApiClient) -> Result<()> {
    let vms: Vec<VmInfo> = client.get("/vms").await?;
    if vms.is_empty() {
        println!("\x1b[90mNo virtual machines\x1b[0m");
        return Ok(());
    }
    for vm in &vms {
        println!("\x1b[{}m●\x1b[0m {}", state_color(vm.state), format_vm_row(vm));
    }
    Ok(())
}

pub async fn show_vm(client: &ApiClient, id: &str) -> Result<()> {
    let vm: VmInfo = client.get(&format!("/vms/{}", id)).await?;
    println!("{} ({})", vm.name, vm.id);
    println!(
        "  State:   \x1b[{}m{}\x1b[0m  (reported: {})",
        state_color(vm.state),
        vm.state.label(),
        vm.raw_status
    );
    println!("  OS:      {}", vm.os);
    println!(
        "  Size:    {} vCPU, {} MiB RAM, {} GiB disk",
        vm.vcpus, vm.memory_mb, vm.storage_gb
    );
    if let Some(address) = &vm.address {
        println!("  Address: {}", address);
    }
    if let Some(course) = &vm.course {
        println!("  Course:  {}", course);
    }
    Ok(())
}

pub async fn vm_action(client: &ApiClient, id: &str, action: VmAction) -> Result<()> {
    let vm: VmInfo = client
        .post_empty(&format!("/vms/{}/actions/{}", id, action))
        .await?;
    match action {
        VmAction::Connect => match &vm.address {
            Some(address) => println!("{}", address),
            None => println!("\x1b[33mVM has no address yet\x1b[0m"),
        },
        VmAction::Delete => println!("\x1b[32m✅ Deleted {}\x1b[0m", vm.name),
        _ => println!("\x1b[32m✅ {} is now {}\x1b[0m", vm.name, vm.state.label()),
    }
    Ok(())
}

// ============================================================================
// Requests
// ============================================================================

pub async fn list_requests(client: &ApiClient) -> Result<()> {
    let requests: Vec<VmRequestInfo> = client.get("/requests").await?;
    if requests.is_empty() {
        println!("\x1b[90mNo VM requests\x1b[0m");
        return Ok(());
    }
    for req in &requests {
        println!("{}", format_request_row(req));
    }
    Ok(())
}

pub async fn create_request(
    client: &ApiClient,
    purpose: String,
    shape: ResourceShape,
    course: Option<String>,
) -> Result<()> {
    shape.validate()?;
    let created: VmRequestInfo = client
        .post("/requests", &NewVmRequest { purpose, shape, course })
        .await?;
    println!("\x1b[32m✅ Request {} submitted\x1b[0m", created.id);
    Ok(())
}

pub async fn decide_request(
    client: &ApiClient,
    id: &str,
    decision: RequestDecision,
    message: Option<String>,
) -> Result<()> {
    let decided: VmRequestInfo = client
        .post(
            &format!("/requests/{}/decision", id),
            &DecisionRequest { decision, message },
        )
        .await?;
    println!("{}", format_request_row(&decided));
    Ok(())
}

pub async fn respond_to_request(client: &ApiClient, id: &str, message: String) -> Result<()> {
    let updated: VmRequestInfo = client
        .patch(&format!("/requests/{}/response", id), &ResponseUpdate { message })
        .await?;
    println!("{}", format_request_row(&updated));
    Ok(())
}

// ============================================================================
// Navigation
// ============================================================================

/// Show what the dashboard does when the signed-in user opens `path`
pub async fn open(client: &ApiClient, path: &str) -> Result<()> {
    let views = ViewTable::default();

    // Placeholder while the session check is in flight
    println!("\x1b[90m{}\x1b[0m", describe_decision(&Decision::Pending));

    let session = auth::resolve_session(client, SESSION_CHECK_TIMEOUT).await?;
    let decision = views.navigate(&session, path);
    println!("{} → {}", path, describe_decision(&decision));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm(state: VmState, address: Option<&str>) -> VmInfo {
        VmInfo {
            id: "vm-1".to_string(),
            name: "os-lab-01".to_string(),
            owner_id: "u-1".to_string(),
            raw_status: state.as_str().to_string(),
            state,
            actions: state.available_actions(false),
            os: "debian".to_string(),
            vcpus: 2,
            memory_mb: 2048,
            storage_gb: 20,
            address: address.map(str::to_string),
            course: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_vm_row_shows_state_address_and_actions() {
        let row = format_vm_row(&vm(VmState::Running, Some("10.1.2.3")));
        assert!(row.contains("Running"));
        assert!(row.contains("10.1.2.3"));
        assert!(row.contains("stop,suspend,connect"));

        let row = format_vm_row(&vm(VmState::Suspended, None));
        assert!(row.contains("Suspended"));
        assert!(row.trim_end().ends_with('-'));
    }

    #[test]
    fn test_state_colors_follow_badges() {
        assert_eq!(state_color(VmState::Running), "32");
        assert_eq!(state_color(VmState::Error), "31");
        assert_eq!(state_color(VmState::Stopped), "90");
    }

    #[test]
    fn test_describe_decision() {
        assert_eq!(describe_decision(&Decision::Render), "render");
        assert_eq!(
            describe_decision(&Decision::RedirectToLogin {
                return_to: "/admin/users".to_string()
            }),
            "redirect to /login (then back to /admin/users)"
        );
        assert_eq!(
            describe_decision(&Decision::RedirectToHome {
                location: "/student".to_string()
            }),
            "redirect to /student"
        );
    }

    #[test]
    fn test_request_row_includes_response() {
        let req = VmRequestInfo {
            id: "r-1".to_string(),
            requester_id: "u-1".to_string(),
            requester_email: None,
            purpose: "Compilers lab".to_string(),
            shape: ResourceShape {
                vcpus: 4,
                memory_mb: 8192,
                storage_gb: 50,
                duration_days: 90,
            },
            course: None,
            status: RequestStatus::Rejected,
            response: Some("Quota exhausted".to_string()),
            created_at: None,
        };
        let row = format_request_row(&req);
        assert!(row.contains("rejected"));
        assert!(row.contains("4 vCPU / 8192 MiB / 50 GiB for 90 days"));
        assert!(row.contains("Quota exhausted"));
    }
}
