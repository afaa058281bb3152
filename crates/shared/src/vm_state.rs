//! Canonical VM lifecycle states.
//!
//! VM managers report status in their own vocabulary ("Domain is running",
//! "shut off", "poweroff", ...). Everything the dashboard shows or offers is
//! keyed on the five canonical states below instead of the raw string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical lifecycle state of a virtual machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmState {
    Running,
    Stopped,
    Suspended,
    Creating,
    /// Failed or unrecognized; never presented as healthy
    Error,
}

/// Lifecycle action offered on a VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmAction {
    Start,
    Stop,
    Suspend,
    Connect,
    Delete,
}

/// Classify a raw status string. Total: unknown or missing input is `Error`.
///
/// Matching is case-insensitive and runs in priority order, so
/// "running (paused pending)" is still `Running`. New backend vocabulary
/// must be added here explicitly.
pub fn map_status(raw: Option<&str>) -> VmState {
    let status = match raw {
        Some(s) => s.trim().to_lowercase(),
        None => return VmState::Error,
    };

    if status.contains("running") {
        VmState::Running
    } else if status.contains("shut off") || status.contains("shutoff") || status == "stopped" {
        VmState::Stopped
    } else if status.contains("paused") || status.contains("suspended") {
        VmState::Suspended
    } else if status.contains("creating") || status.contains("building") {
        VmState::Creating
    } else {
        VmState::Error
    }
}

impl VmState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VmState::Running => "running",
            VmState::Stopped => "stopped",
            VmState::Suspended => "suspended",
            VmState::Creating => "creating",
            VmState::Error => "error",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VmState::Running => "Running",
            VmState::Stopped => "Stopped",
            VmState::Suspended => "Suspended",
            VmState::Creating => "Creating",
            VmState::Error => "Error",
        }
    }

    /// Badge color token used by status badges
    pub fn badge(&self) -> &'static str {
        match self {
            VmState::Running => "green",
            VmState::Stopped => "gray",
            VmState::Suspended => "amber",
            VmState::Creating => "blue",
            VmState::Error => "red",
        }
    }

    /// Actions offered for this state. Deletion is administrative and is
    /// never offered while the VM is still being created.
    pub fn available_actions(&self, is_admin: bool) -> Vec<VmAction> {
        let mut actions = match self {
            VmState::Running => vec![VmAction::Stop, VmAction::Suspend, VmAction::Connect],
            VmState::Stopped => vec![VmAction::Start],
            VmState::Suspended | VmState::Error | VmState::Creating => Vec::new(),
        };
        if is_admin && *self != VmState::Creating {
            actions.push(VmAction::Delete);
        }
        actions
    }

    pub fn allows(&self, action: VmAction, is_admin: bool) -> bool {
        self.available_actions(is_admin).contains(&action)
    }
}

impl From<&str> for VmState {
    fn from(raw: &str) -> Self {
        map_status(Some(raw))
    }
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VmAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            VmAction::Start => "start",
            VmAction::Stop => "stop",
            VmAction::Suspend => "suspend",
            VmAction::Connect => "connect",
            VmAction::Delete => "delete",
        }
    }

    /// Status the VM manager reports once the action has been applied.
    /// `None` for actions that do not change the lifecycle state.
    pub fn reported_status(&self) -> Option<&'static str> {
        match self {
            VmAction::Start => Some("running"),
            VmAction::Stop => Some("shut off"),
            VmAction::Suspend => Some("paused"),
            VmAction::Connect | VmAction::Delete => None,
        }
    }
}

impl fmt::Display for VmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VmAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(VmAction::Start),
            "stop" => Ok(VmAction::Stop),
            "suspend" => Ok(VmAction::Suspend),
            "connect" => Ok(VmAction::Connect),
            "delete" => Ok(VmAction::Delete),
            _ => Err(format!(
                "invalid VM action: '{s}' (expected: start, stop, suspend, connect, delete)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_matches_anywhere_in_any_case() {
        for raw in ["running", "RUNNING", "Domain is running", "vm: Running (since 3h)"] {
            assert_eq!(map_status(Some(raw)), VmState::Running, "{raw}");
        }
    }

    #[test]
    fn test_stopped_vocabulary() {
        assert_eq!(map_status(Some("Shut off")), VmState::Stopped);
        assert_eq!(map_status(Some("shutoff")), VmState::Stopped);
        assert_eq!(map_status(Some("Shutoff")), VmState::Stopped);
        assert_eq!(map_status(Some("STOPPED")), VmState::Stopped);
        assert_eq!(map_status(Some("  stopped ")), VmState::Stopped);
        // "stopped" only matches exactly
        assert_eq!(map_status(Some("stopped unexpectedly")), VmState::Error);
    }

    #[test]
    fn test_suspended_and_creating_vocabulary() {
        assert_eq!(map_status(Some("paused")), VmState::Suspended);
        assert_eq!(map_status(Some("Suspended")), VmState::Suspended);
        assert_eq!(map_status(Some("domain suspended by admin")), VmState::Suspended);
        assert_eq!(map_status(Some("creating")), VmState::Creating);
        assert_eq!(map_status(Some("Building image")), VmState::Creating);
    }

    #[test]
    fn test_unknown_input_is_error() {
        assert_eq!(map_status(None), VmState::Error);
        assert_eq!(map_status(Some("")), VmState::Error);
        assert_eq!(map_status(Some("banana")), VmState::Error);
        assert_eq!(map_status(Some("poweroff")), VmState::Error);
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(map_status(Some("running, was paused")), VmState::Running);
        assert_eq!(map_status(Some("shut off while building")), VmState::Stopped);
        assert_eq!(map_status(Some("paused during creating")), VmState::Suspended);
    }

    #[test]
    fn test_mapping_is_idempotent() {
        for raw in ["Domain is running", "Shutoff", "", "paused", "???"] {
            let first = map_status(Some(raw));
            assert_eq!(first, map_status(Some(raw)));
            // mapping the canonical name again keeps the state
            assert_eq!(map_status(Some(first.as_str())), first);
        }
    }

    #[test]
    fn test_available_actions() {
        assert_eq!(
            VmState::Running.available_actions(false),
            vec![VmAction::Stop, VmAction::Suspend, VmAction::Connect]
        );
        assert_eq!(VmState::Stopped.available_actions(false), vec![VmAction::Start]);
        assert!(VmState::Suspended.available_actions(false).is_empty());
        assert!(VmState::Error.available_actions(false).is_empty());
        assert_eq!(VmState::Error.available_actions(true), vec![VmAction::Delete]);
        assert!(!VmState::Creating.allows(VmAction::Delete, true));
        assert!(VmState::Stopped.allows(VmAction::Delete, true));
        assert!(!VmState::Stopped.allows(VmAction::Delete, false));
    }

    #[test]
    fn test_action_reported_status_round_trips_through_mapper() {
        assert_eq!(map_status(VmAction::Start.reported_status()), VmState::Running);
        assert_eq!(map_status(VmAction::Stop.reported_status()), VmState::Stopped);
        assert_eq!(map_status(VmAction::Suspend.reported_status()), VmState::Suspended);
        assert_eq!(VmAction::Connect.reported_status(), None);
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(serde_json::to_string(&VmState::Suspended).unwrap(), "\"suspended\"");
        let action: VmAction = serde_json::from_str("\"connect\"").unwrap();
        assert_eq!(action, VmAction::Connect);
        assert_eq!("stop".parse::<VmAction>(), Ok(VmAction::Stop));
        assert!("reboot".parse::<VmAction>().is_err());
    }
}
