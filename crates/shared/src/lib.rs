pub mod access;
pub mod api;
pub mod models;
pub mod vm_state;

pub use access::{decide, role_home, Decision, Policy, SessionState, SessionUser, ViewTable};
pub use api::*;
pub use models::*;
pub use vm_state::{map_status, VmAction, VmState};
