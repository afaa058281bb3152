//! Route guarding for dashboard views.
//!
//! `decide` is a pure function of the session state and a view's policy. It is
//! re-evaluated on every navigation and every session change; nothing here
//! reads ambient state.

use serde::{Deserialize, Serialize};

use crate::models::{Role, RoleName};

pub const LOGIN_PATH: &str = "/login";
pub const LANDING_PATH: &str = "/";

/// Authenticated principal as seen by the guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: RoleName,
}

/// Current authentication state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Session check still in flight
    Loading,
    Unauthenticated,
    Authenticated { user: SessionUser },
}

/// Access requirement attached to a view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Any authenticated user
    #[default]
    Any,
    Role(Role),
    AnyOf(Vec<Role>),
}

/// Outcome of a guard evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Render a placeholder and evaluate again once the session resolves
    Pending,
    Render,
    RedirectToLogin { return_to: String },
    RedirectToHome { location: String },
}

impl Policy {
    pub fn roles(&self) -> &[Role] {
        match self {
            Policy::Any => &[],
            Policy::Role(role) => std::slice::from_ref(role),
            Policy::AnyOf(roles) => roles,
        }
    }

    /// An `AnyOf` without roles places no requirement, same as `Any`.
    pub fn is_empty(&self) -> bool {
        self.roles().is_empty()
    }

    pub fn permits(&self, role: &RoleName) -> bool {
        if self.is_empty() {
            return true;
        }
        match role.known() {
            Some(role) => self.roles().contains(&role),
            None => false,
        }
    }
}

impl SessionState {
    pub fn authenticated(user: SessionUser) -> Self {
        SessionState::Authenticated { user }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            SessionState::Authenticated { user } => Some(user),
            _ => None,
        }
    }
}

impl Decision {
    /// Redirect target, if any. The login redirect keeps the requested path
    /// in `return_to` so the login flow can send the user back.
    pub fn location(&self) -> Option<&str> {
        match self {
            Decision::Pending | Decision::Render => None,
            Decision::RedirectToLogin { .. } => Some(LOGIN_PATH),
            Decision::RedirectToHome { location } => Some(location),
        }
    }

    pub fn is_render(&self) -> bool {
        matches!(self, Decision::Render)
    }
}

/// Default landing route for a role. Roles without a dedicated home land on
/// `/`, which never redirects again.
pub fn role_home(role: &RoleName) -> &'static str {
    match role.known() {
        Some(Role::Admin) => "/admin",
        Some(Role::Student) => "/student",
        _ => LANDING_PATH,
    }
}

pub fn decide(session: &SessionState, policy: &Policy, current_path: &str) -> Decision {
    match session {
        SessionState::Loading => Decision::Pending,
        SessionState::Unauthenticated => Decision::RedirectToLogin {
            return_to: current_path.to_string(),
        },
        SessionState::Authenticated { user } => {
            if policy.permits(&user.role) {
                Decision::Render
            } else {
                Decision::RedirectToHome {
                    location: role_home(&user.role).to_string(),
                }
            }
        }
    }
}

// ============================================================================
// Dashboard route table
// ============================================================================

/// Maps view paths to policies. Longest matching prefix wins; paths with no
/// entry require an authenticated user.
#[derive(Debug, Clone)]
pub struct ViewTable {
    routes: Vec<(String, Policy)>,
    public: Vec<String>,
}

impl Default for ViewTable {
    fn default() -> Self {
        Self::new()
            .public(LOGIN_PATH)
            .public("/register")
            .route("/admin", Policy::Role(Role::Admin))
            .route("/instructor", Policy::AnyOf(vec![Role::Instructor, Role::Admin]))
            .route("/student", Policy::Role(Role::Student))
            .route("/vms", Policy::Any)
            .route("/requests", Policy::Any)
            .route("/profile", Policy::Any)
            .route(LANDING_PATH, Policy::Any)
    }
}

impl ViewTable {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            public: Vec::new(),
        }
    }

    pub fn route(mut self, prefix: impl Into<String>, policy: Policy) -> Self {
        self.routes.push((prefix.into(), policy));
        self
    }

    pub fn public(mut self, prefix: impl Into<String>) -> Self {
        self.public.push(prefix.into());
        self
    }

    /// Policy for a path, `None` for public views. The path is normalized
    /// first, so `/ADMIN`, `//admin` and `/student/../admin` all resolve to
    /// the `/admin` entry.
    pub fn policy_for(&self, path: &str) -> Option<&Policy> {
        let path = normalize_path(path);
        if self.public.iter().any(|prefix| matches_prefix(&path, prefix)) {
            return None;
        }
        let matched = self
            .routes
            .iter()
            .filter(|(prefix, _)| matches_prefix(&path, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, policy)| policy);
        Some(matched.unwrap_or(&Policy::Any))
    }

    pub fn navigate(&self, session: &SessionState, path: &str) -> Decision {
        match self.policy_for(path) {
            Some(policy) => decide(session, policy, path),
            None => Decision::Render,
        }
    }
}

/// Canonical form used for matching: query and fragment dropped, empty and
/// `.` segments removed, `..` resolved, lowercase, always rooted.
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let mut segments: Vec<String> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other.to_lowercase()),
        }
    }
    format!("/{}", segments.join("/"))
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.to_lowercase();
    if prefix == LANDING_PATH {
        return true;
    }
    match path.strip_prefix(prefix.as_str()) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> SessionState {
        SessionState::authenticated(SessionUser {
            id: "u-1".to_string(),
            email: "someone@school.edu".to_string(),
            display_name: "Someone".to_string(),
            role: RoleName::from(role),
        })
    }

    #[test]
    fn test_loading_session_is_pending() {
        let decision = decide(&SessionState::Loading, &Policy::Role(Role::Admin), "/admin");
        assert_eq!(decision, Decision::Pending);
        assert_eq!(decision.location(), None);
    }

    #[test]
    fn test_unauthenticated_redirects_to_login_with_return_path() {
        let decision = decide(&SessionState::Unauthenticated, &Policy::Any, "/admin/users");
        assert_eq!(
            decision,
            Decision::RedirectToLogin {
                return_to: "/admin/users".to_string()
            }
        );
        assert_eq!(decision.location(), Some("/login"));
    }

    #[test]
    fn test_empty_policy_renders_for_every_role() {
        for role in ["admin", "instructor", "student", "auditor"] {
            assert_eq!(decide(&user(role), &Policy::Any, "/vms"), Decision::Render);
            assert_eq!(decide(&user(role), &Policy::AnyOf(vec![]), "/vms"), Decision::Render);
        }
    }

    #[test]
    fn test_student_denied_admin_view_goes_home() {
        let policy = Policy::AnyOf(vec![Role::Admin]);
        assert_eq!(
            decide(&user("student"), &policy, "/admin"),
            Decision::RedirectToHome {
                location: "/student".to_string()
            }
        );
    }

    #[test]
    fn test_required_role_renders_for_matching_user() {
        assert_eq!(
            decide(&user("admin"), &Policy::Role(Role::Admin), "/admin"),
            Decision::Render
        );
    }

    #[test]
    fn test_roles_without_home_fall_back_to_landing() {
        let policy = Policy::Role(Role::Student);
        assert_eq!(
            decide(&user("instructor"), &policy, "/student"),
            Decision::RedirectToHome {
                location: "/".to_string()
            }
        );
        assert_eq!(
            decide(&user("auditor"), &policy, "/student"),
            Decision::RedirectToHome {
                location: "/".to_string()
            }
        );
        assert_eq!(
            decide(&user("admin"), &policy, "/student").location(),
            Some("/admin")
        );
    }

    #[test]
    fn test_denied_role_never_renders() {
        let roles = [Role::Admin, Role::Instructor, Role::Student];
        for allowed in roles {
            for role in roles.iter().filter(|r| **r != allowed) {
                let decision = decide(&user(role.as_str()), &Policy::Role(allowed), "/x");
                assert!(!decision.is_render());
                assert_eq!(decision.location(), Some(role_home(&RoleName::Known(*role))));
            }
        }
    }

    #[test]
    fn test_decide_is_idempotent() {
        let session = user("student");
        let policy = Policy::Role(Role::Admin);
        assert_eq!(
            decide(&session, &policy, "/admin/users"),
            decide(&session, &policy, "/admin/users")
        );
    }

    #[test]
    fn test_view_table_longest_prefix() {
        let table = ViewTable::default();
        assert_eq!(table.policy_for("/admin/users"), Some(&Policy::Role(Role::Admin)));
        assert_eq!(table.policy_for("/administrator"), Some(&Policy::Any));
        assert_eq!(table.policy_for("/student?tab=vms"), Some(&Policy::Role(Role::Student)));
        assert_eq!(table.policy_for("/login"), None);
        assert_eq!(table.policy_for("/unknown"), Some(&Policy::Any));
    }

    #[test]
    fn test_view_table_navigation() {
        let table = ViewTable::default();
        assert_eq!(table.navigate(&SessionState::Unauthenticated, "/login"), Decision::Render);
        assert_eq!(
            table.navigate(&SessionState::Unauthenticated, "/admin/users"),
            Decision::RedirectToLogin {
                return_to: "/admin/users".to_string()
            }
        );
        assert_eq!(table.navigate(&user("instructor"), "/instructor/courses"), Decision::Render);
        assert_eq!(table.navigate(&user("admin"), "/instructor"), Decision::Render);
        assert_eq!(
            table.navigate(&user("student"), "/instructor").location(),
            Some("/student")
        );
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/Admin//Users/"), "/admin/users");
        assert_eq!(normalize_path("/student/../admin?x=1"), "/admin");
        assert_eq!(normalize_path("admin"), "/admin");
        assert_eq!(normalize_path("/../.."), "/");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn test_admin_path_spellings_never_render_for_student() {
        let table = ViewTable::default();
        for path in [
            "/admin",
            "/ADMIN",
            "/Admin/users",
            "//admin",
            "/./admin",
            "/student/../admin",
            "/login/../admin",
            "admin",
        ] {
            assert_eq!(
                table.navigate(&user("student"), path),
                Decision::RedirectToHome {
                    location: "/student".to_string()
                },
                "{path}"
            );
        }
        assert_eq!(table.navigate(&SessionState::Unauthenticated, "/LOGIN"), Decision::Render);
    }

    #[test]
    fn test_decision_serialization() {
        let json = serde_json::to_value(Decision::RedirectToLogin {
            return_to: "/admin".to_string(),
        })
        .unwrap();
        assert_eq!(json["decision"], "redirect_to_login");
        assert_eq!(json["return_to"], "/admin");

        let policy: Policy = serde_json::from_str(r#"{"any_of":["admin","instructor"]}"#).unwrap();
        assert_eq!(policy.roles(), &[Role::Admin, Role::Instructor]);
        let policy: Policy = serde_json::from_str("\"any\"").unwrap();
        assert!(policy.is_empty());
    }
}
