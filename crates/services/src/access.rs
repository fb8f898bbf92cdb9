//! Role gate for client-side pages.

use foodshare_db::models::Role;
use serde::Serialize;

pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub redirect: Option<String>,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            redirect: None,
        }
    }

    fn redirect(to: &str) -> Self {
        Self {
            allowed: false,
            redirect: Some(to.to_string()),
        }
    }
}

/// Decides whether a session with `role` (or none) may open `path`.
///
/// Landing, login and signup pages are open to everyone. Donation detail
/// pages need any signed-in user. `/donor/*` and `/ngo/*` need the matching
/// role; the wrong role is sent to its own dashboard.
pub fn check_access(path: &str, role: Option<Role>) -> AccessDecision {
    let path = normalize(path);

    if matches!(path, "/" | "/login" | "/signup") {
        return AccessDecision::allow();
    }

    let required = if in_section(path, "/donor") {
        Some(Role::Donor)
    } else if in_section(path, "/ngo") {
        Some(Role::Ngo)
    } else {
        None
    };

    match (role, required) {
        (None, _) => AccessDecision::redirect(LOGIN_PATH),
        (Some(role), Some(required)) if role != required => {
            AccessDecision::redirect(role.dashboard_path())
        }
        _ => AccessDecision::allow(),
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

fn in_section(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
