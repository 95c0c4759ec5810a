//! Role-based navigation and page access.
//!
//! Every role maps to a fixed, ordered navigation list. Access to a page is
//! granted when its route sits at or below one of the role's route roots.

mod guard;

pub use guard::{guard, PageAccess};

use serde::Serialize;

use crate::types::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub route: &'static str,
    pub label: &'static str,
}

const fn nav(route: &'static str, label: &'static str) -> NavItem {
    NavItem { route, label }
}

const SUPER_ADMIN_NAV: &[NavItem] = &[
    nav("/super-admin", "Dashboard"),
    nav("/super-admin/users", "Users"),
    nav("/super-admin/projects", "Projects"),
    nav("/super-admin/leads", "Leads"),
    nav("/super-admin/banks", "Banks"),
    nav("/super-admin/telecallers", "Telecallers"),
    nav("/super-admin/documents", "Documents"),
    nav("/super-admin/notifications", "Notifications"),
];

const ADMIN_NAV: &[NavItem] = &[
    nav("/admin", "Dashboard"),
    nav("/admin/leads", "Leads"),
    nav("/admin/projects", "Projects"),
    nav("/admin/banks", "Banks"),
    nav("/admin/telecallers", "Telecallers"),
    nav("/admin/users", "Users"),
    nav("/admin/documents", "Documents"),
];

const BUILDER_NAV: &[NavItem] = &[
    nav("/builder", "Dashboard"),
    nav("/builder/projects", "Projects"),
    nav("/builder/leads", "Leads"),
    nav("/builder/telecallers", "Telecallers"),
    nav("/builder/documents", "Documents"),
];

const TELECALLER_NAV: &[NavItem] = &[
    nav("/telecaller", "Dashboard"),
    nav("/telecaller/leads", "My Leads"),
    nav("/telecaller/follow-ups", "Follow-ups"),
    nav("/telecaller/notifications", "Notifications"),
];

const BROKER_NAV: &[NavItem] = &[
    nav("/broker", "Dashboard"),
    nav("/broker/leads", "Leads"),
    nav("/broker/projects", "Projects"),
    nav("/broker/banks", "Banks"),
];

const CA_NAV: &[NavItem] = &[
    nav("/ca", "Dashboard"),
    nav("/ca/documents", "Documents"),
    nav("/ca/leads", "Leads"),
];

const USER_NAV: &[NavItem] = &[
    nav("/user", "Dashboard"),
    nav("/user/applications", "My Applications"),
    nav("/user/documents", "Documents"),
    nav("/user/notifications", "Notifications"),
];

/// Pages every signed-in role may open that are not in the sidebar
const SHARED_ROUTES: &[&str] = &["/profile", "/settings"];

/// Route roots reachable beyond a role's own navigation
const fn extra_roots(role: Role) -> &'static [&'static str] {
    match role {
        Role::SuperAdmin => &["/admin"],
        _ => &[],
    }
}

/// Ordered navigation for a role
pub const fn navigation(role: Role) -> &'static [NavItem] {
    match role {
        Role::SuperAdmin => SUPER_ADMIN_NAV,
        Role::Admin => ADMIN_NAV,
        Role::Builder => BUILDER_NAV,
        Role::Telecaller => TELECALLER_NAV,
        Role::Broker => BROKER_NAV,
        Role::Ca => CA_NAV,
        Role::User => USER_NAV,
    }
}

/// Navigation for an optional role; no role means no navigation
pub fn navigation_for(role: Option<Role>) -> Vec<NavItem> {
    role.map(|r| navigation(r).to_vec()).unwrap_or_default()
}

/// Navigation for a raw role code as reported by the backend
pub fn navigation_for_code(code: &str) -> Vec<NavItem> {
    navigation_for(Role::from_code(code))
}

/// Landing page after login
pub fn home_route(role: Role) -> &'static str {
    navigation(role)
        .first()
        .map(|item| item.route)
        .unwrap_or("/profile")
}

/// Page-level guard check
pub fn can_access(role: Option<Role>, route: &str) -> bool {
    let Some(role) = role else {
        return false;
    };
    let Some(route) = normalize_route(route) else {
        return false;
    };

    navigation(role)
        .iter()
        .map(|item| item.route)
        .chain(SHARED_ROUTES.iter().copied())
        .chain(extra_roots(role).iter().copied())
        .any(|root| is_at_or_below(&route, root))
}

/// Strips query/fragment and trailing slash; rejects dot segments
fn normalize_route(route: &str) -> Option<String> {
    let path = route
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();

    if path.split('/').any(|segment| segment == "." || segment == "..") {
        return None;
    }

    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    Some(normalized)
}

fn is_at_or_below(route: &str, root: &str) -> bool {
    route == root
        || (route.starts_with(root) && route.as_bytes().get(root.len()) == Some(&b'/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_has_navigation() {
        for role in Role::ALL {
            assert!(!navigation(role).is_empty(), "{} has no navigation", role);
        }
    }

    #[test]
    fn test_navigation_is_pure() {
        for role in Role::ALL {
            assert_eq!(navigation_for(Some(role)), navigation_for(Some(role)));
        }
    }

    #[test]
    fn test_unknown_or_missing_role_has_no_navigation() {
        assert!(navigation_for(None).is_empty());
        assert!(navigation_for_code("moderator").is_empty());
        assert_eq!(navigation_for_code("ca"), navigation(Role::Ca).to_vec());
    }

    #[test]
    fn test_every_nav_route_is_accessible() {
        for role in Role::ALL {
            for item in navigation_for(Some(role)) {
                assert!(
                    can_access(Some(role), item.route),
                    "{} cannot open its own link {}",
                    role,
                    item.route
                );
            }
        }
    }

    #[test]
    fn test_no_role_cannot_access_anything() {
        for role in Role::ALL {
            for item in navigation(role) {
                assert!(!can_access(None, item.route));
            }
        }
        assert!(!can_access(None, "/profile"));
    }

    #[test]
    fn test_cross_role_routes_are_denied() {
        assert!(!can_access(Some(Role::Telecaller), "/admin/banks"));
        assert!(!can_access(Some(Role::User), "/builder/projects"));
        assert!(!can_access(Some(Role::Broker), "/ca/documents"));
        assert!(!can_access(Some(Role::Admin), "/super-admin/users"));
    }

    #[test]
    fn test_nested_and_decorated_routes() {
        assert!(can_access(Some(Role::Admin), "/admin/leads/42"));
        assert!(can_access(Some(Role::Admin), "/admin/leads/?page=2"));
        assert!(can_access(Some(Role::Builder), "builder/projects#top"));
        assert!(can_access(Some(Role::SuperAdmin), "/admin/banks"));
        assert!(can_access(Some(Role::Ca), "/profile"));
    }

    #[test]
    fn test_prefix_must_end_at_segment_boundary() {
        assert!(!can_access(Some(Role::Admin), "/administrator"));
        assert!(!can_access(Some(Role::Ca), "/cart"));
    }

    #[test]
    fn test_dot_segments_are_denied() {
        assert!(!can_access(Some(Role::User), "/user/../admin"));
        assert!(!can_access(Some(Role::User), "/user/./documents"));
    }

    #[test]
    fn test_home_route_is_first_nav_item() {
        assert_eq!(home_route(Role::Telecaller), "/telecaller");
        assert_eq!(home_route(Role::SuperAdmin), "/super-admin");
    }
}
