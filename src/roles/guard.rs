use crate::error::ClientError;
use crate::types::Principal;

use super::can_access;

/// Outcome of checking a role-gated page before rendering it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAccess {
    Granted(Principal),
    /// No session: send the user to the login page
    Unauthenticated,
    /// Signed in, but the role may not open this route
    Denied { route: String },
}

impl PageAccess {
    pub fn is_granted(&self) -> bool {
        matches!(self, PageAccess::Granted(_))
    }

    /// Where the page should navigate instead of rendering, if anywhere
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            PageAccess::Unauthenticated => Some("/login"),
            _ => None,
        }
    }

    /// Maps 401/403 responses seen while loading a page onto an access outcome
    pub fn for_error(error: &ClientError, route: &str) -> Option<Self> {
        let request = error.as_request()?;
        if request.is_unauthorized() {
            Some(PageAccess::Unauthenticated)
        } else if request.is_forbidden() {
            Some(PageAccess::Denied {
                route: route.to_string(),
            })
        } else {
            None
        }
    }
}

pub fn guard(principal: Option<&Principal>, route: &str) -> PageAccess {
    match principal {
        None => PageAccess::Unauthenticated,
        Some(principal) if can_access(Some(principal.role), route) => {
            PageAccess::Granted(principal.clone())
        }
        Some(principal) => {
            tracing::debug!(role = %principal.role, route, "page access denied");
            PageAccess::Denied {
                route: route.to_string(),
            }
        }
    }
}
