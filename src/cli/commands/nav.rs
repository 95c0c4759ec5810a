use clap::Subcommand;
use serde_json::json;

use crate::app::App;
use crate::cli::utils::output_value;
use crate::cli::OutputFormat;
use crate::roles::{self, PageAccess};
use crate::types::Role;

#[derive(Subcommand)]
pub enum NavCommands {
    #[command(about = "Show the navigation menu for a role")]
    Show {
        #[arg(long, help = "Role code (defaults to the logged-in user's role)")]
        role: Option<String>,
    },

    #[command(about = "Check whether a role may open a route")]
    Check {
        #[arg(help = "Route, e.g. /builder/projects")]
        route: String,
        #[arg(long, help = "Role code (defaults to the logged-in user's role)")]
        role: Option<String>,
    },
}

pub fn handle(cmd: NavCommands, app: &App, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        NavCommands::Show { role } => {
            let role = resolve_role(app, role.as_deref())?;
            let items = roles::navigation_for(role);

            match output_format {
                OutputFormat::Json => output_value(&json!({
                    "role": role,
                    "navigation": items,
                })),
                OutputFormat::Text => {
                    match role {
                        Some(role) => println!("{} navigation:", role.label()),
                        None => println!("Not authenticated: no navigation"),
                    }
                    for item in &items {
                        println!("  {:<28} {}", item.route, item.label);
                    }
                    Ok(())
                }
            }
        }
        NavCommands::Check { route, role } => {
            let (role, outcome) = match role.as_deref() {
                Some(code) => {
                    let role = parse_role(code)?;
                    let outcome = if roles::can_access(Some(role), &route) {
                        Outcome::Granted
                    } else {
                        Outcome::Denied
                    };
                    (Some(role), outcome)
                }
                None => (app.role(), Outcome::from(&app.guard(&route))),
            };

            match output_format {
                OutputFormat::Json => output_value(&json!({
                    "route": route,
                    "role": role,
                    "access": outcome.as_str(),
                    "redirect": outcome.redirect(),
                })),
                OutputFormat::Text => {
                    let who = role.map(|r| r.label()).unwrap_or("Anonymous");
                    match outcome {
                        Outcome::Granted => println!("✓ {} may open {}", who, route),
                        Outcome::Unauthenticated => {
                            println!("✗ {} requires login (redirect to /login)", route)
                        }
                        Outcome::Denied => println!("✗ {} may not open {}", who, route),
                    }
                    Ok(())
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Granted,
    Unauthenticated,
    Denied,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Granted => "granted",
            Outcome::Unauthenticated => "unauthenticated",
            Outcome::Denied => "denied",
        }
    }

    fn redirect(&self) -> Option<&'static str> {
        match self {
            Outcome::Unauthenticated => PageAccess::Unauthenticated.redirect(),
            _ => None,
        }
    }
}

impl From<&PageAccess> for Outcome {
    fn from(access: &PageAccess) -> Self {
        match access {
            PageAccess::Granted(_) => Outcome::Granted,
            PageAccess::Unauthenticated => Outcome::Unauthenticated,
            PageAccess::Denied { .. } => Outcome::Denied,
        }
    }
}

fn parse_role(code: &str) -> anyhow::Result<Role> {
    Role::from_code(code).ok_or_else(|| {
        let known: Vec<_> = Role::ALL.iter().map(|r| r.code()).collect();
        anyhow::anyhow!("Unknown role '{}' (expected one of: {})", code, known.join(", "))
    })
}

fn resolve_role(app: &App, code: Option<&str>) -> anyhow::Result<Option<Role>> {
    match code {
        Some(code) => parse_role(code).map(Some),
        None => Ok(app.role()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("telecaller").unwrap(), Role::Telecaller);
        let err = parse_role("moderator").unwrap_err().to_string();
        assert!(err.contains("super_admin"));
    }

    #[test]
    fn test_outcome_from_access() {
        assert_eq!(Outcome::from(&PageAccess::Unauthenticated).redirect(), Some("/login"));
        let denied = PageAccess::Denied { route: "/admin".to_string() };
        assert_eq!(Outcome::from(&denied).as_str(), "denied");
        assert_eq!(Outcome::Granted.redirect(), None);
    }
}
