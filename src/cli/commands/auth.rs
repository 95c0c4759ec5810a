use clap::Subcommand;
use serde_json::json;

use crate::app::App;
use crate::cli::utils::{client_error, output_success, prompt_line};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to the backend")]
    Login {
        #[arg(help = "Username")]
        username: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Logout and forget the stored session")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Show current user information")]
    Whoami,
}

pub async fn handle(cmd: AuthCommands, app: &App, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt_line("Password: ")?,
            };

            let principal = app.login(&username, &password).await.map_err(client_error)?;
            output_success(
                output_format,
                &format!("Logged in as {} ({})", principal.display_name(), principal.role.label()),
                Some(json!({
                    "user": principal,
                    "home": crate::roles::home_route(principal.role),
                })),
            )
        }
        AuthCommands::Logout => {
            app.logout().map_err(client_error)?;
            output_success(output_format, "Logged out", None)
        }
        AuthCommands::Status => {
            let session = app.session().current_session();
            let message = match (&session, app.session_expired()) {
                (Some(session), _) => format!(
                    "Authenticated as {} ({})",
                    session.principal.username,
                    session.principal.role.label()
                ),
                (None, true) => "Session expired. Please log in again.".to_string(),
                (None, false) => "Not authenticated".to_string(),
            };

            output_success(
                output_format,
                &message,
                Some(json!({
                    "authenticated": session.is_some(),
                    "expired": app.session_expired(),
                    "role": session.as_ref().map(|s| s.principal.role),
                    "logged_in_at": session.as_ref().and_then(|s| s.logged_in_at),
                    "api_url": app.config().api.base_url,
                })),
            )
        }
        AuthCommands::Whoami => {
            let principal = app
                .current_principal()
                .ok_or_else(|| anyhow::anyhow!("Not authenticated. Run 'lendflow auth login <username>' first"))?;

            match output_format {
                OutputFormat::Json => crate::cli::utils::output_value(&json!({ "user": principal })),
                OutputFormat::Text => {
                    println!("Username: {}", principal.username);
                    println!("Name:     {}", principal.display_name());
                    println!("Email:    {}", principal.email);
                    println!("Role:     {} ({})", principal.role.label(), principal.role.code());
                    Ok(())
                }
            }
        }
    }
}
