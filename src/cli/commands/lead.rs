use clap::Subcommand;
use serde_json::json;

use crate::app::App;
use crate::cli::utils::{client_error, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum LeadCommands {
    #[command(about = "Assign a lead to a telecaller")]
    Assign {
        #[arg(help = "Lead ID")]
        lead_id: String,
        #[arg(help = "Telecaller ID")]
        telecaller_id: String,
    },
}

pub async fn handle(cmd: LeadCommands, app: &App, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        LeadCommands::Assign { lead_id, telecaller_id } => {
            let response = app
                .leads()
                .assign(&lead_id, &telecaller_id)
                .await
                .map_err(client_error)?;
            output_success(
                output_format,
                &format!("Lead {} assigned to telecaller {}", lead_id, telecaller_id),
                Some(json!({ "response": response })),
            )
        }
    }
}
