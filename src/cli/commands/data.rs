use clap::Subcommand;
use serde_json::json;

use crate::app::App;
use crate::cli::utils::{
    client_error, output_collection, output_empty_collection, output_success, output_value,
    parse_filters, read_stdin_json,
};
use crate::cli::OutputFormat;
use crate::resources::Resource;

#[derive(Subcommand)]
pub enum DataCommands {
    #[command(about = "List a collection")]
    List {
        #[arg(help = "Resource name (leads, projects, telecallers, banks, documents, users, notifications)")]
        resource: Resource,
        #[arg(long = "filter", help = "Query filter as key=value (repeatable)")]
        filters: Vec<String>,
    },

    #[command(about = "Get a single record")]
    Get {
        #[arg(help = "Resource name")]
        resource: Resource,
        #[arg(help = "Record ID to retrieve")]
        id: String,
    },

    #[command(about = "Create record from stdin")]
    Create {
        #[arg(help = "Resource name")]
        resource: Resource,
    },

    #[command(about = "Update record from stdin")]
    Update {
        #[arg(help = "Resource name")]
        resource: Resource,
        #[arg(help = "Record ID to update")]
        id: String,
    },

    #[command(about = "Delete record")]
    Delete {
        #[arg(help = "Resource name")]
        resource: Resource,
        #[arg(help = "Record ID to delete")]
        id: String,
    },
}

pub async fn handle(cmd: DataCommands, app: &App, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        DataCommands::List { resource, filters } => {
            let filters = parse_filters(&filters)?;
            let collection = app
                .resource(resource)
                .list(&filters)
                .await
                .map_err(client_error)?;

            if collection.is_empty() {
                return output_empty_collection(
                    output_format,
                    resource.collection_field(),
                    &format!("No {} found", resource.collection_field()),
                );
            }
            output_collection(
                output_format,
                resource.collection_field(),
                &collection.items,
                collection.total,
            )
        }
        DataCommands::Get { resource, id } => {
            let record = app.resource(resource).get(&id).await.map_err(client_error)?;
            output_value(&record)
        }
        DataCommands::Create { resource } => {
            let body = read_stdin_json()?;
            let created = app
                .resource(resource)
                .create(body)
                .await
                .map_err(client_error)?;
            output_success(
                output_format,
                &format!("{} created", resource.label()),
                Some(json!({ "record": created })),
            )
        }
        DataCommands::Update { resource, id } => {
            let body = read_stdin_json()?;
            let updated = app
                .resource(resource)
                .update(&id, body)
                .await
                .map_err(client_error)?;
            output_success(
                output_format,
                &format!("{} {} updated", resource.label(), id),
                Some(json!({ "record": updated })),
            )
        }
        DataCommands::Delete { resource, id } => {
            app.resource(resource)
                .delete(&id)
                .await
                .map_err(client_error)?;
            output_success(
                output_format,
                &format!("{} {} deleted", resource.label(), id),
                Some(json!({ "id": id })),
            )
        }
    }
}
