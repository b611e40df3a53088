use std::process::ExitCode;

use clap::Parser;
use recordindex::{IndexerConfig, IndexerService};
use recordindex_error::RecordIndexError;
use recordindex_types::{CollectionConfig, Schema};
use serde_json::{json, Value};

#[derive(Debug, clap::Subcommand)]
enum IndexerCommand {
    /// Create the index of a table if it is missing and merge in its schema
    Ensure {
        table: String,
        #[arg(long)]
        schema: Option<String>,
        #[arg(long)]
        primary_key: Option<String>,
        #[arg(long)]
        shards: Option<u32>,
        #[arg(long)]
        replicas: Option<u32>,
        #[arg(long)]
        config_set: Option<String>,
    },
    /// Merge a schema into the index of a table, or replace it with --replace
    UpdateSchema {
        table: String,
        #[arg(long)]
        schema: String,
        #[arg(long)]
        primary_key: Option<String>,
        #[arg(long, default_value = "false")]
        replace: bool,
    },
    ShowSchema {
        table: String,
    },
    /// Delete the index of a table and its config-set
    Drop {
        table: String,
    },
    Exists {
        table: String,
    },
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Defaults to $RECORDINDEX_CONFIG_PATH, then ./indexer_config.yaml
    #[arg(short, long)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: IndexerCommand,
}

fn schema_json(schema: &Schema) -> Value {
    json!({
        "uniqueKey": schema.unique_key(),
        "fields": schema
            .iter()
            .map(|field| Value::Object(field.to_properties()))
            .collect::<Vec<_>>(),
    })
}

async fn run(
    service: &IndexerService,
    command: IndexerCommand,
) -> Result<(), Box<dyn RecordIndexError>> {
    match command {
        IndexerCommand::Ensure {
            table,
            schema,
            primary_key,
            shards,
            replicas,
            config_set,
        } => {
            let schema = schema
                .map(|schema| Schema::parse(primary_key.as_deref(), &schema))
                .transpose()
                .map_err(|err| err.boxed())?;
            let config = CollectionConfig::builder()
                .collection_name(table.as_str())
                .shards(shards.unwrap_or(service.config().shards))
                .replicas(replicas.unwrap_or(service.config().replicas))
                .maybe_config_set(config_set)
                .maybe_schema(schema)
                .build()
                .map_err(|err| err.boxed())?;
            let outcome = service
                .ensure_table_index(&config)
                .await
                .map_err(|err| err.boxed())?;
            println!("{table}: {outcome:?}");
        }
        IndexerCommand::UpdateSchema {
            table,
            schema,
            primary_key,
            replace,
        } => {
            let schema =
                Schema::parse(primary_key.as_deref(), &schema).map_err(|err| err.boxed())?;
            service
                .update_schema(&table, &schema, !replace)
                .await
                .map_err(|err| err.boxed())?;
            println!("{table}: schema updated");
        }
        IndexerCommand::ShowSchema { table } => {
            let schema = service.get_schema(&table).await.map_err(|err| err.boxed())?;
            println!("{:#}", schema_json(&schema));
        }
        IndexerCommand::Drop { table } => {
            let outcome = service
                .delete_collection(&table)
                .await
                .map_err(|err| err.boxed())?;
            println!("{table}: {outcome:?}");
        }
        IndexerCommand::Exists { table } => {
            let collection = service
                .collection_exists(&table)
                .await
                .map_err(|err| err.boxed())?;
            let config_set = service
                .collection_config_exists(&table)
                .await
                .map_err(|err| err.boxed())?;
            println!("{table}: collection={collection} config_set={config_set}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match &args.config_path {
        Some(path) => IndexerConfig::load_from_path(path),
        None => IndexerConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = recordindex_tracing::init_stdout_tracing(&[]) {
        eprintln!("Failed to initialize logging: {err}");
    }

    let service = match IndexerService::new(config) {
        Ok(service) => service,
        Err(err) => {
            tracing::error!(error = %err, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let result = run(&service, args.command).await;
    if let Err(err) = service.destroy().await {
        tracing::warn!(error = %err, "Failed to close the Solr client");
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(code = err.code().name(), error = %err, "Command failed");
            ExitCode::FAILURE
        }
    }
}
