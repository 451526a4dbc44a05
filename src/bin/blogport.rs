use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use blogport_api::cascade::{soft_delete_patch, CascadeExecutor, CascadeOutcome};
use blogport_api::database::{DatabaseManager, PgStore};
use blogport_api::entities::EntityKind;

#[derive(Parser)]
#[command(name = "blogport", about = "Blogport admin data tools", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cascade-delete records and everything referencing them
    Delete {
        /// Entity kind (user, role, projectRoute, ...)
        #[arg(long)]
        entity: String,
        /// JSON where clause, e.g. '{"id": {"$in": [4]}}'
        #[arg(long)]
        filter: String,
        /// Only count direct dependents; delete nothing
        #[arg(long)]
        warning: bool,
        /// Run outside a transaction (matches the legacy service behavior)
        #[arg(long)]
        no_transaction: bool,
    },
    /// Cascade soft-delete: set isDeleted on records and their dependents
    SoftDelete {
        #[arg(long)]
        entity: String,
        #[arg(long)]
        filter: String,
        /// User id stamped into updatedBy on every touched row
        #[arg(long)]
        updated_by: Option<i64>,
        #[arg(long)]
        no_transaction: bool,
    },
    /// Preview direct dependent counts without mutating anything
    Count {
        #[arg(long)]
        entity: String,
        #[arg(long)]
        filter: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let result = run(cli.command).await;
    DatabaseManager::close().await;
    result
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Delete {
            entity,
            filter,
            warning,
            no_transaction,
        } => {
            let kind = parse_entity(&entity)?;
            let filter = parse_filter(&filter)?;
            let store = app_store().await?;

            if warning {
                let executor = CascadeExecutor::new(store);
                let counts = executor.cascade_count(kind, &filter).await?;
                print_counts(&counts);
                return Ok(());
            }

            if no_transaction {
                let executor = CascadeExecutor::new(store);
                let outcome = executor.cascade_delete(kind, &filter).await?;
                print_outcome("deleted", &outcome);
            } else {
                let executor = CascadeExecutor::new(store.begin().await?);
                let outcome = executor.cascade_delete(kind, &filter).await?;
                executor.into_store().commit().await?;
                print_outcome("deleted", &outcome);
            }
            Ok(())
        }
        Commands::SoftDelete {
            entity,
            filter,
            updated_by,
            no_transaction,
        } => {
            let kind = parse_entity(&entity)?;
            let filter = parse_filter(&filter)?;
            let patch = soft_delete_patch(updated_by);
            let store = app_store().await?;

            if no_transaction {
                let executor = CascadeExecutor::new(store);
                let outcome = executor.cascade_soft_delete(kind, &filter, &patch).await?;
                print_outcome("updated", &outcome);
            } else {
                let executor = CascadeExecutor::new(store.begin().await?);
                let outcome = executor.cascade_soft_delete(kind, &filter, &patch).await?;
                executor.into_store().commit().await?;
                print_outcome("updated", &outcome);
            }
            Ok(())
        }
        Commands::Count { entity, filter } => {
            let kind = parse_entity(&entity)?;
            let filter = parse_filter(&filter)?;
            let executor = CascadeExecutor::new(app_store().await?);
            let counts = executor.cascade_count(kind, &filter).await?;
            print_counts(&counts);
            Ok(())
        }
    }
}

async fn app_store() -> Result<PgStore> {
    let pool = DatabaseManager::app_pool()
        .await
        .context("connecting to the application database")?;
    Ok(PgStore::new(pool))
}

fn parse_entity(name: &str) -> Result<EntityKind> {
    match EntityKind::parse(name) {
        Some(kind) => Ok(kind),
        None => bail!(
            "unknown entity '{}'; expected one of: {}",
            name,
            EntityKind::ALL.map(|k| k.model_name()).join(", ")
        ),
    }
}

fn parse_filter(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).context("parsing --filter as JSON")
}

fn print_outcome(verb: &str, outcome: &CascadeOutcome) {
    match outcome {
        CascadeOutcome::NoMatch => println!("{}", json!({ "status": "no records found" })),
        CascadeOutcome::Affected(n) => println!("{}", json!({ verb: n })),
    }
}

fn print_counts(counts: &std::collections::BTreeMap<EntityKind, u64>) {
    let map: serde_json::Map<String, Value> = counts
        .iter()
        .map(|(kind, count)| (kind.model_name().to_string(), json!(count)))
        .collect();
    println!("{}", Value::Object(map));
}
