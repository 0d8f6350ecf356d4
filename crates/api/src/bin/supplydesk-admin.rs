//! Operator commands: schema migration and one-shot job runs.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use supplydesk_api::app::{build_services, Backend};
use supplydesk_infra::config::AppConfig;
use supplydesk_infra::store::PostgresStore;
use supplydesk_observability::tracing::{init_with, LogFormat};

#[derive(Debug, Parser)]
#[command(name = "supplydesk-admin", about = "SupplyDesk maintenance commands")]
struct Cli {
    /// Configuration file (TOML), merged under SUPPLYDESK__* variables.
    #[arg(long, default_value = supplydesk_infra::config::DEFAULT_CONFIG_FILE)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply database migrations.
    Migrate,
    /// Notify borrowers about overdue and nearly due items.
    CheckOverdue,
    /// Notify staff about supplies at or below their minimum level.
    CheckLowStock {
        #[arg(long)]
        notify_admins: bool,
        #[arg(long)]
        notify_gso: bool,
    },
    /// Rebuild requestor/borrower analytics and print a summary.
    PopulateAnalytics,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config).context("failed to load configuration")?;
    init_with(LogFormat::from_json_flag(config.log.json));

    if let Command::Migrate = cli.command {
        let url = config
            .database
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .context("database.url is required for migrate")?;
        let store = PostgresStore::connect(url, config.database.max_connections)
            .await
            .context("failed to connect to postgres")?;
        store.migrate().await.context("failed to apply migrations")?;
        println!("Migrations applied.");
        return Ok(());
    }

    let services = build_services(&config).await?;
    if services.backend == Backend::InMemory {
        tracing::warn!("running against an empty in-memory store; set database.url");
    }
    let desk = services.desk;

    match cli.command {
        Command::Migrate => {}
        Command::CheckOverdue => {
            let report = desk.sweep_overdue(Utc::now().date_naive()).await?;
            println!(
                "Sent {} overdue notifications ({} alerts).",
                report.delivered, report.alerts
            );
        }
        Command::CheckLowStock {
            notify_admins,
            notify_gso,
        } => {
            let report = desk.check_low_stock(notify_admins, notify_gso).await?;
            if report.low_stock.is_empty() {
                println!("No low stock items found.");
            } else {
                println!("Found {} low stock items:", report.low_stock.len());
                for line in &report.low_stock {
                    println!(
                        "- {}: {} (min: {})",
                        line.name, line.quantity, line.min_stock_level
                    );
                }
                if !notify_admins && !notify_gso {
                    println!("No notifications sent; pass --notify-admins and/or --notify-gso.");
                } else {
                    println!("Sent {} notifications.", report.delivered);
                }
            }
        }
        Command::PopulateAnalytics => {
            let users = desk.rebuild_analytics().await?;
            let analytics = desk.analytics();
            println!("Analytics populated for {users} users.");
            for usage in analytics.most_requested(5) {
                if let Some(id) = usage.supply_id {
                    println!(
                        "- supply {id}: {} requests, {} borrowings",
                        usage.request_count, usage.borrow_count
                    );
                }
            }
        }
    }
    Ok(())
}
