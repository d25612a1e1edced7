use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::warn;

mod db;
#[cfg(test)]
mod memory;
mod models;
mod report;
mod schedule;
mod sla;
mod store;
mod sweep;

#[derive(Parser)]
#[command(name = "grievance-sla-sweep")]
#[command(about = "SLA deadline tracking and automatic escalation for municipal grievances", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load departments, SLA rules and sample grievances
    Seed,
    /// Import SLA rules from a CSV file
    ImportRules {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List configured SLA rules
    Rules,
    /// Show the deadline a grievance filed now would receive
    DueDate {
        #[arg(long)]
        category: String,
        #[arg(long)]
        subcategory: Option<String>,
        /// Department code
        #[arg(long)]
        department: Option<String>,
    },
    /// Escalate every grievance past its SLA deadline once
    Sweep,
    /// Run the escalation sweep on a fixed interval until interrupted
    Watch {
        #[arg(
            long,
            env = "SLA_SWEEP_INTERVAL_SECS",
            default_value_t = 60,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        interval_secs: u64,
    },
    /// Generate a markdown escalation report
    Report {
        #[arg(long, default_value_t = 7)]
        since_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;
    let max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
        Ok(value) => value
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
        Err(_) => 5,
    };

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportRules { csv } => {
            let inserted = db::import_rules(&pool, &csv).await?;
            println!("Inserted {inserted} SLA rules from {}.", csv.display());
        }
        Commands::Rules => {
            let rules = db::fetch_sla_rules(&pool).await?;
            if rules.is_empty() {
                println!("No SLA rules configured.");
                return Ok(());
            }

            println!("Configured SLA rules:");
            for rule in &rules {
                let scope = match rule.department_id {
                    Some(id) => format!("department {id}"),
                    None => "all departments".to_string(),
                };
                println!(
                    "- [{}] {} ({}, {}) within {}, escalates to {}",
                    rule.id,
                    rule.category,
                    rule.priority,
                    scope,
                    sla::format_duration(rule.duration_seconds),
                    rule.escalation_role.as_str()
                );
            }
        }
        Commands::DueDate {
            category,
            subcategory,
            department,
        } => {
            let department = match department.as_deref() {
                Some(code) => Some(
                    db::department_by_code(&pool, code)
                        .await?
                        .with_context(|| format!("unknown department code {code}"))?,
                ),
                None => None,
            };
            let department_id = department.as_ref().map(|d| d.id);
            if let Some(d) = &department {
                if d.head_user_id.is_none() {
                    println!("Department has no head; breaches will not notify anyone.");
                }
            }
            let rules = db::fetch_sla_rules(&pool).await?;
            match sla::compute_sla_due_at(
                &rules,
                &category,
                subcategory.as_deref(),
                department_id,
                Utc::now(),
            ) {
                Some(due) => println!("SLA due at {}.", due.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("No SLA applies."),
            }
        }
        Commands::Sweep => {
            let store = db::PgStore::new(pool);
            sweep::run_sla_sweep(&store, Utc::now()).await;
            println!("Sweep complete.");
        }
        Commands::Watch { interval_secs } => {
            let store = db::PgStore::new(pool);
            let shutdown = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!("cannot listen for ctrl-c, running until killed: {err}");
                    std::future::pending::<()>().await;
                }
            };
            schedule::run_every(&store, Duration::from_secs(interval_secs), shutdown).await;
        }
        Commands::Report { since_days, out } => {
            let since = Utc::now() - chrono::Duration::days(since_days.max(1));
            let records = db::fetch_escalations(&pool, since).await?;
            let pending = db::count_overdue(&pool, Utc::now()).await?;
            let report = report::build_report(since, &records, pending);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
