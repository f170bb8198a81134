use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod credit;
mod db;
mod ledger;
mod models;
mod report;
mod risk;

use models::{CachedMetrics, FinancialSnapshot, LoanScenario, TransactionKind};

#[derive(Parser)]
#[command(name = "credit-assessment")]
#[command(about = "Loan affordability and credit risk advisor for small businesses", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct LoanArgs {
    /// Loan amount in rupees
    #[arg(long, default_value_t = 500_000.0)]
    principal: f64,
    /// Repayment tenure in months
    #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u32).range(1..))]
    tenure: u32,
    /// Annual interest rate in percent
    #[arg(long, default_value_t = 12.0)]
    rate: f64,
    /// Snap the loan onto the simulator's slider ranges
    #[arg(long)]
    clamp: bool,
}

impl LoanArgs {
    fn scenario(&self) -> anyhow::Result<LoanScenario> {
        anyhow::ensure!(
            self.principal.is_finite() && self.principal > 0.0,
            "principal must be a positive amount"
        );
        anyhow::ensure!(
            self.rate.is_finite() && self.rate >= 0.0,
            "rate must not be negative"
        );
        let scenario = LoanScenario {
            principal: self.principal,
            tenure_months: self.tenure,
            annual_rate_percent: self.rate,
        };
        Ok(if self.clamp { scenario.clamped() } else { scenario })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo business with metrics and ledger rows
    Seed,
    /// Store a cached metrics JSON payload for a business
    ImportMetrics {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        json: PathBuf,
    },
    /// Import ledger rows from a CSV file
    ImportTransactions {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Assess a loan against a business's cached metrics
    Assess {
        #[arg(long)]
        user: Uuid,
        #[command(flatten)]
        loan: LoanArgs,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Assess a loan against figures given on the command line
    Simulate {
        #[arg(long)]
        balance: f64,
        #[arg(long)]
        revenue: f64,
        #[arg(long)]
        expenses: f64,
        #[arg(long, default_value_t = credit::DEFAULT_FORECAST_CONFIDENCE)]
        confidence: f64,
        #[command(flatten)]
        loan: LoanArgs,
        #[arg(long)]
        json: bool,
    },
    /// Write a markdown credit assessment report
    Report {
        #[arg(long)]
        user: Uuid,
        #[command(flatten)]
        loan: LoanArgs,
        /// Business name shown in the report header
        #[arg(long)]
        business: Option<String>,
        #[arg(long, default_value = "credit-assessment.md")]
        out: PathBuf,
    },
    /// List and filter ledger transactions
    Transactions {
        #[arg(long)]
        user: Uuid,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        /// Case-insensitive match on narration, transaction id or row id
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_enum)]
        kind: Option<TransactionKind>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Write the filtered rows to a CSV file instead of printing them
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_metrics(pool: &PgPool, user: Uuid) -> anyhow::Result<Option<CachedMetrics>> {
    let metrics = db::fetch_cached_metrics(pool, user).await?;
    if metrics.is_none() {
        tracing::warn!(%user, "no cached metrics found, assessing an empty snapshot");
    }
    Ok(metrics)
}

fn snapshot_of(metrics: Option<&CachedMetrics>) -> FinancialSnapshot {
    metrics.map(CachedMetrics::to_snapshot).unwrap_or_default()
}

fn print_assessment(snapshot: &FinancialSnapshot, loan: &LoanScenario, json: bool) -> anyhow::Result<()> {
    let result = credit::assess(snapshot, loan);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!(
        "Credit limit {} | safe EMI {}/mo ({}) | risk {}",
        report::format_inr(result.credit_limit),
        report::format_inr(result.safe_monthly_payment),
        result.safe_payment_basis.describe(),
        result.current_risk_tier.label
    );
    println!(
        "EMI {} over {} months at {:.1}%: {} of safe EMI ({})",
        report::format_inr_full(result.projected_installment),
        loan.tenure_months,
        loan.annual_rate_percent,
        report::format_ratio_percent(result.affordability_percent),
        result.affordability_status
    );
    println!(
        "Runway {} -> {} ({}), risk {} -> {}",
        report::format_runway(result.current_runway_months),
        report::format_runway(result.new_runway_months),
        report::format_runway_change(result.runway_change_months),
        result.current_risk_tier.label,
        result.new_risk_tier.label
    );
    println!("{}", result.recommendation.text);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            let user = db::seed(&pool).await?;
            println!("Seed data inserted for business {user}.");
        }
        Commands::ImportMetrics { user, json } => {
            let pool = connect().await?;
            let metrics = db::import_metrics_json(&pool, user, &json).await?;
            let snapshot = metrics.to_snapshot();
            println!(
                "Stored metrics for {user}: balance {}, revenue {}/mo, expenses {}/mo.",
                report::format_inr(snapshot.total_balance),
                report::format_inr(snapshot.monthly_revenue),
                report::format_inr(snapshot.monthly_expenses)
            );
        }
        Commands::ImportTransactions { user, csv } => {
            let pool = connect().await?;
            let inserted = db::import_transactions_csv(&pool, user, &csv).await?;
            println!("Inserted {inserted} transactions from {}.", csv.display());
        }
        Commands::Assess { user, loan, json } => {
            let loan = loan.scenario()?;
            let pool = connect().await?;
            let metrics = load_metrics(&pool, user).await?;
            let snapshot = snapshot_of(metrics.as_ref());
            print_assessment(&snapshot, &loan, json)?;
        }
        Commands::Simulate {
            balance,
            revenue,
            expenses,
            confidence,
            loan,
            json,
        } => {
            let loan = loan.scenario()?;
            let snapshot = FinancialSnapshot {
                total_balance: balance,
                monthly_revenue: revenue,
                monthly_expenses: expenses,
                forecast_confidence: confidence,
            };
            print_assessment(&snapshot, &loan, json)?;
        }
        Commands::Report {
            user,
            loan,
            business,
            out,
        } => {
            let loan = loan.scenario()?;
            let pool = connect().await?;
            let metrics = load_metrics(&pool, user).await?;
            let snapshot = snapshot_of(metrics.as_ref());
            let result = credit::assess(&snapshot, &loan);
            let label = business.unwrap_or_else(|| user.to_string());
            let report =
                report::build_report(&label, metrics.as_ref(), &snapshot, &loan, &result);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Transactions {
            user,
            limit,
            search,
            kind,
            category,
            mode,
            from,
            to,
            export,
        } => {
            let pool = connect().await?;
            let transactions = db::fetch_transactions(&pool, user, limit).await?;
            let filter = ledger::TransactionFilter {
                search,
                kind,
                category,
                mode,
                start_date: from,
                end_date: to,
            };
            let filtered = filter.apply(&transactions);
            tracing::debug!(fetched = transactions.len(), kept = filtered.len(), "filtered ledger");

            if let Some(path) = export {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                ledger::export_csv(&filtered, file)?;
                println!("Exported {} transactions to {}.", filtered.len(), path.display());
                return Ok(());
            }

            if filtered.is_empty() {
                println!("No transactions match these filters.");
                return Ok(());
            }

            for txn in &filtered {
                println!(
                    "- {} {} {} [{}] {} via {}",
                    txn.txn_date
                        .map(|date| date.to_string())
                        .unwrap_or_else(|| "undated".to_string()),
                    txn.kind.as_str(),
                    report::format_inr_full(txn.amount),
                    txn.category.as_deref().unwrap_or("Uncategorised"),
                    txn.narration.as_deref().unwrap_or(""),
                    txn.mode.as_deref().unwrap_or("unknown")
                );
            }
            println!(
                "{} shown, net flow {}. Categories: {}. Modes: {}.",
                filtered.len(),
                report::format_inr_full(ledger::net_flow(&filtered)),
                ledger::distinct_categories(&transactions).join(", "),
                ledger::distinct_modes(&transactions).join(", ")
            );
        }
    }

    Ok(())
}
