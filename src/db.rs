use anyhow::Context;
use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    CachedMetrics, FinancialHealth, ForecastData, MetricData, MonthlyAverages, Transaction,
    TransactionKind,
};

pub const DEMO_BUSINESS_ID: &str = "6f1c2b7e-4d1a-4c55-9a38-2f0d8e5b9c41";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Latest cached metrics for a business. A missing row is not an error: the
/// caller assesses against an empty snapshot.
pub async fn fetch_cached_metrics(
    pool: &PgPool,
    user_id: Uuid,
) -> anyhow::Result<Option<CachedMetrics>> {
    let row = sqlx::query(
        "SELECT metric_data, forecast_data \
         FROM credit_assessment.cached_metrics \
         WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch cached metrics")?;

    let Some(row) = row else {
        tracing::debug!(%user_id, "no cached metrics");
        return Ok(None);
    };

    let metric_data: Json<MetricData> = row.try_get("metric_data")?;
    let forecast_data: Option<Json<ForecastData>> = row.try_get("forecast_data")?;

    Ok(Some(CachedMetrics {
        metric_data: metric_data.0,
        forecast_data: forecast_data.map(|json| json.0),
    }))
}

pub async fn upsert_cached_metrics(
    pool: &PgPool,
    user_id: Uuid,
    metrics: &CachedMetrics,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO credit_assessment.cached_metrics (user_id, metric_data, forecast_data, updated_at)
        VALUES ($1, $2, $3, NOW())
        ON CONFLICT (user_id) DO UPDATE
        SET metric_data = EXCLUDED.metric_data,
            forecast_data = EXCLUDED.forecast_data,
            updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(Json(&metrics.metric_data))
    .bind(metrics.forecast_data.as_ref().map(Json))
    .execute(pool)
    .await
    .context("failed to store cached metrics")?;

    Ok(())
}

pub async fn import_metrics_json(
    pool: &PgPool,
    user_id: Uuid,
    path: &std::path::Path,
) -> anyhow::Result<CachedMetrics> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let metrics: CachedMetrics = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a metrics payload", path.display()))?;
    upsert_cached_metrics(pool, user_id, &metrics).await?;
    Ok(metrics)
}

pub async fn fetch_transactions(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<Transaction>> {
    let records = sqlx::query(
        "SELECT id, txn_id, amount, type, mode, narration, txn_date, category \
         FROM credit_assessment.transactions \
         WHERE user_id = $1 \
         ORDER BY txn_date DESC NULLS LAST \
         LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to fetch transactions")?;

    let mut transactions = Vec::with_capacity(records.len());
    for row in records {
        let kind: String = row.get("type");
        transactions.push(Transaction {
            id: row.get("id"),
            txn_id: row.get("txn_id"),
            amount: row.get("amount"),
            kind: TransactionKind::parse(&kind)
                .with_context(|| format!("unknown transaction type {kind}"))?,
            mode: row.get("mode"),
            narration: row.get("narration"),
            txn_date: row.get("txn_date"),
            category: row.get("category"),
        });
    }

    Ok(transactions)
}

async fn insert_transaction(
    pool: &PgPool,
    user_id: Uuid,
    txn: &Transaction,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO credit_assessment.transactions
        (id, user_id, txn_id, amount, type, mode, narration, txn_date, category, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (user_id, source_key) DO NOTHING
        "#,
    )
    .bind(txn.id)
    .bind(user_id)
    .bind(&txn.txn_id)
    .bind(txn.amount)
    .bind(txn.kind.as_str())
    .bind(&txn.mode)
    .bind(&txn.narration)
    .bind(txn.txn_date)
    .bind(&txn.category)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Dedup key for an imported row, unique per business. Rows with neither an
/// explicit key nor a bank transaction id are always inserted.
fn import_source_key(explicit: Option<String>, txn_id: Option<&str>) -> String {
    explicit
        .filter(|key| !key.is_empty())
        .or_else(|| txn_id.map(|id| format!("txn-{id}")))
        .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()))
}

pub async fn import_transactions_csv(
    pool: &PgPool,
    user_id: Uuid,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        txn_id: Option<String>,
        amount: f64,
        #[serde(rename = "type")]
        kind: TransactionKind,
        mode: Option<String>,
        narration: Option<String>,
        txn_date: Option<NaiveDate>,
        category: Option<String>,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let source_key = import_source_key(row.source_key, row.txn_id.as_deref());
        let txn = Transaction {
            id: Uuid::new_v4(),
            txn_id: row.txn_id,
            amount: row.amount,
            kind: row.kind,
            mode: row.mode,
            narration: row.narration,
            txn_date: row.txn_date,
            category: row.category,
        };

        if insert_transaction(pool, user_id, &txn, &source_key).await? {
            inserted += 1;
        }
    }

    tracing::info!(%user_id, inserted, path = %csv_path.display(), "imported transactions");
    Ok(inserted)
}

/// Loads a demo business: a profitable trader with a few months of ledger rows.
pub async fn seed(pool: &PgPool) -> anyhow::Result<Uuid> {
    let user_id = Uuid::parse_str(DEMO_BUSINESS_ID)?;

    let metrics = CachedMetrics {
        metric_data: MetricData {
            financial_health: Some(FinancialHealth {
                total_balance_raw: Some(1_000_000.0),
                runway_months: None,
                runway_status: Some("profitable".to_string()),
            }),
            monthly_averages: Some(MonthlyAverages {
                revenue_raw: Some(200_000.0),
                net_burn_raw: Some(-50_000.0),
                gross_expenses_raw: Some(150_000.0),
                is_profitable: Some(true),
            }),
            growth: None,
            volatility: None,
        },
        forecast_data: Some(ForecastData {
            confidence_raw: Some(0.72),
            predicted_runway_months: None,
        }),
    };
    upsert_cached_metrics(pool, user_id, &metrics).await?;

    let ledger = vec![
        ("seed-001", 185_000.0, TransactionKind::Credit, "NEFT", "Invoice 1042 Sharma Retail", (2026, 2, 3), "Sales"),
        ("seed-002", 45_000.0, TransactionKind::Debit, "NEFT", "Warehouse rent February", (2026, 2, 5), "Rent"),
        ("seed-003", 62_500.0, TransactionKind::Debit, "IMPS", "Payroll February", (2026, 2, 28), "Salaries"),
        ("seed-004", 12_400.0, TransactionKind::Debit, "Card", "Cloud accounting subscription", (2026, 3, 1), "Software"),
        ("seed-005", 210_000.0, TransactionKind::Credit, "UPI", "Invoice 1051 Patel Distributors", (2026, 3, 4), "Sales"),
    ];

    for (source_key, amount, kind, mode, narration, (y, m, d), category) in ledger {
        let txn = Transaction {
            id: Uuid::new_v4(),
            txn_id: Some(source_key.to_uppercase()),
            amount,
            kind,
            mode: Some(mode.to_string()),
            narration: Some(narration.to_string()),
            txn_date: Some(NaiveDate::from_ymd_opt(y, m, d).context("invalid date")?),
            category: Some(category.to_string()),
        };
        insert_transaction(pool, user_id, &txn, source_key).await?;
    }

    Ok(user_id)
}
