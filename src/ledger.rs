use std::collections::BTreeSet;
use std::io::Write;

use chrono::NaiveDate;

use crate::models::{Transaction, TransactionKind};

/// Narrowing applied to the ledger view. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub search: Option<String>,
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    pub mode: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl TransactionFilter {
    pub fn matches(&self, txn: &Transaction) -> bool {
        if let Some(query) = self.search.as_deref().filter(|q| !q.is_empty()) {
            let needle = query.to_lowercase();
            let hit = |value: Option<&str>| {
                value.is_some_and(|text| text.to_lowercase().contains(&needle))
            };
            let id = txn.id.to_string();
            if !(hit(txn.narration.as_deref()) || hit(txn.txn_id.as_deref()) || hit(Some(id.as_str()))) {
                return false;
            }
        }

        if self.kind.is_some_and(|kind| kind != txn.kind) {
            return false;
        }
        if self.category.is_some() && self.category != txn.category {
            return false;
        }
        if self.mode.is_some() && self.mode != txn.mode {
            return false;
        }

        // Undated rows pass the date window.
        if let Some(date) = txn.txn_date {
            if self.start_date.is_some_and(|start| date < start) {
                return false;
            }
            if self.end_date.is_some_and(|end| date > end) {
                return false;
            }
        }

        true
    }

    pub fn apply(&self, transactions: &[Transaction]) -> Vec<Transaction> {
        transactions
            .iter()
            .filter(|txn| self.matches(txn))
            .cloned()
            .collect()
    }
}

pub fn distinct_categories(transactions: &[Transaction]) -> Vec<String> {
    distinct(transactions.iter().filter_map(|txn| txn.category.as_deref()))
}

pub fn distinct_modes(transactions: &[Transaction]) -> Vec<String> {
    distinct(transactions.iter().filter_map(|txn| txn.mode.as_deref()))
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Net of credits minus debits over the given rows.
pub fn net_flow(transactions: &[Transaction]) -> f64 {
    transactions
        .iter()
        .map(|txn| match txn.kind {
            TransactionKind::Credit => txn.amount,
            TransactionKind::Debit => -txn.amount,
        })
        .sum()
}

pub fn export_csv<W: Write>(transactions: &[Transaction], writer: W) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for txn in transactions {
        writer.serialize(txn)?;
    }
    writer.flush()?;
    Ok(())
}
