//! Canonical row types produced by the normalizer.
//!
//! A raw record is an ordered list of header/value pairs straight off the CSV
//! reader; canonical rows are the tagged, strongly-typed output of
//! [`crate::normalize`]. Dynamic maps never cross this boundary outward —
//! once a record has been normalized it is one of these two shapes.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;

/// One CSV data line, header-aligned but not yet type-checked.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub fields: Vec<(String, String)>,
    pub line_number: usize,
}

impl RawRecord {
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(h, _)| h.eq_ignore_ascii_case(header))
            .map(|(_, v)| v.as_str())
    }
}

/// Which table a dataset's rows belong in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    Transaction,
    Click,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub platform: Option<String>,
    pub category: Option<String>,
    pub product: String,
    pub status: Option<String>,
    pub sub_id: Option<String>,
    pub order_id: Option<String>,
    pub product_id: Option<String>,
    pub revenue: Decimal,
    pub commission: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub quantity: i32,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClickRow {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub channel: String,
    pub sub_id: Option<String>,
    pub clicks: i32,
    pub fingerprint: String,
}

/// Result of normalizing a single raw record.
#[derive(Debug, Clone)]
pub enum CanonicalRow {
    Transaction(TransactionRow),
    Click(ClickRow),
}
