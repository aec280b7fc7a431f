//! API-facing ad-spend models (§3 `AdSpend`, §4.6 Ad-Spend Allocator, §6).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{db::models::ad_spends::AdSpendDBResponse, types::AdSpendId};

#[derive(Debug, Deserialize)]
pub struct CreateAdSpendRequest {
    pub date: NaiveDate,
    pub sub_id: Option<String>,
    pub amount: Decimal,
    pub clicks: i64,
}

/// `POST /ad_spends/bulk` (§6): create many ad-spend rows in one call, e.g.
/// from a platform export.
#[derive(Debug, Deserialize)]
pub struct BulkCreateAdSpendRequest {
    pub items: Vec<CreateAdSpendRequest>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAdSpendRequest {
    pub amount: Option<Decimal>,
    pub clicks: Option<i64>,
}

fn decimal_as_string<S: serde::Serializer>(value: &Decimal, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&value.to_string())
}

#[derive(Debug, Serialize)]
pub struct AdSpendResponse {
    pub id: AdSpendId,
    pub date: NaiveDate,
    pub sub_id: Option<String>,
    #[serde(serialize_with = "decimal_as_string")]
    pub amount: Decimal,
    pub clicks: i64,
}

impl From<AdSpendDBResponse> for AdSpendResponse {
    fn from(a: AdSpendDBResponse) -> Self {
        Self {
            id: a.id,
            date: a.date,
            sub_id: a.sub_id,
            amount: a.amount,
            clicks: a.clicks,
        }
    }
}

/// `POST /ad_spends/{id}/allocate` request (§4.6): applies the ad spend's
/// cost across a dataset's transaction rows matching `sub_id`/`date`.
#[derive(Debug, Deserialize)]
pub struct AllocateAdSpendRequest {
    pub dataset_id: crate::types::DatasetId,
}

#[derive(Debug, Serialize)]
pub struct AllocateAdSpendResponse {
    pub ad_spend_id: AdSpendId,
    pub dataset_id: crate::types::DatasetId,
    pub rows_updated: i64,
    /// `true` if allocation had already been recorded for this
    /// `(ad_spend, dataset)` pair and this call was a no-op (§4.6).
    pub already_allocated: bool,
}
