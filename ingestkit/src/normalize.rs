//! The Row Normalizer (§4.1): column detection, type coercion, and derived
//! field computation. Converts a [`RawRecord`] into a canonical
//! [`TransactionRow`] or [`ClickRow`], or rejects it with a [`NormalizeError`].

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{NormalizeError, NormalizeResult};
use crate::fingerprint::{fingerprint_click, fingerprint_transaction};
use crate::row::{ClickRow, DatasetKind, RawRecord, TransactionRow};

/// Synonym tables. First matching synonym wins; `revenue` is listed before
/// `gross_value` so a record carrying both columns uses `revenue`.
const REVENUE_SYNONYMS: &[&str] = &["revenue", "receita", "valor bruto", "gross_value"];
const DATE_SYNONYMS: &[&str] = &["date", "data", "transaction_date"];
const PRODUCT_SYNONYMS: &[&str] = &["product", "produto"];
const PLATFORM_SYNONYMS: &[&str] = &["platform", "plataforma"];
const CATEGORY_SYNONYMS: &[&str] = &["category", "categoria"];
const COMMISSION_SYNONYMS: &[&str] = &["commission", "comissao", "comissão"];
const COST_SYNONYMS: &[&str] = &["cost", "custo"];
const QUANTITY_SYNONYMS: &[&str] = &["quantity", "quantidade", "qty"];
const SUB_ID_SYNONYMS: &[&str] = &["sub_id", "subid", "sub id"];
const ORDER_ID_SYNONYMS: &[&str] = &["order_id", "orderid", "order id"];
const PRODUCT_ID_SYNONYMS: &[&str] = &["product_id", "productid", "product id", "sku"];
const STATUS_SYNONYMS: &[&str] = &["status", "situacao", "situação"];
const CHANNEL_SYNONYMS: &[&str] = &["channel", "canal"];
const CLICKS_SYNONYMS: &[&str] = &["clicks", "cliques"];

fn find_field<'a>(record: &'a RawRecord, synonyms: &[&str]) -> Option<&'a str> {
    for synonym in synonyms {
        if let Some(value) = record
            .fields
            .iter()
            .find(|(h, _)| h.trim().eq_ignore_ascii_case(synonym))
            .map(|(_, v)| v.trim())
        {
            return Some(value);
        }
    }
    None
}

/// Parses a date in `YYYY-MM-DD`, `DD/MM/YYYY`, or combined `YYYY-MM-DD HH:MM:SS`.
/// The time component of the combined form, if present, is returned separately.
fn parse_date_and_time(raw: &str) -> Result<(NaiveDate, Option<NaiveTime>), NormalizeError> {
    let raw = raw.trim();

    if let Some((date_part, time_part)) = raw.split_once(' ') {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
            let time = NaiveTime::parse_from_str(time_part, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(time_part, "%H:%M"))
                .ok();
            return Ok((date, time));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok((date, None));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        return Ok((date, None));
    }

    Err(NormalizeError::InvalidDate(raw.to_string()))
}

/// Parses a locale-flexible decimal number: strips currency symbols and
/// whitespace, then disambiguates `.`/`,` thousands vs. decimal separators by
/// the position of the rightmost separator.
fn parse_decimal(raw: &str, field: &'static str) -> Result<Decimal, NormalizeError> {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == '-')
        .collect();
    let stripped = stripped.trim();

    if stripped.is_empty() {
        return Ok(Decimal::ZERO);
    }

    let last_dot = stripped.rfind('.');
    let last_comma = stripped.rfind(',');

    let normalized = match (last_dot, last_comma) {
        (Some(d), Some(c)) if c > d => {
            // rightmost separator is ',' and it's preceded by '.'s => ',' is decimal
            stripped.replace('.', "").replace(',', ".")
        }
        (Some(d), Some(c)) if d > c => {
            // rightmost separator is '.' and it's preceded by ','s => '.' is decimal
            stripped.replace(',', "")
        }
        (None, Some(_)) => stripped.replace(',', "."),
        _ => stripped.replace(',', ""),
    };

    Decimal::from_str(&normalized).map_err(|_| NormalizeError::InvalidNumber(raw.to_string(), field))
}

fn parse_int(raw: &str, field: &'static str, default: i32) -> Result<i32, NormalizeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    let decimal = parse_decimal(trimmed, field)?;
    decimal
        .round()
        .to_string()
        .parse::<i32>()
        .map_err(|_| NormalizeError::InvalidNumber(raw.to_string(), field))
}

fn opt_str(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(|v| v.to_string())
}

pub fn normalize_transaction_row(record: &RawRecord) -> NormalizeResult<TransactionRow> {
    let date_raw = find_field(record, DATE_SYNONYMS).ok_or(NormalizeError::MissingField("date"))?;
    let (date, time) = parse_date_and_time(date_raw)?;

    let product = find_field(record, PRODUCT_SYNONYMS)
        .filter(|v| !v.is_empty())
        .ok_or(NormalizeError::MissingField("product"))?
        .to_string();

    let platform = opt_str(find_field(record, PLATFORM_SYNONYMS));
    let category = opt_str(find_field(record, CATEGORY_SYNONYMS));
    let status = opt_str(find_field(record, STATUS_SYNONYMS));
    let sub_id = opt_str(find_field(record, SUB_ID_SYNONYMS));
    let order_id = opt_str(find_field(record, ORDER_ID_SYNONYMS));
    let product_id = opt_str(find_field(record, PRODUCT_ID_SYNONYMS));

    let revenue = match find_field(record, REVENUE_SYNONYMS) {
        Some(v) => parse_decimal(v, "revenue")?,
        None => Decimal::ZERO,
    };
    let commission = match find_field(record, COMMISSION_SYNONYMS) {
        Some(v) => parse_decimal(v, "commission")?,
        None => Decimal::ZERO,
    };
    let cost = match find_field(record, COST_SYNONYMS) {
        Some(v) => parse_decimal(v, "cost")?,
        None => Decimal::ZERO,
    };
    let quantity = match find_field(record, QUANTITY_SYNONYMS) {
        Some(v) => parse_int(v, "quantity", 1)?,
        None => 1,
    };

    let profit = revenue - cost - commission;

    let fingerprint = fingerprint_transaction(
        &date.to_string(),
        platform.as_deref().unwrap_or(""),
        category.as_deref().unwrap_or(""),
        &product,
        status.as_deref().unwrap_or(""),
        sub_id.as_deref().unwrap_or(""),
        order_id.as_deref().unwrap_or(""),
        product_id.as_deref().unwrap_or(""),
    );

    Ok(TransactionRow {
        date,
        time,
        platform,
        category,
        product,
        status,
        sub_id,
        order_id,
        product_id,
        revenue,
        commission,
        cost,
        profit,
        quantity,
        fingerprint,
    })
}

pub fn normalize_click_row(record: &RawRecord) -> NormalizeResult<ClickRow> {
    let date_raw = find_field(record, DATE_SYNONYMS).ok_or(NormalizeError::MissingField("date"))?;
    let (date, time) = parse_date_and_time(date_raw)?;

    let channel = find_field(record, CHANNEL_SYNONYMS)
        .filter(|v| !v.is_empty())
        .ok_or(NormalizeError::MissingField("channel"))?
        .to_string();

    let sub_id = opt_str(find_field(record, SUB_ID_SYNONYMS));

    let clicks = match find_field(record, CLICKS_SYNONYMS) {
        Some(v) => parse_int(v, "clicks", 0)?,
        None => 0,
    };

    let fingerprint = fingerprint_click(&date.to_string(), &channel, sub_id.as_deref().unwrap_or(""));

    Ok(ClickRow {
        date,
        time,
        channel,
        sub_id,
        clicks,
        fingerprint,
    })
}

/// Dispatches to the transaction/click normalizer based on dataset type.
/// `Normalizer(Normalizer(x)) = Normalizer(x)` for already-canonical input
/// holds because both normalizers are pure functions of the raw field
/// values — re-running on a record built from a canonical row's own fields
/// reproduces the same output.
pub fn normalize(record: &RawRecord, kind: DatasetKind) -> NormalizeResult<crate::row::CanonicalRow> {
    match kind {
        DatasetKind::Transaction => normalize_transaction_row(record).map(crate::row::CanonicalRow::Transaction),
        DatasetKind::Click => normalize_click_row(record).map(crate::row::CanonicalRow::Click),
    }
}

/// Decodes raw upload bytes to UTF-8 text, attempting UTF-8, then Latin-1,
/// then ISO-8859-1, returning the first encoding that decodes cleanly.
pub fn decode_bytes(bytes: &[u8]) -> NormalizeResult<String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Ok(s.to_string());
    }

    // encoding_rs's WINDOWS_1252 is a strict superset of Latin-1/ISO-8859-1 (the WHATWG
    // encoding standard merges them); it never fails to decode a byte sequence, so it
    // serves as both the Latin-1 and ISO-8859-1 fallback passes.
    let (decoded, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
    if !had_errors {
        return Ok(decoded.into_owned());
    }

    Err(NormalizeError::UndecodableBytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        RawRecord {
            fields: pairs.iter().map(|(h, v)| (h.to_string(), v.to_string())).collect(),
            line_number: 1,
        }
    }

    #[test]
    fn normalizes_happy_path_transaction_row() {
        let r = record(&[
            ("date", "2024-01-01"),
            ("product", "P1"),
            ("revenue", "100"),
            ("cost", "40"),
            ("commission", "10"),
        ]);
        let row = normalize_transaction_row(&r).unwrap();
        assert_eq!(row.revenue, Decimal::from(100));
        assert_eq!(row.profit, Decimal::from(50));
        assert_eq!(row.quantity, 1);
    }

    #[test]
    fn missing_product_rejects_row() {
        let r = record(&[("date", "2024-01-01"), ("revenue", "100")]);
        assert_eq!(normalize_transaction_row(&r), Err(NormalizeError::MissingField("product")));
    }

    #[test]
    fn revenue_precedes_gross_value_when_both_present() {
        let r = record(&[
            ("date", "2024-01-01"),
            ("product", "P1"),
            ("revenue", "100"),
            ("gross_value", "999"),
        ]);
        let row = normalize_transaction_row(&r).unwrap();
        assert_eq!(row.revenue, Decimal::from(100));
    }

    #[test]
    fn ddmmyyyy_date_parses() {
        let r = record(&[("date", "31/01/2024"), ("product", "P1")]);
        let row = normalize_transaction_row(&r).unwrap();
        assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn combined_date_time_splits_time_out() {
        let r = record(&[("date", "2024-01-01 13:45:00"), ("product", "P1")]);
        let row = normalize_transaction_row(&r).unwrap();
        assert_eq!(row.time, NaiveTime::from_hms_opt(13, 45, 0));
    }

    #[test]
    fn locale_decimal_comma_as_decimal_point() {
        assert_eq!(parse_decimal("1.234,56", "revenue").unwrap(), Decimal::new(123456, 2));
    }

    #[test]
    fn locale_decimal_dot_as_decimal_point() {
        assert_eq!(parse_decimal("1,234.56", "revenue").unwrap(), Decimal::new(123456, 2));
    }

    #[test]
    fn currency_symbol_and_whitespace_stripped() {
        assert_eq!(parse_decimal(" $1,234.56 ", "revenue").unwrap(), Decimal::new(123456, 2));
    }

    #[test]
    fn missing_numeric_coerces_to_zero() {
        let r = record(&[("date", "2024-01-01"), ("product", "P1")]);
        let row = normalize_transaction_row(&r).unwrap();
        assert_eq!(row.revenue, Decimal::ZERO);
        assert_eq!(row.cost, Decimal::ZERO);
    }

    #[test]
    fn click_row_normalizes() {
        let r = record(&[("date", "2024-01-01"), ("channel", "email"), ("clicks", "42")]);
        let row = normalize_click_row(&r).unwrap();
        assert_eq!(row.clicks, 42);
        assert_eq!(row.channel, "email");
    }

    #[test]
    fn idempotent_on_already_canonical_input() {
        let r = record(&[
            ("date", "2024-01-01"),
            ("product", "P1"),
            ("revenue", "100"),
            ("cost", "40"),
            ("commission", "10"),
        ]);
        let once = normalize_transaction_row(&r).unwrap();
        let rebuilt = record(&[
            ("date", &once.date.to_string()),
            ("product", &once.product),
            ("revenue", &once.revenue.to_string()),
            ("cost", &once.cost.to_string()),
            ("commission", &once.commission.to_string()),
        ]);
        let twice = normalize_transaction_row(&rebuilt).unwrap();
        assert_eq!(once.fingerprint, twice.fingerprint);
        assert_eq!(once.profit, twice.profit);
    }

    #[test]
    fn decodes_valid_utf8_directly() {
        assert_eq!(decode_bytes("hello".as_bytes()).unwrap(), "hello");
    }
}
