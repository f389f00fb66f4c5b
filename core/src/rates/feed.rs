//! Machine-readable rate sheets (semicolon-delimited, French decimals).
//!
//! Expected header columns (by name):
//! - DATE_DEBUT, DATE_FIN (dd/mm/yyyy; empty end = still in force)
//! - P_SOUSCRITE (kVA)
//! - PART_FIXE_TTC (annual subscription, €)
//! - PART_VARIABLE_TTC, or PART_VARIABLE_HP_TTC + PART_VARIABLE_HC_TTC (€/kWh)

use crate::{
    error::{LedgerError, LedgerResult},
    plan::TariffPlan,
    store::RateScheduleRow,
    types::far_future,
};
use chrono::NaiveDate;
use csv::StringRecord;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const SUBSCRIPTION_DIGITS: u32 = 2;
pub const PRICE_DIGITS: u32 = 4;

/// Parse a rate sheet into day-kind 0 rows for `plan`. Rows without a
/// start date are dropped; rows with unreadable amounts are dropped with a
/// warning.
pub fn parse_rate_feed(plan: TariffPlan, content: &str) -> LedgerResult<Vec<RateScheduleRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers: StringRecord = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim())
        .collect();
    let single_price = headers.iter().any(|h| h == "PART_VARIABLE_TTC");

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        match record_to_row(plan, &record, &headers, single_price) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => {}
            Err(e) => log::warn!("rates: {plan} feed line {}: {e}", line + 2),
        }
    }
    Ok(rows)
}

fn record_to_row(
    plan: TariffPlan,
    record: &StringRecord,
    headers: &StringRecord,
    single_price: bool,
) -> LedgerResult<Option<RateScheduleRow>> {
    let get = |name: &str| field(record, headers, name);

    let start = get("DATE_DEBUT");
    if start.is_empty() {
        return Ok(None);
    }
    let start = dmy_to_date(start)?;
    let end = match get("DATE_FIN") {
        "" => far_future(),
        dmy => dmy_to_date(dmy)?,
    };

    let power = decimal_to_fixed(get("P_SOUSCRITE"), 0)?;
    let power = u32::try_from(power).map_err(|_| LedgerError::InvalidDecimal {
        value: get("P_SOUSCRITE").to_string(),
    })?;
    let subscription = decimal_to_fixed(get("PART_FIXE_TTC"), SUBSCRIPTION_DIGITS)?;
    let (peak_price, offpeak_price) = if single_price {
        let price = decimal_to_fixed(get("PART_VARIABLE_TTC"), PRICE_DIGITS)?;
        (price, price)
    } else {
        (
            decimal_to_fixed(get("PART_VARIABLE_HP_TTC"), PRICE_DIGITS)?,
            decimal_to_fixed(get("PART_VARIABLE_HC_TTC"), PRICE_DIGITS)?,
        )
    };

    Ok(Some(RateScheduleRow {
        plan,
        start,
        power,
        subscription,
        day_kind: 0,
        peak_price,
        offpeak_price,
        end,
    }))
}

/// Trimmed value of the named column, empty when absent.
fn field<'r>(record: &'r StringRecord, headers: &StringRecord, name: &str) -> &'r str {
    headers
        .iter()
        .position(|h| h == name)
        .and_then(|idx| record.get(idx))
        .map(str::trim)
        .unwrap_or("")
}

/// `"01/08/2023"` → 2023-08-01.
pub fn dmy_to_date(value: &str) -> LedgerResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%d/%m/%Y").map_err(|e| LedgerError::InvalidDate {
        value:  value.to_string(),
        reason: e.to_string(),
    })
}

/// `"0,1740"` at 4 digits → 1740. Exact decimal scaling, truncated toward
/// zero.
pub fn decimal_to_fixed(value: &str, digits: u32) -> LedgerResult<i64> {
    let invalid = || LedgerError::InvalidDecimal { value: value.to_string() };
    let normalized = value.trim().replace(',', ".");
    if normalized.is_empty() {
        return Err(invalid());
    }
    let decimal = Decimal::from_str(&normalized).map_err(|_| invalid())?;
    let scale = Decimal::from(10_i64.pow(digits));
    decimal
        .checked_mul(scale)
        .map(|d| d.trunc())
        .and_then(|d| d.to_i64())
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_scaling_is_exact() {
        assert_eq!(decimal_to_fixed("0,1740", 4).unwrap(), 1740);
        assert_eq!(decimal_to_fixed("151,20", 2).unwrap(), 15120);
        // 0.29 * 100 is 28.999999999999996 in binary floating point.
        assert_eq!(decimal_to_fixed("0,29", 2).unwrap(), 29);
        assert_eq!(decimal_to_fixed("0,12345", 4).unwrap(), 1234);
        assert_eq!(decimal_to_fixed("6", 0).unwrap(), 6);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decimal_to_fixed("", 2).is_err());
        assert!(decimal_to_fixed("abc", 2).is_err());
    }
}
