//! Rates that no machine-readable feed publishes, copied from the
//! suppliers' PDF price sheets.
//!
//! Each line is `power subscription rate...`. Amounts keep the sheet's
//! comma and its digits are the stored fixed-point digits: subscriptions
//! are monthly € with 2 decimals, rates are c€/kWh with 2 decimals or
//! €/kWh with 4 decimals (both land on 1e-4 €/kWh once the comma is
//! dropped). Plans with a peak rule list rates as (off-peak, peak) pairs,
//! one pair per day-kind.

use crate::{
    error::{LedgerError, LedgerResult},
    plan::TariffPlan,
    store::{parse_iso_date, RateScheduleRow},
    types::far_future,
};
use chrono::{Duration, NaiveDate};

pub struct HistoricalTable {
    pub plan:    TariffPlan,
    /// (effective start date, rows)
    pub entries: &'static [(&'static str, &'static str)],
}

pub static HISTORICAL_TABLES: &[HistoricalTable] = &[
    HistoricalTable {
        plan: TariffPlan::Tempo,
        entries: &[
            ("2023-01-01", "
6 12,28 9,70 12,49 11,40 15,08 12,16 67,12
9 15,33 9,70 12,49 11,40 15,08 12,16 67,12
12 18,78 9,70 12,49 11,40 15,08 12,16 67,12
15 21,27 9,70 12,49 11,40 15,08 12,16 67,12
18 23,98 9,70 12,49 11,40 15,08 12,16 67,12
30 36,06 9,70 12,49 11,40 15,08 12,16 67,12
36 41,90 9,70 12,49 11,40 15,08 12,16 67,12
"),
            ("2023-08-01", "
6 12,80 10,56 13,69 12,46 16,54 13,28 73,24
9 16,00 10,56 13,69 12,46 16,54 13,28 73,24
12 19,29 10,56 13,69 12,46 16,54 13,28 73,24
15 22,30 10,56 13,69 12,46 16,54 13,28 73,24
18 25,29 10,56 13,69 12,46 16,54 13,28 73,24
30 38,13 10,56 13,69 12,46 16,54 13,28 73,24
36 44,28 10,56 13,69 12,46 16,54 13,28 73,24
"),
            ("2024-02-01", "
6 12,96 12,96 16,09 14,86 18,94 15,68 75,62
9 16,16 12,96 16,09 14,86 18,94 15,68 75,62
12 19,44 12,96 16,09 14,86 18,94 15,68 75,62
15 22,45 12,96 16,09 14,86 18,94 15,68 75,62
18 25,44 12,96 16,09 14,86 18,94 15,68 75,62
30 38,29 12,96 16,09 14,86 18,94 15,68 75,62
36 44,42 12,96 16,09 14,86 18,94 15,68 75,62
"),
        ],
    },
    HistoricalTable {
        plan: TariffPlan::ZenFlex,
        entries: &[
            ("2023-08-01", "
6 12,62 12,95 22,28 22,28 67,12
9 15,99 12,95 22,28 22,28 67,12
12 19,27 12,95 22,28 22,28 67,12
15 22,40 12,95 22,28 22,28 67,12
18 25,46 12,95 22,28 22,28 67,12
24 32,01 12,95 22,28 22,28 67,12
30 38,07 12,95 22,28 22,28 67,12
36 43,88 12,95 22,28 22,28 67,12
"),
            ("2023-09-14", "
6 13,03 14,64 24,60 24,60 73,24
9 16,55 14,64 24,60 24,60 73,24
12 19,97 14,64 24,60 24,60 73,24
15 23,24 14,64 24,60 24,60 73,24
18 26,48 14,64 24,60 24,60 73,24
24 33,28 14,64 24,60 24,60 73,24
30 39,46 14,64 24,60 24,60 73,24
36 45,72 14,64 24,60 24,60 73,24
"),
            ("2024-02-01", "
6 13,03 17,04 27,00 27,00 75,64
9 16,55 17,04 27,00 27,00 75,64
12 19,97 17,04 27,00 27,00 75,64
15 23,24 17,04 27,00 27,00 75,64
18 26,48 17,04 27,00 27,00 75,64
24 33,28 17,04 27,00 27,00 75,64
30 39,46 17,04 27,00 27,00 75,64
36 45,72 17,04 27,00 27,00 75,64
"),
        ],
    },
    HistoricalTable {
        plan: TariffPlan::ZenWeekend,
        entries: &[
            ("2023-09-14", "
3 9,47 25,25 17,71
6 12,44 25,25 17,71
9 15,63 25,25 17,71
12 19,25 25,25 17,71
15 22,37 25,25 17,71
18 25,46 25,25 17,71
24 32,32 25,25 17,71
30 37,29 25,25 17,71
36 43,99 25,25 17,71
"),
            ("2024-02-01", "
3 9,47 27,65 20,11
6 12,44 27,65 20,11
9 15,63 27,65 20,11
12 19,25 27,65 20,11
15 22,37 27,65 20,11
18 25,46 27,65 20,11
24 32,32 27,65 20,11
30 37,29 27,65 20,11
36 43,99 27,65 20,11
"),
        ],
    },
    HistoricalTable {
        plan: TariffPlan::ZenWeekendHc,
        entries: &[
            ("2023-09-14", "
6 13,03 26,83 18,81 18,81 18,81
9 16,55 26,83 18,81 18,81 18,81
12 19,97 26,83 18,81 18,81 18,81
15 23,24 26,83 18,81 18,81 18,81
18 26,48 26,83 18,81 18,81 18,81
24 33,28 26,83 18,81 18,81 18,81
30 39,46 26,83 18,81 18,81 18,81
36 45,72 26,83 18,81 18,81 18,81
"),
            ("2024-02-01", "
6 13,03 29,23 21,21 21,21 21,21
9 16,55 29,23 21,21 21,21 21,21
12 19,97 29,23 21,21 21,21 21,21
15 23,24 29,23 21,21 21,21 21,21
18 26,48 29,23 21,21 21,21 21,21
24 33,28 29,23 21,21 21,21 21,21
30 39,46 29,23 21,21 21,21 21,21
36 45,72 29,23 21,21 21,21 21,21
"),
        ],
    },
    HistoricalTable {
        plan: TariffPlan::TotalStdFixe,
        entries: &[
            ("2024-01-17", "
3 9,51 0,1892
6 12,50 0,1892
12 19,08 0,1892
15 22,14 0,1892
18 25,17 0,1892
24 32,05 0,1892
30 37,71 0,1892
36 44,62 0,1892
"),
        ],
    },
    HistoricalTable {
        plan: TariffPlan::TotalStdFixeHc,
        entries: &[
            ("2024-01-17", "
6 13,00 0,1511 0,2048
12 19,97 0,1511 0,2048
15 23,21 0,1511 0,2048
18 26,41 0,1511 0,2048
24 33,22 0,1511 0,2048
30 39,27 0,1511 0,2048
36 45,40 0,1511 0,2048
"),
        ],
    },
];

/// Expand one plan's table into rate rows. Entries are ordered by start
/// date; each ends the day before the next one starts and the last one
/// never ends.
pub fn parse_historical_table(
    plan: TariffPlan,
    entries: &[(&str, &str)],
) -> LedgerResult<Vec<RateScheduleRow>> {
    let mut dated: Vec<(NaiveDate, &str)> = Vec::with_capacity(entries.len());
    for (start, body) in entries {
        dated.push((parse_iso_date(start)?, *body));
    }
    dated.sort_by_key(|(start, _)| *start);

    if let Some(pair) = dated.windows(2).find(|w| w[0].0 == w[1].0) {
        return Err(malformed(plan, pair[0].0, "duplicate start date"));
    }

    let ends = validity_ends(&dated.iter().map(|(s, _)| *s).collect::<Vec<_>>());
    let mut rows = Vec::new();
    for ((start, body), end) in dated.iter().zip(ends) {
        for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
            rows.extend(parse_line(plan, *start, end, line)?);
        }
    }
    Ok(rows)
}

/// End date for each start: the day before the next start, then the far
/// future for the last one. `starts` must be sorted.
pub fn validity_ends(starts: &[NaiveDate]) -> Vec<NaiveDate> {
    starts
        .iter()
        .skip(1)
        .map(|next| *next - Duration::days(1))
        .chain(std::iter::once(far_future()))
        .take(starts.len())
        .collect()
}

fn parse_line(
    plan: TariffPlan,
    start: NaiveDate,
    end: NaiveDate,
    line: &str,
) -> LedgerResult<Vec<RateScheduleRow>> {
    let descriptor = plan.descriptor();
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [power, monthly, rates @ ..] = tokens.as_slice() else {
        return Err(malformed(plan, start, &format!("short line '{line}'")));
    };

    let power = power
        .parse::<u32>()
        .map_err(|_| malformed(plan, start, &format!("bad power '{power}'")))?;
    let subscription = 12 * sheet_amount(plan, start, monthly)?;
    let rates = rates
        .iter()
        .map(|r| sheet_amount(plan, start, r))
        .collect::<LedgerResult<Vec<i64>>>()?;

    // (off-peak, peak) per day-kind
    let prices: Vec<(i64, i64)> = if descriptor.has_peak_rule() {
        if rates.len() % 2 != 0 {
            return Err(malformed(plan, start, &format!("odd rate count in '{line}'")));
        }
        rates.chunks(2).map(|pair| (pair[0], pair[1])).collect()
    } else {
        rates.iter().map(|r| (*r, *r)).collect()
    };

    if prices.is_empty() {
        return Err(malformed(plan, start, &format!("no rates in '{line}'")));
    }
    if !descriptor.has_day_kind_rule() && prices.len() != 1 {
        return Err(malformed(plan, start, &format!("plan has a single day-kind: '{line}'")));
    }

    Ok(prices
        .into_iter()
        .zip(descriptor.first_day_kind()..)
        .map(|((offpeak_price, peak_price), day_kind)| RateScheduleRow {
            plan,
            start,
            power,
            subscription,
            day_kind,
            peak_price,
            offpeak_price,
            end,
        })
        .collect())
}

/// Drop the decimal comma and read the digits as fixed point.
fn sheet_amount(plan: TariffPlan, start: NaiveDate, token: &str) -> LedgerResult<i64> {
    token
        .replace(',', "")
        .parse::<i64>()
        .map_err(|_| malformed(plan, start, &format!("bad amount '{token}'")))
}

fn malformed(plan: TariffPlan, start: NaiveDate, reason: &str) -> LedgerError {
    LedgerError::MalformedRateTable {
        plan:   plan.id().to_string(),
        start:  start.to_string(),
        reason: reason.to_string(),
    }
}
