//! Plan registry: peak hours, day-kinds, identifiers.

use chrono::NaiveDate;
use std::collections::HashMap;
use wattwise_core::plan::{tariff_day, TariffPlan, TempoColor, PLANS};

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn registry_is_in_enum_order() {
    for (plan, descriptor) in TariffPlan::ALL.iter().zip(PLANS.iter()) {
        assert_eq!(*plan, descriptor.plan);
        assert_eq!(plan.descriptor().id, descriptor.id);
    }
}

#[test]
fn identifiers_round_trip() {
    for plan in TariffPlan::ALL {
        assert_eq!(plan.id().parse::<TariffPlan>().unwrap(), plan);
        assert_eq!(plan.to_string(), plan.id());
        assert!(!plan.display_name().is_empty());
    }
    assert!("edf-rouge".parse::<TariffPlan>().is_err());
}

#[test]
fn peak_hours_per_plan() {
    let hphc = TariffPlan::Hphc.descriptor();
    assert_eq!(hphc.is_peak(5), Some(false));
    assert_eq!(hphc.is_peak(6), Some(true));
    assert_eq!(hphc.is_peak(21), Some(true));
    assert_eq!(hphc.is_peak(22), Some(false));

    let flex = TariffPlan::ZenFlex.descriptor();
    assert_eq!(flex.is_peak(7), Some(false));
    assert_eq!(flex.is_peak(8), Some(true));
    assert_eq!(flex.is_peak(13), Some(false));
    assert_eq!(flex.is_peak(18), Some(true));
    assert_eq!(flex.is_peak(20), Some(false));

    assert_eq!(TariffPlan::Base.descriptor().is_peak(12), None);
    assert_eq!(TariffPlan::ZenWeekend.descriptor().is_peak(12), None);
}

/// Before 06:00 a Tempo slice belongs to the previous day's color.
#[test]
fn tempo_night_uses_previous_tariff_day() {
    let mut colors = HashMap::new();
    colors.insert(ymd(2024, 3, 9), TempoColor::Red);
    colors.insert(ymd(2024, 3, 10), TempoColor::Blue);
    let tempo = TariffPlan::Tempo.descriptor();

    assert_eq!(tariff_day(ymd(2024, 3, 10), 5), Some(ymd(2024, 3, 9)));
    assert_eq!(tempo.day_kind(ymd(2024, 3, 10), 5, &colors), Some(3));
    assert_eq!(tempo.day_kind(ymd(2024, 3, 10), 6, &colors), Some(1));
    // No color stored for the 11th yet.
    assert_eq!(tempo.day_kind(ymd(2024, 3, 11), 12, &colors), None);
}

#[test]
fn zenflex_sobriety_days_follow_red_calendar_days() {
    let mut colors = HashMap::new();
    colors.insert(ymd(2024, 1, 15), TempoColor::Red);
    colors.insert(ymd(2024, 1, 16), TempoColor::White);
    let flex = TariffPlan::ZenFlex.descriptor();

    assert_eq!(flex.day_kind(ymd(2024, 1, 15), 3, &colors), Some(2));
    assert_eq!(flex.day_kind(ymd(2024, 1, 16), 3, &colors), Some(1));
    assert_eq!(flex.day_kind(ymd(2024, 1, 17), 12, &colors), Some(1));
}

#[test]
fn weekend_plans_split_on_weekday() {
    let colors: HashMap<NaiveDate, TempoColor> = HashMap::new();
    let weekend = TariffPlan::ZenWeekendHc.descriptor();
    // 2024-03-09 is a Saturday.
    assert_eq!(weekend.day_kind(ymd(2024, 3, 8), 12, &colors), Some(1));
    assert_eq!(weekend.day_kind(ymd(2024, 3, 9), 12, &colors), Some(2));
    assert_eq!(weekend.day_kind(ymd(2024, 3, 10), 2, &colors), Some(2));
    assert_eq!(weekend.day_kind(ymd(2024, 3, 11), 2, &colors), Some(1));
}

#[test]
fn single_schedule_plans_have_day_kind_zero() {
    let colors: HashMap<NaiveDate, TempoColor> = HashMap::new();
    for plan in [TariffPlan::Base, TariffPlan::Hphc, TariffPlan::TotalStdFixe, TariffPlan::TotalStdFixeHc] {
        let d = plan.descriptor();
        assert_eq!(d.day_kind(ymd(2024, 3, 9), 12, &colors), Some(0));
        assert_eq!(d.first_day_kind(), 0);
    }
    assert_eq!(TariffPlan::Tempo.descriptor().first_day_kind(), 1);
}

#[test]
fn tempo_codes() {
    assert_eq!(TempoColor::from_code(0), None);
    assert_eq!(TempoColor::from_code(3), Some(TempoColor::Red));
    assert_eq!(TempoColor::from_code(4), None);
    assert_eq!(TempoColor::White.code(), 2);
}
