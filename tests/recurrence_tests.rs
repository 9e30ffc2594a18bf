use cadence::error::RuleParseError;
use cadence::recurrence::{
    days_in_month, next_due_date_on_or_after, occurs_on, render_label, MonthlyFallback, Recurrence, RuleEvaluator,
};
use chrono::{Datelike, Duration, NaiveDate, Weekday};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_parse_known_rules() {
    assert_eq!(Recurrence::parse("daily"), Ok(Recurrence::Daily));
    assert_eq!(Recurrence::parse("weekly-monday"), Ok(Recurrence::WeeklyOn(Weekday::Mon)));
    assert_eq!(Recurrence::parse("Weekly-SUNDAY"), Ok(Recurrence::WeeklyOn(Weekday::Sun)));
    assert_eq!(Recurrence::parse("monthly-15"), Ok(Recurrence::MonthlyOn(15)));
    assert_eq!(Recurrence::parse("monthly-31"), Ok(Recurrence::MonthlyOn(31)));
    assert_eq!(Recurrence::parse("monthly-last"), Ok(Recurrence::MonthlyOnLast));
    assert_eq!(Recurrence::parse(" daily "), Ok(Recurrence::Daily));
}

#[test]
fn test_parse_rejects_malformed_rules() {
    assert_eq!(Recurrence::parse(""), Err(RuleParseError::Empty));
    assert_eq!(Recurrence::parse("   "), Err(RuleParseError::Empty));
    assert_eq!(
        Recurrence::parse("yearly-3"),
        Err(RuleParseError::UnknownFrequency("yearly".into()))
    );
    assert_eq!(
        Recurrence::parse("weekly"),
        Err(RuleParseError::MissingParameter { frequency: "weekly" })
    );
    assert_eq!(
        Recurrence::parse("weekly-funday"),
        Err(RuleParseError::InvalidWeekday("funday".into()))
    );
    assert_eq!(
        Recurrence::parse("weekly-mon"),
        Err(RuleParseError::InvalidWeekday("mon".into()))
    );
    assert_eq!(
        Recurrence::parse("daily-2"),
        Err(RuleParseError::UnexpectedParameter { frequency: "daily", param: "2".into() })
    );
    assert_eq!(Recurrence::parse("monthly-0"), Err(RuleParseError::InvalidDayOfMonth("0".into())));
    assert_eq!(Recurrence::parse("monthly-32"), Err(RuleParseError::InvalidDayOfMonth("32".into())));
    assert_eq!(Recurrence::parse("monthly-first"), Err(RuleParseError::InvalidDayOfMonth("first".into())));
    assert_eq!(Recurrence::parse("monthly-+5"), Err(RuleParseError::InvalidDayOfMonth("+5".into())));
    assert_eq!(Recurrence::parse("monthly-5a"), Err(RuleParseError::InvalidDayOfMonth("5a".into())));
}

#[test]
fn test_display_is_canonical_rule() {
    assert_eq!(Recurrence::parse("Weekly-FRIDAY").unwrap().to_string(), "weekly-friday");
    assert_eq!(Recurrence::MonthlyOn(5).to_string(), "monthly-5");
    assert_eq!(Recurrence::MonthlyOnLast.to_string(), "monthly-last");
    assert_eq!(Recurrence::Daily.to_string(), "daily");
}

#[test]
fn test_daily_next_due_is_from_date() {
    let today = date(2024, 3, 10);
    assert_eq!(next_due_date_on_or_after("daily", today), Some(today));
    assert!(occurs_on("daily", today));
}

#[test]
fn test_weekly_from_wednesday_finds_next_monday() {
    let wednesday = date(2024, 3, 13);
    assert_eq!(wednesday.weekday(), Weekday::Wed);
    let next = next_due_date_on_or_after("weekly-monday", wednesday).unwrap();
    assert_eq!(next, date(2024, 3, 18));
    assert_eq!(next.weekday(), Weekday::Mon);
}

#[test]
fn test_weekly_on_matching_day_is_same_day() {
    let monday = date(2024, 3, 18);
    assert_eq!(next_due_date_on_or_after("weekly-monday", monday), Some(monday));
}

#[test]
fn test_weekly_next_due_is_within_six_days_and_fires() {
    let start = date(2024, 1, 1);
    for offset in 0..60 {
        let from = start + Duration::days(offset);
        for day in ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"] {
            let rule = format!("weekly-{}", day);
            let next = next_due_date_on_or_after(&rule, from).unwrap();
            let ahead = (next - from).num_days();
            assert!((0..=6).contains(&ahead), "{} from {} gave {}", rule, from, next);
            assert!(occurs_on(&rule, next));
            for skipped in 0..ahead {
                assert!(!occurs_on(&rule, from + Duration::days(skipped)));
            }
        }
    }
}

#[test]
fn test_monthly_within_current_month() {
    assert_eq!(next_due_date_on_or_after("monthly-15", date(2024, 3, 10)), Some(date(2024, 3, 15)));
    assert_eq!(next_due_date_on_or_after("monthly-15", date(2024, 3, 15)), Some(date(2024, 3, 15)));
}

#[test]
fn test_monthly_rolls_into_next_month() {
    assert_eq!(next_due_date_on_or_after("monthly-15", date(2024, 3, 16)), Some(date(2024, 4, 15)));
    assert_eq!(next_due_date_on_or_after("monthly-1", date(2024, 12, 2)), Some(date(2025, 1, 1)));
}

#[test]
fn test_monthly_last_handles_february() {
    assert_eq!(next_due_date_on_or_after("monthly-last", date(2024, 2, 20)), Some(date(2024, 2, 29)));
    assert_eq!(next_due_date_on_or_after("monthly-last", date(2023, 2, 20)), Some(date(2023, 2, 28)));
    assert_eq!(next_due_date_on_or_after("monthly-last", date(2024, 12, 31)), Some(date(2024, 12, 31)));
    assert!(occurs_on("monthly-last", date(2024, 4, 30)));
    assert!(!occurs_on("monthly-last", date(2024, 4, 29)));
}

#[test]
fn test_monthly_31_clamps_in_short_months() {
    let clamp = RuleEvaluator::new(MonthlyFallback::Clamp);
    assert_eq!(clamp.next_due_date_on_or_after("monthly-31", date(2024, 4, 10)), Some(date(2024, 4, 30)));
    assert_eq!(clamp.next_due_date_on_or_after("monthly-31", date(2024, 2, 10)), Some(date(2024, 2, 29)));
    assert!(clamp.occurs_on("monthly-31", date(2024, 4, 30)));
    assert!(!clamp.occurs_on("monthly-31", date(2024, 4, 29)));
}

#[test]
fn test_monthly_31_skips_short_months() {
    let skip = RuleEvaluator::new(MonthlyFallback::Skip);
    assert_eq!(skip.next_due_date_on_or_after("monthly-31", date(2024, 4, 10)), Some(date(2024, 5, 31)));
    assert_eq!(skip.next_due_date_on_or_after("monthly-31", date(2024, 2, 10)), Some(date(2024, 3, 31)));
    assert_eq!(skip.next_due_date_on_or_after("monthly-30", date(2023, 2, 1)), Some(date(2023, 3, 30)));
    assert!(!skip.occurs_on("monthly-31", date(2024, 4, 30)));
}

#[test]
fn test_monthly_fallback_is_consistent_across_months() {
    for year in [2023, 2024] {
        for month in 1..=12 {
            let last = days_in_month(year, month);
            let fired: Vec<NaiveDate> = (1..=last)
                .map(|d| date(year, month, d))
                .filter(|d| Recurrence::MonthlyOn(31).occurs_on(*d, MonthlyFallback::Clamp))
                .collect();
            assert_eq!(fired, vec![date(year, month, last)]);

            let skipped: Vec<NaiveDate> = (1..=last)
                .map(|d| date(year, month, d))
                .filter(|d| Recurrence::MonthlyOn(31).occurs_on(*d, MonthlyFallback::Skip))
                .collect();
            if last == 31 {
                assert_eq!(skipped, vec![date(year, month, 31)]);
            } else {
                assert!(skipped.is_empty(), "{}-{} should not fire", year, month);
            }
        }
    }
}

#[test]
fn test_upcoming_lists_successive_due_dates() {
    let rule = Recurrence::MonthlyOn(31);
    assert_eq!(
        rule.upcoming(date(2024, 1, 1), 4, MonthlyFallback::Clamp),
        vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]
    );
    assert_eq!(
        rule.upcoming(date(2024, 1, 1), 4, MonthlyFallback::Skip),
        vec![date(2024, 1, 31), date(2024, 3, 31), date(2024, 5, 31), date(2024, 7, 31)]
    );
    assert_eq!(
        Recurrence::WeeklyOn(Weekday::Fri).upcoming(date(2024, 3, 13), 2, MonthlyFallback::Clamp),
        vec![date(2024, 3, 15), date(2024, 3, 22)]
    );
}

#[test]
fn test_malformed_rules_never_fire() {
    let today = date(2024, 3, 10);
    for rule in ["", "fortnightly", "weekly-", "monthly-99"] {
        assert!(!occurs_on(rule, today));
        assert_eq!(next_due_date_on_or_after(rule, today), None);
    }
}

#[test]
fn test_render_label() {
    assert_eq!(render_label("daily"), "every day");
    assert_eq!(render_label("weekly-monday"), "every Monday");
    assert_eq!(render_label("weekly-saturday"), "every Saturday");
    assert_eq!(render_label("monthly-15"), "15th of each month");
    assert_eq!(render_label("monthly-1"), "1st of each month");
    assert_eq!(render_label("monthly-2"), "2nd of each month");
    assert_eq!(render_label("monthly-3"), "3rd of each month");
    assert_eq!(render_label("monthly-11"), "11th of each month");
    assert_eq!(render_label("monthly-12"), "12th of each month");
    assert_eq!(render_label("monthly-13"), "13th of each month");
    assert_eq!(render_label("monthly-21"), "21st of each month");
    assert_eq!(render_label("monthly-22"), "22nd of each month");
    assert_eq!(render_label("monthly-23"), "23rd of each month");
    assert_eq!(render_label("monthly-31"), "31st of each month");
    assert_eq!(render_label("monthly-last"), "last day of each month");
}

#[test]
fn test_render_label_returns_malformed_rules_verbatim() {
    assert_eq!(render_label(""), "");
    assert_eq!(render_label("every other tuesday"), "every other tuesday");
    assert_eq!(render_label("weekly-funday"), "weekly-funday");
}

#[test]
fn test_days_in_month() {
    assert_eq!(days_in_month(2024, 2), 29);
    assert_eq!(days_in_month(2023, 2), 28);
    assert_eq!(days_in_month(2024, 4), 30);
    assert_eq!(days_in_month(2024, 12), 31);
}
