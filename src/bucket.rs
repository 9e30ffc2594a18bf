use chrono::NaiveDate;
use crate::models::Bucket;

/// Maps a due date to the planning bucket it belongs in, relative to `today`.
///
/// - same day: `today`
/// - one day out: `tomorrow`
/// - 2 to 7 days out: `this_week`
/// - 8 to 14 days out: `next_week`
/// - anything else, including past dates: `backburner`
pub fn classify(due_date: NaiveDate, today: NaiveDate) -> Bucket {
    match (due_date - today).num_days() {
        0 => Bucket::Today,
        1 => Bucket::Tomorrow,
        2..=7 => Bucket::ThisWeek,
        8..=14 => Bucket::NextWeek,
        _ => Bucket::Backburner,
    }
}
