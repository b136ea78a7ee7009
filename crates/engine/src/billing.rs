//! Credit-card billing attribution.
//!
//! Maps a purchase date to the month in which its payment is due, so that
//! per-purchase credit expenses land in the budget period they actually hit
//! cash flow in. Pure calendar arithmetic, no storage access.

use chrono::Datelike;

/// The budget month/year a purchase is due in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueMonth {
    /// 1-12.
    pub month: u32,
    pub year: i32,
}

/// Resolves the due month of a purchase on a card with the given
/// closing/due days.
///
/// A purchase up to and including `closing_day` belongs to the cycle closing
/// in its own month, later purchases to the cycle closing in the next month.
/// The payment is due the month after the closing when `due_day <
/// closing_day` (the typical card setup), otherwise in the closing month
/// itself.
///
/// The days are taken as configured; they are not checked against the actual
/// length of any month. A day that no month reaches (say 31 with a 30-day
/// month) only shifts which cycle purchases close in and is never turned
/// into a concrete date.
pub fn due_date_month<D: Datelike>(date: &D, closing_day: u8, due_day: u8) -> DueMonth {
    let mut month = date.month();
    let mut year = date.year();

    if date.day() > u32::from(closing_day) {
        (month, year) = next_month(month, year);
    }
    if due_day < closing_day {
        (month, year) = next_month(month, year);
    }

    DueMonth { month, year }
}

fn next_month(month: u32, year: i32) -> (u32, i32) {
    if month == 12 { (1, year + 1) } else { (month + 1, year) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn purchase_before_closing_is_due_next_month() {
        let due = due_date_month(&day(2024, 3, 15), 20, 10);
        assert_eq!(due, DueMonth { month: 4, year: 2024 });
    }

    #[test]
    fn purchase_after_closing_skips_a_month() {
        let due = due_date_month(&day(2024, 3, 25), 20, 10);
        assert_eq!(due, DueMonth { month: 5, year: 2024 });
    }

    #[test]
    fn purchase_on_closing_day_counts_as_before() {
        let due = due_date_month(&day(2024, 3, 20), 20, 10);
        assert_eq!(due, DueMonth { month: 4, year: 2024 });
    }

    #[test]
    fn due_day_after_closing_day_stays_in_closing_month() {
        // Closes on the 5th, due on the 25th of the same month.
        let due = due_date_month(&day(2024, 3, 3), 5, 25);
        assert_eq!(due, DueMonth { month: 3, year: 2024 });
        let due = due_date_month(&day(2024, 3, 10), 5, 25);
        assert_eq!(due, DueMonth { month: 4, year: 2024 });
    }

    #[test]
    fn year_rolls_over_at_december() {
        let due = due_date_month(&day(2024, 12, 28), 20, 10);
        assert_eq!(due, DueMonth { month: 2, year: 2025 });
        let due = due_date_month(&day(2024, 11, 30), 20, 10);
        assert_eq!(due, DueMonth { month: 1, year: 2025 });
    }
}
