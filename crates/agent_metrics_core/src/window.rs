//! crates/agent_metrics_core/src/window.rs
//!
//! Date-window arithmetic for period reporting.
//!
//! The business week runs Monday through Saturday. Sunday belongs to the week that
//! started the Monday before it, never to the following one.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Validation failures for time windows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("Week {week} is out of range for {year} (expected 1..={max})")]
    WeekOutOfRange { year: i32, week: u32, max: u32 },
    #[error("Year {0} is outside the supported calendar range")]
    InvalidYear(i32),
    #[error("End date {end} is before start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
    #[error("Date {0} is outside the supported range (years {min}..={max})", min = MIN_YEAR, max = MAX_YEAR)]
    OutOfRange(NaiveDate),
}

/// Earliest calendar year the window arithmetic accepts.
pub const MIN_YEAR: i32 = 1900;
/// Latest calendar year the window arithmetic accepts.
pub const MAX_YEAR: i32 = 9999;

/// Accepts `date` when its year lies in `MIN_YEAR..=MAX_YEAR`.
///
/// Every function here that takes a bare date assumes it passed this check; week
/// arithmetic near chrono's calendar limits would otherwise overflow.
pub fn supported_date(date: NaiveDate) -> Result<NaiveDate, WindowError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        Ok(date)
    } else {
        Err(WindowError::OutOfRange(date))
    }
}

//=========================================================================================
// Week Windows
//=========================================================================================

/// A Monday 00:00:00.000 to Saturday 23:59:59.999 business week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl WeekWindow {
    fn starting(monday: NaiveDate) -> Self {
        let start = monday.and_time(NaiveTime::default());
        let end = start + Duration::days(6) - Duration::milliseconds(1);
        Self { start, end }
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }

    /// The Saturday closing the window.
    pub fn end_date(&self) -> NaiveDate {
        self.end.date()
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// Date-only membership. Sundays fall outside every window.
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date() && date <= self.end_date()
    }

    pub fn as_range(&self) -> DateRange {
        DateRange {
            from: Some(self.start_date()),
            to: Some(self.end_date()),
        }
    }
}

/// The week window containing `date`.
pub fn week_window(date: NaiveDate) -> WeekWindow {
    // Monday is 0, Sunday is 6, so Sunday rolls back to the preceding Monday.
    let back = i64::from(date.weekday().num_days_from_monday());
    WeekWindow::starting(date - Duration::days(back))
}

/// The week window immediately before the one containing `date`.
pub fn previous_week_window(date: NaiveDate) -> WeekWindow {
    let current = week_window(date);
    week_window(current.start_date() - Duration::days(7))
}

/// The first Monday on or after January 1st of `year`.
fn first_monday(year: i32) -> Result<NaiveDate, WindowError> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(WindowError::InvalidYear(year));
    }
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(WindowError::InvalidYear(year))?;
    let ahead = (7 - jan1.weekday().num_days_from_monday()) % 7;
    Ok(jan1 + Duration::days(i64::from(ahead)))
}

/// How many week windows start inside `year` (52 or 53).
pub fn weeks_in_year(year: i32) -> Result<u32, WindowError> {
    let monday = first_monday(year)?;
    let dec31 = NaiveDate::from_ymd_opt(year, 12, 31).ok_or(WindowError::InvalidYear(year))?;
    let span = (dec31 - monday).num_days();
    Ok((span / 7 + 1) as u32)
}

/// Locates week `week` of `year`, counting from the year's first Monday.
pub fn week_window_by_number(year: i32, week: u32) -> Result<WeekWindow, WindowError> {
    let max = weeks_in_year(year)?;
    if week == 0 || week > max {
        return Err(WindowError::WeekOutOfRange { year, week, max });
    }
    let monday = first_monday(year)? + Duration::days(i64::from(week - 1) * 7);
    Ok(WeekWindow::starting(monday))
}

/// The 1-based week number of the window containing `date`, within [`week_year`].
pub fn week_of_year(date: NaiveDate) -> u32 {
    let start = week_window(date).start_date();
    // A window start is a Monday, so it never precedes its own year's first Monday.
    match first_monday(start.year()) {
        Ok(monday) => ((start - monday).num_days() / 7 + 1) as u32,
        Err(_) => 1,
    }
}

/// The year that owns the week containing `date`. Early-January days whose window
/// started in December belong to the previous year.
pub fn week_year(date: NaiveDate) -> i32 {
    week_window(date).start_date().year()
}

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Long-form Spanish date, e.g. "15 de enero de 2024".
pub fn format_date(date: NaiveDate) -> String {
    format!(
        "{} de {} de {}",
        date.day(),
        MONTHS_ES[date.month0() as usize],
        date.year()
    )
}

//=========================================================================================
// Arbitrary Ranges
//=========================================================================================

/// An inclusive date range. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Builds a range, rejecting unsupported dates and an end that precedes the start.
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, WindowError> {
        for date in [from, to].into_iter().flatten() {
            supported_date(date)?;
        }
        if let (Some(start), Some(end)) = (from, to) {
            if end < start {
                return Err(WindowError::EndBeforeStart { start, end });
            }
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    pub fn is_bounded(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }
}

/// The ways a caller can name a reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodSelector {
    All,
    Explicit {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    Week {
        year: i32,
        week: u32,
    },
    CurrentWeek,
}

impl PeriodSelector {
    /// Resolves the selector against `today`.
    pub fn resolve(&self, today: NaiveDate) -> Result<DateRange, WindowError> {
        match *self {
            PeriodSelector::All => Ok(DateRange::unbounded()),
            PeriodSelector::Explicit { from, to } => DateRange::new(from, to),
            PeriodSelector::Week { year, week } => {
                Ok(week_window_by_number(year, week)?.as_range())
            }
            PeriodSelector::CurrentWeek => Ok(week_window(today).as_range()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn window_runs_monday_to_saturday() {
        // Wednesday 2024-01-17
        let w = week_window(d(2024, 1, 17));
        assert_eq!(w.start_date(), d(2024, 1, 15));
        assert_eq!(w.start_date().weekday(), Weekday::Mon);
        assert_eq!(w.end_date(), d(2024, 1, 20));
        assert_eq!(w.end_date().weekday(), Weekday::Sat);
        assert_eq!(w.end.time(), NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap());
    }

    #[test]
    fn sunday_belongs_to_previous_week() {
        let saturday = week_window(d(2024, 1, 20));
        let sunday = week_window(d(2024, 1, 21));
        let monday = week_window(d(2024, 1, 22));
        assert_eq!(sunday, saturday);
        assert_ne!(sunday, monday);
        assert!(!sunday.contains_date(d(2024, 1, 21)));
    }

    #[test]
    fn previous_week_is_seven_days_back() {
        let prev = previous_week_window(d(2024, 1, 3));
        assert_eq!(prev.start_date(), d(2023, 12, 25));
        assert_eq!(prev.end_date(), d(2023, 12, 30));
    }

    #[test]
    fn week_one_starts_on_first_monday() {
        // 2024-01-01 is a Monday.
        assert_eq!(week_window_by_number(2024, 1).unwrap().start_date(), d(2024, 1, 1));
        // 2023-01-01 is a Sunday.
        assert_eq!(week_window_by_number(2023, 1).unwrap().start_date(), d(2023, 1, 2));
        assert_eq!(week_window_by_number(2023, 3).unwrap().start_date(), d(2023, 1, 16));
    }

    #[test]
    fn week_numbers_match_windows() {
        assert_eq!(week_of_year(d(2024, 1, 1)), 1);
        assert_eq!(week_of_year(d(2024, 1, 7)), 1);
        assert_eq!(week_of_year(d(2024, 1, 8)), 2);
        // Sunday 2023-01-01 falls in the last week that started in 2022.
        assert_eq!(week_year(d(2023, 1, 1)), 2022);
        assert_eq!(week_of_year(d(2023, 1, 1)), 52);
    }

    #[test]
    fn weeks_in_year_counts_mondays() {
        assert_eq!(weeks_in_year(2024).unwrap(), 53);
        assert_eq!(weeks_in_year(2023).unwrap(), 52);
    }

    #[test]
    fn bad_week_numbers_are_rejected() {
        assert_eq!(
            week_window_by_number(2023, 0),
            Err(WindowError::WeekOutOfRange { year: 2023, week: 0, max: 52 })
        );
        assert!(week_window_by_number(2023, 53).is_err());
        assert!(week_window_by_number(2024, 53).is_ok());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = DateRange::new(Some(d(2024, 2, 1)), Some(d(2024, 1, 1))).unwrap_err();
        assert!(matches!(err, WindowError::EndBeforeStart { .. }));
        assert!(DateRange::new(Some(d(2024, 1, 1)), None).is_ok());
    }

    #[test]
    fn calendar_extremes_are_rejected_not_computed() {
        let max = "+262142-12-31".parse::<NaiveDate>().unwrap();
        assert_eq!(supported_date(max), Err(WindowError::OutOfRange(max)));
        assert_eq!(supported_date(NaiveDate::MIN), Err(WindowError::OutOfRange(NaiveDate::MIN)));
        assert!(supported_date(d(9999, 12, 31)).is_ok());
        assert!(supported_date(d(1900, 1, 1)).is_ok());

        assert!(matches!(
            DateRange::new(None, Some(max)),
            Err(WindowError::OutOfRange(_))
        ));
        assert_eq!(week_window_by_number(262142, 1), Err(WindowError::InvalidYear(262142)));
        assert_eq!(weeks_in_year(1899), Err(WindowError::InvalidYear(1899)));

        // The edges of the supported range still compute.
        assert_eq!(week_window(d(9999, 12, 31)).end_date(), d(10000, 1, 1));
        assert_eq!(previous_week_window(d(1900, 1, 1)).start_date(), d(1899, 12, 25));
    }

    #[test]
    fn selectors_resolve_to_ranges() {
        let today = d(2024, 1, 17);
        let current = PeriodSelector::CurrentWeek.resolve(today).unwrap();
        assert_eq!(current.from, Some(d(2024, 1, 15)));
        assert_eq!(current.to, Some(d(2024, 1, 20)));

        let by_number = PeriodSelector::Week { year: 2024, week: 3 }.resolve(today).unwrap();
        assert_eq!(by_number, current);

        assert!(!PeriodSelector::All.resolve(today).unwrap().is_bounded());
    }

    #[test]
    fn formats_long_spanish_dates() {
        assert_eq!(format_date(d(2024, 1, 15)), "15 de enero de 2024");
        assert_eq!(format_date(d(2023, 12, 2)), "2 de diciembre de 2023");
    }

    fn any_date() -> impl Strategy<Value = NaiveDate> {
        (1990i32..2100, 1u32..=366).prop_map(|(year, ordinal)| {
            NaiveDate::from_yo_opt(year, ordinal)
                .unwrap_or_else(|| NaiveDate::from_yo_opt(year, 365).unwrap())
        })
    }

    proptest! {
        #[test]
        fn window_span_is_six_days_minus_a_millisecond(date in any_date()) {
            let w = week_window(date);
            prop_assert_eq!(w.end - w.start, Duration::days(6) - Duration::milliseconds(1));
            prop_assert_eq!(w.start_date().weekday(), Weekday::Mon);
            prop_assert!(w.contains_date(date) || date.weekday() == Weekday::Sun);
        }

        #[test]
        fn sunday_maps_to_preceding_saturday(date in any_date()) {
            let sunday = date + Duration::days(6 - i64::from(date.weekday().num_days_from_monday()));
            let saturday = sunday - Duration::days(1);
            prop_assert_eq!(week_window(sunday), week_window(saturday));
        }

        #[test]
        fn week_numbers_round_trip(year in 1990i32..2100, week in 1u32..=53) {
            let max = weeks_in_year(year).unwrap();
            prop_assume!(week <= max);
            let w = week_window_by_number(year, week).unwrap();
            prop_assert_eq!(week_of_year(w.start_date()), week);
            prop_assert_eq!(week_year(w.start_date()), year);
        }

        #[test]
        fn window_by_number_matches_window_of_date(date in any_date()) {
            let w = week_window(date);
            let located = week_window_by_number(week_year(date), week_of_year(date)).unwrap();
            prop_assert_eq!(located.start, w.start);
        }

        #[test]
        fn previous_window_is_exactly_one_week_earlier(date in any_date()) {
            let prev = previous_week_window(date);
            prop_assert_eq!(prev.start, week_window(date).start - Duration::days(7));
        }
    }
}
