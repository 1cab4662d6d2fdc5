//! Event countdown and Portuguese date formatting for the landing page.

use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use serde::Serialize;

/// Offset the event date is displayed in when none is configured (UTC-3).
pub const DISPLAY_OFFSET_HOURS: i32 = -3;

const MONTHS_PT: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

/// Time left until the event, split for display. Clamped at zero once the
/// event has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Countdown {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Countdown {
    pub fn remaining(now: DateTime<Utc>, target: DateTime<Utc>) -> Self {
        let total = u64::try_from((target - now).num_seconds().max(0)).unwrap_or(0);
        Self {
            days: total / 86_400,
            hours: total % 86_400 / 3_600,
            minutes: total % 3_600 / 60,
            seconds: total % 60,
        }
    }

    pub fn is_elapsed(&self) -> bool {
        self.days == 0 && self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }
}

/// Format an event date like `19 de Novembro de 2025 às 19:00 horas`,
/// shifted into the display offset first.
pub fn format_date_pt(date: DateTime<Utc>, offset_hours: i32) -> String {
    let local = match FixedOffset::east_opt(offset_hours * 3600) {
        Some(offset) => date.with_timezone(&offset),
        None => date.fixed_offset(),
    };
    let month = MONTHS_PT[local.month0() as usize];
    format!(
        "{} de {} de {} às {:02}:{:02} horas",
        local.day(),
        month,
        local.year(),
        local.hour(),
        local.minute()
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use signalbox_store::default_event_date;

    use super::*;

    #[test]
    fn remaining_time_splits_into_display_units() {
        let now = Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).single().unwrap();
        let target = now + chrono::Duration::days(1)
            + chrono::Duration::hours(2)
            + chrono::Duration::minutes(3)
            + chrono::Duration::seconds(4);

        let countdown = Countdown::remaining(now, target);
        assert_eq!(
            countdown,
            Countdown {
                days: 1,
                hours: 2,
                minutes: 3,
                seconds: 4,
            }
        );
        assert!(!countdown.is_elapsed());
    }

    #[test]
    fn started_events_clamp_to_zero() {
        let now = Utc.with_ymd_and_hms(2025, 11, 20, 0, 0, 0).single().unwrap();
        let countdown = Countdown::remaining(now, default_event_date());
        assert!(countdown.is_elapsed());
    }

    #[test]
    fn default_event_date_formats_in_display_time() {
        let formatted = format_date_pt(default_event_date(), DISPLAY_OFFSET_HOURS);
        assert_eq!(formatted, "19 de Novembro de 2025 às 19:00 horas");
    }

    #[test]
    fn single_digit_days_stay_unpadded_while_time_pads() {
        let date = Utc.with_ymd_and_hms(2026, 3, 9, 12, 5, 0).single().unwrap();
        assert_eq!(
            format_date_pt(date, DISPLAY_OFFSET_HOURS),
            "9 de Março de 2026 às 09:05 horas"
        );
    }
}
