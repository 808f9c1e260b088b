// SPDX-License-Identifier: GPL-3.0-only

//! Per-iteration timestamps used in output file names

use crate::constants::FRAME_TIMESTAMP_FORMAT;
use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, Utc};

/// Produces `YYYYMMDDTHHMMSS.ffffff` strings that never go backwards
///
/// The stamp shows local time but advances with the zone-independent clock:
/// when local time jumps back (DST fall-back) the stamp keeps moving by the
/// real elapsed time until local time catches up. A backwards step of the
/// system clock repeats the previous stamp once. When two iterations format
/// to the same string, the later ones get a fixed-width `-000001`,
/// `-000002`, ... suffix so their files neither overwrite each other nor
/// sort out of order.
#[derive(Debug, Default)]
pub struct TimestampClock {
    last: Option<(DateTime<Utc>, NaiveDateTime)>,
    last_text: String,
    repeats: u32,
}

impl TimestampClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp for the current time
    pub fn next(&mut self) -> String {
        let now = Local::now();
        self.next_at(now.with_timezone(&Utc), now.naive_local())
    }

    /// Timestamp for `instant`, displayed as the wall time `local`
    pub fn next_at(&mut self, instant: DateTime<Utc>, local: NaiveDateTime) -> String {
        let shown = match self.last {
            Some((last_instant, last_shown)) => {
                let elapsed = (instant - last_instant).max(TimeDelta::zero());
                let advanced = last_shown
                    .checked_add_signed(elapsed)
                    .unwrap_or(last_shown);
                local.max(advanced)
            }
            None => local,
        };
        self.last = Some((instant, shown));

        let text = shown.format(FRAME_TIMESTAMP_FORMAT).to_string();
        if text == self.last_text {
            self.repeats += 1;
            format!("{}-{:06}", text, self.repeats)
        } else {
            self.repeats = 0;
            self.last_text.clone_from(&text);
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(micro: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_micro_opt(14, 7, 9, micro)
            .unwrap()
    }

    /// Tick with a wall clock in UTC, so instant and local time agree
    fn tick(clock: &mut TimestampClock, time: NaiveDateTime) -> String {
        clock.next_at(time.and_utc(), time)
    }

    #[test]
    fn test_format_has_microseconds() {
        let mut clock = TimestampClock::new();
        assert_eq!(tick(&mut clock, at(42)), "20240305T140709.000042");
    }

    #[test]
    fn test_repeated_time_gets_suffix() {
        let mut clock = TimestampClock::new();
        assert_eq!(tick(&mut clock, at(1)), "20240305T140709.000001");
        assert_eq!(tick(&mut clock, at(1)), "20240305T140709.000001-000001");
        assert_eq!(tick(&mut clock, at(1)), "20240305T140709.000001-000002");
        assert_eq!(tick(&mut clock, at(2)), "20240305T140709.000002");
    }

    #[test]
    fn test_clock_step_back_repeats_once() {
        let mut clock = TimestampClock::new();
        let first = tick(&mut clock, at(500));
        let stepped_back = tick(&mut clock, at(100));
        assert_eq!(stepped_back, format!("{}-000001", first));
        // Later ticks advance from the previous stamp by the elapsed time
        let later = tick(&mut clock, at(101));
        assert_eq!(later, "20240305T140709.000501");
    }

    #[test]
    fn test_local_fall_back_keeps_advancing() {
        let mut clock = TimestampClock::new();
        let start = at(0);
        let instant = start.and_utc();
        assert_eq!(clock.next_at(instant, start), "20240305T140709.000000");

        // Local time jumps back an hour while the instant moves one second
        let stamp = clock.next_at(
            instant + TimeDelta::seconds(1),
            start - TimeDelta::hours(1) + TimeDelta::seconds(1),
        );
        assert_eq!(stamp, "20240305T140710.000000");
        let stamp = clock.next_at(
            instant + TimeDelta::seconds(2),
            start - TimeDelta::hours(1) + TimeDelta::seconds(2),
        );
        assert_eq!(stamp, "20240305T140711.000000");
    }

    #[test]
    fn test_sequence_sorts_in_order() {
        let mut clock = TimestampClock::new();
        let mut times = vec![at(1), at(1), at(1), at(2)];
        // A stuck clock long enough for two-digit repeat counts
        times.extend(std::iter::repeat_n(at(3), 12));
        times.push(at(4));

        let names: Vec<String> = times.into_iter().map(|t| tick(&mut clock, t)).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&"20240305T140709.000003-000011".to_string()));
    }
}
