use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::ConfigError;

/// Source of wall-clock time for the controller.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Local time of day, `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTime {
    pub hour: u32,
    pub minute: u32,
}

impl FromStr for StopTime {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ConfigError::StopTime(s.to_string());
        let (hour, minute) = s.trim().split_once(':').ok_or_else(err)?;
        let hour: u32 = hour.parse().map_err(|_| err())?;
        let minute: u32 = minute.parse().map_err(|_| err())?;
        if hour > 23 || minute > 59 {
            return Err(err());
        }
        Ok(StopTime { hour, minute })
    }
}

impl fmt::Display for StopTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>()
        .map_err(|_| ConfigError::Timezone(name.to_string()))
}

/// Daily stop time in a reference timezone.
///
/// A single check counts the cutoff as reached from `hour:minute` until the
/// end of that local hour, on any day. Between two checks, any daily cutoff
/// instant falling in `(since, now]` also counts, so a slow round or a short
/// window cannot skip past it.
#[derive(Debug, Clone, Copy)]
pub struct Cutoff {
    pub at: StopTime,
    pub timezone: Tz,
}

impl Cutoff {
    pub fn reached(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);
        local.hour() == self.at.hour && local.minute() >= self.at.minute
    }

    /// `reached(now)`, or a cutoff instant passed since the previous check.
    pub fn passed(&self, since: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        if self.reached(now) {
            return true;
        }
        let Some(since) = since else {
            return false;
        };
        if now <= since {
            return false;
        }
        if now - since >= TimeDelta::days(1) {
            return true;
        }

        let last = now.with_timezone(&self.timezone).date_naive();
        let mut date = since.with_timezone(&self.timezone).date_naive();
        while date <= last {
            if let Some(at) = self.instant_on(date) {
                if since < at && at <= now {
                    return true;
                }
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        false
    }

    /// The cutoff instant on a local date. A time skipped by a DST jump
    /// resolves to the same wall time one hour later.
    fn instant_on(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let local = date.and_hms_opt(self.at.hour, self.at.minute, 0)?;
        self.timezone
            .from_local_datetime(&local)
            .earliest()
            .or_else(|| {
                self.timezone
                    .from_local_datetime(&(local + TimeDelta::hours(1)))
                    .earliest()
            })
            .map(|t| t.with_timezone(&Utc))
    }
}

impl fmt::Display for Cutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.at, self.timezone)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn eastern_cutoff() -> Cutoff {
        Cutoff {
            at: "04:09".parse().unwrap(),
            timezone: parse_timezone("US/Eastern").unwrap(),
        }
    }

    #[test]
    fn parses_stop_time() {
        assert_eq!("04:09".parse::<StopTime>().unwrap(), StopTime { hour: 4, minute: 9 });
        assert_eq!("4:09".parse::<StopTime>().unwrap().to_string(), "04:09");
        for bad in ["", "0409", "24:00", "12:60", "ab:cd"] {
            assert!(bad.parse::<StopTime>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn rejects_unknown_timezone() {
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn cutoff_uses_reference_timezone() {
        let cutoff = eastern_cutoff();
        // August: Eastern is UTC-4, so 04:09 EDT is 08:09 UTC.
        assert!(cutoff.reached(Utc.with_ymd_and_hms(2025, 8, 3, 8, 9, 0).unwrap()));
        assert!(cutoff.reached(Utc.with_ymd_and_hms(2025, 8, 3, 8, 30, 0).unwrap()));
        assert!(!cutoff.reached(Utc.with_ymd_and_hms(2025, 8, 3, 8, 8, 59).unwrap()));
        assert!(!cutoff.reached(Utc.with_ymd_and_hms(2025, 8, 3, 4, 9, 0).unwrap()));
    }

    #[test]
    fn cutoff_passed_between_checks() {
        let cutoff = eastern_cutoff();
        let since = Utc.with_ymd_and_hms(2025, 8, 3, 8, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 8, 3, 9, 0, 0).unwrap();
        // 05:00 EDT is outside the 04:xx window on its own.
        assert!(!cutoff.reached(now));
        assert!(cutoff.passed(Some(since), now));
        assert!(!cutoff.passed(None, now));
    }

    #[test]
    fn cutoff_passed_across_midnight() {
        let cutoff = Cutoff {
            at: "23:59".parse().unwrap(),
            timezone: parse_timezone("UTC").unwrap(),
        };
        let since = Utc.with_ymd_and_hms(2025, 8, 1, 23, 58, 30).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 8, 2, 0, 0, 10).unwrap();
        assert!(!cutoff.reached(since));
        assert!(!cutoff.reached(now));
        assert!(cutoff.passed(Some(since), now));
    }

    #[test]
    fn cutoff_not_passed_between_earlier_checks() {
        let cutoff = eastern_cutoff();
        let since = Utc.with_ymd_and_hms(2025, 8, 3, 7, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 8, 3, 8, 8, 30).unwrap();
        assert!(!cutoff.passed(Some(since), now));
        // A check after a long stall always stops.
        let later = Utc.with_ymd_and_hms(2025, 8, 4, 8, 0, 0).unwrap();
        assert!(cutoff.passed(Some(since), later));
    }

    #[test]
    fn cutoff_follows_daylight_saving() {
        let cutoff = eastern_cutoff();
        // January: Eastern is UTC-5.
        assert!(cutoff.reached(Utc.with_ymd_and_hms(2026, 1, 15, 9, 9, 0).unwrap()));
        assert!(!cutoff.reached(Utc.with_ymd_and_hms(2026, 1, 15, 8, 9, 0).unwrap()));
    }
}
