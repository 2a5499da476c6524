// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::str::FromStr;
use std::time::Duration;

use jiff::Zoned;

use crate::Error;

const DAY_SECS: i64 = 86_400;
const WEEK_SECS: i64 = 604_800;
const MONTH_SECS: i64 = 2_678_400;

/// How old the live file may get before it is rolled.
///
/// Calendar modes trigger on whichever comes first: crossing the calendar boundary, or the
/// elapsed time exceeding the period. The second condition covers a process that never writes
/// near the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxAge {
    /// New local day, or more than 24 hours.
    Daily,
    /// New ISO week, or more than 7 days.
    Weekly,
    /// New calendar month, or more than 31 days.
    Monthly,
    /// More than this many whole seconds.
    Every(Duration),
}

impl MaxAge {
    /// Whether a file started at `since` is due for rotation at `now`.
    pub(crate) fn is_exceeded(&self, since: &Zoned, now: &Zoned) -> bool {
        let elapsed = now.timestamp().as_second() - since.timestamp().as_second();
        match self {
            MaxAge::Daily => now.date() != since.date() || elapsed > DAY_SECS,
            MaxAge::Weekly => {
                let (a, b) = (now.date().iso_week_date(), since.date().iso_week_date());
                (a.year(), a.week()) != (b.year(), b.week()) || elapsed > WEEK_SECS
            }
            MaxAge::Monthly => {
                (now.year(), now.month()) != (since.year(), since.month()) || elapsed > MONTH_SECS
            }
            MaxAge::Every(period) => elapsed > i64::try_from(period.as_secs()).unwrap_or(i64::MAX),
        }
    }
}

impl FromStr for MaxAge {
    type Err = Error;

    /// Parse `"daily"`, `"weekly"`, `"monthly"` or a number of seconds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(MaxAge::Daily),
            "weekly" => Ok(MaxAge::Weekly),
            "monthly" => Ok(MaxAge::Monthly),
            secs => secs
                .parse::<u64>()
                .map(|secs| MaxAge::Every(Duration::from_secs(secs)))
                .map_err(|err| {
                    Error::config("invalid max age")
                        .with_context("age", s)
                        .with_context("expected", "daily, weekly, monthly or seconds")
                        .with_source(err)
                }),
        }
    }
}

impl From<Duration> for MaxAge {
    fn from(period: Duration) -> Self {
        MaxAge::Every(period)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use jiff::ToSpan;

    use super::*;
    use crate::ErrorKind;

    fn at(s: &str) -> Zoned {
        Zoned::from_str(s).unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!("daily".parse::<MaxAge>().unwrap(), MaxAge::Daily);
        assert_eq!("Weekly".parse::<MaxAge>().unwrap(), MaxAge::Weekly);
        assert_eq!(
            "3600".parse::<MaxAge>().unwrap(),
            MaxAge::Every(Duration::from_secs(3600))
        );
        let err = "bob".parse::<MaxAge>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_daily_crosses_midnight_or_full_day() {
        let since = at("2024-08-10T23:50:00[UTC]");
        assert!(!MaxAge::Daily.is_exceeded(&since, &at("2024-08-10T23:59:59[UTC]")));
        assert!(MaxAge::Daily.is_exceeded(&since, &at("2024-08-11T00:00:01[UTC]")));

        let since = at("2024-08-10T00:00:00[UTC]");
        assert!(!MaxAge::Daily.is_exceeded(&since, &(&since + 23.hours())));
    }

    #[test]
    fn test_weekly_and_monthly() {
        // 2024-08-11 is a Sunday, 2024-08-12 a Monday
        let since = at("2024-08-11T12:00:00[UTC]");
        assert!(!MaxAge::Weekly.is_exceeded(&since, &at("2024-08-11T23:00:00[UTC]")));
        assert!(MaxAge::Weekly.is_exceeded(&since, &at("2024-08-12T01:00:00[UTC]")));

        let since = at("2024-08-30T12:00:00[UTC]");
        assert!(!MaxAge::Monthly.is_exceeded(&since, &at("2024-08-31T12:00:00[UTC]")));
        assert!(MaxAge::Monthly.is_exceeded(&since, &at("2024-09-01T00:00:00[UTC]")));
    }

    #[test]
    fn test_fixed_period_uses_whole_seconds() {
        let age = MaxAge::Every(Duration::from_secs(60));
        let since = at("2024-08-10T00:00:00[UTC]");
        assert!(!age.is_exceeded(&since, &(&since + 60.seconds())));
        assert!(age.is_exceeded(&since, &(&since + 61.seconds())));
    }
}
