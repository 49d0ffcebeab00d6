use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Weekday};
use flowcal_core::{FlowcalError, FlowcalResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Compact hour format used on the command line and in manifests: `yyyymmdd:hh`.
pub const HOUR_FORMAT: &str = "%Y%m%d:%H";

/// Parse `yyyymmdd:hh`.
pub fn parse_hour(text: &str) -> FlowcalResult<NaiveDateTime> {
    let text = text.trim();
    let (date, hour) = text
        .split_once(':')
        .ok_or_else(|| FlowcalError::Parse(format!("'{text}' is not yyyymmdd:hh")))?;
    let date = NaiveDate::parse_from_str(date, "%Y%m%d")
        .map_err(|err| FlowcalError::Parse(format!("'{text}': {err}")))?;
    let hour: u32 = hour
        .parse()
        .map_err(|_| FlowcalError::Parse(format!("'{text}': bad hour")))?;
    date.and_hms_opt(hour, 0, 0)
        .ok_or_else(|| FlowcalError::Parse(format!("'{text}': hour out of range")))
}

/// Parse a timestamp as found in data files; minutes and seconds must be zero.
pub fn parse_timestamp(text: &str) -> FlowcalResult<NaiveDateTime> {
    let text = text.trim();
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
    ];
    let parsed = FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok());
    let ts = match parsed {
        Some(ts) => ts,
        None => parse_hour(text)?,
    };
    if ts.minute() != 0 || ts.second() != 0 {
        return Err(FlowcalError::Parse(format!(
            "timestamp '{text}' is not on the hour"
        )));
    }
    Ok(ts)
}

pub fn format_hour(ts: &NaiveDateTime) -> String {
    ts.format(HOUR_FORMAT).to_string()
}

/// Last Sunday of October, 02:00: the hour a naive hourly clock repeats.
pub fn is_autumn_clock_change(ts: &NaiveDateTime) -> bool {
    ts.month() == 10 && ts.weekday() == Weekday::Sun && ts.day() > 24 && ts.hour() == 2
}

/// Inclusive range of whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl HourRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> FlowcalResult<Self> {
        if end < start {
            return Err(FlowcalError::Validation(format!(
                "range end {} precedes start {}",
                format_hour(&end),
                format_hour(&start)
            )));
        }
        if start.minute() != 0 || start.second() != 0 || end.minute() != 0 || end.second() != 0
        {
            return Err(FlowcalError::Validation(
                "range bounds must be whole hours".into(),
            ));
        }
        Ok(Self { start, end })
    }

    /// Parse two `yyyymmdd:hh` bounds; a missing end means a single hour.
    pub fn parse(start: &str, end: Option<&str>) -> FlowcalResult<Self> {
        let start = parse_hour(start)?;
        let end = match end {
            Some(end) => parse_hour(end)?,
            None => start,
        };
        Self::new(start, end)
    }

    pub fn single(hour: NaiveDateTime) -> FlowcalResult<Self> {
        Self::new(hour, hour)
    }

    pub fn len(&self) -> usize {
        ((self.end - self.start).num_hours() + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hours(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        (0..self.len() as i64).map(move |h| self.start + Duration::hours(h))
    }

    /// Row of `ts` in [`HourRange::hours`].
    pub fn position(&self, ts: &NaiveDateTime) -> Option<usize> {
        if *ts < self.start || *ts > self.end {
            return None;
        }
        let delta = *ts - self.start;
        if delta.num_seconds() % 3600 != 0 {
            return None;
        }
        Some(delta.num_hours() as usize)
    }

    pub fn shifted(&self, hours: i64) -> Self {
        Self {
            start: self.start + Duration::hours(hours),
            end: self.end + Duration::hours(hours),
        }
    }

    /// Split into `parts` disjoint, contiguous ranges covering this one.
    ///
    /// Earlier parts take the remainder hours. Never returns more parts than hours.
    pub fn split(&self, parts: usize) -> Vec<HourRange> {
        let total = self.len();
        let parts = parts.clamp(1, total);
        let base = total / parts;
        let extra = total % parts;
        let mut out = Vec::with_capacity(parts);
        let mut offset = 0i64;
        for i in 0..parts {
            let size = (base + usize::from(i < extra)) as i64;
            let start = self.start + Duration::hours(offset);
            let end = start + Duration::hours(size - 1);
            out.push(HourRange { start, end });
            offset += size;
        }
        out
    }
}

impl fmt::Display for HourRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", format_hour(&self.start), format_hour(&self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compact_hours() {
        let ts = parse_hour("20181028:02").unwrap();
        assert_eq!(ts.to_string(), "2018-10-28 02:00:00");
        assert!(parse_hour("20181028").is_err());
        assert!(parse_hour("20181028:25").is_err());
    }

    #[test]
    fn parses_file_timestamps() {
        assert_eq!(
            parse_timestamp("2018-01-01 05:00").unwrap(),
            parse_hour("20180101:05").unwrap()
        );
        assert!(parse_timestamp("2018-01-01 05:30").is_err());
    }

    #[test]
    fn autumn_clock_change_detection() {
        assert!(is_autumn_clock_change(&parse_hour("20181028:02").unwrap()));
        assert!(!is_autumn_clock_change(&parse_hour("20181028:03").unwrap()));
        // Sunday in October but not the last one
        assert!(!is_autumn_clock_change(&parse_hour("20181021:02").unwrap()));
        assert!(is_autumn_clock_change(&parse_hour("20171029:02").unwrap()));
    }

    #[test]
    fn range_length_and_positions() {
        let range = HourRange::parse("20180101:00", Some("20180102:00")).unwrap();
        assert_eq!(range.len(), 25);
        assert_eq!(range.position(&parse_hour("20180101:05").unwrap()), Some(5));
        assert_eq!(range.position(&parse_hour("20180103:00").unwrap()), None);
        assert!(HourRange::parse("20180102:00", Some("20180101:00")).is_err());
    }

    #[test]
    fn split_covers_range_without_overlap() {
        let range = HourRange::parse("20180101:00", Some("20180101:09")).unwrap();
        let parts = range.split(3);
        let lens: Vec<usize> = parts.iter().map(|p| p.len()).collect();
        assert_eq!(lens, vec![4, 3, 3]);
        assert_eq!(parts[0].start, range.start);
        assert_eq!(parts[2].end, range.end);
        for pair in parts.windows(2) {
            assert_eq!(pair[1].start, pair[0].end + Duration::hours(1));
        }
        assert_eq!(range.split(50).len(), 10);
    }

    #[test]
    fn display_uses_compact_format() {
        let range = HourRange::parse("20180101:00", Some("20180101:23")).unwrap();
        assert_eq!(range.to_string(), "20180101:00..20180101:23");
    }
}
