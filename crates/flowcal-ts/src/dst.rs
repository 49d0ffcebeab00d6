//! Autumn clock-change repair for generation-by-type series.
//!
//! The upstream feed reports the repeated autumn hour twice into the hour
//! before it and leaves the clock-change hour itself empty. The repair halves
//! the inflated hour and copies it forward, but only when the pattern is
//! actually present.

use crate::frame::HourlyFrame;
use crate::time::is_autumn_clock_change;

/// Rows of the frame that fall on an autumn clock-change hour.
pub fn clock_change_rows<K: Ord + Clone>(frame: &HourlyFrame<K>) -> Vec<usize> {
    frame
        .range()
        .hours()
        .enumerate()
        .filter(|(_, ts)| is_autumn_clock_change(ts))
        .map(|(row, _)| row)
        .collect()
}

/// Apply the repair to every clock-change row `s` (with `s >= 2`) where row
/// `s` has a missing value and `sum(s-1) / sum(s-2) > threshold`.
///
/// Row sums skip missing values. Returns the corrected rows.
pub fn correct_clock_change<K: Ord + Clone>(frame: &mut HourlyFrame<K>, threshold: f64) -> Vec<usize> {
    let mut corrected = Vec::new();
    for s in clock_change_rows(frame) {
        if s < 2 || !frame.row_has_missing(s) {
            continue;
        }
        let ratio = frame.row_sum(s - 1) / frame.row_sum(s - 2);
        if !(ratio > threshold) {
            continue;
        }
        let keys: Vec<K> = frame.keys().cloned().collect();
        for key in keys {
            let halved = frame.get(&key, s - 1) / 2.0;
            frame.set(key.clone(), s - 1, halved);
            frame.set(key, s, halved);
        }
        corrected.push(s);
    }
    corrected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{parse_hour, HourRange};

    /// 2018-10-28 00:00 .. 04:00; the clock-change hour is row 2.
    fn clock_change_frame(prev: f64, prev2: f64, missing: bool) -> HourlyFrame<&'static str> {
        let range = HourRange::new(
            parse_hour("20181028:00").unwrap(),
            parse_hour("20181028:04").unwrap(),
        )
        .unwrap();
        let mut frame = HourlyFrame::new(range);
        let at_change = if missing { f64::NAN } else { prev };
        frame
            .insert_column("Hydro", vec![prev2, prev, at_change, 100.0, 100.0])
            .unwrap();
        frame
    }

    #[test]
    fn ratio_below_threshold_is_untouched() {
        let mut frame = clock_change_frame(140.0, 100.0, true);
        assert!(correct_clock_change(&mut frame, 1.5).is_empty());
        assert_eq!(frame.get(&"Hydro", 1), 140.0);
        assert!(frame.get(&"Hydro", 2).is_nan());
    }

    #[test]
    fn inflated_hour_is_halved_and_copied() {
        let mut frame = clock_change_frame(160.0, 100.0, true);
        assert_eq!(correct_clock_change(&mut frame, 1.5), vec![2]);
        assert_eq!(frame.get(&"Hydro", 1), 80.0);
        assert_eq!(frame.get(&"Hydro", 2), 80.0);
    }

    #[test]
    fn ratio_exactly_at_threshold_is_untouched() {
        let mut frame = clock_change_frame(150.0, 100.0, true);
        assert!(correct_clock_change(&mut frame, 1.5).is_empty());
    }

    #[test]
    fn no_missing_value_means_no_correction() {
        let mut frame = clock_change_frame(300.0, 100.0, false);
        assert!(correct_clock_change(&mut frame, 1.5).is_empty());
        assert_eq!(frame.get(&"Hydro", 1), 300.0);
    }

    #[test]
    fn other_hours_never_trigger() {
        let range = HourRange::new(
            parse_hour("20181021:00").unwrap(),
            parse_hour("20181021:04").unwrap(),
        )
        .unwrap();
        let mut frame = HourlyFrame::new(range);
        frame
            .insert_column("Hydro", vec![100.0, 300.0, f64::NAN, 100.0, 100.0])
            .unwrap();
        assert!(clock_change_rows(&frame).is_empty());
        assert!(correct_clock_change(&mut frame, 1.5).is_empty());
    }
}
