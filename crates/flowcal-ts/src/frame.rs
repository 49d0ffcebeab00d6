use crate::time::{format_hour, HourRange};
use chrono::NaiveDateTime;
use flowcal_core::{FlowcalError, FlowcalResult};
use std::collections::BTreeMap;

/// Hourly table: one contiguous hour index and named `f64` columns.
///
/// Missing values are `NaN`. Every column has exactly one value per hour.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyFrame<K: Ord> {
    range: HourRange,
    columns: BTreeMap<K, Vec<f64>>,
}

/// A run of missing values found by [`HourlyFrame::interpolate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Gap<K> {
    pub column: K,
    pub start_row: usize,
    pub len: usize,
    pub filled: bool,
}

impl<K: Ord + Clone> HourlyFrame<K> {
    pub fn new(range: HourRange) -> Self {
        Self {
            range,
            columns: BTreeMap::new(),
        }
    }

    pub fn range(&self) -> &HourRange {
        &self.range
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn index(&self) -> Vec<NaiveDateTime> {
        self.range.hours().collect()
    }

    pub fn insert_column(&mut self, key: K, values: Vec<f64>) -> FlowcalResult<()> {
        if values.len() != self.len() {
            return Err(FlowcalError::Validation(format!(
                "column has {} values, frame covers {} hours",
                values.len(),
                self.len()
            )));
        }
        self.columns.insert(key, values);
        Ok(())
    }

    /// Column full of `NaN`, created if absent.
    pub fn column_mut(&mut self, key: K) -> &mut Vec<f64> {
        let len = self.len();
        self.columns.entry(key).or_insert_with(|| vec![f64::NAN; len])
    }

    pub fn column(&self, key: &K) -> Option<&[f64]> {
        self.columns.get(key).map(|v| v.as_slice())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.columns.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.columns.keys()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&K, &[f64])> {
        self.columns.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Value at (column, row); `NaN` when the column is absent.
    pub fn get(&self, key: &K, row: usize) -> f64 {
        self.columns
            .get(key)
            .and_then(|v| v.get(row).copied())
            .unwrap_or(f64::NAN)
    }

    pub fn set(&mut self, key: K, row: usize, value: f64) {
        let column = self.column_mut(key);
        if let Some(slot) = column.get_mut(row) {
            *slot = value;
        }
    }

    /// Value at the hour `ts`; `NaN` outside the range.
    pub fn at(&self, key: &K, ts: &NaiveDateTime) -> f64 {
        match self.range.position(ts) {
            Some(row) => self.get(key, row),
            None => f64::NAN,
        }
    }

    /// Sum over all columns of one row, skipping missing values.
    pub fn row_sum(&self, row: usize) -> f64 {
        self.columns
            .values()
            .filter_map(|v| v.get(row).copied())
            .filter(|x| !x.is_nan())
            .sum()
    }

    pub fn row_has_missing(&self, row: usize) -> bool {
        self.columns
            .values()
            .any(|v| v.get(row).map_or(true, |x| x.is_nan()))
    }

    /// Same values, index moved by `hours`.
    pub fn shift_hours(self, hours: i64) -> Self {
        Self {
            range: self.range.shifted(hours),
            columns: self.columns,
        }
    }

    /// Align to `range`; hours not covered become `NaN`.
    pub fn reindex(&self, range: HourRange) -> Self {
        let mut out = Self::new(range);
        for (key, values) in &self.columns {
            let mapped: Vec<f64> = range
                .hours()
                .map(|ts| match self.range.position(&ts) {
                    Some(row) => values[row],
                    None => f64::NAN,
                })
                .collect();
            out.columns.insert(key.clone(), mapped);
        }
        out
    }

    /// Map and merge columns. Columns mapped to the same key are summed
    /// (a `NaN` in any contributor makes the sum `NaN`); `None` drops a column.
    pub fn regroup<K2: Ord + Clone>(&self, mut map: impl FnMut(&K) -> Option<K2>) -> HourlyFrame<K2> {
        let mut out = HourlyFrame::new(self.range);
        for (key, values) in &self.columns {
            let Some(target) = map(key) else {
                continue;
            };
            let len = values.len();
            let column = out.columns.entry(target).or_insert_with(|| vec![0.0; len]);
            for (acc, v) in column.iter_mut().zip(values) {
                *acc += v;
            }
        }
        out
    }

    /// Fill runs of missing values per column.
    ///
    /// - interior runs of at most `limit` hours: linear interpolation between
    ///   the neighbouring values
    /// - trailing runs of at most `limit` hours: last value carried forward
    /// - leading runs and runs longer than `limit`: left missing
    ///
    /// Every run found is reported, filled or not.
    pub fn interpolate(&mut self, limit: usize) -> Vec<Gap<K>> {
        let mut gaps = Vec::new();
        for (key, values) in self.columns.iter_mut() {
            let n = values.len();
            let mut row = 0;
            while row < n {
                if !values[row].is_nan() {
                    row += 1;
                    continue;
                }
                let start = row;
                while row < n && values[row].is_nan() {
                    row += 1;
                }
                let len = row - start;
                let before = start.checked_sub(1).map(|i| values[i]);
                let after = (row < n).then(|| values[row]);
                let filled = match (before, after) {
                    (Some(a), Some(b)) if len <= limit => {
                        let span = (len + 1) as f64;
                        for (k, slot) in values[start..row].iter_mut().enumerate() {
                            let w = (k + 1) as f64 / span;
                            *slot = a + (b - a) * w;
                        }
                        true
                    }
                    (Some(a), None) if len <= limit => {
                        for slot in values[start..row].iter_mut() {
                            *slot = a;
                        }
                        true
                    }
                    _ => false,
                };
                gaps.push(Gap {
                    column: key.clone(),
                    start_row: start,
                    len,
                    filled,
                });
            }
        }
        gaps
    }

    pub fn hour_label(&self, row: usize) -> String {
        self.range
            .hours()
            .nth(row)
            .map(|ts| format_hour(&ts))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_hour;

    fn range(hours: i64) -> HourRange {
        let start = parse_hour("20180101:00").unwrap();
        HourRange::new(start, start + chrono::Duration::hours(hours - 1)).unwrap()
    }

    fn frame(values: Vec<f64>) -> HourlyFrame<&'static str> {
        let mut f = HourlyFrame::new(range(values.len() as i64));
        f.insert_column("a", values).unwrap();
        f
    }

    #[test]
    fn interior_gap_is_linear() {
        let mut f = frame(vec![100.0, f64::NAN, f64::NAN, 130.0]);
        let gaps = f.interpolate(10);
        assert_eq!(f.column(&"a").unwrap(), &[100.0, 110.0, 120.0, 130.0]);
        assert_eq!(gaps.len(), 1);
        assert!(gaps[0].filled);
        assert_eq!((gaps[0].start_row, gaps[0].len), (1, 2));
    }

    #[test]
    fn long_gap_stays_missing() {
        let mut values = vec![1.0];
        values.extend(std::iter::repeat(f64::NAN).take(11));
        values.push(2.0);
        let mut f = frame(values);
        let gaps = f.interpolate(10);
        assert!(!gaps[0].filled);
        assert_eq!(gaps[0].len, 11);
        assert!(f.column(&"a").unwrap()[1..12].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn trailing_gap_carries_forward_and_leading_stays() {
        let mut f = frame(vec![f64::NAN, 5.0, 6.0, f64::NAN]);
        let gaps = f.interpolate(10);
        let col = f.column(&"a").unwrap();
        assert!(col[0].is_nan());
        assert_eq!(col[3], 6.0);
        assert_eq!(gaps.iter().filter(|g| g.filled).count(), 1);
    }

    #[test]
    fn regroup_sums_and_propagates_nan() {
        let mut f = HourlyFrame::new(range(2));
        f.insert_column("Gas", vec![1.0, 2.0]).unwrap();
        f.insert_column("Oil", vec![3.0, f64::NAN]).unwrap();
        f.insert_column("Hydro", vec![10.0, 10.0]).unwrap();
        let g = f.regroup(|k| match *k {
            "Gas" | "Oil" => Some("Thermal"),
            "Hydro" => Some("Hydro"),
            _ => None,
        });
        assert_eq!(g.column(&"Thermal").unwrap()[0], 4.0);
        assert!(g.column(&"Thermal").unwrap()[1].is_nan());
        assert_eq!(g.column(&"Hydro").unwrap(), &[10.0, 10.0]);
    }

    #[test]
    fn reindex_and_shift_align_hours() {
        let f = frame(vec![1.0, 2.0, 3.0]).shift_hours(1);
        let aligned = f.reindex(range(3));
        let col = aligned.column(&"a").unwrap();
        assert!(col[0].is_nan());
        assert_eq!(&col[1..], &[1.0, 2.0]);
    }

    #[test]
    fn row_sum_skips_missing() {
        let mut f = HourlyFrame::new(range(1));
        f.insert_column("x", vec![2.0]).unwrap();
        f.insert_column("y", vec![f64::NAN]).unwrap();
        assert_eq!(f.row_sum(0), 2.0);
        assert!(f.row_has_missing(0));
        assert!(f.insert_column("z", vec![1.0, 2.0]).is_err());
    }
}
