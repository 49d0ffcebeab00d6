use flowcal_ts::{format_hour, HourRange};
use serde::{Deserialize, Serialize};

/// One calibration interval handed to one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerJob {
    pub worker: usize,
    pub interval: HourRange,
}

impl WorkerJob {
    pub fn label(&self) -> String {
        format!(
            "worker {} ({}..{})",
            self.worker,
            format_hour(&self.interval.start),
            format_hour(&self.interval.end)
        )
    }
}

/// Outcome of one worker as stored in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub worker: usize,
    pub interval: HourRange,
    /// Best parameter vector, empty when the worker failed.
    pub x: Vec<f64>,
    /// Objective value at `x`.
    pub fun: Option<f64>,
    pub iterations: u64,
    pub status: String,
    pub error: Option<String>,
}

/// Split `range` into at most `workers` contiguous intervals, numbered from 0.
pub fn jobs_from_range(range: &HourRange, workers: usize) -> Vec<WorkerJob> {
    range
        .split(workers)
        .into_iter()
        .enumerate()
        .map(|(worker, interval)| WorkerJob { worker, interval })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_cover_the_window_without_overlap() {
        let range = HourRange::parse("20180101:00", Some("20180101:09")).unwrap();
        let jobs = jobs_from_range(&range, 3);
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].interval.start, range.start);
        assert_eq!(jobs[2].interval.end, range.end);
        let hours: usize = jobs.iter().map(|j| j.interval.len()).sum();
        assert_eq!(hours, 10);
        for pair in jobs.windows(2) {
            assert_eq!(
                pair[0].interval.end + chrono::Duration::hours(1),
                pair[1].interval.start
            );
        }
        assert_eq!(jobs[1].label(), "worker 1 (20180101:04..20180101:06)");
    }

    #[test]
    fn never_more_workers_than_hours() {
        let range = HourRange::parse("20180101:00", Some("20180101:01")).unwrap();
        assert_eq!(jobs_from_range(&range, 8).len(), 2);
    }
}
