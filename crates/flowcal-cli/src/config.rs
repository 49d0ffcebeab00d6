//! Run configuration shared by `flowcal run` and `flowcal calibrate`.
//!
//! Relative paths are resolved against the directory of the configuration
//! file.

use anyhow::{anyhow, Context, Result};
use flowcal_algo::{NanPolicy, NelderMeadMinimizer, RunOptions};
use flowcal_core::{BranchParameters, CalibrationTarget};
use flowcal_ts::ReconcileConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowcalConfig {
    /// Directory with `bus.csv`, `gen.csv`, `farms.csv`, `line.csv`,
    /// `trafo.csv` and `link.csv`.
    pub topology_dir: PathBuf,
    /// Service year; elements outside it are dropped before the run.
    pub study_year: Option<i32>,
    /// Optional per-country bus load tables replacing the static shares.
    pub load_tables: Vec<LoadTableSpec>,
    pub sources: SourcePaths,
    pub reconcile: ReconcileConfig,
    pub run: RunOptions,
    pub parameters: BranchParameters,
    pub calibration: CalibrationSpec,
    pub nan_policy: NanPolicy,
}

impl Default for FlowcalConfig {
    fn default() -> Self {
        Self {
            topology_dir: PathBuf::from("topology"),
            study_year: None,
            load_tables: Vec::new(),
            sources: SourcePaths::default(),
            reconcile: ReconcileConfig::default(),
            run: RunOptions::default(),
            parameters: BranchParameters::default(),
            calibration: CalibrationSpec::default(),
            nan_policy: NanPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadTableSpec {
    pub country: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcePaths {
    /// Long-format generation per type (`time,zone,category,value`).
    pub generation: PathBuf,
    /// Long-format market data (`time,table,category,value`).
    pub market: PathBuf,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            generation: PathBuf::from("generation.csv"),
            market: PathBuf::from("market.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationSpec {
    pub targets: Vec<CalibrationTarget>,
    /// One `[lower, upper]` pair per target; the target defaults when absent.
    pub bounds: Option<Vec<(f64, f64)>>,
    /// Start vector; the configured parameter values when absent.
    pub start: Option<Vec<f64>>,
    pub workers: usize,
    pub minimizer: NelderMeadMinimizer,
}

impl Default for CalibrationSpec {
    fn default() -> Self {
        Self {
            targets: CalibrationTarget::line_reactances(),
            bounds: None,
            start: None,
            workers: 1,
            minimizer: NelderMeadMinimizer::default(),
        }
    }
}

impl FlowcalConfig {
    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.topology_dir);
        resolve(&mut self.sources.generation);
        resolve(&mut self.sources.market);
        for table in &mut self.load_tables {
            resolve(&mut table.path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let calibration = &self.calibration;
        if let Some(bounds) = &calibration.bounds {
            if bounds.len() != calibration.targets.len() {
                return Err(anyhow!(
                    "{} bounds given for {} calibration targets",
                    bounds.len(),
                    calibration.targets.len()
                ));
            }
            if let Some((lb, ub)) = bounds.iter().find(|(lb, ub)| lb > ub) {
                return Err(anyhow!("lower bound {lb} exceeds upper bound {ub}"));
            }
        }
        if let Some(start) = &calibration.start {
            if start.len() != calibration.targets.len() {
                return Err(anyhow!(
                    "start vector has {} entries for {} calibration targets",
                    start.len(),
                    calibration.targets.len()
                ));
            }
        }
        if calibration.workers == 0 {
            return Err(anyhow!("calibration.workers must be at least 1"));
        }
        Ok(())
    }
}

/// Read a configuration file. `.yaml`/`.yml` and `.json` pick the format;
/// anything else is tried as YAML, then JSON.
pub fn load_config(path: &Path) -> Result<FlowcalConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading config '{}'", path.display()))?;
    let mut config: FlowcalConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing config yaml")?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing config json")?
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing config")?,
    };
    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcal_algo::allocation::{LinkSplitPolicy, OverflowPolicy};
    use flowcal_core::VoltageClass;
    use tempfile::tempdir;

    #[test]
    fn yaml_overrides_defaults_and_resolves_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        fs::write(
            &path,
            r#"
topology_dir: grid
study_year: 2018
sources:
  generation: data/gen.csv
  market: /abs/market.csv
reconcile:
  zones: [SE1, SE2]
  interpolation_limit: 3
  invert_exchange_sign: true
run:
  allocation:
    overflow: clip
    link_split: capacity_weighted
  comparison:
    include_links: true
calibration:
  targets:
    - kind: line_ohm_per_km
      class: "380"
  bounds: [[0.25, 0.35]]
  workers: 4
nan_policy: fail
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.topology_dir, dir.path().join("grid"));
        assert_eq!(config.sources.generation, dir.path().join("data/gen.csv"));
        assert_eq!(config.sources.market, PathBuf::from("/abs/market.csv"));
        assert_eq!(config.study_year, Some(2018));
        assert_eq!(config.reconcile.zones.len(), 2);
        assert_eq!(config.reconcile.interpolation_limit, 3);
        assert!(config.reconcile.invert_exchange_sign);
        // untouched reconcile fields keep their defaults
        assert_eq!(
            config.reconcile.dst_ratio_threshold,
            ReconcileConfig::default().dst_ratio_threshold
        );
        assert_eq!(config.run.allocation.overflow, OverflowPolicy::Clip);
        assert_eq!(
            config.run.allocation.link_split,
            LinkSplitPolicy::CapacityWeighted
        );
        assert!(config.run.allocation.balance);
        assert!(config.run.comparison.include_links);
        assert_eq!(
            config.calibration.targets,
            vec![CalibrationTarget::LineOhmPerKm {
                class: VoltageClass::Kv380
            }]
        );
        assert_eq!(config.calibration.workers, 4);
        assert_eq!(config.nan_policy, NanPolicy::Fail);
    }

    #[test]
    fn json_with_unknown_extension_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.cfg");
        fs::write(&path, r#"{"study_year": 2020, "run": {"threads": 2}}"#).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.study_year, Some(2020));
        assert_eq!(config.run.threads, 2);
        assert_eq!(config.calibration.targets.len(), 3);
    }

    #[test]
    fn mismatched_bounds_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        fs::write(&path, r#"{"calibration": {"bounds": [[0.2, 0.4]]}}"#).unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("3 calibration targets"));
    }
}
