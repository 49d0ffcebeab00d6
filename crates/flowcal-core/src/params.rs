//! Branch parameter model.
//!
//! Line and transformer R/X/B are not read from the topology tables; they
//! are derived from a handful of per-voltage-class coefficients. Those
//! coefficients are what calibration adjusts, addressed through
//! [`CalibrationTarget`].

use crate::{FlowcalError, FlowcalResult, Topology, BASE_MVA};
use serde::{Deserialize, Serialize};

/// Voltage classes used by the coefficient tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoltageClass {
    #[serde(rename = "380")]
    Kv380,
    #[serde(rename = "300")]
    Kv300,
    /// 220 kV and below.
    #[serde(rename = "220")]
    Kv220,
}

impl VoltageClass {
    pub fn of(base_kv: f64) -> Self {
        if (base_kv - 380.0).abs() < 0.5 {
            VoltageClass::Kv380
        } else if (base_kv - 300.0).abs() < 0.5 {
            VoltageClass::Kv300
        } else {
            VoltageClass::Kv220
        }
    }

    fn index(self) -> usize {
        match self {
            VoltageClass::Kv380 => 0,
            VoltageClass::Kv300 => 1,
            VoltageClass::Kv220 => 2,
        }
    }
}

/// Series compensation of long high-voltage lines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Compensation {
    /// Fraction of X removed by the series capacitors.
    pub factor: f64,
    pub min_kv: f64,
    pub min_length_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchParameters {
    /// Series reactance in ohm/km for [380, 300, <=220] kV lines.
    pub ohm_per_km: [f64; 3],
    /// Charging susceptance in S/km for [380, 300, <=220] kV lines.
    pub siemens_per_km: [f64; 3],
    pub compensation: Compensation,
    /// Transformer reactance (pu per MVA base) by the higher side voltage class.
    pub trafo_x: [f64; 3],
    /// X/R ratios for [380, 300, <=220] kV lines.
    pub line_x_over_r: [f64; 3],
    pub trafo_x_over_r: f64,
    pub base_mva: f64,
}

impl Default for BranchParameters {
    fn default() -> Self {
        Self {
            ohm_per_km: [0.246, 0.265, 0.301],
            siemens_per_km: [13.8e-9, 13.2e-9, 12.5e-9],
            compensation: Compensation {
                factor: 0.5,
                min_kv: 380.0,
                min_length_km: 200.0,
            },
            trafo_x: [2.8e-4, 4e-4, 7e-4],
            line_x_over_r: [8.2, 6.625, 5.01667],
            trafo_x_over_r: 50.0,
            base_mva: BASE_MVA,
        }
    }
}

impl BranchParameters {
    /// Per-unit (R, X, B) of a line.
    pub fn line_impedance(&self, base_kv: f64, length_km: f64) -> (f64, f64, f64) {
        let class = VoltageClass::of(base_kv).index();
        let z_base = base_kv * base_kv / self.base_mva;
        let mut x = self.ohm_per_km[class] * length_km / z_base;
        let r = x / self.line_x_over_r[class];
        let comp = &self.compensation;
        if base_kv >= comp.min_kv && length_km >= comp.min_length_km {
            x -= comp.factor * x;
        }
        let b = self.siemens_per_km[class] * length_km * z_base;
        (r, x, b)
    }

    /// Per-unit (R, X, B) of a transformer given its higher side voltage.
    pub fn trafo_impedance(&self, max_kv: f64) -> (f64, f64, f64) {
        let x = self.trafo_x[VoltageClass::of(max_kv).index()] * self.base_mva;
        (x / self.trafo_x_over_r, x, 0.0)
    }

    /// Overwrite R/X/B of every line and transformer.
    pub fn apply(&self, topology: &mut Topology) -> FlowcalResult<()> {
        if self.base_mva <= 0.0 {
            return Err(FlowcalError::Config("base_mva must be positive".into()));
        }
        for line in topology.lines.iter_mut() {
            if line.base_kv <= 0.0 {
                return Err(FlowcalError::Validation(format!(
                    "{} has non-positive voltage base",
                    line.id
                )));
            }
            let (r, x, b) = self.line_impedance(line.base_kv, line.length_km);
            line.r = r;
            line.x = x;
            line.b = b;
        }
        let max_kv = topology
            .transformers
            .iter()
            .map(|trafo| {
                match (topology.bus(trafo.bus0), topology.bus(trafo.bus1)) {
                    (Some(a), Some(b)) => Ok(a.base_kv.max(b.base_kv)),
                    _ => Err(FlowcalError::Topology(format!(
                        "{} references a missing bus",
                        trafo.id
                    ))),
                }
            })
            .collect::<FlowcalResult<Vec<f64>>>()?;
        for (trafo, kv) in topology.transformers.iter_mut().zip(max_kv) {
            let (r, x, b) = self.trafo_impedance(kv);
            trafo.r = r;
            trafo.x = x;
            trafo.b = b;
        }
        Ok(())
    }

    /// Copy with the calibration vector written into the addressed coefficients.
    pub fn with_targets(
        &self,
        targets: &[CalibrationTarget],
        values: &[f64],
    ) -> FlowcalResult<Self> {
        if targets.len() != values.len() {
            return Err(FlowcalError::Validation(format!(
                "parameter vector has {} entries, expected {}",
                values.len(),
                targets.len()
            )));
        }
        let mut out = self.clone();
        for (target, &value) in targets.iter().zip(values) {
            if !value.is_finite() {
                return Err(FlowcalError::Validation(format!(
                    "non-finite value for {target:?}"
                )));
            }
            match *target {
                CalibrationTarget::LineOhmPerKm { class } => out.ohm_per_km[class.index()] = value,
                CalibrationTarget::TrafoReactance { class } => out.trafo_x[class.index()] = value,
                CalibrationTarget::CompensationFactor => out.compensation.factor = value,
            }
        }
        Ok(out)
    }

    /// Current values of the addressed coefficients.
    pub fn values_of(&self, targets: &[CalibrationTarget]) -> Vec<f64> {
        targets
            .iter()
            .map(|target| match *target {
                CalibrationTarget::LineOhmPerKm { class } => self.ohm_per_km[class.index()],
                CalibrationTarget::TrafoReactance { class } => self.trafo_x[class.index()],
                CalibrationTarget::CompensationFactor => self.compensation.factor,
            })
            .collect()
    }
}

/// One position of the calibration vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalibrationTarget {
    LineOhmPerKm { class: VoltageClass },
    TrafoReactance { class: VoltageClass },
    CompensationFactor,
}

impl CalibrationTarget {
    /// Line reactance per km for the three voltage classes.
    pub fn line_reactances() -> Vec<CalibrationTarget> {
        [VoltageClass::Kv380, VoltageClass::Kv300, VoltageClass::Kv220]
            .into_iter()
            .map(|class| CalibrationTarget::LineOhmPerKm { class })
            .collect()
    }

    pub fn default_bounds(&self) -> (f64, f64) {
        match self {
            CalibrationTarget::LineOhmPerKm { .. } => (0.2, 0.4),
            CalibrationTarget::TrafoReactance { .. } => (1e-4, 1e-3),
            CalibrationTarget::CompensationFactor => (0.0, 0.9),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::tests::sample_topology;

    #[test]
    fn line_impedance_follows_per_km_model() {
        let params = BranchParameters::default();
        let (r, x, b) = params.line_impedance(220.0, 50.0);
        let z_base = 220.0 * 220.0 / 100.0;
        assert!((x - 0.301 * 50.0 / z_base).abs() < 1e-12);
        assert!((r - x / 5.01667).abs() < 1e-12);
        assert!((b - 12.5e-9 * 50.0 * z_base).abs() < 1e-15);
    }

    #[test]
    fn long_380_lines_are_compensated() {
        let params = BranchParameters::default();
        let (r_short, x_short, _) = params.line_impedance(380.0, 100.0);
        let (r_long, x_long, _) = params.line_impedance(380.0, 200.0);
        // reactance halves on top of doubling with length; R is not compensated
        assert!((x_long - x_short).abs() < 1e-12);
        assert!((r_long - 2.0 * r_short).abs() < 1e-12);
    }

    #[test]
    fn apply_uses_higher_trafo_voltage() {
        let mut topo = sample_topology();
        BranchParameters::default().apply(&mut topo).unwrap();
        let trafo = &topo.transformers[0];
        assert!((trafo.x - 2.8e-4 * 100.0).abs() < 1e-12);
        assert!((trafo.r - trafo.x / 50.0).abs() < 1e-12);
        assert_eq!(trafo.b, 0.0);
    }

    #[test]
    fn targets_write_and_read_back() {
        let targets = CalibrationTarget::line_reactances();
        let params = BranchParameters::default()
            .with_targets(&targets, &[0.3, 0.31, 0.32])
            .unwrap();
        assert_eq!(params.values_of(&targets), vec![0.3, 0.31, 0.32]);
        assert!(BranchParameters::default()
            .with_targets(&targets, &[0.3])
            .is_err());
    }

    #[test]
    fn target_serializes_with_kind_tag() {
        let target = CalibrationTarget::LineOhmPerKm {
            class: VoltageClass::Kv300,
        };
        let json = serde_json::to_string(&target).unwrap();
        assert_eq!(json, r#"{"kind":"line_ohm_per_km","class":"300"}"#);
    }
}
