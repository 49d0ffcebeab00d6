//! Recoverable conditions met while preparing a topology, reconciling
//! measurements and allocating injections.
//!
//! None of them halt a run. Each one is kept as a [`DiagnosticIssue`] with a
//! category from [`category`], a message and an optional entity (a bus, a
//! corridor, a zone/type pair or an hour), and is logged at `warn` level when
//! recorded through [`Diagnostics::warn`].
//!
//! ```
//! use flowcal_core::diagnostics::{category, Diagnostics};
//!
//! let mut diag = Diagnostics::new();
//! diag.warn(category::CAPACITY_OVERFLOW, "share 1.2 above installed hydro", Some("NO1/Hydro"));
//! diag.warn(category::UNMAPPED_CORRIDOR, "no branch or link", Some("FI-RU"));
//!
//! assert_eq!(diag.warning_count(), 2);
//! assert_eq!(diag.summary(), "2 warnings (capacity_overflow 1, unmapped_corridor 1)");
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub mod category {
    pub const DATA_GAP: &str = "data_gap";
    pub const DST_CORRECTION: &str = "dst_correction";
    pub const RESCALE: &str = "rescale";
    pub const CAPACITY_OVERFLOW: &str = "capacity_overflow";
    pub const UNMAPPED_CORRIDOR: &str = "unmapped_corridor";
    pub const ISLANDED_BUS: &str = "islanded_bus";
    pub const MISSING_LINK_BUS: &str = "missing_link_bus";
    pub const BALANCE: &str = "balance";
    /// Unknown upstream categories, columns or bus rows.
    pub const SOURCE: &str = "source";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticIssue {
    pub category: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)?;
        if let Some(entity) = &self.entity {
            write!(f, " ({entity})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an issue and emit it through `tracing`.
    pub fn warn(&mut self, category: &str, message: impl Into<String>, entity: Option<&str>) {
        let message = message.into();
        match entity {
            Some(entity) => tracing::warn!(category, entity, "{message}"),
            None => tracing::warn!(category, "{message}"),
        }
        self.issues.push(DiagnosticIssue {
            category: category.to_string(),
            message,
            entity: entity.map(str::to_string),
        });
    }

    pub fn warning_count(&self) -> usize {
        self.issues.len()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn count_category(&self, category: &str) -> usize {
        self.issues.iter().filter(|i| i.category == category).count()
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    /// Issue count per category.
    pub fn by_category(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.category.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn summary(&self) -> String {
        match self.issues.len() {
            0 => "No issues".to_string(),
            n => {
                let parts: Vec<String> = self
                    .by_category()
                    .into_iter()
                    .map(|(category, count)| format!("{category} {count}"))
                    .collect();
                let plural = if n == 1 { "" } else { "s" };
                format!("{n} warning{plural} ({})", parts.join(", "))
            }
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {issue}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_groups_by_category() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "No issues");
        diag.warn(category::DATA_GAP, "gap of 12 hours", Some("SE3/Hydro"));
        assert_eq!(diag.summary(), "1 warning (data_gap 1)");
        diag.warn(category::DATA_GAP, "gap of 11 hours", Some("SE4/Wind"));
        diag.warn(category::MISSING_LINK_BUS, "bus 9 missing", None);
        assert_eq!(diag.summary(), "3 warnings (data_gap 2, missing_link_bus 1)");
    }

    #[test]
    fn merge_keeps_both_sides() {
        let mut a = Diagnostics::new();
        a.warn(category::CAPACITY_OVERFLOW, "share 1.2", Some("NO1/Hydro"));
        let mut b = Diagnostics::new();
        b.warn(category::UNMAPPED_CORRIDOR, "no branch or link", Some("FI-RU"));
        a.merge(b);
        assert_eq!(a.count_category(category::CAPACITY_OVERFLOW), 1);
        assert_eq!(a.count_category(category::UNMAPPED_CORRIDOR), 1);
        assert_eq!(a.issues[1].to_string(), "[unmapped_corridor] no branch or link (FI-RU)");
    }

    #[test]
    fn empty_diagnostics_serialize_to_an_empty_object() {
        let json = serde_json::to_string(&Diagnostics::new()).unwrap();
        assert_eq!(json, "{}");
    }
}
