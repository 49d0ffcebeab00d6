use crate::{FlowcalError, FlowcalResult, Zone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Inter-zone boundary, stored with the lexicographically smaller zone first.
///
/// A positive flow on `"A-B"` goes from A to B. Raw corridor names may list
/// the zones in either order, so every conversion goes through
/// [`Boundary::canonical`], which also returns the sign to apply to values
/// reported under the raw order.
///
/// Modelled flows, link injections and imported exchange all use this
/// convention. Feeds that publish `"A-B"` as positive from B to A are
/// flipped on import with `ReconcileConfig::invert_exchange_sign`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Boundary {
    first: Zone,
    second: Zone,
}

impl Boundary {
    /// Canonical boundary for the ordered pair (from, to) and the sign that
    /// maps a from→to flow onto it.
    pub fn canonical(from: &Zone, to: &Zone) -> (Boundary, f64) {
        if from <= to {
            (
                Boundary {
                    first: from.clone(),
                    second: to.clone(),
                },
                1.0,
            )
        } else {
            (
                Boundary {
                    first: to.clone(),
                    second: from.clone(),
                },
                -1.0,
            )
        }
    }

    /// Parse a corridor name such as `"SE3-NO1"` (whitespace ignored).
    pub fn parse(name: &str) -> FlowcalResult<(Boundary, f64)> {
        let (a, b) = split_corridor(name)?;
        Ok(Boundary::canonical(&a, &b))
    }

    pub fn first(&self) -> &Zone {
        &self.first
    }

    pub fn second(&self) -> &Zone {
        &self.second
    }

    pub fn touches(&self, zone: &Zone) -> bool {
        &self.first == zone || &self.second == zone
    }
}

/// Split a corridor name into its two zones without reordering them.
pub fn split_corridor(name: &str) -> FlowcalResult<(Zone, Zone)> {
    let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    let mut parts = compact.split('-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) if !a.is_empty() && !b.is_empty() => {
            if a == b {
                return Err(FlowcalError::Parse(format!(
                    "corridor '{name}' connects a zone to itself"
                )));
            }
            Ok((Zone::new(a), Zone::new(b)))
        }
        _ => Err(FlowcalError::Parse(format!(
            "corridor '{name}' is not of the form A-B"
        ))),
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

impl Serialize for Boundary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Boundary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let (boundary, sign) = Boundary::parse(&raw).map_err(serde::de::Error::custom)?;
        if sign < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "boundary '{raw}' is not in canonical order"
            )));
        }
        Ok(boundary)
    }
}
