//! Hourly measurement handling for flow calibration: the hour index, frames,
//! upstream sources and the reconciler that fuses them into one snapshot.

pub mod dst;
pub mod frame;
pub mod io;
pub mod reconcile;
pub mod source;
pub mod time;

pub use frame::{Gap, HourlyFrame};
pub use reconcile::{MeasurementSnapshot, ReconcileConfig, Reconciler};
pub use source::{
    GenerationRecord, GenerationSource, GenerationTable, MarketRecord, MarketSource, MarketTable,
    MemorySource,
};
pub use time::{format_hour, parse_hour, parse_timestamp, HourRange, HOUR_FORMAT};
