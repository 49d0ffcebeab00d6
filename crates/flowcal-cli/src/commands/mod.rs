pub mod calibrate;
pub mod common;
pub mod errors;
pub mod run;
pub mod topology;
