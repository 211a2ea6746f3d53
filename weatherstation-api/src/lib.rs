pub mod calibration;
pub mod models;
pub mod threshold;
pub mod wire;

pub use calibration::convert;
pub use models::*;
pub use threshold::{ThresholdTable, Verdicts};
