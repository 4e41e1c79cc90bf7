mod sampler;
mod session;

pub use session::{CalibrationSession, TriggerMode};
