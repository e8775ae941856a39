pub mod service;

pub use service::{EpochOutcome, SensorService};
