pub mod sensor_service;

pub use sensor_service::{CycleReport, SensorRegistry, SensorService};
