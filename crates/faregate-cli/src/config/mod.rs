//! Batch file loading and validation.
//!
//! - `model.rs`: the TOML-backed data model
//! - `loader.rs`: read + parse from disk
//! - `validate.rs`: semantic checks

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    AcquisitionSection, BatchConfig, FixedMonthTaskConfig, FlightTaskConfig, Holiday,
    HolidayTaskConfig, RetrySection, RouteTemplate, TaskSection,
};
pub use validate::{require_command, validate_config};
