//! Domain model (IDs, status, records, task errors).

pub mod errors;
pub mod ids;
pub mod record;
pub mod status;

pub use errors::{ErrorKind, TaskError};
pub use ids::{Id, IdMarker, ParseIdError, TaskId};
pub use record::{TaskParameters, TaskRecord};
pub use status::TaskStatus;
