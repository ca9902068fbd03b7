//! faregate-core
//!
//! Bounded-concurrency task scheduler for flight-price acquisition jobs.
//!
//! # モジュール構成
//! - **domain**: TaskId, TaskStatus, TaskRecord, TaskError
//! - **ports**: Clock, IdGenerator, Queue, TaskHandler
//! - **impls**: InMemoryQueue
//! - **app**: Scheduler とその部品（gate, registry, barrier, worker）
//! - **typed**: 型付きパラメータの Handler
//! - **config**: SchedulerConfig

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{Scheduler, SchedulerBuilder, StatusCounts};
pub use config::SchedulerConfig;
pub use domain::{ErrorKind, TaskError, TaskId, TaskParameters, TaskRecord, TaskStatus};
pub use error::SchedulerError;
pub use ports::{TaskHandler, handler_fn};
