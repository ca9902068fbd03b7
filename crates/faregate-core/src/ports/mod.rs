//! Ports - 抽象化レイヤー
//!
//! 外部との境界（時刻、ID 生成、キュー、タスク実行）を trait で切る。

pub mod clock;
pub mod handler;
pub mod id_generator;
pub mod queue;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::handler::{FnHandler, TaskHandler, handler_fn};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::queue::Queue;
