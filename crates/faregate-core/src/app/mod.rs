//! App - スケジューラ本体
//!
//! # 主要コンポーネント
//! - **SchedulerBuilder**: 構築とワイヤリング
//! - **Scheduler**: 投入・照会・完了待ちの表面
//! - **AdmissionGate**: 同時実行数の上限
//! - **TaskRegistry**: TaskRecord の正本
//! - **CompletionBarrier**: 未完了数 0 の待ち合わせ
//! - **WorkerGroup**: dequeue → acquire → handle → record のループ群

pub mod barrier;
pub mod builder;
pub mod gate;
pub mod registry;
pub mod scheduler;
pub mod status;
pub mod worker;

pub use self::barrier::CompletionBarrier;
pub use self::builder::SchedulerBuilder;
pub use self::gate::{AdmissionGate, AdmissionPermit};
pub use self::registry::TaskRegistry;
pub use self::scheduler::Scheduler;
pub use self::status::StatusCounts;
pub use self::worker::WorkerGroup;
