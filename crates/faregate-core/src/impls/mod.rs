//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryQueue**: プロセス内 FIFO キュー（既定）

pub mod inmem_queue;

pub use self::inmem_queue::InMemoryQueue;
