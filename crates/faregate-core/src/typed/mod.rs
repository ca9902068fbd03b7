//! Typed - 型付きパラメータの Handler
//!
//! The scheduler stores parameters as a JSON object. `TypedHandler` decodes
//! them into a caller-defined struct before the handler sees them, and
//! encodes the handler's output back to JSON.
//!
//! # 二層構造
//! - **表層（Typed）**: `Handler<T>` - 型安全
//! - **内部（Dyn）**: `TaskHandler` - object-safe, JSON のまま

pub mod handler;

pub use self::handler::{Handler, TypedHandler};
