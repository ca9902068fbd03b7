//! SchedulerBuilder - 構築とワイヤリング
//!
//! # Fail-fast 設計
//! - 容量 0 は build() 時点で CapacityConfiguration を返す
//! - handler はここで注入するのが基本（後から set_handler も可）

use std::sync::Arc;

use crate::app::barrier::CompletionBarrier;
use crate::app::gate::AdmissionGate;
use crate::app::registry::TaskRegistry;
use crate::app::scheduler::{Scheduler, SchedulerCore};
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::impls::InMemoryQueue;
use crate::ports::{Clock, IdGenerator, Queue, SystemClock, TaskHandler, UlidGenerator};

/// Builds a [`Scheduler`].
///
/// ```ignore
/// let scheduler = Scheduler::builder()
///     .config(config.scheduler.clone())
///     .handler(MyAcquisitionHandler::new(client))
///     .build()?;
/// ```
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    handler: Option<Arc<dyn TaskHandler>>,
    queue: Option<Arc<dyn Queue>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            handler: None,
            queue: None,
            clock: None,
            ids: None,
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_concurrent_tasks(mut self, max_concurrent_tasks: usize) -> Self {
        self.config.max_concurrent_tasks = max_concurrent_tasks;
        self
    }

    pub fn handler<H: TaskHandler + 'static>(mut self, handler: H) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn shared_handler(mut self, handler: Arc<dyn TaskHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Swap the in-memory queue for another `Queue` implementation.
    pub fn queue(mut self, queue: Arc<dyn Queue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<Scheduler> {
        let gate = AdmissionGate::new(self.config.max_concurrent_tasks)?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));
        let queue = self
            .queue
            .unwrap_or_else(|| Arc::new(InMemoryQueue::new()));

        let core = SchedulerCore {
            queue,
            gate,
            registry: TaskRegistry::new(),
            barrier: CompletionBarrier::new(),
            clock,
            ids,
        };
        Ok(Scheduler::from_parts(core, self.config, self.handler))
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
