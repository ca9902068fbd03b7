//! Handler trait - 型付きパラメータを受け取る Handler
//!
//! # 学習ポイント
//! - ジェネリック trait (Handler<T>)
//! - Type erasure パターン (TypedHandler<T, H> → dyn TaskHandler)

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{TaskError, TaskId, TaskParameters};
use crate::ports::TaskHandler;

/// Handler は decode 済みのパラメータ `T` でタスクを実行する
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct FlightQuery { from: String, to: String }
///
/// #[async_trait]
/// impl Handler<FlightQuery> for FareFetcher {
///     type Output = Vec<Fare>;
///     async fn handle(&self, task_id: TaskId, q: FlightQuery) -> Result<Vec<Fare>, TaskError> {
///         self.client.search(&q.from, &q.to).await
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<T>: Send + Sync
where
    T: DeserializeOwned + Send + 'static,
{
    type Output: Serialize + Send;

    async fn handle(&self, task_id: TaskId, task: T) -> Result<Self::Output, TaskError>;
}

/// Adapts a `Handler<T>` to the scheduler's `TaskHandler`.
///
/// Parameters that do not decode into `T` fail the task as `Permanent`;
/// retrying them cannot help.
pub struct TypedHandler<T, H> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T, H> TypedHandler<T, H>
where
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
{
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T, H> TaskHandler for TypedHandler<T, H>
where
    T: DeserializeOwned + Send + 'static,
    H: Handler<T>,
{
    async fn handle(
        &self,
        task_id: TaskId,
        parameters: &TaskParameters,
    ) -> Result<serde_json::Value, TaskError> {
        let task: T = serde_json::from_value(serde_json::Value::Object(parameters.clone()))
            .map_err(|e| TaskError::permanent(format!("invalid task parameters: {e}")))?;

        let output = self.handler.handle(task_id, task).await?;

        serde_json::to_value(output)
            .map_err(|e| TaskError::permanent(format!("unserializable task result: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use serde::Deserialize;
    use serde_json::json;
    use ulid::Ulid;

    #[derive(Debug, Deserialize)]
    struct RouteQuery {
        from: String,
        to: String,
        adults: u8,
    }

    #[derive(Debug, Serialize)]
    struct Summary {
        route: String,
        seats: u8,
    }

    struct SummaryHandler;

    #[async_trait]
    impl Handler<RouteQuery> for SummaryHandler {
        type Output = Summary;

        async fn handle(&self, _task_id: TaskId, q: RouteQuery) -> Result<Summary, TaskError> {
            Ok(Summary {
                route: format!("{}-{}", q.from, q.to),
                seats: q.adults,
            })
        }
    }

    fn params(value: serde_json::Value) -> TaskParameters {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("test parameters are objects"),
        }
    }

    #[tokio::test]
    async fn decodes_parameters_and_encodes_output() {
        let handler = TypedHandler::<RouteQuery, _>::new(SummaryHandler);
        let out = handler
            .handle(
                TaskId::from_ulid(Ulid::new()),
                &params(json!({ "from": "TPE", "to": "CTS", "adults": 2 })),
            )
            .await
            .unwrap();

        assert_eq!(out, json!({ "route": "TPE-CTS", "seats": 2 }));
    }

    #[tokio::test]
    async fn undecodable_parameters_are_permanent_failures() {
        let handler = TypedHandler::<RouteQuery, _>::new(SummaryHandler);
        let err = handler
            .handle(
                TaskId::from_ulid(Ulid::new()),
                &params(json!({ "from": "TPE" })),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::Permanent);
        assert!(err.message.contains("invalid task parameters"));
    }
}
