use async_trait::async_trait;

use kts_protocol::{BatchRequest, BatchResponse, CallEnvelope, CallName, CallOutcome, Payload};
use kts_types::Value;

use crate::error::SyncResult;

/// Issues logical calls against a server-side namespace.
///
/// Rejects on transport failure or on an application error for the call.
#[async_trait]
pub trait RequestLayer: Send + Sync {
    async fn perform(&self, namespace: &str, call: CallName, payload: Payload) -> SyncResult<Value>;
}

/// Carries one batched exchange to the server and back.
///
/// A failed exchange (including a non-success response) must be reported as
/// an `Err`, which rejects every call in the batch uniformly.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn exchange(&self, request: BatchRequest) -> SyncResult<BatchResponse>;
}

/// Answers a single call. Errors are per call and do not affect siblings.
#[async_trait]
pub trait CallHandler: Send + Sync {
    async fn handle(&self, call: &CallEnvelope) -> Result<Value, String>;
}

#[async_trait]
impl<H: CallHandler + ?Sized> CallHandler for std::sync::Arc<H> {
    async fn handle(&self, call: &CallEnvelope) -> Result<Value, String> {
        (**self).handle(call).await
    }
}

/// A [`Transport`] that answers each call of a batch with a local
/// [`CallHandler`], without any network in between.
pub struct HandlerTransport<H> {
    handler: H,
}

impl<H: CallHandler> HandlerTransport<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

#[async_trait]
impl<H: CallHandler> Transport for HandlerTransport<H> {
    async fn exchange(&self, request: BatchRequest) -> SyncResult<BatchResponse> {
        let mut response = BatchResponse::new(request.id);
        for (id, call) in &request.calls {
            let outcome = CallOutcome::from(self.handler.handle(call).await);
            response.results.insert(*id, outcome);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kts_types::KeyPath;
    use std::collections::BTreeMap;

    struct Echo;

    #[async_trait]
    impl CallHandler for Echo {
        async fn handle(&self, call: &CallEnvelope) -> Result<Value, String> {
            match call.call {
                CallName::Load => Ok(Value::from(call.namespace.clone())),
                _ => Err(format!("unsupported: {}", call.call)),
            }
        }
    }

    #[tokio::test]
    async fn handler_transport_answers_each_call() {
        let transport = HandlerTransport::new(Echo);
        let mut calls = BTreeMap::new();
        calls.insert(3, CallEnvelope::new("users", CallName::Load, Payload::keys(KeyPath::root())));
        calls.insert(5, CallEnvelope::new("users", CallName::Save, Payload::keys(KeyPath::root())));
        let request = BatchRequest::new(calls);
        let id = request.id;

        let response = transport.exchange(request).await.unwrap();
        assert_eq!(response.id, id);
        assert_eq!(response.results[&3], CallOutcome::Value(Value::from("users")));
        assert!(response.results[&5].is_error());
    }
}
