use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use log::*;
use serde_json::Value;

use super::error::RpcError;
use super::model::{self, ModelStore};
use super::value::RpcValue;

/// A server function callable by name with positional arguments.
#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn call(&self, args: Vec<Value>) -> Result<RpcValue, RpcError>;
}

/// Adapts an async closure to [`RpcHandler`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> RpcHandler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<RpcValue, RpcError>> + Send,
{
    async fn call(&self, args: Vec<Value>) -> Result<RpcValue, RpcError> {
        (self.f)(args).await
    }
}

/// Action name to handler. Registering an existing name replaces it.
#[derive(Default)]
pub struct RpcRegistry {
    handlers: DashMap<String, Arc<dyn RpcHandler>>,
}

impl RpcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, action: impl Into<String>, handler: Arc<dyn RpcHandler>) {
        let action = action.into();
        if self.handlers.insert(action.clone(), handler).is_some() {
            warn!("Replaced RPC action {action}");
        } else {
            debug!("Registered RPC action {action}");
        }
    }

    pub fn register_fn<F, Fut>(&self, action: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RpcValue, RpcError>> + Send + 'static,
    {
        self.register(action, Arc::new(FnHandler::new(f)));
    }

    /// Install `<name>.find`, `.all`, `.where`, `.findBy`, `.create`,
    /// `.update`, `.destroy` and `.save` backed by `store`.
    pub fn register_model(&self, name: &str, store: Arc<dyn ModelStore>) {
        for (action, handler) in model::actions(name, store) {
            self.register(action, handler);
        }
    }

    pub fn has(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    pub fn get(&self, action: &str) -> Option<Arc<dyn RpcHandler>> {
        self.handlers.get(action).map(|entry| Arc::clone(entry.value()))
    }

    /// Registered action names, sorted.
    pub fn actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
