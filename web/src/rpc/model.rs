//! Conventional CRUD actions over a [`ModelStore`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::error::RpcError;
use super::registry::RpcHandler;
use super::value::{Record, RpcValue};

pub type Attributes = Map<String, Value>;

/// Persistence for one model, as the RPC gateway sees it.
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn find(&self, id: &Value) -> Result<Option<Record>, RpcError>;

    async fn all(&self) -> Result<Vec<Record>, RpcError>;

    /// Records whose attributes equal every condition.
    async fn find_where(&self, conditions: &Attributes) -> Result<Vec<Record>, RpcError>;

    async fn find_by(&self, conditions: &Attributes) -> Result<Option<Record>, RpcError> {
        Ok(self.find_where(conditions).await?.into_iter().next())
    }

    async fn create(&self, attributes: Attributes) -> Result<Record, RpcError>;

    /// Persist `record` as it is now.
    async fn save(&self, record: Record) -> Result<Record, RpcError>;

    async fn update(&self, mut record: Record, attributes: Attributes) -> Result<Record, RpcError> {
        record.attributes.extend(attributes);
        self.save(record).await
    }

    async fn destroy(&self, record: Record) -> Result<Record, RpcError>;
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Find,
    All,
    Where,
    FindBy,
    Create,
    Update,
    Destroy,
    Save,
}

impl Operation {
    const ALL: [Operation; 8] = [
        Operation::Find,
        Operation::All,
        Operation::Where,
        Operation::FindBy,
        Operation::Create,
        Operation::Update,
        Operation::Destroy,
        Operation::Save,
    ];

    fn name(self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::All => "all",
            Operation::Where => "where",
            Operation::FindBy => "findBy",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Destroy => "destroy",
            Operation::Save => "save",
        }
    }
}

struct ModelAction {
    model: String,
    operation: Operation,
    store: Arc<dyn ModelStore>,
}

impl ModelAction {
    fn action_name(&self) -> String {
        format!("{}.{}", self.model, self.operation.name())
    }

    async fn fetch(&self, id: &Value) -> Result<Record, RpcError> {
        self.store
            .find(id)
            .await?
            .ok_or_else(|| RpcError::record_not_found(&self.model, display_id(id)))
    }

    fn id_arg<'a>(&self, args: &'a [Value]) -> Result<&'a Value, RpcError> {
        args.first()
            .filter(|id| !id.is_null())
            .ok_or_else(|| RpcError::handler(format!("{} expects an id", self.action_name())))
    }

    fn object_arg(&self, args: &[Value], position: usize) -> Result<Attributes, RpcError> {
        match args.get(position) {
            None | Some(Value::Null) => Ok(Attributes::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(other) => Err(RpcError::handler(format!(
                "{} expects an object, got {other}",
                self.action_name()
            ))),
        }
    }
}

#[async_trait]
impl RpcHandler for ModelAction {
    async fn call(&self, args: Vec<Value>) -> Result<RpcValue, RpcError> {
        let value: RpcValue = match self.operation {
            Operation::Find => self.fetch(self.id_arg(&args)?).await?.into(),
            Operation::All => self.store.all().await?.into(),
            Operation::Where => self.store.find_where(&self.object_arg(&args, 0)?).await?.into(),
            Operation::FindBy => self.store.find_by(&self.object_arg(&args, 0)?).await?.into(),
            Operation::Create => self.store.create(self.object_arg(&args, 0)?).await?.into(),
            Operation::Update => {
                let record = self.fetch(self.id_arg(&args)?).await?;
                let attributes = self.object_arg(&args, 1)?;
                self.store.update(record, attributes).await?.into()
            }
            Operation::Destroy => {
                let record = self.fetch(self.id_arg(&args)?).await?;
                self.store.destroy(record).await?.into()
            }
            Operation::Save => {
                let mut record = self.fetch(self.id_arg(&args)?).await?;
                record.attributes.extend(self.object_arg(&args, 1)?);
                self.store.save(record).await?.into()
            }
        };
        Ok(value)
    }
}

/// Handlers for every conventional action of `model`, keyed by action name.
pub(crate) fn actions(
    model: &str,
    store: Arc<dyn ModelStore>,
) -> Vec<(String, Arc<dyn RpcHandler>)> {
    Operation::ALL
        .into_iter()
        .map(|operation| {
            let action = ModelAction {
                model: model.to_string(),
                operation,
                store: Arc::clone(&store),
            };
            (action.action_name(), Arc::new(action) as Arc<dyn RpcHandler>)
        })
        .collect()
}

fn display_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
