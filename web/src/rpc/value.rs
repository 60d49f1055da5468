use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// A persisted model instance: an id plus its attribute map.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: Value,
    pub attributes: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<Value>, attributes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    /// The attributes with `id` added, which wins over an `id` attribute.
    pub fn to_json(&self) -> Value {
        let mut object = self.attributes.clone();
        object.insert("id".to_string(), self.id.clone());
        Value::Object(object)
    }
}

/// What an RPC handler returns. Records anywhere in the tree serialize as
/// their attributes plus `id`.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcValue {
    Record(Record),
    List(Vec<RpcValue>),
    Object(BTreeMap<String, RpcValue>),
    Plain(Value),
}

impl RpcValue {
    pub fn into_json(self) -> Value {
        match self {
            RpcValue::Record(record) => record.to_json(),
            RpcValue::List(items) => Value::Array(items.into_iter().map(Self::into_json).collect()),
            RpcValue::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, value.into_json()))
                    .collect(),
            ),
            RpcValue::Plain(value) => value,
        }
    }
}

impl From<Record> for RpcValue {
    fn from(record: Record) -> Self {
        RpcValue::Record(record)
    }
}

impl From<Vec<Record>> for RpcValue {
    fn from(records: Vec<Record>) -> Self {
        RpcValue::List(records.into_iter().map(RpcValue::Record).collect())
    }
}

impl From<Option<Record>> for RpcValue {
    fn from(record: Option<Record>) -> Self {
        record.map_or(RpcValue::Plain(Value::Null), RpcValue::Record)
    }
}

impl From<Value> for RpcValue {
    fn from(value: Value) -> Self {
        RpcValue::Plain(value)
    }
}
