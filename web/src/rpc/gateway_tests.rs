use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::Method;
use serde_json::json;

use super::*;

/// A model store over a vector, good enough to exercise the CRUD actions.
#[derive(Default)]
struct MemoryStore {
    records: Mutex<Vec<Record>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    fn seeded(titles: &[&str]) -> Self {
        let store = Self::default();
        for title in titles {
            let id = store.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let Value::Object(attributes) = json!({ "title": title }) else {
                unreachable!()
            };
            store.records.lock().unwrap().push(Record::new(id, attributes));
        }
        store
    }
}

#[async_trait]
impl ModelStore for MemoryStore {
    async fn find(&self, id: &Value) -> Result<Option<Record>, RpcError> {
        let id = id.as_i64().or_else(|| id.as_str().and_then(|s| s.parse().ok()));
        let records = self.records.lock().unwrap();
        Ok(records.iter().find(|r| r.id.as_i64() == id).cloned())
    }

    async fn all(&self) -> Result<Vec<Record>, RpcError> {
        Ok(self.records.lock().unwrap().clone())
    }

    async fn find_where(&self, conditions: &Attributes) -> Result<Vec<Record>, RpcError> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| conditions.iter().all(|(k, v)| r.attributes.get(k) == Some(v)))
            .cloned()
            .collect())
    }

    async fn create(&self, attributes: Attributes) -> Result<Record, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = Record::new(id, attributes);
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn save(&self, record: Record) -> Result<Record, RpcError> {
        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(record)
    }

    async fn destroy(&self, record: Record) -> Result<Record, RpcError> {
        self.records.lock().unwrap().retain(|r| r.id != record.id);
        Ok(record)
    }
}

const SECRET: &str = "rpc-test-secret";

fn gateway() -> RpcGateway {
    let registry = Arc::new(RpcRegistry::new());
    registry.register_model("Article", Arc::new(MemoryStore::seeded(&["First", "Second"])));
    registry.register_fn("Math.double", |args: Vec<Value>| async move {
        let n = args
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| RpcError::handler("expected a number"))?;
        Ok::<_, RpcError>(RpcValue::from(json!(n * 2)))
    });
    registry.register_fn("Chaos.panic", |_: Vec<Value>| async move {
        if true {
            panic!("handler exploded");
        }
        Ok(RpcValue::from(Value::Null))
    });

    RpcGateway::new(registry, Arc::new(CsrfProtection::with_secret(SECRET)))
}

fn token() -> String {
    CsrfProtection::with_secret(SECRET).generate_token("")
}

fn rpc(action: &str, body: &str) -> Request {
    Request::builder()
        .method(Method::POST)
        .uri("/rpc")
        .header(RPC_ACTION_HEADER, action)
        .header(CSRF_HEADER, token())
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn call(gateway: &RpcGateway, request: Request) -> (StatusCode, Value) {
    let response = gateway.handle(request).await;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[test]
fn test_is_rpc_request() {
    let mut headers = HeaderMap::new();
    assert!(!is_rpc_request(&headers));
    headers.insert(RPC_ACTION_HEADER, "Article.all".parse().unwrap());
    assert!(is_rpc_request(&headers));
}

#[tokio::test]
async fn test_registered_function_result() {
    let (status, body) = call(&gateway(), rpc("Math.double", r#"{"args":[21]}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "result": 42 }));
}

#[tokio::test]
async fn test_missing_token_is_csrf_invalid() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/rpc")
        .header(RPC_ACTION_HEADER, "Math.double")
        .body(Body::from(r#"{"args":[1]}"#))
        .unwrap();

    let (status, body) = call(&gateway(), request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "CSRF_INVALID");
}

#[tokio::test]
async fn test_csrf_can_be_disabled() {
    let gateway = gateway().csrf_required(false);
    let request = Request::builder()
        .method(Method::POST)
        .uri("/rpc")
        .header(RPC_ACTION_HEADER, "Math.double")
        .body(Body::from(r#"{"args":[4]}"#))
        .unwrap();

    let (status, body) = call(&gateway, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], 8);
}

#[tokio::test]
async fn test_body_token_is_accepted() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/rpc")
        .header(RPC_ACTION_HEADER, "Math.double")
        .body(Body::from(
            json!({ "args": [5], "authenticity_token": token() }).to_string(),
        ))
        .unwrap();

    let (status, body) = call(&gateway(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], 10);
}

#[tokio::test]
async fn test_unknown_action_is_not_found() {
    let (status, body) = call(&gateway(), rpc("Article.explode", r#"{"args":[]}"#)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_bad_body_is_parse_error() {
    for body in ["{oops", r#"{"args":"nope"}"#, "[1,2]"] {
        let (status, reply) = call(&gateway(), rpc("Math.double", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(reply["error"]["code"], "PARSE_ERROR");
    }
}

#[tokio::test]
async fn test_handler_error_and_panic() {
    let gateway = gateway();

    let (status, body) = call(&gateway, rpc("Math.double", r#"{"args":["x"]}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "HANDLER_ERROR");
    assert_eq!(body["error"]["message"], "expected a number");

    let (status, body) = call(&gateway, rpc("Chaos.panic", "")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("handler exploded"));
}

#[tokio::test]
async fn test_model_actions_are_registered() {
    let gateway = gateway();
    for operation in ["find", "all", "where", "findBy", "create", "update", "destroy", "save"] {
        assert!(gateway.registry().has(&format!("Article.{operation}")));
    }
}

#[tokio::test]
async fn test_model_crud() {
    let gateway = gateway();

    let (_, body) = call(&gateway, rpc("Article.find", r#"{"args":[1]}"#)).await;
    assert_eq!(body, json!({ "result": { "title": "First", "id": 1 } }));

    let (_, body) = call(&gateway, rpc("Article.all", "{}")).await;
    assert_eq!(body["result"].as_array().unwrap().len(), 2);

    let (_, body) = call(
        &gateway,
        rpc("Article.where", r#"{"args":[{"title":"Second"}]}"#),
    )
    .await;
    assert_eq!(body["result"], json!([{ "title": "Second", "id": 2 }]));

    let (_, body) = call(
        &gateway,
        rpc("Article.findBy", r#"{"args":[{"title":"Nope"}]}"#),
    )
    .await;
    assert_eq!(body["result"], Value::Null);

    let (_, body) = call(
        &gateway,
        rpc("Article.create", r#"{"args":[{"title":"Third"}]}"#),
    )
    .await;
    assert_eq!(body["result"], json!({ "title": "Third", "id": 3 }));

    let (_, body) = call(
        &gateway,
        rpc("Article.update", r#"{"args":[3, {"title":"Edited"}]}"#),
    )
    .await;
    assert_eq!(body["result"], json!({ "title": "Edited", "id": 3 }));

    let (_, body) = call(&gateway, rpc("Article.destroy", r#"{"args":[3]}"#)).await;
    assert_eq!(body["result"]["id"], 3);

    let (status, body) = call(&gateway, rpc("Article.find", r#"{"args":[3]}"#)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "Article not found: 3");
}

#[tokio::test]
async fn test_instance_actions_report_missing_records() {
    let gateway = gateway();
    for action in ["Article.update", "Article.destroy", "Article.save"] {
        let (status, body) = call(&gateway, rpc(action, r#"{"args":[99, {}]}"#)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{action}");
        assert_eq!(body["error"]["message"], "Article not found: 99");
    }
}
