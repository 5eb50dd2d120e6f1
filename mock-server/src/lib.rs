//! Test fixture: a small node-registry API speaking the envelope protocol.
//!
//! Application outcomes travel inside the JSON envelope
//! (`{"status":..,"message":..}` over HTTP 200); the fixture routes under
//! `/v1/fixtures/` deliberately break the protocol (non-JSON body, missing
//! status, non-mapping JSON, non-200 HTTP status) so a client's failure
//! normalization can be exercised over real HTTP. Every route requires the
//! `outputFormat=json` query marker, and every response carries
//! `x-api-version` and a fresh `x-request-id` header.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, RawQuery, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub node: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,
}

#[derive(Deserialize)]
pub struct AddNode {
    pub node: String,
    pub datacenter: Option<String>,
}

/// The wire shape every well-behaved route answers with.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Node>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Envelope {
    pub fn records(records: Vec<Node>) -> Self {
        Self {
            status: 200,
            message: "OK".to_string(),
            records: Some(records),
            details: None,
        }
    }

    pub fn details(details: Value) -> Self {
        Self {
            status: 200,
            message: "OK".to_string(),
            records: None,
            details: Some(details),
        }
    }

    /// An application-level failure, still delivered over HTTP 200.
    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            message: message.to_string(),
            records: None,
            details: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            status: 200,
            message: "OK".to_string(),
            records: None,
            details: None,
        }
    }
}

pub type Db = Arc<RwLock<HashMap<String, Node>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/v1/r/nodes", get(list_nodes))
        .route("/v1/r/node", get(get_node))
        .route("/v1/r/echo", get(echo).post(echo))
        .route("/v1/w/node", post(add_node))
        .route("/v1/w/import", post(import_nodes))
        .route("/v1/fixtures/not-json", get(not_json))
        .route("/v1/fixtures/no-status", get(no_status))
        .route("/v1/fixtures/bare-list", get(bare_list))
        .route("/v1/fixtures/denied", get(denied))
        .route("/v1/fixtures/empty", get(empty))
        .route("/v1/fixtures/unavailable", get(unavailable))
        .layer(middleware::from_fn(require_json_marker))
        .layer(middleware::from_fn(stamp_headers))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Reject any request missing the `outputFormat=json` wire marker.
async fn require_json_marker(req: Request, next: Next) -> Response {
    let has_marker = req
        .uri()
        .query()
        .map(|q| q.split('&').any(|pair| pair == "outputFormat=json"))
        .unwrap_or(false);

    if !has_marker {
        return (StatusCode::BAD_REQUEST, "outputFormat=json is required").into_response();
    }
    next.run(req).await
}

async fn stamp_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("x-api-version", HeaderValue::from_static("2.0"));
    if let Ok(id) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
        response.headers_mut().insert("x-request-id", id);
    }
    response
}

#[derive(Deserialize)]
struct ListFilter {
    prefix: Option<String>,
}

async fn list_nodes(State(db): State<Db>, Query(filter): Query<ListFilter>) -> Json<Envelope> {
    let nodes = db.read().await;
    let mut records: Vec<Node> = nodes
        .values()
        .filter(|n| match &filter.prefix {
            Some(prefix) => n.node.starts_with(prefix.as_str()),
            None => true,
        })
        .cloned()
        .collect();
    records.sort_by(|a, b| a.node.cmp(&b.node));
    Json(Envelope::records(records))
}

#[derive(Deserialize)]
struct NodeQuery {
    node: Option<String>,
}

async fn get_node(State(db): State<Db>, Query(query): Query<NodeQuery>) -> Json<Envelope> {
    let Some(name) = query.node else {
        return Json(Envelope::error(400, "Missing node parameter"));
    };

    let nodes = db.read().await;
    match nodes.get(&name) {
        Some(node) => Json(Envelope::details(json!(node))),
        None => Json(Envelope::error(404, "Node not found")),
    }
}

async fn add_node(State(db): State<Db>, Form(input): Form<AddNode>) -> Json<Envelope> {
    let node = Node {
        id: Uuid::new_v4(),
        node: input.node,
        datacenter: input.datacenter,
    };
    db.write().await.insert(node.node.clone(), node.clone());
    Json(Envelope::details(json!(node)))
}

async fn import_nodes(State(db): State<Db>, Json(input): Json<Vec<AddNode>>) -> Json<Envelope> {
    let mut nodes = db.write().await;
    let mut imported = 0;
    for item in input {
        let node = Node {
            id: Uuid::new_v4(),
            node: item.node,
            datacenter: item.datacenter,
        };
        nodes.insert(node.node.clone(), node);
        imported += 1;
    }
    Json(Envelope::details(json!({ "imported": imported })))
}

/// Reflect the wire-level request back to the caller, for encoding and
/// header-forwarding assertions.
async fn echo(
    headers: axum::http::HeaderMap,
    RawQuery(query): RawQuery,
    body: String,
) -> Json<Envelope> {
    let header_text = |name: header::HeaderName| {
        headers
            .get(&name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };

    Json(Envelope::details(json!({
        "query": query.unwrap_or_default(),
        "body": body,
        "content_type": header_text(header::CONTENT_TYPE),
        "cookie": header_text(header::COOKIE),
        "user_agent": header_text(header::USER_AGENT),
    })))
}

// --- protocol-breaking fixtures ---

async fn not_json() -> &'static str {
    "this is not json"
}

async fn no_status() -> Json<Value> {
    Json(json!({ "message": "status is missing" }))
}

async fn bare_list() -> Json<Value> {
    Json(json!([1, 2, 3]))
}

async fn denied() -> Json<Envelope> {
    Json(Envelope::error(403, "Permission denied"))
}

async fn empty() -> Json<Envelope> {
    Json(Envelope::empty())
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}
