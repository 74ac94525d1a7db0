use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode as AxumStatus,
    routing::{get, patch},
    Json, Router,
};
use serde_json::{json, Value};

use super::*;

#[derive(Clone, Default)]
struct Captured {
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl Captured {
    fn last(&self) -> Option<Value> {
        self.bodies.lock().expect("lock").last().cloned()
    }
}

async fn list_teams() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": [{ "id": 1, "name": "Dev" }, { "id": 2, "name": "Sales" }]
    }))
}

async fn create_team(State(captured): State<Captured>, Json(body): Json<Value>) -> Json<Value> {
    captured.bodies.lock().expect("lock").push(body.clone());
    Json(json!({
        "success": true,
        "message": "Team created",
        "data": { "id": 3, "name": body["name"] }
    }))
}

async fn rename_team(Path(id): Path<i64>) -> (AxumStatus, Json<Value>) {
    if id == 404 {
        return (
            AxumStatus::NOT_FOUND,
            Json(json!({
                "success": false,
                "message": "Team not found",
                "error": "no team with id 404"
            })),
        );
    }
    // Reports success without the renamed record.
    (AxumStatus::OK, Json(json!({ "success": true })))
}

async fn delete_team() -> Json<Value> {
    Json(json!({ "success": true, "message": "Team deleted" }))
}

async fn create_employee() -> (AxumStatus, Json<Value>) {
    (
        AxumStatus::BAD_REQUEST,
        Json(json!({ "firstName": "size must be between 2 and 50", "email": "must be a well-formed email address" })),
    )
}

async fn update_employee(
    State(captured): State<Captured>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    captured.bodies.lock().expect("lock").push(body.clone());
    let mut data = body;
    data["id"] = json!(id);
    Json(json!({ "success": true, "data": data }))
}

async fn list_employees() -> &'static str {
    "not json"
}

async fn summary() -> Vec<u8> {
    vec![0x50, 0x4b, 0x03, 0x04]
}

async fn spawn_server() -> (String, Captured) {
    let captured = Captured::default();
    let app = Router::new()
        .route("/teams", get(list_teams).post(create_team))
        .route("/teams/:id", patch(rename_team).delete(delete_team))
        .route("/employees", get(list_employees).post(create_employee))
        .route("/employees/:id", patch(update_employee))
        .route("/summary/download", get(summary))
        .with_state(captured.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}"), captured)
}

fn gateway(base_url: &str) -> HttpGateway {
    let client = Client::builder().no_proxy().build().expect("client");
    HttpGateway::with_client(client, base_url).expect("gateway")
}

fn employee() -> Employee {
    Employee {
        id: EmployeeId(10),
        first_name: "John".into(),
        last_name: "Doe".into(),
        email: "john.doe@example.com".into(),
        phone: "123-456-7890".into(),
        hire_date: chrono::NaiveDate::from_ymd_opt(2023, 1, 15).expect("date"),
        role: "Developer".into(),
        team_id: TeamId(1),
    }
}

#[test]
fn rejects_unusable_base_urls() {
    assert!(HttpGateway::new("not a url").is_err());
    assert!(HttpGateway::new("ftp://example.com").is_err());
    let ok = HttpGateway::new("http://localhost:8080/").expect("gateway");
    assert_eq!(ok.base_url(), "http://localhost:8080");
}

#[tokio::test]
async fn unwraps_success_envelope() {
    let (base, _) = spawn_server().await;
    let reply = gateway(&base).list_teams().await.expect("list");
    assert_eq!(reply.data.len(), 2);
    assert_eq!(reply.data[1].name, "Sales");
    assert_eq!(reply.message, None);
}

#[tokio::test]
async fn create_team_sends_name_and_keeps_server_message() {
    let (base, captured) = spawn_server().await;
    let reply = gateway(&base).create_team("Ops").await.expect("create");
    assert_eq!(reply.data.id, TeamId(3));
    assert_eq!(reply.data.name, "Ops");
    assert_eq!(reply.message.as_deref(), Some("Team created"));
    assert_eq!(captured.last(), Some(json!({ "name": "Ops" })));
}

#[tokio::test]
async fn error_envelope_maps_status_and_detail() {
    let (base, _) = spawn_server().await;
    let err = gateway(&base)
        .rename_team(TeamId(404), "Ghost")
        .await
        .expect_err("not found");
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(err.message, "Team not found");
    assert_eq!(err.detail.as_deref(), Some("no team with id 404"));
}

#[tokio::test]
async fn success_without_record_is_malformed() {
    let (base, _) = spawn_server().await;
    let err = gateway(&base)
        .rename_team(TeamId(1), "Platform")
        .await
        .expect_err("missing data");
    assert_eq!(err.code, ErrorCode::MalformedResponse);
}

#[tokio::test]
async fn delete_is_acknowledged_with_message() {
    let (base, _) = spawn_server().await;
    let reply = gateway(&base).delete_team(TeamId(1)).await.expect("delete");
    assert_eq!(reply.message.as_deref(), Some("Team deleted"));
}

#[tokio::test]
async fn field_error_map_becomes_validation_error() {
    let (base, _) = spawn_server().await;
    let input = employee().to_input();
    let err = gateway(&base)
        .create_employee(&input)
        .await
        .expect_err("rejected");
    assert_eq!(err.code, ErrorCode::Validation);
    let detail = err.detail.expect("detail");
    assert!(detail.contains("firstName: size must be between 2 and 50"));
    assert!(detail.contains("email: must be a well-formed email address"));
}

#[tokio::test]
async fn update_sends_editable_fields_without_id() {
    let (base, captured) = spawn_server().await;
    let reply = gateway(&base)
        .update_employee(&employee())
        .await
        .expect("update");
    assert_eq!(reply.data, employee());

    let body = captured.last().expect("body");
    assert!(body.get("id").is_none());
    assert_eq!(body["hireDate"], "2023-01-15");
    assert_eq!(body["teamId"], 1);
}

#[tokio::test]
async fn unreadable_body_is_malformed() {
    let (base, _) = spawn_server().await;
    let err = gateway(&base)
        .list_employees()
        .await
        .expect_err("not json");
    assert_eq!(err.code, ErrorCode::MalformedResponse);
}

#[tokio::test]
async fn summary_returns_raw_bytes() {
    let (base, _) = spawn_server().await;
    let bytes = gateway(&base).download_summary().await.expect("summary");
    assert_eq!(bytes, vec![0x50, 0x4b, 0x03, 0x04]);
}

#[tokio::test]
async fn unknown_route_falls_back_to_generic_message() {
    let (base, _) = spawn_server().await;
    let gateway = gateway(&base);
    let err = gateway
        .send_for_ack(gateway.http.get(gateway.endpoint("/missing")))
        .await
        .expect_err("404");
    assert_eq!(err.code, ErrorCode::NotFound);
    assert_eq!(err.message, shared::error::GENERIC_ERROR_MESSAGE);
    assert!(err.detail_or_unspecified().starts_with("HTTP 404"));
}

#[tokio::test]
async fn closed_port_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = gateway(&format!("http://{addr}"))
        .list_teams()
        .await
        .expect_err("refused");
    assert_eq!(err.code, ErrorCode::Transport);
    assert!(err.detail.is_some());
}
