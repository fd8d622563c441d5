use std::collections::BTreeMap;

use axum::{
	Json, Router,
	extract::{Path, Query},
	http::{HeaderMap, StatusCode},
	response::IntoResponse,
	routing,
};
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::oneshot::Sender};

use mr_remote::{ApiRequest, Error, RemoteClient};

async fn start_stub_server() -> (String, Sender<()>) {
	let app = Router::new()
		.route("/api/v2/task/{id}/start", routing::get(start_handler))
		.route("/api/v2/challenges/extendedFind", routing::get(echo_query_handler))
		.route("/api/v2/taskBundle", routing::post(bundle_handler))
		.route("/api/v2/task/{id}/release", routing::get(release_handler));
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind stub server.");
	let addr = listener.local_addr().expect("Failed to read stub server address.");
	let (tx, rx) = tokio::sync::oneshot::channel();
	let server = axum::serve(listener, app).with_graceful_shutdown(async move {
		let _ = rx.await;
	});

	tokio::spawn(async move {
		let _ = server.into_future().await;
	});

	(format!("http://{addr}/api/v2/"), tx)
}

async fn start_handler(Path(id): Path<u64>, headers: HeaderMap) -> impl IntoResponse {
	if headers.get("apikey").and_then(|value| value.to_str().ok()) != Some("secret") {
		return (StatusCode::UNAUTHORIZED, Json(json!({ "status": "KO", "message": "No key" })))
			.into_response();
	}
	if id == 13 {
		return (
			StatusCode::CONFLICT,
			Json(json!({ "status": "KO", "message": "Task is locked by another user" })),
		)
			.into_response();
	}

	Json(json!({ "id": id, "parent": 7 })).into_response()
}

async fn echo_query_handler(Query(query): Query<BTreeMap<String, String>>) -> impl IntoResponse {
	Json(json!({ "query": query }))
}

async fn bundle_handler(Json(body): Json<Value>) -> impl IntoResponse {
	Json(json!({ "id": 99, "received": body }))
}

async fn release_handler() -> impl IntoResponse {
	StatusCode::NO_CONTENT
}

fn client(api_base: &str, api_key: Option<&str>) -> RemoteClient {
	let cfg = mr_config::Server {
		api_base: api_base.to_string(),
		api_key: api_key.map(str::to_string),
		default_headers: BTreeMap::new(),
	};

	RemoteClient::new(&cfg).expect("Client must build.")
}

#[tokio::test]
async fn substitutes_path_variables_and_sends_the_api_key() {
	let (base, shutdown) = start_stub_server().await;
	let value = client(&base, Some("secret"))
		.send(&ApiRequest::get("/task/{id}/start").var("id", 5))
		.await
		.expect("Lock request must succeed.");

	assert_eq!(value, json!({ "id": 5, "parent": 7 }));

	let _ = shutdown.send(());
}

#[tokio::test]
async fn surfaces_status_and_server_message() {
	let (base, shutdown) = start_stub_server().await;
	let remote = client(&base, Some("secret"));
	let denied = remote
		.send(&ApiRequest::get("/task/{id}/start").var("id", 13))
		.await
		.expect_err("Locked task must fail.");

	assert_eq!(denied.status(), Some(409));
	assert!(matches!(denied, Error::Status { ref message, .. } if message.contains("locked")));

	let anonymous = client(&base, None)
		.send(&ApiRequest::get("/task/{id}/start").var("id", 5))
		.await
		.expect_err("Missing key must fail.");

	assert_eq!(anonymous.status(), Some(401));

	let _ = shutdown.send(());
}

#[tokio::test]
async fn encodes_wire_params_as_query_string() {
	let (base, shutdown) = start_stub_server().await;
	let params = mr_domain::WireParams::default().with("ct", "roads,bridges").with("cs", "a b");
	let value = client(&base, None)
		.send(&ApiRequest::get("/challenges/extendedFind").params(params))
		.await
		.expect("Search must succeed.");

	assert_eq!(value["query"], json!({ "ct": "roads,bridges", "cs": "a b" }));

	let _ = shutdown.send(());
}

#[tokio::test]
async fn posts_json_bodies_and_tolerates_empty_responses() {
	let (base, shutdown) = start_stub_server().await;
	let remote = client(&base, None);
	let created = remote
		.send(&ApiRequest::post("/taskBundle").body(json!({ "taskIds": [1, 2] })))
		.await
		.expect("Bundle request must succeed.");

	assert_eq!(created["received"]["taskIds"], json!([1, 2]));

	let released = remote
		.send(&ApiRequest::get("/task/{id}/release").var("id", 1))
		.await
		.expect("Release must succeed.");

	assert_eq!(released, Value::Null);

	let _ = shutdown.send(());
}

#[tokio::test]
async fn unreachable_server_has_no_status() {
	let err = client("http://127.0.0.1:9/", None)
		.send(&ApiRequest::get("/task/{id}/start").var("id", 1))
		.await
		.expect_err("Closed port must fail.");

	assert_eq!(err.status(), None);
}
