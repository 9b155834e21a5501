mod error;
mod handlers;
mod page;

use crate::translate::Translator;
use crate::upload::ScratchDir;
use crate::worker::WorkerHandle;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub worker: WorkerHandle,
    pub translator: Arc<Translator>,
    pub scratch: Arc<ScratchDir>,
    /// Row cap for interactive queries; `None` keeps every row
    pub max_rows: Option<usize>,
}

/// Build the HTTP router
pub fn router(state: AppState, upload_limit_bytes: usize) -> Router {
    Router::new()
        .route("/", get(page::index))
        .route("/api/health", get(handlers::health))
        .route("/api/tables", get(handlers::list_tables))
        .route("/api/tables/:table_name", get(handlers::describe_table))
        .route(
            "/api/tables/:table_name/preview",
            get(handlers::preview_table),
        )
        .route("/api/query", post(handlers::run_query))
        .route("/api/translate", post(handlers::translate_query))
        .route("/api/export", post(handlers::export_query))
        .route("/api/reset-connection", post(handlers::reset_connection))
        .route(
            "/api/database",
            post(handlers::change_database).layer(DefaultBodyLimit::max(upload_limit_bytes)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, ConnectionManager};
    use crate::translate::TranslatorConfig;
    use crate::worker::Worker;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;
    use tower::util::ServiceExt;

    struct TestApp {
        app: Router,
        worker: Worker,
        scratch: Arc<ScratchDir>,
        dir: TempDir,
    }

    impl TestApp {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let database = fixtures::sample_database(dir.path(), "sample.duckdb");
            let worker = Worker::new(ConnectionManager::new(&database));
            let scratch = Arc::new(ScratchDir::new(dir.path().join("uploads")));
            let translator = Translator::new(TranslatorConfig {
                api_key: None,
                model: "gpt-4o".to_string(),
                base_url: "http://127.0.0.1:9".to_string(),
            })
            .unwrap();

            let state = AppState {
                worker: worker.handle(),
                translator: Arc::new(translator),
                scratch: scratch.clone(),
                max_rows: Some(100),
            };

            Self {
                app: router(state, 16 * 1024 * 1024),
                worker,
                scratch,
                dir,
            }
        }

        fn path(&self) -> &Path {
            self.dir.path()
        }

        async fn send(&self, request: Request<Body>) -> Response {
            self.app.clone().oneshot(request).await.unwrap()
        }

        async fn get(&self, uri: &str) -> Response {
            self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
        }

        async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response {
            self.send(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }

        async fn upload(&self, file_name: &str, content: &[u8]) -> Response {
            let (boundary, body) = create_multipart_body(file_name, content);
            self.send(
                Request::builder()
                    .method("POST")
                    .uri("/api/database")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={}", boundary),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
        }

        fn stored_uploads(&self) -> usize {
            std::fs::read_dir(self.scratch.root())
                .map(|entries| entries.count())
                .unwrap_or(0)
        }
    }

    fn create_multipart_body(filename: &str, content: &[u8]) -> (String, Vec<u8>) {
        let boundary = "----TestBoundary1234567890";
        let mut body = Vec::new();

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"db_file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        (boundary.to_string(), body)
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_open_connection() {
        let test = TestApp::new();

        let response = test.get("/api/health").await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["translator_configured"], false);
        assert!(json["connection"]["database"]
            .as_str()
            .unwrap()
            .ends_with("sample.duckdb"));

        test.worker.shutdown().unwrap();
    }

    #[tokio::test]
    async fn query_returns_columns_and_rows() {
        let test = TestApp::new();

        let response = test
            .post_json(
                "/api/query",
                json!({"query": "SELECT id, customer FROM orders ORDER BY id"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["columns"], json!(["id", "customer"]));
        assert_eq!(json["rows"][0], json!([1, "ada"]));
        assert_eq!(json["total_rows"], 3);
        assert_eq!(json["truncated"], false);

        test.worker.shutdown().unwrap();
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let test = TestApp::new();

        let response = test.post_json("/api/query", json!({"query": "   "})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Please enter a query");

        test.worker.shutdown().unwrap();
    }

    #[tokio::test]
    async fn syntax_errors_are_client_errors() {
        let test = TestApp::new();

        let response = test.post_json("/api/query", json!({"query": "SELEC 1"})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());

        let status = json_body(test.get("/api/health").await).await;
        assert_eq!(status["connection"]["resets"], 0);

        test.worker.shutdown().unwrap();
    }

    #[tokio::test]
    async fn write_attempts_are_client_errors() {
        let test = TestApp::new();

        let response = test
            .post_json("/api/query", json!({"query": "INSERT INTO empty_table VALUES ('x')"}))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("read-only"));

        let status = json_body(test.get("/api/health").await).await;
        assert_eq!(status["connection"]["resets"], 0);

        test.worker.shutdown().unwrap();
    }

    #[tokio::test]
    async fn browses_tables() {
        let test = TestApp::new();

        let tables = json_body(test.get("/api/tables").await).await;
        let names: Vec<&str> = tables
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"orders"));

        let schema = json_body(test.get("/api/tables/orders").await).await;
        assert_eq!(schema["table_name"], "orders");
        assert_eq!(schema["columns"][1]["name"], "customer");
        assert_eq!(schema["columns"][1]["nullable"], false);

        let preview = json_body(test.get("/api/tables/orders/preview?limit=2").await).await;
        assert_eq!(preview["rows"].as_array().unwrap().len(), 2);

        let missing = test.get("/api/tables/nope").await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        test.worker.shutdown().unwrap();
    }

    #[tokio::test]
    async fn wrong_extension_is_rejected_before_storing() {
        let test = TestApp::new();

        let response = test.upload("data.txt", b"not a database").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().contains(".txt"));
        assert_eq!(test.stored_uploads(), 0);

        // Still connected to the original database
        let tables = json_body(test.get("/api/tables/orders").await).await;
        assert_eq!(tables["table_name"], "orders");

        test.worker.shutdown().unwrap();
    }

    #[tokio::test]
    async fn upload_switches_database() {
        let test = TestApp::new();
        let other = fixtures::other_database(test.path(), "other.duckdb");
        let bytes = std::fs::read(other).unwrap();

        let response = test.upload("sensors.duckdb", &bytes).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Successfully connected to sensors.duckdb");

        let tables = json_body(test.get("/api/tables").await).await;
        assert_eq!(tables.as_array().unwrap().len(), 1);
        assert_eq!(tables[0]["name"], "sensors");
        assert_eq!(test.stored_uploads(), 1);

        test.worker.shutdown().unwrap();
    }

    #[tokio::test]
    async fn failed_switch_leaves_no_database() {
        let test = TestApp::new();

        let response = test.upload("broken.duckdb", b"definitely not duckdb").await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert!(json["message"]
            .as_str()
            .unwrap()
            .starts_with("Failed to connect"));
        assert_eq!(test.stored_uploads(), 0);

        let response = test.post_json("/api/query", json!({"query": "SELECT 1"})).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("No database configured"));

        test.worker.shutdown().unwrap();
    }

    #[tokio::test]
    async fn missing_upload_field() {
        let test = TestApp::new();

        let boundary = "----TestBoundary1234567890";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"other\"\r\n\r\nvalue\r\n--{b}--\r\n",
            b = boundary
        );
        let response = test
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/api/database")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={}", boundary),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "No file selected");

        test.worker.shutdown().unwrap();
    }

    #[tokio::test]
    async fn reset_connection_reports_success() {
        let test = TestApp::new();

        let response = test.post_json("/api/reset-connection", json!({})).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["success"], true);

        let status = json_body(test.get("/api/health").await).await;
        assert_eq!(status["connection"]["resets"], 1);
        assert_eq!(status["connection"]["state"], "open");

        test.worker.shutdown().unwrap();
    }

    #[tokio::test]
    async fn translate_without_key_is_unavailable() {
        let test = TestApp::new();

        let response = test
            .post_json("/api/translate", json!({"query": "how many orders?"}))
            .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("OPENAI_API_KEY"));

        test.worker.shutdown().unwrap();
    }

    #[tokio::test]
    async fn exports_csv_attachment() {
        let test = TestApp::new();

        let response = test
            .post_json(
                "/api/export",
                json!({"query": "SELECT id, customer FROM orders ORDER BY id", "format": "csv"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"query_result.csv\""
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("id,customer\n1,ada\n"));

        test.worker.shutdown().unwrap();
    }

    #[tokio::test]
    async fn serves_editor_page() {
        let test = TestApp::new();

        let response = test.get("/").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&body).contains("DuckDB SQL Editor"));

        test.worker.shutdown().unwrap();
    }
}
