mod server_tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use docgate::{serve, ConnectionManager, Mode};
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    // Parses, but nothing listens there. Only used where the request must be
    // rejected before any server round trip.
    const UNREACHABLE_URI: &str = "mongodb://127.0.0.1:1";

    async fn spawn_server(mode: Mode) -> (String, Arc<ConnectionManager>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(ConnectionManager::new());

        let connections_clone = Arc::clone(&connections);
        tokio::spawn(async move {
            serve(listener, mode, connections_clone, std::future::pending())
                .await
                .unwrap();
        });

        (format!("http://{addr}"), connections)
    }

    async fn post(base: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = reqwest::Client::new()
            .post(format!("{base}{path}"))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_stateless_missing_fields() {
        let (base, _) = spawn_server(Mode::Stateless).await;

        let bodies = [
            json!({}),
            json!({"databaseName": "db", "command": {"collection": "c", "action": "query"}}),
            json!({"connectionString": UNREACHABLE_URI, "command": {"collection": "c", "action": "query"}}),
            json!({"connectionString": UNREACHABLE_URI, "databaseName": "db"}),
            json!({"connectionString": "", "databaseName": "db", "command": {"collection": "c", "action": "query"}}),
            json!({"connectionString": UNREACHABLE_URI, "databaseName": "db", "command": null}),
            json!({"connectionString": UNREACHABLE_URI, "databaseName": "db", "command": false}),
            json!({"connectionString": UNREACHABLE_URI, "databaseName": "db", "command": 0}),
            json!({"connectionString": UNREACHABLE_URI, "databaseName": "db", "command": ""}),
        ];
        for body in bodies {
            let (status, resp) = post(&base, "/query", body.clone()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(resp, json!({"error": "Missing required fields"}), "{body}");
        }
    }

    #[tokio::test]
    async fn test_stateless_unknown_action_is_client_error() {
        let (base, _) = spawn_server(Mode::Stateless).await;

        for command in [
            json!({"collection": "c", "action": "drop"}),
            json!({"collection": "c"}),
            json!({}),
            json!({"collection": 5, "action": "drop"}),
            json!("drop"),
            json!([1, 2]),
        ] {
            let (status, resp) = post(
                &base,
                "/query",
                json!({
                    "connectionString": UNREACHABLE_URI,
                    "databaseName": "db",
                    "command": command,
                }),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(resp, json!({"error": "Unknown action"}));
        }
    }

    #[tokio::test]
    async fn test_stateless_invalid_command_payload() {
        let (base, _) = spawn_server(Mode::Stateless).await;

        let (status, resp) = post(
            &base,
            "/query",
            json!({
                "connectionString": UNREACHABLE_URI,
                "databaseName": "db",
                "command": {"collection": "c", "action": "insert", "documents": "nope"},
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error = resp["error"].as_str().unwrap();
        assert!(error.starts_with("Invalid command: documents:"), "{error}");
    }

    #[tokio::test]
    async fn test_stateless_malformed_connection_string_is_server_error() {
        let (base, _) = spawn_server(Mode::Stateless).await;

        let (status, resp) = post(
            &base,
            "/query",
            json!({
                "connectionString": "definitely not a uri",
                "databaseName": "db",
                "command": {"collection": "c", "action": "query"},
            }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!resp["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_body() {
        let (base, _) = spawn_server(Mode::Stateless).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/query"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        let error = body["error"].as_str().unwrap();
        assert!(error.starts_with("Invalid request body"), "{error}");
    }

    #[tokio::test]
    async fn test_configure_not_routed_in_stateless_mode() {
        let (base, _) = spawn_server(Mode::Stateless).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/configure"))
            .json(&json!({"connectionString": UNREACHABLE_URI, "databaseName": "db"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stateful_query_before_configure() {
        let (base, connections) = spawn_server(Mode::Stateful).await;

        let (status, resp) = post(
            &base,
            "/query",
            json!({"command": {"collection": "c", "action": "query"}}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp, json!({"error": "Database connection not configured"}));

        // Not being configured takes precedence over the action check.
        let (status, resp) = post(
            &base,
            "/query",
            json!({"command": {"collection": "c", "action": "drop"}}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp, json!({"error": "Database connection not configured"}));

        assert!(!connections.is_configured().await);
    }

    #[tokio::test]
    async fn test_stateful_missing_fields() {
        let (base, _) = spawn_server(Mode::Stateful).await;

        for body in [json!({}), json!({"command": false}), json!({"command": ""})] {
            let (status, resp) = post(&base, "/query", body.clone()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(resp, json!({"error": "Missing required fields"}), "{body}");
        }

        for body in [
            json!({}),
            json!({"connectionString": UNREACHABLE_URI}),
            json!({"databaseName": "db"}),
            json!({"connectionString": UNREACHABLE_URI, "databaseName": ""}),
        ] {
            let (status, resp) = post(&base, "/configure", body.clone()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(resp, json!({"error": "Missing required fields"}), "{body}");
        }
    }

    #[tokio::test]
    async fn test_stateful_failed_configure() {
        let (base, connections) = spawn_server(Mode::Stateful).await;

        let (status, resp) = post(
            &base,
            "/configure",
            json!({"connectionString": "postgres://localhost", "databaseName": "db"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp["error"].is_string());
        assert!(!connections.is_configured().await);

        let (status, resp) = post(
            &base,
            "/query",
            json!({"command": {"collection": "c", "action": "query"}}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp, json!({"error": "Database connection not configured"}));
    }

    #[tokio::test]
    async fn test_query_answers_while_configure_is_pending() {
        let (base, connections) = spawn_server(Mode::Stateful).await;

        // Nothing listens on port 1, so this configure waits out server selection.
        let configure_base = base.clone();
        let configure = tokio::spawn(async move {
            post(
                &configure_base,
                "/configure",
                json!({
                    "connectionString": "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=3000",
                    "databaseName": "db",
                }),
            )
            .await
        });
        tokio::time::sleep(Duration::from_millis(300)).await;

        let started = Instant::now();
        let (status, resp) = post(
            &base,
            "/query",
            json!({"command": {"collection": "c", "action": "query"}}),
        )
        .await;
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "query took {:?}",
            started.elapsed()
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp, json!({"error": "Database connection not configured"}));

        let (status, _) = configure.await.unwrap();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!connections.is_configured().await);
    }
}
