//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .merge(api::router())
        // Add state to all routes
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchers::Watchers;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;
    use tower::ServiceExt;
    use watchcast_core::config::{QueueConfig, SessionConfig};
    use watchcast_core::session::SessionRegistry;
    use watchcast_sdk::client::WatchClient;
    use watchcast_sdk::objects::{EventType, SessionSummary};

    const WAIT: Duration = Duration::from_secs(5);

    struct TestServer {
        addr: SocketAddr,
        state: AppState,
        watchers: Watchers,
    }

    async fn start() -> TestServer {
        let registry = SessionRegistry::new();
        let watchers = Watchers::start(
            &["pods".to_string(), "deployments".to_string()],
            &QueueConfig::default(),
            &registry,
        );
        let state = AppState::new(registry, SessionConfig::default(), watchers.sources());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(state.clone());
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        TestServer {
            addr,
            state,
            watchers,
        }
    }

    impl TestServer {
        fn base_url(&self) -> url::Url {
            url::Url::parse(&format!("ws://{}", self.addr)).unwrap()
        }

        async fn wait_for_sessions(&self, count: usize) {
            tokio::time::timeout(WAIT, async {
                while self.state.registry.len() != count {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await
            .unwrap();
        }

        async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = build_router(self.state.clone())
                .oneshot(request)
                .await
                .unwrap();
            let status = response.status();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = if body.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&body).unwrap()
            };
            (status, value)
        }

        async fn put_resource(&self, resource_type: &str, object: Value) -> (StatusCode, Value) {
            self.request(
                Request::put(format!("/resources/{resource_type}"))
                    .header("content-type", "application/json")
                    .body(Body::from(object.to_string()))
                    .unwrap(),
            )
            .await
        }
    }

    fn pod(namespace: &str, name: &str) -> Value {
        json!({"metadata": {"namespace": namespace, "name": name}, "spec": {"replicas": 1}})
    }

    #[tokio::test]
    async fn test_health() {
        let server = start().await;
        let (status, body) = server
            .request(Request::get("/health").body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_create_is_streamed_to_namespace() {
        let server = start().await;
        let mut client = WatchClient::connect(&server.base_url(), "default", "alice")
            .await
            .unwrap();
        server.wait_for_sessions(1).await;

        let (status, body) = server.put_resource("pods", pod("default", "pod-a")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["key"], "default/pod-a");

        let event = tokio::time::timeout(WAIT, client.next_event())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type, EventType::Create);
        assert_eq!(event.namespace, "default");
        assert_eq!(event.resource_name, "pod-a");
        assert_eq!(event.resource_type, "pods");
        assert_eq!(event.item["spec"]["replicas"], 1);

        let (status, _) = server
            .request(
                Request::delete("/resources/pods/default/pod-a")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let event = tokio::time::timeout(WAIT, client.next_event())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type, EventType::Delete);
        assert_eq!(event.resource_name, "pod-a");

        server.watchers.shutdown().await;
    }

    #[tokio::test]
    async fn test_other_namespace_is_filtered() {
        let server = start().await;
        let mut ns1 = WatchClient::connect(&server.base_url(), "ns1", "alice")
            .await
            .unwrap();
        let mut ns2 = WatchClient::connect(&server.base_url(), "ns2", "bob")
            .await
            .unwrap();
        server.wait_for_sessions(2).await;

        server.put_resource("pods", pod("ns1", "pod-a")).await;
        server.put_resource("pods", pod("ns2", "pod-b")).await;

        let event = tokio::time::timeout(WAIT, ns1.next_event())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(event.resource_name, "pod-a");

        let event = tokio::time::timeout(WAIT, ns2.next_event())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(event.resource_name, "pod-b");
    }

    #[tokio::test]
    async fn test_heartbeat_reply_matches_frame_kind() {
        let server = start().await;
        let url = format!("ws://{}/ws?namespace=default", server.addr);
        let (mut socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();

        socket.send(Message::Binary(vec![0x31])).await.unwrap();
        let reply = tokio::time::timeout(WAIT, socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(reply, Message::Binary(vec![0x30]));

        socket.send(Message::Text("1".to_string())).await.unwrap();
        let reply = tokio::time::timeout(WAIT, socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(reply, Message::Text("0".to_string()));
    }

    #[tokio::test]
    async fn test_admin_list_and_close() {
        let server = start().await;
        let mut request = format!("ws://{}/ws?namespace=default", server.addr)
            .into_client_request()
            .unwrap();
        request
            .headers_mut()
            .insert("X-Remote-User", HeaderValue::from_static("alice"));
        let (mut socket, _) = tokio_tungstenite::connect_async(request).await.unwrap();
        server.wait_for_sessions(1).await;

        let (status, body) = server
            .request(Request::get("/sessions").body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, StatusCode::OK);
        let sessions: Vec<SessionSummary> = serde_json::from_value(body).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].identity, "alice");
        assert_eq!(sessions[0].namespace, "default");

        let (status, body) = server
            .request(
                Request::delete(format!("/sessions/{}", sessions[0].id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["closed"], true);
        assert!(server.state.registry.is_empty());

        let frame = tokio::time::timeout(WAIT, socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match frame {
            Message::Close(Some(close)) => assert_eq!(u16::from(close.code), 1000),
            other => panic!("expected close frame, got {other:?}"),
        }

        let (status, _) = server
            .request(
                Request::delete(format!("/sessions/{}", sessions[0].id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_anonymous_identity() {
        let server = start().await;
        let url = format!("ws://{}/ws", server.addr);
        let (_socket, _) = tokio_tungstenite::connect_async(url).await.unwrap();
        server.wait_for_sessions(1).await;

        let sessions = server.state.registry.list();
        assert_eq!(sessions[0].identity, "anonymous");
        assert_eq!(sessions[0].namespace, "");
    }

    #[tokio::test]
    async fn test_resource_errors() {
        let server = start().await;

        let (status, _) = server.put_resource("secrets", pod("default", "s")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = server
            .put_resource("pods", json!({"metadata": {"namespace": "default"}}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("metadata.name"));

        let (status, _) = server
            .request(
                Request::delete("/resources/pods/_/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cluster_scoped_delete() {
        let server = start().await;
        let (status, body) = server
            .put_resource("deployments", json!({"metadata": {"name": "global"}}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["key"], "global");

        let (status, _) = server
            .request(
                Request::delete("/resources/deployments/_/global")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(server.state.sources["deployments"].is_empty());
    }
}
