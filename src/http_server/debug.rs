use axum::{Router, extract::State, routing::get};

use crate::bridge::Service;
use crate::error::BridgeError;

/// Liveness and debugging endpoints.
#[derive(Debug, Clone, Default)]
pub struct DebugService {
    app_id: Option<String>,
}

impl DebugService {
    pub fn new(app_id: Option<String>) -> Self {
        Self { app_id }
    }

    pub fn routes(&self) -> Router {
        Router::new()
            .route("/", get(root))
            .route("/health", get(health))
            .route("/test", get(test_endpoint))
            .with_state(self.app_id.clone())
    }
}

async fn root() -> &'static str {
    "Hello, World!"
}

async fn health() -> &'static str {
    "OK"
}

async fn test_endpoint(State(app_id): State<Option<String>>) -> String {
    format!(
        "Test endpoint - DISCORD_APP_ID: {}",
        app_id.as_deref().unwrap_or_default()
    )
}

#[async_trait::async_trait]
impl Service for DebugService {
    fn name(&self) -> &'static str {
        "Debug Service"
    }

    async fn start(&self) -> Result<(), BridgeError> {
        tracing::info!("Debug endpoints mounted at /, /health and /test");
        Ok(())
    }

    async fn stop(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn body_of(router: Router, uri: &str) -> String {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let service = DebugService::default();
        assert_eq!(body_of(service.routes(), "/").await, "Hello, World!");
        assert_eq!(body_of(service.routes(), "/health").await, "OK");
    }

    #[tokio::test]
    async fn test_endpoint_reports_app_id() {
        let service = DebugService::new(Some("1234".into()));
        assert_eq!(
            body_of(service.routes(), "/test").await,
            "Test endpoint - DISCORD_APP_ID: 1234"
        );
    }
}
