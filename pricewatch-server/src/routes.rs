use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

/// Build the service's HTTP surface: the liveness endpoint.
///
/// Request traces from the `TraceLayer` are emitted at DEBUG under the
/// `tower_http` target; the default `info,tower_http=warn` filter in
/// `main` keeps `/health` probe noise out of the operational log
/// stream.
pub fn create_router() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
}

/// Liveness probe. Healthy whenever the process can answer at all,
/// regardless of scrape success or failure history.
async fn health_check() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    async fn serve() -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, create_router())
                .await
                .expect("serve");
        });
        addr
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let addr = serve().await;

        let response = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let addr = serve().await;

        let response = reqwest::get(format!("http://{addr}/metrics"))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }
}
