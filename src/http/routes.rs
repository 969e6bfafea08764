//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

use crate::app::AppState;
use crate::lobby::LobbyStatus;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(state.config.client_origin.as_deref()))
        .with_state(state)
}

/// CORS from a comma-separated origin list, permissive when unset
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    match client_origin {
        Some(origins) => {
            let allowed_origins: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE])
        }
        None => CorsLayer::permissive(),
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    #[serde(flatten)]
    lobby: LobbyStatus,
}

async fn health_handler(State(state): State<AppState>) -> Response {
    match state.lobby.status().await {
        Ok(lobby) => Json(HealthResponse {
            status: "ok",
            uptime_secs: uptime_secs(),
            lobby,
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_health_response_shape() {
        let body = HealthResponse {
            status: "ok",
            uptime_secs: 12,
            lobby: LobbyStatus {
                queue_size: 3,
                active_sessions: 1,
                connected_players: 7,
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "status": "ok",
                "uptimeSecs": 12,
                "queueSize": 3,
                "activeSessions": 1,
                "connectedPlayers": 7
            })
        );
    }
}
