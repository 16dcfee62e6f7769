//! Proximity tracking service.
//!
//! Map clients connect to `/ws/track`, stream their position fixes and get
//! back the markers within reach. Run with
//! ```not_rust
//! API_BASE_URL=http://localhost:8080 cargo run
//! ```

mod config;
mod gateways;
mod handlers;
mod jwt_auth;
mod models;

use axum::{extract::ws::WebSocketUpgrade, extract::State, middleware, response::{IntoResponse, Response}, routing::get, Extension, Json, Router, TypedHeader, Server};

use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    services::ServeDir,
    trace::{DefaultMakeSpan, TraceLayer},
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axum::extract::connect_info::ConnectInfo;
use axum::http::StatusCode;
use dashmap::DashMap;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::gateways::Gateways;
use crate::gateways::http::{ApiClient, Nominatim};
use crate::handlers::event_actor::TrackerActor;
use crate::handlers::position_source::walk;
use crate::handlers::tracker::{ProximityTracker, TrackerSettings};
use crate::handlers::websocket_actor::TrackingSession;
use crate::jwt_auth::{auth, Identity, JwtConfig};
use crate::models::position::Position;

#[derive(Clone)]
pub struct AppState {
    gateways: Gateways,
    settings: TrackerSettings,
    jwt: JwtConfig,
    sessions: Arc<DashMap<Uuid, Option<i64>>>,
    permits: Arc<Semaphore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proximity_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let client = gateways::http::client(&config.user_agent)?;
    let api = Arc::new(ApiClient::new(client.clone(), config.api_base_url.clone()));
    let state = AppState {
        gateways: Gateways {
            locations: api.clone(),
            geocoder: Arc::new(Nominatim::new(client, config.nominatim_url.clone(), config.geocoder_language.clone())),
            favorites: api,
        },
        settings: config.tracker,
        jwt: JwtConfig::new(config.jwt_secret.clone()),
        sessions: Arc::new(DashMap::new()),
        permits: Arc::new(Semaphore::new(config.max_concurrent_sessions)),
    };

    if let Some(route) = config.simulate_route.clone() {
        tokio::spawn(simulate(state.clone(), route, config.simulate_interval));
    }

    let mut router = app(state);
    if let Some(dir) = &config.static_dir {
        info!("serving static files from {}", dir.display());
        router = router.fallback_service(ServeDir::new(dir));
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("listening on {}", addr);

    Server::bind(&addr)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/ws/track", get(track_ws_handler))
        .route_layer(middleware::from_fn_with_state(state.jwt.clone(), auth))
        .route("/health", get(health))
        // logging so we can see whats going on
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "sessions": state.sessions.len(),
    }))
}

async fn track_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    user_agent: Option<TypedHeader<headers::UserAgent>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    let Ok(permit) = state.permits.clone().try_acquire_owned() else {
        warn!("Refusing session from {}: session limit reached", addr);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let identity = identity.map(|Extension(identity)| identity);
    let session_id = Uuid::new_v4();
    match &identity {
        Some(identity) => info!("Session {} for {} ({}) from {}", session_id, identity.name, identity.role, addr),
        None => info!("Anonymous session {} from {}", session_id, addr),
    }
    if let Some(TypedHeader(user_agent)) = user_agent {
        info!("Session {} user agent: {}", session_id, user_agent);
    }

    let user_id = identity.as_ref().map(|identity| identity.user_id);
    let token = identity.map(|identity| identity.token);
    let tracker = ProximityTracker::new(state.gateways.clone(), state.settings, token);
    let sessions = state.sessions.clone();

    ws.on_upgrade(move |socket| async move {
        sessions.insert(session_id, user_id);
        TrackingSession::new(tracker).run(socket).await;
        sessions.remove(&session_id);
        drop(permit);
        info!("Session {} closed", session_id);
    })
}

/// Headless session over a simulated walk; render commands go to the log.
async fn simulate(state: AppState, route: Vec<Position>, interval: std::time::Duration) {
    let (positions, positions_recv) = watch::channel(None);
    let (_commands, commands_recv) = mpsc::channel(1);
    let (outbound, mut outbound_recv) = mpsc::channel(256);
    let tracker = ProximityTracker::new(state.gateways.clone(), state.settings, None);
    tokio::spawn(TrackerActor::new(positions_recv, commands_recv, outbound, tracker).run_actor());
    tokio::spawn(async move {
        while let Some(command) = outbound_recv.recv().await {
            info!("simulated session: {:?}", command);
        }
    });

    info!("Simulating a walk over {} waypoints", route.len());
    let fixes = walk(route, state.settings.hysteresis_km, interval);
    futures::pin_mut!(fixes);
    while let Some(fix) = fixes.next().await {
        if positions.send(Some(fix)).is_err() {
            break;
        }
    }
    info!("Simulated walk finished");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use axum::body::{Body, HttpBody};
    use axum::http::Request;
    use futures::SinkExt;
    use tokio_tungstenite::tungstenite::Message;
    use tower::ServiceExt;
    use super::*;
    use crate::gateways::testing::FakeBackend;

    fn state(backend: &Arc<FakeBackend>) -> AppState {
        AppState {
            gateways: backend.gateways(),
            settings: TrackerSettings::default(),
            jwt: JwtConfig::new("s3cret"),
            sessions: Arc::new(DashMap::new()),
            permits: Arc::new(Semaphore::new(4)),
        }
    }

    fn monterrey() -> Arc<FakeBackend> {
        Arc::new(FakeBackend::new()
            .with_location(1, "Acueducto", Some(Position::new(25.62838, -100.30402)))
            .with_location(2, "Mauritania", Some(Position::new(25.65110, -100.26619)))
            .with_location(3, "Lejos", Some(Position::new(25.80, -100.30)))
            .with_favorite("Mauritania"))
    }

    #[tokio::test]
    async fn health_reports_sessions() {
        let response = app(state(&monterrey()))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().data().await.unwrap().unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"status": "ok", "sessions": 0}));
    }

    #[tokio::test]
    async fn invalid_tokens_are_rejected() {
        let response = app(state(&monterrey()))
            .oneshot(Request::builder().uri("/ws/track?token=garbage").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn websocket_round_trip() {
        let backend = monterrey();
        let router = app(state(&backend));
        let server = Server::bind(&"127.0.0.1:0".parse().unwrap())
            .serve(router.into_make_service_with_connect_info::<SocketAddr>());
        let addr = server.local_addr();
        tokio::spawn(server);

        let token = crate::jwt_auth::tests::token("s3cret");
        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws/track?token={}", addr, token))
            .await
            .unwrap();

        socket.send(Message::Text(r#"{"Position":{"lat":25.628,"lon":-100.304}}"#.to_string())).await.unwrap();

        let mut markers = Vec::new();
        let mut located = false;
        while markers.len() < 2 {
            let frame = tokio::time::timeout(Duration::from_secs(5), socket.next()).await
                .expect("timed out")
                .expect("socket closed")
                .unwrap();
            let value: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
            if value.get("Located").is_some() {
                located = true;
            }
            if let Some(marker) = value.get("AddMarker") {
                markers.push((marker["location"]["id"].as_i64().unwrap(), marker["favorite"].as_bool().unwrap()));
            }
        }

        assert!(located);
        assert_eq!(markers, vec![(1, false), (2, true)]);
        assert_eq!(backend.geocode_calls(), 3);
    }
}
