use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::get,
    routing::post,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use patchboard_api::middleware::require_auth;
use patchboard_api::{AppState, auth, canvas};
use patchboard_gateway::connection;

/// Assemble the full application router: public auth routes, guarded
/// profile/canvas routes, and the WebSocket gateway.
pub fn router(state: AppState, cors: CorsLayer) -> Router {
    let public_routes = Router::new()
        .route("/", get(root))
        .route("/auth/register", post(auth::register))
        .route("/auth/verify-email", post(auth::verify_email))
        .route("/auth/login", post(auth::login))
        .route("/auth/resend-otp", post(auth::resend_otp))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/canvas", get(canvas::get_board).put(canvas::update_board))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// CORS restricted to the configured browser origins.
pub fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Welcome to the Patchboard API" }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "message": "Route not found" })),
    )
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let rooms = state.rooms.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, rooms, jwt_secret))
}
