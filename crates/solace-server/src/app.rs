use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use solace_api::middleware::require_auth;
use solace_api::{AppState, auth, messages, moods, patients, posts};
use solace_gateway::connection;

/// Assemble every route over the shared state.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/moods", get(moods::list_moods))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/moods/daily", get(moods::mood_history).post(moods::record_mood))
        .route("/posts", get(posts::get_feed).post(posts::create_post))
        .route("/posts/{post_id}", patch(posts::edit_post).delete(posts::delete_post))
        .route("/posts/{post_id}/flag", post(posts::flag_post))
        .route("/posts/{post_id}/like", put(posts::set_like))
        .route("/posts/{post_id}/like/toggle", post(posts::toggle_like))
        .route("/posts/{post_id}/comments", post(posts::add_comment))
        .route("/users", get(messages::list_users))
        .route("/messages", get(messages::get_conversation).post(messages::send_message))
        .route("/messages/{message_id}/read", post(messages::mark_read))
        .route("/patients", get(patients::list_patients))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // The gateway authenticates with an Identify frame instead of a header
    let ws_route = Router::new().route("/gateway", get(ws_upgrade));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, jwt_secret))
}
