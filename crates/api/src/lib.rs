pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post, put},
};
use state::AppState;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    let auth_routes = Router::new()
        .route("/signup", post(routes::auth::signup))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .route("/refresh", post(routes::auth::refresh))
        .route("/me", get(routes::auth::me).put(routes::auth::update_me))
        .route("/verify-email", post(routes::auth::verify_email))
        .route(
            "/resend-verification",
            post(routes::auth::resend_verification),
        )
        .route(
            "/password-reset",
            post(routes::auth::request_password_reset),
        )
        .route(
            "/password-reset/confirm",
            post(routes::auth::confirm_password_reset),
        );

    let donation_routes = Router::new()
        .route(
            "/",
            get(routes::donation::browse).post(routes::donation::create),
        )
        .route("/mine", get(routes::donation::mine))
        .route("/claimed", get(routes::donation::claimed))
        .route(
            "/{donation_id}",
            get(routes::donation::get)
                .put(routes::donation::update)
                .delete(routes::donation::delete),
        )
        .route("/{donation_id}/claim", post(routes::donation::claim))
        .route("/{donation_id}/cancel", post(routes::donation::cancel))
        .route("/{donation_id}/en-route", post(routes::donation::en_route))
        .route("/{donation_id}/collected", post(routes::donation::collected))
        .route("/{donation_id}/delivered", post(routes::donation::delivered))
        .route("/{donation_id}/history", get(routes::donation::history));

    let notification_routes = Router::new()
        .route("/", get(routes::notification::list))
        .route("/unread-count", get(routes::notification::unread_count))
        .route("/read-all", put(routes::notification::mark_all_read))
        .route("/stream", get(routes::notification::stream))
        .route(
            "/{notification_id}/read",
            put(routes::notification::mark_read),
        );

    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/donation", donation_routes)
        .nest("/notification", notification_routes)
        .route("/stats", get(routes::stats::get))
        .route("/geocode/reverse", get(routes::geocode::reverse))
        .route("/access", get(routes::access::check));

    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
