use axum::routing::post;
use axum::Router;
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::credentials::JwtConfig;

mod auth;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jwt: JwtConfig,
}

pub fn add_routes(router: Router, pool: PgPool, jwt: JwtConfig) -> Router {
    let state = AppState { pool, jwt };

    router.merge(
        Router::new()
            .route("/auth/signup", post(auth::signup))
            .route("/auth/signin", post(auth::signin))
            .layer(TraceLayer::new_for_http())
            .with_state(state),
    )
}
