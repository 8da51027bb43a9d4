use axum::Router;
use envconfig::Envconfig;
use eyre::Result;
use sqlx::postgres::PgPoolOptions;

use config::Config;

mod api;
mod config;
mod credentials;
mod handlers;
mod user;

async fn listen(app: Router, bind: String) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("failed to load configuration from env");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_pg_connections)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let app = handlers::add_routes(Router::new(), pool, config.jwt());

    tracing::info!("listening on {}", config.bind());
    match listen(app, config.bind()).await {
        Ok(_) => {}
        Err(e) => tracing::error!("failed to start auth-api http server, {}", e),
    }
}
