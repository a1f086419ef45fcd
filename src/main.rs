use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use confreg_server::config::Config;
use confreg_server::mailer::Mailer;
use confreg_server::payments::HostedCheckoutClient;
use confreg_server::routes::create_routes;
use confreg_server::state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    // Every setting is required; refusing to start beats limping along
    let config = Config::from_env().expect("Configuration is incomplete");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    let mailer = Mailer::from_config(&config).expect("Failed to build mail transport");
    let gateway = Arc::new(HostedCheckoutClient::from_config(&config));

    let state = AppState::new(pool, config, gateway, mailer);
    let app: Router = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3001));
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
