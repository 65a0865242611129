use std::sync::Arc;

use post_gateway::{
	app, config::Config, schema, store::PgStore, trace, AppState, Database, Gateway,
};

#[tokio::main]
async fn main() {
	dotenvy::dotenv().ok();

	let config = Config::from_env().expect("invalid configuration");

	trace::init_tracing_subscriber(config.log_level);

	let database = Database::connect_with(config.database.clone())
		.await
		.expect("failed to connect to database");

	schema::ensure(&database)
		.await
		.expect("failed to create database schema");

	let state = AppState {
		gateway: Gateway::new(Arc::new(PgStore::new(database)), config.gateway),
	};

	let listener = tokio::net::TcpListener::bind((config.host, config.port))
		.await
		.expect("failed to bind to port");

	tracing::info!(host = %config.host, port = config.port, "listening");

	axum::serve(listener, app(state))
		.with_graceful_shutdown(shutdown_signal())
		.await
		.expect("server error");
}

async fn shutdown_signal() {
	if let Err(error) = tokio::signal::ctrl_c().await {
		tracing::error!(%error, "failed to listen for ctrl-c");
		return;
	}

	tracing::info!("shutting down");
}
