#![warn(clippy::pedantic)]

pub mod bot;
pub mod config;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod model;
pub mod openapi;
pub mod post;
pub mod query;
pub mod route;
pub mod schema;
pub mod session;
pub mod store;
pub mod token;
pub mod trace;


use std::sync::Arc;

use aide::{axum::ApiRouter, openapi::OpenApi};
use axum::{body::Body, http::Request, Extension, Router};
use tower::ServiceBuilder;
use tower_http::{
	compression::CompressionLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	trace::TraceLayer,
};

pub use error::Error;
pub use gateway::Gateway;

pub type Database = sqlx::Pool<sqlx::Postgres>;

/// The shared application state.
///
/// Everything handlers need goes through the gateway, which owns the store,
/// the token authority and the query engine.
#[derive(Clone, axum::extract::FromRef)]
pub struct AppState {
	pub gateway: Gateway,
}

/// Builds the full HTTP application, including the `OpenAPI` document at `/docs/api.json`.
pub fn app(state: AppState) -> Router {
	let mut api = OpenApi::default();

	ApiRouter::new()
		.nest("/auth", route::auth::routes())
		.nest("/tokens", route::token::routes())
		.nest("/posts", route::post::routes())
		.nest("/users", route::user::routes())
		.nest("/docs", route::docs::routes())
		.finish_api_with(&mut api, openapi::docs)
		.layer(Extension(Arc::new(api)))
		.layer(
			ServiceBuilder::new()
				.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
				.layer(
					TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
						tracing::info_span!(
							"request",
							method = %request.method(),
							path = %request.uri().path(),
							request_id = request
								.headers()
								.get("x-request-id")
								.and_then(|value| value.to_str().ok())
								.unwrap_or_default(),
						)
					}),
				)
				.layer(PropagateRequestIdLayer::x_request_id())
				.layer(CompressionLayer::new()),
		)
		.with_state(state)
}
