use aide::axum::IntoApiResponse;
use axum::{
	extract::State,
	http::{header, StatusCode},
};
use macros::route;

use crate::{
	error::AppError,
	extract::{Json, Session},
	gateway::Gateway,
	model,
	openapi::tag,
	session,
};

/// Register account
/// Registers a new account, returning an access token that is also set as a cookie.
#[route(tag = tag::AUTH, response(status = 200, description = "Registered successfully.", shape = "Json<model::Session>"))]
pub async fn register(
	State(gateway): State<Gateway>,
	Json(input): Json<model::RegisterInput>,
) -> Result<impl IntoApiResponse, AppError> {
	let session = gateway.register(input).await?;
	let cookie = session::create_cookie(&session.token);

	Ok(([(header::SET_COOKIE, cookie.to_string())], Json(session)))
}

/// Log in
/// Logs in to an account, returning a new access token that is also set as a cookie.
#[route(tag = tag::AUTH, response(status = 200, description = "Logged in successfully.", shape = "Json<model::Session>"))]
pub async fn login(
	State(gateway): State<Gateway>,
	Json(input): Json<model::LoginInput>,
) -> Result<impl IntoApiResponse, AppError> {
	let session = gateway.login(input).await?;
	let cookie = session::create_cookie(&session.token);

	Ok(([(header::SET_COOKIE, cookie.to_string())], Json(session)))
}

/// Log out
/// Revokes the access token used for this request and clears the token cookie.
#[route(tag = tag::AUTH, response(status = 204, description = "Logged out successfully."))]
pub async fn logout(
	State(gateway): State<Gateway>,
	session: Session,
) -> Result<impl IntoApiResponse, AppError> {
	gateway.logout(&session.identity).await?;

	Ok((
		[(header::SET_COOKIE, session::clear_cookie().to_string())],
		StatusCode::NO_CONTENT,
	))
}

/// Get user
/// Returns the authenticated user.
#[route(tag = tag::AUTH)]
pub async fn get_me(
	State(gateway): State<Gateway>,
	session: Session,
) -> Result<Json<model::User>, AppError> {
	Ok(Json(gateway.me(&session.identity).await?))
}

/// Disable account
/// Disables the authenticated user and revokes all of their tokens. Their posts are kept.
#[route(tag = tag::AUTH, response(status = 204, description = "Account disabled."))]
pub async fn delete_me(
	State(gateway): State<Gateway>,
	session: Session,
) -> Result<impl IntoApiResponse, AppError> {
	gateway
		.disable_user(&session.identity, session.identity.user_id())
		.await?;

	Ok((
		[(header::SET_COOKIE, session::clear_cookie().to_string())],
		StatusCode::NO_CONTENT,
	))
}
