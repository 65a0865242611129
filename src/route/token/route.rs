use axum::{extract::State, http::StatusCode};
use macros::route;

use crate::{
	error::AppError,
	extract::{Json, Session},
	gateway::Gateway,
	openapi::tag,
};

use super::model;

/// List tokens
/// Lists the access tokens of the authenticated user, newest first.
#[route(tag = tag::TOKEN)]
pub async fn list_tokens(
	State(gateway): State<Gateway>,
	session: Session,
) -> Result<Json<Vec<model::Token>>, AppError> {
	Ok(Json(gateway.tokens(&session.identity).await?))
}

/// Create token
/// Issues an additional access token for the authenticated user, e.g. for another device.
#[route(tag = tag::TOKEN)]
pub async fn create_token(
	State(gateway): State<Gateway>,
	session: Session,
) -> Result<Json<model::Token>, AppError> {
	Ok(Json(gateway.issue_token(&session.identity).await?))
}

/// Revoke token
/// Revokes one of your access tokens. Admins can revoke any token.
#[route(tag = tag::TOKEN, response(status = 204, description = "Token revoked."))]
pub async fn revoke_token(
	State(gateway): State<Gateway>,
	session: Session,
	Json(input): Json<model::RevokeTokenInput>,
) -> Result<StatusCode, AppError> {
	gateway.revoke_token(&session.identity, &input.token).await?;

	Ok(StatusCode::NO_CONTENT)
}

/// Revoke all tokens
/// Revokes every access token of the authenticated user, including the one used for this request.
#[route(tag = tag::TOKEN)]
pub async fn revoke_all_tokens(
	State(gateway): State<Gateway>,
	session: Session,
) -> Result<Json<model::RevokedTokens>, AppError> {
	let revoked = gateway.revoke_all_tokens(&session.identity).await?;

	Ok(Json(model::RevokedTokens { revoked }))
}
