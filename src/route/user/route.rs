use axum::extract::State;
use macros::route;
use schemars::JsonSchema;
use serde::Deserialize;
use validator::Validate;

use crate::{
	error::AppError,
	extract::{Json, Path, Session},
	gateway::Gateway,
	model::{Role, User},
	openapi::tag,
	route::model::UserIdInput,
};

#[derive(Deserialize, Validate, JsonSchema)]
pub struct RoleInput {
	/// The new role of the user.
	pub role: Role,
}

/// Disable user
/// Disables a user and revokes all of their tokens. Users can disable themselves, admins can disable anyone.
#[route(tag = tag::USER)]
pub async fn disable_user(
	State(gateway): State<Gateway>,
	session: Session,
	Path(path): Path<UserIdInput>,
) -> Result<Json<User>, AppError> {
	Ok(Json(gateway.disable_user(&session.identity, path.id).await?))
}

/// Set role
/// Changes the role of a user. Admin only.
#[route(tag = tag::USER)]
pub async fn set_role(
	State(gateway): State<Gateway>,
	session: Session,
	Path(path): Path<UserIdInput>,
	Json(input): Json<RoleInput>,
) -> Result<Json<User>, AppError> {
	Ok(Json(
		gateway
			.set_role(&session.identity, path.id, input.role)
			.await?,
	))
}
