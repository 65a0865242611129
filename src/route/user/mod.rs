use aide::axum::{
	routing::{delete_with, put_with},
	ApiRouter,
};

use crate::AppState;

pub mod route;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/:id", delete_with(disable_user, disable_user_docs))
		.api_route("/:id/role", put_with(set_role, set_role_docs))
}
