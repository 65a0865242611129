use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};

use crate::AppState;

pub mod route;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/register", post_with(register, register_docs))
		.api_route("/login", post_with(login, login_docs))
		.api_route("/logout", post_with(logout, logout_docs))
		.api_route(
			"/me",
			get_with(get_me, get_me_docs).delete_with(delete_me, delete_me_docs),
		)
}
