use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};

use crate::AppState;

pub mod model;
pub mod route;

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/",
			get_with(list_tokens, list_tokens_docs)
				.post_with(create_token, create_token_docs)
				.delete_with(revoke_all_tokens, revoke_all_tokens_docs),
		)
		.api_route("/revoke", post_with(revoke_token, revoke_token_docs))
}
