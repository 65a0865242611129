use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub use crate::model::Token;

#[derive(Deserialize, Validate, JsonSchema)]
pub struct RevokeTokenInput {
	/// The token to revoke.
	#[validate(length(min = 1, max = 128))]
	pub token: String,
}

#[derive(Serialize, JsonSchema)]
pub struct RevokedTokens {
	/// The number of tokens that were revoked.
	pub revoked: u64,
}
