use schemars::JsonSchema;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Raw filter, sort and pagination parameters of a post listing, in request order.
///
/// Repeated keys are kept, so the query engine can tell them apart. It also
/// rejects unknown keys.
#[derive(Deserialize, Validate, JsonSchema)]
#[serde(transparent)]
pub struct PostQueryInput {
	pub params: Vec<(String, String)>,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct IdInput {
	pub id: i64,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct UserIdInput {
	pub id: Uuid,
}
