mod session;

pub use session::Session;

use aide::OperationIo;
use axum::{
	body::Body,
	extract::{FromRequest, FromRequestParts, Request},
	http::{request, Response},
	response::IntoResponse,
};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::AppError;

/// Runs the `validator` rules of an extracted value.
fn validated<T: Validate>(value: T) -> Result<T, AppError> {
	value.validate()?;
	Ok(value)
}

/// A JSON request body that has passed validation, or a JSON response.
///
/// Malformed bodies and failed rules are both rejected with an [`AppError`],
/// so handlers only ever see valid input.
///
/// ```rust,ignore
/// async fn route(Json(input): Json<CreatePostInput>) -> Json<Post> {
///   // ...
/// }
/// ```
#[derive(OperationIo)]
#[aide(
	input_with = "axum_jsonschema::Json<T>",
	output_with = "axum_jsonschema::Json<T>",
	json_schema
)]
pub struct Json<T>(pub T);

impl<T> IntoResponse for Json<T>
where
	T: serde::Serialize,
{
	fn into_response(self) -> Response<Body> {
		axum::Json(self.0).into_response()
	}
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for Json<T>
where
	T: DeserializeOwned + Validate + JsonSchema + 'static,
	S: Send + Sync,
{
	type Rejection = AppError;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;

		validated(value).map(Self)
	}
}

/// Validated query string parameters.
#[derive(OperationIo)]
#[aide(input_with = "axum::extract::Query<T>", json_schema)]
pub struct Query<T>(pub T);

/// Validated path parameters, e.g. the `:id` of `/posts/:id`.
#[derive(OperationIo)]
#[aide(input_with = "axum::extract::Path<T>", json_schema)]
pub struct Path<T>(pub T);

/// Implements [`FromRequestParts`] for a wrapper by running the axum extractor
/// of the same name, then validating the value.
macro_rules! validated_parts {
	($($name:ident),+) => {$(
		#[axum::async_trait]
		impl<T, S> FromRequestParts<S> for $name<T>
		where
			T: DeserializeOwned + Validate + Send,
			S: Send + Sync,
		{
			type Rejection = AppError;

			async fn from_request_parts(
				parts: &mut request::Parts,
				state: &S,
			) -> Result<Self, Self::Rejection> {
				let axum::extract::$name(value) =
					axum::extract::$name::<T>::from_request_parts(parts, state).await?;

				validated(value).map(Self)
			}
		}
	)+};
}

validated_parts!(Query, Path);
