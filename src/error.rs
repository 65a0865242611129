use std::borrow::Cow;

use axum::{
	body::Body,
	extract::rejection,
	http::{Response, StatusCode},
	response::IntoResponse,
};
use schemars::JsonSchema;
use serde::Serialize;

use crate::{query::QueryError, store::StoreError, token::AuthError};

pub type Map = serde_json::Map<String, serde_json::Value>;

/// The typed outcome of every failed gateway operation.
///
/// The Display trait is not sent to the client, so it can show
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("auth error: {0}")]
	Auth(#[from] AuthError),
	#[error("query error: {0}")]
	Query(#[from] QueryError),
	#[error("store error: {0}")]
	Store(#[from] StoreError),
}

/// Error type for the HTTP surface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
	#[error(transparent)]
	Core(#[from] Error),
	#[error("validation error: {0}")]
	Validation(#[from] validator::ValidationErrors),
	#[error("json error: {0}")]
	Json(#[from] rejection::JsonRejection),
	#[error("query string error: {0}")]
	Query(#[from] rejection::QueryRejection),
	#[error("path error: {0}")]
	Path(#[from] rejection::PathRejection),
}

impl From<AuthError> for AppError {
	fn from(error: AuthError) -> Self {
		Self::Core(error.into())
	}
}

/// A single error message presented to the client.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Message {
	/// A short, machine-friendly description of the error.
	pub content: Cow<'static, str>,
	/// The input field that caused the error, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub field: Option<Cow<'static, str>>,
	/// Additional information about the error.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<Map>,
}

impl Message {
	pub fn new(content: impl Into<Cow<'static, str>>) -> Self {
		Self {
			content: content.into(),
			field: None,
			details: None,
		}
	}

	pub fn field(mut self, field: impl Into<Cow<'static, str>>) -> Self {
		self.field = Some(field.into());
		self
	}

	pub fn detail(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.details
			.get_or_insert_with(Map::new)
			.insert(key.into(), value.into());
		self
	}

	pub fn into_vec(self) -> Vec<Self> {
		vec![self]
	}
}

/// The body of every error response.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ErrorBody {
	pub success: bool,
	pub errors: Vec<Message>,
}

/// Maps an error to the status code and messages that the client sees.
pub trait ErrorShape {
	fn status(&self) -> StatusCode;

	fn into_errors(self) -> Vec<Message>;
}

impl ErrorShape for Error {
	fn status(&self) -> StatusCode {
		match self {
			Self::Auth(error) => error.status(),
			Self::Query(error) => error.status(),
			Self::Store(error) => error.status(),
		}
	}

	fn into_errors(self) -> Vec<Message> {
		match self {
			Self::Auth(error) => error.into_errors(),
			Self::Query(error) => error.into_errors(),
			Self::Store(error) => error.into_errors(),
		}
	}
}

impl ErrorShape for AppError {
	fn status(&self) -> StatusCode {
		match self {
			Self::Core(error) => error.status(),
			Self::Validation(..) => StatusCode::BAD_REQUEST,
			Self::Json(
				rejection::JsonRejection::JsonDataError(..)
				| rejection::JsonRejection::JsonSyntaxError(..),
			) => StatusCode::BAD_REQUEST,
			Self::Json(error) => error.status(),
			Self::Query(error) => error.status(),
			Self::Path(error) => error.status(),
		}
	}

	fn into_errors(self) -> Vec<Message> {
		match self {
			Self::Core(error) => error.into_errors(),
			Self::Validation(errors) => errors
				.field_errors()
				.into_iter()
				.flat_map(|(field, errors)| {
					let field = field.to_string();

					errors
						.iter()
						.map(move |error| Message::new(error.to_string()).field(field.clone()))
				})
				.collect(),
			Self::Json(error) => Message::new(error.body_text()).into_vec(),
			Self::Query(error) => Message::new(error.body_text()).into_vec(),
			Self::Path(error) => Message::new(error.body_text()).into_vec(),
		}
	}
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response<Body> {
		let status = self.status();

		if status.is_server_error() {
			tracing::error!(error = %self, "request failed");
		} else {
			tracing::debug!(error = %self, "request rejected");
		}

		(
			status,
			axum::Json(ErrorBody {
				success: false,
				errors: self.into_errors(),
			}),
		)
			.into_response()
	}
}

impl aide::OperationOutput for AppError {
	type Inner = ErrorBody;
}
