use aide::OperationInput;
use axum::{
	extract::{FromRef, FromRequestParts},
	http::{header, request},
};

use crate::{
	error::AppError,
	gateway::Gateway,
	openapi::{SECURITY_SCHEME_BEARER, SECURITY_SCHEME_COOKIE},
	session,
	token::{AuthError, Identity},
};

pub const AUTHORIZATION_PREFIX: &str = "Bearer ";

/// Extracts the identity of the caller from the request.
///
/// The token is read from an `Authorization: Bearer <token>` header, or from the
/// token cookie if there is no such header. Without either, an
/// [`AuthError::MissingToken`] is returned. A malformed header or an unusable
/// token is an [`AuthError::InvalidToken`].
///
/// ```rust,ignore
/// async fn route(session: Session) {
///   println!("{:?}", session.identity);
/// }
/// ```
#[derive(Debug)]
pub struct Session {
	pub identity: Identity,
}

/// Reads the raw token from the request headers.
fn raw_token(parts: &request::Parts) -> Result<String, AuthError> {
	if let Some(value) = parts.headers.get(header::AUTHORIZATION) {
		let value = value.to_str().map_err(|_| AuthError::InvalidToken)?;
		let token = value
			.strip_prefix(AUTHORIZATION_PREFIX)
			.ok_or(AuthError::InvalidToken)?;

		return Ok(token.trim().to_owned());
	}

	parts
		.headers
		.get_all(header::COOKIE)
		.into_iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(cookie::Cookie::split_parse)
		.filter_map(Result::ok)
		.find(|cookie| cookie.name() == session::COOKIE_NAME)
		.map(|cookie| cookie.value().to_owned())
		.ok_or(AuthError::MissingToken)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
	Gateway: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = AppError;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let token = raw_token(parts)?;
		let identity = Gateway::from_ref(state).authenticate(&token).await?;

		Ok(Self { identity })
	}
}

impl OperationInput for Session {
	/// Operation input for the session extractor.
	///
	/// This adds a bearer token or cookie requirement to the `OpenAPI` operation.
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		operation.security.extend([
			[(SECURITY_SCHEME_BEARER.to_string(), Vec::new())]
				.into_iter()
				.collect(),
			[(SECURITY_SCHEME_COOKIE.to_string(), Vec::new())]
				.into_iter()
				.collect(),
		]);
	}
}

#[cfg(test)]
mod test {
	use axum::http::Request;

	use super::*;

	fn parts(headers: &[(&str, &str)]) -> request::Parts {
		let mut request = Request::builder();

		for (name, value) in headers {
			request = request.header(*name, *value);
		}

		request.body(()).unwrap().into_parts().0
	}

	#[test]
	fn test_raw_token() {
		assert_eq!(
			raw_token(&parts(&[("authorization", "Bearer abc")])).unwrap(),
			"abc"
		);
		assert_eq!(
			raw_token(&parts(&[("cookie", "theme=dark; token=def")])).unwrap(),
			"def"
		);
		// the header wins over the cookie
		assert_eq!(
			raw_token(&parts(&[("authorization", "Bearer abc"), ("cookie", "token=def")])).unwrap(),
			"abc"
		);

		assert!(matches!(
			raw_token(&parts(&[])),
			Err(AuthError::MissingToken)
		));
		assert!(matches!(
			raw_token(&parts(&[("authorization", "Basic abc")])),
			Err(AuthError::InvalidToken)
		));
	}
}
