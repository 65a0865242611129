use aide::{
	openapi::{ApiKeyLocation, SecurityScheme, Tag},
	transform::TransformOpenApi,
};

use crate::{error, extract::Json, session};

pub const SECURITY_SCHEME_BEARER: &str = "Bearer";
pub const SECURITY_SCHEME_COOKIE: &str = "Cookie";

pub mod tag {
	pub const AUTH: &str = "Auth";
	pub const TOKEN: &str = "Token";
	pub const POST: &str = "Post";
	pub const USER: &str = "User";
}

pub fn docs(api: TransformOpenApi) -> TransformOpenApi {
	api.title("Post Gateway")
		.summary("Token-authenticated access to posts")
		.description(include_str!("../README.md"))
		.tag(Tag {
			name: tag::AUTH.into(),
			description: Some("Registration, login and the authenticated user".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::TOKEN.into(),
			description: Some("Access token management".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::POST.into(),
			description: Some("Listing, filtering and managing posts".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::USER.into(),
			description: Some("User administration".into()),
			..Default::default()
		})
		.security_scheme(
			SECURITY_SCHEME_BEARER,
			SecurityScheme::Http {
				scheme: "bearer".into(),
				bearer_format: Some("opaque".into()),
				description: Some("An access token in the Authorization header".into()),
				extensions: Default::default(),
			},
		)
		.security_scheme(
			SECURITY_SCHEME_COOKIE,
			SecurityScheme::ApiKey {
				location: ApiKeyLocation::Cookie,
				name: session::COOKIE_NAME.into(),
				description: Some("An access token cookie, set on login".into()),
				extensions: Default::default(),
			},
		)
		.default_response_with::<Json<error::ErrorBody>, _>(|res| {
			res.example(error::ErrorBody {
				success: false,
				errors: error::Message::new("error_message")
					.field("optional_field")
					.detail("key", "value")
					.into_vec(),
			})
		})
}
