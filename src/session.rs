use chrono::Utc;

use crate::model::Token;

pub const COOKIE_NAME: &str = "token";

/// Creates a token cookie that expires together with the token
pub fn create_cookie(token: &Token) -> cookie::Cookie<'static> {
	let mut cookie = cookie::Cookie::build((COOKIE_NAME, token.token.clone()))
		.secure(!cfg!(debug_assertions))
		.http_only(true)
		.same_site(cookie::SameSite::Lax)
		.path("/");

	if let Some(expires_at) = token.expires_at {
		let remaining = (expires_at - Utc::now()).num_seconds().max(0);
		cookie = cookie.max_age(cookie::time::Duration::seconds(remaining));
	}

	cookie.into()
}

/// Creates an empty token cookie used to invalidate a previous one
pub fn clear_cookie() -> cookie::Cookie<'static> {
	cookie::Cookie::build(COOKIE_NAME)
		.http_only(true)
		.path("/")
		.max_age(cookie::time::Duration::ZERO)
		.into()
}
