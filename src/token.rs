//! Issues, validates and revokes opaque access tokens.

use std::{fmt, sync::Arc};

use axum::http::StatusCode;
use chrono::Utc;
use uuid::Uuid;

use crate::{
	error::{ErrorShape, Message},
	model::{Role, Token},
	store::Store,
	Error,
};

/// The longest token string that is worth looking up.
const MAX_TOKEN_LENGTH: usize = 128;

/// An error that can occur during authentication.
///
/// Note that the messages are presented to the client, so they should not contain
/// sensitive information. Unknown and revoked tokens are indistinguishable.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
	#[error("no token provided")]
	MissingToken,
	#[error("invalid token")]
	InvalidToken,
	#[error("token expired")]
	ExpiredToken,
	#[error("unknown token")]
	NotFound,
	#[error("invalid email or password")]
	InvalidCredentials,
	#[error("not allowed")]
	Forbidden,
	#[error("password hashing error")]
	Hash(#[from] argon2::Error),
}

impl ErrorShape for AuthError {
	fn status(&self) -> StatusCode {
		match self {
			Self::MissingToken
			| Self::InvalidToken
			| Self::ExpiredToken
			| Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
			Self::NotFound => StatusCode::NOT_FOUND,
			Self::Forbidden => StatusCode::FORBIDDEN,
			Self::Hash(..) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn into_errors(self) -> Vec<Message> {
		let content = match self {
			Self::MissingToken => "missing_token",
			Self::InvalidToken => "invalid_token",
			Self::ExpiredToken => "expired_token",
			Self::NotFound => "unknown_token",
			Self::InvalidCredentials => "invalid_credentials",
			Self::Forbidden => "forbidden",
			Self::Hash(..) => return Vec::new(),
		};

		Message::new(content).into_vec()
	}
}

/// A caller whose token has been validated.
///
/// The only way to obtain one is [`TokenAuthority::validate`], so any function
/// taking an `&Identity` can only be reached with a valid token.
#[derive(Clone)]
pub struct Identity {
	user_id: Uuid,
	username: String,
	role: Role,
	token: String,
}

impl Identity {
	pub fn user_id(&self) -> Uuid {
		self.user_id
	}

	pub fn username(&self) -> &str {
		&self.username
	}

	pub fn role(&self) -> Role {
		self.role
	}

	pub fn is_admin(&self) -> bool {
		self.role == Role::Admin
	}

	/// The token this identity was validated from.
	pub fn token(&self) -> &str {
		&self.token
	}
}

impl fmt::Debug for Identity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Identity")
			.field("user_id", &self.user_id)
			.field("username", &self.username)
			.field("role", &self.role)
			.finish_non_exhaustive()
	}
}

#[derive(Clone)]
pub struct TokenAuthority {
	store: Arc<dyn Store>,
	ttl: Option<chrono::Duration>,
}

impl TokenAuthority {
	/// Tokens expire `ttl` after being issued, or never if it is `None`.
	pub fn new(store: Arc<dyn Store>, ttl: Option<chrono::Duration>) -> Self {
		Self { store, ttl }
	}

	/// Creates and persists a new token for the user.
	#[tracing::instrument(skip(self))]
	pub async fn issue(&self, user_id: Uuid) -> Result<Token, Error> {
		let created_at = Utc::now();
		let token = Token {
			token: Uuid::new_v4().simple().to_string(),
			user_id,
			created_at,
			expires_at: self.ttl.map(|ttl| created_at + ttl),
		};

		Ok(self.store.insert_token(token).await?)
	}

	/// Resolves a token to the identity of its owner.
	///
	/// Unknown tokens, revoked tokens and tokens of disabled users all fail with
	/// [`AuthError::InvalidToken`].
	pub async fn validate(&self, token: &str) -> Result<Identity, Error> {
		if token.is_empty() || token.len() > MAX_TOKEN_LENGTH {
			return Err(AuthError::InvalidToken.into());
		}

		let Some((record, user)) = self.store.token_by_value(token).await? else {
			return Err(AuthError::InvalidToken.into());
		};

		if user.disabled {
			return Err(AuthError::InvalidToken.into());
		}

		if record.is_expired(Utc::now()) {
			return Err(AuthError::ExpiredToken.into());
		}

		Ok(Identity {
			user_id: user.id,
			username: user.username,
			role: user.role,
			token: record.token,
		})
	}

	/// Deletes a token. Revoking an unknown or already revoked token fails
	/// with [`AuthError::NotFound`].
	#[tracing::instrument(skip_all)]
	pub async fn revoke(&self, token: &str) -> Result<(), Error> {
		if !self.store.delete_token(token).await? {
			return Err(AuthError::NotFound.into());
		}

		Ok(())
	}

	/// Deletes every token of a user, returning how many were revoked.
	#[tracing::instrument(skip(self))]
	pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, Error> {
		Ok(self.store.delete_user_tokens(user_id).await?)
	}

	pub async fn tokens(&self, user_id: Uuid) -> Result<Vec<Token>, Error> {
		Ok(self.store.tokens_by_user(user_id).await?)
	}
}
