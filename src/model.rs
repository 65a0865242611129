use std::{fmt, str::FromStr};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_username(username: &str) -> Result<(), ValidationError> {
	if username.chars().any(|c| !c.is_alphanumeric()) {
		return Err(ValidationError::new("username must be alphanumeric"));
	}

	Ok(())
}

/// The role of a user, which decides what they can see and do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	#[default]
	Standard,
	Admin,
}

impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Standard => "standard",
			Self::Admin => "admin",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
	type Err = UnknownRole;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"standard" => Ok(Self::Standard),
			"admin" => Ok(Self::Admin),
			other => Err(UnknownRole(other.to_owned())),
		}
	}
}

/// A single user.
///
/// Users are never deleted, only disabled, so that posts keep a valid author.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct User {
	/// The unique identifier of the user.
	pub id: Uuid,
	/// The user's primary email address, used for logging in.
	#[serde(skip_serializing)]
	pub email: String,
	/// The hashed password.
	#[serde(skip)]
	pub password: Vec<u8>,
	/// The username that is displayed to the public.
	pub username: String,
	/// The role of the user.
	pub role: Role,
	/// Whether the user has been disabled. Disabled users cannot log in.
	pub disabled: bool,
	/// The creation time of the user.
	pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A user that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewUser {
	pub id: Uuid,
	pub email: String,
	pub username: String,
	pub password: Vec<u8>,
	pub role: Role,
}

/// An access token bound to a single user.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct Token {
	/// The opaque token string, sent as `Authorization: Bearer <token>`.
	pub token: String,
	/// The user that owns the token.
	#[serde(skip)]
	pub user_id: Uuid,
	/// The issue time of the token.
	pub created_at: chrono::DateTime<chrono::Utc>,
	/// The time after which the token is no longer accepted, if any.
	pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Token {
	pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
		self.expires_at.is_some_and(|expires_at| expires_at <= now)
	}
}

/// A freshly issued token together with the user it belongs to.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Session {
	pub user: User,
	#[serde(flatten)]
	pub token: Token,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct LoginInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
}

#[derive(Deserialize, Validate, JsonSchema)]
pub struct RegisterInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
	/// The username that is displayed to the public.
	#[validate(length(min = 3, max = 16), custom(function = "validate_username"))]
	pub username: String,
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_role_round_trips_through_str() {
		assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
		assert_eq!(Role::Standard.to_string(), "standard");
		assert!("root".parse::<Role>().is_err());
	}

	#[test]
	fn test_token_expiry() {
		let now = chrono::Utc::now();
		let mut token = Token {
			token: "abc".into(),
			user_id: Uuid::new_v4(),
			created_at: now,
			expires_at: None,
		};

		assert!(!token.is_expired(now));

		token.expires_at = Some(now);
		assert!(token.is_expired(now));

		token.expires_at = Some(now + chrono::Duration::seconds(1));
		assert!(!token.is_expired(now));
	}

	#[test]
	fn test_register_input_validation() {
		let input = |username: &str| RegisterInput {
			email: "john@smith.com".into(),
			password: "hunter2hunter".into(),
			username: username.into(),
		};

		assert!(input("john").validate().is_ok());
		assert!(input("jo").validate().is_err());
		assert!(input("john smith").validate().is_err());
		assert!(input("john_smith").validate().is_err());
	}
}
