//! Persistence for users, tokens and posts.
//!
//! Every mutation is atomic: the Postgres store wraps each one in a single
//! transaction, and the in-memory store applies each one under a single write lock.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use axum::http::StatusCode;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::{
	error::{ErrorShape, Message},
	model::{NewUser, Role, Token, User},
	post::{CreatePostInput, Post, UpdatePostInput},
	query::QuerySpec,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("record not found")]
	NotFound,
	#[error("{0} already taken")]
	Conflict(&'static str),
	#[error("store unavailable: {0}")]
	Unavailable(#[from] sqlx::Error),
	#[error("corrupt record: {0}")]
	Corrupt(String),
}

impl ErrorShape for StoreError {
	fn status(&self) -> StatusCode {
		match self {
			Self::NotFound => StatusCode::NOT_FOUND,
			Self::Conflict(..) => StatusCode::CONFLICT,
			Self::Unavailable(..) => StatusCode::SERVICE_UNAVAILABLE,
			Self::Corrupt(..) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn into_errors(self) -> Vec<Message> {
		match self {
			Self::NotFound => Message::new("not_found").into_vec(),
			Self::Conflict(field) => Message::new("conflict").field(field).into_vec(),
			Self::Unavailable(..) => Message::new("store_unavailable").into_vec(),
			Self::Corrupt(..) => Vec::new(),
		}
	}
}

#[async_trait]
pub trait Store: Send + Sync {
	/// Creates a user, failing with [`StoreError::Conflict`] if the email or username is taken.
	async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

	async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

	async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

	async fn set_role(&self, id: Uuid, role: Role) -> Result<User, StoreError>;

	/// Disables the user and deletes all of their tokens.
	async fn disable_user(&self, id: Uuid) -> Result<User, StoreError>;

	async fn insert_token(&self, token: Token) -> Result<Token, StoreError>;

	/// Looks up a token together with the user it is bound to.
	async fn token_by_value(&self, token: &str) -> Result<Option<(Token, User)>, StoreError>;

	/// Lists the tokens of a user, newest first.
	async fn tokens_by_user(&self, user_id: Uuid) -> Result<Vec<Token>, StoreError>;

	/// Deletes a token, returning whether it existed.
	async fn delete_token(&self, token: &str) -> Result<bool, StoreError>;

	/// Deletes every token of a user, returning how many there were.
	async fn delete_user_tokens(&self, user_id: Uuid) -> Result<u64, StoreError>;

	/// Creates a post, failing with [`StoreError::NotFound`] if the author does not exist.
	async fn insert_post(
		&self,
		author_id: Uuid,
		input: &CreatePostInput,
	) -> Result<Post, StoreError>;

	async fn post_by_id(&self, id: i64) -> Result<Option<Post>, StoreError>;

	/// Applies the present fields of `changes`. The id and author are never touched.
	async fn update_post(&self, id: i64, changes: &UpdatePostInput) -> Result<Post, StoreError>;

	/// Permanently deletes a post.
	async fn purge_post(&self, id: i64) -> Result<(), StoreError>;

	/// Runs a validated query in a single read.
	async fn query_posts(&self, spec: &QuerySpec) -> Result<Vec<Post>, StoreError>;
}
