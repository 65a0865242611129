//! PostgreSQL store backed by a [`sqlx`] connection pool.
//!
//! Every mutation is a single statement or runs inside one transaction, and every
//! read is a single statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Store, StoreError};
use crate::{
	model::{NewUser, Role, Token, User},
	post::{CreatePostInput, Post, UpdatePostInput},
	query::{Direction, Filter, QuerySpec, SortKey},
	Database,
};

#[derive(sqlx::FromRow)]
struct UserRow {
	id: Uuid,
	email: String,
	password: Vec<u8>,
	username: String,
	role: String,
	disabled: bool,
	created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
	type Error = StoreError;

	fn try_from(row: UserRow) -> Result<Self, Self::Error> {
		Ok(Self {
			role: row
				.role
				.parse::<Role>()
				.map_err(|e| StoreError::Corrupt(e.to_string()))?,
			id: row.id,
			email: row.email,
			password: row.password,
			username: row.username,
			disabled: row.disabled,
			created_at: row.created_at,
		})
	}
}

#[derive(sqlx::FromRow)]
struct TokenRow {
	token: String,
	user_id: Uuid,
	created_at: DateTime<Utc>,
	expires_at: Option<DateTime<Utc>>,
}

impl From<TokenRow> for Token {
	fn from(row: TokenRow) -> Self {
		Self {
			token: row.token,
			user_id: row.user_id,
			created_at: row.created_at,
			expires_at: row.expires_at,
		}
	}
}

/// A token joined with the user that owns it.
#[derive(sqlx::FromRow)]
struct TokenOwnerRow {
	#[sqlx(flatten)]
	token: TokenRow,
	email: String,
	password: Vec<u8>,
	username: String,
	role: String,
	disabled: bool,
	user_created_at: DateTime<Utc>,
}

impl TryFrom<TokenOwnerRow> for (Token, User) {
	type Error = StoreError;

	fn try_from(row: TokenOwnerRow) -> Result<Self, Self::Error> {
		let user = User::try_from(UserRow {
			id: row.token.user_id,
			email: row.email,
			password: row.password,
			username: row.username,
			role: row.role,
			disabled: row.disabled,
			created_at: row.user_created_at,
		})?;

		Ok((row.token.into(), user))
	}
}

#[derive(sqlx::FromRow)]
struct PostRow {
	id: i64,
	author_id: Uuid,
	author_name: String,
	title: String,
	body: String,
	tags: Vec<String>,
	visible: bool,
	created_at: DateTime<Utc>,
	updated_at: Option<DateTime<Utc>>,
}

impl From<PostRow> for Post {
	fn from(row: PostRow) -> Self {
		Self {
			id: row.id,
			author_id: row.author_id,
			author_name: row.author_name,
			title: row.title,
			body: row.body,
			tags: row.tags,
			visible: row.visible,
			created_at: row.created_at,
			updated_at: row.updated_at,
		}
	}
}

/// Maps constraint violations to the store errors they stand for.
fn map_constraint(error: sqlx::Error) -> StoreError {
	if let sqlx::Error::Database(ref database) = error {
		match database.constraint() {
			Some("user_email_key") => return StoreError::Conflict("email"),
			Some("user_username_key") => return StoreError::Conflict("username"),
			Some("token_pkey") => return StoreError::Conflict("token"),
			Some("post_author_id_fkey" | "token_user_id_fkey") => return StoreError::NotFound,
			_ => {}
		}
	}

	StoreError::Unavailable(error)
}

/// Escapes the wildcards of a `LIKE` pattern.
fn escape_like(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len());

	for c in value.chars() {
		if matches!(c, '%' | '_' | '\\') {
			escaped.push('\\');
		}

		escaped.push(c);
	}

	escaped
}

#[derive(Clone)]
pub struct PgStore {
	database: Database,
}

impl PgStore {
	pub fn new(database: Database) -> Self {
		Self { database }
	}
}

#[async_trait]
impl Store for PgStore {
	async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
		sqlx::query_as::<_, UserRow>(
			r#"
				INSERT INTO "user" (id, email, username, password, role)
				VALUES ($1, $2, $3, $4, $5)
				RETURNING *
			"#,
		)
		.bind(user.id)
		.bind(&user.email)
		.bind(&user.username)
		.bind(&user.password)
		.bind(user.role.as_str())
		.fetch_one(&self.database)
		.await
		.map_err(map_constraint)?
		.try_into()
	}

	async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
		sqlx::query_as::<_, UserRow>(r#"SELECT * FROM "user" WHERE id = $1"#)
			.bind(id)
			.fetch_optional(&self.database)
			.await?
			.map(User::try_from)
			.transpose()
	}

	async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
		sqlx::query_as::<_, UserRow>(r#"SELECT * FROM "user" WHERE email = $1"#)
			.bind(email)
			.fetch_optional(&self.database)
			.await?
			.map(User::try_from)
			.transpose()
	}

	async fn set_role(&self, id: Uuid, role: Role) -> Result<User, StoreError> {
		sqlx::query_as::<_, UserRow>(r#"UPDATE "user" SET role = $2 WHERE id = $1 RETURNING *"#)
			.bind(id)
			.bind(role.as_str())
			.fetch_optional(&self.database)
			.await?
			.ok_or(StoreError::NotFound)?
			.try_into()
	}

	async fn disable_user(&self, id: Uuid) -> Result<User, StoreError> {
		let mut tx = self.database.begin().await?;

		let user = sqlx::query_as::<_, UserRow>(
			r#"UPDATE "user" SET disabled = TRUE WHERE id = $1 RETURNING *"#,
		)
		.bind(id)
		.fetch_optional(&mut *tx)
		.await?
		.ok_or(StoreError::NotFound)?;

		sqlx::query("DELETE FROM token WHERE user_id = $1")
			.bind(id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		user.try_into()
	}

	async fn insert_token(&self, token: Token) -> Result<Token, StoreError> {
		let row = sqlx::query_as::<_, TokenRow>(
			r#"
				INSERT INTO token (token, user_id, created_at, expires_at)
				VALUES ($1, $2, $3, $4)
				RETURNING *
			"#,
		)
		.bind(&token.token)
		.bind(token.user_id)
		.bind(token.created_at)
		.bind(token.expires_at)
		.fetch_one(&self.database)
		.await
		.map_err(map_constraint)?;

		Ok(row.into())
	}

	async fn token_by_value(&self, token: &str) -> Result<Option<(Token, User)>, StoreError> {
		sqlx::query_as::<_, TokenOwnerRow>(
			r#"
				SELECT
					t.token, t.user_id, t.created_at, t.expires_at,
					u.email, u.password, u.username, u.role, u.disabled,
					u.created_at AS user_created_at
				FROM token t
				JOIN "user" u ON u.id = t.user_id
				WHERE t.token = $1
			"#,
		)
		.bind(token)
		.fetch_optional(&self.database)
		.await?
		.map(<(Token, User)>::try_from)
		.transpose()
	}

	async fn tokens_by_user(&self, user_id: Uuid) -> Result<Vec<Token>, StoreError> {
		let rows = sqlx::query_as::<_, TokenRow>(
			"SELECT * FROM token WHERE user_id = $1 ORDER BY created_at DESC",
		)
		.bind(user_id)
		.fetch_all(&self.database)
		.await?;

		Ok(rows.into_iter().map(Token::from).collect())
	}

	async fn delete_token(&self, token: &str) -> Result<bool, StoreError> {
		let status = sqlx::query("DELETE FROM token WHERE token = $1")
			.bind(token)
			.execute(&self.database)
			.await?;

		Ok(status.rows_affected() > 0)
	}

	async fn delete_user_tokens(&self, user_id: Uuid) -> Result<u64, StoreError> {
		let status = sqlx::query("DELETE FROM token WHERE user_id = $1")
			.bind(user_id)
			.execute(&self.database)
			.await?;

		Ok(status.rows_affected())
	}

	async fn insert_post(
		&self,
		author_id: Uuid,
		input: &CreatePostInput,
	) -> Result<Post, StoreError> {
		let mut tx = self.database.begin().await?;

		// Inserts are serialized so that creation times follow the id sequence.
		// Readers are not blocked.
		sqlx::query("LOCK TABLE post IN EXCLUSIVE MODE")
			.execute(&mut *tx)
			.await?;

		let row = sqlx::query_as::<_, PostRow>(
			r#"
				WITH inserted AS (
					INSERT INTO post (author_id, title, body, tags, visible, created_at)
					VALUES (
						$1, $2, $3, $4, $5,
						GREATEST(
							clock_timestamp(),
							(SELECT max(created_at) FROM post) + INTERVAL '1 microsecond'
						)
					)
					RETURNING *
				)
				SELECT
					p.id, p.author_id, u.username AS author_name, p.title, p.body,
					p.tags, p.visible, p.created_at, p.updated_at
				FROM inserted p
				JOIN "user" u ON u.id = p.author_id
			"#,
		)
		.bind(author_id)
		.bind(&input.title)
		.bind(&input.body)
		.bind(&input.tags)
		.bind(input.visible)
		.fetch_one(&mut *tx)
		.await
		.map_err(map_constraint)?;

		tx.commit().await?;

		Ok(row.into())
	}

	async fn post_by_id(&self, id: i64) -> Result<Option<Post>, StoreError> {
		let row = sqlx::query_as::<_, PostRow>(
			r#"
				SELECT
					p.id, p.author_id, u.username AS author_name, p.title, p.body,
					p.tags, p.visible, p.created_at, p.updated_at
				FROM post p
				JOIN "user" u ON u.id = p.author_id
				WHERE p.id = $1
			"#,
		)
		.bind(id)
		.fetch_optional(&self.database)
		.await?;

		Ok(row.map(Post::from))
	}

	async fn update_post(&self, id: i64, changes: &UpdatePostInput) -> Result<Post, StoreError> {
		let row = sqlx::query_as::<_, PostRow>(
			r#"
				WITH updated AS (
					UPDATE post
					SET
						title = COALESCE($2, title),
						body = COALESCE($3, body),
						tags = COALESCE($4, tags),
						visible = COALESCE($5, visible),
						updated_at = now()
					WHERE id = $1
					RETURNING *
				)
				SELECT
					p.id, p.author_id, u.username AS author_name, p.title, p.body,
					p.tags, p.visible, p.created_at, p.updated_at
				FROM updated p
				JOIN "user" u ON u.id = p.author_id
			"#,
		)
		.bind(id)
		.bind(changes.title.as_deref())
		.bind(changes.body.as_deref())
		.bind(changes.tags.clone())
		.bind(changes.visible)
		.fetch_optional(&self.database)
		.await?;

		row.map(Post::from).ok_or(StoreError::NotFound)
	}

	async fn purge_post(&self, id: i64) -> Result<(), StoreError> {
		let status = sqlx::query("DELETE FROM post WHERE id = $1")
			.bind(id)
			.execute(&self.database)
			.await?;

		if status.rows_affected() == 0 {
			return Err(StoreError::NotFound);
		}

		Ok(())
	}

	async fn query_posts(&self, spec: &QuerySpec) -> Result<Vec<Post>, StoreError> {
		let mut query = post_query(spec);
		let rows = query
			.build_query_as::<PostRow>()
			.fetch_all(&self.database)
			.await?;

		Ok(rows.into_iter().map(Post::from).collect())
	}
}

/// Builds the single statement that answers a [`QuerySpec`]. Every value is bound,
/// only the sort column and direction are written into the SQL.
fn post_query(spec: &QuerySpec) -> QueryBuilder<'static, Postgres> {
	let mut builder = QueryBuilder::<Postgres>::new(
		r#"
			SELECT
				p.id, p.author_id, u.username AS author_name, p.title, p.body,
				p.tags, p.visible, p.created_at, p.updated_at
			FROM post p
			JOIN "user" u ON u.id = p.author_id
			WHERE TRUE
		"#,
	);

	for filter in spec.filters() {
		match filter {
			Filter::Author(id) => builder.push(" AND p.author_id = ").push_bind(*id),
			Filter::AuthorName(name) => builder
				.push(" AND u.username = ")
				.push_bind(name.clone()),
			Filter::Tag(tag) => builder
				.push(" AND ")
				.push_bind(tag.clone())
				.push(" = ANY(p.tags)"),
			Filter::CreatedSince(since) => builder
				.push(" AND p.created_at >= ")
				.push_bind(*since),
			Filter::CreatedUntil(until) => builder
				.push(" AND p.created_at < ")
				.push_bind(*until),
			Filter::Visible(visible) => builder.push(" AND p.visible = ").push_bind(*visible),
			Filter::TitleContains(needle) => builder
				.push(" AND p.title ILIKE ")
				.push_bind(format!("%{}%", escape_like(needle))),
		};
	}

	let sort = spec.sort();
	let column = match sort.key {
		SortKey::CreatedAt => "p.created_at",
		SortKey::Title => "p.title",
		SortKey::Author => "u.username",
	};
	let direction = match sort.direction {
		Direction::Asc => "ASC",
		Direction::Desc => "DESC",
	};

	let page = spec.page();

	builder
		.push(format!(" ORDER BY {column} {direction}, p.id ASC LIMIT "))
		.push_bind(page.limit)
		.push(" OFFSET ")
		.push_bind(page.offset);

	builder
}

#[cfg(test)]
mod test {
	use std::sync::Arc;

	use super::*;
	use crate::{
		query::{PageLimits, QueryEngine},
		store::MemoryStore,
	};

	fn spec(pairs: &[(&str, &str)]) -> QuerySpec {
		let params = pairs
			.iter()
			.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
			.collect::<Vec<_>>();

		QueryEngine::new(Arc::new(MemoryStore::new()), PageLimits::default())
			.build_and_validate(&params)
			.unwrap()
	}

	fn sql(spec: &QuerySpec) -> String {
		post_query(spec)
			.sql()
			.split_whitespace()
			.collect::<Vec<_>>()
			.join(" ")
	}

	#[test]
	fn test_post_query_binds_every_value() {
		let author = Uuid::new_v4().to_string();
		let sql = sql(&spec(&[
			("author", author.as_str()),
			("tag", "rust"),
			("tag", "web"),
			("search", "100%"),
			("sort", "author"),
			("order", "desc"),
			("limit", "5"),
			("offset", "10"),
		]));

		assert!(sql.contains(concat!(
			"WHERE TRUE AND p.author_id = $1 AND $2 = ANY(p.tags) ",
			"AND $3 = ANY(p.tags) AND p.title ILIKE $4",
		)));
		assert!(sql.ends_with("ORDER BY u.username DESC, p.id ASC LIMIT $5 OFFSET $6"));
		assert_eq!(sql.matches('$').count(), 6);
		assert!(!sql.contains("100") && !sql.contains(author.as_str()));
	}

	#[test]
	fn test_post_query_defaults() {
		let sql = sql(&spec(&[]));

		assert!(sql.contains("WHERE TRUE ORDER BY p.created_at DESC, p.id ASC LIMIT $1 OFFSET $2"));
		assert_eq!(sql.matches('$').count(), 2);
	}

	#[test]
	fn test_escape_like() {
		assert_eq!(escape_like("100%_done\\"), "100\\%\\_done\\\\");
		assert_eq!(escape_like("plain"), "plain");
	}
}
