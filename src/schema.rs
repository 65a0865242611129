//! Creates the tables the Postgres store expects.

use crate::Database;

const STATEMENTS: &[&str] = &[
	r#"
		CREATE TABLE IF NOT EXISTS "user" (
			id UUID PRIMARY KEY,
			email TEXT NOT NULL UNIQUE,
			username TEXT NOT NULL UNIQUE,
			password BYTEA NOT NULL,
			role TEXT NOT NULL DEFAULT 'standard' CHECK (role IN ('standard', 'admin')),
			disabled BOOLEAN NOT NULL DEFAULT FALSE,
			created_at TIMESTAMPTZ NOT NULL DEFAULT now()
		)
	"#,
	r#"
		CREATE TABLE IF NOT EXISTS token (
			token TEXT PRIMARY KEY,
			user_id UUID NOT NULL REFERENCES "user" (id) ON DELETE CASCADE,
			created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
			expires_at TIMESTAMPTZ
		)
	"#,
	"CREATE INDEX IF NOT EXISTS token_user_id_idx ON token (user_id)",
	r#"
		CREATE TABLE IF NOT EXISTS post (
			id BIGSERIAL PRIMARY KEY,
			author_id UUID NOT NULL REFERENCES "user" (id),
			title TEXT NOT NULL,
			body TEXT NOT NULL,
			tags TEXT[] NOT NULL DEFAULT '{}',
			visible BOOLEAN NOT NULL DEFAULT TRUE,
			created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp(),
			updated_at TIMESTAMPTZ
		)
	"#,
	"CREATE INDEX IF NOT EXISTS post_author_id_idx ON post (author_id)",
	"CREATE INDEX IF NOT EXISTS post_created_at_idx ON post (created_at)",
	"CREATE INDEX IF NOT EXISTS post_tags_idx ON post USING GIN (tags)",
];

/// Creates every missing table and index in a single transaction.
///
/// Safe to run on every start, existing tables are left untouched.
#[tracing::instrument(skip_all)]
pub async fn ensure(database: &Database) -> Result<(), sqlx::Error> {
	let mut tx = database.begin().await?;

	for statement in STATEMENTS {
		sqlx::query(statement).execute(&mut *tx).await?;
	}

	tx.commit().await?;

	tracing::info!("database schema is up to date");

	Ok(())
}
