//! The shared entry point of the HTTP API and the bot.
//!
//! Every operation on posts takes an [`Identity`], which can only come out of
//! [`Gateway::authenticate`], so nothing reaches the store without a valid token.

use std::{collections::HashSet, sync::Arc};

use argon2::Argon2;
use uuid::Uuid;

use crate::{
	model::{LoginInput, NewUser, RegisterInput, Role, Session, Token, User},
	post::{CreatePostInput, Post, UpdatePostInput},
	query::{PageLimits, QueryEngine},
	store::{Store, StoreError},
	token::{AuthError, Identity, TokenAuthority},
	Error,
};

pub const KEY_LENGTH: usize = 32;

/// Tunables of the gateway, usually read from the environment.
#[derive(Debug, Clone, Default)]
pub struct GatewayOptions {
	/// How long issued tokens stay valid. `None` means forever.
	pub token_ttl: Option<chrono::Duration>,
	pub page_limits: PageLimits,
	/// Usernames that are made admins when they register.
	pub admins: HashSet<String>,
}

#[derive(Clone)]
pub struct Gateway {
	store: Arc<dyn Store>,
	tokens: TokenAuthority,
	engine: QueryEngine,
	hasher: Argon2<'static>,
	admins: Arc<HashSet<String>>,
}

impl Gateway {
	pub fn new(store: Arc<dyn Store>, options: GatewayOptions) -> Self {
		Self {
			tokens: TokenAuthority::new(store.clone(), options.token_ttl),
			engine: QueryEngine::new(store.clone(), options.page_limits),
			hasher: Argon2::default(),
			admins: Arc::new(options.admins),
			store,
		}
	}

	pub fn engine(&self) -> &QueryEngine {
		&self.engine
	}

	/// Hashes a password with Argon2, using the user's id as a salt.
	fn hash_password(&self, password: &str, id: &Uuid) -> Result<[u8; KEY_LENGTH], AuthError> {
		let mut hash = [0; KEY_LENGTH];

		self.hasher
			.hash_password_into(password.as_bytes(), id.as_bytes(), &mut hash)?;
		Ok(hash)
	}

	/// Creates a user and issues their first token.
	#[tracing::instrument(skip_all, fields(username = %input.username))]
	pub async fn register(&self, input: RegisterInput) -> Result<Session, Error> {
		let id = Uuid::new_v4();
		let password = self.hash_password(&input.password, &id)?;
		let role = if self.admins.contains(&input.username) {
			Role::Admin
		} else {
			Role::Standard
		};

		let user = self
			.store
			.create_user(NewUser {
				id,
				email: input.email,
				username: input.username,
				password: password.to_vec(),
				role,
			})
			.await?;

		let token = self.tokens.issue(user.id).await?;

		tracing::info!(user = %user.id, %role, "registered user");

		Ok(Session { user, token })
	}

	/// Checks the password and issues a new token.
	///
	/// Unknown emails, wrong passwords and disabled users all fail with
	/// [`AuthError::InvalidCredentials`].
	#[tracing::instrument(skip_all)]
	pub async fn login(&self, input: LoginInput) -> Result<Session, Error> {
		let Some(user) = self.store.user_by_email(&input.email).await? else {
			return Err(AuthError::InvalidCredentials.into());
		};

		let hashed = self.hash_password(&input.password, &user.id)?;

		if user.disabled || user.password != hashed {
			return Err(AuthError::InvalidCredentials.into());
		}

		let token = self.tokens.issue(user.id).await?;

		tracing::info!(user = %user.id, "logged in");

		Ok(Session { user, token })
	}

	pub async fn authenticate(&self, token: &str) -> Result<Identity, Error> {
		self.tokens.validate(token).await
	}

	/// Revokes the token the caller authenticated with.
	#[tracing::instrument(skip_all, fields(user = %identity.user_id()))]
	pub async fn logout(&self, identity: &Identity) -> Result<(), Error> {
		self.tokens.revoke(identity.token()).await
	}

	/// Issues an additional token, e.g. for another device.
	#[tracing::instrument(skip_all, fields(user = %identity.user_id()))]
	pub async fn issue_token(&self, identity: &Identity) -> Result<Token, Error> {
		self.tokens.issue(identity.user_id()).await
	}

	pub async fn tokens(&self, identity: &Identity) -> Result<Vec<Token>, Error> {
		self.tokens.tokens(identity.user_id()).await
	}

	/// Revokes a token of the caller. Admins may revoke any token.
	///
	/// Tokens of other users are reported as unknown.
	#[tracing::instrument(skip_all, fields(user = %identity.user_id()))]
	pub async fn revoke_token(&self, identity: &Identity, token: &str) -> Result<(), Error> {
		let owned = self
			.store
			.token_by_value(token)
			.await?
			.is_some_and(|(record, _)| record.user_id == identity.user_id() || identity.is_admin());

		if !owned {
			return Err(AuthError::NotFound.into());
		}

		self.tokens.revoke(token).await
	}

	/// Revokes every token of the caller, including the current one.
	#[tracing::instrument(skip_all, fields(user = %identity.user_id()))]
	pub async fn revoke_all_tokens(&self, identity: &Identity) -> Result<u64, Error> {
		self.tokens.revoke_all(identity.user_id()).await
	}

	pub async fn me(&self, identity: &Identity) -> Result<User, Error> {
		Ok(self
			.store
			.user_by_id(identity.user_id())
			.await?
			.ok_or(StoreError::NotFound)?)
	}

	/// Disables a user and revokes all of their tokens. Users may disable
	/// themselves, admins may disable anyone.
	#[tracing::instrument(skip(self, identity), fields(user = %identity.user_id()))]
	pub async fn disable_user(&self, identity: &Identity, user_id: Uuid) -> Result<User, Error> {
		if identity.user_id() != user_id && !identity.is_admin() {
			return Err(AuthError::Forbidden.into());
		}

		let user = self.store.disable_user(user_id).await?;

		tracing::info!(target_user = %user_id, "disabled user");

		Ok(user)
	}

	#[tracing::instrument(skip(self, identity), fields(user = %identity.user_id()))]
	pub async fn set_role(
		&self,
		identity: &Identity,
		user_id: Uuid,
		role: Role,
	) -> Result<User, Error> {
		if !identity.is_admin() {
			return Err(AuthError::Forbidden.into());
		}

		Ok(self.store.set_role(user_id, role).await?)
	}

	/// Validates the raw parameters and runs the query as `identity`.
	#[tracing::instrument(skip_all, fields(user = %identity.user_id()))]
	pub async fn list_posts(
		&self,
		identity: &Identity,
		params: &[(String, String)],
	) -> Result<Vec<Post>, Error> {
		let spec = self.engine.build_and_validate(params)?;

		self.engine.execute(identity, spec).await
	}

	/// Fetches a single post. Posts hidden from the caller do not exist for them.
	pub async fn get_post(&self, identity: &Identity, id: i64) -> Result<Post, Error> {
		Ok(self
			.store
			.post_by_id(id)
			.await?
			.filter(|post| post.is_visible_to(identity))
			.ok_or(StoreError::NotFound)?)
	}

	#[tracing::instrument(skip_all, fields(user = %identity.user_id()))]
	pub async fn create_post(
		&self,
		identity: &Identity,
		input: CreatePostInput,
	) -> Result<Post, Error> {
		let post = self
			.store
			.insert_post(identity.user_id(), &input.normalized())
			.await?;

		tracing::info!(post = post.id, "created post");

		Ok(post)
	}

	/// Fetches a post that `identity` is allowed to modify.
	async fn modifiable_post(&self, identity: &Identity, id: i64) -> Result<Post, Error> {
		let post = self
			.store
			.post_by_id(id)
			.await?
			.ok_or(StoreError::NotFound)?;

		if post.is_modifiable_by(identity) {
			return Ok(post);
		}

		if post.is_visible_to(identity) {
			Err(AuthError::Forbidden.into())
		} else {
			Err(StoreError::NotFound.into())
		}
	}

	/// Applies changes to a post of the caller. Admins may update any post.
	#[tracing::instrument(skip(self, identity, changes), fields(user = %identity.user_id()))]
	pub async fn update_post(
		&self,
		identity: &Identity,
		id: i64,
		changes: UpdatePostInput,
	) -> Result<Post, Error> {
		let post = self.modifiable_post(identity, id).await?;

		if changes.is_empty() {
			return Ok(post);
		}

		Ok(self.store.update_post(post.id, &changes.normalized()).await?)
	}

	/// Hides a post. It stays in the store and admins can still see it.
	#[tracing::instrument(skip(self, identity), fields(user = %identity.user_id()))]
	pub async fn delete_post(&self, identity: &Identity, id: i64) -> Result<Post, Error> {
		let post = self.modifiable_post(identity, id).await?;

		Ok(self.store.update_post(post.id, &UpdatePostInput::hide()).await?)
	}

	/// Permanently deletes a post. Admin only.
	#[tracing::instrument(skip(self, identity), fields(user = %identity.user_id()))]
	pub async fn purge_post(&self, identity: &Identity, id: i64) -> Result<(), Error> {
		if !identity.is_admin() {
			return Err(AuthError::Forbidden.into());
		}

		self.store.purge_post(id).await?;

		tracing::warn!(post = id, "purged post");

		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{query::QueryError, store::MemoryStore};

	fn gateway(page_limits: PageLimits) -> Gateway {
		Gateway::new(
			Arc::new(MemoryStore::new()),
			GatewayOptions {
				token_ttl: None,
				page_limits,
				admins: HashSet::from(["admin".to_owned()]),
			},
		)
	}

	async fn register(gateway: &Gateway, username: &str) -> (Session, Identity) {
		let session = gateway
			.register(RegisterInput {
				email: format!("{username}@example.com"),
				password: "hunter2hunter".into(),
				username: username.into(),
			})
			.await
			.unwrap();

		let identity = gateway.authenticate(&session.token.token).await.unwrap();

		(session, identity)
	}

	fn post(title: &str, visible: bool) -> CreatePostInput {
		CreatePostInput {
			title: title.into(),
			body: format!("body of {title}"),
			tags: Vec::new(),
			visible,
		}
	}

	fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
		pairs
			.iter()
			.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
			.collect()
	}

	fn ids(posts: &[Post]) -> Vec<i64> {
		posts.iter().map(|post| post.id).collect()
	}

	#[tokio::test]
	async fn test_hidden_posts_are_only_listed_for_admins() {
		let gateway = gateway(PageLimits::default());
		let (_, user) = register(&gateway, "john").await;
		let (_, admin) = register(&gateway, "admin").await;

		assert!(!user.is_admin());
		assert!(admin.is_admin());

		let p1 = gateway.create_post(&user, post("first", true)).await.unwrap();
		let p2 = gateway.create_post(&user, post("second", false)).await.unwrap();

		let posts = gateway.list_posts(&user, &[]).await.unwrap();
		assert_eq!(ids(&posts), [p1.id]);

		let posts = gateway.list_posts(&admin, &[]).await.unwrap();
		assert_eq!(ids(&posts), [p2.id, p1.id]);

		// asking for hidden posts does not reveal them
		let posts = gateway
			.list_posts(&user, &params(&[("visible", "false")]))
			.await
			.unwrap();
		assert!(posts.is_empty());
	}

	#[tokio::test]
	async fn test_created_post_round_trips_through_query() {
		let gateway = gateway(PageLimits::default());
		let (_, user) = register(&gateway, "john").await;

		gateway.create_post(&user, post("unrelated", true)).await.unwrap();

		let created = gateway
			.create_post(
				&user,
				CreatePostInput {
					title: "Tagged post".into(),
					body: "Some *markdown*".into(),
					tags: vec![" Rust ".into(), "rust".into(), "Web".into()],
					visible: true,
				},
			)
			.await
			.unwrap();

		assert_eq!(created.tags, ["rust", "web"]);
		assert_eq!(created.author_id, user.user_id());
		assert_eq!(created.author_name, "john");

		let posts = gateway
			.list_posts(&user, &params(&[("tag", "web"), ("search", "TAGGED")]))
			.await
			.unwrap();

		assert_eq!(posts, [created]);
	}

	#[tokio::test]
	async fn test_queries_are_stable() {
		let gateway = gateway(PageLimits::default());
		let (_, user) = register(&gateway, "john").await;

		for title in ["same", "same", "other", "same"] {
			gateway.create_post(&user, post(title, true)).await.unwrap();
		}

		let query = params(&[("sort", "title"), ("order", "desc")]);
		let first = gateway.list_posts(&user, &query).await.unwrap();
		let second = gateway.list_posts(&user, &query).await.unwrap();

		assert_eq!(first, second);
		assert_eq!(ids(&first), [1, 2, 4, 3]);

		let page = gateway
			.list_posts(
				&user,
				&params(&[
					("sort", "title"),
					("order", "desc"),
					("offset", "1"),
					("limit", "2"),
				]),
			)
			.await
			.unwrap();
		assert_eq!(ids(&page), [2, 4]);
	}

	#[tokio::test]
	async fn test_creation_time_range() {
		let gateway = gateway(PageLimits::default());
		let (_, user) = register(&gateway, "john").await;

		let mut posts = Vec::new();
		for title in ["first", "second", "third"] {
			posts.push(gateway.create_post(&user, post(title, true)).await.unwrap());
		}

		let second = posts[1].created_at.to_rfc3339();
		let third = posts[2].created_at.to_rfc3339();

		let before = gateway
			.list_posts(&user, &params(&[("until", second.as_str())]))
			.await
			.unwrap();
		assert_eq!(ids(&before), [posts[0].id]);

		let after = gateway
			.list_posts(&user, &params(&[("since", second.as_str())]))
			.await
			.unwrap();
		assert_eq!(ids(&after), [posts[2].id, posts[1].id]);

		let between = gateway
			.list_posts(
				&user,
				&params(&[("since", second.as_str()), ("until", third.as_str())]),
			)
			.await
			.unwrap();
		assert_eq!(ids(&between), [posts[1].id]);
	}

	#[tokio::test]
	async fn test_author_filters_and_sort() {
		let gateway = gateway(PageLimits::default());
		let (_, zed) = register(&gateway, "zed").await;
		let (_, amy) = register(&gateway, "amy").await;

		let z1 = gateway.create_post(&zed, post("zed one", true)).await.unwrap();
		let a1 = gateway.create_post(&amy, post("amy one", true)).await.unwrap();
		let z2 = gateway.create_post(&zed, post("zed two", true)).await.unwrap();

		let by_name = gateway
			.list_posts(&zed, &params(&[("author_name", "amy")]))
			.await
			.unwrap();
		assert_eq!(ids(&by_name), [a1.id]);

		let author = zed.user_id().to_string();
		let by_id = gateway
			.list_posts(&amy, &params(&[("author", author.as_str())]))
			.await
			.unwrap();
		assert_eq!(ids(&by_id), [z2.id, z1.id]);

		// ties between posts of the same author keep ascending ids
		let sorted = gateway
			.list_posts(&amy, &params(&[("sort", "author")]))
			.await
			.unwrap();
		assert_eq!(ids(&sorted), [a1.id, z1.id, z2.id]);

		let sorted = gateway
			.list_posts(&amy, &params(&[("sort", "author"), ("order", "desc")]))
			.await
			.unwrap();
		assert_eq!(ids(&sorted), [z1.id, z2.id, a1.id]);
	}

	#[tokio::test]
	async fn test_limit_is_clamped() {
		let gateway = gateway(PageLimits { default: 2, max: 5 });
		let (_, user) = register(&gateway, "john").await;

		for i in 0..7 {
			gateway
				.create_post(&user, post(&format!("post {i}"), true))
				.await
				.unwrap();
		}

		let posts = gateway.list_posts(&user, &[]).await.unwrap();
		assert_eq!(posts.len(), 2);

		let clamped = gateway
			.list_posts(&user, &params(&[("limit", "1000")]))
			.await
			.unwrap();
		let max = gateway
			.list_posts(&user, &params(&[("limit", "5")]))
			.await
			.unwrap();

		assert_eq!(clamped.len(), 5);
		assert_eq!(clamped, max);
	}

	#[tokio::test]
	async fn test_invalid_queries_are_rejected() {
		let gateway = gateway(PageLimits::default());
		let (_, user) = register(&gateway, "john").await;

		let error = gateway
			.list_posts(&user, &params(&[("color", "red")]))
			.await
			.unwrap_err();
		assert!(matches!(error, Error::Query(QueryError::UnsupportedFilter(..))));

		let error = gateway
			.list_posts(&user, &params(&[("offset", "-1")]))
			.await
			.unwrap_err();
		assert!(matches!(error, Error::Query(QueryError::InvalidPagination(..))));
	}

	#[tokio::test]
	async fn test_logout_revokes_token() {
		let gateway = gateway(PageLimits::default());
		let (session, user) = register(&gateway, "john").await;

		gateway.logout(&user).await.unwrap();

		for _ in 0..2 {
			let error = gateway.authenticate(&session.token.token).await.unwrap_err();
			assert!(matches!(error, Error::Auth(AuthError::InvalidToken)));
		}
	}

	#[tokio::test]
	async fn test_login() {
		let gateway = gateway(PageLimits::default());
		let (session, _) = register(&gateway, "john").await;

		let login = gateway
			.login(LoginInput {
				email: "john@example.com".into(),
				password: "hunter2hunter".into(),
			})
			.await
			.unwrap();

		assert_eq!(login.user.id, session.user.id);
		assert_ne!(login.token.token, session.token.token);

		for (email, password) in [
			("john@example.com", "wrong password"),
			("nobody@example.com", "hunter2hunter"),
		] {
			let error = gateway
				.login(LoginInput {
					email: email.into(),
					password: password.into(),
				})
				.await
				.unwrap_err();

			assert!(matches!(error, Error::Auth(AuthError::InvalidCredentials)));
		}
	}

	#[tokio::test]
	async fn test_disabling_a_user_invalidates_every_token() {
		let gateway = gateway(PageLimits::default());
		let (session, user) = register(&gateway, "john").await;
		let (_, other) = register(&gateway, "jane").await;
		let extra = gateway.issue_token(&user).await.unwrap();

		let error = gateway
			.disable_user(&other, user.user_id())
			.await
			.unwrap_err();
		assert!(matches!(error, Error::Auth(AuthError::Forbidden)));

		gateway.disable_user(&user, user.user_id()).await.unwrap();

		for token in [&session.token.token, &extra.token] {
			let error = gateway.authenticate(token).await.unwrap_err();
			assert!(matches!(error, Error::Auth(AuthError::InvalidToken)));
		}

		let error = gateway
			.login(LoginInput {
				email: "john@example.com".into(),
				password: "hunter2hunter".into(),
			})
			.await
			.unwrap_err();
		assert!(matches!(error, Error::Auth(AuthError::InvalidCredentials)));
	}

	#[tokio::test]
	async fn test_revoke_token_of_another_user_is_not_found() {
		let gateway = gateway(PageLimits::default());
		let (session, _) = register(&gateway, "john").await;
		let (_, other) = register(&gateway, "jane").await;
		let (_, admin) = register(&gateway, "admin").await;

		let error = gateway
			.revoke_token(&other, &session.token.token)
			.await
			.unwrap_err();
		assert!(matches!(error, Error::Auth(AuthError::NotFound)));

		gateway
			.revoke_token(&admin, &session.token.token)
			.await
			.unwrap();

		assert!(gateway.authenticate(&session.token.token).await.is_err());
	}

	#[tokio::test]
	async fn test_post_mutation_permissions() {
		let gateway = gateway(PageLimits::default());
		let (_, author) = register(&gateway, "john").await;
		let (_, other) = register(&gateway, "jane").await;
		let (_, admin) = register(&gateway, "admin").await;

		let visible = gateway.create_post(&author, post("visible", true)).await.unwrap();
		let hidden = gateway.create_post(&author, post("hidden", false)).await.unwrap();

		let rename = || UpdatePostInput {
			title: Some("renamed".into()),
			body: None,
			tags: None,
			visible: None,
		};

		let error = gateway
			.update_post(&other, visible.id, rename())
			.await
			.unwrap_err();
		assert!(matches!(error, Error::Auth(AuthError::Forbidden)));

		let error = gateway
			.update_post(&other, hidden.id, rename())
			.await
			.unwrap_err();
		assert!(matches!(error, Error::Store(StoreError::NotFound)));

		let error = gateway.get_post(&other, hidden.id).await.unwrap_err();
		assert!(matches!(error, Error::Store(StoreError::NotFound)));

		let updated = gateway
			.update_post(&author, hidden.id, rename())
			.await
			.unwrap();
		assert_eq!(updated.title, "renamed");
		assert!(!updated.visible);

		let updated = gateway
			.update_post(&admin, visible.id, rename())
			.await
			.unwrap();
		assert_eq!(updated.author_id, author.user_id());
	}

	#[tokio::test]
	async fn test_delete_hides_and_purge_removes() {
		let gateway = gateway(PageLimits::default());
		let (_, author) = register(&gateway, "john").await;
		let (_, admin) = register(&gateway, "admin").await;

		let post = gateway.create_post(&author, post("doomed", true)).await.unwrap();

		let deleted = gateway.delete_post(&author, post.id).await.unwrap();
		assert!(!deleted.visible);

		assert!(gateway.get_post(&author, post.id).await.is_err());
		assert!(gateway.get_post(&admin, post.id).await.is_ok());

		let error = gateway.purge_post(&author, post.id).await.unwrap_err();
		assert!(matches!(error, Error::Auth(AuthError::Forbidden)));

		gateway.purge_post(&admin, post.id).await.unwrap();

		let error = gateway.get_post(&admin, post.id).await.unwrap_err();
		assert!(matches!(error, Error::Store(StoreError::NotFound)));
	}

	#[tokio::test]
	async fn test_set_role_is_admin_only() {
		let gateway = gateway(PageLimits::default());
		let (_, user) = register(&gateway, "john").await;
		let (_, admin) = register(&gateway, "admin").await;

		let error = gateway
			.set_role(&user, user.user_id(), Role::Admin)
			.await
			.unwrap_err();
		assert!(matches!(error, Error::Auth(AuthError::Forbidden)));

		let promoted = gateway
			.set_role(&admin, user.user_id(), Role::Admin)
			.await
			.unwrap();
		assert_eq!(promoted.role, Role::Admin);
	}
}
