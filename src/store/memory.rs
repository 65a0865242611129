//! In-memory store, used by tests and for running without a database.
//!
//! Data is lost on process restart.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::{
	model::{NewUser, Role, Token, User},
	post::{CreatePostInput, Post, UpdatePostInput},
	query::QuerySpec,
};

/// A post as it is stored, without the joined author name.
struct PostRecord {
	id: i64,
	author_id: Uuid,
	title: String,
	body: String,
	tags: Vec<String>,
	visible: bool,
	created_at: DateTime<Utc>,
	updated_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
	users: HashMap<Uuid, User>,
	tokens: HashMap<String, Token>,
	posts: BTreeMap<i64, PostRecord>,
	next_post_id: i64,
	last_created_at: Option<DateTime<Utc>>,
}

impl Inner {
	fn to_post(&self, record: &PostRecord) -> Result<Post, StoreError> {
		let author = self
			.users
			.get(&record.author_id)
			.ok_or_else(|| StoreError::Corrupt(format!("post {} has no author", record.id)))?;

		Ok(Post {
			id: record.id,
			author_id: record.author_id,
			author_name: author.username.clone(),
			title: record.title.clone(),
			body: record.body.clone(),
			tags: record.tags.clone(),
			visible: record.visible,
			created_at: record.created_at,
			updated_at: record.updated_at,
		})
	}

	/// A creation time strictly after every previous one, so that ids and
	/// creation times always sort the same way.
	fn next_created_at(&mut self) -> DateTime<Utc> {
		let now = Utc::now();
		let created_at = match self.last_created_at {
			Some(last) if now <= last => last + chrono::Duration::microseconds(1),
			_ => now,
		};

		self.last_created_at = Some(created_at);
		created_at
	}

	fn user_mut(&mut self, id: Uuid) -> Result<&mut User, StoreError> {
		self.users.get_mut(&id).ok_or(StoreError::NotFound)
	}
}

/// A [`Store`] keeping everything in memory behind an async [`RwLock`].
#[derive(Default)]
pub struct MemoryStore {
	inner: RwLock<Inner>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl Store for MemoryStore {
	async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
		let mut inner = self.inner.write().await;

		if inner.users.values().any(|u| u.email == user.email) {
			return Err(StoreError::Conflict("email"));
		}

		if inner.users.values().any(|u| u.username == user.username) {
			return Err(StoreError::Conflict("username"));
		}

		let user = User {
			id: user.id,
			email: user.email,
			password: user.password,
			username: user.username,
			role: user.role,
			disabled: false,
			created_at: Utc::now(),
		};

		inner.users.insert(user.id, user.clone());

		Ok(user)
	}

	async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
		Ok(self.inner.read().await.users.get(&id).cloned())
	}

	async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
		let inner = self.inner.read().await;

		Ok(inner.users.values().find(|u| u.email == email).cloned())
	}

	async fn set_role(&self, id: Uuid, role: Role) -> Result<User, StoreError> {
		let mut inner = self.inner.write().await;
		let user = inner.user_mut(id)?;

		user.role = role;

		Ok(user.clone())
	}

	async fn disable_user(&self, id: Uuid) -> Result<User, StoreError> {
		let mut inner = self.inner.write().await;
		let user = inner.user_mut(id)?;

		user.disabled = true;

		let user = user.clone();
		inner.tokens.retain(|_, token| token.user_id != id);

		Ok(user)
	}

	async fn insert_token(&self, token: Token) -> Result<Token, StoreError> {
		let mut inner = self.inner.write().await;

		if !inner.users.contains_key(&token.user_id) {
			return Err(StoreError::NotFound);
		}

		if inner.tokens.contains_key(&token.token) {
			return Err(StoreError::Conflict("token"));
		}

		inner.tokens.insert(token.token.clone(), token.clone());

		Ok(token)
	}

	async fn token_by_value(&self, token: &str) -> Result<Option<(Token, User)>, StoreError> {
		let inner = self.inner.read().await;

		let Some(token) = inner.tokens.get(token) else {
			return Ok(None);
		};

		let user = inner
			.users
			.get(&token.user_id)
			.ok_or_else(|| StoreError::Corrupt("token has no user".into()))?;

		Ok(Some((token.clone(), user.clone())))
	}

	async fn tokens_by_user(&self, user_id: Uuid) -> Result<Vec<Token>, StoreError> {
		let inner = self.inner.read().await;
		let mut tokens = inner
			.tokens
			.values()
			.filter(|token| token.user_id == user_id)
			.cloned()
			.collect::<Vec<_>>();

		tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));

		Ok(tokens)
	}

	async fn delete_token(&self, token: &str) -> Result<bool, StoreError> {
		Ok(self.inner.write().await.tokens.remove(token).is_some())
	}

	async fn delete_user_tokens(&self, user_id: Uuid) -> Result<u64, StoreError> {
		let mut inner = self.inner.write().await;
		let before = inner.tokens.len();

		inner.tokens.retain(|_, token| token.user_id != user_id);

		Ok((before - inner.tokens.len()) as u64)
	}

	async fn insert_post(
		&self,
		author_id: Uuid,
		input: &CreatePostInput,
	) -> Result<Post, StoreError> {
		let mut inner = self.inner.write().await;

		if !inner.users.contains_key(&author_id) {
			return Err(StoreError::NotFound);
		}

		inner.next_post_id += 1;

		let record = PostRecord {
			id: inner.next_post_id,
			author_id,
			title: input.title.clone(),
			body: input.body.clone(),
			tags: input.tags.clone(),
			visible: input.visible,
			created_at: inner.next_created_at(),
			updated_at: None,
		};

		let post = inner.to_post(&record)?;
		inner.posts.insert(record.id, record);

		Ok(post)
	}

	async fn post_by_id(&self, id: i64) -> Result<Option<Post>, StoreError> {
		let inner = self.inner.read().await;

		inner
			.posts
			.get(&id)
			.map(|record| inner.to_post(record))
			.transpose()
	}

	async fn update_post(&self, id: i64, changes: &UpdatePostInput) -> Result<Post, StoreError> {
		let mut inner = self.inner.write().await;
		let record = inner.posts.get_mut(&id).ok_or(StoreError::NotFound)?;

		if let Some(title) = &changes.title {
			record.title.clone_from(title);
		}

		if let Some(body) = &changes.body {
			record.body.clone_from(body);
		}

		if let Some(tags) = &changes.tags {
			record.tags.clone_from(tags);
		}

		if let Some(visible) = changes.visible {
			record.visible = visible;
		}

		record.updated_at = Some(Utc::now());

		let record = &inner.posts[&id];
		inner.to_post(record)
	}

	async fn purge_post(&self, id: i64) -> Result<(), StoreError> {
		self.inner
			.write()
			.await
			.posts
			.remove(&id)
			.map(|_| ())
			.ok_or(StoreError::NotFound)
	}

	async fn query_posts(&self, spec: &QuerySpec) -> Result<Vec<Post>, StoreError> {
		let inner = self.inner.read().await;
		let mut posts = inner
			.posts
			.values()
			.map(|record| inner.to_post(record))
			.filter(|post| post.as_ref().map_or(true, |post| spec.matches(post)))
			.collect::<Result<Vec<_>, _>>()?;

		let sort = spec.sort();
		posts.sort_by(|a, b| sort.compare(a, b));

		let page = spec.page();

		Ok(posts
			.into_iter()
			.skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
			.take(usize::try_from(page.limit).unwrap_or(0))
			.collect())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn new_user(name: &str) -> NewUser {
		NewUser {
			id: Uuid::new_v4(),
			email: format!("{name}@example.com"),
			username: name.to_owned(),
			password: Vec::new(),
			role: Role::Standard,
		}
	}

	fn new_post(title: &str) -> CreatePostInput {
		CreatePostInput {
			title: title.to_owned(),
			body: "body".to_owned(),
			tags: Vec::new(),
			visible: true,
		}
	}

	#[tokio::test]
	async fn test_duplicate_users_conflict() {
		let store = MemoryStore::new();

		store.create_user(new_user("john")).await.unwrap();

		let mut duplicate = new_user("jane");
		duplicate.email = "john@example.com".into();
		assert!(matches!(
			store.create_user(duplicate).await,
			Err(StoreError::Conflict("email"))
		));

		let mut duplicate = new_user("john");
		duplicate.email = "other@example.com".into();
		assert!(matches!(
			store.create_user(duplicate).await,
			Err(StoreError::Conflict("username"))
		));
	}

	#[tokio::test]
	async fn test_post_ids_and_timestamps_increase_together() {
		let store = MemoryStore::new();
		let user = store.create_user(new_user("john")).await.unwrap();

		let mut previous: Option<Post> = None;

		for i in 0..20 {
			let post = store
				.insert_post(user.id, &new_post(&format!("post {i}")))
				.await
				.unwrap();

			if let Some(previous) = previous {
				assert!(post.id > previous.id);
				assert!(post.created_at > previous.created_at);
			}

			previous = Some(post);
		}
	}

	#[tokio::test]
	async fn test_post_for_unknown_author_is_rejected() {
		let store = MemoryStore::new();

		assert!(matches!(
			store.insert_post(Uuid::new_v4(), &new_post("orphan")).await,
			Err(StoreError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_update_keeps_id_and_author() {
		let store = MemoryStore::new();
		let user = store.create_user(new_user("john")).await.unwrap();
		let post = store.insert_post(user.id, &new_post("first")).await.unwrap();

		let updated = store
			.update_post(
				post.id,
				&UpdatePostInput {
					title: Some("second".into()),
					body: None,
					tags: Some(vec!["news".into()]),
					visible: None,
				},
			)
			.await
			.unwrap();

		assert_eq!(updated.id, post.id);
		assert_eq!(updated.author_id, user.id);
		assert_eq!(updated.title, "second");
		assert_eq!(updated.body, post.body);
		assert_eq!(updated.tags, ["news"]);
		assert!(updated.updated_at.is_some());
	}

	#[tokio::test]
	async fn test_purge_is_permanent() {
		let store = MemoryStore::new();
		let user = store.create_user(new_user("john")).await.unwrap();
		let post = store.insert_post(user.id, &new_post("first")).await.unwrap();

		store.purge_post(post.id).await.unwrap();

		assert!(store.post_by_id(post.id).await.unwrap().is_none());
		assert!(matches!(
			store.purge_post(post.id).await,
			Err(StoreError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_disable_user_revokes_tokens() {
		let store = MemoryStore::new();
		let user = store.create_user(new_user("john")).await.unwrap();

		store
			.insert_token(Token {
				token: "abc".into(),
				user_id: user.id,
				created_at: Utc::now(),
				expires_at: None,
			})
			.await
			.unwrap();

		let disabled = store.disable_user(user.id).await.unwrap();

		assert!(disabled.disabled);
		assert!(store.token_by_value("abc").await.unwrap().is_none());
		assert!(store.user_by_id(user.id).await.unwrap().is_some());
	}
}
