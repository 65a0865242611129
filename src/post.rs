use chrono::{DateTime, Utc};
use macros::model;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::token::Identity;

/// These can be removed when [`serde`] supports
/// literal defaults: <https://github.com/serde-rs/serde/issues/368>
#[inline]
fn yes() -> bool {
	true
}

/// A single post, created by a user.
#[model]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema, Validate)]
pub struct Post {
	/// The unique identifier of the post. Increases with creation time.
	#[serde(skip_deserializing)]
	pub id: i64,
	/// The user that created the post.
	#[serde(skip_deserializing)]
	pub author_id: Uuid,
	/// The username of the user that created the post.
	#[serde(skip_deserializing)]
	pub author_name: String,
	/// The title of the post.
	#[validate(length(min = 3, max = 128))]
	pub title: String,
	/// The content of the post in Markdown format.
	pub body: String,
	/// Lowercase tags used to categorize the post.
	#[serde(default)]
	#[validate(length(max = 16))]
	pub tags: Vec<String>,
	/// Whether the post is published. Hidden posts are only shown to admins.
	#[model(default = "yes")]
	pub visible: bool,
	/// The creation time of the post.
	#[serde(skip_deserializing)]
	pub created_at: DateTime<Utc>,
	/// The time of the last update, if the post was ever updated.
	#[serde(skip_deserializing)]
	pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
	/// Whether `identity` is allowed to see this post at all.
	pub fn is_visible_to(&self, identity: &Identity) -> bool {
		self.visible || identity.is_admin()
	}

	/// Whether `identity` is allowed to update or hide this post.
	pub fn is_modifiable_by(&self, identity: &Identity) -> bool {
		identity.is_admin() || self.author_id == identity.user_id()
	}
}

/// Trims, lowercases and de-duplicates tags, keeping their first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
	let mut normalized: Vec<String> = Vec::with_capacity(tags.len());

	for tag in tags {
		let tag = tag.trim().to_lowercase();

		if !tag.is_empty() && !normalized.contains(&tag) {
			normalized.push(tag);
		}
	}

	normalized
}

impl CreatePostInput {
	pub fn normalized(mut self) -> Self {
		self.tags = normalize_tags(self.tags);
		self
	}
}

impl UpdatePostInput {
	pub fn normalized(mut self) -> Self {
		self.tags = self.tags.map(normalize_tags);
		self
	}

	/// The changes applied by a logical delete.
	pub fn hide() -> Self {
		Self {
			title: None,
			body: None,
			tags: None,
			visible: Some(false),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.title.is_none() && self.body.is_none() && self.tags.is_none() && self.visible.is_none()
	}
}
