//! Translates raw filter, sort and pagination parameters into a validated [`QuerySpec`]
//! and runs it against the store.

use std::{cmp::Ordering, collections::HashSet, str::FromStr, sync::Arc};

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
	error::{ErrorShape, Message},
	post::Post,
	store::Store,
	token::Identity,
	Error,
};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
	#[error("unsupported filter {0:?}")]
	UnsupportedFilter(String),
	#[error("invalid value {value:?} for filter {key:?}")]
	InvalidFilter { key: String, value: String },
	#[error("unsupported sort: {0}")]
	UnsupportedSort(String),
	#[error("invalid pagination: {0}")]
	InvalidPagination(String),
}

impl QueryError {
	/// The error for a key that may only be given once but was repeated.
	fn repeated(key: &str, value: &str) -> Self {
		match key {
			"sort" | "order" | "asc" | "desc" => {
				Self::UnsupportedSort(format!("{key} was given more than once"))
			}
			"offset" | "limit" => {
				Self::InvalidPagination(format!("{key} was given more than once"))
			}
			_ => Self::InvalidFilter {
				key: key.to_owned(),
				value: value.to_owned(),
			},
		}
	}
}

impl ErrorShape for QueryError {
	fn status(&self) -> StatusCode {
		StatusCode::BAD_REQUEST
	}

	fn into_errors(self) -> Vec<Message> {
		match self {
			Self::UnsupportedFilter(key) => {
				Message::new("unsupported_filter").field(key).into_vec()
			}
			Self::InvalidFilter { key, value } => Message::new("invalid_filter")
				.field(key)
				.detail("value", value)
				.into_vec(),
			Self::UnsupportedSort(sort) => Message::new("unsupported_sort")
				.detail("sort", sort)
				.detail("allowed", SortKey::ALLOWED.to_vec())
				.into_vec(),
			Self::InvalidPagination(reason) => Message::new("invalid_pagination")
				.detail("reason", reason)
				.into_vec(),
		}
	}
}

/// A single predicate on posts. A post must match every filter of a [`QuerySpec`].
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
	Author(Uuid),
	AuthorName(String),
	Tag(String),
	/// Inclusive lower bound on the creation time.
	CreatedSince(DateTime<Utc>),
	/// Exclusive upper bound on the creation time.
	CreatedUntil(DateTime<Utc>),
	Visible(bool),
	/// Case-insensitive substring of the title, stored lowercase.
	TitleContains(String),
}

impl Filter {
	pub fn matches(&self, post: &Post) -> bool {
		match self {
			Self::Author(id) => post.author_id == *id,
			Self::AuthorName(name) => post.author_name == *name,
			Self::Tag(tag) => post.tags.contains(tag),
			Self::CreatedSince(since) => post.created_at >= *since,
			Self::CreatedUntil(until) => post.created_at < *until,
			Self::Visible(visible) => post.visible == *visible,
			Self::TitleContains(needle) => post.title.to_lowercase().contains(needle.as_str()),
		}
	}

	fn parse(key: &str, value: &str) -> Result<Self, QueryError> {
		let invalid = || QueryError::InvalidFilter {
			key: key.to_owned(),
			value: value.to_owned(),
		};
		let trimmed = value.trim();

		Ok(match key {
			"author" => Self::Author(Uuid::parse_str(trimmed).map_err(|_| invalid())?),
			"author_name" if !trimmed.is_empty() => Self::AuthorName(trimmed.to_owned()),
			"tag" if !trimmed.is_empty() => Self::Tag(trimmed.to_lowercase()),
			"since" => Self::CreatedSince(parse_timestamp(trimmed).ok_or_else(invalid)?),
			"until" => Self::CreatedUntil(parse_timestamp(trimmed).ok_or_else(invalid)?),
			"visible" => Self::Visible(trimmed.parse().map_err(|_| invalid())?),
			"search" if !trimmed.is_empty() => Self::TitleContains(trimmed.to_lowercase()),
			"author_name" | "tag" | "search" => return Err(invalid()),
			_ => return Err(QueryError::UnsupportedFilter(key.to_owned())),
		})
	}
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.ok()
		.map(|timestamp| timestamp.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
	CreatedAt,
	Title,
	Author,
}

impl SortKey {
	pub const ALLOWED: [&'static str; 3] = ["created_at", "title", "author"];

	/// The direction used when only the key is given.
	fn default_direction(self) -> Direction {
		match self {
			Self::CreatedAt => Direction::Desc,
			Self::Title | Self::Author => Direction::Asc,
		}
	}
}

impl FromStr for SortKey {
	type Err = QueryError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"created_at" | "creation_time" => Ok(Self::CreatedAt),
			"title" => Ok(Self::Title),
			"author" => Ok(Self::Author),
			other => Err(QueryError::UnsupportedSort(other.to_owned())),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	Asc,
	Desc,
}

impl FromStr for Direction {
	type Err = QueryError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"asc" => Ok(Self::Asc),
			"desc" => Ok(Self::Desc),
			other => Err(QueryError::UnsupportedSort(other.to_owned())),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
	pub key: SortKey,
	pub direction: Direction,
}

impl Default for Sort {
	fn default() -> Self {
		Self {
			key: SortKey::CreatedAt,
			direction: Direction::Desc,
		}
	}
}

impl Sort {
	/// Orders two posts by the sort key, breaking ties by ascending id.
	pub fn compare(&self, a: &Post, b: &Post) -> Ordering {
		let ordering = match self.key {
			SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
			SortKey::Title => a.title.cmp(&b.title),
			SortKey::Author => a.author_name.cmp(&b.author_name),
		};

		let ordering = match self.direction {
			Direction::Asc => ordering,
			Direction::Desc => ordering.reverse(),
		};

		ordering.then_with(|| a.id.cmp(&b.id))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
	pub offset: i64,
	pub limit: i64,
}

/// A validated, transient description of which posts to read and in what order.
///
/// Only a [`QueryEngine`] can build one, so every spec has passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
	filters: Vec<Filter>,
	sort: Sort,
	page: Page,
}

impl QuerySpec {
	pub fn filters(&self) -> &[Filter] {
		&self.filters
	}

	pub fn sort(&self) -> Sort {
		self.sort
	}

	pub fn page(&self) -> Page {
		self.page
	}

	pub fn matches(&self, post: &Post) -> bool {
		self.filters.iter().all(|filter| filter.matches(post))
	}

	/// Narrows the spec to what `identity` is allowed to see.
	fn scoped_to(mut self, identity: &Identity) -> Self {
		if !identity.is_admin() {
			self.filters.push(Filter::Visible(true));
		}

		self
	}
}

/// Page sizes accepted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
	pub default: i64,
	pub max: i64,
}

impl Default for PageLimits {
	fn default() -> Self {
		Self {
			default: DEFAULT_PAGE_SIZE,
			max: MAX_PAGE_SIZE,
		}
	}
}

#[derive(Clone)]
pub struct QueryEngine {
	store: Arc<dyn Store>,
	limits: PageLimits,
}

impl QueryEngine {
	pub fn new(store: Arc<dyn Store>, limits: PageLimits) -> Self {
		Self { store, limits }
	}

	/// The spec used when nothing is asked for: no filters, newest first, first page.
	pub fn default_spec(&self) -> QuerySpec {
		QuerySpec {
			filters: Vec::new(),
			sort: Sort::default(),
			page: Page {
				offset: 0,
				limit: self.limits.default,
			},
		}
	}

	/// Validates raw request parameters into a [`QuerySpec`].
	///
	/// Unknown keys are rejected rather than ignored, and a limit above the
	/// maximum page size is clamped to it. `tag` may be repeated to require
	/// every given tag. Any other repeated key is an error.
	pub fn build_and_validate(&self, params: &[(String, String)]) -> Result<QuerySpec, QueryError> {
		let mut spec = self.default_spec();
		let mut key = None;
		let mut direction = None;
		let mut shorthand = None;
		let mut seen = HashSet::new();

		for (name, value) in params {
			let value = value.trim();

			if !seen.insert(name.as_str()) && name != "tag" {
				return Err(QueryError::repeated(name, value));
			}

			match name.as_str() {
				"sort" => key = Some(value.parse::<SortKey>()?),
				"order" => direction = Some(value.parse::<Direction>()?),
				"asc" | "desc" => {
					if shorthand.is_some() {
						return Err(QueryError::UnsupportedSort(
							"both asc and desc were given".into(),
						));
					}

					let direction = name.parse::<Direction>()?;
					shorthand = Some(Sort {
						key: value.parse()?,
						direction,
					});
				}
				"offset" => spec.page.offset = self.offset(value)?,
				"limit" => spec.page.limit = self.limit(value)?,
				_ => spec.filters.push(Filter::parse(name, value)?),
			}
		}

		spec.sort = match (shorthand, key, direction) {
			(Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
				return Err(QueryError::UnsupportedSort(
					"asc/desc cannot be combined with sort/order".into(),
				))
			}
			(Some(sort), None, None) => sort,
			(None, Some(key), direction) => Sort {
				key,
				direction: direction.unwrap_or_else(|| key.default_direction()),
			},
			(None, None, Some(direction)) => Sort {
				key: SortKey::CreatedAt,
				direction,
			},
			(None, None, None) => Sort::default(),
		};

		Ok(spec)
	}

	fn offset(&self, value: &str) -> Result<i64, QueryError> {
		let offset = value.parse::<i64>().map_err(|_| {
			QueryError::InvalidPagination(format!("offset {value:?} is not a number"))
		})?;

		if offset < 0 {
			return Err(QueryError::InvalidPagination(
				"offset must not be negative".into(),
			));
		}

		Ok(offset)
	}

	fn limit(&self, value: &str) -> Result<i64, QueryError> {
		let limit = value.parse::<i64>().map_err(|_| {
			QueryError::InvalidPagination(format!("limit {value:?} is not a number"))
		})?;

		if limit < 1 {
			return Err(QueryError::InvalidPagination(
				"limit must be at least 1".into(),
			));
		}

		Ok(limit.min(self.limits.max))
	}

	/// Runs the spec as `identity`. Non-admins only ever receive visible posts,
	/// whatever filters the spec carries.
	#[tracing::instrument(skip(self, spec), fields(user = %identity.user_id()))]
	pub async fn execute(&self, identity: &Identity, spec: QuerySpec) -> Result<Vec<Post>, Error> {
		let spec = spec.scoped_to(identity);
		let posts = self.store.query_posts(&spec).await?;

		tracing::debug!(count = posts.len(), "executed post query");

		Ok(posts)
	}
}
