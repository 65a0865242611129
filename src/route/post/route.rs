use aide::axum::IntoApiResponse;
use axum::{extract::State, http::StatusCode};
use macros::route;

use crate::{
	error::AppError,
	extract::{Json, Path, Query, Session},
	gateway::Gateway,
	openapi::tag,
	post::{CreatePostInput, Post, UpdatePostInput},
	route::model::{IdInput, PostQueryInput},
};

/// Get posts
/// Returns the posts matching the filters, sorted and paginated. Newest first unless a sort is given.
#[route(tag = tag::POST)]
pub async fn get_posts(
	State(gateway): State<Gateway>,
	session: Session,
	Query(query): Query<PostQueryInput>,
) -> Result<Json<Vec<Post>>, AppError> {
	Ok(Json(
		gateway.list_posts(&session.identity, &query.params).await?,
	))
}

/// Get single post
/// Returns a single post by its unique id.
#[route(tag = tag::POST)]
pub async fn get_post(
	State(gateway): State<Gateway>,
	session: Session,
	Path(path): Path<IdInput>,
) -> Result<Json<Post>, AppError> {
	Ok(Json(gateway.get_post(&session.identity, path.id).await?))
}

/// Create post
/// Creates a new post authored by the authenticated user.
#[route(tag = tag::POST, response(status = 201, description = "Post created.", shape = "Json<Post>"))]
pub async fn create_post(
	State(gateway): State<Gateway>,
	session: Session,
	Json(input): Json<CreatePostInput>,
) -> Result<impl IntoApiResponse, AppError> {
	let post = gateway.create_post(&session.identity, input).await?;

	Ok((StatusCode::CREATED, Json(post)))
}

/// Update post
/// Updates the given fields of one of your posts. Admins can update any post.
#[route(tag = tag::POST)]
pub async fn update_post(
	State(gateway): State<Gateway>,
	session: Session,
	Path(path): Path<IdInput>,
	Json(input): Json<UpdatePostInput>,
) -> Result<Json<Post>, AppError> {
	Ok(Json(
		gateway
			.update_post(&session.identity, path.id, input)
			.await?,
	))
}

/// Delete post
/// Hides one of your posts. Hidden posts are kept and stay visible to admins.
#[route(tag = tag::POST)]
pub async fn delete_post(
	State(gateway): State<Gateway>,
	session: Session,
	Path(path): Path<IdInput>,
) -> Result<Json<Post>, AppError> {
	Ok(Json(gateway.delete_post(&session.identity, path.id).await?))
}

/// Purge post
/// Permanently deletes a post. Admin only, this action is irreversible.
#[route(tag = tag::POST, response(status = 204, description = "Post purged."))]
pub async fn purge_post(
	State(gateway): State<Gateway>,
	session: Session,
	Path(path): Path<IdInput>,
) -> Result<StatusCode, AppError> {
	gateway.purge_post(&session.identity, path.id).await?;

	Ok(StatusCode::NO_CONTENT)
}
