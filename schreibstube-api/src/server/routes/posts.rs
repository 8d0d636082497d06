use crate::{
    feed::{FeedComposer, PostDetail},
    media::MediaStore,
    server::{
        Result, ServerError, ServerRouter,
        auth::SignedIn,
        extract::Form,
        form::{CommentSubmission, PostFormView, PostSubmission, ValidatedPost},
        json::Json,
        routes::feeds::ProfilePath,
    },
};
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use schreibstube_common::model::{
    Id,
    comment::NewComment,
    post::{NewPost, PostChanges, PostMarker},
    text::Text,
    user::Username,
};
use schreibstube_db::Repository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(post_detail)
        .typed_get(post_create_form)
        .typed_post(post_create)
        .typed_get(post_edit_form)
        .typed_post(post_edit)
        .typed_post(add_comment)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct PostDetailView {
    #[serde(flatten)]
    detail: PostDetail,
    form: CommentSubmission,
}

fn profile_redirect(username: Username) -> Response {
    Redirect::to(&ProfilePath { username }.to_string()).into_response()
}

fn detail_redirect(id: Id<PostMarker>) -> Response {
    Redirect::to(&PostDetailPath { id }.to_string()).into_response()
}

/// Writes the uploaded image, if any, and returns its stored path.
async fn store_image(media: &MediaStore, post: &ValidatedPost) -> Result<Option<String>> {
    Ok(match &post.image {
        Some(image) => Some(media.store_post_image(image).await?),
        None => None,
    })
}

/// Removes an image stored for a write that did not happen.
async fn discard_image(media: &MediaStore, image: Option<&str>) {
    let Some(image) = image else {
        return;
    };
    match media.remove(image).await {
        Ok(()) => debug!(path = %image, "Discarded unused post image"),
        Err(error) => warn!(path = %image, %error, "Failed to discard unused post image"),
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/", rejection(ServerError))]
struct PostDetailPath {
    id: Id<PostMarker>,
}

async fn post_detail(
    PostDetailPath { id }: PostDetailPath,
    State(repository): State<Arc<dyn Repository>>,
) -> Result<Json<PostDetailView>> {
    let detail = FeedComposer::new(repository.as_ref())
        .post_detail(id)
        .await?;

    Ok(Json(PostDetailView {
        detail,
        form: CommentSubmission::default(),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/create/", rejection(ServerError))]
struct PostCreatePath();

async fn post_create_form(
    PostCreatePath(): PostCreatePath,
    SignedIn(_): SignedIn,
) -> Json<PostFormView> {
    Json(PostFormView::create())
}

async fn post_create(
    PostCreatePath(): PostCreatePath,
    State(repository): State<Arc<dyn Repository>>,
    State(media): State<Arc<MediaStore>>,
    SignedIn(author): SignedIn,
    submission: PostSubmission,
) -> Result<Response> {
    let post = match submission.validate(repository.as_ref()).await? {
        Ok(post) => post,
        Err(errors) => {
            debug!(?errors, "Rejected post submission");
            return Ok(
                Json(PostFormView::rejected(false, submission, None, errors)).into_response(),
            );
        }
    };

    let image = store_image(&media, &post).await?;
    let new_post = NewPost {
        author: author.id,
        text: post.text,
        group: post.group,
        image,
    };
    let post = match repository.create_post(&new_post).await {
        Ok(post) => post,
        Err(error) => {
            discard_image(&media, new_post.image.as_deref()).await;
            return Err(error.into());
        }
    };
    info!(post = %post.id, author = %author.username, "Created post");

    Ok(profile_redirect(author.username))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/edit/", rejection(ServerError))]
struct PostEditPath {
    id: Id<PostMarker>,
}

async fn post_edit_form(
    PostEditPath { id }: PostEditPath,
    State(repository): State<Arc<dyn Repository>>,
    SignedIn(user): SignedIn,
) -> Result<Response> {
    let post = repository
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    if post.author.id != user.id {
        debug!(post = %id, user = %user.username, "Non-author asked for the edit form");
        return Ok(detail_redirect(id));
    }

    Ok(Json(PostFormView::edit(&post)).into_response())
}

async fn post_edit(
    PostEditPath { id }: PostEditPath,
    State(repository): State<Arc<dyn Repository>>,
    State(media): State<Arc<MediaStore>>,
    SignedIn(user): SignedIn,
    submission: PostSubmission,
) -> Result<Response> {
    let current = repository
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    if current.author.id != user.id {
        debug!(post = %id, user = %user.username, "Non-author tried to edit a post");
        return Ok(detail_redirect(id));
    }

    let post = match submission.validate(repository.as_ref()).await? {
        Ok(post) => post,
        Err(errors) => {
            debug!(?errors, post = %id, "Rejected post edit");
            return Ok(Json(PostFormView::rejected(
                true,
                submission,
                current.image,
                errors,
            ))
            .into_response());
        }
    };

    let image = store_image(&media, &post).await?;
    let changes = PostChanges {
        text: post.text,
        group: post.group,
        image,
    };
    // The author check is repeated inside the update itself.
    match repository.update_post(id, user.id, &changes).await {
        Ok(Some(_)) => info!(post = %id, "Edited post"),
        Ok(None) => {
            debug!(post = %id, "Post vanished before the edit");
            discard_image(&media, changes.image.as_deref()).await;
        }
        Err(error) => {
            discard_image(&media, changes.image.as_deref()).await;
            return Err(error.into());
        }
    }

    Ok(detail_redirect(id))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comment/", rejection(ServerError))]
struct AddCommentPath {
    id: Id<PostMarker>,
}

async fn add_comment(
    AddCommentPath { id }: AddCommentPath,
    State(repository): State<Arc<dyn Repository>>,
    SignedIn(author): SignedIn,
    Form(CommentSubmission { text }): Form<CommentSubmission>,
) -> Result<Response> {
    if repository.fetch_post(id).await?.is_none() {
        return Err(ServerError::PostByIdNotFound(id));
    }

    match Text::new(text) {
        Ok(text) => {
            let comment = repository
                .create_comment(&NewComment {
                    post: id,
                    author: author.id,
                    text,
                })
                .await?;
            info!(comment = %comment.id, post = %id, "Added comment");
        }
        Err(_) => debug!(post = %id, "Ignored blank comment"),
    }

    Ok(detail_redirect(id))
}
