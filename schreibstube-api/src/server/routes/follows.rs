use crate::{
    follow::{FollowGraph, FollowOutcome, UnfollowOutcome},
    server::{Result, ServerError, ServerRouter, auth::SignedIn, routes::feeds::ProfilePath},
};
use axum::{extract::State, response::Redirect};
use axum_extra::routing::{RouterExt, TypedPath};
use schreibstube_common::model::user::{User, Username};
use schreibstube_db::Repository;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(profile_follow)
        .typed_get(profile_unfollow)
}

async fn resolve_author(repository: &dyn Repository, username: &Username) -> Result<User> {
    repository
        .fetch_user_by_username(username)
        .await?
        .ok_or_else(|| ServerError::UserByUsernameNotFound(username.clone()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/follow/", rejection(ServerError))]
struct ProfileFollowPath {
    username: Username,
}

async fn profile_follow(
    ProfileFollowPath { username }: ProfileFollowPath,
    State(repository): State<Arc<dyn Repository>>,
    SignedIn(follower): SignedIn,
) -> Result<Redirect> {
    let author = resolve_author(repository.as_ref(), &username).await?;

    match FollowGraph::new(repository.as_ref())
        .follow(follower.id, author.id)
        .await?
    {
        FollowOutcome::Created => {
            info!(follower = %follower.username, author = %author.username, "Followed author");
        }
        outcome @ (FollowOutcome::AlreadyFollowing | FollowOutcome::SelfFollowRejected) => {
            debug!(
                ?outcome,
                follower = %follower.username,
                author = %author.username,
                "Follow had no effect"
            );
        }
    }

    Ok(Redirect::to(&ProfilePath { username }.to_string()))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/unfollow/", rejection(ServerError))]
struct ProfileUnfollowPath {
    username: Username,
}

async fn profile_unfollow(
    ProfileUnfollowPath { username }: ProfileUnfollowPath,
    State(repository): State<Arc<dyn Repository>>,
    SignedIn(follower): SignedIn,
) -> Result<Redirect> {
    let author = resolve_author(repository.as_ref(), &username).await?;

    match FollowGraph::new(repository.as_ref())
        .unfollow(follower.id, author.id)
        .await?
    {
        UnfollowOutcome::Removed => {
            info!(follower = %follower.username, author = %author.username, "Unfollowed author");
        }
        UnfollowOutcome::NotFollowing => {
            debug!(
                follower = %follower.username,
                author = %author.username,
                "Unfollow had no effect"
            );
        }
    }

    Ok(Redirect::to(&ProfilePath { username }.to_string()))
}
