use async_trait::async_trait;
use schreibstube_common::model::{
    Id, ModelValidationError,
    auth::{AccessTokenHash, Credential, NewCredential},
    comment::{Comment, NewComment},
    group::{CreateGroup, Group, GroupMarker, GroupSlug},
    post::{NewPost, Post, PostChanges, PostMarker},
    user::{CreateUser, User, UserMarker, Username},
};
use std::fmt::Debug;
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("A {0} with the same unique key already exists")]
    UniqueViolation(&'static str),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Which posts a listing covers.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostFilter {
    All,
    Group(Id<GroupMarker>),
    Author(Id<UserMarker>),
    /// Posts by every author the given user follows.
    FollowedBy(Id<UserMarker>),
}

/// Storage for the whole blog.
///
/// Post listings are always ordered newest first, ties broken by the higher id.
#[async_trait]
pub trait Repository: Debug + Send + Sync {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>>;

    /// Registers a user together with their first access token.
    async fn create_user(&self, user: &CreateUser, credential: &NewCredential) -> Result<User>;

    async fn fetch_credential(&self, token_hash: &AccessTokenHash) -> Result<Option<Credential>>;

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>>;

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>>;

    async fn create_group(&self, group: &CreateGroup) -> Result<Group>;

    async fn count_posts(&self, filter: PostFilter) -> Result<u64>;

    async fn list_posts(&self, filter: PostFilter, limit: u64, offset: u64) -> Result<Vec<Post>>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    async fn create_post(&self, post: &NewPost) -> Result<Post>;

    /// Applies `changes` if the post exists and is written by `author`.
    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        changes: &PostChanges,
    ) -> Result<Option<Post>>;

    /// Deletes a post and its comments. Returns whether the post existed.
    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;

    /// Comments on a post, oldest first.
    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment>;

    async fn follow_exists(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool>;

    /// Returns whether a new edge was stored.
    async fn insert_follow(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool>;

    /// Returns whether an edge was removed.
    async fn delete_follow(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool>;
}
