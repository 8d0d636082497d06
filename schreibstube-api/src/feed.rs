//! Composition of the post lists shown on the public pages.

use crate::follow::FollowGraph;
use schreibstube_common::{
    model::{
        Id,
        comment::Comment,
        group::{Group, GroupSlug},
        post::{Post, PostMarker},
        user::{User, Username},
    },
    pagination::{Page, Paginator},
};
use schreibstube_db::{DbError, PostFilter, Repository};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Group with slug {0} was not found.")]
    GroupNotFound(GroupSlug),
    #[error("User with username {0} was not found.")]
    AuthorNotFound(Username),
    #[error("Post with id {0} was not found.")]
    PostNotFound(Id<PostMarker>),
    #[error(transparent)]
    Database(#[from] DbError),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct GroupFeed {
    pub group: Group,
    #[serde(rename = "page_obj")]
    pub page: Page<Post>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct ProfileFeed {
    pub author: User,
    /// Whether the viewer follows `author`. Always false for anonymous viewers.
    pub following: bool,
    #[serde(rename = "page_obj")]
    pub page: Page<Post>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PostDetail {
    pub post: Post,
    pub author: User,
    /// How many posts the author has written in total.
    pub count_posts: u64,
    pub comments: Vec<Comment>,
}

#[derive(Copy, Clone, Debug)]
pub struct FeedComposer<'a> {
    repository: &'a dyn Repository,
    paginator: Paginator,
}

impl<'a> FeedComposer<'a> {
    #[must_use]
    pub fn new(repository: &'a dyn Repository) -> Self {
        Self::with_paginator(repository, Paginator::default())
    }

    #[must_use]
    pub fn with_paginator(repository: &'a dyn Repository, paginator: Paginator) -> Self {
        Self {
            repository,
            paginator,
        }
    }

    pub async fn home(&self, page: Option<&str>) -> Result<Page<Post>, FeedError> {
        Ok(self.paginate(PostFilter::All, page).await?)
    }

    pub async fn group(&self, slug: &GroupSlug, page: Option<&str>) -> Result<GroupFeed, FeedError> {
        let group = self
            .repository
            .fetch_group_by_slug(slug)
            .await?
            .ok_or_else(|| FeedError::GroupNotFound(slug.clone()))?;
        let page = self.paginate(PostFilter::Group(group.id), page).await?;

        Ok(GroupFeed { group, page })
    }

    pub async fn profile(
        &self,
        username: &Username,
        viewer: Option<&User>,
        page: Option<&str>,
    ) -> Result<ProfileFeed, FeedError> {
        let author = self
            .repository
            .fetch_user_by_username(username)
            .await?
            .ok_or_else(|| FeedError::AuthorNotFound(username.clone()))?;

        let following = match viewer {
            Some(viewer) => {
                FollowGraph::new(self.repository)
                    .is_following(viewer.id, author.id)
                    .await?
            }
            None => false,
        };
        let page = self.paginate(PostFilter::Author(author.id), page).await?;

        Ok(ProfileFeed {
            author,
            following,
            page,
        })
    }

    /// Posts by every author `reader` follows.
    pub async fn following(&self, reader: &User, page: Option<&str>) -> Result<Page<Post>, FeedError> {
        Ok(self.paginate(PostFilter::FollowedBy(reader.id), page).await?)
    }

    pub async fn post_detail(&self, post_id: Id<PostMarker>) -> Result<PostDetail, FeedError> {
        let post = self
            .repository
            .fetch_post(post_id)
            .await?
            .ok_or(FeedError::PostNotFound(post_id))?;
        let count_posts = self
            .repository
            .count_posts(PostFilter::Author(post.author.id))
            .await?;
        let comments = self.repository.list_comments(post_id).await?;

        Ok(PostDetail {
            author: post.author.clone(),
            post,
            count_posts,
            comments,
        })
    }

    async fn paginate(&self, filter: PostFilter, page: Option<&str>) -> Result<Page<Post>, DbError> {
        let count = self.repository.count_posts(filter).await?;
        let window = self.paginator.locate(count, page);
        let posts = self
            .repository
            .list_posts(filter, window.limit(), window.offset())
            .await?;

        Ok(window.into_page(posts))
    }
}
