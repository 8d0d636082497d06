//! Repository kept entirely in process memory.
//!
//! Every operation runs under a single lock, which gives the same all-or-nothing behavior
//! the PostgreSQL repository gets from its statements and transactions.

use crate::repository::{DbError, PostFilter, Repository, Result};
use async_trait::async_trait;
use schreibstube_common::{
    clock::{Clock, SystemClock},
    model::{
        Id,
        auth::{AccessTokenHash, Credential, NewCredential},
        comment::{Comment, CommentMarker, NewComment},
        group::{CreateGroup, Group, GroupMarker, GroupSlug},
        post::{NewPost, Post, PostChanges, PostMarker},
        text::Text,
        user::{CreateUser, User, UserMarker, Username},
    },
};
use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};
use time::OffsetDateTime;
use tracing::warn;

#[derive(Clone, Debug)]
struct PostRow {
    id: Id<PostMarker>,
    text: Text,
    created_at: OffsetDateTime,
    author: Id<UserMarker>,
    group: Option<Id<GroupMarker>>,
    image: Option<String>,
}

#[derive(Clone, Debug)]
struct CommentRow {
    id: Id<CommentMarker>,
    post: Id<PostMarker>,
    author: Id<UserMarker>,
    text: Text,
    created_at: OffsetDateTime,
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    users: BTreeMap<Id<UserMarker>, User>,
    credentials: HashMap<AccessTokenHash, Credential>,
    groups: BTreeMap<Id<GroupMarker>, Group>,
    posts: BTreeMap<Id<PostMarker>, PostRow>,
    comments: Vec<CommentRow>,
    /// `(follower, author)` edges.
    follows: BTreeSet<(Id<UserMarker>, Id<UserMarker>)>,
}

#[derive(Debug)]
pub struct MemoryRepository {
    clock: Arc<dyn Clock>,
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Uses `clock` for the creation time of posts and comments.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn state(&self, op: &'static str) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!(op, "Recovered from poisoned repository lock");
            poisoned.into_inner()
        })
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryState {
    fn next_id<Marker>(&mut self) -> Id<Marker> {
        self.last_id += 1;
        Id::new(self.last_id)
    }

    fn matches(&self, row: &PostRow, filter: PostFilter) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => row.group == Some(group_id),
            PostFilter::Author(author_id) => row.author == author_id,
            PostFilter::FollowedBy(follower_id) => {
                self.follows.contains(&(follower_id, row.author))
            }
        }
    }

    fn user(&self, user_id: Id<UserMarker>) -> Result<User> {
        self.users
            .get(&user_id)
            .cloned()
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))
    }

    fn hydrate_post(&self, row: &PostRow) -> Result<Post> {
        Ok(Post {
            id: row.id,
            text: row.text.clone(),
            created_at: row.created_at,
            author: self.user(row.author)?,
            group: row
                .group
                .and_then(|group_id| self.groups.get(&group_id).cloned()),
            image: row.image.clone(),
        })
    }

    fn hydrate_comment(&self, row: &CommentRow) -> Result<Comment> {
        Ok(Comment {
            id: row.id,
            post: row.post,
            author: self.user(row.author)?,
            text: row.text.clone(),
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.state("fetch_user").users.get(&user_id).cloned())
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        let state = self.state("fetch_user_by_username");
        let user = state
            .users
            .values()
            .find(|user| &user.username == username)
            .cloned();
        Ok(user)
    }

    async fn create_user(&self, user: &CreateUser, credential: &NewCredential) -> Result<User> {
        let mut state = self.state("create_user");
        if state
            .users
            .values()
            .any(|existing| existing.username == user.username)
        {
            return Err(DbError::UniqueViolation("user"));
        }

        let created = User {
            id: state.next_id(),
            username: user.username.clone(),
        };
        state.users.insert(created.id, created.clone());
        state.credentials.insert(
            credential.token_hash.clone(),
            Credential {
                user: created.id,
                token_hash: credential.token_hash.clone(),
                created_at: credential.created_at,
                expires_at: credential.expires_at,
            },
        );

        Ok(created)
    }

    async fn fetch_credential(&self, token_hash: &AccessTokenHash) -> Result<Option<Credential>> {
        Ok(self
            .state("fetch_credential")
            .credentials
            .get(token_hash)
            .cloned())
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        Ok(self.state("fetch_group").groups.get(&group_id).cloned())
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let state = self.state("fetch_group_by_slug");
        let group = state
            .groups
            .values()
            .find(|group| &group.slug == slug)
            .cloned();
        Ok(group)
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let mut state = self.state("create_group");
        if state
            .groups
            .values()
            .any(|existing| existing.slug == group.slug)
        {
            return Err(DbError::UniqueViolation("group"));
        }

        let created = Group {
            id: state.next_id(),
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        };
        state.groups.insert(created.id, created.clone());

        Ok(created)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let state = self.state("count_posts");
        let count = state
            .posts
            .values()
            .filter(|row| state.matches(row, filter))
            .count();

        Ok(count as u64)
    }

    async fn list_posts(&self, filter: PostFilter, limit: u64, offset: u64) -> Result<Vec<Post>> {
        let state = self.state("list_posts");
        let mut rows: Vec<&PostRow> = state
            .posts
            .values()
            .filter(|row| state.matches(row, filter))
            .collect();
        rows.sort_by_key(|row| Reverse((row.created_at, row.id)));

        rows.into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|row| state.hydrate_post(row))
            .collect()
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let state = self.state("fetch_post");
        state
            .posts
            .get(&post_id)
            .map(|row| state.hydrate_post(row))
            .transpose()
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let created_at = self.clock.now();
        let mut state = self.state("create_post");

        let row = PostRow {
            id: state.next_id(),
            text: post.text.clone(),
            created_at,
            author: post.author,
            group: post.group,
            image: post.image.clone(),
        };
        let created = state.hydrate_post(&row)?;
        state.posts.insert(row.id, row);

        Ok(created)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        changes: &PostChanges,
    ) -> Result<Option<Post>> {
        let mut state = self.state("update_post");
        let Some(row) = state
            .posts
            .get_mut(&post_id)
            .filter(|row| row.author == author)
        else {
            return Ok(None);
        };

        row.text = changes.text.clone();
        row.group = changes.group;
        if let Some(image) = &changes.image {
            row.image = Some(image.clone());
        }
        let row = row.clone();

        state.hydrate_post(&row).map(Some)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let mut state = self.state("delete_post");
        let existed = state.posts.remove(&post_id).is_some();
        state.comments.retain(|comment| comment.post != post_id);

        Ok(existed)
    }

    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let state = self.state("list_comments");
        state
            .comments
            .iter()
            .filter(|row| row.post == post_id)
            .map(|row| state.hydrate_comment(row))
            .collect()
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        let created_at = self.clock.now();
        let mut state = self.state("create_comment");
        if !state.posts.contains_key(&comment.post) {
            return Err(DbError::Sqlx(sqlx::Error::RowNotFound));
        }

        let row = CommentRow {
            id: state.next_id(),
            post: comment.post,
            author: comment.author,
            text: comment.text.clone(),
            created_at,
        };
        let created = state.hydrate_comment(&row)?;
        state.comments.push(row);

        Ok(created)
    }

    async fn follow_exists(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        Ok(self
            .state("follow_exists")
            .follows
            .contains(&(follower, author)))
    }

    async fn insert_follow(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        if follower == author {
            return Ok(false);
        }
        Ok(self
            .state("insert_follow")
            .follows
            .insert((follower, author)))
    }

    async fn delete_follow(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        Ok(self
            .state("delete_follow")
            .follows
            .remove(&(follower, author)))
    }
}
