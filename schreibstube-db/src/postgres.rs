use crate::{
    record::{CommentRecord, CredentialRecord, GroupRecord, PostRecord, UserRecord},
    repository::{DbError, PostFilter, Repository, Result},
};
use async_trait::async_trait;
use schreibstube_common::model::{
    Id,
    auth::{AccessTokenHash, Credential, NewCredential},
    comment::{Comment, NewComment},
    group::{CreateGroup, Group, GroupMarker, GroupSlug},
    post::{NewPost, Post, PostChanges, PostMarker},
    user::{CreateUser, User, UserMarker, Username},
};
use sqlx::{PgPool, Postgres, QueryBuilder, query, query_as, query_scalar};
use tracing::debug;

const POST_COLUMNS: &str = "
    SELECT
        posts.post_id,
        posts.text,
        posts.created_at,
        posts.image,
        users.user_id,
        users.username,
        groups.group_id,
        groups.title AS group_title,
        groups.slug AS group_slug,
        groups.description AS group_description
";

const POST_JOINS: &str = "
    JOIN users.users ON users.user_id = posts.author_id
    LEFT JOIN posts.groups ON groups.group_id = posts.group_id
";

#[derive(Clone, Debug)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: PostFilter) {
    match filter {
        PostFilter::All => {}
        PostFilter::Group(group_id) => {
            builder.push(" WHERE posts.group_id = ").push_bind(group_id.get());
        }
        PostFilter::Author(author_id) => {
            builder
                .push(" WHERE posts.author_id = ")
                .push_bind(author_id.get());
        }
        PostFilter::FollowedBy(follower_id) => {
            builder
                .push(
                    " WHERE posts.author_id IN (
                        SELECT follows.author_id FROM posts.follows
                        WHERE follows.follower_id = ",
                )
                .push_bind(follower_id.get())
                .push(")");
        }
    }
}

fn unique_violation(err: sqlx::Error, entity: &'static str) -> DbError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => DbError::UniqueViolation(entity),
        _ => DbError::Sqlx(err),
    }
}

fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl Repository for PgRepository {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT users.user_id, users.username
            FROM users.users
            WHERE users.user_id = $1
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_user_by_username(&self, username: &Username) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT users.user_id, users.username
            FROM users.users
            WHERE users.username = $1
            ",
        )
        .bind(username.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn create_user(&self, user: &CreateUser, credential: &NewCredential) -> Result<User> {
        let mut transaction = self.pool.begin().await?;

        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (username)
            VALUES ($1)
            RETURNING users.user_id, users.username
            ",
        )
        .bind(user.username.get())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|err| unique_violation(err, "user"))?;

        query(
            "
            INSERT INTO users.credentials (token_hash, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(credential.token_hash.0.as_slice())
        .bind(record.user_id)
        .bind(credential.created_at)
        .bind(credential.expires_at)
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;

        debug!(user_id = record.user_id, "Registered user");
        Ok(User::try_from(record)?)
    }

    async fn fetch_credential(&self, token_hash: &AccessTokenHash) -> Result<Option<Credential>> {
        let record = query_as::<_, CredentialRecord>(
            "
            SELECT
                credentials.user_id,
                credentials.token_hash,
                credentials.created_at,
                credentials.expires_at
            FROM users.credentials
            WHERE credentials.token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let credential = record.map(Credential::try_from).transpose()?;
        Ok(credential)
    }

    async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT groups.group_id, groups.title, groups.slug, groups.description
            FROM posts.groups
            WHERE groups.group_id = $1
            ",
        )
        .bind(group_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn fetch_group_by_slug(&self, slug: &GroupSlug) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT groups.group_id, groups.title, groups.slug, groups.description
            FROM posts.groups
            WHERE groups.slug = $1
            ",
        )
        .bind(slug.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let record = query_as::<_, GroupRecord>(
            "
            INSERT INTO posts.groups (title, slug, description)
            VALUES ($1, $2, $3)
            RETURNING groups.group_id, groups.title, groups.slug, groups.description
            ",
        )
        .bind(&group.title)
        .bind(group.slug.get())
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| unique_violation(err, "group"))?;

        Ok(Group::try_from(record)?)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts.posts");
        push_filter(&mut builder, filter);

        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok(count.try_into().unwrap_or_default())
    }

    async fn list_posts(&self, filter: PostFilter, limit: u64, offset: u64) -> Result<Vec<Post>> {
        let mut builder = QueryBuilder::<Postgres>::new(POST_COLUMNS);
        builder.push(" FROM posts.posts").push(POST_JOINS);
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY posts.created_at DESC, posts.post_id DESC LIMIT ")
            .push_bind(to_sql_count(limit))
            .push(" OFFSET ")
            .push_bind(to_sql_count(offset));

        let records: Vec<PostRecord> = builder.build_query_as().fetch_all(&self.pool).await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(&format!(
            "{POST_COLUMNS} FROM posts.posts {POST_JOINS} WHERE posts.post_id = $1"
        ))
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let record = query_as::<_, PostRecord>(&format!(
            "
            WITH inserted AS (
                INSERT INTO posts.posts (text, author_id, group_id, image)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            {POST_COLUMNS} FROM inserted AS posts {POST_JOINS}
            "
        ))
        .bind(post.text.get())
        .bind(post.author.get())
        .bind(post.group.map(Id::get))
        .bind(post.image.as_deref())
        .fetch_one(&self.pool)
        .await?;

        Ok(Post::try_from(record)?)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        changes: &PostChanges,
    ) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(&format!(
            "
            WITH updated AS (
                UPDATE posts.posts
                SET text = $3, group_id = $4, image = COALESCE($5, posts.image)
                WHERE posts.post_id = $1 AND posts.author_id = $2
                RETURNING *
            )
            {POST_COLUMNS} FROM updated AS posts {POST_JOINS}
            "
        ))
        .bind(post_id.get())
        .bind(author.get())
        .bind(changes.text.get())
        .bind(changes.group.map(Id::get))
        .bind(changes.image.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts.posts WHERE posts.post_id = $1")
            .bind(post_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.comment_id,
                comments.post_id,
                comments.text,
                comments.created_at,
                users.user_id,
                users.username
            FROM posts.comments
            JOIN users.users ON users.user_id = comments.author_id
            WHERE comments.post_id = $1
            ORDER BY comments.created_at, comments.comment_id
            ",
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        let record = query_as::<_, CommentRecord>(
            "
            WITH inserted AS (
                INSERT INTO posts.comments (post_id, author_id, text)
                VALUES ($1, $2, $3)
                RETURNING *
            )
            SELECT
                inserted.comment_id,
                inserted.post_id,
                inserted.text,
                inserted.created_at,
                users.user_id,
                users.username
            FROM inserted
            JOIN users.users ON users.user_id = inserted.author_id
            ",
        )
        .bind(comment.post.get())
        .bind(comment.author.get())
        .bind(comment.text.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(Comment::try_from(record)?)
    }

    async fn follow_exists(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        let exists = query_scalar::<_, bool>(
            "
            SELECT EXISTS (
                SELECT 1 FROM posts.follows
                WHERE follows.follower_id = $1 AND follows.author_id = $2
            )
            ",
        )
        .bind(follower.get())
        .bind(author.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_follow(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        let result = query(
            "
            INSERT INTO posts.follows (follower_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(follower.get())
        .bind(author.get())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_follow(
        &self,
        follower: Id<UserMarker>,
        author: Id<UserMarker>,
    ) -> Result<bool> {
        let result = query(
            "
            DELETE FROM posts.follows
            WHERE follows.follower_id = $1 AND follows.author_id = $2
            ",
        )
        .bind(follower.get())
        .bind(author.get())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
