use crate::{
    feed::{FeedComposer, GroupFeed, ProfileFeed},
    server::{
        Result, ServerError, ServerRouter,
        auth::{Actor, SignedIn},
        extract::{PageQuery, Query},
        json::{Json, RenderedJson},
    },
};
use axum::{body::Bytes, extract::State};
use axum_extra::routing::{RouterExt, TypedPath};
use schreibstube_common::{
    cache::PageCache,
    model::{group::GroupSlug, post::Post, user::Username},
    pagination::{Page, requested_page},
};
use schreibstube_db::Repository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const INDEX_CACHE_PREFIX: &str = "index_page";

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(index)
        .typed_get(group_posts)
        .typed_get(profile)
        .typed_get(follow_index)
}

/// A plain list of posts, as on the home and following pages.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct FeedView {
    page_obj: Page<Post>,
}

/// Cache key of one home page, built from the normalized page number so that equivalent
/// `?page=` spellings share a snapshot. Invalid and missing values are page one.
fn index_cache_key(page: Option<&str>) -> String {
    match requested_page(page) {
        1 => INDEX_CACHE_PREFIX.to_owned(),
        number => format!("{INDEX_CACHE_PREFIX}?page={number}"),
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(ServerError))]
struct IndexPath();

async fn index(
    IndexPath(): IndexPath,
    State(repository): State<Arc<dyn Repository>>,
    State(cache): State<Arc<PageCache<Bytes>>>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<RenderedJson> {
    let key = index_cache_key(page.as_deref());
    if let Some(body) = cache.get(&key) {
        debug!(%key, "Serving home page from cache");
        return Ok(RenderedJson(body));
    }

    let page_obj = FeedComposer::new(repository.as_ref())
        .home(page.as_deref())
        .await?;
    let rendered = RenderedJson::render(&FeedView { page_obj })?;

    debug!(%key, ttl = %cache.ttl(), "Caching rendered home page");
    cache.insert(key, rendered.0.clone());

    Ok(rendered)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(ServerError))]
struct GroupPostsPath {
    slug: GroupSlug,
}

async fn group_posts(
    GroupPostsPath { slug }: GroupPostsPath,
    State(repository): State<Arc<dyn Repository>>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<GroupFeed>> {
    let feed = FeedComposer::new(repository.as_ref())
        .group(&slug, page.as_deref())
        .await?;

    Ok(Json(feed))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/", rejection(ServerError))]
pub(crate) struct ProfilePath {
    pub(crate) username: Username,
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    State(repository): State<Arc<dyn Repository>>,
    Actor(viewer): Actor,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<ProfileFeed>> {
    let feed = FeedComposer::new(repository.as_ref())
        .profile(&username, viewer.as_ref(), page.as_deref())
        .await?;

    Ok(Json(feed))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follow/", rejection(ServerError))]
struct FollowIndexPath();

async fn follow_index(
    FollowIndexPath(): FollowIndexPath,
    State(repository): State<Arc<dyn Repository>>,
    SignedIn(reader): SignedIn,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Json<FeedView>> {
    let page_obj = FeedComposer::new(repository.as_ref())
        .following(&reader, page.as_deref())
        .await?;

    Ok(Json(FeedView { page_obj }))
}

#[cfg(test)]
mod tests {
    use crate::server::routes::feeds::index_cache_key;

    #[test]
    fn pages_are_cached_separately() {
        assert_eq!(index_cache_key(None), "index_page");
        assert_eq!(index_cache_key(Some("2")), "index_page?page=2");
        assert_ne!(index_cache_key(Some("3")), index_cache_key(Some("2")));
    }

    #[test]
    fn equivalent_page_values_share_a_key() {
        for raw in ["02", " 2", "+2", "2 "] {
            assert_eq!(index_cache_key(Some(raw)), "index_page?page=2", "{raw:?}");
        }
        for raw in ["", "1", "01", "abc", "0", "-5", "2.5"] {
            assert_eq!(index_cache_key(Some(raw)), "index_page", "{raw:?}");
        }
    }
}
