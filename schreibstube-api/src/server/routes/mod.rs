use crate::server::ServerRouter;
use axum::Router;

mod accounts;
mod feeds;
mod follows;
mod posts;

pub(crate) use accounts::LoginPath;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(feeds::routes())
        .merge(posts::routes())
        .merge(follows::routes())
        .merge(accounts::routes())
}
