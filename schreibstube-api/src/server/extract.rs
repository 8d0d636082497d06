use crate::server::ServerError;
use axum::extract::{FromRequest, FromRequestParts};
use serde::Deserialize;

#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(axum::extract::Query), rejection(ServerError))]
pub struct Query<T>(pub T);

#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(axum::Form), rejection(ServerError))]
pub struct Form<T>(pub T);

/// `?page=` of the paginated views. Kept raw, the paginator decides what it means.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}
