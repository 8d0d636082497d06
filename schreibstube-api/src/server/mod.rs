use crate::{
    feed::FeedError,
    media::{MediaError, MediaStore},
};
use axum::{
    Router,
    body::Bytes,
    extract::{
        FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use schreibstube_common::{
    cache::PageCache,
    clock::Clock,
    model::{
        Id,
        auth::{AccessTokenDecodeError, AccessTokenHashError},
        post::PostMarker,
        user::Username,
    },
};
use schreibstube_db::{DbError, Repository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use time::Duration;
use tracing::error;

mod auth;
mod extract;
mod form;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub repository: Arc<dyn Repository>,
    /// Rendered home page bodies.
    pub index_cache: Arc<PageCache<Bytes>>,
    pub media: Arc<MediaStore>,
    pub auth: Arc<AuthConfig>,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Lifetime of tokens issued at signup. `None` issues tokens that never expire.
    pub token_lifetime: Option<Duration>,
    pub clock: Arc<dyn Clock>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Incoming form rejected: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("Incoming multipart form rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Reading multipart form failed: {0}")]
    Multipart(#[from] MultipartError),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided access token could not be decoded: {0}")]
    InvalidAccessToken(#[from] AccessTokenDecodeError),
    #[error("The access token could not be hashed: {0}")]
    AccessTokenHash(#[from] AccessTokenHashError),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with username {0} was not found.")]
    UserByUsernameNotFound(Username),
}

fn database_status(err: &DbError) -> StatusCode {
    match err {
        DbError::UniqueViolation(_) => StatusCode::CONFLICT,
        DbError::Data(_) | DbError::Sqlx(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByUsernameNotFound(_)
            | ServerError::Feed(
                FeedError::GroupNotFound(_)
                | FeedError::AuthorNotFound(_)
                | FeedError::PostNotFound(_),
            ) => StatusCode::NOT_FOUND,
            ServerError::InvalidAccessToken(_) | ServerError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::FormRejection(_)
            | ServerError::MultipartRejection(_)
            | ServerError::Multipart(_)
            | ServerError::InvalidAuthorizationHeader(_) => StatusCode::BAD_REQUEST,
            ServerError::Database(err) | ServerError::Feed(FeedError::Database(err)) => {
                database_status(err)
            }
            ServerError::JsonResponse(_)
            | ServerError::AccessTokenHash(_)
            | ServerError::Media(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(error_response)).into_response()
    }
}
