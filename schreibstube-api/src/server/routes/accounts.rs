use crate::server::{AuthConfig, Result, ServerError, ServerRouter, extract::Query, json::Json};
use axum::{
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use axum_extra::routing::{RouterExt, TypedPath};
use schreibstube_common::model::{
    auth::{AccessToken, NewCredential, TokenSecret},
    user::{CreateUser, User},
};
use schreibstube_db::Repository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(signup)
        .typed_get(login)
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct SignupResponse {
    user: User,
    access_token: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/signup/", rejection(ServerError))]
struct SignupPath();

async fn signup(
    SignupPath(): SignupPath,
    State(repository): State<Arc<dyn Repository>>,
    State(auth): State<Arc<AuthConfig>>,
    Json(request): Json<CreateUser>,
) -> Result<impl IntoResponse> {
    let secret = TokenSecret::generate();
    let created_at = auth.clock.now();
    let credential = NewCredential {
        token_hash: secret.hash()?,
        created_at,
        expires_at: auth.token_lifetime.map(|lifetime| created_at + lifetime),
    };

    let user = repository.create_user(&request, &credential).await?;
    info!(user = %user.id, username = %user.username, "Signed up user");

    let access_token = AccessToken {
        user_id: user.id,
        secret,
    }
    .encode();

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse { user, access_token }),
    ))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login/", rejection(ServerError))]
pub(crate) struct LoginPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
struct LoginQuery {
    next: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct LoginResponse {
    status: u16,
    next: Option<String>,
}

/// Where anonymous users land. Tokens are handed out elsewhere, so all this does is
/// tell the client to come back with one.
async fn login(
    LoginPath(): LoginPath,
    Query(LoginQuery { next }): Query<LoginQuery>,
) -> impl IntoResponse {
    let status = StatusCode::UNAUTHORIZED;

    (
        status,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(LoginResponse {
            status: status.as_u16(),
            next,
        }),
    )
}
