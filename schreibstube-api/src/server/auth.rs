use crate::server::{AuthConfig, ServerError, routes::LoginPath};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::{TypedHeader, routing::TypedPath};
use headers::{Authorization, authorization::Bearer};
use schreibstube_common::model::{auth::AccessToken, user::User};
use schreibstube_db::Repository;
use std::sync::Arc;
use tracing::debug;
use url::form_urlencoded;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// Whoever sent the request. `None` for requests without an `Authorization` header.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Actor(pub Option<User>);

/// A signed in user. Anonymous requests are sent to the login page instead.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SignedIn(pub User);

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct LoginRedirect {
    /// Where to return to after logging in.
    pub next: String,
}

#[derive(Debug)]
pub enum AuthRejection {
    SignIn(LoginRedirect),
    Server(ServerError),
}

impl LoginRedirect {
    #[must_use]
    pub fn location(&self) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("next", &self.next)
            .finish();

        format!("{}?{query}", LoginPath::PATH)
    }
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        Redirect::to(&self.location()).into_response()
    }
}

impl From<ServerError> for AuthRejection {
    fn from(err: ServerError) -> Self {
        Self::Server(err)
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::SignIn(redirect) => redirect.into_response(),
            Self::Server(err) => err.into_response(),
        }
    }
}

async fn authenticate<S>(parts: &mut Parts, state: &S) -> Result<Option<User>, ServerError>
where
    Arc<dyn Repository>: FromRef<S>,
    Arc<AuthConfig>: FromRef<S>,
    S: Send + Sync,
{
    let header = match AuthorizationHeader::from_request_parts(parts, state).await {
        Ok(header) => header,
        Err(rejection) if rejection.is_missing() => return Ok(None),
        Err(rejection) => return Err(ServerError::InvalidAuthorizationHeader(rejection)),
    };

    let request_token: AccessToken = header.token().parse()?;
    let token_hash = request_token.secret.hash()?;

    let repository = Arc::<dyn Repository>::from_ref(state);
    let credential = repository
        .fetch_credential(&token_hash)
        .await?
        .ok_or(ServerError::InvalidToken)?;

    let now = Arc::<AuthConfig>::from_ref(state).clock.now();
    if credential.user != request_token.user_id || credential.is_expired_at(now) {
        return Err(ServerError::InvalidToken);
    }

    let user = repository
        .fetch_user(credential.user)
        .await?
        .ok_or(ServerError::InvalidToken)?;

    Ok(Some(user))
}

impl<S> FromRequestParts<S> for Actor
where
    Arc<dyn Repository>: FromRef<S>,
    Arc<AuthConfig>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(authenticate(parts, state).await?))
    }
}

impl<S> FromRequestParts<S> for SignedIn
where
    Arc<dyn Repository>: FromRef<S>,
    Arc<AuthConfig>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = authenticate(parts, state).await? {
            return Ok(Self(user));
        }

        let next = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string);
        debug!(%next, "Anonymous request needs a signed in user");

        Err(AuthRejection::SignIn(LoginRedirect { next }))
    }
}

#[cfg(test)]
mod tests {
    use crate::server::auth::LoginRedirect;

    #[test]
    fn login_location_encodes_next() {
        let redirect = LoginRedirect {
            next: "/posts/3/edit/?page=2".to_owned(),
        };

        assert_eq!(
            redirect.location(),
            "/auth/login/?next=%2Fposts%2F3%2Fedit%2F%3Fpage%3D2"
        );
    }
}
