#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, Bytes},
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use schreibstube_api::{
    media::MediaStore,
    server::{self, AuthConfig, ServerState},
};
use schreibstube_common::{
    cache::PageCache,
    clock::{Clock, ManualClock},
    model::{
        auth::{AccessToken, NewCredential, TokenSecret},
        group::{CreateGroup, Group, GroupSlug},
        post::{NewPost, Post},
        text::Text,
        user::{CreateUser, User, Username},
    },
};
use schreibstube_db::{MemoryRepository, Repository};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;

pub const INDEX_CACHE_TTL: Duration = Duration::seconds(20);
const MULTIPART_BOUNDARY: &str = "schreibstube-test-boundary";

/// A two by one pixel GIF.
pub const SMALL_GIF: &[u8] = b"\x47\x49\x46\x38\x39\x61\x02\x00\
    \x01\x00\x80\x00\x00\x00\x00\x00\
    \xFF\xFF\xFF\x21\xF9\x04\x00\x00\
    \x00\x00\x00\x2C\x00\x00\x00\x00\
    \x02\x00\x01\x00\x00\x02\x02\x0C\
    \x0A\x00\x3B";

/// A router over a fresh in-memory store. Everything shares one manual clock.
pub struct TestApp {
    router: Router,
    pub repository: Arc<MemoryRepository>,
    pub index_cache: Arc<PageCache<Bytes>>,
    pub clock: Arc<ManualClock>,
    pub media_root: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    body_bytes: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    /// Texts of the posts in a feed response, in order.
    pub fn post_texts(&self) -> Vec<String> {
        self.json()["page_obj"]["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|post| post["text"].as_str().unwrap_or_default().to_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn assert_redirect(&self, location: &str) {
        assert_eq!(self.status, StatusCode::SEE_OTHER);
        assert_eq!(self.location.as_deref(), Some(location));
    }
}

pub struct TestUser {
    pub user: User,
    pub access_token: String,
}

/// One part of a multipart form.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

impl TestApp {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(OffsetDateTime::now_utc()));
        let repository = Arc::new(MemoryRepository::with_clock(clock.clone()));
        let index_cache = Arc::new(PageCache::with_clock(INDEX_CACHE_TTL, clock.clone()));
        let media_root = tempfile::tempdir().unwrap();

        let state = ServerState {
            repository: repository.clone(),
            index_cache: index_cache.clone(),
            media: Arc::new(MediaStore::new(media_root.path().to_path_buf())),
            auth: Arc::new(AuthConfig {
                token_lifetime: None,
                clock: clock.clone(),
            }),
        };

        Self {
            router: server::routes().with_state(state),
            repository,
            index_cache,
            clock,
            media_root,
        }
    }

    // ------------------------------------------------------------------
    // Fixtures, written straight into the store
    // ------------------------------------------------------------------

    pub async fn create_user(&self, username: &str) -> TestUser {
        let secret = TokenSecret::generate();
        let user = self
            .repository
            .create_user(
                &CreateUser {
                    username: Username::new(username.to_owned()).unwrap(),
                },
                &NewCredential {
                    token_hash: secret.hash().unwrap(),
                    created_at: self.clock.now(),
                    expires_at: None,
                },
            )
            .await
            .unwrap();

        let access_token = AccessToken {
            user_id: user.id,
            secret,
        }
        .encode();

        TestUser { user, access_token }
    }

    pub async fn create_group(&self, title: &str, slug: &str) -> Group {
        self.repository
            .create_group(&CreateGroup {
                title: title.to_owned(),
                slug: GroupSlug::new(slug.to_owned()).unwrap(),
                description: format!("{title} description"),
            })
            .await
            .unwrap()
    }

    pub async fn create_post(&self, author: &TestUser, text: &str, group: Option<&Group>) -> Post {
        self.repository
            .create_post(&NewPost {
                author: author.user.id,
                text: Text::new(text.to_owned()).unwrap(),
                group: group.map(|group| group.id),
                image: None,
            })
            .await
            .unwrap()
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|location| location.to_str().unwrap().to_owned());
        let body_bytes = response.into_body().collect().await.unwrap().to_bytes();

        TestResponse {
            status,
            location,
            body_bytes,
        }
    }

    fn request(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(uri);
        match token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        let request = Self::request(Method::GET, uri, token)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Sends a GET with a raw `Authorization` header value.
    pub async fn get_with_authorization(&self, uri: &str, authorization: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::AUTHORIZATION, authorization)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: &Value, token: Option<&str>) -> TestResponse {
        let request = Self::request(Method::POST, uri, token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Sends `application/x-www-form-urlencoded` fields.
    pub async fn post_form(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        token: Option<&str>,
    ) -> TestResponse {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let request = Self::request(Method::POST, uri, token)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        parts: &[Part<'_>],
        token: Option<&str>,
    ) -> TestResponse {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, filename, contents) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; \
                            filename=\"{filename}\"\r\n\
                            Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(contents);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

        let request = Self::request(Method::POST, uri, token)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }
}
