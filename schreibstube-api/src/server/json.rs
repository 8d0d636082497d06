use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    body::Bytes,
    extract::FromRequest,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::Serialize;

#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(json) => (TypedHeader(ContentType::json()), json).into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}

/// A JSON body that was already serialized, e.g. one served from the page cache.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct RenderedJson(pub Bytes);

impl RenderedJson {
    pub fn render<T: Serialize>(value: &T) -> Result<Self, ServerError> {
        Ok(Self(serde_json::to_vec(value)?.into()))
    }
}

impl IntoResponse for RenderedJson {
    fn into_response(self) -> Response {
        (TypedHeader(ContentType::json()), self.0).into_response()
    }
}
