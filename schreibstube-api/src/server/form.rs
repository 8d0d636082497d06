//! Submitted post and comment forms, their validation and how they are shown back.

use crate::{media::ValidImage, server::ServerError};
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
};
use schreibstube_common::model::{Id, group::GroupMarker, post::Post, text::Text};
use schreibstube_db::{DbError, Repository};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const REQUIRED_FIELD: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str = "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Error messages per form field.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<&'static str>>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: &'static str) {
        self.0.entry(field).or_default().push(message);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Raw fields of a create or edit form, as sent.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PostSubmission {
    pub text: Option<String>,
    pub group: Option<String>,
    /// `None` when no file was attached.
    pub image: Option<Bytes>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ValidatedPost {
    pub text: Text,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<ValidImage>,
}

impl<S: Send + Sync> FromRequest<S> for PostSubmission {
    type Rejection = ServerError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(request, state).await?;
        let mut submission = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(ToOwned::to_owned) else {
                continue;
            };

            match name.as_str() {
                "text" => submission.text = Some(field.text().await?),
                "group" => submission.group = Some(field.text().await?),
                "image" => {
                    let bytes = field.bytes().await?;
                    // Browsers send an empty part for an empty file input.
                    submission.image = (!bytes.is_empty()).then_some(bytes);
                }
                _ => {}
            }
        }

        Ok(submission)
    }
}

impl PostSubmission {
    /// Checks every field. The outer error is a failed group lookup, the inner one the
    /// messages to show next to the form.
    pub async fn validate(
        &self,
        repository: &dyn Repository,
    ) -> Result<Result<ValidatedPost, FieldErrors>, DbError> {
        let mut errors = FieldErrors::default();

        let text = self.text.clone().and_then(|text| Text::new(text).ok());
        if text.is_none() {
            errors.add("text", REQUIRED_FIELD);
        }

        let group = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => match repository.fetch_group(Id::new(id)).await? {
                    Some(group) => Some(group.id),
                    None => {
                        errors.add("group", INVALID_CHOICE);
                        None
                    }
                },
                Err(_) => {
                    errors.add("group", INVALID_CHOICE);
                    None
                }
            },
        };

        let image = match self.image.clone().map(ValidImage::inspect) {
            None => None,
            Some(Ok(image)) => Some(image),
            Some(Err(_)) => {
                errors.add("image", INVALID_IMAGE);
                None
            }
        };

        Ok(match text {
            Some(text) if errors.is_empty() => Ok(ValidatedPost { text, group, image }),
            _ => Err(errors),
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct PostFormFields {
    pub text: String,
    pub group: Option<String>,
    /// The image currently attached to the post being edited.
    pub image: Option<String>,
}

/// The create/edit page.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct PostFormView {
    pub is_edit: bool,
    pub form: PostFormFields,
    pub errors: FieldErrors,
}

impl PostFormView {
    #[must_use]
    pub fn create() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn edit(post: &Post) -> Self {
        Self {
            is_edit: true,
            form: PostFormFields {
                text: post.text.get().to_owned(),
                group: post.group.as_ref().map(|group| group.id.to_string()),
                image: post.image.clone(),
            },
            errors: FieldErrors::default(),
        }
    }

    /// Shows the submitted values again next to their errors.
    #[must_use]
    pub fn rejected(
        is_edit: bool,
        submission: PostSubmission,
        current_image: Option<String>,
        errors: FieldErrors,
    ) -> Self {
        Self {
            is_edit,
            form: PostFormFields {
                text: submission.text.unwrap_or_default(),
                group: submission.group.filter(|group| !group.trim().is_empty()),
                image: current_image,
            },
            errors,
        }
    }
}

/// The comment form below a post.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CommentSubmission {
    #[serde(default)]
    pub text: String,
}
