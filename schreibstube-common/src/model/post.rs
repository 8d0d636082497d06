use crate::model::{
    Id,
    group::{Group, GroupMarker},
    text::Text,
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use time::OffsetDateTime;

/// Number of characters of a post's text used for its short form.
pub const POST_PREVIEW_LEN: usize = 15;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: Text,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author: User,
    pub group: Option<Group>,
    /// Path of the attached image, relative to the media root.
    pub image: Option<String>,
}

impl Post {
    #[must_use]
    pub fn preview(&self) -> &str {
        let text = self.text.get();
        match text.char_indices().nth(POST_PREVIEW_LEN) {
            Some((end, _)) => &text[..end],
            None => text,
        }
    }
}

impl Display for Post {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.preview())
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewPost {
    pub author: Id<UserMarker>,
    pub text: Text,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<String>,
}

/// Replacement values for an existing post. `image: None` keeps the stored image.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostChanges {
    pub text: Text,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<String>,
}
