use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Free-form body text of a post or comment. Never blank.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Text(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Text must not be blank")]
pub struct BlankTextError;

impl Text {
    pub fn new(text: String) -> Result<Self, BlankTextError> {
        if text.trim().is_empty() {
            Err(BlankTextError)
        } else {
            Ok(Self(text))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Text {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Text::new(inner).map_err(|_| Error::invalid_value(Unexpected::Str(""), &"non-blank text"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::text::{BlankTextError, Text};

    #[test]
    fn blank_text_is_rejected() {
        assert_eq!(Text::new(String::new()), Err(BlankTextError));
        assert_eq!(Text::new(" \n\t ".to_owned()), Err(BlankTextError));
        assert_eq!(Text::new(" hi ".to_owned()).unwrap().get(), " hi ");
    }
}
