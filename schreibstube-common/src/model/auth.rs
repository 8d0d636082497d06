//! Bearer access tokens.
//!
//! A token reads `<user id>.<secret>.<salt>`, the last two parts being unpadded URL-safe
//! base64. Only the argon2 hash of the secret is ever stored.

use crate::model::{Id, user::UserMarker};
use argon2::{Argon2, Params};
use base64::{DecodeError, Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use std::{
    fmt::{Debug, Formatter},
    num::ParseIntError,
    str::FromStr,
};
use thiserror::Error;
use time::OffsetDateTime;

pub const ACCESS_TOKEN_SECRET_LEN: usize = 32;
pub const ACCESS_TOKEN_SALT_LEN: usize = 16;
pub const ACCESS_TOKEN_HASH_LEN: usize = Params::DEFAULT_OUTPUT_LEN;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing access token failed: {0}")]
pub struct AccessTokenHashError(argon2::Error);

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum AccessTokenDecodeError {
    #[error("Expected three parts separated by '.'")]
    MalformedToken,
    #[error("Invalid user id: {0}")]
    InvalidUserId(#[from] ParseIntError),
    #[error("Decoding base64 failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("The secret part has the wrong length")]
    InvalidSecretLength,
    #[error("The salt part has the wrong length")]
    InvalidSaltLength,
}

/// The random half of an access token, independent of the user it is issued to.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct TokenSecret {
    pub secret: [u8; ACCESS_TOKEN_SECRET_LEN],
    pub salt: [u8; ACCESS_TOKEN_SALT_LEN],
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AccessToken {
    pub user_id: Id<UserMarker>,
    pub secret: TokenSecret,
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct AccessTokenHash(pub [u8; ACCESS_TOKEN_HASH_LEN]);

/// Stored side of an issued token.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Credential {
    pub user: Id<UserMarker>,
    pub token_hash: AccessTokenHash,
    pub created_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
}

/// A credential about to be stored for a user that does not exist yet.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewCredential {
    pub token_hash: AccessTokenHash,
    pub created_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
}

impl TokenSecret {
    #[must_use]
    pub fn generate() -> Self {
        Self {
            secret: rand::random(),
            salt: rand::random(),
        }
    }

    pub fn hash(&self) -> Result<AccessTokenHash, AccessTokenHashError> {
        let mut hash = [0; ACCESS_TOKEN_HASH_LEN];
        Argon2::default()
            .hash_password_into(&self.secret, &self.salt, &mut hash)
            .map_err(AccessTokenHashError)?;

        Ok(AccessTokenHash(hash))
    }
}

impl AccessToken {
    #[must_use]
    pub fn encode(&self) -> String {
        let secret = BASE64_URL_SAFE_NO_PAD.encode(self.secret.secret);
        let salt = BASE64_URL_SAFE_NO_PAD.encode(self.secret.salt);

        format!("{}.{secret}.{salt}", self.user_id)
    }
}

impl FromStr for AccessToken {
    type Err = AccessTokenDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user_id, rest) = s.split_once('.').ok_or(Self::Err::MalformedToken)?;
        let (secret, salt) = rest.split_once('.').ok_or(Self::Err::MalformedToken)?;

        let user_id = i64::from_str(user_id)?.into();
        let secret = BASE64_URL_SAFE_NO_PAD
            .decode(secret)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSecretLength)?;
        let salt = BASE64_URL_SAFE_NO_PAD
            .decode(salt)?
            .try_into()
            .map_err(|_| Self::Err::InvalidSaltLength)?;

        Ok(Self {
            user_id,
            secret: TokenSecret { secret, salt },
        })
    }
}

impl Credential {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

impl Debug for TokenSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSecret")
            .field("secret", &"[redacted]")
            .field("salt", &"[redacted]")
            .finish()
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("user_id", &self.user_id)
            .field("secret", &self.secret)
            .finish()
    }
}

impl Debug for AccessTokenHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AccessTokenHash").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The access token hash had an invalid length")]
pub struct InvalidAccessTokenHashError;

impl TryFrom<Vec<u8>> for AccessTokenHash {
    type Error = InvalidAccessTokenHashError;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        Ok(Self(
            value.try_into().map_err(|_| InvalidAccessTokenHashError)?,
        ))
    }
}
