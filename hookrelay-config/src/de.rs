//! Serde helpers for values that may arrive as text.
//!
//! Environment variables and `.env` files only carry strings, while TOML and
//! JSON files carry native scalars. Fields that are not strings opt in with
//! `#[serde(deserialize_with = "hookrelay_config::de::lenient")]` and accept
//! both forms.

use serde::de::{Deserialize, Deserializer, Error};
use std::fmt::Display;
use std::str::FromStr;

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum TextOr<T> {
    Text(String),
    Native(T),
}

/// Accept either a native value or its string form
pub fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    match TextOr::<T>::deserialize(deserializer)? {
        TextOr::Text(text) => text
            .trim()
            .parse()
            .map_err(|e| D::Error::custom(format!("invalid value `{text}`: {e}"))),
        TextOr::Native(value) => Ok(value),
    }
}
