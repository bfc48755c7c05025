//! String formats understood by the `format` keyword.

use std::sync::LazyLock;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use regex::Regex;

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Byte,
    Uuid,
    DateTime,
    Date,
    Email,
    Uri,
}

impl Format {
    pub fn matches(self, value: &str) -> bool {
        match self {
            Self::Byte => STANDARD.decode(value).is_ok(),
            Self::Uuid => uuid::Uuid::parse_str(value).is_ok(),
            Self::DateTime => chrono::DateTime::parse_from_rfc3339(value).is_ok(),
            Self::Date => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
            Self::Email => EMAIL.as_ref().is_some_and(|re| re.is_match(value)),
            Self::Uri => url::Url::parse(value).is_ok(),
        }
    }
}
