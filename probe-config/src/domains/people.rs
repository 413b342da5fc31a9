//! People API configuration for asynchronous search

use super::balancer::join_url;
use crate::error::ConfigResult;
use crate::validation::{validate_path, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeopleApiConfig {
    /// API gateway base URL
    pub base_url: String,

    /// Search endpoint, relative to `base_url`
    pub search_path: String,

    /// Header carrying the callback URL for asynchronous search
    pub callback_header: String,
}

impl Default for PeopleApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8765/api/v1".to_string(),
            search_path: "/people/search".to_string(),
            callback_header: "X-Callback-URL".to_string(),
        }
    }
}

impl PeopleApiConfig {
    pub fn search_url(&self) -> String {
        join_url(&self.base_url, &self.search_path)
    }
}

impl Validatable for PeopleApiConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.base_url, "base_url", self.domain_name())?;
        validate_path(&self.search_path, "search_path", self.domain_name())?;
        validate_required_string(&self.callback_header, "callback_header", self.domain_name())?;

        if is_invalid_header_name(&self.callback_header) {
            return Err(self.validation_error(format!(
                "callback_header '{}' is not a valid header name",
                self.callback_header
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "people"
    }
}

fn is_invalid_header_name(name: &str) -> bool {
    !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
