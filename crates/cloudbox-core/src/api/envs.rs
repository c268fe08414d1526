//! Sandbox environment variables.

use reqwest::Method;
use std::collections::BTreeMap;

use super::client::{ApiClient, RequestBody};
use super::error::{ApiError, ApiResult};

pub struct Envs<'a> {
    client: &'a ApiClient,
}

impl ApiClient {
    pub fn envs(&self) -> Envs<'_> {
        Envs { client: self }
    }
}

/// Environment variable names: letters, digits and `_`, not starting with a digit.
pub fn validate_env_name(name: &str) -> ApiResult<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ApiError::InvalidRequest(format!(
            "invalid environment variable name '{name}'"
        )))
    }
}

/// Parse `KEY=VALUE`; the value may itself contain `=`.
pub fn parse_assignment(pair: &str) -> ApiResult<(String, String)> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| ApiError::InvalidRequest(format!("expected KEY=VALUE, got '{pair}'")))?;
    validate_env_name(key)?;
    Ok((key.to_string(), value.to_string()))
}

impl Envs<'_> {
    pub async fn list(&self, id: &str) -> ApiResult<BTreeMap<String, String>> {
        self.client
            .get_json(self.client.url(&format!("sandboxes/{id}/envs"))?)
            .await
    }

    pub async fn set(&self, id: &str, vars: &BTreeMap<String, String>) -> ApiResult<()> {
        for name in vars.keys() {
            validate_env_name(name)?;
        }
        let body =
            serde_json::to_value(vars).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let url = self.client.url(&format!("sandboxes/{id}/envs"))?;
        self.client
            .execute(Method::PUT, url, RequestBody::Json(body))
            .await
    }

    pub async fn unset(&self, id: &str, name: &str) -> ApiResult<()> {
        validate_env_name(name)?;
        let url = self.client.url(&format!("sandboxes/{id}/envs/{name}"))?;
        self.client
            .execute(Method::DELETE, url, RequestBody::Empty)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_split_on_first_equals() {
        assert_eq!(
            parse_assignment("URL=a=b").unwrap(),
            ("URL".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_assignment("EMPTY=").unwrap(),
            ("EMPTY".to_string(), String::new())
        );
        assert!(parse_assignment("NOVALUE").is_err());
        assert!(parse_assignment("1BAD=x").is_err());
        assert!(parse_assignment("has-dash=x").is_err());
    }
}
