//! HTTP client for the trusted login function.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::util::{compact_text, is_http_url, normalize_text_option};
use crate::{Error, Result};

use super::{Authorization, IdentityExchange};

/// Posts an authorization to the login endpoint and reads back the openid.
#[derive(Clone, Debug)]
pub struct HttpIdentityExchange {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpIdentityExchange {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        Ok(Self {
            endpoint,
            client: reqwest::Client::builder().build()?,
        })
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    code: Option<&'a str>,
    nickname: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: Option<bool>,
    openid: Option<String>,
    #[serde(default)]
    unionid: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl LoginResponse {
    fn into_openid(self) -> Result<String> {
        if self.success == Some(false) {
            return Err(Error::IdentityExchange(
                self.message
                    .unwrap_or_else(|| "login function reported failure".to_string()),
            ));
        }
        if let Some(unionid) = &self.unionid {
            tracing::debug!("Login function returned unionid {unionid}");
        }
        normalize_text_option(self.openid).ok_or_else(|| {
            Error::IdentityExchange("response did not include openid".to_string())
        })
    }
}

#[async_trait]
impl IdentityExchange for HttpIdentityExchange {
    async fn exchange_for_identity(&self, authorization: &Authorization) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&LoginRequest {
                code: authorization.code.as_deref(),
                nickname: &authorization.nickname,
            })
            .send()
            .await
            .map_err(|error| Error::IdentityExchange(format!("login request failed: {error}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::IdentityExchange(parse_api_error(status, &body)));
        }

        let payload = response
            .json::<LoginResponse>()
            .await
            .map_err(|error| Error::IdentityExchange(format!("invalid login payload: {error}")))?;
        payload.into_openid()
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> Result<String> {
    let endpoint = normalize_text_option(Some(raw)).ok_or_else(|| {
        Error::InvalidConfig("login endpoint must not be empty".to_string())
    })?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidConfig(
            "login endpoint must include http:// or https://".to_string(),
        ))
    }
}
