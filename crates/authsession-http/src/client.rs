//! reqwest-backed lookups.

use async_trait::async_trait;
use authsession_core::{
    FetchError, Identity, IdentityFetcher, PermissionSet, PermissionsFetcher, SessionReader,
};
use reqwest::{Client, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};

/// Lookup endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpEndpoints {
    pub identity_url: String,
    pub permissions_url: String,
}

impl HttpEndpoints {
    /// Default endpoint layout below an API base URL.
    #[must_use]
    pub fn from_base(api_url: &str) -> Self {
        let base = api_url.trim_end_matches('/');
        Self {
            identity_url: format!("{base}/verify_token"),
            permissions_url: format!("{base}/permissions/current"),
        }
    }
}

#[derive(Serialize)]
struct VerifyTokenRequest<'a> {
    api_token: &'a str,
}

/// Resolves the profile of a bearer token.
#[derive(Debug, Clone)]
pub struct HttpIdentityFetcher {
    client: Client,
    url: String,
}

impl HttpIdentityFetcher {
    #[must_use]
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl IdentityFetcher for HttpIdentityFetcher {
    async fn fetch_identity(&self, token: &str) -> Result<Option<Identity>, FetchError> {
        let response = self
            .client
            .post(&self.url)
            .json(&VerifyTokenRequest { api_token: token })
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        decode(response).await
    }
}

/// Fetches the grants of whatever credential the session currently holds.
pub struct HttpPermissionsFetcher {
    client: Client,
    url: String,
    session: SessionReader,
}

impl HttpPermissionsFetcher {
    #[must_use]
    pub fn new(client: Client, url: impl Into<String>, session: SessionReader) -> Self {
        Self {
            client,
            url: url.into(),
            session,
        }
    }
}

#[async_trait]
impl PermissionsFetcher for HttpPermissionsFetcher {
    async fn fetch_permissions(&self) -> Result<Option<PermissionSet>, FetchError> {
        let Some(credential) = self.session.credential() else {
            return Err(FetchError::Unauthorized);
        };
        let response = self
            .client
            .get(&self.url)
            .bearer_auth(credential.token())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<Option<T>, FetchError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FetchError::Unauthorized);
    }
    if !status.is_success() {
        tracing::debug!(url = %response.url(), %status, "Lookup rejected");
        return Err(FetchError::Status(status.as_u16()));
    }
    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::Network(e.to_string()))?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<Option<T>>(&body).map_err(|e| FetchError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_from_base() {
        let endpoints = HttpEndpoints::from_base("https://api.example.com/v1/");
        assert_eq!(endpoints.identity_url, "https://api.example.com/v1/verify_token");
        assert_eq!(
            endpoints.permissions_url,
            "https://api.example.com/v1/permissions/current"
        );
    }
}
