//! Credentials and token provision
//!
//! Distribution calls carry two bearer tokens: a session token
//! (`Authorization`) and a dataset-scoped token (`Fusion-Authorization`).
//! Both are obtained freshly for every request; nothing is cached at this
//! layer. Providers are constructed explicitly and injected into the
//! client; there is no process-wide credential state.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Credential material, one variant per acquisition scheme.
///
/// Dispatch is by pattern match on the variant.
#[derive(Clone, Debug)]
pub enum Credentials {
    /// OAuth2 `client_credentials` grant against an external issuer
    Secret {
        /// OAuth2 client id
        client_id: String,
        /// OAuth2 client secret
        client_secret: String,
        /// Audience/resource the token is requested for
        resource: String,
        /// Token endpoint URL
        auth_url: String,
    },
    /// OAuth2 `password` grant against an external issuer
    Password {
        /// OAuth2 client id
        client_id: String,
        /// Account username
        username: String,
        /// Account password
        password: String,
        /// Audience/resource the token is requested for
        resource: String,
        /// Token endpoint URL
        auth_url: String,
    },
    /// A bearer token obtained out of band
    Bearer {
        /// The session token
        token: String,
    },
    /// A pre-issued dataset-scoped token alongside the session token
    Dataset {
        /// The session token
        session_token: String,
        /// The dataset-scoped token
        dataset_token: String,
    },
}

/// Produces the two bearer tokens attached to every distribution call.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The session bearer token
    async fn session_token(&self) -> Result<String>;

    /// The bearer token scoped to one catalog/dataset pair
    async fn dataset_token(&self, catalog: &str, dataset: &str) -> Result<String>;
}

/// Token provider backed by [`Credentials`].
///
/// The OAuth variants exchange their material at the configured token
/// endpoint on every call. Dataset-scoped tokens come from an external
/// issuer; this provider hands out the pre-issued one when the `Dataset`
/// variant carries it and otherwise falls back to the session token.
pub struct OAuthTokenProvider {
    credentials: Credentials,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl OAuthTokenProvider {
    /// Create a provider for the given credentials
    pub fn new(credentials: Credentials) -> Result<Self> {
        let http = reqwest::Client::builder().build().map_err(Error::Http)?;
        Ok(Self { credentials, http })
    }

    async fn exchange(&self, form: &[(&str, &str)], auth_url: &str) -> Result<String> {
        let response = self.http.post(auth_url).form(form).send().await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl TokenProvider for OAuthTokenProvider {
    async fn session_token(&self) -> Result<String> {
        match &self.credentials {
            Credentials::Secret {
                client_id,
                client_secret,
                resource,
                auth_url,
            } => {
                self.exchange(
                    &[
                        ("grant_type", "client_credentials"),
                        ("client_id", client_id),
                        ("client_secret", client_secret),
                        ("aud", resource),
                    ],
                    auth_url,
                )
                .await
            }
            Credentials::Password {
                client_id,
                username,
                password,
                resource,
                auth_url,
            } => {
                self.exchange(
                    &[
                        ("grant_type", "password"),
                        ("client_id", client_id),
                        ("username", username),
                        ("password", password),
                        ("resource", resource),
                    ],
                    auth_url,
                )
                .await
            }
            Credentials::Bearer { token } => Ok(token.clone()),
            Credentials::Dataset { session_token, .. } => Ok(session_token.clone()),
        }
    }

    async fn dataset_token(&self, _catalog: &str, _dataset: &str) -> Result<String> {
        match &self.credentials {
            Credentials::Dataset { dataset_token, .. } => Ok(dataset_token.clone()),
            _ => self.session_token().await,
        }
    }
}

/// Fixed tokens, for tests and short-lived scripts
pub struct StaticTokenProvider {
    session: String,
    dataset: String,
}

impl StaticTokenProvider {
    /// Create a provider that always returns the given tokens
    pub fn new(session: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            dataset: dataset.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn session_token(&self) -> Result<String> {
        Ok(self.session.clone())
    }

    async fn dataset_token(&self, _catalog: &str, _dataset: &str) -> Result<String> {
        Ok(self.dataset.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bearer_variant_returns_held_token() {
        let provider = OAuthTokenProvider::new(Credentials::Bearer {
            token: "abc".into(),
        })
        .unwrap();
        assert_eq!(provider.session_token().await.unwrap(), "abc");
        assert_eq!(provider.dataset_token("c", "d").await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn dataset_variant_scopes_the_second_token() {
        let provider = OAuthTokenProvider::new(Credentials::Dataset {
            session_token: "session".into(),
            dataset_token: "scoped".into(),
        })
        .unwrap();
        assert_eq!(provider.session_token().await.unwrap(), "session");
        assert_eq!(provider.dataset_token("c", "d").await.unwrap(), "scoped");
    }
}
