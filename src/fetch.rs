use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::resources::{Race, ResourceKind};
use crate::session::Session;
use crate::types::{BearerToken, Record};

/// Results of one [`ResourceFetcher::fetch_all`] round. Each kind succeeds or
/// fails on its own.
#[derive(Debug)]
pub struct FetchedResources {
    pub users: Result<Vec<Record>, Error>,
    pub races: Result<Vec<Race>, Error>,
}

/// Reads protected resource lists with the session's bearer value attached.
#[derive(Debug, Clone)]
pub struct ResourceFetcher {
    users_url: Url,
    races_url: Url,
    http: reqwest::Client,
}

impl ResourceFetcher {
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            users_url: config.users_url.clone(),
            races_url: config.races_url.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /users`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, [`Error::Status`] on a
    /// non-success status, or [`Error::Json`] if the body is not a list of objects.
    pub async fn users(&self, token: &BearerToken) -> Result<Vec<Record>, Error> {
        self.fetch_list(ResourceKind::Users, token).await
    }

    /// `GET /races`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, [`Error::Status`] on a
    /// non-success status, or [`Error::Json`] if the body is not a list of races.
    pub async fn races(&self, token: &BearerToken) -> Result<Vec<Race>, Error> {
        self.fetch_list(ResourceKind::Races, token).await
    }

    /// Fetch every resource kind concurrently for `session`.
    ///
    /// A session without a usable bearer value issues no requests; both
    /// kinds fail with [`Error::MissingToken`].
    pub async fn fetch_all(&self, session: &Session) -> FetchedResources {
        let Some(token) = session.usable_token() else {
            return FetchedResources {
                users: Err(Error::MissingToken),
                races: Err(Error::MissingToken),
            };
        };

        let (users, races) = tokio::join!(self.users(token), self.races(token));
        FetchedResources { users, races }
    }

    fn url_for(&self, kind: ResourceKind) -> &Url {
        match kind {
            ResourceKind::Users => &self.users_url,
            ResourceKind::Races => &self.races_url,
        }
    }

    async fn fetch_list<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        token: &BearerToken,
    ) -> Result<Vec<T>, Error> {
        let response = self
            .http
            .get(self.url_for(kind).clone())
            .bearer_auth(token.expose())
            .send()
            .await?;

        let response = Self::ensure_success(response, operation(kind)).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(Into::into)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Status {
            operation,
            status,
            detail: body,
        })
    }
}

fn operation(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Users => "users request",
        ResourceKind::Races => "races request",
    }
}
