use crate::config::RegistryEndpoint;
use http::StatusCode;
use reqwest::header;
use url::Url;

/// Failure of a single query against a single endpoint. Always local to
/// that endpoint: the caller moves on to the next one.
#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("registry returned {status} from {url}")]
    Status { url: Url, status: StatusCode },

    #[error("registry request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid registry URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Thin client for the registry's `apps/` REST interface. Stateless beyond
/// the connection pool; one attempt per endpoint per call, no retries.
pub struct RegistryClient {
    client: reqwest::Client,
}

impl RegistryClient {
    pub fn new() -> Self {
        RegistryClient {
            client: reqwest::Client::new(),
        }
    }

    /// Issue one GET against `{endpoint}apps/{path_suffix}`.
    ///
    /// `path_suffix` is a lower-cased service id, the empty string for the
    /// full catalog, or `delta` for an incremental catalog. Any 2xx response
    /// yields the body, even an empty one; everything else is a
    /// [`QueryError`] for this endpoint only.
    pub async fn query(
        &self,
        endpoint: &RegistryEndpoint,
        path_suffix: &str,
    ) -> Result<String, QueryError> {
        let url = apps_url(endpoint, path_suffix)?;

        let mut request = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "application/json")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some((username, password)) = endpoint.credentials() {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(QueryError::Status { url, status })
        }
    }
}

impl Default for RegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Join `apps/{suffix}` onto the endpoint base, tolerating bases with or
/// without a trailing slash.
fn apps_url(endpoint: &RegistryEndpoint, path_suffix: &str) -> Result<Url, url::ParseError> {
    let mut base = endpoint.url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("apps/{path_suffix}"))
}
