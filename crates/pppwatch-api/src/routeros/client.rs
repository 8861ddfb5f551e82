// RouterOS REST HTTP client
//
// Wraps `reqwest::Client` with RouterOS URL construction, basic auth and
// error-body decoding. Menu operations (secrets, sessions, interfaces)
// live in sibling files as inherent methods to keep this module focused
// on transport mechanics.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::routeros::models::RouterOsErrorBody;
use crate::transport::TransportConfig;

/// Raw HTTP client for one router's `/rest` API.
///
/// RouterOS REST is stateless: credentials travel with every request as
/// HTTP basic auth, so a "session" is just this client plus a verified
/// identity probe.
pub struct RouterOsClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
}

impl RouterOsClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the router root (e.g. `https://10.0.0.1` or
    /// `http://10.0.0.1:8080`); the `/rest` prefix is added per request.
    pub fn new(
        base_url: Url,
        username: String,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, username, password))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        username: String,
        password: SecretString,
    ) -> Self {
        Self {
            http,
            base_url,
            username,
            password,
        }
    }

    /// The router base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/rest/{path}`.
    pub(crate) fn rest_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/rest/{path}"))?)
    }

    /// Build `{base}/rest/{menu}/{id}`. RouterOS ids (`*1A`) are path-safe.
    pub(crate) fn item_url(&self, menu: &str, id: &str) -> Result<Url, Error> {
        let mut url = self.rest_url(menu)?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .push(id);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.basic_auth(&self.username, Some(self.password.expose_secret()))
    }

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .authed(self.http.get(url))
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_response(resp).await
    }

    /// Send a GET request with `?field=value` equality filters.
    pub(crate) async fn get_filtered<T: DeserializeOwned>(
        &self,
        mut url: Url,
        filters: &[(&str, &str)],
    ) -> Result<T, Error> {
        {
            let mut query = url.query_pairs_mut();
            for (field, value) in filters {
                query.append_pair(field, value);
            }
        }
        self.get(url).await
    }

    /// Send a PATCH request with a JSON body (RouterOS "set").
    pub(crate) async fn patch<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("PATCH {}", url);

        let resp = self
            .authed(self.http.patch(url).json(body))
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_response(resp).await
    }

    /// Send a PUT request with a JSON body (RouterOS "add").
    pub(crate) async fn put<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("PUT {}", url);

        let resp = self
            .authed(self.http.put(url).json(body))
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::parse_response(resp).await
    }

    /// Send a DELETE request (RouterOS "remove"). The response body is empty.
    pub(crate) async fn delete(&self, url: Url) -> Result<(), Error> {
        debug!("DELETE {}", url);

        let resp = self
            .authed(self.http.delete(url))
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::check_status(resp).await.map(|_| ())
    }

    /// Map non-success statuses to errors, passing successful responses through.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "router rejected credentials".into(),
            });
        }

        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<RouterOsErrorBody>(&body) {
            Ok(err) => Error::RouterOs {
                status: err.error.unwrap_or(status.as_u16()),
                message: err.message,
                detail: err.detail,
            },
            Err(_) => Error::RouterOs {
                status: status.as_u16(),
                message: preview(&body).to_owned(),
                detail: None,
            },
        })
    }

    /// Decode a successful JSON response.
    async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let resp = Self::check_status(resp).await?;
        let body = resp.text().await.map_err(Error::Transport)?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        })
    }
}

/// At most 200 bytes of `body`, cut on a char boundary.
fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
