use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use strum::{Display, EnumString};
use tokio::task::JoinHandle;

use crate::auth::{AuthError, TokenAcquirer};
use crate::error::{Result, ZcrmError};

/// Base URL used until [`NetworkRequest::set_base_url`] is called.
pub const DEFAULT_API_BASE_URL: &str = "https://www.zohoapis.com/crm/v2";

/// Scheme prefix of the Zoho OAuth authorization header.
pub const OAUTH_SCHEME: &str = "Zoho-oauthtoken";

/// HTTP verbs a request may use. `None` is only the unset placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    #[default]
    None,
}

impl HttpMethod {
    fn to_reqwest(self) -> Result<Method> {
        match self {
            Self::Get => Ok(Method::GET),
            Self::Post => Ok(Method::POST),
            Self::Put => Ok(Method::PUT),
            Self::Delete => Ok(Method::DELETE),
            Self::None => Err(ZcrmError::InvalidMethodSelection(
                "NONE is only an initial value".to_string(),
            )),
        }
    }
}

/// Accumulates URL, query, headers, body and method for one request.
///
/// When built with a [`TokenAcquirer`], the request can carry
/// `Authorization: Zoho-oauthtoken <token>` and asks the acquirer to refresh
/// when the server answers 401. The failed request is not retried.
///
/// # Example
/// ```no_run
/// use zcrm_auth::http::{HttpMethod, NetworkRequest};
///
/// # async fn example() -> zcrm_auth::error::Result<()> {
/// let mut request = NetworkRequest::new();
/// request.set_base_url("https://accounts.zoho.com/oauth/v2/token")?;
/// request.add_query_params([("grant_type", "refresh_token")]);
/// request.set_method(HttpMethod::Post)?;
/// let response = request.send().await?;
/// println!("{}", response.status);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NetworkRequest {
    client: reqwest::Client,
    base_url: Option<Url>,
    method: HttpMethod,
    body: Option<Vec<u8>>,
    headers: Vec<(String, String)>,
    oauth_header: bool,
    acquirer: Option<Arc<dyn TokenAcquirer>>,
}

impl NetworkRequest {
    /// Request without authorization support.
    pub fn new() -> Self {
        Self {
            client: super::shared_client().clone(),
            base_url: Url::parse(DEFAULT_API_BASE_URL).ok(),
            method: HttpMethod::None,
            body: None,
            headers: Vec::new(),
            oauth_header: false,
            acquirer: None,
        }
    }

    /// Request that can authorize itself through `acquirer`.
    pub fn with_acquirer(acquirer: Arc<dyn TokenAcquirer>) -> Self {
        Self {
            acquirer: Some(acquirer),
            ..Self::new()
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn set_base_url(&mut self, url: &str) -> Result<()> {
        let parsed = Url::parse(url).map_err(|err| ZcrmError::InvalidUrl(format!("{url}: {err}")))?;
        self.base_url = Some(parsed);
        Ok(())
    }

    /// Append one path segment to the current URL.
    pub fn append_path(&mut self, component: &str) {
        if let Some(url) = self.base_url.as_mut() {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push(component);
            }
        }
    }

    /// Append `key=value` pairs joined by `&`, in the order given.
    ///
    /// The builder adds no encoding of its own. `url` still escapes space,
    /// `"`, `#`, `<` and `>`; pre-encode anything else that needs it.
    pub fn add_query_params<I, K, V>(&mut self, params: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let Some(url) = self.base_url.as_mut() else {
            return;
        };
        let mut query = url.query().unwrap_or_default().to_string();
        for (key, value) in params {
            if !query.is_empty() {
                query.push('&');
            }
            query.push_str(key.as_ref());
            query.push('=');
            query.push_str(value.as_ref());
        }
        if !query.is_empty() {
            url.set_query(Some(&query));
        }
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> Result<()> {
        let body = body.into();
        if body.is_empty() {
            return Err(ZcrmError::EmptyRequestBody);
        }
        self.body = Some(body);
        Ok(())
    }

    pub fn set_method(&mut self, method: HttpMethod) -> Result<()> {
        method.to_reqwest()?;
        self.method = method;
        Ok(())
    }

    /// Replace the extra headers. Every name and value must be non-empty.
    pub fn add_headers<I, K, V>(&mut self, headers: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let headers: Vec<(String, String)> = headers
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        if headers
            .iter()
            .any(|(name, value)| name.is_empty() || value.is_empty())
        {
            return Err(ZcrmError::EmptyHeader);
        }
        self.headers = headers;
        Ok(())
    }

    /// Attach the OAuth header on send. Fails while no token is available.
    pub fn enable_oauth_header(&mut self) -> Result<()> {
        self.current_token()?;
        self.oauth_header = true;
        Ok(())
    }

    pub fn url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Assemble the reqwest request, reading the access token now.
    pub fn build(&self) -> Result<reqwest::Request> {
        let url = self
            .base_url
            .clone()
            .ok_or_else(|| ZcrmError::InvalidUrl("no base URL set".to_string()))?;
        let mut builder = self.client.request(self.method.to_reqwest()?, url);

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| ZcrmError::EmptyHeader)?;
            let value = HeaderValue::from_str(value).map_err(|_| ZcrmError::EmptyHeader)?;
            headers.append(name, value);
        }
        if self.oauth_header {
            let token = self.current_token()?;
            let value = HeaderValue::from_str(&format!("{OAUTH_SCHEME} {token}"))
                .map_err(|_| AuthError::InvalidResponse("access token is not header-safe".into()))?;
            headers.insert(AUTHORIZATION, value);
        }
        builder = builder.headers(headers);
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        builder.build().map_err(ZcrmError::from)
    }

    /// Execute the request.
    ///
    /// A 401 triggers one refresh on the acquirer before this returns; the
    /// caller decides whether to send again.
    pub async fn send(&self) -> Result<ApiResponse> {
        let request = self.build()?;
        tracing::debug!(method = %self.method, path = request.url().path(), "Sending request");

        let response = self.client.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        let mut refreshed = false;
        let mut refresh_error = None;
        if status == StatusCode::UNAUTHORIZED {
            if let Some(acquirer) = &self.acquirer {
                tracing::info!("Received 401, refreshing access token");
                match acquirer.refresh().await {
                    Ok(_) => refreshed = true,
                    Err(err) => {
                        tracing::warn!(error = %err, "Refresh after 401 failed");
                        refresh_error = Some(err);
                    }
                }
            }
        }

        Ok(ApiResponse {
            status,
            headers,
            body,
            refreshed,
            refresh_error,
        })
    }

    /// Callback flavour of [`send`](Self::send): runs on a spawned task and
    /// hands the outcome to `handler`.
    pub fn send_with<F>(self, handler: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<ApiResponse>) + Send + 'static,
    {
        tokio::spawn(async move {
            let outcome = self.send().await;
            handler(outcome);
        })
    }

    fn current_token(&self) -> Result<String> {
        self.acquirer
            .as_ref()
            .and_then(|acquirer| acquirer.current_access_token())
            .filter(|token| !token.is_empty())
            .ok_or(ZcrmError::Authentication(AuthError::MissingAccessToken))
    }
}

impl Default for NetworkRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NetworkRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkRequest")
            .field("url", &self.base_url.as_ref().map(|url| url.path().to_string()))
            .field("method", &self.method)
            .field("headers", &self.headers.len())
            .field("oauth_header", &self.oauth_header)
            .field("acquirer", &self.acquirer.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Fully read response plus what the 401 hook did.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
    /// A 401 was answered with a successful refresh.
    pub refreshed: bool,
    /// A 401 was answered with a refresh that failed.
    pub refresh_error: Option<AuthError>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Turn a non-2xx status into [`ZcrmError::Api`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ZcrmError::api(self.status.as_u16(), self.body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_method_is_rejected() {
        let mut request = NetworkRequest::new();
        assert!(matches!(
            request.set_method(HttpMethod::None),
            Err(ZcrmError::InvalidMethodSelection(_))
        ));
        assert_eq!(request.method(), HttpMethod::None);
        request.set_method(HttpMethod::Put).unwrap();
        assert_eq!(request.method(), HttpMethod::Put);
    }

    #[test]
    fn unset_method_fails_at_build() {
        let request = NetworkRequest::new();
        assert!(matches!(
            request.build(),
            Err(ZcrmError::InvalidMethodSelection(_))
        ));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let mut request = NetworkRequest::new();
        assert!(matches!(
            request.set_base_url("not a url"),
            Err(ZcrmError::InvalidUrl(_))
        ));
        assert_eq!(request.url().unwrap().as_str(), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn path_and_query_are_appended_in_order() {
        let mut request = NetworkRequest::new();
        request.append_path("Purchase_Orders");
        request.add_query_params([("page", "2"), ("per_page", "50")]);
        request.add_query_params([("sort_order", "asc")]);
        assert_eq!(
            request.url().unwrap().as_str(),
            "https://www.zohoapis.com/crm/v2/Purchase_Orders?page=2&per_page=50&sort_order=asc"
        );
    }

    #[test]
    fn query_values_keep_reserved_characters() {
        let mut request = NetworkRequest::new();
        request.add_query_params([("redirect_uri", "https://www.example.com/cb"), ("q", "a b")]);
        assert_eq!(
            request.url().unwrap().query(),
            Some("redirect_uri=https://www.example.com/cb&q=a%20b")
        );
    }

    #[test]
    fn empty_body_is_rejected() {
        let mut request = NetworkRequest::new();
        assert!(matches!(
            request.set_body(Vec::new()),
            Err(ZcrmError::EmptyRequestBody)
        ));
        request.set_body("{}").unwrap();
    }

    #[test]
    fn empty_header_name_or_value_is_rejected() {
        let mut request = NetworkRequest::new();
        assert!(matches!(
            request.add_headers([("", "value")]),
            Err(ZcrmError::EmptyHeader)
        ));
        assert!(matches!(
            request.add_headers([("X-Test", "")]),
            Err(ZcrmError::EmptyHeader)
        ));
        request.add_headers([("X-Test", "1")]).unwrap();
    }

    #[test]
    fn oauth_header_needs_an_acquirer() {
        let mut request = NetworkRequest::new();
        match request.enable_oauth_header() {
            Err(ZcrmError::Authentication(AuthError::MissingAccessToken)) => {}
            other => panic!("expected MissingAccessToken, got {other:?}"),
        }
    }

    #[test]
    fn method_names_render_uppercase() {
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
    }
}
