//! CRM module listing on top of [`NetworkRequest`].

use std::sync::Arc;

use reqwest::StatusCode;

use crate::auth::TokenAcquirer;
use crate::error::{Result, ZcrmError};
use crate::http::{ApiResponse, HttpMethod, NetworkRequest, DEFAULT_API_BASE_URL};
use crate::records::{decode_page, Record, RecordPage};

/// Reads records from Zoho CRM modules with an OAuth-authorized acquirer.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use zcrm_auth::api::CrmClient;
/// use zcrm_auth::auth::{Credentials, StorageOption, TokenManager};
///
/// # async fn example() -> zcrm_auth::error::Result<()> {
/// # let credentials = Credentials::builder()
/// #     .client_id("1000.CLIENT").client_secret("secret-value")
/// #     .redirect_uri("https://www.example.com").auth_code("1000.code").build();
/// let manager = Arc::new(TokenManager::new(credentials, Some(3600)));
/// manager.begin_flow(StorageOption::InMemory).await?;
///
/// let client = CrmClient::new(manager);
/// for record in client.get_records("Purchase_Orders").await? {
///     println!("{:?}", record.id);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CrmClient {
    acquirer: Arc<dyn TokenAcquirer>,
    base_url: String,
    client: Option<reqwest::Client>,
}

impl CrmClient {
    pub fn new(acquirer: Arc<dyn TokenAcquirer>) -> Self {
        Self {
            acquirer,
            base_url: DEFAULT_API_BASE_URL.to_string(),
            client: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// All records of the first page of `module`.
    pub async fn get_records(&self, module: &str) -> Result<Vec<Record>> {
        self.get_page(module, &[]).await.map(|page| page.data)
    }

    /// One page of `module`, with extra query parameters (`page`, `per_page`, ...).
    ///
    /// Waits for the acquirer when no token is available yet. A 401 is
    /// retried exactly once after the acquirer refreshed.
    pub async fn get_page(&self, module: &str, params: &[(&str, &str)]) -> Result<RecordPage> {
        if self.acquirer.current_access_token().is_none() {
            self.acquirer.wait_ready().await?;
        }

        let mut response = self.list(module, params).await?;
        if response.is_unauthorized() {
            if let Some(err) = response.refresh_error.take() {
                return Err(ZcrmError::Authentication(err));
            }
            if response.refreshed {
                tracing::info!(module, "Retrying request with refreshed token");
                response = self.list(module, params).await?;
            }
        }

        if response.status == StatusCode::NO_CONTENT {
            return Ok(RecordPage::default());
        }
        let response = response.error_for_status()?;
        decode_page(&response.body)
    }

    async fn list(&self, module: &str, params: &[(&str, &str)]) -> Result<ApiResponse> {
        let mut request = NetworkRequest::with_acquirer(self.acquirer.clone());
        if let Some(client) = &self.client {
            request = request.with_client(client.clone());
        }
        request.set_base_url(&self.base_url)?;
        request.append_path(module);
        request.add_query_params(params.iter().copied());
        request.set_method(HttpMethod::Get)?;
        request.enable_oauth_header()?;
        request.send().await
    }
}

impl std::fmt::Debug for CrmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrmClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
