//! Cloud Client: a reqwest-based client over the cloud print REST API
//! with transparent OAuth refresh and structured errors.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use connector_core::{CapabilityDocument, NativePrinter, OptionMap, PrinterDiff, PrintTicket};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::{Notify, RwLock};
use tracing::debug;

use crate::error::CloudApiError;
use crate::token::{self, OAuthConfig, Token};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudJob {
    pub cloud_job_id: String,
    pub cloud_printer_id: String,
    pub ticket_url: String,
    pub file_url: String,
    pub owner_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudPrinterSummary {
    pub cloud_id: String,
    pub native_name: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListResult {
    pub printers: Vec<CloudPrinterSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proximity_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareScope {
    User,
    Domain,
    Public,
}

pub struct CloudClient {
    http: reqwest::Client,
    base_url: String,
    oauth: OAuthConfig,
    token: Arc<RwLock<Option<Token>>>,
    closed: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    retryable: bool,
}

impl CloudClient {
    pub fn new(base_url: impl Into<String>, oauth: OAuthConfig) -> Self {
        CloudClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            oauth,
            token: Arc::new(RwLock::new(None)),
            closed: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn access_token(&self) -> Result<String, CloudApiError> {
        {
            let guard = self.token.read().await;
            if let Some(token) = guard.as_ref() {
                if !token.is_expired() {
                    return Ok(token.access_token.clone());
                }
            }
        }
        let fresh = token::refresh(&self.http, &self.oauth).await?;
        let access_token = fresh.access_token.clone();
        *self.token.write().await = Some(fresh);
        Ok(access_token)
    }

    async fn force_refresh(&self) -> Result<String, CloudApiError> {
        let fresh = token::refresh(&self.http, &self.oauth).await?;
        let access_token = fresh.access_token.clone();
        *self.token.write().await = Some(fresh);
        Ok(access_token)
    }

    /// Every request method routes through here: attach the bearer token,
    /// refresh and retry exactly once on 401.
    async fn authorized_request(
        &self,
        build: impl Fn(&reqwest::Client, &str) -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, CloudApiError> {
        let token = self.access_token().await?;
        let res = build(&self.http, &token).send().await?;

        if res.status() == StatusCode::UNAUTHORIZED {
            debug!("cloud api returned 401, refreshing token and retrying once");
            let token = self.force_refresh().await?;
            return Ok(build(&self.http, &token).send().await?);
        }
        Ok(res)
    }

    async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, CloudApiError> {
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        let (message, retryable) = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(parsed) => (parsed.message, parsed.retryable),
            Err(_) => (body, status.is_server_error()),
        };
        Err(CloudApiError::Http {
            status,
            message,
            retryable,
        })
    }

    pub async fn list(&self) -> Result<ListResult, CloudApiError> {
        let url = self.url("printers");
        let res = self
            .authorized_request(|http, token| http.get(&url).bearer_auth(token))
            .await?;
        let res = Self::check_status(res).await?;
        Ok(res.json().await?)
    }

    pub async fn register(
        &self,
        printer: &NativePrinter,
        ppd: &str,
    ) -> Result<String, CloudApiError> {
        #[derive(Serialize)]
        struct RegisterRequest<'a> {
            native_name: &'a str,
            display_name: &'a str,
            description: &'a CapabilityDocument,
            ppd: &'a str,
            tags: &'a connector_core::Tags,
        }
        #[derive(Deserialize)]
        struct RegisterResponse {
            cloud_id: String,
        }

        let url = self.url("printers/register");
        let body = RegisterRequest {
            native_name: &printer.identity.native_name,
            display_name: &printer.presentation.display_name,
            description: &printer.description,
            ppd,
            tags: &printer.tags,
        };
        let res = self
            .authorized_request(|http, token| http.post(&url).bearer_auth(token).json(&body))
            .await?;
        let res = Self::check_status(res).await?;
        Ok(res.json::<RegisterResponse>().await?.cloud_id)
    }

    pub async fn update(&self, diff: &PrinterDiff, ppd: Option<&str>) -> Result<(), CloudApiError> {
        let Some(cloud_id) = diff.existing.as_ref().map(|m| m.cloud_id.clone()) else {
            return Err(CloudApiError::Http {
                status: StatusCode::BAD_REQUEST,
                message: "update requires an existing cloud id".to_string(),
                retryable: false,
            });
        };

        #[derive(Serialize)]
        struct UpdateRequest<'a> {
            cloud_id: &'a str,
            description: Option<&'a CapabilityDocument>,
            ppd: Option<&'a str>,
        }
        let url = self.url("printers/update");
        let body = UpdateRequest {
            cloud_id: &cloud_id,
            description: diff.printer.as_ref().map(|p| &p.description),
            ppd,
        };
        let res = self
            .authorized_request(|http, token| http.post(&url).bearer_auth(token).json(&body))
            .await?;
        Self::check_status(res).await?;
        Ok(())
    }

    pub async fn delete(&self, cloud_id: &str) -> Result<(), CloudApiError> {
        let url = self.url(&format!("printers/{cloud_id}"));
        let res = self
            .authorized_request(|http, token| http.delete(&url).bearer_auth(token))
            .await?;
        Self::check_status(res).await?;
        Ok(())
    }

    pub async fn share(&self, cloud_id: &str, scope: ShareScope) -> Result<(), CloudApiError> {
        #[derive(Serialize)]
        struct ShareRequest<'a> {
            cloud_id: &'a str,
            scope: ShareScope,
        }
        let url = self.url("printers/share");
        let body = ShareRequest { cloud_id, scope };
        let res = self
            .authorized_request(|http, token| http.post(&url).bearer_auth(token).json(&body))
            .await?;
        Self::check_status(res).await?;
        Ok(())
    }

    pub async fn ticket(&self, ticket_url: &str) -> Result<PrintTicket, CloudApiError> {
        let res = self
            .authorized_request(|http, token| http.get(ticket_url).bearer_auth(token))
            .await?;
        let res = Self::check_status(res).await?;
        Ok(res.json().await?)
    }

    /// Download `file_url` to `dest`, streaming the body to disk.
    pub async fn download(&self, dest: &Path, file_url: &str) -> Result<u64, CloudApiError> {
        use tokio::io::AsyncWriteExt;

        let res = self
            .authorized_request(|http, token| http.get(file_url).bearer_auth(token))
            .await?;
        let mut res = Self::check_status(res).await?;
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| CloudApiError::Http {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("creating download destination: {e}"),
                retryable: false,
            })?;
        let mut written = 0u64;
        while let Some(chunk) = res.chunk().await? {
            file.write_all(&chunk).await.map_err(|e| CloudApiError::Http {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("writing download chunk: {e}"),
                retryable: false,
            })?;
            written += chunk.len() as u64;
        }
        Ok(written)
    }

    pub async fn control(
        &self,
        job_id: &str,
        state: connector_core::CloudJobState,
        native_status: &str,
        message: Option<&str>,
    ) -> Result<(), CloudApiError> {
        #[derive(Serialize)]
        struct ControlRequest<'a> {
            job_id: &'a str,
            state: connector_core::CloudJobState,
            native_status: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            message: Option<&'a str>,
        }
        let url = self.url("jobs/control");
        let body = ControlRequest {
            job_id,
            state,
            native_status,
            message,
        };
        let res = self
            .authorized_request(|http, token| http.post(&url).bearer_auth(token).json(&body))
            .await?;
        Self::check_status(res).await?;
        Ok(())
    }

    /// Long-poll for the next batch of jobs. Returns `Closed` once `quit()`
    /// has been called.
    pub async fn next_job_batch(&self) -> Result<Vec<CloudJob>, CloudApiError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CloudApiError::Closed);
        }
        let url = self.url("jobs/fetch");
        tokio::select! {
            res = self.authorized_request(|http, token| http.get(&url).bearer_auth(token).timeout(Duration::from_secs(60))) => {
                if self.closed.load(Ordering::SeqCst) {
                    return Err(CloudApiError::Closed);
                }
                let res = Self::check_status(res?).await?;
                Ok(res.json().await?)
            }
            _ = self.wake.notified() => Err(CloudApiError::Closed),
        }
    }

    /// Unblocks any in-flight `next_job_batch` call and makes future calls
    /// return `Closed` immediately.
    pub fn quit(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    pub async fn get_robot_access_token(&self) -> Result<String, CloudApiError> {
        self.access_token().await
    }

    pub async fn fcm_subscribe(&self, path: &str) -> Result<(String, Duration), CloudApiError> {
        #[derive(Deserialize)]
        struct FcmSubscribeResponse {
            token: String,
            ttl_seconds: u64,
        }
        let url = self.url(&format!("fcm/subscribe/{path}"));
        let res = self
            .authorized_request(|http, token| http.post(&url).bearer_auth(token))
            .await?;
        let res = Self::check_status(res).await?;
        let body: FcmSubscribeResponse = res.json().await?;
        Ok((body.token, Duration::from_secs(body.ttl_seconds)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth() -> OAuthConfig {
        OAuthConfig {
            token_url: "https://example.invalid/token".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
        }
    }

    #[tokio::test]
    async fn quit_makes_next_job_batch_return_closed() {
        let client = CloudClient::new("https://example.invalid", oauth());
        client.quit();
        let result = client.next_job_batch().await;
        assert!(matches!(result, Err(CloudApiError::Closed)));
    }

    #[test]
    fn url_joins_base_and_path_regardless_of_slashes() {
        let client = CloudClient::new("https://example.invalid/api/", oauth());
        assert_eq!(client.url("/printers"), "https://example.invalid/api/printers");
        assert_eq!(client.url("printers"), "https://example.invalid/api/printers");
    }
}
