//! HTTP client for a running netmon server

use crate::{
    error::{AppError, Result},
    models::RoundView,
    server::ApiErrorResponse,
    types::MeasurementKind,
};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

/// Calls the on-demand endpoints of a netmon server
#[derive(Debug, Clone)]
pub struct NetmonClient {
    base: Url,
    http: Client,
}

impl NetmonClient {
    /// `timeout` should exceed the server's request timeout, since speed tests are slow
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(format!("netmon/{}", crate::VERSION))
            .build()
            .map_err(|e| AppError::http_request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// URL of the on-demand endpoint for `kind` and `ids`
    pub fn round_url<S: AsRef<str>>(&self, kind: MeasurementKind, ids: &[S]) -> Result<Url> {
        let joined: Vec<&str> = ids.iter().map(|id| id.as_ref().trim()).collect();
        let mut url = self.base.join(&format!("api/v1/{}/", kind.as_str()))?;
        url.path_segments_mut()
            .map_err(|_| AppError::config(format!("Server URL cannot be a base: {}", self.base)))?
            .pop_if_empty()
            .push(&joined.join(","));
        Ok(url)
    }

    /// Response body of an on-demand round, unparsed
    pub async fn round_raw<S: AsRef<str>>(&self, kind: MeasurementKind, ids: &[S]) -> Result<String> {
        let url = self.round_url(kind, ids)?;
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            let detail = serde_json::from_str::<ApiErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or_else(|_| body.trim().to_string());
            return Err(AppError::http_request(format!(
                "{} returned {}: {}",
                url, status, detail
            )));
        }

        Ok(body)
    }

    /// Run an on-demand round on the server and decode its results
    pub async fn round<S: AsRef<str>>(&self, kind: MeasurementKind, ids: &[S]) -> Result<RoundView> {
        let body = self.round_raw(kind, ids).await?;
        Ok(serde_json::from_str(&body)?)
    }
}
