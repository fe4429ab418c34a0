use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use super::{CreateJobResponse, ImportBackend, JobRequest, JobStatusReport};
use crate::error::{ImportError, Result};
use crate::models::{ColumnMode, EntityKind, FieldCatalog};

/// REST client for the accounting backend's import endpoints.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ImportError::Settings(
                "no API URL configured; run `ledgerport init --api-url <URL>`".into(),
            ));
        }
        let client = Client::builder()
            .user_agent(concat!("ledgerport/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn url(&self, entity: EntityKind, path: &str) -> String {
        format!("{}/{}/import{}", self.base_url, entity.key(), path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ImportError::Transport(format!(
            "{status}: {}",
            extract_message(&body).unwrap_or(body)
        )))
    }
}

/// Pull `message` or `error` out of a JSON error body.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|k| value.get(*k)?.as_str().map(str::to_string))
}

#[async_trait]
impl ImportBackend for HttpBackend {
    async fn field_catalog(
        &self,
        entity: EntityKind,
        column_mode: Option<ColumnMode>,
    ) -> Result<FieldCatalog> {
        let mut request = self.client.get(self.url(entity, "/fields"));
        if let Some(mode) = column_mode {
            request = request.query(&[("columnMode", mode.key())]);
        }
        debug!(%entity, "fetching field catalog");
        Ok(self.send(request).await?.json().await?)
    }

    async fn download_template(&self, entity: EntityKind) -> Result<Vec<u8>> {
        let request = self.client.get(self.url(entity, "/sample"));
        Ok(self.send(request).await?.bytes().await?.to_vec())
    }

    async fn create_job(&self, request: JobRequest) -> Result<CreateJobResponse> {
        let mapping = serde_json::to_string(&request.mapping)
            .map_err(|e| ImportError::Other(format!("failed to encode mapping: {e}")))?;
        let file = Part::bytes(request.bytes)
            .file_name(request.file_name)
            .mime_str(request.mime)?;
        let mut form = Form::new().part("file", file).text("mapping", mapping);
        for (name, value) in request.options {
            form = form.text(name, value);
        }
        let http = self.client.post(self.url(request.entity, "")).multipart(form);
        Ok(self.send(http).await?.json().await?)
    }

    async fn job_status(&self, entity: EntityKind, import_id: &str) -> Result<JobStatusReport> {
        let request = self.client.get(self.url(entity, &format!("/{import_id}")));
        Ok(self.send(request).await?.json().await?)
    }
}
