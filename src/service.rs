//! The HTTP boundary to the remote conversion service.
//!
//! The service is an opaque collaborator. This client relies on two
//! endpoints only:
//!
//! | Request | Response |
//! |---------|----------|
//! | `GET /supported-formats` | `{"formats": ["jpeg", …]}` |
//! | `POST /convert/` (multipart `file` + `params`) | converted image bytes, or `{"detail": …}` on error |
//!
//! [`ConversionService`] is the seam the orchestrator talks to;
//! [`HttpConversionService`] is the real implementation over `reqwest`.

use crate::config::{default_formats, ClientConfig};
use crate::error::ImgConvError;
use crate::params::ConversionParams;
use crate::selection::SelectedFile;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Something that can convert images.
pub trait ConversionService: Send + Sync {
    /// Output formats the service can produce.
    fn supported_formats(&self) -> impl Future<Output = Result<Vec<String>, ImgConvError>> + Send;

    /// Convert one file, returning the converted image bytes.
    fn convert(
        &self,
        file: &SelectedFile,
        params: &ConversionParams,
    ) -> impl Future<Output = Result<Vec<u8>, ImgConvError>> + Send;
}

/// Ask `service` for its formats, falling back to [`default_formats`] when
/// the call fails or the list is empty.
pub async fn load_supported_formats<S: ConversionService>(service: &S) -> Vec<String> {
    match service.supported_formats().await {
        Ok(formats) if !formats.is_empty() => formats,
        Ok(_) => {
            warn!("Service reported no formats. Using default formats.");
            default_formats()
        }
        Err(e) => {
            warn!("Failed to load supported formats ({}). Using default formats.", e);
            default_formats()
        }
    }
}

#[derive(Debug, Deserialize)]
struct FormatsResponse {
    formats: Vec<String>,
}

/// [`ConversionService`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConversionService {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpConversionService {
    pub fn new(config: &ClientConfig) -> Result<Self, ImgConvError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ImgConvError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn transport_error(&self, url: &str, e: reqwest::Error) -> ImgConvError {
        match self.config.request_timeout_secs {
            Some(secs) if e.is_timeout() => ImgConvError::RequestTimeout {
                url: url.to_string(),
                secs,
            },
            _ => ImgConvError::RequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            },
        }
    }

    /// Send `request`, returning the body of a 2xx response or the
    /// service's error.
    async fn execute(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<u8>, ImgConvError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(url, e))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(url, e))?;

        if !status.is_success() {
            let detail = error_detail(&body).unwrap_or_else(|| format!("HTTP {status}"));
            debug!("{} → HTTP {}: {}", url, status.as_u16(), detail);
            return Err(ImgConvError::Service {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(body.to_vec())
    }
}

impl ConversionService for HttpConversionService {
    async fn supported_formats(&self) -> Result<Vec<String>, ImgConvError> {
        let url = self.config.endpoint("supported-formats");
        let body = self.execute(&url, self.client.get(&url)).await?;
        let parsed: FormatsResponse =
            serde_json::from_slice(&body).map_err(|e| ImgConvError::InvalidResponse {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        debug!("Service formats: {:?}", parsed.formats);
        Ok(parsed.formats)
    }

    async fn convert(
        &self,
        file: &SelectedFile,
        params: &ConversionParams,
    ) -> Result<Vec<u8>, ImgConvError> {
        let url = self.config.endpoint("convert/");
        let params_json = serde_json::to_string(params)
            .map_err(|e| ImgConvError::Internal(format!("params serialisation: {e}")))?;
        let part = Part::bytes(file.bytes().to_vec())
            .file_name(file.name().to_string())
            .mime_str(file.mime())
            .map_err(|e| ImgConvError::Internal(format!("invalid MIME type '{}': {e}", file.mime())))?;
        let form = Form::new().part("file", part).text("params", params_json);

        debug!("POST {} ({}, {} bytes)", url, file.name(), file.size());
        self.execute(&url, self.client.post(&url).multipart(form)).await
    }
}

/// Extract a human-readable `detail` from an error payload.
///
/// A string `detail` is returned as is; any other JSON value (validation
/// error lists, objects) is rendered compactly.
fn error_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
