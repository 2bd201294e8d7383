//! Grobid pipeline adapter.
//!
//! PDF bytes are posted to a Grobid service, and the TEI it returns is
//! handed to [`TeiParser`]. The record's uid is computed over the PDF bytes,
//! so the same PDF always maps to the same uid whatever Grobid returns.

use reqwest::multipart::{Form, Part};
use tracing::{debug, info, instrument};
use url::Url;

use super::xml::parse_document;
use super::{Extraction, ParseError, TeiParser, UpstreamError};
use crate::config::GrobidConfig;
use crate::utils::{compute_uid, HttpClient};

/// Grobid endpoint for full document processing
pub const PROCESS_FULLTEXT_PATH: &str = "/api/processFulltextDocument";

/// Longest error body kept from a rejected request
const MAX_ERROR_BODY: usize = 512;

/// Client for a Grobid service
#[derive(Debug, Clone)]
pub struct GrobidClient {
    endpoint: Option<String>,
    http: HttpClient,
    tei: TeiParser,
}

impl GrobidClient {
    /// Create a client from resolved settings.
    ///
    /// A missing base URL is accepted here and reported as
    /// [`UpstreamError::NotConfigured`] on the first call instead.
    pub fn new(config: GrobidConfig, tei: TeiParser) -> Result<Self, UpstreamError> {
        let endpoint = match config.base_url() {
            Some(base) => Some(endpoint_for(base)?),
            None => None,
        };
        let http =
            HttpClient::from_config(&config).map_err(|e| UpstreamError::Client(e.to_string()))?;

        Ok(Self {
            endpoint,
            http,
            tei,
        })
    }

    /// Full URL requests are sent to, if configured
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Send a PDF to Grobid and extract the returned TEI
    #[instrument(skip(self, pdf, params), fields(bytes = pdf.len()))]
    pub async fn extract(
        &self,
        pdf: &[u8],
        params: &[(String, String)],
    ) -> Result<Extraction, ParseError> {
        let tei = self.process_fulltext(pdf, params).await?;
        let root = parse_document(&tei)
            .map_err(|e| UpstreamError::InvalidResponse(format!("unparseable TEI: {e}")))?;
        if !root.is("TEI") {
            return Err(UpstreamError::InvalidResponse(format!(
                "expected a TEI document, found <{}>",
                root.name()
            ))
            .into());
        }

        Ok(self.tei.extract_tree(&root, compute_uid(pdf)))
    }

    /// Send a PDF to Grobid and return the raw TEI bytes
    pub async fn process_fulltext(
        &self,
        pdf: &[u8],
        params: &[(String, String)],
    ) -> Result<Vec<u8>, UpstreamError> {
        let endpoint = self.endpoint.as_deref().ok_or(UpstreamError::NotConfigured)?;

        let input = Part::bytes(pdf.to_vec())
            .file_name("input.pdf")
            .mime_str("application/pdf")
            .map_err(|e| UpstreamError::Client(e.to_string()))?;
        let form = params
            .iter()
            .fold(Form::new().part("input", input), |form, (key, value)| {
                form.text(key.clone(), value.clone())
            });

        info!("Sending {} bytes to {}", pdf.len(), endpoint);
        let response = self
            .http
            .client()
            .post(endpoint)
            .header("Accept", "application/xml")
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!("Grobid answered with status {}", status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                body: truncate(body.trim(), MAX_ERROR_BODY),
            });
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(UpstreamError::InvalidResponse(format!(
                "empty body with status {status}"
            )));
        }
        Ok(body.to_vec())
    }

    fn transport_error(&self, error: reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout(self.http.timeout())
        } else {
            UpstreamError::Unreachable(error.to_string())
        }
    }
}

fn endpoint_for(base: &str) -> Result<String, UpstreamError> {
    let url = Url::parse(base).map_err(|e| UpstreamError::InvalidUrl(format!("{base}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UpstreamError::InvalidUrl(format!(
            "{base}: unsupported scheme {}",
            url.scheme()
        )));
    }
    Ok(format!(
        "{}{}",
        url.as_str().trim_end_matches('/'),
        PROCESS_FULLTEXT_PATH
    ))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
