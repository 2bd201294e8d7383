//! Format extractors turning raw documents into [`Article`] records.
//!
//! Every markup and PDF extractor implements [`ArticleParser`]. The
//! [`Extractor`] enum is the closed set of extractors a caller can pick from
//! a declared [`SourceFormat`]; it also covers the Grobid adapter, the only
//! extractor that performs network I/O.
//!
//! # Failure model
//!
//! - A document that cannot be read as its declared format fails the whole
//!   call with [`ParseError::MalformedInput`].
//! - A field that is missing or cannot be normalized is left absent and
//!   reported as a [`FieldWarning`] in the [`Extraction`]; it never fails the
//!   call.
//! - Grobid failures surface as [`ParseError::Upstream`].
//!
//! ```rust
//! use scholaretl::parsers::{ArticleParser, JatsParser};
//!
//! let xml = br#"<article><front><article-meta><title-group>
//!     <article-title>Example</article-title>
//! </title-group></article-meta></front></article>"#;
//! let article = JatsParser::default().parse(xml).unwrap();
//! assert_eq!(article.title.as_deref(), Some("Example"));
//! assert!(article.authors.is_empty());
//! ```

mod grobid;
mod jats;
mod pdf;
mod pubmed;
mod tei;
pub mod xml;
mod xocs;

pub use grobid::{GrobidClient, PROCESS_FULLTEXT_PATH};
pub use jats::JatsParser;
pub use pdf::{PdfParser, CHUNK_SECTION};
pub use pubmed::PubMedParser;
pub use tei::TeiParser;
pub use xocs::XocsParser;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::config::{ConfigError, Settings};
use crate::models::Article;
use crate::utils::{non_empty, NormalizationPolicy};

/// Source formats accepted on input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// JATS XML (PubMed Central, bioRxiv, medRxiv)
    JatsXml,
    /// MECA zip archive holding one JATS document
    JatsMeca,
    /// One PubMed citation
    PubMedXml,
    /// A `PubmedArticleSet`, optionally gzip-compressed
    PubMedXmlSet,
    /// TEI XML, hand-authored or produced by Grobid
    TeiXml,
    /// Elsevier/Scopus XOCS XML
    XocsXml,
    /// Plain text of a PDF
    PyPdf,
    /// PDF sent through Grobid
    GrobidPdf,
}

impl SourceFormat {
    /// Every format, in display order
    pub const ALL: [SourceFormat; 8] = [
        SourceFormat::JatsXml,
        SourceFormat::JatsMeca,
        SourceFormat::PubMedXml,
        SourceFormat::PubMedXmlSet,
        SourceFormat::TeiXml,
        SourceFormat::XocsXml,
        SourceFormat::PyPdf,
        SourceFormat::GrobidPdf,
    ];

    /// Identifier used on the command line and in error messages
    pub fn id(&self) -> &'static str {
        match self {
            SourceFormat::JatsXml => "jats-xml",
            SourceFormat::JatsMeca => "jats-meca",
            SourceFormat::PubMedXml => "pubmed-xml",
            SourceFormat::PubMedXmlSet => "pubmed-xml-set",
            SourceFormat::TeiXml => "tei-xml",
            SourceFormat::XocsXml => "xocs-xml",
            SourceFormat::PyPdf => "pypdf",
            SourceFormat::GrobidPdf => "grobidpdf",
        }
    }

    /// Whether the input is a PDF
    pub fn is_pdf(&self) -> bool {
        matches!(self, SourceFormat::PyPdf | SourceFormat::GrobidPdf)
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.id() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(|f| f.id()).collect();
                format!("unknown format '{s}', expected one of: {}", known.join(", "))
            })
    }
}

/// Errors that fail a whole extraction call
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The raw bytes are not a valid document of the declared format
    #[error("malformed {format} input: {message}")]
    MalformedInput {
        format: SourceFormat,
        message: String,
    },

    /// The Grobid collaborator failed
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// IO error (reading inputs)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    pub fn malformed(format: SourceFormat, message: impl fmt::Display) -> Self {
        ParseError::MalformedInput {
            format,
            message: message.to_string(),
        }
    }
}

/// Failures of the Grobid collaborator
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// No base URL configured; no request was attempted
    #[error("grobid url is not configured")]
    NotConfigured,

    /// The configured base URL cannot be used
    #[error("invalid grobid url: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be created
    #[error("failed to create http client: {0}")]
    Client(String),

    /// Connection failed
    #[error("grobid unreachable: {0}")]
    Unreachable(String),

    /// No response within the configured timeout
    #[error("grobid timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success status
    #[error("grobid rejected the document with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Success status but the body is not usable TEI
    #[error("invalid grobid response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Whether the failure comes from configuration rather than the service
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            UpstreamError::NotConfigured | UpstreamError::InvalidUrl(_) | UpstreamError::Client(_)
        )
    }

    /// Whether retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Unreachable(_) | UpstreamError::Timeout(_) => true,
            UpstreamError::Rejected { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Why a single field was left absent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("{0} not found")]
    Missing(&'static str),

    #[error("invalid {field}: {value:?}")]
    Invalid { field: &'static str, value: String },
}

impl FieldError {
    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        FieldError::Invalid {
            field,
            value: value.into(),
        }
    }
}

/// Outcome of extracting one field
pub type FieldResult<T> = Result<T, FieldError>;

/// A field-level failure absorbed during extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWarning {
    pub field: &'static str,
    pub error: FieldError,
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.error)
    }
}

/// A record together with the field warnings raised while building it
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub article: Article,
    pub warnings: Vec<FieldWarning>,
}

impl Extraction {
    /// Whether a warning was recorded for the field
    pub fn has_warning(&self, field: &str) -> bool {
        self.warnings.iter().any(|w| w.field == field)
    }
}

impl From<(Article, Vec<FieldWarning>)> for Extraction {
    fn from((article, warnings): (Article, Vec<FieldWarning>)) -> Self {
        Self { article, warnings }
    }
}

/// A synchronous extractor for one source format
pub trait ArticleParser {
    /// Format this parser reads
    fn format(&self) -> SourceFormat;

    /// Extract a record and the warnings raised for its fields
    fn extract(&self, raw: &[u8]) -> Result<Extraction, ParseError>;

    /// Extract a record, discarding field warnings
    fn parse(&self, raw: &[u8]) -> Result<Article, ParseError> {
        self.extract(raw).map(|extraction| extraction.article)
    }
}

/// `Ok(value)` for a non-empty value, `Missing(field)` otherwise
pub(crate) fn present(value: Option<String>, field: &'static str) -> FieldResult<String> {
    value.and_then(non_empty).ok_or(FieldError::Missing(field))
}

/// The closed set of extractors, selected by declared format
#[derive(Debug, Clone)]
pub enum Extractor {
    /// JATS XML, or a MECA archive wrapping it
    Jats { parser: JatsParser, meca: bool },
    /// A PubMed citation, or a whole article set
    PubMed { parser: PubMedParser, set: bool },
    Tei(TeiParser),
    Xocs(XocsParser),
    /// PDF plain text
    PdfPlain(PdfParser),
    /// PDF through Grobid, with extra form parameters
    Grobid {
        client: GrobidClient,
        params: Vec<(String, String)>,
    },
}

impl Extractor {
    /// Build the extractor for a format from resolved settings
    pub fn from_settings(format: SourceFormat, settings: &Settings) -> Result<Self, ConfigError> {
        let policy = NormalizationPolicy::from_config(&settings.extraction)?;
        let extractor = match format {
            SourceFormat::JatsXml | SourceFormat::JatsMeca => Extractor::Jats {
                parser: JatsParser::new(policy),
                meca: format == SourceFormat::JatsMeca,
            },
            SourceFormat::PubMedXml | SourceFormat::PubMedXmlSet => Extractor::PubMed {
                parser: PubMedParser::new(policy),
                set: format == SourceFormat::PubMedXmlSet,
            },
            SourceFormat::TeiXml => Extractor::Tei(TeiParser::new(policy)),
            SourceFormat::XocsXml => Extractor::Xocs(XocsParser::new(policy)),
            SourceFormat::PyPdf => {
                Extractor::PdfPlain(PdfParser::new(settings.pdf.chunk_size, policy))
            }
            SourceFormat::GrobidPdf => Extractor::Grobid {
                client: GrobidClient::new(settings.grobid.clone(), TeiParser::new(policy))?,
                params: Vec::new(),
            },
        };
        Ok(extractor)
    }

    /// Attach Grobid form parameters; ignored by other extractors
    pub fn with_params(mut self, extra: Vec<(String, String)>) -> Self {
        if let Extractor::Grobid { params, .. } = &mut self {
            params.extend(extra);
        }
        self
    }

    /// Format handled by this extractor
    pub fn format(&self) -> SourceFormat {
        match self {
            Extractor::Jats { meca: true, .. } => SourceFormat::JatsMeca,
            Extractor::Jats { .. } => SourceFormat::JatsXml,
            Extractor::PubMed { set: true, .. } => SourceFormat::PubMedXmlSet,
            Extractor::PubMed { .. } => SourceFormat::PubMedXml,
            Extractor::Tei(_) => SourceFormat::TeiXml,
            Extractor::Xocs(_) => SourceFormat::XocsXml,
            Extractor::PdfPlain(_) => SourceFormat::PyPdf,
            Extractor::Grobid { .. } => SourceFormat::GrobidPdf,
        }
    }

    /// Extract every article contained in a raw input.
    ///
    /// Only PubMed article sets hold more than one.
    pub async fn extract_all(&self, raw: &[u8]) -> Result<Vec<Extraction>, ParseError> {
        match self {
            Extractor::PubMed { parser, set: true } => parser.extract_set(raw),
            _ => Ok(vec![self.extract(raw).await?]),
        }
    }

    /// Extract a single article
    pub async fn extract(&self, raw: &[u8]) -> Result<Extraction, ParseError> {
        match self {
            Extractor::Jats { parser, meca: false } => parser.extract(raw),
            Extractor::Jats { parser, meca: true } => parser.extract_meca(raw),
            Extractor::PubMed { parser, set: false } => parser.extract(raw),
            Extractor::PubMed { parser, set: true } => {
                let mut extractions = parser.extract_set(raw)?;
                match extractions.len() {
                    1 => Ok(extractions.remove(0)),
                    n => Err(ParseError::malformed(
                        SourceFormat::PubMedXmlSet,
                        format!("expected a single article, found {n}"),
                    )),
                }
            }
            Extractor::Tei(parser) => parser.extract(raw),
            Extractor::Xocs(parser) => parser.extract(raw),
            Extractor::PdfPlain(parser) => parser.extract(raw),
            Extractor::Grobid { client, params } => client.extract(raw, params).await,
        }
    }

    /// Extract a single article, discarding field warnings
    pub async fn parse(&self, raw: &[u8]) -> Result<Article, ParseError> {
        self.extract(raw).await.map(|extraction| extraction.article)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names_round_trip() {
        for format in SourceFormat::ALL {
            assert_eq!(format.id().parse::<SourceFormat>().unwrap(), format);
        }
        assert_eq!("PubMed_XML".parse::<SourceFormat>().unwrap(), SourceFormat::PubMedXml);
        let err = "docx".parse::<SourceFormat>().unwrap_err();
        assert!(err.contains("jats-xml"));
    }

    #[test]
    fn test_upstream_error_kinds() {
        assert!(UpstreamError::NotConfigured.is_configuration());
        assert!(!UpstreamError::NotConfigured.is_transient());
        assert!(UpstreamError::Timeout(Duration::from_secs(1)).is_transient());
        let rejected = UpstreamError::Rejected {
            status: 400,
            body: String::new(),
        };
        assert!(!rejected.is_configuration());
        assert!(!rejected.is_transient());
    }

    #[test]
    fn test_extractor_from_settings() {
        let settings = Settings::default();
        for format in SourceFormat::ALL {
            let extractor = Extractor::from_settings(format, &settings).unwrap();
            assert_eq!(extractor.format(), format);
        }
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let mut settings = Settings::default();
        settings.extraction.issn_pattern = "(".to_string();
        assert!(Extractor::from_settings(SourceFormat::JatsXml, &settings).is_err());
    }

    #[test]
    fn test_field_warning_display() {
        let warning = FieldWarning {
            field: "date",
            error: FieldError::invalid("date", "32 Foo"),
        };
        assert_eq!(warning.to_string(), "date: invalid date: \"32 Foo\"");
    }

    #[tokio::test]
    async fn test_dispatch_jats() {
        let extractor = Extractor::from_settings(SourceFormat::JatsXml, &Settings::default()).unwrap();
        let xml = b"<article><front><article-meta><title-group><article-title>T</article-title></title-group></article-meta></front></article>";
        let all = extractor.extract_all(xml).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].article.title.as_deref(), Some("T"));
    }
}
