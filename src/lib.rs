//! # scholaretl
//!
//! Normalizes scientific articles from heterogeneous sources into one
//! canonical [`Article`] record.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: the canonical `Article` record and its builder
//! - [`parsers`]: one extractor per source format (JATS, PubMed, TEI, XOCS,
//!   PDF text, Grobid) behind the [`Extractor`] dispatch enum
//! - [`utils`]: text and date normalization, content uids, chunking, HTTP
//! - [`config`]: settings loaded from TOML files and the environment
//!
//! ```rust
//! use scholaretl::{compute_uid, ArticleParser, JatsParser};
//!
//! let raw = br#"<article><front><article-meta><title-group>
//!     <article-title>Example</article-title>
//! </title-group></article-meta></front></article>"#;
//! let article = JatsParser::default().parse(raw).unwrap();
//! assert_eq!(article.uid, compute_uid(raw));
//! ```

pub mod config;
pub mod models;
pub mod parsers;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use models::{Article, ArticleBuilder};
pub use parsers::{
    ArticleParser, Extraction, Extractor, JatsParser, ParseError, SourceFormat, UpstreamError,
};
pub use utils::compute_uid;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
