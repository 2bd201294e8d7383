//! Utility modules shared by the extractors.
//!
//! - [`normalize_text`], [`strip_boilerplate`], [`strip_issn`]: text
//!   normalization applied to every extracted field
//! - [`clean_text`]: the same for raw markup fragments
//! - [`parse_date`]: lenient date parsing into [`chrono::NaiveDate`]
//! - [`compute_uid`]: content hash identifying a raw document
//! - [`chunk_text`]: word-preserving chunking for plain PDF text
//! - [`HttpClient`]: `reqwest` client with bounded timeouts
//! - [`find_files`]: input discovery for batch runs
//!
//! # Normalization
//!
//! ```rust
//! use scholaretl::utils::{clean_text, strip_issn};
//!
//! assert_eq!(clean_text("<p>Hello   <b>world</b></p>"), "Hello world");
//! assert_eq!(strip_issn("Nature 1234-5678").name.as_deref(), Some("Nature"));
//! ```
//!
//! # Identity
//!
//! ```rust
//! use scholaretl::utils::compute_uid;
//!
//! assert_eq!(compute_uid(b"same bytes"), compute_uid(b"same bytes"));
//! ```

mod chunk;
mod date;
mod files;
mod http;
mod text;
mod uid;

pub use chunk::chunk_text;
pub use date::{date_from_parts, parse_date, parse_month};
pub use files::{find_files, FileDiscoveryError};
pub use http::{HttpClient, USER_AGENT};
pub use text::{
    clean_text, collapse_whitespace, non_empty, normalize_issn, normalize_text, strip_boilerplate,
    strip_issn,
    JournalParts, NormalizationPolicy, DEFAULT_BOILERPLATE_SECTIONS, DEFAULT_ISSN_PATTERN,
};
pub use uid::{compute_uid, is_valid_uid, UID_LEN, UID_SCHEME};
