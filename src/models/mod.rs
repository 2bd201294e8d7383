//! Core data model: the canonical article record.

mod article;

pub use article::{adjust_abstract, Article, ArticleBuilder, ValidationError, ABSTRACT_SECTION};
