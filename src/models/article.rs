//! Canonical article record produced by every extractor.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::parsers::{FieldError, FieldResult, FieldWarning};
use crate::utils::{is_valid_uid, non_empty};

/// Section name used for abstract paragraphs by [`Article::iter_paragraphs`]
pub const ABSTRACT_SECTION: &str = "Abstract";

/// A scientific article normalized from any supported source format.
///
/// Optional fields are `None` when the source does not provide them, never
/// empty strings. Sequences keep document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Article title
    pub title: Option<String>,

    /// Author display names
    pub authors: Vec<String>,

    /// Abstract paragraphs
    pub r#abstract: Vec<String>,

    /// `(section name, paragraph)` pairs of the body
    pub section_paragraphs: Vec<(String, String)>,

    /// PubMed identifier
    pub pubmed_id: Option<String>,

    /// PubMed Central identifier
    pub pmc_id: Option<String>,

    /// arXiv identifier
    pub arxiv_id: Option<String>,

    /// Digital Object Identifier
    pub doi: Option<String>,

    /// Content hash of the raw source bytes
    pub uid: String,

    /// Publication date
    pub date: Option<NaiveDate>,

    /// Journal name, or its ISSN when no name is available
    pub journal: Option<String>,

    /// Figure captions
    pub figures: Vec<String>,

    /// Table captions
    pub tables: Vec<String>,

    /// Article type as declared by the source
    pub article_type: Option<String>,
}

/// Structural problems found by [`Article::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("uid is not a content hash: {0:?}")]
    InvalidUid(String),

    #[error("{0} is present but empty")]
    EmptyField(&'static str),

    #[error("author at position {0} is empty")]
    EmptyAuthor(usize),
}

impl Article {
    /// Check the record invariants: a well-formed uid, no empty optional
    /// strings and no empty author names.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_valid_uid(&self.uid) {
            return Err(ValidationError::InvalidUid(self.uid.clone()));
        }

        let optionals = [
            ("title", &self.title),
            ("pubmed_id", &self.pubmed_id),
            ("pmc_id", &self.pmc_id),
            ("arxiv_id", &self.arxiv_id),
            ("doi", &self.doi),
            ("journal", &self.journal),
            ("article_type", &self.article_type),
        ];
        for (field, value) in optionals {
            if value.as_deref().is_some_and(str::is_empty) {
                return Err(ValidationError::EmptyField(field));
            }
        }

        if let Some(pos) = self.authors.iter().position(|a| a.is_empty()) {
            return Err(ValidationError::EmptyAuthor(pos));
        }
        Ok(())
    }

    /// Iterate over `(section, paragraph)` pairs, optionally starting with the
    /// abstract under the [`ABSTRACT_SECTION`] name.
    pub fn iter_paragraphs(&self, with_abstract: bool) -> impl Iterator<Item = (&str, &str)> {
        let abstract_iter = self
            .r#abstract
            .iter()
            .filter(move |_| with_abstract)
            .map(|p| (ABSTRACT_SECTION, p.as_str()));
        let body_iter = self
            .section_paragraphs
            .iter()
            .map(|(section, p)| (section.as_str(), p.as_str()));
        abstract_iter.chain(body_iter)
    }

    /// Distinct section names in order of first appearance
    pub fn section_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (section, _) in &self.section_paragraphs {
            if !names.contains(&section.as_str()) {
                names.push(section);
            }
        }
        names
    }

    /// Total characters of abstract and body text
    pub fn text_len(&self) -> usize {
        self.iter_paragraphs(true).map(|(_, p)| p.chars().count()).sum()
    }
}

impl fmt::Display for Article {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abstract_len: usize = self.r#abstract.iter().map(|p| p.chars().count()).sum();
        let body_len: usize = self
            .section_paragraphs
            .iter()
            .map(|(_, p)| p.chars().count())
            .sum();

        writeln!(f, "Title    : {}", self.title.as_deref().unwrap_or("-"))?;
        writeln!(f, "Authors  : {}", self.authors.join(", "))?;
        writeln!(
            f,
            "Abstract : {} paragraph(s), {} characters",
            self.r#abstract.len(),
            abstract_len
        )?;
        writeln!(
            f,
            "Sections : {} paragraph(s), {} characters",
            self.section_paragraphs.len(),
            body_len
        )?;
        for name in self.section_names() {
            let name = if name.is_empty() { "(untitled)" } else { name };
            writeln!(f, "  - {name}")?;
        }
        write!(f, "Length   : {} characters", abstract_len + body_len)
    }
}

/// Assembles an [`Article`] from per-field outcomes.
///
/// A failed field is replaced by its absent value and recorded as a
/// [`FieldWarning`]; it never stops the other fields from being set.
#[derive(Debug, Clone)]
pub struct ArticleBuilder {
    article: Article,
    warnings: Vec<FieldWarning>,
}

impl ArticleBuilder {
    /// Start a record for the document with the given uid
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            article: Article {
                uid: uid.into(),
                ..Article::default()
            },
            warnings: Vec::new(),
        }
    }

    fn absorb(&mut self, field: &'static str, outcome: FieldResult<String>) -> Option<String> {
        match outcome {
            Ok(value) => match non_empty(value) {
                Some(value) => Some(value),
                None => {
                    self.record(field, FieldError::Missing(field));
                    None
                }
            },
            Err(error) => {
                self.record(field, error);
                None
            }
        }
    }

    fn record(&mut self, field: &'static str, error: FieldError) {
        match &error {
            FieldError::Missing(_) => tracing::debug!(field, "{error}"),
            FieldError::Invalid { .. } => tracing::warn!(field, "{error}"),
        }
        self.warnings.push(FieldWarning { field, error });
    }

    /// Record a problem with a field that still got a (partial) value
    pub fn warn(mut self, field: &'static str, error: FieldError) -> Self {
        self.record(field, error);
        self
    }

    pub fn title(mut self, outcome: FieldResult<String>) -> Self {
        self.article.title = self.absorb("title", outcome);
        self
    }

    /// Set authors, dropping empty names
    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.article.authors = authors.into_iter().filter(|a| !a.is_empty()).collect();
        self
    }

    /// Set abstract paragraphs, dropping empty ones
    pub fn abstract_paragraphs(mut self, paragraphs: Vec<String>) -> Self {
        self.article.r#abstract = paragraphs.into_iter().filter(|p| !p.is_empty()).collect();
        self
    }

    /// Set body paragraphs, dropping empty ones
    pub fn section_paragraphs(mut self, paragraphs: Vec<(String, String)>) -> Self {
        self.article.section_paragraphs = paragraphs
            .into_iter()
            .filter(|(_, p)| !p.is_empty())
            .collect();
        self
    }

    pub fn pubmed_id(mut self, outcome: FieldResult<String>) -> Self {
        self.article.pubmed_id = self.absorb("pubmed_id", outcome);
        self
    }

    pub fn pmc_id(mut self, outcome: FieldResult<String>) -> Self {
        self.article.pmc_id = self.absorb("pmc_id", outcome);
        self
    }

    pub fn arxiv_id(mut self, outcome: FieldResult<String>) -> Self {
        self.article.arxiv_id = self.absorb("arxiv_id", outcome);
        self
    }

    pub fn doi(mut self, outcome: FieldResult<String>) -> Self {
        self.article.doi = self.absorb("doi", outcome);
        self
    }

    pub fn date(mut self, outcome: FieldResult<NaiveDate>) -> Self {
        self.article.date = match outcome {
            Ok(date) => Some(date),
            Err(error) => {
                self.record("date", error);
                None
            }
        };
        self
    }

    pub fn journal(mut self, outcome: FieldResult<String>) -> Self {
        self.article.journal = self.absorb("journal", outcome);
        self
    }

    pub fn figures(mut self, captions: Vec<String>) -> Self {
        self.article.figures = captions.into_iter().filter(|c| !c.is_empty()).collect();
        self
    }

    pub fn tables(mut self, captions: Vec<String>) -> Self {
        self.article.tables = captions.into_iter().filter(|c| !c.is_empty()).collect();
        self
    }

    pub fn article_type(mut self, outcome: FieldResult<String>) -> Self {
        self.article.article_type = self.absorb("article_type", outcome);
        self
    }

    /// Finish the record, returning it with the warnings collected so far.
    ///
    /// When the abstract is empty, leading untitled body paragraphs are
    /// moved into it.
    pub fn finish(mut self) -> (Article, Vec<FieldWarning>) {
        adjust_abstract(&mut self.article);
        (self.article, self.warnings)
    }

    /// Finish the record and drop the warnings
    pub fn build(self) -> Article {
        self.finish().0
    }
}

/// Move leading untitled body paragraphs into an empty abstract
pub fn adjust_abstract(article: &mut Article) {
    if !article.r#abstract.is_empty() {
        return;
    }
    let leading = article
        .section_paragraphs
        .iter()
        .take_while(|(section, _)| section.is_empty())
        .count();
    if leading == 0 {
        return;
    }
    article.r#abstract = article
        .section_paragraphs
        .drain(..leading)
        .map(|(_, p)| p)
        .collect();
}
