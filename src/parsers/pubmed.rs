//! PubMed citation extractor.
//!
//! PubMed records carry metadata and an abstract only, so the body
//! (`section_paragraphs`) is always empty.

use chrono::NaiveDate;
use flate2::read::MultiGzDecoder;
use std::io::Read;

use super::xml::{parse_document, Element};
use super::{present, ArticleParser, Extraction, FieldError, FieldResult, ParseError, SourceFormat};
use crate::models::ArticleBuilder;
use crate::utils::{compute_uid, date_from_parts, normalize_text, parse_date, NormalizationPolicy};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Extractor for `PubmedArticle` documents and `PubmedArticleSet` files
#[derive(Debug, Clone, Default)]
pub struct PubMedParser {
    policy: NormalizationPolicy,
}

impl PubMedParser {
    pub fn new(policy: NormalizationPolicy) -> Self {
        Self { policy }
    }

    /// Extract every `PubmedArticle` of an article set.
    ///
    /// The input may be gzip-compressed. A lone article, or a set holding a
    /// single article, gets the uid of the raw input. Records split out of a
    /// set of several articles get the uid of their own `PubmedArticle`
    /// element instead, since they no longer stand for the whole input.
    pub fn extract_set(&self, raw: &[u8]) -> Result<Vec<Extraction>, ParseError> {
        let format = SourceFormat::PubMedXmlSet;
        let xml = decompress(raw).map_err(|e| ParseError::malformed(format, e))?;
        let root = parse_document(&xml).map_err(|e| ParseError::malformed(format, e))?;

        if root.is("PubmedArticle") {
            return Ok(vec![self.extract_article(&root, compute_uid(raw))]);
        }
        if !root.is("PubmedArticleSet") {
            return Err(ParseError::malformed(
                format,
                format!("unexpected root element <{}>", root.name()),
            ));
        }

        let mut articles = Vec::new();
        for child in root.children() {
            if child.is("PubmedArticle") {
                articles.push(child);
            } else {
                tracing::debug!(element = child.name(), "Skipping non-article entry");
            }
        }

        let extractions: Vec<Extraction> = match articles.as_slice() {
            [only] => vec![self.extract_article(only, compute_uid(raw))],
            _ => articles
                .iter()
                .map(|article| self.extract_article(article, compute_uid(&xml[article.span()])))
                .collect(),
        };
        tracing::debug!(count = extractions.len(), "Extracted PubMed article set");
        Ok(extractions)
    }

    fn extract_article(&self, article: &Element, uid: String) -> Extraction {
        let citation = article.child("MedlineCitation");
        let meta = citation.and_then(|c| c.child("Article"));
        let article_ids = article.find_all("PubmedData/ArticleIdList/ArticleId");
        let id_of = |kind: &str| {
            article_ids
                .iter()
                .find(|id| id.attr("IdType") == Some(kind))
                .map(|id| normalize_text(&id.text()))
        };

        let doi = id_of("doi").or_else(|| {
            meta.and_then(|m| {
                m.children_named("ELocationID")
                    .find(|e| e.attr("EIdType") == Some("doi"))
                    .map(|e| normalize_text(&e.text()))
            })
        });

        ArticleBuilder::new(uid)
            .title(present(
                meta.and_then(|m| m.child("ArticleTitle")).map(|t| normalize_text(&t.text())),
                "title",
            ))
            .authors(meta.map(authors).unwrap_or_default())
            .abstract_paragraphs(meta.map(|m| self.abstract_paragraphs(m)).unwrap_or_default())
            .pubmed_id(present(
                citation.and_then(|c| c.child("PMID")).map(|p| normalize_text(&p.text())),
                "pubmed_id",
            ))
            .pmc_id(present(id_of("pmc"), "pmc_id"))
            .doi(present(doi, "doi"))
            .date(date(article))
            .journal(self.journal(meta))
            .article_type(present(
                meta.and_then(|m| m.find("PublicationTypeList/PublicationType"))
                    .map(|t| normalize_text(&t.text())),
                "article_type",
            ))
            .finish()
            .into()
    }

    fn abstract_paragraphs(&self, meta: &Element) -> Vec<String> {
        let Some(abstract_el) = meta.child("Abstract") else {
            return Vec::new();
        };
        let labelled = abstract_el
            .descendants("AbstractText")
            .into_iter()
            .map(|p| {
                let label = p.attr("Label").unwrap_or_default().to_string();
                (label, normalize_text(&p.text()))
            })
            .collect();
        self.policy
            .strip_boilerplate(labelled)
            .into_iter()
            .map(|(_, text)| text)
            .collect()
    }

    fn journal(&self, meta: Option<&Element>) -> FieldResult<String> {
        let journal = meta.and_then(|m| m.child("Journal"));
        let name = journal.and_then(|j| j.child("Title")).map(Element::text);
        let issn = journal.and_then(|j| j.child("ISSN")).map(Element::text);
        self.policy
            .resolve_journal(name.as_deref(), issn.as_deref())
            .ok_or(FieldError::Missing("journal"))
    }
}

impl ArticleParser for PubMedParser {
    fn format(&self) -> SourceFormat {
        SourceFormat::PubMedXml
    }

    fn extract(&self, raw: &[u8]) -> Result<Extraction, ParseError> {
        let format = SourceFormat::PubMedXml;
        let root = parse_document(raw).map_err(|e| ParseError::malformed(format, e))?;
        let article = if root.is("PubmedArticleSet") {
            root.child("PubmedArticle")
                .ok_or_else(|| ParseError::malformed(format, "article set without PubmedArticle"))?
        } else {
            &root
        };
        Ok(self.extract_article(article, compute_uid(raw)))
    }
}

fn authors(meta: &Element) -> Vec<String> {
    meta.find_all("AuthorList/Author")
        .into_iter()
        // ValidYN="N" marks an erroneous entry kept for the record
        .filter(|author| author.attr("ValidYN") != Some("N"))
        .filter_map(|author| {
            let parts: Vec<String> = ["ForeName", "LastName"]
                .iter()
                .filter_map(|name| author.child(name))
                .map(|el| normalize_text(&el.text()))
                .filter(|text| !text.is_empty())
                .collect();
            if parts.is_empty() {
                author
                    .child("CollectiveName")
                    .map(|c| normalize_text(&c.text()))
                    .filter(|name| !name.is_empty())
            } else {
                Some(parts.join(" "))
            }
        })
        .collect()
}

fn date(article: &Element) -> FieldResult<NaiveDate> {
    let history = article.find_all("PubmedData/History/PubMedPubDate");
    if let Some(pubmed) = history.iter().find(|d| d.attr("PubStatus") == Some("pubmed")) {
        return date_of(pubmed);
    }

    let pub_date = article
        .find("MedlineCitation/Article/Journal/JournalIssue/PubDate")
        .ok_or(FieldError::Missing("date"))?;
    if let Some(medline) = pub_date.child("MedlineDate") {
        let text = medline.text();
        return parse_date(&text).ok_or_else(|| FieldError::invalid("date", text.trim()));
    }
    date_of(pub_date)
}

fn date_of(element: &Element) -> FieldResult<NaiveDate> {
    let part = |name: &str| element.child(name).map(Element::text);
    let year = part("Year").ok_or(FieldError::Missing("date"))?;
    let (month, day) = (part("Month"), part("Day"));
    date_from_parts(&year, month.as_deref(), day.as_deref()).ok_or_else(|| {
        FieldError::invalid(
            "date",
            format!(
                "{} {} {}",
                year.trim(),
                month.as_deref().unwrap_or_default().trim(),
                day.as_deref().unwrap_or_default().trim()
            ),
        )
    })
}

fn decompress(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    if !raw.starts_with(&GZIP_MAGIC) {
        return Ok(raw.to_vec());
    }
    let mut out = Vec::new();
    MultiGzDecoder::new(raw).read_to_end(&mut out)?;
    Ok(out)
}
