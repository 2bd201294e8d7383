//! JATS XML extractor (PubMed Central, bioRxiv, medRxiv).

use std::io::{Cursor, Read};

use super::xml::{parse_document, Element, Node};
use super::{present, ArticleParser, Extraction, FieldError, FieldResult, ParseError, SourceFormat};
use crate::models::ArticleBuilder;
use crate::utils::{compute_uid, date_from_parts, non_empty, normalize_text, NormalizationPolicy};

/// Elements whose text is dropped
const DROPPED: &[&str] = &["disp-formula", "email", "ext-link", "inline-formula", "uri"];

/// Section children that are not paragraphs
const NON_PARAGRAPH: &[&str] = &["title", "caption", "fig", "table-wrap", "label"];

/// Elements that start a new block of text
const BLOCK: &[&str] = &["p", "title", "list-item", "def", "term"];

/// `pub-date` types in order of preference
const DATE_PREFERENCE: &[&str] = &["pub", "epub"];

/// Extractor for JATS documents and MECA archives
#[derive(Debug, Clone, Default)]
pub struct JatsParser {
    policy: NormalizationPolicy,
}

impl JatsParser {
    pub fn new(policy: NormalizationPolicy) -> Self {
        Self { policy }
    }

    /// Extract the JATS document held in a MECA archive.
    ///
    /// The archive must contain exactly one `content/*.xml` entry. The uid is
    /// computed over the archive bytes.
    pub fn extract_meca(&self, raw: &[u8]) -> Result<Extraction, ParseError> {
        let format = SourceFormat::JatsMeca;
        let mut archive =
            zip::ZipArchive::new(Cursor::new(raw)).map_err(|e| ParseError::malformed(format, e))?;

        let entries: Vec<String> = archive
            .file_names()
            .filter(|name| name.starts_with("content/") && name.ends_with(".xml"))
            .map(str::to_string)
            .collect();
        let [entry] = entries.as_slice() else {
            return Err(ParseError::malformed(
                format,
                format!(
                    "expected exactly one .xml file inside content/, found {}",
                    entries.len()
                ),
            ));
        };

        let mut xml = Vec::new();
        archive
            .by_name(entry)
            .map_err(|e| ParseError::malformed(format, e))?
            .read_to_end(&mut xml)?;

        tracing::debug!(entry = %entry, "Extracting JATS from MECA archive");
        self.extract_document(&xml, compute_uid(raw), format)
    }

    fn extract_document(
        &self,
        xml: &[u8],
        uid: String,
        format: SourceFormat,
    ) -> Result<Extraction, ParseError> {
        let root = parse_document(xml).map_err(|e| ParseError::malformed(format, e))?;
        let article = if root.is("pmc-articleset") {
            root.child("article").ok_or_else(|| {
                ParseError::malformed(format, "pmc-articleset without an article")
            })?
        } else {
            &root
        };

        let ids = ArticleIds::collect(article);
        let (figures, tables) = self.captions(article);

        Ok(ArticleBuilder::new(uid)
            .title(self.title(article))
            .authors(self.authors(article))
            .abstract_paragraphs(self.abstract_paragraphs(article))
            .section_paragraphs(self.body(article))
            .pubmed_id(present(ids.pmid, "pubmed_id"))
            .pmc_id(present(ids.pmc, "pmc_id"))
            .arxiv_id(present(ids.arxiv, "arxiv_id"))
            .doi(present(ids.doi, "doi"))
            .date(self.date(article))
            .journal(self.journal(article))
            .figures(figures)
            .tables(tables)
            .article_type(present(
                article.attr("article-type").map(normalize_text),
                "article_type",
            ))
            .finish()
            .into())
    }

    fn title(&self, article: &Element) -> FieldResult<String> {
        present(
            article
                .find("front/article-meta/title-group/article-title")
                .map(to_text),
            "title",
        )
    }

    fn authors(&self, article: &Element) -> Vec<String> {
        article
            .find_all("front/article-meta/contrib-group/contrib")
            .into_iter()
            .filter(|contrib| contrib.attr("contrib-type") == Some("author"))
            .filter_map(|contrib| {
                let given = contrib.find("name/given-names").map(to_text).unwrap_or_default();
                let surname = contrib.find("name/surname").map(to_text).unwrap_or_default();
                if given.is_empty() || surname.is_empty() {
                    // Collaborations and organisations have no personal name
                    tracing::debug!("Skipping author without a full name");
                    return None;
                }
                Some(format!("{given} {surname}"))
            })
            .collect()
    }

    fn abstract_paragraphs(&self, article: &Element) -> Vec<String> {
        let abstracts = article.find_all("front/article-meta/abstract");
        let main = abstracts
            .iter()
            .find(|a| a.attr("abstract-type").is_none())
            .or_else(|| abstracts.first());

        let mut paragraphs = Vec::new();
        if let Some(abstract_el) = main {
            self.parse_section(abstract_el, &mut paragraphs);
        }
        self.policy
            .strip_boilerplate(paragraphs)
            .into_iter()
            .map(|(_, text)| text)
            .collect()
    }

    fn body(&self, article: &Element) -> Vec<(String, String)> {
        let mut paragraphs = Vec::new();
        if let Some(body) = article.child("body") {
            self.parse_section(body, &mut paragraphs);
        }
        self.policy.strip_boilerplate(paragraphs)
    }

    fn parse_section(&self, section: &Element, out: &mut Vec<(String, String)>) {
        let title = section.child("title").map(to_text).unwrap_or_default();
        if self.policy.is_boilerplate(&title) {
            return;
        }
        for child in section.children() {
            if child.is("sec") {
                self.parse_section(child, out);
            } else if !NON_PARAGRAPH.contains(&child.local()) {
                let text = to_text(child);
                if !text.is_empty() {
                    out.push((title.clone(), text));
                }
            }
        }
    }

    fn captions(&self, article: &Element) -> (Vec<String>, Vec<String>) {
        let containers: Vec<&Element> = ["body", "floats-group", "back"]
            .iter()
            .filter_map(|name| article.child(name))
            .collect();

        let figures = containers
            .iter()
            .flat_map(|c| c.descendants("fig"))
            .map(|fig| join_texts(fig.children_named("caption")))
            .collect();

        let tables = containers
            .iter()
            .flat_map(|c| c.descendants("table-wrap"))
            .map(|table| {
                let paragraphs = table.find_all("caption/p");
                if paragraphs.is_empty() {
                    join_texts(table.find_all("caption/title").into_iter())
                } else {
                    join_texts(paragraphs.into_iter())
                }
            })
            .collect();

        (figures, tables)
    }

    fn date(&self, article: &Element) -> FieldResult<chrono::NaiveDate> {
        let pub_dates = article.find_all("front/article-meta/pub-date");
        let chosen = DATE_PREFERENCE.iter().find_map(|wanted| {
            pub_dates.iter().find(|d| {
                d.attr("pub-type").or_else(|| d.attr("date-type")) == Some(*wanted)
            })
        });
        let Some(pub_date) = chosen else {
            return Err(FieldError::Missing("date"));
        };

        let part = |name: &str| pub_date.child(name).map(Element::text);
        let year = part("year").ok_or(FieldError::Missing("date"))?;
        let (month, day) = (part("month"), part("day"));
        date_from_parts(&year, month.as_deref(), day.as_deref()).ok_or_else(|| {
            FieldError::invalid(
                "date",
                format!(
                    "{}-{}-{}",
                    year.trim(),
                    month.as_deref().unwrap_or("").trim(),
                    day.as_deref().unwrap_or("").trim()
                ),
            )
        })
    }

    fn journal(&self, article: &Element) -> FieldResult<String> {
        let meta = article.find("front/journal-meta");
        let name = meta.and_then(|m| {
            m.find("journal-title-group/journal-title")
                .or_else(|| m.child("journal-title"))
                .map(Element::text)
        });
        let issn = meta.and_then(|m| m.child("issn")).map(Element::text);
        self.policy
            .resolve_journal(name.as_deref(), issn.as_deref())
            .ok_or(FieldError::Missing("journal"))
    }
}

impl ArticleParser for JatsParser {
    fn format(&self) -> SourceFormat {
        SourceFormat::JatsXml
    }

    fn extract(&self, raw: &[u8]) -> Result<Extraction, ParseError> {
        self.extract_document(raw, compute_uid(raw), SourceFormat::JatsXml)
    }
}

#[derive(Debug, Default)]
struct ArticleIds {
    pmid: Option<String>,
    pmc: Option<String>,
    doi: Option<String>,
    arxiv: Option<String>,
}

impl ArticleIds {
    fn collect(article: &Element) -> Self {
        let mut ids = Self::default();
        for id in article.find_all("front/article-meta/article-id") {
            let Some(value) = non_empty(normalize_text(&id.text())) else {
                continue;
            };
            let slot = match id.attr("pub-id-type") {
                Some("pmid") => &mut ids.pmid,
                Some("pmc" | "pmcid") => &mut ids.pmc,
                Some("doi") => &mut ids.doi,
                Some("arxiv") => &mut ids.arxiv,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        ids
    }
}

/// Cleaned text of an element under the JATS inline rules
fn to_text(element: &Element) -> String {
    let mut raw = String::new();
    render(element, &mut raw);
    normalize_text(&raw)
}

fn join_texts<'a>(elements: impl Iterator<Item = &'a Element>) -> String {
    elements
        .map(to_text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn render(element: &Element, out: &mut String) {
    let local = element.local();
    if DROPPED.contains(&local) {
        return;
    }
    match local {
        "sub" => out.push('_'),
        "sup" => out.push('^'),
        _ if BLOCK.contains(&local) => out.push(' '),
        _ => {}
    }
    for node in element.nodes() {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(child) => render(child, out),
        }
    }
    if BLOCK.contains(&local) {
        out.push(' ');
    }
}
