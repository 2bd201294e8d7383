//! Elsevier/Scopus XOCS extractor.
//!
//! Two response shapes are accepted: `full-text-retrieval-response`, which
//! carries the article body, and `abstracts-retrieval-response`, which only
//! carries metadata and the abstract.

use super::xml::{parse_document, Element};
use super::{present, ArticleParser, Extraction, FieldError, FieldResult, ParseError, SourceFormat};
use crate::models::ArticleBuilder;
use crate::utils::{compute_uid, normalize_text, parse_date, NormalizationPolicy};

const FULL_TEXT_ROOT: &str = "full-text-retrieval-response";
const ABSTRACTS_ROOT: &str = "abstracts-retrieval-response";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseKind {
    FullText,
    Abstracts,
}

/// Extractor for XOCS documents
#[derive(Debug, Clone, Default)]
pub struct XocsParser {
    policy: NormalizationPolicy,
}

impl XocsParser {
    pub fn new(policy: NormalizationPolicy) -> Self {
        Self { policy }
    }

    fn body(&self, root: &Element) -> (Vec<(String, String)>, Option<FieldError>) {
        let Some(body) = root.descendant("body") else {
            return (Vec::new(), None);
        };
        let item = root.find("originalText/doc/serial-item");
        let has = |name: &str| item.is_some_and(|i| i.child(name).is_some());

        let titled = if has("article") {
            true
        } else if has("simple-article") {
            false
        } else {
            let kind = if has("converted-article") {
                "converted-article"
            } else {
                "unknown article kind"
            };
            return (
                Vec::new(),
                Some(FieldError::invalid("section_paragraphs", kind)),
            );
        };

        let mut paragraphs = Vec::new();
        for section in body.descendants("section") {
            let title = if titled {
                section
                    .child("section-title")
                    .map(|t| normalize_text(&t.text()))
                    .unwrap_or_default()
            } else {
                String::new()
            };
            for para in section.children_named("para") {
                paragraphs.push((title.clone(), normalize_text(&para.text())));
            }
        }
        (self.policy.strip_boilerplate(paragraphs), None)
    }

    fn journal(&self, coredata: Option<&Element>) -> FieldResult<String> {
        let name = coredata
            .and_then(|c| c.child("publicationName"))
            .map(Element::text);
        // prism:issn may list several codes separated by spaces
        let issn = coredata.and_then(|c| c.child("issn")).and_then(|i| {
            i.text()
                .split_whitespace()
                .next()
                .map(str::to_string)
        });
        self.policy
            .resolve_journal(name.as_deref(), issn.as_deref())
            .ok_or(FieldError::Missing("journal"))
    }
}

impl ArticleParser for XocsParser {
    fn format(&self) -> SourceFormat {
        SourceFormat::XocsXml
    }

    fn extract(&self, raw: &[u8]) -> Result<Extraction, ParseError> {
        let format = SourceFormat::XocsXml;
        let root = parse_document(raw).map_err(|e| ParseError::malformed(format, e))?;
        let kind = if root.is(FULL_TEXT_ROOT) {
            ResponseKind::FullText
        } else if root.is(ABSTRACTS_ROOT) {
            ResponseKind::Abstracts
        } else {
            return Err(ParseError::malformed(
                format,
                format!("unexpected root element <{}>", root.name()),
            ));
        };

        let coredata = root.child("coredata");
        let text_of = |name: &str| {
            coredata
                .and_then(|c| c.child(name))
                .map(|el| normalize_text(&el.text()))
        };

        let mut builder = ArticleBuilder::new(compute_uid(raw))
            .title(present(text_of("title"), "title"))
            .authors(authors(&root, kind))
            .abstract_paragraphs(abstract_paragraphs(coredata, kind))
            .pubmed_id(present(
                root.child("pubmed-id").map(|p| normalize_text(&p.text())),
                "pubmed_id",
            ))
            .doi(present(text_of("doi"), "doi"))
            .date(date(text_of("coverDate")))
            .journal(self.journal(coredata))
            .article_type(present(
                root.descendant("dochead")
                    .and_then(|d| d.child("textfn"))
                    .map(|t| normalize_text(&t.text())),
                "article_type",
            ));

        if kind == ResponseKind::FullText {
            let (paragraphs, problem) = self.body(&root);
            builder = builder.section_paragraphs(paragraphs);
            if let Some(problem) = problem {
                builder = builder.warn("section_paragraphs", problem);
            }
            let (figures, tables) = floats(&root);
            builder = builder.figures(figures).tables(tables);
        }

        Ok(builder.finish().into())
    }
}

fn authors(root: &Element, kind: ResponseKind) -> Vec<String> {
    let entries = match kind {
        ResponseKind::Abstracts => root.find_all("authors/author"),
        ResponseKind::FullText => root.find_all("coredata/creator"),
    };
    entries
        .into_iter()
        .map(|author| match author.child("indexed-name") {
            Some(indexed) => normalize_text(&indexed.text()),
            None => normalize_text(&author.text()),
        })
        .filter(|name| !name.is_empty())
        .collect()
}

fn abstract_paragraphs(coredata: Option<&Element>, kind: ResponseKind) -> Vec<String> {
    let description = coredata.and_then(|c| c.child("description"));
    let holder = match kind {
        ResponseKind::Abstracts => description.and_then(|d| d.child("abstract")),
        ResponseKind::FullText => description,
    };
    let Some(holder) = holder else {
        return Vec::new();
    };

    let paras: Vec<String> = holder
        .descendants("para")
        .into_iter()
        .map(|p| normalize_text(&p.text()))
        .filter(|p| !p.is_empty())
        .collect();
    if !paras.is_empty() {
        return paras;
    }
    let text = normalize_text(&holder.text());
    if text.is_empty() {
        Vec::new()
    } else {
        vec![text]
    }
}

fn date(cover_date: Option<String>) -> FieldResult<chrono::NaiveDate> {
    let raw = present(cover_date, "date")?;
    parse_date(&raw).ok_or_else(|| FieldError::invalid("date", raw))
}

fn floats(root: &Element) -> (Vec<String>, Vec<String>) {
    let caption = |float: &Element| {
        float
            .descendant("caption")
            .map(|c| {
                c.descendants("simple-para")
                    .into_iter()
                    .map(|p| normalize_text(&p.text()))
                    .filter(|p| !p.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    };

    let figures = root
        .descendants("figure")
        .into_iter()
        .chain(root.descendants("text-box"))
        .map(caption)
        .collect();
    let tables = root
        .descendants("table")
        .into_iter()
        .map(caption)
        .collect();
    (figures, tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const FULL_TEXT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<full-text-retrieval-response xmlns="http://www.elsevier.com/xml/svapi/article/dtd"
    xmlns:ce="http://www.elsevier.com/xml/common/dtd"
    xmlns:dc="http://purl.org/dc/elements/1.1/"
    xmlns:ja="http://www.elsevier.com/xml/ja/dtd"
    xmlns:prism="http://prismstandard.org/namespaces/basic/2.0/"
    xmlns:xocs="http://www.elsevier.com/xml/xocs/dtd">
  <coredata>
    <prism:doi>10.1016/j.test.2020.01.001</prism:doi>
    <dc:title>
      Article Title
    </dc:title>
    <prism:publicationName>Brain and Language</prism:publicationName>
    <prism:issn>0093934X 10902155</prism:issn>
    <prism:coverDate>2020-01-15</prism:coverDate>
    <dc:creator>Doe, Jane</dc:creator>
    <dc:creator>Roe, John</dc:creator>
    <dc:description>
      Abstract text
      over two lines
    </dc:description>
  </coredata>
  <pubmed-id>31234567</pubmed-id>
  <originalText>
    <xocs:doc>
      <xocs:serial-item>
        <ja:article>
          <ja:head><ce:dochead><ce:textfn>Research Article</ce:textfn></ce:dochead></ja:head>
          <ja:body>
            <ce:sections>
              <ce:section>
                <ce:section-title>Introduction</ce:section-title>
                <ce:para>First <ce:italic>paragraph</ce:italic>.</ce:para>
                <ce:section>
                  <ce:section-title>Background</ce:section-title>
                  <ce:para>Nested paragraph.</ce:para>
                </ce:section>
              </ce:section>
              <ce:section>
                <ce:section-title>Acknowledgments</ce:section-title>
                <ce:para>Thanks.</ce:para>
              </ce:section>
            </ce:sections>
            <ce:figure><ce:label>Fig. 1</ce:label><ce:caption><ce:simple-para>Figure caption.</ce:simple-para></ce:caption></ce:figure>
            <ce:table><ce:label>Table 1</ce:label><ce:caption><ce:simple-para>Table caption.</ce:simple-para></ce:caption></ce:table>
          </ja:body>
        </ja:article>
      </xocs:serial-item>
    </xocs:doc>
  </originalText>
</full-text-retrieval-response>"#;

    const ABSTRACTS: &str = r#"<abstracts-retrieval-response xmlns:ce="x" xmlns:dc="y" xmlns:prism="z">
  <coredata>
    <dc:title>Scopus Title</dc:title>
    <dc:description><abstract><ce:para>Scopus abstract.</ce:para></abstract></dc:description>
    <prism:coverDate>2019-05-01</prism:coverDate>
  </coredata>
  <authors>
    <author><ce:indexed-name>Doe J.</ce:indexed-name><ce:surname>Doe</ce:surname></author>
  </authors>
</abstracts-retrieval-response>"#;

    #[test]
    fn test_full_text_response() {
        let article = XocsParser::default().parse(FULL_TEXT.as_bytes()).unwrap();
        assert_eq!(article.title.as_deref(), Some("Article Title"));
        assert_eq!(article.authors, vec!["Doe, Jane", "Roe, John"]);
        assert_eq!(article.r#abstract, vec!["Abstract text over two lines"]);
        assert_eq!(article.pubmed_id.as_deref(), Some("31234567"));
        assert_eq!(article.doi.as_deref(), Some("10.1016/j.test.2020.01.001"));
        assert_eq!(article.pmc_id, None);
        assert_eq!(article.arxiv_id, None);
        assert_eq!(article.date, NaiveDate::from_ymd_opt(2020, 1, 15));
        assert_eq!(article.journal.as_deref(), Some("Brain and Language"));
        assert_eq!(article.article_type.as_deref(), Some("Research Article"));
        assert_eq!(
            article.section_paragraphs,
            vec![
                ("Introduction".to_string(), "First paragraph.".to_string()),
                ("Background".to_string(), "Nested paragraph.".to_string()),
            ]
        );
        assert_eq!(article.figures, vec!["Figure caption."]);
        assert_eq!(article.tables, vec!["Table caption."]);
    }

    #[test]
    fn test_simple_article_sections_are_untitled() {
        let xml = FULL_TEXT
            .replace("<ja:article>", "<ja:simple-article>")
            .replace("</ja:article>", "</ja:simple-article>");
        let article = XocsParser::default().parse(xml.as_bytes()).unwrap();
        // The abstract is present, so untitled paragraphs stay in the body
        assert!(article.section_paragraphs.iter().all(|(s, _)| s.is_empty()));
        assert_eq!(article.section_paragraphs.len(), 3);
    }

    #[test]
    fn test_converted_article_is_skipped_with_warning() {
        let xml = FULL_TEXT
            .replace("<ja:article>", "<ja:converted-article>")
            .replace("</ja:article>", "</ja:converted-article>");
        let extraction = XocsParser::default().extract(xml.as_bytes()).unwrap();
        assert!(extraction.article.section_paragraphs.is_empty());
        assert_eq!(extraction.article.title.as_deref(), Some("Article Title"));
        assert!(extraction.has_warning("section_paragraphs"));
    }

    #[test]
    fn test_abstracts_response() {
        let article = XocsParser::default().parse(ABSTRACTS.as_bytes()).unwrap();
        assert_eq!(article.title.as_deref(), Some("Scopus Title"));
        assert_eq!(article.authors, vec!["Doe J."]);
        assert_eq!(article.r#abstract, vec!["Scopus abstract."]);
        assert_eq!(article.date, NaiveDate::from_ymd_opt(2019, 5, 1));
        assert!(article.section_paragraphs.is_empty());
    }

    #[test]
    fn test_journal_falls_back_to_first_issn() {
        let xml = FULL_TEXT.replace(
            "<prism:publicationName>Brain and Language</prism:publicationName>",
            "",
        );
        let article = XocsParser::default().parse(xml.as_bytes()).unwrap();
        assert_eq!(article.journal.as_deref(), Some("0093-934X"));
    }

    #[test]
    fn test_minimal_title_only() {
        let xml = "<full-text-retrieval-response><coredata><dc:title>Only</dc:title></coredata></full-text-retrieval-response>";
        let article = XocsParser::default().parse(xml.as_bytes()).unwrap();
        assert_eq!(article.title.as_deref(), Some("Only"));
        assert!(article.authors.is_empty());
        assert!(article.r#abstract.is_empty());
        assert!(article.section_paragraphs.is_empty());
        assert_eq!(article.doi, None);
        assert_eq!(article.date, None);
        assert_eq!(article.journal, None);
    }

    #[test]
    fn test_unknown_root_is_malformed() {
        let err = XocsParser::default().parse(b"<article/>").unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedInput {
                format: SourceFormat::XocsXml,
                ..
            }
        ));
    }
}
