//! TEI XML extractor.
//!
//! Handles both hand-authored TEI and the TEI produced by Grobid. The two
//! differ in how deeply body divisions nest and in which wrappers are
//! present, so the body is walked recursively and every path is optional.

use chrono::NaiveDate;

use super::xml::{parse_document, Element};
use super::{present, ArticleParser, Extraction, FieldError, FieldResult, ParseError, SourceFormat};
use crate::models::ArticleBuilder;
use crate::utils::{compute_uid, normalize_text, parse_date, NormalizationPolicy};

/// Placeholder for formulas inside running text
const FORMULA_PLACEHOLDER: &str = "FORMULA";

const BIBL: &str = "teiHeader/fileDesc/sourceDesc/biblStruct";

/// Extractor for TEI documents
#[derive(Debug, Clone, Default)]
pub struct TeiParser {
    policy: NormalizationPolicy,
}

impl TeiParser {
    pub fn new(policy: NormalizationPolicy) -> Self {
        Self { policy }
    }

    /// Extract an already parsed TEI tree under a uid computed elsewhere
    /// (e.g. from the PDF it came from)
    pub(crate) fn extract_tree(&self, root: &Element, uid: String) -> Extraction {
        let ids = TeiIds::collect(root);
        let (figures, tables) = captions(root);

        ArticleBuilder::new(uid)
            .title(title(root))
            .authors(authors(root))
            .abstract_paragraphs(self.abstract_paragraphs(root))
            .section_paragraphs(self.body(root))
            .pubmed_id(present(ids.pmid, "pubmed_id"))
            .pmc_id(present(ids.pmcid, "pmc_id"))
            .arxiv_id(present(ids.arxiv, "arxiv_id"))
            .doi(present(ids.doi, "doi"))
            .date(date(root))
            .journal(self.journal(root))
            .figures(figures)
            .tables(tables)
            .finish()
            .into()
    }

    fn abstract_paragraphs(&self, root: &Element) -> Vec<String> {
        let Some(abstract_el) = root.find("teiHeader/profileDesc/abstract") else {
            return Vec::new();
        };

        let divs: Vec<&Element> = abstract_el.children_named("div").collect();
        if divs.is_empty() {
            return abstract_el
                .children_named("p")
                .map(|p| normalize_text(&p.text()))
                .filter(|p| !p.is_empty())
                .collect();
        }

        let mut elements = Vec::new();
        for div in divs {
            self.collect_text_elements(div, &mut elements);
        }
        build_texts(&elements)
    }

    fn collect_text_elements<'a>(&self, div: &'a Element, out: &mut Vec<&'a Element>) {
        if self.policy.is_boilerplate(&head_of(div)) {
            return;
        }
        for child in div.children() {
            if child.is("div") {
                self.collect_text_elements(child, out);
            } else if !child.is("head") {
                out.push(child);
            }
        }
    }

    fn body(&self, root: &Element) -> Vec<(String, String)> {
        let Some(body) = root.find("text/body") else {
            return Vec::new();
        };

        let mut paragraphs = Vec::new();
        // Loose paragraphs directly under body form an untitled section
        let loose: Vec<&Element> = body
            .children()
            .filter(|c| c.is("p") || c.is("formula"))
            .collect();
        for text in build_texts(&loose) {
            paragraphs.push((String::new(), text));
        }
        for div in body.children_named("div") {
            self.walk_div(div, &mut paragraphs);
        }
        self.policy.strip_boilerplate(paragraphs)
    }

    fn walk_div(&self, div: &Element, out: &mut Vec<(String, String)>) {
        let head = head_of(div);
        if self.policy.is_boilerplate(&head) {
            return;
        }
        let elements: Vec<&Element> = div
            .children()
            .filter(|c| !c.is("head") && !c.is("div"))
            .collect();
        for text in build_texts(&elements) {
            out.push((head.clone(), text));
        }
        for nested in div.children_named("div") {
            self.walk_div(nested, out);
        }
    }

    fn journal(&self, root: &Element) -> FieldResult<String> {
        let monogr = root.find(&format!("{BIBL}/monogr"));
        let name = monogr.and_then(|m| {
            m.children_named("title")
                .find(|t| t.attr("level") == Some("j"))
                .map(Element::text)
        });
        let issn = monogr
            .and_then(|m| {
                m.children_named("idno")
                    .find(|i| matches!(i.attr("type"), Some("ISSN" | "eISSN")))
                    .map(Element::text)
            })
            .or_else(|| {
                root.find("teiHeader/fileDesc/publicationStmt/publisher")
                    .and_then(|p| self.policy.strip_issn(&p.text()).issn)
            });
        self.policy
            .resolve_journal(name.as_deref(), issn.as_deref())
            .ok_or(FieldError::Missing("journal"))
    }
}

impl ArticleParser for TeiParser {
    fn format(&self) -> SourceFormat {
        SourceFormat::TeiXml
    }

    fn extract(&self, raw: &[u8]) -> Result<Extraction, ParseError> {
        let root =
            parse_document(raw).map_err(|e| ParseError::malformed(SourceFormat::TeiXml, e))?;
        Ok(self.extract_tree(&root, compute_uid(raw)))
    }
}

fn head_of(div: &Element) -> String {
    div.child("head")
        .map(|h| normalize_text(&h.text()))
        .unwrap_or_default()
}

fn title(root: &Element) -> FieldResult<String> {
    let stmt = root.find("teiHeader/fileDesc/titleStmt");
    let title = stmt.and_then(|s| s.child("title").or_else(|| s.children().next()));
    present(title.map(|t| normalize_text(&t.text())), "title")
}

fn authors(root: &Element) -> Vec<String> {
    root.find_all(&format!("{BIBL}/analytic/author/persName"))
        .into_iter()
        .filter_map(|pers_name| {
            let forename = |kind: &str| {
                pers_name
                    .children_named("forename")
                    .find(|f| f.attr("type") == Some(kind))
                    .map(|f| normalize_text(&f.text()))
            };
            let first = forename("first").or_else(|| {
                pers_name
                    .children_named("forename")
                    .find(|f| f.attr("type").is_none())
                    .map(|f| normalize_text(&f.text()))
            });
            let surname = pers_name.child("surname").map(|s| normalize_text(&s.text()));

            let name = [first, forename("middle"), surname]
                .into_iter()
                .flatten()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if name.is_empty() {
                tracing::debug!("Skipping persName without name parts");
                None
            } else {
                Some(name)
            }
        })
        .collect()
}

/// Stitch paragraphs, formulas and stray inline elements into sentences.
///
/// A paragraph starting with an uppercase letter starts a new text; one
/// starting otherwise continues the previous text. Every text ends with a
/// period.
fn build_texts(elements: &[&Element]) -> Vec<String> {
    let mut texts = Vec::new();
    let mut current = String::new();

    for element in elements {
        match element.local() {
            "p" => {
                let text = normalize_text(&element.text());
                if text.is_empty() {
                    continue;
                }
                if text.starts_with(|c: char| c.is_ascii_uppercase()) {
                    flush(&mut current, &mut texts);
                    current = text;
                } else {
                    current.push(' ');
                    current.push_str(&text);
                }
            }
            "formula" => {
                current.push(' ');
                current.push_str(FORMULA_PLACEHOLDER);
            }
            // Notes are Grobid misparses
            "note" => {}
            other => {
                if !matches!(other, "ref" | "figure") {
                    tracing::debug!(element = other, "Absorbing unexpected element into text");
                }
                let text = normalize_text(&element.text());
                if !text.is_empty() {
                    current.push(' ');
                    current.push_str(&text);
                }
            }
        }
    }
    flush(&mut current, &mut texts);
    texts
}

fn flush(current: &mut String, texts: &mut Vec<String>) {
    let mut text = normalize_text(current);
    current.clear();
    if text.is_empty() {
        return;
    }
    if !text.ends_with('.') {
        text.push('.');
    }
    texts.push(text);
}

fn captions(root: &Element) -> (Vec<String>, Vec<String>) {
    let mut figures = Vec::new();
    let mut tables = Vec::new();
    let Some(body) = root.find("text/body") else {
        return (figures, tables);
    };
    for figure in body.children_named("figure") {
        let caption = figure
            .child("figDesc")
            .map(|d| normalize_text(&d.text()))
            .unwrap_or_default();
        if caption.is_empty() {
            continue;
        }
        if figure.attr("type") == Some("table") {
            tables.push(caption);
        } else {
            figures.push(caption);
        }
    }
    (figures, tables)
}

fn date(root: &Element) -> FieldResult<NaiveDate> {
    let candidates = [
        root.find("teiHeader/fileDesc/publicationStmt/date"),
        root.find(&format!("{BIBL}/monogr/imprint/date")),
    ];
    let Some(date_el) = candidates.into_iter().flatten().next() else {
        return Err(FieldError::Missing("date"));
    };

    let raw = date_el
        .attr("when")
        .map(str::to_string)
        .unwrap_or_else(|| date_el.text());
    if raw.trim().is_empty() {
        return Err(FieldError::Missing("date"));
    }
    parse_date(&raw).ok_or_else(|| FieldError::invalid("date", raw.trim()))
}

#[derive(Debug, Default)]
struct TeiIds {
    arxiv: Option<String>,
    doi: Option<String>,
    pmid: Option<String>,
    pmcid: Option<String>,
}

impl TeiIds {
    fn collect(root: &Element) -> Self {
        let mut ids = Self::default();
        for idno in root.find_all(&format!("{BIBL}/idno")) {
            let value = normalize_text(&idno.text());
            if value.is_empty() {
                continue;
            }
            let kind = idno.attr("type").unwrap_or_default().to_lowercase();
            let slot = match kind.as_str() {
                "arxiv" => &mut ids.arxiv,
                "doi" => &mut ids.doi,
                "pmid" => &mut ids.pmid,
                "pmcid" => &mut ids.pmcid,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROBID_TEI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xml:space="preserve" xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader xml:lang="en">
    <fileDesc>
      <titleStmt><title level="a" type="main">Article Title</title></titleStmt>
      <publicationStmt>
        <publisher>1234-5678</publisher>
        <date type="published" when="2021-04-13">13 April 2021</date>
      </publicationStmt>
      <sourceDesc>
        <biblStruct>
          <analytic>
            <author><persName><forename type="first">Forename</forename><forename type="middle">M</forename><surname>Surname</surname></persName></author>
            <author><persName><forename type="first">Other</forename><surname>Person</surname></persName></author>
            <author><affiliation>No name here</affiliation></author>
          </analytic>
          <monogr><imprint/></monogr>
          <idno type="arXiv">arXiv:2101.00001v1</idno>
          <idno type="DOI">10.1000/xyz123</idno>
        </biblStruct>
      </sourceDesc>
    </fileDesc>
    <profileDesc>
      <abstract>
        <div><p>Abstract paragraph one.</p><p>Abstract paragraph two</p></div>
      </abstract>
    </profileDesc>
  </teiHeader>
  <text xml:lang="en">
    <body>
      <div><head n="1.">Introduction</head>
        <p>First sentence, with equation</p>
        <formula>E = mc^2</formula>
        <p>where it continues <ref type="bibr">[1]</ref>.</p>
        <p>Second paragraph.</p>
        <note>Misparsed footnote</note>
      </div>
      <div><head>Methods</head>
        <div><head>Data</head><p>We used data.</p></div>
        <list><item>Stray list</item></list>
      </div>
      <div><head>Acknowledgements</head><p>Thanks.</p></div>
      <figure><head>Figure 1</head><figDesc>A figure caption.</figDesc></figure>
      <figure type="table"><head>Table 1</head><figDesc>A table caption.</figDesc></figure>
    </body>
  </text>
</TEI>"#;

    fn parse(xml: &str) -> crate::models::Article {
        TeiParser::default().parse(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_grobid_document() {
        let article = parse(GROBID_TEI);
        assert_eq!(article.title.as_deref(), Some("Article Title"));
        assert_eq!(article.authors, vec!["Forename M Surname", "Other Person"]);
        assert_eq!(
            article.r#abstract,
            vec!["Abstract paragraph one.", "Abstract paragraph two."]
        );
        assert_eq!(article.arxiv_id.as_deref(), Some("arXiv:2101.00001v1"));
        assert_eq!(article.doi.as_deref(), Some("10.1000/xyz123"));
        assert_eq!(article.date, NaiveDate::from_ymd_opt(2021, 4, 13));
        assert_eq!(article.journal.as_deref(), Some("1234-5678"));
        assert_eq!(article.figures, vec!["A figure caption."]);
        assert_eq!(article.tables, vec!["A table caption."]);
        assert_eq!(article.article_type, None);
    }

    #[test]
    fn test_body_stitching() {
        let article = parse(GROBID_TEI);
        let paragraphs: Vec<_> = article
            .section_paragraphs
            .iter()
            .map(|(s, p)| (s.as_str(), p.as_str()))
            .collect();
        assert_eq!(
            paragraphs,
            vec![
                (
                    "Introduction",
                    "First sentence, with equation FORMULA where it continues [1]."
                ),
                ("Introduction", "Second paragraph."),
                ("Methods", "Stray list."),
                ("Data", "We used data."),
            ]
        );
    }

    #[test]
    fn test_hand_authored_shape() {
        let xml = r#"<TEI>
          <teiHeader><fileDesc><titleStmt><title>Hand made</title></titleStmt></fileDesc>
            <profileDesc><abstract><p>Plain abstract</p></abstract></profileDesc>
          </teiHeader>
          <text><body><p>Loose paragraph.</p><div><p>Untitled division.</p></div></body></text>
        </TEI>"#;
        let article = parse(xml);
        assert_eq!(article.title.as_deref(), Some("Hand made"));
        assert_eq!(article.r#abstract, vec!["Plain abstract"]);
        assert_eq!(
            article.section_paragraphs,
            vec![
                (String::new(), "Loose paragraph.".to_string()),
                (String::new(), "Untitled division.".to_string()),
            ]
        );
    }

    #[test]
    fn test_untitled_body_becomes_abstract_when_missing() {
        let xml = r#"<TEI><text><body>
          <div><p>Grobid put the abstract here.</p></div>
          <div><head>Intro</head><p>Body.</p></div>
        </body></text></TEI>"#;
        let article = parse(xml);
        assert_eq!(article.r#abstract, vec!["Grobid put the abstract here."]);
        assert_eq!(
            article.section_paragraphs,
            vec![("Intro".to_string(), "Body.".to_string())]
        );
    }

    #[test]
    fn test_minimal_title_only() {
        let article = parse(
            r#"<TEI xmlns="http://www.tei-c.org/ns/1.0"><teiHeader><fileDesc><titleStmt><title>Only</title></titleStmt></fileDesc></teiHeader></TEI>"#,
        );
        assert_eq!(article.title.as_deref(), Some("Only"));
        assert!(article.authors.is_empty());
        assert!(article.r#abstract.is_empty());
        assert!(article.section_paragraphs.is_empty());
        assert_eq!(article.doi, None);
        assert_eq!(article.date, None);
        assert_eq!(article.journal, None);
    }

    #[test]
    fn test_journal_from_monogr() {
        let xml = r#"<TEI><teiHeader><fileDesc><sourceDesc><biblStruct><monogr>
            <title level="j">Journal of Tests</title><idno type="ISSN">1234-5678</idno>
            <imprint><date type="published" when="2019-06">June 2019</date></imprint>
        </monogr></biblStruct></sourceDesc></fileDesc></teiHeader></TEI>"#;
        let article = parse(xml);
        assert_eq!(article.journal.as_deref(), Some("Journal of Tests"));
        assert_eq!(article.date, NaiveDate::from_ymd_opt(2019, 6, 1));
    }

    #[test]
    fn test_unparseable_date_is_absent() {
        let xml = r#"<TEI><teiHeader><fileDesc><publicationStmt><date>sometime</date></publicationStmt></fileDesc></teiHeader></TEI>"#;
        let extraction = TeiParser::default().extract(xml.as_bytes()).unwrap();
        assert_eq!(extraction.article.date, None);
        assert!(extraction.has_warning("date"));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            TeiParser::default().extract(b"<TEI><teiHeader></TEI>"),
            Err(ParseError::MalformedInput { .. })
        ));
    }
}
