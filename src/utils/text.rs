//! Text normalization shared by every extractor.
//!
//! All functions here are pure and never fail: anything that cannot be
//! normalized degrades to an empty or absent value.

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

use crate::config::ExtractionConfig;

/// Section names dropped from abstracts and bodies, compared case-insensitively
pub const DEFAULT_BOILERPLATE_SECTIONS: &[&str] = &[
    "author contributions",
    "author contribution",
    "contributions",
    "acknowledgements",
    "acknowledgments",
    "acknowledgement",
    "acknowledgment",
    "competing interests",
    "conflict of interest",
    "conflicts of interest",
    "declaration of competing interest",
    "funding",
    "data availability",
    "ethics statement",
];

/// ISSN-like code at the end of a journal string (`1234-5678`, `12345678`, `1234-567X`)
pub const DEFAULT_ISSN_PATTERN: &str =
    r"(?i)[\s,;:]*[(\[]?(?:e?issn[:\s]*)?(\d{4})-?(\d{3}[\dx])[)\]]?\s*$";

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[A-Za-z][\w:.-]*(?:\s[^<>]*)?/?>").unwrap());
static SECTION_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+(?:\.\d+)*|[IVXivx]+)\.?\s+").unwrap());
static DEFAULT_ISSN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_ISSN_PATTERN).unwrap());
static DEFAULT_POLICY: LazyLock<NormalizationPolicy> = LazyLock::new(|| NormalizationPolicy {
    boilerplate: DEFAULT_BOILERPLATE_SECTIONS
        .iter()
        .map(|s| normalize_section_name(s))
        .collect(),
    issn: DEFAULT_ISSN_RE.clone(),
});

/// Strip embedded markup, resolve escapes and collapse whitespace.
///
/// Meant for raw markup fragments. Text already decoded by the XML tree goes
/// through [`normalize_text`] instead, so a literal `<` survives.
///
/// `"<p>I <bold>like</bold>  python &amp; tea</p>"` becomes `"I like python & tea"`.
pub fn clean_text(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, "");
    let unescaped = match quick_xml::escape::unescape(&stripped) {
        Ok(text) => text.into_owned(),
        Err(_) => stripped.into_owned(),
    };
    normalize_text(&unescaped)
}

/// NFKC-normalize decoded text and collapse its whitespace
pub fn normalize_text(text: &str) -> String {
    collapse_whitespace(&text.nfkc().collect::<String>())
}

/// Collapse runs of whitespace to one space and trim both ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop paragraphs whose section name is on the default boilerplate denylist
pub fn strip_boilerplate(paragraphs: Vec<(String, String)>) -> Vec<(String, String)> {
    DEFAULT_POLICY.strip_boilerplate(paragraphs)
}

/// Split a journal string into its name and a trailing ISSN, using the default pattern
pub fn strip_issn(raw_journal: &str) -> JournalParts {
    DEFAULT_POLICY.strip_issn(raw_journal)
}

/// Normalize an ISSN to `NNNN-NNNC` with an uppercase check digit
pub fn normalize_issn(raw: &str) -> Option<String> {
    let parts = strip_issn(raw);
    match parts.name {
        None => parts.issn,
        Some(_) => None,
    }
}

/// A journal string split into name and ISSN
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalParts {
    /// Journal name with any trailing ISSN removed; `None` if nothing is left
    pub name: Option<String>,
    /// Normalized ISSN if one was found
    pub issn: Option<String>,
}

impl JournalParts {
    /// The value stored in the record: the name, otherwise the bare ISSN
    pub fn into_journal(self) -> Option<String> {
        self.name.or(self.issn)
    }
}

/// Configurable policy tables: boilerplate denylist and ISSN pattern
#[derive(Debug, Clone)]
pub struct NormalizationPolicy {
    boilerplate: Vec<String>,
    issn: Regex,
}

impl Default for NormalizationPolicy {
    fn default() -> Self {
        DEFAULT_POLICY.clone()
    }
}

impl NormalizationPolicy {
    /// Build a policy from the `[extraction]` settings
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            boilerplate: config
                .boilerplate_sections
                .iter()
                .map(|s| normalize_section_name(s))
                .filter(|s| !s.is_empty())
                .collect(),
            issn: Regex::new(&config.issn_pattern)?,
        })
    }

    /// Whether a section title names a boilerplate section
    pub fn is_boilerplate(&self, section_name: &str) -> bool {
        let name = normalize_section_name(section_name);
        !name.is_empty() && self.boilerplate.iter().any(|b| *b == name)
    }

    /// Drop paragraphs belonging to boilerplate sections, keeping order
    pub fn strip_boilerplate(&self, paragraphs: Vec<(String, String)>) -> Vec<(String, String)> {
        paragraphs
            .into_iter()
            .filter(|(section, _)| !self.is_boilerplate(section))
            .collect()
    }

    /// Split a journal string into name and trailing ISSN
    pub fn strip_issn(&self, raw_journal: &str) -> JournalParts {
        let text = normalize_text(raw_journal);
        let Some(caps) = self.issn.captures(&text) else {
            return JournalParts {
                name: non_empty(text),
                issn: None,
            };
        };

        let issn = match (caps.get(1), caps.get(2)) {
            (Some(head), Some(tail)) => Some(format!(
                "{}-{}",
                head.as_str(),
                tail.as_str().to_uppercase()
            )),
            _ => None,
        };
        let start = caps.get(0).map_or(text.len(), |m| m.start());
        let name = text[..start].trim_end_matches(|c: char| c.is_whitespace() || ",;:-".contains(c));

        JournalParts {
            name: non_empty(name.to_string()),
            issn,
        }
    }

    /// Resolve the journal field from a name and a separately encoded ISSN
    pub fn resolve_journal(&self, name: Option<&str>, issn: Option<&str>) -> Option<String> {
        let from_name = name.map(|n| self.strip_issn(n)).unwrap_or_default();
        let from_issn = issn.map(|i| self.strip_issn(i)).unwrap_or_default();
        from_name
            .name
            .or(from_name.issn)
            .or(from_issn.issn)
            .or(from_issn.name)
    }
}

fn normalize_section_name(name: &str) -> String {
    let cleaned = normalize_text(name).to_lowercase();
    let without_number = SECTION_NUMBER_RE.replace(&cleaned, "");
    without_number
        .trim_matches(|c: char| c.is_whitespace() || ".:;".contains(c))
        .to_string()
}

/// `Some(text)` unless the text is empty
pub fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_strips_markup() {
        assert_eq!(
            clean_text("Paragraph <italic>with</italic> some <bold>styles</bold>."),
            "Paragraph with some styles."
        );
    }

    #[test]
    fn test_clean_text_keeps_comparisons() {
        assert_eq!(clean_text("p < 0.05 and n > 3"), "p < 0.05 and n > 3");
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Hello \n\t  world  "), "Hello world");
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn test_clean_text_unescapes() {
        assert_eq!(
            clean_text("Paragraph with &quot;escapes&#34; &amp; more"),
            "Paragraph with \"escapes\" & more"
        );
        // Unknown entities are left alone rather than failing
        assert_eq!(clean_text("a&nbsp;b"), "a&nbsp;b");
    }

    #[test]
    fn test_clean_text_nfkc() {
        assert_eq!(clean_text("ﬁnal"), "final");
    }

    #[test]
    fn test_normalize_text_keeps_decoded_inequalities() {
        assert_eq!(normalize_text("if a<b then  c>d"), "if a<b then c>d");
        assert_eq!(normalize_text("for all i<n and j>0 holds"), "for all i<n and j>0 holds");
        assert_eq!(normalize_text("a &amp; b"), "a &amp; b");
        assert_eq!(normalize_text("ﬁnal\u{a0}\n step"), "final step");
    }

    #[test]
    fn test_strip_issn_keeps_decoded_text() {
        let parts = strip_issn("Journal of a<b Results 1234-5678");
        assert_eq!(parts.name.as_deref(), Some("Journal of a<b Results"));
        assert_eq!(parts.issn.as_deref(), Some("1234-5678"));
    }

    #[test]
    fn test_strip_boilerplate() {
        let paragraphs = vec![
            ("Intro".to_string(), "Hello.".to_string()),
            ("Author contributions".to_string(), "A did B.".to_string()),
            ("ACKNOWLEDGEMENTS".to_string(), "Thanks.".to_string()),
            ("5. Acknowledgments:".to_string(), "Thanks again.".to_string()),
            ("Results".to_string(), "It works.".to_string()),
        ];
        let kept = strip_boilerplate(paragraphs);
        assert_eq!(
            kept,
            vec![
                ("Intro".to_string(), "Hello.".to_string()),
                ("Results".to_string(), "It works.".to_string()),
            ]
        );
    }

    #[test]
    fn test_untitled_sections_are_kept() {
        let kept = strip_boilerplate(vec![(String::new(), "Body.".to_string())]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_strip_issn() {
        let parts = strip_issn("Nature 1234-5678");
        assert_eq!(parts.name.as_deref(), Some("Nature"));
        assert_eq!(parts.issn.as_deref(), Some("1234-5678"));
    }

    #[test]
    fn test_strip_issn_variants() {
        assert_eq!(
            strip_issn("Cell (ISSN 0092-8674)").name.as_deref(),
            Some("Cell")
        );
        let compact = strip_issn("12345678");
        assert_eq!(compact.name, None);
        assert_eq!(compact.issn.as_deref(), Some("1234-5678"));
        assert_eq!(strip_issn("1234567x").issn.as_deref(), Some("1234-567X"));
    }

    #[test]
    fn test_strip_issn_without_code() {
        let parts = strip_issn("TEI Consortium");
        assert_eq!(parts.name.as_deref(), Some("TEI Consortium"));
        assert_eq!(parts.issn, None);
        assert_eq!(strip_issn("").into_journal(), None);
    }

    #[test]
    fn test_year_is_not_an_issn() {
        let parts = strip_issn("Annals of Physics 2020");
        assert_eq!(parts.name.as_deref(), Some("Annals of Physics 2020"));
        assert_eq!(parts.issn, None);
    }

    #[test]
    fn test_normalize_issn() {
        assert_eq!(normalize_issn("0093934X").as_deref(), Some("0093-934X"));
        assert_eq!(normalize_issn("Nature"), None);
    }

    #[test]
    fn test_resolve_journal() {
        let policy = NormalizationPolicy::default();
        assert_eq!(
            policy.resolve_journal(Some("Brain and Language"), Some("0093934X")),
            Some("Brain and Language".to_string())
        );
        assert_eq!(
            policy.resolve_journal(None, Some("0093934X")),
            Some("0093-934X".to_string())
        );
        assert_eq!(policy.resolve_journal(None, None), None);
    }

    #[test]
    fn test_policy_from_config() {
        let config = ExtractionConfig {
            boilerplate_sections: vec!["Funding".to_string()],
            issn_pattern: DEFAULT_ISSN_PATTERN.to_string(),
        };
        let policy = NormalizationPolicy::from_config(&config).unwrap();
        assert!(policy.is_boilerplate("FUNDING"));
        assert!(!policy.is_boilerplate("Acknowledgements"));

        let bad = ExtractionConfig {
            boilerplate_sections: vec![],
            issn_pattern: "(".to_string(),
        };
        assert!(NormalizationPolicy::from_config(&bad).is_err());
    }
}
