//! Spacing repair for text pulled out of transcript PDFs.
//!
//! Extraction tends to split words on single characters, glue conjunctions to
//! the preceding word and drop spaces between camel-cased tokens. The rules
//! here undo exactly those artifacts for the modeled transcript layout and
//! nothing else; they are lossy on general prose.

use once_cell::sync::Lazy;
use regex::Regex;

/// Conjunctions of the modeled (Indonesian) layout.
pub const DEFAULT_CONJUNCTIONS: [&str; 7] = ["dan", "atau", "serta", "untuk", "ke", "dari", "pada"];

static SPLIT_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-zA-Z])\s([a-z])").expect("split-word regex"));
static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z])([A-Z])").expect("camel-boundary regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

pub struct Normalizer {
    conjunctions: Vec<Regex>,
}

impl Normalizer {
    pub fn new<I, S>(conjunctions: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let conjunctions = conjunctions
            .into_iter()
            .map(|word| Regex::new(&format!(r"(?i)([a-z])({}\b)", regex::escape(word.as_ref()))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { conjunctions })
    }

    /// Repairs one page of extracted text.
    pub fn normalize_page(&self, page: &str) -> String {
        let mut text = SPLIT_WORD.replace_all(page, "$1$2").into_owned();
        for pattern in &self.conjunctions {
            text = pattern.replace_all(&text, "$1 $2").into_owned();
        }
        let text = CAMEL_BOUNDARY.replace_all(&text, "$1 $2");
        WHITESPACE.replace_all(&text, " ").trim().to_string()
    }

    /// Repairs every page and joins them with newlines.
    pub fn normalize_pages<S: AsRef<str>>(&self, pages: &[S]) -> String {
        pages
            .iter()
            .map(|page| self.normalize_page(page.as_ref()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        let conjunctions = DEFAULT_CONJUNCTIONS
            .iter()
            .map(|word| {
                Regex::new(&format!(r"(?i)([a-z])({word}\b)")).expect("conjunction regex")
            })
            .collect();
        Self { conjunctions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_single_character_splits() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize_page("Algo ritma"), "Algoritma");
        assert_eq!(normalizer.normalize_page("Jane Doe"), "Jane Doe");
    }

    #[test]
    fn separates_glued_conjunctions() {
        let normalizer = Normalizer::default();
        assert_eq!(
            normalizer.normalize_page("Strukturdan Algoritma"),
            "Struktur dan Algoritma"
        );
        assert_eq!(
            normalizer.normalize_page("Sistemuntuk Bisnis"),
            "Sistem untuk Bisnis"
        );
    }

    #[test]
    fn splits_camel_case_boundaries() {
        let normalizer = Normalizer::default();
        assert_eq!(
            normalizer.normalize_page("IF12345 DataStructures 3"),
            "IF12345 Data Structures 3"
        );
    }

    #[test]
    fn collapses_whitespace_and_trims() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize_page("  IPK \t 3.45 \n\n "), "IPK 3.45");
    }

    #[test]
    fn custom_conjunctions_replace_defaults() {
        let normalizer = Normalizer::new(["and"]).expect("valid conjunctions");
        assert_eq!(normalizer.normalize_page("Dataand Logic"), "Data and Logic");
        assert_eq!(normalizer.normalize_page("Strukturdan"), "Strukturdan");
    }

    #[test]
    fn pages_are_joined_with_newlines() {
        let normalizer = Normalizer::default();
        let text = normalizer.normalize_pages(&["NRP  / Nama", " IPK 3.00 "]);
        assert_eq!(text, "NRP / Nama\nIPK 3.00");
    }
}
