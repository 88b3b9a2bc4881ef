//! Canonicalisation of user-entered place text before it reaches a provider.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::RegionBias;
use crate::model::NormalizedQuery;

/// Words that users commonly glue onto an institution name ("ljuniversity").
const INSTITUTION_KEYWORDS: &[&str] = &["university", "college", "institute", "technology", "school"];

/// Tokens up to this many letters are treated as acronyms and upper-cased.
const ACRONYM_MAX_CHARS: usize = 3;

static JAMMED_KEYWORDS: Lazy<Vec<Regex>> = Lazy::new(|| {
    INSTITUTION_KEYWORDS
        .iter()
        .map(|word| Regex::new(&format!("(?i)([a-z])({word})")).expect("valid regex"))
        .collect()
});

static KEYWORD_AFTER_NON_DIGIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("(?i)([^0-9\\s])({})", INSTITUTION_KEYWORDS.join("|")))
        .expect("valid regex")
});

// Well-known local institution prefix, e.g. "lj university".
static ACRONYM_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^lj\s*").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct Normalizer {
    country_name: String,
}

impl Normalizer {
    pub fn new(region: &RegionBias) -> Self {
        Self {
            country_name: region.country_name.clone(),
        }
    }

    /// Collapses whitespace and appends the country suffix unless the text
    /// already names the country.
    pub fn normalize(&self, text: &str) -> NormalizedQuery {
        NormalizedQuery {
            raw: text.to_string(),
            normalized: self.with_country(&collapse_whitespace(text)),
        }
    }

    pub fn with_country(&self, text: &str) -> String {
        if text.is_empty() || self.has_country(text) {
            return text.to_string();
        }
        format!("{text}, {}", self.country_name)
    }

    fn has_country(&self, text: &str) -> bool {
        text.to_lowercase()
            .contains(&self.country_name.to_lowercase())
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalises a city or area name: splits jammed institution keywords,
/// upper-cases acronyms and title-cases everything else.
pub fn normalize_place_name(text: &str) -> String {
    let mut value = collapse_whitespace(text);
    if value.is_empty() {
        return value;
    }

    for pattern in JAMMED_KEYWORDS.iter() {
        value = pattern.replace_all(&value, "$1 $2").into_owned();
    }
    value = ACRONYM_PREFIX.replace(&value, "LJ ").into_owned();

    value
        .split_whitespace()
        .map(title_case_token)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Variant of an unspaced name with a space inserted before any institution
/// keyword. Returns `None` when the name already has spaces or nothing changes.
pub fn split_jammed_variant(name: &str) -> Option<String> {
    if name.is_empty() || name.contains(' ') {
        return None;
    }
    let variant = KEYWORD_AFTER_NON_DIGIT.replace_all(name, "$1 $2").into_owned();
    (variant != name).then_some(variant)
}

fn title_case_token(token: &str) -> String {
    let is_acronym = token.chars().count() <= ACRONYM_MAX_CHARS
        && token.chars().all(char::is_alphabetic);
    if is_acronym {
        return token.to_uppercase();
    }

    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(&RegionBias::default())
    }

    #[test]
    fn every_institution_keyword_has_a_pattern() {
        assert_eq!(JAMMED_KEYWORDS.len(), INSTITUTION_KEYWORDS.len());
        for word in INSTITUTION_KEYWORDS {
            assert_eq!(
                split_jammed_variant(&format!("ab{word}")),
                Some(format!("ab {word}"))
            );
        }
    }

    #[test]
    fn collapses_whitespace_and_appends_country() {
        let query = normalizer().normalize("  Navrangpura   Ahmedabad \t ");
        assert_eq!(query.normalized, "Navrangpura Ahmedabad, India");
        assert_eq!(query.raw, "  Navrangpura   Ahmedabad \t ");
        assert!(!query.normalized.contains("  "));
    }

    #[test]
    fn does_not_duplicate_country_token() {
        let query = normalizer().normalize("Satellite, Ahmedabad, INDIA");
        assert_eq!(query.normalized, "Satellite, Ahmedabad, INDIA");
    }

    #[test]
    fn blank_input_stays_empty() {
        let query = normalizer().normalize("   ");
        assert!(query.is_empty());
    }

    #[test]
    fn splits_jammed_institution_names() {
        assert_eq!(normalize_place_name("ljuniversity"), "LJ University");
        assert_eq!(normalize_place_name("  nirma   university "), "Nirma University");
        assert_eq!(normalize_place_name("gecollege"), "GE College");
    }

    #[test]
    fn short_alphabetic_tokens_are_acronyms() {
        assert_eq!(normalize_place_name("iim ahmedabad"), "IIM Ahmedabad");
        assert_eq!(normalize_place_name("sector 21"), "Sector 21");
        assert_eq!(normalize_place_name("a1b"), "A1b");
    }

    #[test]
    fn jammed_variant_only_for_unspaced_names() {
        assert_eq!(
            split_jammed_variant("LJ-University"),
            Some("LJ- University".to_string())
        );
        assert_eq!(split_jammed_variant("LJ University"), None);
        assert_eq!(split_jammed_variant("Bopal"), None);
        assert_eq!(split_jammed_variant("21school"), None);
    }
}
