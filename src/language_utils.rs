//! Language helpers built on ISO 639 codes.
//!
//! Target languages may be given as a code (`fr`, `fra`, `fre`) or as a free
//! form name (`Brazilian Portuguese`). Codes are resolved through `isolang`;
//! anything else is passed to the model verbatim.

use isolang::Language;

// ISO 639-2/B codes that differ from their 639-2/T form
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Resolve a 2- or 3-letter code to a language
pub fn lookup_code(code: &str) -> Option<Language> {
    let normalized = code.trim().to_lowercase();
    match normalized.len() {
        2 => Language::from_639_1(&normalized),
        3 => {
            let part2t = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == normalized)
                .map_or(normalized.as_str(), |(_, t)| *t);
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

/// Human readable language name for prompts and titles
pub fn display_name(language: &str) -> String {
    match lookup_code(language) {
        Some(lang) => lang.to_name().to_string(),
        None => language.trim().to_string(),
    }
}

/// Stable identifier for a language: the ISO 639-1 code when one exists,
/// else the 639-3 code, else the lowercased input
pub fn canonical_code(language: &str) -> String {
    match lookup_code(language) {
        Some(lang) => lang
            .to_639_1()
            .map(str::to_string)
            .unwrap_or_else(|| lang.to_639_3().to_string()),
        None => language.trim().to_lowercase(),
    }
}

/// Check if two language identifiers represent the same language
pub fn languages_match(a: &str, b: &str) -> bool {
    canonical_code(a) == canonical_code(b)
}
