/*!
 * Tests for language code utilities
 */

use subglot::language_utils;

/// Two- and three-letter codes resolve to the same name
#[test]
fn test_displayName_withIsoCodes_shouldResolve() {
    assert_eq!(language_utils::display_name("fr"), "French");
    assert_eq!(language_utils::display_name("fre"), "French");
    assert_eq!(language_utils::display_name("ja"), "Japanese");
}

/// Free-form names are passed through unchanged
#[test]
fn test_displayName_withFreeForm_shouldPassThrough() {
    assert_eq!(language_utils::display_name("Simplified Chinese"), "Simplified Chinese");
}

/// Bibliographic and terminologic codes match each other
#[test]
fn test_languagesMatch_withEquivalentCodes_shouldBeTrue() {
    assert!(language_utils::languages_match("de", "ger"));
    assert!(language_utils::languages_match("deu", "DE"));
    assert!(!language_utils::languages_match("de", "fr"));
}

#[test]
fn test_canonicalCode_withThreeLetterCode_shouldPreferTwoLetters() {
    assert_eq!(language_utils::canonical_code("chi"), "zh");
}
