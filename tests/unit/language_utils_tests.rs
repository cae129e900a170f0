/*!
 * Tests for language utility functions
 */

use anyhow::Result;
use screenlate::language_utils::{get_language_name, language_codes_match, normalize_language_code, validate_language_code};

/// Test validation of language codes
#[test]
fn test_validate_language_code_withValidCodes_shouldAccept() {
    // ISO 639-1
    assert!(validate_language_code("en").is_ok());
    assert!(validate_language_code("ja").is_ok());

    // ISO 639-2/T and 639-2/B
    assert!(validate_language_code("jpn").is_ok());
    assert!(validate_language_code("deu").is_ok());
    assert!(validate_language_code("ger").is_ok());

    // Whitespace and case
    assert!(validate_language_code(" EN ").is_ok());
    assert!(validate_language_code("JPN").is_ok());
}

#[test]
fn test_validate_language_code_withInvalidCodes_shouldReject() {
    assert!(validate_language_code("qqq").is_err());
    assert!(validate_language_code("123").is_err());
    assert!(validate_language_code("e").is_err());
    assert!(validate_language_code("english").is_err());
}

/// Normalized codes are the translation cache key
#[test]
fn test_normalize_language_code_withEquivalentForms_shouldAgree() {
    assert_eq!(normalize_language_code("ja"), "ja");
    assert_eq!(normalize_language_code("jpn"), "ja");
    assert_eq!(normalize_language_code(" JA "), "ja");
    assert_eq!(normalize_language_code("fre"), "fr");
    assert_eq!(normalize_language_code("fra"), "fr");
}

#[test]
fn test_normalize_language_code_withUnknownCode_shouldTrimAndLowercase() {
    assert_eq!(normalize_language_code(" XX-Custom "), "xx-custom");
}

#[test]
fn test_language_codes_match_withDifferentFormats_shouldMatch() {
    assert!(language_codes_match("en", "eng"));
    assert!(language_codes_match("de", "ger"));
    assert!(language_codes_match("ja", " JPN "));
    assert!(!language_codes_match("ja", "zh"));
    assert!(!language_codes_match("qqq", "qqq"));
}

#[test]
fn test_get_language_name_withValidCodes_shouldReturnEnglishName() -> Result<()> {
    assert_eq!(get_language_name("en")?, "English");
    assert_eq!(get_language_name("ja")?, "Japanese");
    assert_eq!(get_language_name("ger")?, "German");
    Ok(())
}

#[test]
fn test_get_language_name_withInvalidCode_shouldFail() {
    assert!(get_language_name("").is_err());
    assert!(get_language_name("qqq").is_err());
}
