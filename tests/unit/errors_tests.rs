/*!
 * Tests for error types and conversions
 */

use screenlate::errors::{AppError, BackendError, ConfigError, GlueError, OcrError};

#[test]
fn test_backend_error_display_shouldDescribeCause() {
    assert_eq!(
        BackendError::Timeout { timeout_ms: 1500 }.to_string(),
        "Translation request timed out after 1500 ms"
    );
    assert_eq!(
        BackendError::Rejected("block 3".to_string()).to_string(),
        "Block rejected by backend: block 3"
    );
}

#[test]
fn test_glue_error_display_shouldIncludeCountAndLimit() {
    let error = GlueError::TooManyFragments { count: 2500, limit: 2000 };
    assert_eq!(error.to_string(), "Too many fragments in one cycle: 2500 (limit 2000)");
}

#[test]
fn test_ocr_error_display_shouldNameProvider() {
    let error = OcrError::RecognitionFailed {
        provider: "tesseract".to_string(),
        message: "no image".to_string(),
    };
    assert_eq!(error.to_string(), "Recognition failed for provider tesseract: no image");
}

#[test]
fn test_app_error_from_backendError_shouldWrap() {
    let error: AppError = BackendError::RequestFailed("connection reset".to_string()).into();
    assert!(matches!(error, AppError::Backend(BackendError::RequestFailed(_))));
    assert_eq!(
        error.to_string(),
        "Backend error: Translation request failed: connection reset"
    );
}

#[test]
fn test_app_error_from_glueAndOcrErrors_shouldWrap() {
    let glue: AppError = GlueError::TooManyFragments { count: 3, limit: 2 }.into();
    assert!(matches!(glue, AppError::Glue(_)));

    let ocr: AppError = OcrError::CaptureFailed("window closed".to_string()).into();
    assert!(matches!(ocr, AppError::Ocr(_)));
    assert_eq!(ocr.to_string(), "OCR error: Screen capture failed: window closed");
}

#[test]
fn test_config_error_from_serdeError_shouldBeParseError() {
    let parse_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let error: ConfigError = parse_error.into();
    assert!(matches!(error, ConfigError::Parse(_)));

    let app: AppError = error.into();
    assert!(app.to_string().starts_with("Config error: Config parse error:"));
}

#[test]
fn test_app_error_from_ioAndAnyhow_shouldConvert() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing trace");
    let error: AppError = io.into();
    assert!(matches!(error, AppError::File(ref msg) if msg == "missing trace"));

    let error: AppError = anyhow::anyhow!("something odd").into();
    assert!(matches!(error, AppError::Unknown(ref msg) if msg == "something odd"));
}
