//! Input validation for job submission and manual status overrides.
//!
//! Locale codes follow the BCP 47 shape used by the content store:
//! a 2-3 letter language subtag, optionally followed by script / region
//! subtags (`en`, `en-US`, `zh-Hant-TW`).

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of a job display name.
pub const MAX_JOB_NAME_LEN: usize = 255;

/// Maximum length of the `current_step` free text.
pub const MAX_STEP_LEN: usize = 500;

/// Default page size for job listing.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size for job listing.
pub const MAX_PAGE_SIZE: i64 = 100;

// ---------------------------------------------------------------------------
// Job fields
// ---------------------------------------------------------------------------

/// Validate a job display name.
pub fn validate_job_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Job name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_JOB_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Job name must not exceed {MAX_JOB_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate a single locale code (`en`, `de-DE`, `zh-Hant-TW`).
pub fn validate_locale_code(code: &str) -> Result<(), CoreError> {
    let mut parts = code.split('-');

    let language = parts.next().unwrap_or_default();
    let language_ok = (2..=3).contains(&language.len())
        && language.chars().all(|c| c.is_ascii_alphabetic());
    if !language_ok {
        return Err(CoreError::Validation(format!(
            "Invalid locale code \"{code}\": language subtag must be 2-3 letters"
        )));
    }

    for subtag in parts {
        let subtag_ok = (2..=8).contains(&subtag.len())
            && subtag.chars().all(|c| c.is_ascii_alphanumeric());
        if !subtag_ok {
            return Err(CoreError::Validation(format!(
                "Invalid locale code \"{code}\": malformed subtag \"{subtag}\""
            )));
        }
    }

    Ok(())
}

/// Validate the source/target locale pair of a job.
pub fn validate_locale_pair(from: &str, to: &str) -> Result<(), CoreError> {
    validate_locale_code(from)?;
    validate_locale_code(to)?;
    if from.eq_ignore_ascii_case(to) {
        return Err(CoreError::Validation(format!(
            "Source and target locale must differ (both \"{from}\")"
        )));
    }
    Ok(())
}

/// Validate a progress percentage.
pub fn validate_progress(percent: i16) -> Result<(), CoreError> {
    if !(0..=100).contains(&percent) {
        return Err(CoreError::Validation(format!(
            "Progress must be between 0 and 100, got {percent}"
        )));
    }
    Ok(())
}

/// Validate the free-text step description.
pub fn validate_step(step: &str) -> Result<(), CoreError> {
    if step.chars().count() > MAX_STEP_LEN {
        return Err(CoreError::Validation(format!(
            "Step description must not exceed {MAX_STEP_LEN} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Resolve a 1-based page number, defaulting to the first page.
pub fn clamp_page(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

/// Resolve a page size into `1..=MAX_PAGE_SIZE`.
pub fn clamp_page_size(page_size: Option<i64>) -> i64 {
    page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Row offset of a resolved page. Saturates instead of overflowing, so an
/// absurd page number yields an empty page.
pub fn page_offset(page: i64, page_size: i64) -> i64 {
    (page.max(1) - 1).saturating_mul(page_size.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- names ----------------------------------------------------------------

    #[test]
    fn blank_name_rejected() {
        assert!(validate_job_name("   ").is_err());
    }

    #[test]
    fn long_name_rejected() {
        let name = "n".repeat(MAX_JOB_NAME_LEN + 1);
        assert!(validate_job_name(&name).is_err());
    }

    // -- locales --------------------------------------------------------------

    #[test]
    fn common_locales_accepted() {
        for code in ["en", "fr", "de-DE", "pt-BR", "zh-Hant-TW", "es-419"] {
            assert!(validate_locale_code(code).is_ok(), "{code} should be valid");
        }
    }

    #[test]
    fn malformed_locales_rejected() {
        for code in ["", "e", "english", "en_US", "en-", "en-U", "12"] {
            assert!(validate_locale_code(code).is_err(), "{code} should be invalid");
        }
    }

    #[test]
    fn identical_pair_rejected() {
        assert!(validate_locale_pair("en-US", "en-us").is_err());
        assert!(validate_locale_pair("en-US", "de-DE").is_ok());
    }

    // -- progress -------------------------------------------------------------

    #[test]
    fn progress_bounds() {
        assert!(validate_progress(0).is_ok());
        assert!(validate_progress(100).is_ok());
        assert!(validate_progress(-1).is_err());
        assert!(validate_progress(101).is_err());
    }

    // -- pagination -----------------------------------------------------------

    #[test]
    fn page_defaults_and_clamps() {
        assert_eq!(clamp_page(None), 1);
        assert_eq!(clamp_page(Some(0)), 1);
        assert_eq!(clamp_page_size(None), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(1000)), MAX_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(0)), 1);
        assert_eq!(page_offset(3, 20), 40);
    }

    #[test]
    fn page_offset_saturates_on_huge_pages() {
        assert_eq!(page_offset(i64::MAX, 20), i64::MAX);
        assert_eq!(page_offset(i64::MAX, MAX_PAGE_SIZE), i64::MAX);
        assert_eq!(page_offset(1, MAX_PAGE_SIZE), 0);
    }
}
