//! Field merge and precedence resolution.
//!
//! Candidates for one logical field arrive from many sources during an
//! enrichment pass. The rules here decide which value survives:
//!
//! - a present higher-authority candidate overrides a lower one; an
//!   absent or empty candidate retains the prior value unchanged, so a
//!   field's source only ever improves in authority
//! - list fields union instead of replacing, except that a front-matter
//!   candidate replaces lower-authority values outright (still deduped)
//! - the hub API's literal `"other"` license is treated as absent
//! - date strings convert to epoch milliseconds; `create` is never
//!   defaulted, `update` falls back to `create`

use crate::provenance::{Source, Sourced};
use chrono::NaiveDate;

/// Merge one scalar candidate into the current field state.
pub fn merge_scalar(current: &mut Sourced<String>, candidate: Option<&str>, source: Source) {
    let Some(value) = candidate.map(str::trim).filter(|v| !v.is_empty()) else {
        return;
    };

    if !current.is_set() || source > current.source {
        *current = Sourced::new(value.to_string(), source);
    }
}

/// Merge a license candidate.
///
/// The hub API's dedicated license field reports `"other"` for anything
/// without a canonical SPDX id; that value never displaces (or seeds) a
/// license, concrete strings from tags or front-matter win.
pub fn merge_license(current: &mut Sourced<String>, candidate: Option<&str>, source: Source) {
    if source == Source::HubApi
        && candidate
            .map(|v| v.trim().eq_ignore_ascii_case("other"))
            .unwrap_or(false)
    {
        return;
    }
    merge_scalar(current, candidate, source);
}

/// Merge a list candidate.
///
/// Items are trimmed, empties dropped, duplicates removed (first
/// occurrence wins). Front-matter candidates replace lower-authority
/// values; every other source unions into what is already there.
pub fn merge_list(current: &mut Sourced<Vec<String>>, candidate: &[String], source: Source) {
    let mut cleaned: Vec<String> = Vec::new();
    for item in candidate {
        let item = item.trim();
        if !item.is_empty() && !cleaned.iter().any(|existing| existing == item) {
            cleaned.push(item.to_string());
        }
    }
    if cleaned.is_empty() {
        return;
    }

    if source.is_frontmatter() && source > current.source {
        *current = Sourced::new(cleaned, source);
        return;
    }

    match &mut current.value {
        Some(existing) => {
            for item in cleaned {
                if !existing.contains(&item) {
                    existing.push(item);
                }
            }
            current.source = current.source.max(source);
        }
        None => *current = Sourced::new(cleaned, source),
    }
}

/// Merge an epoch-millisecond timestamp candidate.
pub fn merge_timestamp(current: &mut Sourced<i64>, candidate: Option<i64>, source: Source) {
    let Some(value) = candidate else {
        return;
    };
    if !current.is_set() || source > current.source {
        *current = Sourced::new(value, source);
    }
}

/// Parse a human-written date string to epoch milliseconds (UTC midnight
/// for date-only forms). Returns `None` for anything unrecognized.
pub fn parse_date_to_epoch_ms(text: &str) -> Option<i64> {
    let text = text.trim().trim_end_matches('.');
    if text.is_empty() {
        return None;
    }

    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(datetime.timestamp_millis());
    }

    let date_formats = ["%Y-%m-%d", "%m/%d/%Y", "%B %d, %Y", "%d %B %Y"];
    for format in date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date_to_millis(date);
        }
    }

    // Month-and-year forms ("April 2024") resolve to the first of the month.
    for format in ["%d %B %Y", "%d %m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("1 {}", text), format) {
            return date_to_millis(date);
        }
    }

    None
}

fn date_to_millis(date: NaiveDate) -> Option<i64> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_higher_authority_overrides() {
        let mut field = Sourced::new("old".to_string(), Source::HubApi);
        merge_scalar(&mut field, Some("new"), Source::ModelcardFrontmatter);
        assert_eq!(field.value.as_deref(), Some("new"));
        assert_eq!(field.source, Source::ModelcardFrontmatter);
    }

    #[test]
    fn test_scalar_lower_authority_retained() {
        let mut field = Sourced::new("card".to_string(), Source::ModelcardFrontmatter);
        merge_scalar(&mut field, Some("api"), Source::HubApi);
        assert_eq!(field.value.as_deref(), Some("card"));
        assert_eq!(field.source, Source::ModelcardFrontmatter);
    }

    #[test]
    fn test_scalar_empty_candidate_keeps_prior() {
        let mut field = Sourced::new("kept".to_string(), Source::HubApi);
        merge_scalar(&mut field, Some("   "), Source::ModelcardFrontmatter);
        merge_scalar(&mut field, None, Source::ModelcardFrontmatter);
        assert_eq!(field.value.as_deref(), Some("kept"));
        assert_eq!(field.source, Source::HubApi);
    }

    #[test]
    fn test_monotonic_precedence_over_a_pass() {
        let mut field: Sourced<String> = Sourced::absent();
        merge_scalar(&mut field, Some("generated"), Source::Generated);
        merge_scalar(&mut field, Some("api"), Source::HubApi);
        merge_scalar(&mut field, Some("card"), Source::ModelcardFrontmatter);
        // Later lower-authority candidates change nothing.
        merge_scalar(&mut field, Some("regex"), Source::HubRegex);
        merge_scalar(&mut field, Some("tags"), Source::HubTags);
        assert_eq!(field.value.as_deref(), Some("card"));
        assert_eq!(field.source, Source::ModelcardFrontmatter);
    }

    #[test]
    fn test_license_other_from_api_is_absent() {
        let mut field: Sourced<String> = Sourced::absent();
        merge_license(&mut field, Some("other"), Source::HubApi);
        assert!(!field.is_set());

        let mut field = Sourced::new("apache-2.0".to_string(), Source::HubTags);
        merge_license(&mut field, Some("other"), Source::HubApi);
        assert_eq!(field.value.as_deref(), Some("apache-2.0"));

        // A concrete license from the API still merges normally.
        let mut field: Sourced<String> = Sourced::absent();
        merge_license(&mut field, Some("mit"), Source::HubApi);
        assert_eq!(field.value.as_deref(), Some("mit"));

        // "other" from a non-API source is taken literally.
        let mut field: Sourced<String> = Sourced::absent();
        merge_license(&mut field, Some("other"), Source::ModelcardFrontmatter);
        assert_eq!(field.value.as_deref(), Some("other"));
    }

    #[test]
    fn test_list_union_dedupes() {
        let mut field = Sourced::new(
            vec!["granite".to_string(), "code".to_string()],
            Source::ModelcardRegex,
        );
        merge_list(
            &mut field,
            &["code".to_string(), "text-generation".to_string()],
            Source::HubTags,
        );
        assert_eq!(
            field.value.as_deref(),
            Some(&["granite".to_string(), "code".to_string(), "text-generation".to_string()][..])
        );
        // Union keeps the higher-authority tag.
        assert_eq!(field.source, Source::ModelcardRegex);
    }

    #[test]
    fn test_list_frontmatter_replaces() {
        let mut field = Sourced::new(vec!["stale".to_string()], Source::HubTags);
        merge_list(
            &mut field,
            &["en".to_string(), "fr".to_string(), "en".to_string()],
            Source::HubFrontmatter,
        );
        assert_eq!(
            field.value.as_deref(),
            Some(&["en".to_string(), "fr".to_string()][..])
        );
        assert_eq!(field.source, Source::HubFrontmatter);
    }

    #[test]
    fn test_list_frontmatter_does_not_replace_higher() {
        let mut field = Sourced::new(vec!["card".to_string()], Source::ModelcardFrontmatter);
        merge_list(&mut field, &["hub".to_string()], Source::HubFrontmatter);
        // Hub front-matter sits below modelcard front-matter: union, not replace.
        assert_eq!(
            field.value.as_deref(),
            Some(&["card".to_string(), "hub".to_string()][..])
        );
        assert_eq!(field.source, Source::ModelcardFrontmatter);
    }

    #[test]
    fn test_parse_dates() {
        assert_eq!(parse_date_to_epoch_ms("1970-01-01"), Some(0));
        assert_eq!(
            parse_date_to_epoch_ms("1970-01-02"),
            Some(24 * 60 * 60 * 1000)
        );
        assert!(parse_date_to_epoch_ms("April 18, 2024").is_some());
        assert!(parse_date_to_epoch_ms("April 2024").is_some());
        assert!(parse_date_to_epoch_ms("2024-04-18T10:00:00Z").is_some());
        assert_eq!(parse_date_to_epoch_ms("not a date"), None);
        assert_eq!(parse_date_to_epoch_ms(""), None);
    }
}
