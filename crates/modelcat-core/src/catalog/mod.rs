//! Catalog consolidation.
//!
//! Collapses the per-reference extracted records into one catalog entry
//! per logical model, then appends the separately supplied static
//! records. Grouping uses the same identifier normalization as the
//! matcher, so "Test-Model" and "test model " land in one group.
//! Static records belong to a different trust tier: they are never
//! merged, with each other or with dynamic records.

use crate::enrich::derive_logo;
use crate::matching::normalize_identifier;
use crate::models::{Artifact, CatalogDocument, CatalogMetadata, CustomValue, ExtractedMetadata};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Convert one extracted record to the catalog output shape.
///
/// Timestamps become decimal strings, tags move into the
/// custom-properties map, and a logo reference is derived.
pub fn to_catalog_metadata(extracted: &ExtractedMetadata) -> CatalogMetadata {
    let mut custom_properties: BTreeMap<String, CustomValue> = BTreeMap::new();
    for tag in &extracted.tags {
        custom_properties.insert(tag.clone(), CustomValue::String(String::new()));
    }

    CatalogMetadata {
        name: extracted.name.clone(),
        provider: extracted.provider.clone(),
        description: extracted.description.clone(),
        readme: extracted.readme.clone(),
        license: extracted.license.clone(),
        license_link: extracted.license_link.clone(),
        library_name: extracted.library_name.clone(),
        logo: derive_logo(extracted.name.as_deref(), extracted.provider.as_deref()),
        language: extracted.language.clone(),
        tasks: extracted.tasks.clone(),
        validated_on: extracted.validated_on.clone(),
        create_time_since_epoch: extracted.create_time_since_epoch.map(|t| t.to_string()),
        last_update_time_since_epoch: extracted
            .last_update_time_since_epoch
            .map(|t| t.to_string()),
        custom_properties,
        artifacts: extracted.artifacts.clone(),
    }
}

/// Group key for deduplication; `None` means the record never groups.
fn group_key(record: &CatalogMetadata) -> Option<String> {
    let name = record.name.as_deref()?.trim();
    if name.is_empty() {
        return None;
    }
    let normalized = normalize_identifier(name);
    (!normalized.is_empty()).then_some(normalized)
}

fn parse_ts(value: &Option<String>) -> Option<i64> {
    value.as_deref().and_then(|v| v.trim().parse().ok())
}

/// Merge one group of records that resolve to the same logical model.
///
/// Scalars keep the first non-absent value in group order, arrays union,
/// artifacts union by URI, and the timestamps take the extremes across
/// members and their artifacts.
fn merge_group(members: Vec<CatalogMetadata>) -> CatalogMetadata {
    let mut merged = CatalogMetadata::default();
    let mut artifacts: Vec<Artifact> = Vec::new();
    let mut earliest_create: Option<i64> = None;
    let mut latest_update: Option<i64> = None;

    let mut fold_create = |candidate: Option<i64>| {
        if let Some(value) = candidate {
            earliest_create = Some(earliest_create.map_or(value, |e: i64| e.min(value)));
        }
    };
    let mut fold_update = |candidate: Option<i64>| {
        if let Some(value) = candidate {
            latest_update = Some(latest_update.map_or(value, |l: i64| l.max(value)));
        }
    };

    for member in members {
        merged.name = merged.name.or(member.name);
        merged.provider = merged.provider.or(member.provider);
        merged.description = merged.description.or(member.description);
        merged.readme = merged.readme.or(member.readme);
        merged.license = merged.license.or(member.license);
        merged.license_link = merged.license_link.or(member.license_link);
        merged.library_name = merged.library_name.or(member.library_name);
        merged.logo = merged.logo.or(member.logo);

        for language in member.language {
            if !merged.language.contains(&language) {
                merged.language.push(language);
            }
        }
        for task in member.tasks {
            if !merged.tasks.contains(&task) {
                merged.tasks.push(task);
            }
        }
        for validated in member.validated_on {
            if !merged.validated_on.contains(&validated) {
                merged.validated_on.push(validated);
            }
        }
        for (key, value) in member.custom_properties {
            merged.custom_properties.entry(key).or_insert(value);
        }

        fold_create(parse_ts(&member.create_time_since_epoch));
        fold_update(parse_ts(&member.last_update_time_since_epoch));

        for artifact in member.artifacts {
            fold_create(artifact.create_time_since_epoch);
            fold_update(artifact.last_update_time_since_epoch);
            if !artifacts.iter().any(|existing| existing.uri == artifact.uri) {
                artifacts.push(artifact);
            }
        }
    }

    merged.artifacts = artifacts;
    merged.create_time_since_epoch = earliest_create.map(|t| t.to_string());
    // The merged update time falls back to the merged create time.
    merged.last_update_time_since_epoch = latest_update.or(earliest_create).map(|t| t.to_string());
    merged
}

/// Consolidate dynamic and static records into the final document.
///
/// Named dynamic groups sort by name ascending (case-sensitive); static
/// records follow in the order given; unnamed dynamic records go last.
pub fn consolidate(
    dynamic: Vec<ExtractedMetadata>,
    static_records: Vec<CatalogMetadata>,
) -> CatalogDocument {
    let mut groups: Vec<(String, Vec<CatalogMetadata>)> = Vec::new();
    let mut unnamed: Vec<CatalogMetadata> = Vec::new();

    for extracted in &dynamic {
        let record = to_catalog_metadata(extracted);
        match group_key(&record) {
            Some(key) => match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(record),
                None => groups.push((key, vec![record])),
            },
            None => unnamed.push(record),
        }
    }

    let mut named: Vec<CatalogMetadata> = groups
        .into_iter()
        .map(|(key, members)| {
            if members.len() > 1 {
                debug!("Merging {} records for {}", members.len(), key);
            }
            merge_group(members)
        })
        .collect();
    named.sort_by(|a, b| a.name.cmp(&b.name));

    info!(
        "Catalog: {} consolidated, {} static, {} unnamed",
        named.len(),
        static_records.len(),
        unnamed.len()
    );

    let mut models = named;
    models.extend(static_records);
    models.extend(unnamed);

    CatalogDocument {
        source: Some("modelcat".to_string()),
        models,
    }
}
