//! Modelcard markdown parsing.
//!
//! A modelcard is a markdown document, optionally prefixed by YAML
//! front-matter between `---` delimiters. Front-matter is the structured,
//! highest-authority source; the regex extractors below recover a few
//! fields from the free text as lower-authority fallbacks.

use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::warn;

/// Front-matter value that may be a single string or a list.
///
/// HuggingFace cards write `language: en` and `language: [en, fr]`
/// interchangeably.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::One(s) => vec![s],
            StringOrList::Many(v) => v,
        }
    }
}

/// Structured front-matter of a modelcard or hub README.
///
/// Unknown keys are ignored; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelcardFrontMatter {
    #[serde(default, alias = "model_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub license_link: Option<String>,
    #[serde(default)]
    pub library_name: Option<String>,
    #[serde(default)]
    pub language: Option<StringOrList>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub tasks: Option<Vec<String>>,
    #[serde(default)]
    pub pipeline_tag: Option<String>,
    #[serde(default)]
    pub validated_on: Option<Vec<String>>,
    #[serde(default)]
    pub release_date: Option<String>,
}

impl ModelcardFrontMatter {
    pub fn languages(&self) -> Vec<String> {
        self.language.clone().map(StringOrList::into_vec).unwrap_or_default()
    }

    /// Tasks declared in front-matter, folding in the pipeline tag.
    pub fn all_tasks(&self) -> Vec<String> {
        let mut tasks = self.tasks.clone().unwrap_or_default();
        if let Some(tag) = &self.pipeline_tag {
            if !tasks.contains(tag) {
                tasks.push(tag.clone());
            }
        }
        tasks
    }
}

/// A modelcard split into parsed front-matter and markdown body.
#[derive(Debug, Clone, Default)]
pub struct ParsedModelcard {
    pub front_matter: Option<ModelcardFrontMatter>,
    pub body: String,
}

/// Split a document into its raw front-matter block and the body.
///
/// The front-matter block must start on the first line. Returns `None`
/// for the block when no well-formed delimiter pair is found.
pub fn split_front_matter(text: &str) -> (Option<String>, String) {
    let trimmed = text.trim_start_matches('\u{feff}');
    let Some(rest) = trimmed.strip_prefix("---") else {
        return (None, text.to_string());
    };
    let Some(rest) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
        return (None, text.to_string());
    };

    for delimiter in ["\n---\n", "\n---\r\n", "\r\n---\r\n", "\r\n---\n"] {
        if let Some(pos) = rest.find(delimiter) {
            let block = rest[..pos].to_string();
            let body = rest[pos + delimiter.len()..].to_string();
            return (Some(block), body);
        }
    }
    // Front-matter that runs to the end of the document.
    if let Some(block) = rest
        .strip_suffix("\n---")
        .or_else(|| rest.strip_suffix("\n---\n"))
    {
        return (Some(block.to_string()), String::new());
    }

    (None, text.to_string())
}

/// Remove the front-matter block, keeping only the markdown body.
pub fn strip_front_matter(text: &str) -> String {
    let (_, body) = split_front_matter(text);
    body.trim_start().to_string()
}

/// Parse a modelcard document.
///
/// A malformed front-matter block degrades to "no front-matter" with a
/// warning; the body is always preserved.
pub fn parse_modelcard(text: &str) -> ParsedModelcard {
    let (block, body) = split_front_matter(text);
    let front_matter = block.and_then(|raw| match serde_yaml::from_str(&raw) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Ignoring malformed modelcard front-matter: {}", e);
            None
        }
    });

    ParsedModelcard { front_matter, body }
}

static TITLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+?)\s*$").unwrap());

static PROVIDER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*\*{0,2}(?:model\s+)?(?:developers?|providers?)\*{0,2}\s*:\s*\*{0,2}(.+?)\*{0,2}\s*$")
        .unwrap()
});

static DEVELOPED_BY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*[-*]?\s*\*{0,2}developed\s+by\*{0,2}\s*:\s*\*{0,2}(.+?)\*{0,2}\s*$")
        .unwrap()
});

static RELEASE_DATE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*[-*]?\s*\*{0,2}release\s+date\*{0,2}\s*:\s*\*{0,2}(.+?)\*{0,2}\s*$")
        .unwrap()
});

/// First markdown H1 of the body.
pub fn extract_title(body: &str) -> Option<String> {
    TITLE
        .captures(body)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Provider from a "Model developers:" or "Developed by:" line.
pub fn extract_provider(body: &str) -> Option<String> {
    PROVIDER_LINE
        .captures(body)
        .or_else(|| DEVELOPED_BY_LINE.captures(body))
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Explicit release-date line, as written (date parsing happens later).
pub fn extract_release_date(body: &str) -> Option<String> {
    RELEASE_DATE_LINE
        .captures(body)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}

/// First prose paragraph of the body.
///
/// Headings, list items, tables, images and quote lines do not qualify.
pub fn extract_description(body: &str) -> Option<String> {
    for paragraph in body.split("\n\n") {
        let joined = paragraph
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let trimmed = joined.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with(['#', '-', '*', '|', '>', '!', '`']) {
            continue;
        }
        return Some(trimmed.to_string());
    }
    None
}
