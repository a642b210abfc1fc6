//! Generated fallback values.
//!
//! Everything produced here carries `Source::Generated`, the lowest
//! non-null authority: real data from any source displaces it.

/// Canonical URL for a known license id.
///
/// Keys follow the lowercase id convention used in hub tags and
/// front-matter (`license: apache-2.0`).
pub fn license_url(license_id: &str) -> Option<&'static str> {
    let table: &[(&str, &str)] = &[
        ("apache-2.0", "https://www.apache.org/licenses/LICENSE-2.0.txt"),
        ("mit", "https://opensource.org/license/mit"),
        ("bsd-3-clause", "https://opensource.org/license/bsd-3-clause"),
        ("gpl-3.0", "https://www.gnu.org/licenses/gpl-3.0.txt"),
        ("lgpl-3.0", "https://www.gnu.org/licenses/lgpl-3.0.txt"),
        ("agpl-3.0", "https://www.gnu.org/licenses/agpl-3.0.txt"),
        ("mpl-2.0", "https://www.mozilla.org/en-US/MPL/2.0/"),
        ("cc-by-4.0", "https://creativecommons.org/licenses/by/4.0/"),
        ("cc-by-sa-4.0", "https://creativecommons.org/licenses/by-sa/4.0/"),
        ("cc-by-nc-4.0", "https://creativecommons.org/licenses/by-nc/4.0/"),
        ("cc0-1.0", "https://creativecommons.org/publicdomain/zero/1.0/"),
        ("llama2", "https://ai.meta.com/llama/license/"),
        ("llama3", "https://www.llama.com/llama3/license/"),
        ("llama3.1", "https://www.llama.com/llama3_1/license/"),
        ("llama3.2", "https://www.llama.com/llama3_2/license/"),
        ("llama3.3", "https://www.llama.com/llama3_3/license/"),
        ("gemma", "https://ai.google.dev/gemma/terms"),
        ("openrail", "https://www.licenses.ai/ai-licenses"),
        (
            "bigscience-openrail-m",
            "https://bigscience.huggingface.co/blog/bigscience-openrail-m",
        ),
    ];

    let wanted = license_id.trim().to_lowercase();
    table
        .iter()
        .find(|(id, _)| *id == wanted)
        .map(|(_, url)| *url)
}

/// Model family keywords with their display capitalization.
const FAMILY_KEYWORDS: &[(&str, &str)] = &[
    ("llama", "Llama"),
    ("codellama", "CodeLlama"),
    ("granite", "Granite"),
    ("mistral", "Mistral"),
    ("mixtral", "Mixtral"),
    ("qwen", "Qwen"),
    ("gemma", "Gemma"),
    ("phi", "Phi"),
    ("falcon", "Falcon"),
    ("starcoder", "StarCoder"),
    ("deepseek", "DeepSeek"),
    ("whisper", "Whisper"),
    ("stable", "Stable"),
    ("meta", "Meta"),
    ("instruct", "Instruct"),
    ("chat", "Chat"),
    ("base", "Base"),
    ("code", "Code"),
];

/// Synthesize a human-readable description from a resolved model name.
///
/// Known family keywords get their display capitalization, version-like
/// tokens pass through untouched, and the closing phrase adapts to
/// instruct/chat/base variants.
pub fn generate_description(name: &str) -> String {
    let pretty = prettify_name(name);
    let lowered = name.to_lowercase();

    let kind = if lowered.contains("instruct") {
        "an instruction-tuned large language model"
    } else if lowered.contains("chat") {
        "a conversational large language model"
    } else if lowered.contains("base") {
        "a base large language model"
    } else {
        "a large language model"
    };

    format!("{} is {}.", pretty, kind)
}

fn prettify_name(name: &str) -> String {
    let tokens: Vec<String> = name
        .split(|c: char| matches!(c, '-' | '_' | ' '))
        .filter(|t| !t.is_empty())
        .map(|token| {
            let lowered = token.to_lowercase();
            if let Some((_, display)) = FAMILY_KEYWORDS.iter().find(|(k, _)| *k == lowered) {
                (*display).to_string()
            } else if token.chars().any(|c| c.is_ascii_digit()) {
                // Version numbers and size markers pass through as written.
                token.to_string()
            } else {
                token.to_string()
            }
        })
        .collect();

    if tokens.is_empty() {
        name.to_string()
    } else {
        tokens.join(" ")
    }
}

/// Derive a logo reference from the resolved name and provider.
pub fn derive_logo(name: Option<&str>, provider: Option<&str>) -> Option<String> {
    let haystack = format!(
        "{} {}",
        name.unwrap_or_default(),
        provider.unwrap_or_default()
    )
    .to_lowercase();
    if haystack.trim().is_empty() {
        return None;
    }

    let families = [
        "granite", "llama", "mistral", "mixtral", "qwen", "gemma", "phi", "falcon",
        "starcoder", "deepseek", "whisper",
    ];
    for family in families {
        if haystack.contains(family) {
            return Some(format!("logos/{}.svg", family));
        }
    }
    Some("logos/default.svg".to_string())
}
