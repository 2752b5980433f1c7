//! Better error messages with actionable suggestions.

use metaprop_core::{CategoryRegistry, MetaPropError, MetaType};
use std::path::Path;

/// Describe a per-record failure, with a hint when one is available.
pub fn describe_failure(error: &MetaPropError, registry: &CategoryRegistry) -> String {
    let mut msg = error.to_string();

    match error {
        MetaPropError::UnsupportedMetaType(literal) => {
            if let Some(suggestion) = find_similar_meta_type(literal) {
                msg.push_str(&format!(" (did you mean '{}'?)", suggestion));
            } else {
                let known: Vec<_> = MetaType::ALL.iter().map(|t| t.as_str()).collect();
                msg.push_str(&format!(" (expected one of: {})", known.join(", ")));
            }
        }
        MetaPropError::UnknownCategoryId(id) => {
            if let Some(suggestion) = find_similar_category(id, registry) {
                msg.push_str(&format!(" (did you mean '{}'?)", suggestion));
            } else {
                msg.push_str(". Add it under [categories] in the config or pass --categories");
            }
        }
        MetaPropError::MalformedRecord { content, .. } if !content.is_empty() => {
            msg.push_str(&format!(": [{}]", content.join(", ")));
        }
        MetaPropError::UnsupportedForDirectWrite(_) => {
            msg.push_str(". Use --allow-file-links to write them as text");
        }
        _ => {}
    }

    msg
}

/// Build an error message for when input format detection fails.
pub fn format_detection_error(path: &str) -> String {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    let mut msg = String::from("Could not detect input format");
    match ext {
        Some(ext) => msg.push_str(&format!(". Unknown extension '.{}'", ext)),
        None => msg.push_str(". No file extension found"),
    }
    msg.push_str(".\n\nUse --format <csv|json|jsonl> to specify.");
    msg
}

/// Build an error message for file read errors.
pub fn file_read_error(path: &Path, err: &std::io::Error) -> String {
    use std::io::ErrorKind;

    let mut msg = format!("Failed to read '{}'", path.display());

    match err.kind() {
        ErrorKind::NotFound => {
            msg.push_str(": file not found");
            let suggestions = find_similar_files(path);
            if !suggestions.is_empty() {
                msg.push_str(&format!(".\n\nDid you mean: {}?", suggestions.join(", ")));
            }
        }
        ErrorKind::PermissionDenied => {
            msg.push_str(": permission denied. Check file permissions.");
        }
        _ => {
            msg.push_str(&format!(": {}", err));
        }
    }

    msg
}

/// Find the meta type literal a typo most likely meant.
fn find_similar_meta_type(input: &str) -> Option<&'static str> {
    let aliases: &[(&str, &str)] = &[
        ("integer", "Int"),
        ("string", "Text"),
        ("float", "Double"),
        ("number", "Double"),
        ("url", "Link"),
        ("delete", "DeleteOverride"),
    ];

    let lower = input.to_lowercase();
    for (alias, canonical) in aliases {
        if lower == *alias {
            return Some(canonical);
        }
    }

    MetaType::ALL
        .iter()
        .map(|t| t.as_str())
        .find(|literal| literal.to_lowercase() == lower || levenshtein(input, literal) <= 2)
}

/// Find a registered category name close to an unknown id.
fn find_similar_category(input: &str, registry: &CategoryRegistry) -> Option<String> {
    let upper = input.to_uppercase();
    registry
        .groups()
        .map(|(name, _)| name)
        .find(|name| *name == upper || levenshtein(&upper, name) <= 2)
        .map(str::to_string)
}

/// Simple Levenshtein distance for short strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Find similar files in the same directory (for "did you mean" suggestions).
fn find_similar_files(path: &Path) -> Vec<String> {
    let Some(filename) = path.file_name().and_then(|f| f.to_str()) else {
        return Vec::new();
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let Ok(entries) = std::fs::read_dir(parent) else {
        return Vec::new();
    };

    let mut suggestions: Vec<String> = entries
        .flatten()
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| name != filename && levenshtein(filename, name) <= 2)
        .collect();
    suggestions.sort();
    suggestions.truncate(3);
    suggestions
}
