use std::path::Path;

/// Parse "true"/"false"/"1"/"0" (and yes/no/on/off) from a &str.
pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Keeps at most `max_chars` characters, marking a cut with `…`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}\u{2026}")
    } else {
        head
    }
}

/// Returns true for `scheme://...` references such as http(s) URLs.
pub fn is_url(reference: &str) -> bool {
    match reference.split_once("://") {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && !rest.is_empty()
                && scheme
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Lower-cased extension of a path or URL, ignoring any query or fragment.
pub fn extension_of(reference: &str) -> Option<String> {
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);
    Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Fence language for a file, used when inlining it as a snippet.
pub fn filetype_for_path(path: &str) -> String {
    let Some(ext) = extension_of(path) else {
        return "text".to_string();
    };
    let filetype = match ext.as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" => "typescript",
        "tsx" => "tsx",
        "rb" => "ruby",
        "sh" | "bash" | "zsh" => "sh",
        "md" | "markdown" => "markdown",
        "yml" | "yaml" => "yaml",
        "h" => "c",
        "hpp" | "cc" | "cxx" => "cpp",
        "kt" => "kotlin",
        "txt" => "text",
        other => other,
    };
    filetype.to_string()
}
