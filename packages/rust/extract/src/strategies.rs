//! Individual extraction strategies.
//!
//! Each strategy is a pure function `&str -> Option<&str>` returning a
//! borrowed span of the input. [`crate::extract`] applies them in order.

use std::sync::LazyLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// Strategy 1: fenced block tagged as JSON
// ---------------------------------------------------------------------------

/// Contents of the first ```` ```json ```` fenced block.
pub fn json_fence(text: &str) -> Option<&str> {
    static JSON_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?is)```[ \t]*json\b[^\n]*?\r?\n?(.*?)```").expect("valid regex")
    });

    fence_body(&JSON_FENCE_RE, text)
}

// ---------------------------------------------------------------------------
// Strategy 2: any fenced block
// ---------------------------------------------------------------------------

/// Contents of the first fenced block, whatever its language tag.
pub fn any_fence(text: &str) -> Option<&str> {
    static ANY_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+.-]*[ \t]*\r?\n?(.*?)```").expect("valid regex")
    });

    fence_body(&ANY_FENCE_RE, text)
}

fn fence_body<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    let body = re.captures(text)?.get(1)?.as_str().trim();
    // An empty fence carries nothing worth parsing; let later strategies look.
    (!body.is_empty()).then_some(body)
}

// ---------------------------------------------------------------------------
// Strategy 3: first balanced top-level span
// ---------------------------------------------------------------------------

/// The first balanced `{...}` or `[...]` span, string-literal aware.
pub fn brace_scan(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Strategy 4: verbatim
// ---------------------------------------------------------------------------

/// The whole reply, trimmed.
pub fn verbatim(text: &str) -> &str {
    text.trim()
}

// ---------------------------------------------------------------------------
// Recovery: widest span
// ---------------------------------------------------------------------------

/// From the first `{` or `[` to the last matching closer in the text.
///
/// Deliberately unbalanced: this is the permissive second chance used when
/// the strategy chain produced something unparseable.
pub fn wide_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}
