/// Legacy text cleanup for server-sent strings.
///
/// Status text may carry `§x` color/format escapes and raw newlines, neither
/// of which is valid inside the embedded status JSON. Both are normalized
/// before any parse is attempted.
const LEGACY_FORMAT_CODES: &str = "0123456789abcdefklmnor";

pub fn strip_legacy_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '§' {
            if let Some(&next) = chars.peek() {
                if LEGACY_FORMAT_CODES.contains(next.to_ascii_lowercase()) {
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

pub fn escape_raw_newlines(text: &str) -> String {
    text.replace('\n', "\\n")
}

/// Pulls the human-readable MOTD out of a status response JSON document.
/// `description` is either a chat object with a `text` field or a bare
/// string, depending on server version.
pub fn motd_from_status_json(json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    let description = value.get("description")?;
    if let Some(text) = description.get("text").and_then(|t| t.as_str()) {
        return Some(text.to_owned());
    }
    description.as_str().map(str::to_owned)
}
