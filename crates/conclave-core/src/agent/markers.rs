//! Reply marker parsing for round-table agents.
//!
//! Agents signal out-of-band intent with literal markers in their reply
//! text:
//!
//! - `[[SILENT]]` -- no visible reply; nothing is broadcast.
//! - `[[RAISE_HAND]]` -- an unsolicited, proactive contribution.
//! - `<tool_request name="weather" />` -- ask for an external capability.
//!
//! [`classify_reply`] turns raw text into a [`ReplyKind`].

/// Silence marker.
pub const SILENT_MARKER: &str = "[[SILENT]]";

/// Raise-hand marker.
pub const RAISE_HAND_MARKER: &str = "[[RAISE_HAND]]";

const TOOL_REQUEST_OPEN: &str = "<tool_request";

/// Classified reply text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyKind {
    /// The agent produced no visible reply.
    Silent,
    /// A visible reply with markers removed.
    Visible { text: String, raised_hand: bool },
}

impl ReplyKind {
    pub fn is_silent(&self) -> bool {
        matches!(self, ReplyKind::Silent)
    }
}

/// Classify a reply as silent or visible.
///
/// A reply is silent when it is blank, starts with the silence marker, or
/// has nothing left once every marker is removed. Visible text has all
/// markers stripped and is trimmed.
pub fn classify_reply(text: &str) -> ReplyKind {
    let without_tools = strip_tool_requests(text);
    let trimmed = without_tools.trim();
    if trimmed.is_empty() || trimmed.starts_with(SILENT_MARKER) {
        return ReplyKind::Silent;
    }

    let raised_hand = trimmed.contains(RAISE_HAND_MARKER);
    let visible = trimmed
        .replace(RAISE_HAND_MARKER, "")
        .replace(SILENT_MARKER, "");
    let visible = visible.trim();
    if visible.is_empty() {
        return ReplyKind::Silent;
    }

    ReplyKind::Visible {
        text: visible.to_string(),
        raised_hand,
    }
}

/// Extract the capability names requested by `<tool_request name="..." />`
/// markers, deduplicated case-insensitively in first-seen order.
pub fn parse_tool_requests(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (start, end) in tool_request_spans(text) {
        let tag = &text[start..end];
        if let Some(name) = attribute_value(tag, "name") {
            let name = name.trim();
            if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Remove every tool-request marker from `text`.
pub fn strip_tool_requests(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in tool_request_spans(text) {
        out.push_str(&text[cursor..start]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Byte spans of each `<tool_request ...>` tag, including a matching
/// `</tool_request>` closing tag when the marker is not self-closing.
fn tool_request_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut search_from = 0;
    while let Some(pos) = text[search_from..].find(TOOL_REQUEST_OPEN) {
        let start = search_from + pos;
        let Some(close) = find_tag_end(&text[start..]) else {
            break;
        };
        let mut end = start + close + 1;
        let self_closing = text[..end].ends_with("/>");
        if !self_closing {
            let closing_tag = "</tool_request>";
            if let Some(closing) = text[end..].find(closing_tag) {
                end += closing + closing_tag.len();
            }
        }
        spans.push((start, end));
        search_from = end;
    }
    spans
}

/// Position of the `>` ending a tag, skipping quoted attribute values.
fn find_tag_end(tag: &str) -> Option<usize> {
    let mut in_quote = false;
    let mut chars = tag.char_indices();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '\\' if in_quote => {
                let _ = chars.next();
            }
            '"' => in_quote = !in_quote,
            '>' if !in_quote => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Read `attr="value"` from a tag.
fn attribute_value<'a>(tag: &'a str, attr: &str) -> Option<&'a str> {
    let prefix = format!(r#"{attr}=""#);
    let pos = tag.find(&prefix)? + prefix.len();
    let end = find_closing_quote(&tag[pos..])?;
    Some(&tag[pos..pos + end])
}

/// Find the position of the next unescaped double quote in a string.
fn find_closing_quote(s: &str) -> Option<usize> {
    let mut chars = s.char_indices();
    while let Some((idx, ch)) = chars.next() {
        if ch == '\\' {
            let _ = chars.next();
            continue;
        }
        if ch == '"' {
            return Some(idx);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_reply_is_silent() {
        assert_eq!(classify_reply(""), ReplyKind::Silent);
        assert_eq!(classify_reply("   \n"), ReplyKind::Silent);
    }

    #[test]
    fn leading_silence_marker_is_silent() {
        assert!(classify_reply("[[SILENT]]").is_silent());
        assert!(classify_reply("  [[SILENT]] nothing to add").is_silent());
    }

    #[test]
    fn markers_only_reply_is_silent() {
        assert!(classify_reply("[[RAISE_HAND]]").is_silent());
        assert!(classify_reply(r#"<tool_request name="search" />"#).is_silent());
    }

    #[test]
    fn raise_hand_is_stripped_into_flag() {
        let kind = classify_reply("[[RAISE_HAND]] One more thought: test it first.");
        assert_eq!(
            kind,
            ReplyKind::Visible {
                text: "One more thought: test it first.".to_string(),
                raised_hand: true,
            }
        );
    }

    #[test]
    fn plain_reply_is_visible_and_trimmed() {
        let kind = classify_reply("  Hello @Grace!  ");
        assert_eq!(
            kind,
            ReplyKind::Visible {
                text: "Hello @Grace!".to_string(),
                raised_hand: false,
            }
        );
    }

    #[test]
    fn parses_tool_requests_in_order_without_duplicates() {
        let text = r#"Let me check. <tool_request name="Weather" /> and <tool_request name="search"/>
<tool_request name="weather" />"#;
        assert_eq!(parse_tool_requests(text), vec!["Weather", "search"]);
    }

    #[test]
    fn parses_tool_request_with_closing_tag() {
        let text = r#"<tool_request name="calendar">need dates</tool_request> ok"#;
        assert_eq!(parse_tool_requests(text), vec!["calendar"]);
        assert_eq!(strip_tool_requests(text), " ok");
    }

    #[test]
    fn tool_request_markers_are_stripped_from_visible_text() {
        let text = r#"Checking the forecast. <tool_request name="weather" />"#;
        assert_eq!(
            classify_reply(text),
            ReplyKind::Visible {
                text: "Checking the forecast.".to_string(),
                raised_hand: false,
            }
        );
    }

    #[test]
    fn no_tool_request_yields_empty_list() {
        assert!(parse_tool_requests("Just a regular reply.").is_empty());
        assert_eq!(strip_tool_requests("Just a regular reply."), "Just a regular reply.");
    }

    #[test]
    fn unterminated_marker_is_ignored() {
        let text = r#"oops <tool_request name="weather"#;
        assert!(parse_tool_requests(text).is_empty());
        assert_eq!(strip_tool_requests(text), text);
    }

    #[test]
    fn escaped_quote_in_name_is_preserved() {
        let text = r#"<tool_request name="say \"hi\"" />"#;
        assert_eq!(parse_tool_requests(text), vec![r#"say \"hi\""#]);
    }
}
