//! Extract Actions from model output.
//!
//! Actions arrive inline as
//! `<action type="values" target="A1:B2">[["x",1]]</action>`; everything
//! outside the tags is the explanation shown to the user.

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::action::Action;

static OPEN_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<action((?:\s+[A-Za-z_][\w-]*\s*=\s*(?:"[^"]*"|'[^']*'))*)\s*(/?)>"#).expect("open tag pattern")
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("attribute pattern")
});

static CLOSE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</action\s*>").expect("close tag pattern"));

static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n(\s*\n)+").expect("blank line pattern"));

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    /// Text outside the action tags, trimmed.
    pub explanation: String,
    pub actions: Vec<Action>,
    /// Tags dropped for lacking a `type`.
    pub skipped: usize,
}

/// Split model output into explanation text and Actions, in order.
pub fn parse_response(text: &str) -> ParsedResponse {
    let mut out = ParsedResponse::default();
    let mut explanation = String::new();
    let mut cursor = 0;

    while let Some(open) = OPEN_TAG.captures_at(text, cursor) {
        let Some(whole) = open.get(0) else { break };
        explanation.push_str(&text[cursor..whole.start()]);

        let attrs = open.get(1).map_or("", |m| m.as_str());
        let self_closing = open.get(2).is_some_and(|m| !m.as_str().is_empty());

        let (body, next) = if self_closing {
            (None, whole.end())
        } else {
            match CLOSE_TAG.find_at(text, whole.end()) {
                Some(close) => (Some(&text[whole.end()..close.start()]), close.end()),
                None => {
                    warn!("unterminated <action> tag at byte {}; reading to the end", whole.start());
                    (Some(&text[whole.end()..]), text.len())
                }
            }
        };

        match build_action(attrs, body) {
            Some(action) => out.actions.push(action),
            None => {
                warn!("skipping <action> tag without a type at byte {}", whole.start());
                out.skipped += 1;
            }
        }
        cursor = next;
    }
    explanation.push_str(&text[cursor..]);

    out.explanation = BLANK_RUNS.replace_all(explanation.trim(), "\n\n").into_owned();
    out
}

fn build_action(attrs: &str, body: Option<&str>) -> Option<Action> {
    let mut action_type = None;
    let mut action = Action::new("", "", "");
    let mut data_attr = None;

    for cap in ATTRIBUTE.captures_iter(attrs) {
        let name = cap.get(1).map_or("", |m| m.as_str());
        let value = cap.get(2).or_else(|| cap.get(3)).map_or("", |m| m.as_str());
        let value = unescape(value);
        match name.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "type" => action_type = Some(value),
            "target" | "range" => action.target = value,
            "source" => action.source = Some(value),
            "charttype" => action.chart_type = Some(value),
            "title" => action.title = Some(value),
            "position" => action.position = Some(value),
            "data" => data_attr = Some(value),
            _ => {}
        }
    }

    action.action_type = action_type.filter(|t| !t.trim().is_empty())?;
    action.data = match body.map(str::trim).filter(|b| !b.is_empty()) {
        Some(body) => unescape(body),
        None => data_attr.unwrap_or_default(),
    };
    Some(action)
}

/// Undo the five XML entities. `&amp;` goes last so `&amp;lt;` stays `&lt;`.
pub fn unescape(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
