//! Seam for the third-party rich-text editor used by rich-content widgets.
//!
//! The editor is opaque: it is mounted against a container with the current
//! body of the form's textarea and the host's toolbar definition, asked for
//! its current markup on submit, and destroyed when the widget collapses or
//! goes away.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Widget type whose settings form gets a rich-text editor.
pub const RICH_CONTENT_TYPE: &str = "richcontent";

static TEXTAREA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<textarea\b([^>]*)>(.*?)</textarea\s*>").expect("valid textarea regex")
});

static NAME_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\bname\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid name attribute regex")
});

pub trait RichTextEditor: Send + Sync {
    fn mount(&self, container: &str, initial_html: &str, toolbar: &Value) -> Box<dyn RichTextInstance>;
}

pub trait RichTextInstance: Send {
    fn html(&self) -> String;
    fn destroy(self: Box<Self>);
}

/// The textarea the editor takes over: its field name and current body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorField {
    pub name: Option<String>,
    pub initial_html: String,
}

/// Finds the first textarea in a settings form. Forms without one get no
/// editor.
pub fn find_editor_field(markup: &str) -> Option<EditorField> {
    let captures = TEXTAREA_RE.captures(markup)?;
    let attributes = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    let name = NAME_ATTR_RE
        .captures(attributes)
        .and_then(|attr| attr.get(1).or_else(|| attr.get(2)))
        .map(|m| decode_entities(m.as_str()))
        .filter(|name| !name.is_empty());
    let body = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
    Some(EditorField {
        name,
        initial_html: decode_entities(body),
    })
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Selector of the element a widget's editor is mounted in.
pub fn container_selector(widget_type: &str, widget_id: &str) -> String {
    format!(".widget-{}[data-id=\"{}\"]", widget_type, widget_id)
}

/// Replaces (or appends) `field_name` in submitted form fields with the
/// editor's current markup.
pub fn apply_editor_html(fields: &mut Vec<(String, String)>, field_name: &str, html: String) {
    match fields.iter_mut().find(|(name, _)| name == field_name) {
        Some((_, value)) => *value = html,
        None => fields.push((field_name.to_string(), html)),
    }
}
