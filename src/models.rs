use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted wire shape of a layout: rows of widget ids, positional.
/// An empty string marks an empty column.
pub type PersistedLayout = Vec<Vec<String>>;

/// Identifies the page whose front page is being edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_type: String,
    pub object_id: u64,
}

impl ObjectRef {
    pub fn new(object_type: impl Into<String>, object_id: u64) -> Self {
        Self {
            object_type: object_type.into(),
            object_id,
        }
    }

    pub fn query_pairs(&self) -> [(&'static str, String); 2] {
        [
            ("object_type", self.object_type.clone()),
            ("object_id", self.object_id.to_string()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ViewState {
    #[default]
    Collapsed,
    Expanded,
}

impl ViewState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collapsed => "collapsed",
            Self::Expanded => "expanded",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Self::Collapsed => Self::Expanded,
            Self::Expanded => Self::Collapsed,
        }
    }
}

/// Static registry entry the host ships with the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetDescriptor {
    #[serde(rename = "type")]
    pub widget_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

/// Per-instance details returned by the `widget-details` resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct WidgetDetails {
    #[serde(rename = "type", default)]
    pub widget_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetFormRequest {
    pub widget_type: String,
    pub widget_id: String,
    pub is_new: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WidgetForm {
    #[serde(default)]
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsSaveResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Generic `{ "data": ... }` envelope the host wraps GET responses in.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayoutUpdatePayload<'a> {
    pub object_type: &'a str,
    pub object_id: u64,
    pub layout: &'a PersistedLayout,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdatePayload<'a> {
    pub object_type: &'a str,
    pub object_id: u64,
    pub updated_status: &'static str,
}

impl<'a> StatusUpdatePayload<'a> {
    pub fn new(object: &'a ObjectRef, enabled: bool) -> Self {
        Self {
            object_type: &object.object_type,
            object_id: object.object_id,
            updated_status: if enabled { "yes" } else { "no" },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub ttl_ms: u64,
}
