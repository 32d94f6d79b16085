//! Session configuration handed to the editor by the host page.
//!
//! The host serializes one JSON object (REST base, anti-forgery nonce, the
//! page being edited, the widget registry and localized strings). It is
//! parsed once and treated as read-only for the rest of the session.

use crate::errors::{AppError, AppResult};
use crate::models::{ObjectRef, WidgetDescriptor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_RICH_CONTENT_FIELD: &str = "content";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub rest_url_base: String,
    pub rest_nonce: String,
    /// Origin used to resolve a site-relative `rest_url_base`.
    #[serde(default)]
    pub site_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiStrings {
    pub add_section: String,
    pub drag_move: String,
    pub confirm_delete_section: String,
    pub confirm_delete_widget: String,
    pub invalid: String,
    pub choose_widget: String,
    pub update: String,
    pub close: String,
    pub layout_load_failed: String,
    pub layout_save_failed: String,
    pub status_load_failed: String,
    pub status_update_failed: String,
    pub widget_details_failed: String,
    pub widget_form_failed: String,
    pub widget_update_failed: String,
}

impl Default for UiStrings {
    fn default() -> Self {
        Self {
            add_section: "Add section".to_string(),
            drag_move: "Drag to move".to_string(),
            confirm_delete_section: "Are you sure you want to delete this section?".to_string(),
            confirm_delete_widget: "Are you sure you want to delete this widget?".to_string(),
            invalid: "Invalid widget".to_string(),
            choose_widget: "Choose a widget".to_string(),
            update: "Update".to_string(),
            close: "Close".to_string(),
            layout_load_failed: "Failed to load rows. Please refresh the page.".to_string(),
            layout_save_failed: "Failed to save layout. Please try again.".to_string(),
            status_load_failed: "Failed to load status. Please refresh the page.".to_string(),
            status_update_failed: "Failed to update status. Please try again.".to_string(),
            widget_details_failed: "Error fetching details. Please try again.".to_string(),
            widget_form_failed: "Error fetching form. Please try again.".to_string(),
            widget_update_failed: "Error updating widget. Please try again.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RichContentConfig {
    /// Toolbar definition, handed untouched to the editor on mount.
    #[serde(default)]
    pub editor_btns: serde_json::Value,
    /// Field the editor's markup is submitted under when the form's
    /// textarea has no name.
    #[serde(default = "default_rich_content_field")]
    pub field_name: String,
}

impl Default for RichContentConfig {
    fn default() -> Self {
        Self {
            editor_btns: serde_json::Value::Null,
            field_name: default_rich_content_field(),
        }
    }
}

fn default_rich_content_field() -> String {
    DEFAULT_RICH_CONTENT_FIELD.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    pub config: HostConfig,
    pub object_type: String,
    #[serde(deserialize_with = "deserialize_object_id")]
    pub object_id: u64,
    #[serde(default)]
    pub show_enable_disable_ui: bool,
    #[serde(default)]
    pub all_widgets: Vec<WidgetDescriptor>,
    #[serde(default)]
    pub lang: UiStrings,
    #[serde(default)]
    pub rich_content: RichContentConfig,
}

impl EditorConfig {
    pub fn from_json_str(raw: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|error| AppError::Config(format!("unreadable editor config: {}", error)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn object(&self) -> ObjectRef {
        ObjectRef::new(self.object_type.clone(), self.object_id)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.config.rest_url_base.trim().is_empty() {
            return Err(AppError::Config("rest_url_base cannot be empty".to_string()));
        }
        if self.config.rest_nonce.trim().is_empty() {
            return Err(AppError::Config("rest_nonce cannot be empty".to_string()));
        }
        if self.object_type.trim().is_empty() {
            return Err(AppError::Config("object_type cannot be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for widget in &self.all_widgets {
            if widget.widget_type.trim().is_empty() {
                return Err(AppError::Config("registry entry with empty type".to_string()));
            }
            if !seen.insert(widget.widget_type.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate widget type in registry: {}",
                    widget.widget_type
                )));
            }
        }
        Ok(())
    }
}

fn deserialize_object_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| D::Error::custom("object_id must be a non-negative integer")),
        serde_json::Value::String(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|_| D::Error::custom(format!("object_id is not numeric: {}", text))),
        other => Err(D::Error::custom(format!("unsupported object_id: {}", other))),
    }
}
