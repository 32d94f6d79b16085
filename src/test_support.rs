use crate::config::{EditorConfig, HostConfig, RichContentConfig, UiStrings};
use crate::errors::{AppError, AppResult};
use crate::models::{
    ObjectRef, OptionsSaveResponse, PersistedLayout, WidgetDescriptor, WidgetDetails,
    WidgetFormRequest,
};
use crate::store::LayoutStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchStatus,
    UpdateStatus(bool),
    FetchLayout,
    SaveLayout(PersistedLayout),
    FetchDetails(String),
    FetchForm(WidgetFormRequest),
    SaveOptions(Vec<(String, String)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Status,
    UpdateStatus,
    Layout,
    SaveLayout,
    Details,
    Form,
    SaveOptions,
}

/// In-memory `LayoutStore` that records every request it receives.
pub struct RecordingStore {
    calls: StdMutex<Vec<Call>>,
    status: StdMutex<bool>,
    layout: StdMutex<PersistedLayout>,
    details: StdMutex<HashMap<String, WidgetDetails>>,
    options_response: StdMutex<OptionsSaveResponse>,
    forms: StdMutex<HashMap<String, String>>,
    failing: StdMutex<HashSet<Endpoint>>,
    form_gate: StdMutex<Option<Arc<Notify>>>,
    options_gate: StdMutex<Option<Arc<Notify>>>,
    status_gate: StdMutex<Option<Arc<Notify>>>,
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self {
            calls: StdMutex::new(Vec::new()),
            status: StdMutex::new(false),
            layout: StdMutex::new(Vec::new()),
            details: StdMutex::new(HashMap::new()),
            options_response: StdMutex::new(OptionsSaveResponse {
                success: true,
                message: "Widget updated.".to_string(),
            }),
            forms: StdMutex::new(HashMap::new()),
            failing: StdMutex::new(HashSet::new()),
            form_gate: StdMutex::new(None),
            options_gate: StdMutex::new(None),
            status_gate: StdMutex::new(None),
        }
    }
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_layout(&self, rows: &[&[&str]]) {
        let layout = rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();
        *lock(&self.layout) = layout;
    }

    pub fn set_status(&self, enabled: bool) {
        *lock(&self.status) = enabled;
    }

    pub fn set_details(&self, widget_id: &str, widget_type: &str, title: &str) {
        lock(&self.details).insert(
            widget_id.to_string(),
            WidgetDetails {
                widget_type: widget_type.to_string(),
                title: title.to_string(),
                ..WidgetDetails::default()
            },
        );
    }

    pub fn set_options_response(&self, success: bool, message: &str) {
        *lock(&self.options_response) = OptionsSaveResponse {
            success,
            message: message.to_string(),
        };
    }

    pub fn set_form_markup(&self, widget_id: &str, markup: &str) {
        lock(&self.forms).insert(widget_id.to_string(), markup.to_string());
    }

    pub fn fail(&self, endpoint: Endpoint) {
        lock(&self.failing).insert(endpoint);
    }

    /// Holds every form fetch open until the returned gate is notified.
    pub fn gate_forms(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.form_gate) = Some(gate.clone());
        gate
    }

    pub fn gate_options(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.options_gate) = Some(gate.clone());
        gate
    }

    /// Holds every status update open until the returned gate is notified.
    pub fn gate_status(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *lock(&self.status_gate) = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn saved_layouts(&self) -> Vec<PersistedLayout> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SaveLayout(layout) => Some(layout),
                _ => None,
            })
            .collect()
    }

    pub fn form_fetches(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::FetchForm(_)))
            .count()
    }

    pub fn option_saves(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::SaveOptions(_)))
            .count()
    }

    fn record(&self, call: Call, endpoint: Endpoint) -> AppResult<()> {
        lock(&self.calls).push(call);
        if lock(&self.failing).contains(&endpoint) {
            return Err(AppError::Host {
                status: 500,
                body: format!("{:?} unavailable", endpoint),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LayoutStore for RecordingStore {
    async fn fetch_status(&self, _object: &ObjectRef) -> AppResult<bool> {
        self.record(Call::FetchStatus, Endpoint::Status)?;
        Ok(*lock(&self.status))
    }

    async fn update_status(&self, _object: &ObjectRef, enabled: bool) -> AppResult<()> {
        let gate = lock(&self.status_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.record(Call::UpdateStatus(enabled), Endpoint::UpdateStatus)?;
        *lock(&self.status) = enabled;
        Ok(())
    }

    async fn fetch_layout(&self, _object: &ObjectRef) -> AppResult<PersistedLayout> {
        self.record(Call::FetchLayout, Endpoint::Layout)?;
        Ok(lock(&self.layout).clone())
    }

    async fn save_layout(&self, _object: &ObjectRef, layout: &PersistedLayout) -> AppResult<()> {
        self.record(Call::SaveLayout(layout.clone()), Endpoint::SaveLayout)?;
        *lock(&self.layout) = layout.clone();
        Ok(())
    }

    async fn fetch_widget_details(
        &self,
        _object: &ObjectRef,
        widget_id: &str,
    ) -> AppResult<Option<WidgetDetails>> {
        self.record(Call::FetchDetails(widget_id.to_string()), Endpoint::Details)?;
        Ok(lock(&self.details).get(widget_id).cloned())
    }

    async fn fetch_widget_form(
        &self,
        _object: &ObjectRef,
        request: &WidgetFormRequest,
    ) -> AppResult<String> {
        self.record(Call::FetchForm(request.clone()), Endpoint::Form)?;
        let gate = lock(&self.form_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let markup = lock(&self.forms).get(&request.widget_id).cloned();
        Ok(markup.unwrap_or_else(|| format!("<input name=\"title\" data-widget=\"{}\">", request.widget_id)))
    }

    async fn save_widget_options(&self, fields: &[(String, String)]) -> AppResult<OptionsSaveResponse> {
        self.record(Call::SaveOptions(fields.to_vec()), Endpoint::SaveOptions)?;
        let gate = lock(&self.options_gate).clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(lock(&self.options_response).clone())
    }
}

pub fn registry_entries() -> Vec<WidgetDescriptor> {
    vec![
        WidgetDescriptor {
            widget_type: "richcontent".to_string(),
            name: "Rich Content".to_string(),
            description: "Text, links and images".to_string(),
            icon: "<i class=\"gg-format-text\"></i>".to_string(),
        },
        WidgetDescriptor {
            widget_type: "youtube".to_string(),
            name: "YouTube".to_string(),
            description: "Embed a video".to_string(),
            icon: "<i class=\"gg-youtube\"></i>".to_string(),
        },
    ]
}

pub fn editor_config(show_toggle: bool) -> EditorConfig {
    EditorConfig {
        config: HostConfig {
            rest_url_base: "https://site.test/wp-json/frontpage-buddy/v1".to_string(),
            rest_nonce: "n0nce".to_string(),
            site_url: None,
        },
        object_type: "user".to_string(),
        object_id: 7,
        show_enable_disable_ui: show_toggle,
        all_widgets: registry_entries(),
        lang: UiStrings::default(),
        rich_content: RichContentConfig::default(),
    }
}

pub fn object() -> ObjectRef {
    ObjectRef::new("user", 7)
}

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
