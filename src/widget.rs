//! Per-instance widget lifecycle: detail loading, validity, expand/collapse
//! with lazily fetched settings forms, option submission and deletion.
//!
//! A controller never touches the layout directly. It reports what happened
//! through [`WidgetEvent`]s and the owning layout applies them.

use crate::config::{RichContentConfig, UiStrings};
use crate::errors::{AppError, AppResult};
use crate::events::{Confirm, Notifier, WidgetEvent, WidgetEventSender};
use crate::form_cache::FormCache;
use crate::layout::ColumnSlot;
use crate::models::{ObjectRef, ViewState, WidgetDetails, WidgetFormRequest};
use crate::registry::WidgetRegistry;
use crate::rich_text::{
    apply_editor_html, container_selector, find_editor_field, RichTextEditor, RichTextInstance, RICH_CONTENT_TYPE,
};
use crate::store::LayoutStore;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetPhase {
    Loading,
    Ready,
    /// Type does not resolve in the registry, or the host has no such widget.
    Invalid,
    /// Details could not be fetched; terminal for this view.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Loading,
    Loaded(String),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormOutcome {
    Cached,
    Fetched,
    /// A fetch for this widget is already in flight.
    Pending,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Saved,
    Rejected(String),
    Failed,
    Ignored,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSnapshot {
    pub slot_id: String,
    pub widget_id: String,
    pub details: WidgetDetails,
    pub is_new: bool,
    pub phase: WidgetPhase,
    pub view: ViewState,
    pub form_html: Option<String>,
    pub form_loading: bool,
    pub processing: bool,
}

/// Collaborators shared by every widget on the page.
#[derive(Clone)]
pub struct WidgetDeps {
    pub object: ObjectRef,
    pub store: Arc<dyn LayoutStore>,
    pub registry: Arc<WidgetRegistry>,
    pub forms: FormCache,
    pub strings: Arc<UiStrings>,
    pub rich_content: RichContentConfig,
    pub events: WidgetEventSender,
    pub notifier: Notifier,
    pub rich_text: Option<Arc<dyn RichTextEditor>>,
}

struct WidgetState {
    details: WidgetDetails,
    is_new: bool,
    phase: WidgetPhase,
    view: ViewState,
    form: FormState,
    form_fetch: Option<CancellationToken>,
    editor: Option<MountedEditor>,
}

/// Editor instance plus the form field its markup is submitted under.
struct MountedEditor {
    field: String,
    instance: Box<dyn RichTextInstance>,
}

struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct WidgetController {
    slot_id: String,
    widget_id: String,
    deps: WidgetDeps,
    state: StdMutex<WidgetState>,
    processing: AtomicBool,
}

impl WidgetController {
    pub fn new(slot: &ColumnSlot, deps: WidgetDeps) -> AppResult<Self> {
        if slot.is_empty() {
            return Err(AppError::InvalidState(format!("slot {} holds no widget", slot.slot_id)));
        }

        let (details, phase) = if slot.widget_type.is_empty() {
            let phase = if slot.is_new {
                WidgetPhase::Invalid
            } else {
                WidgetPhase::Loading
            };
            (WidgetDetails::default(), phase)
        } else {
            match deps.registry.details_for(&slot.widget_type) {
                Some(details) if slot.is_new => (details, WidgetPhase::Ready),
                Some(details) => (details, WidgetPhase::Loading),
                None => (
                    WidgetDetails {
                        widget_type: slot.widget_type.clone(),
                        ..WidgetDetails::default()
                    },
                    WidgetPhase::Invalid,
                ),
            }
        };

        Ok(Self {
            slot_id: slot.slot_id.clone(),
            widget_id: slot.widget_id.clone(),
            deps,
            state: StdMutex::new(WidgetState {
                details,
                is_new: slot.is_new,
                phase,
                view: ViewState::Collapsed,
                form: FormState::Idle,
                form_fetch: None,
                editor: None,
            }),
            processing: AtomicBool::new(false),
        })
    }

    pub fn slot_id(&self) -> &str {
        &self.slot_id
    }

    pub fn widget_id(&self) -> &str {
        &self.widget_id
    }

    pub fn is_new(&self) -> bool {
        self.lock().is_new
    }

    pub fn phase(&self) -> WidgetPhase {
        self.lock().phase.clone()
    }

    pub fn view_state(&self) -> ViewState {
        self.lock().view
    }

    pub fn details(&self) -> WidgetDetails {
        self.lock().details.clone()
    }

    pub fn form_state(&self) -> FormState {
        self.lock().form.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        let state = self.lock();
        WidgetSnapshot {
            slot_id: self.slot_id.clone(),
            widget_id: self.widget_id.clone(),
            details: state.details.clone(),
            is_new: state.is_new,
            phase: state.phase.clone(),
            view: state.view,
            form_html: match &state.form {
                FormState::Loaded(markup) => Some(markup.clone()),
                _ => None,
            },
            form_loading: state.form == FormState::Loading,
            processing: self.is_processing(),
        }
    }

    /// Resolves details for persisted widgets. New widgets were described
    /// from the registry at construction and skip the round trip.
    pub async fn mount(&self) -> AppResult<()> {
        if self.lock().phase != WidgetPhase::Loading {
            return Ok(());
        }

        let result = self
            .deps
            .store
            .fetch_widget_details(&self.deps.object, &self.widget_id)
            .await;

        let mut state = self.lock();
        match result {
            Ok(None) => {
                tracing::info!(widget_id = %self.widget_id, "host has no details for widget");
                state.phase = WidgetPhase::Invalid;
                Ok(())
            }
            Ok(Some(fetched)) => {
                let merged = self.deps.registry.merge_details(&state.details, fetched);
                state.phase = if self.deps.registry.contains(&merged.widget_type) {
                    WidgetPhase::Ready
                } else {
                    tracing::info!(
                        widget_id = %self.widget_id,
                        widget_type = %merged.widget_type,
                        "widget type not in registry"
                    );
                    WidgetPhase::Invalid
                };
                state.details = merged;
                Ok(())
            }
            Err(error) => {
                tracing::warn!(error = %error, widget_id = %self.widget_id, "widget details fetch failed");
                state.phase = WidgetPhase::Failed(self.deps.strings.widget_details_failed.clone());
                self.deps.notifier.error(self.deps.strings.widget_details_failed.clone());
                Err(error)
            }
        }
    }

    /// Expands the widget and makes its settings form available, from the
    /// cache when possible. A collapse or teardown while the fetch is in
    /// flight cancels it.
    pub async fn expand(&self) -> AppResult<FormOutcome> {
        let (request, token) = {
            let mut state = self.lock();
            if state.phase != WidgetPhase::Ready {
                return Err(AppError::InvalidState(format!(
                    "widget {} cannot be expanded in phase {:?}",
                    self.widget_id, state.phase
                )));
            }
            self.set_view(&mut state, ViewState::Expanded);

            match state.form {
                FormState::Loaded(_) => {
                    self.mount_editor(&mut state);
                    return Ok(FormOutcome::Cached);
                }
                FormState::Loading => return Ok(FormOutcome::Pending),
                FormState::Idle | FormState::Failed => {}
            }

            if let Some(markup) = self.deps.forms.get(&self.widget_id) {
                state.form = FormState::Loaded(markup);
                self.mount_editor(&mut state);
                return Ok(FormOutcome::Cached);
            }

            let token = CancellationToken::new();
            if let Some(previous) = state.form_fetch.replace(token.clone()) {
                previous.cancel();
            }
            state.form = FormState::Loading;
            let request = WidgetFormRequest {
                widget_type: state.details.widget_type.clone(),
                widget_id: self.widget_id.clone(),
                is_new: state.is_new,
            };
            (request, token)
        };

        let result = tokio::select! {
            _ = token.cancelled() => None,
            result = self.deps.store.fetch_widget_form(&self.deps.object, &request) => Some(result),
        };

        let Some(result) = result else {
            tracing::debug!(widget_id = %self.widget_id, "settings form fetch cancelled");
            return Ok(FormOutcome::Cancelled);
        };
        if token.is_cancelled() {
            return Ok(FormOutcome::Cancelled);
        }

        let mut state = self.lock();
        state.form_fetch = None;
        match result {
            Ok(markup) => {
                self.deps.forms.insert(&self.widget_id, markup.clone());
                state.form = FormState::Loaded(markup);
                self.mount_editor(&mut state);
                Ok(FormOutcome::Fetched)
            }
            Err(error) => {
                tracing::warn!(error = %error, widget_id = %self.widget_id, "settings form fetch failed");
                state.form = FormState::Failed;
                self.deps.notifier.error(self.deps.strings.widget_form_failed.clone());
                Err(error)
            }
        }
    }

    /// Collapses the widget. Fetched markup stays cached.
    pub fn collapse(&self) {
        let mut state = self.lock();
        Self::cancel_form_fetch(&mut state);
        if let Some(editor) = state.editor.take() {
            editor.instance.destroy();
        }
        self.set_view(&mut state, ViewState::Collapsed);
    }

    pub async fn toggle_view(&self) -> AppResult<ViewState> {
        let current = self.view_state();
        match current {
            ViewState::Expanded => {
                self.collapse();
                Ok(ViewState::Collapsed)
            }
            ViewState::Collapsed => {
                self.expand().await?;
                Ok(self.view_state())
            }
        }
    }

    /// Sends the serialized settings form to the host. A submit while
    /// another is in flight is dropped.
    pub async fn submit(&self, mut fields: Vec<(String, String)>) -> SubmitOutcome {
        if self.lock().phase != WidgetPhase::Ready {
            return SubmitOutcome::Ignored;
        }
        if self.processing.swap(true, Ordering::SeqCst) {
            tracing::debug!(widget_id = %self.widget_id, "submit ignored while another is in flight");
            return SubmitOutcome::Ignored;
        }
        let _guard = ProcessingGuard {
            flag: &self.processing,
        };

        if let Some(editor) = self.lock().editor.as_ref() {
            apply_editor_html(&mut fields, &editor.field, editor.instance.html());
        }

        match self.deps.store.save_widget_options(&fields).await {
            Ok(response) if response.success => {
                self.lock().is_new = false;
                let _ = self.deps.events.send(WidgetEvent::OptionsSaved {
                    slot_id: self.slot_id.clone(),
                    widget_id: self.widget_id.clone(),
                });
                self.deps.notifier.success(response.message);
                SubmitOutcome::Saved
            }
            Ok(response) => {
                let message = if response.message.trim().is_empty() {
                    self.deps.strings.widget_update_failed.clone()
                } else {
                    response.message
                };
                self.deps.notifier.error(message.clone());
                SubmitOutcome::Rejected(message)
            }
            Err(error) => {
                tracing::warn!(error = %error, widget_id = %self.widget_id, "widget options save failed");
                self.deps.notifier.error(self.deps.strings.widget_update_failed.clone());
                SubmitOutcome::Failed
            }
        }
    }

    /// Never-saved widgets are removed without asking.
    pub fn request_delete(&self, confirm: &dyn Confirm) -> bool {
        let is_new = self.is_new();
        if !is_new && !confirm.confirm(&self.deps.strings.confirm_delete_widget) {
            return false;
        }
        self.teardown();
        let _ = self.deps.events.send(WidgetEvent::DeleteConfirmed {
            slot_id: self.slot_id.clone(),
        });
        true
    }

    pub fn teardown(&self) {
        let mut state = self.lock();
        Self::cancel_form_fetch(&mut state);
        if let Some(editor) = state.editor.take() {
            editor.instance.destroy();
        }
    }

    fn set_view(&self, state: &mut WidgetState, view: ViewState) {
        if state.view == view {
            return;
        }
        state.view = view;
        let _ = self.deps.events.send(WidgetEvent::ViewStateChanged {
            slot_id: self.slot_id.clone(),
            state: view,
        });
    }

    fn cancel_form_fetch(state: &mut WidgetState) {
        if let Some(token) = state.form_fetch.take() {
            token.cancel();
            if state.form == FormState::Loading {
                state.form = FormState::Idle;
            }
        }
    }

    fn mount_editor(&self, state: &mut WidgetState) {
        let Some(rich_text) = self.deps.rich_text.as_ref() else {
            return;
        };
        if state.editor.is_some()
            || state.view != ViewState::Expanded
            || state.details.widget_type != RICH_CONTENT_TYPE
        {
            return;
        }
        let FormState::Loaded(markup) = &state.form else {
            return;
        };
        let Some(field) = find_editor_field(markup) else {
            tracing::debug!(widget_id = %self.widget_id, "settings form has no textarea for the editor");
            return;
        };

        let container = container_selector(&state.details.widget_type, &self.widget_id);
        let instance = rich_text.mount(&container, &field.initial_html, &self.deps.rich_content.editor_btns);
        state.editor = Some(MountedEditor {
            field: field
                .name
                .unwrap_or_else(|| self.deps.rich_content.field_name.clone()),
            instance,
        });
    }

    fn lock(&self) -> MutexGuard<'_, WidgetState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for WidgetController {
    fn drop(&mut self) {
        self.teardown();
    }
}
