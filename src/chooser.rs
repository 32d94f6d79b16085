use crate::errors::{AppError, AppResult};
use crate::events::{WidgetEvent, WidgetEventSender};
use crate::models::{ViewState, WidgetDescriptor};
use crate::registry::WidgetRegistry;
use std::sync::Arc;

/// Widget picker shown in an empty slot. Its open/closed state counts toward
/// the row's expansion exactly like a widget's.
pub struct WidgetChooser {
    slot_id: String,
    registry: Arc<WidgetRegistry>,
    events: WidgetEventSender,
    view: ViewState,
}

impl WidgetChooser {
    pub fn new(slot_id: impl Into<String>, registry: Arc<WidgetRegistry>, events: WidgetEventSender) -> Self {
        Self {
            slot_id: slot_id.into(),
            registry,
            events,
            view: ViewState::Collapsed,
        }
    }

    pub fn slot_id(&self) -> &str {
        &self.slot_id
    }

    pub fn is_open(&self) -> bool {
        self.view == ViewState::Expanded
    }

    pub fn options(&self) -> &[WidgetDescriptor] {
        self.registry.available_widgets()
    }

    pub fn open(&mut self) {
        self.set_view(ViewState::Expanded);
    }

    pub fn close(&mut self) {
        self.set_view(ViewState::Collapsed);
    }

    pub fn toggle(&mut self) {
        self.set_view(self.view.flipped());
    }

    /// Picks a type from the registry and closes the chooser. The caller
    /// places the widget with the returned type.
    pub fn choose(&mut self, widget_type: &str) -> AppResult<String> {
        let entry = self
            .registry
            .lookup(widget_type)
            .ok_or_else(|| AppError::NotFound(format!("widget type {} is not offered", widget_type)))?;
        let chosen = entry.widget_type.clone();
        self.close();
        Ok(chosen)
    }

    fn set_view(&mut self, view: ViewState) {
        if self.view == view {
            return;
        }
        self.view = view;
        let _ = self.events.send(WidgetEvent::ViewStateChanged {
            slot_id: self.slot_id.clone(),
            state: view,
        });
    }
}
