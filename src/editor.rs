//! Composition root for one editing session.
//!
//! Owns the layout, the optional status toggle and everything widgets
//! share (store, registry, form cache, notices). Each occupied slot has a
//! single widget controller, handed out shared so its in-flight guards hold
//! across callers. Controllers talk back through the widget event channel,
//! which [`FrontPageEditor::pump_widget_events`] applies to the layout.

use crate::chooser::WidgetChooser;
use crate::config::{EditorConfig, UiStrings};
use crate::errors::{AppError, AppResult};
use crate::events::{widget_channel, Confirm, NoticeReceiver, Notifier, WidgetEventReceiver, WidgetEventSender};
use crate::form_cache::FormCache;
use crate::layout::LayoutMachine;
use crate::models::ObjectRef;
use crate::registry::WidgetRegistry;
use crate::rich_text::RichTextEditor;
use crate::store::LayoutStore;
use crate::toggle::StatusToggle;
use crate::widget::{WidgetController, WidgetDeps};
use std::collections::HashMap;
use std::sync::Arc;

pub struct FrontPageEditor {
    config: Arc<EditorConfig>,
    object: ObjectRef,
    store: Arc<dyn LayoutStore>,
    registry: Arc<WidgetRegistry>,
    forms: FormCache,
    strings: Arc<UiStrings>,
    notifier: Notifier,
    widget_events: WidgetEventSender,
    widget_inbox: WidgetEventReceiver,
    layout: LayoutMachine,
    toggle: Option<StatusToggle>,
    rich_text: Option<Arc<dyn RichTextEditor>>,
    widgets: HashMap<String, Arc<WidgetController>>,
}

impl FrontPageEditor {
    pub fn new(config: EditorConfig, store: Arc<dyn LayoutStore>) -> (Self, NoticeReceiver) {
        let (notifier, notices) = Notifier::channel();
        let (widget_events, widget_inbox) = widget_channel();
        let object = config.object();
        let strings = Arc::new(config.lang.clone());
        let registry = Arc::new(WidgetRegistry::new(config.all_widgets.clone()));

        let layout = LayoutMachine::new(object.clone(), store.clone(), notifier.clone(), strings.clone());
        let toggle = config.show_enable_disable_ui.then(|| {
            StatusToggle::new(object.clone(), store.clone(), notifier.clone(), strings.clone())
        });

        let editor = Self {
            config: Arc::new(config),
            object,
            store,
            registry,
            forms: FormCache::new(),
            strings,
            notifier,
            widget_events,
            widget_inbox,
            layout,
            toggle,
            rich_text: None,
            widgets: HashMap::new(),
        };
        (editor, notices)
    }

    pub fn with_rich_text(mut self, rich_text: Arc<dyn RichTextEditor>) -> Self {
        self.rich_text = Some(rich_text);
        self
    }

    /// Loads status (when shown) and layout. A status failure is terminal
    /// for the toggle only; a layout failure is returned.
    pub async fn load(&mut self) -> AppResult<()> {
        if let Some(toggle) = self.toggle.as_ref() {
            if let Err(error) = toggle.load().await {
                tracing::warn!(error = %error, "continuing without status toggle");
            }
        }
        self.layout.load().await?;
        tracing::info!(
            object_type = %self.object.object_type,
            object_id = self.object.object_id,
            rows = self.layout.rows().len(),
            "front page editor loaded"
        );
        Ok(())
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }

    pub fn forms(&self) -> &FormCache {
        &self.forms
    }

    pub fn layout(&self) -> &LayoutMachine {
        &self.layout
    }

    pub fn layout_mut(&mut self) -> &mut LayoutMachine {
        &mut self.layout
    }

    pub fn toggle(&self) -> Option<&StatusToggle> {
        self.toggle.as_ref()
    }

    pub fn widget_deps(&self) -> WidgetDeps {
        WidgetDeps {
            object: self.object.clone(),
            store: self.store.clone(),
            registry: self.registry.clone(),
            forms: self.forms.clone(),
            strings: self.strings.clone(),
            rich_content: self.config.rich_content.clone(),
            events: self.widget_events.clone(),
            notifier: self.notifier.clone(),
            rich_text: self.rich_text.clone(),
        }
    }

    /// Controller for the widget occupying a slot. Repeated calls for the
    /// same widget return the same controller.
    pub fn widget(&mut self, row_index: usize, col_index: usize) -> AppResult<Arc<WidgetController>> {
        self.prune_widgets();
        let slot = self.layout.slot(row_index, col_index).ok_or_else(|| {
            AppError::NotFound(format!("No slot at row {} column {}", row_index, col_index))
        })?;
        if let Some(existing) = self.widgets.get(&slot.slot_id) {
            if existing.widget_id() == slot.widget_id {
                return Ok(existing.clone());
            }
        }

        let controller = Arc::new(WidgetController::new(slot, self.widget_deps())?);
        self.widgets.insert(slot.slot_id.clone(), controller.clone());
        Ok(controller)
    }

    /// Drops controllers whose slot is gone or now holds another widget.
    fn prune_widgets(&mut self) {
        let layout = &self.layout;
        self.widgets.retain(|slot_id, controller| {
            layout
                .locate_slot(slot_id)
                .and_then(|(row_index, col_index)| layout.slot(row_index, col_index))
                .is_some_and(|slot| slot.widget_id == controller.widget_id())
        });
    }

    pub fn chooser(&self, row_index: usize, col_index: usize) -> AppResult<WidgetChooser> {
        let slot = self.layout.slot(row_index, col_index).ok_or_else(|| {
            AppError::NotFound(format!("No slot at row {} column {}", row_index, col_index))
        })?;
        if !slot.is_empty() {
            return Err(AppError::InvalidState(format!("slot {} is occupied", slot.slot_id)));
        }
        Ok(WidgetChooser::new(
            slot.slot_id.clone(),
            self.registry.clone(),
            self.widget_events.clone(),
        ))
    }

    /// Fills an empty slot with a registry type and returns its controller.
    pub fn place_widget(
        &mut self,
        row_index: usize,
        col_index: usize,
        widget_type: &str,
    ) -> AppResult<Arc<WidgetController>> {
        let mut chooser = self.chooser(row_index, col_index)?;
        let chosen = chooser.choose(widget_type)?;
        self.layout.set_widget_in_slot(row_index, col_index, &chosen)?;
        self.pump_widget_events();
        self.widget(row_index, col_index)
    }

    pub fn delete_row(&mut self, row_index: usize, confirm: &dyn Confirm) -> bool {
        let deleted = self.layout.delete_row(row_index, confirm);
        if deleted {
            self.prune_widgets();
        }
        deleted
    }

    /// Applies queued widget events to the layout; returns how many changed it.
    pub fn pump_widget_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.widget_inbox.try_recv() {
            if self.layout.apply_widget_event(event) {
                applied += 1;
            }
        }
        if applied > 0 {
            self.prune_widgets();
        }
        applied
    }

    pub async fn flush(&mut self) {
        self.pump_widget_events();
        self.layout.flush().await;
    }
}
