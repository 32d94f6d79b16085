//! Row/column layout of the front page and its persistence policy.
//!
//! Every mutation except [`LayoutMachine::set_widget_in_slot`] and live drag
//! moves sends the whole layout to the host as a detached save. Saves are
//! best effort: a failure is logged and reported, local state stays as is.

use crate::config::UiStrings;
use crate::errors::{AppError, AppResult};
use crate::events::{Confirm, Notifier, WidgetEvent};
use crate::models::{ObjectRef, PersistedLayout, ViewState};
use crate::store::LayoutStore;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;
use uuid::Uuid;

pub const SLOTS_PER_ROW: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSlot {
    /// Render-time identity; never persisted.
    pub slot_id: String,
    pub widget_id: String,
    pub widget_type: String,
    pub is_new: bool,
}

impl ColumnSlot {
    fn empty(slot_id: String, is_new: bool) -> Self {
        Self {
            slot_id,
            widget_id: String::new(),
            widget_type: String::new(),
            is_new,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.widget_id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    slots: Vec<ColumnSlot>,
}

impl Row {
    fn fresh() -> Self {
        Self {
            slots: (0..SLOTS_PER_ROW)
                .map(|_| ColumnSlot::empty(format!("col-{}", Uuid::new_v4()), true))
                .collect(),
        }
    }

    fn from_persisted(row_index: usize, mut cells: Vec<String>) -> Self {
        if cells.len() > SLOTS_PER_ROW {
            tracing::warn!(
                row = row_index,
                columns = cells.len(),
                "persisted row has too many columns; extra widgets dropped"
            );
            cells.truncate(SLOTS_PER_ROW);
        }

        let mut slots = cells
            .into_iter()
            .enumerate()
            .map(|(col_index, widget_id)| ColumnSlot {
                slot_id: format!("col-{}-{}", row_index, col_index),
                widget_id,
                widget_type: String::new(),
                is_new: false,
            })
            .collect::<Vec<_>>();

        while slots.len() < SLOTS_PER_ROW {
            slots.push(ColumnSlot::empty(
                format!("col-{}-{}", row_index, slots.len()),
                false,
            ));
        }
        Self { slots }
    }

    pub fn slots(&self) -> &[ColumnSlot] {
        &self.slots
    }

    pub fn slot(&self, col_index: usize) -> Option<&ColumnSlot> {
        self.slots.get(col_index)
    }

    pub fn widget_ids(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.widget_id.clone()).collect()
    }

    fn first_slot_id(&self) -> Option<&str> {
        self.slots.first().map(|slot| slot.slot_id.as_str())
    }

    fn slot_ids(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.slot_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

struct DragSession {
    origin: Vec<Row>,
    index: usize,
}

pub struct LayoutMachine {
    object: ObjectRef,
    store: Arc<dyn LayoutStore>,
    notifier: Notifier,
    strings: Arc<UiStrings>,
    rows: Vec<Row>,
    load_state: LoadState,
    expanded: HashSet<String>,
    drag: Option<DragSession>,
    saves: JoinSet<()>,
}

impl LayoutMachine {
    pub fn new(object: ObjectRef, store: Arc<dyn LayoutStore>, notifier: Notifier, strings: Arc<UiStrings>) -> Self {
        Self {
            object,
            store,
            notifier,
            strings,
            rows: Vec::new(),
            load_state: LoadState::Loading,
            expanded: HashSet::new(),
            drag: None,
            saves: JoinSet::new(),
        }
    }

    /// Fetches the persisted layout. A failure is terminal for this view.
    pub async fn load(&mut self) -> AppResult<()> {
        match self.store.fetch_layout(&self.object).await {
            Ok(persisted) => {
                self.hydrate(persisted);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(error = %error, object_id = self.object.object_id, "layout load failed");
                self.load_state = LoadState::Failed(self.strings.layout_load_failed.clone());
                Err(error)
            }
        }
    }

    pub fn hydrate(&mut self, persisted: PersistedLayout) {
        self.rows = persisted
            .into_iter()
            .enumerate()
            .map(|(row_index, cells)| Row::from_persisted(row_index, cells))
            .collect();
        self.expanded.clear();
        self.drag = None;
        self.load_state = LoadState::Ready;
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn is_ready(&self) -> bool {
        self.load_state == LoadState::Ready
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn slot(&self, row_index: usize, col_index: usize) -> Option<&ColumnSlot> {
        self.rows.get(row_index).and_then(|row| row.slot(col_index))
    }

    pub fn to_persisted(&self) -> PersistedLayout {
        self.rows.iter().map(Row::widget_ids).collect()
    }

    pub fn add_row(&mut self) -> bool {
        if !self.accepts_mutation("add_row") {
            return false;
        }
        self.rows.push(Row::fresh());
        self.persist();
        true
    }

    pub fn delete_row(&mut self, row_index: usize, confirm: &dyn Confirm) -> bool {
        if !self.accepts_mutation("delete_row") || row_index >= self.rows.len() {
            return false;
        }
        if !confirm.confirm(&self.strings.confirm_delete_section) {
            return false;
        }

        let removed = self.rows.remove(row_index);
        for slot_id in removed.slot_ids() {
            self.expanded.remove(slot_id);
        }
        self.persist();
        true
    }

    /// Moves a row and persists the settled order in one step (a drop).
    pub fn reorder_rows(&mut self, from_index: usize, to_index: usize) -> bool {
        if from_index == to_index || !self.accepts_mutation("reorder_rows") {
            return false;
        }
        if !self.move_row(from_index, to_index) {
            return false;
        }
        self.persist();
        true
    }

    pub fn begin_drag(&mut self, row_index: usize) -> bool {
        if !self.accepts_mutation("begin_drag") || row_index >= self.rows.len() {
            return false;
        }
        self.drag = Some(DragSession {
            origin: self.rows.clone(),
            index: row_index,
        });
        true
    }

    /// Live reorder while hovering; updates local order only.
    pub fn drag_over(&mut self, row_index: usize) -> bool {
        let Some(from_index) = self.drag.as_ref().map(|session| session.index) else {
            return false;
        };
        if from_index == row_index || !self.move_row(from_index, row_index) {
            return false;
        }
        if let Some(session) = self.drag.as_mut() {
            session.index = row_index;
        }
        true
    }

    /// Drop: persists the settled order if it differs from the pre-drag order.
    pub fn end_drag(&mut self) -> bool {
        let Some(session) = self.drag.take() else {
            return false;
        };
        let changed = session
            .origin
            .iter()
            .map(Row::first_slot_id)
            .ne(self.rows.iter().map(Row::first_slot_id));
        if changed {
            self.persist();
        }
        changed
    }

    pub fn cancel_drag(&mut self) {
        if let Some(session) = self.drag.take() {
            self.rows = session.origin;
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Fills an empty slot with a freshly chosen widget type. Local only:
    /// nothing is saved until the widget's options are.
    pub fn set_widget_in_slot(&mut self, row_index: usize, col_index: usize, widget_type: &str) -> AppResult<String> {
        if !self.is_ready() {
            return Err(AppError::InvalidState("layout is not loaded".to_string()));
        }
        let slot = self
            .slot_mut(row_index, col_index)
            .ok_or_else(|| AppError::NotFound(format!("No slot at row {} column {}", row_index, col_index)))?;
        if !slot.is_empty() {
            return Err(AppError::InvalidState(format!(
                "slot at row {} column {} already holds widget {}",
                row_index, col_index, slot.widget_id
            )));
        }

        let widget_id = provisional_widget_id();
        slot.widget_id = widget_id.clone();
        slot.widget_type = widget_type.to_string();
        slot.is_new = true;
        Ok(widget_id)
    }

    pub fn clear_widget_in_slot(&mut self, row_index: usize, col_index: usize) -> bool {
        if !self.accepts_mutation("clear_widget_in_slot") {
            return false;
        }
        let Some(slot) = self.slot_mut(row_index, col_index) else {
            return false;
        };
        if slot.is_empty() {
            return false;
        }
        slot.widget_id.clear();
        slot.widget_type.clear();
        let slot_id = slot.slot_id.clone();
        self.expanded.remove(&slot_id);
        self.persist();
        true
    }

    /// Records that the widget in this slot now exists on the host.
    pub fn confirm_widget_persisted(&mut self, row_index: usize, col_index: usize, widget_id: &str) -> bool {
        if !self.accepts_mutation("confirm_widget_persisted") {
            return false;
        }
        let Some(slot) = self.slot_mut(row_index, col_index) else {
            return false;
        };
        if slot.widget_id != widget_id {
            tracing::warn!(
                row = row_index,
                col = col_index,
                widget_id,
                current = %slot.widget_id,
                "ignoring stale widget confirmation"
            );
            return false;
        }
        slot.is_new = false;
        self.persist();
        true
    }

    pub fn locate_slot(&self, slot_id: &str) -> Option<(usize, usize)> {
        self.rows.iter().enumerate().find_map(|(row_index, row)| {
            row.slots
                .iter()
                .position(|slot| slot.slot_id == slot_id)
                .map(|col_index| (row_index, col_index))
        })
    }

    /// View state of a widget or of an empty slot's widget chooser.
    pub fn set_view_state(&mut self, slot_id: &str, state: ViewState) {
        match state {
            ViewState::Expanded => {
                self.expanded.insert(slot_id.to_string());
            }
            ViewState::Collapsed => {
                self.expanded.remove(slot_id);
            }
        }
    }

    pub fn row_has_expanded(&self, row_index: usize) -> bool {
        self.rows
            .get(row_index)
            .map(|row| row.slot_ids().any(|slot_id| self.expanded.contains(slot_id)))
            .unwrap_or(false)
    }

    pub fn apply_widget_event(&mut self, event: WidgetEvent) -> bool {
        match event {
            WidgetEvent::ViewStateChanged { slot_id, state } => {
                self.set_view_state(&slot_id, state);
                true
            }
            WidgetEvent::OptionsSaved { slot_id, widget_id } => match self.locate_slot(&slot_id) {
                Some((row_index, col_index)) => self.confirm_widget_persisted(row_index, col_index, &widget_id),
                None => {
                    tracing::debug!(slot_id = %slot_id, "options saved for a slot no longer in the layout");
                    false
                }
            },
            WidgetEvent::DeleteConfirmed { slot_id } => match self.locate_slot(&slot_id) {
                Some((row_index, col_index)) => self.clear_widget_in_slot(row_index, col_index),
                None => false,
            },
        }
    }

    /// Waits for every detached save issued so far.
    pub async fn flush(&mut self) {
        while let Some(result) = self.saves.join_next().await {
            if let Err(error) = result {
                tracing::warn!(error = %error, "layout save task did not complete");
            }
        }
    }

    pub fn pending_saves(&self) -> usize {
        self.saves.len()
    }

    fn accepts_mutation(&self, operation: &str) -> bool {
        if self.is_ready() {
            return true;
        }
        tracing::debug!(operation, state = ?self.load_state, "layout mutation rejected before load");
        false
    }

    fn move_row(&mut self, from_index: usize, to_index: usize) -> bool {
        if from_index >= self.rows.len() || to_index >= self.rows.len() {
            return false;
        }
        let row = self.rows.remove(from_index);
        self.rows.insert(to_index, row);
        true
    }

    fn slot_mut(&mut self, row_index: usize, col_index: usize) -> Option<&mut ColumnSlot> {
        self.rows
            .get_mut(row_index)
            .and_then(|row| row.slots.get_mut(col_index))
    }

    fn persist(&mut self) {
        while self.saves.try_join_next().is_some() {}

        let layout = self.to_persisted();
        let store = Arc::clone(&self.store);
        let object = self.object.clone();
        let notifier = self.notifier.clone();
        let message = self.strings.layout_save_failed.clone();
        self.saves.spawn(async move {
            if let Err(error) = store.save_layout(&object, &layout).await {
                tracing::warn!(error = %error, rows = layout.len(), "layout save failed");
                notifier.error(message);
            }
        });
    }
}

fn provisional_widget_id() -> String {
    format!("{}_{}", Utc::now().timestamp_millis(), rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::{LayoutMachine, LoadState};
    use crate::config::UiStrings;
    use crate::events::{NoticeReceiver, Notifier, WidgetEvent};
    use crate::models::{NoticeKind, ViewState};
    use crate::test_support::{object, Endpoint, RecordingStore};
    use std::sync::Arc;

    fn yes(_: &str) -> bool {
        true
    }

    fn no(_: &str) -> bool {
        false
    }

    fn rows(values: &[&[&str]]) -> Vec<Vec<String>> {
        values
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    async fn loaded(store: &Arc<RecordingStore>) -> (LayoutMachine, NoticeReceiver) {
        let (notifier, notices) = Notifier::channel();
        let mut layout = LayoutMachine::new(object(), store.clone(), notifier, Arc::new(UiStrings::default()));
        layout.load().await.expect("layout loads");
        (layout, notices)
    }

    #[tokio::test]
    async fn single_column_rows_are_padded_on_load() {
        let store = RecordingStore::new();
        store.set_layout(&[&["w1", "w2"], &["w3"]]);
        let (layout, _) = loaded(&store).await;

        assert_eq!(layout.rows().len(), 2);
        let second = layout.rows()[1].slots();
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].widget_id, "w3");
        assert!(second[1].is_empty());
        assert!(second.iter().all(|slot| !slot.is_new));
        assert_eq!(second[1].slot_id, "col-1-1");
    }

    #[tokio::test]
    async fn add_row_on_empty_layout_saves_two_empty_columns() {
        let store = RecordingStore::new();
        let (mut layout, _) = loaded(&store).await;

        assert!(layout.add_row());
        layout.flush().await;

        assert_eq!(layout.rows().len(), 1);
        assert_eq!(store.saved_layouts(), vec![rows(&[&["", ""]])]);
        let slots = layout.rows()[0].slots();
        assert_ne!(slots[0].slot_id, slots[1].slot_id);
    }

    #[tokio::test]
    async fn delete_row_removes_only_that_row() {
        let store = RecordingStore::new();
        store.set_layout(&[&["a", ""], &["b", ""], &["c", ""]]);
        let (mut layout, _) = loaded(&store).await;

        assert!(!layout.delete_row(1, &no));
        assert!(!layout.delete_row(9, &yes));
        assert!(layout.delete_row(1, &yes));
        layout.flush().await;

        assert_eq!(layout.to_persisted(), rows(&[&["a", ""], &["c", ""]]));
        assert_eq!(store.saved_layouts(), vec![rows(&[&["a", ""], &["c", ""]])]);
    }

    #[tokio::test]
    async fn reorder_moves_row_and_keeps_relative_order() {
        let store = RecordingStore::new();
        store.set_layout(&[&["a"], &["b"], &["c"]]);
        let (mut layout, _) = loaded(&store).await;

        assert!(layout.reorder_rows(0, 2));
        layout.flush().await;

        let expected = rows(&[&["b", ""], &["c", ""], &["a", ""]]);
        assert_eq!(layout.to_persisted(), expected);
        assert_eq!(store.saved_layouts(), vec![expected]);
    }

    #[tokio::test]
    async fn live_drag_persists_only_the_settled_order() {
        let store = RecordingStore::new();
        store.set_layout(&[&["a"], &["b"], &["c"]]);
        let (mut layout, _) = loaded(&store).await;

        assert!(layout.begin_drag(0));
        assert!(layout.drag_over(1));
        assert!(layout.drag_over(2));
        layout.flush().await;
        assert!(store.saved_layouts().is_empty());
        assert_eq!(layout.to_persisted()[2][0], "a");

        assert!(layout.end_drag());
        layout.flush().await;
        assert_eq!(store.saved_layouts(), vec![rows(&[&["b", ""], &["c", ""], &["a", ""]])]);
    }

    #[tokio::test]
    async fn drop_back_in_place_and_cancel_do_not_save() {
        let store = RecordingStore::new();
        store.set_layout(&[&["a"], &["b"]]);
        let (mut layout, _) = loaded(&store).await;

        layout.begin_drag(0);
        layout.drag_over(1);
        layout.drag_over(0);
        assert!(!layout.end_drag());

        layout.begin_drag(0);
        layout.drag_over(1);
        layout.cancel_drag();
        layout.flush().await;

        assert_eq!(layout.to_persisted(), rows(&[&["a", ""], &["b", ""]]));
        assert!(store.saved_layouts().is_empty());
    }

    #[tokio::test]
    async fn choosing_a_widget_saves_nothing_until_confirmed() {
        let store = RecordingStore::new();
        store.set_layout(&[&["", ""]]);
        let (mut layout, _) = loaded(&store).await;

        let widget_id = layout.set_widget_in_slot(0, 1, "youtube").expect("slot filled");
        layout.flush().await;
        assert!(store.saved_layouts().is_empty());
        let slot = layout.slot(0, 1).expect("slot");
        assert!(slot.is_new);
        assert_eq!(slot.widget_type, "youtube");

        assert!(layout.confirm_widget_persisted(0, 1, &widget_id));
        layout.flush().await;
        assert!(!layout.slot(0, 1).expect("slot").is_new);
        assert_eq!(store.saved_layouts(), vec![vec![vec![String::new(), widget_id]]]);
    }

    #[tokio::test]
    async fn occupied_or_missing_slots_cannot_be_filled() {
        let store = RecordingStore::new();
        store.set_layout(&[&["w1"]]);
        let (mut layout, _) = loaded(&store).await;

        assert!(layout.set_widget_in_slot(0, 0, "youtube").is_err());
        assert!(layout.set_widget_in_slot(3, 0, "youtube").is_err());
    }

    #[tokio::test]
    async fn stale_confirmation_is_ignored() {
        let store = RecordingStore::new();
        store.set_layout(&[&["w1"]]);
        let (mut layout, _) = loaded(&store).await;

        assert!(!layout.confirm_widget_persisted(0, 0, "other"));
        layout.flush().await;
        assert!(store.saved_layouts().is_empty());
    }

    #[tokio::test]
    async fn clearing_a_widget_keeps_the_column_position() {
        let store = RecordingStore::new();
        store.set_layout(&[&["w1", "w2"]]);
        let (mut layout, _) = loaded(&store).await;

        assert!(layout.clear_widget_in_slot(0, 0));
        assert!(!layout.clear_widget_in_slot(0, 0));
        layout.flush().await;

        assert_eq!(store.saved_layouts(), vec![rows(&[&["", "w2"]])]);
        assert_eq!(layout.slot(0, 0).expect("slot").widget_type, "");
    }

    #[tokio::test]
    async fn failed_save_keeps_local_state_and_notifies() {
        let store = RecordingStore::new();
        store.fail(Endpoint::SaveLayout);
        let (mut layout, mut notices) = loaded(&store).await;

        assert!(layout.add_row());
        layout.flush().await;

        assert_eq!(layout.rows().len(), 1);
        let notice = notices.try_recv().expect("error notice");
        assert_eq!(notice.kind, NoticeKind::Error);
    }

    #[tokio::test]
    async fn failed_load_is_terminal_and_blocks_mutations() {
        let store = RecordingStore::new();
        store.fail(Endpoint::Layout);
        let (notifier, _notices) = Notifier::channel();
        let mut layout = LayoutMachine::new(object(), store.clone(), notifier, Arc::new(UiStrings::default()));

        assert!(layout.load().await.is_err());
        assert!(matches!(layout.load_state(), LoadState::Failed(_)));
        assert!(!layout.add_row());
        layout.flush().await;
        assert!(store.saved_layouts().is_empty());
    }

    #[tokio::test]
    async fn widget_events_drive_expansion_and_slot_changes() {
        let store = RecordingStore::new();
        store.set_layout(&[&["w1", "w2"], &["w3"]]);
        let (mut layout, _) = loaded(&store).await;

        layout.apply_widget_event(WidgetEvent::ViewStateChanged {
            slot_id: "col-0-1".to_string(),
            state: ViewState::Expanded,
        });
        assert!(layout.row_has_expanded(0));
        assert!(!layout.row_has_expanded(1));

        layout.apply_widget_event(WidgetEvent::ViewStateChanged {
            slot_id: "col-1-1".to_string(),
            state: ViewState::Expanded,
        });
        assert!(layout.row_has_expanded(1));

        assert!(layout.apply_widget_event(WidgetEvent::DeleteConfirmed {
            slot_id: "col-0-1".to_string(),
        }));
        assert!(!layout.row_has_expanded(0));
        layout.flush().await;
        assert_eq!(store.saved_layouts(), vec![rows(&[&["w1", ""], &["w3", ""]])]);
    }
}
