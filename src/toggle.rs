//! Enable/disable flag for the custom front page.

use crate::config::UiStrings;
use crate::errors::{AppError, AppResult};
use crate::events::Notifier;
use crate::models::ObjectRef;
use crate::store::LayoutStore;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusPhase {
    Loading,
    Ready,
    Failed(String),
}

struct ToggleState {
    enabled: bool,
    phase: StatusPhase,
}

/// Shared by reference: readers see the optimistic value while an update
/// is still in flight.
pub struct StatusToggle {
    object: ObjectRef,
    store: Arc<dyn LayoutStore>,
    notifier: Notifier,
    strings: Arc<UiStrings>,
    state: StdMutex<ToggleState>,
}

impl StatusToggle {
    pub fn new(object: ObjectRef, store: Arc<dyn LayoutStore>, notifier: Notifier, strings: Arc<UiStrings>) -> Self {
        Self {
            object,
            store,
            notifier,
            strings,
            state: StdMutex::new(ToggleState {
                enabled: false,
                phase: StatusPhase::Loading,
            }),
        }
    }

    pub async fn load(&self) -> AppResult<bool> {
        let fetched = self.store.fetch_status(&self.object).await;
        let mut state = self.lock();
        match fetched {
            Ok(enabled) => {
                state.enabled = enabled;
                state.phase = StatusPhase::Ready;
                Ok(enabled)
            }
            Err(error) => {
                tracing::warn!(error = %error, object_id = self.object.object_id, "status load failed");
                state.phase = StatusPhase::Failed(self.strings.status_load_failed.clone());
                Err(error)
            }
        }
    }

    pub fn phase(&self) -> StatusPhase {
        self.lock().phase.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Flips the flag locally before the host confirms. A failed update
    /// restores the previous value and raises an error notice.
    pub async fn set_enabled(&self, enabled: bool) -> AppResult<bool> {
        let previous = {
            let mut state = self.lock();
            if state.phase != StatusPhase::Ready {
                return Err(AppError::InvalidState("status is not loaded".to_string()));
            }
            std::mem::replace(&mut state.enabled, enabled)
        };

        match self.store.update_status(&self.object, enabled).await {
            Ok(()) => {
                tracing::info!(object_id = self.object.object_id, enabled, "front page status updated");
                Ok(enabled)
            }
            Err(error) => {
                tracing::warn!(error = %error, enabled, "status update failed; reverting");
                self.lock().enabled = previous;
                self.notifier.error(self.strings.status_update_failed.clone());
                Err(error)
            }
        }
    }

    pub async fn toggle(&self) -> AppResult<bool> {
        let next = !self.is_enabled();
        self.set_enabled(next).await
    }

    fn lock(&self) -> MutexGuard<'_, ToggleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
