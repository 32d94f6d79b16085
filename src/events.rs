//! Messages flowing out of widgets and toward the user.

use crate::models::{Notice, NoticeKind, ViewState};
use chrono::Utc;
use tokio::sync::mpsc;

pub const NOTICE_TTL_MS: u64 = 3_000;

/// Sent by a widget controller to the layout it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    ViewStateChanged { slot_id: String, state: ViewState },
    OptionsSaved { slot_id: String, widget_id: String },
    DeleteConfirmed { slot_id: String },
}

pub type WidgetEventSender = mpsc::UnboundedSender<WidgetEvent>;
pub type WidgetEventReceiver = mpsc::UnboundedReceiver<WidgetEvent>;

pub fn widget_channel() -> (WidgetEventSender, WidgetEventReceiver) {
    mpsc::unbounded_channel()
}

/// Posts transient notices to whoever renders them.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: mpsc::UnboundedSender<Notice>,
}

pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

impl Notifier {
    pub fn channel() -> (Self, NoticeReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn success(&self, message: impl Into<String>) {
        self.post(NoticeKind::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.post(NoticeKind::Error, message.into());
    }

    fn post(&self, kind: NoticeKind, message: String) {
        let notice = Notice {
            kind,
            message,
            created_at: Utc::now(),
            ttl_ms: NOTICE_TTL_MS,
        };
        let _ = self.sender.send(notice);
    }
}

/// Asks the user to confirm a destructive action.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}
