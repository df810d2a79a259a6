//! Change notifications for attendance sessions.
//!
//! Callers that render live lists subscribe per class and receive an event
//! after every committed write or delete. Nothing in the core depends on a
//! subscriber being present.

use crate::model::class_ref::{ClassId, ClassRef};
use crate::model::session::{AttendanceSession, SessionId};
use log::debug;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

/// One committed change to a class's sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session created or overwritten; carries the stored state.
    Saved(AttendanceSession),
    /// Session and its records removed.
    Deleted {
        class_id: ClassId,
        session_id: SessionId,
    },
}

impl SessionEvent {
    pub fn class_id(&self) -> ClassId {
        match self {
            Self::Saved(session) => session.class_ref.id,
            Self::Deleted { class_id, .. } => *class_id,
        }
    }
}

struct Subscriber {
    class_id: ClassId,
    sender: Sender<SessionEvent>,
}

/// Fan-out point for session events.
#[derive(Default)]
pub struct SessionEventHub {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl SessionEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in one class. Dropping the receiver unsubscribes.
    pub fn subscribe(&self, class_ref: &ClassRef) -> Receiver<SessionEvent> {
        let (sender, receiver) = channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                class_id: class_ref.id,
                sender,
            });
        receiver
    }

    /// Delivers `event` to the class's subscribers and prunes closed ones.
    pub fn publish(&self, event: SessionEvent) {
        let class_id = event.class_id();
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|subscriber| {
            subscriber.class_id != class_id || subscriber.sender.send(event.clone()).is_ok()
        });
        let pruned = before - subscribers.len();
        if pruned > 0 {
            debug!("event=subscriber_prune module=events status=ok class_id={class_id} pruned={pruned}");
        }
    }

    /// Number of live subscriptions, across all classes.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
