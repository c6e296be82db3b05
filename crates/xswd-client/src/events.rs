//! Single-slot mailboxes for push events.
//!
//! Each event type buffers at most one value. A push that arrives before the
//! previous one was consumed replaces it. A wait consumes the value it
//! returns, so concurrent waiters on the same event type compete for it.

use std::pin::pin;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::Notify;
use xswd_core::EventType;

use crate::error::{ConnectionError, Result};
use crate::lock;

struct EventSlot {
    value: Value,
    /// True once consumed, or if nothing arrived since the last consumption.
    processed: bool,
}

impl EventSlot {
    fn initial(event: EventType) -> Self {
        let value = match event {
            EventType::NewTopoheight | EventType::NewBalance => json!(0),
            EventType::NewEntry => json!(""),
        };
        Self {
            value,
            processed: true,
        }
    }
}

pub(crate) struct EventSlots {
    slots: Mutex<[EventSlot; 3]>,
    ready: Notify,
}

fn index(event: EventType) -> usize {
    match event {
        EventType::NewTopoheight => 0,
        EventType::NewBalance => 1,
        EventType::NewEntry => 2,
    }
}

impl EventSlots {
    pub(crate) fn new() -> Self {
        Self {
            slots: Mutex::new(EventType::ALL.map(EventSlot::initial)),
            ready: Notify::new(),
        }
    }

    pub(crate) fn publish(&self, event: EventType, value: Value) {
        {
            let mut slots = lock(&self.slots);
            let slot = &mut slots[index(event)];
            slot.value = value;
            slot.processed = false;
        }
        self.ready.notify_waiters();
    }

    fn try_take(&self, event: EventType) -> Option<Value> {
        let mut slots = lock(&self.slots);
        let slot = &mut slots[index(event)];
        if slot.processed {
            return None;
        }
        slot.processed = true;
        Some(slot.value.clone())
    }

    /// Last value seen for `event`, consumed or not.
    pub(crate) fn latest(&self, event: EventType) -> Value {
        lock(&self.slots)[index(event)].value.clone()
    }

    pub(crate) async fn wait(&self, event: EventType, limit: Duration) -> Result<Value> {
        tokio::time::timeout(limit, async {
            loop {
                let mut notified = pin!(self.ready.notified());
                notified.as_mut().enable();
                if let Some(value) = self.try_take(event) {
                    tracing::debug!(%event, "checked event");
                    return value;
                }
                notified.await;
            }
        })
        .await
        .map_err(|_| ConnectionError::EventTimeout(event))
    }
}
