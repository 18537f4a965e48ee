use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;
use uuid::Uuid;

use crate::broker::events::StreamEvent;

/// Why a queue stopped accepting events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEnd {
    /// Unsubscribed or stream torn down
    Closed,

    /// Overflowed beyond what the drop policy could absorb
    Overflowed,
}

struct QueueInner {
    events: VecDeque<StreamEvent>,
    end: Option<QueueEnd>,
}

/// Bounded per-subscriber event queue.
///
/// Publishing never blocks on a subscriber: pushes are synchronous, and a
/// full queue sheds load by dropping the oldest video frames first, then
/// audio. Header frames and the latest keyframe are never dropped; when
/// nothing is droppable the subscriber itself is marked overflowed.
pub struct SubscriberQueue {
    /// Subscriber identity inside a stream's subscriber list
    pub id: Uuid,

    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
}

impl SubscriberQueue {
    /// Create a queue with the given depth
    pub fn new(capacity: usize) -> Self {
        SubscriberQueue {
            id: Uuid::new_v4(),
            inner: Mutex::new(QueueInner {
                events: VecDeque::with_capacity(capacity.min(64)),
                end: None,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue an event; returns false once the queue has ended and the
    /// subscriber should be swept
    pub fn push(&self, event: StreamEvent) -> bool {
        let mut inner = self.inner.lock().expect("queue lock poisoned");

        if inner.end.is_some() {
            return false;
        }

        if inner.events.len() >= self.capacity && !self.shed(&mut inner, event.is_keyframe_video())
        {
            inner.end = Some(QueueEnd::Overflowed);
            self.notify.notify_one();
            return false;
        }

        inner.events.push_back(event);
        drop(inner);
        self.notify.notify_one();
        true
    }

    /// Drop one droppable event: the oldest non-protected video first,
    /// then the oldest non-protected audio.
    ///
    /// The newest queued keyframe is exempt so a late joiner can still
    /// decode; an incoming keyframe supersedes it and makes it droppable
    /// like any other frame.
    fn shed(&self, inner: &mut QueueInner, incoming_is_keyframe: bool) -> bool {
        let exempt_keyframe = if incoming_is_keyframe {
            None
        } else {
            inner.events.iter().rposition(|e| e.is_keyframe_video())
        };

        let victim = inner
            .events
            .iter()
            .enumerate()
            .find(|(index, event)| {
                matches!(event, StreamEvent::Video(_))
                    && !event.is_protected()
                    && Some(*index) != exempt_keyframe
            })
            .map(|(index, _)| index)
            .or_else(|| {
                inner
                    .events
                    .iter()
                    .position(|e| matches!(e, StreamEvent::Audio(_)) && !e.is_protected())
            });

        match victim {
            Some(index) => inner.events.remove(index).is_some(),
            None => false,
        }
    }

    /// Dequeue the next event, waiting for one to arrive; Err carries the
    /// reason the queue ended
    pub async fn pop(&self) -> Result<StreamEvent, QueueEnd> {
        loop {
            {
                let mut inner = self.inner.lock().expect("queue lock poisoned");
                if let Some(event) = inner.events.pop_front() {
                    return Ok(event);
                }
                if let Some(end) = inner.end {
                    return Err(end);
                }
            }
            self.notify.notified().await;
        }
    }

    /// Close the queue; pending events are still drained by pop
    pub fn close(&self) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if inner.end.is_none() {
            inner.end = Some(QueueEnd::Closed);
        }
        drop(inner);
        self.notify.notify_one();
    }

    /// True once the queue stopped accepting events
    pub fn is_ended(&self) -> bool {
        self.inner.lock().expect("queue lock poisoned").end.is_some()
    }

    /// Current queue depth
    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").events.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
