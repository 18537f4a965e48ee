use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::broker::events::{MediaFrame, StreamEvent};
use crate::broker::registry::StreamKey;
use crate::broker::subscriber::SubscriberQueue;
use crate::protocol::ON_METADATA;
use crate::{Error, Result};

/// What a broker stream currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// No publisher; live subscribers may be waiting
    Idle,

    /// A live publisher holds the source slot
    Publishing,

    /// A registered VOD resource
    Vod,
}

struct StreamState {
    kind: StreamKind,
    publisher: Option<Uuid>,
    data_frames: Vec<(String, Arc<Vec<u8>>)>,
    audio_config: Option<Arc<MediaFrame>>,
    video_config: Option<Arc<MediaFrame>>,
    subscribers: Vec<Arc<SubscriberQueue>>,
    duration_ms: f64,
}

/// A named server-side stream: at most one publisher, any number of
/// subscribers, and the retained header frames late joiners need.
///
/// All state transitions serialize on one lock and never suspend while
/// holding it; fan-out is a non-blocking enqueue per subscriber.
pub struct BrokerStream {
    key: StreamKey,
    state: Mutex<StreamState>,
}

impl BrokerStream {
    pub(crate) fn new(key: StreamKey, kind: StreamKind, duration_ms: f64) -> Self {
        BrokerStream {
            key,
            state: Mutex::new(StreamState {
                kind,
                publisher: None,
                data_frames: Vec::new(),
                audio_config: None,
                video_config: None,
                subscribers: Vec::new(),
                duration_ms,
            }),
        }
    }

    /// The registry key this stream lives under
    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    /// Current stream kind
    pub async fn kind(&self) -> StreamKind {
        self.state.lock().await.kind
    }

    /// True while a publisher holds the source slot
    pub async fn is_publishing(&self) -> bool {
        self.state.lock().await.kind == StreamKind::Publishing
    }

    /// VOD duration in milliseconds (0 for live streams)
    pub async fn duration_ms(&self) -> f64 {
        self.state.lock().await.duration_ms
    }

    /// Take the source slot for a publishing session
    pub async fn set_publisher(&self, session_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().await;

        if state.kind == StreamKind::Publishing {
            return Err(Error::stream(format!(
                "Stream '{}' is already being published",
                self.key.name
            )));
        }
        if state.kind == StreamKind::Vod {
            return Err(Error::stream(format!(
                "Stream '{}' is a VOD resource",
                self.key.name
            )));
        }

        state.kind = StreamKind::Publishing;
        state.publisher = Some(session_id);
        Self::fan_out(&mut state, StreamEvent::PublishStart);
        Ok(())
    }

    /// Release the source slot. Subscribers get an unpublish event and stay
    /// attached; retained header frames are emptied.
    pub async fn clear_publisher(&self, session_id: Uuid) {
        let mut state = self.state.lock().await;

        if state.publisher != Some(session_id) {
            return;
        }

        state.kind = StreamKind::Idle;
        state.publisher = None;
        state.data_frames.clear();
        state.audio_config = None;
        state.video_config = None;
        Self::fan_out(&mut state, StreamEvent::Unpublish);
    }

    /// Publish an audio frame; configuration frames are retained
    pub async fn publish_audio(&self, frame: MediaFrame) {
        let frame = Arc::new(frame);
        let mut state = self.state.lock().await;

        if frame.is_config {
            state.audio_config = Some(frame.clone());
        }
        Self::fan_out(&mut state, StreamEvent::Audio(frame));
    }

    /// Publish a video frame; configuration frames are retained
    pub async fn publish_video(&self, frame: MediaFrame) {
        let frame = Arc::new(frame);
        let mut state = self.state.lock().await;

        if frame.is_config {
            state.video_config = Some(frame.clone());
        }
        Self::fan_out(&mut state, StreamEvent::Video(frame));
    }

    /// Retain a data frame under its handler name and dispatch it
    pub async fn publish_data(&self, handler: String, payload: Vec<u8>) {
        let payload = Arc::new(payload);
        let mut state = self.state.lock().await;

        match state.data_frames.iter_mut().find(|(h, _)| *h == handler) {
            Some(entry) => entry.1 = payload.clone(),
            None => state.data_frames.push((handler.clone(), payload.clone())),
        }
        Self::fan_out(&mut state, StreamEvent::Data { handler, payload });
    }

    /// Dispatch a data frame without retaining it, for handlers late
    /// joiners have no use for
    pub async fn send_data(&self, handler: String, payload: Vec<u8>) {
        let mut state = self.state.lock().await;
        Self::fan_out(
            &mut state,
            StreamEvent::Data {
                handler,
                payload: Arc::new(payload),
            },
        );
    }

    /// Remove a retained data frame and tell subscribers
    pub async fn clear_data(&self, handler: &str) {
        let mut state = self.state.lock().await;
        state.data_frames.retain(|(h, _)| h != handler);
        Self::fan_out(
            &mut state,
            StreamEvent::ClearData {
                handler: handler.to_string(),
            },
        );
    }

    /// Attach a subscriber queue. Retained frames are replayed into the
    /// queue before it joins the live path: data frames with `onMetaData`
    /// first, then the audio and video configuration headers.
    pub async fn subscribe(&self, queue: Arc<SubscriberQueue>) {
        let mut state = self.state.lock().await;

        let mut replay = Vec::new();
        for (handler, payload) in &state.data_frames {
            let event = StreamEvent::Data {
                handler: handler.clone(),
                payload: payload.clone(),
            };
            if handler == ON_METADATA {
                replay.insert(0, event);
            } else {
                replay.push(event);
            }
        }
        if let Some(ref frame) = state.audio_config {
            replay.push(StreamEvent::Audio(frame.clone()));
        }
        if let Some(ref frame) = state.video_config {
            replay.push(StreamEvent::Video(frame.clone()));
        }

        for event in replay {
            queue.push(event);
        }

        state.subscribers.push(queue);
    }

    /// Detach a subscriber and close its queue
    pub async fn unsubscribe(&self, id: Uuid) {
        let mut state = self.state.lock().await;
        state.subscribers.retain(|queue| {
            if queue.id == id {
                queue.close();
                false
            } else {
                true
            }
        });
    }

    /// Number of attached subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.state.lock().await.subscribers.len()
    }

    /// True once nothing holds the stream: no publisher, no subscribers,
    /// and not a registered VOD resource
    pub async fn is_idle(&self) -> bool {
        let state = self.state.lock().await;
        state.kind == StreamKind::Idle
            && state.publisher.is_none()
            && state.subscribers.is_empty()
    }

    /// Dispatch to every subscriber, sweeping the ones whose queue ended.
    /// A failed subscriber never affects the publisher or its peers.
    fn fan_out(state: &mut StreamState, event: StreamEvent) {
        state.subscribers.retain(|queue| queue.push(event.clone()));
    }
}
