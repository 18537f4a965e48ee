use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::broker::stream::{BrokerStream, StreamKind};
use crate::protocol::constants::PLAY_START_LIVE_THEN_VOD;

/// Registry key scoping a stream to an application instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub app: String,
    pub instance: String,
    pub name: String,
}

impl StreamKey {
    pub fn new(
        app: impl Into<String>,
        instance: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        StreamKey {
            app: app.into(),
            instance: instance.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.app, self.instance, self.name)
    }
}

/// Name-keyed registry matching publishers with subscribers.
///
/// Create, lookup and removal serialize on the registry lock, so a key maps
/// to exactly one live stream object at any instant.
pub struct StreamBroker {
    streams: Mutex<HashMap<StreamKey, Arc<BrokerStream>>>,
}

impl StreamBroker {
    /// Create an empty broker
    pub fn new() -> Self {
        StreamBroker {
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a stream without creating it
    pub async fn get(&self, key: &StreamKey) -> Option<Arc<BrokerStream>> {
        self.streams.lock().await.get(key).cloned()
    }

    /// Resolve the stream a publisher will feed, creating it when absent
    pub async fn acquire_for_publish(&self, key: &StreamKey) -> Arc<BrokerStream> {
        let mut streams = self.streams.lock().await;
        streams
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(BrokerStream::new(key.clone(), StreamKind::Idle, 0.0))
            })
            .clone()
    }

    /// Resolve the stream a player asked for.
    ///
    /// An existing entry always resolves. A missing one is created only for
    /// live-then-vod starts (-2), where the player waits for a publisher;
    /// live-only (-1) and VOD offsets (>= 0) resolve to nothing unless a
    /// stream or registered VOD resource is present.
    pub async fn resolve_for_play(
        &self,
        key: &StreamKey,
        start: f64,
    ) -> Option<Arc<BrokerStream>> {
        let mut streams = self.streams.lock().await;

        if let Some(stream) = streams.get(key) {
            return Some(stream.clone());
        }

        if start <= PLAY_START_LIVE_THEN_VOD {
            let stream = Arc::new(BrokerStream::new(key.clone(), StreamKind::Idle, 0.0));
            streams.insert(key.clone(), stream.clone());
            return Some(stream);
        }

        None
    }

    /// Register an on-disk VOD resource under a key
    pub async fn register_vod(&self, key: &StreamKey, duration_ms: f64) -> Arc<BrokerStream> {
        let mut streams = self.streams.lock().await;
        let stream = Arc::new(BrokerStream::new(key.clone(), StreamKind::Vod, duration_ms));
        streams.insert(key.clone(), stream.clone());
        stream
    }

    /// Drop a stream nobody holds anymore
    pub async fn remove_if_idle(&self, key: &StreamKey) {
        let mut streams = self.streams.lock().await;
        if let Some(stream) = streams.get(key) {
            if stream.is_idle().await {
                streams.remove(key);
            }
        }
    }

    /// Evict a stream regardless of holders (admin path); its subscribers
    /// see their queues close
    pub async fn evict(&self, key: &StreamKey) -> Option<Arc<BrokerStream>> {
        self.streams.lock().await.remove(key)
    }

    /// Number of registered streams
    pub async fn len(&self) -> usize {
        self.streams.lock().await.len()
    }

    /// Check if the broker holds no streams
    pub async fn is_empty(&self) -> bool {
        self.streams.lock().await.is_empty()
    }
}

impl Default for StreamBroker {
    fn default() -> Self {
        StreamBroker::new()
    }
}
