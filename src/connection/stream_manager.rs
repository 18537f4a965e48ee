use std::collections::HashMap;

use crate::connection::net_stream::NetStream;
use crate::{Error, Result};

/// Per-connection NetStream table. Stream id 0 addresses the connection
/// itself and is never allocated.
pub struct StreamManager {
    next_stream_id: u32,
    streams: HashMap<u32, NetStream>,
}

impl StreamManager {
    /// Create an empty table
    pub fn new() -> Self {
        StreamManager {
            next_stream_id: 1,
            streams: HashMap::new(),
        }
    }

    /// Allocate the next stream id and create its NetStream
    pub fn create_stream(&mut self) -> u32 {
        let id = self.next_stream_id;
        self.next_stream_id += 1;
        self.streams.insert(id, NetStream::new(id));
        id
    }

    /// Get a stream by id
    pub fn get(&self, id: u32) -> Option<&NetStream> {
        self.streams.get(&id)
    }

    /// Get a stream mutably by id
    pub fn get_mut(&mut self, id: u32) -> Option<&mut NetStream> {
        self.streams.get_mut(&id)
    }

    /// Remove a stream, releasing its id slot
    pub fn remove(&mut self, id: u32) -> Result<NetStream> {
        if id == 0 {
            return Err(Error::stream("Stream id 0 is the connection itself"));
        }
        self.streams
            .remove(&id)
            .ok_or_else(|| Error::stream(format!("Stream {} not found", id)))
    }

    /// Drain every stream, for connection teardown
    pub fn take_all(&mut self) -> Vec<NetStream> {
        self.streams.drain().map(|(_, stream)| stream).collect()
    }

    /// Number of active streams
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Check if no streams exist
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl Default for StreamManager {
    fn default() -> Self {
        StreamManager::new()
    }
}
