use std::sync::Arc;

/// A published audio or video frame
#[derive(Debug, Clone)]
pub struct MediaFrame {
    /// Source timestamp, preserved end to end
    pub timestamp: u32,

    /// Raw message payload including the tag header bytes
    pub payload: Vec<u8>,

    /// Codec configuration frame (AAC/AVC sequence header)
    pub is_config: bool,

    /// Video keyframe
    pub is_keyframe: bool,
}

impl MediaFrame {
    /// Classify an audio payload
    pub fn audio(timestamp: u32, payload: Vec<u8>) -> Self {
        let is_config = is_aac_sequence_header(&payload);
        MediaFrame {
            timestamp,
            payload,
            is_config,
            is_keyframe: false,
        }
    }

    /// Classify a video payload
    pub fn video(timestamp: u32, payload: Vec<u8>) -> Self {
        let is_config = is_avc_sequence_header(&payload);
        let is_keyframe = is_video_keyframe(&payload);
        MediaFrame {
            timestamp,
            payload,
            is_config,
            is_keyframe,
        }
    }
}

/// Events flowing from a stream to its subscribers.
///
/// The set of event families is closed; subscribers match on the variant
/// instead of registering per-family listeners.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A data frame (`onMetaData` and friends); the payload is the full
    /// encoded data message starting with the handler name
    Data {
        handler: String,
        payload: Arc<Vec<u8>>,
    },

    /// A retained data frame was removed
    ClearData { handler: String },

    /// Audio frame
    Audio(Arc<MediaFrame>),

    /// Video frame
    Video(Arc<MediaFrame>),

    /// A publisher took the stream's source slot
    PublishStart,

    /// The publisher released the stream; subscribers stay attached and
    /// wait for a republish
    Unpublish,
}

impl StreamEvent {
    /// True for events the overflow drop policy may never discard. The
    /// latest keyframe is additionally kept by the queue itself; older
    /// keyframes in a backlog are ordinary shed targets.
    pub fn is_protected(&self) -> bool {
        match self {
            StreamEvent::Audio(frame) | StreamEvent::Video(frame) => frame.is_config,
            _ => true,
        }
    }

    /// True for a keyframe video frame that is not a codec header
    pub fn is_keyframe_video(&self) -> bool {
        matches!(self, StreamEvent::Video(frame) if frame.is_keyframe && !frame.is_config)
    }
}

/// AAC sequence header: sound format 10, packet type 0
pub fn is_aac_sequence_header(data: &[u8]) -> bool {
    data.len() >= 2 && (data[0] >> 4) == 10 && data[1] == 0
}

/// AVC sequence header: keyframe + AVC codec id, packet type 0
pub fn is_avc_sequence_header(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x17 && data[1] == 0
}

/// Video keyframe: frame type 1 in the tag header
pub fn is_video_keyframe(data: &[u8]) -> bool {
    !data.is_empty() && (data[0] >> 4) == 1
}
