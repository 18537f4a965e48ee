// Message types
pub const MSG_TYPE_SET_CHUNK_SIZE: u8 = 1;
pub const MSG_TYPE_ABORT: u8 = 2;
pub const MSG_TYPE_ACK: u8 = 3;
pub const MSG_TYPE_USER_CONTROL: u8 = 4;
pub const MSG_TYPE_WINDOW_ACK: u8 = 5;
pub const MSG_TYPE_SET_PEER_BW: u8 = 6;
pub const MSG_TYPE_AUDIO: u8 = 8;
pub const MSG_TYPE_VIDEO: u8 = 9;
pub const MSG_TYPE_DATA_AMF3: u8 = 15;
pub const MSG_TYPE_SHARED_OBJECT_AMF3: u8 = 16;
pub const MSG_TYPE_COMMAND_AMF3: u8 = 17;
pub const MSG_TYPE_DATA_AMF0: u8 = 18;
pub const MSG_TYPE_SHARED_OBJECT_AMF0: u8 = 19;
pub const MSG_TYPE_COMMAND_AMF0: u8 = 20;
pub const MSG_TYPE_AGGREGATE: u8 = 22;

// Chunk stream IDs used for outbound messages
pub const CHUNK_STREAM_PROTOCOL: u32 = 2;
pub const CHUNK_STREAM_COMMAND: u32 = 3;
pub const CHUNK_STREAM_AUDIO: u32 = 4;
pub const CHUNK_STREAM_VIDEO: u32 = 6;
pub const CHUNK_STREAM_DATA: u32 = 8;

// Chunk stream ID limits: 2-63 in one byte, 64-319 in two, 64-65599 in three
pub const CHUNK_STREAM_ID_MAX: u32 = 65599;

// Default values
pub const DEFAULT_CHUNK_SIZE: u32 = 128;
pub const DEFAULT_WINDOW_SIZE: u32 = 2_500_000;
pub const DEFAULT_PEER_BANDWIDTH: u32 = 2_500_000;

// Peer bandwidth limit types
pub const LIMIT_TYPE_HARD: u8 = 0;
pub const LIMIT_TYPE_SOFT: u8 = 1;
pub const LIMIT_TYPE_DYNAMIC: u8 = 2;

// Declared message length is a 3-byte field; anything claiming more is bogus
pub const MAX_MESSAGE_SIZE: usize = 0xFF_FFFF;

// Extended timestamp sentinel in the 3-byte timestamp field
pub const EXTENDED_TIMESTAMP: u32 = 0xFF_FFFF;

// Instance name used when the connect app carries no explicit instance
pub const DEFAULT_INSTANCE: &str = "_definst_";

// Play command start values
pub const PLAY_START_LIVE_THEN_VOD: f64 = -2.0;
pub const PLAY_START_LIVE_ONLY: f64 = -1.0;
