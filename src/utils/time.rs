use std::time::{SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds, truncated to the RTMP clock width
pub fn current_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System time before UNIX epoch")
        .as_millis() as u32
}
