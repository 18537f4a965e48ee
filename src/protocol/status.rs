use crate::amf::{Amf0Object, Amf0Value};

// Status levels
pub const LEVEL_STATUS: &str = "status";
pub const LEVEL_ERROR: &str = "error";
pub const LEVEL_WARNING: &str = "warning";

// NetConnection codes
pub const NC_CONNECT_SUCCESS: &str = "NetConnection.Connect.Success";
pub const NC_CONNECT_REJECTED: &str = "NetConnection.Connect.Rejected";
pub const NC_CONNECT_FAILED: &str = "NetConnection.Connect.Failed";
pub const NC_CONNECT_CLOSED: &str = "NetConnection.Connect.Closed";

// NetStream publish codes
pub const NS_PUBLISH_START: &str = "NetStream.Publish.Start";
pub const NS_PUBLISH_BADNAME: &str = "NetStream.Publish.BadName";
pub const NS_PUBLISH_FAILED: &str = "NetStream.Publish.Failed";

// NetStream play codes
pub const NS_PLAY_RESET: &str = "NetStream.Play.Reset";
pub const NS_PLAY_START: &str = "NetStream.Play.Start";
pub const NS_PLAY_STOP: &str = "NetStream.Play.Stop";
pub const NS_PLAY_STREAM_NOT_FOUND: &str = "NetStream.Play.StreamNotFound";
pub const NS_PLAY_FAILED: &str = "NetStream.Play.Failed";
pub const NS_PLAY_UNPUBLISH_NOTIFY: &str = "NetStream.Play.UnpublishNotify";
pub const NS_PLAY_INSUFFICIENT_BW: &str = "NetStream.Play.InsufficientBW";

// NetStream pause/seek codes
pub const NS_PAUSE_NOTIFY: &str = "NetStream.Pause.Notify";
pub const NS_UNPAUSE_NOTIFY: &str = "NetStream.Unpause.Notify";
pub const NS_SEEK_NOTIFY: &str = "NetStream.Seek.Notify";
pub const NS_SEEK_INVALID_TIME: &str = "NetStream.Seek.InvalidTime";
pub const NS_SEEK_FAILED: &str = "NetStream.Seek.Failed";

// NetStream record codes
pub const NS_RECORD_START: &str = "NetStream.Record.Start";
pub const NS_RECORD_STOP: &str = "NetStream.Record.Stop";
pub const NS_RECORD_NO_ACCESS: &str = "NetStream.Record.NoAccess";
pub const NS_RECORD_FAILED: &str = "NetStream.Record.Failed";

/// Info object carried by `onStatus` and `_result`/`_error` replies
#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub level: String,
    pub code: String,
    pub description: String,
    pub details: Option<String>,
    pub client_id: Option<String>,
}

impl StatusInfo {
    /// Create a status-level info
    pub fn status(code: &str, description: impl Into<String>) -> Self {
        StatusInfo {
            level: LEVEL_STATUS.to_string(),
            code: code.to_string(),
            description: description.into(),
            details: None,
            client_id: None,
        }
    }

    /// Create an error-level info
    pub fn error(code: &str, description: impl Into<String>) -> Self {
        StatusInfo {
            level: LEVEL_ERROR.to_string(),
            code: code.to_string(),
            description: description.into(),
            details: None,
            client_id: None,
        }
    }

    /// Create a warning-level info
    pub fn warning(code: &str, description: impl Into<String>) -> Self {
        StatusInfo {
            level: LEVEL_WARNING.to_string(),
            code: code.to_string(),
            description: description.into(),
            details: None,
            client_id: None,
        }
    }

    /// Attach a details string
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attach the client id of the session the status refers to
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Build the AMF info object
    pub fn to_amf(&self) -> Amf0Value {
        let mut object = Amf0Object::new()
            .with("level", Amf0Value::String(self.level.clone()))
            .with("code", Amf0Value::String(self.code.clone()))
            .with("description", Amf0Value::String(self.description.clone()));

        if let Some(ref details) = self.details {
            object.insert("details", Amf0Value::String(details.clone()));
        }
        if let Some(ref client_id) = self.client_id {
            object.insert("clientid", Amf0Value::String(client_id.clone()));
        }

        Amf0Value::Object(object)
    }

    /// True for error-level statuses
    pub fn is_error(&self) -> bool {
        self.level == LEVEL_ERROR
    }
}
