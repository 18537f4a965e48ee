use crate::amf::{decode_all, encode_all, Amf0Value};
use crate::protocol::constants::DEFAULT_INSTANCE;
use crate::protocol::status::StatusInfo;
use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct RtmpCommand {
    pub name: String,
    pub transaction_id: f64,
    pub command_object: Option<Amf0Value>,
    pub arguments: Vec<Amf0Value>,
}

impl RtmpCommand {
    /// Create new command
    pub fn new(name: impl Into<String>, transaction_id: f64) -> Self {
        RtmpCommand {
            name: name.into(),
            transaction_id,
            command_object: None,
            arguments: Vec::new(),
        }
    }

    /// Create `_result` response
    pub fn result(transaction_id: f64, properties: Amf0Value, information: Amf0Value) -> Self {
        let mut cmd = RtmpCommand::new("_result", transaction_id);
        cmd.command_object = Some(properties);
        cmd.arguments.push(information);
        cmd
    }

    /// Create `_error` response
    pub fn error(transaction_id: f64, information: Amf0Value) -> Self {
        let mut cmd = RtmpCommand::new("_error", transaction_id);
        cmd.command_object = Some(Amf0Value::Null);
        cmd.arguments.push(information);
        cmd
    }

    /// Create `onStatus` notification
    pub fn on_status(info: &StatusInfo) -> Self {
        let mut cmd = RtmpCommand::new("onStatus", 0.0);
        cmd.command_object = Some(Amf0Value::Null);
        cmd.arguments.push(info.to_amf());
        cmd
    }

    /// Encode command to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut values = Vec::with_capacity(3 + self.arguments.len());
        values.push(Amf0Value::String(self.name.clone()));
        values.push(Amf0Value::Number(self.transaction_id));
        values.push(match self.command_object {
            Some(ref obj) => obj.clone(),
            None => Amf0Value::Null,
        });
        values.extend(self.arguments.iter().cloned());

        encode_all(&values)
    }

    /// Decode command from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut values = decode_all(data)?.into_iter();

        let name = values
            .next()
            .and_then(|v| v.as_string().map(String::from))
            .ok_or_else(|| Error::command("Command name must be a string"))?;

        let transaction_id = values
            .next()
            .and_then(|v| v.as_number())
            .ok_or_else(|| Error::command("Transaction ID must be a number"))?;

        let command_object = values.next();
        let arguments = values.collect();

        Ok(RtmpCommand {
            name,
            transaction_id,
            command_object,
            arguments,
        })
    }

    /// Get a property of the command object
    pub fn object_property(&self, key: &str) -> Option<&Amf0Value> {
        self.command_object
            .as_ref()
            .and_then(|obj| obj.get_property(key))
    }

    /// Get a positional argument
    pub fn argument(&self, index: usize) -> Option<&Amf0Value> {
        self.arguments.get(index)
    }
}

/// Parsed `connect` arguments
#[derive(Debug, Clone)]
pub struct ConnectArgs {
    pub app: String,
    pub instance: String,
    pub tc_url: Option<String>,
    pub object_encoding: f64,
    pub flash_ver: Option<String>,
}

impl ConnectArgs {
    /// Pattern-match the connect command object into typed fields.
    ///
    /// The `app` string may carry an instance suffix (`app/inst`); the
    /// default instance is used when it does not.
    pub fn parse(command: &RtmpCommand) -> Result<Self> {
        let raw_app = command
            .object_property("app")
            .and_then(|v| v.as_string())
            .ok_or_else(|| Error::command("Missing app in connect"))?;

        let (app, instance) = match raw_app.split_once('/') {
            Some((app, instance)) if !instance.is_empty() => {
                (app.to_string(), instance.to_string())
            }
            _ => (
                raw_app.trim_end_matches('/').to_string(),
                DEFAULT_INSTANCE.to_string(),
            ),
        };

        if app.is_empty() {
            return Err(Error::command("Empty app in connect"));
        }

        let tc_url = command
            .object_property("tcUrl")
            .and_then(|v| v.as_string())
            .map(String::from);

        // Reject a tcUrl that does not parse as a URL at all; its contents are
        // otherwise informational
        if let Some(ref tc_url) = tc_url {
            url::Url::parse(tc_url)
                .map_err(|e| Error::command(format!("Invalid tcUrl: {}", e)))?;
        }

        let object_encoding = command
            .object_property("objectEncoding")
            .and_then(|v| v.as_number())
            .unwrap_or(0.0);

        let flash_ver = command
            .object_property("flashVer")
            .and_then(|v| v.as_string())
            .map(String::from);

        Ok(ConnectArgs {
            app,
            instance,
            tc_url,
            object_encoding,
            flash_ver,
        })
    }
}

/// Publish mode requested by the `publish` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishKind {
    Live,
    Record,
    Append,
}

impl PublishKind {
    pub fn is_recorded(&self) -> bool {
        matches!(self, PublishKind::Record | PublishKind::Append)
    }
}

/// Parsed `publish` arguments
#[derive(Debug, Clone)]
pub struct PublishArgs {
    pub name: String,
    pub kind: PublishKind,
}

impl PublishArgs {
    pub fn parse(command: &RtmpCommand) -> Result<Self> {
        let name = command
            .argument(0)
            .and_then(|v| v.as_string())
            .ok_or_else(|| Error::command("Missing publishing name"))?
            .to_string();

        if name.is_empty() {
            return Err(Error::command("Empty publishing name"));
        }

        let kind = match command.argument(1).and_then(|v| v.as_string()) {
            Some("record") => PublishKind::Record,
            Some("append") => PublishKind::Append,
            _ => PublishKind::Live,
        };

        Ok(PublishArgs { name, kind })
    }
}

/// Parsed `play` arguments
#[derive(Debug, Clone)]
pub struct PlayArgs {
    pub name: String,
    pub start: f64,
    pub duration: f64,
    pub reset: bool,
}

impl PlayArgs {
    pub fn parse(command: &RtmpCommand) -> Result<Self> {
        let name = command
            .argument(0)
            .and_then(|v| v.as_string())
            .ok_or_else(|| Error::command("Missing stream name"))?
            .to_string();

        if name.is_empty() {
            return Err(Error::command("Empty stream name"));
        }

        let start = command
            .argument(1)
            .and_then(|v| v.as_number())
            .unwrap_or(crate::protocol::constants::PLAY_START_LIVE_THEN_VOD);

        let duration = command
            .argument(2)
            .and_then(|v| v.as_number())
            .unwrap_or(-1.0);

        let reset = command
            .argument(3)
            .and_then(|v| v.as_boolean())
            .unwrap_or(false);

        Ok(PlayArgs {
            name,
            start,
            duration,
            reset,
        })
    }
}

/// Parsed `pause` arguments
#[derive(Debug, Clone, Copy)]
pub struct PauseArgs {
    pub pause: bool,
    pub milliseconds: f64,
}

impl PauseArgs {
    pub fn parse(command: &RtmpCommand) -> Result<Self> {
        let pause = command
            .argument(0)
            .and_then(|v| v.as_boolean())
            .ok_or_else(|| Error::command("Missing pause flag"))?;

        let milliseconds = command
            .argument(1)
            .and_then(|v| v.as_number())
            .unwrap_or(0.0);

        Ok(PauseArgs {
            pause,
            milliseconds,
        })
    }
}

/// Parsed `seek` arguments
#[derive(Debug, Clone, Copy)]
pub struct SeekArgs {
    pub milliseconds: f64,
}

impl SeekArgs {
    pub fn parse(command: &RtmpCommand) -> Result<Self> {
        let milliseconds = command
            .argument(0)
            .and_then(|v| v.as_number())
            .ok_or_else(|| Error::command("Missing seek offset"))?;

        Ok(SeekArgs { milliseconds })
    }
}

/// Parsed `receiveAudio`/`receiveVideo` argument
#[derive(Debug, Clone, Copy)]
pub struct ReceiveArgs {
    pub flag: bool,
}

impl ReceiveArgs {
    pub fn parse(command: &RtmpCommand) -> Result<Self> {
        let flag = command
            .argument(0)
            .and_then(|v| v.as_boolean())
            .ok_or_else(|| Error::command("Missing receive flag"))?;

        Ok(ReceiveArgs { flag })
    }
}
