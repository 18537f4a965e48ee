use crate::amf::{decode_all, encode_all, Amf0Object, Amf0Value};
use crate::{Error, Result};

pub const SET_DATA_FRAME: &str = "@setDataFrame";
pub const CLEAR_DATA_FRAME: &str = "@clearDataFrame";
pub const ON_METADATA: &str = "onMetaData";
pub const SAMPLE_ACCESS: &str = "|RtmpSampleAccess";

#[derive(Debug, Clone)]
pub struct RtmpData {
    pub handler: String,
    pub values: Vec<Amf0Value>,
}

impl RtmpData {
    /// Create new data message
    pub fn new(handler: impl Into<String>) -> Self {
        RtmpData {
            handler: handler.into(),
            values: Vec::new(),
        }
    }

    /// Create onMetaData message
    pub fn on_metadata(metadata: Amf0Object) -> Self {
        let mut data = RtmpData::new(ON_METADATA);
        data.values.push(Amf0Value::EcmaArray(metadata));
        data
    }

    /// Create the `|RtmpSampleAccess` message sent to players before playback
    pub fn sample_access(audio: bool, video: bool) -> Self {
        let mut data = RtmpData::new(SAMPLE_ACCESS);
        data.values.push(Amf0Value::Boolean(audio));
        data.values.push(Amf0Value::Boolean(video));
        data
    }

    /// Encode data message to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut values = Vec::with_capacity(1 + self.values.len());
        values.push(Amf0Value::String(self.handler.clone()));
        values.extend(self.values.iter().cloned());
        encode_all(&values)
    }

    /// Decode data message from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut values = decode_all(data)?.into_iter();

        let handler = values
            .next()
            .and_then(|v| v.as_string().map(String::from))
            .ok_or_else(|| Error::command("Data handler must be a string"))?;

        Ok(RtmpData {
            handler,
            values: values.collect(),
        })
    }

    /// True for `@setDataFrame` wrappers
    pub fn is_set_data_frame(&self) -> bool {
        self.handler == SET_DATA_FRAME
    }

    /// True for `@clearDataFrame` wrappers
    pub fn is_clear_data_frame(&self) -> bool {
        self.handler == CLEAR_DATA_FRAME
    }

    /// Unwrap a `@setDataFrame(handler, object)` call into the retained form:
    /// the inner handler name and the re-encoded `handler, object` payload
    pub fn unwrap_set_data_frame(&self) -> Result<(String, Vec<u8>)> {
        let inner = self
            .values
            .first()
            .and_then(|v| v.as_string())
            .ok_or_else(|| Error::command("@setDataFrame without handler name"))?
            .to_string();

        let mut values = vec![Amf0Value::String(inner.clone())];
        values.extend(self.values.iter().skip(1).cloned());

        Ok((inner, encode_all(&values)?))
    }

    /// Handler name of a `@clearDataFrame(handler)` call
    pub fn unwrap_clear_data_frame(&self) -> Result<String> {
        self.values
            .first()
            .and_then(|v| v.as_string())
            .map(String::from)
            .ok_or_else(|| Error::command("@clearDataFrame without handler name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_round_trip() {
        let metadata = Amf0Object::new()
            .with("width", Amf0Value::Number(1280.0))
            .with("height", Amf0Value::Number(720.0));
        let original = RtmpData::on_metadata(metadata);

        let decoded = RtmpData::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded.handler, ON_METADATA);
        assert_eq!(
            decoded.values[0]
                .get_property("width")
                .and_then(|v| v.as_number()),
            Some(1280.0)
        );
    }

    #[test]
    fn test_unwrap_set_data_frame() {
        let mut wrapper = RtmpData::new(SET_DATA_FRAME);
        wrapper
            .values
            .push(Amf0Value::String(ON_METADATA.to_string()));
        wrapper.values.push(Amf0Value::EcmaArray(
            Amf0Object::new().with("duration", Amf0Value::Number(0.0)),
        ));

        assert!(wrapper.is_set_data_frame());
        let (handler, payload) = wrapper.unwrap_set_data_frame().unwrap();
        assert_eq!(handler, ON_METADATA);

        // The retained payload decodes as a plain data message
        let retained = RtmpData::decode(&payload).unwrap();
        assert_eq!(retained.handler, ON_METADATA);
        assert_eq!(
            retained.values[0]
                .get_property("duration")
                .and_then(|v| v.as_number()),
            Some(0.0)
        );
    }

    #[test]
    fn test_sample_access() {
        let data = RtmpData::sample_access(true, true);
        let decoded = RtmpData::decode(&data.encode().unwrap()).unwrap();
        assert_eq!(decoded.handler, SAMPLE_ACCESS);
        assert_eq!(decoded.values[0].as_boolean(), Some(true));
        assert_eq!(decoded.values[1].as_boolean(), Some(true));
    }
}
