use crate::amf::amf0::{markers, Amf0Object, Amf0Value};
use crate::{ByteBuffer, Error, Result};

pub struct Amf0Decoder<'a> {
    buffer: &'a mut ByteBuffer,
}

impl<'a> Amf0Decoder<'a> {
    pub fn new(buffer: &'a mut ByteBuffer) -> Self {
        Amf0Decoder { buffer }
    }

    /// Check if decoder has remaining data to decode
    pub fn has_remaining(&self) -> bool {
        self.buffer.remaining() > 0
    }

    pub fn decode(&mut self) -> Result<Amf0Value> {
        let marker = self.buffer.read_u8()?;
        match marker {
            markers::NUMBER => self.decode_number(),
            markers::BOOLEAN => self.decode_boolean(),
            markers::STRING => self.decode_string(),
            markers::OBJECT => Ok(Amf0Value::Object(self.decode_properties()?)),
            markers::NULL => Ok(Amf0Value::Null),
            markers::UNDEFINED => Ok(Amf0Value::Undefined),
            markers::ECMA_ARRAY => self.decode_ecma_array(),
            markers::STRICT_ARRAY => self.decode_strict_array(),
            markers::DATE => self.decode_date(),
            markers::LONG_STRING => self.decode_long_string(),
            // Legacy markers some encoders still emit; folded into the closest
            // supported shape rather than failing the whole command.
            markers::UNSUPPORTED => Ok(Amf0Value::Null),
            markers::XML_DOCUMENT => self.decode_long_string(),
            markers::TYPED_OBJECT => self.decode_typed_object(),
            _ => Err(Error::amf(format!("Unknown AMF0 marker: 0x{:02x}", marker))),
        }
    }

    fn decode_number(&mut self) -> Result<Amf0Value> {
        let value = self.buffer.read_f64_be()?;
        Ok(Amf0Value::Number(value))
    }

    fn decode_boolean(&mut self) -> Result<Amf0Value> {
        let value = self.buffer.read_u8()? != 0;
        Ok(Amf0Value::Boolean(value))
    }

    fn decode_string(&mut self) -> Result<Amf0Value> {
        let len = self.buffer.read_u16_be()? as usize;
        let bytes = self.buffer.read_bytes(len)?;
        let string = String::from_utf8(bytes)
            .map_err(|e| Error::amf(format!("Invalid UTF-8 in string: {}", e)))?;
        Ok(Amf0Value::String(string))
    }

    fn decode_properties(&mut self) -> Result<Amf0Object> {
        let mut object = Amf0Object::new();
        loop {
            let name_len = self.buffer.read_u16_be()? as usize;
            if name_len == 0 {
                self.buffer.read_u8()?; // Object end marker
                break;
            }
            let name = String::from_utf8(self.buffer.read_bytes(name_len)?)
                .map_err(|e| Error::amf(format!("Invalid UTF-8 in property name: {}", e)))?;
            let value = self.decode()?;
            object.insert(name, value);
        }
        Ok(object)
    }

    fn decode_ecma_array(&mut self) -> Result<Amf0Value> {
        let _count = self.buffer.read_u32_be()?; // Advisory count, terminator is authoritative
        Ok(Amf0Value::EcmaArray(self.decode_properties()?))
    }

    fn decode_strict_array(&mut self) -> Result<Amf0Value> {
        let count = self.buffer.read_u32_be()? as usize;
        let mut array = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            array.push(self.decode()?);
        }
        Ok(Amf0Value::Array(array))
    }

    fn decode_date(&mut self) -> Result<Amf0Value> {
        let timestamp = self.buffer.read_f64_be()?;
        let timezone = self.buffer.read_i16_be()?;
        Ok(Amf0Value::Date(timestamp, timezone))
    }

    fn decode_long_string(&mut self) -> Result<Amf0Value> {
        let len = self.buffer.read_u32_be()? as usize;
        let bytes = self.buffer.read_bytes(len)?;
        let string = String::from_utf8(bytes)
            .map_err(|e| Error::amf(format!("Invalid UTF-8 in long string: {}", e)))?;
        Ok(Amf0Value::LongString(string))
    }

    fn decode_typed_object(&mut self) -> Result<Amf0Value> {
        // Class name is dropped; the property map is all the server needs
        let class_name_len = self.buffer.read_u16_be()? as usize;
        self.buffer.read_bytes(class_name_len)?;
        Ok(Amf0Value::Object(self.decode_properties()?))
    }
}

/// Decode a full sequence of AMF0 values from a message payload
pub fn decode_all(data: &[u8]) -> Result<Vec<Amf0Value>> {
    let mut buffer = ByteBuffer::new(data.to_vec());
    let mut decoder = Amf0Decoder::new(&mut buffer);

    let mut values = Vec::new();
    while decoder.has_remaining() {
        values.push(decoder.decode()?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::Amf0Encoder;

    fn round_trip(value: &Amf0Value) -> Amf0Value {
        let mut encoder = Amf0Encoder::new();
        encoder.encode(value).unwrap();
        let values = decode_all(&encoder.get_bytes()).unwrap();
        assert_eq!(values.len(), 1);
        values.into_iter().next().unwrap()
    }

    #[test]
    fn test_scalar_round_trips() {
        assert_eq!(round_trip(&Amf0Value::Number(2.5)), Amf0Value::Number(2.5));
        assert_eq!(
            round_trip(&Amf0Value::Boolean(true)),
            Amf0Value::Boolean(true)
        );
        assert_eq!(
            round_trip(&Amf0Value::String("cam".to_string())),
            Amf0Value::String("cam".to_string())
        );
        assert_eq!(round_trip(&Amf0Value::Null), Amf0Value::Null);
    }

    #[test]
    fn test_object_round_trip_preserves_order() {
        let object = Amf0Value::Object(
            Amf0Object::new()
                .with("app", Amf0Value::String("live".to_string()))
                .with("tcUrl", Amf0Value::String("rtmp://host/live".to_string()))
                .with("objectEncoding", Amf0Value::Number(0.0)),
        );

        let decoded = round_trip(&object);
        let keys: Vec<String> = decoded
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, _)| k.to_string())
            .collect();
        assert_eq!(keys, vec!["app", "tcUrl", "objectEncoding"]);
    }

    #[test]
    fn test_ecma_array_round_trip() {
        let array = Amf0Value::EcmaArray(
            Amf0Object::new()
                .with("width", Amf0Value::Number(1280.0))
                .with("height", Amf0Value::Number(720.0)),
        );

        let decoded = round_trip(&array);
        assert_eq!(
            decoded.get_property("width").and_then(|v| v.as_number()),
            Some(1280.0)
        );
    }

    #[test]
    fn test_unknown_marker_fails() {
        assert!(decode_all(&[0x42]).is_err());
    }
}
