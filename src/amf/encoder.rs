use crate::amf::amf0::{markers, Amf0Object, Amf0Value};
use crate::{ByteBuffer, Result};

pub struct Amf0Encoder {
    buffer: ByteBuffer,
}

impl Amf0Encoder {
    pub fn new() -> Self {
        Amf0Encoder {
            buffer: ByteBuffer::with_capacity(1024),
        }
    }

    pub fn encode(&mut self, value: &Amf0Value) -> Result<()> {
        match value {
            Amf0Value::Number(n) => self.encode_number(*n),
            Amf0Value::Boolean(b) => self.encode_boolean(*b),
            Amf0Value::String(s) => self.encode_string(s),
            Amf0Value::Object(obj) => self.encode_object(obj),
            Amf0Value::Null => self.encode_marker(markers::NULL),
            Amf0Value::Undefined => self.encode_marker(markers::UNDEFINED),
            Amf0Value::EcmaArray(obj) => self.encode_ecma_array(obj),
            Amf0Value::Array(arr) => self.encode_array(arr),
            Amf0Value::Date(timestamp, timezone) => self.encode_date(*timestamp, *timezone),
            Amf0Value::LongString(s) => self.encode_long_string(s),
        }
    }

    fn encode_marker(&mut self, marker: u8) -> Result<()> {
        self.buffer.write_u8(marker)?;
        Ok(())
    }

    fn encode_number(&mut self, value: f64) -> Result<()> {
        self.buffer.write_u8(markers::NUMBER)?;
        self.buffer.write_f64_be(value)?;
        Ok(())
    }

    fn encode_boolean(&mut self, value: bool) -> Result<()> {
        self.buffer.write_u8(markers::BOOLEAN)?;
        self.buffer.write_u8(if value { 1 } else { 0 })?;
        Ok(())
    }

    fn encode_string(&mut self, value: &str) -> Result<()> {
        self.buffer.write_u8(markers::STRING)?;
        self.write_string_no_marker(value)?;
        Ok(())
    }

    fn encode_object(&mut self, obj: &Amf0Object) -> Result<()> {
        self.buffer.write_u8(markers::OBJECT)?;
        self.encode_properties(obj)?;
        Ok(())
    }

    fn encode_ecma_array(&mut self, obj: &Amf0Object) -> Result<()> {
        self.buffer.write_u8(markers::ECMA_ARRAY)?;
        self.buffer.write_u32_be(obj.len() as u32)?;
        self.encode_properties(obj)?;
        Ok(())
    }

    fn encode_properties(&mut self, obj: &Amf0Object) -> Result<()> {
        for (key, value) in obj.iter() {
            self.write_string_no_marker(key)?;
            self.encode(value)?;
        }
        // Object end marker
        self.buffer.write_u16_be(0)?;
        self.buffer.write_u8(markers::OBJECT_END)?;
        Ok(())
    }

    fn encode_array(&mut self, arr: &[Amf0Value]) -> Result<()> {
        self.buffer.write_u8(markers::STRICT_ARRAY)?;
        self.buffer.write_u32_be(arr.len() as u32)?;
        for value in arr {
            self.encode(value)?;
        }
        Ok(())
    }

    fn encode_date(&mut self, timestamp: f64, timezone: i16) -> Result<()> {
        self.buffer.write_u8(markers::DATE)?;
        self.buffer.write_f64_be(timestamp)?;
        self.buffer.write_i16_be(timezone)?;
        Ok(())
    }

    fn encode_long_string(&mut self, value: &str) -> Result<()> {
        self.buffer.write_u8(markers::LONG_STRING)?;
        let bytes = value.as_bytes();
        self.buffer.write_u32_be(bytes.len() as u32)?;
        self.buffer.write_bytes(bytes)?;
        Ok(())
    }

    /// Helper to write string without type marker (for object keys)
    fn write_string_no_marker(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        self.buffer.write_u16_be(bytes.len() as u16)?;
        self.buffer.write_bytes(bytes)?;
        Ok(())
    }

    pub fn get_bytes(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Amf0Encoder::new()
    }
}

/// Encode a sequence of AMF0 values into one message payload
pub fn encode_all(values: &[Amf0Value]) -> Result<Vec<u8>> {
    let mut encoder = Amf0Encoder::new();
    for value in values {
        encoder.encode(value)?;
    }
    Ok(encoder.get_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_layout() {
        let mut encoder = Amf0Encoder::new();
        encoder.encode(&Amf0Value::Number(1.0)).unwrap();

        let bytes = encoder.get_bytes();
        assert_eq!(bytes[0], markers::NUMBER);
        assert_eq!(&bytes[1..], &1.0f64.to_be_bytes());
    }

    #[test]
    fn test_string_layout() {
        let mut encoder = Amf0Encoder::new();
        encoder
            .encode(&Amf0Value::String("cam".to_string()))
            .unwrap();

        assert_eq!(encoder.get_bytes(), vec![0x02, 0x00, 0x03, b'c', b'a', b'm']);
    }

    #[test]
    fn test_object_end_marker() {
        let mut encoder = Amf0Encoder::new();
        encoder
            .encode(&Amf0Value::Object(Amf0Object::new()))
            .unwrap();

        assert_eq!(encoder.get_bytes(), vec![0x03, 0x00, 0x00, 0x09]);
    }
}
