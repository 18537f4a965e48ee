/// AMF0 data types
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),             // 0x00
    Boolean(bool),           // 0x01
    String(String),          // 0x02
    Object(Amf0Object),      // 0x03
    Null,                    // 0x05
    Undefined,               // 0x06
    EcmaArray(Amf0Object),   // 0x08 (metadata maps)
    Array(Vec<Amf0Value>),   // 0x0A (strict array)
    Date(f64, i16),          // 0x0B
    LongString(String),      // 0x0C
}

// AMF0 type markers
pub mod markers {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0A;
    pub const DATE: u8 = 0x0B;
    pub const LONG_STRING: u8 = 0x0C;
    pub const UNSUPPORTED: u8 = 0x0D;
    pub const XML_DOCUMENT: u8 = 0x0F;
    pub const TYPED_OBJECT: u8 = 0x10;
}

/// Ordered key/value map for AMF0 objects and ECMA arrays.
///
/// Property order is preserved so that encoded command objects keep a stable
/// wire layout, which some RTMP clients depend on.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Amf0Object {
    entries: Vec<(String, Amf0Value)>,
}

impl Amf0Object {
    /// Create an empty object
    pub fn new() -> Self {
        Amf0Object {
            entries: Vec::new(),
        }
    }

    /// Insert or replace a property, keeping its original position on replace
    pub fn insert(&mut self, key: impl Into<String>, value: Amf0Value) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Insert and return self, for building literals
    pub fn with(mut self, key: impl Into<String>, value: Amf0Value) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a property by key
    pub fn get(&self, key: &str) -> Option<&Amf0Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Check if a property exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate properties in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Amf0Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if object has no properties
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Amf0Value)> for Amf0Object {
    fn from_iter<T: IntoIterator<Item = (String, Amf0Value)>>(iter: T) -> Self {
        let mut object = Amf0Object::new();
        for (key, value) in iter {
            object.insert(key, value);
        }
        object
    }
}

impl Amf0Value {
    /// Extract number value
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract string reference
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) | Amf0Value::LongString(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Extract boolean value
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract object reference
    pub fn as_object(&self) -> Option<&Amf0Object> {
        match self {
            Amf0Value::Object(obj) | Amf0Value::EcmaArray(obj) => Some(obj),
            _ => None,
        }
    }

    /// Extract array reference
    pub fn as_array(&self) -> Option<&Vec<Amf0Value>> {
        match self {
            Amf0Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Get property from object
    pub fn get_property(&self, key: &str) -> Option<&Amf0Value> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// Check if null or undefined
    pub fn is_null(&self) -> bool {
        matches!(self, Amf0Value::Null | Amf0Value::Undefined)
    }
}
