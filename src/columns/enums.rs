//! `Enum8` / `Enum16` column codecs.
//!
//! An enum column is an 8- or 16-bit integer column plus the declaration
//! table from the type string (`Enum8('ok' = 0, 'happy' = 1)`). How a wire
//! value maps to a caller-visible value is configurable: by declared key, by
//! name, or by positional ordinal — and encoding mirrors whichever strategy
//! is active.

use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use crate::columns::fixed::{le_array, FixedSpec};
use crate::config::EnumResolution;
use crate::error::CodecError;
use crate::value::Value;

//==================================================================================
// I. Declaration table
//==================================================================================

/// The declared key -> name entries, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValues {
    entries: Vec<(i32, String)>,
}

impl EnumValues {
    pub fn new(entries: Vec<(i32, String)>) -> Self {
        EnumValues { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn name_for_key(&self, key: i32) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, name)| name.as_str())
    }

    fn name_at(&self, ordinal: usize) -> Option<&str> {
        self.entries.get(ordinal).map(|(_, name)| name.as_str())
    }

    fn key_for_name(&self, name: &str) -> Option<i32> {
        self.entries
            .iter()
            .find(|(_, n)| n == name)
            .map(|(k, _)| *k)
    }

    fn ordinal_of_name(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(_, n)| n == name)
    }

    fn contains_key(&self, key: i32) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    fn valid_names(&self) -> String {
        let names: Vec<&str> = self.entries.iter().map(|(_, n)| n.as_str()).collect();
        names.join(", ")
    }
}

/// Parses the declaration list out of an `Enum8(...)`/`Enum16(...)` spec.
/// Names are single-quoted; keys may be negative.
pub(crate) fn parse_enum_values(spec: &str) -> Result<EnumValues, CodecError> {
    let open = spec.find('(').ok_or_else(|| {
        CodecError::MalformedPayload(format!("enum spec '{}' has no declaration list", spec))
    })?;
    let body = spec[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| CodecError::MalformedPayload(format!("enum spec '{}' is unterminated", spec)))?;

    let mut entries = Vec::new();
    let mut rest = body.trim();
    while !rest.is_empty() {
        rest = rest
            .strip_prefix('\'')
            .ok_or_else(|| bad_entry(spec))?;
        let quote = rest.find('\'').ok_or_else(|| bad_entry(spec))?;
        let name = &rest[..quote];
        rest = rest[quote + 1..].trim_start();
        rest = rest.strip_prefix('=').ok_or_else(|| bad_entry(spec))?.trim_start();
        let end = rest
            .find(|c: char| c != '-' && !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let key: i32 = rest[..end]
            .parse()
            .map_err(|_| bad_entry(spec))?;
        entries.push((key, name.to_string()));
        rest = rest[end..].trim_start();
        rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }
    if entries.is_empty() {
        return Err(CodecError::MalformedPayload(format!(
            "enum spec '{}' declares no entries",
            spec
        )));
    }
    Ok(EnumValues::new(entries))
}

fn bad_entry(spec: &str) -> CodecError {
    CodecError::MalformedPayload(format!("malformed enum declaration in '{}'", spec))
}

//==================================================================================
// II. Spec
//==================================================================================

#[derive(Clone)]
pub(crate) struct EnumSpec<T> {
    pub(crate) values: Arc<EnumValues>,
    pub(crate) resolution: EnumResolution,
    pub(crate) _elem: std::marker::PhantomData<T>,
}

impl<T> EnumSpec<T> {
    pub(crate) fn new(values: Arc<EnumValues>, resolution: EnumResolution) -> Self {
        EnumSpec {
            values,
            resolution,
            _elem: std::marker::PhantomData,
        }
    }

    fn resolve_wire_key(&self, key: i32) -> Result<Value, CodecError> {
        match self.resolution {
            EnumResolution::Key => Ok(Value::Int32(key)),
            EnumResolution::Name => self
                .values
                .name_for_key(key)
                .map(Value::from)
                .ok_or_else(|| {
                    CodecError::MalformedPayload(format!(
                        "enum key {} is not declared; valid names: {}",
                        key,
                        self.values.valid_names()
                    ))
                }),
            EnumResolution::Ordinal => {
                let ordinal = usize::try_from(key).ok().and_then(|o| self.values.name_at(o));
                ordinal.map(Value::from).ok_or_else(|| {
                    CodecError::MalformedPayload(format!(
                        "enum ordinal {} is out of range; valid names: {}",
                        key,
                        self.values.valid_names()
                    ))
                })
            }
        }
    }

    fn wire_key_for(&self, val: &Value) -> Result<i32, String> {
        match val {
            Value::String(_) | Value::Bytes(_) => {
                let name = val
                    .as_str()
                    .ok_or_else(|| format!("enum name is not valid text: {:?}", val))?;
                match self.resolution {
                    EnumResolution::Ordinal => self
                        .values
                        .ordinal_of_name(name)
                        .map(|o| o as i32),
                    EnumResolution::Key | EnumResolution::Name => self.values.key_for_name(name),
                }
                .ok_or_else(|| {
                    format!(
                        "'{}' is not a declared enum name; valid names: {}",
                        name,
                        self.values.valid_names()
                    )
                })
            }
            other => {
                let key = other
                    .as_i64()
                    .ok_or_else(|| format!("expected an enum name or key, got {:?}", other))?;
                let key = i32::try_from(key).map_err(|_| format!("enum key {} is out of range", key))?;
                let known = match self.resolution {
                    EnumResolution::Ordinal => (key as usize) < self.values.len() && key >= 0,
                    EnumResolution::Key | EnumResolution::Name => self.values.contains_key(key),
                };
                if !known {
                    return Err(format!(
                        "enum key {} is not declared; valid names: {}",
                        key,
                        self.values.valid_names()
                    ));
                }
                Ok(key)
            }
        }
    }
}

macro_rules! impl_enum_spec {
    ($elem:ty, $width:expr) => {
        impl FixedSpec for EnumSpec<$elem> {
            type Elem = $elem;

            const WIDTH: usize = $width;

            fn decode_elem(&self, chunk: &[u8]) -> $elem {
                <$elem>::from_le_bytes(le_array(chunk))
            }

            fn encode_elem(&self, elem: $elem, sink: &mut BytesMut) {
                sink.put_slice(&elem.to_le_bytes());
            }

            fn to_value(&self, elem: $elem) -> Result<Value, CodecError> {
                self.resolve_wire_key(elem as i32)
            }

            fn from_value(&self, val: &Value) -> Result<$elem, String> {
                let key = self.wire_key_for(val)?;
                <$elem>::try_from(key).map_err(|_| format!("enum key {} exceeds the wire width", key))
            }

            fn null_elem(&self) -> $elem {
                0
            }

            fn null_value(&self) -> Value {
                // Key 0 need not be declared, so the representative is the raw key.
                Value::Int32(0)
            }
        }
    };
}

impl_enum_spec!(i8, 1);
impl_enum_spec!(i16, 2);
