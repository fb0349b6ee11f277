//! Serde deserializer over merged request fields.
//!
//! Text values (query, form, header, path) carry no type of their own, so
//! they are parsed when the target asks for a concrete scalar. JSON values
//! are handed to `serde_json` unchanged.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{
    self, value::MapDeserializer, value::SeqDeserializer, value::StringDeserializer,
    Deserializer as _, IntoDeserializer, Visitor,
};
use serde::forward_to_deserialize_any;
use serde_json::Value;

/// Error produced while deserializing merged fields into the target.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct FieldError(String);

impl de::Error for FieldError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        FieldError(msg.to_string())
    }
}

/// A single merged field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// One or more raw strings (repeated query keys keep every value).
    Text(Vec<String>),
    Json(Value),
}

/// The merged top-level object handed to the target's `Deserialize` impl.
pub(crate) struct FieldsDeserializer(pub(crate) BTreeMap<String, FieldValue>);

impl<'de> de::Deserializer<'de> for FieldsDeserializer {
    type Error = FieldError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_map(MapDeserializer::new(self.0.into_iter()))
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

impl<'de> IntoDeserializer<'de, FieldError> for FieldValue {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

macro_rules! dispatch {
    ($($method:ident)*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            match self {
                FieldValue::Json(value) => value.$method(visitor).map_err(de::Error::custom),
                FieldValue::Text(values) => TextValues(values).$method(visitor),
            }
        }
    )*};
}

impl<'de> de::Deserializer<'de> for FieldValue {
    type Error = FieldError;

    dispatch! {
        deserialize_any deserialize_bool deserialize_i8 deserialize_i16 deserialize_i32
        deserialize_i64 deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64
        deserialize_f32 deserialize_f64 deserialize_char deserialize_str deserialize_string
        deserialize_bytes deserialize_byte_buf deserialize_option deserialize_unit
        deserialize_seq deserialize_map deserialize_identifier deserialize_ignored_any
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            FieldValue::Json(value) => value
                .deserialize_unit_struct(name, visitor)
                .map_err(de::Error::custom),
            FieldValue::Text(values) => TextValues(values).deserialize_unit_struct(name, visitor),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            FieldValue::Json(value) => value
                .deserialize_newtype_struct(name, visitor)
                .map_err(de::Error::custom),
            FieldValue::Text(values) => {
                TextValues(values).deserialize_newtype_struct(name, visitor)
            }
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            FieldValue::Json(value) => value
                .deserialize_tuple(len, visitor)
                .map_err(de::Error::custom),
            FieldValue::Text(values) => TextValues(values).deserialize_tuple(len, visitor),
        }
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            FieldValue::Json(value) => value
                .deserialize_tuple_struct(name, len, visitor)
                .map_err(de::Error::custom),
            FieldValue::Text(values) => {
                TextValues(values).deserialize_tuple_struct(name, len, visitor)
            }
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            FieldValue::Json(value) => value
                .deserialize_struct(name, fields, visitor)
                .map_err(de::Error::custom),
            FieldValue::Text(values) => {
                TextValues(values).deserialize_struct(name, fields, visitor)
            }
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self {
            FieldValue::Json(value) => value
                .deserialize_enum(name, variants, visitor)
                .map_err(de::Error::custom),
            FieldValue::Text(values) => {
                TextValues(values).deserialize_enum(name, variants, visitor)
            }
        }
    }
}

/// Raw strings for one key.
struct TextValues(Vec<String>);

impl TextValues {
    fn first(self) -> Result<String, FieldError> {
        self.0
            .into_iter()
            .next()
            .ok_or_else(|| de::Error::custom("missing value"))
    }

    fn into_seq(self) -> SeqDeserializer<std::vec::IntoIter<FieldValue>, FieldError> {
        let items: Vec<FieldValue> = self
            .0
            .into_iter()
            .map(|v| FieldValue::Text(vec![v]))
            .collect();
        SeqDeserializer::new(items.into_iter())
    }
}

fn parse_bool(raw: &str) -> Result<bool, FieldError> {
    match raw {
        "" | "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        other => Err(de::Error::custom(format_args!(
            "invalid bool value `{}`",
            other
        ))),
    }
}

macro_rules! parse_scalar {
    ($($method:ident => $visit:ident: $ty:ty),* $(,)?) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            let raw = self.first()?;
            let raw = raw.trim();
            if raw.is_empty() {
                return visitor.$visit(<$ty>::default());
            }
            let parsed = raw.parse::<$ty>().map_err(|e| {
                <FieldError as de::Error>::custom(format_args!(
                    "invalid {} value `{}`: {}",
                    stringify!($ty),
                    raw,
                    e
                ))
            })?;
            visitor.$visit(parsed)
        }
    )*};
}

impl<'de> de::Deserializer<'de> for TextValues {
    type Error = FieldError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.0.len() {
            0 => visitor.visit_unit(),
            1 => visitor.visit_string(self.first()?),
            _ => visitor.visit_seq(self.into_seq()),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let raw = self.first()?;
        visitor.visit_bool(parse_bool(raw.trim())?)
    }

    parse_scalar! {
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
        deserialize_f32 => visit_f32: f32,
        deserialize_f64 => visit_f64: f64,
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let raw = self.first()?;
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(de::Error::custom(format_args!("invalid char value `{}`", raw))),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_string(self.first()?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_string(self.first()?)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_byte_buf(self.first()?.into_bytes())
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_byte_buf(self.first()?.into_bytes())
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.0.is_empty() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_seq(self.into_seq())
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_seq(self.into_seq())
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_seq(self.into_seq())
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        let variant: StringDeserializer<FieldError> = self.first()?.into_deserializer();
        visitor.visit_enum(variant)
    }

    fn deserialize_identifier<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_string(self.first()?)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! { i128 u128 map struct }
}
