//! Typed values and the registry mapping Bro type names to decode pipelines.
//!
//! Every declared type name resolves to a [`TypePipeline`]: a translator from
//! raw token to [`Value`], a factory for a fresh per-field [`Accumulator`], a
//! formatter back to text, and the value used when a field holds the
//! empty-field sentinel. Composite forms (`set[T]`, `vector[T]`) reuse the
//! pipeline of their element type `T` and re-split the token on the set
//! separator.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::OnceLock;

use chrono::{DateTime, Local, Utc};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use thiserror::Error;

use crate::error::DecodeError;
use crate::options::FormatOptions;
use crate::stats::Accumulator;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The field held the unset sentinel.
    Unset,
    Bool(bool),
    Count(u64),
    Int(i64),
    Double(f64),
    /// Seconds since the epoch, with fractional part.
    Time(f64),
    /// Seconds, with fractional part.
    Interval(f64),
    Port(u16),
    Addr(IpAddr),
    Subnet(IpAddr, u8),
    String(String),
    Enum(String),
    Set(Vec<Value>),
    Vector(Vec<Value>),
}

impl Value {
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// Elements of a composite value.
    ///
    /// An unset field has no elements; scalars also report none.
    pub fn elements(&self) -> &[Value] {
        match self {
            Value::Set(items) | Value::Vector(items) => items,
            _ => &[],
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Count(x) => Some(*x as f64),
            Value::Int(x) => Some(*x as f64),
            Value::Port(x) => Some(*x as f64),
            Value::Double(x) | Value::Time(x) | Value::Interval(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Count(x) => Some(*x),
            Value::Port(x) => Some(*x as u64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(x) => Some(*x),
            Value::Count(x) => i64::try_from(*x).ok(),
            Value::Port(x) => Some(*x as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Plain text key for grouping scalar values; `None` for unset and composites.
    pub fn group_key(&self) -> Option<String> {
        match self {
            Value::Unset | Value::Set(_) | Value::Vector(_) => None,
            Value::String(s) | Value::Enum(s) => Some(s.clone()),
            Value::Bool(b) => Some(format_bool_token(*b).to_string()),
            Value::Count(x) => Some(x.to_string()),
            Value::Int(x) => Some(x.to_string()),
            Value::Port(x) => Some(x.to_string()),
            Value::Addr(a) => Some(a.to_string()),
            Value::Subnet(a, len) => Some(format!("{}/{}", a, len)),
            Value::Double(x) | Value::Time(x) | Value::Interval(x) => Some(format!("{:.6}", x)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Unset => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Count(x) => serializer.serialize_u64(*x),
            Value::Int(x) => serializer.serialize_i64(*x),
            Value::Port(x) => serializer.serialize_u16(*x),
            Value::Double(x) | Value::Time(x) | Value::Interval(x) => serializer.serialize_f64(*x),
            Value::Addr(a) => serializer.collect_str(a),
            Value::Subnet(a, len) => serializer.collect_str(&format_args!("{}/{}", a, len)),
            Value::String(s) | Value::Enum(s) => serializer.serialize_str(s),
            Value::Set(items) | Value::Vector(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// Translate a raw token into a typed value.
pub type Translate = fn(&str) -> Result<Value, DecodeError>;

/// Render a typed value back to its textual form.
pub type Format = fn(&Value, &FormatOptions) -> String;

/// Build a fresh accumulator for one field of one file.
pub type AccumulatorFactory = fn() -> Accumulator;

/// Per-type decode/encode behavior.
#[derive(Clone, Copy)]
pub struct TypePipeline {
    pub translate: Translate,
    pub accumulator: AccumulatorFactory,
    pub format: Format,
    /// Value for a field holding the empty-field sentinel.
    pub empty: fn() -> Value,
}

impl fmt::Debug for TypePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypePipeline").finish_non_exhaustive()
    }
}

/// The shape of a declared type: a scalar, or a container of scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Set,
    Vector,
}

/// Separators and sentinels needed to decode and format composite values.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    pub set_separator: &'a str,
    pub empty_field: &'a str,
    pub unset_field: &'a str,
}

/// A resolved field type: its declared name, shape, and element pipeline.
#[derive(Debug, Clone)]
pub struct FieldType {
    type_name: String,
    shape: Shape,
    element: TypePipeline,
}

impl FieldType {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Translate a token that is neither the unset nor the empty sentinel.
    ///
    /// Composite tokens are split on the set separator; an element equal to
    /// the unset sentinel becomes [`Value::Unset`], and any element that fails
    /// to translate fails the whole field.
    pub fn translate(&self, token: &str, ctx: &DecodeContext<'_>) -> Result<Value, DecodeError> {
        match self.shape {
            Shape::Scalar => (self.element.translate)(token),
            Shape::Set => self.translate_elements(token, ctx).map(Value::Set),
            Shape::Vector => self.translate_elements(token, ctx).map(Value::Vector),
        }
    }

    fn translate_elements(&self, token: &str, ctx: &DecodeContext<'_>) -> Result<Vec<Value>, DecodeError> {
        token
            .split(ctx.set_separator)
            .enumerate()
            .map(|(index, item)| {
                if item == ctx.unset_field {
                    return Ok(Value::Unset);
                }
                (self.element.translate)(item).map_err(|inner| DecodeError::Element {
                    index,
                    inner: Box::new(inner),
                })
            })
            .collect()
    }

    /// The value a field of this type takes when it holds the empty sentinel.
    pub fn empty_value(&self) -> Value {
        match self.shape {
            Shape::Scalar => (self.element.empty)(),
            Shape::Set => Value::Set(Vec::new()),
            Shape::Vector => Value::Vector(Vec::new()),
        }
    }

    /// Render a value the way it would appear in the log, substituting the
    /// null string for unset values and the empty sentinel for empty ones.
    pub fn format(&self, value: &Value, ctx: &DecodeContext<'_>, options: &FormatOptions) -> String {
        match value {
            Value::Unset => options.get_null_string().to_string(),
            Value::Set(items) | Value::Vector(items) => {
                if items.is_empty() {
                    return ctx.empty_field.to_string();
                }
                items
                    .iter()
                    .map(|item| match item {
                        Value::Unset => ctx.unset_field.to_string(),
                        _ => (self.element.format)(item, options),
                    })
                    .collect::<Vec<_>>()
                    .join(ctx.set_separator)
            }
            Value::String(s) | Value::Enum(s) if s.is_empty() => ctx.empty_field.to_string(),
            _ => (self.element.format)(value, options),
        }
    }

    /// A fresh accumulator for this field.
    pub fn accumulator(&self) -> Accumulator {
        (self.element.accumulator)()
    }
}

/// Error returned when a declared type name is not registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown type '{0}'")]
pub struct UnknownTypeError(pub String);

/// Maps type names to their pipelines.
///
/// New scalar types are added with [`TypeRegistry::register`]; container
/// forms of any registered scalar resolve automatically.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    pipelines: HashMap<String, TypePipeline>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
        }
    }

    /// A registry holding every built-in Bro scalar type.
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();

        let numeric = Accumulator::stats as AccumulatorFactory;
        let grouped = Accumulator::group as AccumulatorFactory;
        let none = Accumulator::none as AccumulatorFactory;

        registry.register("time", pipeline(translate_time, none, format_time, || Value::Time(0.0)));
        registry.register("interval", pipeline(translate_interval, none, format_fixed, || Value::Interval(0.0)));
        registry.register("double", pipeline(translate_double, numeric, format_fixed, || Value::Double(0.0)));
        registry.register("count", pipeline(translate_count, numeric, format_plain, || Value::Count(0)));
        registry.register("counter", pipeline(translate_count, numeric, format_plain, || Value::Count(0)));
        registry.register("int", pipeline(translate_int, numeric, format_plain, || Value::Int(0)));
        registry.register("bool", pipeline(translate_bool, none, format_plain, || Value::Bool(false)));
        registry.register("port", pipeline(translate_port, grouped, format_plain, || Value::Port(0)));
        registry.register(
            "addr",
            pipeline(translate_addr, grouped, format_plain, || Value::Addr(IpAddr::V4(Ipv4Addr::UNSPECIFIED))),
        );
        registry.register(
            "subnet",
            pipeline(translate_subnet, grouped, format_plain, || {
                Value::Subnet(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
            }),
        );
        registry.register("string", pipeline(translate_string, grouped, format_plain, empty_string));
        registry.register("enum", pipeline(translate_enum, grouped, format_plain, || Value::Enum(String::new())));
        registry.register("pattern", pipeline(translate_string, none, format_plain, empty_string));
        registry.register("func", pipeline(translate_string, none, format_plain, empty_string));

        registry
    }

    /// Register (or replace) the pipeline for a scalar type name.
    pub fn register(&mut self, name: impl Into<String>, pipeline: TypePipeline) -> Option<TypePipeline> {
        self.pipelines.insert(name.into(), pipeline)
    }

    pub fn get(&self, name: &str) -> Option<&TypePipeline> {
        self.pipelines.get(name)
    }

    /// Resolve a declared type name, including `set[T]` and `vector[T]`.
    pub fn resolve(&self, type_name: &str) -> Result<FieldType, UnknownTypeError> {
        let (shape, element_name) = split_composite(type_name);
        let element = self
            .pipelines
            .get(element_name)
            .copied()
            .ok_or_else(|| UnknownTypeError(type_name.to_string()))?;

        Ok(FieldType {
            type_name: type_name.to_string(),
            shape,
            element,
        })
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtin_types()
    }
}

/// The shared registry of built-in types.
pub fn builtin() -> &'static TypeRegistry {
    static BUILTIN: OnceLock<TypeRegistry> = OnceLock::new();
    BUILTIN.get_or_init(TypeRegistry::with_builtin_types)
}

/// Convenience constructor for a [`TypePipeline`].
pub fn pipeline(
    translate: Translate,
    accumulator: AccumulatorFactory,
    format: Format,
    empty: fn() -> Value,
) -> TypePipeline {
    TypePipeline {
        translate,
        accumulator,
        format,
        empty,
    }
}

fn split_composite(type_name: &str) -> (Shape, &str) {
    let inner = |prefix: &str| {
        type_name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(']'))
    };

    if let Some(element) = inner("set[") {
        (Shape::Set, element)
    } else if let Some(element) = inner("vector[") {
        (Shape::Vector, element)
    } else {
        (Shape::Scalar, type_name)
    }
}

fn empty_string() -> Value {
    Value::String(String::new())
}

fn parse_f64(token: &str, expected: &'static str) -> Result<f64, DecodeError> {
    token.parse::<f64>().map_err(|_| DecodeError::invalid(expected))
}

fn translate_time(token: &str) -> Result<Value, DecodeError> {
    parse_f64(token, "time").map(Value::Time)
}

fn translate_interval(token: &str) -> Result<Value, DecodeError> {
    parse_f64(token, "interval").map(Value::Interval)
}

fn translate_double(token: &str) -> Result<Value, DecodeError> {
    parse_f64(token, "double").map(Value::Double)
}

fn translate_count(token: &str) -> Result<Value, DecodeError> {
    token
        .parse::<u64>()
        .map(Value::Count)
        .map_err(|_| DecodeError::invalid("count"))
}

fn translate_int(token: &str) -> Result<Value, DecodeError> {
    token
        .parse::<i64>()
        .map(Value::Int)
        .map_err(|_| DecodeError::invalid("int"))
}

fn translate_bool(token: &str) -> Result<Value, DecodeError> {
    match token {
        "T" => Ok(Value::Bool(true)),
        "F" => Ok(Value::Bool(false)),
        _ => Err(DecodeError::invalid("bool")),
    }
}

fn translate_port(token: &str) -> Result<Value, DecodeError> {
    token
        .parse::<u16>()
        .map(Value::Port)
        .map_err(|_| DecodeError::invalid("port"))
}

fn translate_addr(token: &str) -> Result<Value, DecodeError> {
    token
        .parse::<IpAddr>()
        .map(Value::Addr)
        .map_err(|_| DecodeError::invalid("addr"))
}

fn translate_subnet(token: &str) -> Result<Value, DecodeError> {
    let (addr, len) = token.split_once('/').ok_or_else(|| DecodeError::invalid("subnet"))?;
    let addr = addr.parse::<IpAddr>().map_err(|_| DecodeError::invalid("subnet"))?;
    let len = len.parse::<u8>().map_err(|_| DecodeError::invalid("subnet"))?;
    let max = if addr.is_ipv4() { 32 } else { 128 };
    if len > max {
        return Err(DecodeError::invalid("subnet"));
    }
    Ok(Value::Subnet(addr, len))
}

fn translate_string(token: &str) -> Result<Value, DecodeError> {
    Ok(Value::String(token.to_string()))
}

fn translate_enum(token: &str) -> Result<Value, DecodeError> {
    Ok(Value::Enum(token.to_string()))
}

fn format_bool_token(b: bool) -> &'static str {
    if b {
        "T"
    } else {
        "F"
    }
}

/// Six-decimal rendering used by `double`, `interval` and raw `time`.
fn format_fixed(value: &Value, options: &FormatOptions) -> String {
    match value.as_f64() {
        Some(x) => format!("{:.6}", x),
        None => format_plain(value, options),
    }
}

fn format_time(value: &Value, options: &FormatOptions) -> String {
    match value {
        Value::Time(secs) if options.is_readable_time() => {
            readable_time(*secs, options).unwrap_or_else(|| format!("{:.6}", secs))
        }
        _ => format_fixed(value, options),
    }
}

fn readable_time(secs: f64, options: &FormatOptions) -> Option<String> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    let utc = DateTime::<Utc>::from_timestamp(whole as i64, nanos)?;

    let mut out = String::new();
    let written = if options.is_utc() {
        write!(out, "{}", utc.format(options.get_time_format()))
    } else {
        write!(out, "{}", utc.with_timezone(&Local).format(options.get_time_format()))
    };
    written.ok().map(|_| out)
}

fn format_plain(value: &Value, options: &FormatOptions) -> String {
    match value {
        Value::Unset => options.get_null_string().to_string(),
        Value::Bool(b) => format_bool_token(*b).to_string(),
        Value::Double(x) | Value::Time(x) | Value::Interval(x) => format!("{:.6}", x),
        Value::Set(items) | Value::Vector(items) => items
            .iter()
            .map(|item| format_plain(item, options))
            .collect::<Vec<_>>()
            .join(","),
        scalar => scalar.group_key().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: DecodeContext<'static> = DecodeContext {
        set_separator: ",",
        empty_field: "(empty)",
        unset_field: "-",
    };

    fn roundtrip(type_name: &str, value: Value) {
        let field = builtin().resolve(type_name).unwrap();
        let options = FormatOptions::new();
        let text = (field.element.format)(&value, &options);
        assert_eq!(field.translate(&text, &CTX).unwrap(), value, "{} via {:?}", type_name, text);
    }

    #[test]
    fn test_scalar_roundtrip() {
        roundtrip("time", Value::Time(1577836800.123456));
        roundtrip("time", Value::Time(0.0));
        roundtrip("interval", Value::Interval(-2.5));
        roundtrip("double", Value::Double(0.0));
        roundtrip("double", Value::Double(3.25));
        roundtrip("count", Value::Count(0));
        roundtrip("count", Value::Count(u64::MAX));
        roundtrip("int", Value::Int(-42));
        roundtrip("bool", Value::Bool(true));
        roundtrip("bool", Value::Bool(false));
        roundtrip("port", Value::Port(443));
        roundtrip("addr", Value::Addr("10.0.0.1".parse().unwrap()));
        roundtrip("addr", Value::Addr("fe80::1".parse().unwrap()));
        roundtrip("subnet", Value::Subnet("192.168.0.0".parse().unwrap(), 16));
        roundtrip("string", Value::String("GET".to_string()));
        roundtrip("string", Value::String(String::new()));
        roundtrip("enum", Value::Enum("tcp".to_string()));
    }

    #[test]
    fn test_numeric_rejects_text() {
        let registry = builtin();
        for name in ["count", "int", "double", "time", "interval", "port"] {
            let field = registry.resolve(name).unwrap();
            assert!(field.translate("abc", &CTX).is_err(), "{} accepted text", name);
        }
        assert!(registry.resolve("count").unwrap().translate("-1", &CTX).is_err());
        assert!(registry.resolve("port").unwrap().translate("70000", &CTX).is_err());
    }

    #[test]
    fn test_bool_vocabulary() {
        let field = builtin().resolve("bool").unwrap();
        assert_eq!(field.translate("T", &CTX).unwrap(), Value::Bool(true));
        assert_eq!(field.translate("F", &CTX).unwrap(), Value::Bool(false));
        assert!(field.translate("true", &CTX).is_err());
        assert!(field.translate("t", &CTX).is_err());
    }

    #[test]
    fn test_set_of_count() {
        let field = builtin().resolve("set[count]").unwrap();
        assert_eq!(field.shape(), Shape::Set);
        assert_eq!(
            field.translate("3,5,7", &CTX).unwrap(),
            Value::Set(vec![Value::Count(3), Value::Count(5), Value::Count(7)])
        );
        assert_eq!(field.empty_value(), Value::Set(Vec::new()));
    }

    #[test]
    fn test_composite_propagates_element_error() {
        let field = builtin().resolve("vector[count]").unwrap();
        let err = field.translate("1,x,3", &CTX).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Element {
                index: 1,
                inner: Box::new(DecodeError::invalid("count")),
            }
        );
    }

    #[test]
    fn test_composite_unset_element() {
        let field = builtin().resolve("vector[string]").unwrap();
        assert_eq!(
            field.translate("a,-,b", &CTX).unwrap(),
            Value::Vector(vec![
                Value::String("a".to_string()),
                Value::Unset,
                Value::String("b".to_string()),
            ])
        );
    }

    #[test]
    fn test_unknown_types() {
        let registry = builtin();
        assert!(registry.resolve("table[string]").is_err());
        assert!(registry.resolve("set[nope]").is_err());
        assert!(registry.resolve("set[set[count]]").is_err());
        assert_eq!(
            registry.resolve("widget").unwrap_err(),
            UnknownTypeError("widget".to_string())
        );
    }

    #[test]
    fn test_register_custom_type() {
        fn translate_upper(token: &str) -> Result<Value, DecodeError> {
            Ok(Value::String(token.to_uppercase()))
        }

        let mut registry = TypeRegistry::with_builtin_types();
        assert!(registry.resolve("shout").is_err());
        registry.register("shout", pipeline(translate_upper, Accumulator::none, format_plain, empty_string));

        let field = registry.resolve("set[shout]").unwrap();
        assert_eq!(
            field.translate("a,b", &CTX).unwrap(),
            Value::Set(vec![Value::String("A".to_string()), Value::String("B".to_string())])
        );
    }

    #[test]
    fn test_format_sentinels() {
        let options = FormatOptions::new();
        let set = builtin().resolve("set[count]").unwrap();
        assert_eq!(set.format(&Value::Unset, &CTX, &options), "-");
        assert_eq!(set.format(&Value::Set(Vec::new()), &CTX, &options), "(empty)");
        assert_eq!(
            set.format(&Value::Set(vec![Value::Count(1), Value::Count(2)]), &CTX, &options),
            "1,2"
        );

        let string = builtin().resolve("string").unwrap();
        assert_eq!(string.format(&Value::String(String::new()), &CTX, &options), "(empty)");
    }

    #[test]
    fn test_readable_time_utc() {
        let field = builtin().resolve("time").unwrap();
        let options = FormatOptions::new().readable_time(true).utc(true);
        assert_eq!(
            field.format(&Value::Time(1577836800.5), &CTX, &options),
            "2020-01-01T00:00:00+0000"
        );

        let options = options.time_format("%Y-%m-%d %H:%M:%S%.3f");
        assert_eq!(
            field.format(&Value::Time(1577836800.5), &CTX, &options),
            "2020-01-01 00:00:00.500"
        );
    }

    #[test]
    fn test_raw_time_format() {
        let field = builtin().resolve("time").unwrap();
        assert_eq!(
            field.format(&Value::Time(1577836800.123456), &CTX, &FormatOptions::new()),
            "1577836800.123456"
        );
    }

    #[test]
    fn test_empty_strings_format_as_empty_sentinel() {
        let registry = builtin();
        for name in ["string", "enum", "pattern", "func"] {
            let field = registry.resolve(name).unwrap();
            let empty = field.empty_value();
            assert_eq!(field.format(&empty, &CTX, &FormatOptions::new()), "(empty)", "{}", name);
        }
    }

    #[test]
    fn test_value_json() {
        let json = |v: Value| serde_json::to_value(&v).unwrap();
        assert_eq!(json(Value::Unset), serde_json::Value::Null);
        assert_eq!(json(Value::Port(80)), serde_json::json!(80));
        assert_eq!(json(Value::Addr("10.0.0.1".parse().unwrap())), serde_json::json!("10.0.0.1"));
        assert_eq!(
            json(Value::Set(vec![Value::Count(1), Value::Unset])),
            serde_json::json!([1, null])
        );
    }
}
