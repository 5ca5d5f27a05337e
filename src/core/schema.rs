/// Input Schema Generation
///
/// Actions describe their input structure once, at registration time, through
/// a `TypeDescriptor`. The descriptor is turned into a JSON-Schema-shaped value
/// that is published in the tool catalog. Record types implement `Describe`
/// by hand with the `RecordDescriptor` builder; primitive Rust types already
/// implement it below.
///
/// Generation never fails: any shape it does not understand degrades to a
/// generic `{"type": "object"}`.

use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};

/// Shape of a value as seen by schema generation.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    String,
    /// Any integer width, signed or unsigned.
    Integer,
    /// Any floating point width.
    Number,
    Boolean,
    /// Sequence of the element type.
    Array(Box<TypeDescriptor>),
    /// String-keyed mapping to the value type.
    Map(Box<TypeDescriptor>),
    /// Structured value with named fields.
    Record(RecordDescriptor),
    /// Unconstrained value.
    Any,
}

impl TypeDescriptor {
    pub fn array(elem: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(elem))
    }

    pub fn map(value: TypeDescriptor) -> Self {
        TypeDescriptor::Map(Box::new(value))
    }
}

/// Ordered list of the fields of a record type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDescriptor {
    fields: Vec<Field>,
}

impl RecordDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

impl From<RecordDescriptor> for TypeDescriptor {
    fn from(record: RecordDescriptor) -> Self {
        TypeDescriptor::Record(record)
    }
}

/// One field of a record type together with its serialization metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    serial_name: Option<String>,
    omitted: bool,
    visible: bool,
    ty: TypeDescriptor,
    description: Option<String>,
    validation: Option<String>,
}

impl Field {
    /// Field serialized under `name`.
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            serial_name: Some(name.into()),
            ..Self::unnamed(ty)
        }
    }

    /// Field without a serialization name. It never shows up in a schema.
    pub fn unnamed(ty: TypeDescriptor) -> Self {
        Self {
            serial_name: None,
            omitted: false,
            visible: true,
            ty,
            description: None,
            validation: None,
        }
    }

    /// Human readable annotation copied into the property's `description`.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Validation annotation, e.g. `"required,min=1"`.
    pub fn validate(mut self, rules: impl Into<String>) -> Self {
        self.validation = Some(rules.into());
        self
    }

    /// Shorthand for adding the `required` rule.
    pub fn required(mut self) -> Self {
        self.validation = Some(match self.validation.take() {
            Some(rules) if !rules.is_empty() => format!("{rules},required"),
            _ => "required".to_string(),
        });
        self
    }

    /// Mark the field as skipped during serialization.
    pub fn omit(mut self) -> Self {
        self.omitted = true;
        self
    }

    /// Mark the field as internal to the host type.
    pub fn private(mut self) -> Self {
        self.visible = false;
        self
    }

    fn published_name(&self) -> Option<&str> {
        if !self.visible || self.omitted {
            return None;
        }
        match self.serial_name.as_deref() {
            None | Some("") | Some("-") => None,
            Some(name) => Some(name),
        }
    }

    fn is_required(&self) -> bool {
        self.validation.as_deref().is_some_and(|rules| {
            rules
                .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                .any(|token| token == "required")
        })
    }
}

/// Types that can describe their own input shape.
pub trait Describe {
    fn descriptor() -> TypeDescriptor;
}

impl Describe for String {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::String
    }
}

impl Describe for bool {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::Boolean
    }
}

macro_rules! describe_as {
    ($variant:ident: $($ty:ty),+) => {
        $(
            impl Describe for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::$variant
                }
            }
        )+
    };
}

describe_as!(Integer: i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
describe_as!(Number: f32, f64);
describe_as!(Any: Value);

impl<T: Describe> Describe for Option<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }
}

impl<T: Describe> Describe for Box<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::array(T::descriptor())
    }
}

impl<V: Describe, S> Describe for HashMap<String, V, S> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(V::descriptor())
    }
}

impl<V: Describe> Describe for BTreeMap<String, V> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::map(V::descriptor())
    }
}

/// Generate the input schema for an action.
///
/// # Arguments
/// * `descriptor` - The action's input type, or `None` when it takes no input
///
/// # Returns
/// - `None` yields `{"type": "object", "properties": {}}`
/// - a non-record descriptor yields `{"type": "object"}`
/// - a record yields `{"type": "object", "properties": {...}, "required": [...]}`,
///   with `required` left out when no field is required
pub fn generate_schema(descriptor: Option<&TypeDescriptor>) -> Value {
    match descriptor {
        None => json!({ "type": "object", "properties": {} }),
        Some(TypeDescriptor::Record(record)) => record_schema(record),
        Some(_) => json!({ "type": "object" }),
    }
}

fn record_schema(record: &RecordDescriptor) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<Value> = Vec::new();

    for field in record.fields() {
        let Some(name) = field.published_name() else {
            continue;
        };

        let mut property = type_schema(&field.ty);
        if let (Some(text), Value::Object(obj)) = (&field.description, &mut property) {
            obj.insert("description".to_string(), Value::String(text.clone()));
        }
        properties.insert(name.to_string(), property);

        if field.is_required() {
            required.push(Value::String(name.to_string()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    Value::Object(schema)
}

fn type_schema(ty: &TypeDescriptor) -> Value {
    match ty {
        TypeDescriptor::String => json!({ "type": "string" }),
        TypeDescriptor::Integer => json!({ "type": "integer" }),
        TypeDescriptor::Number => json!({ "type": "number" }),
        TypeDescriptor::Boolean => json!({ "type": "boolean" }),
        TypeDescriptor::Array(elem) => json!({ "type": "array", "items": type_schema(elem) }),
        TypeDescriptor::Map(value) => match value.as_ref() {
            TypeDescriptor::Any => json!({ "type": "object" }),
            other => json!({ "type": "object", "additionalProperties": type_schema(other) }),
        },
        TypeDescriptor::Record(record) => record_schema(record),
        TypeDescriptor::Any => json!({ "type": "object" }),
    }
}
