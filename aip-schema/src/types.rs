use std::sync::Arc;

/// Semantic type of a resource field.
///
/// Timestamps are opaque leaves (never expanded into their component
/// fields). Enum fields carry their [`EnumDef`] so both the integer
/// encoding (root columns) and the textual encoding (nested in JSONB)
/// are available to the transpiler.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Bool,
    Int64,
    Float64,
    String,
    Bytes,
    Timestamp,
    Enum(Arc<EnumDef>),
    Message,
    List(Box<FieldType>),
    Map(Box<FieldType>),
}

impl FieldType {
    /// Whether this type is a plain scalar (directly comparable leaf).
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldType::Bool
                | FieldType::Int64
                | FieldType::Float64
                | FieldType::String
                | FieldType::Bytes
                | FieldType::Timestamp
                | FieldType::Enum(_)
        )
    }

    /// Element type for lists, value type for maps.
    pub fn element(&self) -> Option<&FieldType> {
        match self {
            FieldType::List(elem) | FieldType::Map(elem) => Some(elem),
            _ => None,
        }
    }

    /// Short human-readable name, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Bool => "bool",
            FieldType::Int64 => "int64",
            FieldType::Float64 => "float64",
            FieldType::String => "string",
            FieldType::Bytes => "bytes",
            FieldType::Timestamp => "timestamp",
            FieldType::Enum(_) => "enum",
            FieldType::Message => "message",
            FieldType::List(_) => "list",
            FieldType::Map(_) => "map",
        }
    }
}

/// An enum declaration: value names and their wire numbers.
///
/// Root-level enum columns store the number; enums nested inside a JSONB
/// column store the value name. Both lookups are needed at transpile time.
#[derive(Debug, PartialEq, Eq)]
pub struct EnumDef {
    name: String,
    values: Vec<(String, i32)>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = (&'static str, i32)>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            values: values
                .into_iter()
                .map(|(n, v)| (n.to_string(), v))
                .collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wire number for a value name.
    pub fn number_of(&self, value_name: &str) -> Option<i32> {
        self.values
            .iter()
            .find(|(n, _)| n == value_name)
            .map(|(_, v)| *v)
    }

    /// Value name for a wire number.
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, v)| *v == number)
            .map(|(n, _)| n.as_str())
    }
}

/// Declared behavior of a field, mirroring API field-behavior annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldBehavior {
    Required,
    OutputOnly,
    Immutable,
}

impl FieldBehavior {
    fn bit(self) -> u8 {
        match self {
            FieldBehavior::Required => 1,
            FieldBehavior::OutputOnly => 1 << 1,
            FieldBehavior::Immutable => 1 << 2,
        }
    }
}

/// Small set of [`FieldBehavior`] flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldBehaviorSet {
    bits: u8,
}

impl FieldBehaviorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, behavior: FieldBehavior) -> Self {
        self.bits |= behavior.bit();
        self
    }

    pub fn insert(&mut self, behavior: FieldBehavior) {
        self.bits |= behavior.bit();
    }

    pub fn contains(&self, behavior: FieldBehavior) -> bool {
        self.bits & behavior.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}
