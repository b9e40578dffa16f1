use std::sync::Arc;

use crate::types::{EnumDef, FieldBehavior, FieldBehaviorSet, FieldType};

/// Declaration of a single resource field.
///
/// Captures what the wire schema carries as per-field options: the
/// semantic type, nullability, a column-name override, whether the field
/// is skipped entirely, and whether a root message field is stored as
/// JSON or proto bytes.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub(crate) name: String,
    pub(crate) ty: FieldType,
    pub(crate) nullable: bool,
    pub(crate) column: Option<String>,
    pub(crate) skip: bool,
    pub(crate) as_json: bool,
    pub(crate) as_proto: bool,
    pub(crate) behaviors: FieldBehaviorSet,
    pub(crate) children: Vec<FieldSpec>,
}

impl FieldSpec {
    fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            column: None,
            skip: false,
            as_json: false,
            as_proto: false,
            behaviors: FieldBehaviorSet::default(),
            children: Vec::new(),
        }
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn int64(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int64)
    }

    pub fn float64(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float64)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn bytes(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bytes)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Timestamp)
    }

    pub fn enumeration(name: impl Into<String>, def: Arc<EnumDef>) -> Self {
        Self::new(name, FieldType::Enum(def))
    }

    /// A message-typed field with its child fields.
    pub fn message(name: impl Into<String>, children: Vec<FieldSpec>) -> Self {
        let mut spec = Self::new(name, FieldType::Message);
        spec.children = children;
        spec
    }

    /// A map field with string keys and the given value type.
    pub fn map(name: impl Into<String>, value: FieldType) -> Self {
        Self::new(name, FieldType::Map(Box::new(value)))
    }

    /// Wrap this field's type as `list<T>`. Children declared on a
    /// message field describe the element message.
    pub fn repeated(mut self) -> Self {
        self.ty = FieldType::List(Box::new(self.ty));
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Override the backing column name.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Exclude the field (and its subtree) from the tree entirely.
    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Root message field stored as a JSONB column.
    pub fn as_json(mut self) -> Self {
        self.as_json = true;
        self
    }

    /// Root message field stored as serialized proto bytes.
    pub fn as_proto(mut self) -> Self {
        self.as_proto = true;
        self
    }

    pub fn behavior(mut self, behavior: FieldBehavior) -> Self {
        self.behaviors.insert(behavior);
        self
    }
}

/// Declared schema for one resource message.
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub(crate) name: String,
    pub(crate) fields: Vec<FieldSpec>,
    pub(crate) key_columns: Vec<String>,
    pub(crate) id_column: Option<String>,
}

impl ResourceSchema {
    pub fn builder(name: impl Into<String>) -> ResourceSchemaBuilder {
        ResourceSchemaBuilder {
            schema: ResourceSchema {
                name: name.into(),
                fields: Vec::new(),
                key_columns: Vec::new(),
                id_column: None,
            },
        }
    }

    /// Fully-qualified resource message name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Composite key columns in declaration order.
    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Single id column override, when declared.
    pub fn id_column(&self) -> Option<&str> {
        self.id_column.as_deref()
    }
}

pub struct ResourceSchemaBuilder {
    schema: ResourceSchema,
}

impl ResourceSchemaBuilder {
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.schema.fields.push(field);
        self
    }

    /// Composite key columns, in the order `name` ordering expands them.
    pub fn key_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.schema.key_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Single id column; when set, `name` ordering expands to it alone.
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.schema.id_column = Some(column.into());
        self
    }

    pub fn build(self) -> ResourceSchema {
        self.schema
    }
}
