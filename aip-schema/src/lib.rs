//! Resource schema declarations and the resource tree.
//!
//! Services declare the shape of a stored resource once (field types,
//! column-name overrides, nullability, JSON-stored roots) and build a
//! [`ResourceTree`] from it. The tree classifies every reachable field,
//! decides which dotted paths a request may touch, and computes the
//! SQL-safe replacement form of each path (column renames and `JSONB(...)`
//! markers for nested traversal).
//!
//! The tree is built once per resource type at parser construction and is
//! immutable afterwards; any number of calls may read it concurrently.
//!
//! # Example
//!
//! ```ignore
//! use aip_schema::{FieldSpec, ResourceSchema, ResourceTree, TreeConfig, AllowedPathSet};
//!
//! let schema = ResourceSchema::builder("library.Book")
//!     .field(FieldSpec::string("id"))
//!     .field(FieldSpec::message("nested", vec![FieldSpec::int64("field2")]).as_json())
//!     .key_columns(["organization_id", "book_id"])
//!     .build();
//!
//! let tree = ResourceTree::build(&schema, TreeConfig {
//!     allowed_paths: AllowedPathSet::new(&["id", "nested.*"])?,
//!     ..TreeConfig::default()
//! })?;
//! assert!(tree.is_path_allowed("nested.field2"));
//! ```

mod error;
mod paths;
mod replace;
mod schema;
mod tree;
mod types;

pub use error::SchemaError;
pub use paths::AllowedPathSet;
pub use replace::ReplacementMatcher;
pub use schema::{FieldSpec, ResourceSchema, ResourceSchemaBuilder};
pub use tree::{ResourceNode, ResourceTree, TreeConfig};
pub use types::{EnumDef, FieldBehavior, FieldBehaviorSet, FieldType};
