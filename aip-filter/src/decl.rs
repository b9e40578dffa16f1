use std::collections::HashMap;

use aip_schema::{FieldType, ResourceTree};

/// A fully-resolved reference to a filterable field.
///
/// Carries everything SQL lowering needs: the backing column, the JSONB
/// segments below it, the leaf type, and whether the path traverses a
/// repeated message column or selects a map key.
#[derive(Debug, Clone)]
pub struct FieldRef {
    /// Original dotted logical path.
    pub path: String,

    /// Backing column (override applied).
    pub column: String,

    /// JSONB segments under the column; empty for plain columns.
    pub segments: Vec<String>,

    /// Leaf type (list/map wrappers preserved).
    pub ty: FieldType,

    /// The column is a JSONB array and `segments` address element fields.
    pub via_repeated: bool,

    /// The final segment is a dynamic map key rather than a declared
    /// field.
    pub is_map_key: bool,

    pub nullable: bool,
}

impl FieldRef {
    /// Whether SQL addressing goes through JSONB operators.
    pub fn is_jsonb(&self) -> bool {
        !self.segments.is_empty()
    }
}

/// Identifier declarations seeded from a resource tree.
///
/// Every allowed, addressable node is registered under both its original
/// dotted path and its replacement identifier form (the inside of
/// `JSONB(...)`, or the renamed root column), so filters resolve whether
/// or not path replacement ran first. Exact `map.key` patterns from the
/// allowed set are registered as map-value references.
#[derive(Debug, Default)]
pub struct Declarations {
    idents: HashMap<String, FieldRef>,
    /// Map columns reachable for key access only (`labels.*` without
    /// `labels` itself being allowed).
    maps: HashMap<String, FieldRef>,
}

impl Declarations {
    pub fn from_tree(tree: &ResourceTree) -> Self {
        let mut idents = HashMap::new();
        let mut maps = HashMap::new();
        for node in tree.nodes() {
            if node.proto_backed {
                continue;
            }
            let field = FieldRef {
                path: node.path.clone(),
                column: node.root_column.clone(),
                segments: node.segments.clone(),
                ty: node.ty.clone(),
                via_repeated: node.via_repeated,
                is_map_key: false,
                nullable: node.nullable,
            };
            if matches!(node.ty, FieldType::Map(_)) {
                let key_accessible = node.allowed
                    || tree
                        .allowed_paths()
                        .wildcard_prefixes()
                        .any(|prefix| prefix == node.path);
                if key_accessible {
                    maps.insert(node.path.clone(), field.clone());
                }
            }
            if !node.allowed {
                continue;
            }
            if let Some(key) = replacement_ident(node.replacement.as_deref()) {
                if key != node.path {
                    idents.insert(key.to_string(), field.clone());
                }
            }
            idents.insert(node.path.clone(), field);
        }

        // Exact map-key patterns (`labels.environment`) have no node of
        // their own; declare them against the map field.
        for pattern in tree.allowed_paths().exact_paths() {
            if idents.contains_key(pattern) {
                continue;
            }
            let Some((parent_path, key)) = pattern.rsplit_once('.') else {
                continue;
            };
            let Some(parent) = tree.node(parent_path) else {
                continue;
            };
            if let FieldType::Map(value_ty) = &parent.ty {
                let mut segments = parent.segments.clone();
                segments.push(key.to_string());
                idents.insert(
                    pattern.to_string(),
                    FieldRef {
                        path: pattern.to_string(),
                        column: parent.root_column.clone(),
                        segments,
                        ty: (**value_ty).clone(),
                        via_repeated: parent.via_repeated,
                        is_map_key: true,
                        nullable: true,
                    },
                );
            }
        }

        tracing::trace!(idents = idents.len(), "seeded filter declarations");
        Self { idents, maps }
    }

    pub fn lookup(&self, ident: &str) -> Option<&FieldRef> {
        self.idents.get(ident)
    }

    /// Map columns whose keys may be selected into, including those
    /// reachable only through a `.*` pattern.
    pub fn lookup_map(&self, path: &str) -> Option<&FieldRef> {
        self.maps.get(path).or_else(|| {
            self.idents
                .get(path)
                .filter(|field| matches!(field.ty, FieldType::Map(_)))
        })
    }

    pub fn len(&self) -> usize {
        self.idents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idents.is_empty()
    }
}

/// Strip a replacement down to its identifier form: `JSONB(x)` → `x`,
/// plain renames stay as-is.
fn replacement_ident(replacement: Option<&str>) -> Option<&str> {
    let replacement = replacement?;
    replacement
        .strip_prefix("JSONB(")
        .and_then(|rest| rest.strip_suffix(')'))
        .or(Some(replacement))
}
