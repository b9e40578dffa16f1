use std::collections::{HashMap, HashSet};

use crate::error::SchemaError;
use crate::paths::AllowedPathSet;
use crate::replace::ReplacementMatcher;
use crate::schema::{FieldSpec, ResourceSchema};
use crate::types::{FieldBehaviorSet, FieldType};

/// Configuration for building a [`ResourceTree`].
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Maximum traversal depth into nested messages.
    pub max_depth: usize,

    /// Rewrite nested replacement paths with `@` separators so the same
    /// literal can be located again inside SQL fragments.
    pub transform_nested_paths: bool,

    /// Paths this request type is allowed to touch.
    pub allowed_paths: AllowedPathSet,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            transform_nested_paths: true,
            allowed_paths: AllowedPathSet::default(),
        }
    }
}

/// One reachable field, classified.
#[derive(Debug, Clone)]
pub struct ResourceNode {
    /// 0 for top-level columns, incremented per nested message level.
    pub depth: usize,

    /// Dotted logical path (`nested.field2`).
    pub path: String,

    pub ty: FieldType,
    pub nullable: bool,
    pub behaviors: FieldBehaviorSet,

    /// Column-name override; only meaningful at depth 0.
    pub column: Option<String>,

    /// Root message field stored as a JSONB column.
    pub as_json: bool,

    /// Root message field stored as serialized proto bytes. Descendants
    /// of such a field are reachable for mask validation but cannot be
    /// addressed in SQL.
    pub as_proto: bool,

    /// Whether the path is allowed for this request type.
    pub allowed: bool,

    /// Backing column at SQL level (override applied).
    pub root_column: String,

    /// JSONB segments under the root column; empty for root nodes.
    pub segments: Vec<String>,

    /// The root column is a JSONB array and `segments` address fields of
    /// its elements.
    pub via_repeated: bool,

    /// Descendant of an `as_proto` root; not addressable in SQL.
    pub proto_backed: bool,

    /// SQL-safe replacement form of the path, when it differs from the
    /// path itself (`nested_col`, `JSONB(nested_col@field2)`).
    pub replacement: Option<String>,
}

impl ResourceNode {
    /// Word-boundary matcher for this node's path.
    pub fn matcher(&self) -> ReplacementMatcher {
        ReplacementMatcher::new(self.path.clone())
    }
}

/// Immutable classification of every reachable field of a resource,
/// ordered by ascending depth.
#[derive(Debug)]
pub struct ResourceTree {
    resource_name: String,
    nodes: Vec<ResourceNode>,
    index: HashMap<String, usize>,
    allowed_paths: AllowedPathSet,
    key_columns: Vec<String>,
    id_column: Option<String>,
}

impl ResourceTree {
    /// Walk the schema depth-first and classify every reachable field.
    ///
    /// Recursion into message fields happens only below the root, or at
    /// the root for fields stored as JSON/proto bytes. Timestamps are
    /// opaque leaves. Every `allowed_paths` pattern must name a declared
    /// field.
    pub fn build(schema: &ResourceSchema, config: TreeConfig) -> Result<Self, SchemaError> {
        let mut nodes = Vec::new();
        let mut seen = HashSet::new();
        for field in &schema.fields {
            walk(field, &WalkContext::root(&config), &mut nodes, &mut seen)?;
        }
        // DFS produced the nodes; reorder by ascending depth, keeping the
        // DFS order within each depth.
        nodes.sort_by_key(|node: &ResourceNode| node.depth);

        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.path.clone(), i))
            .collect();

        let tree = Self {
            resource_name: schema.name.clone(),
            nodes,
            index,
            allowed_paths: config.allowed_paths,
            key_columns: schema.key_columns.clone(),
            id_column: schema.id_column.clone(),
        };
        tree.validate_patterns()?;
        tracing::debug!(
            resource = %tree.resource_name,
            nodes = tree.nodes.len(),
            "built resource tree"
        );
        Ok(tree)
    }

    /// Every pattern in the allowed set must resolve against the tree:
    /// exact patterns name a node (or a key of a map field), `.*`
    /// patterns name a traversable node.
    fn validate_patterns(&self) -> Result<(), SchemaError> {
        for path in self.allowed_paths.exact_paths() {
            if self.index.contains_key(path) || self.map_parent(path).is_some() {
                continue;
            }
            return Err(SchemaError::UnknownPath(path.to_string()));
        }
        for prefix in self.allowed_paths.wildcard_prefixes() {
            let node = self
                .node(prefix)
                .ok_or_else(|| SchemaError::UnknownPath(format!("{prefix}.*")))?;
            let traversable = matches!(
                node.ty,
                FieldType::Message | FieldType::Map(_) | FieldType::List(_)
            );
            if !traversable {
                return Err(SchemaError::NotTraversable(format!("{prefix}.*")));
            }
        }
        Ok(())
    }

    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn node(&self, path: &str) -> Option<&ResourceNode> {
        self.index.get(path).map(|&i| &self.nodes[i])
    }

    /// The map-typed node a `map.key` path selects into, if any.
    pub fn map_parent(&self, path: &str) -> Option<&ResourceNode> {
        let (parent, _key) = path.rsplit_once('.')?;
        let node = self.node(parent)?;
        matches!(node.ty, FieldType::Map(_)).then_some(node)
    }

    /// Exact node allowance, or, for `map.key` paths, allowance of the
    /// map field itself.
    pub fn is_path_allowed(&self, path: &str) -> bool {
        if let Some(node) = self.node(path) {
            return node.allowed;
        }
        if self.allowed_paths.is_allowed(path) {
            return self.map_parent(path).is_some();
        }
        self.map_parent(path).map(|n| n.allowed).unwrap_or(false)
    }

    pub fn allowed_paths(&self) -> &AllowedPathSet {
        &self.allowed_paths
    }

    /// Composite key columns in declaration order.
    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn id_column(&self) -> Option<&str> {
        self.id_column.as_deref()
    }

    /// Rewrite every allowed path in `input` into its replacement form,
    /// longest paths first so dotted prefixes never clobber their
    /// descendants.
    pub fn apply_replacements(&self, input: &str) -> String {
        let mut targets: Vec<&ResourceNode> = self
            .nodes
            .iter()
            .filter(|n| n.allowed && n.replacement.is_some())
            .collect();
        targets.sort_by(|a, b| {
            let seg = |n: &ResourceNode| n.path.bytes().filter(|&b| b == b'.').count();
            seg(b).cmp(&seg(a)).then(b.path.len().cmp(&a.path.len()))
        });

        let mut out = input.to_string();
        for node in targets {
            let replacement = node.replacement.as_deref().unwrap();
            out = node.matcher().replace_all(&out, replacement);
        }
        out
    }
}

/// Traversal state threaded through the depth-first walk.
struct WalkContext<'a> {
    config: &'a TreeConfig,
    depth: usize,
    path: String,
    root_column: String,
    segments: Vec<String>,
    via_repeated: bool,
    proto_backed: bool,
}

impl<'a> WalkContext<'a> {
    fn root(config: &'a TreeConfig) -> Self {
        Self {
            config,
            depth: 0,
            path: String::new(),
            root_column: String::new(),
            segments: Vec::new(),
            via_repeated: false,
            proto_backed: false,
        }
    }

    fn child(&self, field: &FieldSpec) -> Self {
        let path = if self.path.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", self.path, field.name)
        };
        let root_column = if self.depth == 0 {
            field.column.clone().unwrap_or_else(|| field.name.clone())
        } else {
            self.root_column.clone()
        };
        let mut segments = self.segments.clone();
        if self.depth > 0 {
            segments.push(field.name.clone());
        }
        Self {
            config: self.config,
            depth: self.depth, // depth of the field being described
            path,
            root_column,
            segments,
            via_repeated: self.via_repeated
                || (self.depth == 0 && matches!(field.ty, FieldType::List(ref e) if **e == FieldType::Message)),
            proto_backed: self.proto_backed || (self.depth == 0 && field.as_proto),
        }
    }
}

fn walk(
    field: &FieldSpec,
    parent: &WalkContext<'_>,
    nodes: &mut Vec<ResourceNode>,
    seen: &mut HashSet<String>,
) -> Result<(), SchemaError> {
    if field.skip {
        return Ok(());
    }
    let ctx = parent.child(field);
    if !seen.insert(ctx.path.clone()) {
        return Err(SchemaError::DuplicateField(ctx.path.clone()));
    }

    let replacement = replacement_for(&ctx, field);
    nodes.push(ResourceNode {
        depth: ctx.depth,
        path: ctx.path.clone(),
        ty: field.ty.clone(),
        nullable: field.nullable,
        behaviors: field.behaviors,
        column: if ctx.depth == 0 { field.column.clone() } else { None },
        as_json: ctx.depth == 0 && field.as_json,
        as_proto: ctx.depth == 0 && field.as_proto,
        allowed: ctx.config.allowed_paths.is_allowed(&ctx.path),
        root_column: ctx.root_column.clone(),
        segments: ctx.segments.clone(),
        via_repeated: ctx.via_repeated && ctx.depth > 0,
        proto_backed: ctx.proto_backed && ctx.depth > 0,
        replacement,
    });

    if ctx.depth >= ctx.config.max_depth {
        return Ok(());
    }
    let recurse = match &field.ty {
        FieldType::Message => ctx.depth > 0 || field.as_json || field.as_proto,
        // Element fields of a repeated message column live under the
        // list path; only root-level arrays are addressable.
        FieldType::List(elem) => ctx.depth == 0 && **elem == FieldType::Message,
        _ => false,
    };
    if recurse {
        let child_ctx = WalkContext {
            depth: ctx.depth + 1,
            ..ctx
        };
        for child in &field.children {
            walk(child, &child_ctx, nodes, seen)?;
        }
    }
    Ok(())
}

/// Compute the SQL-safe replacement form for a node's path.
///
/// Root nodes only need one when a column override renames them. Nested
/// nodes are rewritten against the (possibly renamed) root column; with
/// `transform_nested_paths` the segments join with `@` and the result is
/// wrapped in `JSONB(...)` to mark it for JSONB lowering.
fn replacement_for(ctx: &WalkContext<'_>, field: &FieldSpec) -> Option<String> {
    if ctx.depth == 0 {
        return field.column.clone();
    }
    let mut parts = Vec::with_capacity(1 + ctx.segments.len());
    parts.push(ctx.root_column.clone());
    parts.extend(ctx.segments.iter().cloned());
    if ctx.config.transform_nested_paths {
        Some(format!("JSONB({})", parts.join("@")))
    } else {
        let joined = parts.join(".");
        (joined != ctx.path).then_some(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, ResourceSchema};
    use crate::types::EnumDef;

    fn sample_schema() -> ResourceSchema {
        let status = EnumDef::new("Status", [("STATUS_UNSPECIFIED", 0), ("ACTIVE", 1)]);
        ResourceSchema::builder("test.Resource")
            .field(FieldSpec::string("id"))
            .field(FieldSpec::timestamp("create_timestamp"))
            .field(FieldSpec::bool("deleted"))
            .field(FieldSpec::enumeration("status", status))
            .field(FieldSpec::string("tags").repeated())
            .field(FieldSpec::map("labels", FieldType::String))
            .field(
                FieldSpec::message(
                    "nested",
                    vec![
                        FieldSpec::int64("field2"),
                        FieldSpec::message("deep", vec![FieldSpec::string("leaf")]),
                    ],
                )
                .as_json(),
            )
            .key_columns(["organization_id", "user_id", "resource_id"])
            .build()
    }

    fn build(allowed: &[&str]) -> ResourceTree {
        ResourceTree::build(
            &sample_schema(),
            TreeConfig {
                allowed_paths: AllowedPathSet::new(allowed).unwrap(),
                ..TreeConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn nodes_are_ordered_by_depth() {
        let tree = build(&["*"]);
        let depths: Vec<usize> = tree.nodes().iter().map(|n| n.depth).collect();
        let mut sorted = depths.clone();
        sorted.sort_unstable();
        assert_eq!(depths, sorted);
        assert!(tree.node("nested.deep.leaf").is_some());
    }

    #[test]
    fn nested_nodes_carry_jsonb_replacements() {
        let tree = build(&["*"]);
        let node = tree.node("nested.field2").unwrap();
        assert_eq!(node.replacement.as_deref(), Some("JSONB(nested@field2)"));
        assert_eq!(node.root_column, "nested");
        assert_eq!(node.segments, vec!["field2"]);
    }

    #[test]
    fn column_override_flows_into_descendants() {
        let schema = ResourceSchema::builder("test.Resource")
            .field(
                FieldSpec::message("nested", vec![FieldSpec::int64("field2")])
                    .as_json()
                    .column("nested_col"),
            )
            .build();
        let tree = ResourceTree::build(
            &schema,
            TreeConfig {
                allowed_paths: AllowedPathSet::any(),
                ..TreeConfig::default()
            },
        )
        .unwrap();
        let root = tree.node("nested").unwrap();
        assert_eq!(root.replacement.as_deref(), Some("nested_col"));
        let leaf = tree.node("nested.field2").unwrap();
        assert_eq!(leaf.replacement.as_deref(), Some("JSONB(nested_col@field2)"));
    }

    #[test]
    fn allowed_bit_respects_patterns() {
        let tree = build(&["id", "nested.*"]);
        assert!(tree.node("id").unwrap().allowed);
        assert!(tree.node("nested.field2").unwrap().allowed);
        assert!(tree.node("nested.deep.leaf").unwrap().allowed);
        assert!(!tree.node("deleted").unwrap().allowed);
        assert!(!tree.node("nested").unwrap().allowed);
    }

    #[test]
    fn unknown_allowed_path_fails_construction() {
        let err = ResourceTree::build(
            &sample_schema(),
            TreeConfig {
                allowed_paths: AllowedPathSet::new(&["missing_field"]).unwrap(),
                ..TreeConfig::default()
            },
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::UnknownPath("missing_field".into()));
    }

    #[test]
    fn map_key_paths_validate_against_the_map_field() {
        let tree = build(&["labels.environment"]);
        assert!(tree.is_path_allowed("labels.environment"));
        assert!(!tree.is_path_allowed("labels.other"));
    }

    #[test]
    fn repeated_message_descendants_are_marked() {
        let schema = ResourceSchema::builder("test.Resource")
            .field(
                FieldSpec::message("items", vec![FieldSpec::message("product", vec![FieldSpec::string("id")])])
                    .repeated(),
            )
            .build();
        let tree = ResourceTree::build(
            &schema,
            TreeConfig {
                allowed_paths: AllowedPathSet::any(),
                ..TreeConfig::default()
            },
        )
        .unwrap();
        let leaf = tree.node("items.product.id").unwrap();
        assert!(leaf.via_repeated);
        assert_eq!(leaf.segments, vec!["product", "id"]);
    }

    #[test]
    fn apply_replacements_rewrites_longest_paths_first() {
        let tree = build(&["*"]);
        let rewritten = tree.apply_replacements("nested.field2 > 3 && deleted");
        assert_eq!(rewritten, "JSONB(nested@field2) > 3 && deleted");
    }

    #[test]
    fn max_depth_stops_recursion() {
        let schema = ResourceSchema::builder("test.Resource")
            .field(
                FieldSpec::message(
                    "a",
                    vec![FieldSpec::message("b", vec![FieldSpec::string("c")])],
                )
                .as_json(),
            )
            .build();
        let tree = ResourceTree::build(
            &schema,
            TreeConfig {
                max_depth: 1,
                allowed_paths: AllowedPathSet::any(),
                ..TreeConfig::default()
            },
        )
        .unwrap();
        assert!(tree.node("a.b").is_some());
        assert!(tree.node("a.b.c").is_none());
    }
}
