use std::collections::BTreeSet;
use std::sync::Arc;

use aip_schema::{AllowedPathSet, ResourceSchema, ResourceTree, TreeConfig};
use aip_sql::{parse_order_by, Direction, OrderByClause, OrderColumn};

use crate::error::{ParserBuildError, RequestError};
use crate::options::OrderingOptions;

/// Parses the `order_by` field of a request into an `ORDER BY` clause.
///
/// Paths resolve through the resource tree; a column override on the
/// node decides the emitted column name. The special path `name`
/// expands to the resource's composite key columns in declaration order
/// (or to `id_column` when declared), preserving the requested
/// direction on every expanded column.
#[derive(Debug)]
pub struct OrderingRequestParser {
    tree: Arc<ResourceTree>,
    allowed: BTreeSet<String>,
    default_entries: Vec<(String, Direction)>,
}

impl OrderingRequestParser {
    pub fn new(
        schema: &ResourceSchema,
        options: &OrderingOptions,
    ) -> Result<Self, ParserBuildError> {
        let tree = ResourceTree::build(
            schema,
            TreeConfig {
                allowed_paths: AllowedPathSet::any(),
                ..TreeConfig::default()
            },
        )?;
        Self::with_tree(Arc::new(tree), options)
    }

    /// Build over a tree shared with the other parsers of a composed
    /// request parser.
    pub fn with_tree(
        tree: Arc<ResourceTree>,
        options: &OrderingOptions,
    ) -> Result<Self, ParserBuildError> {
        for path in &options.paths {
            if path != "name" && tree.node(path).is_none() {
                return Err(ParserBuildError::UnknownOrderPath(path.clone()));
            }
        }
        let default_entries = match &options.default_order {
            Some(order_by) => {
                parse_order_by(order_by).map_err(ParserBuildError::InvalidDefaultOrder)?
            }
            None => Vec::new(),
        };
        Ok(Self {
            tree,
            allowed: options.paths.iter().cloned().collect(),
            default_entries,
        })
    }

    /// Panicking constructor for static initialization.
    pub fn must_new(schema: &ResourceSchema, options: &OrderingOptions) -> Self {
        Self::new(schema, options)
            .unwrap_or_else(|err| panic!("building ordering parser for {}: {err}", schema.name()))
    }

    pub fn parse(&self, order_by: &str) -> Result<ParsedOrder, RequestError> {
        let entries = if order_by.trim().is_empty() {
            self.default_entries.clone()
        } else {
            parse_order_by(order_by)?
        };

        let mut columns = Vec::new();
        for (path, direction) in &entries {
            // `name` orders by the resource key and needs no declaration.
            if path == "name" {
                self.expand_name(*direction, &mut columns);
                continue;
            }
            if !self.allowed.contains(path) {
                return Err(RequestError::OrderPathNotAllowed(path.clone()));
            }
            let node = self
                .tree
                .node(path)
                .ok_or_else(|| RequestError::OrderPathNotAllowed(path.clone()))?;
            columns.push(OrderColumn::new(node.root_column.clone(), *direction));
        }

        let canonical = entries
            .iter()
            .map(|(path, direction)| match direction {
                Direction::Asc => path.clone(),
                Direction::Desc => format!("{path} desc"),
            })
            .collect::<Vec<_>>()
            .join(",");

        Ok(ParsedOrder {
            clause: OrderByClause::new(columns),
            canonical,
        })
    }

    /// `name` expands to `id_column` when declared, otherwise to every
    /// composite key column.
    fn expand_name(&self, direction: Direction, columns: &mut Vec<OrderColumn>) {
        if let Some(id_column) = self.tree.id_column() {
            columns.push(OrderColumn::new(id_column, direction));
            return;
        }
        for key in self.tree.key_columns() {
            columns.push(OrderColumn::new(key.clone(), direction));
        }
    }
}

/// The resolved ordering of one call.
#[derive(Debug, Clone, Default)]
pub struct ParsedOrder {
    clause: OrderByClause,
    canonical: String,
}

impl ParsedOrder {
    /// `ORDER BY …`, or an empty string when nothing was requested and
    /// no default is declared.
    pub fn sql_order_by(&self) -> String {
        self.clause.sql()
    }

    pub fn columns(&self) -> &[OrderColumn] {
        self.clause.columns()
    }

    /// Canonical `path [desc]` rendering of the effective order, used
    /// in the page-token fingerprint.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aip_schema::FieldSpec;

    fn schema() -> ResourceSchema {
        ResourceSchema::builder("test.User")
            .field(FieldSpec::string("id"))
            .field(FieldSpec::timestamp("create_time").column("created_at"))
            .field(FieldSpec::string("display_name"))
            .key_columns(["organization_id", "user_id", "resource_id"])
            .build()
    }

    fn parser(paths: &[&str], default_order: Option<&str>) -> OrderingRequestParser {
        let mut options = OrderingOptions::new(paths.iter().copied());
        if let Some(order) = default_order {
            options = options.default_order(order);
        }
        OrderingRequestParser::must_new(&schema(), &options)
    }

    #[test]
    fn resolves_columns_and_overrides() {
        let parsed = parser(&["id", "create_time"], None)
            .parse("create_time desc, id")
            .unwrap();
        assert_eq!(parsed.sql_order_by(), "ORDER BY created_at DESC, id");
    }

    #[test]
    fn name_expands_composite_keys_with_direction() {
        let parsed = parser(&["id"], None).parse("name desc").unwrap();
        assert_eq!(
            parsed.sql_order_by(),
            "ORDER BY organization_id DESC, user_id DESC, resource_id DESC"
        );
    }

    #[test]
    fn name_expands_to_id_column_when_declared() {
        let schema = ResourceSchema::builder("test.User")
            .field(FieldSpec::string("id"))
            .key_columns(["organization_id", "user_id"])
            .id_column("user_id")
            .build();
        let parser =
            OrderingRequestParser::must_new(&schema, &OrderingOptions::new(["id"]));
        assert_eq!(parser.parse("name").unwrap().sql_order_by(), "ORDER BY user_id");
    }

    #[test]
    fn empty_order_by_uses_default() {
        let parsed = parser(&["create_time"], Some("create_time desc")).parse("").unwrap();
        assert_eq!(parsed.sql_order_by(), "ORDER BY created_at DESC");
        assert_eq!(parsed.canonical(), "create_time desc");
    }

    #[test]
    fn empty_order_by_without_default_is_empty() {
        let parsed = parser(&["id"], None).parse("").unwrap();
        assert_eq!(parsed.sql_order_by(), "");
    }

    #[test]
    fn disallowed_path_is_rejected() {
        let err = parser(&["id"], None).parse("display_name").unwrap_err();
        assert_eq!(err, RequestError::OrderPathNotAllowed("display_name".into()));
    }

    #[test]
    fn unknown_declared_path_fails_construction() {
        let err = OrderingRequestParser::new(&schema(), &OrderingOptions::new(["missing"]))
            .unwrap_err();
        assert_eq!(err, ParserBuildError::UnknownOrderPath("missing".into()));
    }

    #[test]
    fn bad_default_order_fails_construction() {
        let err = OrderingRequestParser::new(
            &schema(),
            &OrderingOptions::new(["id"]).default_order("id sideways"),
        )
        .unwrap_err();
        assert!(matches!(err, ParserBuildError::InvalidDefaultOrder(_)));
    }
}
