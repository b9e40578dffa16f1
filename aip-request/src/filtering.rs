use std::sync::Arc;

use aip_filter::{check, parse, Declarations};
use aip_schema::{AllowedPathSet, ResourceSchema, ResourceTree, TreeConfig};
use aip_sql::{transpile_where, SqlFragment, SqlParam};

use crate::error::{ParserBuildError, RequestError};
use crate::options::FilteringOptions;

/// Parses the `filter` field of a request into a `WHERE` fragment.
///
/// Construction compiles the resource tree and the identifier
/// declarations once; `parse` is the per-call step: rewrite allowed
/// paths into their replacement forms, parse, type-check, transpile.
#[derive(Debug)]
pub struct FilteringRequestParser {
    tree: Arc<ResourceTree>,
    decls: Declarations,
}

impl FilteringRequestParser {
    pub fn new(
        schema: &ResourceSchema,
        options: &FilteringOptions,
    ) -> Result<Self, ParserBuildError> {
        let tree = ResourceTree::build(
            schema,
            TreeConfig {
                allowed_paths: AllowedPathSet::new(&options.paths)?,
                ..TreeConfig::default()
            },
        )?;
        Ok(Self::with_tree(Arc::new(tree)))
    }

    /// Build over an already-constructed tree (shared with the other
    /// parsers of a composed request parser).
    pub fn with_tree(tree: Arc<ResourceTree>) -> Self {
        let decls = Declarations::from_tree(&tree);
        Self { tree, decls }
    }

    /// Panicking constructor for static initialization.
    pub fn must_new(schema: &ResourceSchema, options: &FilteringOptions) -> Self {
        Self::new(schema, options)
            .unwrap_or_else(|err| panic!("building filter parser for {}: {err}", schema.name()))
    }

    pub fn tree(&self) -> &Arc<ResourceTree> {
        &self.tree
    }

    pub fn parse(&self, filter: &str) -> Result<ParsedFilter, RequestError> {
        if filter.trim().is_empty() {
            return Ok(ParsedFilter {
                fragment: SqlFragment::default(),
            });
        }
        let rewritten = self.tree.apply_replacements(filter);
        let expr = parse(&rewritten)?;
        let typed = check(&expr, &self.decls)?;
        Ok(ParsedFilter {
            fragment: transpile_where(&typed),
        })
    }
}

/// The compiled `WHERE` fragment of one call.
#[derive(Debug, Clone, Default)]
pub struct ParsedFilter {
    fragment: SqlFragment,
}

impl ParsedFilter {
    /// The `WHERE …` clause and its positional parameters. Both are
    /// empty when the request carried no filter.
    pub fn sql_where(&self) -> (&str, &[SqlParam]) {
        (&self.fragment.clause, &self.fragment.params)
    }

    pub fn is_empty(&self) -> bool {
        self.fragment.is_empty()
    }

    pub fn into_fragment(self) -> SqlFragment {
        self.fragment
    }
}
