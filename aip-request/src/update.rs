use std::collections::HashMap;
use std::sync::Arc;

use aip_schema::{
    AllowedPathSet, FieldBehavior, ResourceSchema, ResourceTree, TreeConfig,
};

use crate::error::{ParserBuildError, RequestError};
use crate::options::UpdateOptions;

/// Validates update-mask paths and maps them to target columns.
///
/// Every mask path must match an authorized pattern (`path` or
/// `path.*`); output-only fields are rejected. Nested paths write their
/// root column (the whole JSONB document is replaced), unless an
/// explicit mapping overrides the target.
#[derive(Debug)]
pub struct UpdateRequestParser {
    tree: Arc<ResourceTree>,
    mappings: HashMap<String, String>,
    implicit_update_time: bool,
}

impl UpdateRequestParser {
    pub fn new(schema: &ResourceSchema, options: &UpdateOptions) -> Result<Self, ParserBuildError> {
        let tree = ResourceTree::build(
            schema,
            TreeConfig {
                allowed_paths: AllowedPathSet::new(&options.paths)?,
                ..TreeConfig::default()
            },
        )?;
        for path in options.path_mappings.keys() {
            if tree.node(path).is_none() {
                return Err(ParserBuildError::UnknownMaskPath(path.clone()));
            }
        }
        Ok(Self {
            tree: Arc::new(tree),
            mappings: options.path_mappings.clone(),
            implicit_update_time: options.implicit_update_time,
        })
    }

    /// Panicking constructor for static initialization.
    pub fn must_new(schema: &ResourceSchema, options: &UpdateOptions) -> Self {
        Self::new(schema, options)
            .unwrap_or_else(|err| panic!("building update parser for {}: {err}", schema.name()))
    }

    pub fn parse(&self, mask_paths: &[String]) -> Result<ParsedUpdate, RequestError> {
        if mask_paths.is_empty() {
            return Err(RequestError::EmptyUpdateMask);
        }
        let mut columns: Vec<String> = Vec::new();
        for path in mask_paths {
            let node = self
                .tree
                .node(path)
                .filter(|node| node.allowed)
                .ok_or_else(|| RequestError::MaskPathNotAllowed(path.clone()))?;
            if node.behaviors.contains(FieldBehavior::OutputOnly) {
                return Err(RequestError::OutputOnlyMaskPath(path.clone()));
            }
            let column = self
                .mappings
                .get(path)
                .cloned()
                .unwrap_or_else(|| node.root_column.clone());
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        if self.implicit_update_time && !columns.iter().any(|c| c == "update_time") {
            columns.push("update_time".to_string());
        }
        Ok(ParsedUpdate { columns })
    }
}

/// The resolved column list of one update call, in mask order.
#[derive(Debug, Clone)]
pub struct ParsedUpdate {
    columns: Vec<String>,
}

impl ParsedUpdate {
    /// Target columns in order; the executor binds values by position.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// `SET col1 = $1, col2 = $2, …` starting at `$1`.
    pub fn sql_set(&self) -> String {
        self.sql_set_from(1)
    }

    /// `SET …` with placeholders starting at `$first`, for statements
    /// that already bind key parameters.
    pub fn sql_set_from(&self, first: usize) -> String {
        let assignments: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ${}", first + i))
            .collect();
        format!("SET {}", assignments.join(", "))
    }

    /// `col1 = EXCLUDED.col1, …` for `ON CONFLICT … DO UPDATE` upserts.
    pub fn sql_upsert(&self) -> String {
        let assignments: Vec<String> = self
            .columns
            .iter()
            .map(|column| format!("{column} = EXCLUDED.{column}"))
            .collect();
        assignments.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aip_schema::FieldSpec;

    fn schema() -> ResourceSchema {
        ResourceSchema::builder("test.User")
            .field(FieldSpec::string("display_name"))
            .field(FieldSpec::string("email").column("email_address"))
            .field(FieldSpec::timestamp("create_time").behavior(FieldBehavior::OutputOnly))
            .field(
                FieldSpec::message(
                    "settings",
                    vec![FieldSpec::bool("dark_mode"), FieldSpec::string("locale")],
                )
                .as_json(),
            )
            .build()
    }

    fn parser(paths: &[&str]) -> UpdateRequestParser {
        UpdateRequestParser::must_new(&schema(), &UpdateOptions::new(paths.iter().copied()))
    }

    fn owned(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn maps_paths_to_columns() {
        let parsed = parser(&["display_name", "email"])
            .parse(&owned(&["display_name", "email"]))
            .unwrap();
        assert_eq!(parsed.columns(), ["display_name", "email_address"]);
        assert_eq!(
            parsed.sql_set(),
            "SET display_name = $1, email_address = $2"
        );
        assert_eq!(
            parsed.sql_upsert(),
            "display_name = EXCLUDED.display_name, email_address = EXCLUDED.email_address"
        );
    }

    #[test]
    fn nested_paths_collapse_to_the_root_column() {
        let parsed = parser(&["settings.*"])
            .parse(&owned(&["settings.dark_mode", "settings.locale"]))
            .unwrap();
        assert_eq!(parsed.columns(), ["settings"]);
    }

    #[test]
    fn unauthorized_path_is_rejected() {
        let err = parser(&["display_name"])
            .parse(&owned(&["email"]))
            .unwrap_err();
        assert_eq!(err, RequestError::MaskPathNotAllowed("email".into()));
    }

    #[test]
    fn output_only_path_is_rejected() {
        let err = parser(&["display_name", "create_time"])
            .parse(&owned(&["create_time"]))
            .unwrap_err();
        assert_eq!(err, RequestError::OutputOnlyMaskPath("create_time".into()));
    }

    #[test]
    fn empty_mask_is_rejected() {
        assert_eq!(
            parser(&["display_name"]).parse(&[]).unwrap_err(),
            RequestError::EmptyUpdateMask
        );
    }

    #[test]
    fn implicit_update_time_is_appended() {
        let parser = UpdateRequestParser::must_new(
            &schema(),
            &UpdateOptions::new(["display_name"]).with_implicit_update_time(),
        );
        let parsed = parser.parse(&owned(&["display_name"])).unwrap();
        assert_eq!(parsed.columns(), ["display_name", "update_time"]);
    }

    #[test]
    fn offset_placeholders_for_keyed_statements() {
        let parsed = parser(&["display_name", "email"])
            .parse(&owned(&["display_name", "email"]))
            .unwrap();
        assert_eq!(
            parsed.sql_set_from(3),
            "SET display_name = $3, email_address = $4"
        );
    }

    #[test]
    fn unknown_mapping_fails_construction() {
        let err = UpdateRequestParser::new(
            &schema(),
            &UpdateOptions::new(["display_name"]).map_path("missing", "col"),
        )
        .unwrap_err();
        assert_eq!(err, ParserBuildError::UnknownMaskPath("missing".into()));
    }
}
