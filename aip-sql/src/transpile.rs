use aip_filter::{CmpOp, FieldRef, TypedExpr, TypedValue};
use aip_schema::FieldType;
use chrono::SecondsFormat;

use crate::param::{SqlFragment, SqlParam};

/// Lower a typed expression into a `WHERE` fragment.
///
/// Placeholders are numbered in the order parameters are appended,
/// left to right through the tree. Boolean literals are inlined.
pub fn transpile_where(expr: &TypedExpr) -> SqlFragment {
    let mut builder = Builder::default();
    let body = builder.lower(expr);
    tracing::trace!(params = builder.params.len(), "transpiled filter");
    SqlFragment {
        clause: format!("WHERE {body}"),
        params: builder.params,
    }
}

#[derive(Default)]
struct Builder {
    params: Vec<SqlParam>,
}

impl Builder {
    /// Append a parameter and return its `$n` placeholder.
    fn push(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    fn lower(&mut self, expr: &TypedExpr) -> String {
        match expr {
            TypedExpr::And(lhs, rhs) => {
                let lhs = self.lower(lhs);
                let rhs = self.lower(rhs);
                format!("({lhs} AND {rhs})")
            }
            TypedExpr::Or(lhs, rhs) => {
                let lhs = self.lower(lhs);
                let rhs = self.lower(rhs);
                format!("({lhs} OR {rhs})")
            }
            TypedExpr::Not(inner) => {
                let inner = self.lower(inner);
                format!("(NOT {inner})")
            }
            // A bare boolean identifier is the predicate itself.
            TypedExpr::BoolField(field) => lhs_sql(field),
            TypedExpr::Compare { field, op, value } => self.lower_compare(field, *op, value),
            TypedExpr::HasAny(field) => lower_has_any(field),
            TypedExpr::Has { field, value } => self.lower_has(field, value),
        }
    }

    fn lower_compare(&mut self, field: &FieldRef, op: CmpOp, value: &TypedValue) -> String {
        let lhs = lhs_sql(field);
        // Boundary wildcards on string equality become LIKE patterns.
        if op == CmpOp::Eq {
            if let TypedValue::Str(text) = value {
                if text.starts_with('*') || text.ends_with('*') {
                    let placeholder = self.push(SqlParam::Text(like_pattern(text)));
                    return format!("({lhs} LIKE {placeholder})");
                }
            }
        }
        let rhs = self.value_sql(field, value);
        format!("({lhs} {} {rhs})", op.sql())
    }

    fn lower_has(&mut self, field: &FieldRef, value: &TypedValue) -> String {
        match &field.ty {
            // Key containment on the map column itself.
            FieldType::Map(_) if !field.is_map_key => {
                let placeholder = self.value_sql(field, value);
                format!("({} ? {placeholder})", jsonb_object_sql(field))
            }
            // Membership in a native array column.
            FieldType::List(_) if !field.is_jsonb() => {
                let placeholder = self.value_sql(field, value);
                format!("({placeholder} = ANY({}))", field.column)
            }
            // A leaf addressed through a repeated message column: one
            // EXISTS over the array elements, path applied inside.
            _ if field.via_repeated && field.is_jsonb() => {
                let inner = element_lhs_sql(field);
                let placeholder = self.value_sql(field, value);
                format!(
                    "EXISTS(SELECT 1 FROM jsonb_array_elements({}) AS _elem WHERE {inner} = {placeholder})",
                    field.column
                )
            }
            // Scalar columns, JSONB leaves and map values: equality.
            _ => {
                let lhs = lhs_sql(field);
                let rhs = self.value_sql(field, value);
                format!("({lhs} = {rhs})")
            }
        }
    }

    /// Render a coerced literal: booleans inline, everything else binds.
    fn value_sql(&mut self, field: &FieldRef, value: &TypedValue) -> String {
        match value {
            TypedValue::Bool(v) => v.to_string(),
            TypedValue::Int(v) => self.push(SqlParam::Int(*v)),
            TypedValue::Float(v) => self.push(SqlParam::Float(*v)),
            TypedValue::Str(v) => self.push(SqlParam::Text(v.clone())),
            TypedValue::Timestamp(v) => {
                // JSONB stores timestamps textually.
                if field.is_jsonb() {
                    self.push(SqlParam::Text(v.to_rfc3339_opts(SecondsFormat::Micros, true)))
                } else {
                    self.push(SqlParam::Timestamp(*v))
                }
            }
            TypedValue::EnumNumber(v) => self.push(SqlParam::Int(*v)),
            TypedValue::EnumName(v) => self.push(SqlParam::Text(v.clone())),
        }
    }

}

/// SQL for the left-hand side of a comparison: the column itself, or a
/// JSONB extraction cast to the leaf's primitive type.
fn lhs_sql(field: &FieldRef) -> String {
    if !field.is_jsonb() {
        return field.column.clone();
    }
    let path = jsonb_text_sql(&field.column, &field.segments);
    match jsonb_cast(&field.ty) {
        Some(cast) => format!("({path})::{cast}"),
        None => path,
    }
}

/// Element-scoped variant used inside `EXISTS` sub-selects.
fn element_lhs_sql(field: &FieldRef) -> String {
    let path = jsonb_text_sql("_elem", &field.segments);
    match jsonb_cast(&field.ty) {
        Some(cast) => format!("({path})::{cast}"),
        None => path,
    }
}

fn lower_has_any(field: &FieldRef) -> String {
    if !field.is_jsonb() {
        return format!("({} IS NOT NULL)", field.column);
    }
    if field.via_repeated {
        let inner = jsonb_text_sql("_elem", &field.segments);
        return format!(
            "EXISTS(SELECT 1 FROM jsonb_array_elements({}) AS _elem WHERE {inner} IS NOT NULL)",
            field.column
        );
    }
    format!("({} IS NOT NULL)", jsonb_text_sql(&field.column, &field.segments))
}

/// `root->'a'->>'leaf'`: text extraction of the final segment.
fn jsonb_text_sql(root: &str, segments: &[String]) -> String {
    let mut sql = root.to_string();
    for segment in &segments[..segments.len() - 1] {
        sql.push_str(&format!("->'{segment}'"));
    }
    sql.push_str(&format!("->>'{}'", segments[segments.len() - 1]));
    sql
}

/// `root->'a'->'b'`: object extraction, used for `?` containment.
fn jsonb_object_sql(field: &FieldRef) -> String {
    let mut sql = field.column.clone();
    for segment in &field.segments {
        sql.push_str(&format!("->'{segment}'"));
    }
    sql
}

/// Cast applied to JSONB text extraction, by leaf type. Strings, enums
/// and timestamps stay textual.
fn jsonb_cast(ty: &FieldType) -> Option<&'static str> {
    match ty {
        FieldType::Bool => Some("boolean"),
        FieldType::Int64 => Some("bigint"),
        FieldType::Float64 => Some("double precision"),
        _ => None,
    }
}

/// Boundary `*` becomes `%`; the interior was validated by the checker.
fn like_pattern(value: &str) -> String {
    let mut pattern = value.to_string();
    if let Some(rest) = pattern.strip_prefix('*') {
        pattern = format!("%{rest}");
    }
    if let Some(rest) = pattern.strip_suffix('*') {
        pattern = format!("{rest}%");
    }
    pattern
}
