use chrono::{DateTime, Utc};

use aip_schema::FieldType;

use crate::ast::{Constant, Expr};
use crate::decl::{Declarations, FieldRef};
use crate::error::FilterError;

/// Comparison operators surviving type checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn sql(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(CmpOp::Eq),
            "!=" => Some(CmpOp::Ne),
            "<" => Some(CmpOp::Lt),
            "<=" => Some(CmpOp::Le),
            ">" => Some(CmpOp::Gt),
            ">=" => Some(CmpOp::Ge),
            _ => None,
        }
    }

    fn is_ordering(self) -> bool {
        matches!(self, CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge)
    }
}

/// A literal coerced against the declared type of the field it is
/// compared with.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(DateTime<Utc>),
    /// Root enum columns store the wire number.
    EnumNumber(i64),
    /// Enums nested in JSONB store the value name.
    EnumName(String),
}

/// The typed expression tree; every node is a boolean predicate.
#[derive(Debug, Clone)]
pub enum TypedExpr {
    And(Box<TypedExpr>, Box<TypedExpr>),
    Or(Box<TypedExpr>, Box<TypedExpr>),
    Not(Box<TypedExpr>),

    /// `field op literal`.
    Compare {
        field: FieldRef,
        op: CmpOp,
        value: TypedValue,
    },

    /// A bare boolean field used as a predicate.
    BoolField(FieldRef),

    /// `field:*` presence check.
    HasAny(FieldRef),

    /// `field:literal` membership, containment or equality, dispatched
    /// on the field shape at lowering time.
    Has { field: FieldRef, value: TypedValue },
}

/// Type-check an untyped expression against the declarations.
pub fn check(expr: &Expr, decls: &Declarations) -> Result<TypedExpr, FilterError> {
    match expr {
        Expr::Call { func, args } => match func.as_str() {
            "&&" | "||" => {
                if args.len() != 2 {
                    return Err(arity(func, 2, args.len()));
                }
                let lhs = Box::new(check(&args[0], decls)?);
                let rhs = Box::new(check(&args[1], decls)?);
                Ok(if func == "&&" {
                    TypedExpr::And(lhs, rhs)
                } else {
                    TypedExpr::Or(lhs, rhs)
                })
            }
            "!" => {
                if args.len() != 1 {
                    return Err(arity(func, 1, args.len()));
                }
                Ok(TypedExpr::Not(Box::new(check(&args[0], decls)?)))
            }
            ":" => {
                if args.len() != 2 {
                    return Err(arity(func, 2, args.len()));
                }
                check_has(&args[0], &args[1], decls)
            }
            symbol => {
                if let Some(op) = CmpOp::from_symbol(symbol) {
                    if args.len() != 2 {
                        return Err(arity(symbol, 2, args.len()));
                    }
                    return check_comparison(op, &args[0], &args[1], decls);
                }
                // A call in predicate position can still be a boolean
                // JSONB field (`JSONB(col@flag)`).
                check_predicate_field(expr, decls)
            }
        },
        Expr::Ident(_) | Expr::Select { .. } => check_predicate_field(expr, decls),
        Expr::Constant(c) => Err(FilterError::ExpectedPredicate(format!("{} literal", c.type_name()))),
        Expr::Star => Err(FilterError::ExpectedPredicate("*".to_string())),
    }
}

fn arity(func: &str, expected: usize, found: usize) -> FilterError {
    FilterError::ArityMismatch {
        func: func.to_string(),
        expected,
        found,
    }
}

/// A bare field in predicate position must be boolean.
fn check_predicate_field(expr: &Expr, decls: &Declarations) -> Result<TypedExpr, FilterError> {
    let field = resolve_field(expr, decls)?;
    match field.ty {
        FieldType::Bool => Ok(TypedExpr::BoolField(field)),
        _ => Err(FilterError::ExpectedPredicate(format!(
            "{} field {}",
            field.ty.name(),
            field.path
        ))),
    }
}

fn check_comparison(
    op: CmpOp,
    lhs: &Expr,
    rhs: &Expr,
    decls: &Declarations,
) -> Result<TypedExpr, FilterError> {
    let field = match lhs {
        Expr::Ident(_) | Expr::Select { .. } => resolve_field(lhs, decls)?,
        Expr::Call { func, .. } if func == "JSONB" => resolve_field(lhs, decls)?,
        other => return Err(FilterError::ExpectedField(other.describe())),
    };
    if field.via_repeated && !field.segments.is_empty() {
        // Paths through a repeated message column only support `:`.
        return Err(FilterError::NotFilterable(field.path.clone()));
    }
    let value = literal_value(rhs)?;
    let value = coerce(&field, op, value)?;
    Ok(TypedExpr::Compare { field, op, value })
}

fn check_has(lhs: &Expr, rhs: &Expr, decls: &Declarations) -> Result<TypedExpr, FilterError> {
    let field = resolve_field(lhs, decls)?;
    if matches!(rhs, Expr::Star) {
        return Ok(TypedExpr::HasAny(field));
    }
    let value = literal_value(rhs)?;
    let value = match &field.ty {
        // Key containment on the map column itself.
        FieldType::Map(_) if !field.is_map_key => match value {
            RawValue::Str(key) => TypedValue::Str(key),
            other => {
                return Err(FilterError::TypeMismatch {
                    path: field.path.clone(),
                    expected: "string map key",
                    found: other.type_name(),
                })
            }
        },
        // Membership against the element type.
        FieldType::List(elem) => match &**elem {
            FieldType::Message => return Err(FilterError::NotFilterable(field.path.clone())),
            elem_ty => {
                if field.is_jsonb() {
                    return Err(FilterError::NotFilterable(field.path.clone()));
                }
                coerce_scalar(&field, elem_ty, CmpOp::Eq, value)?
            }
        },
        FieldType::Message => return Err(FilterError::NotFilterable(field.path.clone())),
        ty => coerce_scalar(&field, ty, CmpOp::Eq, value)?,
    };
    Ok(TypedExpr::Has { field, value })
}

/// Raw literal value before coercion against the field type.
enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(DateTime<Utc>),
}

impl RawValue {
    fn type_name(&self) -> &'static str {
        match self {
            RawValue::Bool(_) => "bool",
            RawValue::Int(_) => "int",
            RawValue::Float(_) => "float",
            RawValue::Str(_) => "string",
            RawValue::Timestamp(_) => "timestamp",
        }
    }
}

fn literal_value(expr: &Expr) -> Result<RawValue, FilterError> {
    match expr {
        Expr::Constant(Constant::Bool(v)) => Ok(RawValue::Bool(*v)),
        Expr::Constant(Constant::Int(v)) => Ok(RawValue::Int(*v)),
        Expr::Constant(Constant::Float(v)) => Ok(RawValue::Float(*v)),
        Expr::Constant(Constant::Str(v)) => Ok(RawValue::Str(v.clone())),
        Expr::Call { func, args } if func == "timestamp" => {
            if args.len() != 1 {
                return Err(arity("timestamp", 1, args.len()));
            }
            let Expr::Constant(Constant::Str(text)) = &args[0] else {
                return Err(FilterError::InvalidTimestamp(args[0].describe()));
            };
            let parsed = DateTime::parse_from_rfc3339(text)
                .map_err(|_| FilterError::InvalidTimestamp(text.clone()))?;
            Ok(RawValue::Timestamp(parsed.with_timezone(&Utc)))
        }
        other => Err(FilterError::ExpectedLiteral(other.describe())),
    }
}

fn coerce(field: &FieldRef, op: CmpOp, value: RawValue) -> Result<TypedValue, FilterError> {
    match &field.ty {
        FieldType::List(_) | FieldType::Map(_) | FieldType::Message => {
            Err(FilterError::NotFilterable(field.path.clone()))
        }
        ty => coerce_scalar(field, ty, op, value),
    }
}

fn coerce_scalar(
    field: &FieldRef,
    ty: &FieldType,
    op: CmpOp,
    value: RawValue,
) -> Result<TypedValue, FilterError> {
    let mismatch = |expected: &'static str, found: &'static str| FilterError::TypeMismatch {
        path: field.path.clone(),
        expected,
        found,
    };
    match (ty, value) {
        (FieldType::Bool, RawValue::Bool(v)) => {
            if op.is_ordering() {
                Err(mismatch("bool", "ordering comparison"))
            } else {
                Ok(TypedValue::Bool(v))
            }
        }
        (FieldType::Bool, other) => Err(mismatch("bool", other.type_name())),
        (FieldType::Int64, RawValue::Int(v)) => Ok(TypedValue::Int(v)),
        (FieldType::Int64, other) => Err(mismatch("int64", other.type_name())),
        (FieldType::Float64, RawValue::Int(v)) => Ok(TypedValue::Float(v as f64)),
        (FieldType::Float64, RawValue::Float(v)) => Ok(TypedValue::Float(v)),
        (FieldType::Float64, other) => Err(mismatch("float64", other.type_name())),
        (FieldType::String, RawValue::Str(v)) => {
            if op == CmpOp::Eq {
                validate_wildcards(&v)?;
            }
            Ok(TypedValue::Str(v))
        }
        (FieldType::String, other) => Err(mismatch("string", other.type_name())),
        (FieldType::Timestamp, RawValue::Timestamp(v)) => Ok(TypedValue::Timestamp(v)),
        (FieldType::Timestamp, other) => Err(mismatch("timestamp", other.type_name())),
        (FieldType::Enum(def), RawValue::Str(name)) => {
            if op.is_ordering() {
                return Err(mismatch("enum", "ordering comparison"));
            }
            let number = def
                .number_of(&name)
                .ok_or_else(|| FilterError::UnknownEnumValue {
                    path: field.path.clone(),
                    value: name.clone(),
                })?;
            // JSONB stores enums textually; columns store the number.
            if field.is_jsonb() {
                Ok(TypedValue::EnumName(name))
            } else {
                Ok(TypedValue::EnumNumber(i64::from(number)))
            }
        }
        (FieldType::Enum(_), other) => Err(mismatch("enum", other.type_name())),
        (FieldType::Bytes, _) => Err(FilterError::NotFilterable(field.path.clone())),
        (FieldType::Message | FieldType::List(_) | FieldType::Map(_), other) => {
            Err(mismatch(ty.name(), other.type_name()))
        }
    }
}

/// `*` is only meaningful at the boundaries of an equality literal.
fn validate_wildcards(value: &str) -> Result<(), FilterError> {
    let mut interior = value;
    interior = interior.strip_prefix('*').unwrap_or(interior);
    interior = interior.strip_suffix('*').unwrap_or(interior);
    if interior.contains('*') {
        return Err(FilterError::WildcardInMiddle(value.to_string()));
    }
    Ok(())
}

/// Resolve an expression to a declared field.
///
/// Tries the textual dotted path first (covers both original and
/// replaced identifier forms), then walks selections so dynamic map keys
/// resolve against their map field, and unwraps `JSONB(...)` markers.
fn resolve_field(expr: &Expr, decls: &Declarations) -> Result<FieldRef, FilterError> {
    if let Some(path) = expr.as_path() {
        if let Some(field) = decls.lookup(&path) {
            return Ok(field.clone());
        }
    }
    match expr {
        Expr::Ident(name) => Err(FilterError::UnknownIdent(name.clone())),
        Expr::Select { base, field } => {
            // A map column can be key-accessible (via a `.*` pattern)
            // without being directly filterable.
            let parent = match resolve_field(base, decls) {
                Ok(parent) => parent,
                Err(err) => match base.as_path().and_then(|p| decls.lookup_map(&p)) {
                    Some(map_field) => map_field.clone(),
                    None => return Err(err),
                },
            };
            if let FieldType::Map(value_ty) = &parent.ty {
                let mut segments = parent.segments.clone();
                segments.push(field.clone());
                Ok(FieldRef {
                    path: format!("{}.{}", parent.path, field),
                    column: parent.column,
                    segments,
                    ty: (**value_ty).clone(),
                    via_repeated: parent.via_repeated,
                    is_map_key: true,
                    nullable: true,
                })
            } else {
                Err(FilterError::UnknownIdent(
                    expr.as_path().unwrap_or_else(|| expr.describe()),
                ))
            }
        }
        Expr::Call { func, args } if func == "JSONB" => {
            if args.len() != 1 {
                return Err(arity("JSONB", 1, args.len()));
            }
            match &args[0] {
                Expr::Ident(inner) => decls
                    .lookup(inner)
                    .cloned()
                    .ok_or_else(|| FilterError::UnknownIdent(inner.clone())),
                other => Err(FilterError::ExpectedField(other.describe())),
            }
        }
        Expr::Call { func, .. } => Err(FilterError::UnknownFunction(func.clone())),
        other => Err(FilterError::ExpectedField(other.describe())),
    }
}
