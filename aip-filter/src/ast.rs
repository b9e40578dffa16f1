/// A literal in the untyped parse tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Constant {
    pub fn type_name(&self) -> &'static str {
        match self {
            Constant::Bool(_) => "bool",
            Constant::Int(_) => "int",
            Constant::Float(_) => "float",
            Constant::Str(_) => "string",
        }
    }
}

/// Untyped expression tree produced by the parser.
///
/// Operators are represented as calls keyed by their symbol (`"&&"`,
/// `"="`, `":"`, …); the checker turns them into typed nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Constant(Constant),

    /// A single identifier segment (may contain `@` after path
    /// replacement).
    Ident(String),

    /// `base.field` selection; dotted paths nest left.
    Select { base: Box<Expr>, field: String },

    /// Function call or operator application.
    Call { func: String, args: Vec<Expr> },

    /// The `*` marker, valid only as the right-hand side of `:`.
    Star,
}

impl Expr {
    pub(crate) fn call(func: &str, args: Vec<Expr>) -> Expr {
        Expr::Call {
            func: func.to_string(),
            args,
        }
    }

    /// Render an identifier path back to its dotted form, if this
    /// expression is one.
    pub fn as_path(&self) -> Option<String> {
        match self {
            Expr::Ident(name) => Some(name.clone()),
            Expr::Select { base, field } => Some(format!("{}.{}", base.as_path()?, field)),
            _ => None,
        }
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Expr::Constant(c) => format!("{} literal", c.type_name()),
            Expr::Ident(name) => format!("identifier {name}"),
            Expr::Select { .. } => self
                .as_path()
                .map(|p| format!("identifier {p}"))
                .unwrap_or_else(|| "selection".to_string()),
            Expr::Call { func, .. } => format!("call to {func}"),
            Expr::Star => "*".to_string(),
        }
    }
}
