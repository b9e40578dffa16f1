use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tonic::Status;

use aip_session::SessionSigner;

use crate::chain::{CallContext, CallInterceptor};
use crate::config::{AuthConfig, ConfigError};

/// The set of full gRPC method names a server actually serves,
/// `/package.Service/Method`. Permission patterns are expanded against
/// it at construction.
#[derive(Debug, Clone, Default)]
pub struct MethodRegistry {
    methods: BTreeSet<String>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_method(&mut self, full_method: impl Into<String>) -> &mut Self {
        self.methods.insert(full_method.into());
        self
    }

    /// Register every method of one service:
    /// `add_service("users.UserService", ["GetUser", "ListUsers"])`.
    pub fn add_service<'a>(
        &mut self,
        service: &str,
        methods: impl IntoIterator<Item = &'a str>,
    ) -> &mut Self {
        for method in methods {
            self.methods.insert(format!("/{service}/{method}"));
        }
        self
    }

    /// Register methods under a tonic-generated service's name.
    pub fn add_named_service<'a, S: tonic::server::NamedService>(
        &mut self,
        methods: impl IntoIterator<Item = &'a str>,
    ) -> &mut Self {
        self.add_service(S::NAME, methods)
    }

    pub fn contains(&self, full_method: &str) -> bool {
        self.methods.contains(full_method)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Construction faults of the permission interceptor; startup-fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    Config(ConfigError),

    /// A permission (exact or glob) matching no registered method.
    UnmatchedPermission(String),

    /// A glob that does not compile.
    BadPattern { pattern: String, message: String },
}

impl std::fmt::Display for PermissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionError::Config(err) => write!(f, "{err}"),
            PermissionError::UnmatchedPermission(pattern) => {
                write!(f, "permission matches no registered method: {pattern}")
            }
            PermissionError::BadPattern { pattern, message } => {
                write!(f, "invalid permission pattern {pattern}: {message}")
            }
        }
    }
}

impl std::error::Error for PermissionError {}

impl From<ConfigError> for PermissionError {
    fn from(err: ConfigError) -> Self {
        PermissionError::Config(err)
    }
}

/// Method-level access requirements, as carried in method options.
///
/// When a method declares requirements they become its authorization
/// rule, replacing the plain permission-set lookup: all of
/// `required_permissions` and `required_role_ids` must hold, and at
/// least one of `any_permissions` / `any_role_ids` when those lists
/// are non-empty.
#[derive(Debug, Clone, Default)]
pub struct MethodRequirements {
    pub required_permissions: Vec<String>,
    pub required_role_ids: Vec<String>,
    pub any_permissions: Vec<String>,
    pub any_role_ids: Vec<String>,
}

/// Requirements with their permission patterns expanded to method sets.
#[derive(Debug)]
struct CompiledRequirements {
    required_methods: Vec<HashSet<String>>,
    any_methods: Vec<HashSet<String>>,
    required_role_ids: Vec<String>,
    any_role_ids: Vec<String>,
}

/// Per-method authorization.
///
/// Construction materializes, for every role and service account, the
/// exact set of full-method names it may call: role permissions close
/// over inheritance (memoized, cycles contribute nothing), then every
/// pattern (exact or `*` glob) expands against the registered
/// methods. The result is immutable and read lock-free by every call.
///
/// Per call: public methods pass through; otherwise the signed session
/// is verified, an already-authorized session passes, and an
/// authorization flip is performed (and re-signed) when the identity's
/// set contains the method (or the method's declared requirements are
/// met).
#[derive(Debug)]
pub struct PermissionInterceptor {
    signer: Arc<SessionSigner>,
    public_methods: HashSet<String>,
    role_methods: HashMap<String, HashSet<String>>,
    account_methods: HashMap<String, HashSet<String>>,
    method_requirements: HashMap<String, CompiledRequirements>,
}

impl PermissionInterceptor {
    pub fn new(
        config: &AuthConfig,
        registry: &MethodRegistry,
        signer: Arc<SessionSigner>,
    ) -> Result<Self, PermissionError> {
        config.validate()?;

        let mut role_methods = HashMap::new();
        let mut closures: HashMap<&str, BTreeSet<&str>> = HashMap::new();
        for role in &config.roles {
            let mut visiting = HashSet::new();
            let patterns = close_role(config, &role.id, &mut closures, &mut visiting);
            let methods = expand_patterns(patterns.iter().copied(), registry)?;
            role_methods.insert(role.id.clone(), methods);
        }

        let mut account_methods = HashMap::new();
        for account in &config.service_accounts {
            let methods =
                expand_patterns(account.permissions.iter().map(String::as_str), registry)?;
            account_methods.insert(account.id.clone(), methods);
        }

        let public_methods =
            expand_patterns(config.public_methods.iter().map(String::as_str), registry)?;

        tracing::debug!(
            roles = role_methods.len(),
            accounts = account_methods.len(),
            public = public_methods.len(),
            "permission interceptor materialized"
        );
        Ok(Self {
            signer,
            public_methods,
            role_methods,
            account_methods,
            method_requirements: HashMap::new(),
        })
    }

    /// Declare per-method requirements; each named method must be
    /// registered and each permission pattern must expand.
    pub fn with_method_requirements(
        mut self,
        registry: &MethodRegistry,
        requirements: impl IntoIterator<Item = (String, MethodRequirements)>,
    ) -> Result<Self, PermissionError> {
        for (method, req) in requirements {
            if !registry.contains(&method) {
                return Err(PermissionError::UnmatchedPermission(method));
            }
            let expand_each = |patterns: &[String]| -> Result<Vec<HashSet<String>>, PermissionError> {
                patterns
                    .iter()
                    .map(|pattern| expand_patterns(std::iter::once(pattern.as_str()), registry))
                    .collect()
            };
            let compiled = CompiledRequirements {
                required_methods: expand_each(&req.required_permissions)?,
                any_methods: expand_each(&req.any_permissions)?,
                required_role_ids: req.required_role_ids,
                any_role_ids: req.any_role_ids,
            };
            self.method_requirements.insert(method, compiled);
        }
        Ok(self)
    }

    /// Panicking constructor for static initialization.
    pub fn must_new(
        config: &AuthConfig,
        registry: &MethodRegistry,
        signer: Arc<SessionSigner>,
    ) -> Self {
        Self::new(config, registry, signer)
            .unwrap_or_else(|err| panic!("building permission interceptor: {err}"))
    }

    /// The materialized method set of a role, for introspection.
    pub fn role_methods(&self, role_id: &str) -> Option<&HashSet<String>> {
        self.role_methods.get(role_id)
    }

    fn is_permitted(&self, session: &aip_session::Session, full_method: &str) -> bool {
        if let Some(account_id) = session.service_account_id() {
            if self
                .account_methods
                .get(account_id)
                .is_some_and(|methods| methods.contains(full_method))
            {
                return true;
            }
        }
        session.role_ids.iter().any(|role_id| {
            self.role_methods
                .get(role_id)
                .is_some_and(|methods| methods.contains(full_method))
        })
    }

    fn meets_requirements(
        &self,
        session: &aip_session::Session,
        requirements: &CompiledRequirements,
    ) -> bool {
        let has_role = |role_id: &String| session.role_ids.iter().any(|r| r == role_id);
        // Holding a permission means holding every method it expanded
        // to.
        let holds = |methods: &HashSet<String>| {
            methods
                .iter()
                .all(|method| self.is_permitted(session, method))
        };
        requirements.required_role_ids.iter().all(has_role)
            && (requirements.any_role_ids.is_empty()
                || requirements.any_role_ids.iter().any(has_role))
            && requirements.required_methods.iter().all(|m| holds(m))
            && (requirements.any_methods.is_empty()
                || requirements.any_methods.iter().any(|m| holds(m)))
    }
}

impl CallInterceptor for PermissionInterceptor {
    fn intercept(&self, ctx: &mut CallContext) -> Result<(), Status> {
        if self.public_methods.contains(&ctx.full_method) {
            return Ok(());
        }
        let signed = ctx
            .session
            .as_ref()
            .ok_or_else(|| Status::unauthenticated("no signed session"))?;
        if !self.signer.verify(signed) {
            return Err(Status::unauthenticated("session signature does not verify"));
        }
        let session = signed
            .session
            .as_ref()
            .ok_or_else(|| Status::unauthenticated("signed bundle carries no session"))?;

        // A prior hop already authorized this session; the verified
        // signature is what makes the bit trustworthy.
        if session.authorized {
            return Ok(());
        }

        let permitted = match self.method_requirements.get(&ctx.full_method) {
            Some(requirements) => self.meets_requirements(session, requirements),
            None => self.is_permitted(session, &ctx.full_method),
        };
        if !permitted {
            tracing::debug!(
                session_id = %session.id,
                method = %ctx.full_method,
                "permission denied"
            );
            return Err(Status::permission_denied(format!(
                "not permitted to call {}",
                ctx.full_method
            )));
        }

        let authorized = self.signer.authorize(signed).map_err(Status::from)?;
        ctx.session = Some(authorized);
        Ok(())
    }
}

/// Transitive permission patterns of a role. Memoized per construction;
/// a role currently being visited (a cycle) contributes nothing.
fn close_role<'a>(
    config: &'a AuthConfig,
    role_id: &'a str,
    closures: &mut HashMap<&'a str, BTreeSet<&'a str>>,
    visiting: &mut HashSet<&'a str>,
) -> BTreeSet<&'a str> {
    if let Some(cached) = closures.get(role_id) {
        return cached.clone();
    }
    if !visiting.insert(role_id) {
        return BTreeSet::new();
    }
    let mut patterns = BTreeSet::new();
    if let Some(role) = config.role(role_id) {
        patterns.extend(role.permissions.iter().map(String::as_str));
        for inherited in &role.inherited_role_ids {
            patterns.extend(close_role(config, inherited, closures, visiting));
        }
    }
    visiting.remove(role_id);
    closures.insert(role_id, patterns.clone());
    patterns
}

/// Expand exact and glob patterns against the registered methods. Every
/// pattern must match at least one method.
fn expand_patterns<'a>(
    patterns: impl Iterator<Item = &'a str>,
    registry: &MethodRegistry,
) -> Result<HashSet<String>, PermissionError> {
    let mut methods = HashSet::new();
    for pattern in patterns {
        if pattern.contains('*') {
            let regex = compile_glob(pattern)?;
            let mut matched = false;
            for method in registry.iter() {
                if regex.is_match(method) {
                    methods.insert(method.to_string());
                    matched = true;
                }
            }
            if !matched {
                return Err(PermissionError::UnmatchedPermission(pattern.to_string()));
            }
        } else {
            if !registry.contains(pattern) {
                return Err(PermissionError::UnmatchedPermission(pattern.to_string()));
            }
            methods.insert(pattern.to_string());
        }
    }
    Ok(methods)
}

/// `*` becomes `.*`; everything else is quoted; the result is anchored.
fn compile_glob(pattern: &str) -> Result<regex::Regex, PermissionError> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    let mut first = true;
    for part in pattern.split('*') {
        if !first {
            source.push_str(".*");
        }
        source.push_str(&regex::escape(part));
        first = false;
    }
    source.push('$');
    regex::Regex::new(&source).map_err(|err| PermissionError::BadPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    })
}
