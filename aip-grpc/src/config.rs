use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

/// Authentication-plane configuration: roles with inheritance, service
/// accounts, and the public-method bypass list.
///
/// Loadable from YAML or built programmatically; validated before the
/// permission interceptor is constructed.
///
/// ```yaml
/// roles:
///   - id: reader
///     permissions: ["/users.UserService/GetUser"]
///   - id: admin
///     inherited_role_ids: [reader]
///     permissions: ["/users.UserService/*"]
/// service_accounts:
///   - id: billing
///     api_key: bk-123
///     role_ids: [reader]
/// public_methods:
///   - /health.Health/Check
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub roles: Vec<RoleConfig>,

    #[serde(default)]
    pub service_accounts: Vec<ServiceAccountConfig>,

    /// Methods that bypass authorization entirely.
    #[serde(default)]
    pub public_methods: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleConfig {
    pub id: String,

    /// Roles whose permissions this role also grants. A directed
    /// graph, not a tree; cycles contribute nothing.
    #[serde(default)]
    pub inherited_role_ids: Vec<String>,

    /// Exact full-method names or `*` globs.
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceAccountConfig {
    pub id: String,

    /// API key this account authenticates with, when key-based.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub role_ids: Vec<String>,

    /// Account-specific permissions on top of its roles.
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl AuthConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AuthConfig =
            serde_yaml::from_str(content).map_err(|err| ConfigError::Load(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|err| ConfigError::Load(err.to_string()))?;
        Self::from_yaml_str(&content)
    }

    /// Structural validation: ids are unique and inheritance points at
    /// declared roles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut role_ids = HashSet::new();
        for role in &self.roles {
            if !role_ids.insert(role.id.as_str()) {
                return Err(ConfigError::DuplicateRole(role.id.clone()));
            }
        }
        for role in &self.roles {
            for inherited in &role.inherited_role_ids {
                if !role_ids.contains(inherited.as_str()) {
                    return Err(ConfigError::UnknownInheritedRole {
                        role: role.id.clone(),
                        inherited: inherited.clone(),
                    });
                }
            }
        }
        let mut account_ids = HashSet::new();
        for account in &self.service_accounts {
            if !account_ids.insert(account.id.as_str()) {
                return Err(ConfigError::DuplicateServiceAccount(account.id.clone()));
            }
            for role_id in &account.role_ids {
                if !role_ids.contains(role_id.as_str()) {
                    return Err(ConfigError::UnknownAccountRole {
                        account: account.id.clone(),
                        role: role_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn role(&self, id: &str) -> Option<&RoleConfig> {
        self.roles.iter().find(|role| role.id == id)
    }

    pub fn service_account(&self, id: &str) -> Option<&ServiceAccountConfig> {
        self.service_accounts.iter().find(|account| account.id == id)
    }
}

/// Configuration faults; all are startup-fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Load(String),
    DuplicateRole(String),
    UnknownInheritedRole { role: String, inherited: String },
    DuplicateServiceAccount(String),
    UnknownAccountRole { account: String, role: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "loading auth config: {msg}"),
            ConfigError::DuplicateRole(id) => write!(f, "duplicate role id: {id}"),
            ConfigError::UnknownInheritedRole { role, inherited } => {
                write!(f, "role {role} inherits unknown role {inherited}")
            }
            ConfigError::DuplicateServiceAccount(id) => {
                write!(f, "duplicate service account id: {id}")
            }
            ConfigError::UnknownAccountRole { account, role } => {
                write!(f, "service account {account} references unknown role {role}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
