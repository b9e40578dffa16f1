use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// The canonical session record.
///
/// Encoded with prost for signing and transport; the custom metadata
/// map is a btree map so the encoding stays deterministic.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Session {
    #[prost(string, tag = "1")]
    pub id: String,

    /// Creation time, microseconds since the Unix epoch.
    #[prost(int64, tag = "2")]
    pub create_time_micros: i64,

    #[prost(oneof = "Identity", tags = "3, 4")]
    pub identity: Option<Identity>,

    #[prost(string, repeated, tag = "5")]
    pub role_ids: Vec<String>,

    /// Set once by the permission layer after a successful check;
    /// downstream hops trust it only under a verifying signature.
    #[prost(bool, tag = "6")]
    pub authorized: bool,

    #[prost(message, optional, tag = "7")]
    pub metadata: Option<SessionMetadata>,
}

/// Who the session belongs to.
#[derive(Clone, PartialEq, ::prost::Oneof)]
pub enum Identity {
    #[prost(message, tag = "3")]
    User(UserIdentity),
    #[prost(message, tag = "4")]
    ServiceAccount(ServiceAccountIdentity),
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UserIdentity {
    #[prost(string, tag = "1")]
    pub org_id: String,
    #[prost(string, tag = "2")]
    pub user_id: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServiceAccountIdentity {
    #[prost(string, tag = "1")]
    pub service_account_id: String,
    #[prost(enumeration = "ServiceAccountKind", tag = "2")]
    pub kind: i32,
}

/// How the service account authenticated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ServiceAccountKind {
    Unspecified = 0,
    ApiKey = 1,
    Internal = 2,
}

/// Call-level context recorded on the session.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SessionMetadata {
    #[prost(string, tag = "1")]
    pub ip: String,
    #[prost(string, tag = "2")]
    pub user_agent: String,
    #[prost(message, optional, tag = "3")]
    pub client_version: Option<ClientVersion>,
    #[prost(btree_map = "string, string", tag = "4")]
    pub custom: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientVersion {
    #[prost(uint32, tag = "1")]
    pub major: u32,
    #[prost(uint32, tag = "2")]
    pub minor: u32,
    #[prost(uint32, tag = "3")]
    pub patch: u32,
}

impl ClientVersion {
    /// Parse a `major.minor.patch` version string.
    pub fn parse(version: &str) -> Option<Self> {
        let mut parts = version.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            major,
            minor,
            patch,
        })
    }
}

impl std::fmt::Display for ClientVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Session {
    /// A fresh unauthorized session with a random id, created now.
    pub fn new(identity: Identity, role_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            create_time_micros: Utc::now().timestamp_micros(),
            identity: Some(identity),
            role_ids: role_ids.into_iter().collect(),
            authorized: false,
            metadata: None,
        }
    }

    pub fn for_user(
        org_id: impl Into<String>,
        user_id: impl Into<String>,
        role_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        Self::new(
            Identity::User(UserIdentity {
                org_id: org_id.into(),
                user_id: user_id.into(),
            }),
            role_ids,
        )
    }

    pub fn for_service_account(
        service_account_id: impl Into<String>,
        kind: ServiceAccountKind,
        role_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        Self::new(
            Identity::ServiceAccount(ServiceAccountIdentity {
                service_account_id: service_account_id.into(),
                kind: kind as i32,
            }),
            role_ids,
        )
    }

    pub fn with_metadata(mut self, metadata: SessionMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn create_time(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.create_time_micros).unwrap_or_default()
    }

    /// The service-account id, when the identity is one.
    pub fn service_account_id(&self) -> Option<&str> {
        match &self.identity {
            Some(Identity::ServiceAccount(sa)) => Some(&sa.service_account_id),
            _ => None,
        }
    }

    /// The `(org_id, user_id)` pair, when the identity is a user.
    pub fn user(&self) -> Option<(&str, &str)> {
        match &self.identity {
            Some(Identity::User(user)) => Some((&user.org_id, &user.user_id)),
            _ => None,
        }
    }
}

/// A session plus the HMAC tag over its canonical encoding.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignedSession {
    #[prost(message, optional, tag = "1")]
    pub session: Option<Session>,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn new_sessions_are_unauthorized() {
        let session = Session::for_user("org-1", "user-1", ["member".to_string()]);
        assert!(!session.authorized);
        assert_eq!(session.user(), Some(("org-1", "user-1")));
        assert_eq!(session.service_account_id(), None);
        assert!(!session.id.is_empty());
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut custom = BTreeMap::new();
        custom.insert("zone".to_string(), "eu-1".to_string());
        custom.insert("app".to_string(), "console".to_string());
        let session = Session {
            id: "fixed".to_string(),
            create_time_micros: 1_700_000_000_000_000,
            identity: Some(Identity::ServiceAccount(ServiceAccountIdentity {
                service_account_id: "sa-1".to_string(),
                kind: ServiceAccountKind::ApiKey as i32,
            })),
            role_ids: vec!["admin".to_string()],
            authorized: false,
            metadata: Some(SessionMetadata {
                ip: "10.0.0.1".to_string(),
                user_agent: "cli".to_string(),
                client_version: ClientVersion::parse("1.4.2"),
                custom,
            }),
        };
        assert_eq!(session.encode_to_vec(), session.clone().encode_to_vec());

        let decoded = Session::decode(session.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, session);
        assert_eq!(decoded.encode_to_vec(), session.encode_to_vec());
    }

    #[test]
    fn client_version_parsing() {
        assert_eq!(
            ClientVersion::parse("1.4.2"),
            Some(ClientVersion {
                major: 1,
                minor: 4,
                patch: 2
            })
        );
        assert_eq!(ClientVersion::parse("1.4"), None);
        assert_eq!(ClientVersion::parse("1.4.2.9"), None);
        assert_eq!(ClientVersion::parse("v1.4.2"), None);
        assert_eq!(ClientVersion::parse("1.4.2").unwrap().to_string(), "1.4.2");
    }

    #[test]
    fn service_account_kind_round_trips() {
        let identity = ServiceAccountIdentity {
            service_account_id: "sa-1".to_string(),
            kind: ServiceAccountKind::Internal as i32,
        };
        assert_eq!(identity.kind(), ServiceAccountKind::Internal);
        let unknown = ServiceAccountIdentity {
            service_account_id: "sa-1".to_string(),
            kind: 99,
        };
        assert_eq!(unknown.kind(), ServiceAccountKind::Unspecified);
    }
}
