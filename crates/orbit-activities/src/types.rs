//! Domain records for the CMS collections and the naming rules they share.
//!
//! Records are decoded from raw docs at the client boundary with the tolerant
//! coercions from [`crate::doc`]; relation fields keep only the id (plus the
//! populated doc where a consumer needs it). Status strings round-trip
//! through the enums here; values this layer does not know decode to the
//! `Unknown` carrier instead of failing a whole batch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::doc::{
    Doc, doc_id, extract_relation_id, get_bool, get_doc, get_int_value, get_str, get_string,
    relation_doc,
};

/// `"{workspaceSlug}-{appSlug}-{env}-"`: the namespace prefix other
/// components parse; topic and group prefixes are always identical.
pub fn namespace_prefix(workspace_slug: &str, app_slug: &str, environment: &str) -> String {
    format!("{workspace_slug}-{app_slug}-{environment}-")
}

/// `"{appSlug}.{env}.kafka.orbit.io"`
pub fn advertised_host(app_slug: &str, environment: &str) -> String {
    format!("{app_slug}.{environment}.kafka.orbit.io")
}

pub const DEFAULT_ADVERTISED_PORT: i64 = 9092;

/// The on-cluster topic name, stable for the topic's lifetime.
pub fn physical_topic_name(topic_prefix: &str, name: &str) -> String {
    format!("{topic_prefix}{name}")
}

fn get_datetime(doc: &Doc, field: &str) -> Option<DateTime<Utc>> {
    get_str(doc, field)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// Status enums

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Active,
    Decommissioning,
    Deleted,
    #[serde(untagged)]
    Unknown(String),
}

impl ApplicationStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "decommissioning" => Self::Decommissioning,
            "deleted" => Self::Deleted,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Decommissioning => "decommissioning",
            Self::Deleted => "deleted",
            Self::Unknown(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VirtualClusterStatus {
    Provisioning,
    Active,
    ReadOnly,
    Failed,
    Deleted,
    #[serde(untagged)]
    Unknown(String),
}

impl VirtualClusterStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "provisioning" => Self::Provisioning,
            "active" => Self::Active,
            "read_only" => Self::ReadOnly,
            "failed" => Self::Failed,
            "deleted" => Self::Deleted,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Active => "active",
            Self::ReadOnly => "read_only",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
            Self::Unknown(s) => s,
        }
    }

    /// provisioning → active | failed and active → deleted are one-way;
    /// anything non-terminal is in-flight.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Active | Self::Failed | Self::Deleted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Pending,
    Active,
    Deleted,
    Failed,
    #[serde(untagged)]
    Unknown(String),
}

impl TopicStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "active" => Self::Active,
            "deleted" => Self::Deleted,
            "failed" => Self::Failed,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Deleted => "deleted",
            Self::Failed => "failed",
            Self::Unknown(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Active,
    Revoked,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionTemplate {
    #[default]
    Unspecified,
    Producer,
    Consumer,
    Admin,
    Custom,
}

impl PermissionTemplate {
    pub fn parse(s: &str) -> Self {
        match s {
            "producer" => Self::Producer,
            "consumer" => Self::Consumer,
            "admin" => Self::Admin,
            "custom" => Self::Custom,
            _ => Self::Unspecified,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Producer => "producer",
            Self::Consumer => "consumer",
            Self::Admin => "admin",
            Self::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    Key,
    Value,
}

impl SchemaType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "key" => Some(Self::Key),
            "value" => Some(Self::Value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Key => "key",
            Self::Value => "value",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaFormat {
    Avro,
    Protobuf,
    Json,
}

impl SchemaFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "avro" => Some(Self::Avro),
            "protobuf" => Some(Self::Protobuf),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// The string the schema registry expects.
    pub fn registry_string(&self) -> &'static str {
        match self {
            Self::Avro => "AVRO",
            Self::Protobuf => "PROTOBUF",
            Self::Json => "JSON",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Produce,
    Consume,
}

impl Direction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "produce" => Some(Self::Produce),
            "consume" => Some(Self::Consume),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Produce => "produce",
            Self::Consume => "consume",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallationStatus {
    Active,
    Suspended,
    Revoked,
    #[serde(untagged)]
    Unknown(String),
}

impl InstallationStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "suspended" => Self::Suspended,
            "revoked" => Self::Revoked,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Revoked => "revoked",
            Self::Unknown(s) => s,
        }
    }
}

// ---------------------------------------------------------------------------
// Records

#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub id: String,
    pub slug: String,
    /// `kafkaConfig.serviceAccountName`, when the workspace pinned one.
    pub service_account_name: Option<String>,
}

impl Workspace {
    pub fn from_doc(doc: &Doc) -> Self {
        let service_account_name = get_doc(doc, "kafkaConfig")
            .and_then(|kc| get_str(kc, "serviceAccountName"))
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self {
            id: doc_id(doc),
            slug: get_string(doc, "slug"),
            service_account_name,
        }
    }

    /// `User:` principal for ACLs: pinned service-account name first, slug
    /// as the fallback.
    pub fn principal(&self) -> Option<String> {
        let name = self
            .service_account_name
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| Some(self.slug.clone()).filter(|s| !s.is_empty()))?;
        Some(format!("User:{name}"))
    }
}

#[derive(Debug, Clone)]
pub struct Application {
    pub id: String,
    pub slug: String,
    pub workspace_id: String,
    pub status: ApplicationStatus,
    pub cleanup_workflow_id: String,
    pub force_deleted: bool,
    /// Populated workspace when the query depth expanded it.
    pub workspace: Option<Workspace>,
}

impl Application {
    pub fn from_doc(doc: &Doc) -> Self {
        Self {
            id: doc_id(doc),
            slug: get_string(doc, "slug"),
            workspace_id: extract_relation_id(doc, "workspace"),
            status: ApplicationStatus::parse(&get_string(doc, "status")),
            cleanup_workflow_id: get_string(doc, "cleanupWorkflowId"),
            force_deleted: get_bool(doc, "forceDeleted"),
            workspace: relation_doc(doc, "workspace").map(Workspace::from_doc),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VirtualCluster {
    pub id: String,
    pub application_id: String,
    pub environment: String,
    pub topic_prefix: String,
    pub group_prefix: String,
    pub advertised_host: String,
    pub advertised_port: i64,
    pub physical_cluster_id: String,
    pub status: VirtualClusterStatus,
    pub provisioning_error: String,
    /// Populated cluster when the query depth expanded it.
    pub physical_cluster: Option<PhysicalCluster>,
}

impl VirtualCluster {
    pub fn from_doc(doc: &Doc) -> Self {
        let advertised_port = match get_int_value(doc, "advertisedPort") {
            0 => DEFAULT_ADVERTISED_PORT,
            p => p,
        };
        Self {
            id: doc_id(doc),
            application_id: extract_relation_id(doc, "application"),
            environment: get_string(doc, "environment"),
            topic_prefix: get_string(doc, "topicPrefix"),
            group_prefix: get_string(doc, "groupPrefix"),
            advertised_host: get_string(doc, "advertisedHost"),
            advertised_port,
            physical_cluster_id: extract_relation_id(doc, "physicalCluster"),
            status: VirtualClusterStatus::parse(&get_string(doc, "status")),
            provisioning_error: get_string(doc, "provisioningError"),
            physical_cluster: relation_doc(doc, "physicalCluster").map(PhysicalCluster::from_doc),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PhysicalCluster {
    pub id: String,
    pub bootstrap_servers: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub schema_registry_url: Option<String>,
    pub schema_registry_username: Option<String>,
    pub schema_registry_password: Option<String>,
}

impl PhysicalCluster {
    pub fn from_doc(doc: &Doc) -> Self {
        let bootstrap_servers = get_doc(doc, "connectionConfig")
            .and_then(|cc| get_str(cc, "bootstrapServers"))
            .unwrap_or_default()
            .to_string();
        let (username, password) = match get_doc(doc, "credentials") {
            Some(creds) => (
                get_str(creds, "username").map(str::to_string),
                get_str(creds, "password").map(str::to_string),
            ),
            None => (None, None),
        };
        let (sr_username, sr_password) = match get_doc(doc, "schemaRegistryCredentials") {
            Some(creds) => (
                get_str(creds, "username").map(str::to_string),
                get_str(creds, "password").map(str::to_string),
            ),
            None => (None, None),
        };
        Self {
            id: doc_id(doc),
            bootstrap_servers,
            username,
            password,
            schema_registry_url: get_str(doc, "schemaRegistryUrl")
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            schema_registry_username: sr_username,
            schema_registry_password: sr_password,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentMapping {
    pub id: String,
    pub environment: String,
    pub is_default: bool,
    pub cluster_id: String,
    pub cluster: Option<PhysicalCluster>,
}

impl EnvironmentMapping {
    pub fn from_doc(doc: &Doc) -> Self {
        Self {
            id: doc_id(doc),
            environment: get_string(doc, "environment"),
            is_default: get_bool(doc, "isDefault"),
            cluster_id: extract_relation_id(doc, "cluster"),
            cluster: relation_doc(doc, "cluster").map(PhysicalCluster::from_doc),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Topic {
    pub id: String,
    pub virtual_cluster_id: String,
    pub name: String,
    pub physical_name: String,
    pub partitions: i32,
    pub replication_factor: i32,
    pub config: BTreeMap<String, String>,
    pub status: TopicStatus,
    pub virtual_cluster: Option<VirtualCluster>,
}

impl Topic {
    pub fn from_doc(doc: &Doc) -> Self {
        let config = get_doc(doc, "config")
            .map(|cfg| {
                cfg.iter()
                    .filter_map(|(k, v)| {
                        let value = match v {
                            serde_json::Value::String(s) => s.clone(),
                            serde_json::Value::Number(n) => n.to_string(),
                            serde_json::Value::Bool(b) => b.to_string(),
                            _ => return None,
                        };
                        Some((k.clone(), value))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            id: doc_id(doc),
            virtual_cluster_id: extract_relation_id(doc, "virtualCluster"),
            name: get_string(doc, "name"),
            physical_name: get_string(doc, "physicalName"),
            partitions: get_int_value(doc, "partitions") as i32,
            replication_factor: get_int_value(doc, "replicationFactor") as i32,
            config,
            status: TopicStatus::parse(&get_string(doc, "status")),
            virtual_cluster: relation_doc(doc, "virtualCluster").map(VirtualCluster::from_doc),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopicSchemaRecord {
    pub id: String,
    pub topic_id: String,
    pub schema_type: Option<SchemaType>,
    pub format: Option<SchemaFormat>,
    pub content: String,
    pub registry_id: i64,
    pub latest_version: i64,
}

impl TopicSchemaRecord {
    pub fn from_doc(doc: &Doc) -> Self {
        Self {
            id: doc_id(doc),
            topic_id: extract_relation_id(doc, "topic"),
            schema_type: SchemaType::parse(&get_string(doc, "type")),
            format: SchemaFormat::parse(&get_string(doc, "format")),
            content: get_string(doc, "content"),
            registry_id: get_int_value(doc, "registryId"),
            latest_version: get_int_value(doc, "latestVersion"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceAccount {
    pub id: String,
    pub application_id: String,
    pub username: String,
    pub password_hash: String,
    pub permission_template: PermissionTemplate,
    pub status: String,
}

impl ServiceAccount {
    pub fn from_doc(doc: &Doc) -> Self {
        Self {
            id: doc_id(doc),
            application_id: extract_relation_id(doc, "application"),
            username: get_string(doc, "username"),
            password_hash: get_string(doc, "passwordHash"),
            permission_template: PermissionTemplate::parse(&get_string(doc, "permissionTemplate")),
            status: get_string(doc, "status"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LineageEdge {
    pub id: String,
    pub source_service_account: String,
    pub topic_id: String,
    pub direction: Option<Direction>,
    pub bytes_all_time: i64,
    pub messages_all_time: i64,
    pub bytes_last_24h: i64,
    pub messages_last_24h: i64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub consumer_group: String,
    pub workspace_id: String,
    pub topic: Option<Topic>,
    pub workspace: Option<Workspace>,
}

impl LineageEdge {
    pub fn from_doc(doc: &Doc) -> Self {
        Self {
            id: doc_id(doc),
            source_service_account: extract_relation_id(doc, "sourceServiceAccount"),
            topic_id: extract_relation_id(doc, "topic"),
            direction: Direction::parse(&get_string(doc, "direction")),
            bytes_all_time: get_int_value(doc, "bytesAllTime"),
            messages_all_time: get_int_value(doc, "messagesAllTime"),
            bytes_last_24h: get_int_value(doc, "bytesLast24h"),
            messages_last_24h: get_int_value(doc, "messagesLast24h"),
            first_seen: get_datetime(doc, "firstSeen"),
            last_seen: get_datetime(doc, "lastSeen"),
            is_active: get_bool(doc, "isActive"),
            consumer_group: get_string(doc, "consumerGroup"),
            workspace_id: extract_relation_id(doc, "workspace"),
            topic: relation_doc(doc, "topic").map(Topic::from_doc),
            workspace: relation_doc(doc, "workspace").map(Workspace::from_doc),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GithubInstallation {
    pub id: String,
    pub installation_id: i64,
    pub installation_token: String,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub status: InstallationStatus,
    pub account_login: String,
}

impl GithubInstallation {
    pub fn from_doc(doc: &Doc) -> Self {
        Self {
            id: doc_id(doc),
            installation_id: get_int_value(doc, "installationId"),
            installation_token: get_string(doc, "installationToken"),
            token_expires_at: get_datetime(doc, "tokenExpiresAt"),
            status: InstallationStatus::parse(&get_string(doc, "status")),
            account_login: get_string(doc, "accountLogin"),
        }
    }

    /// Expiry is a hard boundary: an elapsed token reads as absent.
    pub fn usable_token(&self, now: DateTime<Utc>) -> Option<&str> {
        if self.installation_token.is_empty() {
            return None;
        }
        match self.token_expires_at {
            Some(expires) if expires > now => Some(&self.installation_token),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegistryImage {
    pub id: String,
    pub workspace_id: String,
    pub application_id: String,
    pub tag: String,
    pub digest: String,
    pub repository: String,
    pub registry_url: String,
    pub size_bytes: i64,
    pub created_at: Option<DateTime<Utc>>,
}

impl RegistryImage {
    pub fn from_doc(doc: &Doc) -> Self {
        Self {
            id: doc_id(doc),
            workspace_id: extract_relation_id(doc, "workspace"),
            application_id: extract_relation_id(doc, "application"),
            tag: get_string(doc, "tag"),
            digest: get_string(doc, "digest"),
            repository: get_string(doc, "repository"),
            registry_url: get_string(doc, "registryUrl"),
            size_bytes: get_int_value(doc, "sizeBytes"),
            created_at: get_datetime(doc, "createdAt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> Doc {
        v.as_object().expect("object").clone()
    }

    #[test]
    fn namespace_prefix_shape() {
        assert_eq!(namespace_prefix("myws", "myapp", "dev"), "myws-myapp-dev-");
        assert_eq!(advertised_host("myapp", "dev"), "myapp.dev.kafka.orbit.io");
        assert_eq!(
            physical_topic_name("dev-myws-myapp-", "events"),
            "dev-myws-myapp-events"
        );
    }

    #[test]
    fn workspace_principal_prefers_pinned_service_account() {
        let pinned = Workspace {
            id: "ws-1".into(),
            slug: "myws".into(),
            service_account_name: Some("svc-x".into()),
        };
        assert_eq!(pinned.principal().as_deref(), Some("User:svc-x"));

        let slug_only = Workspace {
            id: "ws-1".into(),
            slug: "myws".into(),
            service_account_name: None,
        };
        assert_eq!(slug_only.principal().as_deref(), Some("User:myws"));

        let neither = Workspace::default();
        assert_eq!(neither.principal(), None);
    }

    #[test]
    fn workspace_decodes_nested_kafka_config() {
        let d = doc(json!({
            "id": "ws-1",
            "slug": "myws",
            "kafkaConfig": {"serviceAccountName": "svc-x"}
        }));
        let ws = Workspace::from_doc(&d);
        assert_eq!(ws.service_account_name.as_deref(), Some("svc-x"));
    }

    #[test]
    fn virtual_cluster_defaults_port_and_tolerates_relations() {
        let populated = doc(json!({
            "id": "vc-1",
            "application": {"id": "app-1", "slug": "myapp"},
            "environment": "dev",
            "topicPrefix": "myws-myapp-dev-",
            "status": "provisioning",
            "physicalCluster": {
                "id": "cl-1",
                "connectionConfig": {"bootstrapServers": "kafka:9092"}
            }
        }));
        let vc = VirtualCluster::from_doc(&populated);
        assert_eq!(vc.application_id, "app-1");
        assert_eq!(vc.advertised_port, DEFAULT_ADVERTISED_PORT);
        assert_eq!(vc.status, VirtualClusterStatus::Provisioning);
        assert!(!vc.status.is_terminal());
        assert_eq!(
            vc.physical_cluster.as_ref().map(|c| c.bootstrap_servers.as_str()),
            Some("kafka:9092")
        );

        let string_rel = doc(json!({
            "id": "vc-2",
            "application": "app-2",
            "advertisedPort": 9192
        }));
        let vc = VirtualCluster::from_doc(&string_rel);
        assert_eq!(vc.application_id, "app-2");
        assert_eq!(vc.advertised_port, 9192);
        assert!(vc.physical_cluster.is_none());
    }

    #[test]
    fn topic_config_coerces_scalar_values() {
        let d = doc(json!({
            "id": "t-1",
            "virtualCluster": "vc-1",
            "name": "events",
            "physicalName": "dev-ws-app-events",
            "partitions": 3.0,
            "replicationFactor": 2,
            "config": {"retention.ms": "604800000", "max.message.bytes": 1048576},
            "status": "pending"
        }));
        let topic = Topic::from_doc(&d);
        assert_eq!(topic.partitions, 3);
        assert_eq!(topic.replication_factor, 2);
        assert_eq!(
            topic.config.get("retention.ms").map(String::as_str),
            Some("604800000")
        );
        assert_eq!(
            topic.config.get("max.message.bytes").map(String::as_str),
            Some("1048576")
        );
        assert_eq!(topic.status, TopicStatus::Pending);
    }

    #[test]
    fn unknown_statuses_are_carried_not_dropped() {
        assert_eq!(
            ApplicationStatus::parse("archived"),
            ApplicationStatus::Unknown("archived".into())
        );
        assert_eq!(ApplicationStatus::parse("archived").as_str(), "archived");
    }

    #[test]
    fn schema_format_registry_strings() {
        assert_eq!(SchemaFormat::Avro.registry_string(), "AVRO");
        assert_eq!(SchemaFormat::Protobuf.registry_string(), "PROTOBUF");
        assert_eq!(SchemaFormat::Json.registry_string(), "JSON");
        assert_eq!(SchemaFormat::parse("xml"), None);
    }

    #[test]
    fn installation_token_expiry_is_a_hard_boundary() {
        let now = Utc::now();
        let mut inst = GithubInstallation {
            id: "gh-1".into(),
            installation_id: 42,
            installation_token: "sealed".into(),
            token_expires_at: Some(now + chrono::Duration::minutes(5)),
            status: InstallationStatus::Active,
            account_login: "org".into(),
        };
        assert_eq!(inst.usable_token(now), Some("sealed"));

        inst.token_expires_at = Some(now - chrono::Duration::seconds(1));
        assert_eq!(inst.usable_token(now), None);

        inst.token_expires_at = None;
        assert_eq!(inst.usable_token(now), None);
    }

    #[test]
    fn lineage_edge_counters_coerce_from_floats() {
        let d = doc(json!({
            "id": "edge-1",
            "sourceServiceAccount": "sa-1",
            "topic": "t-1",
            "direction": "produce",
            "bytesAllTime": 2048.0,
            "messagesAllTime": 20,
            "bytesLast24h": 1024.0,
            "messagesLast24h": 10,
            "isActive": true
        }));
        let edge = LineageEdge::from_doc(&d);
        assert_eq!(edge.direction, Some(Direction::Produce));
        assert_eq!(edge.bytes_all_time, 2048);
        assert_eq!(edge.bytes_last_24h, 1024);
        assert!(edge.bytes_all_time >= edge.bytes_last_24h);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            // Prefix algebra: topic and group prefixes are identical and the
            // physical name is always prefix + virtual name.
            #[test]
            fn prefix_invariants(
                ws in "[a-z][a-z0-9]{0,8}",
                app in "[a-z][a-z0-9]{0,8}",
                env in "[a-z]{2,6}",
                topic in "[a-z][a-z0-9.-]{0,12}",
            ) {
                let prefix = namespace_prefix(&ws, &app, &env);
                prop_assert!(prefix.ends_with('-'));
                let physical = physical_topic_name(&prefix, &topic);
                prop_assert!(physical.starts_with(&prefix));
                prop_assert_eq!(&physical[prefix.len()..], topic.as_str());
            }
        }
    }
}
