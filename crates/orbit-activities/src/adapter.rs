//! Kafka and schema-registry capabilities and the per-invocation factory.
//!
//! Activities never hold connections across invocations: the factory builds
//! a [`TopicAdmin`] or [`SchemaRegistry`] from the physical cluster's
//! connection config at the start of an activity, and the capability is
//! dropped (closing its connection) on every exit path.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::ActivityContext;
use crate::error::{ActivityError, ActivityResult, status_to_error, transport_error};
use crate::kafka_wire::KafkaWireAdmin;
use crate::types::SchemaFormat;

/// Topic creation parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i16,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

/// Kafka ACL resource types (wire ids from the admin protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclResourceType {
    Topic,
    Group,
    Cluster,
    TransactionalId,
}

impl AclResourceType {
    pub(crate) fn wire_id(self) -> i8 {
        match self {
            Self::Topic => 2,
            Self::Group => 3,
            Self::Cluster => 4,
            Self::TransactionalId => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclPatternType {
    Literal,
    Prefixed,
}

impl AclPatternType {
    pub(crate) fn wire_id(self) -> i8 {
        match self {
            Self::Literal => 3,
            Self::Prefixed => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclOperation {
    All,
    Read,
    Write,
    Create,
    Delete,
    Alter,
    Describe,
}

impl AclOperation {
    pub(crate) fn wire_id(self) -> i8 {
        match self {
            Self::All => 2,
            Self::Read => 3,
            Self::Write => 4,
            Self::Create => 5,
            Self::Delete => 6,
            Self::Alter => 7,
            Self::Describe => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclPermission {
    Deny,
    Allow,
}

impl AclPermission {
    pub(crate) fn wire_id(self) -> i8 {
        match self {
            Self::Deny => 2,
            Self::Allow => 3,
        }
    }
}

/// A single ACL binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclSpec {
    pub resource_type: AclResourceType,
    pub resource_name: String,
    pub pattern_type: AclPatternType,
    pub principal: String,
    pub host: String,
    pub operation: AclOperation,
    pub permission_type: AclPermission,
}

impl AclSpec {
    /// The standard topic grant used across provisioning: literal pattern,
    /// any host, allow.
    pub fn topic_allow(topic: &str, principal: &str, operation: AclOperation) -> Self {
        Self {
            resource_type: AclResourceType::Topic,
            resource_name: topic.to_string(),
            pattern_type: AclPatternType::Literal,
            principal: principal.to_string(),
            host: "*".to_string(),
            operation,
            permission_type: AclPermission::Allow,
        }
    }
}

/// Topic and ACL administration on a physical cluster.
pub trait TopicAdmin: Send {
    fn create_topic(&mut self, ctx: &ActivityContext, spec: &TopicSpec) -> ActivityResult<()>;
    fn delete_topic(&mut self, ctx: &ActivityContext, name: &str) -> ActivityResult<()>;
    fn create_acl(&mut self, ctx: &ActivityContext, spec: &AclSpec) -> ActivityResult<()>;
    fn delete_acl(&mut self, ctx: &ActivityContext, spec: &AclSpec) -> ActivityResult<()>;
}

/// Schema text plus its registry type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSpec {
    pub schema: String,
    pub format: SchemaFormat,
}

/// Registration result.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RegisteredSchema {
    pub id: i64,
    pub version: i64,
}

/// Compatibility checks and registration against a schema registry.
pub trait SchemaRegistry: Send {
    fn check_compatibility(
        &mut self,
        ctx: &ActivityContext,
        subject: &str,
        spec: &SchemaSpec,
    ) -> ActivityResult<bool>;
    fn register_schema(
        &mut self,
        ctx: &ActivityContext,
        subject: &str,
        spec: &SchemaSpec,
    ) -> ActivityResult<RegisteredSchema>;
}

/// Connection parameters for a physical cluster.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfig {
    pub bootstrap_servers: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Builds capabilities per activity invocation; holds no connections itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdapterFactory;

impl AdapterFactory {
    pub fn topic_admin(
        &self,
        ctx: &ActivityContext,
        config: &ConnectionConfig,
    ) -> ActivityResult<Box<dyn TopicAdmin>> {
        if config.bootstrap_servers.trim().is_empty() {
            return Err(ActivityError::invalid_input(
                "bootstrap servers are required to build a topic admin",
            ));
        }
        let admin = KafkaWireAdmin::connect(ctx, config)?;
        Ok(Box::new(admin))
    }

    pub fn schema_registry(
        &self,
        url: &str,
        username: Option<String>,
        password: Option<String>,
    ) -> ActivityResult<Box<dyn SchemaRegistry>> {
        if url.trim().is_empty() {
            return Err(ActivityError::invalid_input(
                "schema registry url is required",
            ));
        }
        Ok(Box::new(SchemaRegistryClient::new(url, username, password)?))
    }
}

/// HTTP client for the Confluent-style registry surface.
pub struct SchemaRegistryClient {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    http: Client,
}

impl SchemaRegistryClient {
    pub fn new(
        base_url: &str,
        username: Option<String>,
        password: Option<String>,
    ) -> ActivityResult<Self> {
        let http = Client::builder()
            .user_agent(format!("orbit-activities/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ActivityError::unavailable(format!("building schema registry client: {e}"))
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
            http,
        })
    }

    fn post(
        &self,
        ctx: &ActivityContext,
        url: String,
        spec: &SchemaSpec,
        what: &str,
    ) -> ActivityResult<reqwest::blocking::Response> {
        ctx.ensure_active()?;
        let body = json!({
            "schema": spec.schema,
            "schemaType": spec.format.registry_string(),
        });
        let mut req = self
            .http
            .post(url)
            .timeout(ctx.remaining())
            .header("Content-Type", "application/vnd.schemaregistry.v1+json")
            .json(&body);
        if let Some(user) = &self.username {
            req = req.basic_auth(user, self.password.as_deref());
        }
        req.send().map_err(|e| transport_error(e, what))
    }
}

impl SchemaRegistry for SchemaRegistryClient {
    fn check_compatibility(
        &mut self,
        ctx: &ActivityContext,
        subject: &str,
        spec: &SchemaSpec,
    ) -> ActivityResult<bool> {
        let what = format!("checking compatibility for subject {subject}");
        let url = format!(
            "{}/compatibility/subjects/{}/versions/latest",
            self.base_url, subject
        );
        let resp = self.post(ctx, url, spec, &what)?;
        match resp.status() {
            StatusCode::OK => {
                let body: serde_json::Value =
                    resp.json().map_err(|e| transport_error(e, &what))?;
                Ok(body
                    .get("is_compatible")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false))
            }
            // Unknown subject: nothing registered yet, so any schema is
            // compatible.
            StatusCode::NOT_FOUND => Ok(true),
            status => {
                let hint = resp.text().unwrap_or_default().chars().take(200).collect::<String>();
                Err(status_to_error(status.as_u16(), &what, &hint))
            }
        }
    }

    fn register_schema(
        &mut self,
        ctx: &ActivityContext,
        subject: &str,
        spec: &SchemaSpec,
    ) -> ActivityResult<RegisteredSchema> {
        let what = format!("registering schema for subject {subject}");
        let url = format!("{}/subjects/{}/versions", self.base_url, subject);
        let resp = self.post(ctx, url, spec, &what)?;
        if !resp.status().is_success() {
            let status = resp.status();
            let hint = resp.text().unwrap_or_default().chars().take(200).collect::<String>();
            return Err(status_to_error(status.as_u16(), &what, &hint));
        }
        let body: serde_json::Value = resp.json().map_err(|e| transport_error(e, &what))?;
        let id = body.get("id").and_then(serde_json::Value::as_i64).unwrap_or(0);

        // The registration response carries only the id; the version comes
        // from the latest-version lookup.
        ctx.ensure_active()?;
        let latest_url = format!("{}/subjects/{}/versions/latest", self.base_url, subject);
        let mut req = self.http.get(latest_url).timeout(ctx.remaining());
        if let Some(user) = &self.username {
            req = req.basic_auth(user, self.password.as_deref());
        }
        let what_latest = format!("fetching latest version for subject {subject}");
        let latest = req.send().map_err(|e| transport_error(e, &what_latest))?;
        let version = if latest.status().is_success() {
            latest
                .json::<serde_json::Value>()
                .ok()
                .and_then(|v| v.get("version").and_then(serde_json::Value::as_i64))
                .unwrap_or(1)
        } else {
            1
        };

        Ok(RegisteredSchema { id, version })
    }
}
