//! Topic provisioning, access control, and schema registration.
//!
//! The physical name rule (`topicPrefix + name`) and the permission → ACL
//! enumeration live here as pure functions; the activities wire them to the
//! adapter capability and write the outcome (including the failure cause)
//! back to the topic record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::adapter::{
    AclOperation, AclSpec, AdapterFactory, ConnectionConfig, SchemaSpec, TopicAdmin, TopicSpec,
};
use crate::cms::{CmsClient, collections};
use crate::context::{ActivityContext, require};
use crate::error::{ActivityError, ActivityResult};
use crate::types::{
    self, PhysicalCluster, SchemaFormat, SchemaType, TopicSchemaRecord, TopicStatus,
    VirtualCluster, Workspace,
};

// ---------------------------------------------------------------------------
// Pure pieces

/// Merge topic configuration: the explicit fields are written first, then
/// the generic map overwrites, so explicit config in the map wins.
pub fn build_topic_config(
    retention_ms: Option<i64>,
    cleanup_policy: Option<&str>,
    compression: Option<&str>,
    overrides: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut config = BTreeMap::new();
    if let Some(retention) = retention_ms {
        config.insert("retention.ms".to_string(), retention.to_string());
    }
    if let Some(policy) = cleanup_policy.filter(|p| !p.is_empty()) {
        config.insert("cleanup.policy".to_string(), policy.to_string());
    }
    if let Some(compression) = compression.filter(|c| !c.is_empty()) {
        config.insert("compression.type".to_string(), compression.to_string());
    }
    for (key, value) in overrides {
        config.insert(key.clone(), value.clone());
    }
    config
}

/// The ACL set a permission grants on a topic: DESCRIBE always, READ and/or
/// WRITE per the permission; anything unrecognized grants DESCRIBE only.
pub fn acl_set_for_permission(permission: &str, topic: &str, principal: &str) -> Vec<AclSpec> {
    let mut operations = vec![AclOperation::Describe];
    match permission {
        "read_write" => {
            operations.push(AclOperation::Read);
            operations.push(AclOperation::Write);
        }
        "read" => operations.push(AclOperation::Read),
        "write" => operations.push(AclOperation::Write),
        _ => {}
    }
    operations
        .into_iter()
        .map(|op| AclSpec::topic_allow(topic, principal, op))
        .collect()
}

// ---------------------------------------------------------------------------
// Connection resolution

/// Resolved cluster connection plus the prefix the topic lives under.
#[derive(Debug, Clone, Default)]
pub struct TopicTarget {
    pub connection: ConnectionConfig,
    pub topic_prefix: String,
}

/// Resolve the cluster for a topic: direct bootstrap servers when the input
/// carries them, otherwise topic → virtual cluster → physical cluster.
pub fn resolve_topic_target(
    ctx: &ActivityContext,
    cms: &CmsClient,
    topic_id: &str,
    bootstrap_servers: &str,
    topic_prefix: &str,
) -> ActivityResult<TopicTarget> {
    if !bootstrap_servers.is_empty() {
        return Ok(TopicTarget {
            connection: ConnectionConfig {
                bootstrap_servers: bootstrap_servers.to_string(),
                username: None,
                password: None,
            },
            topic_prefix: topic_prefix.to_string(),
        });
    }

    require("topic_id", topic_id)?;
    let doc = cms.get_with_depth(ctx, collections::TOPICS, topic_id, 2)?;
    let vc = crate::doc::relation_doc(&doc, "virtualCluster")
        .map(VirtualCluster::from_doc)
        .ok_or_else(|| {
            ActivityError::invalid_input(format!("topic {topic_id} has no populated virtual cluster"))
        })?;
    let cluster = vc.physical_cluster.as_ref().cloned().ok_or_else(|| {
        ActivityError::invalid_input(format!(
            "virtual cluster {} has no populated physical cluster",
            vc.id
        ))
    })?;
    if cluster.bootstrap_servers.is_empty() {
        return Err(ActivityError::invalid_input(format!(
            "cluster {} has no bootstrap servers",
            cluster.id
        )));
    }

    Ok(TopicTarget {
        connection: ConnectionConfig {
            bootstrap_servers: cluster.bootstrap_servers.clone(),
            username: cluster.username.clone(),
            password: cluster.password.clone(),
        },
        topic_prefix: if topic_prefix.is_empty() {
            vc.topic_prefix.clone()
        } else {
            topic_prefix.to_string()
        },
    })
}

// ---------------------------------------------------------------------------
// Provision topic

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionTopicInput {
    /// Topic record id; optional when the caller passes bootstrap servers
    /// and prefix directly.
    #[serde(default)]
    pub topic_id: String,
    pub topic_name: String,
    #[serde(default)]
    pub topic_prefix: String,
    pub partitions: i32,
    pub replication_factor: i16,
    #[serde(default)]
    pub retention_ms: Option<i64>,
    #[serde(default)]
    pub cleanup_policy: Option<String>,
    #[serde(default)]
    pub compression: Option<String>,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    #[serde(default)]
    pub bootstrap_servers: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionTopicOutput {
    pub physical_name: String,
    /// True when the cluster already had the topic.
    pub already_existed: bool,
}

impl ProvisionTopicInput {
    fn validate(&self) -> ActivityResult<()> {
        require("topic_name", &self.topic_name)?;
        if self.partitions <= 0 {
            return Err(ActivityError::invalid_input("partitions must be positive"));
        }
        if self.replication_factor <= 0 {
            return Err(ActivityError::invalid_input(
                "replication_factor must be positive",
            ));
        }
        Ok(())
    }
}

/// Create the physical topic. The spec is assembled from the explicit fields
/// plus the generic config map; re-runs observe the existing topic and
/// succeed.
pub fn provision_topic(
    ctx: &ActivityContext,
    cms: &CmsClient,
    factory: &AdapterFactory,
    input: &ProvisionTopicInput,
) -> ActivityResult<ProvisionTopicOutput> {
    input.validate()?;
    ctx.info(&format!("provisioning topic {}", input.topic_name));

    let target = resolve_topic_target(
        ctx,
        cms,
        &input.topic_id,
        &input.bootstrap_servers,
        &input.topic_prefix,
    )?;
    let mut admin = factory.topic_admin(ctx, &target.connection)?;

    match provision_on_cluster(ctx, admin.as_mut(), &target.topic_prefix, input) {
        Ok(output) => {
            if !input.topic_id.is_empty() {
                cms.update_internal(
                    ctx,
                    collections::TOPICS,
                    &input.topic_id,
                    json!({
                        "status": "active",
                        "physicalName": output.physical_name,
                        "provisioningError": "",
                    }),
                )?;
            }
            ctx.info(&format!(
                "topic {} provisioned as {}",
                input.topic_name, output.physical_name
            ));
            Ok(output)
        }
        Err(err) => {
            // Surface the last cause on the record before failing the
            // activity.
            if !input.topic_id.is_empty() {
                let _ = cms.update_internal(
                    ctx,
                    collections::TOPICS,
                    &input.topic_id,
                    json!({
                        "status": "failed",
                        "provisioningError": err.cause_string(),
                    }),
                );
            }
            Err(err)
        }
    }
}

/// Core create against an already-resolved admin; separated so the wiring
/// and the semantics test independently.
pub fn provision_on_cluster(
    ctx: &ActivityContext,
    admin: &mut dyn TopicAdmin,
    topic_prefix: &str,
    input: &ProvisionTopicInput,
) -> ActivityResult<ProvisionTopicOutput> {
    let physical_name = types::physical_topic_name(topic_prefix, &input.topic_name);
    let spec = TopicSpec {
        name: physical_name.clone(),
        partitions: input.partitions,
        replication_factor: input.replication_factor,
        config: build_topic_config(
            input.retention_ms,
            input.cleanup_policy.as_deref(),
            input.compression.as_deref(),
            &input.config,
        ),
    };

    match admin.create_topic(ctx, &spec) {
        Ok(()) => Ok(ProvisionTopicOutput {
            physical_name,
            already_existed: false,
        }),
        Err(ActivityError::Conflict(_)) => {
            ctx.info(&format!("topic {physical_name} already exists"));
            Ok(ProvisionTopicOutput {
                physical_name,
                already_existed: true,
            })
        }
        Err(err) => Err(err),
    }
}

// ---------------------------------------------------------------------------
// Update topic status

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTopicStatusInput {
    pub topic_id: String,
    /// pending | active | deleted | failed
    pub status: String,
    #[serde(default)]
    pub provisioning_error: String,
    #[serde(default)]
    pub registry_id: Option<i64>,
    #[serde(default)]
    pub latest_version: Option<i64>,
}

/// Status transition on the topic record, optionally carrying schema
/// registration results.
pub fn update_topic_status(
    ctx: &ActivityContext,
    cms: &CmsClient,
    input: &UpdateTopicStatusInput,
) -> ActivityResult<()> {
    require("topic_id", &input.topic_id)?;
    require("status", &input.status)?;
    if matches!(TopicStatus::parse(&input.status), TopicStatus::Unknown(_)) {
        return Err(ActivityError::invalid_input(format!(
            "unknown topic status {}",
            input.status
        )));
    }
    ctx.info(&format!(
        "updating topic {} status to {}",
        input.topic_id, input.status
    ));

    let mut patch = json!({
        "status": input.status,
        "provisioningError": input.provisioning_error,
    });
    if input.status == "deleted" {
        patch["deletedAt"] = json!(chrono::Utc::now().to_rfc3339());
    }
    if let Some(registry_id) = input.registry_id {
        patch["registryId"] = json!(registry_id);
    }
    if let Some(latest_version) = input.latest_version {
        patch["latestVersion"] = json!(latest_version);
    }
    cms.update_internal(ctx, collections::TOPICS, &input.topic_id, patch)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Grant / revoke access

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicAccessInput {
    #[serde(default)]
    pub topic_id: String,
    /// Physical topic name; resolved from the record when empty.
    #[serde(default)]
    pub topic_physical_name: String,
    pub workspace_id: String,
    /// describe | read | write | read_write
    pub permission: String,
    #[serde(default)]
    pub bootstrap_servers: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicAccessOutput {
    pub acls_applied: usize,
    /// Revoke only: ACLs that were already gone.
    pub acls_missing: usize,
    pub principal: String,
}

/// Derive the `User:` principal for a workspace.
pub fn resolve_principal(
    ctx: &ActivityContext,
    cms: &CmsClient,
    workspace_id: &str,
) -> ActivityResult<String> {
    let doc = cms.get(ctx, collections::WORKSPACES, workspace_id)?;
    Workspace::from_doc(&doc).principal().ok_or_else(|| {
        ActivityError::invalid_input(format!(
            "workspace {workspace_id} has neither a service account name nor a slug"
        ))
    })
}

fn resolve_physical_name(
    ctx: &ActivityContext,
    cms: &CmsClient,
    input: &TopicAccessInput,
) -> ActivityResult<String> {
    if !input.topic_physical_name.is_empty() {
        return Ok(input.topic_physical_name.clone());
    }
    require("topic_id", &input.topic_id)?;
    let doc = cms.get(ctx, collections::TOPICS, &input.topic_id)?;
    let topic = crate::types::Topic::from_doc(&doc);
    if topic.physical_name.is_empty() {
        return Err(ActivityError::invalid_input(format!(
            "topic {} has no physical name",
            input.topic_id
        )));
    }
    Ok(topic.physical_name)
}

/// Create the permission's ACL set on the physical topic.
pub fn grant_topic_access(
    ctx: &ActivityContext,
    cms: &CmsClient,
    factory: &AdapterFactory,
    input: &TopicAccessInput,
) -> ActivityResult<TopicAccessOutput> {
    require("workspace_id", &input.workspace_id)?;
    require("permission", &input.permission)?;
    let physical_name = resolve_physical_name(ctx, cms, input)?;
    let principal = resolve_principal(ctx, cms, &input.workspace_id)?;
    ctx.info(&format!(
        "granting {} on {} to {}",
        input.permission, physical_name, principal
    ));

    let target = resolve_topic_target(
        ctx,
        cms,
        &input.topic_id,
        &input.bootstrap_servers,
        "",
    )?;
    let mut admin = factory.topic_admin(ctx, &target.connection)?;
    let applied = grant_on_cluster(ctx, admin.as_mut(), &physical_name, &input.permission, &principal)?;

    ctx.info(&format!("granted ({applied} acls)"));
    Ok(TopicAccessOutput {
        acls_applied: applied,
        acls_missing: 0,
        principal,
    })
}

/// Core grant; duplicate ACLs count as applied.
pub fn grant_on_cluster(
    ctx: &ActivityContext,
    admin: &mut dyn TopicAdmin,
    physical_name: &str,
    permission: &str,
    principal: &str,
) -> ActivityResult<usize> {
    let mut applied = 0;
    for acl in acl_set_for_permission(permission, physical_name, principal) {
        match admin.create_acl(ctx, &acl) {
            Ok(()) | Err(ActivityError::Conflict(_)) => applied += 1,
            Err(err) => return Err(err),
        }
    }
    Ok(applied)
}

/// Delete the permission's ACL set; missing ACLs are warned and ignored.
pub fn revoke_topic_access(
    ctx: &ActivityContext,
    cms: &CmsClient,
    factory: &AdapterFactory,
    input: &TopicAccessInput,
) -> ActivityResult<TopicAccessOutput> {
    require("workspace_id", &input.workspace_id)?;
    require("permission", &input.permission)?;
    let physical_name = resolve_physical_name(ctx, cms, input)?;
    let principal = resolve_principal(ctx, cms, &input.workspace_id)?;
    ctx.info(&format!(
        "revoking {} on {} from {}",
        input.permission, physical_name, principal
    ));

    let target = resolve_topic_target(
        ctx,
        cms,
        &input.topic_id,
        &input.bootstrap_servers,
        "",
    )?;
    let mut admin = factory.topic_admin(ctx, &target.connection)?;
    let (revoked, missing) = revoke_on_cluster(ctx, admin.as_mut(), &physical_name, &input.permission, &principal)?;

    ctx.info(&format!("revoked ({revoked} acls, {missing} already gone)"));
    Ok(TopicAccessOutput {
        acls_applied: revoked,
        acls_missing: missing,
        principal,
    })
}

/// Core revoke: best-effort over the same enumerated set.
pub fn revoke_on_cluster(
    ctx: &ActivityContext,
    admin: &mut dyn TopicAdmin,
    physical_name: &str,
    permission: &str,
    principal: &str,
) -> ActivityResult<(usize, usize)> {
    let mut revoked = 0;
    let mut missing = 0;
    for acl in acl_set_for_permission(permission, physical_name, principal) {
        match admin.delete_acl(ctx, &acl) {
            Ok(()) => revoked += 1,
            Err(ActivityError::NotFound(what)) => {
                ctx.warn(&format!("{what} was already absent"));
                missing += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok((revoked, missing))
}

// ---------------------------------------------------------------------------
// Schema registration

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterSchemaInput {
    /// The schema record the result is persisted to.
    pub schema_doc_id: String,
    pub topic_name: String,
    /// key | value
    pub schema_type: String,
    /// avro | protobuf | json
    pub format: String,
    pub content: String,
    /// Explicit registry; resolved from the topic's cluster when empty.
    #[serde(default)]
    pub registry_url: String,
    #[serde(default)]
    pub topic_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSchemaOutput {
    pub subject: String,
    pub registry_id: i64,
    pub version: i64,
}

/// Validate compatibility and register under `{topicName}-{type}`,
/// persisting the result to the schema record. When the workflow passes
/// only the record id, the type, format, content, and topic come from the
/// record itself.
pub fn register_topic_schema(
    ctx: &ActivityContext,
    cms: &CmsClient,
    factory: &AdapterFactory,
    input: &RegisterSchemaInput,
) -> ActivityResult<RegisterSchemaOutput> {
    require("schema_doc_id", &input.schema_doc_id)?;
    let (topic_name, schema_type, format, content, topic_id) = if input.content.is_empty() {
        let doc = cms.get(ctx, collections::SCHEMAS, &input.schema_doc_id)?;
        let record = TopicSchemaRecord::from_doc(&doc);
        let schema_type = record.schema_type.ok_or_else(|| {
            ActivityError::invalid_input(format!("schema {} has no type", input.schema_doc_id))
        })?;
        let format = record.format.ok_or_else(|| {
            ActivityError::invalid_input(format!("schema {} has no format", input.schema_doc_id))
        })?;
        if record.content.is_empty() {
            return Err(ActivityError::invalid_input(format!(
                "schema {} has no content",
                input.schema_doc_id
            )));
        }
        let topic_name = if input.topic_name.is_empty() {
            require("topic", &record.topic_id)?;
            let topic_doc = cms.get(ctx, collections::TOPICS, &record.topic_id)?;
            crate::types::Topic::from_doc(&topic_doc).name
        } else {
            input.topic_name.clone()
        };
        (topic_name, schema_type, format, record.content, record.topic_id)
    } else {
        require("topic_name", &input.topic_name)?;
        let schema_type = SchemaType::parse(&input.schema_type).ok_or_else(|| {
            ActivityError::invalid_input(format!("unknown schema type {}", input.schema_type))
        })?;
        let format = SchemaFormat::parse(&input.format).ok_or_else(|| {
            ActivityError::invalid_input(format!("unknown schema format {}", input.format))
        })?;
        (
            input.topic_name.clone(),
            schema_type,
            format,
            input.content.clone(),
            input.topic_id.clone(),
        )
    };
    let subject = format!("{}-{}", topic_name, schema_type.as_str());
    ctx.info(&format!("registering schema for subject {subject}"));

    let (registry_url, username, password) = if input.registry_url.is_empty() {
        resolve_registry(ctx, cms, &topic_id)?
    } else {
        (input.registry_url.clone(), None, None)
    };
    let mut registry = factory.schema_registry(&registry_url, username, password)?;

    let spec = SchemaSpec { schema: content, format };
    let result = (|| {
        if !registry.check_compatibility(ctx, &subject, &spec)? {
            return Err(ActivityError::invalid_input(format!(
                "schema for {subject} is incompatible with the latest registered version"
            )));
        }
        registry.register_schema(ctx, &subject, &spec)
    })();

    match result {
        Ok(registered) => {
            cms.update_internal(
                ctx,
                collections::SCHEMAS,
                &input.schema_doc_id,
                json!({
                    "registryId": registered.id,
                    "latestVersion": registered.version,
                    "status": "active",
                    "registrationError": "",
                }),
            )?;
            ctx.info(&format!(
                "registered {subject} (id {}, version {})",
                registered.id, registered.version
            ));
            Ok(RegisterSchemaOutput {
                subject,
                registry_id: registered.id,
                version: registered.version,
            })
        }
        Err(err) => {
            let _ = cms.update_internal(
                ctx,
                collections::SCHEMAS,
                &input.schema_doc_id,
                json!({
                    "status": "failed",
                    "registrationError": err.cause_string(),
                }),
            );
            Err(err)
        }
    }
}

fn resolve_registry(
    ctx: &ActivityContext,
    cms: &CmsClient,
    topic_id: &str,
) -> ActivityResult<(String, Option<String>, Option<String>)> {
    require("topic_id", topic_id)?;
    let doc = cms.get_with_depth(ctx, collections::TOPICS, topic_id, 2)?;
    let cluster = crate::doc::relation_doc(&doc, "virtualCluster")
        .map(VirtualCluster::from_doc)
        .and_then(|vc| vc.physical_cluster)
        .unwrap_or_else(PhysicalCluster::default);
    let url = cluster.schema_registry_url.clone().ok_or_else(|| {
        ActivityError::invalid_input(format!(
            "no schema registry configured for topic {topic_id}"
        ))
    })?;
    Ok((
        url,
        cluster.schema_registry_username.clone(),
        cluster.schema_registry_password.clone(),
    ))
}
