//! Virtual-cluster provisioning activities.
//!
//! Four activities: resolve the default environment mapping, create the VC
//! record (idempotent by (application, environment)), push the VC to the
//! gateway, and write status transitions. The prefix rule is load-bearing:
//! other components parse `{workspaceSlug}-{appSlug}-{env}-`, so it is
//! computed in exactly one place ([`crate::types::namespace_prefix`]).

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cms::{CmsClient, collections};
use crate::context::{ActivityContext, require};
use crate::error::{ActivityError, ActivityResult};
use crate::gateway::{GatewayAdmin, VirtualClusterUpsert};
use crate::query::QueryBuilder;
use crate::types::{
    self, Application, EnvironmentMapping, PhysicalCluster, VirtualCluster, VirtualClusterStatus,
};

// ---------------------------------------------------------------------------
// Resolve environment mapping

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveEnvironmentInput {
    pub environment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveEnvironmentOutput {
    pub cluster_id: String,
    pub bootstrap_servers: String,
}

/// Find the default physical cluster for an environment.
pub fn resolve_environment_mapping(
    ctx: &ActivityContext,
    cms: &CmsClient,
    input: &ResolveEnvironmentInput,
) -> ActivityResult<ResolveEnvironmentOutput> {
    require("environment", &input.environment)?;
    ctx.info(&format!(
        "resolving default cluster for environment {}",
        input.environment
    ));

    let mapping_doc = cms
        .find_one(
            ctx,
            collections::ENVIRONMENT_MAPPINGS,
            &QueryBuilder::new()
                .where_equals("environment", &input.environment)
                .where_equals("isDefault", "true")
                .depth(1),
        )?
        .ok_or_else(|| {
            ActivityError::not_found(format!(
                "default environment mapping for {}",
                input.environment
            ))
        })?;
    let mapping = EnvironmentMapping::from_doc(&mapping_doc);

    // Depth 1 usually populates the cluster; fall back to a direct fetch
    // when the relation came back as a bare id.
    let cluster = match mapping.cluster {
        Some(cluster) => cluster,
        None => {
            if mapping.cluster_id.is_empty() {
                return Err(ActivityError::not_found(format!(
                    "cluster for environment mapping {}",
                    mapping.id
                )));
            }
            PhysicalCluster::from_doc(&cms.get(ctx, collections::CLUSTERS, &mapping.cluster_id)?)
        }
    };

    if cluster.bootstrap_servers.is_empty() {
        return Err(ActivityError::invalid_input(format!(
            "cluster {} has no bootstrap servers configured",
            cluster.id
        )));
    }

    ctx.info(&format!("resolved cluster {}", cluster.id));
    Ok(ResolveEnvironmentOutput {
        cluster_id: cluster.id,
        bootstrap_servers: cluster.bootstrap_servers,
    })
}

// ---------------------------------------------------------------------------
// Create virtual cluster

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVirtualClusterInput {
    pub application_id: String,
    pub application_slug: String,
    pub workspace_slug: String,
    pub environment: String,
    pub physical_cluster_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVirtualClusterOutput {
    pub virtual_cluster_id: String,
    pub topic_prefix: String,
    pub group_prefix: String,
    pub advertised_host: String,
    pub advertised_port: i64,
    /// False when an existing record was returned unchanged.
    pub created: bool,
}

/// Create the VC record with `status = provisioning`, or return the existing
/// one unchanged. At most one non-deleted VC exists per (application,
/// environment).
pub fn create_virtual_cluster(
    ctx: &ActivityContext,
    cms: &CmsClient,
    input: &CreateVirtualClusterInput,
) -> ActivityResult<CreateVirtualClusterOutput> {
    require("application_id", &input.application_id)?;
    require("application_slug", &input.application_slug)?;
    require("workspace_slug", &input.workspace_slug)?;
    require("environment", &input.environment)?;
    require("physical_cluster_id", &input.physical_cluster_id)?;
    ctx.info(&format!(
        "creating virtual cluster for application {} in {}",
        input.application_id, input.environment
    ));

    let existing = cms.find(
        ctx,
        collections::VIRTUAL_CLUSTERS,
        &QueryBuilder::new()
            .where_equals("application", &input.application_id)
            .where_equals("environment", &input.environment),
    )?;
    if let Some(vc) = existing
        .docs
        .iter()
        .map(VirtualCluster::from_doc)
        .find(|vc| vc.status != VirtualClusterStatus::Deleted)
    {
        ctx.info(&format!("virtual cluster {} already exists", vc.id));
        return Ok(CreateVirtualClusterOutput {
            virtual_cluster_id: vc.id,
            topic_prefix: vc.topic_prefix,
            group_prefix: vc.group_prefix,
            advertised_host: vc.advertised_host,
            advertised_port: vc.advertised_port,
            created: false,
        });
    }

    let prefix = types::namespace_prefix(
        &input.workspace_slug,
        &input.application_slug,
        &input.environment,
    );
    let advertised_host = types::advertised_host(&input.application_slug, &input.environment);

    let doc = cms.create(
        ctx,
        collections::VIRTUAL_CLUSTERS,
        json!({
            "application": input.application_id,
            "environment": input.environment,
            "topicPrefix": prefix,
            "groupPrefix": prefix,
            "advertisedHost": advertised_host,
            "advertisedPort": types::DEFAULT_ADVERTISED_PORT,
            "physicalCluster": input.physical_cluster_id,
            "status": "provisioning",
        }),
    )?;
    let vc = VirtualCluster::from_doc(&doc);

    ctx.info(&format!("created virtual cluster {}", vc.id));
    Ok(CreateVirtualClusterOutput {
        virtual_cluster_id: vc.id,
        topic_prefix: prefix.clone(),
        group_prefix: prefix,
        advertised_host,
        advertised_port: types::DEFAULT_ADVERTISED_PORT,
        created: true,
    })
}

// ---------------------------------------------------------------------------
// Push to gateway

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushVirtualClusterInput {
    pub virtual_cluster_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushVirtualClusterOutput {
    /// True when the gateway already had the VC (duplicate upsert).
    pub already_present: bool,
}

/// Push the VC configuration to the gateway. A duplicate rejection counts
/// as success.
pub fn push_virtual_cluster_to_gateway(
    ctx: &ActivityContext,
    cms: &CmsClient,
    gateway: &dyn GatewayAdmin,
    input: &PushVirtualClusterInput,
) -> ActivityResult<PushVirtualClusterOutput> {
    require("virtual_cluster_id", &input.virtual_cluster_id)?;
    ctx.info(&format!(
        "pushing virtual cluster {} to gateway",
        input.virtual_cluster_id
    ));

    let doc = cms.get_with_depth(
        ctx,
        collections::VIRTUAL_CLUSTERS,
        &input.virtual_cluster_id,
        2,
    )?;
    let vc = VirtualCluster::from_doc(&doc);

    let application = crate::doc::relation_doc(&doc, "application")
        .map(Application::from_doc)
        .ok_or_else(|| {
            ActivityError::invalid_input(format!(
                "virtual cluster {} has no populated application",
                vc.id
            ))
        })?;
    let workspace_slug = application
        .workspace
        .as_ref()
        .map(|ws| ws.slug.clone())
        .unwrap_or_default();
    if workspace_slug.is_empty() {
        return Err(ActivityError::invalid_input(format!(
            "virtual cluster {} has no workspace slug",
            vc.id
        )));
    }
    let bootstrap = vc
        .physical_cluster
        .as_ref()
        .map(|c| c.bootstrap_servers.clone())
        .unwrap_or_default();
    if bootstrap.is_empty() {
        return Err(ActivityError::invalid_input(format!(
            "virtual cluster {} has no physical bootstrap servers",
            vc.id
        )));
    }

    let upsert = VirtualClusterUpsert {
        id: vc.id.clone(),
        application_id: application.id.clone(),
        application_slug: application.slug.clone(),
        workspace_slug,
        environment: vc.environment.clone(),
        topic_prefix: vc.topic_prefix.clone(),
        group_prefix: vc.group_prefix.clone(),
        advertised_host: vc.advertised_host.clone(),
        advertised_port: vc.advertised_port,
        physical_bootstrap_servers: bootstrap,
        read_only: false,
    };

    match gateway.upsert_virtual_cluster(ctx, &upsert) {
        Ok(()) => {
            ctx.info("gateway upsert complete");
            Ok(PushVirtualClusterOutput {
                already_present: false,
            })
        }
        Err(ActivityError::Conflict(msg)) => {
            ctx.info(&format!("gateway already had the virtual cluster ({msg})"));
            Ok(PushVirtualClusterOutput {
                already_present: true,
            })
        }
        Err(err) => Err(err),
    }
}

// ---------------------------------------------------------------------------
// Update status

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateVirtualClusterStatusInput {
    pub virtual_cluster_id: String,
    /// provisioning | active | read_only | failed | deleted
    pub status: String,
    #[serde(default)]
    pub provisioning_error: String,
}

/// Write a status transition. Terminal states are active, failed, deleted;
/// the error field is cleared on success transitions and written on failed
/// ones so the UI always shows the last cause.
pub fn update_virtual_cluster_status(
    ctx: &ActivityContext,
    cms: &CmsClient,
    input: &UpdateVirtualClusterStatusInput,
) -> ActivityResult<()> {
    require("virtual_cluster_id", &input.virtual_cluster_id)?;
    require("status", &input.status)?;
    let status = VirtualClusterStatus::parse(&input.status);
    if matches!(status, VirtualClusterStatus::Unknown(_)) {
        return Err(ActivityError::invalid_input(format!(
            "unknown virtual cluster status {}",
            input.status
        )));
    }
    ctx.info(&format!(
        "updating virtual cluster {} status to {}",
        input.virtual_cluster_id, input.status
    ));

    cms.update_internal(
        ctx,
        collections::VIRTUAL_CLUSTERS,
        &input.virtual_cluster_id,
        json!({
            "status": input.status,
            "provisioningError": input.provisioning_error,
        }),
    )?;
    Ok(())
}
