//! The decommissioning saga, one activity per step.
//!
//! The workflow layer drives the ordering; each step here is individually
//! retryable and reports partial failure as data (`succeeded`/`failed`
//! lists) rather than an error. Only the metrics archive is non-fatal to
//! the saga. Credentials are revoked before gateway virtual clusters are
//! deleted, so a revoke never targets an already-deleted VC.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::adapter::{AdapterFactory, ConnectionConfig, TopicAdmin};
use crate::cms::{CmsClient, collections};
use crate::context::{ActivityContext, require};
use crate::error::{ActivityError, ActivityResult};
use crate::gateway::GatewayAdmin;
use crate::objectstore::ObjectStore;
use crate::query::QueryBuilder;
use crate::types::{
    Application, ApplicationStatus, PhysicalCluster, ServiceAccount, Topic, VirtualCluster,
    VirtualClusterStatus,
};

/// Per-step report: ids that succeeded, ids that failed, and the collected
/// failure causes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub success: bool,
    #[serde(default)]
    pub error: String,
}

impl StepReport {
    fn finish(mut self, errors: Vec<String>) -> Self {
        self.success = self.failed.is_empty();
        self.error = errors.join("; ");
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationInput {
    pub application_id: String,
}

// ---------------------------------------------------------------------------
// Step 1: check status

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckStatusOutput {
    pub status: String,
    pub proceed: bool,
}

/// The saga proceeds only when the application is exactly `decommissioning`.
/// An unknown application is fatal here, unlike the per-item steps.
pub fn check_application_status(
    ctx: &ActivityContext,
    cms: &CmsClient,
    input: &ApplicationInput,
) -> ActivityResult<CheckStatusOutput> {
    require("application_id", &input.application_id)?;
    ctx.info(&format!("checking status of application {}", input.application_id));

    let doc = cms.get(ctx, collections::APPLICATIONS, &input.application_id)?;
    let application = Application::from_doc(&doc);
    let proceed = application.status == ApplicationStatus::Decommissioning;

    ctx.info(&format!(
        "application {} is {} (proceed: {proceed})",
        input.application_id,
        application.status.as_str()
    ));
    Ok(CheckStatusOutput {
        status: application.status.as_str().to_string(),
        proceed,
    })
}

// ---------------------------------------------------------------------------
// Shared lookups

fn live_virtual_clusters(
    ctx: &ActivityContext,
    cms: &CmsClient,
    application_id: &str,
) -> ActivityResult<Vec<VirtualCluster>> {
    // Depth 1 so the physical cluster comes populated; the topic-deletion
    // step builds a per-cluster adapter from it.
    let found = cms.find(
        ctx,
        collections::VIRTUAL_CLUSTERS,
        &QueryBuilder::new()
            .where_equals("application", application_id)
            .depth(1),
    )?;
    Ok(found
        .docs
        .iter()
        .map(VirtualCluster::from_doc)
        .filter(|vc| vc.status != VirtualClusterStatus::Deleted)
        .collect())
}

/// Build a topic admin for one virtual cluster's physical cluster. An
/// application's VCs can map to different physical clusters, so every VC
/// resolves its own connection.
fn cluster_admin(
    ctx: &ActivityContext,
    cms: &CmsClient,
    factory: &AdapterFactory,
    vc: &VirtualCluster,
) -> ActivityResult<Box<dyn TopicAdmin>> {
    let cluster = match &vc.physical_cluster {
        Some(cluster) => cluster.clone(),
        None => {
            if vc.physical_cluster_id.is_empty() {
                return Err(ActivityError::invalid_input(format!(
                    "virtual cluster {} has no physical cluster",
                    vc.id
                )));
            }
            PhysicalCluster::from_doc(&cms.get(
                ctx,
                collections::CLUSTERS,
                &vc.physical_cluster_id,
            )?)
        }
    };
    if cluster.bootstrap_servers.is_empty() {
        return Err(ActivityError::invalid_input(format!(
            "cluster {} has no bootstrap servers",
            cluster.id
        )));
    }
    factory.topic_admin(
        ctx,
        &ConnectionConfig {
            bootstrap_servers: cluster.bootstrap_servers.clone(),
            username: cluster.username.clone(),
            password: cluster.password.clone(),
        },
    )
}

// ---------------------------------------------------------------------------
// Step 2: set virtual clusters read-only

/// Flip every live VC to read-only at the gateway, mirroring the status on
/// the record. A missing gateway client fails every VC rather than silently
/// skipping them.
pub fn set_virtual_clusters_read_only(
    ctx: &ActivityContext,
    cms: &CmsClient,
    gateway: Option<&dyn GatewayAdmin>,
    input: &ApplicationInput,
) -> ActivityResult<StepReport> {
    require("application_id", &input.application_id)?;
    ctx.info(&format!(
        "setting virtual clusters of {} read-only",
        input.application_id
    ));

    let mut report = StepReport::default();
    let mut errors = Vec::new();

    for vc in live_virtual_clusters(ctx, cms, &input.application_id)? {
        ctx.ensure_active()?;
        let Some(gateway) = gateway else {
            report.failed.push(vc.id.clone());
            errors.push(format!("{}: gateway client not configured", vc.id));
            continue;
        };
        match gateway.set_virtual_cluster_read_only(ctx, &vc.id, true) {
            Ok(()) => {
                if let Err(err) = cms.update_internal(
                    ctx,
                    collections::VIRTUAL_CLUSTERS,
                    &vc.id,
                    json!({"status": "read_only"}),
                ) {
                    report.failed.push(vc.id.clone());
                    errors.push(format!("{}: {}", vc.id, err.cause_string()));
                } else {
                    report.succeeded.push(vc.id.clone());
                }
            }
            Err(err) => {
                ctx.warn(&format!("read-only on {} failed: {err:#}", vc.id));
                report.failed.push(vc.id.clone());
                errors.push(format!("{}: {}", vc.id, err.cause_string()));
            }
        }
    }

    let report = report.finish(errors);
    ctx.info(&format!(
        "read-only complete ({} updated, {} failed)",
        report.succeeded.len(),
        report.failed.len()
    ));
    Ok(report)
}

// ---------------------------------------------------------------------------
// Step 3: delete physical topics

/// Delete every topic of the application from its cluster, then mark the
/// record deleted. Topics with no physical name are skipped entirely; when
/// a virtual cluster's adapter cannot be built, its topics are recorded as
/// failed and their records left alone.
pub fn delete_physical_topics(
    ctx: &ActivityContext,
    cms: &CmsClient,
    factory: &AdapterFactory,
    input: &ApplicationInput,
) -> ActivityResult<StepReport> {
    delete_physical_topics_with(
        ctx,
        cms,
        &mut |ctx, vc| cluster_admin(ctx, cms, factory, vc),
        input,
    )
}

/// Core of step 3, generic over how a virtual cluster's admin is obtained.
pub fn delete_physical_topics_with(
    ctx: &ActivityContext,
    cms: &CmsClient,
    admin_for: &mut dyn FnMut(
        &ActivityContext,
        &VirtualCluster,
    ) -> ActivityResult<Box<dyn TopicAdmin>>,
    input: &ApplicationInput,
) -> ActivityResult<StepReport> {
    require("application_id", &input.application_id)?;
    ctx.info(&format!(
        "deleting physical topics of {}",
        input.application_id
    ));

    let vcs = live_virtual_clusters(ctx, cms, &input.application_id)?;
    let mut report = StepReport::default();
    let mut errors = Vec::new();
    let mut skipped = 0usize;

    for vc in &vcs {
        ctx.ensure_active()?;
        let topics = cms.find(
            ctx,
            collections::TOPICS,
            &QueryBuilder::new().where_equals("virtualCluster", &vc.id),
        )?;

        let mut named = Vec::new();
        for doc in &topics.docs {
            let topic = Topic::from_doc(doc);
            if topic.status == crate::types::TopicStatus::Deleted {
                continue;
            }
            if topic.physical_name.is_empty() {
                skipped += 1;
                continue;
            }
            named.push(topic);
        }
        if named.is_empty() {
            continue;
        }

        // One adapter per virtual cluster: the application's VCs can live
        // on different physical clusters.
        let mut admin = match admin_for(ctx, vc) {
            Ok(admin) => admin,
            Err(err) => {
                ctx.warn(&format!("no cluster adapter for {}: {err:#}", vc.id));
                for topic in &named {
                    report.failed.push(topic.id.clone());
                    errors.push(format!(
                        "{}: no cluster adapter available: {}",
                        topic.id,
                        err.cause_string()
                    ));
                }
                continue;
            }
        };

        for topic in &named {
            ctx.ensure_active()?;

            // A topic that is already gone from the cluster still gets its
            // record transitioned.
            match admin.delete_topic(ctx, &topic.physical_name) {
                Ok(()) | Err(ActivityError::NotFound(_)) => {}
                Err(err) => {
                    ctx.warn(&format!("deleting {}: {err:#}", topic.physical_name));
                    report.failed.push(topic.id.clone());
                    errors.push(format!("{}: {}", topic.id, err.cause_string()));
                    continue;
                }
            }

            match cms.update_internal(
                ctx,
                collections::TOPICS,
                &topic.id,
                json!({
                    "status": "deleted",
                    "deletedAt": Utc::now().to_rfc3339(),
                }),
            ) {
                Ok(_) => report.succeeded.push(topic.id.clone()),
                Err(err) => {
                    report.failed.push(topic.id.clone());
                    errors.push(format!("{}: {}", topic.id, err.cause_string()));
                }
            }
        }
    }

    let report = report.finish(errors);
    ctx.info(&format!(
        "topic deletion complete ({} deleted, {} failed, {skipped} skipped)",
        report.succeeded.len(),
        report.failed.len()
    ));
    Ok(report)
}

// ---------------------------------------------------------------------------
// Step 4: revoke credentials

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevokeCredentialsInput {
    pub application_id: String,
    #[serde(default)]
    pub revoked_by: String,
}

/// Revoke every active service account: gateway first (when wired), then
/// the record.
pub fn revoke_credentials(
    ctx: &ActivityContext,
    cms: &CmsClient,
    gateway: Option<&dyn GatewayAdmin>,
    input: &RevokeCredentialsInput,
) -> ActivityResult<StepReport> {
    require("application_id", &input.application_id)?;
    ctx.info(&format!("revoking credentials of {}", input.application_id));

    let found = cms.find(
        ctx,
        collections::SERVICE_ACCOUNTS,
        &QueryBuilder::new()
            .where_equals("application", &input.application_id)
            .where_equals("status", "active"),
    )?;

    let mut report = StepReport::default();
    let mut errors = Vec::new();

    for doc in &found.docs {
        ctx.ensure_active()?;
        let account = ServiceAccount::from_doc(doc);

        if let Some(gateway) = gateway
            && let Err(err) = gateway.revoke_credential(ctx, &account.id)
        {
            ctx.warn(&format!("gateway revoke of {} failed: {err:#}", account.id));
            report.failed.push(account.id.clone());
            errors.push(format!("{}: {}", account.id, err.cause_string()));
            continue;
        }

        let mut patch = json!({
            "status": "revoked",
            "revokedAt": Utc::now().to_rfc3339(),
        });
        if !input.revoked_by.is_empty() {
            patch["revokedBy"] = json!(input.revoked_by);
        }
        match cms.update_internal(ctx, collections::SERVICE_ACCOUNTS, &account.id, patch) {
            Ok(_) => report.succeeded.push(account.id.clone()),
            Err(err) => {
                report.failed.push(account.id.clone());
                errors.push(format!("{}: {}", account.id, err.cause_string()));
            }
        }
    }

    let report = report.finish(errors);
    ctx.info(&format!(
        "credential revocation complete ({} revoked, {} failed)",
        report.succeeded.len(),
        report.failed.len()
    ));
    Ok(report)
}

// ---------------------------------------------------------------------------
// Step 5: delete virtual clusters from the gateway

/// Terminal counterpart of step 2.
pub fn delete_virtual_clusters(
    ctx: &ActivityContext,
    cms: &CmsClient,
    gateway: Option<&dyn GatewayAdmin>,
    input: &ApplicationInput,
) -> ActivityResult<StepReport> {
    require("application_id", &input.application_id)?;
    ctx.info(&format!(
        "deleting virtual clusters of {}",
        input.application_id
    ));

    let mut report = StepReport::default();
    let mut errors = Vec::new();

    for vc in live_virtual_clusters(ctx, cms, &input.application_id)? {
        ctx.ensure_active()?;
        let Some(gateway) = gateway else {
            report.failed.push(vc.id.clone());
            errors.push(format!("{}: gateway client not configured", vc.id));
            continue;
        };

        // Gone from the gateway already is fine; the record transition is
        // what matters.
        match gateway.delete_virtual_cluster(ctx, &vc.id) {
            Ok(()) | Err(ActivityError::NotFound(_)) => {}
            Err(err) => {
                ctx.warn(&format!("gateway delete of {} failed: {err:#}", vc.id));
                report.failed.push(vc.id.clone());
                errors.push(format!("{}: {}", vc.id, err.cause_string()));
                continue;
            }
        }

        match cms.update_internal(
            ctx,
            collections::VIRTUAL_CLUSTERS,
            &vc.id,
            json!({
                "status": "deleted",
                "deletedAt": Utc::now().to_rfc3339(),
            }),
        ) {
            Ok(_) => report.succeeded.push(vc.id.clone()),
            Err(err) => {
                report.failed.push(vc.id.clone());
                errors.push(format!("{}: {}", vc.id, err.cause_string()));
            }
        }
    }

    let report = report.finish(errors);
    ctx.info(&format!(
        "virtual cluster deletion complete ({} deleted, {} failed)",
        report.succeeded.len(),
        report.failed.len()
    ));
    Ok(report)
}

// ---------------------------------------------------------------------------
// Step 6: archive metrics (non-fatal)

const METRICS_PAGE_LIMIT: u32 = 10000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveMetricsOutput {
    pub success: bool,
    pub archived_count: usize,
    #[serde(default)]
    pub archive_path: String,
    #[serde(default)]
    pub error: String,
}

/// Archive the application's metric records as JSON. Failures downgrade the
/// result instead of erroring: losing an archive must not wedge a teardown.
pub fn archive_metrics(
    ctx: &ActivityContext,
    cms: &CmsClient,
    store: Option<&dyn ObjectStore>,
    input: &ApplicationInput,
) -> ActivityResult<ArchiveMetricsOutput> {
    require("application_id", &input.application_id)?;
    ctx.info(&format!("archiving metrics of {}", input.application_id));

    let failed = |error: String| ArchiveMetricsOutput {
        success: false,
        archived_count: 0,
        archive_path: String::new(),
        error,
    };

    let Some(store) = store else {
        ctx.warn("object store not configured; skipping metrics archive");
        return Ok(failed("object store not configured".to_string()));
    };

    let mut docs = Vec::new();
    let mut page = 1u32;
    loop {
        ctx.ensure_active()?;
        let result = match cms.find(
            ctx,
            collections::METRICS,
            &QueryBuilder::new()
                .where_equals("application", &input.application_id)
                .limit(METRICS_PAGE_LIMIT)
                .page(page),
        ) {
            Ok(result) => result,
            Err(err) => {
                ctx.warn(&format!("metrics query failed: {err:#}"));
                return Ok(failed(err.cause_string()));
            }
        };
        let batch = result.docs.len();
        docs.extend(result.docs.into_iter().map(serde_json::Value::Object));
        if batch < METRICS_PAGE_LIMIT as usize {
            break;
        }
        page += 1;
    }

    let archived_count = docs.len();
    let path = format!(
        "archives/metrics/{}/{}.json",
        input.application_id,
        Utc::now().format("%Y-%m-%dT%H-%M-%S")
    );
    let payload = json!({
        "applicationId": input.application_id,
        "archivedAt": Utc::now().to_rfc3339(),
        "docs": docs,
    });

    match store.upload_json(ctx, &path, &payload) {
        Ok(bytes) => {
            ctx.info(&format!(
                "archived {archived_count} metric records ({bytes} bytes) to {path}"
            ));
            Ok(ArchiveMetricsOutput {
                success: true,
                archived_count,
                archive_path: path,
                error: String::new(),
            })
        }
        Err(err) => {
            ctx.warn(&format!("metrics archive upload failed: {err:#}"));
            Ok(failed(err.cause_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Step 7: mark application deleted

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkDeletedInput {
    pub application_id: String,
    #[serde(default)]
    pub deleted_by: String,
    #[serde(default)]
    pub force_deleted: bool,
}

pub fn mark_application_deleted(
    ctx: &ActivityContext,
    cms: &CmsClient,
    input: &MarkDeletedInput,
) -> ActivityResult<()> {
    require("application_id", &input.application_id)?;
    ctx.info(&format!(
        "marking application {} deleted (force: {})",
        input.application_id, input.force_deleted
    ));

    cms.update_internal(
        ctx,
        collections::APPLICATIONS,
        &input.application_id,
        json!({
            "status": "deleted",
            "deletedAt": Utc::now().to_rfc3339(),
            "deletedBy": input.deleted_by,
            "forceDeleted": input.force_deleted,
        }),
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Step 8: schedule or execute immediate cleanup

pub const DEFAULT_GRACE_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalizeCleanupInput {
    pub application_id: String,
    #[serde(default)]
    pub force_deleted: bool,
    #[serde(default)]
    pub grace_period_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeCleanupOutput {
    /// True when cleanup ran inline (force delete).
    pub immediate: bool,
    #[serde(default)]
    pub schedule_id: String,
    #[serde(default)]
    pub topics: Option<StepReport>,
    #[serde(default)]
    pub credentials: Option<StepReport>,
    #[serde(default)]
    pub virtual_clusters: Option<StepReport>,
    #[serde(default)]
    pub metrics: Option<ArchiveMetricsOutput>,
}

/// Force deletion runs the teardown steps inline; otherwise a one-shot
/// cleanup schedule is materialized at the grace-period boundary for the
/// runtime-side scheduler to launch.
pub fn finalize_cleanup(
    ctx: &ActivityContext,
    cms: &CmsClient,
    gateway: Option<&dyn GatewayAdmin>,
    factory: &AdapterFactory,
    store: Option<&dyn ObjectStore>,
    input: &FinalizeCleanupInput,
) -> ActivityResult<FinalizeCleanupOutput> {
    require("application_id", &input.application_id)?;

    if input.force_deleted {
        ctx.info(&format!(
            "running immediate cleanup of {}",
            input.application_id
        ));
        let app_input = ApplicationInput {
            application_id: input.application_id.clone(),
        };
        let topics = delete_physical_topics(
            &ctx.named("decommission-delete-topics"),
            cms,
            factory,
            &app_input,
        )?;
        let credentials = revoke_credentials(
            &ctx.named("decommission-revoke-credentials"),
            cms,
            gateway,
            &RevokeCredentialsInput {
                application_id: input.application_id.clone(),
                revoked_by: String::new(),
            },
        )?;
        let virtual_clusters = delete_virtual_clusters(
            &ctx.named("decommission-delete-virtual-clusters"),
            cms,
            gateway,
            &app_input,
        )?;
        let metrics =
            archive_metrics(&ctx.named("decommission-archive-metrics"), cms, store, &app_input)?;

        return Ok(FinalizeCleanupOutput {
            immediate: true,
            schedule_id: String::new(),
            topics: Some(topics),
            credentials: Some(credentials),
            virtual_clusters: Some(virtual_clusters),
            metrics: Some(metrics),
        });
    }

    let grace_days = input
        .grace_period_days
        .unwrap_or(DEFAULT_GRACE_PERIOD_DAYS)
        .max(0);
    let run_at = Utc::now() + chrono::Duration::days(grace_days);
    ctx.info(&format!(
        "scheduling cleanup of {} at {run_at}",
        input.application_id
    ));

    let doc = cms.create(
        ctx,
        collections::CLEANUP_SCHEDULES,
        json!({
            "application": input.application_id,
            "workflow": "application-cleanup",
            "runAt": run_at.to_rfc3339(),
            "status": "pending",
        }),
    )?;

    Ok(FinalizeCleanupOutput {
        immediate: false,
        schedule_id: crate::doc::doc_id(&doc),
        topics: None,
        credentials: None,
        virtual_clusters: None,
        metrics: None,
    })
}
