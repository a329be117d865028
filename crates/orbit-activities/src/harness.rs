//! Dispatch harness: the uniform entry point the worker registers with the
//! durable runtime.
//!
//! Every invocation follows the same contract: decode the typed input,
//! validate before any side effect, emit the entry/success/failure log
//! lines, classify the error, and append an audit record. Partial results
//! come back as values inside the output, never as errors.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use orbit_process::CommandRunner;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::adapter::AdapterFactory;
use crate::buildsvc::BuildRpc;
use crate::cms::CmsClient;
use crate::context::ActivityContext;
use crate::error::{ActivityError, ActivityResult, ErrorClass};
use crate::gateway::GatewayAdmin;
use crate::github::{GithubApi, TokenService};
use crate::objectstore::ObjectStore;

/// Everything an activity may need. Optional clients reflect deployment
/// reality: a worker without a gateway connection still runs CMS-only
/// activities, and the steps that need the missing client report it per
/// item.
pub struct Dependencies {
    pub cms: CmsClient,
    pub adapters: AdapterFactory,
    pub gateway: Option<Arc<dyn GatewayAdmin>>,
    pub build: Option<Arc<dyn BuildRpc>>,
    pub github: Option<Arc<dyn GithubApi>>,
    pub tokens: Option<Arc<TokenService>>,
    pub object_store: Option<Arc<dyn ObjectStore>>,
    pub git: Arc<dyn CommandRunner>,
    pub work_dir: PathBuf,
    pub audit: Option<Mutex<AuditLog>>,
}

impl Dependencies {
    fn gateway(&self) -> ActivityResult<&dyn GatewayAdmin> {
        self.gateway
            .as_deref()
            .ok_or_else(|| ActivityError::unavailable("gateway client not configured"))
    }

    fn build(&self) -> ActivityResult<&dyn BuildRpc> {
        self.build
            .as_deref()
            .ok_or_else(|| ActivityError::unavailable("build-service client not configured"))
    }

    fn github(&self) -> ActivityResult<&dyn GithubApi> {
        self.github
            .as_deref()
            .ok_or_else(|| ActivityError::unavailable("github client not configured"))
    }

    fn tokens(&self) -> ActivityResult<&TokenService> {
        self.tokens
            .as_deref()
            .ok_or_else(|| ActivityError::unavailable("token service not configured"))
    }

    fn object_store(&self) -> ActivityResult<&dyn ObjectStore> {
        self.object_store
            .as_deref()
            .ok_or_else(|| ActivityError::unavailable("object store not configured"))
    }
}

/// Names of every registered activity, as the runtime addresses them.
pub const ACTIVITY_NAMES: &[&str] = &[
    "resolve-environment-mapping",
    "create-virtual-cluster",
    "push-virtual-cluster-to-gateway",
    "update-virtual-cluster-status",
    "provision-topic",
    "update-topic-status",
    "grant-topic-access",
    "revoke-topic-access",
    "register-topic-schema",
    "decommission-check-status",
    "decommission-set-read-only",
    "decommission-delete-topics",
    "decommission-revoke-credentials",
    "decommission-delete-virtual-clusters",
    "decommission-archive-metrics",
    "decommission-mark-deleted",
    "decommission-finalize",
    "refresh-installation-token",
    "update-installation-status",
    "clone-template",
    "apply-variables",
    "init-git",
    "prepare-remote",
    "push-to-remote",
    "materialize-template",
    "analyze-repository",
    "build-and-push-image",
    "update-build-status",
    "check-quota-and-cleanup",
    "track-image",
    "process-lineage-batch",
    "reset-lineage-24h",
    "mark-inactive-edges",
    "create-lineage-snapshots",
    "validate-schema",
    "generate-code",
    "package-artifacts",
    "upload-artifacts",
    "sync-api-specs",
    "health-check",
];

fn decode<T: DeserializeOwned>(activity: &str, input: Value) -> ActivityResult<T> {
    serde_json::from_value(input)
        .map_err(|e| ActivityError::invalid_input(format!("{activity}: decoding input: {e}")))
}

fn encode<T: Serialize>(activity: &str, output: &T) -> ActivityResult<Value> {
    serde_json::to_value(output)
        .map_err(|e| ActivityError::Other(anyhow::anyhow!("{activity}: encoding output: {e}")))
}

/// Run one activity by name. The context's activity name is expected to
/// match `name`; `ActivityContext::named` derives one.
pub fn dispatch(
    ctx: &ActivityContext,
    deps: &Dependencies,
    name: &str,
    input: Value,
) -> ActivityResult<Value> {
    let started = Instant::now();
    ctx.info("activity started");

    let result = invoke(ctx, deps, name, input);

    let duration_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => ctx.info(&format!("activity succeeded ({duration_ms}ms)")),
        Err(err) => ctx.error(&format!(
            "activity failed ({duration_ms}ms, {:?}): {}",
            err.class(),
            err.cause_string()
        )),
    }

    if let Some(audit) = &deps.audit {
        let record = AuditRecord {
            timestamp: Utc::now(),
            activity: name.to_string(),
            workflow_id: ctx.workflow_id().to_string(),
            success: result.is_ok(),
            error_class: result.as_ref().err().map(ActivityError::class),
            error: result
                .as_ref()
                .err()
                .map(ActivityError::cause_string)
                .unwrap_or_default(),
            duration_ms,
        };
        if let Err(err) = audit.lock().expect("audit lock").append(&record) {
            ctx.warn(&format!("audit append failed: {err:#}"));
        }
    }

    result
}

fn invoke(
    ctx: &ActivityContext,
    deps: &Dependencies,
    name: &str,
    input: Value,
) -> ActivityResult<Value> {
    match name {
        "resolve-environment-mapping" => {
            let input = decode(name, input)?;
            encode(name, &crate::vcluster::resolve_environment_mapping(ctx, &deps.cms, &input)?)
        }
        "create-virtual-cluster" => {
            let input = decode(name, input)?;
            encode(name, &crate::vcluster::create_virtual_cluster(ctx, &deps.cms, &input)?)
        }
        "push-virtual-cluster-to-gateway" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::vcluster::push_virtual_cluster_to_gateway(
                    ctx,
                    &deps.cms,
                    deps.gateway()?,
                    &input,
                )?,
            )
        }
        "update-virtual-cluster-status" => {
            let input = decode(name, input)?;
            crate::vcluster::update_virtual_cluster_status(ctx, &deps.cms, &input)?;
            Ok(Value::Null)
        }
        "provision-topic" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::topics::provision_topic(ctx, &deps.cms, &deps.adapters, &input)?,
            )
        }
        "update-topic-status" => {
            let input = decode(name, input)?;
            crate::topics::update_topic_status(ctx, &deps.cms, &input)?;
            Ok(Value::Null)
        }
        "grant-topic-access" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::topics::grant_topic_access(ctx, &deps.cms, &deps.adapters, &input)?,
            )
        }
        "revoke-topic-access" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::topics::revoke_topic_access(ctx, &deps.cms, &deps.adapters, &input)?,
            )
        }
        "register-topic-schema" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::topics::register_topic_schema(ctx, &deps.cms, &deps.adapters, &input)?,
            )
        }
        "decommission-check-status" => {
            let input = decode(name, input)?;
            encode(name, &crate::decommission::check_application_status(ctx, &deps.cms, &input)?)
        }
        "decommission-set-read-only" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::decommission::set_virtual_clusters_read_only(
                    ctx,
                    &deps.cms,
                    deps.gateway.as_deref(),
                    &input,
                )?,
            )
        }
        "decommission-delete-topics" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::decommission::delete_physical_topics(
                    ctx,
                    &deps.cms,
                    &deps.adapters,
                    &input,
                )?,
            )
        }
        "decommission-revoke-credentials" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::decommission::revoke_credentials(
                    ctx,
                    &deps.cms,
                    deps.gateway.as_deref(),
                    &input,
                )?,
            )
        }
        "decommission-delete-virtual-clusters" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::decommission::delete_virtual_clusters(
                    ctx,
                    &deps.cms,
                    deps.gateway.as_deref(),
                    &input,
                )?,
            )
        }
        "decommission-archive-metrics" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::decommission::archive_metrics(
                    ctx,
                    &deps.cms,
                    deps.object_store.as_deref(),
                    &input,
                )?,
            )
        }
        "decommission-mark-deleted" => {
            let input = decode(name, input)?;
            crate::decommission::mark_application_deleted(ctx, &deps.cms, &input)?;
            Ok(Value::Null)
        }
        "decommission-finalize" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::decommission::finalize_cleanup(
                    ctx,
                    &deps.cms,
                    deps.gateway.as_deref(),
                    &deps.adapters,
                    deps.object_store.as_deref(),
                    &input,
                )?,
            )
        }
        "refresh-installation-token" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::github::refresh_installation_token(ctx, deps.tokens()?, &input)?,
            )
        }
        "update-installation-status" => {
            let input = decode(name, input)?;
            crate::github::update_installation_status(ctx, &deps.cms, &input)?;
            Ok(Value::Null)
        }
        "clone-template" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::gitops::clone_template(ctx, deps.git.as_ref(), &deps.work_dir, &input)?,
            )
        }
        "apply-variables" => {
            let input = decode(name, input)?;
            encode(name, &crate::gitops::apply_variables(ctx, &deps.work_dir, &input)?)
        }
        "init-git" => {
            let input = decode(name, input)?;
            crate::gitops::init_git(ctx, deps.git.as_ref(), &deps.work_dir, &input)?;
            Ok(Value::Null)
        }
        "prepare-remote" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::gitops::prepare_remote(ctx, deps.tokens()?, deps.github()?, &input)?,
            )
        }
        "push-to-remote" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::gitops::push_to_remote(ctx, deps.git.as_ref(), &deps.work_dir, &input)?,
            )
        }
        "materialize-template" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::template::materialize_template(
                    ctx,
                    deps.tokens()?,
                    deps.github()?,
                    deps.git.as_ref(),
                    &deps.work_dir,
                    &input,
                )?,
            )
        }
        "analyze-repository" => {
            let input = decode(name, input)?;
            encode(name, &crate::buildcoord::analyze_repository(ctx, deps.build()?, &input)?)
        }
        "build-and-push-image" => {
            let input = decode(name, input)?;
            encode(name, &crate::buildcoord::build_and_push_image(ctx, deps.build()?, &input)?)
        }
        "update-build-status" => {
            let input = decode(name, input)?;
            crate::buildcoord::update_build_status(ctx, &deps.cms, &input)?;
            Ok(Value::Null)
        }
        "check-quota-and-cleanup" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::buildcoord::check_quota_and_cleanup(ctx, deps.build()?, &input)?,
            )
        }
        "track-image" => {
            let input = decode(name, input)?;
            encode(name, &crate::buildcoord::track_image(ctx, deps.build()?, &input)?)
        }
        "process-lineage-batch" => {
            let input = decode(name, input)?;
            encode(name, &crate::lineage::process_lineage_batch(ctx, &deps.cms, &input)?)
        }
        "reset-lineage-24h" => {
            encode(name, &crate::lineage::reset_24h_metrics(ctx, &deps.cms)?)
        }
        "mark-inactive-edges" => {
            let input = decode(name, input)?;
            encode(name, &crate::lineage::mark_inactive_edges(ctx, &deps.cms, &input)?)
        }
        "create-lineage-snapshots" => {
            let input = decode(name, input)?;
            encode(name, &crate::lineage::create_daily_snapshots(ctx, &deps.cms, &input)?)
        }
        "validate-schema" => {
            let input = decode(name, input)?;
            encode(name, &crate::codegen::validate_schema(ctx, &input)?)
        }
        "generate-code" => {
            let input = decode(name, input)?;
            encode(name, &crate::codegen::generate_code(ctx, &input)?)
        }
        "package-artifacts" => {
            let input = decode(name, input)?;
            encode(name, &crate::codegen::package_artifacts(ctx, &input)?)
        }
        "upload-artifacts" => {
            let input = decode(name, input)?;
            encode(
                name,
                &crate::codegen::upload_artifacts(ctx, deps.object_store()?, &input)?,
            )
        }
        "sync-api-specs" => {
            let input = decode(name, input)?;
            encode(name, &crate::specsync::sync_api_specs(ctx, &deps.cms, &input)?)
        }
        "health-check" => {
            let input = decode(name, input)?;
            encode(name, &crate::health::health_check(ctx, &input)?)
        }
        unknown => Err(ActivityError::invalid_input(format!(
            "unknown activity {unknown}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Audit trail

/// One dispatch, as recorded in the JSONL audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub activity: String,
    pub workflow_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
    #[serde(default)]
    pub error: String,
    pub duration_ms: u64,
}

/// Append-only JSONL log under the state directory.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub const FILE_NAME: &'static str = "activity-audit.jsonl";

    pub fn open(state_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(state_dir)
            .map_err(|e| anyhow::anyhow!("creating state dir {}: {e}", state_dir.display()))?;
        Ok(Self {
            path: state_dir.join(Self::FILE_NAME),
        })
    }

    pub fn append(&mut self, record: &AuditRecord) -> anyhow::Result<()> {
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
