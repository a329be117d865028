//! Blocking facade over the OCI build service RPC surface.
//!
//! Every call opens a fresh channel scoped to the invoking activity, so a
//! cancelled build cannot leak a connection into the next invocation. The
//! [`BuildRpc`] trait is the seam the build coordinator depends on.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tonic::transport::Endpoint;

use crate::context::ActivityContext;
use crate::error::{ActivityError, ActivityResult};
use crate::gateway::{ensure_scheme, grpc_status_error};
use crate::proto::build::v1 as pb;
use crate::proto::build::v1::build_service_client::BuildServiceClient;

/// Default build-service address when configuration does not override it.
pub const DEFAULT_BUILD_SERVICE_ADDR: &str = "build-service:50054";

/// Registry targets the build service can push to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    Ghcr,
    Acr,
    Orbit,
}

impl RegistryKind {
    /// Anything outside the enum is rejected non-retryably by the caller.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ghcr" => Some(Self::Ghcr),
            "acr" => Some(Self::Acr),
            "orbit" => Some(Self::Orbit),
            _ => None,
        }
    }

    pub(crate) fn to_proto(self) -> pb::RegistryType {
        match self {
            Self::Ghcr => pb::RegistryType::Ghcr,
            Self::Acr => pb::RegistryType::Acr,
            Self::Orbit => pb::RegistryType::Orbit,
        }
    }
}

/// Package-manager detection block of a repository analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageManagerReport {
    pub detected: bool,
    pub name: String,
    pub source: String,
    pub lockfile: String,
    pub requested_version: String,
    pub version_supported: bool,
    pub supported_range: String,
}

/// Result of analyzing a repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoAnalysis {
    pub language: String,
    pub language_version: String,
    pub framework: String,
    pub build_command: String,
    pub start_command: String,
    pub package_manager: PackageManagerReport,
}

/// Build-and-push request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub request_id: String,
    pub app_id: String,
    pub repo_url: String,
    pub git_ref: String,
    pub registry: RegistryKind,
    pub registry_url: String,
    pub registry_repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<String>,
}

/// Result of a build-and-push.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub success: bool,
    pub image_url: String,
    pub image_digest: String,
    pub error: String,
}

/// One image evicted by the quota cleanup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanedImageReport {
    pub app_name: String,
    pub tag: String,
    pub size_bytes: i64,
}

/// Result of a quota check, including any eviction performed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaCheck {
    pub cleanup_performed: bool,
    pub current_usage_bytes: i64,
    pub quota_bytes: i64,
    pub cleaned_images: Vec<CleanedImageReport>,
}

/// Image registration passed to the tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackImageRecord {
    pub workspace_id: String,
    pub app_id: String,
    pub tag: String,
    pub digest: String,
    pub repository: String,
    pub registry_url: String,
    pub size_bytes: i64,
}

/// Result of tracking an image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackImageOutcome {
    pub size_bytes: i64,
    pub new_total_usage: i64,
}

/// RPC operations of the build service.
pub trait BuildRpc: Send + Sync {
    fn analyze_repository(
        &self,
        ctx: &ActivityContext,
        repo_url: &str,
        git_ref: &str,
        installation_token: &str,
    ) -> ActivityResult<RepoAnalysis>;
    fn build_image(&self, ctx: &ActivityContext, request: &BuildRequest)
    -> ActivityResult<BuildOutcome>;
    fn check_quota_and_cleanup(
        &self,
        ctx: &ActivityContext,
        workspace_id: &str,
        incoming_size_bytes: i64,
    ) -> ActivityResult<QuotaCheck>;
    fn track_image(
        &self,
        ctx: &ActivityContext,
        record: &TrackImageRecord,
    ) -> ActivityResult<TrackImageOutcome>;
}

/// gRPC-backed build service client.
pub struct GrpcBuildService {
    addr: String,
    runtime: tokio::runtime::Runtime,
}

impl GrpcBuildService {
    pub fn new(addr: &str) -> ActivityResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                ActivityError::unavailable(format!("building build-service runtime: {e}"))
            })?;
        // Validate the address up front so misconfiguration is permanent,
        // not retried forever.
        Endpoint::from_shared(ensure_scheme(addr)).map_err(|e| {
            ActivityError::invalid_input(format!("build-service address {addr}: {e}"))
        })?;
        Ok(Self {
            addr: ensure_scheme(addr),
            runtime,
        })
    }

    /// Fresh channel per call, bounded by the activity deadline.
    fn client(
        &self,
        timeout: Duration,
    ) -> ActivityResult<BuildServiceClient<tonic::transport::Channel>> {
        let endpoint = Endpoint::from_shared(self.addr.clone())
            .map_err(|e| ActivityError::invalid_input(format!("build-service address: {e}")))?
            .connect_timeout(timeout.min(Duration::from_secs(10)));
        Ok(BuildServiceClient::new(endpoint.connect_lazy()))
    }

    fn run<T, Fut>(&self, ctx: &ActivityContext, what: &str, fut: Fut) -> ActivityResult<T>
    where
        Fut: std::future::Future<Output = Result<tonic::Response<T>, tonic::Status>>,
    {
        let timeout = ctx.remaining();
        self.runtime.block_on(async {
            match tokio::time::timeout(timeout, fut).await {
                Ok(Ok(resp)) => Ok(resp.into_inner()),
                Ok(Err(status)) => Err(grpc_status_error(status, what)),
                Err(_) => Err(ActivityError::unavailable(format!(
                    "{what}: deadline exceeded"
                ))),
            }
        })
    }
}

impl BuildRpc for GrpcBuildService {
    fn analyze_repository(
        &self,
        ctx: &ActivityContext,
        repo_url: &str,
        git_ref: &str,
        installation_token: &str,
    ) -> ActivityResult<RepoAnalysis> {
        ctx.ensure_active()?;
        let mut client = self.client(ctx.remaining())?;
        let request = pb::AnalyzeRepositoryRequest {
            repo_url: repo_url.to_string(),
            git_ref: git_ref.to_string(),
            installation_token: installation_token.to_string(),
        };
        let resp = self.run(ctx, "analyzing repository", client.analyze_repository(request))?;
        let pm = resp.package_manager.unwrap_or_default();
        Ok(RepoAnalysis {
            language: resp.language,
            language_version: resp.language_version,
            framework: resp.framework,
            build_command: resp.build_command,
            start_command: resp.start_command,
            package_manager: PackageManagerReport {
                detected: pm.detected,
                name: pm.name,
                source: pm.source,
                lockfile: pm.lockfile,
                requested_version: pm.requested_version,
                version_supported: pm.version_supported,
                supported_range: pm.supported_range,
            },
        })
    }

    fn build_image(
        &self,
        ctx: &ActivityContext,
        request: &BuildRequest,
    ) -> ActivityResult<BuildOutcome> {
        ctx.ensure_active()?;
        let mut client = self.client(ctx.remaining())?;
        let wire = pb::BuildImageRequest {
            request_id: request.request_id.clone(),
            app_id: request.app_id.clone(),
            repo_url: request.repo_url.clone(),
            git_ref: request.git_ref.clone(),
            registry: Some(pb::RegistryTarget {
                r#type: request.registry.to_proto() as i32,
                url: request.registry_url.clone(),
                repository: request.registry_repository.clone(),
            }),
            language_version: request.language_version.clone(),
            build_command: request.build_command.clone(),
            start_command: request.start_command.clone(),
            package_manager: request.package_manager.clone(),
        };
        let resp = self.run(ctx, "building image", client.build_image(wire))?;
        Ok(BuildOutcome {
            success: resp.success,
            image_url: resp.image_url,
            image_digest: resp.image_digest,
            error: resp.error,
        })
    }

    fn check_quota_and_cleanup(
        &self,
        ctx: &ActivityContext,
        workspace_id: &str,
        incoming_size_bytes: i64,
    ) -> ActivityResult<QuotaCheck> {
        ctx.ensure_active()?;
        let mut client = self.client(ctx.remaining())?;
        let request = pb::CheckQuotaAndCleanupRequest {
            workspace_id: workspace_id.to_string(),
            incoming_size_bytes,
        };
        let resp = self.run(ctx, "checking registry quota", client.check_quota_and_cleanup(request))?;
        Ok(QuotaCheck {
            cleanup_performed: resp.cleanup_performed,
            current_usage_bytes: resp.current_usage_bytes,
            quota_bytes: resp.quota_bytes,
            cleaned_images: resp
                .cleaned_images
                .into_iter()
                .map(|img| CleanedImageReport {
                    app_name: img.app_name,
                    tag: img.tag,
                    size_bytes: img.size_bytes,
                })
                .collect(),
        })
    }

    fn track_image(
        &self,
        ctx: &ActivityContext,
        record: &TrackImageRecord,
    ) -> ActivityResult<TrackImageOutcome> {
        ctx.ensure_active()?;
        let mut client = self.client(ctx.remaining())?;
        let request = pb::TrackImageRequest {
            workspace_id: record.workspace_id.clone(),
            app_id: record.app_id.clone(),
            tag: record.tag.clone(),
            digest: record.digest.clone(),
            repository: record.repository.clone(),
            registry_url: record.registry_url.clone(),
            size_bytes: record.size_bytes,
        };
        let resp = self.run(ctx, "tracking image", client.track_image(request))?;
        Ok(TrackImageOutcome {
            size_bytes: resp.size_bytes,
            new_total_usage: resp.new_total_usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_kind_parses_the_three_targets() {
        assert_eq!(RegistryKind::parse("ghcr"), Some(RegistryKind::Ghcr));
        assert_eq!(RegistryKind::parse("acr"), Some(RegistryKind::Acr));
        assert_eq!(RegistryKind::parse("orbit"), Some(RegistryKind::Orbit));
        assert_eq!(RegistryKind::parse("dockerhub"), None);
        assert_eq!(RegistryKind::parse(""), None);
    }

    #[test]
    fn registry_kind_maps_to_proto() {
        assert_eq!(RegistryKind::Ghcr.to_proto(), pb::RegistryType::Ghcr);
        assert_eq!(RegistryKind::Acr.to_proto(), pb::RegistryType::Acr);
        assert_eq!(RegistryKind::Orbit.to_proto(), pb::RegistryType::Orbit);
    }

    #[test]
    fn client_construction_validates_the_address() {
        assert!(GrpcBuildService::new(DEFAULT_BUILD_SERVICE_ADDR).is_ok());
        assert!(GrpcBuildService::new("not a uri").is_err());
    }
}
