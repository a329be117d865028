//! Build coordinator: the activities fronting the OCI build service.
//!
//! The coordinator validates, calls the build service, and writes status
//! back to the app record. Quota eviction itself is executed by the build
//! service under its own per-workspace mutual exclusion; the reference
//! selection here documents the expected policy and backs the operator
//! `quota plan` view.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::buildsvc::{
    BuildOutcome, BuildRequest, BuildRpc, QuotaCheck, RegistryKind, RepoAnalysis,
    TrackImageOutcome, TrackImageRecord,
};
use crate::cms::{CmsClient, collections};
use crate::context::{ActivityContext, require};
use crate::error::{ActivityError, ActivityResult};
use crate::types::RegistryImage;

// ---------------------------------------------------------------------------
// Analyze repository

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeRepositoryInput {
    pub repo_url: String,
    #[serde(default)]
    pub git_ref: String,
    #[serde(default)]
    pub installation_token: String,
}

/// Detect language, framework, commands, and the package-manager block.
pub fn analyze_repository(
    ctx: &ActivityContext,
    build: &dyn BuildRpc,
    input: &AnalyzeRepositoryInput,
) -> ActivityResult<RepoAnalysis> {
    require("repo_url", &input.repo_url)?;
    let git_ref = if input.git_ref.is_empty() {
        "main"
    } else {
        &input.git_ref
    };
    ctx.info(&format!("analyzing {} at {git_ref}", input.repo_url));

    let analysis = build.analyze_repository(ctx, &input.repo_url, git_ref, &input.installation_token)?;
    ctx.info(&format!(
        "analysis complete (language {}, package manager {})",
        analysis.language,
        if analysis.package_manager.detected {
            analysis.package_manager.name.as_str()
        } else {
            "undetected"
        }
    ));
    Ok(analysis)
}

// ---------------------------------------------------------------------------
// Build and push

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildImageInput {
    pub request_id: String,
    pub app_id: String,
    pub repo_url: String,
    #[serde(default)]
    pub git_ref: String,
    /// ghcr | acr | orbit
    pub registry_type: String,
    pub registry_url: String,
    pub registry_repository: String,
    #[serde(default)]
    pub language_version: Option<String>,
    #[serde(default)]
    pub build_command: Option<String>,
    #[serde(default)]
    pub start_command: Option<String>,
    #[serde(default)]
    pub package_manager: Option<String>,
}

/// Build and push an image. An unknown registry type is rejected before the
/// RPC goes out.
pub fn build_and_push_image(
    ctx: &ActivityContext,
    build: &dyn BuildRpc,
    input: &BuildImageInput,
) -> ActivityResult<BuildOutcome> {
    require("request_id", &input.request_id)?;
    require("app_id", &input.app_id)?;
    require("repo_url", &input.repo_url)?;
    require("registry_type", &input.registry_type)?;
    require("registry_url", &input.registry_url)?;
    require("registry_repository", &input.registry_repository)?;
    let registry = RegistryKind::parse(&input.registry_type).ok_or_else(|| {
        ActivityError::invalid_input(format!(
            "unknown registry type {:?} (expected ghcr, acr, or orbit)",
            input.registry_type
        ))
    })?;
    ctx.info(&format!(
        "building {} from {} for registry {}",
        input.app_id, input.repo_url, input.registry_type
    ));

    let request = BuildRequest {
        request_id: input.request_id.clone(),
        app_id: input.app_id.clone(),
        repo_url: input.repo_url.clone(),
        git_ref: if input.git_ref.is_empty() {
            "main".to_string()
        } else {
            input.git_ref.clone()
        },
        registry,
        registry_url: input.registry_url.clone(),
        registry_repository: input.registry_repository.clone(),
        language_version: input.language_version.clone(),
        build_command: input.build_command.clone(),
        start_command: input.start_command.clone(),
        package_manager: input.package_manager.clone(),
    };
    let outcome = build.build_image(ctx, &request)?;

    if outcome.success {
        ctx.info(&format!("build complete ({})", outcome.image_url));
    } else {
        ctx.warn(&format!("build reported failure: {}", outcome.error));
    }
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Update build status

/// Canonical superset signature: status plus optional image metadata, build
/// config, and the analyzer's available choices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBuildStatusInput {
    pub app_id: String,
    pub status: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub image_digest: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub build_config: Option<Value>,
    #[serde(default)]
    pub available_choices: Vec<Value>,
}

pub fn update_build_status(
    ctx: &ActivityContext,
    cms: &CmsClient,
    input: &UpdateBuildStatusInput,
) -> ActivityResult<()> {
    require("app_id", &input.app_id)?;
    require("status", &input.status)?;
    ctx.info(&format!(
        "updating build status of {} to {}",
        input.app_id, input.status
    ));

    let mut patch = json!({
        "buildStatus": input.status,
        "buildError": input.error,
    });
    if !input.image_url.is_empty() {
        patch["imageUrl"] = json!(input.image_url);
    }
    if !input.image_digest.is_empty() {
        patch["imageDigest"] = json!(input.image_digest);
    }
    if let Some(config) = &input.build_config {
        patch["buildConfig"] = config.clone();
    }
    if !input.available_choices.is_empty() {
        patch["availableChoices"] = json!(input.available_choices);
    }
    cms.update_internal(ctx, collections::APPS, &input.app_id, patch)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Quota check and image tracking

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckQuotaInput {
    pub workspace_id: String,
    #[serde(default)]
    pub incoming_size_bytes: i64,
}

pub fn check_quota_and_cleanup(
    ctx: &ActivityContext,
    build: &dyn BuildRpc,
    input: &CheckQuotaInput,
) -> ActivityResult<QuotaCheck> {
    require("workspace_id", &input.workspace_id)?;
    ctx.info(&format!(
        "checking registry quota for workspace {} (+{} bytes)",
        input.workspace_id, input.incoming_size_bytes
    ));

    let check = build.check_quota_and_cleanup(ctx, &input.workspace_id, input.incoming_size_bytes)?;
    ctx.info(&format!(
        "quota check complete ({} / {} bytes, {} images cleaned)",
        check.current_usage_bytes,
        check.quota_bytes,
        check.cleaned_images.len()
    ));
    Ok(check)
}

pub fn track_image(
    ctx: &ActivityContext,
    build: &dyn BuildRpc,
    record: &TrackImageRecord,
) -> ActivityResult<TrackImageOutcome> {
    require("workspace_id", &record.workspace_id)?;
    require("app_id", &record.app_id)?;
    require("tag", &record.tag)?;
    require("digest", &record.digest)?;
    ctx.info(&format!(
        "tracking image {}@{} for workspace {}",
        record.tag, record.digest, record.workspace_id
    ));

    let outcome = build.track_image(ctx, record)?;
    ctx.info(&format!(
        "image tracked ({} bytes, workspace total {})",
        outcome.size_bytes, outcome.new_total_usage
    ));
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Reference eviction selection

/// The eviction order the build service is expected to follow: oldest
/// `createdAt` first, tag ascending as the tiebreak. Returns the images that
/// would be evicted to bring usage within `quota × threshold_fraction` after
/// admitting `incoming_size_bytes`.
pub fn select_evictions<'a>(
    images: &'a [RegistryImage],
    current_usage: i64,
    incoming_size_bytes: i64,
    quota_bytes: i64,
    threshold_fraction: f64,
) -> Vec<&'a RegistryImage> {
    if quota_bytes <= 0 || current_usage + incoming_size_bytes <= quota_bytes {
        return Vec::new();
    }
    let target = (quota_bytes as f64 * threshold_fraction) as i64;

    let mut ordered: Vec<&RegistryImage> = images.iter().collect();
    ordered.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.tag.cmp(&b.tag))
    });

    let mut usage = current_usage;
    let mut evicted = Vec::new();
    for image in ordered {
        if usage <= target {
            break;
        }
        usage -= image.size_bytes;
        evicted.push(image);
    }
    evicted
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::buildsvc::PackageManagerReport;

    fn ctx() -> ActivityContext {
        ActivityContext::background("test")
    }

    #[derive(Default)]
    struct FakeBuild {
        pub requests: Mutex<Vec<BuildRequest>>,
    }

    impl BuildRpc for FakeBuild {
        fn analyze_repository(
            &self,
            _ctx: &ActivityContext,
            _repo_url: &str,
            git_ref: &str,
            _installation_token: &str,
        ) -> ActivityResult<RepoAnalysis> {
            Ok(RepoAnalysis {
                language: "typescript".to_string(),
                language_version: "22".to_string(),
                framework: "nestjs".to_string(),
                build_command: "npm run build".to_string(),
                start_command: "node dist/main.js".to_string(),
                package_manager: PackageManagerReport {
                    detected: true,
                    name: "pnpm".to_string(),
                    source: "lockfile".to_string(),
                    lockfile: "pnpm-lock.yaml".to_string(),
                    requested_version: format!("ref:{git_ref}"),
                    version_supported: true,
                    supported_range: ">=8".to_string(),
                },
            })
        }

        fn build_image(
            &self,
            _ctx: &ActivityContext,
            request: &BuildRequest,
        ) -> ActivityResult<BuildOutcome> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(BuildOutcome {
                success: true,
                image_url: "ghcr.io/acme/app:sha-1".to_string(),
                image_digest: "sha256:abc".to_string(),
                error: String::new(),
            })
        }

        fn check_quota_and_cleanup(
            &self,
            _ctx: &ActivityContext,
            _workspace_id: &str,
            _incoming_size_bytes: i64,
        ) -> ActivityResult<QuotaCheck> {
            Ok(QuotaCheck {
                cleanup_performed: true,
                current_usage_bytes: 900,
                quota_bytes: 1000,
                cleaned_images: vec![],
            })
        }

        fn track_image(
            &self,
            _ctx: &ActivityContext,
            record: &TrackImageRecord,
        ) -> ActivityResult<TrackImageOutcome> {
            Ok(TrackImageOutcome {
                size_bytes: record.size_bytes,
                new_total_usage: 900 + record.size_bytes,
            })
        }
    }

    #[test]
    fn analyze_defaults_the_ref_and_returns_the_package_manager_block() {
        let build = FakeBuild::default();
        let analysis = analyze_repository(
            &ctx(),
            &build,
            &AnalyzeRepositoryInput {
                repo_url: "https://github.com/acme/app".to_string(),
                ..Default::default()
            },
        )
        .expect("analyze");
        assert_eq!(analysis.language, "typescript");
        assert!(analysis.package_manager.detected);
        assert_eq!(analysis.package_manager.name, "pnpm");
        assert_eq!(analysis.package_manager.source, "lockfile");
        assert_eq!(analysis.package_manager.requested_version, "ref:main");
    }

    fn build_input() -> BuildImageInput {
        BuildImageInput {
            request_id: "req-1".to_string(),
            app_id: "app-1".to_string(),
            repo_url: "https://github.com/acme/app".to_string(),
            registry_type: "ghcr".to_string(),
            registry_url: "ghcr.io".to_string(),
            registry_repository: "acme/app".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn build_rejects_unknown_registry_types_before_the_rpc() {
        let build = FakeBuild::default();
        let mut input = build_input();
        input.registry_type = "dockerhub".to_string();
        let err = build_and_push_image(&ctx(), &build, &input).expect_err("unknown registry");
        assert!(matches!(err, ActivityError::InvalidInput(_)));
        assert!(build.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn build_accepts_all_three_registry_types() {
        let build = FakeBuild::default();
        for registry in ["ghcr", "acr", "orbit"] {
            let mut input = build_input();
            input.registry_type = registry.to_string();
            let outcome = build_and_push_image(&ctx(), &build, &input).expect("build");
            assert!(outcome.success);
        }
        assert_eq!(build.requests.lock().unwrap().len(), 3);
    }

    #[test]
    fn eviction_selection_is_lru_with_tag_tiebreak() {
        let at = |secs: i64| Some(Utc.timestamp_opt(secs, 0).unwrap());
        let image = |tag: &str, created, size| RegistryImage {
            id: tag.to_string(),
            workspace_id: "ws-1".to_string(),
            application_id: "app-1".to_string(),
            tag: tag.to_string(),
            digest: format!("sha256:{tag}"),
            repository: "acme/app".to_string(),
            registry_url: "ghcr.io".to_string(),
            size_bytes: size,
            created_at: created,
        };
        let images = vec![
            image("v3", at(300), 100),
            image("v1-b", at(100), 100),
            image("v2", at(200), 100),
            image("v1-a", at(100), 100),
        ];

        // 400 used, 100 incoming, quota 450, threshold 0.8 → target 360:
        // evict v1-a then v1-b (tiebreak on tag at the same createdAt).
        let evicted = select_evictions(&images, 400, 100, 450, 0.8);
        let tags: Vec<&str> = evicted.iter().map(|i| i.tag.as_str()).collect();
        assert_eq!(tags, vec!["v1-a"]);

        // Tighter target evicts the second same-timestamp image next.
        let evicted = select_evictions(&images, 400, 100, 450, 0.5);
        let tags: Vec<&str> = evicted.iter().map(|i| i.tag.as_str()).collect();
        assert_eq!(tags, vec!["v1-a", "v1-b"]);
    }

    #[test]
    fn eviction_selection_is_empty_within_quota() {
        assert!(select_evictions(&[], 100, 50, 1000, 0.8).is_empty());
    }
}
