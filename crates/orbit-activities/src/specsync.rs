//! API-spec discovery and catalog synchronization.
//!
//! The workflow hands this activity the repository's file listing (from the
//! checkout step); discovery filters for the well-known spec basenames,
//! classification sniffs JSON keys or YAML line prefixes, and the catalog
//! is reconciled keyed by (application, file path); entries whose path
//! vanished from the repository are removed.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cms::{CmsClient, collections};
use crate::context::{ActivityContext, require};
use crate::doc::{doc_id, get_string};
use crate::error::ActivityResult;
use crate::query::QueryBuilder;

const SPEC_BASENAMES: &[&str] = &["openapi", "swagger", "asyncapi"];
const SPEC_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// One file from the repository listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncApiSpecsInput {
    pub app_id: String,
    pub files: Vec<RepoFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncApiSpecsOutput {
    pub discovered: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

/// True for `{openapi,swagger,asyncapi}.{yaml,yml,json}` basenames,
/// case-insensitive, exact match.
pub fn is_spec_file(path: &str) -> bool {
    let basename = path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase();
    let Some((stem, extension)) = basename.rsplit_once('.') else {
        return false;
    };
    SPEC_BASENAMES.contains(&stem) && SPEC_EXTENSIONS.contains(&extension)
}

/// Classify a spec document: JSON keys first, then YAML line prefixes.
pub fn detect_spec_type(content: &str) -> &'static str {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(content) {
        if value.get("openapi").is_some() {
            return "openapi";
        }
        if value.get("swagger").is_some() {
            return "swagger";
        }
        if value.get("asyncapi").is_some() {
            return "asyncapi";
        }
        return "unknown";
    }

    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("openapi:") {
            return "openapi";
        }
        if trimmed.starts_with("swagger:") {
            return "swagger";
        }
        if trimmed.starts_with("asyncapi:") {
            return "asyncapi";
        }
    }
    "unknown"
}

/// Reconcile the API catalog with the repository's current spec files.
pub fn sync_api_specs(
    ctx: &ActivityContext,
    cms: &CmsClient,
    input: &SyncApiSpecsInput,
) -> ActivityResult<SyncApiSpecsOutput> {
    require("app_id", &input.app_id)?;
    ctx.info(&format!(
        "syncing api specs for {} ({} files in listing)",
        input.app_id,
        input.files.len()
    ));

    let discovered: Vec<&RepoFile> = input
        .files
        .iter()
        .filter(|file| is_spec_file(&file.path))
        .collect();

    let existing = cms.find(
        ctx,
        collections::API_SPECS,
        &QueryBuilder::new().where_equals("application", &input.app_id),
    )?;

    let mut output = SyncApiSpecsOutput {
        discovered: discovered.len(),
        ..Default::default()
    };

    for file in &discovered {
        ctx.ensure_active()?;
        let spec_type = detect_spec_type(&file.content);
        let known = existing
            .docs
            .iter()
            .find(|doc| get_string(doc, "filePath") == file.path);
        match known {
            Some(doc) => {
                cms.update_internal(
                    ctx,
                    collections::API_SPECS,
                    &doc_id(doc),
                    json!({
                        "specType": spec_type,
                        "content": file.content,
                        "lastSyncedAt": chrono::Utc::now().to_rfc3339(),
                    }),
                )?;
                output.updated += 1;
            }
            None => {
                cms.create(
                    ctx,
                    collections::API_SPECS,
                    json!({
                        "application": input.app_id,
                        "filePath": file.path,
                        "specType": spec_type,
                        "content": file.content,
                        "lastSyncedAt": chrono::Utc::now().to_rfc3339(),
                    }),
                )?;
                output.created += 1;
            }
        }
    }

    // Entries whose path is absent from the current listing are removed.
    for doc in &existing.docs {
        ctx.ensure_active()?;
        let path = get_string(doc, "filePath");
        if !discovered.iter().any(|file| file.path == path) {
            cms.update_internal(
                ctx,
                collections::API_SPECS,
                &doc_id(doc),
                json!({"status": "removed", "removedAt": chrono::Utc::now().to_rfc3339()}),
            )?;
            output.removed += 1;
        }
    }

    ctx.info(&format!(
        "spec sync complete ({} discovered, {} created, {} updated, {} removed)",
        output.discovered, output.created, output.updated, output.removed
    ));
    Ok(output)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testsupport::{MockCms, Route};

    fn ctx() -> ActivityContext {
        ActivityContext::background("test")
    }

    #[test]
    fn spec_basenames_match_exactly_and_case_insensitively() {
        assert!(is_spec_file("openapi.yaml"));
        assert!(is_spec_file("docs/OpenAPI.YML"));
        assert!(is_spec_file("api/swagger.json"));
        assert!(is_spec_file("asyncapi.yml"));

        assert!(!is_spec_file("my-openapi.yaml"));
        assert!(!is_spec_file("openapi.yaml.bak"));
        assert!(!is_spec_file("openapi"));
        assert!(!is_spec_file("spec.yaml"));
    }

    #[test]
    fn detect_spec_type_from_json_keys() {
        assert_eq!(detect_spec_type(r#"{"openapi": "3.0.0"}"#), "openapi");
        assert_eq!(detect_spec_type(r#"{"swagger": "2.0"}"#), "swagger");
        assert_eq!(detect_spec_type(r#"{"asyncapi": "2.6.0"}"#), "asyncapi");
        assert_eq!(detect_spec_type(r#"{"something": true}"#), "unknown");
    }

    #[test]
    fn detect_spec_type_from_yaml_prefixes() {
        assert_eq!(detect_spec_type("openapi: 3.0.0\ninfo: {}\n"), "openapi");
        assert_eq!(detect_spec_type("# comment\nswagger: '2.0'\n"), "swagger");
        assert_eq!(detect_spec_type("asyncapi: 2.6.0\n"), "asyncapi");
        assert_eq!(detect_spec_type("just: yaml\n"), "unknown");
    }

    #[test]
    fn sync_creates_updates_and_removes() {
        let cms = MockCms::start(vec![
            Route::get(
                "/api/api-specs",
                json!({"docs": [
                    {"id": "spec-1", "filePath": "openapi.yaml"},
                    {"id": "spec-gone", "filePath": "old/swagger.json"}
                ], "totalDocs": 2}),
            ),
            Route::patch("/api/internal/api-specs/", json!({"doc": {"id": "x"}})),
            Route::post("/api/api-specs", json!({"doc": {"id": "spec-new"}})),
        ]);

        let input = SyncApiSpecsInput {
            app_id: "app-1".to_string(),
            files: vec![
                RepoFile {
                    path: "openapi.yaml".to_string(),
                    content: "openapi: 3.0.0\ninfo: {}\n".to_string(),
                },
                RepoFile {
                    path: "events/asyncapi.yaml".to_string(),
                    content: "asyncapi: 2.6.0\n".to_string(),
                },
                RepoFile {
                    path: "src/main.rs".to_string(),
                    content: "fn main() {}".to_string(),
                },
            ],
        };
        let out = sync_api_specs(&ctx(), &cms.client(), &input).expect("sync");
        assert_eq!(out.discovered, 2);
        assert_eq!(out.updated, 1);
        assert_eq!(out.created, 1);
        assert_eq!(out.removed, 1);

        // The removed entry is the one whose path left the listing.
        let patches = cms.patches_to("/api/internal/api-specs/spec-gone");
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0]["status"], "removed");

        // The new record classifies its content.
        let (_, _, body) = cms
            .recorded()
            .into_iter()
            .find(|(method, url, _)| method == "POST" && url.contains("api-specs"))
            .expect("create");
        let body: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(body["specType"], "asyncapi");
        assert_eq!(body["filePath"], "events/asyncapi.yaml");
    }
}
