//! Schema validation, client-code generation, packaging, and artifact
//! upload.
//!
//! Packages travel between activities as base64 so they survive the
//! runtime's JSON payloads; the archive itself is a gzipped tar with the
//! client stub plus a README.

use std::collections::BTreeMap;
use std::io::Write;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::context::{ActivityContext, require};
use crate::error::{ActivityError, ActivityResult};
use crate::objectstore::ObjectStore;

const SUPPORTED_LANGUAGES: &[&str] = &["go", "typescript", "python", "java"];

fn client_extension(language: &str) -> &'static str {
    match language {
        "go" => ".go",
        "typescript" => ".ts",
        "python" => ".py",
        "java" => ".java",
        _ => ".txt",
    }
}

// ---------------------------------------------------------------------------
// Validate schema

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidateSchemaInput {
    /// protobuf | openapi | graphql
    pub schema_type: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateSchemaOutput {
    pub valid: bool,
    #[serde(default)]
    pub message: String,
}

/// Validate schema content by type; an unsupported type is permanent.
pub fn validate_schema(
    ctx: &ActivityContext,
    input: &ValidateSchemaInput,
) -> ActivityResult<ValidateSchemaOutput> {
    require("schema_type", &input.schema_type)?;
    require("content", &input.content)?;
    ctx.info(&format!("validating {} schema", input.schema_type));

    let result = match input.schema_type.as_str() {
        "protobuf" => validate_protobuf(&input.content),
        "openapi" => validate_openapi(&input.content),
        "graphql" => validate_graphql(&input.content),
        other => {
            return Err(ActivityError::invalid_input(format!(
                "unsupported schema type {other}"
            )));
        }
    };

    let output = match result {
        Ok(()) => ValidateSchemaOutput {
            valid: true,
            message: String::new(),
        },
        Err(message) => ValidateSchemaOutput {
            valid: false,
            message,
        },
    };
    ctx.info(&format!("validation complete (valid: {})", output.valid));
    Ok(output)
}

fn validate_protobuf(content: &str) -> Result<(), String> {
    if !content.contains("syntax") {
        return Err("protobuf schema is missing a syntax declaration".to_string());
    }
    if !content.contains("proto3") {
        return Err("only proto3 schemas are supported".to_string());
    }
    Ok(())
}

fn validate_openapi(content: &str) -> Result<(), String> {
    // JSON first; YAML falls back to line scanning.
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(content) {
        let version = value
            .get("openapi")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        if !version.starts_with("3.") {
            return Err("openapi version must start with 3.".to_string());
        }
        if value.get("info").map(|v| v.is_object()) != Some(true) {
            return Err("openapi schema is missing the info block".to_string());
        }
        return Ok(());
    }

    let mut has_version = false;
    let mut has_info = false;
    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("openapi:") {
            let value = trimmed["openapi:".len()..].trim().trim_matches(['"', '\'']);
            has_version = value.starts_with("3.");
        }
        if trimmed.starts_with("info:") {
            has_info = true;
        }
    }
    if !has_version {
        return Err("openapi version must start with 3.".to_string());
    }
    if !has_info {
        return Err("openapi schema is missing the info block".to_string());
    }
    Ok(())
}

fn validate_graphql(content: &str) -> Result<(), String> {
    let markers = ["type ", "interface ", "input ", "enum "];
    if markers.iter().any(|m| content.contains(m)) {
        Ok(())
    } else {
        Err("graphql schema defines no types".to_string())
    }
}

// ---------------------------------------------------------------------------
// Generate code

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateCodeInput {
    pub schema_type: String,
    pub content: String,
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateCodeOutput {
    /// language → generated client source
    pub code: BTreeMap<String, String>,
}

/// Produce a client stub per requested language.
pub fn generate_code(
    ctx: &ActivityContext,
    input: &GenerateCodeInput,
) -> ActivityResult<GenerateCodeOutput> {
    require("schema_type", &input.schema_type)?;
    require("content", &input.content)?;
    if input.languages.is_empty() {
        return Err(ActivityError::invalid_input(
            "at least one language is required",
        ));
    }
    ctx.info(&format!(
        "generating {} clients for {} languages",
        input.schema_type,
        input.languages.len()
    ));

    let mut code = BTreeMap::new();
    for language in &input.languages {
        if !SUPPORTED_LANGUAGES.contains(&language.as_str()) {
            return Err(ActivityError::invalid_input(format!(
                "unsupported language {language}"
            )));
        }
        code.insert(language.clone(), stub_for(language, &input.schema_type));
    }

    ctx.info(&format!("generated {} clients", code.len()));
    Ok(GenerateCodeOutput { code })
}

fn stub_for(language: &str, schema_type: &str) -> String {
    match language {
        "go" => format!(
            "// Code generated from a {schema_type} schema. DO NOT EDIT.\npackage client\n\ntype Client struct{{}}\n\nfunc New() *Client {{ return &Client{{}} }}\n"
        ),
        "typescript" => format!(
            "// Code generated from a {schema_type} schema. Do not edit.\nexport class Client {{\n  constructor(private readonly baseUrl: string) {{}}\n}}\n"
        ),
        "python" => format!(
            "# Code generated from a {schema_type} schema. Do not edit.\n\n\nclass Client:\n    def __init__(self, base_url: str) -> None:\n        self.base_url = base_url\n"
        ),
        "java" => format!(
            "// Code generated from a {schema_type} schema. Do not edit.\npublic final class Client {{\n    private final String baseUrl;\n\n    public Client(String baseUrl) {{\n        this.baseUrl = baseUrl;\n    }}\n}}\n"
        ),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Package artifacts

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageArtifactsInput {
    /// language → client source
    pub code: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageArtifactsOutput {
    /// language → base64 tar.gz
    pub packages: BTreeMap<String, String>,
}

/// Wrap each client in a gzipped tar (`client{ext}` + `README.md`).
pub fn package_artifacts(
    ctx: &ActivityContext,
    input: &PackageArtifactsInput,
) -> ActivityResult<PackageArtifactsOutput> {
    if input.code.is_empty() {
        return Err(ActivityError::invalid_input("no generated code to package"));
    }
    ctx.info(&format!("packaging {} artifacts", input.code.len()));

    let mut packages = BTreeMap::new();
    for (language, code) in &input.code {
        ctx.ensure_active()?;
        let archive = build_archive(language, code)
            .map_err(|e| ActivityError::Other(anyhow::anyhow!("packaging {language}: {e:#}")))?;
        packages.insert(language.clone(), BASE64.encode(archive));
    }

    ctx.info(&format!("packaged {} artifacts", packages.len()));
    Ok(PackageArtifactsOutput { packages })
}

fn build_archive(language: &str, code: &str) -> anyhow::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let client_name = format!("client{}", client_extension(language));
    append_file(&mut builder, &client_name, code.as_bytes())?;

    let readme = format!(
        "# Generated {language} client\n\nGenerated by the Orbit platform. See `{client_name}`.\n"
    );
    append_file(&mut builder, "README.md", readme.as_bytes())?;

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

fn append_file<W: Write>(
    builder: &mut tar::Builder<W>,
    name: &str,
    content: &[u8],
) -> anyhow::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, content)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Upload artifacts

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadArtifactsInput {
    pub workspace_id: String,
    pub schema_id: String,
    /// language → base64 tar.gz
    pub packages: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadArtifactsOutput {
    /// language → object URL
    pub urls: BTreeMap<String, String>,
}

/// Upload every package to `{workspaceID}/{schemaID}/{language}.tar.gz`.
pub fn upload_artifacts(
    ctx: &ActivityContext,
    store: &dyn ObjectStore,
    input: &UploadArtifactsInput,
) -> ActivityResult<UploadArtifactsOutput> {
    require("workspace_id", &input.workspace_id)?;
    require("schema_id", &input.schema_id)?;
    if input.packages.is_empty() {
        return Err(ActivityError::invalid_input("no packages to upload"));
    }
    ctx.info(&format!(
        "uploading {} artifacts for schema {}",
        input.packages.len(),
        input.schema_id
    ));

    let mut urls = BTreeMap::new();
    for (language, encoded) in &input.packages {
        ctx.ensure_active()?;
        let bytes = BASE64.decode(encoded).map_err(|e| {
            ActivityError::invalid_input(format!("package for {language} is not valid base64: {e}"))
        })?;
        let path = format!(
            "{}/{}/{}.tar.gz",
            input.workspace_id, input.schema_id, language
        );
        let url = store.upload_bytes(ctx, &path, &bytes, "application/gzip")?;
        urls.insert(language.clone(), url);
    }

    ctx.info(&format!("uploaded {} artifacts", urls.len()));
    Ok(UploadArtifactsOutput { urls })
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;
    use crate::testsupport::FakeObjectStore;

    fn ctx() -> ActivityContext {
        ActivityContext::background("test")
    }

    #[test]
    fn protobuf_validation() {
        let valid = ValidateSchemaInput {
            schema_type: "protobuf".to_string(),
            content: "syntax = \"proto3\";\nmessage Event {}\n".to_string(),
        };
        assert!(validate_schema(&ctx(), &valid).expect("validate").valid);

        let proto2 = ValidateSchemaInput {
            schema_type: "protobuf".to_string(),
            content: "syntax = \"proto2\";\n".to_string(),
        };
        let out = validate_schema(&ctx(), &proto2).expect("validate");
        assert!(!out.valid);
        assert!(out.message.contains("proto3"));
    }

    #[test]
    fn openapi_validation_json_and_yaml() {
        let json_doc = ValidateSchemaInput {
            schema_type: "openapi".to_string(),
            content: r#"{"openapi": "3.0.3", "info": {"title": "t", "version": "1"}}"#.to_string(),
        };
        assert!(validate_schema(&ctx(), &json_doc).expect("validate").valid);

        let yaml_doc = ValidateSchemaInput {
            schema_type: "openapi".to_string(),
            content: "openapi: 3.1.0\ninfo:\n  title: t\n  version: '1'\npaths: {}\n".to_string(),
        };
        assert!(validate_schema(&ctx(), &yaml_doc).expect("validate").valid);

        let swagger2 = ValidateSchemaInput {
            schema_type: "openapi".to_string(),
            content: r#"{"swagger": "2.0", "info": {}}"#.to_string(),
        };
        assert!(!validate_schema(&ctx(), &swagger2).expect("validate").valid);

        let no_info = ValidateSchemaInput {
            schema_type: "openapi".to_string(),
            content: "openapi: 3.0.0\npaths: {}\n".to_string(),
        };
        let out = validate_schema(&ctx(), &no_info).expect("validate");
        assert!(!out.valid);
        assert!(out.message.contains("info"));
    }

    #[test]
    fn graphql_validation() {
        let valid = ValidateSchemaInput {
            schema_type: "graphql".to_string(),
            content: "type Query {\n  events: [Event!]!\n}\n".to_string(),
        };
        assert!(validate_schema(&ctx(), &valid).expect("validate").valid);

        let empty = ValidateSchemaInput {
            schema_type: "graphql".to_string(),
            content: "# just a comment\n".to_string(),
        };
        assert!(!validate_schema(&ctx(), &empty).expect("validate").valid);
    }

    #[test]
    fn unsupported_schema_type_is_permanent() {
        let input = ValidateSchemaInput {
            schema_type: "thrift".to_string(),
            content: "struct T {}".to_string(),
        };
        let err = validate_schema(&ctx(), &input).expect_err("unsupported");
        assert!(matches!(err, ActivityError::InvalidInput(_)));
    }

    #[test]
    fn generate_covers_the_four_languages() {
        let input = GenerateCodeInput {
            schema_type: "openapi".to_string(),
            content: "openapi: 3.0.0".to_string(),
            languages: vec![
                "go".to_string(),
                "typescript".to_string(),
                "python".to_string(),
                "java".to_string(),
            ],
        };
        let out = generate_code(&ctx(), &input).expect("generate");
        assert_eq!(out.code.len(), 4);
        assert!(out.code["go"].contains("package client"));
        assert!(out.code["typescript"].contains("export class Client"));
        assert!(out.code["python"].contains("class Client"));
        assert!(out.code["java"].contains("public final class Client"));
    }

    #[test]
    fn generate_rejects_unknown_languages() {
        let input = GenerateCodeInput {
            schema_type: "openapi".to_string(),
            content: "openapi: 3.0.0".to_string(),
            languages: vec!["cobol".to_string()],
        };
        let err = generate_code(&ctx(), &input).expect_err("unknown language");
        assert!(matches!(err, ActivityError::InvalidInput(_)));
    }

    #[test]
    fn packages_contain_client_and_readme() {
        let mut code = BTreeMap::new();
        code.insert("go".to_string(), "package client\n".to_string());
        let out = package_artifacts(&ctx(), &PackageArtifactsInput { code }).expect("package");

        let bytes = BASE64.decode(&out.packages["go"]).expect("base64");
        let mut archive = tar::Archive::new(GzDecoder::new(bytes.as_slice()));
        let names: Vec<String> = archive
            .entries()
            .expect("entries")
            .map(|e| {
                e.expect("entry")
                    .path()
                    .expect("path")
                    .to_string_lossy()
                    .to_string()
            })
            .collect();
        assert_eq!(names, vec!["client.go", "README.md"]);
    }

    #[test]
    fn package_extension_falls_back_to_txt() {
        assert_eq!(client_extension("go"), ".go");
        assert_eq!(client_extension("typescript"), ".ts");
        assert_eq!(client_extension("python"), ".py");
        assert_eq!(client_extension("java"), ".java");
        assert_eq!(client_extension("rust"), ".txt");
    }

    #[test]
    fn upload_places_artifacts_under_workspace_and_schema() {
        let store = FakeObjectStore::new();
        let mut packages = BTreeMap::new();
        packages.insert("go".to_string(), BASE64.encode(b"archive"));
        packages.insert("java".to_string(), BASE64.encode(b"archive"));

        let out = upload_artifacts(
            &ctx(),
            &store,
            &UploadArtifactsInput {
                workspace_id: "ws-1".to_string(),
                schema_id: "schema-9".to_string(),
                packages,
            },
        )
        .expect("upload");
        assert_eq!(out.urls.len(), 2);
        assert!(out.urls["go"].ends_with("ws-1/schema-9/go.tar.gz"));

        let mut paths = store.recorded_paths();
        paths.sort();
        assert_eq!(paths, vec!["ws-1/schema-9/go.tar.gz", "ws-1/schema-9/java.tar.gz"]);
    }

    #[test]
    fn upload_validates_inputs() {
        let store = FakeObjectStore::new();
        let err = upload_artifacts(
            &ctx(),
            &store,
            &UploadArtifactsInput {
                workspace_id: String::new(),
                schema_id: "s".to_string(),
                packages: BTreeMap::new(),
            },
        )
        .expect_err("empty workspace");
        assert!(matches!(err, ActivityError::InvalidInput(_)));
    }
}
