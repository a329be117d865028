//! GitHub App integration: JWT minting, installation tokens, and the two
//! repository-creation endpoints the template pipeline uses.
//!
//! Installation tokens are the only process-wide shared-mutable state in the
//! layer. [`TokenService`] serializes access behind a mutex so a token is
//! refreshed at most once per expiring window no matter how many activities
//! ask concurrently, and seals tokens with [`orbit_encrypt`] before they are
//! written back to the installation record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use orbit_encrypt::TokenCipher;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cms::{CmsClient, collections};
use crate::context::ActivityContext;
use crate::doc::doc_id;
use crate::error::{ActivityError, ActivityResult, status_to_error, transport_error};
use crate::query::QueryBuilder;
use crate::types::GithubInstallation;

/// Tokens within this margin of expiry are treated as already expired, so a
/// workflow never receives a token that dies mid-push.
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// A freshly minted installation access token.
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// A repository created through the API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatedRepo {
    pub full_name: String,
    pub clone_url: String,
    pub html_url: String,
}

/// Repo-from-template request.
#[derive(Debug, Clone, Default)]
pub struct TemplateRepoRequest {
    pub template_owner: String,
    pub template_repo: String,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub private: bool,
}

/// The GitHub App surface this layer calls.
pub trait GithubApi: Send + Sync {
    fn mint_installation_token(
        &self,
        ctx: &ActivityContext,
        installation_id: i64,
    ) -> ActivityResult<MintedToken>;
    fn create_repo_from_template(
        &self,
        ctx: &ActivityContext,
        request: &TemplateRepoRequest,
        token: &str,
    ) -> ActivityResult<CreatedRepo>;
    fn create_org_repo(
        &self,
        ctx: &ActivityContext,
        org: &str,
        name: &str,
        description: &str,
        private: bool,
        token: &str,
    ) -> ActivityResult<CreatedRepo>;
}

#[derive(Serialize)]
struct AppJwtClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

/// Live GitHub App client.
pub struct GithubAppClient {
    api_base: String,
    app_id: String,
    private_key_pem: String,
    http: Client,
}

impl GithubAppClient {
    pub fn new(api_base: &str, app_id: &str, private_key_pem: &str) -> ActivityResult<Self> {
        let http = Client::builder()
            .user_agent(format!("orbit-activities/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ActivityError::unavailable(format!("building github client: {e}")))?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            private_key_pem: private_key_pem.to_string(),
            http,
        })
    }

    /// Short-lived app JWT: backdated a minute for clock skew, valid nine
    /// minutes (the API caps at ten).
    fn app_jwt(&self, now: DateTime<Utc>) -> ActivityResult<String> {
        let key = EncodingKey::from_rsa_pem(self.private_key_pem.as_bytes())
            .map_err(|e| ActivityError::invalid_input(format!("github app private key: {e}")))?;
        let claims = AppJwtClaims {
            iat: (now - ChronoDuration::seconds(60)).timestamp(),
            exp: (now + ChronoDuration::seconds(540)).timestamp(),
            iss: self.app_id.clone(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| ActivityError::Other(anyhow::anyhow!("signing github app jwt: {e}")))
    }

    fn check(
        resp: reqwest::blocking::Response,
        what: &str,
    ) -> ActivityResult<reqwest::blocking::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let hint: String = resp.text().unwrap_or_default().chars().take(200).collect();
        Err(status_to_error(status.as_u16(), what, &hint))
    }
}

impl GithubApi for GithubAppClient {
    fn mint_installation_token(
        &self,
        ctx: &ActivityContext,
        installation_id: i64,
    ) -> ActivityResult<MintedToken> {
        ctx.ensure_active()?;
        let what = format!("minting token for installation {installation_id}");
        let jwt = self.app_jwt(Utc::now())?;
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_base, installation_id
        );

        let resp = self
            .http
            .post(url)
            .timeout(ctx.remaining())
            .bearer_auth(jwt)
            .header("Accept", "application/vnd.github+json")
            .send()
            .map_err(|e| transport_error(e, &what))?;
        let body: serde_json::Value = Self::check(resp, &what)?
            .json()
            .map_err(|e| transport_error(e, &what))?;

        let token = body
            .get("token")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        if token.is_empty() {
            return Err(ActivityError::Other(anyhow::anyhow!(
                "{what}: response carried no token"
            )));
        }
        let expires_at = body
            .get("expires_at")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc::now() + ChronoDuration::hours(1));

        Ok(MintedToken { token, expires_at })
    }

    fn create_repo_from_template(
        &self,
        ctx: &ActivityContext,
        request: &TemplateRepoRequest,
        token: &str,
    ) -> ActivityResult<CreatedRepo> {
        ctx.ensure_active()?;
        let what = format!(
            "creating {}/{} from template {}/{}",
            request.owner, request.name, request.template_owner, request.template_repo
        );
        let url = format!(
            "{}/repos/{}/{}/generate",
            self.api_base, request.template_owner, request.template_repo
        );
        let body = json!({
            "owner": request.owner,
            "name": request.name,
            "description": request.description,
            "private": request.private,
            "include_all_branches": false,
        });

        let resp = self
            .http
            .post(url)
            .timeout(ctx.remaining())
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .map_err(|e| transport_error(e, &what))?;
        let body: serde_json::Value = Self::check(resp, &what)?
            .json()
            .map_err(|e| transport_error(e, &what))?;
        Ok(parse_repo(&body))
    }

    fn create_org_repo(
        &self,
        ctx: &ActivityContext,
        org: &str,
        name: &str,
        description: &str,
        private: bool,
        token: &str,
    ) -> ActivityResult<CreatedRepo> {
        ctx.ensure_active()?;
        let what = format!("creating repository {org}/{name}");
        let url = format!("{}/orgs/{}/repos", self.api_base, org);
        let body = json!({
            "name": name,
            "description": description,
            "private": private,
            "auto_init": false,
        });

        let resp = self
            .http
            .post(url)
            .timeout(ctx.remaining())
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .map_err(|e| transport_error(e, &what))?;
        let body: serde_json::Value = Self::check(resp, &what)?
            .json()
            .map_err(|e| transport_error(e, &what))?;
        Ok(parse_repo(&body))
    }
}

fn parse_repo(body: &serde_json::Value) -> CreatedRepo {
    let s = |field: &str| {
        body.get(field)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    CreatedRepo {
        full_name: s("full_name"),
        clone_url: s("clone_url"),
        html_url: s("html_url"),
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Process-wide installation token cache.
pub struct TokenService {
    cms: CmsClient,
    api: Arc<dyn GithubApi>,
    cipher: Option<TokenCipher>,
    cache: Mutex<HashMap<i64, CachedToken>>,
}

impl TokenService {
    pub fn new(cms: CmsClient, api: Arc<dyn GithubApi>, cipher: Option<TokenCipher>) -> Self {
        Self {
            cms,
            api,
            cipher,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// A usable token for the installation, minting only when neither the
    /// cache nor the stored installation record has one outside the refresh
    /// margin. The lock is held across the mint so concurrent callers
    /// coalesce onto one refresh.
    pub fn get(&self, ctx: &ActivityContext, installation_id: i64) -> ActivityResult<String> {
        let mut cache = self.cache.lock().expect("token cache lock");
        let now = Utc::now();
        let margin = ChronoDuration::minutes(REFRESH_MARGIN_MINUTES);
        if let Some(cached) = cache.get(&installation_id)
            && cached.expires_at > now + margin
        {
            return Ok(cached.token.clone());
        }

        // Another worker may have refreshed the record already; read it
        // through before minting. Expiry is a hard boundary.
        if let Some(stored) = self.stored_token(ctx, installation_id, now + margin) {
            cache.insert(installation_id, stored.clone());
            return Ok(stored.token);
        }

        let minted = self.api.mint_installation_token(ctx, installation_id)?;
        cache.insert(
            installation_id,
            CachedToken {
                token: minted.token.clone(),
                expires_at: minted.expires_at,
            },
        );
        Ok(minted.token)
    }

    fn stored_token(
        &self,
        ctx: &ActivityContext,
        installation_id: i64,
        boundary: DateTime<Utc>,
    ) -> Option<CachedToken> {
        let doc = self
            .cms
            .find_one(
                ctx,
                collections::GITHUB_INSTALLATIONS,
                &QueryBuilder::new().where_equals("installationId", installation_id.to_string()),
            )
            .ok()
            .flatten()?;
        let installation = GithubInstallation::from_doc(&doc);
        let sealed = installation.usable_token(boundary)?;
        let token = match &self.cipher {
            Some(cipher) => cipher.open(sealed).ok()?,
            None => sealed.to_string(),
        };
        Some(CachedToken {
            token,
            expires_at: installation.token_expires_at?,
        })
    }

    /// Seal a token for storage; plaintext passthrough when no cipher is
    /// configured.
    fn seal(&self, token: &str) -> ActivityResult<String> {
        match &self.cipher {
            Some(cipher) => cipher
                .seal(token)
                .map_err(|e| ActivityError::Other(anyhow::anyhow!("sealing token: {e:#}"))),
            None => Ok(token.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Activities

/// Input for the token refresh activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshTokenInput {
    /// CMS id of the installation record, when the workflow carries it.
    #[serde(default)]
    pub installation_doc_id: String,
    /// GitHub installation id; used to look the record up when the doc id
    /// is absent.
    #[serde(default)]
    pub installation_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenOutput {
    pub installation_id: i64,
    pub token_expires_at: DateTime<Utc>,
}

/// Mint a fresh installation token, seal it, and write it back to the
/// installation record. Invoked by the token-maintenance workflow, which
/// reschedules itself ahead of `token_expires_at`.
pub fn refresh_installation_token(
    ctx: &ActivityContext,
    tokens: &TokenService,
    input: &RefreshTokenInput,
) -> ActivityResult<RefreshTokenOutput> {
    if input.installation_doc_id.trim().is_empty() && input.installation_id == 0 {
        return Err(ActivityError::invalid_input(
            "installation_doc_id or installation_id is required",
        ));
    }
    ctx.info(&format!(
        "refreshing installation token (doc {}, installation {})",
        input.installation_doc_id, input.installation_id
    ));

    let doc = if !input.installation_doc_id.trim().is_empty() {
        tokens
            .cms
            .get(ctx, collections::GITHUB_INSTALLATIONS, &input.installation_doc_id)?
    } else {
        tokens
            .cms
            .find_one(
                ctx,
                collections::GITHUB_INSTALLATIONS,
                &QueryBuilder::new()
                    .where_equals("installationId", input.installation_id.to_string()),
            )?
            .ok_or_else(|| {
                ActivityError::not_found(format!("installation {}", input.installation_id))
            })?
    };
    let installation = GithubInstallation::from_doc(&doc);
    if installation.installation_id == 0 {
        return Err(ActivityError::invalid_input(format!(
            "installation record {} carries no installationId",
            doc_id(&doc)
        )));
    }

    let minted = tokens
        .api
        .mint_installation_token(ctx, installation.installation_id)?;
    let sealed = tokens.seal(&minted.token)?;
    let now = Utc::now();

    tokens.cms.update_internal(
        ctx,
        collections::GITHUB_INSTALLATIONS,
        &installation.id,
        json!({
            "installationToken": sealed,
            "tokenExpiresAt": minted.expires_at.to_rfc3339(),
            "tokenLastRefreshedAt": now.to_rfc3339(),
            "status": "active",
            "temporalWorkflowStatus": "running",
        }),
    )?;

    // Keep the process cache in step with what was just persisted.
    tokens.cache.lock().expect("token cache lock").insert(
        installation.installation_id,
        CachedToken {
            token: minted.token,
            expires_at: minted.expires_at,
        },
    );

    ctx.info(&format!(
        "refreshed token for installation {} (expires {})",
        installation.installation_id, minted.expires_at
    ));
    Ok(RefreshTokenOutput {
        installation_id: installation.installation_id,
        token_expires_at: minted.expires_at,
    })
}

/// Input for the installation status activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallationStatusInput {
    pub installation_doc_id: String,
    /// suspended | revoked | active
    pub status: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub suspended_at: Option<DateTime<Utc>>,
}

/// Flip an installation to suspended/revoked (or back to active).
pub fn update_installation_status(
    ctx: &ActivityContext,
    cms: &CmsClient,
    input: &InstallationStatusInput,
) -> ActivityResult<()> {
    crate::context::require("installation_doc_id", &input.installation_doc_id)?;
    crate::context::require("status", &input.status)?;
    if !matches!(input.status.as_str(), "active" | "suspended" | "revoked") {
        return Err(ActivityError::invalid_input(format!(
            "unknown installation status {}",
            input.status
        )));
    }
    ctx.info(&format!(
        "setting installation {} status to {}",
        input.installation_doc_id, input.status
    ));

    let mut patch = json!({
        "status": input.status,
        "suspensionReason": input.reason,
    });
    if let Some(at) = input.suspended_at {
        patch["suspendedAt"] = json!(at.to_rfc3339());
    }
    cms.update_internal(
        ctx,
        collections::GITHUB_INSTALLATIONS,
        &input.installation_doc_id,
        patch,
    )?;
    Ok(())
}
