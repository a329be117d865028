//! Blocking facade over the gateway's `BifrostAdminService`.
//!
//! The activity layer is synchronous; each client owns a current-thread
//! tokio runtime and drives unary calls under the activity deadline. The
//! [`GatewayAdmin`] trait is the seam the provisioner and the
//! decommissioning saga depend on, so tests substitute a recording fake.

use std::sync::Mutex;
use std::time::Duration;

use tonic::Code;
use tonic::transport::{Channel, Endpoint};

use crate::context::ActivityContext;
use crate::error::{ActivityError, ActivityResult};
use crate::proto::gateway::v1 as pb;
use crate::proto::gateway::v1::bifrost_admin_service_client::BifrostAdminServiceClient;
use crate::types::PermissionTemplate;

/// Virtual-cluster upsert pushed to the gateway.
#[derive(Debug, Clone, Default)]
pub struct VirtualClusterUpsert {
    pub id: String,
    pub application_id: String,
    pub application_slug: String,
    pub workspace_slug: String,
    pub environment: String,
    pub topic_prefix: String,
    pub group_prefix: String,
    pub advertised_host: String,
    pub advertised_port: i64,
    pub physical_bootstrap_servers: String,
    pub read_only: bool,
}

/// Credential upsert pushed to the gateway.
#[derive(Debug, Clone, Default)]
pub struct CredentialUpsert {
    pub id: String,
    pub virtual_cluster_id: String,
    pub username: String,
    pub password_hash: String,
    pub template: PermissionTemplate,
}

/// Admin operations the gateway exposes to this layer.
pub trait GatewayAdmin: Send + Sync {
    fn upsert_virtual_cluster(
        &self,
        ctx: &ActivityContext,
        config: &VirtualClusterUpsert,
    ) -> ActivityResult<()>;
    fn upsert_credential(
        &self,
        ctx: &ActivityContext,
        credential: &CredentialUpsert,
    ) -> ActivityResult<()>;
    fn revoke_credential(&self, ctx: &ActivityContext, credential_id: &str) -> ActivityResult<()>;
    fn set_virtual_cluster_read_only(
        &self,
        ctx: &ActivityContext,
        virtual_cluster_id: &str,
        read_only: bool,
    ) -> ActivityResult<()>;
    fn delete_virtual_cluster(
        &self,
        ctx: &ActivityContext,
        virtual_cluster_id: &str,
    ) -> ActivityResult<()>;
}

/// Map a domain permission template onto the wire enum.
pub(crate) fn template_to_proto(template: PermissionTemplate) -> pb::PermissionTemplate {
    match template {
        PermissionTemplate::Unspecified => pb::PermissionTemplate::Unspecified,
        PermissionTemplate::Producer => pb::PermissionTemplate::Producer,
        PermissionTemplate::Consumer => pb::PermissionTemplate::Consumer,
        PermissionTemplate::Admin => pb::PermissionTemplate::Admin,
        PermissionTemplate::Custom => pb::PermissionTemplate::Custom,
    }
}

/// Default scheme for bare `host:port` addresses from configuration.
pub(crate) fn ensure_scheme(addr: &str) -> String {
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{addr}")
    }
}

/// Map a gRPC status onto the activity error kinds.
pub(crate) fn grpc_status_error(status: tonic::Status, what: &str) -> ActivityError {
    let detail = format!("{what}: {}: {}", status.code(), status.message());
    match status.code() {
        Code::NotFound => ActivityError::NotFound(what.to_string()),
        Code::AlreadyExists => ActivityError::Conflict(detail),
        Code::PermissionDenied | Code::Unauthenticated => ActivityError::PermissionDenied(detail),
        Code::InvalidArgument | Code::FailedPrecondition => ActivityError::InvalidInput(detail),
        Code::Unavailable
        | Code::DeadlineExceeded
        | Code::ResourceExhausted
        | Code::Aborted
        | Code::Unknown => ActivityError::Unavailable(detail),
        _ => ActivityError::Other(anyhow::anyhow!(detail)),
    }
}

/// gRPC-backed gateway client.
pub struct GrpcGatewayAdmin {
    runtime: tokio::runtime::Runtime,
    client: Mutex<BifrostAdminServiceClient<Channel>>,
}

impl GrpcGatewayAdmin {
    /// Build a lazily connecting client; the first RPC establishes the
    /// channel, bounded by the per-call deadline.
    pub fn connect(addr: &str) -> ActivityResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ActivityError::unavailable(format!("building gateway runtime: {e}")))?;
        let endpoint = Endpoint::from_shared(ensure_scheme(addr))
            .map_err(|e| ActivityError::invalid_input(format!("gateway address {addr}: {e}")))?
            .connect_timeout(Duration::from_secs(10));
        let channel = endpoint.connect_lazy();
        Ok(Self {
            runtime,
            client: Mutex::new(BifrostAdminServiceClient::new(channel)),
        })
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

impl GatewayAdmin for GrpcGatewayAdmin {
    fn upsert_virtual_cluster(
        &self,
        ctx: &ActivityContext,
        config: &VirtualClusterUpsert,
    ) -> ActivityResult<()> {
        ctx.ensure_active()?;
        let request = pb::VirtualClusterConfig {
            id: config.id.clone(),
            application_id: config.application_id.clone(),
            application_slug: config.application_slug.clone(),
            workspace_slug: config.workspace_slug.clone(),
            environment: config.environment.clone(),
            topic_prefix: config.topic_prefix.clone(),
            group_prefix: config.group_prefix.clone(),
            transaction_id_prefix: config.topic_prefix.clone(),
            advertised_host: config.advertised_host.clone(),
            advertised_port: config.advertised_port as i32,
            physical_bootstrap_servers: config.physical_bootstrap_servers.clone(),
            read_only: config.read_only,
        };
        let mut client = self.client.lock().expect("gateway client lock");
        self.run(ctx, "upserting virtual cluster", client.upsert_virtual_cluster(request))
            .map(|_| ())
    }

    fn upsert_credential(
        &self,
        ctx: &ActivityContext,
        credential: &CredentialUpsert,
    ) -> ActivityResult<()> {
        ctx.ensure_active()?;
        let request = pb::CredentialConfig {
            id: credential.id.clone(),
            virtual_cluster_id: credential.virtual_cluster_id.clone(),
            username: credential.username.clone(),
            password_hash: credential.password_hash.clone(),
            template: template_to_proto(credential.template) as i32,
        };
        let mut client = self.client.lock().expect("gateway client lock");
        self.run(ctx, "upserting credential", client.upsert_credential(request))
            .map(|_| ())
    }

    fn revoke_credential(&self, ctx: &ActivityContext, credential_id: &str) -> ActivityResult<()> {
        ctx.ensure_active()?;
        let request = pb::RevokeCredentialRequest {
            id: credential_id.to_string(),
        };
        let mut client = self.client.lock().expect("gateway client lock");
        self.run(ctx, "revoking credential", client.revoke_credential(request))
            .map(|_| ())
    }

    fn set_virtual_cluster_read_only(
        &self,
        ctx: &ActivityContext,
        virtual_cluster_id: &str,
        read_only: bool,
    ) -> ActivityResult<()> {
        ctx.ensure_active()?;
        let request = pb::SetVirtualClusterReadOnlyRequest {
            id: virtual_cluster_id.to_string(),
            read_only,
        };
        let mut client = self.client.lock().expect("gateway client lock");
        self.run(
            ctx,
            "setting virtual cluster read-only",
            client.set_virtual_cluster_read_only(request),
        )
        .map(|_| ())
    }

    fn delete_virtual_cluster(
        &self,
        ctx: &ActivityContext,
        virtual_cluster_id: &str,
    ) -> ActivityResult<()> {
        ctx.ensure_active()?;
        let request = pb::DeleteVirtualClusterRequest {
            id: virtual_cluster_id.to_string(),
        };
        let mut client = self.client.lock().expect("gateway client lock");
        self.run(ctx, "deleting virtual cluster", client.delete_virtual_cluster(request))
            .map(|_| ())
    }
}
