//! # Orbit activity layer
//!
//! The side-effect layer of the Orbit Internal Developer Platform: every
//! operation the durable workflow runtime invokes against the platform's
//! external systems lives here, behind one uniform contract.
//!
//! ## Contract
//!
//! - **Deterministic validation first** — required-field and format checks
//!   fail permanently before any side effect.
//! - **Idempotent under retry** — where the backing store lacks
//!   compare-and-swap, activities find by natural key and upsert; duplicate
//!   rejections from remotes count as success.
//! - **Cancellation honored** — every outbound call (CMS HTTP, gateway and
//!   build-service gRPC, Kafka admin, git subprocesses, GitHub, object
//!   store) is bounded by the caller's deadline via [`context::ActivityContext`].
//! - **Classified failure** — every error carries an
//!   [`error::ErrorClass`] so the runtime knows whether redelivery can help.
//! - **Partial results are data** — mass-update steps return
//!   succeeded/failed id lists and never abort on the first bad item.
//!
//! ## Engines
//!
//! - [`vcluster`] — virtual-cluster provisioning: environment-mapping
//!   resolution, idempotent VC creation, gateway push, status transitions.
//! - [`topics`] — physical topic creation with merged configs, the
//!   permission → ACL enumeration, best-effort revocation, and schema
//!   registration.
//! - [`decommission`] — the teardown saga, one retryable activity per step,
//!   with the metrics archive as the only non-fatal step.
//! - [`lineage`] — per-record edge upserts plus the scheduled 24h reset,
//!   inactivity marking, and daily per-topic snapshots.
//! - [`buildcoord`] — repository analysis, image build/push, build status,
//!   and the registry quota bookkeeping.
//! - [`gitops`] / [`template`] — git working-tree activities and the
//!   two-mode template materialization pipeline.
//! - [`codegen`] / [`specsync`] / [`health`] — schema validation, client
//!   generation and packaging, API-catalog sync, HTTP health checks.
//!
//! ## Clients
//!
//! - [`cms`] — the typed-boundary REST client; raw documents never escape
//!   it ([`doc`] holds the coercion helpers, [`query`] the builder).
//! - [`gateway`] / [`buildsvc`] — blocking facades over the vendored gRPC
//!   clients in [`proto`].
//! - [`adapter`] / [`kafka_wire`] — the per-invocation Kafka capability
//!   (topics + ACLs over the admin protocol) and schema registry client.
//! - [`github`] — GitHub App JWTs, the coalescing installation token cache,
//!   and repository creation.
//! - [`objectstore`] — archive and artifact uploads.
//!
//! The dispatch registry in [`harness`] maps activity names to handlers and
//! enforces the logging and audit contract; [`config`] assembles the
//! dependency set from `.orbit.toml` and `ORBIT_*` environment variables.

pub mod adapter;
pub mod buildcoord;
pub mod buildsvc;
pub mod cms;
pub mod codegen;
pub mod config;
pub mod context;
pub mod decommission;
pub mod doc;
pub mod error;
pub mod gateway;
pub mod github;
pub mod gitops;
pub mod harness;
pub mod health;
pub mod kafka_wire;
pub mod lineage;
pub mod objectstore;
pub mod proto;
pub mod query;
pub mod sanitize;
pub mod specsync;
pub mod template;
pub mod topics;
pub mod types;
pub mod vcluster;

#[cfg(test)]
pub(crate) mod testsupport;

pub use context::{ActivityContext, Reporter};
pub use error::{ActivityError, ActivityResult, ErrorClass};
pub use harness::{ACTIVITY_NAMES, Dependencies, dispatch};
