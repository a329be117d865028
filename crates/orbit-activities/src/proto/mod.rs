//! Vendored protobuf modules for the gateway and build-service RPC surfaces.
//!
//! Generated from the sources under `proto/` and committed so builds do not
//! depend on a protoc toolchain; regenerate with `scripts/generate-proto.sh`
//! after editing the `.proto` files.

pub mod gateway {
    pub mod v1 {
        include!("orbit.gateway.v1.rs");
    }
}

pub mod build {
    pub mod v1 {
        include!("orbit.build.v1.rs");
    }
}
