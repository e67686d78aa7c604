//! Types generated from the protos under `proto/`.

/// The plugin protocol spoken with the host runtime.
pub mod provider {
    tonic::include_proto!("indykite.provider.v1");
}

/// Messages of the IndyKite configuration API.
pub mod config {
    tonic::include_proto!("indykite.config.v1");
}
