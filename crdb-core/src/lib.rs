/*
    crdb-core - Pluggable CRDT database core

    A registry of encrypted CRDT resources composed from three plugin
    dimensions (datatype x storage x crypto method), served through a
    thin request/response service layer and replicated via
    content-addressed peer retrieval.
*/

pub mod config;
pub mod crdt;
pub mod crypto;
pub mod database;
pub mod logging;
pub mod resource;
pub mod service;
pub mod storage;

pub use config::Config;
pub use database::{Database, DatabaseError, DbResult};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogLevel};
pub use resource::{ReferenceId, Resource, ResourceId, ResourceKey, ResourceType};
