//! Orchestration services: invocation, normalization, caching

pub mod failover;
pub mod normalizer;
pub mod orchestrator;
pub mod result_cache;
pub mod webhook_client;
