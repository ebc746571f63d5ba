//! Runner-facing collaborators behind the exchange dispatcher.
//!
//! Every service the wrapped commands touch lives here: the pipelines
//! artifact store, the actions cache, the OIDC token broker, and the
//! on-disk tool cache. Each family sits behind a trait so dispatch code
//! can be exercised against scripted fakes, while the runner-backed
//! implementations talk to the live services described by the captured
//! [`RunnerEnvironment`].

use std::sync::Arc;

mod archive;
mod artifact;
mod cache;
mod contract;
mod env;
mod error;
mod http;
mod oidc;
mod tool_cache;

#[cfg(feature = "test-support")]
pub mod test_support;

pub use artifact::PipelinesArtifactStore;
pub use cache::ActionsCacheStore;
pub use contract::{
    ArtifactStore, ArtifactUploadPlan, CacheRestoreSpec, CacheSaveSpec, CacheStore,
    DownloadedArtifact, TokenBroker, ToolCache, ToolDownloadSpec, Toolkit, UploadedArtifact,
};
pub use env::RunnerEnvironment;
pub use error::ToolkitError;
pub use oidc::RunnerTokenBroker;
pub use tool_cache::RunnerToolCache;

/// Builds the production toolkit over a captured runner environment.
///
/// All four families share one HTTP client; environment requirements are
/// checked lazily per operation, so construction succeeds even on a bare
/// environment.
pub fn runner_toolkit(env: RunnerEnvironment) -> Result<Toolkit, ToolkitError> {
    let client = http::client()?;
    Ok(Toolkit::new(
        Arc::new(PipelinesArtifactStore::new(client.clone(), env.clone())),
        Arc::new(ActionsCacheStore::new(client.clone(), env.clone())),
        Arc::new(RunnerTokenBroker::new(client.clone(), env.clone())),
        Arc::new(RunnerToolCache::new(client, env)),
    ))
}
