mod cache;
mod cache_manager;
mod client;
pub mod links;
mod provider;
mod status;
pub mod types;

#[cfg(test)]
mod testing;

pub use cache::{Cache, DiskCache, NullCache};
pub use cache_manager::{CacheManager, TtlPolicy};
pub use client::{CircleCIClient, DEFAULT_BASE_URL};
pub use provider::{
    BranchSelector, CircleCIProvider, FailedTestJobInfo, FailedTests, JobDetailsWithSteps,
    PipelineRef, PipelineWithWorkflows, WorkflowFailedTests, WorkflowWithJobs,
};

#[cfg(test)]
pub use provider::StepAction;
