//! runbot Core Library
//!
//! Parses `/run` triggers out of pull-request comments and turns each one
//! into a Tekton PipelineRun. Talks to GitHub and Kubernetes only through
//! the collaborator traits in [`collaborators`].

pub mod changed_files;
pub mod collaborators;
pub mod context;
pub mod dispatch;
pub mod duration;
pub mod error;
pub mod fakes;
pub mod gate;
pub mod manifest;
pub mod obs;
pub mod params;
pub mod request;
pub mod resolve;
pub mod session;
pub mod telemetry;
pub mod trigger;

pub use changed_files::{fetch_changed_files, ChangedFile, ChangedFileSet, FILES_PER_PAGE};
pub use collaborators::{
    CodeHost, CollabResult, Collaborators, ExecutionIdentity, IdentityStore, PipelineDefinition,
    PipelineStore, PullRequestDetail, PullRequestRef, RunSubmitter,
};
pub use context::DispatchContext;
pub use dispatch::{DispatchReport, DispatchedRun, Dispatcher, TriggerOutcome, DEFAULT_NAMESPACE};
pub use duration::{format_go_duration, parse_go_duration, DurationError};
pub use error::{CollabError, DispatchError, Result, RunError};
pub use gate::{authorize, Authorization, AuthorizationPolicy, DenialReason};
pub use manifest::PipelineRun;
pub use params::{bind_parameters, ParameterBinding};
pub use request::{build_request, AccessMode, ExecutionRequest};
pub use resolve::{resolve_identity, resolve_pipeline};
pub use session::{handle_comment, RunOutcome, RunSettings};
pub use telemetry::init_tracing;
pub use trigger::{parse_triggers, RawTriggerMatch, Trigger};
