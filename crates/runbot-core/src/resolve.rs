//! Pipeline and service-account resolution.
//!
//! Both resolvers walk an ordered list of lookups and return the first hit.
//! Each lookup says what a miss means: either try the next one, or stop.

use tracing::debug;

use crate::collaborators::{ExecutionIdentity, IdentityStore, PipelineDefinition, PipelineStore};
use crate::error::DispatchError;

/// Service account used when no account is named after the pipeline.
pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";

/// What to do when a lookup finds nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissing {
    /// The namespace was explicitly requested; a miss ends resolution.
    Stop,
    /// Try the next namespace.
    Continue,
}

/// One step of the namespace search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceLookup {
    pub namespace: String,
    pub on_missing: OnMissing,
}

/// Namespaces to search, in order.
///
/// A user-supplied namespace is the only candidate. Otherwise the namespace
/// named after the repository is tried before the default namespace. Empty
/// namespaces are dropped.
pub fn namespace_search_order(
    user_hint: &str,
    repo_namespace: &str,
    default_namespace: &str,
) -> Vec<NamespaceLookup> {
    if !user_hint.is_empty() {
        return vec![NamespaceLookup {
            namespace: user_hint.to_string(),
            on_missing: OnMissing::Stop,
        }];
    }

    [repo_namespace, default_namespace]
        .into_iter()
        .filter(|ns| !ns.is_empty())
        .map(|ns| NamespaceLookup {
            namespace: ns.to_string(),
            on_missing: OnMissing::Continue,
        })
        .collect()
}

/// Find `pipeline_name` following [`namespace_search_order`].
///
/// Returns the definition and the namespace it was found in.
pub async fn resolve_pipeline(
    store: &dyn PipelineStore,
    pipeline_name: &str,
    user_hint: &str,
    repo_namespace: &str,
    default_namespace: &str,
) -> Result<(PipelineDefinition, String), DispatchError> {
    for lookup in namespace_search_order(user_hint, repo_namespace, default_namespace) {
        match store.get_pipeline(&lookup.namespace, pipeline_name).await {
            Ok(pipeline) => {
                crate::obs::emit_pipeline_resolved(pipeline_name, &lookup.namespace);
                return Ok((pipeline, lookup.namespace));
            }
            Err(err) if err.is_not_found() => match lookup.on_missing {
                OnMissing::Stop => {
                    return Err(DispatchError::PipelineNotInRequestedNamespace {
                        name: pipeline_name.to_string(),
                        namespace: lookup.namespace,
                    });
                }
                OnMissing::Continue => {
                    debug!(pipeline = %pipeline_name, namespace = %lookup.namespace, "Pipeline not in namespace");
                }
            },
            Err(source) => {
                return Err(DispatchError::PipelineLookup {
                    name: pipeline_name.to_string(),
                    namespace: lookup.namespace,
                    source,
                });
            }
        }
    }

    Err(DispatchError::PipelineNotFound {
        name: pipeline_name.to_string(),
    })
}

/// Service accounts to try, in order: the candidate, then `default`.
pub fn service_account_candidates(candidate: &str) -> Vec<&str> {
    if candidate == DEFAULT_SERVICE_ACCOUNT {
        vec![candidate]
    } else {
        vec![candidate, DEFAULT_SERVICE_ACCOUNT]
    }
}

/// Find the service account to run as.
///
/// Only a not-found answer moves on to `default`; any other error is returned
/// as is.
pub async fn resolve_identity(
    store: &dyn IdentityStore,
    candidate: &str,
    namespace: &str,
) -> Result<ExecutionIdentity, DispatchError> {
    for name in service_account_candidates(candidate) {
        match store.get_service_account(namespace, name).await {
            Ok(identity) => {
                crate::obs::emit_identity_resolved(&identity.name, namespace);
                return Ok(identity);
            }
            Err(err) if err.is_not_found() => {
                debug!(service_account = %name, namespace = %namespace, "Service account not found");
            }
            Err(source) => {
                return Err(DispatchError::IdentityLookup {
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                    source,
                });
            }
        }
    }

    Err(DispatchError::IdentityNotFound {
        name: candidate.to_string(),
        namespace: namespace.to_string(),
    })
}
