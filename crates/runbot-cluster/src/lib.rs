//! runbot-cluster: Kubernetes and Tekton access for runbot
//!
//! [`ClusterClient`] implements `PipelineStore`, `IdentityStore` and
//! `RunSubmitter` from `runbot_core`. [`ClusterConfig`] comes from a
//! kubeconfig file or from the in-cluster service-account mount.

pub mod client;
pub mod config;
pub mod error;
pub mod kubeconfig;

pub use client::ClusterClient;
pub use config::{ClusterAuth, ClusterConfig};
pub use error::{ClusterError, Result};
pub use kubeconfig::Kubeconfig;
