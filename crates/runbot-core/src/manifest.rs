//! Serde model of the `tekton.dev/v1` PipelineRun we create.
//!
//! Only the fields runbot sets are modelled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::duration::format_go_duration;
use crate::request::{AccessMode, ExecutionRequest};

pub const API_VERSION: &str = "tekton.dev/v1";
pub const KIND: &str = "PipelineRun";

/// Workspace every pipeline receives.
pub const SHARED_WORKSPACE: &str = "shared";
pub const WORKSPACE_SIZE: &str = "5Gi";
pub const RUN_AS_ID: i64 = 1000;
pub const IMAGE_PULL_SECRETS: [&str; 2] = ["quay-imagepull-secret", "gsociprivate-pull-secret"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: PipelineRunSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    pub pipeline_ref: PipelineRef,
    pub timeouts: Timeouts,
    pub params: Vec<Param>,
    pub task_run_template: TaskRunTemplate,
    pub workspaces: Vec<WorkspaceBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Go duration notation, e.g. `1h0m0s`.
    pub pipeline: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRunTemplate {
    pub service_account_name: String,
    pub pod_template: PodTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplate {
    pub security_context: PodSecurityContext,
    pub image_pull_secrets: Vec<LocalObjectReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSecurityContext {
    pub run_as_group: i64,
    pub run_as_non_root: bool,
    pub run_as_user: i64,
    pub seccomp_profile: SeccompProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeccompProfile {
    #[serde(rename = "type")]
    pub profile_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalObjectReference {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceBinding {
    pub name: String,
    pub volume_claim_template: VolumeClaimTemplate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeClaimTemplate {
    pub spec: VolumeClaimSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeClaimSpec {
    pub storage_class_name: String,
    pub access_modes: Vec<AccessMode>,
    pub resources: VolumeResources,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeResources {
    pub requests: BTreeMap<String, String>,
}

impl PipelineRun {
    pub fn from_request(request: &ExecutionRequest) -> Self {
        PipelineRun {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ObjectMeta {
                name: None,
                generate_name: Some(request.generate_name_prefix.clone()),
                namespace: Some(request.namespace.clone()),
                labels: request.labels.clone(),
                annotations: request.annotations.clone(),
            },
            spec: PipelineRunSpec {
                pipeline_ref: PipelineRef {
                    name: request.pipeline_name.clone(),
                },
                timeouts: Timeouts {
                    pipeline: format_go_duration(request.timeout),
                },
                params: request
                    .params
                    .iter()
                    .map(|(name, value)| Param {
                        name: name.clone(),
                        value: value.clone(),
                    })
                    .collect(),
                task_run_template: TaskRunTemplate {
                    service_account_name: request.service_account_name.clone(),
                    pod_template: PodTemplate {
                        security_context: PodSecurityContext {
                            run_as_group: RUN_AS_ID,
                            run_as_non_root: true,
                            run_as_user: RUN_AS_ID,
                            seccomp_profile: SeccompProfile {
                                profile_type: "RuntimeDefault".to_string(),
                            },
                        },
                        image_pull_secrets: IMAGE_PULL_SECRETS
                            .iter()
                            .map(|name| LocalObjectReference {
                                name: name.to_string(),
                            })
                            .collect(),
                    },
                },
                workspaces: vec![WorkspaceBinding {
                    name: SHARED_WORKSPACE.to_string(),
                    volume_claim_template: VolumeClaimTemplate {
                        spec: VolumeClaimSpec {
                            storage_class_name: request.workspace_storage_class.clone(),
                            access_modes: vec![request.workspace_access_mode],
                            resources: VolumeResources {
                                requests: BTreeMap::from([(
                                    "storage".to_string(),
                                    WORKSPACE_SIZE.to_string(),
                                )]),
                            },
                        },
                    },
                }],
            },
        }
    }
}
