//! Kubernetes/Tekton REST client
//!
//! Implements the three cluster-facing collaborator traits over the API
//! server's REST endpoints:
//!
//! - `GET  /apis/tekton.dev/v1/namespaces/{ns}/pipelines/{name}`
//! - `GET  /api/v1/namespaces/{ns}/serviceaccounts/{name}`
//! - `POST /apis/tekton.dev/v1/namespaces/{ns}/pipelineruns`

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use runbot_core::manifest::ObjectMeta;
use runbot_core::{
    CollabResult, ExecutionIdentity, ExecutionRequest, IdentityStore, PipelineDefinition,
    PipelineStore, RunSubmitter,
};

use crate::config::{ClusterAuth, ClusterConfig};
use crate::error::{ClusterError, Result};

const TEKTON_API: &str = "apis/tekton.dev/v1";
const CORE_API: &str = "api/v1";
const MAX_ERROR_BODY: usize = 800;

#[derive(Debug, Deserialize)]
struct PipelineObject {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: PipelineSpecBody,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineSpecBody {
    #[serde(default)]
    params: Vec<ParamSpecBody>,
}

#[derive(Debug, Deserialize)]
struct ParamSpecBody {
    name: String,
}

#[derive(Debug, Deserialize)]
struct NamedObject {
    #[serde(default)]
    metadata: ObjectMeta,
}

/// Client for one API server
#[derive(Debug, Clone)]
pub struct ClusterClient {
    http: reqwest::Client,
    server: String,
}

impl ClusterClient {
    pub fn new(config: &ClusterConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("runbot/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify);

        if let Some(ca_pem) = &config.ca_pem {
            let certs = reqwest::Certificate::from_pem_bundle(ca_pem)
                .map_err(|e| ClusterError::Client(format!("invalid CA bundle: {e}")))?;
            if certs.is_empty() {
                return Err(ClusterError::Client(
                    "CA bundle contains no certificates".to_string(),
                ));
            }
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        match &config.auth {
            ClusterAuth::Anonymous => {}
            ClusterAuth::BearerToken(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| ClusterError::Client("invalid bearer token".to_string()))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            ClusterAuth::ClientCertificate { cert_pem, key_pem } => {
                let mut pem = cert_pem.clone();
                pem.push(b'\n');
                pem.extend_from_slice(key_pem);
                let identity = reqwest::Identity::from_pem(&pem)
                    .map_err(|e| ClusterError::Client(format!("invalid client certificate: {e}")))?;
                builder = builder.identity(identity);
            }
        }

        let http = builder
            .default_headers(headers)
            .build()
            .map_err(|e| ClusterError::Client(e.to_string()))?;

        Ok(ClusterClient {
            http,
            server: config.server.trim_end_matches('/').to_string(),
        })
    }

    fn tekton_url(&self, namespace: &str, resource: &str) -> String {
        format!("{}/{TEKTON_API}/namespaces/{namespace}/{resource}", self.server)
    }

    /// Fetch a Tekton Pipeline.
    pub async fn fetch_pipeline(&self, namespace: &str, name: &str) -> Result<PipelineDefinition> {
        let url = format!("{}/{}", self.tekton_url(namespace, "pipelines"), name);
        let object: PipelineObject = self.send("get pipeline", self.http.get(url)).await?;

        Ok(PipelineDefinition {
            name: object.metadata.name.unwrap_or_else(|| name.to_string()),
            namespace: object
                .metadata
                .namespace
                .unwrap_or_else(|| namespace.to_string()),
            declared_parameter_names: object.spec.params.into_iter().map(|p| p.name).collect(),
            annotations: object.metadata.annotations,
        })
    }

    /// Fetch a ServiceAccount.
    pub async fn fetch_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ExecutionIdentity> {
        let url = format!(
            "{}/{CORE_API}/namespaces/{namespace}/serviceaccounts/{name}",
            self.server
        );
        let object: NamedObject = self.send("get serviceaccount", self.http.get(url)).await?;
        let name = object.metadata.name.unwrap_or_else(|| name.to_string());
        Ok(ExecutionIdentity::new(name, namespace))
    }

    /// Create a PipelineRun and return the name the server generated.
    pub async fn submit_pipeline_run(&self, request: &ExecutionRequest) -> Result<String> {
        let url = self.tekton_url(&request.namespace, "pipelineruns");
        let manifest = request.to_pipeline_run();
        let created: NamedObject = self
            .send("create pipelinerun", self.http.post(url).json(&manifest))
            .await?;
        created.metadata.name.ok_or_else(|| ClusterError::Decode {
            operation: "create pipelinerun".to_string(),
            message: "response has no metadata.name".to_string(),
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        debug!(operation = %operation, "Calling cluster API");
        let response = request.send().await.map_err(|e| ClusterError::Transport {
            operation: operation.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(ClusterError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(|e| ClusterError::Decode {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl PipelineStore for ClusterClient {
    async fn get_pipeline(&self, namespace: &str, name: &str) -> CollabResult<PipelineDefinition> {
        Ok(self.fetch_pipeline(namespace, name).await?)
    }
}

#[async_trait]
impl IdentityStore for ClusterClient {
    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> CollabResult<ExecutionIdentity> {
        Ok(self.fetch_service_account(namespace, name).await?)
    }
}

#[async_trait]
impl RunSubmitter for ClusterClient {
    async fn create_run(&self, request: &ExecutionRequest) -> CollabResult<String> {
        Ok(self.submit_pipeline_run(request).await?)
    }
}
