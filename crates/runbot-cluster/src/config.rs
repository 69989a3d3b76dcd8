//! API server connection settings.
//!
//! Loaded from a kubeconfig file when one is given, otherwise from the
//! service-account mount every pod receives.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use tracing::{debug, info};

use crate::error::{ClusterError, Result};
use crate::kubeconfig::Kubeconfig;

pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How requests authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum ClusterAuth {
    Anonymous,
    BearerToken(String),
    /// PEM-encoded certificate chain and private key.
    ClientCertificate { cert_pem: Vec<u8>, key_pem: Vec<u8> },
}

impl std::fmt::Debug for ClusterAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterAuth::Anonymous => write!(f, "Anonymous"),
            ClusterAuth::BearerToken(_) => write!(f, "BearerToken(<redacted>)"),
            ClusterAuth::ClientCertificate { .. } => write!(f, "ClientCertificate(<redacted>)"),
        }
    }
}

/// Everything needed to reach one API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Base URL, e.g. `https://10.0.0.1:6443`
    pub server: String,
    /// PEM bundle trusted in addition to the built-in roots
    pub ca_pem: Option<Vec<u8>>,
    pub auth: ClusterAuth,
    pub insecure_skip_tls_verify: bool,
    pub timeout: Duration,
}

impl ClusterConfig {
    /// Kubeconfig at `kubeconfig` when given, in-cluster settings otherwise.
    pub fn load(kubeconfig: Option<&Path>) -> Result<Self> {
        match kubeconfig {
            Some(path) => {
                info!(path = %path.display(), "Using kubeconfig");
                Self::from_kubeconfig_file(path)
            }
            None => {
                info!("Using in-cluster configuration");
                Self::in_cluster()
            }
        }
    }

    /// Read the current context of a kubeconfig file.
    ///
    /// Relative certificate and token paths are resolved against the file's
    /// directory.
    pub fn from_kubeconfig_file(path: &Path) -> Result<Self> {
        let text = read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_kubeconfig(&Kubeconfig::from_yaml(&text)?, base_dir)
    }

    pub fn from_kubeconfig(kubeconfig: &Kubeconfig, base_dir: &Path) -> Result<Self> {
        let (cluster, user) = kubeconfig.current()?;
        if cluster.server.is_empty() {
            return Err(ClusterError::Kubeconfig("cluster server is empty".to_string()));
        }

        let ca_pem = inline_or_file(
            cluster.certificate_authority_data.as_deref(),
            "certificate-authority-data",
            cluster.certificate_authority.as_deref(),
            base_dir,
        )?;

        let cert_pem = inline_or_file(
            user.client_certificate_data.as_deref(),
            "client-certificate-data",
            user.client_certificate.as_deref(),
            base_dir,
        )?;
        let key_pem = inline_or_file(
            user.client_key_data.as_deref(),
            "client-key-data",
            user.client_key.as_deref(),
            base_dir,
        )?;

        let auth = match (user.token, user.token_file, cert_pem, key_pem) {
            (Some(token), _, _, _) if !token.is_empty() => ClusterAuth::BearerToken(token),
            (_, Some(file), _, _) => {
                let token = read_to_string(&resolve(base_dir, &file))?;
                ClusterAuth::BearerToken(token.trim().to_string())
            }
            (_, _, Some(cert_pem), Some(key_pem)) => {
                ClusterAuth::ClientCertificate { cert_pem, key_pem }
            }
            (_, _, Some(_), None) | (_, _, None, Some(_)) => {
                return Err(ClusterError::Kubeconfig(
                    "client certificate and key must be given together".to_string(),
                ));
            }
            _ => ClusterAuth::Anonymous,
        };
        debug!(server = %cluster.server, auth = ?auth, "Resolved kubeconfig");

        Ok(ClusterConfig {
            server: cluster.server.trim_end_matches('/').to_string(),
            ca_pem,
            auth,
            insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Settings from `KUBERNETES_SERVICE_HOST`/`_PORT` and the service-account mount.
    pub fn in_cluster() -> Result<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST").unwrap_or_default();
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_default();
        Self::in_cluster_from(&host, &port, Path::new(SERVICE_ACCOUNT_DIR))
    }

    pub fn in_cluster_from(host: &str, port: &str, service_account_dir: &Path) -> Result<Self> {
        if host.is_empty() || port.is_empty() {
            return Err(ClusterError::NotInCluster(
                "KUBERNETES_SERVICE_HOST and KUBERNETES_SERVICE_PORT must be defined".to_string(),
            ));
        }

        let token = read_to_string(&service_account_dir.join("token"))?;
        let ca_path = service_account_dir.join("ca.crt");
        let ca_pem = std::fs::read(&ca_path).map_err(|source| ClusterError::Io {
            path: ca_path,
            source,
        })?;

        // IPv6 service hosts need brackets in a URL.
        let server = if host.contains(':') {
            format!("https://[{host}]:{port}")
        } else {
            format!("https://{host}:{port}")
        };

        Ok(ClusterConfig {
            server,
            ca_pem: Some(ca_pem),
            auth: ClusterAuth::BearerToken(token.trim().to_string()),
            insecure_skip_tls_verify: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Config for a plain-HTTP endpoint with no credentials.
    pub fn insecure(server: &str) -> Self {
        ClusterConfig {
            server: server.trim_end_matches('/').to_string(),
            ca_pem: None,
            auth: ClusterAuth::Anonymous,
            insecure_skip_tls_verify: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_auth(mut self, auth: ClusterAuth) -> Self {
        self.auth = auth;
        self
    }
}

fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| ClusterError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve(base_dir: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Inline base64 data wins over a file reference.
fn inline_or_file(
    data: Option<&str>,
    field: &'static str,
    file: Option<&str>,
    base_dir: &Path,
) -> Result<Option<Vec<u8>>> {
    if let Some(data) = data.filter(|d| !d.is_empty()) {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|source| ClusterError::Base64 { field, source })?;
        return Ok(Some(bytes));
    }
    match file.filter(|f| !f.is_empty()) {
        Some(file) => {
            let path = resolve(base_dir, file);
            std::fs::read(&path)
                .map(Some)
                .map_err(|source| ClusterError::Io { path, source })
        }
        None => Ok(None),
    }
}
