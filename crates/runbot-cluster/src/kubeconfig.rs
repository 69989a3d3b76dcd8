//! Minimal kubeconfig model.
//!
//! Only what is needed to reach one API server: the current context, its
//! cluster (server, CA, TLS verification) and its user (token or client
//! certificate). Exec and auth-provider plugins are not supported.

use serde::Deserialize;

use crate::error::{ClusterError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    #[serde(default)]
    pub current_context: Option<String>,
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(default)]
    pub users: Vec<NamedUser>,
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: ClusterEntry,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterEntry {
    pub server: String,
    #[serde(default)]
    pub certificate_authority: Option<String>,
    #[serde(default)]
    pub certificate_authority_data: Option<String>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedUser {
    pub name: String,
    #[serde(default)]
    pub user: UserEntry,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserEntry {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "tokenFile")]
    pub token_file: Option<String>,
    #[serde(default)]
    pub client_certificate: Option<String>,
    #[serde(default)]
    pub client_certificate_data: Option<String>,
    #[serde(default)]
    pub client_key: Option<String>,
    #[serde(default)]
    pub client_key_data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextEntry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextEntry {
    pub cluster: String,
    #[serde(default)]
    pub user: Option<String>,
}

impl Kubeconfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| ClusterError::Kubeconfig(e.to_string()))
    }

    /// Cluster and user entries selected by `current-context`.
    ///
    /// A context without a user yields an empty [`UserEntry`].
    pub fn current(&self) -> Result<(&ClusterEntry, UserEntry)> {
        let context_name = self
            .current_context
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ClusterError::Kubeconfig("current-context is not set".to_string()))?;

        let context = self
            .contexts
            .iter()
            .find(|c| c.name == context_name)
            .map(|c| &c.context)
            .ok_or_else(|| {
                ClusterError::Kubeconfig(format!("context '{context_name}' not found"))
            })?;

        let cluster = self
            .clusters
            .iter()
            .find(|c| c.name == context.cluster)
            .map(|c| &c.cluster)
            .ok_or_else(|| {
                ClusterError::Kubeconfig(format!("cluster '{}' not found", context.cluster))
            })?;

        let user = match &context.user {
            Some(user_name) => self
                .users
                .iter()
                .find(|u| &u.name == user_name)
                .map(|u| u.user.clone())
                .ok_or_else(|| ClusterError::Kubeconfig(format!("user '{user_name}' not found")))?,
            None => UserEntry::default(),
        };

        Ok((cluster, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: ci
clusters:
- name: ci-cluster
  cluster:
    server: https://10.0.0.1:6443
    certificate-authority-data: Zm9v
- name: other
  cluster:
    server: https://other:6443
    insecure-skip-tls-verify: true
contexts:
- name: ci
  context:
    cluster: ci-cluster
    user: runbot
- name: anon
  context:
    cluster: other
users:
- name: runbot
  user:
    token: s3cr3t
"#;

    #[test]
    fn test_current_context_selected() {
        let config = Kubeconfig::from_yaml(KUBECONFIG).unwrap();
        let (cluster, user) = config.current().unwrap();
        assert_eq!(cluster.server, "https://10.0.0.1:6443");
        assert_eq!(cluster.certificate_authority_data.as_deref(), Some("Zm9v"));
        assert!(!cluster.insecure_skip_tls_verify);
        assert_eq!(user.token.as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn test_context_without_user() {
        let mut config = Kubeconfig::from_yaml(KUBECONFIG).unwrap();
        config.current_context = Some("anon".to_string());
        let (cluster, user) = config.current().unwrap();
        assert!(cluster.insecure_skip_tls_verify);
        assert!(user.token.is_none());
    }

    #[test]
    fn test_missing_current_context() {
        let mut config = Kubeconfig::from_yaml(KUBECONFIG).unwrap();
        config.current_context = None;
        assert!(matches!(config.current(), Err(ClusterError::Kubeconfig(_))));

        config.current_context = Some("nope".to_string());
        let err = config.current().unwrap_err();
        assert_eq!(err.to_string(), "invalid kubeconfig: context 'nope' not found");
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            Kubeconfig::from_yaml("clusters: [not: {valid"),
            Err(ClusterError::Kubeconfig(_))
        ));
    }
}
