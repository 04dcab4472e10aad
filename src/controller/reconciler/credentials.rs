//! # Credential Resolver
//!
//! Resolves the named Secrets referenced by a PostgresSync spec into typed
//! credential bundles, and resolves the database service reference into a
//! connection endpoint.
//!
//! Bundles are never persisted; they live only for the duration of one
//! reconciliation pass. Missing required keys are configuration errors,
//! reported with messages that distinguish them from execution failures.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::{Api, Client};
use std::collections::BTreeMap;

use crate::constants::DEFAULT_POSTGRES_PORT;
use crate::crd::DatabaseServiceRef;
use crate::executor::DatabaseEndpoint;
use crate::git::GitCredentials;

/// Resolves named credential references from the resource's namespace.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolve the git username/password bundle.
    async fn git_credentials(&self, namespace: &str, secret_name: &str) -> Result<GitCredentials>;

    /// Resolve the database credentials and combine them with the service
    /// reference into a connection endpoint.
    async fn database_endpoint(
        &self,
        namespace: &str,
        secret_name: &str,
        service: &DatabaseServiceRef,
    ) -> Result<DatabaseEndpoint>;
}

/// Resolver backed by Kubernetes Secrets.
#[derive(Clone)]
pub struct SecretCredentialResolver {
    client: Client,
}

impl std::fmt::Debug for SecretCredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCredentialResolver").finish_non_exhaustive()
    }
}

impl SecretCredentialResolver {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn secret_data(
        &self,
        namespace: &str,
        secret_name: &str,
    ) -> Result<BTreeMap<String, ByteString>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api
            .get(secret_name)
            .await
            .with_context(|| format!("failed to get credentials secret {namespace}/{secret_name}"))?;
        Ok(secret.data.unwrap_or_default())
    }
}

#[async_trait]
impl CredentialResolver for SecretCredentialResolver {
    async fn git_credentials(&self, namespace: &str, secret_name: &str) -> Result<GitCredentials> {
        let data = self.secret_data(namespace, secret_name).await?;
        git_credentials_from_data(&data, secret_name)
    }

    async fn database_endpoint(
        &self,
        namespace: &str,
        secret_name: &str,
        service: &DatabaseServiceRef,
    ) -> Result<DatabaseEndpoint> {
        let data = self.secret_data(namespace, secret_name).await?;
        database_endpoint_from_data(&data, secret_name, service)
    }
}

/// Extract the git username/password pair from secret data.
pub fn git_credentials_from_data(
    data: &BTreeMap<String, ByteString>,
    secret_name: &str,
) -> Result<GitCredentials> {
    Ok(GitCredentials {
        username: required_key(data, "username", secret_name)?,
        password: required_key(data, "password", secret_name)?,
    })
}

/// Build the database endpoint from secret data and the service reference.
///
/// `database`, `username` and `password` are required; `port` defaults to
/// 5432 when absent.
pub fn database_endpoint_from_data(
    data: &BTreeMap<String, ByteString>,
    secret_name: &str,
    service: &DatabaseServiceRef,
) -> Result<DatabaseEndpoint> {
    let host = resolve_service_host(service)?;

    let port = match optional_key(data, "port") {
        Some(raw) => raw
            .parse::<u16>()
            .with_context(|| format!("invalid port {raw:?} in secret {secret_name}"))?,
        None => DEFAULT_POSTGRES_PORT,
    };

    Ok(DatabaseEndpoint {
        host,
        port,
        database: required_key(data, "database", secret_name)?,
        username: required_key(data, "username", secret_name)?,
        password: required_key(data, "password", secret_name)?,
    })
}

/// Resolve the service reference to a host name.
///
/// A bare service name resolves within the resource's own namespace; when a
/// namespace is given the host becomes the cluster-local fully-qualified
/// form `name.namespace.svc.cluster.local`.
pub fn resolve_service_host(service: &DatabaseServiceRef) -> Result<String> {
    if service.name.is_empty() {
        bail!("database service name is required");
    }
    match service.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        Some(namespace) => Ok(format!("{}.{namespace}.svc.cluster.local", service.name)),
        None => Ok(service.name.clone()),
    }
}

fn required_key(
    data: &BTreeMap<String, ByteString>,
    key: &str,
    secret_name: &str,
) -> Result<String> {
    match optional_key(data, key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!("{key} is required in secret {secret_name}"),
    }
}

fn optional_key(data: &BTreeMap<String, ByteString>, key: &str) -> Option<String> {
    data.get(key)
        .map(|v| String::from_utf8_lossy(&v.0).into_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(entries: &[(&str, &str)]) -> BTreeMap<String, ByteString> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
            .collect()
    }

    fn service(name: &str, namespace: Option<&str>) -> DatabaseServiceRef {
        DatabaseServiceRef {
            name: name.to_string(),
            namespace: namespace.map(String::from),
        }
    }

    #[test]
    fn host_is_fully_qualified_when_namespace_given() {
        let host = resolve_service_host(&service("pg", Some("data"))).unwrap();
        assert_eq!(host, "pg.data.svc.cluster.local");
    }

    #[test]
    fn host_is_bare_service_name_without_namespace() {
        assert_eq!(resolve_service_host(&service("pg", None)).unwrap(), "pg");
    }

    #[test]
    fn empty_service_name_is_a_configuration_error() {
        let err = resolve_service_host(&service("", None)).unwrap_err();
        assert!(err.to_string().contains("service name is required"));
    }

    #[test]
    fn endpoint_defaults_port_to_5432() {
        let data = data(&[
            ("database", "orders"),
            ("username", "app"),
            ("password", "pw"),
        ]);
        let endpoint = database_endpoint_from_data(&data, "db-credentials", &service("pg", None))
            .unwrap();
        assert_eq!(endpoint.port, 5432);
        assert_eq!(endpoint.host, "pg");
        assert_eq!(endpoint.database, "orders");
    }

    #[test]
    fn endpoint_uses_port_from_secret() {
        let data = data(&[
            ("database", "orders"),
            ("username", "app"),
            ("password", "pw"),
            ("port", "5433"),
        ]);
        let endpoint = database_endpoint_from_data(&data, "db-credentials", &service("pg", None))
            .unwrap();
        assert_eq!(endpoint.port, 5433);
    }

    #[test]
    fn missing_database_name_is_reported() {
        let data = data(&[("username", "app"), ("password", "pw")]);
        let err = database_endpoint_from_data(&data, "db-credentials", &service("pg", None))
            .unwrap_err();
        assert!(err.to_string().contains("database is required"));
        assert!(err.to_string().contains("db-credentials"));
    }

    #[test]
    fn missing_password_is_reported() {
        let data = data(&[("database", "orders"), ("username", "app")]);
        let err = database_endpoint_from_data(&data, "db-credentials", &service("pg", None))
            .unwrap_err();
        assert!(err.to_string().contains("password is required"));
    }

    #[test]
    fn git_credentials_require_both_keys() {
        let data = data(&[("username", "bot")]);
        let err = git_credentials_from_data(&data, "git-credentials").unwrap_err();
        assert!(err.to_string().contains("password is required"));

        let ok = git_credentials_from_data(
            &super::tests::data(&[("username", "bot"), ("password", "pw")]),
            "git-credentials",
        )
        .unwrap();
        assert_eq!(ok.username, "bot");
    }
}
