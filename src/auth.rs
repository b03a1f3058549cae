//! Credential sections of the generated HTTP client configs.
//!
//! Any failure here is fatal for the endpoint being compiled. Emitting a
//! partial credential would make the scrape engine silently fall back to
//! unauthenticated requests.

use crate::config::{AuthorizationArguments, BasicAuthArguments, TlsArguments};
use crate::error::{Error, Result};
use crate::monitor::{self, PodMetricsEndpoint, SafeAuthorization, SafeTlsConfig};
use crate::secrets::{SecretAccessor, SecretRef, SecretResolver, SourceKind};
use prom_config::{Authorization, BasicAuth, HttpClientConfig, OAuth2, Secret, TlsConfig};
use url::Url;

const DEFAULT_AUTHORIZATION_TYPE: &str = "Bearer";

/// The authorization type to emit, `Bearer` unless something else is given.
pub fn authorization_type(kind: Option<&str>) -> String {
    match kind.map(str::trim) {
        Some(kind) if !kind.is_empty() => kind.to_string(),
        _ => DEFAULT_AUTHORIZATION_TYPE.to_string(),
    }
}

/// Builds credentials for the endpoints of monitors in one namespace.
pub struct AuthBuilder<'a> {
    namespace: &'a str,
    secrets: SecretResolver<'a>,
}

impl<'a> AuthBuilder<'a> {
    pub fn new(namespace: &'a str, accessor: &'a dyn SecretAccessor) -> Self {
        Self {
            namespace,
            secrets: SecretResolver::new(accessor),
        }
    }

    /// Fill the TLS and authentication sections of `http` from `endpoint`.
    pub fn apply(&self, endpoint: &PodMetricsEndpoint, http: &mut HttpClientConfig) -> Result<()> {
        let schemes = [
            endpoint.basic_auth.is_some(),
            endpoint.authorization.is_some(),
            endpoint.oauth2.is_some(),
        ];
        if schemes.iter().filter(|set| **set).count() > 1 {
            return Err(Error::validation(
                "authentication",
                "at most one of basicAuth, authorization and oauth2 can be set",
            ));
        }

        if let Some(tls) = &endpoint.tls_config {
            http.tls_config = self.tls_config(tls)?;
        }
        if let Some(basic_auth) = &endpoint.basic_auth {
            http.basic_auth = Some(self.basic_auth(basic_auth)?);
        }
        if let Some(authorization) = &endpoint.authorization {
            http.authorization = Some(self.authorization(authorization)?);
        }
        if let Some(oauth2) = &endpoint.oauth2 {
            http.oauth2 = Some(self.oauth2(oauth2)?);
        }

        Ok(())
    }

    pub fn tls_config(&self, tls: &SafeTlsConfig) -> Result<TlsConfig> {
        let ca = tls.ca.source(self.namespace, "tlsConfig.ca")?;
        let cert = tls.cert.source(self.namespace, "tlsConfig.cert")?;
        let key = tls
            .key_secret
            .as_ref()
            .map(|selector| SecretRef::new(self.namespace, SourceKind::Secret, selector));

        if cert.is_some() != key.is_some() {
            return Err(Error::validation(
                "tlsConfig",
                "cert and keySecret must be set together",
            ));
        }

        Ok(TlsConfig {
            ca_file: ca
                .map(|reference| self.secrets.resolve_as_file(&reference, "tlsConfig.ca"))
                .transpose()?,
            cert_file: cert
                .map(|reference| self.secrets.resolve_as_file(&reference, "tlsConfig.cert"))
                .transpose()?,
            key_file: key
                .map(|reference| self.secrets.resolve_as_file(&reference, "tlsConfig.keySecret"))
                .transpose()?,
            server_name: tls.server_name.clone().filter(|name| !name.is_empty()),
            insecure_skip_verify: tls.insecure_skip_verify,
        })
    }

    /// The client id has no file based form, so it is the one credential
    /// that gets read while compiling.
    pub fn oauth2(&self, oauth2: &monitor::OAuth2) -> Result<OAuth2> {
        let client_id = oauth2
            .client_id
            .source(self.namespace, "oauth2.clientId")?
            .ok_or_else(|| {
                Error::validation("oauth2.clientId", "either secret or configMap must be set")
            })?;
        let client_id = self.secrets.resolve_as_value(&client_id, "oauth2.clientId")?;

        let client_secret = SecretRef::new(
            self.namespace,
            SourceKind::Secret,
            &oauth2.client_secret,
        );
        let token_url = Url::parse(&oauth2.token_url)
            .map_err(|err| Error::validation("oauth2.tokenUrl", err))?;

        Ok(OAuth2 {
            client_id,
            client_secret_file: self
                .secrets
                .resolve_as_file(&client_secret, "oauth2.clientSecret")?,
            scopes: oauth2.scopes.clone(),
            token_url,
            endpoint_params: oauth2.endpoint_params.clone(),
        })
    }

    pub fn authorization(&self, authorization: &SafeAuthorization) -> Result<Authorization> {
        let kind = authorization_type(authorization.kind.as_deref());
        if kind.eq_ignore_ascii_case("basic") {
            return Err(Error::validation(
                "authorization.type",
                "Basic is not allowed, use basicAuth instead",
            ));
        }

        let credentials_file = authorization
            .credentials
            .as_ref()
            .map(|selector| {
                let reference = SecretRef::new(self.namespace, SourceKind::Secret, selector);
                self.secrets
                    .resolve_as_file(&reference, "authorization.credentials")
            })
            .transpose()?;

        Ok(Authorization {
            kind,
            credentials: None,
            credentials_file,
        })
    }

    pub fn basic_auth(&self, basic_auth: &monitor::BasicAuth) -> Result<BasicAuth> {
        let username = basic_auth
            .username
            .as_ref()
            .ok_or_else(|| Error::validation("basicAuth.username", "must be set"))?;
        let username = SecretRef::new(self.namespace, SourceKind::Secret, username);
        let username = self
            .secrets
            .resolve_as_value(&username, "basicAuth.username")?;

        let password_file = basic_auth
            .password
            .as_ref()
            .map(|selector| {
                let reference = SecretRef::new(self.namespace, SourceKind::Secret, selector);
                self.secrets.resolve_as_file(&reference, "basicAuth.password")
            })
            .transpose()?;

        Ok(BasicAuth {
            username,
            password: None,
            password_file,
        })
    }
}

pub(crate) fn client_tls_config(tls: &TlsArguments) -> TlsConfig {
    TlsConfig {
        ca_file: tls.ca_file.clone(),
        cert_file: tls.cert_file.clone(),
        key_file: tls.key_file.clone(),
        server_name: tls.server_name.clone(),
        insecure_skip_verify: tls.insecure_skip_verify.unwrap_or(false),
    }
}

pub(crate) fn client_basic_auth(basic_auth: &BasicAuthArguments) -> BasicAuth {
    BasicAuth {
        username: basic_auth.username.clone(),
        password: basic_auth.password.clone().map(Secret::new),
        password_file: basic_auth.password_file.clone(),
    }
}

pub(crate) fn client_authorization(authorization: &AuthorizationArguments) -> Authorization {
    Authorization {
        kind: authorization_type(authorization.kind.as_deref()),
        credentials: authorization.credentials.clone().map(Secret::new),
        credentials_file: authorization.credentials_file.clone(),
    }
}
