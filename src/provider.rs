//! The OpenCTI provider
//!
//! Holds nothing but metadata until Configure succeeds. After that it owns the
//! resource registry, built over one API client shared by every resource.

use crate::config::{ProviderConfig, ResolvedConfig, process_env};
use crate::resource::{self, PROVIDER_TYPE_NAME};
use declarative::{
    ApplyContext, Diagnostic, Diagnostics, Error, LifecycleRequest, LifecycleResponse,
    ResourceRegistry, Schema, execute,
};
use opencti::{Api, GraphqlClient};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub type_name: String,
    pub version: String,
    pub resources: Vec<String>,
}

/// Schemas of the provider block and of every resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSchema {
    pub provider: Schema,
    pub resources: BTreeMap<String, Schema>,
}

struct Configured {
    registry: ResourceRegistry,
    endpoint: String,
    platform_version: String,
}

pub struct Provider {
    version: String,
    configured: Option<Configured>,
}

impl Provider {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            configured: None,
        }
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            type_name: PROVIDER_TYPE_NAME.to_string(),
            version: self.version.clone(),
            resources: resource::schemas().into_keys().collect(),
        }
    }

    pub fn schema(&self) -> ProviderSchema {
        ProviderSchema {
            provider: ProviderConfig::schema(),
            resources: resource::schemas(),
        }
    }

    /// Version reported by the platform health check
    pub fn platform_version(&self) -> Option<&str> {
        self.configured.as_ref().map(|c| c.platform_version.as_str())
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.configured.as_ref().map(|c| c.endpoint.as_str())
    }

    /// Configure against the live platform
    pub fn configure(&mut self, ctx: &ApplyContext, config: ProviderConfig) -> Diagnostics {
        self.configure_with(ctx, config, process_env, |resolved| {
            let client: Arc<dyn Api> = Arc::new(
                GraphqlClient::new(&resolved.url, resolved.token.expose())
                    .with_timeout(resolved.timeout),
            );
            client
        })
    }

    /// Configure with an injected environment and client factory
    ///
    /// Nothing is connected unless every setting resolves. The client is only
    /// published once its health check passes.
    pub fn configure_with<E, C>(
        &mut self,
        ctx: &ApplyContext,
        config: ProviderConfig,
        env: E,
        connect: C,
    ) -> Diagnostics
    where
        E: Fn(&str) -> Option<String>,
        C: FnOnce(&ResolvedConfig) -> Arc<dyn Api>,
    {
        let resolved = match config.resolve(env) {
            Ok(resolved) => resolved,
            Err(diagnostics) => return diagnostics,
        };
        log::debug!("Resolved provider configuration: {resolved:?}");

        let api = connect(&resolved);
        let platform_version = match api.health_check(ctx) {
            Ok(version) => version,
            Err(err) => {
                log::error!("Health check against {} failed: {err}", resolved.url);
                return Diagnostic::error(
                    "Unable to Create OpenCTI API Client",
                    format!(
                        "An unexpected error occurred when creating the OpenCTI API client. {}\n\n\
                         OpenCTI Client Error: {err}",
                        err.category().advice()
                    ),
                )
                .into();
            }
        };
        log::info!("Connected to OpenCTI {platform_version} at {}", resolved.url);

        self.configured = Some(Configured {
            registry: resource::registry(&api, resolved.policy),
            endpoint: resolved.url,
            platform_version,
        });
        Diagnostics::new()
    }

    /// Run one resource lifecycle request
    pub fn execute(&self, ctx: &ApplyContext, request: LifecycleRequest) -> LifecycleResponse {
        match &self.configured {
            Some(configured) => execute(&configured.registry, ctx, request),
            None => LifecycleResponse::failed(
                tracked_state(&request),
                &Error::internal(
                    "Unconfigured provider",
                    format!(
                        "Expected a configured OpenCTI client before {} of {}",
                        request.op(),
                        request.type_name()
                    ),
                ),
            ),
        }
    }
}

/// State the orchestrator keeps when a request fails before running
fn tracked_state(request: &LifecycleRequest) -> Option<Value> {
    match request {
        LifecycleRequest::Read { state, .. } | LifecycleRequest::Delete { state, .. } => {
            Some(state.clone())
        }
        LifecycleRequest::Update { prior, .. } => Some(prior.clone()),
        LifecycleRequest::Create { .. } | LifecycleRequest::ImportState { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Setting, TOKEN_ENV, URL_ENV};
    use opencti::MockApi;
    use serde_json::json;

    fn config() -> ProviderConfig {
        ProviderConfig {
            url: Setting::Known("https://cti.example.com".to_string()),
            token: Setting::Known("secret".to_string()),
            ..ProviderConfig::default()
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn configured(mock: &MockApi) -> Provider {
        let mut provider = Provider::new("1.2.3");
        let api: Arc<dyn Api> = Arc::new(mock.clone());
        let diagnostics = provider.configure_with(&ApplyContext::new(), config(), no_env, |_| api);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        provider
    }

    #[test]
    fn test_metadata() {
        let metadata = Provider::new("1.2.3").metadata();
        assert_eq!(metadata.type_name, "opencti");
        assert_eq!(metadata.version, "1.2.3");
        assert_eq!(metadata.resources.len(), 8);
    }

    #[test]
    fn test_schema_available_before_configure() {
        let schema = Provider::new("1.2.3").schema();
        assert!(schema.provider.attributes.contains_key("url"));
        assert!(schema.resources.contains_key("opencti_user"));
    }

    #[test]
    fn test_configure_publishes_client() {
        let mock = MockApi::new();
        let provider = configured(&mock);

        assert_eq!(provider.platform_version(), Some("6.0.0-mock"));
        assert_eq!(provider.endpoint(), Some("https://cti.example.com"));
        assert_eq!(mock.count("health_check"), 1);
    }

    #[test]
    fn test_configure_from_env() {
        let mock = MockApi::new();
        let mut provider = Provider::new("1.2.3");
        let env = |name: &str| match name {
            URL_ENV => Some("https://env.example.com".to_string()),
            TOKEN_ENV => Some("env-token".to_string()),
            _ => None,
        };

        let api: Arc<dyn Api> = Arc::new(mock);
        let diagnostics = provider.configure_with(
            &ApplyContext::new(),
            ProviderConfig::default(),
            env,
            |resolved| {
                assert_eq!(resolved.token.expose(), "env-token");
                api
            },
        );
        assert!(diagnostics.is_empty());
        assert_eq!(provider.endpoint(), Some("https://env.example.com"));
    }

    #[test]
    fn test_missing_settings_never_connect() {
        let mut provider = Provider::new("1.2.3");
        let diagnostics = provider.configure_with(
            &ApplyContext::new(),
            ProviderConfig::default(),
            no_env,
            |_| panic!("connected without settings"),
        );

        assert_eq!(diagnostics.len(), 2);
        assert!(provider.platform_version().is_none());
    }

    #[test]
    fn test_failed_health_check() {
        let mock = MockApi::new();
        mock.fail_on("health_check");
        let mut provider = Provider::new("1.2.3");
        let api: Arc<dyn Api> = Arc::new(mock);

        let diagnostics = provider.configure_with(&ApplyContext::new(), config(), no_env, |_| api);
        let diagnostic = diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.summary, "Unable to Create OpenCTI API Client");
        assert!(diagnostic.detail.contains("injected failure"));
        assert!(provider.platform_version().is_none());
    }

    #[test]
    fn test_unconfigured_provider_is_internal_error() {
        let provider = Provider::new("1.2.3");
        let state = json!({"id": "role--1", "name": "Analyst"});

        let response = provider.execute(
            &ApplyContext::new(),
            LifecycleRequest::Read {
                type_name: "opencti_role".to_string(),
                state: state.clone(),
            },
        );
        assert!(response.has_error());
        assert_eq!(response.state, Some(state));
        let diagnostic = response.diagnostics.iter().next().unwrap();
        assert_eq!(diagnostic.summary, "Unconfigured provider");
        assert!(diagnostic.detail.contains("report this issue"));
    }

    #[test]
    fn test_execute_after_configure() {
        let mock = MockApi::new();
        let provider = configured(&mock);

        let response = provider.execute(
            &ApplyContext::new(),
            LifecycleRequest::Create {
                type_name: "opencti_task_template".to_string(),
                planned: json!({"name": "Triage"}),
            },
        );
        assert!(!response.has_error(), "{:?}", response.diagnostics);
        assert_eq!(mock.count("create_task_template"), 1);
    }
}
