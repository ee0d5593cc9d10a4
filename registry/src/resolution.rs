use crate::catalog::{self, Catalog, SelectionMode};
use crate::client::RegistryClient;
use crate::config::RegistryConfig;
use crate::instance::ServiceInstance;
use crate::metrics_defs::{QUERY_FAILURE, RESOLVE_FOUND, RESOLVE_NOT_FOUND, RESOLVE_UNAVAILABLE};
use shared::counter;

/// Sentinel service id that is never resolvable; short-circuits without
/// touching the registry.
const UNKNOWN_SERVICE_ID: &str = "unknown";

const DELTA_SUFFIX: &str = "delta";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ResolveError {
    /// Every configured endpoint failed outright, across all attempts.
    /// Distinct from a confirmed-absent service: the caller cannot
    /// currently determine an instance at all.
    #[error("no configured registry endpoint answered")]
    RegistryUnavailable,
}

/// Outcome of one ordered walk over the endpoint list.
struct Attempt {
    /// First instance matching the selection mode, when the answering
    /// endpoint had one.
    instance: Option<ServiceInstance>,
    /// Whether any endpoint produced a body, regardless of its content.
    responded: bool,
}

/// Resolves service ids to live instances by querying the configured
/// registry endpoints in order.
///
/// Endpoints are always consulted sequentially: the first one to answer
/// wins and later endpoints are not queried, so failover order stays
/// observable. Do not parallelize the walk.
pub struct Resolver {
    client: RegistryClient,
    config: RegistryConfig,
}

impl Resolver {
    pub fn new(config: RegistryConfig) -> Self {
        Resolver {
            client: RegistryClient::new(),
            config,
        }
    }

    /// Find a live instance for `service_id`.
    ///
    /// The id is first looked up directly, selecting its primary
    /// registration. On a miss the id is treated as a tenant alias: the
    /// well-known gateway service is queried and an additional registration
    /// advertising that tenant is selected. `Ok(None)` means some endpoint
    /// answered and the service is confirmed absent; `Err` means no
    /// endpoint answered at all.
    pub async fn resolve(
        &self,
        service_id: &str,
    ) -> Result<Option<ServiceInstance>, ResolveError> {
        if service_id.eq_ignore_ascii_case(UNKNOWN_SERVICE_ID) {
            return Ok(None);
        }

        let direct = self.attempt(service_id, SelectionMode::Primary).await;
        if direct.instance.is_some() {
            counter!(RESOLVE_FOUND).increment(1);
            return Ok(direct.instance);
        }

        let alias = self
            .attempt(
                &self.config.gateway_service_id,
                SelectionMode::AdditionalForTenant(service_id),
            )
            .await;
        if alias.instance.is_some() {
            counter!(RESOLVE_FOUND).increment(1);
            return Ok(alias.instance);
        }

        if direct.responded || alias.responded {
            counter!(RESOLVE_NOT_FOUND).increment(1);
            Ok(None)
        } else {
            counter!(RESOLVE_UNAVAILABLE).increment(1);
            Err(ResolveError::RegistryUnavailable)
        }
    }

    /// Fetch the full catalog, or only recently changed entries when
    /// `delta` is set, from the first endpoint that answers.
    pub async fn resolve_catalog(&self, delta: bool) -> Result<Catalog, ResolveError> {
        let suffix = if delta { DELTA_SUFFIX } else { "" };
        for endpoint in &self.config.endpoints {
            match self.client.query(endpoint, suffix).await {
                // An answering endpoint is final even when its body does not
                // decode; that counts as an empty catalog, not a failure.
                Ok(body) => return Ok(catalog::parse_catalog(&body).unwrap_or_default()),
                Err(err) => {
                    counter!(QUERY_FAILURE).increment(1);
                    tracing::debug!(endpoint = %endpoint.url, error = %err, "registry endpoint query failed");
                }
            }
        }
        counter!(RESOLVE_UNAVAILABLE).increment(1);
        Err(ResolveError::RegistryUnavailable)
    }

    /// Walk the endpoint list once for `service_id`, selecting from the
    /// first body produced.
    async fn attempt(&self, service_id: &str, mode: SelectionMode<'_>) -> Attempt {
        let suffix = service_id.to_lowercase();
        for endpoint in &self.config.endpoints {
            match self.client.query(endpoint, &suffix).await {
                Ok(body) => {
                    // First endpoint to answer wins; its body is final even
                    // when empty or undecodable.
                    let instance = catalog::parse_application(&body)
                        .and_then(|application| application.select(mode).cloned());
                    return Attempt {
                        instance,
                        responded: true,
                    };
                }
                Err(err) => {
                    counter!(QUERY_FAILURE).increment(1);
                    tracing::debug!(endpoint = %endpoint.url, error = %err, "registry endpoint query failed");
                }
            }
        }
        Attempt {
            instance: None,
            responded: false,
        }
    }
}
