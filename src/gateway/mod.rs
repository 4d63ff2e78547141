//! Remote data gateway: cache-first fetches of wallets and package definitions.
//!
//! Each fetch consults the [`RemoteCache`] first, otherwise issues exactly one
//! GET through the [`HttpTransport`] seam, normalises the envelope and writes
//! the result through to the cache. Failures come back as [`FetchError`];
//! nothing is retried and nothing panics across this boundary.

pub mod envelope;
pub mod subject;
pub mod transport;

pub use envelope::{PackagesPayload, WalletsPayload};
pub use subject::{SubjectResolver, SubjectSource};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

use crate::cache::{CacheStats, RemoteCache, DEFAULT_TTL};
use crate::model::{FetchError, TransportError};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use url::Url;

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;

/// Cache key of the wallets listing.
pub const WALLETS_KEY: &str = "wallets";
/// Cache key of the package definitions.
pub const PACKAGES_KEY: &str = "packages";

const WALLETS_PATH: &str = "/walletd-server/api/v1/subject/wallets";
const PACKAGES_PATH: &str = "/cpc-server/api/v1/packages";
const SUBJECT_HEADER: &str = "x-subject-id";

/// Default origin of both endpoints.
pub const DEFAULT_API_BASE_URL: &str = "https://cloud.siliconflow.cn";

/// Endpoint and request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Origin the endpoint paths are resolved against.
    pub api_base_url: String,
    /// Page size requested from the wallets endpoint; large enough to flatten
    /// pagination into one round trip.
    pub wallet_page_size: u32,
    /// `stage` filter of the wallets endpoint.
    pub wallet_stage: u32,
    /// Package ids requested from the packages endpoint.
    pub package_ids: Vec<i64>,
    /// Per-request bound.
    pub request_timeout: Duration,
    /// Lifetime of cached responses.
    pub cache_ttl: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            wallet_page_size: 10_000,
            wallet_stage: 3,
            package_ids: (0..=10).collect(),
            request_timeout: Duration::from_secs(10),
            cache_ttl: DEFAULT_TTL,
        }
    }
}

impl GatewaySettings {
    /// Full wallets URL.
    pub fn wallets_url(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.api_base_url)?.join(WALLETS_PATH)?;
        url.set_query(Some(&format!(
            "pageSize={}&stage={}",
            self.wallet_page_size, self.wallet_stage
        )));
        Ok(url)
    }

    /// Full packages URL; ids are sent as a bracketed list.
    pub fn packages_url(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.api_base_url)?.join(PACKAGES_PATH)?;
        let ids: Vec<String> = self.package_ids.iter().map(i64::to_string).collect();
        url.set_query(Some(&format!("ids=[{}]", ids.join(","))));
        Ok(url)
    }
}

/// Cached value: one variant per remote resource.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedResource {
    /// Normalised wallets response.
    Wallets(WalletsPayload),
    /// Normalised packages response.
    Packages(PackagesPayload),
}

/// Fetches and caches the two remote resources.
pub struct RemoteDataGateway {
    transport: Rc<dyn HttpTransport>,
    subject: SubjectResolver,
    settings: GatewaySettings,
    cache: RefCell<RemoteCache<CachedResource>>,
}

impl std::fmt::Debug for RemoteDataGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDataGateway")
            .field("settings", &self.settings)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl RemoteDataGateway {
    /// Gateway over `transport`, attaching subject ids from `subject`.
    pub fn new(
        transport: Rc<dyn HttpTransport>,
        subject: SubjectResolver,
        settings: GatewaySettings,
    ) -> Self {
        let cache = RemoteCache::new(settings.cache_ttl);
        Self {
            transport,
            subject,
            settings,
            cache: RefCell::new(cache),
        }
    }

    /// Endpoint settings.
    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Balance listing, from cache when `use_cache` and a live entry exists.
    pub async fn fetch_wallets(&self, use_cache: bool) -> Result<WalletsPayload, FetchError> {
        if use_cache {
            let cached = self.cache.borrow_mut().get(WALLETS_KEY);
            if let Some(CachedResource::Wallets(payload)) = cached {
                tracing::debug!(count = payload.wallets.len(), "Wallets served from cache");
                return Ok(payload);
            }
        }

        let generation = self.cache.borrow().generation();
        let url = self.settings.wallets_url().map_err(invalid_url)?;
        let body = self.get_json(url).await?;
        let payload = envelope::parse_wallets(&body);
        tracing::info!(
            count = payload.wallets.len(),
            total = payload.total,
            "Fetched wallets"
        );

        self.write_through(
            WALLETS_KEY,
            CachedResource::Wallets(payload.clone()),
            generation,
        );
        Ok(payload)
    }

    /// Package definitions, from cache when `use_cache` and a live entry exists.
    pub async fn fetch_packages(&self, use_cache: bool) -> Result<PackagesPayload, FetchError> {
        if use_cache {
            let cached = self.cache.borrow_mut().get(PACKAGES_KEY);
            if let Some(CachedResource::Packages(payload)) = cached {
                tracing::debug!(count = payload.packages.len(), "Packages served from cache");
                return Ok(payload);
            }
        }

        let generation = self.cache.borrow().generation();
        let url = self.settings.packages_url().map_err(invalid_url)?;
        let body = self.get_json(url).await?;
        let payload = envelope::parse_packages(&body);
        tracing::info!(count = payload.packages.len(), "Fetched packages");

        self.write_through(
            PACKAGES_KEY,
            CachedResource::Packages(payload.clone()),
            generation,
        );
        Ok(payload)
    }

    /// Drop every cached response. In-flight fetches will not repopulate it.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Cache diagnostics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.borrow().stats()
    }

    fn write_through(&self, key: &str, value: CachedResource, generation: u64) {
        let stored = self
            .cache
            .borrow_mut()
            .set_if_current(key, value, generation);
        if !stored {
            tracing::warn!(key, "Cache cleared during fetch, result not cached");
        }
    }

    fn build_request(&self, url: &Url) -> HttpRequest {
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "*/*".to_string()),
        ];
        if let Some(subject) = self.subject.resolve() {
            headers.push((SUBJECT_HEADER.to_string(), subject));
        }
        HttpRequest {
            url: url.to_string(),
            headers,
            timeout: self.settings.request_timeout,
        }
    }

    async fn get_json(&self, url: Url) -> Result<Value, FetchError> {
        let request = self.build_request(&url);
        let response = self
            .transport
            .get(&request)
            .await
            .map_err(|error| match error {
                TransportError::Timeout => FetchError::Timeout {
                    url: request.url.clone(),
                },
                TransportError::Connect { message } => FetchError::Network { message },
            })
            .inspect_err(|e| tracing::error!(url = %request.url, error = %e, "Request failed"))?;

        if !response.is_success() {
            tracing::error!(url = %request.url, status = response.status, "Unexpected HTTP status");
            return Err(FetchError::Http {
                status: response.status,
            });
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            tracing::error!(url = %request.url, error = %e, "Response is not valid JSON");
            FetchError::Parse {
                message: e.to_string(),
            }
        })
    }
}

fn invalid_url(error: url::ParseError) -> FetchError {
    FetchError::Network {
        message: format!("invalid endpoint url: {error}"),
    }
}
