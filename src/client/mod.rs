//! HTTP client registry — lazily built, memoized clients per proxy identity.
//!
//! Clients are cached process-wide, keyed by (proxy URL, insecure flag), so a
//! proxy configured for TLS-verified traffic never hands out its insecure
//! twin. Cloning a `reqwest::Client` shares the underlying connection pool,
//! so every caller of [`get_client`] with the same key reuses the same
//! transport for the life of the process. Entries are insert-only; there is
//! no eviction.
//!
//! Two default clients (secure, insecure) exist outside the keyed cache and
//! serve callers that pass an empty proxy string. They are built on first
//! use from the shared configuration, so a failing build surfaces as a
//! [`ClientError::Build`] instead of a panic. [`set_proxy`] replaces them
//! wholesale: new requests observe the new proxy, in-flight requests finish
//! on the client they started with.

use std::sync::RwLock;
use std::time::Duration;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use reqwest::{Client, Proxy};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::{Config, HttpSettings};
use crate::observability;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid proxy URL '{url}': {source}")]
    InvalidProxyUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Browser-like identification for upstreams that reject generic agents.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0";

/// Cache key: proxy identity plus TLS-verification mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    proxy_url: String,
    insecure: bool,
}

static CLIENT_CACHE: Lazy<DashMap<ClientKey, Client>> = Lazy::new(DashMap::new);

// Empty until first use; a failing build propagates instead of panicking.
static DEFAULT_CLIENT: Lazy<RwLock<Option<Client>>> = Lazy::new(|| RwLock::new(None));

static DEFAULT_INSECURE_CLIENT: Lazy<RwLock<Option<Client>>> = Lazy::new(|| RwLock::new(None));

/// Default client for the given TLS mode, built on first use from the
/// shared configuration.
fn default_client(insecure: bool) -> Result<Client> {
    let slot = if insecure {
        &DEFAULT_INSECURE_CLIENT
    } else {
        &DEFAULT_CLIENT
    };

    {
        let guard = slot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
    }

    let built = build_client(&Config::shared().http, None, insecure)?;

    let mut guard = slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    // A racing builder may have filled the slot meanwhile; the first stored
    // client wins and is what every caller observes.
    Ok(guard.get_or_insert(built).clone())
}

/// Build a client from settings, optionally routed through a proxy.
///
/// `insecure` disables TLS certificate verification for this client only.
pub fn build_client(settings: &HttpSettings, proxy: Option<&Url>, insecure: bool) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .pool_max_idle_per_host(settings.pool_max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(settings.pool_idle_timeout_secs))
        .user_agent(&settings.user_agent);

    if let Some(url) = proxy {
        builder = builder.proxy(Proxy::all(url.clone())?);
    }

    if insecure {
        builder = builder.danger_accept_invalid_certs(true);
    }

    let client = builder.build()?;
    observability::metrics().client_built();
    Ok(client)
}

/// Return a ready-to-use client for the given proxy URL and TLS mode.
///
/// An empty `proxy_url` selects the process-wide default client for the
/// requested TLS mode. Otherwise the keyed cache is consulted first; on a
/// miss the proxy URL is parsed, a new client is built from the shared
/// configuration and stored, and every concurrent caller for the same key
/// converges on one stored instance.
pub fn get_client(proxy_url: &str, insecure: bool) -> Result<Client> {
    if proxy_url.is_empty() {
        return default_client(insecure);
    }

    let key = ClientKey {
        proxy_url: proxy_url.to_string(),
        insecure,
    };

    if let Some(client) = CLIENT_CACHE.get(&key) {
        return Ok(client.clone());
    }

    let parsed = parse_proxy_url(proxy_url)?;
    let client = build_client(&Config::shared().http, Some(&parsed), insecure)?;
    debug!(proxy_url, insecure, "Built HTTP client for proxy");

    // Concurrent first-time builders may race here; the first stored value
    // wins and is what every caller observes from now on.
    Ok(CLIENT_CACHE.entry(key).or_insert(client).clone())
}

/// Route the process-wide default clients through the given proxy.
///
/// Both defaults are rebuilt with the proxy applied (the insecure one keeps
/// TLS verification disabled) and swapped in atomically. The keyed cache is
/// then warmed for both TLS modes of this proxy so [`get_client`] callers
/// reach the same transports. There is no unset operation.
pub fn set_proxy(proxy_url: &str) -> Result<()> {
    let parsed = parse_proxy_url(proxy_url)?;
    let settings = &Config::shared().http;

    let secure = build_client(settings, Some(&parsed), false)?;
    let insecure = build_client(settings, Some(&parsed), true)?;

    *DEFAULT_CLIENT
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(secure);
    *DEFAULT_INSECURE_CLIENT
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(insecure);

    info!(proxy_url, "Default HTTP clients now route through proxy");

    get_client(proxy_url, false)?;
    get_client(proxy_url, true)?;

    Ok(())
}

/// Stamp a prepared request with the fixed browser-like User-Agent.
/// Opt-in; call before handing the request to a decoder or pool task.
pub fn set_browser_user_agent(request: &mut reqwest::Request) {
    request.headers_mut().insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(BROWSER_USER_AGENT),
    );
}

fn parse_proxy_url(proxy_url: &str) -> Result<Url> {
    Url::parse(proxy_url).map_err(|source| ClientError::InvalidProxyUrl {
        url: proxy_url.to_string(),
        source,
    })
}
