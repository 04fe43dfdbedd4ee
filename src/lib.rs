//! fetchpool — bounded-concurrency fetch-and-decode.
//!
//! Three layers, leaf to root:
//!
//! - [`client`] — lazily built, process-wide `reqwest::Client` cache keyed by
//!   (proxy URL, TLS mode), plus replaceable no-proxy defaults.
//! - [`decode`] — execute a prepared request and decode the body into a typed
//!   value (JSON or XML), with curried forms usable as pool tasks.
//! - [`pool`] — run a task over an input sequence on a bounded worker pool,
//!   collecting per-item results aligned to the original input order.
//!
//! A caller typically obtains a client from the registry, wraps a decoder as
//! the task, and submits the prepared requests to a [`pool::Job`]. One slow
//! or failing upstream never blocks or corrupts results for the others.

pub mod client;
pub mod config;
pub mod decode;
pub mod observability;
pub mod pool;

pub use client::{ClientError, get_client, set_browser_user_agent, set_proxy};
pub use decode::{
    FetchError, RequestDoer, decode_json_from_request, decode_json_task, decode_xml_from_request,
    decode_xml_task,
};
pub use pool::{ContentError, Job, PoolError, PoolRun};
