//! Request descriptors and the scheduler contract.
//!
//! A scheduler either admits a request and hands back a future of the raw
//! bytes, or declines it for now. Declining is not an error; the caller asks
//! again on a later frame.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use bytes::Bytes;
use futures::future::{FutureExt, LocalBoxFuture};

use crate::config::SchedulerLimits;
use crate::error::FetchError;

/// Future of a tile's raw bytes. Settles exactly once.
pub type FetchFuture = LocalBoxFuture<'static, Result<Bytes, FetchError>>;

/// Request classification, used for bucketing and priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Terrain,
    Imagery,
    Tiles3d,
    Other,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestKind::Terrain => "terrain",
            RequestKind::Imagery => "imagery",
            RequestKind::Tiles3d => "tiles3d",
            RequestKind::Other => "other",
        };

        f.write_str(s)
    }
}

/// Which loader the fetch function should use for the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Binary,
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub url: String,
    /// Endpoint identity the per-server limit is counted against.
    pub server: String,
    pub fetch: FetchKind,
    pub kind: RequestKind,
    /// Camera distance; smaller is more urgent.
    pub distance: f64,
}

pub trait RequestScheduler {
    /// `None` means "not admitted now", not failure.
    fn schedule(&mut self, request: Request) -> Option<FetchFuture>;
}

impl<F> RequestScheduler for F
where
    F: FnMut(Request) -> Option<FetchFuture>,
{
    fn schedule(&mut self, request: Request) -> Option<FetchFuture> {
        self(request)
    }
}

#[derive(Debug, Default)]
struct ActiveRequests {
    total: usize,
    per_server: HashMap<String, usize>,
}

/// Holds one admission slot; frees it when the fetch settles or is dropped.
struct Slot {
    active: Rc<RefCell<ActiveRequests>>,
    server: String,
}

impl Drop for Slot {
    fn drop(&mut self) {
        let mut active = self.active.borrow_mut();
        active.total = active.total.saturating_sub(1);

        if let Some(n) = active.per_server.get_mut(&self.server) {
            *n -= 1;
            if *n == 0 {
                active.per_server.remove(&self.server);
            }
        }
    }
}

/// Scheduler that admits requests while under its global and per-server
/// limits, fetching through `fetch`.
pub struct ThrottledScheduler<F> {
    fetch: F,
    limits: SchedulerLimits,
    active: Rc<RefCell<ActiveRequests>>,
    throttled: u64,
}

impl<F> ThrottledScheduler<F>
where
    F: FnMut(&Request) -> FetchFuture,
{
    pub fn new(limits: SchedulerLimits, fetch: F) -> Self {
        Self {
            fetch,
            limits,
            active: Rc::new(RefCell::new(ActiveRequests::default())),
            throttled: 0,
        }
    }

    pub fn active_requests(&self) -> usize {
        self.active.borrow().total
    }

    pub fn active_requests_for(&self, server: &str) -> usize {
        self.active.borrow().per_server.get(server).copied().unwrap_or(0)
    }

    /// Number of requests declined so far.
    pub fn throttled(&self) -> u64 {
        self.throttled
    }

    fn has_capacity(&self, server: &str) -> bool {
        self.active_requests() < self.limits.max_requests
            && self.active_requests_for(server) < self.limits.max_requests_per_server
    }
}

impl<F> RequestScheduler for ThrottledScheduler<F>
where
    F: FnMut(&Request) -> FetchFuture,
{
    fn schedule(&mut self, request: Request) -> Option<FetchFuture> {
        if !self.has_capacity(&request.server) {
            self.throttled += 1;
            log::trace!(
                "throttled {} request {} (server {}, {} active)",
                request.kind,
                request.url,
                request.server,
                self.active_requests()
            );
            return None;
        }

        {
            let mut active = self.active.borrow_mut();
            active.total += 1;
            *active.per_server.entry(request.server.clone()).or_insert(0) += 1;
        }

        let slot = Slot {
            active: Rc::clone(&self.active),
            server: request.server.clone(),
        };

        log::trace!(
            "admitted {} request {} at distance {:.1}",
            request.kind,
            request.url,
            request.distance
        );

        let fetch = (self.fetch)(&request);
        Some(
            async move {
                let _slot = slot;
                fetch.await
            }
            .boxed_local(),
        )
    }
}
