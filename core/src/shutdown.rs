//! # Shutdown Management
//!
//! The rapid-fire executor holds a broker order-status subscription and a
//! pending-order map for the duration of one scheduler run. [`AsyncShutdown`]
//! gives its cleanup (detach the subscription, clear the map) a named,
//! testable seam instead of an ad hoc method.

use std::future::Future;

/// Trait for components that require asynchronous cleanup at the end of a
/// scheduler run.
pub trait AsyncShutdown {
    type Result;

    fn shutdown(&mut self) -> impl Future<Output = Self::Result>;
}
