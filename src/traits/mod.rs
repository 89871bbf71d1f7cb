//! Traits at the seams between the service and the browser engine.
//!
//! - [`Healthcheck`]: liveness probe used by the keep-alive thread and by the
//!   render worker to tell a crash apart from an ordinary failure.
//! - [`BrowserProcess`]: one running browser that can open isolated pages.
//! - [`PageSession`]: the primitive operations the render worker drives on a
//!   single page.
//!
//! The production implementation lives in
//! [`ChromeBrowserFactory`](crate::ChromeBrowserFactory); an in-memory one is
//! available under `factory::mock` with the `test-utils` feature.

mod engine;
mod healthcheck;

pub use engine::{BrowserProcess, PageSession};
pub use healthcheck::Healthcheck;
