//! Convenience imports.
//!
//! ```rust,ignore
//! use gerar_pdf_api::prelude::*;
//! ```

pub use crate::config::{ServiceConfig, ServiceConfigBuilder};
pub use crate::error::BrowserError;
pub use crate::factory::{BrowserFactory, ChromeBrowserFactory};
pub use crate::handle::BrowserHandle;
pub use crate::manager::{BrowserManager, BrowserStatus};
pub use crate::service::{
    PaperFormat, PdfRequest, PdfResponse, PdfService, PdfServiceError, ReadinessPolicy,
    ResourceKind, ResourcePolicy,
};
pub use crate::stats::ServiceStats;
pub use crate::traits::Healthcheck;
pub use crate::SharedPdfService;

#[cfg(feature = "env-config")]
pub use crate::config::env::from_env;

// Commonly needed alongside SharedPdfService
pub use std::sync::Arc;
