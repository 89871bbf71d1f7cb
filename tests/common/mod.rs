//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use gerar_pdf_api::factory::mock::MockBrowserFactory;
use gerar_pdf_api::{PdfService, ServiceConfig, ServiceConfigBuilder};

/// Builder with short timeouts and no keep-alive thread.
pub fn test_config() -> ServiceConfigBuilder {
    ServiceConfigBuilder::new()
        .keep_alive(false)
        .navigation_timeout(Duration::from_millis(500))
        .content_timeout(Duration::from_millis(500))
        .render_timeout(Duration::from_secs(5))
}

/// Service over the mock engine.
pub fn mock_service(factory: MockBrowserFactory, config: &ServiceConfig) -> Arc<PdfService> {
    Arc::new(PdfService::new(config, Box::new(factory)).expect("service should build"))
}
