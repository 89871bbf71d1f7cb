//! Concurrent access tests for the render service.

mod common;

use std::sync::Arc;
use std::time::Duration;

use gerar_pdf_api::factory::mock::{MockBehavior, MockBrowserFactory};
use gerar_pdf_api::prelude::*;
use tokio::task::JoinSet;

use common::{mock_service, test_config};

/// Test that N > max renders never exceed the bound and all complete.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_bounded_and_all_complete() {
    let factory = MockBrowserFactory::with_behavior(MockBehavior {
        export_delay: Duration::from_millis(50),
        ..Default::default()
    });
    let probes = factory.probes();
    let service = mock_service(factory, &test_config().max_concurrency(2).build().unwrap());

    let mut tasks = JoinSet::new();
    for i in 0..10 {
        let service = Arc::clone(&service);
        tasks.spawn(async move {
            service
                .generate_pdf(PdfRequest::new(format!("<p>{}</p>", i)))
                .await
        });
    }

    let mut completed = 0;
    while let Some(result) = tasks.join_next().await {
        let response = result.expect("task should not panic").expect("render should succeed");
        assert!(response.data.starts_with(b"%PDF-"));
        completed += 1;
    }

    assert_eq!(completed, 10);
    assert!(
        probes.peak_open_pages() <= 2,
        "At most 2 pages may be open at once, saw {}",
        probes.peak_open_pages()
    );
    assert_eq!(probes.launches(), 1, "Concurrent renders share one browser");
    assert_eq!(probes.open_pages(), 0);

    let stats = service.stats();
    assert_eq!(stats.gate.in_flight, 0);
    assert_eq!(stats.gate.queued, 0);
    assert_eq!(stats.renders.completed, 10);
}

/// Test that queued requests are visible in stats while waiting.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queue_visible_in_stats() {
    let factory = MockBrowserFactory::with_behavior(MockBehavior {
        export_delay: Duration::from_millis(300),
        ..Default::default()
    });
    let service = mock_service(factory, &test_config().max_concurrency(1).build().unwrap());

    let mut tasks = JoinSet::new();
    for _ in 0..3 {
        let service = Arc::clone(&service);
        tasks.spawn(async move { service.generate_pdf(PdfRequest::new("<p>q</p>")).await });
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    let stats = service.stats();
    assert_eq!(stats.gate.in_flight, 1);
    assert_eq!(stats.gate.queued, 2);

    while let Some(result) = tasks.join_next().await {
        assert!(result.unwrap().is_ok());
    }
}

/// Test that an abandoned request still releases its slot and page.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_client_disconnect_releases_resources() {
    let factory = MockBrowserFactory::with_behavior(MockBehavior {
        export_delay: Duration::from_millis(200),
        ..Default::default()
    });
    let probes = factory.probes();
    let service = mock_service(factory, &test_config().max_concurrency(1).build().unwrap());

    let abandoned = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.generate_pdf(PdfRequest::new("<p>gone</p>")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    abandoned.abort();

    let response = tokio::time::timeout(
        Duration::from_secs(2),
        service.generate_pdf(PdfRequest::new("<p>next</p>")),
    )
    .await
    .expect("slot should be released by the detached job")
    .unwrap();
    assert!(response.data.starts_with(b"%PDF-"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(probes.open_pages(), 0);
    assert_eq!(service.stats().gate.in_flight, 0);
}

/// Test that a crash during concurrent renders affects only in-flight work.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_crash_under_load_recovers() {
    let factory = MockBrowserFactory::with_behavior(MockBehavior {
        crash_next_exports: 1,
        ..Default::default()
    });
    let probes = factory.probes();
    let service = mock_service(factory, &test_config().max_concurrency(1).build().unwrap());

    let mut tasks = JoinSet::new();
    for i in 0..4 {
        let service = Arc::clone(&service);
        tasks.spawn(async move {
            service
                .generate_pdf(PdfRequest::new(format!("<p>{}</p>", i)))
                .await
        });
    }

    let mut crashes = 0;
    let mut successes = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => successes += 1,
            Err(PdfServiceError::BrowserCrash(_)) => crashes += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(crashes, 1);
    assert_eq!(successes, 3);
    assert_eq!(probes.launches(), 2);
    assert_eq!(probes.open_pages(), 0);
}

/// Test concurrent access to stats while rendering.
#[tokio::test]
async fn test_concurrent_stats_access() {
    let service = mock_service(MockBrowserFactory::new(), &test_config().build().unwrap());

    let mut tasks = JoinSet::new();
    for _ in 0..10 {
        let service = Arc::clone(&service);
        tasks.spawn(async move {
            for _ in 0..100 {
                let _stats = service.stats();
            }
        });
    }

    while let Some(result) = tasks.join_next().await {
        assert!(result.is_ok(), "Task should complete without panic");
    }
}
