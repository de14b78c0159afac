//! Smoke test against the real translator site.
//!
//! Needs Chromium and network access, so it only runs on request:
//! `cargo test -p transcheck-harness --test live_site -- --ignored`

#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use transcheck_core::{FixtureSet, HarnessConfig, Suite};
use transcheck_harness::{ChromiumSessionFactory, ControlAdapter as _, ScenarioRunner, SessionFactory as _};

#[tokio::test]
#[ignore = "requires Chromium and access to the live translator"]
async fn live_page_exposes_both_regions() {
    let config = HarnessConfig::load(None).unwrap();
    let factory = ChromiumSessionFactory::launch(&config).await.unwrap();

    let page = factory.open_session().await.unwrap();
    page.clear().await.unwrap();
    page.clear().await.unwrap();
    let revision = page.output_revision().await.unwrap();
    assert!(revision.is_some());
    factory.close_session(page).await.unwrap();

    factory.shutdown().await.unwrap();
}

#[tokio::test]
#[ignore = "requires Chromium and access to the live translator"]
async fn live_single_case() {
    let config = HarnessConfig::load(None).unwrap();
    let fixtures = FixtureSet::builtin().unwrap();
    let factory = ChromiumSessionFactory::launch(&config).await.unwrap();
    let runner = ScenarioRunner::new(factory, &config);

    let report = runner
        .run(&fixtures, &[Suite::Positive], Some("Pos_Fun_0002"))
        .await;

    runner.into_factory().shutdown().await.unwrap();
    assert_eq!(report.results.len(), 1);
    assert!(report.passed, "{}", report.render_text());
}
