//! End-to-end discovery and solve against a mock fragment server.

mod support;

use puzzle_core::config::SolverConfig;
use puzzle_core::discovery::GapKeyStrategy;
use puzzle_core::{PuzzleRuntime, RequestContext};
use support::puzzle_server::{FragmentResponder, start_fragment_server};

const WORDS: [&str; 12] = [
    "the", "quick", "brown", "fox", "jumps", "over", "the", "lazy", "dog", "and", "runs", "away",
];

fn config_for(uri: &str) -> SolverConfig {
    let mut config = SolverConfig::default();
    config.source.base_url = uri.to_string();
    config.fetch.base_delay_ms = 1;
    config.fetch.max_delay_ms = 5;
    config.discovery.initial_batch_size = 3;
    config
}

#[tokio::test]
async fn test_solve_repairs_gap_and_assembles_text() {
    let Some(server) = start_fragment_server().await else {
        return;
    };
    // Key = position, so key 4 is position 4.
    FragmentResponder::new(&WORDS, 0)
        .absent_first(4, 1)
        .mount(&server)
        .await;

    let runtime = PuzzleRuntime::from_config(&config_for(&server.uri())).unwrap();
    let result = runtime.solver().solve(None, &RequestContext::new()).await;
    runtime.shutdown().await;

    assert!(result.error.is_none(), "unexpected error: {:?}", result.error);
    // Key 0 is never probed, so position 0 stays outside the observed span.
    assert_eq!(result.text, WORDS[1..].join(" "));
    assert_eq!(result.stats.total_found, 11);
    assert!(result.stats.is_complete);
    assert_eq!(runtime.connections().sessions_created(), 1);
}

#[tokio::test]
async fn test_discover_through_http_with_offset_keys() {
    let Some(server) = start_fragment_server().await else {
        return;
    };
    // Key = position + 1: the probe of keys 1..=12 covers positions 0..=11.
    FragmentResponder::new(&WORDS, 1)
        .absent_first(5, 1)
        .mount(&server)
        .await;

    let mut config = config_for(&server.uri());
    config.discovery.gap_key_strategy = GapKeyStrategy::Interpolated;
    let runtime = PuzzleRuntime::from_config(&config).unwrap();

    let set = runtime
        .repository()
        .discover(None, &RequestContext::new())
        .await
        .unwrap();

    assert_eq!(set.total_found(), 12);
    assert!(set.missing_positions().is_empty());
    assert_eq!(set.get(4).unwrap().text, "jumps");
}

#[tokio::test]
async fn test_malformed_body_is_absent_not_fatal() {
    let Some(server) = start_fragment_server().await else {
        return;
    };
    FragmentResponder::new(&WORDS, 1)
        .malformed(12)
        .mount(&server)
        .await;

    let runtime = PuzzleRuntime::from_config(&config_for(&server.uri())).unwrap();
    let result = runtime.solver().solve(None, &RequestContext::new()).await;

    assert!(!result.is_error());
    assert_eq!(result.stats.total_found, 11);
    assert_eq!(result.text, WORDS[..11].join(" "));
}

#[tokio::test]
async fn test_empty_server_gives_error_result() {
    let Some(server) = start_fragment_server().await else {
        return;
    };
    FragmentResponder::new(&[], 1).mount(&server).await;

    let runtime = PuzzleRuntime::from_config(&config_for(&server.uri())).unwrap();
    let result = runtime.solver().solve(None, &RequestContext::new()).await;

    assert_eq!(result.text, "");
    assert!(result.is_error());
    assert!(result.elapsed_seconds >= 0.0);
    assert_eq!(result.stats.total_requests, 12);
}

#[tokio::test]
async fn test_connectivity_probe() {
    let Some(server) = start_fragment_server().await else {
        return;
    };
    FragmentResponder::new(&WORDS, 1).mount(&server).await;

    let runtime = PuzzleRuntime::from_config(&config_for(&server.uri())).unwrap();
    assert!(
        runtime
            .repository()
            .check_connectivity(&RequestContext::new())
            .await
    );
}
