//! Broadcast behaviour under injected platform failures.

use std::sync::Arc;
use std::time::Duration;

use vaultgate_core::{Location, SubjectId};
use vaultgate_executor::ThroughputWindow;
use vaultgate_gateway::{BroadcastDispatcher, BroadcastError, BroadcastOptions, GatewayError};
use vaultgate_provider::{DeliveryError, DynGateway};
use vaultgate_simulation::prelude::*;

fn source() -> Location {
    Location::new("1", 500)
}

fn names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("r{i:03}")).collect()
}

async fn harness_with(options: BroadcastOptions, recipients: &[String]) -> SimulationHarness {
    let harness = SimulationHarness::builder()
        .broadcast_options(options)
        .build()
        .expect("harness should start");
    let refs: Vec<&str> = recipients.iter().map(String::as_str).collect();
    harness
        .register_recipients(&refs)
        .await
        .expect("register recipients");
    harness
}

#[tokio::test(start_paused = true)]
async fn throughput_ceiling_holds_with_rate_limits() {
    let recipients = names(23);
    let options = BroadcastOptions {
        wave_size: 5,
        wave_interval: Duration::ZERO,
        window: Some(ThroughputWindow::new(5, Duration::from_secs(1))),
        ..BroadcastOptions::default()
    };
    let harness = harness_with(options, &recipients).await;
    for who in ["r002", "r007", "r011", "r019"] {
        harness.gateway().script_recipient(
            who,
            [DeliveryError::RateLimited {
                retry_after: Duration::from_secs(2),
            }],
        );
    }

    let summary = harness
        .vaultgate()
        .broadcast(&harness.admin(), &source())
        .await
        .expect("broadcast");

    summary.assert_complete();
    summary.assert_counts(23, 0, 0);
    assert_eq!(summary.rate_limit_hits, 4);
    // 23 first attempts plus 4 retries, all inside the ceiling.
    let attempts = harness.gateway().delivery_attempts();
    assert_eq!(attempts.len(), 27);
    SideEffectAssertions::assert_throughput_within(&attempts, 5, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn rate_limit_pause_compounds_across_senders() {
    let options = BroadcastOptions {
        wave_size: 2,
        wave_interval: Duration::ZERO,
        window: None,
        ..BroadcastOptions::default()
    };
    let harness = harness_with(options, &["a".into(), "b".into(), "c".into()]).await;
    for who in ["a", "b"] {
        harness.gateway().script_recipient(
            who,
            [DeliveryError::RateLimited {
                retry_after: Duration::from_secs(3),
            }],
        );
    }

    let start = tokio::time::Instant::now();
    let summary = harness
        .vaultgate()
        .broadcast(&harness.admin(), &source())
        .await
        .expect("broadcast");
    summary.assert_counts(3, 0, 0);

    // Both signals stack: the run stays paused for 6 seconds.
    let third = harness
        .gateway()
        .delivery_attempts()
        .into_iter()
        .find(|c| c.recipient.as_ref().is_some_and(|r| r.as_str() == "c"))
        .expect("c attempted");
    assert!(third.at.duration_since(start) >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn completeness_over_mixed_failures() {
    let recipients = names(40);
    let options = BroadcastOptions {
        wave_size: 7,
        wave_interval: Duration::from_millis(200),
        window: None,
        ..BroadcastOptions::default()
    };
    let harness = harness_with(options, &recipients).await;
    let gw = harness.gateway();
    for (i, who) in recipients.iter().enumerate() {
        match i % 5 {
            0 => gw.fail_recipient(who.as_str(), DeliveryError::Recipient("chat not found".into())),
            1 => gw.script_recipient(
                who.as_str(),
                std::iter::repeat_n(DeliveryError::Connection("reset".into()), 3),
            ),
            2 => gw.script_recipient(who.as_str(), [DeliveryError::Timeout(Duration::from_secs(1))]),
            _ => {}
        }
    }

    let summary = harness
        .vaultgate()
        .broadcast(&harness.admin(), &source())
        .await
        .expect("broadcast");

    summary.assert_complete();
    summary.assert_counts(24, 8, 8);
    assert_eq!(summary.pruned, 8);
    let counts = harness
        .vaultgate()
        .recipients()
        .count()
        .await
        .expect("count");
    assert_eq!(counts.total, 32);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_retries_are_bounded() {
    let options = BroadcastOptions {
        window: None,
        ..BroadcastOptions::default()
    };
    let harness = harness_with(options, &["stuck".into(), "ok".into()]).await;
    harness.gateway().fail_recipient(
        "stuck",
        DeliveryError::RateLimited {
            retry_after: Duration::from_secs(1),
        },
    );

    let summary = harness
        .vaultgate()
        .broadcast(&harness.admin(), &source())
        .await
        .expect("broadcast");
    summary.assert_complete();
    summary.assert_counts(1, 0, 1);
    // One initial attempt plus the three allowed retries.
    let stuck_attempts = harness
        .gateway()
        .delivery_attempts()
        .iter()
        .filter(|c| c.recipient.as_ref().is_some_and(|r| r.as_str() == "stuck"))
        .count();
    assert_eq!(stuck_attempts, 4);
    assert!(
        harness
            .vaultgate()
            .recipients()
            .get(&SubjectId::new("stuck"))
            .await
            .expect("get")
            .is_some()
    );
}

#[tokio::test(start_paused = true)]
async fn cancelled_after_first_wave_attempts_nothing_more() {
    let recipients = names(9);
    let options = BroadcastOptions {
        wave_size: 3,
        wave_interval: Duration::from_secs(30),
        window: None,
        ..BroadcastOptions::default()
    };
    let harness = harness_with(options, &recipients).await;

    let handle = harness
        .vaultgate()
        .start_broadcast(&harness.admin(), source())
        .await
        .expect("start broadcast");
    let mut progress = handle.progress();
    while progress.borrow_and_update().waves_completed == 0 {
        progress.changed().await.expect("progress");
    }
    handle.cancel();

    let summary = handle.join().await.expect("broadcast");
    assert!(summary.cancelled);
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.not_attempted, 6);
    harness.gateway().assert_deliveries(3);
}

#[tokio::test(start_paused = true)]
async fn unreachable_platform_fails_the_run() {
    let harness = harness_with(BroadcastOptions::default(), &["a".into()]).await;
    harness
        .gateway()
        .fail_health_check(DeliveryError::Unauthorized("Unauthorized".into()));

    let err = harness
        .vaultgate()
        .broadcast(&harness.admin(), &source())
        .await
        .expect_err("health check should fail the run");
    assert!(matches!(
        err,
        GatewayError::Broadcast(BroadcastError::Unreachable(_))
    ));
    harness.gateway().assert_deliveries(0);
}

#[tokio::test(start_paused = true)]
async fn missing_source_aborts_after_first_wave() {
    let harness = SimulationHarness::start().expect("harness should start");
    let gateway: Arc<dyn DynGateway> =
        Arc::new(FailingGateway::new("gone", FailureType::SourceMissing));
    let dispatcher = BroadcastDispatcher::new(
        gateway,
        Arc::clone(harness.vaultgate().recipients()),
        vaultgate_executor::DeliveryExecutor::default(),
        Arc::clone(harness.vaultgate().metrics()),
    );
    let options = BroadcastOptions {
        wave_size: 2,
        window: None,
        ..BroadcastOptions::default()
    };
    let recipients: Vec<SubjectId> = ["a", "b", "c", "d", "e"]
        .into_iter()
        .map(SubjectId::new)
        .collect();

    let err = dispatcher
        .broadcast(&source(), recipients, &options)
        .await
        .expect_err("fatal error expected");
    let BroadcastError::Fatal { summary, .. } = err else {
        panic!("expected Fatal, got {err:?}");
    };
    assert_eq!(summary.aborted, 2);
    assert_eq!(summary.not_attempted, 3);
    assert_eq!(summary.waves_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn non_admin_cannot_broadcast() {
    let harness = harness_with(BroadcastOptions::default(), &["a".into()]).await;
    let err = harness
        .vaultgate()
        .broadcast(&SubjectId::new("a"), &source())
        .await
        .expect_err("forbidden");
    assert!(matches!(err, GatewayError::Forbidden { .. }));
    harness.gateway().assert_not_called();
}
