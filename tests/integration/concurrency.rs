//! Concurrency tests
//!
//! These tests verify that the service stays consistent when request handlers
//! and the evaluation loop hit it at the same time.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use hostwatch::alerts::{Level, UpdateConfigInput};
use hostwatch::storage::AlertStore;
use tokio::sync::broadcast;

use crate::helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_are_serialized() {
    let channel = Arc::new(ScriptedChannel::succeeding("scripted"));
    let (service, store) = service_with_channel(channel).await;
    let service = Arc::new(service);

    let mut handles = Vec::new();
    for i in 0..20i64 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .update_config(UpdateConfigInput {
                    cooldown_sec: Some(i),
                    telegram_bot_token: Some(format!("token-{i:04}")),
                    ..Default::default()
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Whichever update won, the live view and the store agree with it.
    let view = service.config_view(false).await;
    let persisted = store.load_config().await.unwrap();
    assert_eq!(view.config, persisted);

    let winner = view.config.cooldown_sec;
    assert_eq!(view.telegram_token_mask, format!("****{winner:04}"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_status_reads_during_evaluation() {
    let channel = Arc::new(ScriptedChannel::succeeding("scripted"));
    let (service, _store) = service_with_channel(channel).await;
    let service = Arc::new(service);
    let base = Utc::now();

    let evaluator = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            for step in 0..200 {
                let cpu = if step < 100 { 95.0 } else { 40.0 };
                service
                    .evaluate_snapshot(&snapshot_at(base, step * 10, cpu))
                    .await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                let status = service.status(true).await;
                assert!(status.read_only);
                assert!((0.0..=100.0).contains(&status.last_cpu_percent));
                tokio::task::yield_now().await;
            }
        }));
    }

    evaluator.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }

    let status = service.status(false).await;
    assert_eq!(status.current_state, Level::None);
    assert!(status.last_critical_at.is_some());
    assert!(status.last_recovery_at.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_test_triggers_get_unique_ids() {
    let channel = Arc::new(ScriptedChannel::succeeding("scripted"));
    let deliveries = channel.deliveries();
    let (service, _store) = service_with_channel(channel).await;
    let service = Arc::new(service);

    let mut handles = Vec::new();
    for _ in 0..25 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move { service.trigger_test().await }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let event = handle.await.unwrap().unwrap();
        assert!(ids.insert(event.id), "duplicate event id {}", event.id);
    }

    assert_eq!(deliveries.lock().await.len(), 25);
    let history = service.list_history(100, None).await.unwrap();
    assert_eq!(history.len(), 25);
    assert!(history.windows(2).all(|pair| pair[0].id > pair[1].id));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_silence_toggling_while_running() {
    let channel = Arc::new(ScriptedChannel::succeeding("scripted"));
    let (service, store) = service_with_channel(channel).await;
    let service = Arc::new(service);

    let (tx, rx) = broadcast::channel(256);
    let runner = tokio::spawn(Arc::clone(&service).run(rx));

    let toggler = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            for round in 0..20 {
                if round % 2 == 0 {
                    service.set_silence(5).await.unwrap();
                } else {
                    service.clear_silence().await.unwrap();
                }
            }
        })
    };

    let base = Utc::now();
    for step in 0..100 {
        // Ignore send errors; the runner may already be draining.
        let _ = tx.send(snapshot_at(base, step * 5, 50.0 + (step % 50) as f64));
    }

    toggler.await.unwrap();
    drop(tx);
    runner.await.unwrap();

    // Twenty toggles, ending on a clear.
    assert_eq!(store.muted_until().await.unwrap(), None);
    assert!(!service.status(false).await.silenced);
}
