//! End-to-end tests for the snapshot → evaluation → notification → history
//! pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hostwatch::alerts::{Level, NotificationChannel, UpdateConfigInput};
use hostwatch::storage::AlertStore;
use pretty_assertions::assert_eq;
use tokio::sync::broadcast;

use crate::helpers::*;

#[tokio::test]
async fn test_warning_critical_recovery_sequence() {
    let channel = Arc::new(ScriptedChannel::succeeding("scripted"));
    let deliveries = channel.deliveries();
    let (service, _store) = service_with_channel(channel).await;
    let base = Utc::now();

    let steps = [
        (0, 80.0, None),
        (60, 80.0, Some(Level::Warning)),
        (70, 95.0, None),
        (190, 95.0, Some(Level::Critical)),
        (200, 50.0, None),
        (260, 50.0, Some(Level::Recovery)),
    ];

    for (offset, cpu, expected) in steps {
        let triggers = service
            .evaluate_snapshot(&snapshot_at(base, offset, cpu))
            .await;
        let levels: Vec<Level> = triggers.iter().map(|t| t.level).collect();
        assert_eq!(levels, expected.into_iter().collect::<Vec<_>>(), "at +{offset}s");
    }

    let status = service.status(false).await;
    assert_eq!(status.current_state, Level::None);
    assert_eq!(status.last_cpu_percent, 50.0);
    assert!(status.last_warning_at.is_some());
    assert!(status.last_critical_at.is_some());
    assert!(status.last_recovery_at.is_some());

    let history = service.list_history(0, None).await.unwrap();
    let levels: Vec<Level> = history.iter().map(|e| e.level).collect();
    assert_eq!(levels, vec![Level::Recovery, Level::Critical, Level::Warning]);
    assert!(history.windows(2).all(|pair| pair[0].id > pair[1].id));

    let deliveries = deliveries.lock().await;
    assert_eq!(deliveries.len(), 3);
    assert!(
        deliveries[0]
            .message
            .starts_with("[hostwatch][WARNING] Host=test-host CPU=80.00% Time=")
    );
    assert_eq!(deliveries[1].level, "critical");
    assert_eq!(deliveries[2].level, "recovery");
}

#[tokio::test]
async fn test_recorded_event_carries_channel_results() {
    let channel = Arc::new(ScriptedChannel::succeeding("scripted"));
    let (service, _store) = service_with_channel(channel).await;
    let base = Utc::now();

    service.evaluate_snapshot(&snapshot_at(base, 0, 91.0)).await;
    service.evaluate_snapshot(&snapshot_at(base, 120, 92.5)).await;

    let history = service.list_history(10, None).await.unwrap();
    assert_eq!(history.len(), 1);
    let event = &history[0];
    assert_eq!(event.level, Level::Critical);
    assert_eq!(event.cpu_percent, 92.5);
    assert_eq!(event.created_at, base + chrono::TimeDelta::seconds(120));
    assert_eq!(event.channels.len(), 1);
    assert_eq!(event.channels[0].channel, "scripted");
    assert!(event.channels[0].success);
    assert_eq!(event.channels[0].attempts, 1);
    assert_eq!(event.channels[0].error_message, None);
}

#[tokio::test]
async fn test_silence_suppresses_until_cleared() {
    let channel = Arc::new(ScriptedChannel::succeeding("scripted"));
    let deliveries = channel.deliveries();
    let (service, store) = service_with_channel(channel).await;

    let until = service.set_silence(30).await.unwrap();
    assert_eq!(store.muted_until().await.unwrap(), Some(until));
    assert!(service.status(false).await.silenced);

    let base = Utc::now();
    assert!(service.evaluate_snapshot(&snapshot_at(base, 0, 80.0)).await.is_empty());
    assert!(service.evaluate_snapshot(&snapshot_at(base, 60, 80.0)).await.is_empty());
    assert_eq!(service.status(false).await.current_state, Level::Warning);

    service.clear_silence().await.unwrap();
    assert_eq!(store.muted_until().await.unwrap(), None);

    let triggers = service.evaluate_snapshot(&snapshot_at(base, 120, 80.0)).await;
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].level, Level::Warning);
    assert_eq!(deliveries.lock().await.len(), 1);
}

#[tokio::test]
async fn test_disabled_alerting_stays_quiet() {
    let channel = Arc::new(ScriptedChannel::succeeding("scripted"));
    let (service, _store) = service_with_channel(channel).await;

    service
        .update_config(UpdateConfigInput {
            enabled: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!service.is_enabled().await);

    let base = Utc::now();
    for offset in (0..=600).step_by(60) {
        assert!(
            service
                .evaluate_snapshot(&snapshot_at(base, offset, 99.0))
                .await
                .is_empty()
        );
    }
    assert_eq!(service.status(false).await.current_state, Level::None);
    assert!(service.list_history(10, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cooldown_limits_repeat_notifications() {
    let channel = Arc::new(ScriptedChannel::succeeding("scripted"));
    let (service, _store) = service_with_channel(channel).await;
    let base = Utc::now();

    let mut warnings = 0;
    // Oscillate around the warning threshold for 20 minutes.
    for step in 0..=20 {
        let cpu = if step % 4 == 3 { 65.0 } else { 80.0 };
        let triggers = service
            .evaluate_snapshot(&snapshot_at(base, step * 60, cpu))
            .await;
        warnings += triggers.iter().filter(|t| t.level == Level::Warning).count();
    }

    // Sent at +60s, then blocked by the 600s cooldown until the +780s window.
    assert_eq!(warnings, 2);
}

#[tokio::test]
async fn test_trigger_test_records_test_event() {
    let channel = Arc::new(ScriptedChannel::succeeding("scripted"));
    let deliveries = channel.deliveries();
    let (service, _store) = service_with_channel(channel).await;

    let event = service.trigger_test().await.unwrap();
    assert_eq!(event.level, Level::Test);
    assert_eq!(event.cpu_percent, 0.0);
    assert!(event.message.starts_with("[hostwatch][TEST] Host=test-host Time="));
    assert!(event.id > 0);

    let history = service.list_history(10, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, event.id);
    assert_eq!(deliveries.lock().await[0].level, "test");
}

#[tokio::test]
async fn test_run_loop_dispatches_and_drains_on_close() {
    let channel = Arc::new(ScriptedChannel::succeeding("scripted"));
    let deliveries = channel.deliveries();
    let (service, _store) = service_with_channel(channel).await;
    let service = Arc::new(service);

    let (tx, rx) = broadcast::channel(16);
    let handle = tokio::spawn(Arc::clone(&service).run(rx));

    let base = Utc::now();
    tx.send(snapshot_at(base, 0, 80.0)).unwrap();
    tx.send(snapshot_at(base, 60, 80.0)).unwrap();
    drop(tx);

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("service did not stop after channel closed")
        .unwrap();

    assert_eq!(deliveries.lock().await.len(), 1);
    let history = service.list_history(10, None).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].level, Level::Warning);
}

#[tokio::test]
async fn test_run_loop_stops_on_cancellation() {
    let channel = Arc::new(ScriptedChannel::succeeding("scripted"));
    let (service, _store) = service_with_channel(channel).await;
    let service = Arc::new(service);

    let (tx, rx) = broadcast::channel(16);
    let handle = tokio::spawn(Arc::clone(&service).run(rx));

    service.cancellation_token().cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("service did not stop after cancellation")
        .unwrap();

    // The receiver is gone once the loop exits.
    assert!(tx.send(snapshot_at(Utc::now(), 0, 50.0)).is_err());
}

#[tokio::test]
async fn test_secrets_survive_restart_with_same_key() {
    let store = Arc::new(hostwatch::storage::MemoryStore::with_config(fast_config()));
    let key = test_key();
    let channel: Arc<dyn NotificationChannel> = Arc::new(ScriptedChannel::succeeding("scripted"));

    let service = build_service(store.clone(), vec![Arc::clone(&channel)], Some(&key)).await;
    let view = service
        .update_config(UpdateConfigInput {
            telegram_bot_token: Some("  123456:abcdwxyz ".to_string()),
            gmail_address: Some("ops@example.com".to_string()),
            gmail_app_password: Some("app-password-9876".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(view.has_telegram_token);
    assert_eq!(view.telegram_token_mask, "****wxyz");
    assert_eq!(view.gmail_password_mask, "****9876");

    let record = store.load_secret_record().await.unwrap();
    assert!(!record.telegram_token_cipher.is_empty());
    assert!(!record.telegram_token_cipher.contains("abcdwxyz"));
    assert_eq!(record.gmail_address, "ops@example.com");

    let restarted = build_service(store.clone(), vec![Arc::clone(&channel)], Some(&key)).await;
    let view = restarted.config_view(false).await;
    assert_eq!(view.telegram_token_mask, "****wxyz");
    assert_eq!(view.gmail_password_mask, "****9876");
    assert_eq!(view.gmail_address, "ops@example.com");
    assert!(view.secrets_writable);
}

#[tokio::test]
async fn test_restart_with_other_key_masks_unreadable_secrets() {
    let store = Arc::new(hostwatch::storage::MemoryStore::with_config(fast_config()));
    let channel: Arc<dyn NotificationChannel> = Arc::new(ScriptedChannel::succeeding("scripted"));

    let service = build_service(store.clone(), vec![Arc::clone(&channel)], Some(&test_key())).await;
    service
        .update_config(UpdateConfigInput {
            telegram_bot_token: Some("123456:abcdwxyz".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let other_key = {
        use base64::{Engine as _, engine::general_purpose::STANDARD};
        STANDARD.encode([9u8; 32])
    };
    let restarted = build_service(store, vec![channel], Some(&other_key)).await;
    let view = restarted.config_view(true).await;
    assert!(view.has_telegram_token);
    assert_eq!(view.telegram_token_mask, "********");
    assert!(view.read_only);
}

#[tokio::test]
async fn test_telegram_delivery_through_service() {
    use hostwatch::alerts::channels::TelegramChannel;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot42:token/sendMessage"))
        .and(body_json(serde_json::json!({
            "chat_id": "1001",
            "text": "[hostwatch][CRITICAL] Host=test-host CPU=97.00% Time=2026-03-01T12:02:00Z",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(hostwatch::storage::MemoryStore::with_config(fast_config()));
    let telegram: Arc<dyn NotificationChannel> =
        Arc::new(TelegramChannel::with_api_base(mock_server.uri()).unwrap());
    let service = build_service(store, vec![telegram], Some(&test_key())).await;
    service
        .update_config(UpdateConfigInput {
            telegram_bot_token: Some("42:token".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let base = chrono::DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    service.evaluate_snapshot(&snapshot_at(base, 0, 97.0)).await;
    let triggers = service.evaluate_snapshot(&snapshot_at(base, 120, 97.0)).await;
    assert_eq!(triggers.len(), 1);

    let history = service.list_history(1, None).await.unwrap();
    assert_eq!(history[0].channels[0].channel, "telegram");
    assert!(history[0].channels[0].success);
}
