use std::future::Future;
use std::sync::Arc;

use sqlx::{Postgres, Transaction};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::feed_state::{Effect, FeedState};
use crate::db::{queries, DbPool};
use crate::models::message::FeedEvent;

pub fn decode_event(payload: &[u8]) -> Option<FeedEvent> {
    match serde_json::from_slice(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Failed to parse message: {}", e);
            None
        }
    }
}

/// Applies one payload to the shared state. The lock is held only for the
/// reduction, never across database IO.
pub async fn reduce(state: &Mutex<FeedState>, payload: &[u8]) -> Vec<Effect> {
    let Some(event) = decode_event(payload) else {
        return Vec::new();
    };
    debug!("Reducing event {:?}", event);
    let mut state = state.lock().await;
    state.apply(event)
}

pub const WRITER_QUEUE_SIZE: usize = 1024;

/// Starts the single task that persists effect batches in the order they
/// were reduced.
pub fn spawn_writer(pool: DbPool, state: Arc<Mutex<FeedState>>) -> mpsc::Sender<Vec<Effect>> {
    let (tx, rx) = mpsc::channel(WRITER_QUEUE_SIZE);
    tokio::spawn(run_writer(rx, state, move |effects| {
        let pool = pool.clone();
        async move { persist_effects(&pool, effects).await }
    }));
    tx
}

/// Drains batches one at a time. A failed batch is rolled back in the feed
/// state so its deliveries and feeds are emitted again later.
pub async fn run_writer<F, Fut>(
    mut rx: mpsc::Receiver<Vec<Effect>>,
    state: Arc<Mutex<FeedState>>,
    mut persist: F,
) where
    F: FnMut(Vec<Effect>) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    while let Some(effects) = rx.recv().await {
        let pending = effects.clone();
        if let Err(e) = persist(effects).await {
            error!("Error persisting {} effects: {}", pending.len(), e);
            state.lock().await.rollback(&pending);
        }
    }
    info!("Effect writer stopped");
}

pub async fn persist_effects(pool: &DbPool, effects: Vec<Effect>) -> anyhow::Result<()> {
    let (dismissals, effects): (Vec<Effect>, Vec<Effect>) = effects
        .into_iter()
        .partition(|e| matches!(e, Effect::RecordDismissal { .. }));

    // Dismissals are best effort: the session already hides the alert.
    for dismissal in dismissals {
        if let Err(e) = record_dismissal(pool, &dismissal).await {
            error!("Error recording alert dismissal: {}", e);
        }
    }

    if effects.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for effect in effects {
        apply_effect(&mut tx, effect).await?;
    }
    tx.commit().await?;

    Ok(())
}

async fn record_dismissal(pool: &DbPool, effect: &Effect) -> anyhow::Result<()> {
    if let Effect::RecordDismissal {
        alert_id,
        user_id,
        dismissed_at,
    } = effect
    {
        sqlx::query(queries::UPSERT_ALERT_DISMISSAL)
            .bind(alert_id)
            .bind(user_id)
            .bind(dismissed_at)
            .execute(pool)
            .await?;
        debug!("Recorded dismissal of {} by {}", alert_id, user_id);
    }
    Ok(())
}

async fn apply_effect(tx: &mut Transaction<'_, Postgres>, effect: Effect) -> anyhow::Result<()> {
    match effect {
        Effect::DeliverAlert {
            user_id,
            alert_id,
            severity,
            distance_km,
            delivered_at,
        } => {
            sqlx::query(queries::INSERT_ALERT_DELIVERY)
                .bind(Uuid::new_v4())
                .bind(&alert_id)
                .bind(&user_id)
                .bind(severity.as_str())
                .bind(distance_km)
                .bind(delivered_at)
                .execute(&mut **tx)
                .await?;
            info!(
                "Delivered alert {} to {} ({:.1} km away)",
                alert_id, user_id, distance_km
            );
        }
        Effect::PublishAlert { report_id, alert } => {
            sqlx::query(queries::INSERT_EMERGENCY_ALERT)
                .bind(&alert.id)
                .bind(&report_id)
                .bind(&alert.title)
                .bind(&alert.message)
                .bind(&alert.alert_type)
                .bind(alert.severity.as_str())
                .bind(alert.location.lat)
                .bind(alert.location.lng)
                .bind(alert.radius_km)
                .bind(&alert.issued_by)
                .bind(alert.issued_at)
                .bind(alert.active)
                .execute(&mut **tx)
                .await?;

            sqlx::query(queries::UPDATE_REPORT_ALERT_ISSUED)
                .bind(&report_id)
                .bind(alert.issued_at)
                .bind(&alert.issued_by)
                .execute(&mut **tx)
                .await?;
        }
        Effect::UpdateReportStatus {
            report_id,
            status,
            reviewer,
            updated_at,
            approved_at,
        } => {
            sqlx::query(queries::UPDATE_REPORT_STATUS)
                .bind(&report_id)
                .bind(status.as_str())
                .bind(reviewer)
                .bind(updated_at)
                .bind(approved_at)
                .execute(&mut **tx)
                .await?;
            info!("Report {} moved to {}", report_id, status.as_str());
        }
        Effect::PublishNotification(n) => {
            let roles: Vec<String> = n
                .target_roles
                .iter()
                .map(|r| r.as_str().to_string())
                .collect();
            sqlx::query(queries::INSERT_NOTIFICATION)
                .bind(&n.id)
                .bind(&n.kind)
                .bind(&n.title)
                .bind(&n.message)
                .bind(n.priority.as_str())
                .bind(roles)
                .bind(n.timestamp)
                .bind(n.location.map(|p| p.lat))
                .bind(n.location.map(|p| p.lng))
                .bind(&n.location_error)
                .execute(&mut **tx)
                .await?;
        }
        Effect::MarkNotificationRead {
            notification_id,
            read_at,
        } => {
            sqlx::query(queries::MARK_NOTIFICATION_READ)
                .bind(&notification_id)
                .bind(read_at)
                .execute(&mut **tx)
                .await?;
        }
        Effect::DeleteNotifications { notification_ids } => {
            let result = sqlx::query(queries::DELETE_NOTIFICATIONS)
                .bind(&notification_ids)
                .execute(&mut **tx)
                .await?;
            info!("Cleared {} old notifications", result.rows_affected());
        }
        Effect::RefreshAnalystFeed {
            user_id,
            report_ids,
            refreshed_at,
        } => {
            sqlx::query(queries::UPSERT_ANALYST_FEED)
                .bind(&user_id)
                .bind(&report_ids)
                .bind(refreshed_at)
                .execute(&mut **tx)
                .await?;
        }
        Effect::RefreshTriageFeed {
            user_id,
            report_ids,
            counts,
            refreshed_at,
        } => {
            sqlx::query(queries::UPSERT_TRIAGE_FEED)
                .bind(&user_id)
                .bind(&report_ids)
                .bind(counts.total as i64)
                .bind(counts.pending as i64)
                .bind(counts.reviewing as i64)
                .bind(counts.approved as i64)
                .bind(counts.rejected as i64)
                .bind(refreshed_at)
                .execute(&mut **tx)
                .await?;
        }
        Effect::UpdateUnreadCount {
            user_id,
            role,
            total,
            unread,
            updated_at,
        } => {
            sqlx::query(queries::UPSERT_NOTIFICATION_BADGE)
                .bind(&user_id)
                .bind(role.as_str())
                .bind(total as i64)
                .bind(unread as i64)
                .bind(updated_at)
                .execute(&mut **tx)
                .await?;
            debug!("{} has {} notifications, {} unread", user_id, total, unread);
        }
        Effect::RecordDismissal { .. } => {
            // Split off in persist_effects; never part of the transaction.
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bad_payload_yields_no_effects() {
        let state = Mutex::new(FeedState::new(5));
        assert!(reduce(&state, b"not json").await.is_empty());
        assert!(reduce(&state, br#"{"type":"unknown_event"}"#).await.is_empty());
    }

    #[tokio::test]
    async fn test_reduce_applies_event_to_shared_state() {
        let state = Mutex::new(FeedState::new(5));
        let effects = reduce(
            &state,
            br#"{"type":"alert_dismissed","user_id":"u1","alert_id":"a1"}"#,
        )
        .await;
        assert_eq!(effects.len(), 1);

        reduce(&state, br#"{"type":"session_started","user_id":"u1","role":"analyst"}"#).await;
        assert!(state.lock().await.session("u1").is_some());
    }

    fn sos_payload() -> &'static [u8] {
        br#"{"type":"sos_raised","user_id":"c1","user_name":"Meera","lat":9.9,"lng":76.2}"#
    }

    #[tokio::test]
    async fn test_writer_keeps_reduction_order() {
        let state = Arc::new(Mutex::new(FeedState::new(5)));
        let published = reduce(&state, sos_payload()).await;
        let id = match published.as_slice() {
            [Effect::PublishNotification(n)] => n.id.clone(),
            other => panic!("unexpected effects {:?}", other),
        };
        let read = reduce(
            &state,
            format!(r#"{{"type":"notification_read","notification_id":"{}"}}"#, id).as_bytes(),
        )
        .await;

        let written = Arc::new(Mutex::new(Vec::new()));
        let log = written.clone();
        let (tx, rx) = mpsc::channel(8);
        let writer = tokio::spawn(run_writer(rx, state.clone(), move |effects: Vec<Effect>| {
            let log = log.clone();
            async move {
                // The insert is slow; the read must still land after it.
                if matches!(effects.first(), Some(Effect::PublishNotification(_))) {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
                log.lock().await.extend(effects);
                Ok::<(), anyhow::Error>(())
            }
        }));
        tx.send(published).await.unwrap();
        tx.send(read).await.unwrap();
        drop(tx);
        writer.await.unwrap();

        let written = written.lock().await;
        assert!(matches!(written[0], Effect::PublishNotification(_)));
        assert!(matches!(
            &written[1],
            Effect::MarkNotificationRead { notification_id, .. } if *notification_id == id
        ));
    }

    #[tokio::test]
    async fn test_failed_batch_is_redelivered() {
        let state = Arc::new(Mutex::new(FeedState::new(5)));
        reduce(&state, br#"{"type":"session_started","user_id":"u1","role":"citizen"}"#).await;
        let snapshot = br#"{"type":"alerts_snapshot","documents":[{"id":"surge","data":{
            "location":{"lat":25.1972,"lng":55.2744},"radiusKm":15,"active":true}}]}"#;
        reduce(&state, snapshot).await;
        let effects = reduce(
            &state,
            br#"{"type":"location_fix","user_id":"u1","lat":25.2048,"lng":55.2708}"#,
        )
        .await;
        assert!(matches!(effects.as_slice(), [Effect::DeliverAlert { .. }]));

        let (tx, rx) = mpsc::channel(1);
        let writer = tokio::spawn(run_writer(rx, state.clone(), |_effects: Vec<Effect>| async {
            Err::<(), _>(anyhow::anyhow!("database unavailable"))
        }));
        tx.send(effects).await.unwrap();
        drop(tx);
        writer.await.unwrap();

        let again = reduce(&state, snapshot).await;
        assert!(matches!(
            again.as_slice(),
            [Effect::DeliverAlert { alert_id, .. }] if alert_id == "surge"
        ));
    }
}
