//! Event-to-notification routing engine.
//!
//! Recipients come from the event itself: explicit `target_user_ids` plus
//! every active user holding `audience_role`. The acting user is not
//! notified of their own action unless named explicitly.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast;
use scholarship_core::channels::{CHANNEL_EMAIL, CHANNEL_IN_APP};
use scholarship_core::event_types::{title_for, EMAIL_EVENTS, NOTIFYING_EVENTS};
use scholarship_core::messages::WS_NOTIFICATION;
use scholarship_core::types::DbId;
use scholarship_db::models::notification::CreateNotification;
use scholarship_db::repositories::{NotificationRepo, UserRepo};
use scholarship_db::DbPool;
use scholarship_events::{EmailDelivery, PlatformEvent};

use crate::ws::WsManager;

/// Routes domain events to stored, pushed, and emailed notifications.
pub struct NotificationRouter {
    pool: DbPool,
    ws_manager: Arc<WsManager>,
    email: Option<Arc<EmailDelivery>>,
}

impl NotificationRouter {
    /// `email` is `None` when SMTP is not configured.
    pub fn new(pool: DbPool, ws_manager: Arc<WsManager>, email: Option<Arc<EmailDelivery>>) -> Self {
        Self {
            pool,
            ws_manager,
            email,
        }
    }

    /// Run until the event bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = self.route_event(&event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to route event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver one event to every recipient. Returns how many users were
    /// notified.
    pub async fn route_event(&self, event: &PlatformEvent) -> Result<usize, sqlx::Error> {
        if !NOTIFYING_EVENTS.contains(&event.event_type.as_str()) {
            return Ok(0);
        }

        let targets = self.determine_targets(event).await?;
        if targets.is_empty() {
            tracing::debug!(event_type = %event.event_type, "Event has no recipients");
            return Ok(0);
        }

        let event_id = self.find_event_id(event).await;
        for &user_id in &targets {
            self.deliver_in_app(user_id, event_id, event).await?;
        }

        if EMAIL_EVENTS.contains(&event.event_type.as_str()) {
            if let Some(email) = &self.email {
                for &user_id in &targets {
                    self.deliver_email(email, user_id, event_id, event).await;
                }
            }
        }

        Ok(targets.len())
    }

    async fn determine_targets(&self, event: &PlatformEvent) -> Result<Vec<DbId>, sqlx::Error> {
        let audience = match &event.audience_role {
            Some(role) => UserRepo::list_active_by_role(&self.pool, role)
                .await?
                .into_iter()
                .map(|u| u.id)
                .collect(),
            None => Vec::new(),
        };
        Ok(merge_targets(
            &event.target_user_ids,
            &audience,
            event.actor_user_id,
        ))
    }

    /// Best-effort link to the audit row written by the persistence
    /// service, which runs concurrently and may not have written it yet.
    async fn find_event_id(&self, event: &PlatformEvent) -> Option<DbId> {
        sqlx::query_scalar::<_, DbId>(
            "SELECT id FROM events
             WHERE event_type = $1 AND source_id IS NOT DISTINCT FROM $2
               AND created_at >= $3 - INTERVAL '5 seconds'
             ORDER BY id DESC LIMIT 1",
        )
        .bind(&event.event_type)
        .bind(event.source_id)
        .bind(event.timestamp)
        .fetch_optional(&self.pool)
        .await
        .ok()
        .flatten()
    }

    async fn deliver_in_app(
        &self,
        user_id: DbId,
        event_id: Option<DbId>,
        event: &PlatformEvent,
    ) -> Result<(), sqlx::Error> {
        let notification = NotificationRepo::create(
            &self.pool,
            &notification_for(user_id, event_id, event, CHANNEL_IN_APP),
        )
        .await?;

        self.ws_manager
            .send_json_to_user(
                user_id,
                &json!({
                    "type": WS_NOTIFICATION,
                    "notification": notification,
                }),
            )
            .await;
        Ok(())
    }

    /// Email failures are logged and never fail the in-app delivery.
    async fn deliver_email(
        &self,
        email: &EmailDelivery,
        user_id: DbId,
        event_id: Option<DbId>,
        event: &PlatformEvent,
    ) {
        let user = match UserRepo::find_by_id(&self.pool, user_id).await {
            Ok(Some(user)) if !user.email.is_empty() => user,
            Ok(_) => return,
            Err(e) => {
                tracing::error!(error = %e, user_id, "Failed to load email recipient");
                return;
            }
        };

        if let Err(e) = email.deliver(&user.email, event).await {
            tracing::warn!(error = %e, user_id, event_type = %event.event_type, "Email delivery failed");
            return;
        }

        let record = notification_for(user_id, event_id, event, CHANNEL_EMAIL);
        if let Err(e) = NotificationRepo::create(&self.pool, &record).await {
            tracing::error!(error = %e, user_id, "Failed to record email delivery");
        }
    }
}

fn notification_for(
    user_id: DbId,
    event_id: Option<DbId>,
    event: &PlatformEvent,
    channel: &str,
) -> CreateNotification {
    CreateNotification {
        event_id,
        user_id,
        event_type: event.event_type.clone(),
        title: title_for(&event.event_type).to_string(),
        body: event
            .payload
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
        payload: event.payload.clone(),
        channel: channel.to_string(),
    }
}

/// Union of explicit and role-derived recipients, in order, without
/// duplicates. The actor is dropped from the role-derived part only.
fn merge_targets(explicit: &[DbId], audience: &[DbId], actor: Option<DbId>) -> Vec<DbId> {
    let mut out: Vec<DbId> = Vec::with_capacity(explicit.len() + audience.len());
    for &id in explicit {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    for &id in audience {
        if Some(id) != actor && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_targets_come_first_and_dedupe() {
        assert_eq!(merge_targets(&[4, 2], &[2, 7, 4], None), vec![4, 2, 7]);
    }

    #[test]
    fn actor_is_skipped_from_audience_only() {
        assert_eq!(merge_targets(&[], &[1, 9], Some(9)), vec![1]);
        assert_eq!(merge_targets(&[9], &[1, 9], Some(9)), vec![9, 1]);
    }

    #[test]
    fn notification_body_comes_from_message() {
        let event = PlatformEvent::new("renewal.delisted")
            .with_payload(json!({ "message": "2021-0001 was delisted", "renewal_id": 3 }));
        let n = notification_for(5, Some(11), &event, CHANNEL_IN_APP);
        assert_eq!(n.title, "Scholar delisted");
        assert_eq!(n.body.as_deref(), Some("2021-0001 was delisted"));
        assert_eq!(n.event_id, Some(11));
        assert_eq!(n.channel, "in_app");
    }
}
