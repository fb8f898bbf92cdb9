use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use bson::oid::ObjectId;
use foodshare_db::models::{Notification, NotificationType};
use futures::{Stream, StreamExt, stream};
use serde::Serialize;
use tracing::warn;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: String,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub related_donation_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct NotificationFeed {
    pub items: Vec<NotificationResponse>,
    pub unread_count: usize,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<NotificationResponse>>, ApiError> {
    let list = state.daos.notifications.find_for_user(auth.user_id).await?;
    Ok(Json(list.into_iter().map(to_response).collect()))
}

pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state.daos.notifications.unread_count(auth.user_id).await?;
    Ok(Json(serde_json::json!({ "unread_count": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = ObjectId::parse_str(&notification_id)
        .map_err(|_| ApiError::BadRequest("Invalid notification_id".to_string()))?;
    if !state.daos.notifications.mark_read(id, auth.user_id).await? {
        return Err(ApiError::NotFound("Notification not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "read": true })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = state.daos.notifications.mark_all_read(auth.user_id).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

/// Server-sent events carrying the caller's full notification list: once on
/// connect, then after every change.
pub async fn stream(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let subscription = state.daos.notifications.subscribe(auth.user_id).await?;
    let initial = feed_event(subscription.current());

    let updates = stream::unfold(subscription, |mut subscription| async move {
        let list = subscription.next().await?;
        Some((feed_event(&list), subscription))
    });
    let events = stream::once(async move { initial })
        .chain(updates)
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn feed_event(list: &[Notification]) -> Event {
    let feed = NotificationFeed {
        unread_count: list.iter().filter(|n| !n.is_read).count(),
        items: list.iter().cloned().map(to_response).collect(),
    };
    Event::default()
        .event("notifications")
        .json_data(&feed)
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to encode notification feed");
            Event::default().event("error")
        })
}

fn to_response(n: Notification) -> NotificationResponse {
    NotificationResponse {
        id: n.id.map(|id| id.to_hex()).unwrap_or_default(),
        title: n.title,
        message: n.message,
        notification_type: n.notification_type,
        is_read: n.is_read,
        related_donation_id: n.related_donation_id.map(|id| id.to_hex()),
        created_at: n.created_at.try_to_rfc3339_string().unwrap_or_default(),
    }
}
