//! The realtime hub: per-account pub/sub for order events.
//!
//! Each account has a room keyed by its customer id. [`RealtimeHub::publish`] is fire-and-forget: if the account has
//! no live connection the event is dropped — the order store remains the durable source of truth and the client sees
//! the correct state on its next query. Connected clients receive events over the `/events` SSE stream.
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use storefront_engine::db_types::Order;
use tokio::sync::broadcast;

const ROOM_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmedPayload {
    #[serde(rename = "orderId")]
    pub order_id: String,
    pub status: String,
    #[serde(rename = "paidAt")]
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFailedPayload {
    #[serde(rename = "orderId")]
    pub order_id: String,
    pub reason: String,
    pub refunded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    OrderConfirmed(OrderConfirmedPayload),
    OrderFailed(OrderFailedPayload),
}

impl RealtimeEvent {
    pub fn order_confirmed(order: &Order) -> Self {
        Self::OrderConfirmed(OrderConfirmedPayload {
            order_id: order.order_id.as_str().to_string(),
            status: order.status.to_string(),
            paid_at: order.paid_at,
        })
    }

    pub fn order_failed(order: &Order, reason: &str, refunded: bool) -> Self {
        Self::OrderFailed(OrderFailedPayload {
            order_id: order.order_id.as_str().to_string(),
            reason: reason.to_string(),
            refunded,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::OrderConfirmed(_) => "orderConfirmed",
            RealtimeEvent::OrderFailed(_) => "orderFailed",
        }
    }

    pub fn payload_json(&self) -> serde_json::Value {
        match self {
            RealtimeEvent::OrderConfirmed(p) => serde_json::to_value(p).unwrap_or_default(),
            RealtimeEvent::OrderFailed(p) => serde_json::to_value(p).unwrap_or_default(),
        }
    }

    /// The event as a Server-Sent-Events frame.
    pub fn to_sse_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name(), self.payload_json())
    }
}

#[derive(Clone, Default)]
pub struct RealtimeHub {
    rooms: Arc<RwLock<HashMap<String, broadcast::Sender<RealtimeEvent>>>>,
}

impl RealtimeHub {
    /// Push an event to an account's room. Best-effort: with no live subscriber the event is simply dropped.
    pub fn publish(&self, account_id: &str, event: RealtimeEvent) {
        let name = event.name();
        let rooms = self.rooms.read().expect("realtime hub lock poisoned");
        match rooms.get(account_id) {
            Some(sender) => match sender.send(event) {
                Ok(n) => trace!("📡️ Pushed {name} event to {n} connection(s) of account {account_id}"),
                Err(_) => debug!("📡️ Account {account_id} has no live connections; {name} event dropped"),
            },
            None => debug!("📡️ Account {account_id} has never connected; {name} event dropped"),
        }
    }

    /// Open a subscription to an account's room, creating the room on first use.
    pub fn subscribe(&self, account_id: &str) -> broadcast::Receiver<RealtimeEvent> {
        let mut rooms = self.rooms.write().expect("realtime hub lock poisoned");
        rooms.entry(account_id.to_string()).or_insert_with(|| broadcast::channel(ROOM_BUFFER).0).subscribe()
    }
}
