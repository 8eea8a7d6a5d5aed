// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Client subscriptions to zone bus-state transitions.
//!
//! A subscription is just a boxed callback closure — there's no separate
//! `user_data` field the way a C-style callback API would need one, because
//! a Rust closure already captures whatever state it needs.

use crate::ids::{SubscriptionId, SubscriptionIdGen};
use crate::zone_id::ZoneId;

/// A single `add_state_callback` registration.
pub struct Subscription {
    id: SubscriptionId,
    callback: Box<dyn Fn(&ZoneId, &str) + Send + Sync>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish_non_exhaustive()
    }
}

/// The manager's owned set of subscriptions: ids are opaque and
/// monotonically assigned, and the manager owns the set exclusively.
#[derive(Default)]
pub struct SubscriptionSet {
    ids: SubscriptionIdGen,
    subscriptions: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `add_state_callback`: register a callback, returning its id.
    pub fn add(&mut self, callback: impl Fn(&ZoneId, &str) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.ids.next();
        self.subscriptions.push(Subscription { id, callback: Box::new(callback) });
        id
    }

    /// `del_state_callback`: remove a subscription by id. Returns whether a
    /// subscription with that id existed.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Fan a bus-state change out to every current subscriber.
    pub fn notify_all(&self, zone: &ZoneId, address: &str) {
        for sub in &self.subscriptions {
            (sub.callback)(zone, address);
        }
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
