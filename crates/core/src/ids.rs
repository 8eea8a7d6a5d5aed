// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Zones Daemon Project

//! Process-wide monotonic id generators.
//!
//! `message_id`, `peer_id`, and subscription ids all share the same shape: a
//! counter that only ever increases for the lifetime of the process, so that
//! no two ids generated within one run collide.

use std::sync::atomic::{AtomicU64, Ordering};

/// A counter that hands out strictly increasing `u64`s, starting at 1.
///
/// 0 is reserved as a sentinel ("no id") by callers that need one.
#[derive(Debug, Default)]
pub struct MonotonicCounter(AtomicU64);

impl MonotonicCounter {
    pub const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

macro_rules! monotonic_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

monotonic_id!(
    /// A request/response pairing id on the IPC wire.
    MessageId
);
monotonic_id!(
    /// Identifies one accepted IPC peer connection for its lifetime.
    PeerId
);
monotonic_id!(
    /// Identifies one `add_state_callback` subscription.
    SubscriptionId
);

/// Generator for [`MessageId`]s.
#[derive(Debug, Default)]
pub struct MessageIdGen(MonotonicCounter);

impl MessageIdGen {
    pub const fn new() -> Self {
        Self(MonotonicCounter::new())
    }

    pub fn next(&self) -> MessageId {
        MessageId(self.0.next())
    }
}

/// Generator for [`PeerId`]s.
#[derive(Debug, Default)]
pub struct PeerIdGen(MonotonicCounter);

impl PeerIdGen {
    pub const fn new() -> Self {
        Self(MonotonicCounter::new())
    }

    pub fn next(&self) -> PeerId {
        PeerId(self.0.next())
    }
}

/// Generator for [`SubscriptionId`]s.
#[derive(Debug, Default)]
pub struct SubscriptionIdGen(MonotonicCounter);

impl SubscriptionIdGen {
    pub const fn new() -> Self {
        Self(MonotonicCounter::new())
    }

    pub fn next(&self) -> SubscriptionId {
        SubscriptionId(self.0.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_increasing() {
        let gen = SubscriptionIdGen::new();
        let mut seen = HashSet::new();
        let mut last = 0;
        for _ in 0..1000 {
            let id = gen.next();
            assert!(id.as_u64() > last);
            last = id.as_u64();
            assert!(seen.insert(id));
        }
    }

    #[test]
    fn independent_generators_do_not_interfere() {
        let messages = MessageIdGen::new();
        let peers = PeerIdGen::new();
        assert_eq!(messages.next().as_u64(), 1);
        assert_eq!(peers.next().as_u64(), 1);
        assert_eq!(messages.next().as_u64(), 2);
    }
}
