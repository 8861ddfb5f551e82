// ── Serving cache ──
//
// Latest reconciled subscriber list per router, served to readers for a
// short freshness window so list queries do not hit the router.
//
// Every router slot carries a generation. `invalidate` bumps it, and a
// writer may only `put` with a ticket taken at the generation it started
// from, so a sync that read the device before a mutation can never put
// the pre-mutation list back.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::clock::Clock;
use crate::model::{RouterId, SubscriberStatus};

struct Entry {
    subscribers: Arc<Vec<SubscriberStatus>>,
    stored_at: DateTime<Utc>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    entry: Option<Entry>,
}

/// Permission to fill a router's slot, valid until its next invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTicket {
    router: RouterId,
    generation: u64,
}

/// Per-router snapshot store with a TTL.
///
/// Each router's entry is replaced wholesale, so readers always see one
/// complete cycle's list.
pub struct ServingCache {
    slots: DashMap<RouterId, Slot>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl ServingCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    /// The cached list, if it is younger than the TTL.
    pub fn get(&self, router: RouterId) -> Option<Arc<Vec<SubscriberStatus>>> {
        let slot = self.slots.get(&router)?;
        let entry = slot.entry.as_ref()?;
        let age = self.clock.now() - entry.stored_at;
        (age < self.ttl).then(|| Arc::clone(&entry.subscribers))
    }

    /// Take a ticket before reading the device.
    pub fn ticket(&self, router: RouterId) -> CacheTicket {
        CacheTicket {
            router,
            generation: self.slots.get(&router).map_or(0, |slot| slot.generation),
        }
    }

    /// Replace the router's entry, stamping it with the current time.
    /// Returns `false`, storing nothing, if the router was invalidated
    /// after the ticket was taken.
    pub fn put(&self, ticket: CacheTicket, subscribers: Vec<SubscriberStatus>) -> bool {
        let mut slot = self.slots.entry(ticket.router).or_default();
        if slot.generation != ticket.generation {
            return false;
        }
        slot.entry = Some(Entry {
            subscribers: Arc::new(subscribers),
            stored_at: self.clock.now(),
        });
        true
    }

    /// Drop the router's entry so the next read goes live, and void every
    /// outstanding ticket for it.
    pub fn invalidate(&self, router: RouterId) {
        let mut slot = self.slots.entry(router).or_default();
        slot.generation = slot.generation.wrapping_add(1);
        slot.entry = None;
    }

    /// Number of routers with an entry, fresh or not.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
