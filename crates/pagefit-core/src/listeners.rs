#![forbid(unsafe_code)]

//! Bookkeeping for listeners an adapter registered with its host.

use crate::host::{EventKind, EventTarget, Host, ListenOptions, ListenerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Registration {
    id: ListenerId,
    target: EventTarget,
    kind: EventKind,
}

/// The listeners owned by one adapter.
///
/// Detaching drains the set, so calling [`detach_all`](Self::detach_all)
/// twice removes nothing the second time.
#[derive(Debug, Clone, Default)]
pub struct ListenerSet {
    entries: Vec<Registration>,
}

impl ListenerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register with the host and remember the id.
    pub fn add<H: Host + ?Sized>(
        &mut self,
        host: &mut H,
        target: EventTarget,
        kind: EventKind,
        options: ListenOptions,
    ) -> ListenerId {
        let id = host.add_listener(target, kind, options);
        tracing::trace!(
            target: "pagefit.listeners",
            id = id.get(),
            target_object = ?target,
            event = kind.host_name(),
            passive = options.passive,
            "listener added"
        );
        self.entries.push(Registration { id, target, kind });
        id
    }

    /// The kind of event `id` was registered for, if it belongs to this set.
    #[must_use]
    pub fn kind_of(&self, id: ListenerId) -> Option<EventKind> {
        self.entries.iter().find(|r| r.id == id).map(|r| r.kind)
    }

    #[must_use]
    pub fn contains(&self, id: ListenerId) -> bool {
        self.kind_of(id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every listener from the host. Returns how many were removed.
    pub fn detach_all<H: Host + ?Sized>(&mut self, host: &mut H) -> usize {
        let count = self.entries.len();
        for registration in self.entries.drain(..) {
            host.remove_listener(registration.id);
            tracing::trace!(
                target: "pagefit.listeners",
                id = registration.id.get(),
                target_object = ?registration.target,
                event = registration.kind.host_name(),
                "listener removed"
            );
        }
        count
    }
}
