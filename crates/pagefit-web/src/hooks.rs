#![forbid(unsafe_code)]

//! Registry for listeners on framework hooks.
//!
//! DOM targets get real event listeners. The application and router targets
//! have no DOM object: the framework calls the exported runtime methods
//! instead, and the runtime looks up which listener ids to dispatch here.

use pagefit_core::{EventKind, EventTarget, ListenerId};

#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    entries: Vec<(ListenerId, EventTarget, EventKind)>,
}

impl HookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether listeners on `target` are served by this registry rather than
    /// by the DOM.
    #[must_use]
    pub const fn handles(target: EventTarget) -> bool {
        matches!(target, EventTarget::App | EventTarget::Router)
    }

    pub fn register(&mut self, id: ListenerId, target: EventTarget, kind: EventKind) {
        self.entries.push((id, target, kind));
    }

    /// Forget `id`. Returns whether it was registered.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _, _)| *entry != id);
        self.entries.len() != before
    }

    /// Ids subscribed to `(target, kind)`, in registration order.
    #[must_use]
    pub fn ids_for(&self, target: EventTarget, kind: EventKind) -> Vec<ListenerId> {
        self.entries
            .iter()
            .filter(|(_, t, k)| *t == target && *k == kind)
            .map(|(id, _, _)| *id)
            .collect()
    }

    #[must_use]
    pub fn contains(&self, id: ListenerId) -> bool {
        self.entries.iter().any(|(entry, _, _)| *entry == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dom_targets_are_not_hooks() {
        assert!(HookRegistry::handles(EventTarget::App));
        assert!(HookRegistry::handles(EventTarget::Router));
        assert!(!HookRegistry::handles(EventTarget::Window));
        assert!(!HookRegistry::handles(EventTarget::VisualViewport));
    }

    #[test]
    fn ids_follow_registration_order() {
        let mut hooks = HookRegistry::new();
        hooks.register(ListenerId::new(4), EventTarget::App, EventKind::PageFinish);
        hooks.register(ListenerId::new(2), EventTarget::App, EventKind::AppMounted);
        hooks.register(ListenerId::new(9), EventTarget::App, EventKind::PageFinish);
        assert_eq!(
            hooks.ids_for(EventTarget::App, EventKind::PageFinish),
            vec![ListenerId::new(4), ListenerId::new(9)]
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let mut hooks = HookRegistry::new();
        hooks.register(ListenerId::new(1), EventTarget::Router, EventKind::AfterNavigate);
        assert!(hooks.remove(ListenerId::new(1)));
        assert!(!hooks.remove(ListenerId::new(1)));
        assert!(hooks.is_empty());
    }
}
