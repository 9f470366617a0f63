#![forbid(unsafe_code)]

//! Cancelable "next rendering opportunity" task.
//!
//! [`ScheduledTask`] wraps at most one pending [`FrameHandle`]. Scheduling
//! while a frame is pending is a no-op, which is what bounds the viewport
//! publish rate to once per frame regardless of how many events arrive.
//!
//! # Invariants
//!
//! 1. At most one frame is pending per task.
//! 2. [`fire`](ScheduledTask::fire) only accepts the handle it is holding;
//!    a stale handle (already cancelled) never runs the task.
//! 3. [`cancel`](ScheduledTask::cancel) is idempotent.

use crate::host::{FrameHandle, Host};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduledTask {
    pending: Option<FrameHandle>,
}

impl ScheduledTask {
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Request a frame unless one is already pending.
    ///
    /// Returns `true` if a new frame was requested.
    pub fn schedule<H: Host + ?Sized>(&mut self, host: &mut H) -> bool {
        if self.pending.is_some() {
            return false;
        }
        self.pending = Some(host.request_frame());
        true
    }

    /// Cancel the pending frame, if any. Returns `true` if one was cancelled.
    pub fn cancel<H: Host + ?Sized>(&mut self, host: &mut H) -> bool {
        match self.pending.take() {
            Some(handle) => {
                host.cancel_frame(handle);
                true
            }
            None => false,
        }
    }

    /// Claim a fired frame. Returns `true` if `handle` was this task's
    /// pending frame, in which case the task is idle again.
    pub fn fire(&mut self, handle: FrameHandle) -> bool {
        if self.pending == Some(handle) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub const fn handle(&self) -> Option<FrameHandle> {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;

    #[test]
    fn schedule_coalesces() {
        let mut host = HeadlessHost::new();
        let mut task = ScheduledTask::new();
        assert!(task.schedule(&mut host));
        assert!(!task.schedule(&mut host));
        assert!(!task.schedule(&mut host));
        assert_eq!(host.pending_frame_count(), 1);
    }

    #[test]
    fn fire_accepts_only_own_handle() {
        let mut host = HeadlessHost::new();
        let mut task = ScheduledTask::new();
        task.schedule(&mut host);
        let handle = task.handle().unwrap();

        assert!(!task.fire(FrameHandle::new(handle.get() + 100)));
        assert!(task.is_pending());
        assert!(task.fire(handle));
        assert!(!task.is_pending());
        assert!(!task.fire(handle));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut host = HeadlessHost::new();
        let mut task = ScheduledTask::new();
        assert!(!task.cancel(&mut host));
        task.schedule(&mut host);
        assert!(task.cancel(&mut host));
        assert!(!task.cancel(&mut host));
        assert_eq!(host.pending_frame_count(), 0);
    }

    #[test]
    fn reschedule_after_fire_requests_new_frame() {
        let mut host = HeadlessHost::new();
        let mut task = ScheduledTask::new();
        task.schedule(&mut host);
        let first = task.handle().unwrap();
        task.fire(first);
        assert!(task.schedule(&mut host));
        assert_ne!(task.handle(), Some(first));
    }
}
