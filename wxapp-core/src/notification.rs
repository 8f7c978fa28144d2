use std::sync::atomic::{AtomicBool, Ordering};

/// One-shot "just authenticated" signal for the rendering layer.
///
/// Set by the controller, read-and-cleared by the first observation after it.
#[derive(Debug, Default)]
pub struct NotificationFlag(AtomicBool);

impl NotificationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the flag was already set and not yet consumed.
    pub fn set(&self) -> bool {
        self.0.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub fn consume(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Coarse "derived state changed" signal. Any number of triggers between two
/// observations collapse into a single pass.
#[derive(Debug, Default)]
pub struct RerenderSignal(AtomicBool);

impl RerenderSignal {
    pub fn schedule(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_consumed_once() {
        let flag = NotificationFlag::new();
        assert!(!flag.consume());

        assert!(flag.set());
        assert!(flag.consume());
        assert!(!flag.consume());
    }

    #[test]
    fn flag_is_not_set_twice_without_a_clear() {
        let flag = NotificationFlag::new();

        assert!(flag.set());
        assert!(!flag.set());
        assert!(flag.consume());
        assert!(!flag.consume());
    }

    #[test]
    fn rerender_triggers_collapse() {
        let signal = RerenderSignal::default();
        signal.schedule();
        signal.schedule();
        signal.schedule();

        assert!(signal.take());
        assert!(!signal.take());
    }
}
