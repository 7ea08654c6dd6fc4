//! Deferred-cleanup guard
//!
//! Used wherever a native-library allocation (the enumeration list, a
//! temporarily opened handle) must be released on every exit path of a
//! scope, including early returns from `?`.

/// Runs a cleanup action exactly once when dropped
///
/// Not clonable or copyable: an aliased guard could run its action twice.
pub struct Defer<F: FnOnce()> {
    action: Option<F>,
}

impl<F: FnOnce()> Defer<F> {
    /// Arm the guard with a cleanup action
    pub fn new(action: F) -> Self {
        Defer {
            action: Some(action),
        }
    }
}

impl<F: FnOnce()> Drop for Defer<F> {
    fn drop(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_runs_once_on_scope_exit() {
        let runs = Cell::new(0);
        {
            let _guard = Defer::new(|| runs.set(runs.get() + 1));
            assert_eq!(runs.get(), 0);
        }
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_runs_on_early_return() {
        fn inner(runs: &Cell<u32>) -> Result<(), ()> {
            let _guard = Defer::new(|| runs.set(runs.get() + 1));
            Err(())?;
            Ok(())
        }

        let runs = Cell::new(0);
        assert!(inner(&runs).is_err());
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_runs_on_panic() {
        let runs = std::sync::Mutex::new(0u32);
        let result = std::panic::catch_unwind(|| {
            let _guard = Defer::new(|| *runs.lock().unwrap() += 1);
            panic!("boom");
        });
        assert!(result.is_err());
        assert_eq!(*runs.lock().unwrap(), 1);
    }
}
