//! Property-Based Tests for labstep
//!
//! Uses proptest for the fallback chain invariants:
//! - The winner is always the first succeeding loader
//! - Recorded failures are exactly the loaders before the winner, in order
//! - Repeated resolution never invokes a loader again

use labstep::{ImportManager, ImportOutcome, LabError, LoaderEntry, ModuleHandle};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Register one loader per flag (`true` = succeeds) and count invocations.
fn chain(manager: &ImportManager, flags: &[bool]) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let loaders = flags
        .iter()
        .enumerate()
        .map(|(i, &ok)| {
            let calls = Arc::clone(&calls);
            LoaderEntry::new(format!("loader-{}", i), move || {
                calls.fetch_add(1, Ordering::SeqCst);
                if ok {
                    Ok(ModuleHandle::new(i))
                } else {
                    Err(anyhow::anyhow!("loader {} failed", i))
                }
            })
        })
        .collect();
    manager.register("cap", loaders).unwrap();
    calls
}

proptest! {
    #[test]
    fn winner_is_first_success(flags in prop::collection::vec(any::<bool>(), 1..8)) {
        let manager = ImportManager::new();
        let calls = chain(&manager, &flags);
        let first_ok = flags.iter().position(|&ok| ok);

        let result = manager.resolve("cap");
        let status = manager.status("cap").unwrap();

        match first_ok {
            Some(winner) => {
                let handle = result.unwrap();
                prop_assert_eq!(handle.downcast_ref::<usize>(), Some(&winner));
                let expected_name = format!("loader-{}", winner);
                prop_assert_eq!(status.winning_loader.as_deref(), Some(expected_name.as_str()));
                prop_assert_eq!(status.failures.len(), winner);
                let expected = if winner == 0 {
                    ImportOutcome::Succeeded
                } else {
                    ImportOutcome::FailedFallback
                };
                prop_assert_eq!(status.outcome, expected);
                prop_assert_eq!(calls.load(Ordering::SeqCst), winner + 1);
            }
            None => {
                let exhausted = matches!(result, Err(LabError::AllFallbacksExhausted { .. }));
                prop_assert!(exhausted);
                prop_assert_eq!(status.outcome, ImportOutcome::FailedAll);
                prop_assert_eq!(status.failures.len(), flags.len());
                prop_assert_eq!(calls.load(Ordering::SeqCst), flags.len());
            }
        }

        for (i, failure) in status.failures.iter().enumerate() {
            prop_assert_eq!(failure.position, i);
        }
    }

    #[test]
    fn repeated_resolution_is_memoized(
        flags in prop::collection::vec(any::<bool>(), 1..8),
        repeats in 1usize..5,
    ) {
        let manager = ImportManager::new();
        let calls = chain(&manager, &flags);

        let first = manager.resolve("cap");
        let after_first = calls.load(Ordering::SeqCst);
        for _ in 0..repeats {
            let again = manager.resolve("cap");
            match (&first, &again) {
                (Ok(a), Ok(b)) => prop_assert!(a.ptr_eq(b)),
                (Err(_), Err(_)) => {}
                _ => prop_assert!(false, "resolution outcome changed between calls"),
            }
        }
        prop_assert_eq!(calls.load(Ordering::SeqCst), after_first);
    }
}
