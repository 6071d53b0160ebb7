//! Scoped error strictness.
//!
//! Steps run with a strictness mode that decides whether recoverable errors
//! reported by the step body are escalated. The mode lives on the owner of a
//! step invocation, never in a global, and is changed only through a
//! [`StrictnessGuard`] that puts the previous value back when dropped. Drop
//! runs on normal return, on `?` early return, and while unwinding a panic.

use std::cell::Cell;

use serde::Serialize;
use strum::{Display, EnumString};

/// How errors reported from inside a step are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Recoverable errors are traced and the step carries on
    #[default]
    Continue,
    /// Every error is fatal to the step
    Stop,
}

/// Holder of the current mode for one step owner.
#[derive(Debug, Default)]
pub struct StrictnessCell {
    mode: Cell<Strictness>,
}

impl StrictnessCell {
    pub fn new(mode: Strictness) -> Self {
        Self {
            mode: Cell::new(mode),
        }
    }

    pub fn get(&self) -> Strictness {
        self.mode.get()
    }

    /// Switch to `mode` until the returned guard is dropped.
    pub fn enter(&self, mode: Strictness) -> StrictnessGuard<'_> {
        let previous = self.mode.replace(mode);
        tracing::trace!("strictness {} -> {}", previous, mode);
        StrictnessGuard {
            cell: &self.mode,
            previous,
        }
    }
}

/// Restores the previous strictness on drop.
#[must_use = "strictness is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct StrictnessGuard<'a> {
    cell: &'a Cell<Strictness>,
    previous: Strictness,
}

impl StrictnessGuard<'_> {
    pub fn previous(&self) -> Strictness {
        self.previous
    }
}

impl Drop for StrictnessGuard<'_> {
    fn drop(&mut self) {
        self.cell.set(self.previous);
    }
}
