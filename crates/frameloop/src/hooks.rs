//! Ordered before/after-render callback collections.
//!
//! Hooks run in insertion order. A callback can retire itself by returning
//! [`HookSignal::Remove`]; the removal takes effect once the current run
//! finishes. A callback error aborts the run, surfaces as a single
//! hook-callback fault carrying the hook's stable id, and leaves the list
//! intact, so the next frame runs the remaining callbacks again.

use anyhow::Result;
use preprocessor::SandboxError;

use crate::clock::ClockState;

/// What a hook wants to happen to itself after running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSignal {
    Keep,
    Remove,
}

/// Stable handle for removing a hook externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookId(u64);

type HookFn = Box<dyn FnMut(&ClockState) -> Result<HookSignal>>;

struct HookEntry {
    id: u64,
    callback: HookFn,
}

/// An ordered set of render callbacks.
#[derive(Default)]
pub struct Hooks {
    entries: Vec<HookEntry>,
    next_id: u64,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a callback and returns its removal handle.
    pub fn add<F>(&mut self, callback: F) -> HookId
    where
        F: FnMut(&ClockState) -> Result<HookSignal> + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(HookEntry {
            id,
            callback: Box::new(callback),
        });
        HookId(id)
    }

    /// Removes a hook by handle; `false` when it is already gone.
    pub fn remove(&mut self, id: HookId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id.0);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Empties the collection.
    pub fn destroy(&mut self) {
        self.entries.clear();
    }

    /// Invokes every hook in insertion order. The first callback error stops
    /// the run; callbacks that already asked for removal are still dropped.
    pub fn run(&mut self, state: &ClockState) -> Result<(), SandboxError> {
        let mut retired: Vec<u64> = Vec::new();
        let mut failure: Option<SandboxError> = None;

        for entry in self.entries.iter_mut() {
            match (entry.callback)(state) {
                Ok(HookSignal::Keep) => {}
                Ok(HookSignal::Remove) => retired.push(entry.id),
                Err(err) => {
                    failure = Some(SandboxError::HookFailed {
                        id: entry.id,
                        message: format!("{err:#}"),
                    });
                    break;
                }
            }
        }

        self.entries.retain(|entry| !retired.contains(&entry.id));
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
