//! Lifecycle hooks fired by the compiler around each stage of a run.
//!
//! Every phase owns an ordered list of named callbacks. Plugins attach
//! callbacks with [`SyncHook::tap`] when they are installed, and the compiler
//! invokes them synchronously, in registration order, at the phase boundary.

use std::fmt;

use crate::error::{PackError, Result};

/// Status passed to `run` callbacks.
pub const RUN_STATUS: &str = "pack run";
/// Status passed to `done` callbacks.
pub const DONE_STATUS: &str = "pack done";

/// The named points of a run where callbacks execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Run,
    BeforeEntryOptions,
    AfterEntryOptions,
    BeforeCompile,
    AfterCompile,
    BeforeEmitFile,
    AfterEmitFile,
    Done,
}

impl Phase {
    /// All phases in the order a successful run fires them.
    pub const ALL: [Phase; 8] = [
        Phase::Run,
        Phase::BeforeEntryOptions,
        Phase::AfterEntryOptions,
        Phase::BeforeCompile,
        Phase::AfterCompile,
        Phase::BeforeEmitFile,
        Phase::AfterEmitFile,
        Phase::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Run => "run",
            Phase::BeforeEntryOptions => "beforeEntryOptions",
            Phase::AfterEntryOptions => "afterEntryOptions",
            Phase::BeforeCompile => "beforeCompile",
            Phase::AfterCompile => "afterCompile",
            Phase::BeforeEmitFile => "beforeEmitFile",
            Phase::AfterEmitFile => "afterEmitFile",
            Phase::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback attached to a hook whose phase passes an argument of type `A`.
pub type Callback<A> = Box<dyn FnMut(&A) -> anyhow::Result<()>>;

struct Tap<A: ?Sized> {
    name: String,
    callback: Callback<A>,
}

/// An ordered list of callbacks for one phase.
pub struct SyncHook<A: ?Sized> {
    phase: Phase,
    taps: Vec<Tap<A>>,
}

impl<A: ?Sized> SyncHook<A> {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            taps: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Appends a callback; callbacks run in the order they were tapped.
    pub fn tap<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: FnMut(&A) -> anyhow::Result<()> + 'static,
    {
        self.taps.push(Tap {
            name: name.into(),
            callback: Box::new(callback),
        });
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Invokes every callback with `arg`. The first failure stops the phase.
    pub fn call(&mut self, arg: &A) -> Result<()> {
        let phase = self.phase;
        for tap in self.taps.iter_mut() {
            log::trace!("Calling {} hook '{}'", phase, tap.name);
            (tap.callback)(arg).map_err(|source| PackError::Hook {
                phase,
                name: tap.name.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl<A: ?Sized> fmt::Debug for SyncHook<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncHook")
            .field("phase", &self.phase)
            .field("taps", &self.taps.iter().map(|t| &t.name).collect::<Vec<_>>())
            .finish()
    }
}

/// The hook slots of a compiler.
#[derive(Debug)]
pub struct LifecycleHooks {
    pub run: SyncHook<str>,
    pub before_entry_options: SyncHook<()>,
    pub after_entry_options: SyncHook<()>,
    pub before_compile: SyncHook<()>,
    pub after_compile: SyncHook<()>,
    pub before_emit_file: SyncHook<()>,
    pub after_emit_file: SyncHook<()>,
    pub done: SyncHook<str>,
}

impl Default for LifecycleHooks {
    fn default() -> Self {
        Self {
            run: SyncHook::new(Phase::Run),
            before_entry_options: SyncHook::new(Phase::BeforeEntryOptions),
            after_entry_options: SyncHook::new(Phase::AfterEntryOptions),
            before_compile: SyncHook::new(Phase::BeforeCompile),
            after_compile: SyncHook::new(Phase::AfterCompile),
            before_emit_file: SyncHook::new(Phase::BeforeEmitFile),
            after_emit_file: SyncHook::new(Phase::AfterEmitFile),
            done: SyncHook::new(Phase::Done),
        }
    }
}

impl LifecycleHooks {
    /// Returns the argument-less hook for `phase`, or `None` for the
    /// status-carrying `run` and `done` phases.
    pub fn unit_hook_mut(&mut self, phase: Phase) -> Option<&mut SyncHook<()>> {
        match phase {
            Phase::BeforeEntryOptions => Some(&mut self.before_entry_options),
            Phase::AfterEntryOptions => Some(&mut self.after_entry_options),
            Phase::BeforeCompile => Some(&mut self.before_compile),
            Phase::AfterCompile => Some(&mut self.after_compile),
            Phase::BeforeEmitFile => Some(&mut self.before_emit_file),
            Phase::AfterEmitFile => Some(&mut self.after_emit_file),
            Phase::Run | Phase::Done => None,
        }
    }

    /// Fires an argument-less phase.
    pub fn call_unit(&mut self, phase: Phase) -> Result<()> {
        match self.unit_hook_mut(phase) {
            Some(hook) => hook.call(&()),
            None => Ok(()),
        }
    }
}
