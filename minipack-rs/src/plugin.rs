//! Plugins extend a run by tapping lifecycle hooks when installed.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use crate::compiler::Compiler;
use crate::error::{PackError, Result};
use crate::hooks::Phase;

/// A value that attaches callbacks to a compiler's hooks.
///
/// `install` is called once, while the compiler is being constructed and
/// before any run.
pub trait Plugin {
    fn name(&self) -> &str;

    fn install(&self, compiler: &mut Compiler);
}

/// Logs every phase boundary.
#[derive(Debug, Default)]
pub struct PhaseLogPlugin;

impl Plugin for PhaseLogPlugin {
    fn name(&self) -> &str {
        "phase-log"
    }

    fn install(&self, compiler: &mut Compiler) {
        let hooks = &mut compiler.hooks;
        hooks.run.tap(self.name(), |status: &str| {
            log::info!("[{}] {}", Phase::Run, status);
            Ok(())
        });
        for phase in Phase::ALL {
            if let Some(hook) = hooks.unit_hook_mut(phase) {
                hook.tap(self.name(), move |_| {
                    log::info!("[{}]", phase);
                    Ok(())
                });
            }
        }
        hooks.done.tap(self.name(), |status: &str| {
            log::info!("[{}] {}", Phase::Done, status);
            Ok(())
        });
    }
}

/// Logs how long a run took.
#[derive(Debug, Default)]
pub struct TimingPlugin;

impl Plugin for TimingPlugin {
    fn name(&self) -> &str {
        "timing"
    }

    fn install(&self, compiler: &mut Compiler) {
        let started = Rc::new(Cell::new(None::<Instant>));
        let start = started.clone();
        compiler.hooks.run.tap(self.name(), move |_| {
            start.set(Some(Instant::now()));
            Ok(())
        });
        compiler.hooks.done.tap(self.name(), move |_| {
            if let Some(start) = started.get() {
                log::info!("Bundle finished in {:.2?}", start.elapsed());
            }
            Ok(())
        });
    }
}

/// Names accepted in the configuration's `plugins` list.
pub const BUILTIN_PLUGINS: &[&str] = &["phase-log", "timing"];

/// Resolves a plugin named in the configuration.
pub fn builtin_plugin(name: &str) -> Result<Box<dyn Plugin>> {
    match name {
        "phase-log" => Ok(Box::new(PhaseLogPlugin)),
        "timing" => Ok(Box::new(TimingPlugin)),
        other => Err(PackError::Config(format!(
            "unknown plugin '{}' (available: {})",
            other,
            BUILTIN_PLUGINS.join(", ")
        ))),
    }
}
