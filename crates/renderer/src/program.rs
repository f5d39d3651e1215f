use std::fmt::Display;

use tracing::{info, warn};

/// Result of offering a freshly compiled program to a [`ProgramSlot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The new program is active; the previous one has been dropped.
    Swapped { generation: u64 },
    /// Compilation failed and the previous program (if any) stays bound.
    Kept { reason: String },
}

impl ReloadOutcome {
    pub fn is_swapped(&self) -> bool {
        matches!(self, ReloadOutcome::Swapped { .. })
    }
}

/// Owns the active shader program.
///
/// A program is only replaced by a successfully built one, so a broken edit
/// never takes down a working preview. Each swap bumps the generation.
#[derive(Debug)]
pub struct ProgramSlot<P> {
    active: Option<P>,
    generation: u64,
}

impl<P> Default for ProgramSlot<P> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<P> ProgramSlot<P> {
    pub fn empty() -> Self {
        Self {
            active: None,
            generation: 0,
        }
    }

    pub fn active(&self) -> Option<&P> {
        self.active.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn install<E: Display>(&mut self, candidate: Result<P, E>) -> ReloadOutcome {
        match candidate {
            Ok(program) => {
                let replaced = self.active.replace(program).is_some();
                self.generation += 1;
                info!(
                    generation = self.generation,
                    replaced, "activated shader program"
                );
                ReloadOutcome::Swapped {
                    generation: self.generation,
                }
            }
            Err(err) => {
                let reason = err.to_string();
                warn!(
                    generation = self.generation,
                    has_program = self.active.is_some(),
                    "shader compile failed; keeping current program\n{reason}"
                );
                ReloadOutcome::Kept { reason }
            }
        }
    }
}
