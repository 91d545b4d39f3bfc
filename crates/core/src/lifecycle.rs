//! Lifecycle command execution
//! 
//! This module will handle execution of lifecycle commands like postCreateCommand,
//! postStartCommand, etc.

/// Placeholder for lifecycle execution
pub struct Lifecycle;

impl Lifecycle {
    /// Placeholder lifecycle command runner
    pub fn run_command() -> anyhow::Result<()> {
        Ok(())
    }
}