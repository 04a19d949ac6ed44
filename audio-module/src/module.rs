use crate::block::AudioBlockMut;
use crate::data::AudioData;
use crate::error::Result;

/// Direction of data through a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleType {
    #[default]
    Undefined,
    /// Produces frames from a private source; has a TX side only.
    Input,
    /// Consumes frames; has an RX side only.
    Output,
    /// Transforms frames; has both sides.
    InOut,
}

impl ModuleType {
    /// Whether the module produces frames (may be the `from` of a connection).
    pub fn produces(self) -> bool {
        matches!(self, ModuleType::Input | ModuleType::InOut)
    }

    /// Whether the module consumes frames (may be the `to` of a connection).
    pub fn consumes(self) -> bool {
        matches!(self, ModuleType::Output | ModuleType::InOut)
    }
}

/// Lifecycle state of a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleState {
    #[default]
    Undefined,
    Configured,
    Running,
    Stopped,
}

/// Static per-module-type metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDescription {
    /// Base name of the module type.
    pub name: &'static str,
    pub module_type: ModuleType,
}

/// Core trait for all audio modules.
///
/// The runtime owns one instance per handle and calls into it from two
/// places: lifecycle entry points run on the caller's thread, and
/// `data_process` runs on the handle's worker thread. The two never run
/// concurrently. Every entry point except `data_process` defaults to a no-op.
pub trait AudioModule: Send + 'static {
    /// Module-specific configuration.
    type Config: Send;

    /// Name and direction of this module type.
    const DESCRIPTION: ModuleDescription;

    /// Called once by `open`, before the first `configuration_set`.
    fn open(&mut self, _config: &Self::Config) -> Result<()> {
        Ok(())
    }

    /// Called by `close` before the worker is torn down.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Apply (or re-apply) a configuration.
    fn configuration_set(&mut self, _config: &Self::Config) -> Result<()> {
        Ok(())
    }

    /// Write the active configuration into `config`.
    fn configuration_get(&self, _config: &mut Self::Config) -> Result<()> {
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    /// Process one frame.
    ///
    /// `input` is `None` for Input modules, `output` is `None` for Output
    /// modules. The output region is a fresh slab block whose `data_size`
    /// is the block size on entry; the module must set `data_size` and
    /// `meta` to describe what it wrote.
    ///
    /// An Input module that has nothing to emit this cycle returns
    /// [`ModuleError::Timeout`](crate::ModuleError::Timeout); the frame is
    /// dropped without being counted as an error.
    fn data_process(
        &mut self,
        input: Option<&AudioData>,
        output: Option<&mut AudioData<AudioBlockMut>>,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_roles() {
        assert!(ModuleType::Input.produces());
        assert!(!ModuleType::Input.consumes());
        assert!(ModuleType::Output.consumes());
        assert!(!ModuleType::Output.produces());
        assert!(ModuleType::InOut.produces() && ModuleType::InOut.consumes());
        assert!(!ModuleType::Undefined.produces() && !ModuleType::Undefined.consumes());
    }
}
