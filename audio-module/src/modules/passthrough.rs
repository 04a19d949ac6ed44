use crate::block::AudioBlockMut;
use crate::data::AudioData;
use crate::error::{ModuleError, Result};
use crate::module::{AudioModule, ModuleDescription, ModuleType};

/// In-out module that copies every input frame to its output unchanged.
#[derive(Debug, Default)]
pub struct Passthrough;

impl AudioModule for Passthrough {
    type Config = ();

    const DESCRIPTION: ModuleDescription = ModuleDescription {
        name: "passthrough",
        module_type: ModuleType::InOut,
    };

    fn data_process(&mut self, input: Option<&AudioData>, output: Option<&mut AudioData<AudioBlockMut>>) -> Result<()> {
        let (Some(input), Some(output)) = (input, output) else {
            return Err(ModuleError::InvalidParameter);
        };
        let bytes = input.bytes();
        if bytes.len() > output.capacity() {
            return Err(ModuleError::InvalidParameter);
        }
        output.data[..bytes.len()].copy_from_slice(bytes);
        output.data_size = bytes.len();
        output.meta = input.meta;
        Ok(())
    }
}
