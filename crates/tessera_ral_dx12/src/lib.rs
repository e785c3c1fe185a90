//! DX12 backend of the render abstraction layer.
//! 
//! The backend translates the API-agnostic resource synchronization and resource binding model into the D3D12 model:
//! - barriers are translated into either legacy resource state transitions or enhanced barriers, depending on what the device supports.
//! - descriptor sets are mapped onto ranges in shader-visible descriptor heaps, pipeline layouts onto root signatures.
//! - indirect commands use command signatures, which are created on first use and cached by the device.
//! 
//! All calls into D3D12 itself go through the [`NativeDevice`] and [`NativeCommandList`] traits.

use tessera_logging::LogCategory;

mod dx12_types;
mod native;
mod utils;
mod barriers;
mod descriptors;
mod descriptor_set;
mod pipeline;
mod command_signature;
mod command_list;
mod memory;
mod device;

#[cfg(test)]
mod test_utils;

pub use dx12_types::*;
pub use native::*;
pub use barriers::*;
pub use descriptors::*;
pub use descriptor_set::*;
pub use pipeline::*;
pub use command_signature::*;
pub use command_list::*;
pub use memory::*;
pub use device::*;

const LOG_CAT : LogCategory = LogCategory::new("DX12 RAL");
