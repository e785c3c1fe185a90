use tessera_ral as ral;
use windows::Win32::Graphics::Direct3D12::*;

use crate::dx12_types::*;

/// Reference to an object owned by the native API (descriptor heap, root signature, command signature)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct NativeObject(pub u64);

impl NativeObject {
    pub const NULL: NativeObject = NativeObject(0);

    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Descriptor heap created by the native device
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NativeDescriptorHeap {
    pub heap:      NativeObject,
    pub cpu_start: CpuDescriptorHandle,
    /// Only available for shader-visible heaps
    pub gpu_start: Option<GpuDescriptorHandle>,
}

/// Pipeline bind point, selecting between the graphics and compute root signature slots of a command list
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BindPoint {
    Graphics,
    Compute,
}

/// D3D12 device the backend records to
/// 
/// Objects returned by the device are owned by the caller, and are given back using `release`.
pub trait NativeDevice: Send + Sync {
    /// Create a descriptor heap
    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> ral::Result<NativeDescriptorHeap>;

    /// Get the size of a single descriptor of the given heap type
    fn descriptor_handle_increment_size(&self, heap_type: D3D12_DESCRIPTOR_HEAP_TYPE) -> u32;

    /// Serialize a versioned root signature and create a root signature from it
    fn create_root_signature(&self, desc: &RootSignatureDesc) -> ral::Result<NativeObject>;

    /// Create a command signature, a root signature is only required when the arguments change root arguments
    fn create_command_signature(&self, desc: &CommandSignatureDesc, root_signature: Option<NativeObject>) -> ral::Result<NativeObject>;

    /// Copy `num_descriptors` contiguous descriptors of the given heap type
    fn copy_descriptors_simple(&self, num_descriptors: u32, dst_start: CpuDescriptorHandle, src_start: CpuDescriptorHandle, heap_type: D3D12_DESCRIPTOR_HEAP_TYPE);

    /// Release an object created by this device
    fn release(&self, object: NativeObject);
}

/// D3D12 graphics command list
pub trait NativeCommandList: Send {
    /// Record legacy resource barriers
    fn resource_barrier(&mut self, barriers: &[ResourceBarrier]);

    /// Record enhanced barrier groups
    fn barrier(&mut self, groups: &[BarrierGroup]);

    /// Bind the shader-visible descriptor heaps
    fn set_descriptor_heaps(&mut self, heaps: &[NativeObject]);

    fn set_root_signature(&mut self, bind_point: BindPoint, root_signature: NativeObject);

    fn set_root_descriptor_table(&mut self, bind_point: BindPoint, root_parameter_index: u32, base_descriptor: GpuDescriptorHandle);

    fn set_root_32bit_constants(&mut self, bind_point: BindPoint, root_parameter_index: u32, values: &[u32], dest_offset_in_32bit_values: u32);

    fn set_root_constant_buffer_view(&mut self, bind_point: BindPoint, root_parameter_index: u32, buffer_location: u64);

    fn execute_indirect(&mut self, command_signature: NativeObject, max_command_count: u32, argument_buffer: ral::ResourceHandle, argument_buffer_offset: u64, count_buffer: Option<(ral::ResourceHandle, u64)>);
}
