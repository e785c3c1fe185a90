//! Backend-owned descriptions passed to the native API.
//! 
//! D3D12 enumerations and flags come straight from `windows`, the aggregate descriptions own their data instead of pointing into caller memory.

use tessera_ral as ral;
use windows::Win32::Graphics::Direct3D12::*;

//==============================================================================================================================
// LEGACY BARRIERS
//==============================================================================================================================

/// Transition of a (sub)resource between 2 states
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ResourceTransitionBarrier {
    pub resource:     ral::ResourceHandle,
    pub subresource:  u32,
    pub state_before: D3D12_RESOURCE_STATES,
    pub state_after:  D3D12_RESOURCE_STATES,
}

/// Legacy resource barrier
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ResourceBarrier {
    /// State transition
    Transition(ResourceTransitionBarrier),
    /// Read/write hazard on unordered access, a null resource applies to all unordered accesses
    Uav(ral::ResourceHandle),
}

//==============================================================================================================================
// ENHANCED BARRIERS
//==============================================================================================================================

/// Barrier subresource range, `index_or_first_mip_level == D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES` with `num_mip_levels == 0` addresses all subresources
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BarrierSubresourceRange {
    pub index_or_first_mip_level: u32,
    pub num_mip_levels:           u32,
    pub first_array_slice:        u32,
    pub num_array_slices:         u32,
    pub first_plane:              u32,
    pub num_planes:               u32,
}

impl BarrierSubresourceRange {
    pub const ALL: BarrierSubresourceRange = BarrierSubresourceRange {
        index_or_first_mip_level: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
        num_mip_levels: 0,
        first_array_slice: 0,
        num_array_slices: 0,
        first_plane: 0,
        num_planes: 0,
    };
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GlobalBarrier {
    pub sync_before:   D3D12_BARRIER_SYNC,
    pub sync_after:    D3D12_BARRIER_SYNC,
    pub access_before: D3D12_BARRIER_ACCESS,
    pub access_after:  D3D12_BARRIER_ACCESS,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BufferBarrier {
    pub sync_before:   D3D12_BARRIER_SYNC,
    pub sync_after:    D3D12_BARRIER_SYNC,
    pub access_before: D3D12_BARRIER_ACCESS,
    pub access_after:  D3D12_BARRIER_ACCESS,
    pub resource:      ral::ResourceHandle,
    pub offset:        u64,
    pub size:          u64,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TextureBarrier {
    pub sync_before:   D3D12_BARRIER_SYNC,
    pub sync_after:    D3D12_BARRIER_SYNC,
    pub access_before: D3D12_BARRIER_ACCESS,
    pub access_after:  D3D12_BARRIER_ACCESS,
    pub layout_before: D3D12_BARRIER_LAYOUT,
    pub layout_after:  D3D12_BARRIER_LAYOUT,
    pub resource:      ral::ResourceHandle,
    pub subresources:  BarrierSubresourceRange,
    pub flags:         D3D12_TEXTURE_BARRIER_FLAGS,
}

/// Group of barriers of the same kind, submitted in a single call
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum BarrierGroup {
    Global(Vec<GlobalBarrier>),
    Buffer(Vec<BufferBarrier>),
    Texture(Vec<TextureBarrier>),
}

impl BarrierGroup {
    pub fn len(&self) -> usize {
        match self {
            BarrierGroup::Global(barriers)  => barriers.len(),
            BarrierGroup::Buffer(barriers)  => barriers.len(),
            BarrierGroup::Texture(barriers) => barriers.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//==============================================================================================================================
// DESCRIPTOR HEAPS
//==============================================================================================================================

/// Number of descriptor heap types, for sizing per-type arrays
pub const DESCRIPTOR_HEAP_TYPE_COUNT: usize = D3D12_DESCRIPTOR_HEAP_TYPE_NUM_TYPES.0 as usize;

pub trait DescriptorHeapTypeExt {
    /// Index of the heap type, for use in per-type arrays
    fn index(self) -> usize;

    /// Only resource and sampler heaps can be made visible to shaders
    fn can_be_shader_visible(self) -> bool;
}

impl DescriptorHeapTypeExt for D3D12_DESCRIPTOR_HEAP_TYPE {
    fn index(self) -> usize {
        self.0 as usize
    }

    fn can_be_shader_visible(self) -> bool {
        self == D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV || self == D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct CpuDescriptorHandle {
    pub ptr: usize,
}

impl CpuDescriptorHandle {
    pub const fn offset(self, index: u32, increment: u32) -> Self {
        Self { ptr: self.ptr + index as usize * increment as usize }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug)]
pub struct GpuDescriptorHandle {
    pub ptr: u64,
}

impl GpuDescriptorHandle {
    pub const fn offset(self, index: u32, increment: u32) -> Self {
        Self { ptr: self.ptr + index as u64 * increment as u64 }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DescriptorHeapDesc {
    pub heap_type:       D3D12_DESCRIPTOR_HEAP_TYPE,
    pub num_descriptors: u32,
    pub shader_visible:  bool,
}

//==============================================================================================================================
// ROOT SIGNATURES
//==============================================================================================================================

/// Descriptor range in a descriptor table
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DescriptorRange1 {
    pub range_type:                         D3D12_DESCRIPTOR_RANGE_TYPE,
    pub num_descriptors:                    u32,
    pub base_shader_register:               u32,
    pub register_space:                     u32,
    pub flags:                              D3D12_DESCRIPTOR_RANGE_FLAGS,
    pub offset_in_descriptors_from_table_start: u32,
}

/// Descriptor bound directly in the root signature
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RootDescriptor1 {
    pub shader_register: u32,
    pub register_space:  u32,
    pub flags:           D3D12_ROOT_DESCRIPTOR_FLAGS,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RootConstants {
    pub shader_register:  u32,
    pub register_space:   u32,
    pub num_32bit_values: u32,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RootParameterKind {
    DescriptorTable(Vec<DescriptorRange1>),
    Constants(RootConstants),
    Cbv(RootDescriptor1),
    Srv(RootDescriptor1),
    Uav(RootDescriptor1),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RootParameter1 {
    pub kind:       RootParameterKind,
    pub visibility: D3D12_SHADER_VISIBILITY,
}

impl RootParameter1 {
    pub fn parameter_type(&self) -> D3D12_ROOT_PARAMETER_TYPE {
        match self.kind {
            RootParameterKind::DescriptorTable(_) => D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
            RootParameterKind::Constants(_)       => D3D12_ROOT_PARAMETER_TYPE_32BIT_CONSTANTS,
            RootParameterKind::Cbv(_)             => D3D12_ROOT_PARAMETER_TYPE_CBV,
            RootParameterKind::Srv(_)             => D3D12_ROOT_PARAMETER_TYPE_SRV,
            RootParameterKind::Uav(_)             => D3D12_ROOT_PARAMETER_TYPE_UAV,
        }
    }

    /// Size of the parameter in the root signature, in 32-bit values
    pub fn dword_cost(&self) -> u32 {
        match &self.kind {
            RootParameterKind::DescriptorTable(_) => ral::constants::DESCRIPTOR_TABLE_DWORD_COST,
            RootParameterKind::Constants(constants) => constants.num_32bit_values,
            RootParameterKind::Cbv(_) |
            RootParameterKind::Srv(_) |
            RootParameterKind::Uav(_)             => ral::constants::INLINE_DESCRIPTOR_DWORD_COST,
        }
    }
}

/// Versioned root signature description, version 1.0 signatures ignore all range and descriptor flags
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RootSignatureDesc {
    pub version:    D3D_ROOT_SIGNATURE_VERSION,
    pub parameters: Vec<RootParameter1>,
    pub flags:      D3D12_ROOT_SIGNATURE_FLAGS,
}

//==============================================================================================================================
// COMMAND SIGNATURES
//==============================================================================================================================

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IndirectArgumentDesc {
    Draw,
    DrawIndexed,
    Dispatch,
    DispatchMesh,
    Constant {
        root_parameter_index:        u32,
        dest_offset_in_32bit_values: u32,
        num_32bit_values_to_set:     u32,
    },
}

impl IndirectArgumentDesc {
    pub fn argument_type(&self) -> D3D12_INDIRECT_ARGUMENT_TYPE {
        match self {
            IndirectArgumentDesc::Draw            => D3D12_INDIRECT_ARGUMENT_TYPE_DRAW,
            IndirectArgumentDesc::DrawIndexed     => D3D12_INDIRECT_ARGUMENT_TYPE_DRAW_INDEXED,
            IndirectArgumentDesc::Dispatch        => D3D12_INDIRECT_ARGUMENT_TYPE_DISPATCH,
            IndirectArgumentDesc::DispatchMesh    => D3D12_INDIRECT_ARGUMENT_TYPE_DISPATCH_MESH,
            IndirectArgumentDesc::Constant { .. } => D3D12_INDIRECT_ARGUMENT_TYPE_CONSTANT,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CommandSignatureDesc {
    pub byte_stride: u32,
    pub arguments:   Vec<IndirectArgumentDesc>,
    pub node_mask:   u32,
}
