//==============================================================================================================================
// PIPELINE LAYOUT LIMITS
//==============================================================================================================================

/// Maximum size of a pipeline layout, in 32-bit values.
/// 
/// Descriptor tables cost 1 value, inline descriptors cost 2 values, and constants cost 1 value per 32-bit value.
pub const MAX_PIPELINE_LAYOUT_DWORDS: u32 = 64;
/// Cost of a descriptor table, in 32-bit values.
pub const DESCRIPTOR_TABLE_DWORD_COST: u32 = 1;
/// Cost of an inline (root) descriptor, in 32-bit values.
pub const INLINE_DESCRIPTOR_DWORD_COST: u32 = 2;
/// Maximum number of descriptor sets in a pipeline layout.
pub const MAX_DESCRIPTOR_SETS: usize = 8;
/// Maximum size of all push constants in a pipeline layout.
pub const MAX_PUSH_CONSTANT_SIZE: u32 = 256;
/// Push constant sizes need to be a multiple of this value.
pub const PUSH_CONSTANT_SIZE_ALIGN: u32 = 4;

//==============================================================================================================================
// DESCRIPTOR LIMITS
//==============================================================================================================================

/// Default number of descriptors in a single descriptor heap created for descriptor views.
pub const DEFAULT_DESCRIPTOR_HEAP_BATCH_SIZE: u32 = 1024;
/// Maximum number of descriptor heaps created for descriptor views, heaps are indexed using 16-bits.
pub const MAX_DESCRIPTOR_HEAP_NUM: u32 = 1 << 16;

//==============================================================================================================================
// INDIRECT LIMITS
//==============================================================================================================================

/// Size of the arguments for an indirect draw.
pub const DRAW_INDIRECT_ARGS_SIZE: u32 = 16;
/// Size of the arguments for an indirect indexed draw.
pub const DRAW_INDEXED_INDIRECT_ARGS_SIZE: u32 = 20;
/// Size of the arguments for an indirect dispatch.
pub const DISPATCH_INDIRECT_ARGS_SIZE: u32 = 12;
/// Size of the arguments for an indirect mesh dispatch.
pub const DISPATCH_MESH_INDIRECT_ARGS_SIZE: u32 = 12;
