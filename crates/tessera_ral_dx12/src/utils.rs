use tessera_ral as ral;
use ral::{Access, CommandListType, SyncPoint, TextureLayout};
use windows::Win32::Graphics::Direct3D12::*;

use crate::dx12_types::*;

pub trait ToDx {
    type DxType;

    fn to_dx(&self) -> Self::DxType;
}

//==============================================================================================================================
// ENHANCED BARRIERS
//==============================================================================================================================

impl ToDx for Access {
    type DxType = D3D12_BARRIER_ACCESS;

    fn to_dx(&self) -> Self::DxType {
        if self.is_none() {
            return D3D12_BARRIER_ACCESS_NO_ACCESS;
        }
        if self.intersects(Access::MemoryRead | Access::MemoryWrite | Access::Present) {
            return D3D12_BARRIER_ACCESS_COMMON;
        }

        let mut flags = D3D12_BARRIER_ACCESS_COMMON;

        if self.contains(Access::ConstantBuffer) {
            flags |= D3D12_BARRIER_ACCESS_CONSTANT_BUFFER;
        }
        if self.intersects(Access::SampledRead | Access::StorageRead | Access::ShaderTableRead | Access::RenderTargetRead) {
            flags |= D3D12_BARRIER_ACCESS_SHADER_RESOURCE;
        }
        if self.contains(Access::VertexBuffer) {
            flags |= D3D12_BARRIER_ACCESS_VERTEX_BUFFER;
        }
        if self.contains(Access::IndexBuffer) {
            flags |= D3D12_BARRIER_ACCESS_INDEX_BUFFER;
        }
        if self.contains(Access::DepthStencilRead) {
            flags |= D3D12_BARRIER_ACCESS_DEPTH_STENCIL_READ;
        }
        if self.contains(Access::Indirect) {
            flags |= D3D12_BARRIER_ACCESS_INDIRECT_ARGUMENT;
        }
        if self.contains(Access::Conditional) {
            flags |= D3D12_BARRIER_ACCESS_PREDICATION;
        }
        if self.contains(Access::AccelerationStructureRead) {
            flags |= D3D12_BARRIER_ACCESS_RAYTRACING_ACCELERATION_STRUCTURE_READ;
        }
        if self.intersects(Access::CopyRead | Access::HostRead) {
            flags |= D3D12_BARRIER_ACCESS_COPY_SOURCE;
        }
        if self.contains(Access::ResolveRead) {
            flags |= D3D12_BARRIER_ACCESS_RESOLVE_SOURCE;
        }
        if self.contains(Access::ShadingRateRead) {
            flags |= D3D12_BARRIER_ACCESS_SHADING_RATE_SOURCE;
        }

        if self.contains(Access::StorageWrite) {
            flags |= D3D12_BARRIER_ACCESS_UNORDERED_ACCESS;
        }
        if self.contains(Access::RenderTargetWrite) {
            flags |= D3D12_BARRIER_ACCESS_RENDER_TARGET;
        }
        if self.contains(Access::DepthStencilWrite) {
            flags |= D3D12_BARRIER_ACCESS_DEPTH_STENCIL_WRITE;
        }
        if self.contains(Access::AccelerationStructureWrite) {
            flags |= D3D12_BARRIER_ACCESS_RAYTRACING_ACCELERATION_STRUCTURE_WRITE;
        }
        if self.intersects(Access::CopyWrite | Access::HostWrite) {
            flags |= D3D12_BARRIER_ACCESS_COPY_DEST;
        }
        if self.contains(Access::ResolveWrite) {
            flags |= D3D12_BARRIER_ACCESS_RESOLVE_DEST;
        }

        flags
    }
}

pub fn sync_point_to_dx(sync_point: SyncPoint, access: Access) -> D3D12_BARRIER_SYNC {
    if sync_point.is_none() {
        return D3D12_BARRIER_SYNC_NONE;
    }
    if sync_point.intersects(SyncPoint::Top | SyncPoint::Bottom | SyncPoint::All) {
        return D3D12_BARRIER_SYNC_ALL;
    }

    let mut barrier_sync = D3D12_BARRIER_SYNC_NONE;

    if sync_point.contains(SyncPoint::DrawIndirect) {
        barrier_sync |= D3D12_BARRIER_SYNC_EXECUTE_INDIRECT;
    }
    if sync_point.contains(SyncPoint::Graphics) {
        barrier_sync |= D3D12_BARRIER_SYNC_DRAW;
    }
    if sync_point.contains(SyncPoint::IndexInput) {
        barrier_sync |= D3D12_BARRIER_SYNC_INDEX_INPUT;
    }
    if sync_point.intersects(SyncPoint::VertexInput | SyncPoint::PreRaster) {
        barrier_sync |= D3D12_BARRIER_SYNC_VERTEX_SHADING;
    }
    if sync_point.intersects(SyncPoint::Pixel | SyncPoint::ShadingRate) {
        barrier_sync |= D3D12_BARRIER_SYNC_PIXEL_SHADING;
    }
    if sync_point.intersects(SyncPoint::PrePixelOps | SyncPoint::PostPixelOps) {
        barrier_sync |= D3D12_BARRIER_SYNC_DEPTH_STENCIL;
    }
    if sync_point.contains(SyncPoint::RenderTarget) {
        barrier_sync |= D3D12_BARRIER_SYNC_RENDER_TARGET;
    }
    if sync_point.contains(SyncPoint::Compute) {
        barrier_sync |= D3D12_BARRIER_SYNC_COMPUTE_SHADING;
    }
    if sync_point.intersects(SyncPoint::Host | SyncPoint::Copy) {
        barrier_sync |= D3D12_BARRIER_SYNC_COPY;
    }
    if sync_point.contains(SyncPoint::Resolve) {
        barrier_sync |= D3D12_BARRIER_SYNC_RESOLVE;
    }
    if sync_point.contains(SyncPoint::Clear) {
        if access.contains(Access::DepthStencilWrite) {
            barrier_sync |= D3D12_BARRIER_SYNC_DEPTH_STENCIL;
        }
        if access.contains(Access::RenderTargetWrite) {
            barrier_sync |= D3D12_BARRIER_SYNC_RENDER_TARGET;
        }
        if access.contains(Access::StorageWrite) {
            barrier_sync |= D3D12_BARRIER_SYNC_CLEAR_UNORDERED_ACCESS_VIEW;
        }
    }
    if sync_point.contains(SyncPoint::RayTracing) {
        barrier_sync |= D3D12_BARRIER_SYNC_RAYTRACING;
    }
    if sync_point.contains(SyncPoint::AccelerationStructureBuild) {
        barrier_sync |= D3D12_BARRIER_SYNC_BUILD_RAYTRACING_ACCELERATION_STRUCTURE;
    }
    if sync_point.contains(SyncPoint::AccelerationStructureCopy) {
        barrier_sync |= D3D12_BARRIER_SYNC_COPY_RAYTRACING_ACCELERATION_STRUCTURE;
    }
    if sync_point.contains(SyncPoint::AccelerationStructureQuery) {
        barrier_sync |= D3D12_BARRIER_SYNC_EMIT_RAYTRACING_ACCELERATION_STRUCTURE_POSTBUILD_INFO;
    }
    if sync_point.contains(SyncPoint::Conditional) {
        barrier_sync |= D3D12_BARRIER_SYNC_PREDICATION;
    }

    barrier_sync
}

pub fn texture_layout_to_dx(layout: TextureLayout, list_type: CommandListType) -> D3D12_BARRIER_LAYOUT {
    // Returns the queue specific layout for direct and compute queues, and the generic layout for any other queue
    let queue_specific = |direct, compute, generic| match list_type {
        CommandListType::Graphics |
        CommandListType::Bundle   => direct,
        CommandListType::Compute  => compute,
        CommandListType::Copy     => generic,
    };

    match layout {
        TextureLayout::Undefined            => D3D12_BARRIER_LAYOUT_UNDEFINED,
        TextureLayout::Preinitialized       => D3D12_BARRIER_LAYOUT_COMMON,
        TextureLayout::Common               => queue_specific(D3D12_BARRIER_LAYOUT_DIRECT_QUEUE_COMMON, D3D12_BARRIER_LAYOUT_COMPUTE_QUEUE_COMMON, D3D12_BARRIER_LAYOUT_COMMON),
        TextureLayout::ReadOnly             => queue_specific(D3D12_BARRIER_LAYOUT_DIRECT_QUEUE_GENERIC_READ, D3D12_BARRIER_LAYOUT_COMPUTE_QUEUE_GENERIC_READ, D3D12_BARRIER_LAYOUT_GENERIC_READ),
        TextureLayout::ShaderRead           => queue_specific(D3D12_BARRIER_LAYOUT_DIRECT_QUEUE_SHADER_RESOURCE, D3D12_BARRIER_LAYOUT_COMPUTE_QUEUE_SHADER_RESOURCE, D3D12_BARRIER_LAYOUT_SHADER_RESOURCE),
        TextureLayout::ShaderWrite          => queue_specific(D3D12_BARRIER_LAYOUT_DIRECT_QUEUE_UNORDERED_ACCESS, D3D12_BARRIER_LAYOUT_COMPUTE_QUEUE_UNORDERED_ACCESS, D3D12_BARRIER_LAYOUT_UNORDERED_ACCESS),
        TextureLayout::CopySrc              => queue_specific(D3D12_BARRIER_LAYOUT_DIRECT_QUEUE_COPY_SOURCE, D3D12_BARRIER_LAYOUT_COMPUTE_QUEUE_COPY_SOURCE, D3D12_BARRIER_LAYOUT_COPY_SOURCE),
        TextureLayout::CopyDst              => queue_specific(D3D12_BARRIER_LAYOUT_DIRECT_QUEUE_COPY_DEST, D3D12_BARRIER_LAYOUT_COMPUTE_QUEUE_COPY_DEST, D3D12_BARRIER_LAYOUT_COPY_DEST),
        TextureLayout::Attachment           |
        TextureLayout::RenderTarget         => D3D12_BARRIER_LAYOUT_RENDER_TARGET,
        TextureLayout::DepthStencil         |
        TextureLayout::DepthRoStencilRw     |
        TextureLayout::DepthRwStencilRo     |
        TextureLayout::Depth                |
        TextureLayout::Stencil              => D3D12_BARRIER_LAYOUT_DEPTH_STENCIL_WRITE,
        TextureLayout::DepthStencilReadOnly |
        TextureLayout::DepthReadOnly        |
        TextureLayout::StencilReadOnly      => D3D12_BARRIER_LAYOUT_DEPTH_STENCIL_READ,
        TextureLayout::ResolveSrc           => D3D12_BARRIER_LAYOUT_RESOLVE_SOURCE,
        TextureLayout::ResolveDst           => D3D12_BARRIER_LAYOUT_RESOLVE_DEST,
        TextureLayout::Present              => D3D12_BARRIER_LAYOUT_PRESENT,
        TextureLayout::ShadingRate          => D3D12_BARRIER_LAYOUT_SHADING_RATE_SOURCE,
    }
}

//==============================================================================================================================
// LEGACY BARRIERS
//==============================================================================================================================

/// Get the legacy resource state for an access at a given sync point
/// 
/// Each access bit maps onto a single resource state, with shader reads split up in pixel and non-pixel reads depending on the sync point.
pub fn access_to_resource_states(access: Access, sync_point: SyncPoint, layout: Option<TextureLayout>) -> D3D12_RESOURCE_STATES {
    if layout == Some(TextureLayout::Present) || access.contains(Access::Present) {
        return D3D12_RESOURCE_STATE_PRESENT;
    }
    if access.is_none() || access.contains(Access::MemoryWrite) {
        return D3D12_RESOURCE_STATE_COMMON;
    }
    if access.contains(Access::MemoryRead) {
        return D3D12_RESOURCE_STATE_GENERIC_READ;
    }

    const ACCESS_TO_STATE: [(Access, D3D12_RESOURCE_STATES); 17] = [
        (Access::VertexBuffer              , D3D12_RESOURCE_STATE_VERTEX_AND_CONSTANT_BUFFER),
        (Access::ConstantBuffer            , D3D12_RESOURCE_STATE_VERTEX_AND_CONSTANT_BUFFER),
        (Access::IndexBuffer               , D3D12_RESOURCE_STATE_INDEX_BUFFER),
        (Access::RenderTargetWrite         , D3D12_RESOURCE_STATE_RENDER_TARGET),
        (Access::StorageRead               , D3D12_RESOURCE_STATE_UNORDERED_ACCESS),
        (Access::StorageWrite              , D3D12_RESOURCE_STATE_UNORDERED_ACCESS),
        (Access::Indirect                  , D3D12_RESOURCE_STATE_INDIRECT_ARGUMENT),
        (Access::Conditional               , D3D12_RESOURCE_STATE_PREDICATION),
        (Access::CopyRead                  , D3D12_RESOURCE_STATE_COPY_SOURCE),
        (Access::CopyWrite                 , D3D12_RESOURCE_STATE_COPY_DEST),
        (Access::ResolveRead               , D3D12_RESOURCE_STATE_RESOLVE_SOURCE),
        (Access::ResolveWrite              , D3D12_RESOURCE_STATE_RESOLVE_DEST),
        (Access::AccelerationStructureRead , D3D12_RESOURCE_STATE_RAYTRACING_ACCELERATION_STRUCTURE),
        (Access::AccelerationStructureWrite, D3D12_RESOURCE_STATE_RAYTRACING_ACCELERATION_STRUCTURE),
        (Access::ShadingRateRead           , D3D12_RESOURCE_STATE_SHADING_RATE_SOURCE),
        (Access::HostRead                  , D3D12_RESOURCE_STATE_COPY_DEST),
        (Access::HostWrite                 , D3D12_RESOURCE_STATE_GENERIC_READ),
    ];

    let mut states = D3D12_RESOURCE_STATE_COMMON;
    for (bit, state) in ACCESS_TO_STATE {
        if access.contains(bit) {
            states |= state;
        }
    }

    // Depth write is exclusive, and already allows depth reads
    if access.contains(Access::DepthStencilWrite) {
        states |= D3D12_RESOURCE_STATE_DEPTH_WRITE;
    } else if access.contains(Access::DepthStencilRead) {
        states |= D3D12_RESOURCE_STATE_DEPTH_READ;
    }

    if access.intersects(Access::SampledRead | Access::ShaderTableRead | Access::RenderTargetRead) {
        states |= shader_resource_states(sync_point);
    }
    states
}

fn shader_resource_states(sync_point: SyncPoint) -> D3D12_RESOURCE_STATES {
    if sync_point.is_none() || sync_point.intersects(SyncPoint::Top | SyncPoint::Bottom | SyncPoint::All | SyncPoint::Graphics) {
        return D3D12_RESOURCE_STATE_ALL_SHADER_RESOURCE;
    }

    let mut states = D3D12_RESOURCE_STATE_COMMON;
    if sync_point.contains(SyncPoint::Pixel) {
        states |= D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE;
    }
    if sync_point.intersects(SyncPoint::PreRaster | SyncPoint::Compute | SyncPoint::RayTracing) {
        states |= D3D12_RESOURCE_STATE_NON_PIXEL_SHADER_RESOURCE;
    }
    if states == D3D12_RESOURCE_STATE_COMMON {
        states = D3D12_RESOURCE_STATE_ALL_SHADER_RESOURCE;
    }
    states
}

// D3D12CalcSubresource
pub const fn calculate_subresource(mip_slice: u32, array_slice: u32, plane_slice: u32, mip_levels: u32, array_size: u32) -> u32 {
    mip_slice + array_slice * mip_levels + plane_slice * mip_levels * array_size
}

//==============================================================================================================================
// BINDING
//==============================================================================================================================

impl ToDx for ral::ShaderTypeMask {
    type DxType = D3D12_SHADER_VISIBILITY;

    fn to_dx(&self) -> Self::DxType {
        if !self.is_single_bit_set() {
            return D3D12_SHADER_VISIBILITY_ALL;
        }

        if *self == ral::ShaderTypeMask::Vertex {
            D3D12_SHADER_VISIBILITY_VERTEX
        } else if *self == ral::ShaderTypeMask::Pixel {
            D3D12_SHADER_VISIBILITY_PIXEL
        } else if *self == ral::ShaderTypeMask::Task {
            D3D12_SHADER_VISIBILITY_AMPLIFICATION
        } else if *self == ral::ShaderTypeMask::Mesh {
            D3D12_SHADER_VISIBILITY_MESH
        } else {
            D3D12_SHADER_VISIBILITY_ALL
        }
    }
}

impl ToDx for ral::DescriptorType {
    type DxType = D3D12_DESCRIPTOR_RANGE_TYPE;

    fn to_dx(&self) -> Self::DxType {
        match self {
            ral::DescriptorType::Sampler                 => D3D12_DESCRIPTOR_RANGE_TYPE_SAMPLER,
            ral::DescriptorType::ConstantBuffer          => D3D12_DESCRIPTOR_RANGE_TYPE_CBV,
            ral::DescriptorType::Texture                 |
            ral::DescriptorType::Buffer                  |
            ral::DescriptorType::StructuredBuffer        |
            ral::DescriptorType::AccelerationStructure   => D3D12_DESCRIPTOR_RANGE_TYPE_SRV,
            ral::DescriptorType::StorageTexture          |
            ral::DescriptorType::StorageBuffer           |
            ral::DescriptorType::StorageStructuredBuffer => D3D12_DESCRIPTOR_RANGE_TYPE_UAV,
        }
    }
}

/// Get the type of heap descriptors of the given type live in
pub fn descriptor_heap_type(descriptor_type: ral::DescriptorType) -> D3D12_DESCRIPTOR_HEAP_TYPE {
    if descriptor_type.is_sampler() {
        D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER
    } else {
        D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV
    }
}
