use tessera_common_macros::EnumDisplay;
use tessera_logging::log_warning;
use tessera_ral as ral;
use ral::{Access, CommandListType, TextureAspect, TextureLayout};
use windows::Win32::Graphics::Direct3D12::*;

use crate::{
    dx12_types::*,
    utils::*,
    DeviceCaps, NativeCommandList, LOG_CAT,
};

/// Synchronization model barriers are translated to
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumDisplay)]
pub enum SyncModel {
    /// Whole-resource state transitions and UAV barriers
    #[display("legacy")]
    Legacy,
    /// Fine-grained sync/access/layout barriers
    #[display("enhanced")]
    Enhanced,
}

impl SyncModel {
    /// Select the sync model for a device, enhanced barriers are only used when they are both requested and supported
    pub fn select(enhanced_requested: bool, caps: &DeviceCaps) -> SyncModel {
        if !enhanced_requested {
            return SyncModel::Legacy;
        }
        if !caps.enhanced_barriers {
            log_warning!(LOG_CAT, "Enhanced barriers were requested, but are not supported by the device, falling back to legacy resource barriers");
            return SyncModel::Legacy;
        }
        SyncModel::Enhanced
    }
}

/// Native barriers, ready to be recorded
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum NativeBarriers {
    Legacy(Vec<ResourceBarrier>),
    Enhanced(Vec<BarrierGroup>),
}

impl NativeBarriers {
    pub fn is_empty(&self) -> bool {
        match self {
            NativeBarriers::Legacy(barriers) => barriers.is_empty(),
            NativeBarriers::Enhanced(groups) => groups.is_empty(),
        }
    }

    /// Record the barriers, nothing is recorded when there are no barriers
    pub fn record(&self, list: &mut dyn NativeCommandList) {
        match self {
            NativeBarriers::Legacy(barriers) if !barriers.is_empty() => list.resource_barrier(barriers),
            NativeBarriers::Enhanced(groups) if !groups.is_empty()   => list.barrier(groups),
            _ => {},
        }
    }
}

/// Translates API-agnostic barriers into native barriers
/// 
/// The translator only maps states, the barriers are expected to be validated beforehand.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ResourceStateTranslator {
    sync_model: SyncModel,
    list_type:  CommandListType,
}

impl ResourceStateTranslator {
    pub fn new(sync_model: SyncModel, list_type: CommandListType) -> Self {
        Self { sync_model, list_type }
    }

    pub fn sync_model(&self) -> SyncModel {
        self.sync_model
    }

    /// Translate a group of barriers
    /// 
    /// Enhanced barriers are batched per kind, with an empty kind not producing a group.
    /// Legacy barriers are all returned in a single list.
    pub fn translate_group(&self, group: &ral::BarrierGroupDesc) -> NativeBarriers {
        match self.sync_model {
            SyncModel::Legacy => {
                let mut barriers = Vec::with_capacity(group.len());
                for barrier in group.global {
                    barriers.extend(legacy_global_barrier(barrier));
                }
                for barrier in group.buffer {
                    barriers.extend(legacy_buffer_barrier(barrier));
                }
                for barrier in group.texture {
                    legacy_texture_barriers(barrier, &mut barriers);
                }
                NativeBarriers::Legacy(barriers)
            },
            SyncModel::Enhanced => {
                let mut groups = Vec::with_capacity(3);
                if !group.global.is_empty() {
                    groups.push(BarrierGroup::Global(group.global.iter().map(enhanced_global_barrier).collect()));
                }
                if !group.buffer.is_empty() {
                    groups.push(BarrierGroup::Buffer(group.buffer.iter().map(enhanced_buffer_barrier).collect()));
                }
                if !group.texture.is_empty() {
                    groups.push(BarrierGroup::Texture(group.texture.iter().map(|barrier| enhanced_texture_barrier(barrier, self.list_type)).collect()));
                }
                NativeBarriers::Enhanced(groups)
            },
        }
    }
}

//==============================================================================================================================
// LEGACY
//==============================================================================================================================

/// Only global barriers touching storage writes need a barrier, which is a UAV barrier on all resources
pub fn legacy_global_barrier(barrier: &ral::GlobalBarrierDesc) -> Option<ResourceBarrier> {
    let writes = Access::StorageWrite | Access::MemoryWrite;
    if barrier.before.access.intersects(writes) || barrier.after.access.intersects(writes) {
        Some(ResourceBarrier::Uav(ral::ResourceHandle::NULL))
    } else {
        None
    }
}

pub fn legacy_buffer_barrier(barrier: &ral::BufferBarrierDesc) -> Option<ResourceBarrier> {
    let state_before = access_to_resource_states(barrier.before.access, barrier.before.sync_point, None);
    let state_after = access_to_resource_states(barrier.after.access, barrier.after.sync_point, None);
    legacy_transition(barrier.buffer, D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES, state_before, state_after)
}

/// Translate a texture barrier, a barrier over part of the texture results in a transition per subresource
pub fn legacy_texture_barriers(barrier: &ral::TextureBarrierDesc, barriers: &mut Vec<ResourceBarrier>) {
    let state_before = access_to_resource_states(barrier.before.access, barrier.before.sync_point, barrier.before.layout);
    let state_after = access_to_resource_states(barrier.after.access, barrier.after.sync_point, barrier.after.layout);
    let texture = &barrier.texture;

    if state_before == state_after {
        barriers.extend(legacy_transition(texture.resource, D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES, state_before, state_after));
        return;
    }

    let range = barrier.range();
    if range.covers(texture.aspect, texture.mip_levels, texture.array_layers) {
        barriers.extend(legacy_transition(texture.resource, D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES, state_before, state_after));
        return;
    }

    let (first_plane, num_planes) = plane_range(texture.aspect, range.aspect);
    let mip_count = range.mip_count(texture.mip_levels) as u32;
    let layer_count = range.layer_count(texture.array_layers) as u32;
    barriers.reserve((num_planes * layer_count * mip_count) as usize);
    for plane in first_plane..first_plane + num_planes {
        for layer in range.base_layer as u32..range.base_layer as u32 + layer_count {
            for mip in range.base_mip as u32..range.base_mip as u32 + mip_count {
                let subresource = calculate_subresource(mip, layer, plane, texture.mip_levels as u32, texture.array_layers as u32);
                barriers.push(ResourceBarrier::Transition(ResourceTransitionBarrier {
                    resource: texture.resource,
                    subresource,
                    state_before,
                    state_after,
                }));
            }
        }
    }
}

fn legacy_transition(resource: ral::ResourceHandle, subresource: u32, state_before: D3D12_RESOURCE_STATES, state_after: D3D12_RESOURCE_STATES) -> Option<ResourceBarrier> {
    if state_before != state_after {
        Some(ResourceBarrier::Transition(ResourceTransitionBarrier { resource, subresource, state_before, state_after }))
    } else if state_before == D3D12_RESOURCE_STATE_UNORDERED_ACCESS {
        Some(ResourceBarrier::Uav(resource))
    } else {
        None
    }
}

/// Get the first plane and number of planes covered by `aspect`, for a texture with the given aspect
fn plane_range(texture_aspect: TextureAspect, aspect: TextureAspect) -> (u32, u32) {
    if texture_aspect.plane_count() == 1 {
        return (0, 1);
    }
    match (aspect.contains(TextureAspect::Depth), aspect.contains(TextureAspect::Stencil)) {
        (true, true) => (0, 2),
        (false, true) => (1, 1),
        _ => (0, 1),
    }
}

//==============================================================================================================================
// ENHANCED
//==============================================================================================================================

pub fn enhanced_global_barrier(barrier: &ral::GlobalBarrierDesc) -> GlobalBarrier {
    GlobalBarrier {
        sync_before: sync_point_to_dx(barrier.before.sync_point, barrier.before.access),
        sync_after: sync_point_to_dx(barrier.after.sync_point, barrier.after.access),
        access_before: barrier.before.access.to_dx(),
        access_after: barrier.after.access.to_dx(),
    }
}

pub fn enhanced_buffer_barrier(barrier: &ral::BufferBarrierDesc) -> BufferBarrier {
    BufferBarrier {
        sync_before: sync_point_to_dx(barrier.before.sync_point, barrier.before.access),
        sync_after: sync_point_to_dx(barrier.after.sync_point, barrier.after.access),
        access_before: barrier.before.access.to_dx(),
        access_after: barrier.after.access.to_dx(),
        resource: barrier.buffer,
        // Buffer barriers always cover the whole buffer
        offset: 0,
        size: u64::MAX,
    }
}

pub fn enhanced_texture_barrier(barrier: &ral::TextureBarrierDesc, list_type: CommandListType) -> TextureBarrier {
    let texture = &barrier.texture;
    let before_layout = barrier.before_layout();
    let after_layout = barrier.after_layout();

    let layout_access = |layout: TextureLayout, access: Access| if layout == TextureLayout::Present {
        D3D12_BARRIER_ACCESS_NO_ACCESS
    } else {
        access.to_dx()
    };

    let range = barrier.range();
    let subresources = if range.covers(texture.aspect, texture.mip_levels, texture.array_layers) {
        BarrierSubresourceRange::ALL
    } else {
        let (first_plane, num_planes) = plane_range(texture.aspect, range.aspect);
        BarrierSubresourceRange {
            index_or_first_mip_level: range.base_mip as u32,
            num_mip_levels: range.mip_count(texture.mip_levels) as u32,
            first_array_slice: range.base_layer as u32,
            num_array_slices: range.layer_count(texture.array_layers) as u32,
            first_plane,
            num_planes,
        }
    };

    TextureBarrier {
        sync_before: sync_point_to_dx(barrier.before.sync_point, barrier.before.access),
        sync_after: sync_point_to_dx(barrier.after.sync_point, barrier.after.access),
        access_before: layout_access(before_layout, barrier.before.access),
        access_after: layout_access(after_layout, barrier.after.access),
        layout_before: texture_layout_to_dx(before_layout, list_type),
        layout_after: texture_layout_to_dx(after_layout, list_type),
        resource: texture.resource,
        subresources,
        flags: if before_layout == TextureLayout::Undefined { D3D12_TEXTURE_BARRIER_FLAG_DISCARD } else { D3D12_TEXTURE_BARRIER_FLAG_NONE },
    }
}
