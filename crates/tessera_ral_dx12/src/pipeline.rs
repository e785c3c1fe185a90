use core::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use tessera_logging::{log_error, log_verbose};
use tessera_ral as ral;
use ral::{DescriptorRangeFlags, PipelineLayoutFlags, ShaderTypeMask};
use windows::Win32::Graphics::Direct3D12::*;

use crate::{
    dx12_types::*,
    utils::*,
    BindPoint, DeviceCaps, Dx12Settings, NativeDevice, NativeObject, LOG_CAT,
};

/// Root index of a range that was merged into the descriptor table of a previous range
pub const UNUSED_ROOT_INDEX: u32 = u32::MAX;
/// Register space of the emulated draw parameters
pub const DRAW_PARAMETERS_REGISTER_SPACE: u32 = 999;
/// Register of the emulated draw parameters
pub const DRAW_PARAMETERS_REGISTER: u32 = 0;
/// Number of 32-bit values in the emulated draw parameters: base vertex and base instance
pub const DRAW_PARAMETERS_DWORD_COUNT: u32 = 2;

//==============================================================================================================================
// DESCRIPTOR SET MAPPING
//==============================================================================================================================

/// Location of a descriptor range within the descriptors of a descriptor set
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DescriptorRangeMapping {
    pub heap_type:      D3D12_DESCRIPTOR_HEAP_TYPE,
    /// Offset of the range from the start of the set's descriptors in the heap
    pub heap_offset:    u32,
    pub descriptor_num: u32,
}

/// Mapping of a descriptor set's ranges onto the shader-visible heaps
/// 
/// Ranges are packed per heap type in the order they are declared.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct DescriptorSetMapping {
    pub ranges:     Vec<DescriptorRangeMapping>,
    descriptor_num: [u32; 2],
}

impl DescriptorSetMapping {
    /// Pack the ranges of a descriptor set, fails when the descriptors of a heap type don't fit in a 32-bit offset
    pub fn new(desc: &ral::DescriptorSetDesc) -> ral::Result<Self> {
        let mut descriptor_num = [0u32; 2];
        let ranges = desc.ranges.iter().enumerate().map(|(idx, range)| {
            let heap_type = descriptor_heap_type(range.descriptor_type);
            let heap_offset = descriptor_num[heap_type.index()];
            descriptor_num[heap_type.index()] = heap_offset.checked_add(range.descriptor_num).ok_or_else(|| ral::Error::InvalidParameter(
                format!("Descriptor range {idx} ({} descriptors) overflows the descriptor count of its set", range.descriptor_num)
            ))?;
            Ok(DescriptorRangeMapping { heap_type, heap_offset, descriptor_num: range.descriptor_num })
        }).collect::<ral::Result<_>>()?;
        Ok(Self { ranges, descriptor_num })
    }

    /// Total number of descriptors of a heap type in the set
    pub fn descriptor_num(&self, heap_type: D3D12_DESCRIPTOR_HEAP_TYPE) -> u32 {
        self.descriptor_num.get(heap_type.index()).copied().unwrap_or(0)
    }
}

//==============================================================================================================================
// BUILDER
//==============================================================================================================================

/// How a root entry is bound
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RootBindingKind {
    /// Descriptor table pointing into a shader-visible heap
    Table,
    /// Inline 32-bit constants
    Constants,
    /// Inline descriptor, bound using a GPU address
    RootDescriptor,
}

/// Binding point in the root signature
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PipelineLayoutRootEntry {
    pub visibility:    ShaderTypeMask,
    pub kind:          RootBindingKind,
    /// Heap the table points into, only set for tables
    pub heap_type:     Option<D3D12_DESCRIPTOR_HEAP_TYPE>,
    /// Index of the descriptor set the entry belongs to, `None` for push constants and draw parameters
    pub set_index:     Option<u32>,
    /// Ranges of the descriptor set covered by a table
    pub range_indices: Vec<u32>,
}

/// Root indices used when binding a descriptor set
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DescriptorSetRootInfo {
    /// Root index of the table starting at each range, or [`UNUSED_ROOT_INDEX`]
    pub range_root_indices:  Vec<u32>,
    /// Root index of the set's first dynamic constant buffer
    pub dynamic_buffer_base: u32,
    pub dynamic_buffer_num:  u32,
}

/// Result of building a pipeline layout
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PipelineLayoutBindings {
    pub set_mappings:          Vec<Arc<DescriptorSetMapping>>,
    pub set_root_info:         Vec<DescriptorSetRootInfo>,
    pub root_entries:          Vec<PipelineLayoutRootEntry>,
    /// Root index of the first push constant range, push constant range `i` lives at `push_constant_base + i`
    pub push_constant_base:    u32,
    pub push_constant_num:     u32,
    /// Root index of the emulated draw parameters
    pub draw_parameters_index: Option<u32>,
    /// Size of the root signature, in 32-bit values
    pub dword_count:           u32,
    pub root_signature:        RootSignatureDesc,
}

/// Builds the root signature for a pipeline layout
/// 
/// Every descriptor set is laid out as:
/// - a descriptor table for each run of consecutive ranges with the same visibility and heap type.
/// - a root constant buffer view for each dynamic constant buffer.
/// 
/// Push constants follow after all descriptor sets, optionally followed by the emulated draw parameters.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PipelineLayoutBuilder {
    root_signature_1_1:            bool,
    emulate_draw_parameters:       bool,
    deny_unused_stage_root_access: bool,
}

impl PipelineLayoutBuilder {
    pub fn new(caps: &DeviceCaps, settings: &Dx12Settings) -> Self {
        Self {
            root_signature_1_1: caps.root_signature_1_1 && settings.root_signature_1_1,
            emulate_draw_parameters: !caps.native_draw_parameters,
            deny_unused_stage_root_access: settings.deny_unused_stage_root_access,
        }
    }

    pub fn root_signature_version(&self) -> D3D_ROOT_SIGNATURE_VERSION {
        if self.root_signature_1_1 { D3D_ROOT_SIGNATURE_VERSION_1_1 } else { D3D_ROOT_SIGNATURE_VERSION_1_0 }
    }

    /// Build the bindings and root signature description of a pipeline layout
    pub fn build(&self, desc: &ral::PipelineLayoutDesc) -> ral::Result<PipelineLayoutBindings> {
        desc.validate()?;

        if !self.root_signature_1_1 && desc.descriptor_sets.iter().any(|set| set.has_partially_bound_ranges()) {
            log_error!(LOG_CAT, Self::build, "Partially bound descriptor sets require root signature version 1.1, which is not available");
            return Err(ral::Error::UnsupportedRootSignatureVersion);
        }

        let mut parameters = Vec::new();
        let mut root_entries = Vec::new();
        let mut set_mappings = Vec::with_capacity(desc.descriptor_sets.len());
        let mut set_root_info = Vec::with_capacity(desc.descriptor_sets.len());

        for (set_index, set) in desc.descriptor_sets.iter().enumerate() {
            let mapping = DescriptorSetMapping::new(set).map_err(|err| {
                log_error!(LOG_CAT, Self::build, "Invalid descriptor set {set_index}: {err}");
                err
            })?;
            let mut range_root_indices = vec![UNUSED_ROOT_INDEX; set.ranges.len()];

            let mut group_start = 0;
            while group_start < set.ranges.len() {
                let visibility = set.ranges[group_start].visibility;
                let heap_type = mapping.ranges[group_start].heap_type;

                let mut group_end = group_start + 1;
                while group_end < set.ranges.len() &&
                    set.ranges[group_end].visibility == visibility &&
                    mapping.ranges[group_end].heap_type == heap_type
                {
                    group_end += 1;
                }

                let table_start = mapping.ranges[group_start].heap_offset;
                let native_ranges = (group_start..group_end).map(|idx| {
                    let range = &set.ranges[idx];
                    DescriptorRange1 {
                        range_type: range.descriptor_type.to_dx(),
                        num_descriptors: range.descriptor_num,
                        base_shader_register: range.base_register,
                        register_space: set.register_space,
                        flags: self.range_flags(set, range),
                        offset_in_descriptors_from_table_start: mapping.ranges[idx].heap_offset - table_start,
                    }
                }).collect();

                range_root_indices[group_start] = parameters.len() as u32;
                root_entries.push(PipelineLayoutRootEntry {
                    visibility,
                    kind: RootBindingKind::Table,
                    heap_type: Some(heap_type),
                    set_index: Some(set_index as u32),
                    range_indices: (group_start as u32..group_end as u32).collect(),
                });
                parameters.push(RootParameter1 {
                    kind: RootParameterKind::DescriptorTable(native_ranges),
                    visibility: visibility.to_dx(),
                });

                group_start = group_end;
            }

            let dynamic_buffer_base = parameters.len() as u32;
            for buffer in &set.dynamic_buffers {
                root_entries.push(PipelineLayoutRootEntry {
                    visibility: buffer.visibility,
                    kind: RootBindingKind::RootDescriptor,
                    heap_type: None,
                    set_index: Some(set_index as u32),
                    range_indices: Vec::new(),
                });
                parameters.push(RootParameter1 {
                    kind: RootParameterKind::Cbv(RootDescriptor1 {
                        shader_register: buffer.register,
                        register_space: set.register_space,
                        flags: D3D12_ROOT_DESCRIPTOR_FLAG_NONE,
                    }),
                    visibility: buffer.visibility.to_dx(),
                });
            }

            set_mappings.push(Arc::new(mapping));
            set_root_info.push(DescriptorSetRootInfo {
                range_root_indices,
                dynamic_buffer_base,
                dynamic_buffer_num: set.dynamic_buffers.len() as u32,
            });
        }

        let push_constant_base = parameters.len() as u32;
        for push_constant in &desc.push_constants {
            root_entries.push(PipelineLayoutRootEntry {
                visibility: push_constant.visibility,
                kind: RootBindingKind::Constants,
                heap_type: None,
                set_index: None,
                range_indices: Vec::new(),
            });
            parameters.push(RootParameter1 {
                kind: RootParameterKind::Constants(RootConstants {
                    shader_register: push_constant.register,
                    register_space: desc.push_constant_register_space,
                    num_32bit_values: push_constant.dword_count(),
                }),
                visibility: push_constant.visibility.to_dx(),
            });
        }

        let draw_parameters_index = if self.emulate_draw_parameters &&
            desc.flags.contains(PipelineLayoutFlags::EnableDrawParametersEmulation) &&
            desc.shader_stages.contains(ShaderTypeMask::Vertex)
        {
            root_entries.push(PipelineLayoutRootEntry {
                visibility: ShaderTypeMask::Vertex,
                kind: RootBindingKind::Constants,
                heap_type: None,
                set_index: None,
                range_indices: Vec::new(),
            });
            parameters.push(RootParameter1 {
                kind: RootParameterKind::Constants(RootConstants {
                    shader_register: DRAW_PARAMETERS_REGISTER,
                    register_space: DRAW_PARAMETERS_REGISTER_SPACE,
                    num_32bit_values: DRAW_PARAMETERS_DWORD_COUNT,
                }),
                visibility: D3D12_SHADER_VISIBILITY_VERTEX,
            });
            Some(parameters.len() as u32 - 1)
        } else {
            None
        };

        let dword_count = parameters.iter().map(RootParameter1::dword_cost).sum();
        if dword_count > ral::constants::MAX_PIPELINE_LAYOUT_DWORDS {
            return Err(ral::Error::InvalidPipelineLayout(format!("Pipeline layout requires {dword_count} 32-bit values, at most {} are supported", ral::constants::MAX_PIPELINE_LAYOUT_DWORDS)));
        }

        Ok(PipelineLayoutBindings {
            set_mappings,
            set_root_info,
            root_entries,
            push_constant_base,
            push_constant_num: desc.push_constants.len() as u32,
            draw_parameters_index,
            dword_count,
            root_signature: RootSignatureDesc {
                version: self.root_signature_version(),
                parameters,
                flags: self.root_signature_flags(desc.shader_stages),
            },
        })
    }

    fn range_flags(&self, set: &ral::DescriptorSetDesc, range: &ral::DescriptorRangeDesc) -> D3D12_DESCRIPTOR_RANGE_FLAGS {
        if !self.root_signature_1_1 || !(set.partially_bound || range.flags.contains(DescriptorRangeFlags::PartiallyBound)) {
            return D3D12_DESCRIPTOR_RANGE_FLAG_NONE;
        }
        // Sampler ranges don't support data volatility
        if range.descriptor_type.is_sampler() {
            D3D12_DESCRIPTOR_RANGE_FLAG_DESCRIPTORS_VOLATILE
        } else {
            D3D12_DESCRIPTOR_RANGE_FLAG_DESCRIPTORS_VOLATILE | D3D12_DESCRIPTOR_RANGE_FLAG_DATA_VOLATILE
        }
    }

    fn root_signature_flags(&self, stages: ShaderTypeMask) -> D3D12_ROOT_SIGNATURE_FLAGS {
        let mut flags = D3D12_ROOT_SIGNATURE_FLAG_NONE;
        if stages.contains(ShaderTypeMask::Vertex) {
            flags |= D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT;
        }
        if !self.deny_unused_stage_root_access {
            return flags;
        }

        // Hull, domain and geometry shaders are never used
        flags |= D3D12_ROOT_SIGNATURE_FLAG_DENY_HULL_SHADER_ROOT_ACCESS |
            D3D12_ROOT_SIGNATURE_FLAG_DENY_DOMAIN_SHADER_ROOT_ACCESS |
            D3D12_ROOT_SIGNATURE_FLAG_DENY_GEOMETRY_SHADER_ROOT_ACCESS;

        const STAGE_DENY_FLAGS: [(ShaderTypeMask, D3D12_ROOT_SIGNATURE_FLAGS); 4] = [
            (ShaderTypeMask::Vertex, D3D12_ROOT_SIGNATURE_FLAG_DENY_VERTEX_SHADER_ROOT_ACCESS),
            (ShaderTypeMask::Pixel , D3D12_ROOT_SIGNATURE_FLAG_DENY_PIXEL_SHADER_ROOT_ACCESS),
            (ShaderTypeMask::Task  , D3D12_ROOT_SIGNATURE_FLAG_DENY_AMPLIFICATION_SHADER_ROOT_ACCESS),
            (ShaderTypeMask::Mesh  , D3D12_ROOT_SIGNATURE_FLAG_DENY_MESH_SHADER_ROOT_ACCESS),
        ];
        for (stage, deny) in STAGE_DENY_FLAGS {
            if !stages.contains(stage) {
                flags |= deny;
            }
        }
        flags
    }
}

//==============================================================================================================================
// LAYOUT IDENTITY
//==============================================================================================================================

/// Identity of a live pipeline layout
/// 
/// Slots are reused after a layout is destroyed, but with a new generation, so an identity is never shared by 2 layouts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PipelineLayoutId {
    pub index:      u32,
    pub generation: u32,
}

#[derive(Default)]
struct RegistrySlots {
    generations: Vec<u32>,
    free:        Vec<u32>,
}

/// Device-owned registry handing out pipeline layout identities
#[derive(Default)]
pub struct PipelineLayoutRegistry {
    slots: Mutex<RegistrySlots>,
}

impl PipelineLayoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> PipelineLayoutId {
        let mut slots = self.slots.lock();
        match slots.free.pop() {
            Some(index) => PipelineLayoutId { index, generation: slots.generations[index as usize] },
            None => {
                let index = slots.generations.len() as u32;
                slots.generations.push(0);
                PipelineLayoutId { index, generation: 0 }
            },
        }
    }

    /// Free an identity, any later identity in the same slot will have a different generation
    pub fn free(&self, id: PipelineLayoutId) {
        let mut slots = self.slots.lock();
        let Some(generation) = slots.generations.get_mut(id.index as usize) else { return };
        if *generation != id.generation {
            return;
        }
        *generation = generation.wrapping_add(1);
        slots.free.push(id.index);
    }

    pub fn is_alive(&self, id: PipelineLayoutId) -> bool {
        self.slots.lock().generations.get(id.index as usize) == Some(&id.generation)
    }
}

//==============================================================================================================================
// PIPELINE LAYOUT
//==============================================================================================================================

pub struct PipelineLayout {
    device:         Arc<dyn NativeDevice>,
    registry:       Arc<PipelineLayoutRegistry>,
    id:             PipelineLayoutId,
    root_signature: NativeObject,
    bind_point:     BindPoint,
    bindings:       PipelineLayoutBindings,
}

impl PipelineLayout {
    pub fn new(device: Arc<dyn NativeDevice>, registry: Arc<PipelineLayoutRegistry>, builder: &PipelineLayoutBuilder, desc: &ral::PipelineLayoutDesc) -> ral::Result<Self> {
        let bindings = builder.build(desc)?;
        let root_signature = device.create_root_signature(&bindings.root_signature)?;
        let id = registry.allocate();
        let bind_point = if desc.is_graphics() { BindPoint::Graphics } else { BindPoint::Compute };

        log_verbose!(LOG_CAT, "Created pipeline layout {}:{} with {} root parameters ({} 32-bit values)", id.index, id.generation, bindings.root_entries.len(), bindings.dword_count);

        Ok(Self {
            device,
            registry,
            id,
            root_signature,
            bind_point,
            bindings,
        })
    }

    pub fn id(&self) -> PipelineLayoutId {
        self.id
    }

    pub fn root_signature(&self) -> NativeObject {
        self.root_signature
    }

    pub fn bind_point(&self) -> BindPoint {
        self.bind_point
    }

    pub fn bindings(&self) -> &PipelineLayoutBindings {
        &self.bindings
    }

    pub fn set_mapping(&self, set_index: u32) -> ral::Result<&Arc<DescriptorSetMapping>> {
        self.bindings.set_mappings.get(set_index as usize).ok_or(ral::Error::DescriptorSetIndexOutOfRange {
            index: set_index,
            count: self.bindings.set_mappings.len() as u32,
        })
    }
}

impl ral::PipelineLayoutInterface for PipelineLayout {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn descriptor_set_num(&self) -> u32 {
        self.bindings.set_mappings.len() as u32
    }

    fn push_constant_num(&self) -> u32 {
        self.bindings.push_constant_num
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        self.registry.free(self.id);
        self.device.release(self.root_signature);
    }
}

#[cfg(test)]
mod tests {
    use ral::{DescriptorRangeDesc, DescriptorSetDesc, DescriptorType, DynamicConstantBufferDesc, PipelineLayoutDesc, PushConstantDesc};

    use super::*;
    use crate::test_utils::MockDevice;

    fn builder(caps: DeviceCaps) -> PipelineLayoutBuilder {
        PipelineLayoutBuilder::new(&caps, &Dx12Settings::default())
    }

    fn full_caps() -> DeviceCaps {
        DeviceCaps { enhanced_barriers: true, root_signature_1_1: true, native_draw_parameters: false, mesh_shaders: true }
    }

    fn graphics_layout(descriptor_sets: Vec<DescriptorSetDesc>) -> PipelineLayoutDesc {
        PipelineLayoutDesc {
            descriptor_sets,
            shader_stages: ShaderTypeMask::Vertex | ShaderTypeMask::Pixel,
            ..Default::default()
        }
    }

    fn set(ranges: Vec<DescriptorRangeDesc>) -> DescriptorSetDesc {
        DescriptorSetDesc { register_space: 0, ranges, dynamic_buffers: Vec::new(), partially_bound: false }
    }

    #[test]
    fn ranges_are_packed_per_heap_type() {
        let mapping = DescriptorSetMapping::new(&set(vec![
            DescriptorRangeDesc::new(0, 4, DescriptorType::Texture, ShaderTypeMask::Pixel),
            DescriptorRangeDesc::new(0, 2, DescriptorType::Sampler, ShaderTypeMask::Pixel),
            DescriptorRangeDesc::new(4, 3, DescriptorType::ConstantBuffer, ShaderTypeMask::Pixel),
            DescriptorRangeDesc::new(2, 1, DescriptorType::Sampler, ShaderTypeMask::Pixel),
        ])).unwrap();

        let offsets: Vec<u32> = mapping.ranges.iter().map(|range| range.heap_offset).collect();
        assert_eq!(offsets, [0, 0, 4, 2]);
        assert_eq!(mapping.descriptor_num(D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV), 7);
        assert_eq!(mapping.descriptor_num(D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER), 3);
        assert_eq!(mapping.descriptor_num(D3D12_DESCRIPTOR_HEAP_TYPE_RTV), 0);
    }

    #[test]
    fn descriptor_count_overflow_is_an_invalid_parameter() {
        let ranges = vec![
            DescriptorRangeDesc::new(0, u32::MAX, DescriptorType::Texture, ShaderTypeMask::Pixel),
            DescriptorRangeDesc::new(0, 1, DescriptorType::Buffer, ShaderTypeMask::Pixel),
        ];
        assert!(matches!(DescriptorSetMapping::new(&set(ranges.clone())), Err(ral::Error::InvalidParameter(_))));
        assert!(matches!(builder(full_caps()).build(&graphics_layout(vec![set(ranges)])), Err(ral::Error::InvalidParameter(_))));

        // Different heap types are counted separately
        let split = DescriptorSetMapping::new(&set(vec![
            DescriptorRangeDesc::new(0, u32::MAX, DescriptorType::Texture, ShaderTypeMask::Pixel),
            DescriptorRangeDesc::new(0, 1, DescriptorType::Sampler, ShaderTypeMask::Pixel),
        ])).unwrap();
        assert_eq!(split.descriptor_num(D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV), u32::MAX);
        assert_eq!(split.descriptor_num(D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER), 1);
    }

    #[test]
    fn ranges_with_the_same_visibility_are_merged() {
        let desc = graphics_layout(vec![set(vec![
            DescriptorRangeDesc::new(0, 2, DescriptorType::Texture, ShaderTypeMask::Vertex),
            DescriptorRangeDesc::new(2, 1, DescriptorType::Texture, ShaderTypeMask::Vertex),
            DescriptorRangeDesc::new(0, 1, DescriptorType::StorageBuffer, ShaderTypeMask::Pixel),
        ])]);
        let bindings = builder(full_caps()).build(&desc).unwrap();

        assert_eq!(bindings.root_entries.len(), 2);
        assert_eq!(bindings.root_entries[0].range_indices, [0, 1]);
        assert_eq!(bindings.root_entries[0].visibility, ShaderTypeMask::Vertex);
        assert_eq!(bindings.root_entries[1].range_indices, [2]);
        assert_eq!(bindings.set_root_info[0].range_root_indices, [0, UNUSED_ROOT_INDEX, 1]);

        match &bindings.root_signature.parameters[0].kind {
            RootParameterKind::DescriptorTable(ranges) => {
                assert_eq!(ranges.len(), 2);
                assert_eq!(ranges[1].offset_in_descriptors_from_table_start, 2);
                assert_eq!(ranges[1].base_shader_register, 2);
            },
            kind => panic!("expected a descriptor table, found {kind:?}"),
        }
        assert_eq!(bindings.root_signature.parameters[0].visibility, D3D12_SHADER_VISIBILITY_VERTEX);
        assert_eq!(bindings.root_signature.parameters[1].visibility, D3D12_SHADER_VISIBILITY_PIXEL);
    }

    #[test]
    fn heap_type_changes_split_tables() {
        let desc = graphics_layout(vec![set(vec![
            DescriptorRangeDesc::new(0, 1, DescriptorType::Texture, ShaderTypeMask::Pixel),
            DescriptorRangeDesc::new(0, 1, DescriptorType::Sampler, ShaderTypeMask::Pixel),
            DescriptorRangeDesc::new(1, 1, DescriptorType::Texture, ShaderTypeMask::Pixel),
        ])]);
        let bindings = builder(full_caps()).build(&desc).unwrap();

        let heap_types: Vec<_> = bindings.root_entries.iter().map(|entry| entry.heap_type).collect();
        assert_eq!(heap_types, [Some(D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV), Some(D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER), Some(D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV)]);
        assert_eq!(bindings.set_root_info[0].range_root_indices, [0, 1, 2]);
    }

    #[test]
    fn building_is_deterministic() {
        let desc = graphics_layout(vec![
            set(vec![
                DescriptorRangeDesc::new(0, 2, DescriptorType::Texture, ShaderTypeMask::Vertex),
                DescriptorRangeDesc::new(0, 1, DescriptorType::Sampler, ShaderTypeMask::Pixel),
            ]),
            set(vec![DescriptorRangeDesc::new(0, 8, DescriptorType::StorageTexture, ShaderTypeMask::Pixel)]),
        ]);
        let builder = builder(full_caps());
        assert_eq!(builder.build(&desc).unwrap(), builder.build(&desc).unwrap());
    }

    #[test]
    fn dynamic_buffers_follow_their_set_and_push_constants_come_last() {
        let mut first = set(vec![DescriptorRangeDesc::new(0, 1, DescriptorType::Texture, ShaderTypeMask::Pixel)]);
        first.dynamic_buffers = vec![
            DynamicConstantBufferDesc { register: 0, visibility: ShaderTypeMask::Vertex },
            DynamicConstantBufferDesc { register: 1, visibility: ShaderTypeMask::Pixel },
        ];
        let mut second = set(vec![DescriptorRangeDesc::new(0, 1, DescriptorType::Buffer, ShaderTypeMask::Vertex)]);
        second.register_space = 1;

        let desc = PipelineLayoutDesc {
            push_constants: vec![
                PushConstantDesc { register: 0, size: 16, visibility: ShaderTypeMask::Vertex },
                PushConstantDesc { register: 1, size: 8, visibility: ShaderTypeMask::Pixel },
            ],
            push_constant_register_space: 2,
            ..graphics_layout(vec![first, second])
        };
        let bindings = builder(full_caps()).build(&desc).unwrap();

        let kinds: Vec<_> = bindings.root_signature.parameters.iter().map(RootParameter1::parameter_type).collect();
        assert_eq!(kinds, [
            D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
            D3D12_ROOT_PARAMETER_TYPE_CBV,
            D3D12_ROOT_PARAMETER_TYPE_CBV,
            D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
            D3D12_ROOT_PARAMETER_TYPE_32BIT_CONSTANTS,
            D3D12_ROOT_PARAMETER_TYPE_32BIT_CONSTANTS,
        ]);
        assert_eq!(bindings.set_root_info[0].dynamic_buffer_base, 1);
        assert_eq!(bindings.set_root_info[0].dynamic_buffer_num, 2);
        assert_eq!(bindings.set_root_info[1].dynamic_buffer_base, 4);
        assert_eq!(bindings.set_root_info[1].dynamic_buffer_num, 0);
        assert_eq!(bindings.push_constant_base, 4);
        assert_eq!(bindings.push_constant_num, 2);
        // 2 tables, 2 root descriptors, 4 + 2 constants
        assert_eq!(bindings.dword_count, 2 + 4 + 6);

        assert_eq!(bindings.root_signature.parameters[5].kind, RootParameterKind::Constants(RootConstants { shader_register: 1, register_space: 2, num_32bit_values: 2 }));
        assert_eq!(bindings.root_signature.parameters[2].kind, RootParameterKind::Cbv(RootDescriptor1 { shader_register: 1, register_space: 0, flags: D3D12_ROOT_DESCRIPTOR_FLAG_NONE }));
    }

    #[test]
    fn unused_stages_are_denied() {
        let bindings = builder(full_caps()).build(&graphics_layout(Vec::new())).unwrap();
        let flags = bindings.root_signature.flags;
        let denied = D3D12_ROOT_SIGNATURE_FLAG_DENY_HULL_SHADER_ROOT_ACCESS |
            D3D12_ROOT_SIGNATURE_FLAG_DENY_DOMAIN_SHADER_ROOT_ACCESS |
            D3D12_ROOT_SIGNATURE_FLAG_DENY_GEOMETRY_SHADER_ROOT_ACCESS |
            D3D12_ROOT_SIGNATURE_FLAG_DENY_AMPLIFICATION_SHADER_ROOT_ACCESS |
            D3D12_ROOT_SIGNATURE_FLAG_DENY_MESH_SHADER_ROOT_ACCESS;
        assert_eq!(flags, D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT | denied);
        assert_eq!(flags & (D3D12_ROOT_SIGNATURE_FLAG_DENY_VERTEX_SHADER_ROOT_ACCESS | D3D12_ROOT_SIGNATURE_FLAG_DENY_PIXEL_SHADER_ROOT_ACCESS), D3D12_ROOT_SIGNATURE_FLAG_NONE);

        let settings = Dx12Settings { deny_unused_stage_root_access: false, ..Default::default() };
        let builder = PipelineLayoutBuilder::new(&full_caps(), &settings);
        let compute = PipelineLayoutDesc { shader_stages: ShaderTypeMask::Compute, ..Default::default() };
        assert_eq!(builder.build(&compute).unwrap().root_signature.flags, D3D12_ROOT_SIGNATURE_FLAG_NONE);
    }

    #[test]
    fn partially_bound_sets_need_version_1_1() {
        let mut partial = set(vec![
            DescriptorRangeDesc::new(0, 16, DescriptorType::Texture, ShaderTypeMask::Pixel),
            DescriptorRangeDesc::new(0, 4, DescriptorType::Sampler, ShaderTypeMask::Pixel),
        ]);
        partial.partially_bound = true;
        let desc = graphics_layout(vec![partial]);

        let caps_1_0 = DeviceCaps { root_signature_1_1: false, ..full_caps() };
        assert_eq!(builder(caps_1_0).build(&desc), Err(ral::Error::UnsupportedRootSignatureVersion));

        let bindings = builder(full_caps()).build(&desc).unwrap();
        assert_eq!(bindings.root_signature.version, D3D_ROOT_SIGNATURE_VERSION_1_1);
        let range_flags: Vec<_> = bindings.root_signature.parameters.iter().filter_map(|param| match &param.kind {
            RootParameterKind::DescriptorTable(ranges) => Some(ranges[0].flags),
            _ => None,
        }).collect();
        assert_eq!(range_flags, [
            D3D12_DESCRIPTOR_RANGE_FLAG_DESCRIPTORS_VOLATILE | D3D12_DESCRIPTOR_RANGE_FLAG_DATA_VOLATILE,
            D3D12_DESCRIPTOR_RANGE_FLAG_DESCRIPTORS_VOLATILE,
        ]);
    }

    #[test]
    fn version_1_0_strips_range_flags() {
        let caps_1_0 = DeviceCaps { root_signature_1_1: false, ..full_caps() };
        let desc = graphics_layout(vec![set(vec![DescriptorRangeDesc::new(0, 1, DescriptorType::Texture, ShaderTypeMask::Pixel)])]);
        let bindings = builder(caps_1_0).build(&desc).unwrap();
        assert_eq!(bindings.root_signature.version, D3D_ROOT_SIGNATURE_VERSION_1_0);
        match &bindings.root_signature.parameters[0].kind {
            RootParameterKind::DescriptorTable(ranges) => assert_eq!(ranges[0].flags, D3D12_DESCRIPTOR_RANGE_FLAG_NONE),
            kind => panic!("expected a descriptor table, found {kind:?}"),
        }
    }

    #[test]
    fn draw_parameters_emulation() {
        let desc = PipelineLayoutDesc {
            push_constants: vec![PushConstantDesc { register: 0, size: 4, visibility: ShaderTypeMask::Vertex }],
            flags: PipelineLayoutFlags::EnableDrawParametersEmulation,
            ..graphics_layout(Vec::new())
        };

        let bindings = builder(full_caps()).build(&desc).unwrap();
        assert_eq!(bindings.draw_parameters_index, Some(1));
        let param = &bindings.root_signature.parameters[1];
        assert_eq!(param.visibility, D3D12_SHADER_VISIBILITY_VERTEX);
        assert_eq!(param.kind, RootParameterKind::Constants(RootConstants {
            shader_register: DRAW_PARAMETERS_REGISTER,
            register_space: DRAW_PARAMETERS_REGISTER_SPACE,
            num_32bit_values: 2,
        }));

        let native = DeviceCaps { native_draw_parameters: true, ..full_caps() };
        assert_eq!(builder(native).build(&desc).unwrap().draw_parameters_index, None);

        let compute = PipelineLayoutDesc { shader_stages: ShaderTypeMask::Compute, push_constants: Vec::new(), ..desc };
        assert_eq!(builder(full_caps()).build(&compute).unwrap().draw_parameters_index, None);
    }

    #[test]
    fn root_size_is_limited() {
        let desc = PipelineLayoutDesc {
            push_constants: vec![PushConstantDesc { register: 0, size: 256, visibility: ShaderTypeMask::Pixel }],
            ..graphics_layout(vec![set(vec![DescriptorRangeDesc::new(0, 1, DescriptorType::Texture, ShaderTypeMask::Pixel)])])
        };
        let err = builder(full_caps()).build(&desc).unwrap_err();
        assert_eq!(err.kind(), ral::ErrorKind::InvalidArgument);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let desc = graphics_layout(vec![set(vec![DescriptorRangeDesc::new(0, 0, DescriptorType::Texture, ShaderTypeMask::Pixel)])]);
        assert!(matches!(builder(full_caps()).build(&desc), Err(ral::Error::InvalidParameter(_))));
    }

    #[test]
    fn registry_generations() {
        let registry = PipelineLayoutRegistry::new();
        let first = registry.allocate();
        let second = registry.allocate();
        assert_ne!(first, second);
        assert!(registry.is_alive(first));

        registry.free(first);
        assert!(!registry.is_alive(first));
        let reused = registry.allocate();
        assert_eq!(reused.index, first.index);
        assert_ne!(reused, first);

        // Stale identities don't free the new layout
        registry.free(first);
        assert!(registry.is_alive(reused));
    }

    #[test]
    fn layouts_release_their_root_signature() {
        let device = MockDevice::new();
        let registry = Arc::new(PipelineLayoutRegistry::new());
        let desc = graphics_layout(vec![set(vec![DescriptorRangeDesc::new(0, 1, DescriptorType::Texture, ShaderTypeMask::Pixel)])]);

        let layout = PipelineLayout::new(device.clone(), registry.clone(), &builder(full_caps()), &desc).unwrap();
        assert_eq!(device.root_signatures.lock().len(), 1);
        assert_eq!(layout.bind_point(), BindPoint::Graphics);
        assert!(layout.set_mapping(1).is_err());

        let id = layout.id();
        let root_signature = layout.root_signature();
        drop(layout);
        assert!(!registry.is_alive(id));
        assert_eq!(*device.released.lock(), [root_signature]);
    }
}
