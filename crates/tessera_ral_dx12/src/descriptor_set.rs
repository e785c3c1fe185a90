use core::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use tessera_ral as ral;
use windows::Win32::Graphics::Direct3D12::*;

use crate::{dx12_types::*, Descriptor, DescriptorHeap, DescriptorSetMapping, NativeDevice, NativeObject, PipelineLayout};

/// Heap types descriptor sets can contain descriptors of
const SET_HEAP_TYPES: [D3D12_DESCRIPTOR_HEAP_TYPE; 2] = [D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV, D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER];

/// Contiguous block of descriptors in a shader-visible heap
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DescriptorBlock {
    pub heap_cpu_start: CpuDescriptorHandle,
    pub heap_gpu_start: GpuDescriptorHandle,
    /// Offset of the block in the heap
    pub heap_offset:    u32,
    pub descriptor_num: u32,
    pub stride:         u32,
}

impl DescriptorBlock {
    pub fn cpu_pointer(&self, index: u32) -> CpuDescriptorHandle {
        self.heap_cpu_start.offset(self.heap_offset + index, self.stride)
    }

    pub fn gpu_pointer(&self, index: u32) -> GpuDescriptorHandle {
        self.heap_gpu_start.offset(self.heap_offset + index, self.stride)
    }
}

/// Source of the descriptor blocks backing a descriptor set
pub trait DescriptorBlockAllocator {
    /// Allocate a block for each heap type with a non-zero count, indexed by heap type
    /// 
    /// Either all blocks are allocated, or none are.
    fn allocate_blocks(&self, counts: [u32; 2]) -> ral::Result<[Option<DescriptorBlock>; 2]>;
}

/// CPU and GPU pointer to a descriptor in a descriptor set
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DescriptorPointer {
    pub cpu: CpuDescriptorHandle,
    pub gpu: GpuDescriptorHandle,
}

//==============================================================================================================================
// DESCRIPTOR SET
//==============================================================================================================================

/// Instance of a descriptor set layout, backed by a block of descriptors per heap type
/// 
/// The blocks are sized once when the set is initialized.
pub struct DescriptorSet {
    device:          Arc<dyn NativeDevice>,
    mapping:         Arc<DescriptorSetMapping>,
    blocks:          [Option<DescriptorBlock>; 2],
    dynamic_buffers: Mutex<Vec<u64>>,
}

impl DescriptorSet {
    /// Initialize a descriptor set with the blocks required by its mapping
    pub fn initialize(device: Arc<dyn NativeDevice>, mapping: Arc<DescriptorSetMapping>, dynamic_buffer_num: u32, allocator: &dyn DescriptorBlockAllocator) -> ral::Result<Self> {
        let counts = SET_HEAP_TYPES.map(|heap_type| mapping.descriptor_num(heap_type));
        let blocks = allocator.allocate_blocks(counts)?;
        Ok(Self {
            device,
            mapping,
            blocks,
            dynamic_buffers: Mutex::new(vec![0; dynamic_buffer_num as usize]),
        })
    }

    pub fn mapping(&self) -> &Arc<DescriptorSetMapping> {
        &self.mapping
    }

    /// Get the block of a heap type, if the set contains descriptors of that type
    pub fn block(&self, heap_type: D3D12_DESCRIPTOR_HEAP_TYPE) -> Option<&DescriptorBlock> {
        self.blocks.get(heap_type.index())?.as_ref()
    }

    /// Get the pointers to a descriptor in a range, `None` when the range or index is out of bounds
    pub fn get_pointer(&self, range_index: u32, index: u32) -> Option<DescriptorPointer> {
        let range = self.mapping.ranges.get(range_index as usize)?;
        if index >= range.descriptor_num {
            return None;
        }
        let block = self.block(range.heap_type)?;
        let offset = range.heap_offset + index;
        Some(DescriptorPointer { cpu: block.cpu_pointer(offset), gpu: block.gpu_pointer(offset) })
    }

    pub fn get_cpu_pointer(&self, range_index: u32, index: u32) -> Option<CpuDescriptorHandle> {
        self.get_pointer(range_index, index).map(|pointer| pointer.cpu)
    }

    pub fn get_gpu_pointer(&self, range_index: u32, index: u32) -> Option<GpuDescriptorHandle> {
        self.get_pointer(range_index, index).map(|pointer| pointer.gpu)
    }

    /// Get the GPU address of a dynamic constant buffer
    pub fn get_dynamic_pointer(&self, dynamic_index: u32) -> Option<u64> {
        self.dynamic_buffers.lock().get(dynamic_index as usize).copied()
    }

    /// Copy descriptors into a range, starting at `offset` descriptors into the range
    pub fn update_range(&self, range_index: u32, offset: u32, descriptors: &[&Descriptor]) -> ral::Result<()> {
        let Some(range) = self.mapping.ranges.get(range_index as usize) else {
            return Err(ral::Error::InvalidParameter(format!("Descriptor range {range_index} is out of bounds, the set has {} ranges", self.mapping.ranges.len())));
        };
        if offset as usize + descriptors.len() > range.descriptor_num as usize {
            return Err(ral::Error::InvalidParameter(format!("Cannot write {} descriptors at offset {offset} into a range of {} descriptors", descriptors.len(), range.descriptor_num)));
        }
        let Some(block) = self.block(range.heap_type) else {
            return Err(ral::Error::Other(format!("Descriptor set has no descriptor block for range {range_index}")));
        };

        for (idx, descriptor) in descriptors.iter().enumerate() {
            if descriptor.heap_type() != range.heap_type {
                return Err(ral::Error::InvalidParameter(format!("Descriptor {idx} is of heap type {:?}, but range {range_index} expects {:?}", descriptor.heap_type(), range.heap_type)));
            }
        }
        for (idx, descriptor) in descriptors.iter().enumerate() {
            let dst = block.cpu_pointer(range.heap_offset + offset + idx as u32);
            self.device.copy_descriptors_simple(1, dst, descriptor.cpu_pointer(), range.heap_type);
        }
        Ok(())
    }
}

impl ral::DescriptorSetInterface for DescriptorSet {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn range_num(&self) -> u32 {
        self.mapping.ranges.len() as u32
    }

    fn dynamic_buffer_num(&self) -> u32 {
        self.dynamic_buffers.lock().len() as u32
    }

    fn set_dynamic_buffer(&self, index: u32, gpu_address: u64) -> ral::Result<()> {
        let mut dynamic_buffers = self.dynamic_buffers.lock();
        let count = dynamic_buffers.len();
        match dynamic_buffers.get_mut(index as usize) {
            Some(address) => {
                *address = gpu_address;
                Ok(())
            },
            None => Err(ral::Error::InvalidParameter(format!("Dynamic constant buffer {index} is out of bounds, the set has {count} dynamic constant buffers"))),
        }
    }
}

//==============================================================================================================================
// DESCRIPTOR POOL
//==============================================================================================================================

#[derive(Default)]
struct DescriptorPoolState {
    offsets: [u32; 2],
    set_num: u32,
}

/// Pool of shader-visible descriptors, descriptor sets are allocated linearly from it
pub struct DescriptorPool {
    device:     Arc<dyn NativeDevice>,
    heaps:      [Option<DescriptorHeap>; 2],
    max_sets:   u32,
    state:      Mutex<DescriptorPoolState>,
}

impl DescriptorPool {
    pub fn new(device: Arc<dyn NativeDevice>, desc: &ral::DescriptorPoolDesc) -> ral::Result<Self> {
        let capacities = [desc.resource_descriptor_max_num, desc.sampler_max_num];
        let mut heaps = [None, None];
        for (idx, heap_type) in SET_HEAP_TYPES.into_iter().enumerate() {
            if capacities[idx] != 0 {
                heaps[idx] = Some(DescriptorHeap::new(&*device, heap_type, capacities[idx], true)?);
            }
        }

        Ok(Self {
            device,
            heaps,
            max_sets: desc.descriptor_set_max_num,
            state: Mutex::new(DescriptorPoolState::default()),
        })
    }

    /// Native heaps that need to be bound when using sets from this pool
    pub fn native_heaps(&self) -> Vec<NativeObject> {
        self.heaps.iter().flatten().map(DescriptorHeap::native).collect()
    }

    /// Number of sets allocated since the last reset
    pub fn allocated_set_num(&self) -> u32 {
        self.state.lock().set_num
    }

    /// Allocate a descriptor set for a set in a pipeline layout
    pub fn allocate_set(&self, layout: &PipelineLayout, set_index: u32) -> ral::Result<DescriptorSet> {
        let mapping = layout.set_mapping(set_index)?.clone();
        let dynamic_buffer_num = layout.bindings().set_root_info[set_index as usize].dynamic_buffer_num;
        DescriptorSet::initialize(self.device.clone(), mapping, dynamic_buffer_num, self)
    }
}

impl DescriptorBlockAllocator for DescriptorPool {
    fn allocate_blocks(&self, counts: [u32; 2]) -> ral::Result<[Option<DescriptorBlock>; 2]> {
        let mut state = self.state.lock();
        if state.set_num >= self.max_sets {
            return Err(ral::Error::Other(format!("Descriptor pool ran out of descriptor sets, max amount: {}", self.max_sets)));
        }

        for (idx, count) in counts.into_iter().enumerate() {
            if count == 0 {
                continue;
            }
            let capacity = self.heaps[idx].as_ref().map_or(0, DescriptorHeap::capacity);
            let available = capacity - state.offsets[idx];
            if count > available {
                return Err(ral::Error::OutOfDescriptorPoolSpace { requested: count, available });
            }
        }

        let mut blocks = [None, None];
        for (idx, count) in counts.into_iter().enumerate() {
            let Some(heap) = &self.heaps[idx] else { continue };
            if count == 0 {
                continue;
            }
            let heap_cpu_start = heap.cpu_pointer(0);
            let Some(heap_gpu_start) = heap.gpu_pointer(0) else {
                return Err(ral::Error::Other("Descriptor pool heap is not shader visible".to_string()));
            };
            blocks[idx] = Some(DescriptorBlock {
                heap_cpu_start,
                heap_gpu_start,
                heap_offset: state.offsets[idx],
                descriptor_num: count,
                stride: heap.stride(),
            });
            state.offsets[idx] += count;
        }
        state.set_num += 1;
        Ok(blocks)
    }
}

impl ral::DescriptorPoolInterface for DescriptorPool {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn allocate_descriptor_set(&self, layout: &ral::PipelineLayoutHandle, set_index: u32) -> ral::Result<ral::DescriptorSetHandle> {
        let Some(layout) = layout.as_any().downcast_ref::<PipelineLayout>() else {
            return Err(ral::Error::InvalidParameter("Pipeline layout was not created by the DX12 backend".to_string()));
        };
        Ok(Arc::new(self.allocate_set(layout, set_index)?))
    }

    fn reset(&self) {
        *self.state.lock() = DescriptorPoolState::default();
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        for heap in self.heaps.iter().flatten() {
            self.device.release(heap.native());
        }
    }
}

static_assertions::assert_impl_all!(DescriptorSet: Send, Sync);
static_assertions::assert_impl_all!(DescriptorPool: Send, Sync);

#[cfg(test)]
mod tests {
    use ral::{DescriptorPoolInterface, DescriptorRangeDesc, DescriptorSetDesc, DescriptorSetInterface, DescriptorType, DynamicConstantBufferDesc, PipelineLayoutDesc, ShaderTypeMask};

    use super::*;
    use crate::{test_utils::*, DescriptorHeapAllocator, DeviceCaps, Dx12Settings, PipelineLayoutBuilder, PipelineLayoutRegistry};

    fn pool(device: &Arc<MockDevice>, resources: u32, samplers: u32, sets: u32) -> DescriptorPool {
        let desc = ral::DescriptorPoolDesc { descriptor_set_max_num: sets, resource_descriptor_max_num: resources, sampler_max_num: samplers };
        DescriptorPool::new(device.clone(), &desc).unwrap()
    }

    fn mapping() -> Arc<DescriptorSetMapping> {
        Arc::new(DescriptorSetMapping::new(&DescriptorSetDesc {
            register_space: 0,
            ranges: vec![
                DescriptorRangeDesc::new(0, 4, DescriptorType::Texture, ShaderTypeMask::Pixel),
                DescriptorRangeDesc::new(0, 2, DescriptorType::Sampler, ShaderTypeMask::Pixel),
                DescriptorRangeDesc::new(0, 2, DescriptorType::StorageBuffer, ShaderTypeMask::Pixel),
            ],
            dynamic_buffers: Vec::new(),
            partially_bound: false,
        }).unwrap())
    }

    fn layout(device: &Arc<MockDevice>) -> PipelineLayout {
        let desc = PipelineLayoutDesc {
            descriptor_sets: vec![DescriptorSetDesc {
                register_space: 0,
                ranges: vec![DescriptorRangeDesc::new(0, 3, DescriptorType::Texture, ShaderTypeMask::Pixel)],
                dynamic_buffers: vec![DynamicConstantBufferDesc { register: 0, visibility: ShaderTypeMask::Vertex }],
                partially_bound: false,
            }],
            shader_stages: ShaderTypeMask::Vertex | ShaderTypeMask::Pixel,
            ..Default::default()
        };
        let builder = PipelineLayoutBuilder::new(&DeviceCaps::default(), &Dx12Settings::default());
        PipelineLayout::new(device.clone(), Arc::new(PipelineLayoutRegistry::new()), &builder, &desc).unwrap()
    }

    #[test]
    fn pools_create_shader_visible_heaps() {
        let device = MockDevice::new();
        let pool = pool(&device, 64, 0, 4);
        assert_eq!(pool.native_heaps().len(), 1);
        assert_eq!(*device.heaps.lock(), [DescriptorHeapDesc { heap_type: D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV, num_descriptors: 64, shader_visible: true }]);
    }

    #[test]
    fn sets_get_one_block_per_heap_type() {
        let device = MockDevice::new();
        let pool = pool(&device, 64, 16, 4);

        let first = DescriptorSet::initialize(device.clone(), mapping(), 0, &pool).unwrap();
        let second = DescriptorSet::initialize(device.clone(), mapping(), 0, &pool).unwrap();

        let first_block = first.block(D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV).unwrap();
        let second_block = second.block(D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV).unwrap();
        assert_eq!((first_block.heap_offset, first_block.descriptor_num), (0, 6));
        assert_eq!((second_block.heap_offset, second_block.descriptor_num), (6, 6));
        assert_eq!(second.block(D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER).unwrap().heap_offset, 2);
        assert_eq!(pool.allocated_set_num(), 2);
    }

    #[test]
    fn pointers_resolve_within_the_block() {
        let device = MockDevice::new();
        let pool = pool(&device, 64, 16, 4);
        let _first = DescriptorSet::initialize(device.clone(), mapping(), 0, &pool).unwrap();
        let set = DescriptorSet::initialize(device.clone(), mapping(), 0, &pool).unwrap();

        let block = *set.block(D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV).unwrap();
        // Range 2 follows the 4 textures of range 0 in the resource heap
        let pointer = set.get_pointer(2, 1).unwrap();
        let expected_offset = (6 + 4 + 1) * RESOURCE_DESCRIPTOR_SIZE;
        assert_eq!(pointer.cpu.ptr, block.heap_cpu_start.ptr + expected_offset as usize);
        assert_eq!(pointer.gpu.ptr, block.heap_gpu_start.ptr + expected_offset as u64);

        let sampler_block = *set.block(D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER).unwrap();
        assert_eq!(set.get_gpu_pointer(1, 0).unwrap().ptr, sampler_block.heap_gpu_start.ptr + (2 * SAMPLER_DESCRIPTOR_SIZE) as u64);

        assert_eq!(set.get_pointer(0, 4), None);
        assert_eq!(set.get_cpu_pointer(3, 0), None);
    }

    #[test]
    fn exhausted_pools_fail_without_allocating() {
        let device = MockDevice::new();
        let pool = pool(&device, 8, 1, 4);

        let err = DescriptorSet::initialize(device.clone(), mapping(), 0, &pool).err().unwrap();
        assert_eq!(err, ral::Error::OutOfDescriptorPoolSpace { requested: 2, available: 1 });
        assert_eq!(err.kind(), ral::ErrorKind::OutOfMemory);
        assert_eq!(pool.allocated_set_num(), 0);
    }

    #[test]
    fn set_count_is_limited_until_reset() {
        let device = MockDevice::new();
        let pool = pool(&device, 64, 16, 1);
        DescriptorSet::initialize(device.clone(), mapping(), 0, &pool).unwrap();
        assert!(DescriptorSet::initialize(device.clone(), mapping(), 0, &pool).is_err());

        pool.reset();
        let set = DescriptorSet::initialize(device.clone(), mapping(), 0, &pool).unwrap();
        assert_eq!(set.block(D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV).unwrap().heap_offset, 0);
    }

    #[test]
    fn dynamic_buffers() {
        let device = MockDevice::new();
        let pool = pool(&device, 64, 16, 4);
        let set = DescriptorSet::initialize(device.clone(), mapping(), 2, &pool).unwrap();

        assert_eq!(set.dynamic_buffer_num(), 2);
        set.set_dynamic_buffer(1, 0x1_0000).unwrap();
        assert_eq!(set.get_dynamic_pointer(0), Some(0));
        assert_eq!(set.get_dynamic_pointer(1), Some(0x1_0000));
        assert_eq!(set.get_dynamic_pointer(2), None);
        assert!(set.set_dynamic_buffer(2, 0x2_0000).is_err());
    }

    #[test]
    fn updating_ranges_copies_descriptors() {
        let device = MockDevice::new();
        let pool = pool(&device, 64, 16, 4);
        let set = DescriptorSet::initialize(device.clone(), mapping(), 0, &pool).unwrap();
        let allocator = Arc::new(DescriptorHeapAllocator::new(device.clone(), 16));

        let first = Descriptor::new(&allocator, D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV).unwrap();
        let second = Descriptor::new(&allocator, D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV).unwrap();
        set.update_range(0, 2, &[&first, &second]).unwrap();

        let copies = device.copies.lock().clone();
        assert_eq!(copies, [
            (1, set.get_cpu_pointer(0, 2).unwrap(), first.cpu_pointer(), D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV),
            (1, set.get_cpu_pointer(0, 3).unwrap(), second.cpu_pointer(), D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV),
        ]);

        assert!(set.update_range(0, 3, &[&first, &second]).is_err());
        assert!(set.update_range(1, 0, &[&first]).is_err());
        assert!(set.update_range(5, 0, &[&first]).is_err());
    }

    #[test]
    fn sets_are_allocated_through_the_interface() {
        let device = MockDevice::new();
        let pool: ral::DescriptorPoolHandle = Arc::new(pool(&device, 64, 16, 4));
        let layout: ral::PipelineLayoutHandle = Arc::new(layout(&device));

        let set = pool.allocate_descriptor_set(&layout, 0).unwrap();
        assert_eq!(set.range_num(), 1);
        assert_eq!(set.dynamic_buffer_num(), 1);

        assert_eq!(pool.allocate_descriptor_set(&layout, 1).err(), Some(ral::Error::DescriptorSetIndexOutOfRange { index: 1, count: 1 }));
    }

    #[test]
    fn pools_release_their_heaps() {
        let device = MockDevice::new();
        drop(pool(&device, 64, 16, 4));
        assert_eq!(device.released.lock().len(), 2);
    }
}
