use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tessera_logging::log_error;
use tessera_ral as ral;
use windows::Win32::Graphics::Direct3D12::*;

use crate::{dx12_types::*, NativeDescriptorHeap, NativeDevice, NativeObject, LOG_CAT};

/// Reference to a single descriptor slot owned by a [`DescriptorHeapAllocator`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DescriptorHandle {
    pub heap_index:  u16,
    pub heap_offset: u16,
}

/// Fixed capacity descriptor heap
pub struct DescriptorHeap {
    heap:      NativeDescriptorHeap,
    heap_type: D3D12_DESCRIPTOR_HEAP_TYPE,
    capacity:  u32,
    stride:    u32,
}

impl DescriptorHeap {
    pub fn new(device: &dyn NativeDevice, heap_type: D3D12_DESCRIPTOR_HEAP_TYPE, capacity: u32, shader_visible: bool) -> ral::Result<Self> {
        let desc = DescriptorHeapDesc {
            heap_type,
            num_descriptors: capacity,
            shader_visible,
        };
        let heap = device.create_descriptor_heap(&desc)?;
        let stride = device.descriptor_handle_increment_size(heap_type);
        Ok(Self { heap, heap_type, capacity, stride })
    }

    pub fn native(&self) -> NativeObject {
        self.heap.heap
    }

    pub fn heap_type(&self) -> D3D12_DESCRIPTOR_HEAP_TYPE {
        self.heap_type
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Size of a single descriptor in the heap
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn cpu_pointer(&self, offset: u32) -> CpuDescriptorHandle {
        debug_assert!(offset < self.capacity, "Descriptor offset {offset} is out of range for a heap with {} descriptors", self.capacity);
        self.heap.cpu_start.offset(offset, self.stride)
    }

    /// Get the GPU pointer to a descriptor, only shader-visible heaps have a GPU pointer
    pub fn gpu_pointer(&self, offset: u32) -> Option<GpuDescriptorHandle> {
        debug_assert!(offset < self.capacity, "Descriptor offset {offset} is out of range for a heap with {} descriptors", self.capacity);
        self.heap.gpu_start.map(|start| start.offset(offset, self.stride))
    }
}

//==============================================================================================================================

/// Allocator handing out single descriptor slots from CPU-only heaps
/// 
/// Each heap type has its own free list, which grows by creating a new heap when it runs empty.
/// Slots are recycled in LIFO order.
pub struct DescriptorHeapAllocator {
    device:     Arc<dyn NativeDevice>,
    batch_size: u32,
    free_lists: [Mutex<Vec<DescriptorHandle>>; DESCRIPTOR_HEAP_TYPE_COUNT],
    heaps:      RwLock<Vec<DescriptorHeap>>,
}

impl DescriptorHeapAllocator {
    /// Create an allocator, the batch size is clamped to the range addressable by a descriptor handle
    pub fn new(device: Arc<dyn NativeDevice>, batch_size: u32) -> Self {
        Self {
            device,
            batch_size: batch_size.clamp(1, u16::MAX as u32 + 1),
            free_lists: Default::default(),
            heaps: RwLock::new(Vec::new()),
        }
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Number of heaps that have been created
    pub fn heap_count(&self) -> usize {
        self.heaps.read().len()
    }

    /// Allocate a descriptor slot
    pub fn allocate(&self, heap_type: D3D12_DESCRIPTOR_HEAP_TYPE) -> ral::Result<DescriptorHandle> {
        let mut free_list = self.free_lists[heap_type.index()].lock();
        if let Some(handle) = free_list.pop() {
            return Ok(handle);
        }

        let heap_index = {
            let mut heaps = self.heaps.write();
            if heaps.len() >= ral::constants::MAX_DESCRIPTOR_HEAP_NUM as usize {
                log_error!(LOG_CAT, Self::allocate, "Ran out of descriptor heap indices, {} heaps have been created", heaps.len());
                return Err(ral::Error::OutOfDescriptorHeapIndices);
            }

            let heap = DescriptorHeap::new(&*self.device, heap_type, self.batch_size, false)?;
            heaps.push(heap);
            (heaps.len() - 1) as u16
        };

        free_list.reserve(self.batch_size as usize);
        for heap_offset in (0..self.batch_size).rev() {
            free_list.push(DescriptorHandle { heap_index, heap_offset: heap_offset as u16 });
        }
        free_list.pop().ok_or(ral::Error::OutOfDescriptorHeapIndices)
    }

    /// Return a descriptor slot to its free list
    pub fn free(&self, heap_type: D3D12_DESCRIPTOR_HEAP_TYPE, handle: DescriptorHandle) {
        self.free_lists[heap_type.index()].lock().push(handle);
    }

    /// Get the CPU pointer of a descriptor slot
    pub fn resolve(&self, handle: DescriptorHandle) -> CpuDescriptorHandle {
        let heaps = self.heaps.read();
        heaps[handle.heap_index as usize].cpu_pointer(handle.heap_offset as u32)
    }

    /// Get the heap type a descriptor slot was allocated from
    pub fn heap_type_of(&self, handle: DescriptorHandle) -> D3D12_DESCRIPTOR_HEAP_TYPE {
        self.heaps.read()[handle.heap_index as usize].heap_type()
    }
}

impl Drop for DescriptorHeapAllocator {
    fn drop(&mut self) {
        for heap in self.heaps.get_mut().drain(..) {
            self.device.release(heap.native());
        }
    }
}

//==============================================================================================================================

/// Descriptor view slot, which is returned to the allocator when dropped
pub struct Descriptor {
    allocator: Arc<DescriptorHeapAllocator>,
    heap_type: D3D12_DESCRIPTOR_HEAP_TYPE,
    handle:    DescriptorHandle,
    cpu:       CpuDescriptorHandle,
}

impl Descriptor {
    pub fn new(allocator: &Arc<DescriptorHeapAllocator>, heap_type: D3D12_DESCRIPTOR_HEAP_TYPE) -> ral::Result<Self> {
        let handle = allocator.allocate(heap_type)?;
        let cpu = allocator.resolve(handle);
        Ok(Self {
            allocator: allocator.clone(),
            heap_type,
            handle,
            cpu,
        })
    }

    pub fn handle(&self) -> DescriptorHandle {
        self.handle
    }

    pub fn heap_type(&self) -> D3D12_DESCRIPTOR_HEAP_TYPE {
        self.heap_type
    }

    /// CPU pointer the view's descriptor is written to
    pub fn cpu_pointer(&self) -> CpuDescriptorHandle {
        self.cpu
    }
}

impl Drop for Descriptor {
    fn drop(&mut self) {
        self.allocator.free(self.heap_type, self.handle);
    }
}
