//! Recording stand-ins for the native device and command list.

use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tessera_ral as ral;
use windows::Win32::Graphics::Direct3D12::*;

use crate::{dx12_types::*, BindPoint, NativeCommandList, NativeDescriptorHeap, NativeDevice, NativeObject};

pub const RESOURCE_DESCRIPTOR_SIZE: u32 = 32;
pub const SAMPLER_DESCRIPTOR_SIZE: u32 = 16;
pub const RTV_DSV_DESCRIPTOR_SIZE: u32 = 8;

#[derive(Default)]
pub struct MockDevice {
    pub heaps:              Mutex<Vec<DescriptorHeapDesc>>,
    pub root_signatures:    Mutex<Vec<RootSignatureDesc>>,
    pub command_signatures: Mutex<Vec<(CommandSignatureDesc, Option<NativeObject>)>>,
    pub copies:             Mutex<Vec<(u32, CpuDescriptorHandle, CpuDescriptorHandle, D3D12_DESCRIPTOR_HEAP_TYPE)>>,
    pub released:           Mutex<Vec<NativeObject>>,
    next_object:            AtomicU64,
}

impl MockDevice {
    pub fn new() -> Arc<MockDevice> {
        Arc::new(MockDevice::default())
    }

    fn next_object(&self) -> NativeObject {
        NativeObject(self.next_object.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

impl NativeDevice for MockDevice {
    fn create_descriptor_heap(&self, desc: &DescriptorHeapDesc) -> ral::Result<NativeDescriptorHeap> {
        if desc.shader_visible && !desc.heap_type.can_be_shader_visible() {
            return Err(ral::Error::InvalidParameter("RTV and DSV heaps can't be shader visible".to_string()));
        }
        self.heaps.lock().push(*desc);

        let heap = self.next_object();
        Ok(NativeDescriptorHeap {
            heap,
            cpu_start: CpuDescriptorHandle { ptr: (heap.0 as usize) << 32 },
            gpu_start: desc.shader_visible.then(|| GpuDescriptorHandle { ptr: heap.0 << 40 }),
        })
    }

    fn descriptor_handle_increment_size(&self, heap_type: D3D12_DESCRIPTOR_HEAP_TYPE) -> u32 {
        match heap_type {
            D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV => RESOURCE_DESCRIPTOR_SIZE,
            D3D12_DESCRIPTOR_HEAP_TYPE_SAMPLER     => SAMPLER_DESCRIPTOR_SIZE,
            _                                      => RTV_DSV_DESCRIPTOR_SIZE,
        }
    }

    fn create_root_signature(&self, desc: &RootSignatureDesc) -> ral::Result<NativeObject> {
        self.root_signatures.lock().push(desc.clone());
        Ok(self.next_object())
    }

    fn create_command_signature(&self, desc: &CommandSignatureDesc, root_signature: Option<NativeObject>) -> ral::Result<NativeObject> {
        self.command_signatures.lock().push((desc.clone(), root_signature));
        Ok(self.next_object())
    }

    fn copy_descriptors_simple(&self, num_descriptors: u32, dst_start: CpuDescriptorHandle, src_start: CpuDescriptorHandle, heap_type: D3D12_DESCRIPTOR_HEAP_TYPE) {
        self.copies.lock().push((num_descriptors, dst_start, src_start, heap_type));
    }

    fn release(&self, object: NativeObject) {
        self.released.lock().push(object);
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RecordedCommand {
    ResourceBarrier(Vec<ResourceBarrier>),
    Barrier(Vec<BarrierGroup>),
    SetDescriptorHeaps(Vec<NativeObject>),
    SetRootSignature(BindPoint, NativeObject),
    SetRootDescriptorTable(BindPoint, u32, GpuDescriptorHandle),
    SetRoot32BitConstants(BindPoint, u32, Vec<u32>, u32),
    SetRootConstantBufferView(BindPoint, u32, u64),
    ExecuteIndirect {
        command_signature: NativeObject,
        max_command_count: u32,
        argument_buffer:   ral::ResourceHandle,
        argument_offset:   u64,
        count_buffer:      Option<(ral::ResourceHandle, u64)>,
    },
}

#[derive(Default)]
pub struct MockCommandList {
    pub commands: Vec<RecordedCommand>,
}

impl NativeCommandList for MockCommandList {
    fn resource_barrier(&mut self, barriers: &[ResourceBarrier]) {
        self.commands.push(RecordedCommand::ResourceBarrier(barriers.to_vec()));
    }

    fn barrier(&mut self, groups: &[BarrierGroup]) {
        self.commands.push(RecordedCommand::Barrier(groups.to_vec()));
    }

    fn set_descriptor_heaps(&mut self, heaps: &[NativeObject]) {
        self.commands.push(RecordedCommand::SetDescriptorHeaps(heaps.to_vec()));
    }

    fn set_root_signature(&mut self, bind_point: BindPoint, root_signature: NativeObject) {
        self.commands.push(RecordedCommand::SetRootSignature(bind_point, root_signature));
    }

    fn set_root_descriptor_table(&mut self, bind_point: BindPoint, root_parameter_index: u32, base_descriptor: GpuDescriptorHandle) {
        self.commands.push(RecordedCommand::SetRootDescriptorTable(bind_point, root_parameter_index, base_descriptor));
    }

    fn set_root_32bit_constants(&mut self, bind_point: BindPoint, root_parameter_index: u32, values: &[u32], dest_offset_in_32bit_values: u32) {
        self.commands.push(RecordedCommand::SetRoot32BitConstants(bind_point, root_parameter_index, values.to_vec(), dest_offset_in_32bit_values));
    }

    fn set_root_constant_buffer_view(&mut self, bind_point: BindPoint, root_parameter_index: u32, buffer_location: u64) {
        self.commands.push(RecordedCommand::SetRootConstantBufferView(bind_point, root_parameter_index, buffer_location));
    }

    fn execute_indirect(&mut self, command_signature: NativeObject, max_command_count: u32, argument_buffer: ral::ResourceHandle, argument_buffer_offset: u64, count_buffer: Option<(ral::ResourceHandle, u64)>) {
        self.commands.push(RecordedCommand::ExecuteIndirect {
            command_signature,
            max_command_count,
            argument_buffer,
            argument_offset: argument_buffer_offset,
            count_buffer,
        });
    }
}
