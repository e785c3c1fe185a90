use std::sync::Arc;

use tessera_logging::log_error;
use tessera_ral as ral;
use ral::{CommandListType, IndirectArgs, IndirectCommandKind};

use crate::{
    indirect_argument_size, CommandSignatureCache, DescriptorPool, DescriptorSet, NativeCommandList, PipelineLayout, ResourceStateTranslator,
    SyncModel, UNUSED_ROOT_INDEX, LOG_CAT,
};

/// Validation done when recording barriers
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct BarrierValidation {
    pub enabled:   bool,
    /// Report barriers that don't change the state
    pub redundant: bool,
}

/// Command list recording into a native command list
/// 
/// Tracks the bound pipeline layout and descriptor pool, so descriptor sets and push constants can be resolved to root parameters.
pub struct CommandList<L: NativeCommandList> {
    native:     L,
    list_type:  CommandListType,
    translator: ResourceStateTranslator,
    signatures: Arc<CommandSignatureCache>,
    validation: BarrierValidation,
    layout:     Option<ral::PipelineLayoutHandle>,
    pool:       Option<ral::DescriptorPoolHandle>,
}

impl<L: NativeCommandList> CommandList<L> {
    pub fn new(native: L, list_type: CommandListType, sync_model: SyncModel, signatures: Arc<CommandSignatureCache>, validation: BarrierValidation) -> Self {
        Self {
            native,
            list_type,
            translator: ResourceStateTranslator::new(sync_model, list_type),
            signatures,
            validation,
            layout: None,
            pool: None,
        }
    }

    pub fn native(&self) -> &L {
        &self.native
    }

    pub fn native_mut(&mut self) -> &mut L {
        &mut self.native
    }

    pub fn into_native(self) -> L {
        self.native
    }

    /// Forget the bound pipeline layout and descriptor pool, used when the native command list is reset
    pub fn reset_bindings(&mut self) {
        self.layout = None;
        self.pool = None;
    }

    fn bound_layout(&self) -> Option<&PipelineLayout> {
        self.layout.as_ref()?.as_any().downcast_ref::<PipelineLayout>()
    }
}

impl<L: NativeCommandList> ral::CommandListInterface for CommandList<L> {
    fn list_type(&self) -> CommandListType {
        self.list_type
    }

    fn barrier(&mut self, barriers: &ral::BarrierGroupDesc) {
        #[cfg(feature = "validation")]
        if self.validation.enabled {
            if let Err(err) = barriers.validate(self.list_type, self.validation.redundant) {
                log_error!(LOG_CAT, Self::barrier, "Skipping invalid barrier group: {err}");
                return;
            }
        }

        self.translator.translate_group(barriers).record(&mut self.native);
    }

    fn set_descriptor_pool(&mut self, pool: &ral::DescriptorPoolHandle) {
        if self.pool.as_ref().is_some_and(|bound| Arc::as_ptr(bound) as *const () == Arc::as_ptr(pool) as *const ()) {
            return;
        }
        let Some(dx_pool) = pool.as_any().downcast_ref::<DescriptorPool>() else {
            log_error!(LOG_CAT, Self::set_descriptor_pool, "Descriptor pool was not created by the DX12 backend");
            return;
        };

        self.native.set_descriptor_heaps(&dx_pool.native_heaps());
        self.pool = Some(pool.clone());
    }

    fn set_pipeline_layout(&mut self, layout: &ral::PipelineLayoutHandle) {
        let Some(dx_layout) = layout.as_any().downcast_ref::<PipelineLayout>() else {
            log_error!(LOG_CAT, Self::set_pipeline_layout, "Pipeline layout was not created by the DX12 backend");
            return;
        };
        if self.bound_layout().is_some_and(|bound| bound.id() == dx_layout.id()) {
            return;
        }

        self.native.set_root_signature(dx_layout.bind_point(), dx_layout.root_signature());
        self.layout = Some(layout.clone());
    }

    fn set_descriptor_set(&mut self, set_index: u32, set: &ral::DescriptorSetHandle, dynamic_offsets: &[u32]) {
        let Some(layout) = self.layout.as_ref().and_then(|layout| layout.as_any().downcast_ref::<PipelineLayout>()) else {
            log_error!(LOG_CAT, Self::set_descriptor_set, "Cannot bind descriptor set {set_index}, no pipeline layout is bound");
            return;
        };
        let Some(set) = set.as_any().downcast_ref::<DescriptorSet>() else {
            log_error!(LOG_CAT, Self::set_descriptor_set, "Descriptor set was not created by the DX12 backend");
            return;
        };
        let Some(root_info) = layout.bindings().set_root_info.get(set_index as usize) else {
            log_error!(LOG_CAT, Self::set_descriptor_set, "Descriptor set index {set_index} is out of range, the bound pipeline layout has {} sets", layout.bindings().set_root_info.len());
            return;
        };
        if dynamic_offsets.len() != root_info.dynamic_buffer_num as usize {
            log_error!(LOG_CAT, Self::set_descriptor_set, "Descriptor set {set_index} has {} dynamic constant buffers, but {} offsets were provided", root_info.dynamic_buffer_num, dynamic_offsets.len());
            return;
        }
        #[cfg(feature = "validation")]
        if layout.bindings().set_mappings[set_index as usize] != *set.mapping() {
            log_error!(LOG_CAT, Self::set_descriptor_set, "Descriptor set does not match the layout of set {set_index} in the bound pipeline layout");
            return;
        }

        let bind_point = layout.bind_point();
        for (range_index, root_index) in root_info.range_root_indices.iter().enumerate() {
            if *root_index == UNUSED_ROOT_INDEX {
                continue;
            }
            if let Some(pointer) = set.get_gpu_pointer(range_index as u32, 0) {
                self.native.set_root_descriptor_table(bind_point, *root_index, pointer);
            }
        }
        for (idx, offset) in dynamic_offsets.iter().enumerate() {
            let address = set.get_dynamic_pointer(idx as u32).unwrap_or_default() + *offset as u64;
            self.native.set_root_constant_buffer_view(bind_point, root_info.dynamic_buffer_base + idx as u32, address);
        }
    }

    fn set_push_constants(&mut self, push_constant_index: u32, offset: u32, data: &[u32]) {
        let Some(layout) = self.layout.as_ref().and_then(|layout| layout.as_any().downcast_ref::<PipelineLayout>()) else {
            log_error!(LOG_CAT, Self::set_push_constants, "Cannot set push constants, no pipeline layout is bound");
            return;
        };
        let bindings = layout.bindings();
        if push_constant_index >= bindings.push_constant_num {
            log_error!(LOG_CAT, Self::set_push_constants, "Push constant range {push_constant_index} is out of range, the bound pipeline layout has {} ranges", bindings.push_constant_num);
            return;
        }

        self.native.set_root_32bit_constants(layout.bind_point(), bindings.push_constant_base + push_constant_index, data, offset);
    }

    fn execute_indirect(&mut self, kind: IndirectCommandKind, args: &IndirectArgs) {
        let Some(layout) = self.layout.as_ref().and_then(|layout| layout.as_any().downcast_ref::<PipelineLayout>()) else {
            log_error!(LOG_CAT, Self::execute_indirect, "Cannot execute indirect {kind} commands, no pipeline layout is bound");
            return;
        };

        let emulated_draw_parameters = layout.bindings().draw_parameters_index.is_some();
        let stride = if args.stride == 0 { indirect_argument_size(kind, emulated_draw_parameters) } else { args.stride };
        let signature = match self.signatures.get_or_create(layout, stride, kind) {
            Ok(signature) => signature,
            Err(err) => {
                log_error!(LOG_CAT, Self::execute_indirect, "Skipping indirect {kind} commands: {err}");
                return;
            },
        };

        self.native.execute_indirect(signature, args.max_command_num, args.buffer, args.offset, args.count_buffer);
    }
}
