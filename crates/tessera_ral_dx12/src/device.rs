use std::sync::Arc;

use tessera_logging::{log_error, log_info};
use tessera_ral as ral;
use ral::constants::{DEFAULT_DESCRIPTOR_HEAP_BATCH_SIZE, MAX_DESCRIPTOR_HEAP_NUM};
use windows::Win32::Graphics::Direct3D12::{D3D12_HEAP_DESC, D3D_ROOT_SIGNATURE_VERSION_1_1};

use crate::{
    BarrierValidation, CommandList, CommandSignatureCache, DescriptorHeapAllocator, DescriptorPool, MemoryType, NativeCommandList, NativeDevice, PipelineLayout,
    PipelineLayoutBuilder, PipelineLayoutRegistry, SyncModel, DEFAULT_MEMORY_TYPES, LOG_CAT,
};

/// Device features relevant to synchronization and resource binding
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct DeviceCaps {
    /// `D3D12_FEATURE_DATA_D3D12_OPTIONS12::EnhancedBarriersSupported`
    pub enhanced_barriers:      bool,
    /// Root signature version 1.1 is supported
    pub root_signature_1_1:     bool,
    /// `SV_StartVertexLocation` and `SV_StartInstanceLocation` are supported
    pub native_draw_parameters: bool,
    pub mesh_shaders:           bool,
}

/// DX12 specific settings, read from the `[dx12]` table of the RAL settings
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Dx12Settings {
    /// Use enhanced barriers when the device supports them
    pub enhanced_barriers:             bool,
    /// Number of descriptors in each CPU descriptor heap
    pub descriptor_heap_batch_size:    u32,
    /// Deny root signature access to shader stages a pipeline layout doesn't use
    pub deny_unused_stage_root_access: bool,
    /// Use root signature version 1.1 when the device supports it
    pub root_signature_1_1:            bool,
}

impl Dx12Settings {
    pub fn from_settings(settings: &ral::Settings) -> Self {
        let table = &settings.api_specific;
        let flag = |name: &str, default: bool| table.get(name).and_then(toml::Value::as_bool).unwrap_or(default);
        let defaults = Self::default();

        let descriptor_heap_batch_size = table.get("descriptor-heap-batch-size")
            .and_then(toml::Value::as_integer)
            .map_or(defaults.descriptor_heap_batch_size, |size| size.clamp(1, MAX_DESCRIPTOR_HEAP_NUM as i64) as u32);

        Self {
            enhanced_barriers: flag("enhanced-barriers", defaults.enhanced_barriers),
            descriptor_heap_batch_size,
            deny_unused_stage_root_access: flag("deny-unused-stage-root-access", defaults.deny_unused_stage_root_access),
            root_signature_1_1: flag("root-signature-1-1", defaults.root_signature_1_1),
        }
    }
}

impl Default for Dx12Settings {
    fn default() -> Self {
        Self {
            enhanced_barriers: true,
            descriptor_heap_batch_size: DEFAULT_DESCRIPTOR_HEAP_BATCH_SIZE,
            deny_unused_stage_root_access: true,
            root_signature_1_1: true,
        }
    }
}

//==============================================================================================================================
// DEVICE
//==============================================================================================================================

/// DX12 device, owns the device-wide descriptor allocator, layout registry and command signature cache
pub struct Device {
    native:     Arc<dyn NativeDevice>,
    caps:       DeviceCaps,
    settings:   Dx12Settings,
    sync_model: SyncModel,
    validation: BarrierValidation,
    allocator:  Arc<DescriptorHeapAllocator>,
    registry:   Arc<PipelineLayoutRegistry>,
    builder:    PipelineLayoutBuilder,
    signatures: Arc<CommandSignatureCache>,
}

impl Device {
    pub fn new(native: Arc<dyn NativeDevice>, caps: DeviceCaps, settings: &ral::Settings) -> Self {
        let dx_settings = Dx12Settings::from_settings(settings);
        let sync_model = SyncModel::select(dx_settings.enhanced_barriers, &caps);
        let builder = PipelineLayoutBuilder::new(&caps, &dx_settings);

        log_info!(LOG_CAT, "Created DX12 device: {sync_model} barriers, root signature version {}, {} draw parameters",
            if builder.root_signature_version() == D3D_ROOT_SIGNATURE_VERSION_1_1 { "1.1" } else { "1.0" },
            if caps.native_draw_parameters { "native" } else { "emulated" }
        );

        Self {
            allocator: Arc::new(DescriptorHeapAllocator::new(native.clone(), dx_settings.descriptor_heap_batch_size)),
            registry: Arc::new(PipelineLayoutRegistry::new()),
            signatures: Arc::new(CommandSignatureCache::new(native.clone(), caps)),
            native,
            caps,
            settings: dx_settings,
            sync_model,
            validation: BarrierValidation {
                enabled: settings.debug_validation,
                redundant: settings.debug_redundant_barriers,
            },
            builder,
        }
    }

    pub fn native(&self) -> &Arc<dyn NativeDevice> {
        &self.native
    }

    pub fn caps(&self) -> DeviceCaps {
        self.caps
    }

    pub fn settings(&self) -> &Dx12Settings {
        &self.settings
    }

    pub fn sync_model(&self) -> SyncModel {
        self.sync_model
    }

    /// CPU descriptor allocator used for descriptor views
    pub fn descriptor_allocator(&self) -> &Arc<DescriptorHeapAllocator> {
        &self.allocator
    }

    pub fn command_signatures(&self) -> &Arc<CommandSignatureCache> {
        &self.signatures
    }

    /// Memory types resources can be placed in, clients refer to them by their [`MemoryType::to_bits`] token
    pub fn memory_types(&self) -> &[MemoryType] {
        &DEFAULT_MEMORY_TYPES
    }

    /// Describe a heap for a memory type token
    pub fn heap_desc(&self, memory_type_token: u32, size: u64, alignment: u64) -> ral::Result<D3D12_HEAP_DESC> {
        let memory_type = match MemoryType::from_bits(memory_type_token) {
            Some(memory_type) if self.memory_types().iter().any(|supported| supported.heap_type == memory_type.heap_type) => memory_type,
            _ => {
                log_error!(LOG_CAT, Self::heap_desc, "Invalid memory type token {memory_type_token:#010X}");
                return Err(ral::Error::InvalidParameter(format!("Invalid memory type token {memory_type_token:#010X}")));
            }
        };
        if size == 0 {
            return Err(ral::Error::InvalidParameter("Heaps need a non-zero size".to_string()));
        }
        Ok(memory_type.heap_desc(size, alignment))
    }

    /// Wrap a native command list, so it can record RAL commands
    pub fn create_command_list<L: NativeCommandList>(&self, native: L, list_type: ral::CommandListType) -> CommandList<L> {
        CommandList::new(native, list_type, self.sync_model, self.signatures.clone(), self.validation)
    }
}

impl ral::DeviceInterface for Device {
    fn binding_capabilities(&self) -> ral::BindingCapabilities {
        ral::BindingCapabilities {
            enhanced_barriers: self.sync_model == SyncModel::Enhanced,
            native_draw_parameters: self.caps.native_draw_parameters,
            mesh_shaders: self.caps.mesh_shaders,
        }
    }

    fn create_pipeline_layout(&self, desc: &ral::PipelineLayoutDesc) -> ral::Result<ral::PipelineLayoutHandle> {
        let layout = PipelineLayout::new(self.native.clone(), self.registry.clone(), &self.builder, desc)?;
        Ok(Arc::new(layout))
    }

    fn create_descriptor_pool(&self, desc: &ral::DescriptorPoolDesc) -> ral::Result<ral::DescriptorPoolHandle> {
        Ok(Arc::new(DescriptorPool::new(self.native.clone(), desc)?))
    }
}

static_assertions::assert_impl_all!(Device: Send, Sync);
