use crate::{DescriptorPoolDesc, DescriptorPoolHandle, PipelineLayoutDesc, PipelineLayoutHandle, Result};

/// Capabilities of a device relevant to synchronization and resource binding
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct BindingCapabilities {
    /// Fine-grained sync/access/layout barriers are supported
    pub enhanced_barriers:      bool,
    /// Base vertex and base instance are available to shaders without emulation
    pub native_draw_parameters: bool,
    /// Mesh shaders are supported
    pub mesh_shaders:           bool,
}

/// Backend implementation of a device
pub trait DeviceInterface: Send + Sync {
    /// Get the binding related capabilities of the device
    fn binding_capabilities(&self) -> BindingCapabilities;

    /// Create a pipeline layout
    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc) -> Result<PipelineLayoutHandle>;

    /// Create a descriptor pool
    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> Result<DescriptorPoolHandle>;
}
