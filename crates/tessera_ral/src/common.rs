use core::{fmt, num::NonZeroU16};

use tessera_common_macros::{flags, EnumCount, EnumDisplay};

use crate::{Error, Result};

//==============================================================================================================================
// SHADERS
//==============================================================================================================================

/// Shader mask
#[flags(u16)]
pub enum ShaderTypeMask {
    /// Vertex shader
    Vertex,
    /// Pixel/fragment shader
    Pixel,
    /// Task/amplification shader
    Task,
    /// Mesh shader
    Mesh,
    /// Compute shader
    Compute,
    /// Ray tracing shaders
    RayTracing,
    /// All graphics shaders
    Graphics = Vertex | Pixel | Task | Mesh,
    /// All shaders
    All = Graphics | Compute | RayTracing,
}

impl ShaderTypeMask {
    /// Check if the mask only contains graphics shaders
    pub fn is_graphics_only(self) -> bool {
        self.is_any() && (self & !ShaderTypeMask::Graphics).is_none()
    }
}

//==============================================================================================================================
// COMMAND LISTS
//==============================================================================================================================

/// Command list type
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumCount, EnumDisplay)]
pub enum CommandListType {
    /// Graphics command list
    Graphics,
    /// Compute command list
    Compute,
    /// Copy command list
    Copy,
    /// Bundle/secondary command buffer
    /// 
    /// Bundles are limited to being executed on graphics command lists
    Bundle,
}

//==============================================================================================================================
// RESOURCES
//==============================================================================================================================

/// Opaque reference to a resource owned by the backend's native API.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct ResourceHandle(pub u64);

impl ResourceHandle {
    /// Handle not referencing any resource
    pub const NULL: ResourceHandle = ResourceHandle(0);

    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Texture aspect
#[flags]
pub enum TextureAspect {
    /// Color aspect
    Color,
    /// Depth aspect
    Depth,
    /// Stencil aspect
    Stencil,
}

impl TextureAspect {
    /// Number of planes a texture with the given aspects consists of
    pub fn plane_count(self) -> u16 {
        if self.contains(TextureAspect::Depth | TextureAspect::Stencil) { 2 } else { 1 }
    }
}

/// Texture subresource range
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TextureSubresourceRange {
    /// Aspects of the texture that are part of the range
    pub aspect:       TextureAspect,
    /// First mip level in the range
    pub base_mip:     u16,
    /// Number of mip levels, `None` means all remaining mip levels
    pub mip_levels:   Option<NonZeroU16>,
    /// First array layer in the range
    pub base_layer:   u16,
    /// Number of array layers, `None` means all remaining array layers
    pub array_layers: Option<NonZeroU16>,
}

impl TextureSubresourceRange {
    /// Range covering all mips and layers of the given aspects
    pub const fn full(aspect: TextureAspect) -> Self {
        Self { aspect, base_mip: 0, mip_levels: None, base_layer: 0, array_layers: None }
    }

    /// Number of mip levels in the range, for a texture with `total_mips` mip levels
    pub fn mip_count(&self, total_mips: u16) -> u16 {
        self.mip_levels.map_or(total_mips.saturating_sub(self.base_mip), NonZeroU16::get)
    }

    /// Number of array layers in the range, for a texture with `total_layers` array layers
    pub fn layer_count(&self, total_layers: u16) -> u16 {
        self.array_layers.map_or(total_layers.saturating_sub(self.base_layer), NonZeroU16::get)
    }

    /// Check if the range covers every subresource of a texture
    pub fn covers(&self, texture_aspect: TextureAspect, total_mips: u16, total_layers: u16) -> bool {
        self.aspect.contains(texture_aspect) &&
        self.base_mip == 0 && self.mip_count(total_mips) >= total_mips &&
        self.base_layer == 0 && self.layer_count(total_layers) >= total_layers
    }
}

//==============================================================================================================================
// BARRIERS
//==============================================================================================================================

/// Access flags
#[flags(u32)]
pub enum Access {
    /// Vertex buffer read access
    VertexBuffer,
    /// Index buffer read access
    IndexBuffer,
    /// Render target read access
    RenderTargetRead,
    /// Render target write access
    RenderTargetWrite,
    /// Depth/stencil read access
    DepthStencilRead,
    /// Depth/stencil write access
    DepthStencilWrite,
    /// Constant buffer read access
    ConstantBuffer,
    /// Sampled read access (sampled textures and constant texel buffers)
    SampledRead,
    /// Storage read access (storage buffers, storage textures, and storage texel buffer)
    StorageRead,
    /// Shader table read access
    ShaderTableRead,
    /// Storage write access (storage buffers, storage textures, and storage texel buffer)
    StorageWrite,
    /// Present access
    Present,
    /// Indirect argument access
    Indirect,
    /// Conditional/predicate access (for conditional rendering)
    Conditional,
    /// Acceleration structure read access
    AccelerationStructureRead,
    /// Acceleration structure write access
    AccelerationStructureWrite,
    /// Copy read accesses
    CopyRead,
    /// Copy write accesses
    CopyWrite,
    /// Resolve read access
    ResolveRead,
    /// Resolve write access
    ResolveWrite,
    /// Host read accesses
    HostRead,
    /// Host write accesses
    HostWrite,
    /// Shading rate attachment read access
    ShadingRateRead,
    /// All read accesses
    /// 
    /// Using specific flags is preferable, as this may cause additional cache flushes
    MemoryRead,
    /// All write accesses
    /// 
    /// Using specific flags is preferable, as this may cause additional cache flushes
    MemoryWrite,
    /// Any shader read access
    ShaderRead = ConstantBuffer | SampledRead | StorageRead | ShaderTableRead,
    /// Read and write access to storage resources
    Storage = StorageRead | StorageWrite,
}

/// Resource sync point
#[flags(u32)]
pub enum SyncPoint {
    /// Sync at the start of all commands
    /// 
    /// Only valid when passed as a `before` state
    /// 
    /// Functionally equivalent to 'All'
    Top,
    /// Sync at the end of all commands
    /// 
    /// Only valid when passed as a `after` state
    /// 
    /// Functionally equivalent to 'All'
    Bottom,
    /// All work must be completed
    All,
    /// Sync at a `draw_indirect` or `dispatch_indirect` call
    DrawIndirect,
    /// Sync at vertex buffer input
    VertexInput,
    /// Sync at index buffer input
    IndexInput,
    /// Sync at the vertex shader stage
    Vertex,
    /// Sync at the task shader stage
    Task,
    /// Sync at the mesh shader stage
    Mesh,
    /// Sync at the pixel shader stage
    Pixel,
    /// Sync at pre-pixel operations stage (before the pixel shader is run, including depth/stencil loads)
    PrePixelOps,
    /// Sync at post-pixel operations stage (after the pixel shader is run, inclusing depth/stencil writes)
    PostPixelOps,
    /// Sync at render target write (including blend, logic, load, and stores)
    RenderTarget,
    /// Sync at the compute shader stage
    Compute,
    /// Sync at the host access stage
    Host,
    /// Sync at the copy stage
    Copy,
    /// Sync at the resolve stage
    Resolve,
    /// Sync at the clear stage
    Clear,
    /// Sync at the ray tracing shader stage
    RayTracing,
    /// Sync at the acceleration structure build stage
    AccelerationStructureBuild,
    /// Sync at the acceleration structure copy stage
    AccelerationStructureCopy,
    /// Sync at the acceleration structure query stage
    AccelerationStructureQuery,
    /// Sync at the conditial rendering stage
    Conditional,
    /// Sync at the shading rate stage
    ShadingRate,
    /// All graphics stages
    Graphics,
    /// Sync at the input assembler
    InputAssembler = VertexInput | IndexInput,
    /// Sync at the pre-rasterization stages
    PreRaster = Vertex | Task | Mesh,
}

/// Texture layout
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumDisplay)]
pub enum TextureLayout {
    /// Undefined layout, the texture content is not preserved when transitioning from this layout
    Undefined,
    /// Preinitialized layout, content was written by the host
    Preinitialized,
    /// Common layout, usable by shader, copy and host access
    Common,
    /// Read-only layout
    ReadOnly,
    /// Shader read layout
    ShaderRead,
    /// Shader write layout
    ShaderWrite,
    /// Generic attachment layout
    Attachment,
    /// Render target layout
    RenderTarget,
    /// Depth/stencil layout
    DepthStencil,
    /// Read-only depth/stencil layout
    DepthStencilReadOnly,
    /// Read-only depth, read-write stencil layout
    DepthRoStencilRw,
    /// Read-write depth, read-only stencil layout
    DepthRwStencilRo,
    /// Depth layout
    Depth,
    /// Read-only depth layout
    DepthReadOnly,
    /// Stencil layout
    Stencil,
    /// Read-only stencil layout
    StencilReadOnly,
    /// Copy source layout
    CopySrc,
    /// Copy destination layout
    CopyDst,
    /// Resolve source layout
    ResolveSrc,
    /// Resolve destination layout
    ResolveDst,
    /// Present layout
    Present,
    /// Shading rate image layout
    ShadingRate,
}

impl TextureLayout {
    /// Get the accesses that are allowed in this layout, `None` means any access is allowed
    pub fn allowed_access(self) -> Option<Access> {
        let allowed = match self {
            TextureLayout::Undefined            |
            TextureLayout::Preinitialized       => Access::None,
            TextureLayout::Common               => Access::ShaderRead | Access::StorageWrite | Access::CopyRead | Access::CopyWrite | Access::HostRead | Access::HostWrite,
            TextureLayout::ReadOnly             => Access::ShaderRead | Access::ShadingRateRead | Access::ResolveRead | Access::CopyRead,
            TextureLayout::ShaderRead           => Access::ShaderRead,
            TextureLayout::ShaderWrite          => Access::Storage,
            TextureLayout::RenderTarget         => Access::RenderTargetRead | Access::RenderTargetWrite,
            TextureLayout::DepthStencil         |
            TextureLayout::DepthRoStencilRw     |
            TextureLayout::DepthRwStencilRo     |
            TextureLayout::Depth                |
            TextureLayout::Stencil              => Access::DepthStencilRead | Access::DepthStencilWrite,
            TextureLayout::DepthStencilReadOnly |
            TextureLayout::DepthReadOnly        |
            TextureLayout::StencilReadOnly      => Access::DepthStencilRead,
            TextureLayout::CopySrc              => Access::CopyRead,
            TextureLayout::CopyDst              => Access::CopyWrite,
            TextureLayout::ResolveSrc           => Access::ResolveRead,
            TextureLayout::ResolveDst           => Access::ResolveWrite,
            TextureLayout::ShadingRate          => Access::ShadingRateRead,
            TextureLayout::Attachment           |
            TextureLayout::Present              => return None,
        };
        Some(allowed)
    }
}

/// Resource state
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ResourceState {
    /// Resource access
    pub access:     Access,
    /// Resource sync point
    pub sync_point: SyncPoint,
    /// Texture layout
    pub layout:     Option<TextureLayout>,
}

impl ResourceState {
    pub const fn new(access: Access, sync_point: SyncPoint) -> Self {
        Self { access, sync_point, layout: None }
    }

    pub const fn new_tex(access: Access, sync_point: SyncPoint, layout: TextureLayout) -> Self {
        Self { access, sync_point, layout: Some(layout) }
    }

    /// Validate the state for a command list, `is_after_state` selects which side of a barrier the state is on
    #[allow(unused_variables)]
    pub fn validate(&self, list_type: CommandListType, is_after_state: bool) -> Result<()> {
        #[cfg(feature = "validation")]
        {
            if self.sync_point.contains(SyncPoint::Top) && is_after_state {
                return Err(Error::InvalidBarrier("`Top` sync point is only valid in the before state".to_string()));
            }
            if self.sync_point.contains(SyncPoint::Bottom) && !is_after_state {
                return Err(Error::InvalidBarrier("`Bottom` sync point is only valid in the after state".to_string()));
            }

            let unsupported = self.sync_point & !Self::supported_sync_points(list_type);
            if unsupported.is_any() {
                return Err(Error::InvalidBarrier(format!("Sync point `{unsupported}` is not supported on `{list_type}` command lists")));
            }

            let all_commands = SyncPoint::Top | SyncPoint::Bottom | SyncPoint::All;
            let all_graphics = all_commands | SyncPoint::Graphics;
            let all_shader = all_graphics | SyncPoint::PreRaster | SyncPoint::Pixel | SyncPoint::Compute | SyncPoint::RayTracing;
            let accel_struct = SyncPoint::AccelerationStructureBuild | SyncPoint::AccelerationStructureCopy;

            let rules = [
                (Access::VertexBuffer,               all_graphics | SyncPoint::VertexInput),
                (Access::IndexBuffer,                all_graphics | SyncPoint::IndexInput),
                (Access::RenderTargetRead,           all_graphics | SyncPoint::RenderTarget),
                (Access::RenderTargetWrite,          all_graphics | SyncPoint::RenderTarget | SyncPoint::Clear),
                (Access::DepthStencilRead,           all_graphics | SyncPoint::PrePixelOps | SyncPoint::PostPixelOps),
                (Access::DepthStencilWrite,          all_graphics | SyncPoint::PrePixelOps | SyncPoint::PostPixelOps | SyncPoint::Clear),
                (Access::ConstantBuffer,             all_shader),
                (Access::SampledRead,                all_shader),
                (Access::StorageRead,                all_shader | SyncPoint::AccelerationStructureBuild),
                (Access::ShaderTableRead,            all_commands | SyncPoint::RayTracing),
                (Access::StorageWrite,               all_shader | SyncPoint::Clear),
                (Access::Indirect,                   all_graphics | SyncPoint::DrawIndirect),
                (Access::Conditional,                all_graphics | SyncPoint::Conditional),
                (Access::AccelerationStructureRead,  all_shader | accel_struct | SyncPoint::AccelerationStructureQuery),
                (Access::AccelerationStructureWrite, all_commands | accel_struct),
                (Access::CopyRead,                   all_commands | SyncPoint::Copy | SyncPoint::AccelerationStructureBuild),
                (Access::CopyWrite,                  all_commands | SyncPoint::Copy | SyncPoint::AccelerationStructureBuild),
                (Access::ResolveRead,                all_commands | SyncPoint::Resolve),
                (Access::ResolveWrite,               all_commands | SyncPoint::Resolve),
                (Access::HostRead,                   SyncPoint::Host),
                (Access::HostWrite,                  SyncPoint::Host),
                (Access::ShadingRateRead,            all_commands | SyncPoint::ShadingRate),
            ];
            for (access, sync_points) in rules {
                if self.access.contains(access) && !self.sync_point.intersects(sync_points) {
                    return Err(Error::InvalidBarrier(format!("`{access}` access is only valid for the following sync points: {sync_points}")));
                }
            }

            if let Some(layout) = self.layout {
                if let Some(allowed) = layout.allowed_access() {
                    let invalid = self.access & !allowed;
                    if invalid.is_any() {
                        return Err(Error::InvalidBarrier(format!("`{invalid}` access is not allowed in the `{layout}` texture layout")));
                    }
                }
            }
        }
        Ok(())
    }

    fn supported_sync_points(list_type: CommandListType) -> SyncPoint {
        let common = SyncPoint::Top | SyncPoint::Bottom | SyncPoint::All | SyncPoint::Host | SyncPoint::Copy;
        match list_type {
            CommandListType::Graphics |
            CommandListType::Bundle   => SyncPoint::all(),
            CommandListType::Compute  => common | SyncPoint::DrawIndirect | SyncPoint::Compute | SyncPoint::Clear | SyncPoint::AccelerationStructureBuild | SyncPoint::AccelerationStructureCopy | SyncPoint::AccelerationStructureQuery,
            CommandListType::Copy     => common,
        }
    }

    /// Resource is not accessed
    pub const NONE : ResourceState = ResourceState::new(Access::None, SyncPoint::None);
    /// Vertex input resource state
    pub const VERTEX_INPUT : ResourceState = ResourceState::new(Access::VertexBuffer, SyncPoint::VertexInput);
    /// Index input resource state
    pub const INDEX_INPUT : ResourceState = ResourceState::new(Access::IndexBuffer, SyncPoint::IndexInput);
    /// Indirect arguments resource state
    pub const INDIRECT_ARGUMENTS : ResourceState = ResourceState::new(Access::Indirect, SyncPoint::DrawIndirect);
    /// Copy read resource state
    pub const COPY_READ : ResourceState = ResourceState::new(Access::CopyRead, SyncPoint::Copy);
    /// Copy write resource state
    pub const COPY_WRITE : ResourceState = ResourceState::new(Access::CopyWrite, SyncPoint::Copy);
    /// Compute storage read/write resource state
    pub const COMPUTE_STORAGE : ResourceState = ResourceState::new(Access::Storage, SyncPoint::Compute);

    /// Undefined texture state, content will be discarded when transitioning away from it
    pub const UNDEFINED : ResourceState = ResourceState::new_tex(Access::None, SyncPoint::None, TextureLayout::Undefined);
    /// Pixel shader read texture state
    pub const PIXEL_SHADER_READ : ResourceState = ResourceState::new_tex(Access::SampledRead, SyncPoint::Pixel, TextureLayout::ShaderRead);
    /// Render target write texture state
    pub const RENDER_TARGET_WRITE : ResourceState = ResourceState::new_tex(Access::RenderTargetWrite, SyncPoint::RenderTarget, TextureLayout::RenderTarget);
    /// Depth/stencil write texture state
    pub const DEPTH_STENCIL : ResourceState = ResourceState::new_tex(Access::DepthStencilWrite, SyncPoint::PostPixelOps, TextureLayout::DepthStencil);
    /// Copy read texture state
    pub const COPY_READ_TEX : ResourceState = ResourceState::new_tex(Access::CopyRead, SyncPoint::Copy, TextureLayout::CopySrc);
    /// Copy write texture state
    pub const COPY_WRITE_TEX : ResourceState = ResourceState::new_tex(Access::CopyWrite, SyncPoint::Copy, TextureLayout::CopyDst);
    /// Present texture state
    pub const PRESENT : ResourceState = ResourceState::new_tex(Access::Present, SyncPoint::All, TextureLayout::Present);
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ access: {}, sync point: {}", self.access, self.sync_point)?;
        if let Some(layout) = self.layout {
            write!(f, ", layout: {layout}")?;
        }
        f.write_str(" }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_flags() {
        assert!(Access::ShaderRead.contains(Access::SampledRead));
        assert!(!Access::ShaderRead.intersects(Access::StorageWrite));
        assert_eq!(SyncPoint::PreRaster, SyncPoint::Vertex | SyncPoint::Task | SyncPoint::Mesh);
        assert!(ShaderTypeMask::Pixel.is_graphics_only());
        assert!(!(ShaderTypeMask::Pixel | ShaderTypeMask::Compute).is_graphics_only());
        assert_eq!(format!("{}", Access::CopyRead | Access::CopyWrite), "CopyRead | CopyWrite");
        assert_eq!(format!("{}", Access::None), "None");
    }

    #[test]
    fn subresource_range_coverage() {
        let full = TextureSubresourceRange::full(TextureAspect::Color);
        assert!(full.covers(TextureAspect::Color, 10, 6));
        assert_eq!(full.mip_count(10), 10);

        let partial = TextureSubresourceRange { base_mip: 2, mip_levels: NonZeroU16::new(3), ..full };
        assert!(!partial.covers(TextureAspect::Color, 10, 6));
        assert_eq!(partial.mip_count(10), 3);
        assert_eq!(partial.layer_count(6), 6);

        let depth_only = TextureSubresourceRange::full(TextureAspect::Depth);
        assert!(!depth_only.covers(TextureAspect::Depth | TextureAspect::Stencil, 1, 1));
        assert_eq!((TextureAspect::Depth | TextureAspect::Stencil).plane_count(), 2);
    }

    #[cfg(feature = "validation")]
    #[test]
    fn state_validation() {
        assert!(ResourceState::COPY_WRITE.validate(CommandListType::Copy, true).is_ok());
        assert!(ResourceState::PIXEL_SHADER_READ.validate(CommandListType::Graphics, true).is_ok());
        assert!(ResourceState::PIXEL_SHADER_READ.validate(CommandListType::Compute, true).is_err());

        let mismatched = ResourceState::new_tex(Access::CopyWrite, SyncPoint::Copy, TextureLayout::ShaderRead);
        assert!(mismatched.validate(CommandListType::Graphics, true).is_err());

        let wrong_stage = ResourceState::new(Access::VertexBuffer, SyncPoint::Compute);
        assert!(matches!(wrong_stage.validate(CommandListType::Graphics, false), Err(Error::InvalidBarrier(_))));

        let top_after = ResourceState::new(Access::None, SyncPoint::Top);
        assert!(top_after.validate(CommandListType::Graphics, true).is_err());
    }
}
