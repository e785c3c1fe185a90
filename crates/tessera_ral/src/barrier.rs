use crate::{CommandListType, Error, ResourceHandle, ResourceState, Result, TextureAspect, TextureLayout, TextureSubresourceRange};

/// Global memory barrier, applies to all resources
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GlobalBarrierDesc {
    /// Resource state before transition
    pub before: ResourceState,
    /// Resource state after transition
    pub after:  ResourceState,
}

/// Buffer memory barrier, always applies to the whole buffer
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BufferBarrierDesc {
    /// Buffer
    pub buffer: ResourceHandle,
    /// Resource state before transition
    pub before: ResourceState,
    /// Resource state after transition
    pub after:  ResourceState,
}

/// Texture a barrier applies to
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TextureBarrierTarget {
    /// Texture resource
    pub resource:     ResourceHandle,
    /// Aspects the texture's format consists of
    pub aspect:       TextureAspect,
    /// Number of mip levels in the texture
    pub mip_levels:   u16,
    /// Number of array layers in the texture
    pub array_layers: u16,
}

/// Texture memory barrier
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TextureBarrierDesc {
    /// Texture
    pub texture:           TextureBarrierTarget,
    /// Resource state before transition, requires a layout
    pub before:            ResourceState,
    /// Resource state after transition, requires a layout
    pub after:             ResourceState,
    /// Texture subresource range, `None` means the full texture
    pub subresource_range: Option<TextureSubresourceRange>,
}

impl TextureBarrierDesc {
    /// Create a barrier for the full texture
    pub fn new_full(texture: TextureBarrierTarget, before: ResourceState, after: ResourceState) -> Self {
        Self { texture, before, after, subresource_range: None }
    }

    /// Get the subresource range, with `None` resolved to the full texture
    pub fn range(&self) -> TextureSubresourceRange {
        self.subresource_range.unwrap_or(TextureSubresourceRange::full(self.texture.aspect))
    }

    /// Layout before the transition, missing layouts are treated as `Common`
    pub fn before_layout(&self) -> TextureLayout {
        self.before.layout.unwrap_or(TextureLayout::Common)
    }

    /// Layout after the transition, missing layouts are treated as `Common`
    pub fn after_layout(&self) -> TextureLayout {
        self.after.layout.unwrap_or(TextureLayout::Common)
    }
}

/// Group of barriers that are submitted together
#[derive(Clone, Copy, Default, Debug)]
pub struct BarrierGroupDesc<'a> {
    /// Global barriers
    pub global:  &'a [GlobalBarrierDesc],
    /// Buffer barriers
    pub buffer:  &'a [BufferBarrierDesc],
    /// Texture barriers
    pub texture: &'a [TextureBarrierDesc],
}

impl BarrierGroupDesc<'_> {
    /// Check if the group contains no barriers
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.buffer.is_empty() && self.texture.is_empty()
    }

    /// Total number of barriers in the group
    pub fn len(&self) -> usize {
        self.global.len() + self.buffer.len() + self.texture.len()
    }

    /// Validate all barriers in the group
    /// 
    /// When `check_for_redundant_barriers` is set, barriers that don't change the state are reported as an error
    pub fn validate(&self, list_type: CommandListType, check_for_redundant_barriers: bool) -> Result<()> {
        for barrier in self.global {
            if barrier.before.layout.is_some() || barrier.after.layout.is_some() {
                return Err(Error::InvalidBarrier("Global memory barriers should not contain a layout".to_string()));
            }
            validate_states(&barrier.before, &barrier.after, list_type, check_for_redundant_barriers)?;
        }
        for barrier in self.buffer {
            if barrier.buffer.is_null() {
                return Err(Error::InvalidBarrier("Buffer barrier does not reference a buffer".to_string()));
            }
            if barrier.before.layout.is_some() || barrier.after.layout.is_some() {
                return Err(Error::InvalidBarrier("Buffer memory barriers should not contain a layout".to_string()));
            }
            validate_states(&barrier.before, &barrier.after, list_type, check_for_redundant_barriers)?;
        }
        for barrier in self.texture {
            if barrier.texture.resource.is_null() {
                return Err(Error::InvalidBarrier("Texture barrier does not reference a texture".to_string()));
            }
            if barrier.before.layout.is_none() {
                return Err(Error::InvalidBarrier("Expected a layout in the before state".to_string()));
            }
            if barrier.after.layout.is_none() {
                return Err(Error::InvalidBarrier("Expected a layout in the after state".to_string()));
            }
            if barrier.after.layout == Some(TextureLayout::Undefined) {
                return Err(Error::InvalidBarrier("A texture can't be transitioned to the `Undefined` layout".to_string()));
            }
            validate_subresource_range(barrier)?;
            validate_states(&barrier.before, &barrier.after, list_type, check_for_redundant_barriers)?;
        }
        Ok(())
    }
}

fn validate_states(before: &ResourceState, after: &ResourceState, list_type: CommandListType, check_for_redundant_barriers: bool) -> Result<()> {
    before.validate(list_type, false)?;
    after.validate(list_type, true)?;
    if check_for_redundant_barriers && before == after {
        return Err(Error::InvalidBarrier(format!("Redundant barrier, state stays {before}")));
    }
    Ok(())
}

fn validate_subresource_range(barrier: &TextureBarrierDesc) -> Result<()> {
    let texture = &barrier.texture;
    let range = barrier.range();

    if !texture.aspect.contains(range.aspect) || range.aspect.is_none() {
        return Err(Error::InvalidBarrier(format!("Subresource aspect `{}` is not part of the texture's aspect `{}`", range.aspect, texture.aspect)));
    }
    if range.base_mip as u32 + range.mip_count(texture.mip_levels) as u32 > texture.mip_levels as u32 || range.mip_count(texture.mip_levels) == 0 {
        return Err(Error::InvalidBarrier(format!("Mip range starting at {} is out of range for a texture with {} mip levels", range.base_mip, texture.mip_levels)));
    }
    if range.base_layer as u32 + range.layer_count(texture.array_layers) as u32 > texture.array_layers as u32 || range.layer_count(texture.array_layers) == 0 {
        return Err(Error::InvalidBarrier(format!("Layer range starting at {} is out of range for a texture with {} array layers", range.base_layer, texture.array_layers)));
    }
    Ok(())
}
