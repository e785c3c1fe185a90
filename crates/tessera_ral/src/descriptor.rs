use core::any::Any;
use std::sync::Arc;

use tessera_common_macros::{flags, EnumCount, EnumDisplay};

use crate::{Error, PipelineLayoutHandle, Result, ShaderTypeMask};

/// Descriptor type
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumCount, EnumDisplay)]
pub enum DescriptorType {
    /// Sampler
    #[display("sampler")]
    Sampler,
    /// Constant buffer
    #[display("constant buffer")]
    ConstantBuffer,
    /// Sampled texture
    #[display("texture")]
    Texture,
    /// Storage (read-write) texture
    #[display("storage texture")]
    StorageTexture,
    /// Typed/texel buffer
    #[display("buffer")]
    Buffer,
    /// Storage (read-write) typed/texel buffer
    #[display("storage buffer")]
    StorageBuffer,
    /// Structured buffer
    #[display("structured buffer")]
    StructuredBuffer,
    /// Storage (read-write) structured buffer
    #[display("storage structured buffer")]
    StorageStructuredBuffer,
    /// Ray tracing acceleration structure
    #[display("acceleration structure")]
    AccelerationStructure,
}

impl DescriptorType {
    /// Check if the descriptor type is a sampler
    pub fn is_sampler(self) -> bool {
        self == DescriptorType::Sampler
    }

    /// Check if the descriptor type allows shader writes
    pub fn is_storage(self) -> bool {
        matches!(self, DescriptorType::StorageTexture | DescriptorType::StorageBuffer | DescriptorType::StorageStructuredBuffer)
    }
}

/// Descriptor range flags
#[flags]
pub enum DescriptorRangeFlags {
    /// Not all descriptors in the range need to be valid while the range is accessible
    PartiallyBound,
    /// Range is accessed as an array in the shader
    Array,
    /// Last range in a set with a size only known when the descriptor set is allocated
    VariableSizedArray,
}

/// Range of descriptors of the same type in a descriptor set
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DescriptorRangeDesc {
    /// First shader register of the range
    pub base_register:   u32,
    /// Number of descriptors in the range
    pub descriptor_num:  u32,
    /// Type of the descriptors in the range
    pub descriptor_type: DescriptorType,
    /// Shaders that can access the range
    pub visibility:      ShaderTypeMask,
    /// Range flags
    pub flags:           DescriptorRangeFlags,
}

impl DescriptorRangeDesc {
    pub const fn new(base_register: u32, descriptor_num: u32, descriptor_type: DescriptorType, visibility: ShaderTypeMask) -> Self {
        Self { base_register, descriptor_num, descriptor_type, visibility, flags: DescriptorRangeFlags::None }
    }
}

/// Constant buffer in a descriptor set which is bound directly by address, with an offset supplied at bind time
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DynamicConstantBufferDesc {
    /// Shader register of the buffer
    pub register:   u32,
    /// Shaders that can access the buffer
    pub visibility: ShaderTypeMask,
}

/// Descriptor set layout
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct DescriptorSetDesc {
    /// Register space the set is bound to
    pub register_space:  u32,
    /// Descriptor ranges, in declaration order
    pub ranges:          Vec<DescriptorRangeDesc>,
    /// Dynamic constant buffers
    pub dynamic_buffers: Vec<DynamicConstantBufferDesc>,
    /// All ranges in the set are partially bound
    pub partially_bound: bool,
}

impl DescriptorSetDesc {
    /// Check if any range in the set is partially bound
    pub fn has_partially_bound_ranges(&self) -> bool {
        self.partially_bound || self.ranges.iter().any(|range| range.flags.contains(DescriptorRangeFlags::PartiallyBound))
    }

    /// Validate the descriptor set layout, `shader_stages` are the stages of the pipeline layout the set is part of
    pub fn validate(&self, shader_stages: ShaderTypeMask) -> Result<()> {
        let range_count = self.ranges.len();
        for (idx, range) in self.ranges.iter().enumerate() {
            if range.descriptor_num == 0 {
                return Err(Error::InvalidParameter(format!("Descriptor range {idx} ({}) does not contain any descriptors", range.descriptor_type)));
            }
            if range.visibility.is_none() {
                return Err(Error::InvalidParameter(format!("Descriptor range {idx} ({}) is not visible to any shader", range.descriptor_type)));
            }
            if !shader_stages.contains(range.visibility) {
                return Err(Error::InvalidParameter(format!("Descriptor range {idx} is visible to `{}`, which are not part of the pipeline layout's stages `{shader_stages}`", range.visibility)));
            }
            if range.flags.contains(DescriptorRangeFlags::VariableSizedArray) && idx + 1 != range_count {
                return Err(Error::InvalidParameter(format!("Descriptor range {idx} is a variable sized array, but is not the last range in the set")));
            }
        }
        for (idx, buffer) in self.dynamic_buffers.iter().enumerate() {
            if buffer.visibility.is_none() {
                return Err(Error::InvalidParameter(format!("Dynamic constant buffer {idx} is not visible to any shader")));
            }
        }
        Ok(())
    }
}

/// Descriptor pool description
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct DescriptorPoolDesc {
    /// Maximum number of descriptor sets that can be allocated from the pool
    pub descriptor_set_max_num:      u32,
    /// Maximum number of non-sampler descriptors
    pub resource_descriptor_max_num: u32,
    /// Maximum number of sampler descriptors
    pub sampler_max_num:             u32,
}

//==============================================================================================================================

/// Backend implementation of a descriptor set
pub trait DescriptorSetInterface: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Number of descriptor ranges in the set
    fn range_num(&self) -> u32;

    /// Number of dynamic constant buffers in the set
    fn dynamic_buffer_num(&self) -> u32;

    /// Record the base address of a dynamic constant buffer
    fn set_dynamic_buffer(&self, index: u32, gpu_address: u64) -> Result<()>;
}

pub type DescriptorSetHandle = Arc<dyn DescriptorSetInterface>;

/// Backend implementation of a descriptor pool
pub trait DescriptorPoolInterface: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Allocate a descriptor set for set `set_index` of a pipeline layout
    fn allocate_descriptor_set(&self, layout: &PipelineLayoutHandle, set_index: u32) -> Result<DescriptorSetHandle>;

    /// Free all descriptor sets allocated from the pool
    /// 
    /// Any descriptor set allocated from the pool must not be used after this call
    fn reset(&self);
}

pub type DescriptorPoolHandle = Arc<dyn DescriptorPoolInterface>;

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ranges: Vec<DescriptorRangeDesc>) -> DescriptorSetDesc {
        DescriptorSetDesc { ranges, ..Default::default() }
    }

    #[test]
    fn empty_ranges_are_invalid() {
        let desc = set(vec![DescriptorRangeDesc::new(0, 0, DescriptorType::Texture, ShaderTypeMask::Pixel)]);
        assert!(matches!(desc.validate(ShaderTypeMask::Graphics), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn visibility_must_be_part_of_layout() {
        let desc = set(vec![DescriptorRangeDesc::new(0, 4, DescriptorType::Texture, ShaderTypeMask::Compute)]);
        assert!(desc.validate(ShaderTypeMask::Graphics).is_err());
        assert!(desc.validate(ShaderTypeMask::Compute).is_ok());
    }

    #[test]
    fn variable_sized_array_must_be_last() {
        let mut variable = DescriptorRangeDesc::new(0, 128, DescriptorType::Texture, ShaderTypeMask::Pixel);
        variable.flags = DescriptorRangeFlags::VariableSizedArray | DescriptorRangeFlags::Array;
        let sampler = DescriptorRangeDesc::new(0, 1, DescriptorType::Sampler, ShaderTypeMask::Pixel);

        assert!(set(vec![sampler, variable]).validate(ShaderTypeMask::Pixel).is_ok());
        assert!(set(vec![variable, sampler]).validate(ShaderTypeMask::Pixel).is_err());
    }

    #[test]
    fn partially_bound_sets() {
        let mut range = DescriptorRangeDesc::new(0, 8, DescriptorType::Texture, ShaderTypeMask::Pixel);
        assert!(!set(vec![range]).has_partially_bound_ranges());
        range.flags = DescriptorRangeFlags::PartiallyBound;
        assert!(set(vec![range]).has_partially_bound_ranges());
        assert!(DescriptorSetDesc { partially_bound: true, ..Default::default() }.has_partially_bound_ranges());
    }
}
