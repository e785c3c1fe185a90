use core::any::Any;
use std::sync::Arc;

use tessera_common_macros::flags;

use crate::{constants::*, DescriptorSetDesc, Error, Result, ShaderTypeMask};

/// Pipeline layout flags
#[flags]
pub enum PipelineLayoutFlags {
    /// Make base vertex and base instance available to vertex shaders on devices that can't supply them natively
    EnableDrawParametersEmulation,
}

/// Push constant range
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PushConstantDesc {
    /// Shader register of the constants
    pub register:   u32,
    /// Size of the constants, needs to be a multiple of 4
    pub size:       u32,
    /// Shaders that can access the constants
    pub visibility: ShaderTypeMask,
}

impl PushConstantDesc {
    /// Number of 32-bit values in the range
    pub fn dword_count(&self) -> u32 {
        self.size / 4
    }
}

/// Pipeline layout description
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct PipelineLayoutDesc {
    /// Descriptor sets
    pub descriptor_sets:              Vec<DescriptorSetDesc>,
    /// Push constant ranges
    pub push_constants:               Vec<PushConstantDesc>,
    /// Register space push constants are bound to
    pub push_constant_register_space: u32,
    /// Shader stages which will use the pipeline layout
    pub shader_stages:                ShaderTypeMask,
    /// Flags
    pub flags:                        PipelineLayoutFlags,
}

impl PipelineLayoutDesc {
    /// Validate the pipeline layout description
    /// 
    /// This checks the parts that don't depend on how a backend lays out its bindings
    pub fn validate(&self) -> Result<()> {
        if self.shader_stages.is_none() {
            return Err(Error::InvalidPipelineLayout("No shader stages were provided".to_string()));
        }
        if self.descriptor_sets.len() > MAX_DESCRIPTOR_SETS {
            return Err(Error::InvalidPipelineLayout(format!("At most {MAX_DESCRIPTOR_SETS} descriptor sets are supported, found {}", self.descriptor_sets.len())));
        }
        for set in &self.descriptor_sets {
            set.validate(self.shader_stages)?;
        }

        let mut push_constant_size = 0;
        for (idx, push_constant) in self.push_constants.iter().enumerate() {
            if push_constant.size == 0 || push_constant.size % PUSH_CONSTANT_SIZE_ALIGN != 0 {
                return Err(Error::InvalidParameter(format!("Push constant range {idx} has a size of {}, which is not a non-zero multiple of {PUSH_CONSTANT_SIZE_ALIGN}", push_constant.size)));
            }
            if !self.shader_stages.contains(push_constant.visibility) || push_constant.visibility.is_none() {
                return Err(Error::InvalidParameter(format!("Push constant range {idx} has an invalid visibility `{}`", push_constant.visibility)));
            }
            push_constant_size += push_constant.size;
        }
        if push_constant_size > MAX_PUSH_CONSTANT_SIZE {
            return Err(Error::InvalidPipelineLayout(format!("Push constants take up {push_constant_size} bytes, at most {MAX_PUSH_CONSTANT_SIZE} bytes are supported")));
        }
        Ok(())
    }

    /// Check if the layout is used for graphics pipelines
    pub fn is_graphics(&self) -> bool {
        self.shader_stages.intersects(ShaderTypeMask::Graphics)
    }
}

//==============================================================================================================================

/// Backend implementation of a pipeline layout
pub trait PipelineLayoutInterface: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Number of descriptor sets in the layout
    fn descriptor_set_num(&self) -> u32;

    /// Number of push constant ranges in the layout
    fn push_constant_num(&self) -> u32;
}

pub type PipelineLayoutHandle = Arc<dyn PipelineLayoutInterface>;
