use tessera_common_macros::{EnumCount, EnumDisplay};

use crate::{
    constants::*, BarrierGroupDesc, CommandListType, DescriptorPoolHandle, DescriptorSetHandle, PipelineLayoutHandle, ResourceHandle,
};

/// Kind of command executed by an indirect call
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumCount, EnumDisplay)]
pub enum IndirectCommandKind {
    /// Non-indexed draw
    Draw,
    /// Indexed draw
    DrawIndexed,
    /// Compute dispatch
    Dispatch,
    /// Mesh shader dispatch
    DispatchMesh,
}

impl IndirectCommandKind {
    /// Size of the arguments of a single command, when tightly packed
    pub const fn default_stride(self) -> u32 {
        match self {
            IndirectCommandKind::Draw         => DRAW_INDIRECT_ARGS_SIZE,
            IndirectCommandKind::DrawIndexed  => DRAW_INDEXED_INDIRECT_ARGS_SIZE,
            IndirectCommandKind::Dispatch     => DISPATCH_INDIRECT_ARGS_SIZE,
            IndirectCommandKind::DispatchMesh => DISPATCH_MESH_INDIRECT_ARGS_SIZE,
        }
    }

    /// Check if the command is a draw, which can use base vertex and base instance
    pub const fn is_draw(self) -> bool {
        matches!(self, IndirectCommandKind::Draw | IndirectCommandKind::DrawIndexed)
    }
}

/// Arguments for an indirect call
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IndirectArgs {
    /// Buffer containing the command arguments
    pub buffer:          ResourceHandle,
    /// Offset of the first command in the buffer
    pub offset:          u64,
    /// Maximum number of commands to execute
    pub max_command_num: u32,
    /// Stride between commands, `0` means the commands are tightly packed
    pub stride:          u32,
    /// Buffer and offset containing the actual number of commands to execute
    pub count_buffer:    Option<(ResourceHandle, u64)>,
}

impl IndirectArgs {
    /// Stride for the given command kind, with tightly packed commands resolved to the argument size
    pub fn stride_for(&self, kind: IndirectCommandKind) -> u32 {
        if self.stride == 0 { kind.default_stride() } else { self.stride }
    }
}

/// Backend implementation of a command list
/// 
/// All arguments are expected to be valid when recording, invalid use is logged and the command is skipped.
pub trait CommandListInterface: Send {
    /// Type of the command list
    fn list_type(&self) -> CommandListType;

    /// Record a group of barriers
    fn barrier(&mut self, barriers: &BarrierGroupDesc);

    /// Bind the heaps of a descriptor pool, any descriptor set bound afterwards needs to come from this pool
    fn set_descriptor_pool(&mut self, pool: &DescriptorPoolHandle);

    /// Bind a pipeline layout
    fn set_pipeline_layout(&mut self, layout: &PipelineLayoutHandle);

    /// Bind a descriptor set, with an offset for each dynamic constant buffer in the set
    fn set_descriptor_set(&mut self, set_index: u32, set: &DescriptorSetHandle, dynamic_offsets: &[u32]);

    /// Set the values of a push constant range, starting at `offset` 32-bit values into the range
    fn set_push_constants(&mut self, push_constant_index: u32, offset: u32, data: &[u32]);

    /// Execute commands of which the arguments are stored in a buffer
    fn execute_indirect(&mut self, kind: IndirectCommandKind, args: &IndirectArgs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides() {
        let args = IndirectArgs { buffer: ResourceHandle(1), offset: 0, max_command_num: 4, stride: 0, count_buffer: None };
        assert_eq!(args.stride_for(IndirectCommandKind::Draw), 16);
        assert_eq!(args.stride_for(IndirectCommandKind::DrawIndexed), 20);
        assert_eq!(args.stride_for(IndirectCommandKind::Dispatch), 12);

        let padded = IndirectArgs { stride: 32, ..args };
        assert_eq!(padded.stride_for(IndirectCommandKind::DrawIndexed), 32);
        assert!(IndirectCommandKind::DrawIndexed.is_draw());
        assert!(!IndirectCommandKind::DispatchMesh.is_draw());
    }
}
