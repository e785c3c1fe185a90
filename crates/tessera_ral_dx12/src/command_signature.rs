use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tessera_logging::{log_error, log_verbose};
use tessera_ral as ral;
use ral::IndirectCommandKind;

use crate::{dx12_types::*, DeviceCaps, NativeDevice, NativeObject, PipelineLayout, PipelineLayoutId, DRAW_PARAMETERS_DWORD_COUNT, LOG_CAT};

/// Key identifying a command signature
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CommandSignatureKey {
    pub layout: PipelineLayoutId,
    pub stride: u32,
    pub kind:   IndirectCommandKind,
}

/// Size of the arguments of a single command
/// 
/// Emulated draw parameters are stored in front of the draw arguments.
pub fn indirect_argument_size(kind: IndirectCommandKind, emulated_draw_parameters: bool) -> u32 {
    if emulated_draw_parameters && kind.is_draw() {
        kind.default_stride() + DRAW_PARAMETERS_DWORD_COUNT * 4
    } else {
        kind.default_stride()
    }
}

/// Device-wide cache of command signatures, created on first use and kept until the device is destroyed
pub struct CommandSignatureCache {
    device:     Arc<dyn NativeDevice>,
    caps:       DeviceCaps,
    signatures: Mutex<HashMap<CommandSignatureKey, NativeObject>>,
}

impl CommandSignatureCache {
    pub fn new(device: Arc<dyn NativeDevice>, caps: DeviceCaps) -> Self {
        Self {
            device,
            caps,
            signatures: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.signatures.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.lock().is_empty()
    }

    /// Get the command signature for an indirect command, creating it if it doesn't exist yet
    pub fn get_or_create(&self, layout: &PipelineLayout, stride: u32, kind: IndirectCommandKind) -> ral::Result<NativeObject> {
        if kind == IndirectCommandKind::DispatchMesh && !self.caps.mesh_shaders {
            log_error!(LOG_CAT, Self::get_or_create, "Cannot create a mesh dispatch command signature, mesh shaders are not supported");
            return Err(ral::Error::MissingFeature("mesh shaders"));
        }

        let draw_parameters_index = layout.bindings().draw_parameters_index.filter(|_| kind.is_draw());
        let argument_size = indirect_argument_size(kind, draw_parameters_index.is_some());
        if stride < argument_size {
            return Err(ral::Error::InvalidParameter(format!("Indirect {kind} commands need a stride of at least {argument_size} bytes, found {stride}")));
        }

        let key = CommandSignatureKey { layout: layout.id(), stride, kind };

        let mut signatures = self.signatures.lock();
        if let Some(signature) = signatures.get(&key) {
            return Ok(*signature);
        }

        let mut arguments = Vec::with_capacity(2);
        // The emulated draw parameters are read from the first 2 values of the draw arguments
        if let Some(root_parameter_index) = draw_parameters_index {
            arguments.push(IndirectArgumentDesc::Constant {
                root_parameter_index,
                dest_offset_in_32bit_values: 0,
                num_32bit_values_to_set: DRAW_PARAMETERS_DWORD_COUNT,
            });
        }
        arguments.push(match kind {
            IndirectCommandKind::Draw         => IndirectArgumentDesc::Draw,
            IndirectCommandKind::DrawIndexed  => IndirectArgumentDesc::DrawIndexed,
            IndirectCommandKind::Dispatch     => IndirectArgumentDesc::Dispatch,
            IndirectCommandKind::DispatchMesh => IndirectArgumentDesc::DispatchMesh,
        });

        let desc = CommandSignatureDesc { byte_stride: stride, arguments, node_mask: 0 };
        let root_signature = draw_parameters_index.map(|_| layout.root_signature());
        let signature = self.device.create_command_signature(&desc, root_signature)?;

        log_verbose!(LOG_CAT, "Created {kind} command signature with a stride of {stride} bytes");
        // Entries are never evicted per layout, signatures of destroyed layouts stay until the cache is dropped.
        // Their keys can't be hit again, as a recycled layout slot gets a new generation.
        signatures.insert(key, signature);
        Ok(signature)
    }
}

impl Drop for CommandSignatureCache {
    fn drop(&mut self) {
        for (_, signature) in self.signatures.get_mut().drain() {
            self.device.release(signature);
        }
    }
}

#[cfg(test)]
mod tests {
    use ral::{PipelineLayoutDesc, PipelineLayoutFlags, ShaderTypeMask};

    use super::*;
    use crate::{test_utils::MockDevice, Dx12Settings, PipelineLayoutBuilder, PipelineLayoutRegistry};

    fn caps() -> DeviceCaps {
        DeviceCaps { enhanced_barriers: true, root_signature_1_1: true, native_draw_parameters: false, mesh_shaders: false }
    }

    fn layout(device: &Arc<MockDevice>, registry: &Arc<PipelineLayoutRegistry>, flags: PipelineLayoutFlags) -> PipelineLayout {
        let desc = PipelineLayoutDesc {
            shader_stages: ShaderTypeMask::Vertex | ShaderTypeMask::Pixel | ShaderTypeMask::Compute,
            flags,
            ..Default::default()
        };
        let builder = PipelineLayoutBuilder::new(&caps(), &Dx12Settings::default());
        PipelineLayout::new(device.clone(), registry.clone(), &builder, &desc).unwrap()
    }

    #[test]
    fn signatures_are_cached() {
        let device = MockDevice::new();
        let registry = Arc::new(PipelineLayoutRegistry::new());
        let cache = CommandSignatureCache::new(device.clone(), caps());
        let layout = layout(&device, &registry, PipelineLayoutFlags::None);

        let first = cache.get_or_create(&layout, 20, IndirectCommandKind::DrawIndexed).unwrap();
        let second = cache.get_or_create(&layout, 20, IndirectCommandKind::DrawIndexed).unwrap();
        assert_eq!(first, second);
        assert_eq!(device.command_signatures.lock().len(), 1);

        let padded = cache.get_or_create(&layout, 32, IndirectCommandKind::DrawIndexed).unwrap();
        assert_ne!(first, padded);
        assert_eq!(cache.len(), 2);

        let (desc, root_signature) = device.command_signatures.lock()[0].clone();
        assert_eq!(desc, CommandSignatureDesc { byte_stride: 20, arguments: vec![IndirectArgumentDesc::DrawIndexed], node_mask: 0 });
        assert_eq!(root_signature, None);
    }

    #[test]
    fn signatures_are_keyed_by_layout() {
        let device = MockDevice::new();
        let registry = Arc::new(PipelineLayoutRegistry::new());
        let cache = CommandSignatureCache::new(device.clone(), caps());
        let first = layout(&device, &registry, PipelineLayoutFlags::None);
        let second = layout(&device, &registry, PipelineLayoutFlags::None);

        let a = cache.get_or_create(&first, 12, IndirectCommandKind::Dispatch).unwrap();
        let b = cache.get_or_create(&second, 12, IndirectCommandKind::Dispatch).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn recycled_layout_slots_do_not_hit_stale_signatures() {
        let device = MockDevice::new();
        let registry = Arc::new(PipelineLayoutRegistry::new());
        let cache = CommandSignatureCache::new(device.clone(), caps());

        let old = layout(&device, &registry, PipelineLayoutFlags::EnableDrawParametersEmulation);
        let old_signature = cache.get_or_create(&old, 24, IndirectCommandKind::Draw).unwrap();
        let old_id = old.id();
        drop(old);

        let new = layout(&device, &registry, PipelineLayoutFlags::EnableDrawParametersEmulation);
        assert_eq!(new.id().index, old_id.index);
        let new_signature = cache.get_or_create(&new, 24, IndirectCommandKind::Draw).unwrap();
        assert_ne!(old_signature, new_signature);
        assert_eq!(device.command_signatures.lock()[1].1, Some(new.root_signature()));
    }

    #[test]
    fn emulated_draw_parameters_are_written_before_the_draw() {
        let device = MockDevice::new();
        let registry = Arc::new(PipelineLayoutRegistry::new());
        let cache = CommandSignatureCache::new(device.clone(), caps());
        let layout = layout(&device, &registry, PipelineLayoutFlags::EnableDrawParametersEmulation);
        let draw_parameters_index = layout.bindings().draw_parameters_index.unwrap();

        assert!(cache.get_or_create(&layout, 16, IndirectCommandKind::Draw).is_err());
        cache.get_or_create(&layout, 24, IndirectCommandKind::Draw).unwrap();
        let (desc, root_signature) = device.command_signatures.lock()[0].clone();
        assert_eq!(desc.arguments, [
            IndirectArgumentDesc::Constant { root_parameter_index: draw_parameters_index, dest_offset_in_32bit_values: 0, num_32bit_values_to_set: 2 },
            IndirectArgumentDesc::Draw,
        ]);
        assert_eq!(root_signature, Some(layout.root_signature()));

        // Dispatches don't use the draw parameters
        cache.get_or_create(&layout, 12, IndirectCommandKind::Dispatch).unwrap();
        let (desc, root_signature) = device.command_signatures.lock()[1].clone();
        assert_eq!(desc.arguments, [IndirectArgumentDesc::Dispatch]);
        assert_eq!(root_signature, None);
    }

    #[test]
    fn mesh_dispatches_need_mesh_shaders() {
        let device = MockDevice::new();
        let registry = Arc::new(PipelineLayoutRegistry::new());
        let layout = layout(&device, &registry, PipelineLayoutFlags::None);

        let cache = CommandSignatureCache::new(device.clone(), caps());
        assert_eq!(cache.get_or_create(&layout, 12, IndirectCommandKind::DispatchMesh), Err(ral::Error::MissingFeature("mesh shaders")));

        let cache = CommandSignatureCache::new(device.clone(), DeviceCaps { mesh_shaders: true, ..caps() });
        assert!(cache.get_or_create(&layout, 12, IndirectCommandKind::DispatchMesh).is_ok());
    }

    #[test]
    fn strides_must_fit_the_arguments() {
        let device = MockDevice::new();
        let registry = Arc::new(PipelineLayoutRegistry::new());
        let layout = layout(&device, &registry, PipelineLayoutFlags::None);
        let cache = CommandSignatureCache::new(device.clone(), caps());
        assert!(matches!(cache.get_or_create(&layout, 8, IndirectCommandKind::Draw), Err(ral::Error::InvalidParameter(_))));
    }

    #[test]
    fn dropping_releases_signatures() {
        let device = MockDevice::new();
        let registry = Arc::new(PipelineLayoutRegistry::new());
        let layout = layout(&device, &registry, PipelineLayoutFlags::None);
        let cache = CommandSignatureCache::new(device.clone(), caps());

        let draw = cache.get_or_create(&layout, 16, IndirectCommandKind::Draw).unwrap();
        let dispatch = cache.get_or_create(&layout, 12, IndirectCommandKind::Dispatch).unwrap();
        assert!(device.released.lock().is_empty());

        drop(cache);
        let mut released = device.released.lock().clone();
        released.sort_by_key(|object| object.0);
        assert_eq!(released, [draw, dispatch]);
    }

    #[test]
    fn argument_sizes() {
        assert_eq!(indirect_argument_size(IndirectCommandKind::Draw, false), 16);
        assert_eq!(indirect_argument_size(IndirectCommandKind::DrawIndexed, true), 28);
        assert_eq!(indirect_argument_size(IndirectCommandKind::Dispatch, true), 12);
    }

    #[test]
    fn concurrent_lookups_create_a_single_signature() {
        const THREADS: usize = 8;
        let device = MockDevice::new();
        let registry = Arc::new(PipelineLayoutRegistry::new());
        let cache = CommandSignatureCache::new(device.clone(), caps());
        let layout = layout(&device, &registry, PipelineLayoutFlags::None);

        let signatures: Vec<NativeObject> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..THREADS).map(|_| {
                scope.spawn(|| cache.get_or_create(&layout, 16, IndirectCommandKind::Draw).unwrap())
            }).collect();
            workers.into_iter().map(|worker| worker.join().unwrap()).collect()
        });

        assert!(signatures.iter().all(|signature| *signature == signatures[0]));
        assert_eq!(cache.len(), 1);
        assert_eq!(device.command_signatures.lock().len(), 1);
    }
}
