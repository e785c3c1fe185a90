use windows::Win32::Graphics::Direct3D12::*;

const HEAP_TYPE_MASK: u32 = 0xFF;
const HEAP_FLAGS_SHIFT: u32 = 8;
const HEAP_FLAGS_MASK: u32 = 0xFFFF;
const DEDICATED_BIT: u32 = 1 << 31;

const KNOWN_HEAP_FLAGS: u32 = (D3D12_HEAP_FLAG_SHARED.0 |
    D3D12_HEAP_FLAG_DENY_BUFFERS.0 |
    D3D12_HEAP_FLAG_ALLOW_DISPLAY.0 |
    D3D12_HEAP_FLAG_SHARED_CROSS_ADAPTER.0 |
    D3D12_HEAP_FLAG_DENY_RT_DS_TEXTURES.0 |
    D3D12_HEAP_FLAG_DENY_NON_RT_DS_TEXTURES.0 |
    D3D12_HEAP_FLAG_HARDWARE_PROTECTED.0 |
    D3D12_HEAP_FLAG_ALLOW_WRITE_WATCH.0 |
    D3D12_HEAP_FLAG_ALLOW_SHADER_ATOMICS.0 |
    D3D12_HEAP_FLAG_CREATE_NOT_RESIDENT.0 |
    D3D12_HEAP_FLAG_CREATE_NOT_ZEROED.0) as u32;

/// Memory type a resource can be placed in
///
/// The type can be passed around as a single integer token, using [`MemoryType::to_bits`] and [`MemoryType::from_bits`]:
/// - bits 0..8: heap type
/// - bits 8..24: heap flags
/// - bit 31: the resource needs a dedicated allocation
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MemoryType {
    pub heap_type:         D3D12_HEAP_TYPE,
    pub heap_flags:        D3D12_HEAP_FLAGS,
    pub must_be_dedicated: bool,
}

impl MemoryType {
    pub const fn new(heap_type: D3D12_HEAP_TYPE, heap_flags: D3D12_HEAP_FLAGS) -> Self {
        Self { heap_type, heap_flags, must_be_dedicated: false }
    }

    pub const fn dedicated(self) -> Self {
        Self { must_be_dedicated: true, ..self }
    }

    /// Check if the CPU can map memory of this type
    pub fn is_host_visible(&self) -> bool {
        matches!(self.heap_type, D3D12_HEAP_TYPE_UPLOAD | D3D12_HEAP_TYPE_READBACK)
    }

    pub const fn to_bits(self) -> u32 {
        let dedicated = if self.must_be_dedicated { DEDICATED_BIT } else { 0 };
        (self.heap_type.0 as u32 & HEAP_TYPE_MASK) | ((self.heap_flags.0 as u32 & HEAP_FLAGS_MASK) << HEAP_FLAGS_SHIFT) | dedicated
    }

    /// Unpack a memory type, `None` if the token doesn't contain a valid heap type and heap flags
    pub fn from_bits(bits: u32) -> Option<Self> {
        let heap_type = D3D12_HEAP_TYPE((bits & HEAP_TYPE_MASK) as i32);
        if !matches!(heap_type, D3D12_HEAP_TYPE_DEFAULT | D3D12_HEAP_TYPE_UPLOAD | D3D12_HEAP_TYPE_READBACK | D3D12_HEAP_TYPE_CUSTOM) {
            return None;
        }
        let heap_flags = (bits >> HEAP_FLAGS_SHIFT) & HEAP_FLAGS_MASK;
        if heap_flags & !KNOWN_HEAP_FLAGS != 0 || bits & !(HEAP_TYPE_MASK | (HEAP_FLAGS_MASK << HEAP_FLAGS_SHIFT) | DEDICATED_BIT) != 0 {
            return None;
        }

        Some(Self {
            heap_type,
            heap_flags: D3D12_HEAP_FLAGS(heap_flags as i32),
            must_be_dedicated: bits & DEDICATED_BIT != 0,
        })
    }

    pub fn heap_properties(&self) -> D3D12_HEAP_PROPERTIES {
        D3D12_HEAP_PROPERTIES {
            Type: self.heap_type,
            CPUPageProperty: D3D12_CPU_PAGE_PROPERTY_UNKNOWN,
            MemoryPoolPreference: D3D12_MEMORY_POOL_UNKNOWN,
            CreationNodeMask: 0,
            VisibleNodeMask: 0,
        }
    }

    /// Description of a heap of this memory type
    pub fn heap_desc(&self, size: u64, alignment: u64) -> D3D12_HEAP_DESC {
        D3D12_HEAP_DESC {
            SizeInBytes: size,
            Properties: self.heap_properties(),
            Alignment: alignment,
            Flags: self.heap_flags,
        }
    }
}

/// Memory types every device exposes: GPU-only, upload and readback
pub const DEFAULT_MEMORY_TYPES: [MemoryType; 3] = [
    MemoryType::new(D3D12_HEAP_TYPE_DEFAULT, D3D12_HEAP_FLAG_ALLOW_SHADER_ATOMICS),
    MemoryType::new(D3D12_HEAP_TYPE_UPLOAD, D3D12_HEAP_FLAG_NONE),
    MemoryType::new(D3D12_HEAP_TYPE_READBACK, D3D12_HEAP_FLAG_NONE),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_layout() {
        let memory_type = MemoryType::new(D3D12_HEAP_TYPE_UPLOAD, D3D12_HEAP_FLAG_DENY_BUFFERS | D3D12_HEAP_FLAG_CREATE_NOT_ZEROED).dedicated();
        assert_eq!(memory_type.to_bits(), 0x8010_0402);
        assert_eq!(MemoryType::from_bits(0x8010_0402), Some(memory_type));
        assert!(memory_type.is_host_visible());
    }

    #[test]
    fn default_memory_is_zero_flags() {
        let memory_type = MemoryType::new(D3D12_HEAP_TYPE_DEFAULT, D3D12_HEAP_FLAG_NONE);
        assert_eq!(memory_type.to_bits(), 1);
        assert!(!memory_type.is_host_visible());
        assert!(!MemoryType::from_bits(1).unwrap().must_be_dedicated);
    }

    #[test]
    fn invalid_tokens() {
        assert_eq!(MemoryType::from_bits(0), None);
        assert_eq!(MemoryType::from_bits(9), None);
        // Undefined heap flag
        assert_eq!(MemoryType::from_bits(1 | (0x2 << 8)), None);
        // Reserved bits
        assert_eq!(MemoryType::from_bits(1 | (1 << 24)), None);
    }

    #[test]
    fn heap_desc_carries_type_and_flags() {
        let desc = DEFAULT_MEMORY_TYPES[0].heap_desc(1 << 20, 65536);
        assert_eq!(desc.SizeInBytes, 1 << 20);
        assert_eq!(desc.Alignment, 65536);
        assert_eq!(desc.Properties.Type, D3D12_HEAP_TYPE_DEFAULT);
        assert_eq!(desc.Flags, D3D12_HEAP_FLAG_ALLOW_SHADER_ATOMICS);
        assert!(DEFAULT_MEMORY_TYPES.iter().all(|memory_type| MemoryType::from_bits(memory_type.to_bits()) == Some(*memory_type)));
    }
}
