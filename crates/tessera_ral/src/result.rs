use core::fmt;

/// Kind of error, used by callers that only care about how an error should be handled.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    /// An argument or description has an invalid shape
    InvalidArgument,
    /// A feature requires a capability that isn't available
    Unsupported,
    /// An index space or pool is exhausted
    OutOfMemory,
    /// The native API reported a failure
    Native,
    /// Any other error
    Other,
}

/// RAL error
#[derive(Clone, PartialEq, Debug)]
pub enum Error {
    /// Generic invalid parameter
    InvalidParameter(String),
    /// Invalid transition barrier
    InvalidBarrier(String),
    /// Invalid pipeline layout description
    InvalidPipelineLayout(String),
    /// Descriptor set index doesn't exist in the pipeline layout
    DescriptorSetIndexOutOfRange { index: u32, count: u32 },
    /// An expected features is missing
    MissingFeature(&'static str),
    /// The pipeline layout needs a newer root signature version than the device supports
    UnsupportedRootSignatureVersion,
    /// All descriptor heap indices are in use
    OutOfDescriptorHeapIndices,
    /// Descriptor pool does not have enough space left
    OutOfDescriptorPoolSpace { requested: u32, available: u32 },
    /// The native API returned an error code
    Native(i32),
    /// Other error
    Other(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidParameter(_)                      |
            Error::InvalidBarrier(_)                        |
            Error::InvalidPipelineLayout(_)                 |
            Error::DescriptorSetIndexOutOfRange { .. }      => ErrorKind::InvalidArgument,
            Error::MissingFeature(_)                        |
            Error::UnsupportedRootSignatureVersion          => ErrorKind::Unsupported,
            Error::OutOfDescriptorHeapIndices               |
            Error::OutOfDescriptorPoolSpace { .. }          => ErrorKind::OutOfMemory,
            Error::Native(_)                                => ErrorKind::Native,
            Error::Other(_)                                 => ErrorKind::Other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidParameter(s)                               => write!(f, "Invalid parameter: {s}"),
            Error::InvalidBarrier(s)                                 => write!(f, "Invalid barrier: {s}"),
            Error::InvalidPipelineLayout(s)                          => write!(f, "Invalid pipeline layout: {s}"),
            Error::DescriptorSetIndexOutOfRange { index, count }     => write!(f, "Descriptor set index {index} is out of range, pipeline layout has {count} descriptor sets"),
            Error::MissingFeature(name)                              => write!(f, "Missing expected feature: '{name}'"),
            Error::UnsupportedRootSignatureVersion                   => f.write_str("Root signature version is not supported by the device"),
            Error::OutOfDescriptorHeapIndices                        => f.write_str("Ran out of descriptor heap indices"),
            Error::OutOfDescriptorPoolSpace { requested, available } => write!(f, "Descriptor pool is out of space, requested {requested} descriptors, {available} available"),
            Error::Native(code)                                      => write!(f, "Native API error: {code:#010X}"),
            Error::Other(s)                                          => f.write_str(s),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;

static_assertions::assert_impl_all!(Error: Send, Sync);
