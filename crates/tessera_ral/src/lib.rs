//! Render Abstraction Layer (RAL)
//! 
//! API-agnostic description of resource synchronization and resource binding.
//! 
//! Backends implement the `*Interface` traits in this crate, and are handed the descriptions defined here.
//! Objects created by a backend are passed around as `Arc<dyn *Interface>` handles, which a backend resolves back to its own types using `as_any()`.
//! 
//! All descriptions are validated when objects are created, recording commands is never expected to fail.

use tessera_logging::LogCategory;

mod result;
pub mod constants;
pub mod common;
mod barrier;
mod descriptor;
mod pipeline;
mod command_list;
mod device;
mod ral;

pub use result::*;
pub use common::*;
pub use barrier::*;
pub use descriptor::*;
pub use pipeline::*;
pub use command_list::*;
pub use device::*;
pub use ral::*;

pub(crate) const LOG_CAT: LogCategory = LogCategory::new("RAL");
