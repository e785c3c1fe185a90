//! Tessera translates an API-agnostic resource synchronization and resource binding model onto D3D12.
//! 
//! The workspace is split into:
//! - [`ral`]: descriptions and backend interfaces of the render abstraction layer.
//! - [`dx12`]: the D3D12 backend, driving the native API through the [`dx12::NativeDevice`] and [`dx12::NativeCommandList`] traits.
//! - [`logging`]: the logger used by all crates.

use std::{path::Path, sync::Arc};

pub use tessera_logging as logging;
pub use tessera_ral as ral;
pub use tessera_ral_dx12 as dx12;

use logging::{log_error, LogCategory};

const LOG_CAT: LogCategory = LogCategory::new("Tessera");

/// Load the RAL settings from a `ral.toml` file
pub fn load_settings(path: &Path) -> Option<ral::Settings> {
    let toml_data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) => {
            log_error!(LOG_CAT, load_settings, "Failed to read '{}', err: {err}", path.display());
            return None;
        },
    };
    ral::Settings::load(&toml_data)
}

/// Apply the debug settings to the global logger
pub fn apply_log_settings(settings: &ral::Settings) {
    let logger = logging::get_logger();
    logger.set_max_level(settings.debug_log_level);
    logger.set_always_flush(settings.debug_enabled);
}

/// Create the device for the api selected in the settings
pub fn create_device(native: Arc<dyn dx12::NativeDevice>, caps: dx12::DeviceCaps, settings: &ral::Settings) -> ral::Result<Arc<dx12::Device>> {
    match &settings.api {
        ral::RalApi::DX12 => Ok(Arc::new(dx12::Device::new(native, caps, settings))),
        ral::RalApi::Other(name) => {
            log_error!(LOG_CAT, create_device, "Unsupported RAL api '{name}'");
            Err(ral::Error::MissingFeature("requested RAL api"))
        },
    }
}
