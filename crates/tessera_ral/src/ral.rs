use core::fmt;

use tessera_logging::{log_error, LogLevel};

use crate::LOG_CAT;

/// RAL api
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RalApi {
    /// DirectX 12 (descriptor heaps and root signatures)
    DX12,
    /// Any other backend, identified by name
    Other(String),
}

impl RalApi {
    fn parse(name: &str) -> Self {
        match name {
            "dx12" => RalApi::DX12,
            other  => RalApi::Other(other.to_string()),
        }
    }

    /// Name of the api, also used as the name of its table in the settings file
    pub fn name(&self) -> &str {
        match self {
            RalApi::DX12 => "dx12",
            RalApi::Other(name) => name,
        }
    }
}

impl fmt::Display for RalApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Render Abstraction Layer settings
#[derive(Clone, Debug)]
pub struct Settings {
    /// RAL api
    pub api                  : RalApi,

    /// Debug enable
    pub debug_enabled        : bool,
    /// Enable validation
    pub debug_validation     : bool,
    /// Report barriers that don't change a resource's state
    pub debug_redundant_barriers: bool,
    /// Debug log level
    pub debug_log_level      : LogLevel,

    /// API specific settings
    pub api_specific         : toml::Table,
}

impl Settings {
    pub fn load(toml: &str) -> Option<Settings> {
        let toml = match toml.parse::<toml::Table>() {
            Ok(toml) => toml,
            Err(err) => {
                log_error!(LOG_CAT, Self::load, "Failed to parse 'ral.toml', err: {err}");
                return None;
            }
        };
        let mut settings = Settings::default();

        match toml.get("common").and_then(|common| common.get("api")).and_then(toml::Value::as_str) {
            Some(api) => settings.api = RalApi::parse(api),
            None => {
                log_error!(LOG_CAT, Self::load, "No api specified");
                return None;
            }
        }

        if let Some(toml::Value::Table(debug_table)) = toml.get("debug") {
            let flag = |name: &str| debug_table.get(name).and_then(toml::Value::as_bool).unwrap_or(false);
            settings.debug_enabled = flag("enable");
            settings.debug_validation = flag("validation");
            settings.debug_redundant_barriers = flag("redundant-barriers");

            if let Some(level) = debug_table.get("log-level").and_then(toml::Value::as_str) {
                settings.debug_log_level = LogLevel::parse(level).unwrap_or(LogLevel::Error);
            }
        }

        if let Some(toml::Value::Table(table)) = toml.get(settings.api.name()) {
            settings.api_specific = table.clone();
        }

        Some(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: RalApi::DX12,
            debug_enabled: false,
            debug_validation: false,
            debug_redundant_barriers: false,
            debug_log_level: LogLevel::Error,
            api_specific: toml::Table::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_settings() {
        let settings = Settings::load(r#"
            [common]
            api = "dx12"

            [debug]
            enable = true
            validation = true
            log-level = "verbose"

            [dx12]
            enhanced-barriers = false
        "#).expect("valid settings");

        assert_eq!(settings.api, RalApi::DX12);
        assert!(settings.debug_enabled);
        assert!(settings.debug_validation);
        assert!(!settings.debug_redundant_barriers);
        assert_eq!(settings.debug_log_level, LogLevel::Verbose);
        assert_eq!(settings.api_specific.get("enhanced-barriers").and_then(toml::Value::as_bool), Some(false));
    }

    #[test]
    fn api_is_required() {
        assert!(Settings::load("[debug]\nenable = true\n").is_none());
        assert!(Settings::load("this is not toml").is_none());
    }

    #[test]
    fn unknown_api_is_kept_by_name() {
        let settings = Settings::load("[common]\napi = \"metal\"\n[metal]\nfoo = 1\n").expect("valid settings");
        assert_eq!(settings.api, RalApi::Other("metal".to_string()));
        assert_eq!(settings.api.name(), "metal");
        assert!(settings.api_specific.contains_key("foo"));
    }
}
