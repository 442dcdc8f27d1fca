//! CLI-specific configuration: a TOML file wrapping a
//! [`codec2_core::config::FreeDvConfig`], with the teacher's
//! include/deep-merge convention preserved so a base config can be
//! layered with mode- or scenario-specific overrides.

use codec2_core::config::FreeDvConfig;
use codec2_core::freedv::modes::FreeDvMode;
use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

/// Deep merge JSON values - override takes precedence over base. For
/// objects, recursively merge; for arrays and primitives, override
/// replaces base.
fn merge_json_values(base: &mut JsonValue, override_val: JsonValue) {
    match (base, override_val) {
        (JsonValue::Object(base_map), JsonValue::Object(override_map)) => {
            for (key, value) in override_map {
                if let Some(base_value) = base_map.get_mut(&key) {
                    merge_json_values(base_value, value);
                } else {
                    base_map.insert(key, value);
                }
            }
        }
        (base_val, override_val) => {
            *base_val = override_val;
        }
    }
}

/// Accepts either a single string or an array of strings for `include`.
fn deserialize_include_optional<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    let opt: Option<StringOrVec> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(Vec::new()),
        Some(StringOrVec::String(s)) => Ok(vec![s]),
        Some(StringOrVec::Vec(v)) => Ok(v),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_include_optional")]
    pub include: Vec<String>,

    #[serde(default = "default_freedv_config")]
    pub freedv: FreeDvConfig,

    /// WAV file to write decoded speech to, instead of stdout, when set.
    #[serde(default)]
    pub wav_output: Option<PathBuf>,
}

fn default_freedv_config() -> FreeDvConfig {
    FreeDvConfig::new(FreeDvMode::Mode700C)
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            freedv: default_freedv_config(),
            wav_output: None,
        }
    }
}

impl CliConfig {
    /// Load configuration from a TOML file, resolving `include` entries
    /// relative to the including file's directory and deep-merging them
    /// in order before applying this file's own settings on top.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;

        let config_toml: toml::Value =
            toml::from_str(&content).wrap_err("failed to parse TOML configuration")?;
        let mut config_json =
            serde_json::to_value(&config_toml).wrap_err("failed to convert TOML to JSON")?;

        let includes = match config_json.get("include") {
            Some(JsonValue::String(s)) => vec![s.clone()],
            Some(JsonValue::Array(arr)) => {
                arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()
            }
            _ => Vec::new(),
        };

        if let JsonValue::Object(ref mut map) = config_json {
            map.remove("include");
        }

        let mut base_json =
            serde_json::to_value(Self::default()).wrap_err("failed to create default config")?;

        for include_path in &includes {
            let include_full_path = if Path::new(include_path).is_absolute() {
                PathBuf::from(include_path)
            } else {
                path.parent().unwrap_or_else(|| Path::new(".")).join(include_path)
            };
            let included = Self::from_file(&include_full_path).wrap_err_with(|| {
                format!("failed to load included config: {}", include_full_path.display())
            })?;
            let included_json =
                serde_json::to_value(included).wrap_err("failed to convert included config to JSON")?;
            merge_json_values(&mut base_json, included_json);
        }

        merge_json_values(&mut base_json, config_json);

        serde_json::from_value(base_json).wrap_err("failed to parse final configuration")
    }
}
