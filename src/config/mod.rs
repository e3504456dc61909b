use std::env;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::binder::ToggleMode;
use crate::sanitize::ScriptPolicy;

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(alias = "api_url")]
    pub endpoint: Option<String>,
    pub timeout: Option<u64>,
    pub proxy: Option<String>,
    pub secret_env: Option<String>,
    pub token_ttl: Option<u64>,
    pub toggle_mode: Option<ToggleMode>,
    pub auto_height: Option<bool>,
    pub script_policy: Option<ScriptPolicy>,
    pub trusted_scripts: Option<bool>,
    pub output: Option<String>,
    pub print: Option<String>,
    pub no_color: Option<bool>,
}

fn home_dir() -> Option<PathBuf> {
    ["HOME", "USERPROFILE"]
        .into_iter()
        .find_map(env::var_os)
        .map(PathBuf::from)
}

/// `~/.resultview/config.yml`
pub fn default_config_path() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".resultview").join("config.yml"))
}

/// Resolves a leading `~` against the home directory. Other paths pass
/// through untouched.
pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with(['/', '\\']) => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}

pub fn expand_tilde_string(path: &str) -> String {
    expand_tilde(path).to_string_lossy().into_owned()
}

pub fn load_config(path: &PathBuf, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents)
            .map_err(|e| format!("failed to parse config '{}': {e}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

pub fn parse_config(contents: &str) -> Result<ConfigFile, serde_yaml::Error> {
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str::<ConfigFile>(contents)
}

pub(crate) fn default_config_yaml() -> String {
    r#"# resultview config
#
# Location (default):
#   ~/.resultview/config.yml

# Result provider
endpoint: https://shhapi.vercel.app/api/result
timeout: 15
# proxy: http://127.0.0.1:8080

# Token signing. The secret itself is read from this environment variable.
secret_env: SECRET_KEY
token_ttl: 300

# Sections: independent (any number open) or accordion (one open at a time)
toggle_mode: independent
auto_height: false

# Inline scripts: strip (default) or replay.
# replay only takes effect together with trusted_scripts: true and runs
# provider scripts with host privileges.
script_policy: strip
trusted_scripts: false

# Output (optional)
# output: ./result.html
# print: ./print.html

# Output styling
no_color: false
"#
    .to_string()
}

pub fn ensure_default_config_file(path: &PathBuf) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    let contents = default_config_yaml();
    std::fs::write(path, contents)
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(())
}
