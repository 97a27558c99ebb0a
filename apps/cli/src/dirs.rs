use std::env;
use std::path::PathBuf;

const APP_DIR_NAME: &str = "claude-tracker";

/// `$XDG_CONFIG_HOME/claude-tracker`, else `~/.config/claude-tracker`.
pub fn config_dir() -> Result<PathBuf, String> {
    xdg_dir("XDG_CONFIG_HOME", &[".config"])
}

/// `$XDG_DATA_HOME/claude-tracker`, else `~/.local/share/claude-tracker`.
pub fn data_dir() -> Result<PathBuf, String> {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"])
}

fn xdg_dir(var: &str, home_fallback: &[&str]) -> Result<PathBuf, String> {
    if let Ok(value) = env::var(var)
        && !value.trim().is_empty()
    {
        return Ok(PathBuf::from(value).join(APP_DIR_NAME));
    }
    let home = env::var("HOME").map_err(|err| format!("resolve HOME: {}", err))?;
    let mut dir = PathBuf::from(home);
    for segment in home_fallback {
        dir.push(segment);
    }
    Ok(dir.join(APP_DIR_NAME))
}
