use std::ffi::OsStr;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};

const SUBAGENTS_DIR: &str = "subagents";
const TRANSCRIPT_EXTENSION: &str = "jsonl";

/// Transcript storage root: `CLAUDE_CONFIG_DIR` when set, else `~/.claude`.
pub fn default_claude_home() -> PathBuf {
    if let Ok(path) = std::env::var("CLAUDE_CONFIG_DIR")
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".claude");
    }
    PathBuf::from(".claude")
}

pub fn default_projects_dir() -> PathBuf {
    projects_dir(&default_claude_home())
}

pub fn projects_dir(claude_home: &Path) -> PathBuf {
    claude_home.join("projects")
}

pub fn is_transcript_path(path: &Path) -> bool {
    path.extension() == Some(OsStr::new(TRANSCRIPT_EXTENSION))
}

/// True when a directory component of `path` is named exactly `subagents`.
pub fn is_subagent_file(path: &Path) -> bool {
    path.parent()
        .map(|dir| {
            dir.components()
                .any(|component| component.as_os_str() == OsStr::new(SUBAGENTS_DIR))
        })
        .unwrap_or(false)
}

/// File name without its extension.
pub fn session_external_id(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The directory right above the last `subagents` directory component.
pub fn parent_external_id(path: &Path) -> Option<String> {
    let dirs: Vec<Component<'_>> = path.parent()?.components().collect();
    let index = dirs
        .iter()
        .rposition(|component| component.as_os_str() == OsStr::new(SUBAGENTS_DIR))?;
    match dirs.get(index.checked_sub(1)?)? {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    }
}

/// Decodes the project directory under `projects_root`: the first relative
/// segment with every `-` turned back into a path separator.
pub fn project_from_path(path: &Path, projects_root: &Path) -> Option<String> {
    let relative = path.strip_prefix(projects_root).ok()?;
    let mut components = relative.components();
    let first = components.next()?;
    // A bare file directly under the root has no project directory.
    components.next()?;
    match first {
        Component::Normal(name) => Some(
            name.to_string_lossy()
                .replace('-', &MAIN_SEPARATOR.to_string()),
        ),
        _ => None,
    }
}

/// `<dir>/<stem>/subagents` for a main transcript at `<dir>/<stem>.jsonl`.
pub fn subagents_dir(main_path: &Path) -> Option<PathBuf> {
    let parent = main_path.parent()?;
    let stem = main_path.file_stem()?;
    Some(parent.join(stem).join(SUBAGENTS_DIR))
}
