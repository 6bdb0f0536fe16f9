//! Project files.
//!
//! One versioned root structure holds the whole document: project data,
//! undo history and the version control tree with its head snapshot. The
//! file is either pretty-printed JSON (".json") or the MessagePack
//! equivalent of the same tree, sniffed apart on load by the leading byte.
//! Writes go through a temp file in the target directory followed by an
//! atomic rename; a failed write leaves the previous file untouched.


use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use lammas_types::Project;

use crate::config::Config;
use crate::document::ProjectDocument;
use crate::undo::UndoStack;
use crate::vcs::VersionControl;

/// Bumped when the root structure changes shape.
pub const PROJECT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ProjectRootFile {
    version: u32,
    project: Project,
    #[serde(default)]
    undo: UndoStack,
    vcs: VersionControl,
}

#[derive(Debug)]
pub enum ProjectFileError {
    Io(io::Error),
    /// The file does not parse, or parses into something inconsistent.
    Malformed(String),
    /// Written by a newer build.
    UnsupportedVersion(u32),
    /// The revision tree is unusable even after the snapshot-rebuild
    /// fallback.
    VersionControl,
}

impl fmt::Display for ProjectFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "project file i/o error: {e}"),
            Self::Malformed(detail) => write!(f, "cannot open project: {detail}"),
            Self::UnsupportedVersion(version) => {
                write!(f, "project format {version} is newer than supported")
            }
            Self::VersionControl => write!(f, "version control state is unrecoverable"),
        }
    }
}

impl std::error::Error for ProjectFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ProjectFileError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

fn is_text_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

pub fn save_project(path: &Path, document: &ProjectDocument) -> Result<(), ProjectFileError> {
    let file = ProjectRootFile {
        version: PROJECT_FORMAT_VERSION,
        project: document.project.clone(),
        undo: document.undo.clone(),
        vcs: document.vcs.clone(),
    };
    let bytes = if is_text_path(path) {
        serde_json::to_vec_pretty(&file).map_err(|e| ProjectFileError::Malformed(e.to_string()))?
    } else {
        rmp_serde::to_vec_named(&file)
            .map_err(|e| ProjectFileError::Malformed(e.to_string()))?
    };
    write_atomically(path, &bytes)?;
    Ok(())
}

/// Loads a project document. On any error the caller keeps whatever
/// document it had (typically a fresh one); nothing here mutates shared
/// state before the whole file has parsed and been repaired.
pub fn load_project(path: &Path) -> Result<ProjectDocument, ProjectFileError> {
    let bytes = fs::read(path)?;
    let file: ProjectRootFile = if bytes.first() == Some(&b'{') {
        serde_json::from_slice(&bytes).map_err(|e| ProjectFileError::Malformed(e.to_string()))?
    } else {
        rmp_serde::from_slice(&bytes).map_err(|e| ProjectFileError::Malformed(e.to_string()))?
    };

    if file.version > PROJECT_FORMAT_VERSION {
        return Err(ProjectFileError::UnsupportedVersion(file.version));
    }

    let mut project = file.project;
    // sequences repair id collisions while deserializing; this is the
    // final cross-check that they really did
    let repaired = project.repair_ids();
    if repaired > 0 {
        log::warn!(target: "persistence", "repaired {repaired} colliding ids on load");
    }

    let mut vcs = file.vcs;
    if !vcs.after_load() {
        return Err(ProjectFileError::VersionControl);
    }

    Ok(ProjectDocument::from_parts(project, file.undo, vcs))
}

/// Saves to the given path when autosave is enabled; reports whether a
/// write happened.
pub fn autosave(
    path: &Path,
    document: &ProjectDocument,
    config: &Config,
) -> Result<bool, ProjectFileError> {
    if !config.autosave_enabled() {
        return Ok(false);
    }
    save_project(path, document)?;
    Ok(true)
}

/// Two-phase write: everything lands in a temp file next to the target,
/// which is fsynced and renamed over it. The temp file cleans itself up on
/// every early exit.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(directory)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
