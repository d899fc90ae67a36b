//! Mod folder layout

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Normalize a mod name into an identifier usable in paths and script keys
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`; leading and trailing
/// underscores are trimmed.
///
/// # Errors
/// Returns [`Error::Config`] if nothing usable remains.
///
/// # Examples
///
/// ```
/// use hoi4_radio_dl::modgen::normalize_mod_name;
///
/// assert_eq!(normalize_mod_name("Lo-fi Radio!").unwrap(), "Lo_fi_Radio");
/// assert!(normalize_mod_name("!!!").is_err());
/// ```
pub fn normalize_mod_name(name: &str) -> Result<String> {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = replaced.trim_matches('_');

    if trimmed.is_empty() {
        return Err(Error::config(
            "mod_name",
            format!("mod name {name:?} has no usable characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Paths of one generated mod
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModLayout {
    output_root: PathBuf,
    name: String,
}

impl ModLayout {
    /// Layout for the normalized mod `name` under `output_root`
    pub fn new(output_root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            output_root: output_root.into(),
            name: name.into(),
        }
    }

    /// Normalized mod name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the mod folder and the launcher descriptor
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// `<output_root>/<name>`
    pub fn mod_root(&self) -> PathBuf {
        self.output_root.join(&self.name)
    }

    /// `<mod_root>/music/<name>`
    pub fn music_dir(&self) -> PathBuf {
        self.mod_root().join("music").join(&self.name)
    }

    /// `<mod_root>/localisation`
    pub fn localisation_dir(&self) -> PathBuf {
        self.mod_root().join("localisation")
    }

    /// `<mod_root>/interface`
    pub fn interface_dir(&self) -> PathBuf {
        self.mod_root().join("interface")
    }

    /// `<mod_root>/gfx`
    pub fn gfx_dir(&self) -> PathBuf {
        self.mod_root().join("gfx")
    }

    /// Faceplate texture path
    pub fn faceplate_path(&self) -> PathBuf {
        self.gfx_dir().join(format!("{}_faceplate.dds", self.name))
    }

    /// In-mod descriptor
    pub fn descriptor_path(&self) -> PathBuf {
        self.mod_root().join("descriptor.mod")
    }

    /// Launcher descriptor placed next to the mod folder
    pub fn launcher_descriptor_path(&self) -> PathBuf {
        self.output_root.join(format!("{}.mod", self.name))
    }

    /// Create every directory of the layout
    pub async fn create_dirs(&self) -> Result<()> {
        for dir in [
            self.music_dir(),
            self.localisation_dir(),
            self.interface_dir(),
            self.gfx_dir(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }
}
