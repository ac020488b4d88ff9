//! Font resolution for the PDF export.
//!
//! The report prefers the bundled Roboto family.  Lookup order for its directory:
//!
//! 1. `$REGRESSION_REPORT_FONTS_DIR`
//! 2. `assets/fonts` next to the running executable
//! 3. `assets/fonts` in the crate manifest directory
//!
//! When none of them holds the four Roboto files, a system family is used instead: DejaVu Sans on
//! Unix-like systems and Arial on Windows.  `$REGRESSION_REPORT_SYSTEM_FONTS_DIR` overrides the
//! directory searched for the system family.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{self, FontData, FontFamily};
use log::{debug, warn};

/// Environment variable pointing at a directory with the bundled font files.
pub const FONTS_DIR_ENV: &str = "REGRESSION_REPORT_FONTS_DIR";

/// Environment variable overriding the system font directory used as fallback.
pub const SYSTEM_FONTS_DIR_ENV: &str = "REGRESSION_REPORT_SYSTEM_FONTS_DIR";

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

const FONT_FILES: &[&str] = &[
    "Roboto-Regular.ttf",
    "Roboto-Bold.ttf",
    "Roboto-Italic.ttf",
    "Roboto-BoldItalic.ttf",
];

/// File names of a system font family, by style.
struct SystemFamily {
    name: &'static str,
    regular: &'static str,
    bold: &'static str,
    italic: &'static str,
    bold_italic: &'static str,
    directories: &'static [&'static str],
}

#[cfg(not(windows))]
const SYSTEM_FAMILY: SystemFamily = SystemFamily {
    name: "DejaVu Sans",
    regular: "DejaVuSans.ttf",
    bold: "DejaVuSans-Bold.ttf",
    italic: "DejaVuSans-Oblique.ttf",
    bold_italic: "DejaVuSans-BoldOblique.ttf",
    directories: &[
        "/usr/share/fonts/truetype/dejavu",
        "/usr/share/fonts/TTF",
        "/usr/share/fonts/dejavu",
        "/usr/local/share/fonts",
        "/Library/Fonts",
    ],
};

#[cfg(windows)]
const SYSTEM_FAMILY: SystemFamily = SystemFamily {
    name: "Arial",
    regular: "arial.ttf",
    bold: "arialbd.ttf",
    italic: "ariali.ttf",
    bold_italic: "arialbi.ttf",
    directories: &[],
};

fn env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var).and_then(|value| {
        let path = PathBuf::from(value);
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    })
}

/// Directory the bundled fonts are expected in when running from the source tree.
pub fn bundled_fonts_source_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts")
}

fn font_directory_candidates() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = env_path(FONTS_DIR_ENV).into_iter().collect();

    let exe_candidate = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("assets/fonts")));
    for candidate in exe_candidate.into_iter().chain([bundled_fonts_source_dir()]) {
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }

    candidates
}

fn missing_font_files(path: &Path) -> Vec<&'static str> {
    FONT_FILES
        .iter()
        .copied()
        .filter(|name| !path.join(name).is_file())
        .collect()
}

fn resolve_font_directory() -> Result<PathBuf, Error> {
    let mut attempts = Vec::new();

    for candidate in font_directory_candidates() {
        if !candidate.is_dir() {
            attempts.push(format!("{} (directory missing)", candidate.display()));
            continue;
        }

        let missing = missing_font_files(&candidate);
        if missing.is_empty() {
            return Ok(candidate);
        }
        attempts.push(format!(
            "{} (missing files [{}])",
            candidate.display(),
            missing.join(", ")
        ));
    }

    Err(Error::new(
        format!(
            "Unable to locate the {} font files. Checked: {}. Set {} to a directory containing them.",
            DEFAULT_FONT_FAMILY_NAME,
            attempts.join(", "),
            FONTS_DIR_ENV
        ),
        io::Error::new(io::ErrorKind::NotFound, "bundled fonts directory not found"),
    ))
}

fn load_bundled_font_family() -> Result<FontFamily<FontData>, Error> {
    let directory = resolve_font_directory()?;
    debug!("Loading {} fonts from {}", DEFAULT_FONT_FAMILY_NAME, directory.display());

    fonts::from_files(&directory, DEFAULT_FONT_FAMILY_NAME, None).map_err(|err| {
        Error::new(
            format!(
                "Failed to load font family '{}' from {}: {}",
                DEFAULT_FONT_FAMILY_NAME,
                directory.display(),
                err
            ),
            io::Error::new(io::ErrorKind::Other, err.to_string()),
        )
    })
}

fn system_font_directories() -> Vec<PathBuf> {
    if let Some(path) = env_path(SYSTEM_FONTS_DIR_ENV) {
        return vec![path];
    }

    let mut directories: Vec<PathBuf> = SYSTEM_FAMILY.directories.iter().map(PathBuf::from).collect();
    for var in ["WINDIR", "SystemRoot"] {
        if let Some(root) = env_path(var) {
            directories.push(root.join("Fonts"));
        }
    }
    directories
}

fn load_system_font(directory: &Path, file: &str, style: &str) -> Result<FontData, Error> {
    let path = directory.join(file);
    FontData::load(&path, None).map_err(|err| {
        let io_kind = if path.is_file() {
            io::ErrorKind::Other
        } else {
            io::ErrorKind::NotFound
        };
        Error::new(
            format!(
                "Failed to load {} {} font at {}: {}",
                SYSTEM_FAMILY.name,
                style,
                path.display(),
                err
            ),
            io::Error::new(io_kind, err.to_string()),
        )
    })
}

fn system_font_family() -> Result<FontFamily<FontData>, Error> {
    let directory = system_font_directories()
        .into_iter()
        .find(|dir| dir.join(SYSTEM_FAMILY.regular).is_file())
        .ok_or_else(|| {
            Error::new(
                format!("No directory with the {} fonts found", SYSTEM_FAMILY.name),
                io::Error::new(io::ErrorKind::NotFound, "system fonts not found"),
            )
        })?;

    Ok(FontFamily {
        regular: load_system_font(&directory, SYSTEM_FAMILY.regular, "regular")?,
        bold: load_system_font(&directory, SYSTEM_FAMILY.bold, "bold")?,
        italic: load_system_font(&directory, SYSTEM_FAMILY.italic, "italic")?,
        bold_italic: load_system_font(&directory, SYSTEM_FAMILY.bold_italic, "bold italic")?,
    })
}

fn fonts_missing(err: &Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::IoError(io_err)
            if io_err.kind() == io::ErrorKind::NotFound
                || io_err.kind() == io::ErrorKind::PermissionDenied
    )
}

/// Returns the bundled Roboto family, falling back to the system family when it is missing.
pub fn default_font_family() -> Result<FontFamily<FontData>, Error> {
    match load_bundled_font_family() {
        Ok(family) => Ok(family),
        Err(err) if fonts_missing(&err) => match system_font_family() {
            Ok(fallback) => {
                warn!(
                    "Bundled fonts unavailable ({}); falling back to '{}'.",
                    err, SYSTEM_FAMILY.name
                );
                Ok(fallback)
            }
            Err(fallback_err) => Err(Error::new(
                format!(
                    "Bundled fonts unavailable ({}) and the {} fallback failed: {}",
                    err, SYSTEM_FAMILY.name, fallback_err
                ),
                io::Error::new(io::ErrorKind::NotFound, "no usable fonts available"),
            )),
        },
        Err(err) => Err(err),
    }
}

/// Indicates whether all bundled fonts required for the default font family are present on disk.
pub fn default_fonts_available() -> bool {
    resolve_font_directory().is_ok()
}

/// Indicates whether any usable font family, bundled or system, can be loaded.
pub fn any_fonts_available() -> bool {
    default_fonts_available() || system_font_family().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Roboto-Regular.ttf"), b"").unwrap();
        assert_eq!(
            missing_font_files(dir.path()),
            [
                "Roboto-Bold.ttf",
                "Roboto-Italic.ttf",
                "Roboto-BoldItalic.ttf"
            ]
        );
    }

    #[test]
    fn manifest_directory_is_always_a_candidate() {
        assert!(font_directory_candidates().contains(&bundled_fonts_source_dir()));
    }

    #[test]
    fn not_found_errors_count_as_missing_fonts() {
        let err = Error::new(
            "missing",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(fonts_missing(&err));
        assert!(!fonts_missing(&Error::new("bad", ErrorKind::InvalidData)));
    }
}
