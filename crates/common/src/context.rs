//! The reducer context passed explicitly through the mapping, printing,
//! search, and oracle components, plus the filesystem bookkeeping for the
//! scratch directories.

use crate::{text, OUTPUT_STEM, TEMP_DIR, VISUALS_DIR};
use eyre::{Context as _, Result};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Source language of the reduced file, decided by the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    C,
    Cxx,
}

impl Language {
    /// Detects the language from a source path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "c" | "h" => Some(Self::C),
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Some(Self::Cxx),
            _ => None,
        }
    }

    /// Extension used for emitted variants, with the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::C => ".c",
            Self::Cxx => ".cpp",
        }
    }

    /// The compiler binary used for variant validation.
    pub fn compiler(self) -> &'static str {
        match self {
            Self::C => "clang",
            Self::Cxx => "clang++",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::C => "C",
            Self::Cxx => "C++",
        }
    }
}

/// The file name and line number of the error specified on the command line.
#[derive(Clone, Debug)]
pub struct Location {
    pub file_path: PathBuf,
    pub line: u32,
}

impl Location {
    pub fn new(file_path: impl Into<PathBuf>, line: u32) -> Self {
        Self { file_path: file_path.into(), line }
    }
}

/// The data specified in the options on the command line.
#[derive(Clone, Debug)]
pub struct InputData {
    /// Substring expected in the debugger's stop status; empty matches any
    /// stop.
    pub error_message: String,
    pub error_location: Location,
    /// Target reduction fraction in (0, 1]; used by the naive search only.
    pub reduction_ratio: f64,
    pub dump_dot: bool,
}

/// Counters reported at the end of a successful run.
#[derive(Clone, Debug, Default)]
pub struct Statistics {
    pub expected_iterations: f64,
    pub total_iterations: u64,
    pub input_size_bytes: u64,
    pub output_size_bytes: u64,
}

/// Per-run state shared by the searches and the oracle. Passed explicitly
/// wherever it is needed; there is no global context.
#[derive(Debug)]
pub struct ReductionContext {
    pub input: InputData,
    pub language: Language,
    pub stats: Statistics,
    pub current_epoch: usize,
    /// Variant id to the adjusted potential error lines of that variant.
    pub adjusted_error_lines: HashMap<u64, Vec<u32>>,
}

impl ReductionContext {
    pub fn new(input: InputData, language: Language) -> Result<Self> {
        let input_size_bytes = fs::metadata(&input.error_location.file_path)
            .wrap_err("failed to inspect the input file")?
            .len();

        Ok(Self {
            input,
            language,
            stats: Statistics { input_size_bytes, ..Default::default() },
            current_epoch: 0,
            adjusted_error_lines: HashMap::new(),
        })
    }

    /// Stem shared by all variant file names.
    pub fn source_stem(&self) -> String {
        text::file_stem(&self.input.error_location.file_path)
    }

    /// Path of the variant produced in the given iteration:
    /// `temp/<iteration>_<basename>.<ext>`.
    pub fn variant_path(&self, iteration: u64) -> PathBuf {
        let name =
            format!("{iteration}_{}{}", self.source_stem(), self.language.extension());
        Path::new(TEMP_DIR).join(name)
    }

    /// Path the confirmed minimum is renamed to.
    pub fn output_path(&self) -> PathBuf {
        Path::new(TEMP_DIR).join(format!("{OUTPUT_STEM}{}", self.language.extension()))
    }

    /// Path of the GraphViz dump for the given iteration.
    pub fn dot_dump_path(&self, iteration: u64) -> PathBuf {
        Path::new(VISUALS_DIR).join(format!("dotDump_{iteration}_{}.dot", self.source_stem()))
    }
}

/// Removes all files inside the temp directory and recreates it.
pub fn clear_temp_directory() -> Result<()> {
    debug!("clearing the {TEMP_DIR} directory");
    let path = Path::new(TEMP_DIR);
    if path.exists() {
        fs::remove_dir_all(path).wrap_err("failed to clear the temp directory")?;
    }
    fs::create_dir_all(path).wrap_err("failed to recreate the temp directory")?;
    Ok(())
}

/// Creates the GraphViz output directory if missing. Its contents are never
/// cleared.
pub fn ensure_visuals_directory() -> Result<()> {
    fs::create_dir_all(VISUALS_DIR).wrap_err("failed to create the visuals directory")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_detection_by_extension() {
        assert_eq!(Language::from_path(Path::new("a/b/crash.c")), Some(Language::C));
        assert_eq!(Language::from_path(Path::new("crash.cpp")), Some(Language::Cxx));
        assert_eq!(Language::from_path(Path::new("crash.cc")), Some(Language::Cxx));
        assert_eq!(Language::from_path(Path::new("crash.rs")), None);
        assert_eq!(Language::from_path(Path::new("crash")), None);
    }

    #[test]
    fn variant_and_output_naming() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("example.c");
        fs::write(&source, "int main() { return 0; }\n").unwrap();

        let input = InputData {
            error_message: String::new(),
            error_location: Location::new(&source, 1),
            reduction_ratio: 1.0,
            dump_dot: false,
        };
        let ctx = ReductionContext::new(input, Language::C).unwrap();

        assert_eq!(ctx.variant_path(3), Path::new(TEMP_DIR).join("3_example.c"));
        assert_eq!(ctx.output_path(), Path::new(TEMP_DIR).join("autoPieOut.c"));
        assert_eq!(ctx.dot_dump_path(0), Path::new(VISUALS_DIR).join("dotDump_0_example.dot"));
        assert_eq!(ctx.stats.input_size_bytes, 25);
    }
}
