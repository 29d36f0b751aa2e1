//! Compiles candidate variants into debuggable executables.

use autopie_common::Language;
use std::{
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, warn};

/// Executable emitted next to the variant source, with the extension
/// replaced by `.out`.
pub fn executable_path(source: &Path) -> PathBuf {
    source.with_extension("out")
}

fn compile_command(source: &Path, output: &Path, language: Language) -> Command {
    let mut command = Command::new(language.compiler());
    command.arg("-O0").arg("-g").arg("-o").arg(output).arg(source);
    command
}

/// Compiles one variant with debug symbols and no optimisation.
///
/// A non-zero compiler exit or a missing output file counts as failure; the
/// caller silently skips such variants.
pub fn compile(source: &Path, language: Language) -> bool {
    let output_path = executable_path(source);
    let mut command = compile_command(source, &output_path, language);

    debug!("compiling {}", source.display());
    let output = match command.output() {
        Ok(output) => output,
        Err(error) => {
            warn!("failed to run {}: {error}", language.compiler());
            return false;
        }
    };

    if !output.status.success() {
        debug!(
            "compilation failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return false;
    }

    output_path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executable_sits_next_to_the_source() {
        assert_eq!(
            executable_path(Path::new("temp/3_example.c")),
            Path::new("temp/3_example.out")
        );
        assert_eq!(
            executable_path(Path::new("temp/3_example.cpp")),
            Path::new("temp/3_example.out")
        );
    }

    #[test]
    fn compiler_invocation_shape() {
        let command =
            compile_command(Path::new("temp/1_a.c"), Path::new("temp/1_a.out"), Language::C);
        assert_eq!(command.get_program(), "clang");
        let args: Vec<_> = command.get_args().map(|arg| arg.to_string_lossy()).collect();
        assert_eq!(args, ["-O0", "-g", "-o", "temp/1_a.out", "temp/1_a.c"]);

        let command =
            compile_command(Path::new("1_a.cpp"), Path::new("1_a.out"), Language::Cxx);
        assert_eq!(command.get_program(), "clang++");
    }
}
