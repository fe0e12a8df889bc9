//! Output path resolution
//!
//! Every output is named after its input's stem with a `.wma` extension;
//! the output mode only decides which directory it lands in.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

const OUTPUT_EXTENSION: &str = "wma";

/// Where encoded files are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// A single caller-supplied directory
    Custom { directory: Option<PathBuf> },
    /// Next to the input file
    SameAsInput,
    /// A named subfolder of the input's directory
    Subfolder { name: String },
}

#[derive(Debug, Error)]
pub enum PathError {
    #[error("no output directory selected")]
    MissingDirectory,
    #[error("failed to create output directory {path}: {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot derive an output name from {0}")]
    InvalidInput(PathBuf),
    #[error("output would overwrite the input file {0}")]
    OutputIsInput(PathBuf),
    #[error("output {output} is already claimed by {owner}")]
    OutputCollision { output: PathBuf, owner: PathBuf },
}

/// Compute the destination for `input_path` without touching the filesystem
pub fn plan_output_path(input_path: &Path, mode: &OutputMode) -> Result<PathBuf, PathError> {
    let stem = input_path
        .file_stem()
        .ok_or_else(|| PathError::InvalidInput(input_path.to_path_buf()))?;
    let input_dir = input_path.parent().unwrap_or_else(|| Path::new(""));

    let output_dir = match mode {
        OutputMode::Custom { directory } => directory
            .clone()
            .ok_or(PathError::MissingDirectory)?,
        OutputMode::SameAsInput => input_dir.to_path_buf(),
        OutputMode::Subfolder { name } => input_dir.join(name),
    };

    let mut file_name = stem.to_os_string();
    file_name.push(".");
    file_name.push(OUTPUT_EXTENSION);
    let output_path = output_dir.join(file_name);

    if output_path == input_path {
        return Err(PathError::OutputIsInput(input_path.to_path_buf()));
    }

    Ok(output_path)
}

/// Compute the destination for `input_path`, creating directories as needed
pub fn resolve_output_path(input_path: &Path, mode: &OutputMode) -> Result<PathBuf, PathError> {
    let output_path = plan_output_path(input_path, mode)?;
    if !matches!(mode, OutputMode::SameAsInput)
        && let Some(dir) = output_path.parent()
    {
        ensure_dir(dir)?;
    }
    Ok(output_path)
}

/// Map each planned output to the first input (in job order) that claims it
///
/// Inputs whose output cannot be planned are left out; resolving them
/// later reports the real error.
pub fn claim_outputs(inputs: &[PathBuf], mode: &OutputMode) -> HashMap<PathBuf, PathBuf> {
    let mut owners = HashMap::with_capacity(inputs.len());
    for input in inputs {
        if let Ok(output) = plan_output_path(input, mode) {
            owners.entry(output).or_insert_with(|| input.clone());
        }
    }
    owners
}

fn ensure_dir(dir: &Path) -> Result<(), PathError> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| PathError::DirectoryCreateFailed {
        path: dir.to_path_buf(),
        source,
    })?;
    log::debug!("Created output directory {:?}", dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn test_same_as_input() {
        let output =
            resolve_output_path(Path::new("/a/song.flac"), &OutputMode::SameAsInput).unwrap();
        assert_eq!(output, PathBuf::from("/a/song.wma"));
    }

    #[test]
    fn test_multi_dot_name_keeps_inner_dots() {
        let output =
            resolve_output_path(Path::new("/a/01. Intro.live.wav"), &OutputMode::SameAsInput)
                .unwrap();
        assert_eq!(output, PathBuf::from("/a/01. Intro.live.wma"));
    }

    #[test]
    fn test_subfolder_created() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("song.flac");
        File::create(&input).unwrap();

        let mode = OutputMode::Subfolder {
            name: "Out".to_string(),
        };
        let output = resolve_output_path(&input, &mode).unwrap();

        assert_eq!(output, temp_dir.path().join("Out").join("song.wma"));
        assert!(temp_dir.path().join("Out").is_dir());

        // Resolving again with the folder in place is fine
        assert_eq!(resolve_output_path(&input, &mode).unwrap(), output);
    }

    #[test]
    fn test_subfolder_with_intermediate_directories() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("song.aiff");
        let mode = OutputMode::Subfolder {
            name: "converted/wma".to_string(),
        };
        let output = resolve_output_path(&input, &mode).unwrap();
        assert_eq!(
            output,
            temp_dir.path().join("converted").join("wma").join("song.wma")
        );
        assert!(temp_dir.path().join("converted").join("wma").is_dir());
    }

    #[test]
    fn test_subfolder_create_failure() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where the subfolder should go
        File::create(temp_dir.path().join("Out")).unwrap();
        let input = temp_dir.path().join("song.flac");

        let mode = OutputMode::Subfolder {
            name: "Out".to_string(),
        };
        let result = resolve_output_path(&input, &mode);
        assert!(matches!(
            result,
            Err(PathError::DirectoryCreateFailed { .. })
        ));
    }

    #[test]
    fn test_custom_requires_directory() {
        let result = resolve_output_path(
            Path::new("/a/song.flac"),
            &OutputMode::Custom { directory: None },
        );
        assert!(matches!(result, Err(PathError::MissingDirectory)));
    }

    #[test]
    fn test_custom_directory() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("exports");
        let mode = OutputMode::Custom {
            directory: Some(target.clone()),
        };
        let output = resolve_output_path(Path::new("/a/song.flac"), &mode).unwrap();
        assert_eq!(output, target.join("song.wma"));
        assert!(target.is_dir());
    }

    #[test]
    fn test_wma_input_in_place_rejected() {
        let result = resolve_output_path(Path::new("/a/song.wma"), &OutputMode::SameAsInput);
        assert!(matches!(result, Err(PathError::OutputIsInput(_))));
    }

    #[test]
    fn test_input_without_name_rejected() {
        let result = resolve_output_path(Path::new("/"), &OutputMode::SameAsInput);
        assert!(matches!(result, Err(PathError::InvalidInput(_))));
    }

    #[test]
    fn test_plan_does_not_create_directories() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("song.flac");
        let mode = OutputMode::Subfolder {
            name: "WMA".to_string(),
        };

        let output = plan_output_path(&input, &mode).unwrap();

        assert_eq!(output, temp_dir.path().join("WMA").join("song.wma"));
        assert!(!temp_dir.path().join("WMA").exists());
    }

    #[test]
    fn test_first_input_claims_shared_output() {
        let mode = OutputMode::Custom {
            directory: Some(PathBuf::from("/exports")),
        };
        let inputs = vec![
            PathBuf::from("/x/disc1/01.flac"),
            PathBuf::from("/x/disc2/01.flac"),
            PathBuf::from("/x/disc1/01.wav"),
            PathBuf::from("/x/disc1/02.flac"),
        ];

        let owners = claim_outputs(&inputs, &mode);

        assert_eq!(owners.len(), 2);
        assert_eq!(
            owners.get(Path::new("/exports/01.wma")),
            Some(&PathBuf::from("/x/disc1/01.flac"))
        );
        assert_eq!(
            owners.get(Path::new("/exports/02.wma")),
            Some(&PathBuf::from("/x/disc1/02.flac"))
        );
    }

    #[test]
    fn test_claims_skip_unplannable_inputs() {
        let inputs = vec![PathBuf::from("/a/song.wma"), PathBuf::from("/a/song.flac")];

        let owners = claim_outputs(&inputs, &OutputMode::SameAsInput);

        // The .wma input would overwrite itself, so the .flac owns the output
        assert_eq!(
            owners.get(Path::new("/a/song.wma")),
            Some(&PathBuf::from("/a/song.flac"))
        );
    }
}
