use anyhow::anyhow;
use formatx::formatx;
use std::fmt::Debug;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub trait Output: Debug {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write>;
    /// Whether this output can be considered a no-op and therefore that any code that only writes to the output can be skipped.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Writes each location key to its own file in a directory, named from a template such as `{}.csv`
#[derive(Debug)]
pub struct FileOutput {
    directory_path: PathBuf,
    file_template: String,
}

impl FileOutput {
    pub fn new(directory_path: PathBuf, file_template: String) -> Self {
        Self {
            directory_path,
            file_template,
        }
    }

    fn path_for_location_key(&self, location_key: &str) -> anyhow::Result<PathBuf> {
        let file_name = formatx!(&self.file_template, location_key)
            .map_err(|err| anyhow!("Invalid output file template: {err:?}"))?;
        Ok(self.directory_path.join(file_name))
    }
}

impl Output for FileOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        Ok(BufWriter::new(File::create(
            self.path_for_location_key(location_key)?,
        )?))
    }
}

impl Output for &FileOutput {
    fn writer_for_location_key(&self, location_key: &str) -> anyhow::Result<impl Write> {
        <FileOutput as Output>::writer_for_location_key(self, location_key)
    }
}

/// An output that goes to nowhere/ a "sink"/ /dev/null.
#[derive(Debug, Default)]
pub struct SinkOutput;

impl Output for SinkOutput {
    fn writer_for_location_key(&self, _location_key: &str) -> anyhow::Result<impl Write> {
        Ok(io::sink())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn should_name_files_from_template() {
        let output = FileOutput::new(PathBuf::from("results"), "{}.csv".to_string());
        assert_eq!(
            output.path_for_location_key("unit 1__results").unwrap(),
            PathBuf::from("results").join("unit 1__results.csv")
        );
    }

    #[rstest]
    fn should_treat_sink_as_noop() {
        assert!(SinkOutput.is_noop());
        assert!(!FileOutput::new(PathBuf::new(), "{}".to_string()).is_noop());
    }
}
