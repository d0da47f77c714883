#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_lint_infer::{config::InferenceConfig, schema::Schema, source::FileSource};
use encoding_rs::UTF_8;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes one line per entry, each terminated by `\n`.
    pub fn write_lines<S: AsRef<str>>(&self, name: &str, lines: &[S]) -> PathBuf {
        let mut contents = String::new();
        for line in lines {
            contents.push_str(line.as_ref());
            contents.push('\n');
        }
        self.write(name, &contents)
    }

    /// Infers a schema for a workspace file with the given configuration.
    pub fn infer(&self, path: &Path, config: &InferenceConfig) -> Schema {
        let source = FileSource::new(path, UTF_8);
        csv_lint_infer::infer_schema(&source, config).expect("infer schema")
    }
}

/// A header row followed by `rows` rows of name, age and salary.
pub fn people_lines(rows: usize) -> Vec<String> {
    let mut lines = vec!["Name,Age,Salary".to_string()];
    for i in 1..=rows {
        lines.push(format!("Person{i},{},{}.50", 20 + i % 50, 1000 + i));
    }
    lines
}
