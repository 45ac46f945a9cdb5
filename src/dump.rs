//! Append-only `<table>.sql` dump files.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{HelperError, Result};
use crate::statement::{check_identifier, Statement};

/// Writes literal statements to one file per table.
#[derive(Debug)]
pub struct SqlDump {
    dir: PathBuf,
    /// Serializes appends so concurrent calls never interleave a line
    write_lock: Mutex<()>,
}

impl SqlDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the dump file for `table`.
    pub fn path_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.sql", table))
    }

    /// Render `stmt` with inlined values and append it as one line.
    pub async fn append(&self, table: &str, stmt: &Statement) -> Result<PathBuf> {
        check_identifier(table)?;
        let mut line = stmt.render_literal()?;
        if line.contains('\n') {
            return Err(HelperError::InvalidStatement(
                "dump statements must fit on a single line".to_string(),
            ));
        }
        line.push('\n');

        let path = self.path_for(table);
        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(path = %path.display(), bytes = line.len(), "appended statement to dump file");
        Ok(path)
    }
}
