use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::model::snapshot::{RowLayout, SnapshotRow};

/// Destination for snapshot rows. Rows arrive in sample order, one per
/// successful round.
pub trait RowSink {
    fn append(&mut self, row: &SnapshotRow) -> Result<()>;
}

/// Append-only CSV log.
///
/// The header is written only when the file is new or empty. An existing file
/// must carry exactly the current header, otherwise columns would shift.
pub struct CsvSink {
    path: PathBuf,
    layout: RowLayout,
    writer: csv::Writer<File>,
}

impl CsvSink {
    pub fn open(path: &Path, layout: RowLayout) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }

        let has_content = match fs::metadata(path) {
            Ok(meta) => meta.len() > 0,
            Err(_) => false,
        };
        if has_content {
            check_header(path, &layout)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if !has_content {
            writer
                .write_record(layout.header())
                .with_context(|| format!("writing header to {}", path.display()))?;
            writer.flush()?;
        }

        Ok(CsvSink {
            path: path.to_path_buf(),
            layout,
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowSink for CsvSink {
    fn append(&mut self, row: &SnapshotRow) -> Result<()> {
        if !self.layout.fits(row) {
            bail!(
                "row has {} price columns, {} expects {}",
                row.price_width(),
                self.path.display(),
                self.layout.price_width()
            );
        }
        self.writer
            .write_record(row.to_record())
            .with_context(|| format!("appending row to {}", self.path.display()))?;
        self.writer
            .flush()
            .with_context(|| format!("flushing {}", self.path.display()))?;
        Ok(())
    }
}

fn check_header(path: &Path, layout: &RowLayout) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("reading {}", path.display()))?;

    let mut first = csv::StringRecord::new();
    if !reader.read_record(&mut first)? {
        return Ok(());
    }

    let found: Vec<&str> = first.iter().map(str::trim).collect();
    let expected = layout.header();
    if found != expected {
        bail!(
            "{} was written with different columns.\n  found:    {}\n  expected: {}\n\
             Use a new output file when changing strikes or expiry.",
            path.display(),
            found.join(","),
            expected.join(",")
        );
    }
    Ok(())
}
