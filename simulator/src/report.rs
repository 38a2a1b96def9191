//! # Report Writer
//!
//! Streams the run's JSON report to `output_<unix-time>.json`:
//!
//! ```text
//! {"setting":{...},"blocks":[{...},{...},...]}
//! ```
//!
//! The setting object is written when the file is created and each block
//! record is appended as soon as it exists, so an aborted run leaves every
//! finished block on disk. The array and object are closed after the record
//! at the configured end height.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use trail_protocol::{BlockReport, SimulationConfig};

pub struct ReportWriter {
    path: PathBuf,
    out: BufWriter<File>,
    end_height: u64,
    records: usize,
    closed: bool,
}

impl ReportWriter {
    /// Create the report file in `dir` and write the setting header.
    pub fn create(dir: &Path, config: &SimulationConfig) -> Result<Self> {
        let path = dir.join(format!("output_{}.json", Utc::now().timestamp()));
        let file = File::create(&path)
            .with_context(|| format!("failed to create report file {}", path.display()))?;
        let mut out = BufWriter::new(file);

        let setting = serde_json::to_string(config).context("failed to encode setting")?;
        write!(out, "{{\"setting\":{setting},\"blocks\":[")?;
        out.flush()?;

        Ok(Self {
            path,
            out,
            end_height: config.end_height,
            records: 0,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one block record. The record at the end height closes the
    /// document; nothing may be appended after it.
    pub fn append(&mut self, report: &BlockReport) -> Result<()> {
        anyhow::ensure!(!self.closed, "report {} already closed", self.path.display());

        if self.records > 0 {
            self.out.write_all(b",")?;
        }
        serde_json::to_writer(&mut self.out, report).context("failed to encode block record")?;
        self.records += 1;

        if report.height == self.end_height {
            self.out.write_all(b"]}")?;
            self.closed = true;
        }
        self.out
            .flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
