//! Extraction Jobs
//!
//! Each extraction run writes into `<output_root>/<video stem>`. This module
//! lists, prunes and packages those directories.

use std::fs;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::library::validate_file_component;
use crate::core::{CoreError, CoreResult};

/// A job directory and how many stills it holds
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JobSummary {
    pub name: String,
    pub path: PathBuf,
    pub frame_count: usize,
}

pub struct JobStore {
    output_root: PathBuf,
}

impl JobStore {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Output directory for extractions from `video_path`
    pub fn job_dir_for(&self, video_path: &Path) -> CoreResult<PathBuf> {
        let stem = video_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CoreError::Validation(format!("Cannot derive job name from {}", video_path.display()))
            })?;
        Ok(self.output_root.join(stem))
    }

    pub fn list_jobs(&self) -> CoreResult<Vec<JobSummary>> {
        if !self.output_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut jobs = Vec::new();
        for entry in fs::read_dir(&self.output_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path();
            let frame_count = files_with_extension(&path, "jpg")?.len();
            jobs.push(JobSummary {
                name: entry.file_name().to_string_lossy().into_owned(),
                path,
                frame_count,
            });
        }

        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(jobs)
    }

    /// Sorted still image names in a job
    pub fn list_frames(&self, job: &str) -> CoreResult<Vec<String>> {
        let dir = self.existing_job_dir(job)?;
        files_with_extension(&dir, "jpg")
    }

    pub fn delete_frame(&self, job: &str, filename: &str) -> CoreResult<()> {
        validate_file_component("Frame name", filename)?;
        if !has_extension(filename, "jpg") {
            return Err(CoreError::Validation(format!(
                "Only .jpg frames can be deleted: {}",
                filename
            )));
        }

        let path = self.existing_job_dir(job)?.join(filename);
        if !path.is_file() {
            return Err(CoreError::FrameNotFound(format!("{}/{}", job, filename)));
        }

        fs::remove_file(&path)?;
        tracing::info!(job = %job, frame = %filename, "Deleted frame");
        Ok(())
    }

    pub fn delete_job(&self, job: &str) -> CoreResult<()> {
        let dir = self.existing_job_dir(job)?;
        fs::remove_dir_all(&dir)?;
        tracing::info!(job = %job, "Deleted extraction job");
        Ok(())
    }

    /// Writes a ZIP of the job's stills followed by its manifests
    ///
    /// Returns the number of entries written.
    pub fn package_job<W: Write + Seek>(&self, job: &str, writer: W) -> CoreResult<usize> {
        let dir = self.existing_job_dir(job)?;

        let mut names = files_with_extension(&dir, "jpg")?;
        names.extend(files_with_extension(&dir, "json")?);

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(writer);
        for name in &names {
            zip.start_file(name.as_str(), options)?;
            let mut file = fs::File::open(dir.join(name))?;
            std::io::copy(&mut file, &mut zip)?;
        }
        zip.finish()?;

        tracing::info!(job = %job, entries = names.len(), "Packaged extraction job");
        Ok(names.len())
    }

    fn existing_job_dir(&self, job: &str) -> CoreResult<PathBuf> {
        validate_file_component("Job name", job)?;
        let dir = self.output_root.join(job);
        if !dir.is_dir() {
            return Err(CoreError::JobNotFound(job.to_string()));
        }
        Ok(dir)
    }
}

fn has_extension(name: &str, extension: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

fn files_with_extension(dir: &Path, extension: &str) -> CoreResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if has_extension(&name, extension) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
