//! The downsample stage: one reformat invocation over a pair of mates
//!
//! Takes care of validating a DownsampleRequest, deriving output names and remote locators, running
//! reformat in the stage's working directory and checking that it actually produced its outputs.

use std::path::{Path, PathBuf};
use std::{env, fs, io};

use log::{info, warn};

use crate::request::DownsampleRequest;
use crate::stage::error::StageError;
use crate::stage::reformat::ReformatCommand;
use crate::storage::locator::RemoteRoot;
use crate::storage::read_file::ReadFile;
use crate::WorkingDirectory;

pub mod error;
/// Build and run the reformat command line
pub mod reformat;

/// Marker prefixed to each input's base name to name its output
static OUTPUT_PREFIX: &str = "ds_";

pub struct DownsampleStage {
    /// reformat executable
    pub tool: PathBuf,
    /// Isolated per-invocation directory, outputs are written here
    pub wd: WorkingDirectory,
    pub remote_root: RemoteRoot,
}

/// A validated invocation that hasn't run yet
#[derive(Debug)]
pub struct Invocation {
    pub command: ReformatCommand,
    pub r1: ReadFile,
    pub r2: ReadFile,
}

impl DownsampleStage {
    /// Validate the request and work out the command line and outputs without touching inputs
    pub fn plan(&self, request: &DownsampleRequest) -> Result<Invocation, StageError> {
        request.validate()?;

        let r1 = input(&request.r1)?;
        let r2 = input(&request.r2)?;
        if r1.name == r2.name {
            return Err(StageError::InvalidInput(format!(
                "both mates are called {}, their outputs would collide",
                r1.name
            )));
        }

        let wd = absolute(&self.wd.path).map_err(|source| StageError::WorkingDirectory {
            path: self.wd.path.clone(),
            source,
        })?;
        let out_r1 = self.output(&wd, &r1, &request.out_dir)?;
        let out_r2 = self.output(&wd, &r2, &request.out_dir)?;

        let command = ReformatCommand {
            tool: self.tool.clone(),
            in1: r1.local_path,
            in2: r2.local_path,
            out1: out_r1.local_path.clone(),
            out2: out_r2.local_path.clone(),
            directive: request.directive,
        };
        Ok(Invocation { command, r1: out_r1, r2: out_r2 })
    }

    /// Run a planned invocation, returning the outputs in the same mate order as the inputs
    pub fn execute(&self, invocation: &Invocation) -> Result<(ReadFile, ReadFile), StageError> {
        let Invocation { command, r1, r2 } = invocation;
        check_readable(&command.in1)?;
        check_readable(&command.in2)?;

        fs::create_dir_all(&self.wd.path).map_err(|source| StageError::WorkingDirectory {
            path: self.wd.path.clone(),
            source,
        })?;

        info!("Downsampling {} and {} to {}", command.in1.display(), command.in2.display(), command.directive);
        if let Err(err) = command.run(&self.wd.path) {
            remove_partial(&[r1, r2]);
            return Err(err);
        }

        let missing: Vec<PathBuf> = [r1, r2]
            .iter()
            .filter(|file| !file.local_path.is_file())
            .map(|file| file.local_path.clone())
            .collect();
        if !missing.is_empty() {
            warn!("reformat exited 0 without writing all outputs");
            remove_partial(&[r1, r2]);
            return Err(StageError::OutputNotProduced(missing));
        }

        info!("Downsampled reads written to {} and {}", r1.local_path.display(), r2.local_path.display());
        Ok((r1.clone(), r2.clone()))
    }

    fn output(&self, wd: &Path, input: &ReadFile, out_dir: &str) -> Result<ReadFile, StageError> {
        let name = format!("{OUTPUT_PREFIX}{}", input.name);
        let locator = self.remote_root.locate(out_dir, &name);
        ReadFile::published(wd.join(&name), locator)
            .ok_or_else(|| StageError::InvalidInput(format!("can't name output for {}", input.name)))
    }
}

/// Inputs are passed to reformat as absolute paths because it runs in the working directory
fn input(path: &Path) -> Result<ReadFile, StageError> {
    let path = absolute(path).map_err(|source| StageError::InputNotReadable { path: path.to_path_buf(), source })?;
    ReadFile::local(&path).ok_or_else(|| StageError::InvalidInput(format!("{} has no file name", path.display())))
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    match path.is_absolute() {
        true => Ok(path.to_path_buf()),
        false => Ok(env::current_dir()?.join(path)),
    }
}

fn check_readable(path: &Path) -> Result<(), StageError> {
    let not_readable = |source| StageError::InputNotReadable { path: path.to_path_buf(), source };
    let metadata = fs::metadata(path).map_err(not_readable)?;
    if !metadata.is_file() {
        return Err(StageError::InvalidInput(format!("{} is not a file", path.display())));
    }
    fs::File::open(path).map_err(not_readable)?;
    Ok(())
}

fn remove_partial(files: &[&ReadFile]) {
    for file in files {
        if file.local_path.exists() {
            warn!("Removing partial output {}", file.local_path.display());
            if let Err(err) = fs::remove_file(&file.local_path) {
                warn!("Can't remove {}: {err}", file.local_path.display());
            }
        }
    }
}
