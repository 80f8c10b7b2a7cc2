//! Building and launching a curriculum project.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{exit_codes, Result, SyllabusError};

#[derive(Debug, Deserialize)]
struct Manifest {
    package: Option<PackageSection>,
    #[serde(default)]
    bin: Vec<BinSection>,
}

#[derive(Debug, Deserialize)]
struct PackageSection {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BinSection {
    name: Option<String>,
}

/// A cargo project whose binary hosts curricula.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    binary: String,
}

impl Project {
    /// Read the project's `Cargo.toml`. The binary is the first `[[bin]]`
    /// target when one is named, otherwise the package itself.
    pub fn open(root: &Path) -> Result<Self> {
        let manifest_path = root.join("Cargo.toml");
        let content = fs::read_to_string(&manifest_path)
            .map_err(|e| SyllabusError::storage(&manifest_path, e))?;
        let manifest: Manifest = toml::from_str(&content).map_err(|e| {
            SyllabusError::build(format!("{}: {}", manifest_path.display(), e))
        })?;

        let binary = manifest
            .bin
            .into_iter()
            .find_map(|bin| bin.name)
            .or_else(|| manifest.package.map(|package| package.name))
            .ok_or_else(|| {
                SyllabusError::build(format!(
                    "{} declares no package or binary",
                    manifest_path.display()
                ))
            })?;

        Ok(Self {
            root: root.to_path_buf(),
            binary,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn binary_name(&self) -> &str {
        &self.binary
    }

    /// Run `cargo build` in the project with extra arguments.
    pub fn build(&self, args: &[String]) -> Result<()> {
        let cargo = env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
        info!(project = %self.root.display(), "Building project");

        let status = Command::new(&cargo)
            .arg("build")
            .args(args)
            .current_dir(&self.root)
            .status()
            .map_err(|e| SyllabusError::build(format!("failed to run {cargo}: {e}")))?;

        if status.success() {
            Ok(())
        } else {
            Err(SyllabusError::build(format!("cargo build failed ({status})")))
        }
    }

    /// Path of the built binary for the profile selected by `args`.
    pub fn binary_path(&self, args: &[String]) -> PathBuf {
        let target_dir = match env::var_os("CARGO_TARGET_DIR") {
            Some(dir) if !dir.is_empty() => {
                let dir = PathBuf::from(dir);
                if dir.is_absolute() {
                    dir
                } else {
                    self.root.join(dir)
                }
            }
            _ => self.root.join("target"),
        };
        target_dir
            .join(profile_dir(args))
            .join(format!("{}{}", self.binary, env::consts::EXE_SUFFIX))
    }

    /// Launch the binary in the project directory and return its exit code.
    pub fn launch(
        &self,
        binary: &Path,
        curricula: &[String],
        json: bool,
        verbose: bool,
    ) -> Result<i32> {
        if !binary.exists() {
            return Err(SyllabusError::build(format!(
                "binary not found at {}",
                binary.display()
            )));
        }

        let mut command = Command::new(binary);
        command.current_dir(&self.root);
        for curriculum in curricula {
            command.arg("--curriculum").arg(curriculum);
        }
        if json {
            command.arg("--json");
        }
        if verbose {
            command.arg("--verbose");
        }

        debug!(binary = %binary.display(), "Launching curriculum binary");
        let status = command.status().map_err(|e| {
            SyllabusError::build(format!("failed to launch {}: {e}", binary.display()))
        })?;
        Ok(status.code().unwrap_or(exit_codes::FATAL))
    }
}

/// Target subdirectory for the cargo profile named in `args`.
fn profile_dir(args: &[String]) -> String {
    let mut profile = "debug".to_string();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--release" | "-r" => profile = "release".to_string(),
            "--profile" => {
                if let Some(name) = iter.next() {
                    profile = name.clone();
                }
            }
            other => {
                if let Some(name) = other.strip_prefix("--profile=") {
                    profile = name.to_string();
                }
            }
        }
    }
    match profile.as_str() {
        "dev" | "test" => "debug".to_string(),
        "bench" => "release".to_string(),
        _ => profile,
    }
}
