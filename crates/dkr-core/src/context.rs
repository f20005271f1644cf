//! Build-context resolution
//!
//! Works out which files an image build needs by reading the Dockerfile's
//! ADD/COPY instructions, without asking the engine.

use crate::{CoreError, Result};
use dkr_config::SourceMerge;
use std::path::{Component, Path, PathBuf};

const DOCKERFILE: &str = "Dockerfile";

/// Files needed to build an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Absolute path of the Dockerfile
    pub dockerfile: PathBuf,
    /// Absolute path of the build root
    pub context_root: PathBuf,
    /// The Dockerfile first, then every expanded ADD/COPY source
    pub source_files: Vec<PathBuf>,
}

impl BuildContext {
    /// Resolve the build context for a `build` target
    pub fn resolve(target: &str, cwd: &Path, merge: SourceMerge) -> Result<Self> {
        let dockerfile = resolve_dockerfile(target, cwd);
        let content = std::fs::read_to_string(&dockerfile).map_err(|e| {
            CoreError::DockerfileNotFound {
                path: dockerfile.clone(),
                source: e,
            }
        })?;

        let context_root = dockerfile
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());

        let sources = parse_sources(&content, merge)?;
        tracing::debug!("Dockerfile {:?} references {:?}", dockerfile, sources);

        let mut source_files = vec![dockerfile.clone()];
        source_files.extend(expand_sources(&context_root, &sources)?);

        Ok(Self {
            dockerfile,
            context_root,
            source_files,
        })
    }

    /// Dockerfile path relative to the build root
    pub fn dockerfile_name(&self) -> String {
        self.dockerfile
            .strip_prefix(&self.context_root)
            .unwrap_or(&self.dockerfile)
            .to_string_lossy()
            .into_owned()
    }
}

/// Resolve a build target to the absolute path of its Dockerfile.
///
/// Relative targets are taken from `cwd`. A target that does not already
/// name a Dockerfile is treated as a directory holding one.
pub fn resolve_dockerfile(target: &str, cwd: &Path) -> PathBuf {
    let path = normalize(&cwd.join(target));
    if names_dockerfile(&path) {
        path
    } else {
        path.join(DOCKERFILE)
    }
}

fn names_dockerfile(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n == DOCKERFILE || n.starts_with("Dockerfile.") || n.ends_with(".Dockerfile"))
        .unwrap_or(false)
}

/// Lexical normalization, no filesystem access
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Source references of the Dockerfile's ADD/COPY instructions.
///
/// With [`SourceMerge::Last`] the last instruction replaces all earlier
/// ones; with [`SourceMerge::Union`] every instruction contributes in file
/// order. Remote URLs and destinations are never returned.
pub fn parse_sources(dockerfile: &str, merge: SourceMerge) -> Result<Vec<String>> {
    let mut sources = Vec::new();

    for (index, line) in dockerfile.lines().enumerate() {
        let Some((keyword, rest)) = line.trim_start().split_once(char::is_whitespace) else {
            continue;
        };
        if keyword != "ADD" && keyword != "COPY" {
            continue;
        }

        let Some(found) = instruction_sources(rest, index + 1)? else {
            continue;
        };

        match merge {
            SourceMerge::Last => sources = found,
            SourceMerge::Union => sources.extend(found),
        }
    }

    Ok(sources)
}

/// Sources of one instruction, `None` when it copies from another stage
fn instruction_sources(arguments: &str, line: usize) -> Result<Option<Vec<String>>> {
    let mut tokens: Vec<&str> = arguments
        .split_whitespace()
        .filter(|t| !is_remote(t))
        .collect();

    let flags = tokens.iter().take_while(|t| t.starts_with("--")).count();
    if tokens[..flags].iter().any(|f| f.starts_with("--from")) {
        tracing::debug!("Line {}: sources come from another stage", line);
        return Ok(None);
    }
    tokens.drain(..flags);

    let mut sources: Vec<String> = if arguments.contains('[') && arguments.contains(']') {
        let json = tokens.join(" ");
        serde_json::from_str(&json).map_err(|e| CoreError::DockerfileParse {
            line,
            message: e.to_string(),
        })?
    } else {
        tokens.into_iter().map(str::to_string).collect()
    };

    // Destination
    sources.pop();
    sources.retain(|s| !is_remote(s));
    Ok(Some(sources))
}

/// Expand source patterns beneath the build root, in pattern then match order
pub fn expand_sources(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let escaped_root = glob::Pattern::escape(&root.to_string_lossy());
    let mut files = Vec::new();

    for pattern in patterns {
        let relative: Vec<&str> = pattern
            .split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .collect();

        if relative.is_empty() {
            files.push(root.to_path_buf());
            continue;
        }

        let full = format!("{}/{}", escaped_root.trim_end_matches('/'), relative.join("/"));
        let entries = glob::glob(&full).map_err(|e| CoreError::InvalidSourcePattern {
            pattern: pattern.clone(),
            message: e.msg.to_string(),
        })?;

        let before = files.len();
        for entry in entries {
            match entry {
                Ok(path) => files.push(path),
                Err(e) => tracing::warn!("Skipping unreadable path {}: {}", e.path().display(), e),
            }
        }

        if files.len() == before {
            tracing::warn!("No files match '{}' in {}", pattern, root.display());
        }
    }

    Ok(files)
}
