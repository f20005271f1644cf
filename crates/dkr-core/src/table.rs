//! Fixed-width rendering of container and image listings

use crate::{CoreError, Result};
use chrono::{DateTime, Utc};
use dkr_provider::{split_image_reference, truncate_id, ContainerEntry, ImageEntry};
use number_prefix::NumberPrefix;
use std::io::Write;

const COLUMN_WIDTH: usize = 19;
const COMMAND_WIDTH: usize = 24;
const REPOSITORY_WIDTH: usize = 24;
const COMMAND_MAX_CHARS: usize = 17;

const PS_HEADER: &str = "CONTAINER ID        IMAGE               COMMAND                  CREATED             STATUS              PORTS               NAMES";
const IMAGES_HEADER: &str =
    "REPOSITORY               TAG                 IMAGE ID            CREATED             SIZE";

/// Listing options threaded from the parsed command into the renderers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only identifiers, one per line
    pub quiet: bool,
    /// Requested Go template; accepted but not applied
    pub format: Option<String>,
}

/// Process-list row, ready to print
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRow {
    pub id: String,
    pub image: String,
    pub command: String,
    pub created: String,
    pub status: String,
    pub ports: String,
    pub names: String,
}

impl ContainerRow {
    pub fn new(entry: &ContainerEntry, now: DateTime<Utc>) -> Self {
        let image = if entry.image.is_empty() {
            "<no image>".to_string()
        } else {
            entry.image.clone()
        };

        let command = if entry.command.chars().count() > COMMAND_MAX_CHARS {
            let head: String = entry.command.chars().take(COMMAND_MAX_CHARS).collect();
            format!("\"{}…\"", head)
        } else {
            format!("\"{}\"", entry.command)
        };

        Self {
            id: truncate_id(&entry.id).to_string(),
            image,
            command,
            created: humanize_since(timestamp(entry.created, now), now),
            status: entry.status.clone(),
            ports: entry
                .ports
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            names: entry
                .names
                .iter()
                .map(|n| n.strip_prefix('/').unwrap_or(n))
                .collect::<Vec<_>>()
                .join(","),
        }
    }
}

impl std::fmt::Display for ContainerRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<COLUMN_WIDTH$} {:<COLUMN_WIDTH$} {:<COMMAND_WIDTH$} {:<COLUMN_WIDTH$} {:<COLUMN_WIDTH$} {:<COLUMN_WIDTH$} {}",
            self.id, self.image, self.command, self.created, self.status, self.ports, self.names
        )
    }
}

/// Image-list row, one per repository tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRow {
    pub repository: String,
    pub tag: String,
    pub id: String,
    pub created: String,
    pub size: String,
}

impl ImageRow {
    /// Rows for every repo tag of an image; untagged images yield none
    pub fn from_entry(entry: &ImageEntry, now: DateTime<Utc>) -> Vec<Self> {
        let id = short_image_id(&entry.id).to_string();
        let created = humanize_since(timestamp(entry.created, now), now);
        let size = format_size(entry.size);

        entry
            .repo_tags
            .iter()
            .map(|reference| {
                let (repository, tag) = split_image_reference(reference);
                Self {
                    repository: repository.to_string(),
                    tag: tag.unwrap_or("<none>").to_string(),
                    id: id.clone(),
                    created: created.clone(),
                    size: size.clone(),
                }
            })
            .collect()
    }
}

impl std::fmt::Display for ImageRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<REPOSITORY_WIDTH$} {:<COLUMN_WIDTH$} {:<COLUMN_WIDTH$} {:<COLUMN_WIDTH$} {}",
            self.repository, self.tag, self.id, self.created, self.size
        )
    }
}

/// Twelve characters of the digest, skipping the `sha256:` prefix
fn short_image_id(id: &str) -> &str {
    truncate_id(id.strip_prefix("sha256:").unwrap_or(id))
}

fn timestamp(secs: i64, fallback: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(fallback)
}

fn warn_format(options: &ListOptions, err: &mut dyn Write) -> Result<()> {
    if let Some(format) = &options.format {
        let warning = CoreError::UnsupportedFormat(format.clone());
        tracing::debug!("{}", warning);
        writeln!(err, "Warning: {}", warning)?;
    }
    Ok(())
}

/// Render a process list
pub fn render_containers(
    containers: &[ContainerEntry],
    options: &ListOptions,
    now: DateTime<Utc>,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<()> {
    warn_format(options, err)?;

    if options.quiet {
        for container in containers {
            writeln!(out, "{}", truncate_id(&container.id))?;
        }
        return Ok(());
    }

    writeln!(out, "{}", PS_HEADER)?;
    for container in containers {
        writeln!(out, "{}", ContainerRow::new(container, now))?;
    }
    Ok(())
}

/// Render an image list
pub fn render_images(
    images: &[ImageEntry],
    options: &ListOptions,
    now: DateTime<Utc>,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<()> {
    warn_format(options, err)?;

    let rows: Vec<ImageRow> = images
        .iter()
        .flat_map(|image| ImageRow::from_entry(image, now))
        .collect();

    if options.quiet {
        for row in &rows {
            writeln!(out, "{}", row.id)?;
        }
        return Ok(());
    }

    writeln!(out, "{}", IMAGES_HEADER)?;
    for row in &rows {
        writeln!(out, "{}", row)?;
    }
    Ok(())
}

struct TimeUnit {
    /// Upper bound of the bucket, milliseconds
    max: i64,
    /// Length of one unit, milliseconds
    value: i64,
    name: &'static str,
    single: &'static str,
}

const TIME_UNITS: [TimeUnit; 6] = [
    TimeUnit { max: 3_540_000, value: 60_000, name: "minute", single: "a minute ago" },
    TimeUnit { max: 168_000_000, value: 3_600_000, name: "hour", single: "an hour ago" },
    TimeUnit { max: 518_400_000, value: 86_400_000, name: "day", single: "a day ago" },
    TimeUnit { max: 2_419_200_000, value: 604_800_000, name: "week", single: "a week ago" },
    TimeUnit { max: 28_512_000_000, value: 2_592_000_000, name: "month", single: "last month" },
    TimeUnit { max: i64::MAX, value: 31_536_000_000, name: "year", single: "last year" },
];

/// Docker-style relative time ("just now", "3 hours ago", "last month")
pub fn humanize_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = (now - then).num_milliseconds();
    if elapsed < 60_000 {
        return "just now".to_string();
    }

    for unit in &TIME_UNITS {
        if elapsed < unit.max {
            let count = (elapsed as f64 / unit.value as f64).round() as i64;
            return if count <= 1 {
                unit.single.to_string()
            } else {
                format!("{} {}s ago", count, unit.name)
            };
        }
    }

    "last year".to_string()
}

/// Decimal size with unit suffix and no space (`72.9MB`)
pub fn format_size(bytes: i64) -> String {
    match NumberPrefix::decimal(bytes.max(0) as f64) {
        NumberPrefix::Standalone(b) => format!("{}B", b),
        NumberPrefix::Prefixed(prefix, n) => format!("{:.1}{}B", n, prefix),
    }
}
