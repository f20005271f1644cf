//! Docker provider implementation using bollard

use crate::{
    split_image_reference, BuildConfig, ContainerEntry, ContainerId, ContainerProvider,
    CreateContainerConfig, ErrorDetail, ExecConfig, Frame, FrameStream, ImageEntry,
    ListContainersConfig, ListImagesConfig, LogConfig, PortInfo, ProviderError, PullConfig,
    RawOutput, Result,
};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::{
    BuildImageOptions, CreateImageOptions, ListImagesOptions, PushImageOptions, TagImageOptions,
};
use bollard::models::{BuildInfo, CreateImageInfo, PushImageInfo};
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Docker-API provider using the bollard crate
pub struct DockerProvider {
    client: Docker,
}

impl DockerProvider {
    /// Connect to the engine at `host` and check that it answers
    pub async fn new(host: &str, timeout: u64) -> Result<Self> {
        let version = bollard::API_DEFAULT_VERSION;
        let connected = if let Some(addr) = host.strip_prefix("tcp://") {
            Docker::connect_with_http(&format!("http://{}", addr), timeout, version)
        } else if host.starts_with("http://") || host.starts_with("https://") {
            Docker::connect_with_http(host, timeout, version)
        } else {
            // unix:// and npipe:// endpoints, or a bare socket path
            let path = host
                .trim_start_matches("unix://")
                .trim_start_matches("npipe://");
            Docker::connect_with_socket(path, timeout, version)
        };
        let client = connected.map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        client
            .ping()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ContainerProvider for DockerProvider {
    async fn build<'a>(&'a self, config: &BuildConfig) -> Result<FrameStream<'a>> {
        let tar_data = create_build_context(&config.context, &config.files)?;

        if config.cpuset_mems.is_some() {
            tracing::debug!("cpuset-mems is not supported by the engine client, ignoring");
        }

        let options = build_options(config)?;

        tracing::debug!(
            "Building {} with {} context bytes",
            config.dockerfile,
            tar_data.len()
        );

        let stream = self
            .client
            .build_image(options, None, Some(tar_data.into()))
            .map(|item| item.map(build_frame).map_err(ProviderError::from));

        Ok(Box::pin(stream))
    }

    async fn pull<'a>(&'a self, config: &PullConfig) -> Result<FrameStream<'a>> {
        let (repo, tag) = split_image_reference(&config.image);

        let options = CreateImageOptions {
            from_image: repo.to_string(),
            tag: tag.unwrap_or("latest").to_string(),
            platform: config.platform.clone().unwrap_or_default(),
            ..Default::default()
        };

        let stream = self
            .client
            .create_image(Some(options), None, None)
            .map(|item| item.map(pull_frame).map_err(ProviderError::from));

        Ok(Box::pin(stream))
    }

    async fn push<'a>(&'a self, image: &str) -> Result<FrameStream<'a>> {
        let (repo, tag) = split_image_reference(image);

        let options = PushImageOptions {
            tag: tag.unwrap_or("latest").to_string(),
        };

        let stream = self
            .client
            .push_image(repo, Some(options), None)
            .map(|item| item.map(push_frame).map_err(ProviderError::from));

        Ok(Box::pin(stream))
    }

    async fn tag(&self, image: &str, repo: Option<&str>, tag: &str) -> Result<()> {
        let repo = repo.unwrap_or_else(|| split_image_reference(image).0);

        let options = TagImageOptions {
            repo: repo.to_string(),
            tag: tag.to_string(),
        };

        self.client.tag_image(image, Some(options)).await?;
        Ok(())
    }

    async fn create(&self, config: &CreateContainerConfig) -> Result<ContainerId> {
        let options = config.name.as_ref().map(|name| CreateContainerOptions {
            name: name.as_str(),
            platform: None,
        });

        let container_config = Config {
            image: Some(config.image.clone()),
            cmd: config.cmd.clone(),
            entrypoint: config.entrypoint.clone(),
            env: if config.env.is_empty() {
                None
            } else {
                Some(config.env.clone())
            },
            working_dir: config.working_dir.clone(),
            user: config.user.clone(),
            hostname: config.hostname.clone(),
            tty: Some(config.tty),
            attach_stdin: Some(config.attach_stdin),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            open_stdin: Some(config.attach_stdin),
            mac_address: config.mac_address.clone(),
            stop_signal: config.stop_signal.clone(),
            stop_timeout: config.stop_timeout.map(|t| t as _),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(options, container_config)
            .await?;

        for warning in &response.warnings {
            tracing::warn!("{}", warning);
        }

        Ok(ContainerId::new(response.id))
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        self.client
            .start_container(&id.0, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stop(&self, id: &ContainerId, timeout: Option<i64>) -> Result<()> {
        let options = StopContainerOptions {
            t: timeout.unwrap_or(10),
        };
        self.client.stop_container(&id.0, Some(options)).await?;
        Ok(())
    }

    async fn wait(&self, id: &ContainerId) -> Result<i64> {
        let mut stream = self
            .client
            .wait_container(&id.0, None::<WaitContainerOptions<String>>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(e.into()),
            None => Err(ProviderError::RuntimeError(format!(
                "no exit status received for container {}",
                id.short()
            ))),
        }
    }

    async fn remove(&self, id: &ContainerId, force: bool) -> Result<()> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.client.remove_container(&id.0, Some(options)).await?;
        Ok(())
    }

    async fn exec(&self, id: &ContainerId, config: &ExecConfig) -> Result<RawOutput> {
        let options = CreateExecOptions {
            cmd: Some(config.cmd.clone()),
            env: if config.env.is_empty() {
                None
            } else {
                Some(config.env.clone())
            },
            working_dir: config.working_dir.clone(),
            user: config.user.clone(),
            tty: Some(config.tty),
            attach_stdin: Some(config.stdin),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            privileged: Some(config.privileged),
            ..Default::default()
        };

        let exec = self.client.create_exec(&id.0, options).await?;

        let start_options = StartExecOptions {
            detach: false,
            tty: config.tty,
            ..Default::default()
        };

        match self.client.start_exec(&exec.id, Some(start_options)).await? {
            StartExecResults::Attached { output, .. } => {
                Ok(RawOutput::Stream(Box::pin(LogOutputReader::new(output))))
            }
            StartExecResults::Detached => Err(ProviderError::ExecError(
                "Exec started in detached mode".to_string(),
            )),
        }
    }

    async fn logs(&self, id: &ContainerId, config: &LogConfig) -> Result<RawOutput> {
        let options = LogsOptions {
            follow: config.follow,
            stdout: config.stdout,
            stderr: config.stderr,
            tail: config.tail.clone().unwrap_or_else(|| "all".to_string()),
            timestamps: config.timestamps,
            since: config.since.unwrap_or(0),
            until: config.until.unwrap_or(0),
        };

        let stream = self.client.logs(&id.0, Some(options));
        Ok(RawOutput::Stream(Box::pin(LogOutputReader::new(stream))))
    }

    async fn list_containers(&self, config: &ListContainersConfig) -> Result<Vec<ContainerEntry>> {
        let options = ListContainersOptions {
            all: config.all,
            limit: config.limit.map(|l| l as isize),
            size: config.size,
            filters: config.filters.clone(),
        };

        let containers = self.client.list_containers(Some(options)).await?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerEntry {
                id: c.id.unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                command: c.command.unwrap_or_default(),
                created: c.created.unwrap_or(0),
                status: c.status.unwrap_or_default(),
                ports: c
                    .ports
                    .unwrap_or_default()
                    .into_iter()
                    .map(|p| PortInfo {
                        container_port: p.private_port,
                        host_port: p.public_port,
                        protocol: p
                            .typ
                            .map(|t| format!("{:?}", t).to_lowercase())
                            .unwrap_or_else(|| "tcp".to_string()),
                        host_ip: p.ip,
                    })
                    .collect(),
                names: c.names.unwrap_or_default(),
            })
            .collect())
    }

    async fn list_images(&self, config: &ListImagesConfig) -> Result<Vec<ImageEntry>> {
        let options = ListImagesOptions {
            all: config.all,
            filters: config.filters.clone(),
            digests: config.digests,
        };

        let images = self.client.list_images(Some(options)).await?;

        Ok(images
            .into_iter()
            .map(|i| ImageEntry {
                id: i.id,
                repo_tags: i.repo_tags,
                created: i.created,
                size: i.size,
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .ping()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;
        Ok(())
    }
}

fn build_frame(info: BuildInfo) -> Frame {
    Frame {
        stream: info.stream,
        status: info.status,
        id: info.id,
        progress: info.progress,
        error: info.error,
        error_detail: info.error_detail.map(|d| ErrorDetail {
            code: d.code,
            message: d.message,
        }),
    }
}

fn pull_frame(info: CreateImageInfo) -> Frame {
    Frame {
        status: info.status,
        id: info.id,
        progress: info.progress,
        error: info.error,
        ..Default::default()
    }
}

fn push_frame(info: PushImageInfo) -> Frame {
    Frame {
        status: info.status,
        progress: info.progress,
        error: info.error,
        ..Default::default()
    }
}

/// Engine build parameters for a build request
fn build_options(config: &BuildConfig) -> Result<BuildImageOptions<String>> {
    Ok(BuildImageOptions {
        dockerfile: config.dockerfile.clone(),
        t: config.tag.clone().unwrap_or_default(),
        extrahosts: if config.extra_hosts.is_empty() {
            None
        } else {
            Some(config.extra_hosts.join(","))
        },
        q: config.quiet,
        nocache: config.no_cache,
        cachefrom: config.cache_from.clone(),
        pull: config.pull,
        rm: config.rm.unwrap_or(true),
        forcerm: config.force_rm,
        memory: unsigned_size("memory", config.memory.as_deref())?,
        memswap: config.memory_swap.as_deref().map(parse_size).transpose()?,
        cpushares: unsigned("cpu-shares", config.cpu_shares)?,
        cpusetcpus: config.cpuset_cpus.clone().unwrap_or_default(),
        cpuperiod: unsigned("cpu-period", config.cpu_period)?,
        cpuquota: unsigned("cpu-quota", config.cpu_quota)?,
        buildargs: config.build_args.clone(),
        shmsize: unsigned_size("shm-size", config.shm_size.as_deref())?,
        squash: config.squash,
        labels: config.labels.clone(),
        networkmode: config.network_mode.clone().unwrap_or_default(),
        platform: config.platform.clone().unwrap_or_default(),
        ..Default::default()
    })
}

/// Option value the engine takes as unsigned
fn unsigned(option: &str, value: Option<i64>) -> Result<Option<u64>> {
    value
        .map(|v| {
            u64::try_from(v).map_err(|_| {
                ProviderError::InvalidRequest(format!("invalid value for --{}: {}", option, v))
            })
        })
        .transpose()
}

fn unsigned_size(option: &str, value: Option<&str>) -> Result<Option<u64>> {
    unsigned(option, value.map(parse_size).transpose()?)
}

/// Parse a docker-style size (`512m`, `2g`, `1.5gb`, `1024`) into bytes.
///
/// `-1` passes through as "unlimited".
pub fn parse_size(value: &str) -> Result<i64> {
    let invalid = || ProviderError::InvalidRequest(format!("invalid size: '{}'", value));

    let lower = value.trim().to_ascii_lowercase();
    if lower == "-1" {
        return Ok(-1);
    }

    let mut digits = lower.as_str();
    if digits.len() > 1 && digits.ends_with('b') {
        let before = digits.as_bytes()[digits.len() - 2];
        if before.is_ascii_alphabetic() {
            digits = &digits[..digits.len() - 1];
        }
    }

    let (number, multiplier) = match digits.chars().last() {
        Some('b') => (&digits[..digits.len() - 1], 1_i64),
        Some('k') => (&digits[..digits.len() - 1], 1 << 10),
        Some('m') => (&digits[..digits.len() - 1], 1 << 20),
        Some('g') => (&digits[..digits.len() - 1], 1 << 30),
        Some('t') => (&digits[..digits.len() - 1], 1 << 40),
        Some(c) if c.is_ascii_digit() => (digits, 1),
        _ => return Err(invalid()),
    };

    let number: f64 = number.trim().parse().map_err(|_| invalid())?;
    if number < 0.0 {
        return Err(invalid());
    }
    Ok((number * multiplier as f64) as i64)
}

/// Create a tar archive holding exactly the resolved context files
fn create_build_context(context: &Path, files: &[PathBuf]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut seen = HashSet::new();

    for file in files {
        let name = match file.strip_prefix(context) {
            Ok(name) => name.to_path_buf(),
            Err(_) => {
                tracing::warn!("{} is outside the build context, skipping", file.display());
                continue;
            }
        };

        if file.is_dir() {
            add_dir_to_tar(&mut builder, file, &name, &mut seen)?;
        } else if file.is_file() && seen.insert(name.clone()) {
            builder.append_path_with_name(file, &name)?;
        }
    }

    Ok(builder.into_inner()?)
}

/// Recursively add directory contents to tar
fn add_dir_to_tar<W: Write>(
    builder: &mut tar::Builder<W>,
    base: &Path,
    prefix: &Path,
    seen: &mut HashSet<PathBuf>,
) -> Result<()> {
    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        let path = entry.path();
        let name = prefix.join(entry.file_name());

        if path.is_dir() {
            add_dir_to_tar(builder, &path, &name, seen)?;
        } else if path.is_file() && seen.insert(name.clone()) {
            builder.append_path_with_name(&path, &name)?;
        }
    }

    Ok(())
}

/// Byte reader over a multiplexed engine output stream.
///
/// stdout and stderr frames are interleaved in arrival order; empty frames
/// are skipped so that only the end of the stream reads as EOF.
struct LogOutputReader<S> {
    frames: S,
    chunk: Vec<u8>,
    offset: usize,
}

impl<S> LogOutputReader<S> {
    fn new(frames: S) -> Self {
        Self {
            frames,
            chunk: Vec::new(),
            offset: 0,
        }
    }
}

impl<S> AsyncRead for LogOutputReader<S>
where
    S: futures::Stream<Item = std::result::Result<LogOutput, bollard::errors::Error>> + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        loop {
            if self.offset < self.chunk.len() {
                let n = (self.chunk.len() - self.offset).min(buf.remaining());
                let start = self.offset;
                buf.put_slice(&self.chunk[start..start + n]);
                self.offset += n;
                return Poll::Ready(Ok(()));
            }

            match ready!(self.frames.poll_next_unpin(cx)) {
                Some(Ok(output)) => {
                    let message = match output {
                        LogOutput::StdOut { message }
                        | LogOutput::StdErr { message }
                        | LogOutput::StdIn { message }
                        | LogOutput::Console { message } => message,
                    };
                    self.chunk = message.to_vec();
                    self.offset = 0;
                }
                Some(Err(e)) => {
                    return Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::Other, e)))
                }
                None => return Poll::Ready(Ok(())),
            }
        }
    }
}
