//! Execution of translated commands against a container provider

use crate::{
    decode_stream, render_containers, render_images, render_raw, BuildContext, Command,
    CoreError, ListOptions, Result, StreamEnd, StreamStyle, Verb, EXIT_FAILURE,
};
use chrono::{DateTime, NaiveDate, Utc};
use dkr_config::{GlobalConfig, SourceMerge};
use dkr_provider::{
    BuildConfig, ContainerId, ContainerProvider, CreateContainerConfig, ExecConfig,
    ListContainersConfig, ListImagesConfig, LogConfig, PullConfig,
};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

/// Output channels of one invocation
pub struct Console<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

impl<'a> Console<'a> {
    pub fn new(out: &'a mut dyn Write, err: &'a mut dyn Write) -> Self {
        Self { out, err }
    }
}

/// Routes commands to the provider and renders the results
pub struct Dispatcher<'a> {
    provider: &'a dyn ContainerProvider,
    source_merge: SourceMerge,
    cwd: PathBuf,
}

impl<'a> Dispatcher<'a> {
    pub fn new(provider: &'a dyn ContainerProvider, config: &GlobalConfig, cwd: PathBuf) -> Self {
        Self {
            provider,
            source_merge: config.build.source_merge,
            cwd,
        }
    }

    /// Run a command and return the process exit code
    pub async fn dispatch(&self, command: &Command, console: &mut Console<'_>) -> Result<i32> {
        tracing::debug!("Dispatching {}", command.verb);

        match command.verb {
            Verb::Build => self.build(command, console).await,
            Verb::Create => self.create(command, console).await,
            Verb::Exec => self.exec(command, console).await,
            Verb::Logs => self.logs(command, console).await,
            Verb::Pull => self.pull(command, console).await,
            Verb::Push => self.push(command, console).await,
            Verb::Run => self.run(command, console).await,
            Verb::Start => self.start(command, console).await,
            Verb::Stop => self.stop(command, console).await,
            Verb::Tag => self.tag(command).await,
            Verb::Images => self.images(command, console).await,
            Verb::Ps => self.ps(command, console).await,
        }
    }

    async fn build(&self, command: &Command, console: &mut Console<'_>) -> Result<i32> {
        let context = BuildContext::resolve(command.target()?, &self.cwd, self.source_merge)?;
        tracing::debug!(
            "Build context {:?} with {} source entries",
            context.context_root,
            context.source_files.len()
        );

        let config = BuildConfig {
            dockerfile: context.dockerfile_name(),
            context: context.context_root,
            files: context.source_files,
            tag: command.text("tag").map(str::to_string),
            extra_hosts: command.list("add-host").to_vec(),
            quiet: command.flag("quiet"),
            no_cache: command.flag("no-cache"),
            cache_from: command.list("cache-from").to_vec(),
            pull: command.flag("pull"),
            rm: command.bool_option("rm"),
            force_rm: command.flag("force-rm"),
            memory: command.text("memory").map(str::to_string),
            memory_swap: command.text("memory-swap").map(str::to_string),
            cpu_shares: command.int("cpu-shares"),
            cpuset_cpus: command.text("cpuset-cpus").map(str::to_string),
            cpuset_mems: command.text("cpuset-mems").map(str::to_string),
            cpu_period: command.int("cpu-period"),
            cpu_quota: command.int("cpu-quota"),
            build_args: build_args(command.list("build-arg")),
            shm_size: command.text("shm-size").map(str::to_string),
            squash: command.flag("squash"),
            labels: labels(command.list("label")),
            network_mode: command.text("network").map(str::to_string),
            platform: command.text("platform").map(str::to_string),
        };

        let stream = self.provider.build(&config).await?;
        let end = decode_stream(stream, StreamStyle::Build, console.out, console.err).await?;
        Ok(exit_code(end))
    }

    async fn create(&self, command: &Command, console: &mut Console<'_>) -> Result<i32> {
        let config = container_config(command, command.flag("attach"))?;
        let id = self.provider.create(&config).await?;
        writeln!(console.out, "{}", id)?;
        Ok(0)
    }

    async fn exec(&self, command: &Command, console: &mut Console<'_>) -> Result<i32> {
        let id = ContainerId::new(command.target()?);
        if command.args.is_empty() {
            return Err(CoreError::MissingCommand(command.verb.to_string()));
        }

        let user = command.text("user").map(str::to_string);
        let config = ExecConfig {
            cmd: command.args.clone(),
            env: command.list("env").to_vec(),
            working_dir: command.text("workdir").map(str::to_string),
            privileged: command.flag("privileged") || user.as_deref() == Some("root"),
            user,
            tty: command.flag("tty"),
            stdin: command.flag("interactive"),
        };

        let output = self.provider.exec(&id, &config).await?;
        render_raw(output, console.out).await?;
        Ok(0)
    }

    async fn logs(&self, command: &Command, console: &mut Console<'_>) -> Result<i32> {
        let id = ContainerId::new(command.target()?);
        if command.flag("details") {
            tracing::debug!("--details is not supported by the engine client, ignoring");
        }

        let now = Utc::now();
        let config = LogConfig {
            follow: command.flag("follow"),
            stdout: true,
            stderr: true,
            tail: command.text("tail").map(str::to_string),
            timestamps: command.flag("timestamps"),
            since: command
                .text("since")
                .map(|v| parse_timestamp("since", v, now))
                .transpose()?,
            until: command
                .text("until")
                .map(|v| parse_timestamp("until", v, now))
                .transpose()?,
        };

        let output = self.provider.logs(&id, &config).await?;
        render_raw(output, console.out).await?;
        Ok(0)
    }

    async fn pull(&self, command: &Command, console: &mut Console<'_>) -> Result<i32> {
        let config = PullConfig {
            image: command.target()?.to_string(),
            platform: command.text("platform").map(str::to_string),
        };

        let stream = self.provider.pull(&config).await?;
        let end = decode_stream(stream, StreamStyle::Pull, console.out, console.err).await?;
        Ok(exit_code(end))
    }

    async fn push(&self, command: &Command, console: &mut Console<'_>) -> Result<i32> {
        let stream = self.provider.push(command.target()?).await?;
        let end = decode_stream(stream, StreamStyle::Pull, console.out, console.err).await?;
        Ok(exit_code(end))
    }

    async fn run(&self, command: &Command, console: &mut Console<'_>) -> Result<i32> {
        let config = container_config(command, command.flag("interactive"))?;
        let id = self.provider.create(&config).await?;
        self.provider.start(&id).await?;

        if command.flag("detach") {
            writeln!(console.out, "{}", id)?;
            return Ok(0);
        }

        let follow = LogConfig {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let output = self.provider.logs(&id, &follow).await?;
        render_raw(output, console.out).await?;

        let status = self.provider.wait(&id).await?;
        tracing::debug!("Container {} exited with {}", id.short(), status);

        if command.flag("rm") {
            if let Err(e) = self.provider.remove(&id, false).await {
                tracing::warn!("Failed to remove container {}: {}", id.short(), e);
            }
        }

        Ok(i32::try_from(status).unwrap_or(EXIT_FAILURE))
    }

    async fn start(&self, command: &Command, console: &mut Console<'_>) -> Result<i32> {
        let target = command.target()?;
        self.provider.start(&ContainerId::new(target)).await?;
        writeln!(console.out, "{}", target)?;
        Ok(0)
    }

    async fn stop(&self, command: &Command, console: &mut Console<'_>) -> Result<i32> {
        let target = command.target()?;
        self.provider
            .stop(&ContainerId::new(target), command.int("time"))
            .await?;
        writeln!(console.out, "{}", target)?;
        Ok(0)
    }

    async fn tag(&self, command: &Command) -> Result<i32> {
        let (repo, tag) = command.reference().ok_or(CoreError::MissingTagReference)?;
        self.provider.tag(command.target()?, repo, tag).await?;
        Ok(0)
    }

    async fn images(&self, command: &Command, console: &mut Console<'_>) -> Result<i32> {
        let mut filters = parse_filters(command.list("filter"))?;
        if let Some(reference) = &command.target {
            filters
                .entry("reference".to_string())
                .or_default()
                .push(reference.clone());
        }

        let config = ListImagesConfig {
            all: command.flag("all"),
            digests: command.flag("digests"),
            filters,
        };

        let images = self.provider.list_images(&config).await?;
        render_images(&images, &list_options(command), Utc::now(), console.out, console.err)?;
        Ok(0)
    }

    async fn ps(&self, command: &Command, console: &mut Console<'_>) -> Result<i32> {
        let config = ListContainersConfig {
            all: command.flag("all"),
            limit: command.int("last"),
            size: command.flag("size"),
            filters: parse_filters(command.list("filter"))?,
        };

        let containers = self.provider.list_containers(&config).await?;
        render_containers(
            &containers,
            &list_options(command),
            Utc::now(),
            console.out,
            console.err,
        )?;
        Ok(0)
    }
}

fn exit_code(end: StreamEnd) -> i32 {
    match end {
        StreamEnd::Completed => 0,
        StreamEnd::Failed => EXIT_FAILURE,
    }
}

fn list_options(command: &Command) -> ListOptions {
    ListOptions {
        quiet: command.flag("quiet"),
        format: command.text("format").map(str::to_string),
    }
}

/// Container settings shared by `create` and `run`
fn container_config(command: &Command, attach_stdin: bool) -> Result<CreateContainerConfig> {
    Ok(CreateContainerConfig {
        image: command.target()?.to_string(),
        name: command.text("name").map(str::to_string),
        cmd: (!command.args.is_empty()).then(|| command.args.clone()),
        entrypoint: command.text("entrypoint").map(|e| {
            if e.is_empty() {
                Vec::new()
            } else {
                vec![e.to_string()]
            }
        }),
        env: command.list("env").to_vec(),
        working_dir: command.text("workdir").map(str::to_string),
        user: command.text("user").map(str::to_string),
        hostname: command.text("hostname").map(str::to_string),
        tty: command.flag("tty"),
        attach_stdin,
        mac_address: command.text("mac-address").map(str::to_string),
        stop_signal: command.text("stop-signal").map(str::to_string),
        stop_timeout: command.int("stop-timeout"),
    })
}

/// `KEY=value` build arguments; a bare `KEY` takes its value from the environment
fn build_args(items: &[String]) -> HashMap<String, String> {
    items
        .iter()
        .filter_map(|item| match item.split_once('=') {
            Some((key, value)) => Some((key.to_string(), value.to_string())),
            None => match std::env::var(item) {
                Ok(value) => Some((item.clone(), value)),
                Err(_) => {
                    tracing::debug!("Build argument {} is not set, skipping", item);
                    None
                }
            },
        })
        .collect()
}

/// `key=value` labels; a bare key gets an empty value
fn labels(items: &[String]) -> HashMap<String, String> {
    items
        .iter()
        .map(|item| match item.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (item.clone(), String::new()),
        })
        .collect()
}

/// Group `name=value` filters by name
fn parse_filters(items: &[String]) -> Result<HashMap<String, Vec<String>>> {
    let mut filters: HashMap<String, Vec<String>> = HashMap::new();
    for item in items {
        let (name, value) = item
            .split_once('=')
            .filter(|(name, _)| !name.trim().is_empty())
            .ok_or_else(|| CoreError::InvalidOption {
                option: "filter".to_string(),
                message: format!("bad format of filter '{}' (expected name=value)", item),
            })?;
        filters
            .entry(name.trim().to_lowercase())
            .or_default()
            .push(value.to_string());
    }
    Ok(filters)
}

/// Unix timestamp for `--since`/`--until`.
///
/// Accepts unix seconds, RFC 3339, a plain date, or a duration before
/// `now` such as `10m`, `1h30m` or `2d`.
pub fn parse_timestamp(option: &str, value: &str, now: DateTime<Utc>) -> Result<i64> {
    let value = value.trim();
    let invalid = || CoreError::InvalidOption {
        option: option.to_string(),
        message: format!("'{}' is not a timestamp or duration", value),
    };

    if let Ok(secs) = value.parse::<i64>() {
        return Ok(secs);
    }
    if let Ok(secs) = value.parse::<f64>().map(f64::floor) {
        if secs.is_finite() {
            return Ok(secs as i64);
        }
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc().timestamp())
            .ok_or_else(invalid);
    }

    let seconds = parse_duration(value).ok_or_else(invalid)?;
    Ok(now.timestamp() - seconds)
}

/// Seconds in a duration made of `<number><unit>` parts (`s`, `m`, `h`, `d`)
fn parse_duration(value: &str) -> Option<i64> {
    let mut total = 0i64;
    let mut digits = String::new();
    let mut seen_unit = false;

    for c in value.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 3_600,
            'd' => 86_400,
            _ => return None,
        };
        let count: i64 = digits.parse().ok()?;
        total = total.checked_add(count.checked_mul(unit)?)?;
        digits.clear();
        seen_unit = true;
    }

    (seen_unit && digits.is_empty()).then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_parse_timestamp_forms() {
        assert_eq!(parse_timestamp("since", "1690000000", now()).unwrap(), 1_690_000_000);
        assert_eq!(parse_timestamp("since", "1690000000.75", now()).unwrap(), 1_690_000_000);
        assert_eq!(
            parse_timestamp("since", "2023-11-14T22:13:20Z", now()).unwrap(),
            1_700_000_000
        );
        assert_eq!(
            parse_timestamp("since", "2023-11-14", now()).unwrap(),
            1_699_920_000
        );
        assert_eq!(parse_timestamp("since", "10m", now()).unwrap(), 1_700_000_000 - 600);
        assert_eq!(
            parse_timestamp("until", "1h30m", now()).unwrap(),
            1_700_000_000 - 5_400
        );
        assert_eq!(
            parse_timestamp("since", "2d", now()).unwrap(),
            1_700_000_000 - 172_800
        );
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        for value in ["yesterday", "", "m", "5x", "1h30"] {
            assert!(matches!(
                parse_timestamp("since", value, now()),
                Err(CoreError::InvalidOption { .. })
            ));
        }
    }

    #[test]
    fn test_parse_filters() {
        let items = vec![
            "status=running".to_string(),
            "label=a=b".to_string(),
            "status=exited".to_string(),
        ];
        let filters = parse_filters(&items).unwrap();
        assert_eq!(filters["status"], vec!["running", "exited"]);
        assert_eq!(filters["label"], vec!["a=b"]);

        assert!(parse_filters(&["dangling".to_string()]).is_err());
        assert!(parse_filters(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_labels_and_build_args() {
        let labels = labels(&["team=core".to_string(), "flag".to_string()]);
        assert_eq!(labels["team"], "core");
        assert_eq!(labels["flag"], "");

        let args = build_args(&[
            "VERSION=1.2".to_string(),
            "DKR_TEST_SURELY_UNSET_BUILD_ARG".to_string(),
        ]);
        assert_eq!(args.len(), 1);
        assert_eq!(args["VERSION"], "1.2");
    }
}
