//! Translation of docker-style argument vectors into canonical commands
//!
//! Every verb owns a table of [`OptionSpec`]s. Parsing is permissive: flags
//! that are not in the verb's table are skipped along with the value that
//! follows them (and logged at debug level), never forwarded. Recognized flags resolve to exactly one canonical key no
//! matter which alias was typed.

use crate::{CoreError, Result};
use dkr_provider::split_image_reference;
use std::collections::BTreeMap;

/// Command verbs understood by dkr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Build,
    Create,
    Exec,
    Logs,
    Pull,
    Push,
    Run,
    Start,
    Stop,
    Tag,
    Images,
    Ps,
}

impl Verb {
    pub const ALL: [Verb; 12] = [
        Verb::Build,
        Verb::Create,
        Verb::Exec,
        Verb::Logs,
        Verb::Pull,
        Verb::Push,
        Verb::Run,
        Verb::Start,
        Verb::Stop,
        Verb::Tag,
        Verb::Images,
        Verb::Ps,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Build => "build",
            Verb::Create => "create",
            Verb::Exec => "exec",
            Verb::Logs => "logs",
            Verb::Pull => "pull",
            Verb::Push => "push",
            Verb::Run => "run",
            Verb::Start => "start",
            Verb::Stop => "stop",
            Verb::Tag => "tag",
            Verb::Images => "images",
            Verb::Ps => "ps",
        }
    }

    /// Listing verbs work without a target
    pub fn requires_target(self) -> bool {
        !matches!(self, Verb::Images | Verb::Ps)
    }

    /// Verbs whose arguments after the target belong to the invoked command
    fn passes_trailing_args(self) -> bool {
        matches!(self, Verb::Create | Verb::Exec | Verb::Run)
    }

    /// Option table for this verb
    pub fn options(self) -> &'static [OptionSpec] {
        match self {
            Verb::Build => BUILD_OPTIONS,
            Verb::Create => CREATE_OPTIONS,
            Verb::Exec => EXEC_OPTIONS,
            Verb::Logs => LOGS_OPTIONS,
            Verb::Pull => PULL_OPTIONS,
            Verb::Run => RUN_OPTIONS,
            Verb::Stop => STOP_OPTIONS,
            Verb::Images => IMAGES_OPTIONS,
            Verb::Ps => PS_OPTIONS,
            Verb::Push | Verb::Start | Verb::Tag => &[],
        }
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Verb {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Verb::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVerb(s.to_string()))
    }
}

/// How a flag takes its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Boolean switch, never consumes the next token
    Flag,
    /// Opaque string
    Text,
    /// Whole number
    Integer,
    /// Repeatable; every occurrence is kept
    List,
}

/// One recognized option of a verb
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    /// Canonical key
    pub key: &'static str,
    /// Accepted spellings in declaration order; one character means `-x`
    pub aliases: &'static [&'static str],
    pub kind: OptionKind,
}

impl OptionSpec {
    const fn flag(key: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { key, aliases, kind: OptionKind::Flag }
    }

    const fn text(key: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { key, aliases, kind: OptionKind::Text }
    }

    const fn int(key: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { key, aliases, kind: OptionKind::Integer }
    }

    const fn list(key: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { key, aliases, kind: OptionKind::List }
    }

    fn alias_index(&self, name: &str, short: bool) -> Option<usize> {
        self.aliases
            .iter()
            .position(|a| (a.chars().count() == 1) == short && *a == name)
    }
}

const BUILD_OPTIONS: &[OptionSpec] = &[
    OptionSpec::text("tag", &["t", "tag"]),
    OptionSpec::list("add-host", &["add-host"]),
    OptionSpec::flag("quiet", &["q", "quiet"]),
    OptionSpec::flag("no-cache", &["no-cache"]),
    OptionSpec::list("cache-from", &["cache-from"]),
    OptionSpec::flag("pull", &["pull"]),
    OptionSpec::flag("rm", &["rm"]),
    OptionSpec::flag("force-rm", &["force-rm"]),
    OptionSpec::text("memory", &["m", "memory"]),
    OptionSpec::text("memory-swap", &["memory-swap"]),
    OptionSpec::int("cpu-shares", &["c", "cpu-shares"]),
    OptionSpec::text("cpuset-cpus", &["cpuset-cpus"]),
    OptionSpec::text("cpuset-mems", &["cpuset-mems"]),
    OptionSpec::int("cpu-period", &["cpu-period"]),
    OptionSpec::int("cpu-quota", &["cpu-quota"]),
    OptionSpec::list("build-arg", &["build-arg"]),
    OptionSpec::text("shm-size", &["shm-size"]),
    OptionSpec::flag("squash", &["squash"]),
    OptionSpec::list("label", &["label"]),
    OptionSpec::text("network", &["network"]),
    OptionSpec::text("platform", &["platform"]),
];

const CREATE_OPTIONS: &[OptionSpec] = &[
    OptionSpec::text("hostname", &["h", "hostname"]),
    OptionSpec::flag("attach", &["a", "attach"]),
    OptionSpec::flag("tty", &["t", "tty"]),
    OptionSpec::text("entrypoint", &["entrypoint"]),
    OptionSpec::text("workdir", &["w", "workdir"]),
    OptionSpec::text("mac-address", &["mac-address"]),
    OptionSpec::text("stop-signal", &["stop-signal"]),
    OptionSpec::int("stop-timeout", &["stop-timeout"]),
    OptionSpec::text("name", &["name"]),
    OptionSpec::list("env", &["e", "env"]),
    OptionSpec::text("user", &["u", "user"]),
];

const EXEC_OPTIONS: &[OptionSpec] = &[
    OptionSpec::text("user", &["u", "user"]),
    OptionSpec::text("workdir", &["w", "workdir"]),
    OptionSpec::list("env", &["e", "env"]),
    OptionSpec::flag("tty", &["t", "tty"]),
    OptionSpec::flag("interactive", &["i", "interactive"]),
    OptionSpec::flag("privileged", &["privileged"]),
];

const LOGS_OPTIONS: &[OptionSpec] = &[
    OptionSpec::flag("details", &["details"]),
    OptionSpec::flag("follow", &["f", "follow"]),
    OptionSpec::text("since", &["since"]),
    OptionSpec::text("until", &["until"]),
    OptionSpec::flag("timestamps", &["t", "timestamps"]),
    OptionSpec::text("tail", &["n", "tail"]),
];

const PULL_OPTIONS: &[OptionSpec] = &[OptionSpec::text("platform", &["platform"])];

const RUN_OPTIONS: &[OptionSpec] = &[
    OptionSpec::text("name", &["name"]),
    OptionSpec::list("env", &["e", "env"]),
    OptionSpec::text("workdir", &["w", "workdir"]),
    OptionSpec::text("user", &["u", "user"]),
    OptionSpec::text("hostname", &["h", "hostname"]),
    OptionSpec::text("entrypoint", &["entrypoint"]),
    OptionSpec::flag("tty", &["t", "tty"]),
    OptionSpec::flag("interactive", &["i", "interactive"]),
    OptionSpec::flag("rm", &["rm"]),
    OptionSpec::flag("detach", &["d", "detach"]),
];

const STOP_OPTIONS: &[OptionSpec] = &[OptionSpec::int("time", &["t", "time"])];

const IMAGES_OPTIONS: &[OptionSpec] = &[
    OptionSpec::flag("all", &["a", "all"]),
    OptionSpec::list("filter", &["f", "filter"]),
    OptionSpec::flag("digests", &["digests"]),
    OptionSpec::flag("quiet", &["q", "quiet"]),
    OptionSpec::text("format", &["format"]),
];

const PS_OPTIONS: &[OptionSpec] = &[
    OptionSpec::flag("all", &["a", "all"]),
    OptionSpec::int("last", &["n", "last"]),
    OptionSpec::flag("size", &["s", "size"]),
    OptionSpec::list("filter", &["f", "filter"]),
    OptionSpec::flag("quiet", &["q", "quiet"]),
    OptionSpec::text("format", &["format"]),
];

/// Key under which `tag` stores its new reference
pub const REFERENCE_KEY: &str = "reference";

/// Value of a canonical option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Str(String),
    Int(i64),
    List(Vec<String>),
    /// New image reference for `tag`
    Reference { repo: Option<String>, tag: String },
}

/// Canonical options; an absent key means the option was not given
pub type Options = BTreeMap<&'static str, OptionValue>;

/// A fully translated invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,
    pub target: Option<String>,
    pub options: Options,
    /// Positional arguments after the target (the invoked command for create/exec/run)
    pub args: Vec<String>,
}

/// A flag occurrence before alias resolution
struct Occurrence {
    spec: usize,
    alias: usize,
    value: Option<String>,
    negated: bool,
}

impl Command {
    /// Translate an argument vector (without the program name)
    pub fn parse<I, S>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tokens = argv.into_iter().map(Into::into).peekable();

        // Flags ahead of the verb are not attached to any verb table
        while let Some(token) = tokens.next_if(|t| t.starts_with('-') && t.len() > 1) {
            tracing::debug!("Ignoring leading flag {}", token);
        }

        let verb: Verb = tokens.next().ok_or(CoreError::MissingVerb)?.parse()?;
        let specs = verb.options();

        let mut positionals: Vec<String> = Vec::new();
        let mut occurrences: Vec<Occurrence> = Vec::new();
        let mut only_positionals = false;

        while let Some(token) = tokens.next() {
            if only_positionals || (verb.passes_trailing_args() && !positionals.is_empty()) {
                positionals.push(token);
                continue;
            }

            if token == "--" {
                only_positionals = true;
                continue;
            }

            if let Some(long) = token.strip_prefix("--") {
                let (name, inline) = match long.split_once('=') {
                    Some((name, value)) => (name, Some(value.to_string())),
                    None => (long, None),
                };

                let (found, negated) = match find_spec(specs, name, false) {
                    Some(found) => (Some(found), false),
                    None => match name.strip_prefix("no-").and_then(|n| find_spec(specs, n, false)) {
                        Some(found) if specs[found.0].kind == OptionKind::Flag => (Some(found), true),
                        _ => (None, false),
                    },
                };

                let Some((spec, alias)) = found else {
                    // An unknown flag takes the next word as its value unless negated or inline
                    let skipped = if inline.is_none() && !name.starts_with("no-") {
                        tokens.next_if(|t| !t.starts_with('-'))
                    } else {
                        None
                    };
                    tracing::debug!(
                        "Ignoring flag --{} {} not supported by {}",
                        name,
                        skipped.unwrap_or_default(),
                        verb
                    );
                    continue;
                };

                let value = if specs[spec].kind == OptionKind::Flag || inline.is_some() {
                    inline
                } else {
                    Some(take_value(&mut tokens, specs[spec].key)?)
                };
                occurrences.push(Occurrence { spec, alias, value, negated });
                continue;
            }

            if let Some(cluster) = token.strip_prefix('-').filter(|c| !c.is_empty()) {
                let chars: Vec<(usize, char)> = cluster.char_indices().collect();
                for (pos, (offset, c)) in chars.iter().enumerate() {
                    let mut buf = [0u8; 4];
                    let rest = &cluster[offset + c.len_utf8()..];
                    let Some((spec, alias)) = find_spec(specs, c.encode_utf8(&mut buf), true) else {
                        // Same for a trailing unknown letter, or one followed by a non-letter tail
                        let skipped = if rest.is_empty() {
                            tokens.next_if(|t| !t.starts_with('-'))
                        } else if !rest.starts_with(|r: char| r.is_ascii_alphabetic()) {
                            Some(rest.to_string())
                        } else {
                            None
                        };
                        tracing::debug!(
                            "Ignoring flag -{} {} not supported by {}",
                            c,
                            skipped.as_deref().unwrap_or_default(),
                            verb
                        );
                        if skipped.is_some() {
                            break;
                        }
                        continue;
                    };

                    if specs[spec].kind == OptionKind::Flag {
                        occurrences.push(Occurrence { spec, alias, value: None, negated: false });
                        continue;
                    }

                    // A value flag swallows the rest of the cluster, or the next token
                    let value = if pos + 1 < chars.len() {
                        rest.strip_prefix('=').unwrap_or(rest).to_string()
                    } else {
                        take_value(&mut tokens, specs[spec].key)?
                    };
                    occurrences.push(Occurrence { spec, alias, value: Some(value), negated: false });
                    break;
                }
                continue;
            }

            positionals.push(token);
        }

        let mut options = resolve_options(specs, occurrences)?;

        let mut positionals = positionals.into_iter();
        let target = positionals.next();
        if target.is_none() && verb.requires_target() {
            return Err(CoreError::MissingTarget(verb.to_string()));
        }

        if verb == Verb::Tag {
            let reference = positionals.next().ok_or(CoreError::MissingTagReference)?;
            options.insert(REFERENCE_KEY, parse_reference(&reference));
        }

        let command = Command {
            verb,
            target,
            options,
            args: positionals.collect(),
        };
        tracing::debug!("Translated command: {:?}", command);
        Ok(command)
    }

    /// Target, or an error for verbs that need one
    pub fn target(&self) -> Result<&str> {
        self.target
            .as_deref()
            .ok_or_else(|| CoreError::MissingTarget(self.verb.to_string()))
    }

    /// Boolean option, `None` when not given
    pub fn bool_option(&self, key: &str) -> Option<bool> {
        match self.options.get(key) {
            Some(OptionValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Boolean option defaulting to false
    pub fn flag(&self, key: &str) -> bool {
        self.bool_option(key).unwrap_or(false)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.options.get(key) {
            Some(OptionValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.options.get(key) {
            Some(OptionValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> &[String] {
        match self.options.get(key) {
            Some(OptionValue::List(items)) => items,
            _ => &[],
        }
    }

    /// Repo/tag pair of a `tag` command
    pub fn reference(&self) -> Option<(Option<&str>, &str)> {
        match self.options.get(REFERENCE_KEY) {
            Some(OptionValue::Reference { repo, tag }) => Some((repo.as_deref(), tag)),
            _ => None,
        }
    }
}

fn find_spec(specs: &[OptionSpec], name: &str, short: bool) -> Option<(usize, usize)> {
    specs
        .iter()
        .enumerate()
        .find_map(|(i, spec)| spec.alias_index(name, short).map(|a| (i, a)))
}

fn take_value<I: Iterator<Item = String>>(tokens: &mut I, key: &str) -> Result<String> {
    tokens.next().ok_or_else(|| CoreError::InvalidOption {
        option: key.to_string(),
        message: "flag needs an argument".to_string(),
    })
}

/// Collapse flag occurrences into canonical options.
///
/// Lists keep every occurrence. Otherwise the alias declared later in the
/// table wins, and repeats of the same alias keep the last one typed.
fn resolve_options(specs: &[OptionSpec], occurrences: Vec<Occurrence>) -> Result<Options> {
    let mut options = Options::new();

    for (index, spec) in specs.iter().enumerate() {
        let mut matching = occurrences.iter().filter(|o| o.spec == index).peekable();
        if matching.peek().is_none() {
            continue;
        }

        let invalid = |message: String| CoreError::InvalidOption {
            option: spec.key.to_string(),
            message,
        };

        let value = if spec.kind == OptionKind::List {
            OptionValue::List(matching.filter_map(|o| o.value.clone()).collect())
        } else {
            let Some(winner) = matching.max_by_key(|o| o.alias) else {
                continue;
            };
            let raw = winner.value.as_deref();
            match spec.kind {
                OptionKind::Flag => {
                    let value = match raw {
                        None => true,
                        Some("true") | Some("1") => true,
                        Some("false") | Some("0") => false,
                        Some(other) => return Err(invalid(format!("'{}' is not a boolean", other))),
                    };
                    OptionValue::Bool(value != winner.negated)
                }
                OptionKind::Integer => {
                    let raw = raw.unwrap_or_default();
                    let parsed = raw
                        .trim()
                        .parse()
                        .map_err(|_| invalid(format!("'{}' is not a number", raw)))?;
                    OptionValue::Int(parsed)
                }
                _ => OptionValue::Str(raw.unwrap_or_default().to_string()),
            }
        };

        options.insert(spec.key, value);
    }

    Ok(options)
}

/// Split the new reference of `tag` into repo and tag.
///
/// A token without a tag separator is a bare tag, unless it names a
/// registry path, in which case it is a repository tagged `latest`.
fn parse_reference(token: &str) -> OptionValue {
    match split_image_reference(token) {
        (repo, Some(tag)) => OptionValue::Reference {
            repo: Some(repo.to_string()),
            tag: tag.to_string(),
        },
        (repo, None) if repo.contains('/') => OptionValue::Reference {
            repo: Some(repo.to_string()),
            tag: "latest".to_string(),
        },
        (bare, None) => OptionValue::Reference {
            repo: None,
            tag: bare.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &str) -> Result<Command> {
        Command::parse(args.split_whitespace())
    }

    #[test]
    fn test_unknown_verb() {
        let err = parse("frobnicate thing").unwrap_err();
        assert!(matches!(err, CoreError::UnknownVerb(ref v) if v == "frobnicate"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_verb() {
        assert!(matches!(parse("").unwrap_err(), CoreError::MissingVerb));
    }

    #[test]
    fn test_target_required() {
        assert!(matches!(parse("pull").unwrap_err(), CoreError::MissingTarget(_)));
        assert!(parse("ps").is_ok());
        assert!(parse("images").is_ok());
    }

    #[test]
    fn test_short_and_long_alias_resolve_to_same_key() {
        let short = parse("ps -q").unwrap();
        let long = parse("ps --quiet").unwrap();
        assert_eq!(short.options, long.options);
        assert!(short.flag("quiet"));
    }

    #[test]
    fn test_later_declared_alias_wins() {
        // "memory" is declared after "m"
        let cmd = parse("build --memory 1g -m 512m .").unwrap();
        assert_eq!(cmd.text("memory"), Some("1g"));

        let cmd = parse("build -m 512m --memory 1g .").unwrap();
        assert_eq!(cmd.text("memory"), Some("1g"));
    }

    #[test]
    fn test_repeated_alias_keeps_last() {
        let cmd = parse("build -t one -t two .").unwrap();
        assert_eq!(cmd.text("tag"), Some("two"));
    }

    #[test]
    fn test_list_options_accumulate() {
        let cmd = parse("build --build-arg A=1 --build-arg=B=2 .").unwrap();
        assert_eq!(cmd.list("build-arg"), &["A=1".to_string(), "B=2".to_string()]);
    }

    #[test]
    fn test_unknown_flags_are_ignored() {
        let cmd = parse("ps --bogus -z -a").unwrap();
        assert!(cmd.flag("all"));
        assert_eq!(cmd.options.len(), 1);
        assert!(cmd.target.is_none());
    }

    #[test]
    fn test_flags_outside_verb_table_not_forwarded() {
        // -q belongs to ps/images/build, not to logs
        let cmd = parse("logs web -q").unwrap();
        assert!(cmd.options.is_empty());
        assert_eq!(cmd.target.as_deref(), Some("web"));
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_unknown_flag_value_is_dropped() {
        let cmd = parse("run -d -p 8080:80 --name web nginx").unwrap();
        assert!(cmd.flag("detach"));
        assert_eq!(cmd.text("name"), Some("web"));
        assert_eq!(cmd.target.as_deref(), Some("nginx"));
        assert!(cmd.args.is_empty());

        let cmd = parse("build -f docker/Dockerfile.dev -t app .").unwrap();
        assert_eq!(cmd.text("tag"), Some("app"));
        assert_eq!(cmd.target.as_deref(), Some("."));
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_unknown_flag_value_forms() {
        let cmd = parse("run --volume=/data:/data -p8080:80 -dv /src:/src alpine true").unwrap();
        assert!(cmd.flag("detach"));
        assert_eq!(cmd.target.as_deref(), Some("alpine"));
        assert_eq!(cmd.args, vec!["true"]);

        // negated and hyphen-followed unknown flags take nothing
        let cmd = parse("run --no-healthcheck --init -d nginx").unwrap();
        assert!(cmd.flag("detach"));
        assert_eq!(cmd.target.as_deref(), Some("nginx"));
    }

    #[test]
    fn test_boolean_flag_does_not_consume_target() {
        let cmd = parse("logs -f web").unwrap();
        assert!(cmd.flag("follow"));
        assert_eq!(cmd.target.as_deref(), Some("web"));
    }

    #[test]
    fn test_short_cluster() {
        let cmd = parse("logs -ft web").unwrap();
        assert!(cmd.flag("follow"));
        assert!(cmd.flag("timestamps"));

        let cmd = parse("ps -aqn5").unwrap();
        assert!(cmd.flag("all"));
        assert!(cmd.flag("quiet"));
        assert_eq!(cmd.int("last"), Some(5));
    }

    #[test]
    fn test_verb_specific_meaning_of_t() {
        assert_eq!(parse("build -t app .").unwrap().text("tag"), Some("app"));
        assert!(parse("create -t ubuntu").unwrap().flag("tty"));
        assert!(parse("logs -t web").unwrap().flag("timestamps"));
        assert_eq!(parse("stop -t 3 web").unwrap().int("time"), Some(3));
    }

    #[test]
    fn test_sizes_forwarded_opaquely() {
        let cmd = parse("build --shm-size 2g -c 512 .").unwrap();
        assert_eq!(cmd.text("shm-size"), Some("2g"));
        assert_eq!(cmd.int("cpu-shares"), Some(512));
    }

    #[test]
    fn test_invalid_integer() {
        assert!(matches!(
            parse("stop -t soon web").unwrap_err(),
            CoreError::InvalidOption { .. }
        ));
    }

    #[test]
    fn test_missing_flag_value() {
        assert!(matches!(
            parse("build . -t").unwrap_err(),
            CoreError::InvalidOption { .. }
        ));
    }

    #[test]
    fn test_negated_flag() {
        let cmd = parse("build --no-rm .").unwrap();
        assert_eq!(cmd.bool_option("rm"), Some(false));
        // no-cache is its own option, not a negation
        let cmd = parse("build --no-cache .").unwrap();
        assert!(cmd.flag("no-cache"));
        assert!(cmd.bool_option("cache").is_none());
    }

    #[test]
    fn test_unset_options_absent() {
        let cmd = parse("build .").unwrap();
        assert!(cmd.options.is_empty());
        assert!(cmd.bool_option("rm").is_none());
    }

    #[test]
    fn test_exec_residual_args() {
        let cmd = parse("exec -u root web ls -la /tmp").unwrap();
        assert_eq!(cmd.text("user"), Some("root"));
        assert_eq!(cmd.target.as_deref(), Some("web"));
        assert_eq!(cmd.args, vec!["ls", "-la", "/tmp"]);
    }

    #[test]
    fn test_residual_args_survive_substrings_of_verb_and_target() {
        // "exec" and "web" reappear inside the invoked command
        let cmd = parse("exec web echo exec web webserver").unwrap();
        assert_eq!(cmd.target.as_deref(), Some("web"));
        assert_eq!(cmd.args, vec!["echo", "exec", "web", "webserver"]);
    }

    #[test]
    fn test_run_residual_keeps_command_flags() {
        let cmd = parse("run --rm -e A=1 alpine sh -c true").unwrap();
        assert!(cmd.flag("rm"));
        assert_eq!(cmd.list("env"), &["A=1".to_string()]);
        assert_eq!(cmd.target.as_deref(), Some("alpine"));
        assert_eq!(cmd.args, vec!["sh", "-c", "true"]);
    }

    #[test]
    fn test_double_dash_ends_flags() {
        let cmd = parse("ps -- -a").unwrap();
        assert!(!cmd.flag("all"));
        assert_eq!(cmd.target.as_deref(), Some("-a"));
    }

    #[test]
    fn test_tag_reference_split() {
        let cmd = parse("tag app:1 registry.local/app:2").unwrap();
        assert_eq!(cmd.target.as_deref(), Some("app:1"));
        assert_eq!(cmd.reference(), Some((Some("registry.local/app"), "2")));
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_tag_bare_reference_is_tag() {
        let cmd = parse("tag app:1 stable").unwrap();
        assert_eq!(cmd.reference(), Some((None, "stable")));
    }

    #[test]
    fn test_tag_registry_port_not_a_tag() {
        let cmd = parse("tag app localhost:5000/app").unwrap();
        assert_eq!(cmd.reference(), Some((Some("localhost:5000/app"), "latest")));
    }

    #[test]
    fn test_tag_requires_reference() {
        assert!(matches!(
            parse("tag app").unwrap_err(),
            CoreError::MissingTagReference
        ));
    }

    #[test]
    fn test_inline_values() {
        let cmd = parse("logs --tail=20 --since=10m web").unwrap();
        assert_eq!(cmd.text("tail"), Some("20"));
        assert_eq!(cmd.text("since"), Some("10m"));
    }

    #[test]
    fn test_leading_flags_before_verb_skipped() {
        let cmd = parse("--debug ps -a").unwrap();
        assert_eq!(cmd.verb, Verb::Ps);
        assert!(cmd.flag("all"));
    }
}
