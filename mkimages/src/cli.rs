mod list;

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    time::Duration,
};

use clap::Parser;
use constcat::concat;
use log::{info, warn};

use crate::{
    alias::{AliasPolicy, LatestScope},
    backend::Mode,
    config::MatrixConfig,
    dockerfile::ImageKind,
    engine::{self, Engine},
    matrix::{self, OsAxis},
    os::OsFamily,
    pipeline::{Options, Pipeline, Plan},
    registry::RegistryDestination,
    Result,
};

const REGISTRY_URL_FORMAT: &str = "[scheme://][user[:password]@]host[:port]";

fn seconds(s: &str) -> Result<Duration> {
    Ok(Duration::try_from_secs_f64(s.parse()?)?)
}

/// Builds the runtime image matrix, tags every image with its version aliases and pushes the results to the public
/// registry and optionally to a private one.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Print every action before performing it and log at debug level.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Print the actions as a shell script instead of performing them.
    #[arg(short = 'n', long = "dry-run")]
    dry_run: bool,

    /// Print the resolved plan as a table and exit.
    #[arg(long = "list")]
    list: bool,

    /// Build the images (default).
    #[arg(long = "build", overrides_with = "no_build")]
    build: bool,
    /// Skip building, the images must already exist locally.
    #[arg(long = "no-build", overrides_with = "build")]
    no_build: bool,

    /// Push the images.
    #[arg(long = "push", overrides_with = "no_push")]
    push: bool,
    /// Do not push anything (default).
    #[arg(long = "no-push", overrides_with = "push")]
    no_push: bool,

    /// Push to the public registry when pushing (default).
    #[arg(long = "push-public", overrides_with = "no_push_public")]
    push_public: bool,
    #[arg(long = "no-push-public", overrides_with = "push_public")]
    no_push_public: bool,

    /// Push to the private registry when pushing and one is configured (default).
    #[arg(long = "push-private", overrides_with = "no_push_private")]
    push_private: bool,
    #[arg(long = "no-push-private", overrides_with = "push_private")]
    no_push_private: bool,

    /// Tag and push the version aliases (default).
    #[arg(long = "aliases", overrides_with = "no_aliases")]
    aliases: bool,
    #[arg(long = "no-aliases", overrides_with = "aliases")]
    no_aliases: bool,

    /// Also give the aliases of default-OS images to their unsuffixed references (default).
    #[arg(long = "default-aliases", overrides_with = "no_default_aliases")]
    default_aliases: bool,
    #[arg(long = "no-default-aliases", overrides_with = "default_aliases")]
    no_default_aliases: bool,

    /// Build Ubuntu images (default).
    #[arg(long = "ubuntu", overrides_with = "no_ubuntu")]
    ubuntu: bool,
    #[arg(long = "no-ubuntu", overrides_with = "ubuntu")]
    no_ubuntu: bool,

    /// Build CentOS images.
    #[arg(long = "centos", overrides_with = "no_centos")]
    centos: bool,
    /// Do not build CentOS images (default).
    #[arg(long = "no-centos", overrides_with = "centos")]
    no_centos: bool,

    /// Remove every local reference created by the run once everything has been pushed.
    #[arg(long = "clean", overrides_with = "no_clean")]
    clean: bool,
    #[arg(long = "no-clean", overrides_with = "clean")]
    no_clean: bool,

    /// Restrict the image kinds to build, may be repeated. Defaults to the configured kinds.
    #[arg(long = "kind", value_enum)]
    kinds: Vec<ImageKind>,

    /// Which repositories receive the `latest` tag.
    #[arg(long = "latest-scope", value_enum, default_value_t)]
    latest_scope: LatestScope,

    #[arg(long = "registry", value_name = "URL", help = concat!("The private registry to mirror the images to, written as ", REGISTRY_URL_FORMAT, "."))]
    registry: Option<String>,

    /// The password for the private registry, overrides the password in the URL.
    #[arg(long = "registry-password", value_name = "PASSWORD")]
    registry_password: Option<String>,

    /// Read the password for the private registry from the first line of standard input.
    #[arg(long = "registry-password-stdin")]
    registry_password_stdin: bool,

    /// Seconds to wait between pushing the images and pushing their aliases.
    #[arg(long = "push-delay", value_name = "SECONDS", default_value = "2", value_parser = seconds)]
    push_delay: Duration,

    /// A JSON file describing the image matrix, replacing the built-in one.
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long = "engine", value_name = "PROGRAM", default_value = engine::DEFAULT_PROGRAM, help = concat!("The container engine command line to use, e.g. \"", engine::DEFAULT_PROGRAM, "\" or \"podman\"."))]
    engine: String,
}

/// Resolves a `--x`/`--no-x` pair. `overrides_with` guarantees at most one of them is set.
fn flag(yes: bool, no: bool, default: bool) -> bool {
    match (yes, no) {
        (true, _) => true,
        (_, true) => false,
        _ => default,
    }
}

fn read_password(input: &mut dyn BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|error| format!("failed to read the registry password from stdin: {error}"))?;
    let password = line.trim_end_matches(['\r', '\n']);
    Ok((!password.is_empty()).then(|| password.to_owned()))
}

impl Cli {
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn run(self) -> Result<()> {
        let stdin = io::stdin();
        let mut out = io::stdout().lock();
        self.run_with(&mut out, &mut stdin.lock())
    }

    /// Runs with explicit standard streams. Dry runs and `--list` write to `out`; the password is read from `input`.
    pub fn run_with(self, out: &mut dyn Write, input: &mut dyn BufRead) -> Result<()> {
        let Cli {
            verbose,
            dry_run,
            list,
            build,
            no_build,
            push,
            no_push,
            push_public,
            no_push_public,
            push_private,
            no_push_private,
            aliases,
            no_aliases,
            default_aliases,
            no_default_aliases,
            ubuntu,
            no_ubuntu,
            centos,
            no_centos,
            clean,
            no_clean,
            kinds,
            latest_scope,
            registry,
            registry_password,
            registry_password_stdin,
            push_delay,
            config,
            engine,
        } = self;

        let mode = Mode::from_flags(dry_run, verbose);
        let push = flag(push, no_push, false);
        let options = Options {
            build: flag(build, no_build, true),
            aliases: flag(aliases, no_aliases, true),
            push_public: push && flag(push_public, no_push_public, true),
            push_private: push && flag(push_private, no_push_private, true),
            clean: flag(clean, no_clean, false),
            push_delay: if mode.executes() {
                push_delay
            } else {
                Duration::ZERO
            },
        };
        let policy = AliasPolicy {
            latest_scope,
            default_aliases: flag(default_aliases, no_default_aliases, true),
        };

        let config = match &config {
            Some(path) => MatrixConfig::load(path)?,
            None => MatrixConfig::default(),
        };

        let enabled = |family: OsFamily| match family {
            OsFamily::Ubuntu => flag(ubuntu, no_ubuntu, true),
            OsFamily::Centos => flag(centos, no_centos, false),
        };
        let axes: Vec<OsAxis> = config
            .families
            .iter()
            .filter(|axis| enabled(axis.family))
            .cloned()
            .collect();
        for family in [OsFamily::Ubuntu, OsFamily::Centos] {
            if enabled(family) && config.axis(family).is_none() {
                warn!("{family} is enabled but has no configured versions");
            }
        }

        let kinds = if kinds.is_empty() {
            config.kinds.clone()
        } else {
            kinds
        };

        let matrix = matrix::expand(config.naming(), &config.runtime_versions, &axes, &kinds);
        info!("resolved {} images", matrix.targets.len());

        // Only ask for a password when it can be used.
        let needs_password = options.push_private && !list;
        let destination = match registry.as_deref().map(str::parse::<RegistryDestination>) {
            None => None,
            Some(Err(error)) => {
                warn!("{error}, skipping the private registry");
                None
            }
            Some(Ok(destination)) if destination.host().is_none() => {
                warn!("the registry URL has no host, skipping the private registry");
                None
            }
            Some(Ok(destination)) if needs_password => {
                Some(destination.resolve_password(registry_password, || {
                    if registry_password_stdin {
                        read_password(input)
                    } else {
                        Ok(None)
                    }
                })?)
            }
            Some(Ok(destination)) => Some(destination),
        };

        let plan = Plan::new(matrix, &config.aliases, policy, destination);

        if list {
            return list::list(&plan, out);
        }

        let engine = Engine::new(engine);
        {
            let backend = mode.backend(out);
            Pipeline::new(&*backend, &engine, options).run(&plan)?;
        }
        out.flush()?;

        Ok(())
    }
}
