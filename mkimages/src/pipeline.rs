//! Runs a fully resolved plan: build, tag aliases, push publicly, mirror to the private registry and optionally clean
//! up. Phases run strictly one after the other and every action waits for the previous one.

use std::{thread, time::Duration};

use log::info;

use crate::{
    alias::{AliasPolicy, AliasResolver, AliasTable},
    backend::Backend,
    engine::Engine,
    matrix::Matrix,
    registry::{self, RegistryDestination},
    target::{AliasPair, BuildTarget},
    Result,
};

pub const DEFAULT_PUSH_DELAY: Duration = Duration::from_secs(2);

/// Everything a run may do, resolved before anything happens.
#[derive(Debug)]
pub struct Plan {
    pub targets: Vec<BuildTarget>,
    /// Unsuffixed references of default-OS targets. Tagged right after the builds and pushed with the targets.
    pub default_roots: Vec<AliasPair>,
    pub aliases: Vec<AliasPair>,
    pub private: Option<PrivatePlan>,
}

#[derive(Debug)]
pub struct PrivatePlan {
    pub destination: RegistryDestination,
    /// Targets and default roots on the private registry.
    pub base: Vec<AliasPair>,
    pub aliases: Vec<AliasPair>,
}

impl Plan {
    pub fn new(
        matrix: Matrix,
        table: &AliasTable,
        policy: AliasPolicy,
        destination: Option<RegistryDestination>,
    ) -> Self {
        let resolver = AliasResolver::new(table, &matrix.default_aliases, policy);
        let default_roots: Vec<_> = matrix
            .targets
            .iter()
            .filter_map(|target| resolver.default_root(target))
            .collect();
        let aliases: Vec<_> = matrix
            .targets
            .iter()
            .flat_map(|target| resolver.resolve_all(target))
            .collect();

        let private = destination
            .filter(|destination| destination.host().is_some())
            .map(|destination| {
                let mut base = registry::rehome(&matrix.targets, &destination);
                base.extend(registry::rehome(&default_roots, &destination));
                let aliases = registry::rehome(&aliases, &destination);
                PrivatePlan {
                    destination,
                    base,
                    aliases,
                }
            });

        Self {
            targets: matrix.targets,
            default_roots,
            aliases,
            private,
        }
    }
}

/// Which phases run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub build: bool,
    pub aliases: bool,
    pub push_public: bool,
    pub push_private: bool,
    pub clean: bool,
    /// Waited between pushing base references and pushing the aliases that point at them.
    pub push_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            build: true,
            aliases: true,
            push_public: false,
            push_private: false,
            clean: false,
            push_delay: DEFAULT_PUSH_DELAY,
        }
    }
}

pub struct Pipeline<'a> {
    backend: &'a dyn Backend,
    engine: &'a Engine,
    options: Options,
}

impl<'a> Pipeline<'a> {
    pub fn new(backend: &'a dyn Backend, engine: &'a Engine, options: Options) -> Self {
        Self {
            backend,
            engine,
            options,
        }
    }

    /// Runs every enabled phase. The first failing action aborts the run; nothing is rolled back.
    pub fn run(&self, plan: &Plan) -> Result<()> {
        let Options {
            build,
            aliases,
            push_public,
            push_private,
            clean,
            ..
        } = self.options;
        let (backend, engine) = (self.backend, self.engine);

        // References created locally, in creation order.
        let mut created: Vec<BuildTarget> = Vec::new();

        if build {
            info!("building {} images", plan.targets.len());
            for target in &plan.targets {
                target.build(backend, engine)?;
                created.push(target.clone());
            }
            self.tag_all(&plan.default_roots, &mut created)?;
        }

        if aliases {
            self.tag_all(&plan.aliases, &mut created)?;
        }

        if push_public {
            info!("pushing to the public registry");
            for target in &plan.targets {
                target.push(backend, engine)?;
            }
            for pair in &plan.default_roots {
                pair.to_target().push(backend, engine)?;
            }
            if aliases {
                self.push_aliases(&plan.aliases)?;
            }
        }

        if push_private {
            match &plan.private {
                Some(private) => {
                    let host = private.destination.host().map(ToString::to_string);
                    info!("pushing to {}", host.unwrap_or_default());
                    private.destination.login(backend, engine)?;
                    self.tag_all(&private.base, &mut created)?;
                    if aliases {
                        self.tag_all(&private.aliases, &mut created)?;
                    }
                    for pair in &private.base {
                        pair.to_target().push(backend, engine)?;
                    }
                    if aliases {
                        self.push_aliases(&private.aliases)?;
                    }
                }
                None => info!("no private registry configured, skipping the private push"),
            }
        }

        if clean {
            info!("removing {} local references", created.len());
            for target in created.iter().rev() {
                target.remove(backend, engine)?;
            }
        }

        Ok(())
    }

    fn tag_all(&self, pairs: &[AliasPair], created: &mut Vec<BuildTarget>) -> Result<()> {
        for pair in pairs {
            pair.tag(self.backend, self.engine)?;
            created.push(pair.to_target());
        }
        Ok(())
    }

    fn push_aliases(&self, pairs: &[AliasPair]) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let delay = self.options.push_delay;
        if !delay.is_zero() {
            info!("waiting {delay:?} before pushing aliases");
            thread::sleep(delay);
        }
        for pair in pairs {
            pair.to_target().push(self.backend, self.engine)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::testing::{Action, RecordingBackend},
        dockerfile::ImageKind,
        matrix::{self, Naming, OsAxis, OsVersion},
        os::OsFamily,
    };

    fn plan(destination: Option<&str>) -> Plan {
        let axes = [OsAxis::new(OsFamily::Ubuntu, [OsVersion::new("20")])];
        let matrix = matrix::expand(
            Naming {
                namespace: "repo",
                image: "lua",
            },
            &["5.4.7".to_owned()],
            &axes,
            &[ImageKind::Dev],
        );
        let table = AliasTable::new().with_aliases("5.4.7", ["5.4"]);
        Plan::new(
            matrix,
            &table,
            AliasPolicy::default(),
            destination.map(|url| url.parse().unwrap()),
        )
    }

    fn options() -> Options {
        Options {
            push_public: true,
            push_private: true,
            push_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn plan_contents() {
        let plan = plan(Some("reg.io:5000"));
        assert_eq!(plan.targets.len(), 1);
        assert_eq!(plan.default_roots.len(), 1);
        assert_eq!(plan.aliases.len(), 2);

        let private = plan.private.as_ref().unwrap();
        let base: Vec<_> = private
            .base
            .iter()
            .map(|pair| pair.destination.to_string())
            .collect();
        assert_eq!(
            base,
            ["reg.io:5000/repo/ubuntu20/lua:5.4.7", "reg.io:5000/repo/lua:5.4.7"]
        );
        assert_eq!(private.aliases.len(), 2);
    }

    #[test]
    fn alias_counts_follow_the_family_minimum() {
        let axes = [
            OsAxis::new(OsFamily::Ubuntu, [OsVersion::new("20")]),
            OsAxis::new(OsFamily::Centos, [OsVersion::new("9")]).with_minimum_runtime("5.2.5"),
        ];
        let matrix = matrix::expand(
            Naming {
                namespace: "repo",
                image: "lua",
            },
            &["5.1.5".to_owned(), "5.5.2".to_owned()],
            &axes,
            &[ImageKind::Dev],
        );
        let table = AliasTable::new()
            .with_aliases("5.5.2", ["5.5", "5", "latest"])
            .with_aliases("5.1.5", ["5.1"]);
        let policy = AliasPolicy {
            default_aliases: false,
            ..Default::default()
        };
        let plan = Plan::new(matrix, &table, policy, None);

        let targets: Vec<_> = plan
            .targets
            .iter()
            .map(|target| target.reference().to_string())
            .collect();
        assert_eq!(
            targets,
            [
                "repo/ubuntu20/lua:5.1.5",
                "repo/ubuntu20/lua:5.5.2",
                "repo/centos9/lua:5.5.2",
            ]
        );

        let count = |source: &str| {
            plan.aliases
                .iter()
                .filter(|pair| pair.source.reference().to_string() == source)
                .count()
        };
        assert_eq!(count("repo/ubuntu20/lua:5.1.5"), 1);
        assert_eq!(count("repo/ubuntu20/lua:5.5.2"), 3);
        assert_eq!(count("repo/centos9/lua:5.5.2"), 3);
        assert_eq!(plan.aliases.len(), 7);
    }

    #[test]
    fn plan_without_host_has_no_private_phase() {
        assert!(plan(Some("https://")).private.is_none());
        assert!(plan(None).private.is_none());
    }

    #[test]
    fn phases_run_in_order() {
        let backend = RecordingBackend::default();
        let engine = Engine::default();
        let options = Options {
            clean: true,
            ..options()
        };
        Pipeline::new(&backend, &engine, options)
            .run(&plan(Some("bob:pw@reg.io")))
            .unwrap();

        let commands = backend.commands();
        let build = commands[0].clone();
        assert!(build.starts_with("docker build -t repo/ubuntu20/lua:5.4.7 "), "{build}");
        assert_eq!(
            &commands[1..],
            [
                "docker tag repo/ubuntu20/lua:5.4.7 repo/lua:5.4.7",
                "docker tag repo/ubuntu20/lua:5.4.7 repo/ubuntu20/lua:5.4",
                "docker tag repo/lua:5.4.7 repo/lua:5.4",
                "docker push repo/ubuntu20/lua:5.4.7",
                "docker push repo/lua:5.4.7",
                "docker push repo/ubuntu20/lua:5.4",
                "docker push repo/lua:5.4",
                "docker login reg.io -u bob -p ********",
                "docker tag repo/ubuntu20/lua:5.4.7 reg.io/repo/ubuntu20/lua:5.4.7",
                "docker tag repo/lua:5.4.7 reg.io/repo/lua:5.4.7",
                "docker tag repo/ubuntu20/lua:5.4 reg.io/repo/ubuntu20/lua:5.4",
                "docker tag repo/lua:5.4 reg.io/repo/lua:5.4",
                "docker push reg.io/repo/ubuntu20/lua:5.4.7",
                "docker push reg.io/repo/lua:5.4.7",
                "docker push reg.io/repo/ubuntu20/lua:5.4",
                "docker push reg.io/repo/lua:5.4",
                "docker rmi reg.io/repo/lua:5.4",
                "docker rmi reg.io/repo/ubuntu20/lua:5.4",
                "docker rmi reg.io/repo/lua:5.4.7",
                "docker rmi reg.io/repo/ubuntu20/lua:5.4.7",
                "docker rmi repo/lua:5.4",
                "docker rmi repo/ubuntu20/lua:5.4",
                "docker rmi repo/lua:5.4.7",
                "docker rmi repo/ubuntu20/lua:5.4.7",
            ]
        );
    }

    #[test]
    fn disabled_phases_do_nothing() {
        let backend = RecordingBackend::default();
        let engine = Engine::default();
        let options = Options {
            build: false,
            aliases: false,
            push_private: false,
            ..options()
        };
        Pipeline::new(&backend, &engine, options)
            .run(&plan(Some("reg.io")))
            .unwrap();

        assert_eq!(
            backend.commands(),
            ["docker push repo/ubuntu20/lua:5.4.7", "docker push repo/lua:5.4.7"]
        );
    }

    #[test]
    fn first_failure_aborts_the_run() {
        let backend = RecordingBackend::failing_on("docker push");
        let engine = Engine::default();
        let error = Pipeline::new(&backend, &engine, options())
            .run(&plan(Some("reg.io")))
            .unwrap_err();

        assert!(error.to_string().contains("docker push repo/ubuntu20/lua:5.4.7"));
        let actions = backend.actions();
        assert_eq!(
            actions.last(),
            Some(&Action::Run("docker push repo/ubuntu20/lua:5.4.7".to_owned()))
        );
        assert!(!backend.commands().iter().any(|c| c.contains("reg.io")));
    }
}
