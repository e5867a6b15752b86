//! Trait registry
//!
//! A trait is a named mutation of a [`BuildConfig`]. Tokens are either a
//! plain name (`shrink`) or a parameterized name carrying a value
//! (`ldflags=-s -w`). The base name of a parameterized token keeps the
//! delimiter, so `ldflags=-s` resolves to the trait registered as `ldflags=`.
//!
//! Every trait runs at most once per registry. Composite traits expand to
//! other traits through the same at-most-once discipline; a trait is marked
//! applied before its effect runs, which makes cyclic composites terminate.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::config::{BuildConfig, Subcommand};
use super::{host_arch, host_os, OS_ENV_KEY};

/// Separates a parameterized trait name from its value
pub const PARAM_DELIMITER: char = '=';

/// Upper bound on nested composite expansion
pub const MAX_EXPANSION_DEPTH: usize = 16;

/// Errors raised while resolving trait tokens
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraitError {
    /// One or more requested base names are not registered
    #[error("Invalid trait{}: {}", plural_suffix(.names), .names.join(", "))]
    Invalid { names: Vec<String> },

    #[error("Unknown trait: {0}")]
    Unknown(String),

    #[error("Trait '{0}' is already registered")]
    Duplicate(String),

    /// Parameterized traits must end in the delimiter, simple ones must not
    #[error("Trait '{0}' does not match its kind (parameterized names end in '=')")]
    KindMismatch(String),

    #[error("Trait '{0}' requires a value")]
    MissingValue(String),

    #[error("Trait expansion deeper than {limit} levels at '{name}'")]
    RecursionLimit { name: String, limit: usize },
}

fn plural_suffix(names: &[String]) -> &'static str {
    if names.len() == 1 {
        ""
    } else {
        "s"
    }
}

/// A single mutation of the build configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Assign an environment variable
    SetEnv {
        key: &'static str,
        value: &'static str,
    },
    LinkFlags(&'static [&'static str]),
    BuildFlags(&'static [&'static str]),
    Subcommand(Subcommand),
    /// Inject timestamp, version, host OS and host arch variables into `main`
    InjectVersion,
    RequestPackage,
}

impl Effect {
    fn run(&self, config: &mut BuildConfig) {
        match self {
            Effect::SetEnv { key, value } => config.set_env(key, value),
            Effect::LinkFlags(flags) => config.add_link_flags(flags.iter().copied()),
            Effect::BuildFlags(flags) => config.add_build_flags(flags.iter().copied()),
            Effect::Subcommand(subcommand) => config.set_subcommand(*subcommand),
            Effect::InjectVersion => {
                let timestamp = config.timestamp();
                let version = config.version().to_string();
                config.add_var("main.timestamp", &timestamp);
                config.add_var("main.version", &version);
                config.add_var("main.buildGOOS", host_os());
                config.add_var("main.buildGOARCH", host_arch());
            }
            Effect::RequestPackage => config.request_package(),
        }
    }
}

/// Mutation driven by the value of a parameterized trait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamEffect {
    /// Use the value as the go tool binary
    ToolBinary,
    /// Replace all link flags with the value
    OverrideLinkFlags,
    /// Replace all build flags with the value
    OverrideBuildFlags,
    /// Replace all compile flags with the value
    OverrideCompileFlags,
    /// Set the output name template and pass it with `-o`
    OutputName,
}

impl ParamEffect {
    fn run(self, config: &mut BuildConfig, name: &str, value: &str) -> Result<(), TraitError> {
        match self {
            ParamEffect::ToolBinary => {
                if value.is_empty() {
                    return Err(TraitError::MissingValue(name.to_string()));
                }
                config.set_tool(value);
            }
            ParamEffect::OverrideLinkFlags => {
                config.reset_link_flags();
                config.add_link_flags(non_empty(value));
            }
            ParamEffect::OverrideBuildFlags => {
                config.reset_build_flags();
                config.add_build_flags(non_empty(value));
            }
            ParamEffect::OverrideCompileFlags => {
                config.reset_compile_flags();
                config.add_compile_flags(non_empty(value));
            }
            ParamEffect::OutputName => {
                if value.is_empty() {
                    return Err(TraitError::MissingValue(name.to_string()));
                }
                config.set_output_name(value);
                let binary = config.binary_name();
                config.add_build_flags(["-o".to_string(), binary]);
            }
        }
        Ok(())
    }
}

fn non_empty(value: &str) -> Option<&str> {
    Some(value).filter(|v| !v.is_empty())
}

/// What applying a trait does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitKind {
    Simple(Effect),
    /// Apply the named traits in order, then the optional trailing effect
    Composite {
        expands: Vec<String>,
        then: Option<Effect>,
    },
    Parameterized(ParamEffect),
}

impl TraitKind {
    /// Composite trait without a trailing effect
    pub fn composite(expands: &[&str]) -> Self {
        TraitKind::Composite {
            expands: expands.iter().map(|s| s.to_string()).collect(),
            then: None,
        }
    }

    pub fn is_parameterized(&self) -> bool {
        matches!(self, TraitKind::Parameterized(_))
    }
}

/// A registered trait with its help text
#[derive(Debug, Clone)]
pub struct TraitDef {
    pub name: String,
    pub help: String,
    pub kind: TraitKind,
}

/// Base name of a token: the name up to and including the delimiter
pub fn base_name(token: &str) -> &str {
    match token.find(PARAM_DELIMITER) {
        Some(pos) => &token[..=pos],
        None => token,
    }
}

/// Value carried by a parameterized token
pub fn param_value(token: &str) -> Option<&str> {
    token
        .find(PARAM_DELIMITER)
        .map(|pos| &token[pos + PARAM_DELIMITER.len_utf8()..])
}

/// Name → effect table plus the set of traits applied so far
#[derive(Debug, Default)]
pub struct TraitRegistry {
    definitions: Vec<TraitDef>,
    index: HashMap<String, usize>,
    applied: Vec<String>,
    applied_set: HashSet<String>,
}

impl TraitRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in traits
    pub fn builtin() -> Result<Self, TraitError> {
        let mut registry = Self::new();
        for (name, help, kind) in builtin_traits() {
            registry.register(name, help, kind)?;
        }
        Ok(registry)
    }

    /// Register a trait. Names ending in `=` must be parameterized.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        help: impl Into<String>,
        kind: TraitKind,
    ) -> Result<(), TraitError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(TraitError::Duplicate(name));
        }

        let ends_with_delimiter = name.ends_with(PARAM_DELIMITER);
        let interior_delimiter = base_name(&name).len() != name.len();
        if ends_with_delimiter != kind.is_parameterized() || interior_delimiter {
            return Err(TraitError::KindMismatch(name));
        }

        self.index.insert(name.clone(), self.definitions.len());
        self.definitions.push(TraitDef {
            name,
            help: help.into(),
            kind,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TraitDef> {
        self.index.get(name).map(|&i| &self.definitions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered traits in registration order
    pub fn traits(&self) -> impl Iterator<Item = &TraitDef> {
        self.definitions.iter()
    }

    /// Check every token, reporting all unknown base names at once
    pub fn validate<S: AsRef<str>>(&self, tokens: &[S]) -> Result<(), TraitError> {
        let mut invalid: Vec<String> = Vec::new();
        for token in tokens {
            let name = base_name(token.as_ref());
            if !self.contains(name) && !invalid.iter().any(|n| n == name) {
                invalid.push(name.to_string());
            }
        }

        if invalid.is_empty() {
            Ok(())
        } else {
            Err(TraitError::Invalid { names: invalid })
        }
    }

    /// Apply tokens left to right; already applied traits are skipped
    pub fn apply<S: AsRef<str>>(
        &mut self,
        config: &mut BuildConfig,
        tokens: &[S],
    ) -> Result<(), TraitError> {
        for token in tokens {
            self.apply_token(config, token.as_ref(), 0)?;
        }
        Ok(())
    }

    fn apply_token(
        &mut self,
        config: &mut BuildConfig,
        token: &str,
        depth: usize,
    ) -> Result<(), TraitError> {
        let name = base_name(token);
        if self.applied_set.contains(name) {
            return Ok(());
        }
        if depth > MAX_EXPANSION_DEPTH {
            return Err(TraitError::RecursionLimit {
                name: name.to_string(),
                limit: MAX_EXPANSION_DEPTH,
            });
        }

        let kind = match self.get(name) {
            Some(def) => def.kind.clone(),
            None => return Err(TraitError::Unknown(name.to_string())),
        };

        self.applied_set.insert(name.to_string());
        self.applied.push(name.to_string());

        match kind {
            TraitKind::Simple(effect) => effect.run(config),
            TraitKind::Composite { expands, then } => {
                for constituent in &expands {
                    self.apply_token(config, constituent, depth + 1)?;
                }
                if let Some(effect) = then {
                    effect.run(config);
                }
            }
            TraitKind::Parameterized(effect) => {
                let value = param_value(token).unwrap_or_default();
                effect.run(config, name, value)?;
            }
        }
        Ok(())
    }

    /// Base names applied so far, in application order
    pub fn applied_names(&self) -> &[String] {
        &self.applied
    }
}

fn builtin_traits() -> Vec<(&'static str, &'static str, TraitKind)> {
    use TraitKind::{Parameterized, Simple};

    vec![
        (
            "nocgo",
            "Set 'CGO_ENABLED=0' environment variable.",
            Simple(Effect::SetEnv {
                key: "CGO_ENABLED",
                value: "0",
            }),
        ),
        (
            "static",
            "Set '-extldflags \"-static\"' link flags.",
            Simple(Effect::LinkFlags(&["-extldflags", "\"-static\""])),
        ),
        (
            "shrink",
            "Set '-s -w' link flags.",
            Simple(Effect::LinkFlags(&["-s", "-w"])),
        ),
        (
            "race",
            "Set '-race' build flag.",
            Simple(Effect::BuildFlags(&["-race"])),
        ),
        (
            "rebuild",
            "Set '-a' build flag.",
            Simple(Effect::BuildFlags(&["-a"])),
        ),
        (
            "trimpath",
            "Set '-trimpath' build flag.",
            Simple(Effect::BuildFlags(&["-trimpath"])),
        ),
        (
            "linux",
            "Set 'GOOS=linux' environment variable.",
            Simple(Effect::SetEnv {
                key: OS_ENV_KEY,
                value: "linux",
            }),
        ),
        (
            "windows",
            "Set 'GOOS=windows' environment variable.",
            Simple(Effect::SetEnv {
                key: OS_ENV_KEY,
                value: "windows",
            }),
        ),
        (
            "windowsgui",
            "Set windows trait and '-H windowsgui' link flag.",
            TraitKind::Composite {
                expands: vec!["windows".to_string()],
                then: Some(Effect::LinkFlags(&["-H", "windowsgui"])),
            },
        ),
        (
            "verbose",
            "Set '-v' build flag.",
            Simple(Effect::BuildFlags(&["-v"])),
        ),
        (
            "debug",
            "Set '-x' build flag.",
            Simple(Effect::BuildFlags(&["-x"])),
        ),
        (
            "install",
            "Run 'go install' instead of 'go build'.",
            Simple(Effect::Subcommand(Subcommand::Install)),
        ),
        (
            "version",
            "Set 'timestamp', 'version', 'buildGOOS' and 'buildGOARCH' go variables to the 'main' package.",
            Simple(Effect::InjectVersion),
        ),
        (
            "package",
            "After building creates a zip-package of the binary.",
            Simple(Effect::RequestPackage),
        ),
        (
            "release",
            "Sets the traits: shrink, version, static, rebuild and trimpath.",
            TraitKind::composite(&["shrink", "version", "static", "rebuild", "trimpath"]),
        ),
        (
            "default",
            "Sets the version trait. This is used if run without arguments.",
            TraitKind::composite(&["version"]),
        ),
        (
            "go=",
            "Set the 'go' binary explicitly.",
            Parameterized(ParamEffect::ToolBinary),
        ),
        (
            "ldflags=",
            "Set 'go tool link' flags explicitly.",
            Parameterized(ParamEffect::OverrideLinkFlags),
        ),
        (
            "buildflags=",
            "Set 'go build' flags explicitly.",
            Parameterized(ParamEffect::OverrideBuildFlags),
        ),
        (
            "gcflags=",
            "Set 'go tool compile' flags explicitly.",
            Parameterized(ParamEffect::OverrideCompileFlags),
        ),
        (
            "name=",
            "Set binary name with the -o build flag. %n represents original name.",
            Parameterized(ParamEffect::OutputName),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Local};
    use serial_test::serial;

    fn fixed_time() -> DateTime<Local> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Local)
    }

    fn config() -> BuildConfig {
        BuildConfig::new("v1.2.3", "tool").with_build_time(fixed_time())
    }

    fn applied(tokens: &[&str]) -> (TraitRegistry, BuildConfig) {
        let mut registry = TraitRegistry::builtin().unwrap();
        let mut cfg = config();
        registry.apply(&mut cfg, tokens).unwrap();
        (registry, cfg)
    }

    fn cleanup_env() {
        std::env::remove_var("GOOS");
        std::env::remove_var("CGO_ENABLED");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("shrink"), "shrink");
        assert_eq!(base_name("ldflags=-s -w"), "ldflags=");
        assert_eq!(base_name("name=a=b"), "name=");
        assert_eq!(param_value("name=a=b"), Some("a=b"));
        assert_eq!(param_value("go="), Some(""));
        assert_eq!(param_value("shrink"), None);
    }

    #[test]
    #[serial]
    fn test_apply_is_idempotent() {
        let (_, once) = applied(&["nocgo"]);
        let (_, twice) = applied(&["nocgo", "nocgo"]);
        assert_eq!(once.render(), twice.render());
        assert_eq!(twice.environment(), &["CGO_ENABLED=0"]);
        cleanup_env();
    }

    #[test]
    #[serial]
    fn test_last_os_trait_wins() {
        let (_, cfg) = applied(&["linux", "windows"]);
        assert_eq!(cfg.target_os(), "windows");

        let (_, cfg) = applied(&["windows", "linux"]);
        assert_eq!(cfg.target_os(), "linux");
        assert_eq!(std::env::var("GOOS").unwrap(), "linux");
        cleanup_env();
    }

    #[test]
    fn test_release_matches_constituents() {
        let (registry, release) = applied(&["release"]);
        let (_, direct) = applied(&["shrink", "version", "static", "rebuild", "trimpath"]);
        assert_eq!(release.render(), direct.render());
        assert_eq!(
            registry.applied_names(),
            &["release", "shrink", "version", "static", "rebuild", "trimpath"]
        );
    }

    #[test]
    fn test_version_injects_variables() {
        let (_, cfg) = applied(&["version"]);
        let flags = cfg.link_flags();
        assert_eq!(flags.len(), 8);
        assert_eq!(flags[0], "-X");
        assert_eq!(flags[1], format!("main.timestamp={}", cfg.timestamp()));
        assert_eq!(flags[3], "main.version=v1.2.3");
        assert_eq!(flags[5], format!("main.buildGOOS={}", host_os()));
        assert_eq!(flags[7], format!("main.buildGOARCH={}", host_arch()));
    }

    #[test]
    fn test_override_discards_accumulated_flags() {
        let (_, cfg) = applied(&["shrink", "ldflags=-s"]);
        assert_eq!(cfg.link_flags(), &["-s"]);

        let (_, cfg) = applied(&["race", "rebuild", "buildflags=-v -x"]);
        assert_eq!(cfg.build_flags(), &["-v -x"]);

        let (_, cfg) = applied(&["gcflags=all=-N -l"]);
        assert_eq!(cfg.render().command, vec!["go", "build", "-gcflags", "all=-N -l"]);
    }

    #[test]
    fn test_empty_override_clears() {
        let (_, cfg) = applied(&["shrink", "ldflags="]);
        assert!(cfg.link_flags().is_empty());
        assert_eq!(cfg.render().command, vec!["go", "build"]);
    }

    #[test]
    fn test_later_flags_accumulate_after_override() {
        let (_, cfg) = applied(&["ldflags=-s", "static"]);
        assert_eq!(cfg.link_flags(), &["-s", "-extldflags", "\"-static\""]);
    }

    #[test]
    fn test_validate_reports_all_invalid() {
        let registry = TraitRegistry::builtin().unwrap();
        let err = registry.validate(&["foo", "bar", "release"]).unwrap_err();
        assert_eq!(
            err,
            TraitError::Invalid {
                names: vec!["foo".to_string(), "bar".to_string()]
            }
        );
        assert_eq!(err.to_string(), "Invalid traits: foo, bar");
    }

    #[test]
    fn test_validate_singular_and_duplicates() {
        let registry = TraitRegistry::builtin().unwrap();
        let err = registry.validate(&["foo", "foo=1", "foo"]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid traits: foo, foo=");

        let err = registry.validate(&["shrink", "nope"]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid trait: nope");
    }

    #[test]
    fn test_validate_accepts_known() {
        let registry = TraitRegistry::builtin().unwrap();
        assert!(registry
            .validate(&["release", "ldflags=-s -w", "name=%n-x", "go=/opt/go"])
            .is_ok());
        assert!(registry.validate::<&str>(&[]).is_ok());
    }

    #[test]
    fn test_simple_trait_with_value_is_invalid() {
        let registry = TraitRegistry::builtin().unwrap();
        assert!(registry.validate(&["shrink=1"]).is_err());
    }

    #[test]
    fn test_apply_unknown_is_error() {
        let mut registry = TraitRegistry::builtin().unwrap();
        let mut cfg = config();
        let err = registry.apply(&mut cfg, &["nope"]).unwrap_err();
        assert_eq!(err, TraitError::Unknown("nope".to_string()));
    }

    #[test]
    #[serial]
    fn test_windowsgui() {
        let (registry, cfg) = applied(&["windowsgui", "windows"]);
        assert_eq!(cfg.target_os(), "windows");
        assert_eq!(cfg.link_flags(), &["-H", "windowsgui"]);
        assert_eq!(cfg.environment(), &["GOOS=windows"]);
        assert_eq!(registry.applied_names(), &["windowsgui", "windows"]);
        cleanup_env();
    }

    #[test]
    fn test_scalar_traits() {
        let (_, cfg) = applied(&["install", "go=/opt/go/bin/go", "package"]);
        assert_eq!(cfg.subcommand(), Subcommand::Install);
        assert_eq!(cfg.tool(), "/opt/go/bin/go");
        assert!(cfg.package_requested());
        assert_eq!(cfg.render().command, vec!["/opt/go/bin/go", "install"]);
    }

    #[test]
    fn test_parameterized_applies_once() {
        let (_, cfg) = applied(&["go=first", "go=second"]);
        assert_eq!(cfg.tool(), "first");
    }

    #[test]
    fn test_missing_value() {
        let mut registry = TraitRegistry::builtin().unwrap();
        let mut cfg = config();
        assert_eq!(
            registry.apply(&mut cfg, &["go="]).unwrap_err(),
            TraitError::MissingValue("go=".to_string())
        );
    }

    #[test]
    fn test_name_template() {
        let (_, cfg) = applied(&["name=%n-server", "verbose"]);
        assert_eq!(cfg.binary_name(), "tool-server");
        assert_eq!(cfg.build_flags(), &["-o", "tool-server", "-v"]);
    }

    #[test]
    fn test_register_rejects_bad_definitions() {
        let mut registry = TraitRegistry::builtin().unwrap();
        assert_eq!(
            registry.register("shrink", "", TraitKind::Simple(Effect::RequestPackage)),
            Err(TraitError::Duplicate("shrink".to_string()))
        );
        assert_eq!(
            registry.register("opt=", "", TraitKind::Simple(Effect::RequestPackage)),
            Err(TraitError::KindMismatch("opt=".to_string()))
        );
        assert_eq!(
            registry.register("opt", "", TraitKind::Parameterized(ParamEffect::ToolBinary)),
            Err(TraitError::KindMismatch("opt".to_string()))
        );
        assert_eq!(
            registry.register("a=b=", "", TraitKind::Parameterized(ParamEffect::ToolBinary)),
            Err(TraitError::KindMismatch("a=b=".to_string()))
        );
    }

    #[test]
    fn test_cyclic_composites_terminate() {
        let mut registry = TraitRegistry::new();
        registry
            .register("ping", "", TraitKind::composite(&["pong", "race"]))
            .unwrap();
        registry
            .register("pong", "", TraitKind::composite(&["ping", "rebuild"]))
            .unwrap();
        registry
            .register("race", "", TraitKind::Simple(Effect::BuildFlags(&["-race"])))
            .unwrap();
        registry
            .register("rebuild", "", TraitKind::Simple(Effect::BuildFlags(&["-a"])))
            .unwrap();

        let mut cfg = config();
        registry.apply(&mut cfg, &["ping", "pong"]).unwrap();
        assert_eq!(cfg.build_flags(), &["-a", "-race"]);
        assert_eq!(registry.applied_names(), &["ping", "pong", "rebuild", "race"]);
    }

    #[test]
    fn test_expansion_depth_bound() {
        let mut registry = TraitRegistry::new();
        let depth = MAX_EXPANSION_DEPTH + 2;
        for i in 0..depth {
            let next = format!("level{}", i + 1);
            registry
                .register(format!("level{}", i), "", TraitKind::composite(&[next.as_str()]))
                .unwrap();
        }
        registry
            .register(
                format!("level{}", depth),
                "",
                TraitKind::Simple(Effect::RequestPackage),
            )
            .unwrap();

        let mut cfg = config();
        let err = registry.apply(&mut cfg, &["level0"]).unwrap_err();
        assert!(matches!(err, TraitError::RecursionLimit { .. }));
    }

    #[test]
    fn test_builtin_listing_order() {
        let mut registry = TraitRegistry::builtin().unwrap();
        let names: Vec<&str> = registry.traits().map(|t| t.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"nocgo"));
        assert_eq!(names.last(), Some(&"name="));
        assert_eq!(names.len(), 21);
        assert!(registry
            .traits()
            .all(|t| t.kind.is_parameterized() == t.name.ends_with(PARAM_DELIMITER)));

        assert_eq!(
            registry.register("release", "again", TraitKind::Simple(Effect::InjectVersion)),
            Err(TraitError::Duplicate("release".to_string()))
        );
    }
}
