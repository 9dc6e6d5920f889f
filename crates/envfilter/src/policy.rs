//! Policy definition, compilation, and application

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EnvFilterError, Result};

/// Names that are never captured, regardless of policy
///
/// Shell bookkeeping and our own temporaries carry no context worth
/// indexing and change on every prompt.
const ABSOLUTE_DENY_PATTERNS: &[&str] = &[
    r"^___RECAP_",
    r"^__",
    r"^BASH_FUNC_",
    r"^_$",
    r"^PS[1-4]$",
    r"^TERM$",
    r"^LINES$",
    r"^COLUMNS$",
    r"^HIST",
    r"^IFS$",
    r"^OPT",
    r"^RANDOM$",
    r"^SECONDS$",
    r"^BASH_",
    r"^FUNCNAME$",
    r"^PIPESTATUS$",
    r"^REPLY$",
    r"^SHELLOPTS$",
    r"^BASHOPTS$",
    r"RECAPROOT",
];

/// Name fragments that mark a value as sensitive (hash instead of keep)
const SENSITIVE_PATTERNS: &[&str] = &[
    r"(?i)password",
    r"(?i)secret",
    r"(?i)key",
    r"(?i)token",
    r"(?i)auth",
    r"(?i)credential",
    r"(?i)private",
    r"(?i)session",
    r"(?i)cookie",
    r"(?i)cert",
    r"(?i)ssl",
    r"(?i)tls",
    r"(?i)oauth",
    r"(?i)jwt",
    r"(?i)bearer",
    r"(?i)access",
    r"(?i)refresh",
    r"(?i)salt",
    r"(?i)hash",
    r"(?i)signature",
    r"(?i)license",
    r"(?i)serial",
    r"(?i)url",
    r"(?i)dsn",
    r"(?i)connection",
    r"(?i)endpoint",
];

/// Exact names and name patterns, as written in the policy file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NameSet {
    /// Case-sensitive exact matches
    pub exact: Vec<String>,
    /// Regex patterns over variable names
    pub patterns: Vec<String>,
}

/// The on-disk policy shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyFile {
    /// Variables worth capturing
    pub allowlist: NameSet,
    /// `exact`: never captured. `patterns`: captured but hashed.
    pub denylist: NameSet,
    /// Hash allowed variables whose names match the built-in sensitive
    /// patterns. Disabling this keeps them in plaintext.
    pub hash_sensitive_values: bool,
    /// Policy version stamped into events as `_config_version`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Default for PolicyFile {
    fn default() -> Self {
        Self {
            allowlist: NameSet {
                exact: [
                    // Session context
                    "PWD",
                    "OLDPWD",
                    "USER",
                    "HOME",
                    "SHELL",
                    "LANG",
                    "LC_ALL",
                    "TZ",
                    "EDITOR",
                    "PAGER",
                    "BROWSER",
                    "TMPDIR",
                    "XDG_CONFIG_HOME",
                    "XDG_DATA_HOME",
                    "XDG_CACHE_HOME",
                    // Runtime environment indicators
                    "NODE_ENV",
                    "RAILS_ENV",
                    "DJANGO_SETTINGS_MODULE",
                    "FLASK_ENV",
                    "ENVIRONMENT",
                    "ENV",
                    "STAGE",
                    "DEPLOY_ENV",
                    // Toolchain managers
                    "RBENV_VERSION",
                    "PYENV_VERSION",
                    "NVM_CURRENT",
                    "JAVA_HOME",
                    "GOPATH",
                    "GOROOT",
                    "CARGO_HOME",
                    "RUSTUP_HOME",
                    // Cloud context
                    "AWS_PROFILE",
                    "AWS_REGION",
                    "GOOGLE_CLOUD_PROJECT",
                    "AZURE_RESOURCE_GROUP",
                    // Containers and orchestration
                    "DOCKER_HOST",
                    "KUBERNETES_NAMESPACE",
                    "KUBECTL_CONTEXT",
                    // CI indicators
                    "CI",
                    "GITHUB_ACTIONS",
                    "JENKINS_URL",
                    "GITLAB_CI",
                    "TRAVIS",
                    "CIRCLECI",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                patterns: [
                    r"^[A-Z_]+_ENV$",
                    r"^[A-Z_]+_ENVIRONMENT$",
                    r"^[A-Z_]+_STAGE$",
                    r"^[A-Z_]+_PROFILE$",
                    r"^[A-Z_]+_NAMESPACE$",
                    r"^[A-Z_]+_CLUSTER$",
                    r"^[A-Z_]+_REGION$",
                    r"^[A-Z_]+_ZONE$",
                    r"^[A-Z_]+_BRANCH$",
                    r"^[A-Z_]+_VERSION$",
                    r"^[A-Z_]+_PATH$",
                    r"^[A-Z_]+_HOME$",
                    r"^[A-Z_]+_ROOT$",
                    r"^[A-Z_]+_CONFIG$",
                    r"^[A-Z_]+_URL$",
                    r"^[A-Z_]+_HOST$",
                    r"^[A-Z_]+_PORT$",
                    r"^[A-Z_]+_KEY$",
                    r"^GIT_",
                    r"^DOCKER_",
                    r"^K8S_",
                    r"^KUBE_",
                    r"^HELM_",
                    r"^TERRAFORM_",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            },
            denylist: NameSet {
                exact: [
                    "_",
                    "PS1",
                    "PS2",
                    "PS3",
                    "PS4",
                    "TERM",
                    "LINES",
                    "COLUMNS",
                    "HISTFILE",
                    "HISTSIZE",
                    "HISTCONTROL",
                    "HISTTIMEFORMAT",
                    "IFS",
                    "OPTIND",
                    "OPTARG",
                    "OPTERR",
                    "RANDOM",
                    "SECONDS",
                    "BASH_VERSINFO",
                    "BASH_VERSION",
                    "PIPESTATUS",
                    "REPLY",
                    "SHELLOPTS",
                    "BASHOPTS",
                    "RECAPROOT",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                patterns: Vec::new(),
            },
            hash_sensitive_values: true,
            version: None,
        }
    }
}

/// What to do with one environment variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Not captured at all
    Drop,
    /// Captured with its value verbatim
    Keep,
    /// Captured with its value replaced by a digest
    Hash,
}

/// A compiled capture policy, ready to apply
#[derive(Debug)]
pub struct EnvPolicy {
    allow_exact: HashSet<String>,
    allow_patterns: Vec<Regex>,
    deny_exact: HashSet<String>,
    deny_patterns: Vec<Regex>,
    absolute_deny: Vec<Regex>,
    sensitive: Vec<Regex>,
    hash_sensitive_values: bool,
    version: Option<String>,
}

impl EnvPolicy {
    /// Compile a policy file, validating every pattern up front
    pub fn compile(file: PolicyFile) -> Result<Self> {
        Ok(Self {
            allow_exact: file.allowlist.exact.into_iter().collect(),
            allow_patterns: compile_patterns(&file.allowlist.patterns)?,
            deny_exact: file.denylist.exact.into_iter().collect(),
            deny_patterns: compile_patterns(&file.denylist.patterns)?,
            absolute_deny: compile_builtin(ABSOLUTE_DENY_PATTERNS),
            sensitive: compile_builtin(SENSITIVE_PATTERNS),
            hash_sensitive_values: file.hash_sensitive_values,
            version: file.version,
        })
    }

    /// Load a policy
    ///
    /// With an explicit path, read errors are fatal. Without one, the
    /// default locations are tried in order and the built-in default is
    /// the final fallback.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let data = std::fs::read(path).map_err(|source| EnvFilterError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let file: PolicyFile =
                serde_json::from_slice(&data).map_err(|source| EnvFilterError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?;
            return Self::compile(file);
        }

        for candidate in default_policy_paths() {
            if let Ok(data) = std::fs::read(&candidate) {
                if let Ok(file) = serde_json::from_slice::<PolicyFile>(&data) {
                    return Self::compile(file);
                }
            }
        }

        Self::compile(PolicyFile::default())
    }

    /// Write the default policy as a starting point for customization
    pub fn write_default(path: &Path) -> Result<()> {
        let write_err = |source| EnvFilterError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(write_err)?;
        }
        let data = serde_json::to_vec_pretty(&PolicyFile::default())
            .expect("default policy serializes");
        std::fs::write(path, data).map_err(write_err)
    }

    /// The policy version, if the file declared one
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Decide what happens to a single variable
    pub fn disposition(&self, key: &str) -> Disposition {
        if self.absolute_deny.iter().any(|re| re.is_match(key)) {
            return Disposition::Drop;
        }
        if self.deny_exact.contains(key) {
            return Disposition::Drop;
        }

        let allowed = self.allow_exact.contains(key)
            || self.allow_patterns.iter().any(|re| re.is_match(key));
        if !allowed {
            return Disposition::Drop;
        }

        if self.deny_patterns.iter().any(|re| re.is_match(key)) {
            return Disposition::Hash;
        }
        if self.hash_sensitive_values && self.sensitive.iter().any(|re| re.is_match(key)) {
            return Disposition::Hash;
        }

        Disposition::Keep
    }

    /// Apply the policy to a raw environment snapshot
    pub fn filter<I>(&self, env: I) -> BTreeMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut captured = BTreeMap::new();
        for (key, value) in env {
            match self.disposition(&key) {
                Disposition::Drop => {}
                Disposition::Keep => {
                    captured.insert(key, value);
                }
                Disposition::Hash => {
                    captured.insert(key, digest_value(&value));
                }
            }
        }
        captured
    }
}

/// Short digest standing in for a sensitive value: `h8_` + 8 hex chars
pub fn digest_value(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    format!("h8_{:02x}{:02x}{:02x}{:02x}", digest[0], digest[1], digest[2], digest[3])
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| EnvFilterError::Pattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

fn compile_builtin(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).expect("built-in pattern compiles"))
        .collect()
}

fn default_policy_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        paths.push(home.join(".recap").join("env-policy.json"));
        paths.push(home.join(".config").join("recap").join("env-policy.json"));
    }
    paths.push(PathBuf::from("env-policy.json"));
    paths
}

#[cfg(test)]
#[path = "policy_test.rs"]
mod tests;
