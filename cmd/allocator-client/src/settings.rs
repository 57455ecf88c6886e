use anyhow::{Context, bail};
use clap::{ArgAction, Args};
use pkg_constants::env;
use pkg_constants::paths::DEFAULT_CLIENT_CONFIG;
use pkg_types::allocation::MetaPatch;
use pkg_types::config::ClientConfigFile;
use std::collections::BTreeMap;
use std::path::Path;

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Path to YAML config file
    #[arg(long, global = true, default_value = DEFAULT_CLIENT_CONFIG)]
    pub config: String,

    /// Client certificate (PEM)
    #[arg(long, global = true, env = env::CLIENT_CERT)]
    pub cert: Option<String>,

    /// Client private key (PEM)
    #[arg(long, global = true, env = env::CLIENT_KEY)]
    pub key: Option<String>,

    /// CA bundle used to verify the allocator (PEM)
    #[arg(long, global = true, env = env::CA_CERT)]
    pub ca_cert: Option<String>,

    /// Allocator endpoints, comma separated
    #[arg(long, global = true, env = env::HOSTS, value_delimiter = ',')]
    pub hosts: Vec<String>,

    /// One probe target per host, in the same order
    #[arg(long, global = true, env = env::PING_SERVERS, value_delimiter = ',')]
    pub ping_servers: Vec<String>,

    /// Game server namespace
    #[arg(short, long, global = true, env = env::NAMESPACE)]
    pub namespace: Option<String>,

    /// Allow allocation from other clusters
    #[arg(short, long, global = true)]
    pub multicluster: bool,

    /// Required game server labels, `key=value` comma separated
    #[arg(long, global = true, value_delimiter = ',', value_parser = parse_key_val)]
    pub labels: Vec<(String, String)>,

    /// Labels set on the allocated game server
    #[arg(long, global = true, value_delimiter = ',', value_parser = parse_key_val)]
    pub patch_labels: Vec<(String, String)>,

    /// Annotations set on the allocated game server
    #[arg(long, global = true, value_delimiter = ',', value_parser = parse_key_val)]
    pub patch_annotations: Vec<(String, String)>,

    /// Retries after a failed allocation; 0 disables retrying
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {:?}", s))?;
    if k.is_empty() {
        return Err(format!("empty key in {:?}", s));
    }
    Ok((k.to_string(), v.to_string()))
}

/// Client settings after merging flags, environment and config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub cert: String,
    pub key: String,
    pub ca_cert: String,
    pub hosts: Vec<String>,
    pub ping_servers: Vec<String>,
    pub namespace: String,
    pub multicluster: bool,
    pub labels: BTreeMap<String, String>,
    pub meta_patch: MetaPatch,
    pub max_retries: u32,
}

impl Settings {
    /// Merge: CLI args > env > config file > defaults, then validate.
    pub fn resolve(args: &ClientArgs, file: ClientConfigFile) -> anyhow::Result<Self> {
        let pairs = |v: &[(String, String)], fallback: Option<BTreeMap<String, String>>| {
            if v.is_empty() {
                fallback.unwrap_or_default()
            } else {
                v.iter().cloned().collect()
            }
        };
        let list = |v: &[String], fallback: Option<Vec<String>>| {
            let v: Vec<String> = v.iter().filter(|s| !s.is_empty()).cloned().collect();
            if v.is_empty() {
                fallback.unwrap_or_default()
            } else {
                v
            }
        };

        let settings = Self {
            cert: args.cert.clone().or(file.cert).unwrap_or_default(),
            key: args.key.clone().or(file.key).unwrap_or_default(),
            ca_cert: args.ca_cert.clone().or(file.ca_cert).unwrap_or_default(),
            hosts: list(&args.hosts, file.hosts),
            ping_servers: list(&args.ping_servers, file.ping_servers),
            namespace: args
                .namespace
                .clone()
                .or(file.namespace)
                .unwrap_or_default(),
            multicluster: args.multicluster || file.multicluster.unwrap_or(false),
            labels: pairs(&args.labels, file.labels),
            meta_patch: MetaPatch {
                labels: pairs(&args.patch_labels, file.patch_labels),
                annotations: pairs(&args.patch_annotations, file.patch_annotations),
            },
            max_retries: args
                .max_retries
                .or(file.max_retries)
                .unwrap_or(pkg_constants::retry::DEFAULT_MAX_RETRIES),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.namespace.is_empty() {
            bail!("namespace must be set (--namespace or {})", env::NAMESPACE);
        }
        if self.hosts.is_empty() {
            bail!("you must pass at least one host (--hosts or {})", env::HOSTS);
        }
        if !self.ping_servers.is_empty() && self.ping_servers.len() != self.hosts.len() {
            bail!(
                "ping-servers must have one entry per host ({} hosts, {} ping servers)",
                self.hosts.len(),
                self.ping_servers.len()
            );
        }
        for (flag, path) in [
            ("cert", &self.cert),
            ("key", &self.key),
            ("ca-cert", &self.ca_cert),
        ] {
            if path.is_empty() {
                bail!("--{} is required", flag);
            }
            if !Path::new(path).exists() {
                bail!("--{} file {} does not exist", flag, path);
            }
        }
        Ok(())
    }

    /// Read `(cert, key, ca)` PEM bytes from disk.
    pub fn read_credentials(&self) -> anyhow::Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
        let read = |path: &str| {
            std::fs::read(path).with_context(|| format!("failed to read {}", path))
        };
        Ok((read(&self.cert)?, read(&self.key)?, read(&self.ca_cert)?))
    }
}
