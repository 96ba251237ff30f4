use anyhow::Context as _;
use clap::Parser;
use json_patch::PatchOperation;
use rocket::figment::Figment;
use std::{collections::BTreeMap, net::IpAddr, path::PathBuf};
use webhook::switches::{ControlSwitches, DEFAULT_RESOURCE_NAME_KEY};

#[derive(Debug, Parser)]
#[command(name = "sriov-injector", about = "Network resources injector admission webhook")]
pub struct Args {
    #[arg(long, env = "WEBHOOK_ADDRESS", default_value = "0.0.0.0")]
    pub address: IpAddr,
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = 8443)]
    pub port: u16,
    #[arg(long, env = "TLS_CERT_FILE", required_unless_present = "insecure")]
    pub tls_cert_file: Option<PathBuf>,
    #[arg(long, env = "TLS_PRIVATE_KEY_FILE", required_unless_present = "insecure")]
    pub tls_private_key_file: Option<PathBuf>,
    /// Serve plain HTTP
    #[arg(long)]
    pub insecure: bool,
    #[arg(long)]
    pub disable_mutation: bool,
    #[arg(long)]
    pub disable_validation: bool,
    /// Annotation key whose injected value overrides the pod's network selections
    #[arg(long, env = "USER_DEFINED_NETWORK_KEY", default_value = "")]
    pub user_defined_network_key: String,
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_RESOURCE_NAME_KEY)]
    pub resource_name_keys: Vec<String>,
    /// Add injected counts to resources the container already requests
    #[arg(long)]
    pub honor_resources: bool,
    /// YAML map of pod label key to JSON patch operation
    #[arg(long, env = "USER_DEFINED_INJECTIONS")]
    pub user_defined_injections: Option<PathBuf>,
}

#[derive(serde::Serialize)]
pub struct TlsSettings {
    pub certs: PathBuf,
    pub key: PathBuf,
}

impl Args {
    pub fn control_switches(&self) -> anyhow::Result<ControlSwitches> {
        let switches = ControlSwitches {
            enable_mutation: !self.disable_mutation,
            enable_validation: !self.disable_validation,
            user_defined_network_key: self.user_defined_network_key.clone(),
            resource_name_keys: self.resource_name_keys.clone(),
            honor_resources: self.honor_resources,
            ..Default::default()
        };
        match &self.user_defined_injections {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let injections = parse_injections(&raw).with_context(|| {
                    format!("invalid user-defined injections in {}", path.display())
                })?;
                switches.with_injections(injections)
            }
            None => Ok(switches),
        }
    }

    pub fn tls(&self) -> Option<TlsSettings> {
        if self.insecure {
            return None;
        }
        Some(TlsSettings {
            certs: self.tls_cert_file.clone()?,
            key: self.tls_private_key_file.clone()?,
        })
    }

    pub fn figment(&self) -> Figment {
        let figment = rocket::Config::figment()
            .merge(("address", self.address))
            .merge(("port", self.port));
        match self.tls() {
            Some(tls) => figment.merge(("tls", tls)),
            None => figment,
        }
    }
}

pub fn parse_injections(raw: &str) -> anyhow::Result<BTreeMap<String, PatchOperation>> {
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_yaml::from_str(raw)?)
}
