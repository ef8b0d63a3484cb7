//! Shared types for the vSphere SOAP client.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection / Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for talking to a vCenter SOAP endpoint (`/sdk`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VsphereConfig {
    /// vCenter hostname / IP (e.g. "vcenter.lab.local")
    pub host: String,
    /// Port (default 443)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login user; required only once the server asks for authentication
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Skip TLS certificate verification (self-signed labs)
    #[serde(default)]
    pub insecure: bool,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Lower bound of the random delay before each request
    #[serde(default = "default_jitter_min")]
    pub jitter_min_ms: u64,
    /// Upper bound of the random delay before each request
    #[serde(default = "default_jitter_max")]
    pub jitter_max_ms: u64,
    /// Maximum number of pages fetched per retrieval, first page included
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    /// Datacenter used to scope `FindByIp` / `FindByDnsName`
    #[serde(default = "default_datacenter_moid")]
    pub datacenter_moid: String,
    /// Datacenter name used as the `FindByInventoryPath` prefix
    #[serde(default = "default_datacenter_name")]
    pub datacenter_name: String,
    /// Validate a cached cookie with a `currentSession` query first
    #[serde(default = "default_true")]
    pub preheat_session: bool,
    /// Host used for vSphere Client deep links (defaults to `host`)
    #[serde(default)]
    pub ui_host: Option<String>,
}

fn default_port() -> u16 { 443 }
fn default_timeout() -> u64 { 30 }
fn default_jitter_min() -> u64 { 50 }
fn default_jitter_max() -> u64 { 250 }
fn default_page_limit() -> usize { 200 }
fn default_datacenter_moid() -> String { "datacenter-2".into() }
fn default_datacenter_name() -> String { "Datacenter".into() }
fn default_true() -> bool { true }

impl Default for VsphereConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: None,
            password: None,
            insecure: false,
            timeout_secs: default_timeout(),
            jitter_min_ms: default_jitter_min(),
            jitter_max_ms: default_jitter_max(),
            page_limit: default_page_limit(),
            datacenter_moid: default_datacenter_moid(),
            datacenter_name: default_datacenter_name(),
            preheat_session: true,
            ui_host: None,
        }
    }
}

impl VsphereConfig {
    /// Resolve configuration from `VSPHERE_*` environment variables.
    ///
    /// Returns `None` when `VSPHERE_HOST` is unset.
    pub fn from_environment() -> Option<Self> {
        let host = std::env::var("VSPHERE_HOST").ok()?;
        let mut config = Self {
            host,
            username: std::env::var("VSPHERE_USERNAME").ok(),
            password: std::env::var("VSPHERE_PASSWORD").ok(),
            ..Self::default()
        };
        if let Some(port) = std::env::var("VSPHERE_PORT").ok().and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        if let Ok(v) = std::env::var("VSPHERE_INSECURE") {
            config.insecure = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Ok(dc) = std::env::var("VSPHERE_DATACENTER") {
            config.datacenter_moid = dc;
        }
        if let Ok(name) = std::env::var("VSPHERE_DATACENTER_NAME") {
            config.datacenter_name = name;
        }
        Some(config)
    }

    /// Username / password pair, if both are configured and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }

    /// SOAP endpoint URL.
    pub fn sdk_url(&self) -> String {
        format!("https://{}:{}/sdk", self.host, self.port)
    }

    /// Host used when building vSphere Client links.
    pub fn ui_host(&self) -> &str {
        self.ui_host.as_deref().unwrap_or(&self.host)
    }

    /// Password-free view for logging / display.
    pub fn safe(&self) -> VsphereConfigSafe {
        VsphereConfigSafe {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            insecure: self.insecure,
        }
    }
}

/// Config view without the password.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VsphereConfigSafe {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub insecure: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Managed objects
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Object type a property retrieval starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    Folder,
    Datacenter,
}

impl RootKind {
    /// Infer the kind from a MOID (`datacenter-21` vs `group-v4`).
    pub fn from_moid(moid: &str) -> Self {
        if moid.starts_with("datacenter-") {
            Self::Datacenter
        } else {
            Self::Folder
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "Folder",
            Self::Datacenter => "Datacenter",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VM Power State
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum VmPowerState {
    PoweredOn,
    #[default]
    PoweredOff,
    Suspended,
}

impl VmPowerState {
    /// Parse the vim25 `VirtualMachinePowerState` value.
    ///
    /// Anything unrecognised (including an absent property) counts as off.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "poweredOn" => Self::PoweredOn,
            "suspended" => Self::Suspended,
            _ => Self::PoweredOff,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Inventory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A VM folder. Its parent is found by reverse lookup, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    /// Child MOIDs in server order (VMs and sub-folders mixed)
    pub children: Vec<String>,
}

/// Hardware item rendered from `config.hardware.device`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Icon hint: "disk", "network", "cdrom", "floppy", "usb", "serial"
    pub icon: String,
    pub label: String,
    pub properties: Vec<DeviceProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProperty {
    pub label: String,
    pub value: String,
}

impl DeviceProperty {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vm {
    pub id: String,
    pub name: String,
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub cpu_cores: u32,
    pub ram_mb: u64,
    pub power_state: VmPowerState,
    pub guest_os: String,
    pub devices: Vec<Device>,
}

/// Everything one full traversal produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub folders: Vec<Folder>,
    pub vms: Vec<Vm>,
    /// `content.about.instanceUuid` of the vCenter
    pub instance_uuid: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Public views
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Folder as handed to the application (carries its resolved parent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyFolder {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub children: Vec<String>,
}

/// VM as handed to the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyVm {
    #[serde(flatten)]
    pub vm: Vm,
    pub parent_id: Option<String>,
    /// vSphere Client deep link, when the instance UUID is known
    pub url: Option<String>,
}

/// Result of `fetch_topology`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    pub routers: Vec<TopologyFolder>,
    pub vms: Vec<TopologyVm>,
}

/// Recursive folder structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderTree {
    pub id: String,
    pub name: String,
    pub children: Vec<FolderTree>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VM detail
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `{ id, name }` pair for a related managed object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub id: String,
    pub name: String,
}

/// One entry of `guest.net`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestNic {
    pub network: Option<String>,
    pub mac_address: Option<String>,
    pub connected: bool,
    pub ip_addresses: Vec<String>,
}

/// Flattened snapshot tree node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created: Option<String>,
    pub state: Option<String>,
    pub parent_id: Option<String>,
    pub is_current: bool,
}

/// Caller-facing detail record for one VM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmDetail {
    pub id: String,
    pub name: String,
    pub power_state: VmPowerState,
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub guest_os: String,
    pub cpu_cores: u32,
    pub ram_mb: u64,
    pub host: Option<ObjectRef>,
    pub cluster: Option<ObjectRef>,
    pub networks: Vec<GuestNic>,
    pub devices: Vec<Device>,
    pub snapshots: Vec<SnapshotEntry>,
}

/// Lookup keys for `fetch_host`; any combination may be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostQuery {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub moid: Option<String>,
}
