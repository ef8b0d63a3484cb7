//! Decoding of `ObjectContent` elements shared by every assembler.
//!
//! Absent properties come back as `None` / empty; nothing here fails on a
//! well-formed document.

use crate::error::VsphereResult;
use crate::types::{Device, DeviceProperty};
use crate::xml::XmlElement;

/// Parse every raw page up front; a page that is not XML is fatal.
pub fn parse_pages(pages: &[String]) -> VsphereResult<Vec<XmlElement>> {
    pages.iter().map(|p| XmlElement::parse(p)).collect()
}

/// One `objects` entry: `obj` reference plus `propSet` name/val pairs.
#[derive(Debug, Clone)]
pub struct ObjectContent<'a> {
    /// Managed object type from the `obj` `type` attribute
    pub kind: String,
    pub moid: String,
    props: Vec<(String, &'a XmlElement)>,
}

impl<'a> ObjectContent<'a> {
    fn from_element(el: &'a XmlElement) -> Option<Self> {
        let obj = el.first_child_by_local_name("obj", 1)?;
        let moid = obj.text().trim().to_string();
        if moid.is_empty() {
            return None;
        }
        let kind = obj.attr("type").unwrap_or_default().to_string();
        let props = el
            .children_named("propSet")
            .filter_map(|ps| {
                let name = ps.child_text("name")?;
                let val = ps.first_child_by_local_name("val", 1)?;
                Some((name, val))
            })
            .collect();
        Some(Self { kind, moid, props })
    }

    /// Raw `val` element of a property.
    pub fn prop(&self, name: &str) -> Option<&'a XmlElement> {
        self.props.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    /// Trimmed text of a scalar property, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<String> {
        self.prop(name)
            .map(|v| v.text().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn number<N: std::str::FromStr + Default>(&self, name: &str) -> N {
        self.text(name).and_then(|s| s.parse().ok()).unwrap_or_default()
    }

    /// A single `ManagedObjectReference` property as `(type, moid)`.
    pub fn reference(&self, name: &str) -> Option<(String, String)> {
        let val = self.prop(name)?;
        let moid = val.text().trim().to_string();
        if moid.is_empty() {
            return None;
        }
        Some((val.attr("type").unwrap_or_default().to_string(), moid))
    }

    /// An `ArrayOfManagedObjectReference` property as MOIDs in order.
    ///
    /// A bare single reference is accepted too.
    pub fn references(&self, name: &str) -> Vec<String> {
        let Some(val) = self.prop(name) else {
            return Vec::new();
        };
        if val.elements().next().is_none() {
            let moid = val.text().trim().to_string();
            return if moid.is_empty() { Vec::new() } else { vec![moid] };
        }
        val.elements()
            .map(|e| e.text().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// All `objects` entries across the parsed pages, in page order.
pub fn objects<'a>(docs: &'a [XmlElement]) -> Vec<ObjectContent<'a>> {
    docs.iter()
        .flat_map(|d| d.elements_by_local_name("objects"))
        .filter_map(ObjectContent::from_element)
        .collect()
}

// ── Hardware devices ────────────────────────────────────────────────

const NIC_TYPES: &[&str] = &[
    "VirtualE1000",
    "VirtualE1000e",
    "VirtualPCNet32",
    "VirtualVmxnet",
    "VirtualVmxnet2",
    "VirtualVmxnet3",
    "VirtualVmxnet3Vrdma",
    "VirtualSriovEthernetCard",
];

fn icon_for(ty: &str, device: &XmlElement) -> Option<&'static str> {
    match ty {
        "VirtualDisk" => Some("disk"),
        "VirtualCdrom" => Some("cdrom"),
        "VirtualFloppy" => Some("floppy"),
        "VirtualUSB" => Some("usb"),
        "VirtualSerialPort" => Some("serial"),
        t if NIC_TYPES.contains(&t) => Some("network"),
        _ if device.first_child_by_local_name("macAddress", 1).is_some() => Some("network"),
        _ => None,
    }
}

/// Coerce `config.hardware.device` (array or single device) into
/// renderable [`Device`]s. Controllers, input and video devices are skipped.
pub fn devices(val: Option<&XmlElement>) -> Vec<Device> {
    let Some(val) = val else {
        return Vec::new();
    };
    let single = val.first_child_by_local_name("deviceInfo", 1).is_some();
    let items: Vec<&XmlElement> = if single {
        vec![val]
    } else {
        val.elements().collect()
    };
    items.into_iter().filter_map(device).collect()
}

fn device(el: &XmlElement) -> Option<Device> {
    let ty = el.xsi_type().unwrap_or_default();
    let icon = icon_for(ty, el)?;
    let info = el.first_child_by_local_name("deviceInfo", 1);
    let label = info
        .and_then(|i| i.child_text("label"))
        .unwrap_or_else(|| ty.trim_start_matches("Virtual").to_string());
    let summary = info.and_then(|i| i.child_text("summary"));
    let backing = el.first_child_by_local_name("backing", 1);
    let connected = el
        .first_child_by_local_name("connectable", 1)
        .and_then(|c| c.child_text("connected"));

    let mut properties = Vec::new();
    let mut push = |label: &str, value: Option<String>| {
        if let Some(v) = value {
            properties.push(DeviceProperty::new(label, v));
        }
    };

    match icon {
        "disk" => {
            let kb = el
                .child_text("capacityInKB")
                .and_then(|s| s.parse::<u64>().ok())
                .or_else(|| {
                    el.child_text("capacityInBytes")
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(|b| b / 1024)
                });
            push("Capacity", kb.map(format_capacity_kb));
            push("File", backing.and_then(|b| b.child_text("fileName")));
            push("Mode", backing.and_then(|b| b.child_text("diskMode")));
            push(
                "Thin provisioned",
                backing.and_then(|b| b.child_text("thinProvisioned")).map(yes_no),
            );
        }
        "network" => {
            let adapter = ty.trim_start_matches("Virtual");
            push("Adapter", Some(adapter.to_string()).filter(|s| !s.is_empty()));
            push("MAC address", el.child_text("macAddress"));
            push("Network", summary);
            push("Connected", connected.map(yes_no));
        }
        _ => {
            push("Summary", summary);
            push("Connected", connected.map(yes_no));
        }
    }

    Some(Device {
        icon: icon.to_string(),
        label,
        properties,
    })
}

fn yes_no(v: String) -> String {
    if v.eq_ignore_ascii_case("true") { "Yes" } else { "No" }.to_string()
}

/// `16777216` KB → `16.0 GB`; small disks stay in MB.
pub fn format_capacity_kb(kb: u64) -> String {
    if kb >= 1024 * 1024 {
        format!("{:.1} GB", kb as f64 / (1024.0 * 1024.0))
    } else {
        format!("{} MB", kb / 1024)
    }
}
