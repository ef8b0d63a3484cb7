//! VM detail assembly: host / cluster ancestry, guest NICs, hardware and
//! snapshots.

use std::collections::{HashMap, HashSet};

use crate::error::VsphereResult;
use crate::props::{self, ObjectContent};
use crate::types::*;
use crate::xml::XmlElement;

struct HostInfo {
    name: String,
    parent: Option<(String, String)>,
}

/// Build one [`VmDetail`] per VirtualMachine object in the pages.
///
/// Works for a single scoped query as well as a root-scoped walk; host
/// and compute-resource objects may appear on any page.
pub fn assemble(pages: &[String]) -> VsphereResult<Vec<VmDetail>> {
    let docs = props::parse_pages(pages)?;
    let objects = props::objects(&docs);

    let mut hosts: HashMap<&str, HostInfo> = HashMap::new();
    let mut computes: HashMap<&str, String> = HashMap::new();
    for obj in &objects {
        match obj.kind.as_str() {
            "HostSystem" => {
                hosts.insert(
                    &obj.moid,
                    HostInfo {
                        name: obj.text("name").unwrap_or_default(),
                        parent: obj.reference("parent"),
                    },
                );
            }
            "ClusterComputeResource" | "ComputeResource" => {
                computes.insert(&obj.moid, obj.text("name").unwrap_or_default());
            }
            _ => {}
        }
    }

    let mut seen = HashSet::new();
    let details = objects
        .iter()
        .filter(|o| o.kind == "VirtualMachine")
        .filter(|o| seen.insert(o.moid.clone()))
        .map(|o| vm_detail(o, &hosts, &computes))
        .collect();
    Ok(details)
}

fn vm_detail(
    obj: &ObjectContent<'_>,
    hosts: &HashMap<&str, HostInfo>,
    computes: &HashMap<&str, String>,
) -> VmDetail {
    let host_id = obj.reference("runtime.host").map(|(_, id)| id);
    let host_info = host_id.as_deref().and_then(|id| hosts.get(id));

    let host = host_id.as_ref().map(|id| ObjectRef {
        id: id.clone(),
        name: host_info.map(|h| h.name.clone()).unwrap_or_default(),
    });
    let cluster = host_info
        .and_then(|h| h.parent.as_ref())
        .filter(|(ty, _)| ty == "ClusterComputeResource")
        .map(|(_, id)| ObjectRef {
            id: id.clone(),
            name: computes.get(id.as_str()).cloned().unwrap_or_default(),
        });

    VmDetail {
        id: obj.moid.clone(),
        name: obj.text("name").unwrap_or_default(),
        power_state: VmPowerState::parse(&obj.text("runtime.powerState").unwrap_or_default()),
        ip: obj.text("guest.ipAddress"),
        hostname: obj.text("guest.hostName"),
        guest_os: obj.text("config.guestFullName").unwrap_or_default(),
        cpu_cores: obj.number("config.hardware.numCPU"),
        ram_mb: obj.number("config.hardware.memoryMB"),
        host,
        cluster,
        networks: guest_nics(obj.prop("guest.net")),
        devices: props::devices(obj.prop("config.hardware.device")),
        snapshots: snapshots(obj.prop("snapshot")),
    }
}

fn guest_nics(val: Option<&XmlElement>) -> Vec<GuestNic> {
    let Some(val) = val else {
        return Vec::new();
    };
    let items: Vec<&XmlElement> = if val.first_child_by_local_name("macAddress", 1).is_some() {
        vec![val]
    } else {
        val.elements().collect()
    };
    items
        .into_iter()
        .map(|nic| GuestNic {
            network: nic.child_text("network"),
            mac_address: nic.child_text("macAddress"),
            connected: nic
                .child_text("connected")
                .map(|c| c.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            ip_addresses: nic
                .children_named("ipAddress")
                .map(|ip| ip.text().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
        .collect()
}

/// Flatten `VirtualMachineSnapshotInfo.rootSnapshotList` depth-first.
fn snapshots(val: Option<&XmlElement>) -> Vec<SnapshotEntry> {
    let Some(val) = val else {
        return Vec::new();
    };
    let current = val.child_text("currentSnapshot");
    let mut out = Vec::new();
    for root in val.children_named("rootSnapshotList") {
        walk_snapshot(root, None, current.as_deref(), &mut out);
    }
    out
}

fn walk_snapshot(
    node: &XmlElement,
    parent: Option<&str>,
    current: Option<&str>,
    out: &mut Vec<SnapshotEntry>,
) {
    // `name` and `snapshot` recur in every nested childSnapshotList; depth 1 only.
    let id = node.child_text("snapshot").unwrap_or_default();
    out.push(SnapshotEntry {
        is_current: current == Some(id.as_str()),
        id: id.clone(),
        name: node.child_text("name").unwrap_or_default(),
        description: node.child_text("description").unwrap_or_default(),
        created: node.child_text("createTime"),
        state: node.child_text("state"),
        parent_id: parent.map(str::to_string),
    });
    for child in node.children_named("childSnapshotList") {
        walk_snapshot(child, Some(id.as_str()), current, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    const VM: &str = r#"<objects><obj type="VirtualMachine">vm-42</obj>
<propSet><name>name</name><val xsi:type="xsd:string">web01</val></propSet>
<propSet><name>runtime.host</name><val type="HostSystem" xsi:type="ManagedObjectReference">host-12</val></propSet>
<propSet><name>runtime.powerState</name><val xsi:type="VirtualMachinePowerState">poweredOn</val></propSet>
<propSet><name>guest.ipAddress</name><val xsi:type="xsd:string">10.0.1.5</val></propSet>
<propSet><name>guest.hostName</name><val xsi:type="xsd:string">web01.lab.local</val></propSet>
<propSet><name>guest.net</name><val xsi:type="ArrayOfGuestNicInfo">
  <GuestNicInfo xsi:type="GuestNicInfo"><network>VM Network</network><ipAddress>10.0.1.5</ipAddress><ipAddress>fe80::250:56ff:feaa:bbcc</ipAddress><macAddress>00:50:56:aa:bb:cc</macAddress><connected>true</connected><deviceConfigId>4000</deviceConfigId></GuestNicInfo>
</val></propSet>
<propSet><name>snapshot</name><val xsi:type="VirtualMachineSnapshotInfo">
  <currentSnapshot type="VirtualMachineSnapshot">snapshot-3</currentSnapshot>
  <rootSnapshotList>
    <snapshot type="VirtualMachineSnapshot">snapshot-1</snapshot><vm type="VirtualMachine">vm-42</vm>
    <name>base</name><description>clean install</description><id>1</id><createTime>2024-03-01T10:00:00Z</createTime><state>poweredOff</state><quiesced>false</quiesced>
    <childSnapshotList>
      <snapshot type="VirtualMachineSnapshot">snapshot-3</snapshot><vm type="VirtualMachine">vm-42</vm>
      <name>pre-upgrade</name><description></description><id>3</id><createTime>2024-05-01T10:00:00Z</createTime><state>poweredOn</state><quiesced>false</quiesced>
    </childSnapshotList>
  </rootSnapshotList>
</val></propSet>
</objects>"#;

    const HOST: &str = r#"<objects><obj type="HostSystem">host-12</obj>
<propSet><name>name</name><val xsi:type="xsd:string">esx01.lab.local</val></propSet>
<propSet><name>parent</name><val type="ClusterComputeResource" xsi:type="ManagedObjectReference">domain-c7</val></propSet>
</objects>"#;

    const CLUSTER: &str = r#"<objects><obj type="ClusterComputeResource">domain-c7</obj>
<propSet><name>name</name><val xsi:type="xsd:string">Prod Cluster</val></propSet>
</objects>"#;

    #[test]
    fn assembles_detail_with_ancestry() {
        let pages = vec![
            retrieve_page(&[VM, HOST].concat(), Some("t")),
            continue_page(CLUSTER, None),
        ];
        let details = assemble(&pages).unwrap();
        assert_eq!(details.len(), 1);
        let d = &details[0];
        assert_eq!(d.id, "vm-42");
        assert_eq!(d.power_state, VmPowerState::PoweredOn);
        assert_eq!(d.hostname.as_deref(), Some("web01.lab.local"));
        assert_eq!(
            d.host,
            Some(ObjectRef { id: "host-12".into(), name: "esx01.lab.local".into() })
        );
        assert_eq!(
            d.cluster,
            Some(ObjectRef { id: "domain-c7".into(), name: "Prod Cluster".into() })
        );
    }

    #[test]
    fn guest_network_is_decoded() {
        let details = assemble(&[retrieve_page(VM, None)]).unwrap();
        let nics = &details[0].networks;
        assert_eq!(nics.len(), 1);
        assert_eq!(nics[0].network.as_deref(), Some("VM Network"));
        assert_eq!(nics[0].ip_addresses, vec!["10.0.1.5", "fe80::250:56ff:feaa:bbcc"]);
        assert!(nics[0].connected);
    }

    #[test]
    fn snapshot_tree_is_flattened() {
        let details = assemble(&[retrieve_page(VM, None)]).unwrap();
        let snaps = &details[0].snapshots;
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].name, "base");
        assert_eq!(snaps[0].parent_id, None);
        assert!(!snaps[0].is_current);
        assert_eq!(snaps[1].id, "snapshot-3");
        assert_eq!(snaps[1].name, "pre-upgrade");
        assert_eq!(snaps[1].parent_id.as_deref(), Some("snapshot-1"));
        assert_eq!(snaps[1].description, "");
        assert!(snaps[1].is_current);
    }

    #[test]
    fn standalone_host_has_no_cluster() {
        let host = HOST.replace("ClusterComputeResource", "ComputeResource");
        let details = assemble(&[retrieve_page(&[VM, host.as_str()].concat(), None)]).unwrap();
        assert!(details[0].host.is_some());
        assert!(details[0].cluster.is_none());
    }

    #[test]
    fn missing_host_objects_keep_the_reference() {
        let details = assemble(&[retrieve_page(VM, None)]).unwrap();
        assert_eq!(
            details[0].host,
            Some(ObjectRef { id: "host-12".into(), name: String::new() })
        );
        assert!(details[0].cluster.is_none());
    }

    #[test]
    fn bare_vm_degrades_to_defaults() {
        let page = retrieve_page(r#"<objects><obj type="VirtualMachine">vm-1</obj></objects>"#, None);
        let details = assemble(&[page]).unwrap();
        assert_eq!(details[0], VmDetail { id: "vm-1".into(), ..Default::default() });
    }
}
