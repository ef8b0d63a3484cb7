//! Full inventory assembly: folders, VMs and the vCenter instance UUID.

use std::collections::{HashMap, HashSet};

use crate::error::VsphereResult;
use crate::props::{self, ObjectContent};
use crate::types::*;

/// Build an [`Inventory`] from the raw pages of a topology retrieval.
pub fn assemble(pages: &[String]) -> VsphereResult<Inventory> {
    let docs = props::parse_pages(pages)?;
    let mut inventory = Inventory::default();
    let mut seen = HashSet::new();

    for obj in props::objects(&docs) {
        match obj.kind.as_str() {
            "Folder" if seen.insert(obj.moid.clone()) => inventory.folders.push(folder_from(&obj)),
            "VirtualMachine" if seen.insert(obj.moid.clone()) => inventory.vms.push(vm_from(&obj)),
            "ServiceInstance" => {
                if let Some(uuid) = obj.text("content.about.instanceUuid") {
                    inventory.instance_uuid = Some(uuid);
                }
            }
            _ => {}
        }
    }

    Ok(inventory)
}

pub(crate) fn folder_from(obj: &ObjectContent<'_>) -> Folder {
    Folder {
        id: obj.moid.clone(),
        name: obj.text("name").unwrap_or_default(),
        children: obj.references("childEntity"),
    }
}

fn vm_from(obj: &ObjectContent<'_>) -> Vm {
    Vm {
        id: obj.moid.clone(),
        name: obj.text("name").unwrap_or_default(),
        ip: obj.text("guest.ipAddress"),
        hostname: obj.text("guest.hostName"),
        cpu_cores: obj.number("config.hardware.numCPU"),
        ram_mb: obj.number("config.hardware.memoryMB"),
        power_state: VmPowerState::parse(&obj.text("runtime.powerState").unwrap_or_default()),
        guest_os: obj.text("config.guestFullName").unwrap_or_default(),
        devices: props::devices(obj.prop("config.hardware.device")),
    }
}

/// Child MOID → first folder listing it.
pub fn parent_index(folders: &[Folder]) -> HashMap<&str, &str> {
    let mut index = HashMap::new();
    for f in folders {
        for child in &f.children {
            index.entry(child.as_str()).or_insert(f.id.as_str());
        }
    }
    index
}

/// vSphere Client deep link for a VM.
pub fn vm_url(ui_host: &str, moid: &str, instance_uuid: &str) -> String {
    format!("https://{ui_host}/ui/app/vm;nav=v/urn:vmomi:VirtualMachine:{moid}:{instance_uuid}/summary")
}

impl Inventory {
    /// Application-facing view with parents resolved by reverse lookup.
    pub fn into_topology(self, ui_host: &str) -> Topology {
        let parents: HashMap<String, String> = parent_index(&self.folders)
            .into_iter()
            .map(|(c, p)| (c.to_string(), p.to_string()))
            .collect();

        let routers = self
            .folders
            .into_iter()
            .map(|f| TopologyFolder {
                parent_id: parents.get(&f.id).cloned(),
                id: f.id,
                name: f.name,
                children: f.children,
            })
            .collect();

        let uuid = self.instance_uuid;
        let vms = self
            .vms
            .into_iter()
            .map(|vm| TopologyVm {
                parent_id: parents.get(&vm.id).cloned(),
                url: uuid.as_deref().map(|u| vm_url(ui_host, &vm.id, u)),
                vm,
            })
            .collect();

        Topology { routers, vms }
    }
}
