//! vim25 SOAP request bodies.
//!
//! Pure string rendering, no I/O. Every caller-supplied value goes through
//! [`escape_xml`] before interpolation.

use crate::types::RootKind;

const SOAPENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const VIM25_NS: &str = "urn:vim25";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

const PROPERTY_COLLECTOR: &str = "propertyCollector";
const SESSION_MANAGER: &str = "SessionManager";
const SEARCH_INDEX: &str = "SearchIndex";
const SERVICE_INSTANCE: &str = "ServiceInstance";

/// Which properties a `RetrievePropertiesEx` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyVariant {
    /// Folders, VMs (summary + devices), datacenters and the instance UUID
    Topology,
    /// Folder names / children and datacenter `vmFolder` only
    Structure,
    /// VMs with host / cluster ancestry, guest network and snapshots
    VmDetail,
}

/// Escape `&`, `<`, `>`, `"` and `'` for element text or attribute values.
pub fn escape_xml(raw: &str) -> String {
    quick_xml::escape::escape(raw).into_owned()
}

/// Wrap an operation body in the SOAP envelope.
pub fn wrap(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="{SOAPENV_NS}" xmlns:vim25="{VIM25_NS}" xmlns:xsi="{XSI_NS}">
  <soapenv:Body>
{body}
  </soapenv:Body>
</soapenv:Envelope>"#
    )
}

// ── Session ──────────────────────────────────────────────────────────

pub fn login(username: &str, password: &str) -> String {
    wrap(&format!(
        r#"    <vim25:Login>
      <vim25:_this type="SessionManager">{SESSION_MANAGER}</vim25:_this>
      <vim25:userName>{}</vim25:userName>
      <vim25:password>{}</vim25:password>
    </vim25:Login>"#,
        escape_xml(username),
        escape_xml(password)
    ))
}

/// "Preheat" query: `SessionManager.currentSession` is only populated
/// while the cookie is accepted.
pub fn current_session() -> String {
    wrap(&format!(
        r#"    <vim25:RetrievePropertiesEx>
      <vim25:_this type="PropertyCollector">{PROPERTY_COLLECTOR}</vim25:_this>
      <vim25:specSet>
{}
        <vim25:objectSet>
          <vim25:obj type="SessionManager">{SESSION_MANAGER}</vim25:obj>
          <vim25:skip>false</vim25:skip>
        </vim25:objectSet>
      </vim25:specSet>
      <vim25:options/>
    </vim25:RetrievePropertiesEx>"#,
        prop_set("SessionManager", &["currentSession"])
    ))
}

// ── Property collector ───────────────────────────────────────────────

/// `RetrievePropertiesEx` walking everything below `root_moid`.
pub fn retrieve_properties(kind: RootKind, root_moid: &str, variant: PropertyVariant) -> String {
    let mut specs = String::new();
    for (ty, paths) in property_sets(variant) {
        specs.push_str(&prop_set(ty, paths));
        specs.push('\n');
    }

    let with_hosts = variant == PropertyVariant::VmDetail;
    let mut object_sets = format!(
        r#"        <vim25:objectSet>
          <vim25:obj type="{}">{}</vim25:obj>
          <vim25:skip>false</vim25:skip>
{}
        </vim25:objectSet>"#,
        kind.as_str(),
        escape_xml(root_moid),
        folder_traversal(with_hosts)
    );
    if variant == PropertyVariant::Topology {
        object_sets.push_str(&format!(
            r#"
        <vim25:objectSet>
          <vim25:obj type="ServiceInstance">{SERVICE_INSTANCE}</vim25:obj>
          <vim25:skip>false</vim25:skip>
        </vim25:objectSet>"#
        ));
    }

    retrieve_ex(&specs, &object_sets)
}

/// VM-detail properties for a single VirtualMachine plus its host chain.
pub fn retrieve_vm_detail(vm_moid: &str) -> String {
    let mut specs = String::new();
    for (ty, paths) in property_sets(PropertyVariant::VmDetail) {
        specs.push_str(&prop_set(ty, paths));
        specs.push('\n');
    }
    let object_set = format!(
        r#"        <vim25:objectSet>
          <vim25:obj type="VirtualMachine">{}</vim25:obj>
          <vim25:skip>false</vim25:skip>
{}
        </vim25:objectSet>"#,
        escape_xml(vm_moid),
        host_traversal()
    );
    retrieve_ex(&specs, &object_set)
}

pub fn continue_retrieve(token: &str) -> String {
    wrap(&format!(
        r#"    <vim25:ContinueRetrievePropertiesEx>
      <vim25:_this type="PropertyCollector">{PROPERTY_COLLECTOR}</vim25:_this>
      <vim25:token>{}</vim25:token>
    </vim25:ContinueRetrievePropertiesEx>"#,
        escape_xml(token)
    ))
}

// ── Search index ─────────────────────────────────────────────────────

pub fn find_by_ip(ip: &str, datacenter_moid: &str) -> String {
    wrap(&format!(
        r#"    <vim25:FindByIp>
      <vim25:_this type="SearchIndex">{SEARCH_INDEX}</vim25:_this>
      <vim25:datacenter type="Datacenter">{}</vim25:datacenter>
      <vim25:ip>{}</vim25:ip>
      <vim25:vmSearch>true</vim25:vmSearch>
    </vim25:FindByIp>"#,
        escape_xml(datacenter_moid),
        escape_xml(ip)
    ))
}

pub fn find_by_dns_name(hostname: &str, datacenter_moid: &str) -> String {
    wrap(&format!(
        r#"    <vim25:FindByDnsName>
      <vim25:_this type="SearchIndex">{SEARCH_INDEX}</vim25:_this>
      <vim25:datacenter type="Datacenter">{}</vim25:datacenter>
      <vim25:dnsName>{}</vim25:dnsName>
      <vim25:vmSearch>true</vim25:vmSearch>
    </vim25:FindByDnsName>"#,
        escape_xml(datacenter_moid),
        escape_xml(hostname)
    ))
}

/// Look a VM up by name under `{datacenter}/vm/`.
pub fn find_by_inventory_path(vm_name: &str, datacenter_name: &str) -> String {
    let path = format!("{datacenter_name}/vm/{vm_name}");
    wrap(&format!(
        r#"    <vim25:FindByInventoryPath>
      <vim25:_this type="SearchIndex">{SEARCH_INDEX}</vim25:_this>
      <vim25:inventoryPath>{}</vim25:inventoryPath>
    </vim25:FindByInventoryPath>"#,
        escape_xml(&path)
    ))
}

// ── Internal helpers ─────────────────────────────────────────────────

type PropertySpec = (&'static str, &'static [&'static str]);

const TOPOLOGY_PROPS: &[PropertySpec] = &[
    ("Folder", &["name", "childEntity"]),
    (
        "VirtualMachine",
        &[
            "name",
            "guest.ipAddress",
            "guest.hostName",
            "config.hardware.memoryMB",
            "config.hardware.numCPU",
            "runtime.powerState",
            "config.guestFullName",
            "config.hardware.device",
        ],
    ),
    ("Datacenter", &["name", "vmFolder"]),
    ("ServiceInstance", &["content.about.instanceUuid"]),
];

const STRUCTURE_PROPS: &[PropertySpec] = &[
    ("Folder", &["name", "childEntity"]),
    ("Datacenter", &["name", "vmFolder"]),
];

const VM_DETAIL_PROPS: &[PropertySpec] = &[
    (
        "VirtualMachine",
        &[
            "name",
            "runtime.host",
            "runtime.powerState",
            "guest.ipAddress",
            "guest.hostName",
            "guest.net",
            "config.guestFullName",
            "config.hardware.numCPU",
            "config.hardware.memoryMB",
            "config.hardware.device",
            "snapshot",
        ],
    ),
    ("HostSystem", &["name", "parent"]),
    ("ComputeResource", &["name"]),
];

fn property_sets(variant: PropertyVariant) -> &'static [PropertySpec] {
    match variant {
        PropertyVariant::Topology => TOPOLOGY_PROPS,
        PropertyVariant::Structure => STRUCTURE_PROPS,
        PropertyVariant::VmDetail => VM_DETAIL_PROPS,
    }
}

fn prop_set(ty: &str, paths: &[&str]) -> String {
    let mut out = format!("        <vim25:propSet>\n          <vim25:type>{ty}</vim25:type>\n");
    for p in paths {
        out.push_str(&format!("          <vim25:pathSet>{p}</vim25:pathSet>\n"));
    }
    out.push_str("        </vim25:propSet>");
    out
}

fn traversal_spec(name: &str, ty: &str, path: &str, next: &[&str]) -> String {
    let mut out = format!(
        r#"          <vim25:selectSet xsi:type="vim25:TraversalSpec">
            <vim25:name>{name}</vim25:name>
            <vim25:type>{ty}</vim25:type>
            <vim25:path>{path}</vim25:path>
            <vim25:skip>false</vim25:skip>
"#
    );
    for n in next {
        out.push_str(&format!(
            "            <vim25:selectSet><vim25:name>{n}</vim25:name></vim25:selectSet>\n"
        ));
    }
    out.push_str("          </vim25:selectSet>");
    out
}

/// `dcToVmFolder` / `folderToChild` reference each other so the server
/// can walk folders of any depth.
fn folder_traversal(with_hosts: bool) -> String {
    let folder_next: &[&str] = if with_hosts {
        &["folderToChild", "dcToVmFolder", "vmToHost"]
    } else {
        &["folderToChild", "dcToVmFolder"]
    };
    let mut specs = vec![
        traversal_spec("dcToVmFolder", "Datacenter", "vmFolder", &["folderToChild"]),
        traversal_spec("folderToChild", "Folder", "childEntity", folder_next),
    ];
    if with_hosts {
        specs.push(host_traversal());
    }
    specs.join("\n")
}

fn host_traversal() -> String {
    [
        traversal_spec("vmToHost", "VirtualMachine", "runtime.host", &["hostToParent"]),
        traversal_spec("hostToParent", "HostSystem", "parent", &[]),
    ]
    .join("\n")
}

fn retrieve_ex(specs: &str, object_sets: &str) -> String {
    wrap(&format!(
        r#"    <vim25:RetrievePropertiesEx>
      <vim25:_this type="PropertyCollector">{PROPERTY_COLLECTOR}</vim25:_this>
      <vim25:specSet>
{specs}{object_sets}
      </vim25:specSet>
      <vim25:options/>
    </vim25:RetrievePropertiesEx>"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::XmlElement;

    fn body_op(xml: &str) -> XmlElement {
        let root = XmlElement::parse(xml).expect("well-formed envelope");
        let body = root.first_child_by_local_name("Body", 1).unwrap().clone();
        let op = body.elements().next().unwrap().clone();
        op
    }

    #[test]
    fn escape_covers_markup_characters() {
        assert_eq!(escape_xml(r#"a&b<c>"d"#), "a&amp;b&lt;c&gt;&quot;d");
    }

    #[test]
    fn escaped_values_reparse_to_original() {
        let nasty = r#"p&ss<w>"rd</vim25:password><x>"#;
        let op = body_op(&login("dom\\user&co", nasty));
        assert_eq!(op.local_name(), "Login");
        assert_eq!(op.child_text("password").as_deref(), Some(nasty));
        assert_eq!(op.child_text("userName").as_deref(), Some("dom\\user&co"));
    }

    #[test]
    fn every_user_input_is_escaped() {
        let evil = "<&\">";
        for xml in [
            continue_retrieve(evil),
            find_by_ip(evil, evil),
            find_by_dns_name(evil, evil),
            find_by_inventory_path(evil, evil),
            retrieve_properties(RootKind::Folder, evil, PropertyVariant::Topology),
            retrieve_vm_detail(evil),
        ] {
            XmlElement::parse(&xml).expect("escaped envelope must stay well-formed");
        }
    }

    #[test]
    fn topology_request_has_traversal_and_service_instance() {
        let op = body_op(&retrieve_properties(
            RootKind::Datacenter,
            "datacenter-21",
            PropertyVariant::Topology,
        ));
        assert_eq!(op.local_name(), "RetrievePropertiesEx");
        let objs = op.elements_by_local_name("obj");
        assert_eq!(objs.len(), 2);
        assert_eq!(objs[0].attr("type"), Some("Datacenter"));
        assert_eq!(objs[0].text(), "datacenter-21");
        assert_eq!(objs[1].text(), "ServiceInstance");

        let names: Vec<String> = op
            .elements_by_local_name("selectSet")
            .into_iter()
            .filter(|s| s.xsi_type() == Some("TraversalSpec"))
            .filter_map(|s| s.child_text("name"))
            .collect();
        assert_eq!(names, vec!["dcToVmFolder", "folderToChild"]);

        let paths: Vec<String> = op
            .elements_by_local_name("pathSet")
            .iter()
            .map(|p| p.text())
            .collect();
        assert!(paths.contains(&"config.hardware.device".to_string()));
        assert!(paths.contains(&"content.about.instanceUuid".to_string()));
    }

    #[test]
    fn structure_request_is_folder_only() {
        let op = body_op(&retrieve_properties(
            RootKind::Folder,
            "group-v4",
            PropertyVariant::Structure,
        ));
        let types: Vec<String> = op
            .elements_by_local_name("propSet")
            .iter()
            .filter_map(|p| p.child_text("type"))
            .collect();
        assert_eq!(types, vec!["Folder", "Datacenter"]);
        assert_eq!(op.elements_by_local_name("obj").len(), 1);
    }

    #[test]
    fn vm_detail_request_walks_hosts() {
        let op = body_op(&retrieve_properties(
            RootKind::Folder,
            "group-v4",
            PropertyVariant::VmDetail,
        ));
        let specs: Vec<String> = op
            .elements_by_local_name("selectSet")
            .into_iter()
            .filter(|s| s.xsi_type() == Some("TraversalSpec"))
            .filter_map(|s| s.child_text("path"))
            .collect();
        assert_eq!(specs, vec!["vmFolder", "childEntity", "runtime.host", "parent"]);

        let scoped = body_op(&retrieve_vm_detail("vm-42"));
        let obj = scoped.elements_by_local_name("obj")[0];
        assert_eq!(obj.attr("type"), Some("VirtualMachine"));
        assert_eq!(obj.text(), "vm-42");
        assert!(scoped.elements_by_local_name("pathSet").iter().any(|p| p.text() == "snapshot"));
    }

    #[test]
    fn search_index_requests() {
        let op = body_op(&find_by_ip("10.0.0.5", "datacenter-2"));
        assert_eq!(op.local_name(), "FindByIp");
        assert_eq!(op.child_text("ip").as_deref(), Some("10.0.0.5"));
        assert_eq!(op.child_text("datacenter").as_deref(), Some("datacenter-2"));
        assert_eq!(op.child_text("vmSearch").as_deref(), Some("true"));

        let op = body_op(&find_by_inventory_path("web01", "DC1"));
        assert_eq!(op.child_text("inventoryPath").as_deref(), Some("DC1/vm/web01"));
    }

    #[test]
    fn continuation_carries_token() {
        let op = body_op(&continue_retrieve("abc"));
        assert_eq!(op.local_name(), "ContinueRetrievePropertiesEx");
        assert_eq!(op.child_text("token").as_deref(), Some("abc"));
    }

    #[test]
    fn preheat_targets_current_session() {
        let op = body_op(&current_session());
        assert_eq!(op.elements_by_local_name("pathSet")[0].text(), "currentSession");
        assert_eq!(op.elements_by_local_name("obj")[0].attr("type"), Some("SessionManager"));
    }
}
