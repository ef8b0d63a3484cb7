//! Scripted transport and canned vim25 replies for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{VsphereError, VsphereResult};
use crate::transport::{SoapReply, SoapRequest, SoapTransport};
use crate::types::VsphereConfig;
use crate::xml::XmlElement;

/// What the transport saw for one request.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub operation: String,
    pub body: String,
    pub cookie: Option<String>,
}

/// Replays queued replies in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<SoapReply>>,
    requests: Mutex<Vec<Recorded>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<SoapReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Body operation names in request order (`Login`, `FindByIp`, ...).
    pub fn operations(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.operation).collect()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.operations().iter().filter(|o| *o == operation).count()
    }
}

#[async_trait::async_trait]
impl SoapTransport for ScriptedTransport {
    async fn post(&self, request: SoapRequest<'_>) -> VsphereResult<SoapReply> {
        self.requests.lock().unwrap().push(Recorded {
            operation: operation_of(request.body),
            body: request.body.to_string(),
            cookie: request.cookie.map(str::to_string),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| VsphereError::transport("script exhausted"))
    }
}

fn operation_of(body: &str) -> String {
    XmlElement::parse(body)
        .ok()
        .and_then(|root| {
            root.first_child_by_local_name("Body", 1)
                .and_then(|b| b.elements().next())
                .map(|op| op.local_name().to_string())
        })
        .unwrap_or_default()
}

pub fn config() -> VsphereConfig {
    VsphereConfig {
        host: "vc.test".into(),
        username: Some("administrator@vsphere.local".into()),
        password: Some("VMware1!".into()),
        jitter_min_ms: 0,
        jitter_max_ms: 0,
        preheat_session: false,
        ..Default::default()
    }
}

// ── Canned bodies ───────────────────────────────────────────────────

pub fn envelope(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<soapenv:Body>{body}</soapenv:Body>
</soapenv:Envelope>"#
    )
}

/// `RetrievePropertiesExResponse` with the given `objects` and optional token.
pub fn retrieve_page(objects: &str, token: Option<&str>) -> String {
    let token = token
        .map(|t| format!("<token>{t}</token>"))
        .unwrap_or_default();
    envelope(&format!(
        r#"<RetrievePropertiesExResponse xmlns="urn:vim25"><returnval>{token}{objects}</returnval></RetrievePropertiesExResponse>"#
    ))
}

pub fn continue_page(objects: &str, token: Option<&str>) -> String {
    let token = token
        .map(|t| format!("<token>{t}</token>"))
        .unwrap_or_default();
    envelope(&format!(
        r#"<ContinueRetrievePropertiesExResponse xmlns="urn:vim25"><returnval>{token}{objects}</returnval></ContinueRetrievePropertiesExResponse>"#
    ))
}

pub fn login_ok() -> SoapReply {
    SoapReply::new(
        200,
        envelope(
            r#"<LoginResponse xmlns="urn:vim25"><returnval><key>52a1</key><userName>VSPHERE.LOCAL\Administrator</userName></returnval></LoginResponse>"#,
        ),
    )
    .with_cookie(r#"vmware_soap_session="fresh-cookie"; Path=/; HttpOnly; Secure;"#)
}

pub fn login_fault() -> SoapReply {
    SoapReply::new(
        500,
        envelope(
            r#"<soapenv:Fault><faultcode>ServerFaultCode</faultcode><faultstring>Cannot complete login due to an incorrect user name or password.</faultstring><detail><InvalidLoginFault xmlns="urn:vim25" xsi:type="InvalidLogin"></InvalidLoginFault></detail></soapenv:Fault>"#,
        ),
    )
}

pub fn not_authenticated(status: u16) -> SoapReply {
    SoapReply::new(
        status,
        envelope(
            r#"<soapenv:Fault><faultcode>ServerFaultCode</faultcode><faultstring>The session is not authenticated.</faultstring><detail><NotAuthenticatedFault xmlns="urn:vim25" xsi:type="NotAuthenticated"><object type="SessionManager">SessionManager</object><privilegeId>System.View</privilegeId></NotAuthenticatedFault></detail></soapenv:Fault>"#,
        ),
    )
}

/// `ManagedObjectNotFound` for a VirtualMachine MOID, as vCenter words it.
pub fn object_not_found(moid: &str) -> SoapReply {
    SoapReply::new(
        500,
        envelope(&format!(
            r#"<soapenv:Fault><faultcode>ServerFaultCode</faultcode><faultstring>The object 'vim.VirtualMachine:{moid}' has already been deleted or has not been completely created</faultstring><detail><ManagedObjectNotFoundFault xmlns="urn:vim25" xsi:type="ManagedObjectNotFound"><obj type="VirtualMachine">{moid}</obj></ManagedObjectNotFoundFault></detail></soapenv:Fault>"#
        )),
    )
}

pub fn unauthorized() -> SoapReply {
    SoapReply::new(401, "")
}

pub fn ok(body: String) -> SoapReply {
    SoapReply::new(200, body)
}

pub fn folder(moid: &str, name: &str, children: &[(&str, &str)]) -> String {
    let refs: String = children
        .iter()
        .map(|(ty, id)| {
            format!(
                r#"<ManagedObjectReference type="{ty}" xsi:type="ManagedObjectReference">{id}</ManagedObjectReference>"#
            )
        })
        .collect();
    format!(
        r#"<objects><obj type="Folder">{moid}</obj><propSet><name>childEntity</name><val xsi:type="ArrayOfManagedObjectReference">{refs}</val></propSet><propSet><name>name</name><val xsi:type="xsd:string">{name}</val></propSet></objects>"#
    )
}

pub fn datacenter(moid: &str, name: &str, vm_folder: &str) -> String {
    format!(
        r#"<objects><obj type="Datacenter">{moid}</obj><propSet><name>name</name><val xsi:type="xsd:string">{name}</val></propSet><propSet><name>vmFolder</name><val type="Folder" xsi:type="ManagedObjectReference">{vm_folder}</val></propSet></objects>"#
    )
}

pub fn vm(moid: &str, name: &str, ip: Option<&str>, power: &str) -> String {
    let ip = ip
        .map(|ip| {
            format!(
                r#"<propSet><name>guest.ipAddress</name><val xsi:type="xsd:string">{ip}</val></propSet>"#
            )
        })
        .unwrap_or_default();
    format!(
        r#"<objects><obj type="VirtualMachine">{moid}</obj><propSet><name>config.guestFullName</name><val xsi:type="xsd:string">Ubuntu Linux (64-bit)</val></propSet><propSet><name>config.hardware.memoryMB</name><val xsi:type="xsd:int">4096</val></propSet><propSet><name>config.hardware.numCPU</name><val xsi:type="xsd:int">2</val></propSet>{ip}<propSet><name>name</name><val xsi:type="xsd:string">{name}</val></propSet><propSet><name>runtime.powerState</name><val xsi:type="VirtualMachinePowerState">{power}</val></propSet></objects>"#
    )
}

pub fn find_reply(op: &str, moid: Option<&str>) -> SoapReply {
    let val = moid
        .map(|m| format!(r#"<returnval type="VirtualMachine">{m}</returnval>"#))
        .unwrap_or_default();
    ok(envelope(&format!(r#"<{op}Response xmlns="urn:vim25">{val}</{op}Response>"#)))
}
