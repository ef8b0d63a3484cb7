//! Public read operations.
//!
//! `VsphereService` wraps a [`SoapClient`] and exposes the four inventory
//! queries used by the application. Each call builds its own [`Session`]
//! from the cache, so concurrent calls never share a cookie in memory.

use crate::cache::SessionCache;
use crate::detail;
use crate::envelope::{self, PropertyVariant};
use crate::error::VsphereResult;
use crate::folders;
use crate::inventory;
use crate::session::{Session, SoapClient};
use crate::transport::{HttpTransport, SoapTransport};
use crate::types::*;
use crate::xml::XmlElement;

use log::debug;
use std::sync::Arc;

/// Thread-safe handle for callers that share one service.
pub type VsphereServiceState = Arc<VsphereService<HttpTransport>>;

/// Score of a host-lookup candidate found by each method.
const SCORE_MOID: u32 = 4;
const SCORE_IP: u32 = 2;
const SCORE_DNS: u32 = 1;
const SCORE_PATH: u32 = 1;

/// Aggregate service over the vim25 SOAP client.
pub struct VsphereService<T: SoapTransport> {
    client: SoapClient<T>,
}

impl VsphereService<HttpTransport> {
    /// Service talking HTTP to the configured vCenter.
    pub fn connect(config: VsphereConfig) -> VsphereResult<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(transport, config))
    }
}

impl<T: SoapTransport> VsphereService<T> {
    pub fn new(transport: T, config: VsphereConfig) -> Self {
        Self {
            client: SoapClient::new(transport, config),
        }
    }

    pub fn client(&self) -> &SoapClient<T> {
        &self.client
    }

    pub fn config(&self) -> &VsphereConfig {
        self.client.config()
    }

    /// Connection settings without the password, for display and logs.
    pub fn safe_config(&self) -> VsphereConfigSafe {
        self.config().safe()
    }

    /// Session for one logical operation: cache seed plus optional preheat.
    async fn open_session(&self, cache: &dyn SessionCache) -> VsphereResult<Session> {
        let mut session = Session::from_cache(cache).await;
        if self.config().preheat_session {
            self.client.preheat(&mut session, cache).await?;
        }
        Ok(session)
    }

    // ── Topology ────────────────────────────────────────────────────

    /// Folders ("routers") and VMs below `root_moid`.
    pub async fn fetch_topology(
        &self,
        root_moid: &str,
        cache: &dyn SessionCache,
    ) -> VsphereResult<Topology> {
        let mut session = self.open_session(cache).await?;
        let request = envelope::retrieve_properties(
            RootKind::from_moid(root_moid),
            root_moid,
            PropertyVariant::Topology,
        );
        let set = self.client.fetch_pages(&mut session, cache, &request).await?;
        let inventory = inventory::assemble(&set.pages)?;
        debug!(
            "Topology below {root_moid}: {} folders, {} VMs over {} pages",
            inventory.folders.len(),
            inventory.vms.len(),
            set.pages.len()
        );
        Ok(inventory.into_topology(self.config().ui_host()))
    }

    /// Folder tree below `root_moid` (a datacenter starts at its `vmFolder`).
    pub async fn fetch_topology_structure(
        &self,
        root_moid: &str,
        cache: &dyn SessionCache,
    ) -> VsphereResult<FolderTree> {
        let mut session = self.open_session(cache).await?;
        let kind = RootKind::from_moid(root_moid);
        let request = envelope::retrieve_properties(kind, root_moid, PropertyVariant::Structure);
        let set = self.client.fetch_pages(&mut session, cache, &request).await?;
        folders::assemble_tree(&set.pages, kind, root_moid)
    }

    // ── VM detail ───────────────────────────────────────────────────

    /// Detail records for every VM below `root_moid`.
    pub async fn fetch_vm_details_for_root(
        &self,
        root_moid: &str,
        cache: &dyn SessionCache,
    ) -> VsphereResult<Vec<VmDetail>> {
        let mut session = self.open_session(cache).await?;
        let request = envelope::retrieve_properties(
            RootKind::from_moid(root_moid),
            root_moid,
            PropertyVariant::VmDetail,
        );
        let set = self.client.fetch_pages(&mut session, cache, &request).await?;
        detail::assemble(&set.pages)
    }

    /// Look a single VM up by MOID, IP and/or hostname.
    ///
    /// Each lookup method contributes a score to the MOID it finds; the
    /// best-scoring candidate (first found on ties) is returned. No
    /// candidate, or a winning MOID vCenter reports as
    /// `ManagedObjectNotFound`, yields an empty list.
    pub async fn fetch_host(
        &self,
        query: &HostQuery,
        cache: &dyn SessionCache,
    ) -> VsphereResult<Vec<VmDetail>> {
        let mut session = self.open_session(cache).await?;
        let mut candidates = Candidates::default();
        let config = self.config();

        if let Some(moid) = non_empty(&query.moid) {
            candidates.add(moid.to_string(), SCORE_MOID);
        }
        if let Some(ip) = non_empty(&query.ip) {
            let body = self
                .client
                .call(
                    &mut session,
                    cache,
                    &envelope::find_by_ip(ip, &config.datacenter_moid),
                )
                .await?;
            if let Some(moid) = returned_moid(&body)? {
                candidates.add(moid, SCORE_IP);
            }
        }
        if let Some(hostname) = non_empty(&query.hostname) {
            let body = self
                .client
                .call(
                    &mut session,
                    cache,
                    &envelope::find_by_dns_name(hostname, &config.datacenter_moid),
                )
                .await?;
            if let Some(moid) = returned_moid(&body)? {
                candidates.add(moid, SCORE_DNS);
            }
            let body = self
                .client
                .call(
                    &mut session,
                    cache,
                    &envelope::find_by_inventory_path(hostname, &config.datacenter_name),
                )
                .await?;
            if let Some(moid) = returned_moid(&body)? {
                candidates.add(moid, SCORE_PATH);
            }
        }

        let Some(best) = candidates.best() else {
            debug!("No VM matched {query:?}");
            return Ok(Vec::new());
        };
        debug!("Host lookup {query:?} resolved to {best}");

        let request = envelope::retrieve_vm_detail(&best);
        let set = match self.client.fetch_pages(&mut session, cache, &request).await {
            Ok(set) => set,
            Err(e) if e.is_not_found() => {
                debug!("{best} no longer exists: {e}");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let details = detail::assemble(&set.pages)?;
        Ok(details.into_iter().filter(|d| d.id == best).take(1).collect())
    }
}

/// Candidate MOIDs in discovery order with accumulated scores.
#[derive(Debug, Default)]
struct Candidates {
    entries: Vec<(String, u32)>,
}

impl Candidates {
    fn add(&mut self, moid: String, score: u32) {
        match self.entries.iter_mut().find(|(m, _)| *m == moid) {
            Some((_, s)) => *s += score,
            None => self.entries.push((moid, score)),
        }
    }

    /// Highest score wins; the earliest entry wins a tie.
    fn best(&self) -> Option<String> {
        let mut best: Option<&(String, u32)> = None;
        for entry in &self.entries {
            if best.map_or(true, |(_, s)| entry.1 > *s) {
                best = Some(entry);
            }
        }
        best.map(|(m, _)| m.clone())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// MOID in a `Find*` response `returnval`; an empty `returnval` means no match.
fn returned_moid(body: &str) -> VsphereResult<Option<String>> {
    let doc = XmlElement::parse(body)?;
    Ok(doc
        .elements_by_local_name("returnval")
        .first()
        .map(|rv| rv.text().trim().to_string())
        .filter(|s| !s.is_empty()))
}
