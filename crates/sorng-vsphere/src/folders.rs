//! Folder-only structure retrieval → [`FolderTree`].

use std::collections::{HashMap, HashSet};

use crate::error::VsphereResult;
use crate::inventory::folder_from;
use crate::props;
use crate::types::{Folder, FolderTree, RootKind};

/// Folders and datacenter `vmFolder` links found in the pages.
#[derive(Debug, Default)]
pub struct FolderMap {
    pub folders: HashMap<String, Folder>,
    /// Datacenter MOID → its `vmFolder` MOID
    pub vm_folders: HashMap<String, String>,
}

pub fn folder_map(pages: &[String]) -> VsphereResult<FolderMap> {
    let docs = props::parse_pages(pages)?;
    let mut map = FolderMap::default();
    for obj in props::objects(&docs) {
        match obj.kind.as_str() {
            "Folder" => {
                map.folders.entry(obj.moid.clone()).or_insert_with(|| folder_from(&obj));
            }
            "Datacenter" => {
                if let Some((_, vm_folder)) = obj.reference("vmFolder") {
                    map.vm_folders.insert(obj.moid.clone(), vm_folder);
                }
            }
            _ => {}
        }
    }
    Ok(map)
}

impl FolderMap {
    /// Folder the tree starts at: a datacenter's `vmFolder`, or the root.
    pub fn start(&self, kind: RootKind, root_moid: &str) -> String {
        match kind {
            RootKind::Datacenter => self
                .vm_folders
                .get(root_moid)
                .cloned()
                .unwrap_or_else(|| root_moid.to_string()),
            RootKind::Folder => root_moid.to_string(),
        }
    }

    /// Recursive tree from `start`; children that are not known folders
    /// (VMs, or references outside the retrieval) are dropped.
    pub fn tree(&self, start: &str) -> FolderTree {
        let mut visiting = HashSet::new();
        self.node(start, &mut visiting)
    }

    fn node(&self, id: &str, visiting: &mut HashSet<String>) -> FolderTree {
        visiting.insert(id.to_string());
        let folder = self.folders.get(id);
        let children = folder
            .map(|f| {
                f.children
                    .iter()
                    .filter(|c| self.folders.contains_key(c.as_str()))
                    .filter(|c| !visiting.contains(c.as_str()))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
            .into_iter()
            .map(|c| self.node(&c, visiting))
            .collect();
        visiting.remove(id);

        FolderTree {
            id: id.to_string(),
            name: folder.map(|f| f.name.clone()).unwrap_or_default(),
            children,
        }
    }
}

/// Assemble the folder tree below `root_moid`.
pub fn assemble_tree(
    pages: &[String],
    kind: RootKind,
    root_moid: &str,
) -> VsphereResult<FolderTree> {
    let map = folder_map(pages)?;
    let start = map.start(kind, root_moid);
    Ok(map.tree(&start))
}
