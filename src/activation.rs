use anyhow::{Context, Result};
use larian_formats::bg3::raw::{
    ModuleInfoAttribute, ModulesChildren, ModulesShortDescriptionNode, Save, Version,
};
use serde::Serialize;
use std::{
    collections::{HashMap, VecDeque},
    fs,
    path::{Path, PathBuf},
};

pub const GUSTAV_DEV_UUID: &str = "28ac9ce2-2aba-8cda-b3b5-6e922f71b6b8";
const GUSTAV_DEV_VERSION: &str = "36028797018963968";

/// The host's list of active mods, in load order.
pub trait ModActivation {
    fn build_number(&self) -> i64;

    fn active_mods_in_load_order(&self) -> Vec<String>;

    fn set_active(&mut self, id: &str, active: bool);

    /// Back to the game's baseline: base module only.
    fn reset(&mut self);

    fn save(&mut self) -> Result<()>;

    fn clear_all(&mut self) {
        for id in self.active_mods_in_load_order() {
            self.set_active(&id, false);
        }
    }
}

/// `modsettings.lsx` as the activation store. Ids are module UUIDs.
pub struct ModSettingsActivation {
    path: PathBuf,
    save: Save,
    active: Vec<String>,
    catalog: HashMap<String, ModulesShortDescriptionNode>,
}

impl ModSettingsActivation {
    pub fn load(path: &Path) -> Result<Self> {
        let save = read_modsettings(path)?;
        let nodes: VecDeque<ModulesShortDescriptionNode> = save
            .find_node_by_id("Mods")
            .ok()
            .and_then(|node| node.children.get(0))
            .map(|child| child.node.clone())
            .unwrap_or_default();

        let mut active = Vec::new();
        let mut catalog = HashMap::new();
        for node in nodes {
            let Some(uuid) = module_attr(&node, "UUID") else {
                continue;
            };
            if !active.contains(&uuid) {
                active.push(uuid.clone());
            }
            catalog.insert(uuid, node);
        }

        Ok(Self {
            path: path.to_path_buf(),
            save,
            active,
            catalog,
        })
    }

    pub fn display_name(&self, id: &str) -> String {
        self.catalog
            .get(id)
            .and_then(|node| module_attr(node, "Name"))
            .unwrap_or_else(|| id.to_string())
    }

    fn is_base(&self, id: &str) -> bool {
        self.catalog.get(id).is_some_and(is_base_node)
    }

    fn descriptor(&self, id: &str) -> ModulesShortDescriptionNode {
        self.catalog
            .get(id)
            .cloned()
            .unwrap_or_else(|| minimal_short_desc(id))
    }
}

impl ModActivation for ModSettingsActivation {
    fn build_number(&self) -> i64 {
        let version = &self.save.version;
        let stamp = semver_stamp(
            version.major as u64,
            version.minor as u64,
            version.revision as u64,
            version.build as u64,
        );
        i64::try_from(stamp).unwrap_or(crate::snapshot::UNKNOWN_BUILD)
    }

    fn active_mods_in_load_order(&self) -> Vec<String> {
        self.active.clone()
    }

    fn set_active(&mut self, id: &str, active: bool) {
        if active {
            if !self.active.iter().any(|existing| existing == id) {
                self.active.push(id.to_string());
            }
        } else {
            self.active.retain(|existing| existing != id);
        }
    }

    fn reset(&mut self) {
        let mut base: Vec<String> = self
            .active
            .iter()
            .filter(|id| self.is_base(id))
            .cloned()
            .collect();
        if base.is_empty() {
            let mut known: Vec<String> = self
                .catalog
                .iter()
                .filter(|(_, node)| is_base_node(node))
                .map(|(uuid, _)| uuid.clone())
                .collect();
            known.sort();
            base = known;
        }
        if base.is_empty() {
            self.catalog
                .insert(GUSTAV_DEV_UUID.to_string(), gustav_dev_short_desc());
            base.push(GUSTAV_DEV_UUID.to_string());
        }
        self.active = base;
    }

    fn save(&mut self) -> Result<()> {
        let mods_list: VecDeque<ModulesShortDescriptionNode> =
            self.active.iter().map(|id| self.descriptor(id)).collect();
        let (base_ids, mod_ids): (Vec<&String>, Vec<&String>) =
            self.active.iter().partition(|id| self.is_base(id));
        let order_list: VecDeque<ModulesShortDescriptionNode> = base_ids
            .into_iter()
            .chain(mod_ids)
            .map(|id| module_order_node(id))
            .collect();

        let mods_node = self.save.get_or_insert_node_mut_by_id("Mods");
        mods_node.children = vec![ModulesChildren { node: mods_list }];
        let order_node = self.save.get_or_insert_node_mut_by_id("ModOrder");
        order_node.children = vec![ModulesChildren { node: order_list }];

        write_modsettings(&self.path, &self.save)
    }
}

fn module_attr(node: &ModulesShortDescriptionNode, key: &str) -> Option<String> {
    node.attribute
        .iter()
        .find(|attr| attr.id == key)
        .map(|attr| attr.value.clone())
}

fn is_base_node(node: &ModulesShortDescriptionNode) -> bool {
    let name = module_attr(node, "Name").unwrap_or_default();
    let folder = module_attr(node, "Folder").unwrap_or_default();
    is_base_module(&name, &folder)
}

fn is_base_module(name: &str, folder: &str) -> bool {
    matches!(
        name,
        "Gustav" | "GustavX" | "GustavDev" | "Honour" | "HonourX"
    ) || matches!(
        folder,
        "Gustav" | "GustavX" | "GustavDev" | "Honour" | "HonourX"
    )
}

fn minimal_short_desc(uuid: &str) -> ModulesShortDescriptionNode {
    ModulesShortDescriptionNode {
        id: "ModuleShortDesc".to_string(),
        attribute: vec![
            ModuleInfoAttribute::new("Folder", uuid, "LSString"),
            ModuleInfoAttribute::new("UUID", uuid, "guid"),
        ],
    }
}

fn gustav_dev_short_desc() -> ModulesShortDescriptionNode {
    ModulesShortDescriptionNode {
        id: "ModuleShortDesc".to_string(),
        attribute: vec![
            ModuleInfoAttribute::new("Folder", "GustavDev", "LSString"),
            ModuleInfoAttribute::new("MD5", "", "LSString"),
            ModuleInfoAttribute::new("Name", "GustavDev", "LSString"),
            ModuleInfoAttribute::new("PublishHandle", "0", "uint64"),
            ModuleInfoAttribute::new("UUID", GUSTAV_DEV_UUID, "guid"),
            ModuleInfoAttribute::new("Version64", GUSTAV_DEV_VERSION, "int64"),
        ],
    }
}

fn module_order_node(uuid: &str) -> ModulesShortDescriptionNode {
    ModulesShortDescriptionNode {
        id: "Module".to_string(),
        attribute: vec![ModuleInfoAttribute::new("UUID", uuid, "FixedString")],
    }
}

fn semver_stamp(major: u64, minor: u64, patch: u64, build: u64) -> u64 {
    major
        .saturating_mul(1_000_000_000)
        .saturating_add(minor.saturating_mul(1_000_000))
        .saturating_add(patch.saturating_mul(1_000))
        .saturating_add(build)
}

fn read_modsettings(path: &Path) -> Result<Save> {
    if !path.exists() {
        return Ok(default_modsettings());
    }
    let raw = fs::read_to_string(path).context("read modsettings.lsx")?;
    let parsed = quick_xml::de::from_str(&raw).context("parse modsettings.lsx")?;
    Ok(parsed)
}

fn write_modsettings(path: &Path, save: &Save) -> Result<()> {
    let xml = modsettings_xml(save)?;
    fs::create_dir_all(path.parent().context("modsettings parent")?)
        .context("create modsettings dir")?;
    fs::write(path, xml).context("write modsettings")?;
    Ok(())
}

fn modsettings_xml(save: &Save) -> Result<String> {
    let mut xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n".to_string();
    let mut ser = quick_xml::se::Serializer::new(&mut xml);
    ser.indent(' ', 4);
    save.serialize(ser).context("serialize modsettings")?;
    xml.push('\n');
    Ok(xml.replace("/>\n", " />\n"))
}

fn default_modsettings() -> Save {
    Save {
        version: Version {
            major: 4,
            minor: 8,
            revision: 0,
            build: 500,
        },
        region: larian_formats::bg3::raw::Region {
            id: "ModuleSettings".to_string(),
            node: larian_formats::bg3::raw::ConfigNode {
                id: "root".to_string(),
                children: larian_formats::bg3::raw::ConfigChildren { node: Vec::new() },
            },
        },
    }
}

/// Plain in-memory activation list for engine tests.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryActivation {
    pub build: i64,
    pub active: Vec<String>,
    pub saves: usize,
    pub fail_save: bool,
}

#[cfg(test)]
pub const MEMORY_BASE: &str = "core";

#[cfg(test)]
impl MemoryActivation {
    pub fn with_mods(build: i64, ids: &[&str]) -> Self {
        Self {
            build,
            active: ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
impl ModActivation for MemoryActivation {
    fn build_number(&self) -> i64 {
        self.build
    }

    fn active_mods_in_load_order(&self) -> Vec<String> {
        self.active.clone()
    }

    fn set_active(&mut self, id: &str, active: bool) {
        if active {
            if !self.active.iter().any(|existing| existing == id) {
                self.active.push(id.to_string());
            }
        } else {
            self.active.retain(|existing| existing != id);
        }
    }

    fn reset(&mut self) {
        self.active = vec![MEMORY_BASE.to_string()];
    }

    fn save(&mut self) -> Result<()> {
        if self.fail_save {
            anyhow::bail!("modsettings is read-only");
        }
        self.saves += 1;
        Ok(())
    }
}
