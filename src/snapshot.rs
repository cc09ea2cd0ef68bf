use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const UNKNOWN_BUILD: i64 = -1;

/// Build number plus the ordered list of active mod ids at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SnapshotXml", from = "SnapshotXml")]
pub struct Snapshot {
    pub build_number: i64,
    pub active_mods: Vec<String>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            build_number: UNKNOWN_BUILD,
            active_mods: Vec::new(),
        }
    }
}

impl Snapshot {
    pub fn new<I, S>(build_number: i64, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let active_mods = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &String| seen.insert(id.clone()))
            .collect();
        Self {
            build_number,
            active_mods,
        }
    }

    pub fn to_xml(&self) -> Result<String, quick_xml::DeError> {
        let mut xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n".to_string();
        let mut ser = quick_xml::se::Serializer::new(&mut xml);
        ser.indent(' ', 2);
        self.serialize(ser)?;
        xml.push('\n');
        Ok(xml)
    }

    pub fn from_xml(raw: &str) -> Result<Self, quick_xml::DeError> {
        quick_xml::de::from_str(raw)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename = "ModListSnapshot")]
struct SnapshotXml {
    #[serde(rename = "buildNumber", default = "unknown_build")]
    build_number: i64,
    #[serde(rename = "activeMods", default)]
    active_mods: ModIdList,
}

#[derive(Default, Serialize, Deserialize)]
struct ModIdList {
    #[serde(rename = "li", default)]
    ids: Vec<ModIdEntry>,
}

/// Ids live in an attribute so surrounding whitespace is kept verbatim.
#[derive(Serialize, Deserialize)]
struct ModIdEntry {
    #[serde(rename = "@id")]
    id: String,
}

fn unknown_build() -> i64 {
    UNKNOWN_BUILD
}

impl From<Snapshot> for SnapshotXml {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            build_number: snapshot.build_number,
            active_mods: ModIdList {
                ids: snapshot
                    .active_mods
                    .into_iter()
                    .map(|id| ModIdEntry { id })
                    .collect(),
            },
        }
    }
}

impl From<SnapshotXml> for Snapshot {
    fn from(raw: SnapshotXml) -> Self {
        Snapshot::new(
            raw.build_number,
            raw.active_mods.ids.into_iter().map(|entry| entry.id),
        )
    }
}
