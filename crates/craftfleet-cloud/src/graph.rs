//! サーバーのリソースグラフ
//!
//! サーバーのために作成したプロバイダー上のオブジェクトを作成順に並べたもの。
//! ローカルには保存せず、インスタンス自身のタグ（`graph.<n>.<code>=<id>`）に
//! 持たせ、削除時にプロバイダーから読み戻します。

use crate::error::{CloudError, Result};
use crate::tags::TagSet;
use serde::{Deserialize, Serialize};
use std::fmt;

const GRAPH_TAG_PREFIX: &str = "graph.";

/// Kind of provider object the orchestrator creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrimitiveKind {
    SshKey,
    Network,
    Subnetwork,
    Gateway,
    Route,
    SecurityGroup,
    Volume,
    Instance,
    SpotRequest,
}

impl PrimitiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::SshKey => "ssh-key",
            PrimitiveKind::Network => "network",
            PrimitiveKind::Subnetwork => "subnetwork",
            PrimitiveKind::Gateway => "gateway",
            PrimitiveKind::Route => "route",
            PrimitiveKind::SecurityGroup => "security-group",
            PrimitiveKind::Volume => "volume",
            PrimitiveKind::Instance => "instance",
            PrimitiveKind::SpotRequest => "spot-request",
        }
    }

    /// Short code used in graph tag keys; providers cap the length of a tag
    pub fn tag_code(&self) -> &'static str {
        match self {
            PrimitiveKind::SshKey => "key",
            PrimitiveKind::Network => "net",
            PrimitiveKind::Subnetwork => "sub",
            PrimitiveKind::Gateway => "gw",
            PrimitiveKind::Route => "rt",
            PrimitiveKind::SecurityGroup => "sg",
            PrimitiveKind::Volume => "vol",
            PrimitiveKind::Instance => "vm",
            PrimitiveKind::SpotRequest => "spot",
        }
    }

    pub fn from_tag_code(code: &str) -> Result<Self> {
        match code {
            "key" => Ok(PrimitiveKind::SshKey),
            "net" => Ok(PrimitiveKind::Network),
            "sub" => Ok(PrimitiveKind::Subnetwork),
            "gw" => Ok(PrimitiveKind::Gateway),
            "rt" => Ok(PrimitiveKind::Route),
            "sg" => Ok(PrimitiveKind::SecurityGroup),
            "vol" => Ok(PrimitiveKind::Volume),
            "vm" => Ok(PrimitiveKind::Instance),
            "spot" => Ok(PrimitiveKind::SpotRequest),
            other => Err(CloudError::CorruptGraph(format!(
                "unknown primitive kind '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One created provider object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEntry {
    pub kind: PrimitiveKind,
    pub id: String,
}

/// Objects in creation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGraph {
    entries: Vec<GraphEntry>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: PrimitiveKind, id: impl Into<String>) {
        self.entries.push(GraphEntry {
            kind,
            id: id.into(),
        });
    }

    pub fn entries(&self) -> &[GraphEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// First id recorded for a kind
    pub fn first(&self, kind: PrimitiveKind) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.id.as_str())
    }

    /// All ids recorded for a kind, in creation order
    pub fn ids(&self, kind: PrimitiveKind) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.id.as_str())
            .collect()
    }

    /// Entries in the order they must be destroyed
    pub fn teardown_order(&self) -> impl Iterator<Item = &GraphEntry> {
        self.entries.iter().rev()
    }

    /// Write the graph into a tag set, one `graph.<n>.<code>=<id>` tag per entry
    pub fn write_tags(&self, tags: &mut TagSet) -> Result<()> {
        for (n, entry) in self.entries.iter().enumerate() {
            tags.insert(
                format!("{}{}.{}", GRAPH_TAG_PREFIX, n, entry.kind.tag_code()),
                entry.id.clone(),
            )?;
        }
        Ok(())
    }

    /// Rebuild the graph from an instance's tags
    pub fn from_tags(tags: &TagSet) -> Result<Self> {
        let mut indexed = Vec::new();
        for (key, value) in tags.iter() {
            let Some(rest) = key.strip_prefix(GRAPH_TAG_PREFIX) else {
                continue;
            };
            let (index, kind) = rest
                .split_once('.')
                .ok_or_else(|| CloudError::CorruptGraph(key.to_string()))?;
            let index: usize = index
                .parse()
                .map_err(|_| CloudError::CorruptGraph(key.to_string()))?;
            let kind = PrimitiveKind::from_tag_code(kind)?;
            let id = value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| CloudError::CorruptGraph(format!("{} has no id", key)))?;
            indexed.push((index, GraphEntry {
                kind,
                id: id.to_string(),
            }));
        }

        // BTreeMap ordering is lexical ("graph.10" < "graph.2"), so sort numerically
        indexed.sort_by_key(|(index, _)| *index);
        Ok(Self {
            entries: indexed.into_iter().map(|(_, entry)| entry).collect(),
        })
    }
}
