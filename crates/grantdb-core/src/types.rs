//! Domain records shared by the queue, the document store and the search index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Identifier assigned by the document store to a stored raw record.
pub type StorageId = String;

/// A unit of ingestion work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Task {
    /// Fetch an archive over HTTP, unpack it and ingest every grant inside.
    DownloadAndProcess { url: String },
    /// Ingest every grant file under an existing directory.
    WalkAndProcess { root: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    DownloadAndProcess,
    WalkAndProcess,
}

impl Task {
    pub fn download(url: impl Into<String>) -> Self {
        Self::DownloadAndProcess { url: url.into() }
    }

    pub fn walk(root: impl Into<PathBuf>) -> Self {
        Self::WalkAndProcess { root: root.into() }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Self::DownloadAndProcess { .. } => TaskKind::DownloadAndProcess,
            Self::WalkAndProcess { .. } => TaskKind::WalkAndProcess,
        }
    }

    /// The link or path this task is keyed on for duplicate suppression.
    pub fn target(&self) -> String {
        match self {
            Self::DownloadAndProcess { url } => url.clone(),
            Self::WalkAndProcess { root } => root.display().to_string(),
        }
    }

    pub fn is_target_empty(&self) -> bool {
        match self {
            Self::DownloadAndProcess { url } => url.trim().is_empty(),
            Self::WalkAndProcess { root } => root.as_os_str().is_empty(),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DownloadAndProcess => f.write_str("download_and_process"),
            Self::WalkAndProcess => f.write_str("walk_and_process"),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.target())
    }
}

/// Lifecycle of a claimed link.
///
/// `Processed` is written at claim time. `Processing`, `Completed` and
/// `Failed` are set by the worker that runs the task. Every state except
/// `Failed` blocks a second claim for the same link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Processed,
    Processing,
    Completed,
    Failed,
}

impl LinkState {
    pub const BLOCKING: [LinkState; 3] = [LinkState::Processed, LinkState::Processing, LinkState::Completed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn blocks_claim(self) -> bool {
        Self::BLOCKING.contains(&self)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processed" => Ok(Self::Processed),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown link state '{other}'")),
        }
    }
}

/// Persistent record of one claimed link.
///
/// - `id`: store-assigned identity of this record
/// - `link_hash`: BLAKE3 hex digest of the link, the lookup key
/// - `state`: current lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub id: String,
    pub link_hash: String,
    pub state: LinkState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub section: String,
    pub class: String,
    pub subclass: String,
}

impl Classification {
    /// Compact symbol such as `H04L`.
    pub fn symbol(&self) -> String {
        format!("{}{}{}", self.section, self.class, self.subclass)
    }
}

/// Normalized grant record, the unit that is stored and indexed.
///
/// `storage_id` links the patent back to the raw record it was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patent {
    pub title: String,
    pub number: String,
    pub inventor_names: Vec<String>,
    pub assignee_name: String,
    pub application_date: String,
    pub issue_date: String,
    pub classification: Classification,
    pub storage_id: StorageId,
}

/// One node of a parsed XML document, kept in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// Schema-faithful element tree. Only indentation between elements is
/// dropped on the way in, so the stored raw record can be re-normalized later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlElement {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |el| el.name == name)
    }

    /// Follow a chain of child names, taking the first match at each step.
    pub fn find(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |el, name| el.child(name))
    }

    /// All descendant text in document order.
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(el) => el.collect_text(out),
            }
        }
    }

    /// Trimmed inner text at `path`, or an empty string when absent.
    pub fn text_at(&self, path: &[&str]) -> String {
        self.find(path).map(|el| el.inner_text().trim().to_string()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.attributes.is_empty() && self.children.is_empty()
    }
}

/// The faithful decode of one grant file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Where the record was read from.
    pub source: String,
    pub root: XmlElement,
}

impl RawRecord {
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}
