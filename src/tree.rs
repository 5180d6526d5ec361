use std::collections::HashSet;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{Result, TrackerError};

/// A service-order file as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOrder {
    pub file_name: String,
    #[serde(rename = "json", default)]
    pub nodes: Vec<ServiceNode>,
}

/// What a tree node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A service carrying characteristics.
    Service,
    /// A bare resource with no metadata.
    Resource,
    /// A navigation entry (`label`/`path`/`subMenu`).
    Menu,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntityReadable {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub readnames: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub id: String,
    pub role: String,
}

/// Human-readable view of one service characteristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicReadable {
    pub key: String,
    #[serde(default)]
    pub readnames: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    #[serde(default)]
    pub related_entity_readables: Vec<RelatedEntityReadable>,
    #[serde(default)]
    pub related_entity: Vec<RelatedEntity>,
    #[serde(default)]
    pub service_characteristic_readables: Vec<CharacteristicReadable>,
    #[serde(default)]
    pub service_characteristic: Map<String, Value>,
}

/// One node of a service-order or navigation tree.
///
/// Service payloads (`extId`, `children`, `metadata`) and navigation payloads
/// (`label`, `path`, `subMenu`/`subChildren`) both decode into this type, and
/// every kind exposes its descendants through [`children()`](Self::children).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawNode")]
pub struct ServiceNode {
    pub ext_id: String,
    pub description: String,
    pub is_primary: Option<bool>,
    pub kind: NodeKind,
    pub path: Option<String>,
    pub metadata: Option<NodeMetadata>,
    children: Vec<ServiceNode>,
}

impl ServiceNode {
    pub fn children(&self) -> &[ServiceNode] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Characteristic readables, empty for nodes without metadata.
    pub fn attributes(&self) -> &[CharacteristicReadable] {
        self.metadata
            .as_ref()
            .map(|m| m.service_characteristic_readables.as_slice())
            .unwrap_or(&[])
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes()
            .iter()
            .find(|a| a.key == key)
            .and_then(|a| a.value.as_deref())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    ext_id: Option<String>,
    description: Option<String>,
    is_primary: Option<bool>,
    #[serde(default)]
    children: Vec<RawNode>,
    metadata: Option<NodeMetadata>,
    label: Option<String>,
    path: Option<String>,
    #[serde(default)]
    sub_menu: Vec<RawNode>,
    #[serde(default)]
    sub_children: Vec<RawNode>,
}

impl From<RawNode> for ServiceNode {
    fn from(raw: RawNode) -> Self {
        match (raw.ext_id, raw.label) {
            (None, Some(label)) => {
                let children = raw
                    .sub_menu
                    .into_iter()
                    .chain(raw.sub_children)
                    .map(ServiceNode::from)
                    .collect();
                ServiceNode {
                    ext_id: raw.path.clone().unwrap_or_else(|| label.clone()),
                    description: label,
                    is_primary: None,
                    kind: NodeKind::Menu,
                    path: raw.path,
                    metadata: None,
                    children,
                }
            }
            (ext_id, _) => ServiceNode {
                ext_id: ext_id.unwrap_or_default(),
                description: raw.description.unwrap_or_default(),
                is_primary: raw.is_primary,
                kind: if raw.metadata.is_some() {
                    NodeKind::Service
                } else {
                    NodeKind::Resource
                },
                path: None,
                metadata: raw.metadata,
                children: raw.children.into_iter().map(ServiceNode::from).collect(),
            },
        }
    }
}

impl Serialize for ServiceNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self.kind {
            NodeKind::Menu => {
                map.serialize_entry("label", &self.description)?;
                if let Some(path) = &self.path {
                    map.serialize_entry("path", path)?;
                }
                if !self.children.is_empty() {
                    map.serialize_entry("subMenu", &self.children)?;
                }
            }
            NodeKind::Service | NodeKind::Resource => {
                map.serialize_entry("extId", &self.ext_id)?;
                map.serialize_entry("description", &self.description)?;
                map.serialize_entry("isPrimary", &self.is_primary)?;
                map.serialize_entry("children", &self.children)?;
                if let Some(metadata) = &self.metadata {
                    map.serialize_entry("metadata", metadata)?;
                }
            }
        }
        map.end()
    }
}

/// A row of the tree as currently displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub ext_id: String,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
}

/// Depth-first pre-order traversal yielding `(depth, node)`.
pub struct Walk<'a> {
    stack: Vec<(usize, &'a ServiceNode)>,
}

impl<'a> Walk<'a> {
    fn new(roots: &'a [ServiceNode]) -> Self {
        Self {
            stack: roots.iter().rev().map(|n| (0, n)).collect(),
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a ServiceNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|c| (depth + 1, c)));
        Some((depth, node))
    }
}

/// An editable service order with expand/collapse state.
#[derive(Debug, Clone)]
pub struct ServiceTree {
    file_name: String,
    roots: Vec<ServiceNode>,
    expanded: HashSet<String>,
    dirty: bool,
}

impl ServiceTree {
    pub fn new(order: ServiceOrder) -> Self {
        Self {
            file_name: order.file_name,
            roots: order.nodes,
            expanded: HashSet::new(),
            dirty: false,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn roots(&self) -> &[ServiceNode] {
        &self.roots
    }

    pub fn walk(&self) -> Walk<'_> {
        Walk::new(&self.roots)
    }

    pub fn len(&self) -> usize {
        self.walk().count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn find(&self, ext_id: &str) -> Option<&ServiceNode> {
        self.walk().map(|(_, n)| n).find(|n| n.ext_id == ext_id)
    }

    fn find_mut(&mut self, ext_id: &str) -> Option<&mut ServiceNode> {
        let mut stack: Vec<&mut ServiceNode> = self.roots.iter_mut().collect();
        while let Some(node) = stack.pop() {
            if node.ext_id == ext_id {
                return Some(node);
            }
            stack.extend(node.children.iter_mut());
        }
        None
    }

    /// Set a characteristic on a node, updating both the readable entry and
    /// the raw characteristic map. Marks the tree dirty.
    pub fn set_attribute(&mut self, ext_id: &str, key: &str, value: impl Into<String>) -> Result<()> {
        let node = self
            .find_mut(ext_id)
            .ok_or_else(|| TrackerError::NotFound(format!("node {}", ext_id)))?;
        let metadata = node
            .metadata
            .as_mut()
            .ok_or_else(|| TrackerError::NotFound(format!("attributes on node {}", ext_id)))?;
        let readable = metadata
            .service_characteristic_readables
            .iter_mut()
            .find(|a| a.key == key)
            .ok_or_else(|| TrackerError::NotFound(format!("attribute {} on node {}", key, ext_id)))?;

        let value = value.into();
        readable.value = Some(value.clone());
        metadata
            .service_characteristic
            .insert(key.to_string(), Value::String(value));
        self.dirty = true;
        Ok(())
    }

    // ── Expansion ───────────────────────────────────────────────────

    pub fn is_expanded(&self, ext_id: &str) -> bool {
        self.expanded.contains(ext_id)
    }

    /// Returns `false` if the node is unknown.
    pub fn expand(&mut self, ext_id: &str) -> bool {
        if self.find(ext_id).is_none() {
            return false;
        }
        self.expanded.insert(ext_id.to_string());
        true
    }

    pub fn collapse(&mut self, ext_id: &str) -> bool {
        self.expanded.remove(ext_id)
    }

    /// Flip a node's expansion. Returns the new state.
    pub fn toggle(&mut self, ext_id: &str) -> bool {
        if self.expanded.remove(ext_id) {
            false
        } else {
            self.expand(ext_id)
        }
    }

    pub fn expand_all(&mut self) {
        let ids: Vec<String> = self
            .walk()
            .filter(|(_, n)| n.has_children())
            .map(|(_, n)| n.ext_id.clone())
            .collect();
        self.expanded.extend(ids);
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Rows that are shown given the current expansion state: roots, plus
    /// children of expanded nodes whose ancestors are all expanded.
    pub fn visible(&self) -> Vec<VisibleRow> {
        let mut rows = Vec::new();
        let mut stack: Vec<(usize, &ServiceNode)> = self.roots.iter().rev().map(|n| (0, n)).collect();
        while let Some((depth, node)) = stack.pop() {
            let expanded = self.is_expanded(&node.ext_id);
            rows.push(VisibleRow {
                ext_id: node.ext_id.clone(),
                depth,
                has_children: node.has_children(),
                expanded,
            });
            if expanded {
                stack.extend(node.children.iter().rev().map(|c| (depth + 1, c)));
            }
        }
        rows
    }

    // ── Persistence ─────────────────────────────────────────────────

    /// Whether there are edits not yet saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Serialize the nodes in the shape the backend accepts for upload.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.roots)?)
    }

    pub fn to_order(&self) -> ServiceOrder {
        ServiceOrder {
            file_name: self.file_name.clone(),
            nodes: self.roots.clone(),
        }
    }
}
