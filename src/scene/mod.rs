//! Scene graph documents
//!
//! A design is a JSON document in the canvas editor's serialization: a
//! top-level object whose `objects` array holds the nodes in paint order.
//! Everything else about the format is opaque to the pipeline; the types here
//! only expose what substitution, image fallback and layout need.

use serde_json::{Map, Value};

use crate::{Error, Result};

pub mod fallback;
pub mod placeholder;

/// Node attribute map
pub type Node = Map<String, Value>;

/// A parsed scene graph document
#[derive(Debug, Clone, PartialEq)]
pub struct SceneGraph {
    root: Map<String, Value>,
}

impl SceneGraph {
    /// Parse a serialized design
    ///
    /// The document must be a JSON object. A missing `objects` key is an empty
    /// scene; an `objects` key holding anything but an array of objects is
    /// malformed.
    pub fn parse(document: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(document)
            .map_err(|e| Error::MalformedDesign(format!("invalid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(root) = value else {
            return Err(Error::MalformedDesign("document is not a JSON object".into()));
        };
        if let Some(objects) = root.get("objects") {
            validate_nodes(objects, "objects")?;
        }
        Ok(Self { root })
    }

    /// Serialize back to a document string
    pub fn to_json(&self) -> String {
        Value::Object(self.root.clone()).to_string()
    }

    /// Top-level nodes in paint order
    pub fn nodes(&self) -> &[Value] {
        match self.root.get("objects") {
            Some(Value::Array(nodes)) => nodes.as_slice(),
            _ => &[],
        }
    }

    /// Canvas background color, if the design sets one
    pub fn background(&self) -> Option<&str> {
        self.root.get("background").and_then(Value::as_str)
    }

    /// Total number of nodes, counting group members
    pub fn node_count(&self) -> usize {
        fn count(nodes: &[Value]) -> usize {
            nodes
                .iter()
                .map(|n| 1 + children(n).map(count).unwrap_or(0))
                .sum()
        }
        count(self.nodes())
    }

    /// Visit every node mutably, depth first, group members after their group
    pub fn for_each_node_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Node),
    {
        fn walk<F: FnMut(&mut Node)>(nodes: &mut [Value], f: &mut F) {
            for value in nodes {
                if let Value::Object(node) = value {
                    f(node);
                    if let Some(Value::Array(members)) = node.get_mut("objects") {
                        walk(members, f);
                    }
                }
            }
        }
        if let Some(Value::Array(nodes)) = self.root.get_mut("objects") {
            walk(nodes, &mut f);
        }
    }

    /// Visit every node, depth first, group members after their group
    pub fn for_each_node<F>(&self, mut f: F)
    where
        F: FnMut(&Node),
    {
        fn walk<F: FnMut(&Node)>(nodes: &[Value], f: &mut F) {
            for value in nodes {
                if let Value::Object(node) = value {
                    f(node);
                    if let Some(Value::Array(members)) = node.get("objects") {
                        walk(members, f);
                    }
                }
            }
        }
        walk(self.nodes(), &mut f);
    }
}

/// Members of a group node
pub fn children(node: &Value) -> Option<&[Value]> {
    match node.get("objects") {
        Some(Value::Array(members)) => Some(members.as_slice()),
        _ => None,
    }
}

/// Lower-cased node type (`Textbox` and `textbox` are the same node)
pub fn node_type(node: &Node) -> Option<String> {
    node.get("type").and_then(Value::as_str).map(|t| t.to_ascii_lowercase())
}

fn validate_nodes(objects: &Value, path: &str) -> Result<()> {
    let Value::Array(nodes) = objects else {
        return Err(Error::MalformedDesign(format!("`{}` is not an array", path)));
    };
    for (idx, node) in nodes.iter().enumerate() {
        if !node.is_object() {
            return Err(Error::MalformedDesign(format!("{}[{}] is not an object", path, idx)));
        }
        if let Some(members) = node.get("objects") {
            validate_nodes(members, &format!("{}[{}].objects", path, idx))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_scene_without_objects() {
        let scene = SceneGraph::parse(r#"{"version":"5.3.0"}"#).unwrap();
        assert!(scene.nodes().is_empty());
        assert_eq!(scene.node_count(), 0);
    }

    #[test]
    fn parse_rejects_malformed_documents() {
        for doc in ["not json", "[1,2]", r#"{"objects": {}}"#, r#"{"objects": [1]}"#] {
            assert!(
                matches!(SceneGraph::parse(doc), Err(Error::MalformedDesign(_))),
                "{} should be malformed",
                doc
            );
        }
    }

    #[test]
    fn group_members_are_counted_and_visited() {
        let scene = SceneGraph::parse(
            r#"{"objects":[{"type":"rect"},{"type":"group","objects":[{"type":"text"},{"type":"image"}]}]}"#,
        )
        .unwrap();
        assert_eq!(scene.nodes().len(), 2);
        assert_eq!(scene.node_count(), 4);

        let mut types = Vec::new();
        scene.for_each_node(|n| types.push(node_type(n).unwrap_or_default()));
        assert_eq!(types, vec!["rect", "group", "text", "image"]);
    }

    #[test]
    fn serialization_keeps_attribute_order() {
        let doc = r##"{"version":"5.3.0","objects":[{"type":"text","left":1,"id":"x","text":"a"}],"background":"#fff"}"##;
        let scene = SceneGraph::parse(doc).unwrap();
        assert_eq!(scene.to_json(), doc);
        assert_eq!(scene.background(), Some("#fff"));
    }
}
