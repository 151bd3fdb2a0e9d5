//! In-memory scene graph
//!
//! Named nodes with a parent/child hierarchy, one render layer each, a local
//! position and optional local renderable bounds. World positions and bounds
//! are resolved by walking up the parent chain.

use std::collections::HashMap;

use glam::Vec3;
use void_shadow::{Aabb, LayerId, NodeId, SceneGraph};

#[derive(Clone, Debug)]
struct SceneNode {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    layer: LayerId,
    local_position: Vec3,
    local_bounds: Option<Aabb>,
}

/// Scene graph backed by a flat node list
#[derive(Clone, Debug, Default)]
pub struct HeadlessScene {
    nodes: Vec<SceneNode>,
    names: HashMap<String, NodeId>,
    layer_writes: u64,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its id
    pub fn spawn(&mut self, name: impl Into<String>, parent: Option<NodeId>, layer: LayerId) -> NodeId {
        let name = name.into();
        let id = NodeId(self.nodes.len() as u64);

        if let Some(parent) = parent {
            match self.node_mut(parent) {
                Some(node) => node.children.push(id),
                None => log::warn!("Spawning '{}' under unknown parent {:?}, attaching to root", name, parent),
            }
        }
        let parent = parent.filter(|p| self.contains(*p));

        self.names.insert(name.clone(), id);
        self.nodes.push(SceneNode {
            name,
            parent,
            children: Vec::new(),
            layer,
            local_position: Vec3::ZERO,
            local_bounds: None,
        });
        id
    }

    /// Start a builder for a node
    pub fn build(&mut self, name: impl Into<String>) -> NodeBuilder<'_> {
        NodeBuilder {
            scene: self,
            name: name.into(),
            parent: None,
            layer: LayerId::DEFAULT,
            position: Vec3::ZERO,
            bounds: None,
        }
    }

    /// Look up a node by name
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.node(node).map(|n| n.name.as_str())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    /// All node ids in spawn order
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u64).map(NodeId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Position relative to the parent
    pub fn set_local_position(&mut self, node: NodeId, position: Vec3) {
        if let Some(n) = self.node_mut(node) {
            n.local_position = position;
        }
    }

    pub fn local_position(&self, node: NodeId) -> Vec3 {
        self.node(node).map_or(Vec3::ZERO, |n| n.local_position)
    }

    /// Renderable bounds relative to the node
    pub fn set_local_bounds(&mut self, node: NodeId, bounds: Option<Aabb>) {
        if let Some(n) = self.node_mut(node) {
            n.local_bounds = bounds;
        }
    }

    /// Every node of a subtree with its layer, depth first
    pub fn layer_snapshot(&self, root: NodeId) -> Vec<(NodeId, LayerId)> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let Some(n) = self.node(node) else {
                continue;
            };
            out.push((node, n.layer));
            stack.extend(n.children.iter().rev().copied());
        }
        out
    }

    /// Number of `set_layer` calls so far
    pub fn layer_writes(&self) -> u64 {
        self.layer_writes
    }

    fn node(&self, node: NodeId) -> Option<&SceneNode> {
        self.nodes.get(node.0 as usize)
    }

    fn node_mut(&mut self, node: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(node.0 as usize)
    }
}

impl SceneGraph for HeadlessScene {
    fn layer(&self, node: NodeId) -> LayerId {
        self.node(node).map_or(LayerId::DEFAULT, |n| n.layer)
    }

    fn set_layer(&mut self, node: NodeId, layer: LayerId) {
        if let Some(n) = self.node_mut(node) {
            n.layer = layer;
            self.layer_writes += 1;
        }
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    fn world_position(&self, node: NodeId) -> Vec3 {
        let mut position = Vec3::ZERO;
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(n) = self.node(id) else {
                break;
            };
            position += n.local_position;
            current = n.parent;
        }
        position
    }

    fn renderable_bounds(&self, node: NodeId) -> Option<Aabb> {
        let bounds = self.node(node)?.local_bounds?;
        Some(Aabb::new(bounds.center + self.world_position(node), bounds.extents))
    }
}

/// Fluent node construction
pub struct NodeBuilder<'a> {
    scene: &'a mut HeadlessScene,
    name: String,
    parent: Option<NodeId>,
    layer: LayerId,
    position: Vec3,
    bounds: Option<Aabb>,
}

impl NodeBuilder<'_> {
    pub fn parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn layer(mut self, layer: LayerId) -> Self {
        self.layer = layer;
        self
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Renderable box centered on the node
    pub fn extents(mut self, extents: Vec3) -> Self {
        self.bounds = Some(Aabb::new(Vec3::ZERO, extents));
        self
    }

    pub fn spawn(self) -> NodeId {
        let id = self.scene.spawn(self.name, self.parent, self.layer);
        self.scene.set_local_position(id, self.position);
        self.scene.set_local_bounds(id, self.bounds);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_position_accumulates() {
        let mut scene = HeadlessScene::new();
        let root = scene.build("Root").position(Vec3::new(1.0, 0.0, 0.0)).spawn();
        let child = scene
            .build("Child")
            .parent(root)
            .position(Vec3::new(0.0, 2.0, 0.0))
            .extents(Vec3::ONE)
            .spawn();

        assert_eq!(scene.world_position(child), Vec3::new(1.0, 2.0, 0.0));
        let bounds = scene.renderable_bounds(child).unwrap();
        assert_eq!(bounds.center, Vec3::new(1.0, 2.0, 0.0));
        assert!(scene.renderable_bounds(root).is_none());
        assert_eq!(scene.find("Child"), Some(child));
        assert_eq!(scene.parent(child), Some(root));
    }

    #[test]
    fn test_layer_snapshot_order() {
        let mut scene = HeadlessScene::new();
        let layer = LayerId::new(8).unwrap();
        let root = scene.build("Root").layer(layer).spawn();
        let a = scene.build("A").parent(root).layer(layer).spawn();
        let b = scene.build("B").parent(root).spawn();
        let a1 = scene.build("A1").parent(a).layer(layer).spawn();

        let snapshot = scene.layer_snapshot(root);
        let order: Vec<NodeId> = snapshot.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![root, a, a1, b]);
        assert_eq!(snapshot[3].1, LayerId::DEFAULT);
    }

    #[test]
    fn test_unknown_nodes_are_harmless() {
        let mut scene = HeadlessScene::new();
        let ghost = NodeId(42);
        scene.set_layer(ghost, LayerId::LAST);
        assert_eq!(scene.layer(ghost), LayerId::DEFAULT);
        assert!(scene.children(ghost).is_empty());
        assert_eq!(scene.layer_writes(), 0);
    }
}
