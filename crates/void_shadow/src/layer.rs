//! Render layers and isolation channels
//!
//! Layers are the host's visibility channels: every camera carries a
//! [`LayerMask`] and only renders nodes whose layer is in that mask. The
//! shadow caster borrows one layer per instance as a private isolation
//! channel:
//!
//! - [`LayerPool`] hands out channels from a reserved range so concurrent
//!   casters never share one
//! - [`LayerLease`] returns its channel to the pool when dropped
//! - [`LayerIsolator`] moves a subtree onto the channel for the capture pass
//!   and back again afterwards

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{ShadowError, ShadowResult};
use crate::host::{NodeId, SceneGraph};

/// Number of layer slots available on the host
pub const MAX_LAYERS: u8 = 32;

/// A render layer slot (0..32)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerId(u8);

impl LayerId {
    /// The default layer shared by most of the scene
    pub const DEFAULT: Self = Self(0);

    /// The last user layer
    pub const LAST: Self = Self(MAX_LAYERS - 1);

    /// Create a layer id, `None` if the index is out of range
    #[inline]
    pub const fn new(index: u8) -> Option<Self> {
        if index < MAX_LAYERS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Slot index
    #[inline]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Check if this is the default/shared layer
    #[inline]
    pub const fn is_default(self) -> bool {
        self.0 == 0
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Set of render layers (one bit per slot)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerMask(u32);

impl LayerMask {
    /// No layers
    pub const NONE: Self = Self(0);

    /// All layers
    pub const ALL: Self = Self(u32::MAX);

    /// Mask containing exactly one layer
    #[inline]
    pub const fn only(layer: LayerId) -> Self {
        Self(1 << layer.0)
    }

    /// Mask containing every layer except one
    #[inline]
    pub const fn all_except(layer: LayerId) -> Self {
        Self(!(1 << layer.0))
    }

    /// Create from raw bits
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check if empty
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if a layer is in the mask
    #[inline]
    pub const fn contains(self, layer: LayerId) -> bool {
        self.0 & (1 << layer.0) != 0
    }

    /// Add a layer
    #[inline]
    pub fn insert(&mut self, layer: LayerId) {
        self.0 |= 1 << layer.0;
    }

    /// Remove a layer
    #[inline]
    pub fn remove(&mut self, layer: LayerId) {
        self.0 &= !(1 << layer.0);
    }

    /// Number of layers in the mask
    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }
}

/// Reserved layer range for isolation channels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerPoolConfig {
    /// First reserved layer
    pub first: u8,
    /// Number of reserved layers (hard limit on concurrently active casters)
    pub count: u8,
}

impl Default for LayerPoolConfig {
    fn default() -> Self {
        // Upper eight user layers: 24..=31
        Self { first: 24, count: 8 }
    }
}

impl LayerPoolConfig {
    /// Clamp the range to the available layer slots, never touching layer 0
    pub fn validate(&mut self) {
        self.first = self.first.clamp(1, MAX_LAYERS - 1);
        self.count = self.count.clamp(1, MAX_LAYERS - self.first);
    }
}

/// Allocator for private isolation channels
///
/// Gameplay code must not put anything on the reserved layers. The pool
/// capacity is the hard limit on how many shadow casters can be active at
/// the same time; further activations fail with
/// [`ShadowError::LayerPoolExhausted`].
#[derive(Debug)]
pub struct LayerPool {
    /// Reserved layers
    reserved: LayerMask,
    /// Free layers (stack, pop from end)
    free: Vec<LayerId>,
    /// Number of reserved layers
    capacity: usize,
}

/// Layer pool shared between all casters of a host
pub type SharedLayerPool = Arc<Mutex<LayerPool>>;

impl LayerPool {
    /// Create a pool over a reserved range
    pub fn new(mut config: LayerPoolConfig) -> Self {
        config.validate();

        let layers: Vec<LayerId> = (config.first..config.first + config.count)
            .filter_map(LayerId::new)
            .collect();

        let mut reserved = LayerMask::NONE;
        for &layer in &layers {
            reserved.insert(layer);
        }

        // Stack: hand out the highest layer first
        Self {
            reserved,
            capacity: layers.len(),
            free: layers,
        }
    }

    /// Pool with a single fixed channel
    pub fn single(layer: LayerId) -> Self {
        Self::new(LayerPoolConfig {
            first: layer.index(),
            count: 1,
        })
    }

    /// Wrap into a shared handle
    pub fn shared(self) -> SharedLayerPool {
        Arc::new(Mutex::new(self))
    }

    /// Take a free channel
    pub fn acquire(&mut self) -> ShadowResult<LayerId> {
        self.free.pop().ok_or(ShadowError::LayerPoolExhausted {
            capacity: self.capacity,
        })
    }

    /// Return a channel to the pool
    ///
    /// Returns false for layers outside the reserved range or already free.
    pub fn release(&mut self, layer: LayerId) -> bool {
        if !self.reserved.contains(layer) || self.free.contains(&layer) {
            log::warn!("Ignoring release of layer {} not leased from pool", layer.index());
            return false;
        }
        self.free.push(layer);
        true
    }

    /// Reserved layers as a mask
    pub fn reserved(&self) -> LayerMask {
        self.reserved
    }

    /// Total channels
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Channels currently leased
    pub fn in_use(&self) -> usize {
        self.capacity - self.free.len()
    }

    /// Channels still available
    pub fn available(&self) -> usize {
        self.free.len()
    }
}

impl Default for LayerPool {
    fn default() -> Self {
        Self::new(LayerPoolConfig::default())
    }
}

/// A channel leased from a [`SharedLayerPool`], released on drop
#[derive(Debug)]
pub struct LayerLease {
    pool: SharedLayerPool,
    layer: LayerId,
}

impl LayerLease {
    /// Lease a channel from the pool
    pub fn acquire(pool: &SharedLayerPool) -> ShadowResult<Self> {
        let layer = pool.lock().acquire()?;
        log::debug!("Leased isolation layer {}", layer.index());
        Ok(Self {
            pool: Arc::clone(pool),
            layer,
        })
    }

    /// The leased layer
    pub fn layer(&self) -> LayerId {
        self.layer
    }
}

impl Drop for LayerLease {
    fn drop(&mut self) {
        self.pool.lock().release(self.layer);
        log::debug!("Released isolation layer {}", self.layer.index());
    }
}

/// Nodes moved onto a private layer by one [`LayerIsolator::isolate`] call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IsolatedNodes {
    saved: LayerId,
    nodes: Vec<NodeId>,
}

impl IsolatedNodes {
    /// Layer the nodes are restored to
    pub fn saved(&self) -> LayerId {
        self.saved
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Moves a subtree onto a private layer and back
///
/// `isolate` and `restore` must be called in matched pairs around the capture
/// pass, once per frame. Both are plain state mutation and cannot fail.
/// Only the nodes `isolate` moved are restored, so a node that already sat on
/// the private layer keeps it.
#[derive(Clone, Copy, Debug)]
pub struct LayerIsolator {
    private: LayerId,
}

impl LayerIsolator {
    /// Create an isolator for a private layer
    pub fn new(private: LayerId) -> Self {
        Self { private }
    }

    /// The private layer nodes are moved onto
    pub fn private_layer(&self) -> LayerId {
        self.private
    }

    /// Move every node of the subtree currently on `from` to the private layer
    pub fn isolate<S>(&self, scene: &mut S, root: NodeId, from: LayerId) -> IsolatedNodes
    where
        S: SceneGraph + ?Sized,
    {
        let mut nodes = Vec::new();
        if from != self.private {
            let mut stack = vec![root];
            while let Some(node) = stack.pop() {
                if scene.layer(node) == from {
                    scene.set_layer(node, self.private);
                    nodes.push(node);
                }
                stack.extend_from_slice(scene.children(node));
            }
        }
        log::trace!(
            "Isolated {} node(s) from layer {} onto layer {}",
            nodes.len(),
            from.index(),
            self.private.index()
        );
        IsolatedNodes { saved: from, nodes }
    }

    /// Move the nodes `isolate` moved back to their saved layer
    ///
    /// Nodes the host moved off the private layer in between are left alone.
    pub fn restore<S>(&self, scene: &mut S, isolated: IsolatedNodes)
    where
        S: SceneGraph + ?Sized,
    {
        let mut moved = 0;
        for &node in &isolated.nodes {
            if scene.layer(node) == self.private {
                scene.set_layer(node, isolated.saved);
                moved += 1;
            }
        }
        log::trace!(
            "Restored {} node(s) from layer {} to layer {}",
            moved,
            self.private.index(),
            isolated.saved.index()
        );
    }
}
