//! Kinematic chain between a root segment and a tip segment.
//!
//! A [`Chain`] lists the segments on the parent path from `root` to `tip`
//! and the subset of those segments whose joint has at least one free axis.
//! Its length (sum of distances between consecutive joint pivots, plus the
//! last pivot to the tip) is used to normalise positional error.

use evoik_core::TopologyError;
use nalgebra::Vector3;

use crate::joint::KinematicJoint;
use crate::pose::Pose;
use crate::topology::{SegmentId, Topology};

/// Ordered root-to-tip path through a [`Topology`].
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    segments: Vec<SegmentId>,
    joints: Vec<SegmentId>,
    length: f32,
    dof: usize,
}

impl Chain {
    /// Build the chain from `root` down to `tip`.
    ///
    /// Distances are measured with every joint at its target values.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownSegment`] if either id is out of
    /// range, or [`TopologyError::Unreachable`] if `root` is not an
    /// ancestor of `tip`.
    pub fn new(topology: &Topology, root: SegmentId, tip: SegmentId) -> Result<Self, TopologyError> {
        for id in [root, tip] {
            if topology.segment(id).is_none() {
                return Err(TopologyError::UnknownSegment(id.0));
            }
        }
        if !topology.is_ancestor(root, tip) {
            return Err(TopologyError::Unreachable {
                root: root.0,
                tip: tip.0,
            });
        }

        let mut segments = Vec::new();
        let mut cursor = Some(tip);
        while let Some(id) = cursor {
            segments.push(id);
            if id == root {
                break;
            }
            cursor = topology.parent(id);
        }
        segments.reverse();

        let joints: Vec<SegmentId> = segments
            .iter()
            .copied()
            .filter(|&id| topology.joint(id).is_some_and(|j| j.dof() > 0))
            .collect();

        let dof = joints
            .iter()
            .filter_map(|&id| topology.joint(id))
            .map(KinematicJoint::dof)
            .sum();

        let mut chain = Self {
            segments,
            joints,
            length: 0.0,
            dof,
        };
        chain.measure(topology, &topology.world_poses());
        Ok(chain)
    }

    /// Recompute [`Chain::length`] from world poses indexed by [`SegmentId`].
    pub fn measure(&mut self, topology: &Topology, world: &[Pose]) {
        let Some(tip) = self.tip() else {
            self.length = 0.0;
            return;
        };
        let pivots: Vec<Vector3<f32>> = self
            .joints
            .iter()
            .filter_map(|&id| Some(topology.joint(id)?.connection_in(world.get(id.0)?)))
            .collect();
        let between: f32 = pivots.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
        let last = match (pivots.last(), world.get(tip.0)) {
            (Some(pivot), Some(end)) => (end.position - pivot).norm(),
            _ => 0.0,
        };
        self.length = between + last;
    }

    /// World-space pivot of the first free joint, if any.
    pub fn anchor(&self, topology: &Topology, world: &[Pose]) -> Option<Vector3<f32>> {
        let first = *self.joints.first()?;
        Some(topology.joint(first)?.connection_in(world.get(first.0)?))
    }

    /// Segments from root to tip, inclusive.
    pub fn segments(&self) -> &[SegmentId] {
        &self.segments
    }

    /// Segments whose joint has at least one free axis, root first.
    pub fn joints(&self) -> &[SegmentId] {
        &self.joints
    }

    /// Sum of distances between consecutive joint pivots plus the last pivot
    /// to the tip. Zero when the chain has no free joint.
    pub const fn length(&self) -> f32 {
        self.length
    }

    /// Total number of free axes along the chain.
    pub const fn dof(&self) -> usize {
        self.dof
    }

    pub fn root(&self) -> Option<SegmentId> {
        self.segments.first().copied()
    }

    pub fn tip(&self) -> Option<SegmentId> {
        self.segments.last().copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
