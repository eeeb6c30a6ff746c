//! Forward-kinematics scratchpad and multi-objective fitness.
//!
//! A [`Model`] mirrors the part of a [`Topology`] that lies on a path from
//! the root to some tip. Nodes live in an arena, parents before children,
//! so a configuration is pushed through the tree in one forward sweep. Only
//! nodes whose own axis values changed, or whose parent moved, recompute
//! their transforms.

use std::collections::HashMap;
use std::f32::consts::PI;

use nalgebra::{UnitQuaternion, Vector3};
use rand::Rng;

use evoik_core::TopologyError;
use evoik_kinematics::{Axis, Chain, JointMotion, KinematicJoint, Pose, SegmentId, Topology};

use crate::objective::{Objective, ObjectiveKind, Tip};

/// Uniform draw in `[lo, hi)`; a zero-width range returns `lo`.
pub(crate) fn uniform(rng: &mut impl Rng, lo: f32, hi: f32) -> f32 {
    lo + rng.r#gen::<f32>() * (hi - lo)
}

// ---------------------------------------------------------------------------
// MotionPtr / TipPtr / Residual
// ---------------------------------------------------------------------------

/// Binds one free joint axis to its position in the configuration vector.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPtr {
    /// Gene index.
    pub index: usize,
    /// Owning node.
    pub node: usize,
    pub segment: SegmentId,
    pub axis: Axis,
    motion: JointMotion,
}

impl MotionPtr {
    /// Snapshot of the axis, refreshed by [`Model::update_state`].
    pub const fn motion(&self) -> &JointMotion {
        &self.motion
    }

    pub fn lower_limit(&self) -> f32 {
        self.motion.lower_limit()
    }

    pub fn upper_limit(&self) -> f32 {
        self.motion.upper_limit()
    }
}

/// Binds an objective to the node it is evaluated at.
#[derive(Debug, Clone, PartialEq)]
pub struct TipPtr {
    pub index: usize,
    pub node: usize,
    pub segment: SegmentId,
    pub objective: Objective,
}

/// Errors of one tip under some configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Residual {
    /// Distance to the target position.
    pub position: f32,
    /// Angle to the target orientation (radians).
    pub orientation: f32,
    /// Angle between the look-at direction and the target (radians).
    pub direction: f32,
}

impl Residual {
    /// Whether the residuals the objective cares about are within tolerance.
    pub fn within(&self, objective: &Objective) -> bool {
        match objective.kind {
            ObjectiveKind::Position => self.position <= objective.max_position_error,
            ObjectiveKind::Orientation => self.orientation <= objective.max_orientation_error,
            ObjectiveKind::Pose => {
                self.position <= objective.max_position_error
                    && self.orientation <= objective.max_orientation_error
            }
            ObjectiveKind::LookAt => self.direction <= objective.max_direction_error,
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Node {
    segment: SegmentId,
    parent: Option<usize>,
    joint: Option<KinematicJoint>,
    reference: Pose,
    motions: [Option<usize>; 3],
    values: [f32; 3],
    local: Pose,
    world: Pose,
    moved: bool,
    heuristic_error: f32,
    heuristic_inputs: f32,
    chain: Chain,
    anchor: Option<Vector3<f32>>,
}

impl Node {
    fn translational_distance(&self, target: &Vector3<f32>) -> f32 {
        (target - self.world.position).norm()
    }

    fn rotational_distance(&self, target: &UnitQuaternion<f32>) -> f32 {
        let dot = self.world.rotation.coords.dot(&target.coords).abs();
        2.0 * dot.min(1.0).acos()
    }

    fn directional_error(&self, target: &Vector3<f32>, direction: &Vector3<f32>) -> f32 {
        (self.world.rotation * direction).angle(&(target - self.world.position))
    }

    /// Normaliser that keeps positional error comparable to angular error.
    fn angular_scale(&self) -> f32 {
        let Some(anchor) = self.anchor else {
            return 1.0;
        };
        let scale = (self.chain.length() * (self.world.position - anchor).norm()).sqrt() / PI;
        if scale > f32::EPSILON { scale } else { 1.0 }
    }

    fn local_from_values(&self) -> Pose {
        match &self.joint {
            Some(joint) => {
                let [x, y, z] = self.values;
                joint.local_pose(x, y, z)
            }
            None => self.reference,
        }
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Evaluator for joint configurations.
///
/// The configuration vector holds one value per free axis, ordered by
/// [`MotionPtr::index`]. The model is a single mutable scratchpad: every
/// evaluation overwrites the cached transforms.
#[derive(Debug, Clone)]
pub struct Model {
    root: SegmentId,
    nodes: Vec<Node>,
    motions: Vec<MotionPtr>,
    tips: Vec<TipPtr>,
    lookup: HashMap<SegmentId, usize>,
    origin: Pose,
}

impl Model {
    /// Build the node tree from `root` to every tip.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownSegment`] for ids outside the
    /// topology and [`TopologyError::Unreachable`] when a tip does not hang
    /// below `root`.
    pub fn new(topology: &Topology, root: SegmentId, tips: &[Tip]) -> Result<Self, TopologyError> {
        if topology.segment(root).is_none() {
            return Err(TopologyError::UnknownSegment(root.0));
        }
        let mut model = Self {
            root,
            nodes: Vec::new(),
            motions: Vec::new(),
            tips: Vec::with_capacity(tips.len()),
            lookup: HashMap::new(),
            origin: *topology.origin(),
        };
        model.add_node(topology, root)?;

        for tip in tips {
            let chain = Chain::new(topology, root, tip.segment)?;
            for &segment in chain.segments().iter().skip(1) {
                model.add_node(topology, segment)?;
            }
            let node = model
                .lookup
                .get(&tip.segment)
                .copied()
                .ok_or(TopologyError::UnknownSegment(tip.segment.0))?;
            model.tips.push(TipPtr {
                index: model.tips.len(),
                node,
                segment: tip.segment,
                objective: tip.objective.clone(),
            });
        }

        model.update_state(topology);
        Ok(model)
    }

    fn add_node(&mut self, topology: &Topology, segment: SegmentId) -> Result<(), TopologyError> {
        if self.lookup.contains_key(&segment) {
            return Ok(());
        }
        let reference = *topology
            .segment(segment)
            .ok_or(TopologyError::UnknownSegment(segment.0))?
            .reference();
        let parent = if segment == self.root {
            None
        } else {
            topology
                .parent(segment)
                .and_then(|p| self.lookup.get(&p).copied())
        };

        let index = self.nodes.len();
        let joint = topology.joint(segment).filter(|j| j.dof() > 0).cloned();
        let mut motions = [None; 3];
        if let Some(joint) = &joint {
            for axis in Axis::ALL {
                let motion = joint.motion(axis);
                if motion.is_free() {
                    motions[axis.index()] = Some(self.motions.len());
                    self.motions.push(MotionPtr {
                        index: self.motions.len(),
                        node: index,
                        segment,
                        axis,
                        motion: motion.clone(),
                    });
                }
            }
        }

        self.nodes.push(Node {
            segment,
            parent,
            joint,
            reference,
            motions,
            values: [0.0; 3],
            local: reference,
            world: reference,
            moved: false,
            heuristic_error: 0.0,
            heuristic_inputs: 0.0,
            chain: Chain::new(topology, self.root, segment)?,
            anchor: None,
        });
        self.lookup.insert(segment, index);
        Ok(())
    }

    /// Pull reference poses, joint targets, limits, the root offset and chain
    /// anchors from `topology`, then recompute every transform at the
    /// joints' target values.
    pub fn update_state(&mut self, topology: &Topology) {
        let world = topology.world_poses();
        self.origin = topology
            .parent(self.root)
            .and_then(|p| world.get(p.0).copied())
            .unwrap_or(*topology.origin());

        for node in &mut self.nodes {
            let Some(segment) = topology.segment(node.segment) else {
                continue;
            };
            node.reference = *segment.reference();
            if let (Some(joint), Some(live)) = (node.joint.as_mut(), segment.joint()) {
                joint.clone_from(live);
            }
            node.chain.measure(topology, &world);
            node.anchor = node.chain.anchor(topology, &world);
        }
        for ptr in &mut self.motions {
            if let Some(joint) = topology.joint(ptr.segment) {
                ptr.motion.clone_from(joint.motion(ptr.axis));
            }
        }

        for i in 0..self.nodes.len() {
            let (done, rest) = self.nodes.split_at_mut(i);
            let node = &mut rest[0];
            if let Some(joint) = &node.joint {
                node.values = joint.target_values();
            }
            node.local = node.local_from_values();
            let base = node.parent.map_or(&self.origin, |p| &done[p].world);
            node.world = base.concat(&node.local);
            node.moved = false;
        }
    }

    /// Push a configuration through the tree.
    ///
    /// Resets every node's heuristic error.
    ///
    /// # Panics
    ///
    /// Panics if `configuration.len() != self.dimensionality()`.
    #[allow(clippy::float_cmp)]
    pub(crate) fn apply_configuration(&mut self, configuration: &[f32]) {
        assert_eq!(
            configuration.len(),
            self.motions.len(),
            "configuration length must equal model dimensionality"
        );
        for i in 0..self.nodes.len() {
            let (done, rest) = self.nodes.split_at_mut(i);
            let node = &mut rest[0];
            node.heuristic_error = 0.0;
            node.heuristic_inputs = 0.0;

            let mut update_local = false;
            for (value, motion) in node.values.iter_mut().zip(node.motions) {
                if let Some(m) = motion {
                    // Exact comparison: only genes that actually changed move.
                    if configuration[m] != *value {
                        *value = configuration[m];
                        update_local = true;
                    }
                }
            }
            if update_local {
                node.local = node.local_from_values();
            }

            let parent_moved = node.parent.is_some_and(|p| done[p].moved);
            let update_world = update_local || parent_moved;
            if update_world {
                let base = node.parent.map_or(&self.origin, |p| &done[p].world);
                node.world = base.concat(&node.local);
            }
            node.moved = update_world;
        }
    }

    /// Weighted sum of every tip's error under `configuration`. Lower is
    /// better.
    ///
    /// With `balanced` false, pose objectives mix translation and rotation
    /// with a fresh random weight per call; with `balanced` true the mix is
    /// 50/50. With `backpropagate`, each tip's contribution is folded into a
    /// running mean on every node from the tip up to the root.
    pub(crate) fn compute_fitness(
        &mut self,
        configuration: &[f32],
        balanced: bool,
        backpropagate: bool,
        rng: &mut impl Rng,
    ) -> f32 {
        self.apply_configuration(configuration);
        let mut sum = 0.0;
        for t in 0..self.tips.len() {
            let fitness = self.tip_fitness(&self.tips[t], balanced, rng);
            if backpropagate {
                self.backpropagate(self.tips[t].node, fitness);
            }
            sum += fitness;
        }
        sum
    }

    fn tip_fitness(&self, tip: &TipPtr, balanced: bool, rng: &mut impl Rng) -> f32 {
        let node = &self.nodes[tip.node];
        let objective = &tip.objective;
        let error = match objective.kind {
            ObjectiveKind::Position => {
                node.translational_distance(&objective.target_position) / node.angular_scale()
            }
            ObjectiveKind::Orientation => node.rotational_distance(&objective.target_rotation),
            ObjectiveKind::Pose => {
                let weight = if balanced { 0.5 } else { rng.r#gen::<f32>() };
                weight * node.translational_distance(&objective.target_position)
                    / node.angular_scale()
                    + (1.0 - weight) * node.rotational_distance(&objective.target_rotation)
            }
            ObjectiveKind::LookAt => {
                node.directional_error(&objective.target_position, &objective.direction)
            }
        };
        objective.weight() * error
    }

    fn backpropagate(&mut self, node: usize, fitness: f32) {
        let mut cursor = Some(node);
        while let Some(i) = cursor {
            let node = &mut self.nodes[i];
            node.heuristic_inputs += 1.0;
            node.heuristic_error = node.heuristic_error * (node.heuristic_inputs - 1.0)
                / node.heuristic_inputs
                + fitness / node.heuristic_inputs;
            cursor = node.parent;
        }
    }

    /// True iff every tip is within its tolerances under `configuration`.
    pub(crate) fn is_converged(&mut self, configuration: &[f32]) -> bool {
        self.apply_configuration(configuration);
        self.tips
            .iter()
            .all(|tip| self.residual(tip).within(&tip.objective))
    }

    /// Per-tip residuals under `configuration`, in tip order.
    pub(crate) fn resolve(&mut self, configuration: &[f32]) -> Vec<Residual> {
        self.apply_configuration(configuration);
        self.tips.iter().map(|tip| self.residual(tip)).collect()
    }

    fn residual(&self, tip: &TipPtr) -> Residual {
        let node = &self.nodes[tip.node];
        let objective = &tip.objective;
        Residual {
            position: node.translational_distance(&objective.target_position),
            orientation: node.rotational_distance(&objective.target_rotation),
            direction: node.directional_error(&objective.target_position, &objective.direction),
        }
    }

    // -- accessors --

    pub const fn root(&self) -> SegmentId {
        self.root
    }

    /// Number of free axes, i.e. configuration length.
    pub fn dimensionality(&self) -> usize {
        self.motions.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn motions(&self) -> &[MotionPtr] {
        &self.motions
    }

    pub fn tips(&self) -> &[TipPtr] {
        &self.tips
    }

    /// Replace a tip's objective without rebuilding.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownTip`] if `tip` is out of range.
    pub fn set_objective(&mut self, tip: usize, objective: Objective) -> Result<(), TopologyError> {
        let ptr = self
            .tips
            .get_mut(tip)
            .ok_or(TopologyError::UnknownTip(tip))?;
        ptr.objective = objective;
        Ok(())
    }

    /// World pose of a tip after the last evaluation.
    pub fn tip_pose(&self, tip: usize) -> Option<Pose> {
        let ptr = self.tips.get(tip)?;
        Some(self.nodes[ptr.node].world)
    }

    /// World pose of a modelled segment after the last evaluation.
    pub fn segment_pose(&self, segment: SegmentId) -> Option<Pose> {
        let node = self.lookup.get(&segment)?;
        Some(self.nodes[*node].world)
    }

    /// Heuristic error of the node owning gene `gene`, as left by the last
    /// back-propagating evaluation.
    pub fn heuristic_error(&self, gene: usize) -> f32 {
        self.nodes[self.motions[gene].node].heuristic_error
    }

    /// Clamp `value` into gene `gene`'s limits (identity for continuous axes).
    pub fn constrain(&self, gene: usize, value: f32) -> f32 {
        self.motions[gene].motion.constrain_to_limits(value)
    }

    /// Uniform random configuration within the joint limits.
    pub fn random_configuration(&self, rng: &mut impl Rng) -> Vec<f32> {
        self.motions
            .iter()
            .map(|m| uniform(rng, m.lower_limit(), m.upper_limit()))
            .collect()
    }

    /// The joints' target values.
    pub fn target_configuration(&self) -> Vec<f32> {
        self.motions.iter().map(|m| m.motion.target()).collect()
    }

    /// The joints' actuated values.
    pub fn current_configuration(&self) -> Vec<f32> {
        self.motions.iter().map(|m| m.motion.current()).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
