//! Segment tree: an arena of named segments, each optionally carrying a
//! [`KinematicJoint`].
//!
//! Segments are stored in insertion order and a segment can only be added
//! under an existing parent, so every parent index is lower than its
//! children's. World poses can therefore be computed in one forward sweep.

use evoik_core::TopologyError;
use nalgebra::Vector3;

use crate::joint::KinematicJoint;
use crate::pose::Pose;

// ---------------------------------------------------------------------------
// SegmentId / Segment
// ---------------------------------------------------------------------------

/// Stable index of a segment inside a [`Topology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub usize);

impl SegmentId {
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One rigid segment of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    name: String,
    parent: Option<SegmentId>,
    children: Vec<SegmentId>,
    reference: Pose,
    joint: Option<KinematicJoint>,
}

impl Segment {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn parent(&self) -> Option<SegmentId> {
        self.parent
    }

    pub fn children(&self) -> &[SegmentId] {
        &self.children
    }

    /// Rest pose relative to the parent segment.
    pub const fn reference(&self) -> &Pose {
        &self.reference
    }

    pub const fn joint(&self) -> Option<&KinematicJoint> {
        self.joint.as_ref()
    }

    /// Local pose with the joint (if any) at its target values.
    pub fn target_pose(&self) -> Pose {
        match &self.joint {
            Some(joint) => {
                let [x, y, z] = joint.target_values();
                joint.local_pose(x, y, z)
            }
            None => self.reference,
        }
    }

    /// Local pose with the joint (if any) at its actuated values.
    pub fn current_pose(&self) -> Pose {
        match &self.joint {
            Some(joint) => {
                let v = joint.current_values();
                joint.local_pose(v.x, v.y, v.z)
            }
            None => self.reference,
        }
    }
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// A tree (or forest) of segments with an optional world offset for roots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Topology {
    segments: Vec<Segment>,
    origin: Pose,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// World frame the root segments are expressed in.
    pub const fn origin(&self) -> &Pose {
        &self.origin
    }

    /// Move the frame the root segments hang from, e.g. a mobile base.
    pub const fn set_origin(&mut self, origin: Pose) {
        self.origin = origin;
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// All segment ids, parents before children.
    pub fn ids(&self) -> impl Iterator<Item = SegmentId> + '_ {
        (0..self.segments.len()).map(SegmentId)
    }

    /// Add a parentless segment.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::DuplicateSegment`] if the name is taken.
    pub fn add_root(&mut self, name: &str, reference: Pose) -> Result<SegmentId, TopologyError> {
        self.push(name, None, reference)
    }

    /// Add a segment under `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownSegment`] if `parent` does not exist,
    /// or [`TopologyError::DuplicateSegment`] if the name is taken.
    pub fn add_segment(
        &mut self,
        parent: SegmentId,
        name: &str,
        reference: Pose,
    ) -> Result<SegmentId, TopologyError> {
        if parent.0 >= self.segments.len() {
            return Err(TopologyError::UnknownSegment(parent.0));
        }
        let id = self.push(name, Some(parent), reference)?;
        self.segments[parent.0].children.push(id);
        Ok(id)
    }

    fn push(
        &mut self,
        name: &str,
        parent: Option<SegmentId>,
        reference: Pose,
    ) -> Result<SegmentId, TopologyError> {
        if self.find(name).is_some() {
            return Err(TopologyError::DuplicateSegment(name.to_string()));
        }
        let id = SegmentId(self.segments.len());
        self.segments.push(Segment {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            reference,
            joint: None,
        });
        Ok(id)
    }

    /// Attach `joint` to a segment, capturing the segment's rest pose as the
    /// joint's reference. Replaces any joint already attached.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownSegment`] if `id` does not exist.
    pub fn attach_joint(
        &mut self,
        id: SegmentId,
        mut joint: KinematicJoint,
    ) -> Result<(), TopologyError> {
        let segment = self.segment_mut(id)?;
        joint.capture_reference(&segment.reference);
        if segment.joint.is_some() {
            tracing::debug!(segment = %segment.name, "replacing joint");
        }
        segment.joint = Some(joint);
        Ok(())
    }

    /// Change a segment's rest pose. An attached joint recaptures it.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownSegment`] if `id` does not exist.
    pub fn set_reference(&mut self, id: SegmentId, reference: Pose) -> Result<(), TopologyError> {
        let segment = self.segment_mut(id)?;
        segment.reference = reference;
        if let Some(joint) = &mut segment.joint {
            joint.capture_reference(&reference);
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<SegmentId> {
        self.segments
            .iter()
            .position(|s| s.name == name)
            .map(SegmentId)
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id.0)
    }

    fn segment_mut(&mut self, id: SegmentId) -> Result<&mut Segment, TopologyError> {
        self.segments
            .get_mut(id.0)
            .ok_or(TopologyError::UnknownSegment(id.0))
    }

    pub fn parent(&self, id: SegmentId) -> Option<SegmentId> {
        self.segment(id).and_then(Segment::parent)
    }

    pub fn joint(&self, id: SegmentId) -> Option<&KinematicJoint> {
        self.segment(id).and_then(Segment::joint)
    }

    pub fn joint_mut(&mut self, id: SegmentId) -> Option<&mut KinematicJoint> {
        self.segments.get_mut(id.0).and_then(|s| s.joint.as_mut())
    }

    /// Ids of every segment carrying a joint, parents first.
    pub fn joint_ids(&self) -> Vec<SegmentId> {
        self.ids().filter(|&id| self.joint(id).is_some()).collect()
    }

    /// True if `ancestor` lies on the parent path of `id` (or equals it).
    pub fn is_ancestor(&self, ancestor: SegmentId, id: SegmentId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// World pose of every segment with joints at their target values,
    /// indexed by [`SegmentId`].
    pub fn world_poses(&self) -> Vec<Pose> {
        self.sweep(Segment::target_pose)
    }

    /// World pose of every segment with joints at their actuated values.
    pub fn current_world_poses(&self) -> Vec<Pose> {
        self.sweep(Segment::current_pose)
    }

    fn sweep(&self, local: impl Fn(&Segment) -> Pose) -> Vec<Pose> {
        let mut world: Vec<Pose> = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            let parent = segment.parent.map_or(&self.origin, |p| &world[p.0]);
            let pose = parent.concat(&local(segment));
            world.push(pose);
        }
        world
    }

    /// World pose of one segment with joints at their target values.
    pub fn world_pose(&self, id: SegmentId) -> Option<Pose> {
        self.segment(id)?;
        let mut path = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            path.push(current);
            cursor = self.parent(current);
        }
        let pose = path.iter().rev().fold(self.origin, |acc, &sid| {
            acc.concat(&self.segments[sid.0].target_pose())
        });
        Some(pose)
    }

    /// World-space pivot of the joint on `id`, if it has one.
    ///
    /// The pivot is expressed in the segment's own frame, so it moves with
    /// the joint.
    pub fn connection_in_world(&self, id: SegmentId) -> Option<Vector3<f32>> {
        let joint = self.joint(id)?;
        let world = self.world_pose(id)?;
        Some(joint.connection_in(&world))
    }

    /// Advance every joint's motion profile by `dt` seconds.
    pub fn actuate(&mut self, dt: f32) {
        for joint in self.segments.iter_mut().filter_map(|s| s.joint.as_mut()) {
            joint.apply(dt);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::{Axis, JointType};
    use crate::motion::JointMotion;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn hinge() -> KinematicJoint {
        KinematicJoint::new(JointType::Revolute)
            .with_motion(Axis::Z, JointMotion::free(JointType::Revolute, -PI, PI))
    }

    /// base -> shoulder (hinge) -> tip, 1 m along X.
    fn arm() -> (Topology, SegmentId, SegmentId, SegmentId) {
        let mut t = Topology::new();
        let base = t.add_root("base", Pose::identity()).unwrap();
        let shoulder = t.add_segment(base, "shoulder", Pose::identity()).unwrap();
        let tip = t
            .add_segment(shoulder, "tip", Pose::from_position(Vector3::new(1.0, 0.0, 0.0)))
            .unwrap();
        t.attach_joint(shoulder, hinge()).unwrap();
        (t, base, shoulder, tip)
    }

    #[test]
    fn add_and_find() {
        let (t, base, shoulder, tip) = arm();
        assert_eq!(t.len(), 3);
        assert_eq!(t.find("shoulder"), Some(shoulder));
        assert_eq!(t.find("missing"), None);
        assert_eq!(t.parent(tip), Some(shoulder));
        assert_eq!(t.segment(base).unwrap().children(), &[shoulder]);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut t = Topology::new();
        t.add_root("base", Pose::identity()).unwrap();
        let err = t.add_root("base", Pose::identity()).unwrap_err();
        assert_eq!(err, TopologyError::DuplicateSegment("base".into()));
    }

    #[test]
    fn unknown_parent_rejected() {
        let mut t = Topology::new();
        let err = t
            .add_segment(SegmentId(4), "orphan", Pose::identity())
            .unwrap_err();
        assert_eq!(err, TopologyError::UnknownSegment(4));
        assert!(t.is_empty());
    }

    #[test]
    fn attach_to_unknown_segment_rejected() {
        let mut t = Topology::new();
        let err = t.attach_joint(SegmentId(0), hinge()).unwrap_err();
        assert_eq!(err, TopologyError::UnknownSegment(0));
    }

    #[test]
    fn attach_captures_reference() {
        let mut t = Topology::new();
        let rest = Pose::from_position(Vector3::new(0.0, 0.0, 0.3));
        let base = t.add_root("base", rest).unwrap();
        t.attach_joint(base, hinge()).unwrap();
        assert_eq!(t.joint(base).unwrap().reference(), &rest);
    }

    #[test]
    fn world_poses_follow_targets() {
        let (mut t, _, shoulder, tip) = arm();
        t.joint_mut(shoulder)
            .unwrap()
            .motion_mut(Axis::Z)
            .set_target(FRAC_PI_2);
        let world = t.world_poses();
        assert_relative_eq!(world[tip.0].position, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(
            t.world_pose(tip).unwrap().position,
            world[tip.0].position,
            epsilon = 1e-6
        );
        // Not actuated yet.
        let current = t.current_world_poses();
        assert_relative_eq!(current[tip.0].position, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn actuate_moves_current_values() {
        let (mut t, _, shoulder, tip) = arm();
        t.joint_mut(shoulder)
            .unwrap()
            .motion_mut(Axis::Z)
            .set_target(PI - 0.01);
        t.actuate(0.02);
        let current = t.current_world_poses();
        assert_relative_eq!(current[tip.0].position.x, (PI - 0.01).cos(), epsilon = 1e-5);
    }

    #[test]
    fn origin_offsets_roots() {
        let (mut t, _, _, tip) = arm();
        t.set_origin(Pose::new(
            Vector3::new(0.0, 0.0, 2.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI),
        ));
        let p = t.world_pose(tip).unwrap().position;
        assert_relative_eq!(p, Vector3::new(-1.0, 0.0, 2.0), epsilon = 1e-5);
    }

    #[test]
    fn ancestry() {
        let (t, base, shoulder, tip) = arm();
        assert!(t.is_ancestor(base, tip));
        assert!(t.is_ancestor(tip, tip));
        assert!(!t.is_ancestor(tip, shoulder));
    }

    #[test]
    fn joint_ids_in_order() {
        let (t, _, shoulder, _) = arm();
        assert_eq!(t.joint_ids(), vec![shoulder]);
    }

    #[test]
    fn set_reference_recaptures_joint() {
        let (mut t, _, shoulder, _) = arm();
        let moved = Pose::from_position(Vector3::new(0.0, 0.5, 0.0));
        t.set_reference(shoulder, moved).unwrap();
        assert_eq!(t.joint(shoulder).unwrap().reference(), &moved);
    }

    #[test]
    fn connection_in_world_tracks_segment() {
        let mut t = Topology::new();
        let base = t.add_root("base", Pose::identity()).unwrap();
        let link = t
            .add_segment(base, "link", Pose::from_position(Vector3::new(0.0, 0.0, 1.0)))
            .unwrap();
        t.attach_joint(link, hinge().with_connection(Vector3::new(0.1, 0.0, 0.0)))
            .unwrap();
        assert_relative_eq!(
            t.connection_in_world(link).unwrap(),
            Vector3::new(0.1, 0.0, 1.0),
            epsilon = 1e-6
        );
        assert!(t.connection_in_world(base).is_none());
    }
}
