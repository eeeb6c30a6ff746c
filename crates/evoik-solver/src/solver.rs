//! Frame-driven solver: owns the topology, rebuilds the search when the
//! problem changes, and writes solutions back into joint targets.

use std::f32::consts::{PI, TAU};
use std::time::{Duration, Instant};

use tracing::debug;

use evoik_core::seed::rebuild_rng;
use evoik_core::{EvoIkError, SolverConfig, TopologyError};
use evoik_kinematics::{JointType, SegmentId, Topology};

use crate::evolution::Evolution;
use crate::model::{MotionPtr, Model, Residual};
use crate::objective::{Objective, Tip};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Counters for one call to [`Solver::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SolveStats {
    pub generations: u64,
    pub elapsed: Duration,
    /// Population reinitializations during this step.
    pub wipeouts: u64,
}

/// Outcome of one solver step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// Best configuration after the step.
    pub solution: Vec<f32>,
    /// Whether every tip is within tolerance under `solution`.
    pub converged: bool,
    /// Whether any generation improved the solution.
    pub improved: bool,
    pub stats: SolveStats,
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Owns a [`Topology`] and the [`Evolution`] searching over it.
///
/// Structural edits (tips, population size, elites, joint layout) rebuild
/// the model and population. Each rebuild `k` reseeds from
/// `rebuild_rng(config.seed, k)`.
#[derive(Debug, Clone)]
pub struct Solver {
    config: SolverConfig,
    topology: Topology,
    root: SegmentId,
    tips: Vec<Tip>,
    evolution: Evolution,
    rebuilds: u64,
}

impl Solver {
    /// # Errors
    ///
    /// Returns [`EvoIkError::Config`] for an invalid configuration and
    /// [`EvoIkError::InvalidTopology`] when `root` or a tip segment is
    /// unknown, or a tip does not hang below `root`.
    pub fn new(
        topology: Topology,
        root: SegmentId,
        tips: Vec<Tip>,
        config: SolverConfig,
    ) -> Result<Self, EvoIkError> {
        config.validate()?;
        let model = Model::new(&topology, root, &tips)?;
        let evolution = Evolution::new(
            model,
            config.population_size,
            config.elites,
            rebuild_rng(config.seed, 0),
        );
        debug!(
            dof = evolution.dimensionality(),
            tips = tips.len(),
            population = config.population_size,
            elites = config.elites,
            "solver built"
        );
        Ok(Self {
            config,
            topology,
            root,
            tips,
            evolution,
            rebuilds: 0,
        })
    }

    /// Rebuild the model and population from the current topology and tips.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError`] if a tip is no longer reachable; the
    /// previous search is kept in that case.
    pub fn rebuild(&mut self) -> Result<(), TopologyError> {
        let model = Model::new(&self.topology, self.root, &self.tips)?;
        self.rebuilds += 1;
        self.evolution = Evolution::new(
            model,
            self.config.population_size,
            self.config.elites,
            rebuild_rng(self.config.seed, self.rebuilds),
        );
        debug!(
            rebuild = self.rebuilds,
            dof = self.evolution.dimensionality(),
            tips = self.tips.len(),
            population = self.config.population_size,
            elites = self.config.elites,
            "solver rebuilt"
        );
        Ok(())
    }

    // -- frame loop --

    /// Search for at most `budget` of wall-clock time.
    ///
    /// Model state is refreshed from the topology first. Generations run
    /// only while the incumbent is not converged; every improving
    /// generation is written back into the joint targets.
    pub fn step(&mut self, budget: Duration) -> StepReport {
        self.run(|_, elapsed| elapsed < budget)
    }

    /// [`Solver::step`] with the configured `max_frame_time`.
    pub fn step_frame(&mut self) -> StepReport {
        self.step(self.config.frame_budget())
    }

    /// Like [`Solver::step`] but bounded by a generation count instead of
    /// time, so results do not depend on machine speed.
    pub fn step_generations(&mut self, max_generations: u64) -> StepReport {
        self.run(|generations, _| generations < max_generations)
    }

    fn run(&mut self, mut keep_going: impl FnMut(u64, Duration) -> bool) -> StepReport {
        let start = Instant::now();
        let wipeouts = self.evolution.wipeouts();

        self.evolution.model_mut().update_state(&self.topology);
        let mut converged = self.evolution.is_solution_converged();
        let mut improved = false;
        let mut generations = 0;

        while !converged
            && self.evolution.dimensionality() > 0
            && keep_going(generations, start.elapsed())
        {
            generations += 1;
            if self.evolution.evolve() {
                improved = true;
                assign_targets(
                    &mut self.topology,
                    self.evolution.model().motions(),
                    self.evolution.solution(),
                );
                converged = self.evolution.is_solution_converged();
            }
        }

        let stats = SolveStats {
            generations,
            elapsed: start.elapsed(),
            wipeouts: self.evolution.wipeouts() - wipeouts,
        };
        debug!(
            generations,
            converged,
            improved,
            wipeouts = stats.wipeouts,
            elapsed_us = u64::try_from(stats.elapsed.as_micros()).unwrap_or(u64::MAX),
            "solver step"
        );
        StepReport {
            solution: self.evolution.solution().to_vec(),
            converged,
            improved,
            stats,
        }
    }

    /// Advance every joint's actuator by `dt` seconds.
    pub fn actuate(&mut self, dt: f32) {
        self.topology.actuate(dt);
    }

    /// Write the current solution into the joint targets.
    pub fn assign(&mut self) {
        assign_targets(
            &mut self.topology,
            self.evolution.model().motions(),
            self.evolution.solution(),
        );
    }

    /// Per-tip residuals of the current solution.
    pub fn residuals(&mut self) -> Vec<Residual> {
        let solution = self.evolution.solution().to_vec();
        self.evolution.model_mut().resolve(&solution)
    }

    // -- configuration --

    /// Replace the configuration and rebuild.
    ///
    /// # Errors
    ///
    /// Returns [`EvoIkError::Config`] if `config` is invalid; nothing
    /// changes in that case.
    pub fn set_config(&mut self, config: SolverConfig) -> Result<(), EvoIkError> {
        config.validate()?;
        self.config = config;
        self.rebuild()?;
        Ok(())
    }

    /// Change the population size (raised to at least the elite count) and
    /// rebuild.
    ///
    /// # Errors
    ///
    /// See [`Solver::rebuild`].
    pub fn set_population_size(&mut self, size: usize) -> Result<(), TopologyError> {
        self.config = self.config.clone().with_population_size(size);
        self.rebuild()
    }

    /// Change the elite count (lowered to at most the population size) and
    /// rebuild.
    ///
    /// # Errors
    ///
    /// See [`Solver::rebuild`].
    pub fn set_elites(&mut self, elites: usize) -> Result<(), TopologyError> {
        self.config = self.config.clone().with_elites(elites);
        self.rebuild()
    }

    // -- tips --

    /// Add a tip and rebuild. Returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError`] if the tip is not below the root; the tip
    /// is not added in that case.
    pub fn add_tip(&mut self, tip: Tip) -> Result<usize, TopologyError> {
        self.tips.push(tip);
        if let Err(e) = self.rebuild() {
            self.tips.pop();
            return Err(e);
        }
        Ok(self.tips.len() - 1)
    }

    /// Remove a tip and rebuild.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownTip`] if `index` is out of range.
    pub fn remove_tip(&mut self, index: usize) -> Result<Tip, TopologyError> {
        if index >= self.tips.len() {
            return Err(TopologyError::UnknownTip(index));
        }
        let tip = self.tips.remove(index);
        self.rebuild()?;
        Ok(tip)
    }

    /// Move a tip's target or tolerances without rebuilding.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::UnknownTip`] if `index` is out of range.
    pub fn set_objective(&mut self, index: usize, objective: Objective) -> Result<(), TopologyError> {
        let tip = self
            .tips
            .get_mut(index)
            .ok_or(TopologyError::UnknownTip(index))?;
        tip.objective = objective.clone();
        self.evolution.model_mut().set_objective(index, objective)
    }

    // -- accessors --

    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Mutable topology. Target and limit edits are picked up on the next
    /// step; structural edits need [`Solver::rebuild`].
    pub const fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    pub const fn root(&self) -> SegmentId {
        self.root
    }

    pub fn tips(&self) -> &[Tip] {
        &self.tips
    }

    pub fn solution(&self) -> &[f32] {
        self.evolution.solution()
    }

    pub const fn evolution(&self) -> &Evolution {
        &self.evolution
    }

    /// Rebuilds since construction.
    pub const fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// Signed shortest rotation from `from` to `to`, in `(-π, π]`.
pub fn delta_angle(from: f32, to: f32) -> f32 {
    let delta = (to - from).rem_euclid(TAU);
    if delta > PI { delta - TAU } else { delta }
}

/// Write `values` (ordered like `motions`) into the topology's joint targets.
///
/// Continuous axes turn the short way from their current target. Revolute
/// axes do too unless the wrapped value falls outside the limits, in which
/// case the raw value is used. Prismatic axes take the value directly.
/// Targets end up clamped to the limits.
#[allow(clippy::float_cmp)]
pub fn assign_targets(topology: &mut Topology, motions: &[MotionPtr], values: &[f32]) {
    for (ptr, &value) in motions.iter().zip(values) {
        let Some(joint) = topology.joint_mut(ptr.segment) else {
            continue;
        };
        let motion = joint.motion_mut(ptr.axis);
        let target = match motion.joint_type() {
            JointType::Continuous => motion.target() + delta_angle(motion.target(), value),
            JointType::Revolute => {
                let wrapped = motion.target() + delta_angle(motion.target(), value);
                if motion.constrain_to_limits(wrapped) == wrapped {
                    wrapped
                } else {
                    value
                }
            }
            JointType::Prismatic => value,
        };
        motion.set_target(target);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use evoik_kinematics::{Axis, JointMotion, KinematicJoint, Pose};
    use evoik_test_utils::{fixed_only_chain, planar_two_link_arm, single_revolute_arm};
    use nalgebra::Vector3;

    fn arm_solver(target: Vector3<f32>) -> Solver {
        let f = single_revolute_arm(1.0);
        Solver::new(
            f.topology,
            f.root,
            vec![Tip::new(f.tip, Objective::position(target))],
            SolverConfig::default(),
        )
        .unwrap()
    }

    fn single_axis(joint_type: JointType, lower: f32, upper: f32) -> (Topology, Vec<MotionPtr>) {
        let mut topology = Topology::new();
        let base = topology.add_root("base", Pose::identity()).unwrap();
        let link = topology
            .add_segment(base, "link", Pose::from_position(Vector3::x()))
            .unwrap();
        topology
            .attach_joint(
                link,
                KinematicJoint::new(joint_type)
                    .with_motion(Axis::Z, JointMotion::free(joint_type, lower, upper)),
            )
            .unwrap();
        let model = Model::new(&topology, base, &[Tip::new(link, Objective::default())]).unwrap();
        let motions = model.motions().to_vec();
        (topology, motions)
    }

    #[test]
    fn delta_angle_takes_the_short_way() {
        assert_relative_eq!(delta_angle(0.0, 1.0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(delta_angle(3.0, -3.0), TAU - 6.0, epsilon = 1e-5);
        assert_relative_eq!(delta_angle(-3.0, 3.0), 6.0 - TAU, epsilon = 1e-5);
        assert_relative_eq!(delta_angle(0.5, 0.5 + TAU), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn continuous_axis_keeps_winding() {
        let (mut topology, motions) = single_axis(JointType::Continuous, 0.0, 0.0);
        let link = motions[0].segment;
        topology
            .joint_mut(link)
            .unwrap()
            .motion_mut(Axis::Z)
            .set_target(3.0);
        assign_targets(&mut topology, &motions, &[-3.0]);
        let target = topology.joint(link).unwrap().motion(Axis::Z).target();
        assert_relative_eq!(target, TAU - 3.0, epsilon = 1e-5);
    }

    #[test]
    fn revolute_axis_falls_back_to_raw_value() {
        let (mut topology, motions) = single_axis(JointType::Revolute, -PI, PI);
        let link = motions[0].segment;
        topology
            .joint_mut(link)
            .unwrap()
            .motion_mut(Axis::Z)
            .set_target(3.0);
        // Wrapping to 2π − 3 would leave the limits.
        assign_targets(&mut topology, &motions, &[-3.0]);
        let target = topology.joint(link).unwrap().motion(Axis::Z).target();
        assert_relative_eq!(target, -3.0, epsilon = 1e-6);
    }

    #[test]
    fn prismatic_axis_takes_value() {
        let (mut topology, motions) = single_axis(JointType::Prismatic, -0.2, 0.2);
        assign_targets(&mut topology, &motions, &[0.15]);
        let target = topology
            .joint(motions[0].segment)
            .unwrap()
            .motion(Axis::Z)
            .target();
        assert_relative_eq!(target, 0.15);

        assign_targets(&mut topology, &motions, &[0.5]);
        let target = topology
            .joint(motions[0].segment)
            .unwrap()
            .motion(Axis::Z)
            .target();
        assert_relative_eq!(target, 0.2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let f = single_revolute_arm(1.0);
        let config = SolverConfig {
            population_size: 1,
            ..SolverConfig::default()
        };
        let err = Solver::new(f.topology, f.root, vec![], config).unwrap_err();
        assert!(matches!(err, EvoIkError::Config(_)));
    }

    #[test]
    fn unreachable_tip_is_rejected() {
        let f = planar_two_link_arm(0.5, 0.5);
        let elbow = f.topology.find("elbow").unwrap();
        let err = Solver::new(
            f.topology,
            f.tip,
            vec![Tip::new(elbow, Objective::default())],
            SolverConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EvoIkError::InvalidTopology(TopologyError::Unreachable { .. })
        ));
    }

    #[test]
    fn step_reaches_target_and_assigns_it() {
        let theta = 0.8_f32;
        let mut solver = arm_solver(Vector3::new(theta.cos(), theta.sin(), 0.0));
        let report = solver.step_generations(500);
        assert!(report.converged);
        assert!(report.improved);
        assert!(report.stats.generations > 0);
        assert_relative_eq!(report.solution[0], theta, epsilon = 0.02);

        let shoulder = solver.topology().find("shoulder").unwrap();
        let target = solver.topology().joint(shoulder).unwrap().motion(Axis::Z).target();
        assert_relative_eq!(target, report.solution[0]);
    }

    #[test]
    fn converged_step_does_no_work() {
        // The rest pose already reaches the target.
        let mut solver = arm_solver(Vector3::new(1.0, 0.0, 0.0));
        let report = solver.step_generations(100);
        assert!(report.converged);
        assert!(!report.improved);
        assert_eq!(report.stats.generations, 0);
    }

    #[test]
    fn zero_budget_runs_no_generation() {
        let mut solver = arm_solver(Vector3::new(0.0, 1.0, 0.0));
        let report = solver.step(Duration::ZERO);
        assert!(!report.converged);
        assert_eq!(report.stats.generations, 0);
    }

    #[test]
    fn zero_dof_step_still_reports_convergence() {
        let f = fixed_only_chain();
        let mut solver = Solver::new(
            f.topology,
            f.root,
            vec![Tip::new(f.tip, Objective::position(Vector3::new(1.0, 0.0, 0.0)))],
            SolverConfig::default(),
        )
        .unwrap();
        let report = solver.step_generations(10);
        assert!(report.converged);
        assert!(report.solution.is_empty());
        assert_eq!(report.stats.generations, 0);
    }

    #[test]
    fn actuate_teleports_to_target() {
        let theta = -0.6_f32;
        let mut solver = arm_solver(Vector3::new(theta.cos(), theta.sin(), 0.0));
        solver.step_generations(500);
        solver.actuate(0.01);
        let shoulder = solver.topology().find("shoulder").unwrap();
        let motion = solver.topology().joint(shoulder).unwrap().motion(Axis::Z);
        assert_relative_eq!(motion.current(), motion.target());
    }

    #[test]
    fn population_setters_rebuild() {
        let mut solver = arm_solver(Vector3::new(0.0, 1.0, 0.0));
        solver.set_population_size(3).unwrap();
        assert_eq!(solver.config().population_size, 4);
        assert_eq!(solver.evolution().size(), 4);
        solver.set_elites(10).unwrap();
        assert_eq!(solver.config().elites, 4);
        assert_eq!(solver.rebuilds(), 2);
    }

    #[test]
    fn set_config_validates_first() {
        let mut solver = arm_solver(Vector3::new(0.0, 1.0, 0.0));
        let bad = SolverConfig {
            elites: 50,
            ..SolverConfig::default()
        };
        assert!(solver.set_config(bad).is_err());
        assert_eq!(solver.rebuilds(), 0);
        assert_eq!(solver.config(), &SolverConfig::default());
    }

    #[test]
    fn tips_can_be_added_and_removed() {
        let f = planar_two_link_arm(0.5, 0.5);
        let elbow = f.topology.find("elbow").unwrap();
        let mut solver = Solver::new(
            f.topology,
            f.root,
            vec![Tip::new(f.tip, Objective::default())],
            SolverConfig::default(),
        )
        .unwrap();

        let index = solver.add_tip(Tip::new(elbow, Objective::default())).unwrap();
        assert_eq!(index, 1);
        assert_eq!(solver.evolution().model().tips().len(), 2);

        let removed = solver.remove_tip(0).unwrap();
        assert_eq!(removed.segment, f.tip);
        assert_eq!(solver.tips().len(), 1);
        assert_eq!(solver.remove_tip(5).unwrap_err(), TopologyError::UnknownTip(5));
    }

    #[test]
    fn solution_tracks_model_dimensionality_across_rebuilds() {
        let f = planar_two_link_arm(0.5, 0.5);
        let elbow = f.topology.find("elbow").unwrap();
        let mut solver = Solver::new(
            f.topology,
            f.root,
            vec![Tip::new(elbow, Objective::position(Vector3::new(0.0, 0.5, 0.0)))],
            SolverConfig::default(),
        )
        .unwrap();

        let check = |solver: &mut Solver| {
            let dimensionality = solver.evolution().model().dimensionality();
            assert_eq!(solver.evolution().solution().len(), dimensionality);
            for individual in solver.evolution().population() {
                assert_eq!(individual.genes.len(), dimensionality);
            }
            assert_eq!(solver.residuals().len(), solver.tips().len());
            solver.step_generations(3);
        };

        check(&mut solver);
        solver
            .add_tip(Tip::new(f.tip, Objective::position(Vector3::new(1.0, 0.0, 0.0))))
            .unwrap();
        check(&mut solver);
        solver.remove_tip(1).unwrap();
        check(&mut solver);
        solver.set_population_size(30).unwrap();
        check(&mut solver);
    }

    #[test]
    fn failed_add_tip_leaves_solver_unchanged() {
        let f = planar_two_link_arm(0.5, 0.5);
        let mut solver = Solver::new(
            f.topology,
            f.tip,
            vec![Tip::new(f.tip, Objective::default())],
            SolverConfig::default(),
        )
        .unwrap();
        let err = solver.add_tip(Tip::new(f.root, Objective::default())).unwrap_err();
        assert!(matches!(err, TopologyError::Unreachable { .. }));
        assert_eq!(solver.tips().len(), 1);
        assert_eq!(solver.rebuilds(), 0);
    }

    #[test]
    fn set_objective_moves_target_without_rebuild() {
        let mut solver = arm_solver(Vector3::new(1.0, 0.0, 0.0));
        let moved = Objective::position(Vector3::new(0.0, 1.0, 0.0));
        solver.set_objective(0, moved.clone()).unwrap();
        assert_eq!(solver.rebuilds(), 0);
        assert_eq!(solver.tips()[0].objective, moved);
        assert_eq!(solver.evolution().model().tips()[0].objective, moved);
        assert_eq!(
            solver.set_objective(2, Objective::default()),
            Err(TopologyError::UnknownTip(2))
        );
    }

    #[test]
    fn residuals_follow_solution() {
        let mut solver = arm_solver(Vector3::new(0.0, 1.0, 0.0));
        let before = solver.residuals()[0].position;
        solver.step_generations(500);
        let after = solver.residuals()[0].position;
        assert!(after < before);
    }

    #[test]
    fn same_seed_same_result() {
        let target = Vector3::new(0.3, 0.7, 0.0);
        let mut a = arm_solver(target);
        let mut b = arm_solver(target);
        assert_eq!(a.step_generations(30).solution, b.step_generations(30).solution);
    }
}
