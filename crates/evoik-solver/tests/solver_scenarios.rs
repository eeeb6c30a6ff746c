//! Integration tests: end-to-end solves on canned and URDF-imported trees.
//!
//! Targets are generated by posing the tree at known joint values and
//! reading the tip back, so every target is reachable unless a test says
//! otherwise. Generation-bounded steps keep results independent of machine
//! speed.

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use approx::assert_relative_eq;
use nalgebra::{UnitQuaternion, Vector3};

use evoik_core::SolverConfig;
use evoik_kinematics::{Axis, SegmentId, Topology};
use evoik_solver::prelude::*;
use evoik_test_utils::{planar_two_link_arm, seeded_rng, single_revolute_arm};

const ARM_URDF: &str = r#"
    <robot name="two_link_arm">
        <link name="base_link"/>
        <link name="upper_arm"/>
        <link name="forearm"/>
        <link name="end_effector"/>
        <joint name="shoulder" type="revolute">
            <parent link="base_link"/>
            <child link="upper_arm"/>
            <origin xyz="0 0 0.1" rpy="0 0 0"/>
            <axis xyz="0 1 0"/>
            <limit lower="-1.57" upper="1.57" effort="10" velocity="5"/>
        </joint>
        <joint name="elbow" type="revolute">
            <parent link="upper_arm"/>
            <child link="forearm"/>
            <origin xyz="0 0 0.3" rpy="0 0 0"/>
            <axis xyz="0 1 0"/>
            <limit lower="-2.0" upper="2.0" effort="10" velocity="5"/>
        </joint>
        <joint name="ee_fixed" type="fixed">
            <parent link="forearm"/>
            <child link="end_effector"/>
            <origin xyz="0 0 0.25" rpy="0 0 0"/>
        </joint>
    </robot>
"#;

/// World position of `segment` with the named joints' Z axes at `values`.
fn posed_position(topology: &Topology, joints: &[(&str, f32)], segment: SegmentId) -> Vector3<f32> {
    let mut posed = topology.clone();
    for &(name, value) in joints {
        let id = posed.find(name).unwrap();
        posed.joint_mut(id).unwrap().motion_mut(Axis::Z).set_target(value);
    }
    posed.world_pose(segment).unwrap().position
}

fn solve(solver: &mut Solver, generations: u64) -> StepReport {
    solver.step_generations(generations)
}

// ---------------------------------------------------------------------------
// Single joint
// ---------------------------------------------------------------------------

#[test]
fn single_revolute_joint_finds_the_angle() {
    let theta = 1.1_f32;
    let f = single_revolute_arm(0.8);
    let target = posed_position(&f.topology, &[("shoulder", theta)], f.tip);
    let mut solver = Solver::new(
        f.topology,
        f.root,
        vec![Tip::new(f.tip, Objective::position(target))],
        SolverConfig::default(),
    )
    .unwrap();

    let report = solve(&mut solver, 1000);
    assert!(report.converged);
    assert_relative_eq!(report.solution[0], theta, epsilon = 0.02);
    assert!(report.solution[0] <= FRAC_PI_2);
}

#[test]
fn single_revolute_joint_matches_orientation() {
    let f = single_revolute_arm(1.0);
    let target = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -0.7);
    let mut solver = Solver::new(
        f.topology,
        f.root,
        vec![Tip::new(f.tip, Objective::orientation(target))],
        SolverConfig::default(),
    )
    .unwrap();

    let report = solve(&mut solver, 1000);
    assert!(report.converged);
    assert_relative_eq!(report.solution[0], -0.7, epsilon = 0.01);
}

#[test]
fn out_of_limit_target_stops_at_the_limit() {
    // Straight behind the shoulder; the closest reachable angle is ±π/2.
    let f = single_revolute_arm(1.0);
    let mut solver = Solver::new(
        f.topology,
        f.root,
        vec![Tip::new(f.tip, Objective::position(Vector3::new(-1.0, 0.05, 0.0)))],
        SolverConfig::default(),
    )
    .unwrap();

    let report = solve(&mut solver, 300);
    assert!(!report.converged);
    assert_eq!(report.stats.generations, 300);
    assert_relative_eq!(report.solution[0], FRAC_PI_2, epsilon = 0.05);
}

// ---------------------------------------------------------------------------
// Multi joint / multi tip
// ---------------------------------------------------------------------------

#[test]
fn planar_arm_reaches_interior_point() {
    let f = planar_two_link_arm(0.5, 0.4);
    let target = posed_position(&f.topology, &[("shoulder", 0.9), ("elbow", -1.2)], f.tip);
    let mut solver = Solver::new(
        f.topology,
        f.root,
        vec![Tip::new(f.tip, Objective::position(target))],
        SolverConfig::default(),
    )
    .unwrap();

    let report = solve(&mut solver, 2000);
    assert!(report.converged);
    let residuals = solver.residuals();
    assert!(residuals[0].position <= 0.01);

    // The written-back targets reproduce the solution.
    let hand = solver.tips()[0].segment;
    let reached = solver.topology().world_pose(hand).unwrap().position;
    assert_relative_eq!(reached, target, epsilon = 0.011);
}

#[test]
fn two_tips_on_one_arm_are_satisfied_together() {
    let f = planar_two_link_arm(0.5, 0.4);
    let elbow = f.topology.find("elbow").unwrap();
    let joints = [("shoulder", 0.4), ("elbow", 0.6)];
    let hand_target = posed_position(&f.topology, &joints, f.tip);
    let elbow_target = posed_position(&f.topology, &joints, elbow);

    let mut solver = Solver::new(
        f.topology,
        f.root,
        vec![
            Tip::new(f.tip, Objective::position(hand_target)),
            Tip::new(elbow, Objective::position(elbow_target)),
        ],
        SolverConfig::default(),
    )
    .unwrap();

    let report = solve(&mut solver, 3000);
    assert!(report.converged);
    assert_relative_eq!(report.solution[0], 0.4, epsilon = 0.05);
    assert_relative_eq!(report.solution[1], 0.6, epsilon = 0.05);
}

#[test]
fn urdf_arm_reaches_posed_target() {
    let robot = evoik_urdf::parse_string(ARM_URDF).unwrap();
    let topology = evoik_urdf::load_topology(&robot).unwrap();
    let root = topology.find("base_link").unwrap();
    let ee = topology.find("end_effector").unwrap();
    let target = posed_position(&topology, &[("upper_arm", 0.5), ("forearm", 0.7)], ee);

    let mut solver = Solver::new(
        topology,
        root,
        vec![Tip::new(ee, Objective::position(target))],
        SolverConfig::default(),
    )
    .unwrap();
    assert_eq!(solver.evolution().dimensionality(), 2);

    let report = solve(&mut solver, 3000);
    assert!(report.converged);
    assert!(solver.residuals()[0].position <= 0.01);
}

// ---------------------------------------------------------------------------
// Search properties
// ---------------------------------------------------------------------------

#[test]
fn solution_fitness_is_monotone_over_generations() {
    let f = planar_two_link_arm(0.5, 0.4);
    let elbow = f.topology.find("elbow").unwrap();
    let tips = [
        Tip::new(
            f.tip,
            Objective::pose(
                Vector3::new(0.2, 0.6, 0.0),
                UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 1.0),
            ),
        ),
        Tip::new(elbow, Objective::look_at(Vector3::new(0.0, 1.0, 0.0), Vector3::x())),
    ];
    let model = Model::new(&f.topology, f.root, &tips).unwrap();
    let mut evolution = Evolution::new(model, 16, 3, seeded_rng(17));

    let initial = evolution.solution_fitness();
    let mut previous = initial;
    for _ in 0..300 {
        let improved = evolution.evolve();
        let current = evolution.solution_fitness();
        assert!(current <= previous);
        if !improved {
            assert_relative_eq!(current, previous);
        }
        previous = current;
    }
    assert!(previous < initial);
}

#[test]
fn unreachable_target_keeps_restarting_without_hanging() {
    // Twice the arm's reach: the population stalls and gets wiped out.
    let f = planar_two_link_arm(0.5, 0.4);
    let mut solver = Solver::new(
        f.topology,
        f.root,
        vec![Tip::new(f.tip, Objective::position(Vector3::new(1.8, 0.0, 0.3)))],
        SolverConfig::default(),
    )
    .unwrap();

    let first = solve(&mut solver, 400);
    assert!(!first.converged);
    assert_eq!(first.stats.generations, 400);
    assert!(first.solution.iter().all(|v| v.is_finite()));
    assert!(solver.evolution().wipeouts() >= first.stats.wipeouts);

    let second = solve(&mut solver, 400);
    assert!(!second.converged);
    assert_eq!(second.stats.generations, 400);
    for (value, motion) in second.solution.iter().zip(solver.evolution().model().motions()) {
        assert!((motion.lower_limit()..=motion.upper_limit()).contains(value));
    }
}

#[test]
fn moving_target_is_tracked_across_frames() {
    let f = single_revolute_arm(1.0);
    let mut solver = Solver::new(
        f.topology,
        f.root,
        vec![Tip::new(f.tip, Objective::default())],
        SolverConfig::default(),
    )
    .unwrap();

    for theta in [0.2_f32, 0.5, 0.8, 1.1] {
        let target = Vector3::new(theta.cos(), theta.sin(), 0.0);
        solver.set_objective(0, Objective::position(target)).unwrap();
        let report = solve(&mut solver, 1000);
        assert!(report.converged, "lost the target at {theta}");
        solver.actuate(0.02);
    }
    assert_eq!(solver.rebuilds(), 0);
}

#[test]
fn time_budgeted_frames_converge() {
    let f = planar_two_link_arm(0.5, 0.4);
    let target = posed_position(&f.topology, &[("shoulder", -0.5), ("elbow", 1.0)], f.tip);
    let config = SolverConfig {
        max_frame_time: 0.005,
        ..SolverConfig::default()
    };
    let mut solver = Solver::new(
        f.topology,
        f.root,
        vec![Tip::new(f.tip, Objective::position(target))],
        config,
    )
    .unwrap();

    let mut converged = false;
    for _ in 0..1000 {
        let report = solver.step_frame();
        assert!(report.stats.elapsed < Duration::from_millis(500));
        if report.converged {
            converged = true;
            break;
        }
    }
    assert!(converged);
}
