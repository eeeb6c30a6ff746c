//! Per-axis joint state and motion profiles.
//!
//! A [`JointMotion`] owns one degree of freedom of a
//! [`KinematicJoint`](crate::joint::KinematicJoint). The solver only ever
//! reads and writes the *target* value; the *current* value follows the
//! target through the configured [`MotionType`] when the owner calls
//! [`JointMotion::apply`] once per frame.

use std::f32::consts::PI;

use crate::joint::JointType;

// ---------------------------------------------------------------------------
// AxisState / MotionType
// ---------------------------------------------------------------------------

/// Whether an axis participates in the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AxisState {
    Free,
    #[default]
    Fixed,
}

/// How the current value tracks the target value over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MotionType {
    /// Velocity nudged toward the target each frame; slight overshoot-free
    /// wobble.
    Lively,
    /// Acceleration and deceleration phases bounded by the velocity and
    /// acceleration limits.
    Smooth,
    /// Jump straight to the target.
    #[default]
    Teleport,
}

// ---------------------------------------------------------------------------
// JointMotion
// ---------------------------------------------------------------------------

/// One rotational or translational degree of freedom.
///
/// Units are radians for rotational joints and meters for prismatic ones.
#[derive(Debug, Clone, PartialEq)]
pub struct JointMotion {
    joint_type: JointType,
    pub state: AxisState,
    pub motion_type: MotionType,
    max_velocity: f32,
    max_acceleration: f32,
    lower_limit: f32,
    upper_limit: f32,
    target: f32,
    current: f32,
    velocity: f32,
    acceleration: f32,
    error: f32,
    last_dt: f32,
    deceleration_time: f32,
}

impl JointMotion {
    /// A fixed axis with zero limits.
    pub const fn new(joint_type: JointType) -> Self {
        Self {
            joint_type,
            state: AxisState::Fixed,
            motion_type: MotionType::Teleport,
            max_velocity: 0.0,
            max_acceleration: 0.0,
            lower_limit: 0.0,
            upper_limit: 0.0,
            target: 0.0,
            current: 0.0,
            velocity: 0.0,
            acceleration: 0.0,
            error: 0.0,
            last_dt: 0.0,
            deceleration_time: 0.0,
        }
    }

    /// A free axis bounded by `[lower, upper]`.
    pub fn free(joint_type: JointType, lower: f32, upper: f32) -> Self {
        let mut motion = Self::new(joint_type);
        motion.state = AxisState::Free;
        motion.set_limits(lower, upper);
        motion
    }

    /// Set the velocity and acceleration bounds (both clamped to >= 0).
    #[must_use]
    pub fn with_dynamics(mut self, max_velocity: f32, max_acceleration: f32) -> Self {
        self.set_max_velocity(max_velocity);
        self.set_max_acceleration(max_acceleration);
        self
    }

    /// Set the motion profile.
    #[must_use]
    pub const fn with_motion_type(mut self, motion_type: MotionType) -> Self {
        self.motion_type = motion_type;
        self
    }

    pub const fn joint_type(&self) -> JointType {
        self.joint_type
    }

    pub(crate) const fn set_joint_type(&mut self, joint_type: JointType) {
        self.joint_type = joint_type;
    }

    pub fn is_free(&self) -> bool {
        self.state == AxisState::Free
    }

    /// Lower limit; `-π` for continuous joints regardless of the stored value.
    pub fn lower_limit(&self) -> f32 {
        if self.joint_type == JointType::Continuous {
            -PI
        } else {
            self.lower_limit
        }
    }

    /// Upper limit; `π` for continuous joints regardless of the stored value.
    pub fn upper_limit(&self) -> f32 {
        if self.joint_type == JointType::Continuous {
            PI
        } else {
            self.upper_limit
        }
    }

    /// Set both limits. Swapped bounds are reordered.
    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        if lower <= upper {
            self.lower_limit = lower;
            self.upper_limit = upper;
        } else {
            tracing::warn!(lower, upper, "joint limits reversed, swapping");
            self.lower_limit = upper;
            self.upper_limit = lower;
        }
    }

    pub const fn max_velocity(&self) -> f32 {
        self.max_velocity
    }

    pub fn set_max_velocity(&mut self, value: f32) {
        self.max_velocity = value.max(0.0);
    }

    pub const fn max_acceleration(&self) -> f32 {
        self.max_acceleration
    }

    pub fn set_max_acceleration(&mut self, value: f32) {
        self.max_acceleration = value.max(0.0);
    }

    /// Clamp to `[lower, upper]`; continuous joints pass through unchanged.
    pub fn constrain_to_limits(&self, value: f32) -> f32 {
        if self.joint_type == JointType::Continuous {
            value
        } else {
            value.clamp(self.lower_limit, self.upper_limit)
        }
    }

    pub const fn target(&self) -> f32 {
        self.target
    }

    /// Set the target value, clamped to the limits.
    pub fn set_target(&mut self, value: f32) {
        self.target = self.constrain_to_limits(value);
    }

    pub const fn current(&self) -> f32 {
        self.current
    }

    pub const fn velocity(&self) -> f32 {
        self.velocity
    }

    pub const fn acceleration(&self) -> f32 {
        self.acceleration
    }

    /// Target minus current, as of the last [`apply`](Self::apply).
    pub const fn error(&self) -> f32 {
        self.error
    }

    /// Freeze the axis where it currently is.
    pub const fn stop(&mut self) {
        self.target = self.current;
    }

    /// Zero the value, target, and motion state.
    pub const fn reset(&mut self) {
        self.error = 0.0;
        self.velocity = 0.0;
        self.acceleration = 0.0;
        self.current = 0.0;
        self.target = 0.0;
        self.deceleration_time = 0.0;
    }

    /// Advance the current value toward the target by `dt` seconds.
    ///
    /// Fixed axes never move. Zero velocity or acceleration bounds degrade
    /// to [`MotionType::Teleport`].
    pub fn apply(&mut self, dt: f32) {
        if self.state == AxisState::Fixed || dt <= 0.0 {
            return;
        }

        let unbounded = self.max_velocity <= 0.0 || self.max_acceleration <= 0.0;
        match self.motion_type {
            MotionType::Teleport => self.teleport(),
            _ if unbounded => self.teleport(),
            MotionType::Smooth => {
                self.error = self.target - self.current;
                self.plan_smooth(dt);
                self.integrate(dt);
            }
            MotionType::Lively => {
                self.error = self.target - self.current;
                self.plan_lively(dt);
                self.integrate(dt);
            }
        }
    }

    const fn teleport(&mut self) {
        self.current = self.target;
        self.error = 0.0;
        self.velocity = 0.0;
        self.acceleration = 0.0;
    }

    fn integrate(&mut self, dt: f32) {
        self.current = self.constrain_to_limits(self.velocity.mul_add(dt, self.current));
        self.last_dt = dt;
    }

    fn plan_smooth(&mut self, dt: f32) {
        let a_max = self.max_acceleration;
        let v_max = self.max_velocity;
        let speed = self.velocity.abs();
        let distance = self.error.abs();

        if self.error == 0.0 {
            self.velocity = 0.0;
            self.acceleration = 0.0;
            return;
        }

        let stopping = (self.velocity * self.velocity / (2.0 * a_max)).abs() + speed * self.last_dt;
        let relaxed =
            (self.velocity * (2.0 * distance / a_max).sqrt()).abs() + speed * self.last_dt;
        let to_braking = distance - relaxed;

        if distance > relaxed {
            // Accelerate
            self.deceleration_time = 0.0;

            let time_to_accelerate = (v_max - speed) / a_max;
            let distance_to_accelerate =
                (a_max / 2.0 * time_to_accelerate).mul_add(time_to_accelerate, speed * time_to_accelerate);
            let horizon = (2.0 * to_braking.min(distance_to_accelerate)).abs() / a_max;
            let horizon = horizon.sqrt();

            let increase = (a_max * dt).mul_add(horizon, self.acceleration.abs());
            let decrease = (v_max - speed) * horizon;
            let magnitude = a_max.min(increase).min(decrease);

            self.acceleration = self.error.signum() * magnitude;
            self.velocity = self.acceleration.mul_add(dt, self.velocity);
            if self.velocity.abs() > v_max {
                self.velocity = self.velocity.signum() * v_max;
                self.acceleration = self.error.signum() * (v_max - speed) / dt;
            }
        } else {
            // Decelerate
            self.deceleration_time += dt;

            let overhead = (relaxed - stopping) / speed;
            let relaxed_deceleration = (self.velocity * self.velocity / (2.0 * self.error)).abs();
            let ramp = self.deceleration_time * self.deceleration_time / (overhead * overhead) * a_max;
            let magnitude = a_max.min(ramp).min(relaxed_deceleration);

            self.acceleration = -self.velocity.signum() * magnitude;
            self.velocity = self.acceleration.mul_add(dt, self.velocity);
        }

        self.correct_overshoot(dt, speed);
    }

    fn plan_lively(&mut self, dt: f32) {
        let a_max = self.max_acceleration;
        let previous = self.velocity;
        let speed = previous.abs();
        let braking = self.velocity * (2.0 * self.error.abs() / a_max).sqrt();
        let step = a_max.min((self.error - self.velocity).abs() / dt) * dt;

        if self.error > braking {
            self.velocity += step;
        } else {
            self.velocity -= step;
        }
        if self.velocity.abs() > self.max_velocity {
            self.velocity = self.velocity.signum() * self.max_velocity;
        }
        self.acceleration = (self.velocity - previous) / dt;
        self.correct_overshoot(dt, speed);
    }

    /// Never step past the target within one frame.
    fn correct_overshoot(&mut self, dt: f32, last_speed: f32) {
        if (self.velocity * dt).abs() > self.error.abs() {
            self.velocity = self.error / dt;
            self.acceleration = self.error.signum() * (self.velocity.abs() - last_speed).abs() / dt;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
