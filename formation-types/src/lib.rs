//! # formation-types
//!
//! Shared data model for the formation controller.
//!
//! These types are used by:
//! - `formation-controller`: the real-time observation/kinematics/serial pipeline
//! - `formation-sim`: the synthetic marker-detection generator used for dev/test
//!
//! ## Coordinate conventions
//!
//! - **World/image frame**: x right, y down (image-aligned), θ measured from +x
//!   counter-clockwise. This is the frame the camera calibration establishes; it is
//!   documented once, here, as the single source of truth for every consumer —
//!   no stage in this pipeline flips or re-derives handedness.
//! - Marker ids are small integers in a known, closed set (`KNOWN_AGENT_IDS`).

use serde::{Deserialize, Serialize};

// ── Pose2D ───────────────────────────────────────────────────────────────────

/// A 2D pose: `(x, y)` in meters, `θ` in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    /// Euclidean distance to another pose's position (orientation ignored).
    pub fn distance_to(&self, other: &Pose2D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A homogeneous 2D rigid transform, stored as a 3x3 row-major matrix.
///
/// Used by `FormationDispatcher` and `LinkController` to compose chained
/// rotations and translations without re-deriving trig identities at every
/// call site. Hand-rolled rather than pulled from a linear-algebra crate: the
/// chain here is always a fixed 3x3 homogeneous transform, never a general
/// N-dimensional one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    pub m: [[f64; 3]; 3],
}

impl Transform2D {
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Pure rotation by `theta` radians.
    pub fn rotation(theta: f64) -> Self {
        let (s, c) = theta.sin_cos();
        Self {
            m: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Pure translation by `(x, y)`.
    pub fn translation(x: f64, y: f64) -> Self {
        Self {
            m: [[1.0, 0.0, x], [0.0, 1.0, y], [0.0, 0.0, 1.0]],
        }
    }

    /// Translation of `length` meters along the local x-axis.
    pub fn translation_x(length: f64) -> Self {
        Self::translation(length, 0.0)
    }

    /// Matrix product `self * other`.
    pub fn compose(&self, other: &Transform2D) -> Transform2D {
        let mut out = [[0.0; 3]; 3];
        for r in 0..3 {
            for c in 0..3 {
                out[r][c] = (0..3).map(|k| self.m[r][k] * other.m[k][c]).sum();
            }
        }
        Transform2D { m: out }
    }

    /// The translation column, `(x, y)`.
    pub fn translation_part(&self) -> (f64, f64) {
        (self.m[0][2], self.m[1][2])
    }

    /// Apply this transform to a homogeneous point `(x, y, 1)`, returning `(x, y)`.
    pub fn apply_point(&self, x: f64, y: f64) -> (f64, f64) {
        let px = self.m[0][0] * x + self.m[0][1] * y + self.m[0][2];
        let py = self.m[1][0] * x + self.m[1][1] * y + self.m[1][2];
        (px, py)
    }
}

// ── Markers & agent poses ──────────────────────────────────────────────────

/// The fixed set of marker ids the controller tracks. Anything else detected
/// in a frame is ignored (spec boundary behavior: unknown id present ⇒ ignored).
pub const KNOWN_AGENT_IDS: [u32; 4] = [0, 1, 2, 3];

/// One marker's pixel-space detection for a single frame: its id and the four
/// corner points reported by the (out-of-scope) fiducial detector, in the
/// detector's own corner ordering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarkerDetection {
    pub id: u32,
    pub corners: [[f64; 2]; 4],
}

/// `None` means "not seen this frame" — never removed from the map, only
/// ever replaced, so every known id always has an entry once the analyzer
/// has run at least once.
pub type AgentPose = Option<Pose2D>;

// ── Formation kinematics ────────────────────────────────────────────────────

pub const NUM_LINKS: usize = 4;
pub const LINK_LENGTH: f64 = 0.5;
pub const MARKER_LENGTH: f64 = 0.12;

/// The complete parameterization of one commanded formation instant:
/// the chain's world anchor, its orientation, and each link's joint angle
/// and length multiplier. `theta_d` and `link_multipliers` always have
/// length `NUM_LINKS` — enforced by construction, never by a runtime check
/// at the read side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormationDescriptor {
    pub r_d: (f64, f64),
    pub q_d: f64,
    pub theta_d: [f64; NUM_LINKS],
    pub link_multipliers: [f64; NUM_LINKS],
}

/// The pose of one link in the articulated formation chain.
pub type LinkPose = Pose2D;

/// The closed set of formation shapes. A shape is a tag, never an open
/// string key — the table below is a fixed array indexed by the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Shape {
    Line,
    Square,
    Triangle,
    Diamond,
    Fan,
}

/// One shape's fixed joint-angle / length-multiplier pair.
#[derive(Debug, Clone, Copy)]
pub struct ShapeParams {
    pub theta_d: [f64; NUM_LINKS],
    pub link_multipliers: [f64; NUM_LINKS],
}

impl Shape {
    /// Look up this shape's fixed chain parameters.
    ///
    /// LINE and SQUARE are pinned to the worked numeric examples (S1/S2):
    /// LINE is a straight four-segment chain with a double back-turn at each
    /// end; SQUARE closes a unit square via four quarter-turns from a
    /// diagonal heading, with the first link's multiplier set so the chain's
    /// initial reach is the square's half-diagonal (`L*sqrt(2)`) and the
    /// remaining three are the side length (`L*2`) — a uniform multiplier
    /// would instead route the chain back through the anchor point itself.
    ///
    /// TRIANGLE and DIAMOND are not pinned by a worked example upstream;
    /// both place their vertices on a circle of radius `L` around the
    /// anchor (never at the anchor itself) using the same asymmetric-first-
    /// link technique as SQUARE: the first link reaches the circle, and
    /// each remaining link is the chord between consecutive vertices spaced
    /// evenly around it. TRIANGLE places three vertices 120 degrees apart
    /// and then a fourth "apex pointer" link that continues straight past
    /// the last vertex. DIAMOND places its four vertices 90 degrees apart
    /// (a square traced through its cardinal points rather than its
    /// corners). FAN is not pinned by a worked example either; it is a
    /// turtle-graphics chain chosen to match its verbal description (a
    /// shallow 30-degrees-per-link outward arc) and documented in
    /// DESIGN.md.
    pub fn params(self) -> ShapeParams {
        match self {
            Shape::Line => ShapeParams {
                theta_d: [std::f64::consts::PI, std::f64::consts::PI, 0.0, 0.0],
                link_multipliers: [1.5, 1.0, 1.0, 1.0],
            },
            Shape::Square => ShapeParams {
                theta_d: [
                    -3.0 * std::f64::consts::FRAC_PI_4,
                    5.0 * std::f64::consts::FRAC_PI_4,
                    -std::f64::consts::FRAC_PI_2,
                    -std::f64::consts::FRAC_PI_2,
                ],
                link_multipliers: [std::f64::consts::SQRT_2, 2.0, 2.0, 2.0],
            },
            Shape::Triangle => ShapeParams {
                theta_d: [
                    std::f64::consts::FRAC_PI_2,
                    5.0 * std::f64::consts::PI / 6.0,
                    2.0 * std::f64::consts::PI / 3.0,
                    0.0,
                ],
                link_multipliers: [1.0, 3.0f64.sqrt(), 3.0f64.sqrt(), 1.0],
            },
            Shape::Diamond => ShapeParams {
                theta_d: [
                    std::f64::consts::FRAC_PI_2,
                    3.0 * std::f64::consts::FRAC_PI_4,
                    std::f64::consts::FRAC_PI_2,
                    std::f64::consts::FRAC_PI_2,
                ],
                link_multipliers: [1.0, std::f64::consts::SQRT_2, std::f64::consts::SQRT_2, std::f64::consts::SQRT_2],
            },
            Shape::Fan => {
                let turn = std::f64::consts::FRAC_PI_6;
                ShapeParams {
                    theta_d: [turn, turn, turn, turn],
                    link_multipliers: [1.0, 1.0, 1.0, 1.0],
                }
            }
        }
    }

    /// Boundary behavior: a shape absent from the table defaults to zero
    /// joint angles and unit multipliers. Since `Shape` is a closed enum
    /// every variant is always in the table; this exists for a value
    /// deserialized from an external command that doesn't map to a variant
    /// (see `ConfigurationMessage`/`CommandType`).
    pub fn default_params() -> ShapeParams {
        ShapeParams {
            theta_d: [0.0; NUM_LINKS],
            link_multipliers: [1.0; NUM_LINKS],
        }
    }
}

/// Fixed link -> agent assignment. A link's frame can carry more than one
/// agent (link 1 carries two, at different offsets); the last link in the
/// chain carries none in this fleet's layout.
pub const LINK_AGENT_MAP: [&[u32]; NUM_LINKS] = [&[0], &[1, 2], &[3], &[]];

/// Per-agent nominal offset `(x, y)` from its link's frame, indexed by agent
/// id. Agents sharing a link frame (1 and 2) are distinguished here.
pub const NOMINAL_OFFSETS: [(f64, f64); 4] = [(0.0, 0.0), (0.0, 0.0), (1.0, 0.0), (1.0, 0.0)];

// ── Commands ─────────────────────────────────────────────────────────────────

/// What a `ConfigurationMessage` asks the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    /// Adopt a new shape and target world pose.
    Configure,
    /// Keep the current shape, adopt a new target world pose.
    Move,
}

/// One unit of operator input to `ConfigurationManager`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfigurationMessage {
    pub command: CommandType,
    pub shape: Option<Shape>,
    pub target: Pose2D,
}

// ── Path-crossing and collision-avoidance constants ─────────────────────────

pub const PCR_COLLISION_RADIUS: f64 = 0.30;
pub const PCR_TIME_WINDOW: f64 = 2.0;
pub const PCR_ROBOT_SPEED_MIN: f64 = 0.2;
pub const PCR_ROBOT_SPEED_MAX: f64 = 1.0;
pub const PCR_CLEAR_MARGIN: f64 = 1.5;

pub const APF_D_INFLUENCE: f64 = 0.28;
pub const APF_D_SAFETY: f64 = 0.18;
pub const APF_K_REP: f64 = 0.01;
pub const APF_ETA: f64 = 0.1;
pub const APF_MAX_ADJUSTMENT: f64 = 0.1;

/// Below this separation, two positions are treated as coincident (APF skips
/// the pair, segment-intersection denominators are treated as singular).
pub const EPSILON: f64 = 1e-6;

/// Segment-intersection cross-product guard: `|cross| < SEGMENT_PARALLEL_EPS`
/// is treated as parallel/collinear, hence non-intersecting.
pub const SEGMENT_PARALLEL_EPS: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_identity_is_neutral() {
        let t = Transform2D::identity();
        let (x, y) = t.apply_point(3.0, -2.0);
        assert_eq!((x, y), (3.0, -2.0));
    }

    #[test]
    fn rotation_then_translation_composes_left_to_right() {
        // rot(90deg) then translate(1,0): point (1,0) rotates to (0,1), then shifts to (1,1)
        let chain = Transform2D::rotation(std::f64::consts::FRAC_PI_2)
            .compose(&Transform2D::translation(1.0, 0.0));
        let (x, y) = chain.apply_point(0.0, 0.0);
        assert!((x - 1.0).abs() < 1e-9);
        assert!((y - 0.0).abs() < 1e-9);
    }

    #[test]
    fn every_shape_has_num_links_length_arrays() {
        for shape in [Shape::Line, Shape::Square, Shape::Triangle, Shape::Diamond, Shape::Fan] {
            let p = shape.params();
            assert_eq!(p.theta_d.len(), NUM_LINKS);
            assert_eq!(p.link_multipliers.len(), NUM_LINKS);
        }
    }

    #[test]
    fn default_params_are_zero_and_unit() {
        let p = Shape::default_params();
        assert_eq!(p.theta_d, [0.0; NUM_LINKS]);
        assert_eq!(p.link_multipliers, [1.0; NUM_LINKS]);
    }
}
