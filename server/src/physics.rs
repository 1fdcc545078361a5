use serde::{Deserialize, Serialize};

/// Segments shorter than this along the swept axis are ignored.
pub const EPS: f32 = 1e-4;
const FAR: f32 = 100_000.0;

///Represents a vector in 3D space.
///
/// The level is a vertical plane: x runs to the right, z runs up and y is
/// depth (zero for everything that collides).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    ///Returns the difference of two vectors.
    pub fn sub(&self, other: &Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    ///Returns the squared distance to another point.
    pub fn distance_squared(&self, other: &Vec3) -> f32 {
        let d = self.sub(other);
        d.x * d.x + d.y * d.y + d.z * d.z
    }

    ///Linear interpolation towards `other`.
    pub fn lerp(&self, other: &Vec3, t: f32) -> Vec3 {
        Vec3::new(
            (1.0 - t) * self.x + t * other.x,
            (1.0 - t) * self.y + t * other.y,
            (1.0 - t) * self.z + t * other.z,
        )
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Vec3::new(x, y, z)
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(v: Vec3) -> Self {
        v.to_array()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColliderKind {
    #[default]
    Solid,
    /// Drawn by the client, ignored by collision.
    Decorative,
}

///Oriented line segment of level geometry.
///
/// Collision is one-sided: the winding of a segment decides from which side
/// it blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub handles: [Vec3; 2],
    #[serde(default)]
    pub kind: ColliderKind,
}

impl Collider {
    pub fn solid(from: Vec3, to: Vec3) -> Self {
        Self {
            handles: [from, to],
            kind: ColliderKind::Solid,
        }
    }

    pub fn decorative(from: Vec3, to: Vec3) -> Self {
        Self {
            handles: [from, to],
            kind: ColliderKind::Decorative,
        }
    }

    pub fn is_solid(&self) -> bool {
        self.kind == ColliderKind::Solid
    }

    ///Direction vector from the first handle to the second.
    pub fn tangent(&self) -> Vec3 {
        self.handles[1].sub(&self.handles[0])
    }
}

///Axis along which a probe point is tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    ///Ray cast towards +x against segments spanning the probe's height.
    Horizontal,
    ///Ray cast towards +z against segments spanning the probe's x.
    Vertical,
}

impl Axis {
    fn direction(self) -> Vec3 {
        match self {
            Axis::Horizontal => Vec3::new(1.0, 0.0, 0.0),
            Axis::Vertical => Vec3::new(0.0, 0.0, 1.0),
        }
    }

    /// Coordinate the segment must span for the ray to hit it.
    fn span(self, v: &Vec3) -> f32 {
        match self {
            Axis::Horizontal => v.z,
            Axis::Vertical => v.x,
        }
    }

    /// Coordinate measured along the ray.
    fn along(self, v: &Vec3) -> f32 {
        match self {
            Axis::Horizontal => v.x,
            Axis::Vertical => v.z,
        }
    }
}

///Returns true if `probe` lies on the blocking side of the nearest solid
///collider along `axis`.
///
/// The nearest collider hit by a ray from `probe` towards +axis decides: if the
/// cross product of the ray direction and the collider's tangent is negative,
/// the probe is behind that collider and the move is refused. No hit means
/// the move is free.
pub fn is_blocked(colliders: &[Collider], probe: Vec3, axis: Axis) -> bool {
    let mut closest: Option<(&Collider, f32)> = None;

    for collider in colliders.iter().filter(|c| c.is_solid()) {
        let [a, b] = &collider.handles;
        let extent = axis.span(b) - axis.span(a);
        if extent.abs() < EPS {
            continue;
        }
        let t = (axis.span(&probe) - axis.span(a)) / extent;
        if !(0.0..=1.0).contains(&t) {
            continue;
        }
        let hit = axis.along(&a.lerp(b, t));
        let nearest = closest.map_or(FAR, |(_, distance)| distance);
        if hit > axis.along(&probe) && hit < nearest {
            closest = Some((collider, hit));
        }
    }

    match closest {
        Some((collider, _)) => {
            let dir = axis.direction();
            let slope = collider.tangent();
            dir.z * slope.x - dir.x * slope.z < 0.0
        }
        None => false,
    }
}

///Four solid colliders around an axis-aligned block, wound counter-clockwise
///so that each side blocks points inside the block.
pub fn block(min_x: f32, min_z: f32, max_x: f32, max_z: f32) -> [Collider; 4] {
    let bottom_left = Vec3::new(min_x, 0.0, min_z);
    let bottom_right = Vec3::new(max_x, 0.0, min_z);
    let top_right = Vec3::new(max_x, 0.0, max_z);
    let top_left = Vec3::new(min_x, 0.0, max_z);
    [
        Collider::solid(bottom_left, bottom_right),
        Collider::solid(bottom_right, top_right),
        Collider::solid(top_right, top_left),
        Collider::solid(top_left, bottom_left),
    ]
}
