use serde::{Deserialize, Serialize};

/// Number of landmarks in a complete hand skeleton.
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Bone connections between landmark indices, for renderers.
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (WRIST, THUMB_CMC),
    (THUMB_CMC, THUMB_MCP),
    (THUMB_MCP, THUMB_IP),
    (THUMB_IP, THUMB_TIP),
    (WRIST, INDEX_MCP),
    (INDEX_MCP, INDEX_PIP),
    (INDEX_PIP, INDEX_DIP),
    (INDEX_DIP, INDEX_TIP),
    (INDEX_MCP, MIDDLE_MCP),
    (MIDDLE_MCP, MIDDLE_PIP),
    (MIDDLE_PIP, MIDDLE_DIP),
    (MIDDLE_DIP, MIDDLE_TIP),
    (MIDDLE_MCP, RING_MCP),
    (RING_MCP, RING_PIP),
    (RING_PIP, RING_DIP),
    (RING_DIP, RING_TIP),
    (RING_MCP, PINKY_MCP),
    (PINKY_MCP, PINKY_PIP),
    (PINKY_PIP, PINKY_DIP),
    (PINKY_DIP, PINKY_TIP),
    (WRIST, PINKY_MCP),
];

/// A single hand-skeleton point.
///
/// `x` and `y` are normalized to the frame's [0,1] width and height, `z` is a
/// relative depth (more negative = closer to the camera). Serialized as a
/// plain `[x, y, z]` array.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the image plane, ignoring depth.
    pub fn planar_distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Move `weight` of the way towards `other`. Blending a point with
    /// itself returns it unchanged for any weight.
    pub fn blend(&self, other: &Landmark, weight: f32) -> Landmark {
        let d = *other - *self;
        Landmark::new(
            self.x + d.x * weight,
            self.y + d.y * weight,
            self.z + d.z * weight,
        )
    }
}

impl From<[f32; 3]> for Landmark {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<Landmark> for [f32; 3] {
    fn from(l: Landmark) -> Self {
        [l.x, l.y, l.z]
    }
}

impl std::ops::Sub for Landmark {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

/// Why a hand failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandDefect {
    WrongLength(usize),
    NonFinite(usize),
}

/// One detected hand: an ordered list of landmarks, index-addressed.
///
/// A well-formed hand has exactly [`LANDMARK_COUNT`] entries; the type does not
/// enforce it so that short or corrupt input from a landmark source can still
/// be represented and rejected downstream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hand {
    pub landmarks: Vec<Landmark>,
}

impl Hand {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn num_landmarks(&self) -> usize {
        self.landmarks.len()
    }

    pub fn get(&self, idx: usize) -> Option<&Landmark> {
        self.landmarks.get(idx)
    }

    /// Check landmark count and coordinate finiteness.
    pub fn validate(&self) -> std::result::Result<(), HandDefect> {
        if self.landmarks.len() != LANDMARK_COUNT {
            return Err(HandDefect::WrongLength(self.landmarks.len()));
        }
        match self.landmarks.iter().position(|l| !l.is_finite()) {
            Some(idx) => Err(HandDefect::NonFinite(idx)),
            None => Ok(()),
        }
    }

    /// Flatten to `[x0, y0, z0, x1, y1, z1, ...]`.
    pub fn to_flat_vec(&self) -> Vec<f32> {
        let mut v = Vec::with_capacity(self.landmarks.len() * 3);
        for l in &self.landmarks {
            v.push(l.x);
            v.push(l.y);
            v.push(l.z);
        }
        v
    }
}

impl std::ops::Index<usize> for Hand {
    type Output = Landmark;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.landmarks[idx]
    }
}

impl std::ops::IndexMut<usize> for Hand {
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.landmarks[idx]
    }
}

/// All hands reported for one capture tick, in landmark-source order.
pub type FrameLandmarks = Vec<Hand>;
