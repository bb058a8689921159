//! Hex board geometry with axial coordinates

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, Result};

/// Axial hex coordinates
///
/// Ordering is row-major (`r` first, then `q`) so sorted collections of
/// coordinates read top-to-bottom, left-to-right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxialCoord {
    pub q: i32,
    pub r: i32,
}

impl Ord for AxialCoord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.r, self.q).cmp(&(other.r, other.q))
    }
}

impl PartialOrd for AxialCoord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The six neighbor directions, in canonical enumeration order.
///
/// Every neighbor walk in the engine uses this order; the pathfinder relies
/// on it for deterministic tie-breaking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    TopLeft,
    TopRight,
    Right,
    BottomRight,
    BottomLeft,
}

/// Direction vectors in axial coordinates (dq, dr)
/// Index: 0=L, 1=TL, 2=TR, 3=R, 4=BR, 5=BL
pub const DIRECTIONS: [(i32, i32); 6] = [
    (-1, 0), // L
    (0, -1), // TL
    (1, -1), // TR
    (1, 0),  // R
    (0, 1),  // BR
    (-1, 1), // BL
];

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Left,
        Direction::TopLeft,
        Direction::TopRight,
        Direction::Right,
        Direction::BottomRight,
        Direction::BottomLeft,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn vector(self) -> (i32, i32) {
        DIRECTIONS[self.index()]
    }

    pub fn opposite(self) -> Direction {
        Direction::ALL[(self.index() + 3) % 6]
    }

    /// Short code used in text input and logs
    pub fn code(self) -> &'static str {
        match self {
            Direction::Left => "L",
            Direction::TopLeft => "TL",
            Direction::TopRight => "TR",
            Direction::Right => "R",
            Direction::BottomRight => "BR",
            Direction::BottomLeft => "BL",
        }
    }
}

impl FromStr for Direction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" | "LEFT" => Ok(Direction::Left),
            "TL" | "UL" | "LU" | "TOPLEFT" => Ok(Direction::TopLeft),
            "TR" | "UR" | "RU" | "TOPRIGHT" => Ok(Direction::TopRight),
            "R" | "RIGHT" => Ok(Direction::Right),
            "BR" | "DR" | "RD" | "BOTTOMRIGHT" => Ok(Direction::BottomRight),
            "BL" | "DL" | "LD" | "BOTTOMLEFT" => Ok(Direction::BottomLeft),
            other => Err(EngineError::Parse(format!(
                "invalid direction '{other}' (valid: L, TL, TR, R, BR, BL)"
            ))),
        }
    }
}

impl AxialCoord {
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Third cube axis (q + r + s = 0)
    pub fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// Distance between two hexes
    pub fn distance_to(&self, other: AxialCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        dq.max(dr).max(ds) as u32
    }

    /// Get neighbor in direction
    pub fn neighbor(&self, direction: Direction) -> AxialCoord {
        let (dq, dr) = direction.vector();
        AxialCoord::new(self.q + dq, self.r + dr)
    }

    /// All six neighbors in canonical order
    pub fn neighbors(&self) -> [AxialCoord; 6] {
        Direction::ALL.map(|d| self.neighbor(d))
    }

    /// Direction to an adjacent hex, if `other` is adjacent
    pub fn direction_to(&self, other: AxialCoord) -> Option<Direction> {
        let delta = (other.q - self.q, other.r - self.r);
        Direction::ALL.into_iter().find(|d| d.vector() == delta)
    }

    /// Hex at an offset from this one, if it fits the coordinate type
    fn offset(&self, dq: i64, dr: i64) -> Option<AxialCoord> {
        let q = i32::try_from(i64::from(self.q) + dq).ok()?;
        let r = i32::try_from(i64::from(self.r) + dr).ok()?;
        Some(AxialCoord::new(q, r))
    }

    /// All hexes within `radius` (inclusive), self included.
    ///
    /// Hexes that would fall outside the coordinate range are left out.
    pub fn range(&self, radius: u32) -> Vec<AxialCoord> {
        let radius = i64::from(radius);
        let mut results = Vec::new();
        for dq in -radius..=radius {
            let r1 = (-radius).max(-dq - radius);
            let r2 = radius.min(-dq + radius);
            results.extend((r1..=r2).filter_map(|dr| self.offset(dq, dr)));
        }
        results
    }

    /// All hexes at exactly distance `radius`
    pub fn ring(&self, radius: u32) -> Vec<AxialCoord> {
        if radius == 0 {
            return vec![*self];
        }
        let radius = i64::from(radius);
        let (sq, sr) = Direction::BottomLeft.vector();
        let (mut dq, mut dr) = (i64::from(sq) * radius, i64::from(sr) * radius);
        let mut results = Vec::new();
        // Walk the six sides starting from the bottom-left corner
        for dir in [
            Direction::Right,
            Direction::TopRight,
            Direction::TopLeft,
            Direction::Left,
            Direction::BottomLeft,
            Direction::BottomRight,
        ] {
            let (step_q, step_r) = dir.vector();
            for _ in 0..radius {
                results.extend(self.offset(dq, dr));
                dq += i64::from(step_q);
                dr += i64::from(step_r);
            }
        }
        results
    }

    /// Display form (odd-row offset)
    pub fn to_row_col(&self) -> RowCol {
        RowCol {
            row: self.r,
            col: self.q + (self.r - (self.r & 1)) / 2,
        }
    }

    /// Inverse of [`AxialCoord::to_row_col`]
    pub fn from_row_col(rc: RowCol) -> AxialCoord {
        AxialCoord::new(rc.col - (rc.row - (rc.row & 1)) / 2, rc.row)
    }

    /// Parse a position relative to `base`.
    ///
    /// Accepts everything [`AxialCoord::from_str`] accepts, plus a
    /// comma-separated direction walk such as `"TL,TL,R"`.
    pub fn parse_relative(input: &str, base: AxialCoord) -> Result<AxialCoord> {
        let parts: Vec<&str> = input.split(',').collect();
        let walk: std::result::Result<Vec<Direction>, _> =
            parts.iter().map(|p| p.parse::<Direction>()).collect();
        match walk {
            Ok(dirs) => Ok(dirs.into_iter().fold(base, |c, d| c.neighbor(d))),
            Err(_) => input.parse(),
        }
    }
}

impl fmt::Display for AxialCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

impl FromStr for AxialCoord {
    type Err = EngineError;

    /// `"q,r"` in axial form or `"r<row>,<col>"` in display form
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (is_row_col, body) = match s.strip_prefix(['r', 'R']) {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (a, b) = body
            .split_once(',')
            .ok_or_else(|| EngineError::Parse(format!("expected 'q,r' or 'rROW,COL', got '{s}'")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<i32>()
                .map_err(|e| EngineError::Parse(format!("bad coordinate '{v}': {e}")))
        };
        let (a, b) = (parse(a)?, parse(b)?);
        if is_row_col {
            Ok(AxialCoord::from_row_col(RowCol { row: a, col: b }))
        } else {
            Ok(AxialCoord::new(a, b))
        }
    }
}

/// Row/column display coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowCol {
    pub row: i32,
    pub col: i32,
}

impl fmt::Display for RowCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{},{}", self.row, self.col)
    }
}

/// Axis-aligned bounding box over axial coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_q: i32,
    pub max_q: i32,
    pub min_r: i32,
    pub max_r: i32,
}

impl Bounds {
    pub fn around(coord: AxialCoord) -> Self {
        Self {
            min_q: coord.q,
            max_q: coord.q,
            min_r: coord.r,
            max_r: coord.r,
        }
    }

    pub fn include(&mut self, coord: AxialCoord) {
        self.min_q = self.min_q.min(coord.q);
        self.max_q = self.max_q.max(coord.q);
        self.min_r = self.min_r.min(coord.r);
        self.max_r = self.max_r.max(coord.r);
    }

    pub fn contains(&self, coord: AxialCoord) -> bool {
        (self.min_q..=self.max_q).contains(&coord.q) && (self.min_r..=self.max_r).contains(&coord.r)
    }

    /// Every coordinate in the box
    pub fn coords(&self) -> impl Iterator<Item = AxialCoord> + '_ {
        (self.min_r..=self.max_r)
            .flat_map(move |r| (self.min_q..=self.max_q).map(move |q| AxialCoord::new(q, r)))
    }
}
