use crate::cell::CellId;
use serde::{Deserialize, Serialize};

/// Integer grid coordinate. Placed cells always satisfy `1 <= x <= max_x`,
/// `1 <= y <= max_y`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Torus extent; coordinates wrap into `[1, max]` on each axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    pub max_x: i32,
    pub max_y: i32,
}

impl GridBounds {
    pub fn new(max_x: i32, max_y: i32) -> Self {
        assert!(max_x > 0 && max_y > 0, "grid bounds must be positive");
        Self { max_x, max_y }
    }

    /// Wrap any integer coordinate onto the torus.
    pub fn periodic_map(&self, loc: Location) -> Location {
        Location::new(
            (loc.x - 1).rem_euclid(self.max_x) + 1,
            (loc.y - 1).rem_euclid(self.max_y) + 1,
        )
    }

    pub fn contains(&self, loc: Location) -> bool {
        (1..=self.max_x).contains(&loc.x) && (1..=self.max_y).contains(&loc.y)
    }

    pub fn spots(&self) -> usize {
        self.max_x as usize * self.max_y as usize
    }

    /// Squared minimum-image distance between two on-grid locations.
    pub fn distance_sq(&self, a: Location, b: Location) -> i64 {
        let axis = |d: i32, max: i32| {
            let d = d.rem_euclid(max);
            i64::from(d.min(max - d))
        };
        let dx = axis(a.x - b.x, self.max_x);
        let dy = axis(a.y - b.y, self.max_y);
        dx * dx + dy * dy
    }

    pub fn within(&self, radius: f64, a: Location, b: Location) -> bool {
        self.distance_sq(a, b) as f64 <= radius * radius
    }
}

/// Integer offsets `(dx, dy)` with `sqrt(dx² + dy²) <= radius` around `center`.
pub fn within_radius(radius: f64, center: (i32, i32)) -> Vec<(i32, i32)> {
    let reach = radius.ceil() as i32;
    let r_sq = radius * radius;
    let mut offsets = Vec::new();
    for x in center.0 - reach..=center.0 + reach {
        for y in center.1 - reach..=center.1 + reach {
            let dx = f64::from(center.0 - x);
            let dy = f64::from(center.1 - y);
            if dx * dx + dy * dy <= r_sq {
                offsets.push((x, y));
            }
        }
    }
    offsets
}

/// For each of the nine unit steps `(dx, dy)`, the offsets that lie inside the
/// vision disc centered at `(dx, dy)` but outside the disc centered at the
/// origin.
///
/// Applied at the old location they give the spots that enter a mover's
/// neighborhood; the list for the reversed step applied at the new location
/// gives the spots that leave it.
#[derive(Clone, Debug)]
pub struct OverlapLists {
    lists: [[Vec<(i32, i32)>; 3]; 3],
}

impl OverlapLists {
    pub fn new(radius: f64) -> Self {
        let origin = within_radius(radius, (0, 0));
        let lists = std::array::from_fn(|i| {
            std::array::from_fn(|j| {
                let step = (i as i32 - 1, j as i32 - 1);
                within_radius(radius, step)
                    .into_iter()
                    .filter(|spot| !origin.contains(spot))
                    .collect()
            })
        });
        Self { lists }
    }

    /// Offsets entering the disc when moving by `(dx, dy)`; both in `-1..=1`.
    pub fn entering(&self, dx: i32, dy: i32) -> &[(i32, i32)] {
        assert!(
            (-1..=1).contains(&dx) && (-1..=1).contains(&dy),
            "unit step out of range: ({dx}, {dy})"
        );
        &self.lists[(dx + 1) as usize][(dy + 1) as usize]
    }
}

/// Spatial index: grid spot -> cells standing on it.
#[derive(Clone, Debug)]
pub struct OccupancyGrid {
    bounds: GridBounds,
    slots: Vec<Vec<CellId>>,
}

impl OccupancyGrid {
    pub fn new(bounds: GridBounds) -> Self {
        Self {
            bounds,
            slots: vec![Vec::new(); bounds.spots()],
        }
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    fn index(&self, loc: Location) -> usize {
        let loc = self.bounds.periodic_map(loc);
        (loc.y - 1) as usize * self.bounds.max_x as usize + (loc.x - 1) as usize
    }

    pub fn insert(&mut self, loc: Location, id: CellId) {
        let idx = self.index(loc);
        self.slots[idx].push(id);
    }

    pub fn remove(&mut self, loc: Location, id: CellId) -> bool {
        let idx = self.index(loc);
        let slot = &mut self.slots[idx];
        match slot.iter().position(|&c| c == id) {
            Some(pos) => {
                slot.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    /// Cells on the (wrapped) spot `loc`.
    pub fn occupants(&self, loc: Location) -> &[CellId] {
        &self.slots[self.index(loc)]
    }

    /// Cells on any spot within `radius` of `center`, possibly repeated when
    /// the disc wraps onto itself.
    pub fn occupants_within(&self, radius: f64, center: Location) -> Vec<CellId> {
        within_radius(radius, (center.x, center.y))
            .into_iter()
            .flat_map(|(x, y)| self.occupants(Location::new(x, y)).iter().copied())
            .collect()
    }

    pub fn is_occupied_within(&self, radius: f64, center: Location) -> bool {
        within_radius(radius, (center.x, center.y))
            .into_iter()
            .any(|(x, y)| !self.occupants(Location::new(x, y)).is_empty())
    }

    pub fn population(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }
}
