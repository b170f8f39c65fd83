use super::super::Space;
use crate::cell::CellId;
use crate::error::CoreError;
use crate::spatial::Location;
use rand::Rng;
use std::collections::BTreeSet;

impl Space {
    /// Wrap a coordinate onto this space's torus.
    pub fn periodic_map(&self, location: Location) -> Location {
        self.bounds.periodic_map(location)
    }

    /// Step a living cell by a random `{-1, 0, 1}` on each axis, wrapping on
    /// the torus, and patch neighbor sets on both sides.
    pub fn move_cell(&mut self, id: CellId) -> Result<Location, CoreError> {
        let cell = self.checked_cell(id)?;
        if !cell.is_alive() {
            return Err(CoreError::invalid(format!("{id} is dead and cannot move")));
        }
        let dx = self.rng.random_range(-1..=1);
        let dy = self.rng.random_range(-1..=1);
        Ok(self.shift_cell(id, dx, dy))
    }

    /// Move by a known unit step. Only the spots in the overlap lists for this
    /// step are inspected: spots entering the disc around the old location
    /// and spots leaving the disc around the new one.
    pub(crate) fn shift_cell(&mut self, id: CellId, dx: i32, dy: i32) -> Location {
        let old = self.cells[id.0].location();
        let new = self.bounds.periodic_map(old.offset(dx, dy));
        if new == old {
            return old;
        }
        self.grid.remove(old, id);
        self.grid.insert(new, id);
        self.cells[id.0].set_location(new);

        let radius = self.config.vision_radius;
        let leaving = self.occupants_at_offsets(new, self.overlap.entering(-dx, -dy), id);
        for other in leaving {
            let there = self.cells[other.0].location();
            // On a small torus the disc can wrap onto itself.
            if !self.bounds.within(radius, new, there) {
                self.unlink(id, other);
            }
        }
        let entering = self.occupants_at_offsets(old, self.overlap.entering(dx, dy), id);
        for other in entering {
            if self.bounds.within(radius, new, self.cells[other.0].location()) {
                self.link(id, other);
            }
        }
        new
    }

    fn occupants_at_offsets(
        &self,
        origin: Location,
        offsets: &[(i32, i32)],
        except: CellId,
    ) -> BTreeSet<CellId> {
        offsets
            .iter()
            .flat_map(|&(ox, oy)| self.grid.occupants(origin.offset(ox, oy)).iter().copied())
            .filter(|&other| other != except)
            .collect()
    }
}
