use super::super::Space;
use crate::cell::{Cell, CellId};
use crate::error::CoreError;
use crate::spatial::Location;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::trace;

impl Space {
    /// Put fresh cells at uniformly random spots with no occupant within
    /// `cell_exclusion_radius`, wiring up their neighbor sets. Returns the ids
    /// assigned, in input order.
    pub fn place_cells(&mut self, cells: Vec<Cell>) -> Result<Vec<CellId>, CoreError> {
        let mut ids = Vec::with_capacity(cells.len());
        for cell in cells {
            let location = self.random_free_location()?;
            ids.push(self.insert_cell(cell, location)?);
        }
        Ok(ids)
    }

    /// Put a fresh cell at an explicit spot. The exclusion radius is not
    /// enforced here.
    pub fn place_cell_at(&mut self, location: Location) -> Result<CellId, CoreError> {
        if !self.bounds.contains(location) {
            return Err(CoreError::invalid(format!(
                "location ({}, {}) is off the {}x{} grid",
                location.x, location.y, self.bounds.max_x, self.bounds.max_y
            )));
        }
        self.insert_cell(Cell::new(CellId(self.cells.len())), location)
    }

    fn random_free_location(&mut self) -> Result<Location, CoreError> {
        let radius = self.config.cell_exclusion_radius;
        for _ in 0..self.config.placement_attempts {
            let candidate = Location::new(
                self.rng.random_range(1..=self.bounds.max_x),
                self.rng.random_range(1..=self.bounds.max_y),
            );
            if !self.grid.is_occupied_within(radius, candidate) {
                return Ok(candidate);
            }
        }
        Err(CoreError::not_found(format!(
            "no spot clear of other cells within {radius} after {} attempts",
            self.config.placement_attempts
        )))
    }

    fn insert_cell(&mut self, mut cell: Cell, location: Location) -> Result<CellId, CoreError> {
        if cell.rule_count() > 0 || cell.stored_count() > 0 || !cell.is_alive() {
            return Err(CoreError::invalid(
                "only fresh cells can be placed; give rules through Space::add_rule",
            ));
        }
        let id = CellId(self.cells.len());
        cell.assign_id(id);
        cell.set_location(location);
        let nearby: BTreeSet<CellId> = self
            .grid
            .occupants_within(self.config.vision_radius, location)
            .into_iter()
            .collect();
        self.grid.insert(location, id);
        self.cells.push(cell);
        for other in nearby {
            self.link(id, other);
        }
        trace!(cell = %id, x = location.x, y = location.y, "cell placed");
        Ok(id)
    }
}
