//! Cell topology abstractions for the host and free-living population layers.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors emitted by topology constructors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., a zero-sized grid).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// How cells relate to one another when placing offspring and looking up neighbours.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PopulationStructure {
    /// Every cell neighbours every other cell.
    #[default]
    Mixed,
    /// Toroidal grid with a Moore (3x3) neighbourhood.
    Grid,
}

impl PopulationStructure {
    /// Build the topology for a `width` x `height` world.
    pub fn build(self, width: usize, height: usize) -> Result<Box<dyn CellTopology>, IndexError> {
        match self {
            Self::Mixed => {
                let cells = width
                    .checked_mul(height)
                    .ok_or(IndexError::InvalidConfig("cell count overflows usize"))?;
                Ok(Box::new(MixedTopology::new(cells)?))
            }
            Self::Grid => Ok(Box::new(GridTopology::new(width, height)?)),
        }
    }
}

/// Common behaviour exposed by cell topologies.
pub trait CellTopology: fmt::Debug + Send + Sync {
    /// Total number of cells in each population layer.
    fn cell_count(&self) -> usize;

    /// Uniformly random cell anywhere in the world.
    fn random_cell(&self, rng: &mut dyn RngCore) -> usize {
        rng.random_range(0..self.cell_count())
    }

    /// Random cell near `cell`; may return `cell` itself.
    fn random_neighbor(&self, cell: usize, rng: &mut dyn RngCore) -> usize;

    /// Visit each distinct neighbour of `cell`, never `cell` itself.
    fn for_each_neighbor(&self, cell: usize, visitor: &mut dyn FnMut(usize));
}

/// Well-mixed population: placement ignores space entirely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MixedTopology {
    cells: usize,
}

impl MixedTopology {
    /// Create a well-mixed topology over `cells` cells.
    pub fn new(cells: usize) -> Result<Self, IndexError> {
        if cells == 0 {
            return Err(IndexError::InvalidConfig("cell count must be non-zero"));
        }
        Ok(Self { cells })
    }
}

impl CellTopology for MixedTopology {
    fn cell_count(&self) -> usize {
        self.cells
    }

    fn random_neighbor(&self, _cell: usize, rng: &mut dyn RngCore) -> usize {
        self.random_cell(rng)
    }

    fn for_each_neighbor(&self, cell: usize, visitor: &mut dyn FnMut(usize)) {
        for other in (0..self.cells).filter(|&other| other != cell) {
            visitor(other);
        }
    }
}

/// Toroidal grid stored in row-major order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GridTopology {
    width: usize,
    height: usize,
}

impl GridTopology {
    /// Create a grid with the provided dimensions.
    pub fn new(width: usize, height: usize) -> Result<Self, IndexError> {
        if width == 0 || height == 0 {
            return Err(IndexError::InvalidConfig("grid dimensions must be non-zero"));
        }
        if width.checked_mul(height).is_none() {
            return Err(IndexError::InvalidConfig("cell count overflows usize"));
        }
        Ok(Self { width, height })
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    fn offset(&self, cell: usize, dx: isize, dy: isize) -> usize {
        let x = (cell % self.width) as isize;
        let y = (cell / self.width) as isize;
        let nx = (x + dx).rem_euclid(self.width as isize) as usize;
        let ny = (y + dy).rem_euclid(self.height as isize) as usize;
        ny * self.width + nx
    }
}

impl CellTopology for GridTopology {
    fn cell_count(&self) -> usize {
        self.width * self.height
    }

    fn random_neighbor(&self, cell: usize, rng: &mut dyn RngCore) -> usize {
        let dx = rng.random_range(-1i32..=1) as isize;
        let dy = rng.random_range(-1i32..=1) as isize;
        self.offset(cell, dx, dy)
    }

    fn for_each_neighbor(&self, cell: usize, visitor: &mut dyn FnMut(usize)) {
        // Small grids wrap onto the same cell from several offsets.
        let mut seen = [usize::MAX; 8];
        let mut count = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let neighbor = self.offset(cell, dx, dy);
                if neighbor == cell || seen[..count].contains(&neighbor) {
                    continue;
                }
                seen[count] = neighbor;
                count += 1;
                visitor(neighbor);
            }
        }
    }
}
