//! Fixed-size land-use grid and its single mutation path.

use std::fmt;

use contracts::{Cell, CellType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    InvalidCellId(String),
    ShapeMismatch { before: u32, after: u32 },
    InvalidLayout(String),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCellId(cell_id) => write!(f, "cell id not present in grid: {cell_id}"),
            Self::ShapeMismatch { before, after } => {
                write!(f, "grid shapes differ: {before}x{before} vs {after}x{after}")
            }
            Self::InvalidLayout(reason) => write!(f, "invalid grid layout: {reason}"),
        }
    }
}

impl std::error::Error for GridError {}

/// Row-major square grid. Shape and coordinates never change after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    size: u32,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, cell_id: &str) -> Option<&Cell> {
        self.cells.iter().find(|cell| cell.id == cell_id)
    }

    pub fn count(&self, cell_type: CellType) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.cell_type == cell_type)
            .count()
    }

    pub fn same_shape(&self, other: &Grid) -> bool {
        self.size == other.size && self.cells.len() == other.cells.len()
    }

    /// Returns a copy with exactly one cell retyped.
    pub fn set_cell_type(&self, cell_id: &str, cell_type: CellType) -> Result<Grid, GridError> {
        let index = self
            .cells
            .iter()
            .position(|cell| cell.id == cell_id)
            .ok_or_else(|| GridError::InvalidCellId(cell_id.to_string()))?;
        let mut next = self.clone();
        next.cells[index].cell_type = cell_type;
        Ok(next)
    }

    /// Builds a grid from row-major cell types; used to seed scripted and generated layouts.
    pub fn from_types(size: u32, types: &[CellType]) -> Result<Grid, GridError> {
        let expected = (size as usize) * (size as usize);
        if size == 0 || types.len() != expected {
            return Err(GridError::InvalidLayout(format!(
                "expected {expected} cell types for size {size}, got {}",
                types.len()
            )));
        }
        let cells = types
            .iter()
            .enumerate()
            .map(|(index, cell_type)| {
                let x = (index as u32) % size;
                let y = (index as u32) / size;
                Cell {
                    id: Cell::position_id(x, y),
                    x,
                    y,
                    cell_type: *cell_type,
                }
            })
            .collect();
        Ok(Grid { size, cells })
    }
}

fn initial_type(size: u32, x: u32, y: u32) -> CellType {
    if x == size - 1 && y == size - 1 {
        return CellType::Factory;
    }
    if x == size / 2 && y == size / 2 {
        return CellType::Park;
    }
    if y == 0 || (y == 1 && x < 3) {
        return CellType::Residential;
    }
    CellType::Empty
}

/// Deterministic starting layout: every game of the same size starts identically.
pub fn create_grid(size: u32) -> Grid {
    let size = size.max(1);
    let cells = (0..size)
        .flat_map(|y| (0..size).map(move |x| (x, y)))
        .map(|(x, y)| Cell {
            id: Cell::position_id(x, y),
            x,
            y,
            cell_type: initial_type(size, x, y),
        })
        .collect();
    Grid { size, cells }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_matches_seed_pattern() {
        let grid = create_grid(5);
        assert_eq!(grid.cells().len(), 25);
        assert_eq!(grid.count(CellType::Residential), 8);
        assert_eq!(grid.count(CellType::Factory), 1);
        assert_eq!(grid.count(CellType::Park), 1);
        assert_eq!(grid.count(CellType::Empty), 15);
        assert_eq!(
            grid.cell("4-4").map(|cell| cell.cell_type),
            Some(CellType::Factory)
        );
        assert_eq!(
            grid.cell("2-2").map(|cell| cell.cell_type),
            Some(CellType::Park)
        );
        assert_eq!(create_grid(5), grid);
    }

    #[test]
    fn set_cell_type_touches_one_cell() {
        let grid = create_grid(5);
        let next = grid
            .set_cell_type("3-3", CellType::Commercial)
            .expect("known cell");
        let changed: Vec<_> = grid
            .cells()
            .iter()
            .zip(next.cells())
            .filter(|(a, b)| a != b)
            .map(|(_, b)| b.id.clone())
            .collect();
        assert_eq!(changed, vec!["3-3".to_string()]);
        assert_eq!(grid.count(CellType::Commercial), 0);
    }

    #[test]
    fn set_cell_type_rejects_unknown_id() {
        let grid = create_grid(5);
        assert_eq!(
            grid.set_cell_type("9-9", CellType::Park),
            Err(GridError::InvalidCellId("9-9".to_string()))
        );
    }

    #[test]
    fn from_types_checks_length() {
        assert!(Grid::from_types(3, &[CellType::Empty; 8]).is_err());
        let grid = Grid::from_types(3, &[CellType::Park; 9]).expect("valid layout");
        assert_eq!(grid.cell("2-1").map(|cell| (cell.x, cell.y)), Some((2, 1)));
    }
}
