//! Regular square grid over a projected bounding box.
//!
//! Cells are laid out on a lattice anchored at the box's minimum corner
//! and stepping by `cell_size` until the box's maximum is passed, so edge
//! cells may extend beyond the data. Cell ids are assigned column-major
//! (x outer, y inner) and are stable for a given box and cell size.

use geo::{Point, Polygon, Rect, coord};

use crate::SpatialError;

/// Upper bound on lattice size; protects against a tiny cell size over a
/// large box.
pub const MAX_CELLS: usize = 25_000_000;

/// Slack (in cell widths) for treating a point as on the outer edge.
const EDGE_TOLERANCE: f64 = 1e-9;

/// Axis-aligned bounding box in projected meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum easting.
    pub min_x: f64,
    /// Minimum northing.
    pub min_y: f64,
    /// Maximum easting.
    pub max_x: f64,
    /// Maximum northing.
    pub max_y: f64,
}

impl Bounds {
    /// Creates a box from its corners.
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Tight bounds of a set of points, or `None` if there are none.
    #[must_use]
    pub fn of_points(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        points.into_iter().fold(None, |acc, (x, y)| match acc {
            None => Some(Self::new(x, y, x, y)),
            Some(b) => Some(Self::new(
                b.min_x.min(x),
                b.min_y.min(y),
                b.max_x.max(x),
                b.max_y.max(y),
            )),
        })
    }

    /// Extent along x.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Extent along y.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// One square cell of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    /// Stable cell identity (enumeration index).
    pub id: usize,
    /// Lattice column (x index).
    pub column: usize,
    /// Lattice row (y index).
    pub row: usize,
    /// Square footprint in projected meters.
    pub rect: Rect<f64>,
}

impl GridCell {
    /// Center of the cell.
    #[must_use]
    pub fn centroid(&self) -> Point<f64> {
        self.rect.center().into()
    }

    /// Footprint as a closed polygon.
    #[must_use]
    pub fn polygon(&self) -> Polygon<f64> {
        self.rect.to_polygon()
    }
}

/// A regular lattice of square cells.
#[derive(Debug, Clone)]
pub struct Grid {
    origin_x: f64,
    origin_y: f64,
    cell_size: f64,
    columns: usize,
    rows: usize,
    cells: Vec<GridCell>,
}

impl Grid {
    /// Builds the lattice covering `bounds`.
    ///
    /// The number of columns is `ceil(width / cell_size)` and likewise
    /// for rows; no partially covered cell is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Configuration`] if `cell_size` is not a
    /// positive finite number, the box has zero (or negative) width or
    /// height, or the lattice would exceed [`MAX_CELLS`].
    pub fn build(bounds: Bounds, cell_size: f64) -> Result<Self, SpatialError> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(SpatialError::Configuration {
                message: format!("cell size must be positive, got {cell_size}"),
            });
        }

        let width = bounds.width();
        let height = bounds.height();
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(SpatialError::Configuration {
                message: format!(
                    "degenerate bounding box ({width} m x {height} m); need non-zero width and height"
                ),
            });
        }

        let columns = lattice_steps(width, cell_size)?;
        let rows = lattice_steps(height, cell_size)?;
        let total = columns.checked_mul(rows).filter(|&n| n <= MAX_CELLS).ok_or_else(|| {
            SpatialError::Configuration {
                message: format!(
                    "grid of {columns} x {rows} cells exceeds the {MAX_CELLS} cell limit"
                ),
            }
        })?;

        let mut cells = Vec::with_capacity(total);
        for column in 0..columns {
            let x0 = step(bounds.min_x, column, cell_size);
            for row in 0..rows {
                let y0 = step(bounds.min_y, row, cell_size);
                cells.push(GridCell {
                    id: cells.len(),
                    column,
                    row,
                    rect: Rect::new(
                        coord! { x: x0, y: y0 },
                        coord! { x: x0 + cell_size, y: y0 + cell_size },
                    ),
                });
            }
        }

        log::debug!(
            "Built {columns} x {rows} grid ({total} cells of {cell_size} m) from ({}, {})",
            bounds.min_x,
            bounds.min_y
        );

        Ok(Self {
            origin_x: bounds.min_x,
            origin_y: bounds.min_y,
            cell_size,
            columns,
            rows,
            cells,
        })
    }

    /// All cells in id order.
    #[must_use]
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// The cell with the given id.
    #[must_use]
    pub fn cell(&self, id: usize) -> Option<&GridCell> {
        self.cells.get(id)
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always `false` for a successfully built grid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of lattice columns.
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Number of lattice rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Cell side length in meters.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Cell centroids in id order, as `[x, y]` pairs.
    #[must_use]
    pub fn centroids(&self) -> Vec<[f64; 2]> {
        self.cells
            .iter()
            .map(|cell| {
                let c = cell.rect.center();
                [c.x, c.y]
            })
            .collect()
    }

    /// Id of the cell containing `(x, y)`.
    ///
    /// Cells are half-open (`[x0, x0 + size)`), except that the lattice's
    /// outer maximum edges are closed so the extreme data points are kept.
    /// Returns `None` for points outside the lattice.
    #[must_use]
    pub fn locate(&self, x: f64, y: f64) -> Option<usize> {
        let column = axis_index(x, self.origin_x, self.cell_size, self.columns)?;
        let row = axis_index(y, self.origin_y, self.cell_size, self.rows)?;
        Some(column * self.rows + row)
    }
}

#[allow(clippy::cast_precision_loss)]
fn step(origin: f64, index: usize, cell_size: f64) -> f64 {
    (index as f64).mul_add(cell_size, origin)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn lattice_steps(extent: f64, cell_size: f64) -> Result<usize, SpatialError> {
    let steps = (extent / cell_size).ceil();
    if steps > MAX_CELLS as f64 {
        return Err(SpatialError::Configuration {
            message: format!("{steps} cells along one axis exceeds the {MAX_CELLS} cell limit"),
        });
    }
    Ok((steps as usize).max(1))
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn axis_index(value: f64, origin: f64, cell_size: f64, count: usize) -> Option<usize> {
    if !value.is_finite() || value < origin {
        return None;
    }
    let offset = (value - origin) / cell_size;
    let index = offset.floor() as usize;
    if index < count {
        Some(index)
    } else if index == count && offset <= count as f64 + EDGE_TOLERANCE {
        Some(count - 1)
    } else {
        None
    }
}
