use thiserror::Error;

use super::graph::CellId;

/// Everything that can abort a grid build or a cell-geometry request.
///
/// Holes, incomplete cells, unreachable cells and missing paths are ordinary
/// outcomes and never show up here.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NavGridError {
    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Corner merging could undo stacked-cell separation.
    #[error(
        "min_height_diff_stacked_cells ({cells}) must be greater than \
         min_height_diff_stacked_corners ({corners})"
    )]
    StackingThresholds {
        /// Stacked-cell collapse threshold.
        cells: f32,
        /// Stacked-corner merge threshold.
        corners: f32,
    },

    /// A cell reached geometry construction without exactly six corners.
    #[error("cell has {corners} corners, expected 6")]
    MalformedCell {
        /// Number of corners actually present.
        corners: usize,
    },

    /// Two cells of the same hex claimed the same corner hit.
    #[error("corner hit claimed twice inside hex ({q}, {r})")]
    CornerReused {
        /// Axial `q` of the hex.
        q: i32,
        /// Axial `r` of the hex.
        r: i32,
    },

    /// A graph node ended up with no neighbors or more than six.
    #[error("{id} has {degree} neighbors, expected 1..=6")]
    DegreeOutOfRange {
        /// Offending node.
        id: CellId,
        /// Its neighbor count.
        degree: usize,
    },

    /// An edge is only recorded on one side.
    #[error("edge {from} -> {to} has no reverse edge")]
    AsymmetricEdge {
        /// Node that lists the neighbor.
        from: CellId,
        /// Neighbor missing the back reference.
        to: CellId,
    },

    /// A neighbor appears twice in one adjacency list.
    #[error("{id} lists neighbor {neighbor} more than once")]
    DuplicateNeighbor {
        /// Node with the duplicate entry.
        id: CellId,
        /// Duplicated neighbor.
        neighbor: CellId,
    },
}
