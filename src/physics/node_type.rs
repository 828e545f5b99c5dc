//! Classification of map-plane nodes into ice-covered, ice-margin and ice-free nodes.
//!
//! An element is icy iff the thickness at all four of its nodes is at or above the
//! threshold. A node with 4 icy neighbors is [`NodeType::Interior`], with none
//! [`NodeType::Exterior`], otherwise [`NodeType::Boundary`]. Nodes at a non-periodic domain
//! edge have fewer than four elements and can never be interior.

use serde::{Deserialize, Serialize};

use crate::discretization::{GhostExchange, GridTopology, NodeField};
use crate::fem::q1::NODE_OFFSETS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeType {
    Interior,
    Boundary,
    #[default]
    Exterior,
}

impl NodeType {
    pub fn from_icy_count(count: u8) -> Self {
        match count {
            4 => NodeType::Interior,
            0 => NodeType::Exterior,
            _ => NodeType::Boundary,
        }
    }
}

/// Number of icy elements adjacent to each node of the ghosted window.
///
/// Counts at nodes next to the edge of the ghosted window miss elements that lie outside
/// it; a ghost exchange restores them from the owning rank.
pub fn count_icy_elements(
    grid: &GridTopology,
    thickness: &NodeField<f64>,
    min_thickness: f64,
) -> NodeField<u8> {
    let mut counts = NodeField::new(grid, 0u8);
    for (i, j) in grid.ghosted_elements() {
        let icy = NODE_OFFSETS
            .iter()
            .all(|&(di, dj)| thickness[(i + di, j + dj)] >= min_thickness);
        if icy {
            for &(di, dj) in &NODE_OFFSETS {
                counts[(i + di, j + dj)] += 1;
            }
        }
    }
    counts
}

/// Classifies the nodes of one rank; ghosts of the result are up to date.
///
/// `thickness` ghosts have to be current. Only the ghost-exchanged counts decide the
/// type of a ghost node, so neighboring ranks agree on every shared node.
pub fn classify<E: GhostExchange>(
    grid: &GridTopology,
    thickness: &NodeField<f64>,
    min_thickness: f64,
    exchange: &E,
) -> NodeField<NodeType> {
    let mut counts = count_icy_elements(grid, thickness, min_thickness);
    exchange.update_ghosts(&mut counts);
    counts.map(|&c| NodeType::from_icy_count(c))
}

/// True if the floatation criterion changes sign within an element.
pub fn grounding_line(floatation: &[f64; 4]) -> bool {
    let grounded = floatation.iter().any(|&f| f <= 0.0);
    let floating = floatation.iter().any(|&f| f > 0.0);
    grounded && floating
}

/// True if the sea level crosses a face: some nodes above, some at or below it.
pub fn partially_submerged_face(z: &[f64; 4], sea_level: &[f64; 4]) -> bool {
    let above = z.iter().zip(sea_level).any(|(z, s)| z > s);
    let below = z.iter().zip(sea_level).any(|(z, s)| z <= s);
    above && below
}

/// True if a lateral face belongs to the ice margin and reaches below sea level.
pub fn marine_boundary_face(
    node_type: &[NodeType; 4],
    ice_bottom: &[f64; 4],
    sea_level: &[f64; 4],
) -> bool {
    let boundary = node_type.iter().all(|&t| t == NodeType::Boundary);
    let submerged = ice_bottom.iter().zip(sea_level).any(|(b, s)| b < s);
    boundary && submerged
}

/// True if an element touches the ice-free area.
pub fn exterior_element(node_type: &[NodeType; 4]) -> bool {
    node_type.iter().any(|&t| t == NodeType::Exterior)
}

/// Lateral faces of a hexahedral element, named after the direction of the outward
/// normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LateralFace {
    West,
    East,
    South,
    North,
}

impl LateralFace {
    pub const ALL: [LateralFace; 4] = [
        LateralFace::West,
        LateralFace::East,
        LateralFace::South,
        LateralFace::North,
    ];

    /// Element node indices (in `NODE_OFFSETS` order) of the two face corners.
    pub fn nodes(self) -> [usize; 2] {
        match self {
            LateralFace::West => [3, 0],
            LateralFace::East => [1, 2],
            LateralFace::South => [0, 1],
            LateralFace::North => [2, 3],
        }
    }

    pub fn normal(self) -> [f64; 2] {
        match self {
            LateralFace::West => [-1.0, 0.0],
            LateralFace::East => [1.0, 0.0],
            LateralFace::South => [0.0, -1.0],
            LateralFace::North => [0.0, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::grid::Periodicity;
    use crate::discretization::LocalExchange;
    use NodeType::*;

    fn serial(mx: usize, my: usize, periodicity: Periodicity) -> GridTopology {
        GridTopology::serial(mx, my, 1.0, 1.0, periodicity).unwrap()
    }

    #[test]
    fn single_icy_element() {
        let grid = serial(4, 4, Periodicity::None);
        let thickness = NodeField::from_global_fn(&grid, |i, j| {
            if (1..=2).contains(&i) && (1..=2).contains(&j) {
                100.0
            } else {
                0.0
            }
        });
        let types = classify(&grid, &thickness, 10.0, &LocalExchange);
        for (i, j) in types.owned_indices() {
            let expected = if (1..=2).contains(&i) && (1..=2).contains(&j) {
                Boundary
            } else {
                Exterior
            };
            assert_eq!(types[(i, j)], expected, "node ({i}, {j})");
        }
    }

    #[test]
    fn threshold_is_inclusive_and_interior_needs_four_elements() {
        let grid = serial(5, 5, Periodicity::None);
        let thickness = NodeField::new(&grid, 10.0);
        let types = classify(&grid, &thickness, 10.0, &LocalExchange);
        assert_eq!(types[(2, 2)], Interior);
        assert_eq!(types[(0, 2)], Boundary);
        assert_eq!(types[(0, 0)], Boundary);

        let types = classify(&grid, &thickness, 10.0 + 1e-9, &LocalExchange);
        assert!(types.owned_indices().all(|n| types[n] == Exterior));
    }

    #[test]
    fn periodic_grids_have_no_edges() {
        let grid = serial(4, 3, Periodicity::XY);
        let thickness = NodeField::new(&grid, 50.0);
        let types = classify(&grid, &thickness, 10.0, &LocalExchange);
        assert!(types.ghosted_indices().all(|n| types[n] == Interior));

        let grid = serial(4, 3, Periodicity::X);
        let thickness = NodeField::new(&grid, 50.0);
        let types = classify(&grid, &thickness, 10.0, &LocalExchange);
        assert_eq!(types[(0, 1)], Interior);
        assert_eq!(types[(0, 0)], Boundary);
    }

    #[test]
    fn classification_is_idempotent() {
        let grid = serial(6, 5, Periodicity::None);
        let thickness = NodeField::from_global_fn(&grid, |i, j| ((i * 7 + j * 3) % 5) as f64 * 10.0);
        let first = classify(&grid, &thickness, 15.0, &LocalExchange);
        let second = classify(&grid, &thickness, 15.0, &LocalExchange);
        assert_eq!(first, second);
    }

    #[test]
    fn grounding_line_needs_both_signs() {
        assert!(grounding_line(&[-1.0, 0.5, 0.5, 0.5]));
        assert!(grounding_line(&[0.0, 0.5, 0.5, 0.5]));
        assert!(!grounding_line(&[1.0, 0.5, 0.5, 0.5]));
        assert!(!grounding_line(&[0.0, -0.5, -2.0, 0.0]));
    }

    #[test]
    fn face_predicates() {
        let sea = [0.0; 4];
        assert!(partially_submerged_face(&[-10.0, -10.0, 10.0, 10.0], &sea));
        assert!(partially_submerged_face(&[0.0, 0.0, 1.0, 1.0], &sea));
        assert!(!partially_submerged_face(&[1.0; 4], &sea));
        assert!(!partially_submerged_face(&[-1.0; 4], &sea));

        assert!(marine_boundary_face(&[Boundary; 4], &[-1.0, 5.0, 5.0, 5.0], &sea));
        assert!(!marine_boundary_face(&[Boundary; 4], &[1.0; 4], &sea));
        assert!(!marine_boundary_face(
            &[Boundary, Interior, Boundary, Boundary],
            &[-1.0; 4],
            &sea
        ));

        assert!(exterior_element(&[Interior, Exterior, Interior, Interior]));
        assert!(!exterior_element(&[Boundary; 4]));
    }
}
