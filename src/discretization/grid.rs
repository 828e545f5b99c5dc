use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Periodic directions of the map-plane grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Periodicity {
    #[default]
    None,
    X,
    Y,
    XY,
}

impl Periodicity {
    pub fn x(self) -> bool {
        matches!(self, Periodicity::X | Periodicity::XY)
    }

    pub fn y(self) -> bool {
        matches!(self, Periodicity::Y | Periodicity::XY)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("the grid needs at least 2 nodes in each direction (got {mx} x {my})")]
    TooSmall { mx: usize, my: usize },
    #[error("ghost width has to be at least 1 (got {0})")]
    GhostWidth(usize),
    #[error("cannot split {nodes} nodes across {procs} ranks")]
    Partition { nodes: usize, procs: usize },
    #[error("rank {rank} is outside of a process grid with {size} ranks")]
    Rank { rank: usize, size: usize },
}

/// Map-plane grid and the ownership window of one rank.
///
/// Owned nodes are `[xs, xs + xm) x [ys, ys + ym)`. The ghosted window extends it by
/// `ghost_width` nodes, wrapping around in periodic directions and clipped at the
/// domain edge otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct GridTopology {
    pub mx: usize,
    pub my: usize,
    pub xs: usize,
    pub xm: usize,
    pub ys: usize,
    pub ym: usize,
    pub ghost_width: usize,
    pub periodicity: Periodicity,
    pub dx: f64,
    pub dy: f64,
    pub procs_x: usize,
    pub procs_y: usize,
    pub rank: usize,
}

impl GridTopology {
    pub fn serial(
        mx: usize,
        my: usize,
        dx: f64,
        dy: f64,
        periodicity: Periodicity,
    ) -> Result<Self, GridError> {
        Self::partition(mx, my, 1, 1, 0, 1, periodicity, dx, dy)
    }

    /// Ownership window of `rank` in a `procs_x x procs_y` process grid.
    ///
    /// Ranks are numbered x-fastest. The first `M mod P` ranks in each direction own one
    /// extra row (column).
    #[allow(clippy::too_many_arguments)]
    pub fn partition(
        mx: usize,
        my: usize,
        procs_x: usize,
        procs_y: usize,
        rank: usize,
        ghost_width: usize,
        periodicity: Periodicity,
        dx: f64,
        dy: f64,
    ) -> Result<Self, GridError> {
        if mx < 2 || my < 2 {
            return Err(GridError::TooSmall { mx, my });
        }
        if ghost_width == 0 {
            return Err(GridError::GhostWidth(ghost_width));
        }
        if procs_x == 0 || procs_x > mx {
            return Err(GridError::Partition {
                nodes: mx,
                procs: procs_x,
            });
        }
        if procs_y == 0 || procs_y > my {
            return Err(GridError::Partition {
                nodes: my,
                procs: procs_y,
            });
        }
        let size = procs_x * procs_y;
        if rank >= size {
            return Err(GridError::Rank { rank, size });
        }

        let (xs, xm) = split(mx, procs_x, rank % procs_x);
        let (ys, ym) = split(my, procs_y, rank / procs_x);

        Ok(Self {
            mx,
            my,
            xs,
            xm,
            ys,
            ym,
            ghost_width,
            periodicity,
            dx,
            dy,
            procs_x,
            procs_y,
            rank,
        })
    }

    /// Topologies of every rank in the process grid.
    #[allow(clippy::too_many_arguments)]
    pub fn partition_all(
        mx: usize,
        my: usize,
        procs_x: usize,
        procs_y: usize,
        ghost_width: usize,
        periodicity: Periodicity,
        dx: f64,
        dy: f64,
    ) -> Result<Vec<Self>, GridError> {
        (0..procs_x * procs_y)
            .map(|rank| {
                Self::partition(
                    mx,
                    my,
                    procs_x,
                    procs_y,
                    rank,
                    ghost_width,
                    periodicity,
                    dx,
                    dy,
                )
            })
            .collect()
    }

    pub fn size(&self) -> usize {
        self.procs_x * self.procs_y
    }

    pub fn owns(&self, i: i32, j: i32) -> bool {
        let (xs, ys) = (self.xs as i32, self.ys as i32);
        i >= xs && i < xs + self.xm as i32 && j >= ys && j < ys + self.ym as i32
    }

    /// Half-open range of ghosted x indices. May be negative in periodic directions.
    pub fn ghosted_x(&self) -> (i32, i32) {
        ghosted_range(
            self.xs,
            self.xm,
            self.mx,
            self.ghost_width,
            self.periodicity.x(),
        )
    }

    pub fn ghosted_y(&self) -> (i32, i32) {
        ghosted_range(
            self.ys,
            self.ym,
            self.my,
            self.ghost_width,
            self.periodicity.y(),
        )
    }

    /// Elements (by lower-left node) whose four nodes all lie in the ghosted window.
    pub fn ghosted_elements(&self) -> impl Iterator<Item = (i32, i32)> {
        let (x0, x1) = self.ghosted_x();
        let (y0, y1) = self.ghosted_y();
        (y0..y1 - 1).flat_map(move |j| (x0..x1 - 1).map(move |i| (i, j)))
    }

    pub fn x(&self, i: i32) -> f64 {
        i as f64 * self.dx
    }

    pub fn y(&self, j: i32) -> f64 {
        j as f64 * self.dy
    }
}

fn split(m: usize, procs: usize, index: usize) -> (usize, usize) {
    let base = m / procs;
    let rem = m % procs;
    let start = index * base + index.min(rem);
    (start, base + usize::from(index < rem))
}

fn ghosted_range(start: usize, len: usize, m: usize, width: usize, periodic: bool) -> (i32, i32) {
    let (start, end, width) = (start as i32, (start + len) as i32, width as i32);
    if periodic {
        (start - width, end + width)
    } else {
        ((start - width).max(0), (end + width).min(m as i32))
    }
}

/// Maps a possibly out-of-domain index back into `[0, m)`; `None` outside a
/// non-periodic domain.
pub fn wrap(index: i32, m: usize, periodic: bool) -> Option<usize> {
    let m = m as i32;
    if periodic {
        Some(index.rem_euclid(m) as usize)
    } else if (0..m).contains(&index) {
        Some(index as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_covers_every_node_once() {
        let grids = GridTopology::partition_all(11, 7, 3, 2, 1, Periodicity::None, 1.0, 1.0)
            .unwrap();
        let mut count = vec![0; 11 * 7];
        for g in &grids {
            for j in g.ys..g.ys + g.ym {
                for i in g.xs..g.xs + g.xm {
                    count[j * 11 + i] += 1;
                }
            }
        }
        assert!(count.iter().all(|&c| c == 1));
        assert_eq!(grids[0].xm, 4);
        assert_eq!(grids[2].xm, 3);
        assert_eq!(grids[2].xs, 8);
    }

    #[test]
    fn ghost_window_is_clipped_or_wrapped() {
        let g = GridTopology::serial(5, 4, 1.0, 1.0, Periodicity::None).unwrap();
        assert_eq!(g.ghosted_x(), (0, 5));
        assert_eq!(g.ghosted_elements().count(), 4 * 3);

        let g = GridTopology::serial(5, 4, 1.0, 1.0, Periodicity::X).unwrap();
        assert_eq!(g.ghosted_x(), (-1, 6));
        assert_eq!(g.ghosted_y(), (0, 4));
        assert_eq!(wrap(-1, 5, true), Some(4));
        assert_eq!(wrap(5, 5, false), None);
    }

    #[test]
    fn rejects_invalid_requests() {
        assert_eq!(
            GridTopology::partition(5, 5, 1, 1, 0, 0, Periodicity::None, 1.0, 1.0),
            Err(GridError::GhostWidth(0))
        );
        assert!(matches!(
            GridTopology::partition(5, 5, 6, 1, 0, 1, Periodicity::None, 1.0, 1.0),
            Err(GridError::Partition { .. })
        ));
        assert!(matches!(
            GridTopology::partition(5, 5, 2, 2, 4, 1, Periodicity::None, 1.0, 1.0),
            Err(GridError::Rank { .. })
        ));
    }
}
