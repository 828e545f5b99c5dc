use std::ops::{Index, IndexMut};

use super::grid::{wrap, GridTopology, Periodicity};

/// Values at the nodes of one rank's ghosted window, indexed by global `(i, j)`.
///
/// The field copies the window it was allocated for and keeps no reference to the grid.
/// Ghost indices may fall outside `[0, M)` in periodic directions.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeField<T> {
    x0: i32,
    y0: i32,
    nx: usize,
    ny: usize,
    xs: i32,
    xm: i32,
    ys: i32,
    ym: i32,
    mx: usize,
    my: usize,
    periodicity: Periodicity,
    data: Vec<T>,
}

impl<T: Clone> NodeField<T> {
    pub fn new(grid: &GridTopology, value: T) -> Self {
        let (x0, x1) = grid.ghosted_x();
        let (y0, y1) = grid.ghosted_y();
        let (nx, ny) = ((x1 - x0) as usize, (y1 - y0) as usize);
        Self {
            x0,
            y0,
            nx,
            ny,
            xs: grid.xs as i32,
            xm: grid.xm as i32,
            ys: grid.ys as i32,
            ym: grid.ym as i32,
            mx: grid.mx,
            my: grid.my,
            periodicity: grid.periodicity,
            data: vec![value; nx * ny],
        }
    }

    /// Fills owned and ghost nodes from a function of the wrapped global index, i.e. a
    /// field whose ghosts are already up to date.
    pub fn from_global_fn(grid: &GridTopology, f: impl Fn(usize, usize) -> T) -> Self {
        let mut field = Self::new(grid, f(grid.xs, grid.ys));
        for (i, j) in field.ghosted_indices().collect::<Vec<_>>() {
            if let Some((iw, jw)) = field.wrap(i, j) {
                field[(i, j)] = f(iw, jw);
            }
        }
        field
    }

    pub fn map<U: Clone>(&self, f: impl Fn(&T) -> U) -> NodeField<U> {
        NodeField {
            x0: self.x0,
            y0: self.y0,
            nx: self.nx,
            ny: self.ny,
            xs: self.xs,
            xm: self.xm,
            ys: self.ys,
            ym: self.ym,
            mx: self.mx,
            my: self.my,
            periodicity: self.periodicity,
            data: self.data.iter().map(f).collect(),
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|v| *v = value.clone());
    }
}

impl<T> NodeField<T> {
    pub fn contains(&self, i: i32, j: i32) -> bool {
        i >= self.x0 && i < self.x0 + self.nx as i32 && j >= self.y0 && j < self.y0 + self.ny as i32
    }

    pub fn is_owned(&self, i: i32, j: i32) -> bool {
        i >= self.xs && i < self.xs + self.xm && j >= self.ys && j < self.ys + self.ym
    }

    pub fn get(&self, i: i32, j: i32) -> Option<&T> {
        self.contains(i, j).then(|| &self.data[self.offset(i, j)])
    }

    pub fn owned_indices(&self) -> impl Iterator<Item = (i32, i32)> {
        let (xs, xm, ys, ym) = (self.xs, self.xm, self.ys, self.ym);
        (ys..ys + ym).flat_map(move |j| (xs..xs + xm).map(move |i| (i, j)))
    }

    pub fn ghosted_indices(&self) -> impl Iterator<Item = (i32, i32)> {
        let (x0, nx, y0, ny) = (self.x0, self.nx as i32, self.y0, self.ny as i32);
        (y0..y0 + ny).flat_map(move |j| (x0..x0 + nx).map(move |i| (i, j)))
    }

    /// Domain index of a (possibly periodic) ghost index.
    pub fn wrap(&self, i: i32, j: i32) -> Option<(usize, usize)> {
        Some((
            wrap(i, self.mx, self.periodicity.x())?,
            wrap(j, self.my, self.periodicity.y())?,
        ))
    }

    pub fn domain(&self) -> (usize, usize) {
        (self.mx, self.my)
    }

    fn offset(&self, i: i32, j: i32) -> usize {
        (j - self.y0) as usize * self.nx + (i - self.x0) as usize
    }

    /// Ghost nodes paired with the domain index of their owner.
    fn ghosts(&self) -> Vec<((i32, i32), (i32, i32))> {
        self.ghosted_indices()
            .filter(|&(i, j)| !self.is_owned(i, j))
            .filter_map(|(i, j)| {
                self.wrap(i, j)
                    .map(|(iw, jw)| ((i, j), (iw as i32, jw as i32)))
            })
            .collect()
    }
}

impl<T> Index<(i32, i32)> for NodeField<T> {
    type Output = T;

    fn index(&self, (i, j): (i32, i32)) -> &T {
        assert!(self.contains(i, j), "node ({i}, {j}) is outside of the ghosted window");
        &self.data[self.offset(i, j)]
    }
}

impl<T> IndexMut<(i32, i32)> for NodeField<T> {
    fn index_mut(&mut self, (i, j): (i32, i32)) -> &mut T {
        assert!(self.contains(i, j), "node ({i}, {j}) is outside of the ghosted window");
        let offset = self.offset(i, j);
        &mut self.data[offset]
    }
}

/// Refreshes ghost values of a node field from their owning ranks.
pub trait GhostExchange {
    fn update_ghosts<T: Clone>(&self, field: &mut NodeField<T>);
}

impl<E: GhostExchange> GhostExchange for &E {
    fn update_ghosts<T: Clone>(&self, field: &mut NodeField<T>) {
        (**self).update_ghosts(field)
    }
}

/// Ghost exchange for a rank that owns the whole domain; only periodic ghosts exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExchange;

impl GhostExchange for LocalExchange {
    fn update_ghosts<T: Clone>(&self, field: &mut NodeField<T>) {
        for ((i, j), (iw, jw)) in field.ghosts() {
            if field.is_owned(iw, jw) {
                let value = field[(iw, jw)].clone();
                field[(i, j)] = value;
            }
        }
    }
}

/// Ghost exchange across the fields of a whole process group held in one process.
///
/// `fields[r]` is the field of rank `r`; every ghost value is overwritten by the value
/// stored at its owner.
pub fn exchange_in_process<T: Clone>(fields: &mut [NodeField<T>]) {
    let updates: Vec<Vec<((i32, i32), T)>> = fields
        .iter()
        .map(|field| {
            field
                .ghosts()
                .into_iter()
                .filter_map(|(ghost, (iw, jw))| {
                    fields
                        .iter()
                        .find(|owner| owner.is_owned(iw, jw))
                        .map(|owner| (ghost, owner[(iw, jw)].clone()))
                })
                .collect()
        })
        .collect();

    for (field, values) in fields.iter_mut().zip(updates) {
        for (ghost, value) in values {
            field[ghost] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::grid::GridTopology;

    #[test]
    fn periodic_ghosts_wrap_around() {
        let grid = GridTopology::serial(4, 3, 1.0, 1.0, Periodicity::XY).unwrap();
        let mut field = NodeField::new(&grid, 0usize);
        for (i, j) in field.owned_indices().collect::<Vec<_>>() {
            field[(i, j)] = (j * 10 + i) as usize;
        }
        LocalExchange.update_ghosts(&mut field);
        assert_eq!(field[(-1, 0)], 3);
        assert_eq!(field[(4, 2)], 20);
        assert_eq!(field[(-1, -1)], 23);
        assert_eq!(field, NodeField::from_global_fn(&grid, |i, j| j * 10 + i));
    }

    #[test]
    fn in_process_exchange_matches_owners() {
        let grids =
            GridTopology::partition_all(7, 5, 2, 2, 1, Periodicity::None, 1.0, 1.0).unwrap();
        let mut fields: Vec<NodeField<f64>> = grids
            .iter()
            .map(|g| {
                let mut f = NodeField::new(g, -1.0);
                for (i, j) in f.owned_indices().collect::<Vec<_>>() {
                    f[(i, j)] = (i * 100 + j) as f64;
                }
                f
            })
            .collect();
        exchange_in_process(&mut fields);
        for f in &fields {
            for (i, j) in f.ghosted_indices() {
                assert_eq!(f[(i, j)], (i * 100 + j) as f64);
            }
        }
    }
}
