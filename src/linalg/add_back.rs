//! Scoped buffer helpers: the zero-and-restore guard and symmetric
//! rank-one updates.
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1};
use std::ops::{Deref, DerefMut};

/// Zero a buffer for the lifetime of the guard and add the original
/// contents back when it drops.
///
/// While the guard lives, writes go through `Deref`/`DerefMut` into the
/// zeroed buffer, so it holds only what was written in the scope. On drop
/// (normal return, `?` early exit, or unwinding) the snapshot is added back,
/// leaving `original + written`.
pub struct AddBack<'a> {
    buf: ArrayViewMut1<'a, f64>,
    snapshot: Array1<f64>,
}

impl<'a> AddBack<'a> {
    pub fn new(mut buf: ArrayViewMut1<'a, f64>) -> Self {
        let snapshot = buf.to_owned();
        buf.fill(0.0);
        Self { buf, snapshot }
    }
}

impl<'a> Deref for AddBack<'a> {
    type Target = ArrayViewMut1<'a, f64>;

    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for AddBack<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl Drop for AddBack<'_> {
    fn drop(&mut self) {
        if self.buf.len() == self.snapshot.len() {
            self.buf += &self.snapshot;
        }
    }
}

/// Symmetric rank-one update of the upper triangle: `a += alpha · x xᵀ`.
///
/// Only entries with `row <= col` are touched; call [`symmetrize_upper`]
/// once all updates are done.
pub fn dsyr(a: &mut Array2<f64>, x: ArrayView1<'_, f64>, alpha: f64) {
    let n = x.len();
    for j in 0..n {
        let axj = alpha * x[j];
        if axj == 0.0 {
            continue;
        }
        for i in 0..=j {
            a[[i, j]] += x[i] * axj;
        }
    }
}

/// Copy the upper triangle into the lower one.
pub fn symmetrize_upper(a: &mut Array2<f64>) {
    let n = a.nrows();
    for j in 0..n {
        for i in (j + 1)..n {
            a[[i, j]] = a[[j, i]];
        }
    }
}
