//! Thin shims over the patch loops so each numeric kernel is written once
//! and runs under rayon when the `parallel` feature is enabled.
//!
//! The routers keep rate computation and state update in separate regions:
//! rates are produced source-owned with [`par_map_indexed`], updates are
//! applied destination-owned with [`par_update`] / [`par_update2`]. Every
//! iteration owns exactly the destination slots it writes, so no locking
//! is needed in either case.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Map `0..n` to a vector, in parallel when enabled.
pub(crate) fn par_map_indexed<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        (0..n).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        (0..n).map(f).collect()
    }
}

/// Update each element of `out` in place; `f` receives the element index.
pub(crate) fn par_update<T, F>(out: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        out.par_iter_mut().enumerate().for_each(|(i, v)| f(i, v));
    }
    #[cfg(not(feature = "parallel"))]
    {
        for (i, v) in out.iter_mut().enumerate() {
            f(i, v);
        }
    }
}

/// Update two equal-length slices in lockstep; `f` receives the index and
/// both elements. The slices must belong to the same patch index space.
pub(crate) fn par_update2<A, B, F>(a: &mut [A], b: &mut [B], f: F)
where
    A: Send,
    B: Send,
    F: Fn(usize, &mut A, &mut B) + Sync + Send,
{
    debug_assert_eq!(a.len(), b.len());
    #[cfg(feature = "parallel")]
    {
        a.par_iter_mut()
            .zip(b.par_iter_mut())
            .enumerate()
            .for_each(|(i, (x, y))| f(i, x, y));
    }
    #[cfg(not(feature = "parallel"))]
    {
        for (i, (x, y)) in a.iter_mut().zip(b.iter_mut()).enumerate() {
            f(i, x, y);
        }
    }
}
