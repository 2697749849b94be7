//! Fan-out helpers shared by the gather phases.
//!
//! With the `parallel` feature the work is split across the rayon pool,
//! otherwise it runs inline. Every task writes only its own output slot, so
//! both paths produce identical results.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Fill `slots[i] = f(i)` for every slot, in batches of at least `batch` items.
pub fn fill_slots<T, F>(slots: &mut [T], batch: usize, f: F)
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        slots
            .par_iter_mut()
            .with_min_len(batch.max(1))
            .enumerate()
            .for_each(|(i, slot)| *slot = f(i));
    }

    #[cfg(not(feature = "parallel"))]
    {
        let _ = batch;
        for (i, slot) in slots.iter_mut().enumerate() {
            *slot = f(i);
        }
    }
}

/// Run two independent closures, concurrently when `parallel` is enabled.
pub fn join<A, B, RA, RB>(a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    #[cfg(feature = "parallel")]
    {
        rayon::join(a, b)
    }

    #[cfg(not(feature = "parallel"))]
    {
        (a(), b())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_slots_writes_every_index() {
        let mut slots = vec![0usize; 1000];
        fill_slots(&mut slots, 64, |i| i * 2);
        assert!(slots.iter().enumerate().all(|(i, &v)| v == i * 2));
    }

    #[test]
    fn test_join_returns_both() {
        let (a, b) = join(|| 1 + 1, || "two");
        assert_eq!(a, 2);
        assert_eq!(b, "two");
    }
}
