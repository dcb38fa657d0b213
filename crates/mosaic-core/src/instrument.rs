//! Optional live-instance counters.
//!
//! Types that want leak tracking embed a [`Tracked`] field. With the
//! `instrument` feature off, `Tracked` is zero-sized and every call compiles
//! away; with it on, construction, cloning and dropping update a global
//! per-kind counter that tests and diagnostics can read back.
//!
//! Tracked types must only be created and dropped off the audio thread.

#[cfg(feature = "instrument")]
mod counters {
    use dashmap::DashMap;
    use std::sync::OnceLock;

    static COUNTS: OnceLock<DashMap<&'static str, isize>> = OnceLock::new();

    fn counts() -> &'static DashMap<&'static str, isize> {
        COUNTS.get_or_init(DashMap::new)
    }

    pub fn adjust(kind: &'static str, delta: isize) {
        *counts().entry(kind).or_insert(0) += delta;
    }

    pub fn live(kind: &'static str) -> isize {
        counts().get(kind).map(|c| *c).unwrap_or(0)
    }

    pub fn snapshot() -> Vec<(&'static str, isize)> {
        let mut all: Vec<_> = counts().iter().map(|e| (*e.key(), *e.value())).collect();
        all.sort_by_key(|(kind, _)| *kind);
        all
    }
}

/// Marker field counting live instances of its owner.
#[derive(Debug)]
pub struct Tracked {
    #[cfg(feature = "instrument")]
    kind: &'static str,
}

impl Tracked {
    #[inline]
    #[allow(unused_variables)]
    pub fn new(kind: &'static str) -> Self {
        #[cfg(feature = "instrument")]
        {
            counters::adjust(kind, 1);
            Self { kind }
        }
        #[cfg(not(feature = "instrument"))]
        {
            Self {}
        }
    }
}

impl Clone for Tracked {
    fn clone(&self) -> Self {
        #[cfg(feature = "instrument")]
        {
            Self::new(self.kind)
        }
        #[cfg(not(feature = "instrument"))]
        {
            Self {}
        }
    }
}

#[cfg(feature = "instrument")]
impl Drop for Tracked {
    fn drop(&mut self) {
        counters::adjust(self.kind, -1);
    }
}

/// Live instances of `kind`. Always zero without the `instrument` feature.
#[allow(unused_variables)]
pub fn live_instances(kind: &'static str) -> isize {
    #[cfg(feature = "instrument")]
    {
        counters::live(kind)
    }
    #[cfg(not(feature = "instrument"))]
    {
        0
    }
}

/// All tracked kinds with their live counts, sorted by kind.
pub fn snapshot() -> Vec<(&'static str, isize)> {
    #[cfg(feature = "instrument")]
    {
        counters::snapshot()
    }
    #[cfg(not(feature = "instrument"))]
    {
        Vec::new()
    }
}
