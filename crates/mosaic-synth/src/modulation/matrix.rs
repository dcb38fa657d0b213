//! Per-voice (or per-group) modulation matrix.
//!
//! The matrix holds three fixed arrays: the source values looked up this
//! block, the destination baselines copied from the zone at attach time, and
//! the modulated result. [`process`](ModulationMatrix::process) rebuilds the
//! result from scratch every block:
//!
//! ```text
//! modulated[d] = base[d] + Σ source[r.source] * r.depth   for every active r with r.destination == d
//! ```
//!
//! All operations are RT-safe (no allocations).

use super::{DestValues, ModDest, ModSource, RoutingTable, SourceLayout};

/// Modulation matrix owned by a single voice or group.
#[derive(Debug, Clone)]
pub struct ModulationMatrix {
    routing: RoutingTable,
    bindings: SourceLayout,
    source_values: [f32; ModSource::COUNT],
    base_values: DestValues,
    modulated_values: DestValues,
}

impl ModulationMatrix {
    pub fn new() -> Self {
        Self {
            routing: RoutingTable::new(),
            bindings: SourceLayout::empty(),
            source_values: [0.0; ModSource::COUNT],
            base_values: DestValues::zeroed(),
            modulated_values: DestValues::zeroed(),
        }
    }

    /// Zero every array and drop routing and bindings.
    pub fn clear(&mut self) {
        self.routing.clear();
        self.bindings = SourceLayout::empty();
        self.source_values = [0.0; ModSource::COUNT];
        self.base_values = DestValues::zeroed();
        self.modulated_values = DestValues::zeroed();
    }

    /// Copy the routing table by value. Later edits to the zone do not
    /// affect this matrix.
    pub fn snap_routing_from_zone(&mut self, routing: &RoutingTable) {
        self.routing = *routing;
    }

    /// Copy destination baselines. The modulated values start equal to them
    /// until the first `process`.
    pub fn copy_base_values_from_zone(&mut self, base: &DestValues) {
        self.base_values = *base;
        self.modulated_values = *base;
    }

    /// Bind source ids to slots in the owner's live value slice.
    pub fn attach_sources(&mut self, layout: &SourceLayout) {
        self.bindings = *layout;
    }

    /// Recompute every modulated value from `live`, the owner's current
    /// modulator outputs laid out as declared in [`attach_sources`](Self::attach_sources).
    #[inline]
    pub fn process(&mut self, live: &[f32]) {
        for source in ModSource::ALL {
            self.source_values[source.index()] = self
                .bindings
                .slot(source)
                .and_then(|slot| live.get(slot))
                .copied()
                .unwrap_or(0.0);
        }

        self.modulated_values = self.base_values;

        for route in self.routing.entries() {
            if !route.is_active() {
                continue;
            }
            debug_assert!(route.source.index() < ModSource::COUNT);
            debug_assert!(route.destination.index() < ModDest::COUNT);
            let value = self.source_values[route.source.index()];
            self.modulated_values
                .add(route.destination, value * route.depth);
        }
    }

    #[inline]
    pub fn value(&self, dest: ModDest) -> f32 {
        self.modulated_values.get(dest)
    }

    #[inline]
    pub fn values(&self) -> &DestValues {
        &self.modulated_values
    }

    #[inline]
    pub fn base_value(&self, dest: ModDest) -> f32 {
        self.base_values.get(dest)
    }

    /// Source value looked up during the last `process`.
    #[inline]
    pub fn source_value(&self, source: ModSource) -> f32 {
        self.source_values[source.index()]
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }
}

impl Default for ModulationMatrix {
    fn default() -> Self {
        Self::new()
    }
}
