use preheat_base::hashing::HashMap;
use preheat_cache::{
    AssetCatalogAdapter, CacheCoordinator, IndexRange, SlotId, SlotImage, SlotImageSink,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct SurfaceStats {
    pub slots_created: usize,
    pub binds: usize,
    pub degraded_shown: usize,
    pub final_shown: usize,
    pub absent_shown: usize,
}

/// Stands in for a collection view: a pool of slots that are handed out to visible indices and
/// put up for reuse once their index scrolls out of view
#[derive(Default)]
pub struct GridSurface {
    bound_slots: HashMap<usize, SlotId>,
    reusable_slots: Vec<SlotId>,
    next_slot_id: u64,
    // What each slot currently displays
    shown: HashMap<SlotId, SlotImage>,
    stats: SurfaceStats,
}

impl GridSurface {
    pub fn stats(&self) -> SurfaceStats {
        self.stats
    }

    fn dequeue_slot(&mut self) -> SlotId {
        if let Some(slot_id) = self.reusable_slots.pop() {
            // The old image is cleared when the slot is reused
            self.shown.remove(&slot_id);
            return slot_id;
        }

        self.next_slot_id += 1;
        self.stats.slots_created += 1;
        SlotId(self.next_slot_id)
    }

    /// Binds a slot to every index in `visible` that doesn't have one and queues the slots of
    /// indices that scrolled away for reuse. Reused slots are not unbound, rebinding them is
    /// what cancels their stale load.
    pub fn show_range<A: AssetCatalogAdapter>(
        &mut self,
        coordinator: &mut CacheCoordinator<A>,
        visible: IndexRange,
    ) {
        profiling::scope!("GridSurface::show_range");
        let offscreen: Vec<usize> = self
            .bound_slots
            .keys()
            .copied()
            .filter(|&index| !visible.contains(index))
            .collect();
        for index in offscreen {
            if let Some(slot_id) = self.bound_slots.remove(&index) {
                self.reusable_slots.push(slot_id);
            }
        }

        for index in visible.iter() {
            if self.bound_slots.contains_key(&index) {
                continue;
            }

            let slot_id = self.dequeue_slot();
            if coordinator.on_slot_bound(slot_id, index).is_some() {
                self.stats.binds += 1;
            }
            self.bound_slots.insert(index, slot_id);
        }
    }

    /// Tears down every slot, cancelling whatever they were still loading
    pub fn unbind_all<A: AssetCatalogAdapter>(
        &mut self,
        coordinator: &mut CacheCoordinator<A>,
    ) {
        for (_, slot_id) in self.bound_slots.drain() {
            coordinator.on_slot_unbound(slot_id);
        }

        for slot_id in self.reusable_slots.drain(..) {
            coordinator.on_slot_unbound(slot_id);
        }

        self.shown.clear();
    }
}

impl SlotImageSink for GridSurface {
    fn image_ready(
        &mut self,
        slot_id: SlotId,
        image: SlotImage,
    ) {
        if image.is_absent() {
            self.stats.absent_shown += 1;
        } else if image.is_final {
            self.stats.final_shown += 1;
        } else {
            self.stats.degraded_shown += 1;
        }

        if let Some(previous) = self.shown.get(&slot_id) {
            if previous.is_final && previous.asset == image.asset {
                log::warn!("{:?} got a second final image for {:?}", slot_id, image.asset);
            }
        }

        self.shown.insert(slot_id, image);
    }
}
