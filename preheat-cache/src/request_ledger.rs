use preheat_base::hashing::HashMap;
use preheat_base::{AssetRef, LoadHandle, SlotId};

/// What a slot is currently showing, and the load that is filling it in (if any)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotState {
    pub asset: AssetRef,
    pub active_handle: Option<LoadHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginLoad {
    // A new request was issued (any previous one for the slot was cancelled first)
    Issued(LoadHandle),
    // The slot was already loading this asset, nothing was cancelled or issued
    AlreadyInFlight(LoadHandle),
}

impl BeginLoad {
    pub fn handle(&self) -> LoadHandle {
        match *self {
            BeginLoad::Issued(handle) => handle,
            BeginLoad::AlreadyInFlight(handle) => handle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionDisposition {
    // The handle still owns its slot, the result should be shown
    Current { slot_id: SlotId, asset: AssetRef },
    // The handle was cancelled or superseded, the result must be dropped
    Stale,
}

/// Tracks which load handle owns each slot.
///
/// A slot holds at most one active handle. Starting a load for a slot cancels whatever it was
/// loading before, and results for handles that no longer own a slot are reported as stale so they
/// can't overwrite a newer image.
#[derive(Default)]
pub struct RequestLedger {
    slots: HashMap<SlotId, SlotState>,
    // Reverse lookup for completions, only contains active handles
    handle_to_slot: HashMap<LoadHandle, SlotId>,
}

impl RequestLedger {
    pub fn begin_load<CancelFn, IssueFn>(
        &mut self,
        slot_id: SlotId,
        asset: AssetRef,
        cancel: CancelFn,
        issue: IssueFn,
    ) -> BeginLoad
    where
        CancelFn: FnOnce(LoadHandle),
        IssueFn: FnOnce() -> LoadHandle,
    {
        if let Some(slot_state) = self.slots.get(&slot_id) {
            if slot_state.asset == asset {
                if let Some(active_handle) = slot_state.active_handle {
                    return BeginLoad::AlreadyInFlight(active_handle);
                }
            }

            if let Some(previous_handle) = slot_state.active_handle {
                log::trace!(
                    "slot {:?} reused, cancelling {:?} for {:?}",
                    slot_id,
                    previous_handle,
                    slot_state.asset
                );
                self.handle_to_slot.remove(&previous_handle);
                cancel(previous_handle);
            }
        }

        let handle = issue();
        if let Some(old_slot) = self.handle_to_slot.insert(handle, slot_id) {
            // Adapters must not hand out a handle that is still active
            log::warn!(
                "load handle {:?} reissued while still owned by slot {:?}",
                handle,
                old_slot
            );
            if let Some(old_slot_state) = self.slots.get_mut(&old_slot) {
                if old_slot != slot_id && old_slot_state.active_handle == Some(handle) {
                    old_slot_state.active_handle = None;
                }
            }
        }

        self.slots.insert(
            slot_id,
            SlotState {
                asset,
                active_handle: Some(handle),
            },
        );

        BeginLoad::Issued(handle)
    }

    /// Called for every delivery. Only a final delivery releases the slot's handle.
    pub fn complete(
        &mut self,
        handle: LoadHandle,
        is_final: bool,
    ) -> CompletionDisposition {
        let slot_id = match self.handle_to_slot.get(&handle) {
            Some(&slot_id) => slot_id,
            None => return CompletionDisposition::Stale,
        };

        let slot_state = match self.slots.get_mut(&slot_id) {
            Some(slot_state) if slot_state.active_handle == Some(handle) => slot_state,
            _ => {
                self.handle_to_slot.remove(&handle);
                return CompletionDisposition::Stale;
            }
        };

        let asset = slot_state.asset;
        if is_final {
            slot_state.active_handle = None;
            self.handle_to_slot.remove(&handle);
        }

        CompletionDisposition::Current { slot_id, asset }
    }

    /// The slot went away. Cancels its load if one is still running. Returns true if a handle was
    /// cancelled.
    pub fn complete_or_cancel<CancelFn>(
        &mut self,
        slot_id: SlotId,
        cancel: CancelFn,
    ) -> bool
    where
        CancelFn: FnOnce(LoadHandle),
    {
        let slot_state = match self.slots.remove(&slot_id) {
            Some(slot_state) => slot_state,
            None => return false,
        };

        if let Some(active_handle) = slot_state.active_handle {
            self.handle_to_slot.remove(&active_handle);
            cancel(active_handle);
            true
        } else {
            false
        }
    }

    /// Cancels every active load and forgets all slots
    pub fn cancel_all<CancelFn>(
        &mut self,
        mut cancel: CancelFn,
    ) where
        CancelFn: FnMut(LoadHandle),
    {
        let mut active_handles: Vec<_> = self.handle_to_slot.keys().copied().collect();
        active_handles.sort();
        for handle in active_handles {
            cancel(handle);
        }

        self.slots.clear();
        self.handle_to_slot.clear();
    }

    pub fn slot_state(
        &self,
        slot_id: SlotId,
    ) -> Option<&SlotState> {
        self.slots.get(&slot_id)
    }

    pub fn active_handle(
        &self,
        slot_id: SlotId,
    ) -> Option<LoadHandle> {
        self.slots.get(&slot_id).and_then(|x| x.active_handle)
    }

    pub fn active_load_count(&self) -> usize {
        self.handle_to_slot.len()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn asset(id: u128) -> AssetRef {
        AssetRef(id)
    }

    // Hands out sequential handles and records cancels
    #[derive(Default)]
    struct Issuer {
        next_handle: Cell<u64>,
        cancelled: RefCell<Vec<LoadHandle>>,
    }

    impl Issuer {
        fn issue(&self) -> LoadHandle {
            self.next_handle.set(self.next_handle.get() + 1);
            LoadHandle(self.next_handle.get())
        }

        fn cancel(
            &self,
            handle: LoadHandle,
        ) {
            self.cancelled.borrow_mut().push(handle);
        }
    }

    #[test]
    fn rebinding_cancels_previous_handle_first() {
        let issuer = Issuer::default();
        let mut ledger = RequestLedger::default();
        let slot = SlotId(5);

        let h1 = ledger
            .begin_load(slot, asset(1), |h| issuer.cancel(h), || issuer.issue())
            .handle();

        let order = RefCell::new(Vec::new());
        let result = ledger.begin_load(
            slot,
            asset(2),
            |h| order.borrow_mut().push(format!("cancel {:?}", h)),
            || {
                order.borrow_mut().push("issue".to_string());
                issuer.issue()
            },
        );

        assert_eq!(
            *order.borrow(),
            vec![format!("cancel {:?}", h1), "issue".to_string()]
        );
        assert_eq!(result, BeginLoad::Issued(LoadHandle(2)));
        assert_eq!(ledger.active_handle(slot), Some(LoadHandle(2)));
        assert_eq!(ledger.active_load_count(), 1);
    }

    #[test]
    fn same_asset_in_flight_is_not_reissued() {
        let issuer = Issuer::default();
        let mut ledger = RequestLedger::default();
        let slot = SlotId(1);

        let first = ledger.begin_load(slot, asset(7), |h| issuer.cancel(h), || issuer.issue());
        let second = ledger.begin_load(slot, asset(7), |h| issuer.cancel(h), || issuer.issue());
        assert_eq!(second, BeginLoad::AlreadyInFlight(first.handle()));
        assert!(issuer.cancelled.borrow().is_empty());

        // Once it finished, binding the same asset again issues a fresh request
        ledger.complete(first.handle(), true);
        let third = ledger.begin_load(slot, asset(7), |h| issuer.cancel(h), || issuer.issue());
        assert_eq!(third, BeginLoad::Issued(LoadHandle(2)));
        assert!(issuer.cancelled.borrow().is_empty());
    }

    #[test]
    fn superseded_completion_is_stale() {
        let issuer = Issuer::default();
        let mut ledger = RequestLedger::default();
        let slot = SlotId(3);

        let a = ledger
            .begin_load(slot, asset(1), |h| issuer.cancel(h), || issuer.issue())
            .handle();
        let b = ledger
            .begin_load(slot, asset(2), |h| issuer.cancel(h), || issuer.issue())
            .handle();

        assert_eq!(ledger.complete(a, true), CompletionDisposition::Stale);
        assert_eq!(ledger.active_handle(slot), Some(b));
        assert_eq!(
            ledger.complete(b, true),
            CompletionDisposition::Current {
                slot_id: slot,
                asset: asset(2)
            }
        );
        assert_eq!(ledger.active_handle(slot), None);

        // A duplicate final delivery is stale too
        assert_eq!(ledger.complete(b, true), CompletionDisposition::Stale);
    }

    #[test]
    fn degraded_delivery_keeps_handle_active() {
        let issuer = Issuer::default();
        let mut ledger = RequestLedger::default();
        let slot = SlotId(9);

        let handle = ledger
            .begin_load(slot, asset(4), |h| issuer.cancel(h), || issuer.issue())
            .handle();
        assert!(matches!(
            ledger.complete(handle, false),
            CompletionDisposition::Current { .. }
        ));
        assert_eq!(ledger.active_handle(slot), Some(handle));
        assert!(matches!(
            ledger.complete(handle, true),
            CompletionDisposition::Current { .. }
        ));
        assert_eq!(ledger.active_handle(slot), None);
    }

    #[test]
    fn unbinding_cancels_and_forgets() {
        let issuer = Issuer::default();
        let mut ledger = RequestLedger::default();

        let handle = ledger
            .begin_load(SlotId(1), asset(1), |h| issuer.cancel(h), || issuer.issue())
            .handle();
        assert!(ledger.complete_or_cancel(SlotId(1), |h| issuer.cancel(h)));
        assert_eq!(*issuer.cancelled.borrow(), vec![handle]);
        assert!(ledger.slot_state(SlotId(1)).is_none());
        assert_eq!(ledger.complete(handle, true), CompletionDisposition::Stale);

        // Nothing in flight, nothing to cancel
        assert!(!ledger.complete_or_cancel(SlotId(1), |h| issuer.cancel(h)));
    }

    #[test]
    fn at_most_one_active_handle_per_slot() {
        let issuer = Issuer::default();
        let mut ledger = RequestLedger::default();

        // Deterministic pseudo-random interleaving of binds, completions and unbinds
        let mut state = 0x2545_f491_u64;
        let mut issued = Vec::new();
        for _ in 0..500 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let slot = SlotId(state % 6);
            let asset_id = (state >> 8) % 4;
            match (state >> 16) % 4 {
                0 | 1 => {
                    let result = ledger.begin_load(
                        slot,
                        asset(asset_id as u128 + 1),
                        |h| issuer.cancel(h),
                        || issuer.issue(),
                    );
                    issued.push(result.handle());
                }
                2 => {
                    if let Some(&handle) = issued.get((state >> 24) as usize % issued.len().max(1))
                    {
                        ledger.complete(handle, (state >> 32) % 2 == 0);
                    }
                }
                _ => {
                    ledger.complete_or_cancel(slot, |h| issuer.cancel(h));
                }
            }

            let mut owners = HashMap::<LoadHandle, usize>::default();
            for slot_index in 0..6 {
                if let Some(handle) = ledger.active_handle(SlotId(slot_index)) {
                    *owners.entry(handle).or_default() += 1;
                }
            }
            assert!(owners.values().all(|&count| count == 1));
            assert_eq!(owners.len(), ledger.active_load_count());
        }

        // A cancelled handle is never active again
        for handle in issuer.cancelled.borrow().iter() {
            for slot_index in 0..6 {
                assert_ne!(ledger.active_handle(SlotId(slot_index)), Some(*handle));
            }
        }
    }

    #[test]
    fn cancel_all_cancels_every_active_handle() {
        let issuer = Issuer::default();
        let mut ledger = RequestLedger::default();
        for slot in 0..4 {
            ledger.begin_load(
                SlotId(slot),
                asset(slot as u128 + 1),
                |h| issuer.cancel(h),
                || issuer.issue(),
            );
        }
        ledger.complete(LoadHandle(2), true);

        ledger.cancel_all(|h| issuer.cancel(h));
        assert_eq!(
            *issuer.cancelled.borrow(),
            vec![LoadHandle(1), LoadHandle(3), LoadHandle(4)]
        );
        assert_eq!(ledger.slot_count(), 0);
        assert_eq!(ledger.active_load_count(), 0);
    }
}
