//! Generation-counted slot arena backing [`TimerHandle`] allocation

use super::TimerHandle;

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage that hands out [`TimerHandle`]s.
///
/// Freed slots are reused, but each reuse bumps the slot generation, so
/// handles to the previous occupant no longer resolve.
#[derive(Debug)]
pub struct TimerArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> TimerArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Store `value` and return the handle that reaches it
    pub fn insert(&mut self, value: T) -> TimerHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.value = Some(value);
            return TimerHandle::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        TimerHandle::new(index, 0)
    }

    pub fn get(&self, handle: TimerHandle) -> Option<&T> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: TimerHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    /// Remove the value `handle` points at; stale handles yield `None`
    pub fn remove(&mut self, handle: TimerHandle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        self.free.push(handle.index());
        self.len -= 1;
        Some(value)
    }

    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Live handles with their values
    pub fn iter(&self) -> impl Iterator<Item = (TimerHandle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (TimerHandle::new(index as u32, slot.generation), value))
        })
    }

    /// Remove every live value
    pub fn drain(&mut self) -> Vec<(TimerHandle, T)> {
        let mut drained = Vec::with_capacity(self.len);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                drained.push((TimerHandle::new(index as u32, slot.generation), value));
                self.free.push(index as u32);
            }
        }
        self.len = 0;
        drained
    }
}

impl<T> Default for TimerArena<T> {
    fn default() -> Self {
        Self::new()
    }
}
