use serde::Serialize;

use super::Particle;

/// Stable handle to a pool slot. Slots never move for the lifetime of the
/// pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ParticleId(pub(crate) u32);

impl ParticleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Free,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub capacity: usize,
    pub active: usize,
    pub free: usize,
    pub utilization: f32,
}

/// Fixed-capacity particle store.
///
/// Every slot is in exactly one of the active or free lists, so
/// `active + free == capacity` always holds. Releasing swaps the last active
/// entry into the vacated position; callers iterating the active list should
/// walk it back to front.
#[derive(Debug)]
pub struct ParticlePool {
    slots: Vec<Particle>,
    active: Vec<ParticleId>,
    free: Vec<ParticleId>,
    membership: Vec<Membership>,
}

impl ParticlePool {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(u32::MAX as usize);
        Self {
            slots: vec![Particle::dormant(); capacity],
            active: Vec::with_capacity(capacity),
            // Reverse order so the first acquire hands out slot 0.
            free: (0..capacity as u32).rev().map(ParticleId).collect(),
            membership: vec![Membership::Free; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    pub fn stats(&self) -> PoolStats {
        let capacity = self.capacity();
        PoolStats {
            capacity,
            active: self.active_len(),
            free: self.free_len(),
            utilization: if capacity == 0 {
                0.0
            } else {
                self.active_len() as f32 / capacity as f32
            },
        }
    }

    /// Moves a free slot into the active set. `None` when the pool is empty.
    pub fn acquire(&mut self) -> Option<ParticleId> {
        let id = self.free.pop()?;
        self.membership[id.index()] = Membership::Active;
        self.active.push(id);
        Some(id)
    }

    /// Releases the particle at `position` in the active list and returns
    /// its id. The slot is reset to [`Particle::dormant`] in full.
    pub fn release_at(&mut self, position: usize) -> Option<ParticleId> {
        if position >= self.active.len() {
            return None;
        }
        let id = self.active.swap_remove(position);
        self.slots[id.index()] = Particle::dormant();
        self.membership[id.index()] = Membership::Free;
        self.free.push(id);
        Some(id)
    }

    pub fn release_all(&mut self) -> usize {
        let released = self.active.len();
        while !self.active.is_empty() {
            let last = self.active.len() - 1;
            self.release_at(last);
        }
        released
    }

    /// Returns every particle and drops the backing storage. The pool has
    /// zero capacity afterwards.
    pub fn dispose(&mut self) {
        self.release_all();
        self.slots = Vec::new();
        self.active = Vec::new();
        self.free = Vec::new();
        self.membership = Vec::new();
    }

    pub fn active_ids(&self) -> &[ParticleId] {
        &self.active
    }

    pub fn get(&self, id: ParticleId) -> Option<&Particle> {
        self.slots.get(id.index())
    }

    pub fn get_mut(&mut self, id: ParticleId) -> Option<&mut Particle> {
        self.slots.get_mut(id.index())
    }

    pub fn is_active(&self, id: ParticleId) -> bool {
        self.membership.get(id.index()) == Some(&Membership::Active)
    }

    pub fn iter_active(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.active.iter().map(move |id| &self.slots[id.index()])
    }

    pub(crate) fn iter_active_mut(&mut self) -> impl Iterator<Item = &mut Particle> + '_ {
        let slots = &mut self.slots;
        let membership = &self.membership;
        slots
            .iter_mut()
            .zip(membership.iter())
            .filter(|(_, m)| **m == Membership::Active)
            .map(|(particle, _)| particle)
    }

    /// Checks the set-membership invariant: counts add up and every slot is
    /// listed exactly once, in the list its membership says.
    pub fn is_consistent(&self) -> bool {
        if self.active.len() + self.free.len() != self.capacity() {
            return false;
        }
        let mut seen = vec![false; self.capacity()];
        let lists = [
            (&self.active, Membership::Active),
            (&self.free, Membership::Free),
        ];
        for (list, expected) in lists {
            for id in list.iter() {
                let index = id.index();
                if index >= seen.len() || seen[index] || self.membership[index] != expected {
                    return false;
                }
                seen[index] = true;
            }
        }
        seen.into_iter().all(|s| s)
    }
}
