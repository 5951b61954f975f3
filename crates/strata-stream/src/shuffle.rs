//! Byte-bounded shuffle buffer
//!
//! A reservoir that randomizes a stream without holding all of it. Items
//! are admitted until the byte budget is reached; after that every new
//! item replaces a uniformly chosen occupant, which is handed back to the
//! caller. Exchanging `None` drains the reservoir in random order.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::{Result, StreamError};

/// Size of an item as counted against the buffer budget
pub trait ByteSize {
    /// Bytes the item occupies
    fn byte_size(&self) -> usize;
}

impl ByteSize for Vec<u8> {
    fn byte_size(&self) -> usize {
        self.len()
    }
}

/// Random-eviction reservoir sized in bytes
#[derive(Debug)]
pub struct ShuffleBuffer<T> {
    items: Vec<T>,
    capacity: usize,
    used: usize,
    rng: StdRng,
    pass_through: u64,
}

impl<T: ByteSize> ShuffleBuffer<T> {
    /// Buffer holding up to `capacity` bytes, seeded from entropy
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_seed(capacity, None)
    }

    /// Buffer holding up to `capacity` bytes; a seed makes the order reproducible
    pub fn with_seed(capacity: usize, seed: Option<u64>) -> Result<Self> {
        if capacity == 0 {
            return Err(StreamError::InvalidArgument(
                "shuffle buffer size must be > 0".to_string(),
            ));
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            items: Vec::new(),
            capacity,
            used: 0,
            rng,
            pass_through: 0,
        })
    }

    /// Offer `item` and maybe get another one back.
    ///
    /// With `Some`, returns `None` while the item fits the budget, otherwise
    /// swaps it with a random occupant and returns that occupant. An item
    /// offered to an empty buffer that cannot hold it is returned as is.
    /// With `None`, removes and returns a random occupant.
    pub fn exchange(&mut self, item: Option<T>) -> Option<T> {
        let Some(item) = item else {
            return self.take_random();
        };

        let size = item.byte_size();
        if self.used + size <= self.capacity {
            self.used += size;
            self.items.push(item);
            return None;
        }

        if self.items.is_empty() {
            self.pass_through += 1;
            warn!(
                "Shuffle buffer of {} bytes is too small for an item of {} bytes; passing it through",
                self.capacity, size
            );
            return Some(item);
        }

        let slot = self.rng.gen_range(0..self.items.len());
        let evicted = std::mem::replace(&mut self.items[slot], item);
        self.used = self.used + size - evicted.byte_size();
        Some(evicted)
    }

    /// Remove and return a random occupant
    pub fn drain(&mut self) -> Option<T> {
        self.exchange(None)
    }

    fn take_random(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let slot = self.rng.gen_range(0..self.items.len());
        let item = self.items.swap_remove(slot);
        self.used -= item.byte_size();
        Some(item)
    }

    /// Number of buffered items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bytes currently buffered
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    /// Byte budget
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items handed back because they exceeded the whole budget
    pub fn pass_through_count(&self) -> u64 {
        self.pass_through
    }
}
