//! In-memory record buffer for the mapped and string write paths.
//!
//! Records arriving out of order are parked here and emitted through the
//! raw path once sorted. Keys and values live in two flat arenas instead
//! of per-record allocations; sorting permutes an index vector only.

use crate::format::MAX_DIM;

/// Flat record buffer with per-dimension key range tracking.
#[derive(Debug)]
pub(crate) struct LinkedData {
    dim: usize,
    val_count: usize,
    keys: Vec<i32>,
    values: Vec<f64>,
    min_key: [i32; MAX_DIM],
    max_key: [i32; MAX_DIM],
}

impl LinkedData {
    pub fn new(dim: usize, val_count: usize) -> LinkedData {
        LinkedData {
            dim,
            val_count,
            keys: Vec::new(),
            values: Vec::new(),
            min_key: [i32::MAX; MAX_DIM],
            max_key: [0; MAX_DIM],
        }
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 {
            self.values.len() / self.val_count.max(1)
        } else {
            self.keys.len() / self.dim
        }
    }

    /// The observed key range on dimension `d`; `(1, 0)` when no record
    /// has been added.
    pub fn key_range(&self, d: usize) -> (i32, i32) {
        if self.min_key[d] == i32::MAX {
            (1, 0)
        } else {
            (self.min_key[d], self.max_key[d])
        }
    }

    pub fn push(&mut self, key: &[i32], values: &[f64]) {
        debug_assert_eq!(key.len(), self.dim);
        debug_assert_eq!(values.len(), self.val_count);
        self.keys.extend_from_slice(key);
        self.values.extend_from_slice(values);
        for (d, &k) in key.iter().enumerate() {
            if k < self.min_key[d] {
                self.min_key[d] = k;
            }
            if k > self.max_key[d] {
                self.max_key[d] = k;
            }
        }
    }

    /// Record order sorted lexicographically by key tuple. Duplicates stay
    /// adjacent, in insertion order, for the caller to reject.
    pub fn sorted_order(&self) -> Vec<u32> {
        let mut order: Vec<u32> = (0..self.len() as u32).collect();
        if self.dim > 0 {
            let dim = self.dim;
            let keys = &self.keys;
            order.sort_by(|&a, &b| {
                let ka = &keys[a as usize * dim..(a as usize + 1) * dim];
                let kb = &keys[b as usize * dim..(b as usize + 1) * dim];
                ka.cmp(kb)
            });
        }
        order
    }

    pub fn record(&self, nr: usize) -> (&[i32], &[f64]) {
        (
            &self.keys[nr * self.dim..(nr + 1) * self.dim],
            &self.values[nr * self.val_count..(nr + 1) * self.val_count],
        )
    }

    pub fn memory_used(&self) -> usize {
        self.keys.capacity() * std::mem::size_of::<i32>()
            + self.values.capacity() * std::mem::size_of::<f64>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_lexicographically() {
        let mut buf = LinkedData::new(2, 1);
        buf.push(&[2, 1], &[21.0]);
        buf.push(&[1, 2], &[12.0]);
        buf.push(&[1, 1], &[11.0]);
        buf.push(&[2, 2], &[22.0]);

        let order = buf.sorted_order();
        let sorted: Vec<f64> = order
            .iter()
            .map(|&i| buf.record(i as usize).1[0])
            .collect();
        assert_eq!(sorted, vec![11.0, 12.0, 21.0, 22.0]);
        assert_eq!(buf.key_range(0), (1, 2));
    }

    #[test]
    fn duplicates_stay_in_insertion_order() {
        let mut buf = LinkedData::new(1, 1);
        buf.push(&[3], &[1.0]);
        buf.push(&[3], &[2.0]);
        buf.push(&[1], &[0.0]);
        let order = buf.sorted_order();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn scalar_records() {
        let mut buf = LinkedData::new(0, 1);
        assert_eq!(buf.len(), 0);
        buf.push(&[], &[5.0]);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.record(0), (&[][..], &[5.0][..]));
        assert_eq!(buf.key_range(0), (1, 0));
    }
}
