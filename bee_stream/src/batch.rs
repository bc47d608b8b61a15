use bee_inference::Tensor;
use std::mem;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AccumulatorError {
    #[error("Batch capacity must be a positive integer")]
    ZeroCapacity,
    #[error("Batch already holds {capacity} tensors, flush before appending")]
    CapacityExceeded { capacity: usize },
}

/// Ordered, bounded buffer of preprocessed frames owned by a single session.
#[derive(Debug)]
pub struct BatchAccumulator {
    capacity: usize,
    items: Vec<Tensor>,
}

impl BatchAccumulator {
    pub fn new(capacity: usize) -> Result<Self, AccumulatorError> {
        if capacity == 0 {
            return Err(AccumulatorError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            items: Vec::with_capacity(capacity),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn append(&mut self, tensor: Tensor) -> Result<(), AccumulatorError> {
        if self.is_full() {
            return Err(AccumulatorError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.items.push(tensor);
        Ok(())
    }

    /// Takes the current contents in append order, leaving the buffer empty.
    pub fn flush(&mut self) -> Vec<Tensor> {
        mem::replace(&mut self.items, Vec::with_capacity(self.capacity))
    }

    /// Drops pending tensors without handing them out. Returns how many were
    /// dropped.
    pub fn discard(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        count
    }
}
