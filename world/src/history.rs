//! Fixed-capacity ring of the most recently recorded values.

use thiserror::Error;

/// Errors raised when reading from a [`HistoryBuffer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// The requested position is not smaller than the configured capacity.
    #[error("history position {position} is outside the capacity of {capacity}")]
    IndexOutOfRange {
        /// Requested position, where 0 is the most recent entry.
        position: usize,
        /// Configured capacity of the buffer.
        capacity: usize,
    },
    /// The position fits the capacity but fewer values have been recorded.
    #[error("history position {position} has not been recorded yet ({recorded} recorded)")]
    NotRecorded {
        /// Requested position, where 0 is the most recent entry.
        position: usize,
        /// Number of values currently retained.
        recorded: usize,
    },
}

/// Circular buffer retaining the `capacity` most recent values.
///
/// Position 0 is the value pushed last and position `capacity - 1` the oldest
/// one still retained. Pushing into a full buffer overwrites the oldest slot;
/// the buffer never grows and never evicts values any other way.
#[derive(Clone, Debug)]
pub struct HistoryBuffer<T> {
    slots: Vec<Option<T>>,
    next: usize,
    recorded: usize,
}

impl<T> HistoryBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` values.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            next: 0,
            recorded: 0,
        }
    }

    /// Records a value as the most recent entry.
    pub fn push_front(&mut self, item: T) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }
        self.slots[self.next] = Some(item);
        self.next = (self.next + 1) % capacity;
        self.recorded = (self.recorded + 1).min(capacity);
    }

    /// Value recorded `position` pushes ago.
    pub fn at(&self, position: usize) -> Result<&T, HistoryError> {
        let capacity = self.capacity();
        if position >= capacity {
            return Err(HistoryError::IndexOutOfRange { position, capacity });
        }
        if position >= self.recorded {
            return Err(HistoryError::NotRecorded {
                position,
                recorded: self.recorded,
            });
        }

        let slot = (self.next + capacity - 1 - position) % capacity;
        self.slots[slot].as_ref().ok_or(HistoryError::NotRecorded {
            position,
            recorded: self.recorded,
        })
    }

    /// Most recently recorded value, if any.
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.at(0).ok()
    }

    /// Number of values currently retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recorded
    }

    /// Reports whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recorded == 0
    }

    /// Maximum number of values the buffer retains.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterator over the retained values, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.recorded).filter_map(move |position| self.at(position).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_recent_value_sits_at_position_zero() {
        let mut history = HistoryBuffer::new(3);
        history.push_front('a');
        history.push_front('b');

        assert_eq!(history.at(0), Ok(&'b'));
        assert_eq!(history.at(1), Ok(&'a'));
        assert_eq!(history.first(), Some(&'b'));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn unrecorded_position_is_distinguished_from_out_of_range() {
        let mut history = HistoryBuffer::new(4);
        history.push_front(1_u32);

        assert_eq!(
            history.at(2),
            Err(HistoryError::NotRecorded {
                position: 2,
                recorded: 1
            })
        );
        assert_eq!(
            history.at(4),
            Err(HistoryError::IndexOutOfRange {
                position: 4,
                capacity: 4
            })
        );
    }

    #[test]
    fn wraparound_keeps_last_capacity_values() {
        let capacity = 4;
        let extra = 3;
        let mut history = HistoryBuffer::new(capacity);
        for value in 0..(capacity + extra) {
            history.push_front(value);
        }

        assert_eq!(history.len(), capacity);
        let retained: Vec<usize> = history.iter().copied().collect();
        assert_eq!(retained, vec![6, 5, 4, 3]);
        assert!(matches!(
            history.at(capacity),
            Err(HistoryError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn reading_capacity_after_exact_fill_fails() {
        let mut history = HistoryBuffer::new(2);
        history.push_front(10);
        history.push_front(20);

        assert_eq!(history.at(1), Ok(&10));
        assert_eq!(
            history.at(2),
            Err(HistoryError::IndexOutOfRange {
                position: 2,
                capacity: 2
            })
        );
    }

    #[test]
    fn zero_capacity_buffer_never_retains() {
        let mut history = HistoryBuffer::new(0);
        history.push_front(1);

        assert!(history.is_empty());
        assert!(matches!(
            history.at(0),
            Err(HistoryError::IndexOutOfRange { .. })
        ));
    }
}
