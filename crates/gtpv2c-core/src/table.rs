//! Procedure table and correlation index
//!
//! The table maps wire sequence numbers to procedures; the index maps
//! correlation ids back to sequence numbers. Both maps change together in
//! every mutating operation, and neither is reachable on its own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::procedure::{CorrelationId, Procedure};

/// Source of correlation ids.
///
/// Tables that hand ids to the same upper layer share one generator so the
/// ids stay unique across them. 0 is reserved for unassigned ids.
#[derive(Debug)]
pub struct CorrelationIdGenerator {
    next: AtomicU64,
}

impl CorrelationIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> CorrelationId {
        loop {
            let value = self.next.fetch_add(1, Ordering::Relaxed);
            if value != 0 {
                return CorrelationId::new(value);
            }
        }
    }
}

impl Default for CorrelationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Authoritative map of in-flight procedures
#[derive(Debug, Default)]
pub struct ProcedureTable {
    by_sequence: HashMap<u32, Procedure>,
    by_correlation: HashMap<CorrelationId, u32>,
    capacity: Option<usize>,
    ids: Arc<CorrelationIdGenerator>,
}

impl ProcedureTable {
    /// Create an unbounded table with its own id generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table refusing inserts beyond `capacity` procedures
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            by_sequence: HashMap::with_capacity(capacity.min(1024)),
            by_correlation: HashMap::with_capacity(capacity.min(1024)),
            capacity: Some(capacity),
            ids: Arc::default(),
        }
    }

    /// Draw correlation ids from a shared generator
    pub fn with_id_generator(mut self, ids: Arc<CorrelationIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Insert a procedure under `sequence_number` and assign it a fresh
    /// correlation id.
    ///
    /// A sequence number that is already present is never overwritten.
    pub fn insert(&mut self, sequence_number: u32, mut procedure: Procedure) -> Result<CorrelationId> {
        if self.by_sequence.contains_key(&sequence_number) {
            warn!(sequence_number, "Sequence number already has a pending procedure");
            return Err(Error::DuplicateSequence { sequence_number });
        }
        if let Some(capacity) = self.capacity {
            if self.by_sequence.len() >= capacity {
                warn!(capacity, sequence_number, "Procedure table full");
                return Err(Error::TableFull { capacity });
            }
        }

        let mut correlation_id = self.ids.next();
        while self.by_correlation.contains_key(&correlation_id) {
            correlation_id = self.ids.next();
        }

        procedure.sequence_number = sequence_number;
        procedure.correlation_id = correlation_id;
        self.by_sequence.insert(sequence_number, procedure);
        self.by_correlation.insert(correlation_id, sequence_number);

        debug!(sequence_number, %correlation_id, size = self.by_sequence.len(), "Procedure inserted");
        Ok(correlation_id)
    }

    pub fn get_by_sequence(&self, sequence_number: u32) -> Option<&Procedure> {
        self.by_sequence.get(&sequence_number)
    }

    pub fn get_by_sequence_mut(&mut self, sequence_number: u32) -> Option<&mut Procedure> {
        self.by_sequence.get_mut(&sequence_number)
    }

    pub fn get_by_correlation(&self, correlation_id: CorrelationId) -> Option<&Procedure> {
        self.by_correlation
            .get(&correlation_id)
            .and_then(|sequence_number| self.by_sequence.get(sequence_number))
    }

    pub fn get_by_correlation_mut(&mut self, correlation_id: CorrelationId) -> Option<&mut Procedure> {
        let sequence_number = *self.by_correlation.get(&correlation_id)?;
        self.by_sequence.get_mut(&sequence_number)
    }

    /// Sequence number a correlation id resolves to
    pub fn sequence_for(&self, correlation_id: CorrelationId) -> Option<u32> {
        self.by_correlation.get(&correlation_id).copied()
    }

    /// Remove a procedure from both maps.
    ///
    /// The caller owns the returned procedure and must cancel any timer
    /// handle it still carries.
    pub fn remove_by_sequence(&mut self, sequence_number: u32) -> Option<Procedure> {
        let procedure = self.by_sequence.remove(&sequence_number)?;
        self.by_correlation.remove(&procedure.correlation_id);
        debug!(sequence_number, correlation_id = %procedure.correlation_id, size = self.by_sequence.len(), "Procedure removed");
        Some(procedure)
    }

    pub fn contains(&self, sequence_number: u32) -> bool {
        self.by_sequence.contains_key(&sequence_number)
    }

    pub fn len(&self) -> usize {
        self.by_sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_sequence.is_empty()
    }

    /// Configured capacity, if any
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Iterate over live procedures in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Procedure> {
        self.by_sequence.values()
    }

    /// Whether both maps describe the same set of procedures
    pub fn is_consistent(&self) -> bool {
        self.by_sequence.len() == self.by_correlation.len()
            && self.by_correlation.iter().all(|(correlation_id, sequence_number)| {
                self.by_sequence
                    .get(sequence_number)
                    .is_some_and(|procedure| {
                        procedure.correlation_id == *correlation_id
                            && procedure.sequence_number == *sequence_number
                    })
            })
    }
}
