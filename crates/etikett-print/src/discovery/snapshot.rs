// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ordered, identity-deduplicated printer list shared by every discoverer and
// by the aggregator.

use etikett_core::types::Printer;

/// Printers in discovery order, at most one entry per (address, transport).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    printers: Vec<Printer>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `printer`, or replace the entry with the same identity in place.
    ///
    /// Returns `true` when the list changed.
    pub fn upsert(&mut self, printer: Printer) -> bool {
        match self.printers.iter_mut().find(|known| known.same_device(&printer)) {
            Some(known) if *known == printer => false,
            Some(known) => {
                *known = printer;
                true
            }
            None => {
                self.printers.push(printer);
                true
            }
        }
    }

    /// Merge a full snapshot from one source.
    pub fn update_with(&mut self, printers: impl IntoIterator<Item = Printer>) {
        for printer in printers {
            self.upsert(printer);
        }
    }

    /// Union of several sources' latest snapshots, in source order.
    pub fn union<'a>(sources: impl IntoIterator<Item = &'a Vec<Printer>>) -> Self {
        let mut merged = Self::new();
        for source in sources {
            merged.update_with(source.iter().cloned());
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.printers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.printers.len()
    }

    pub fn printers(&self) -> &[Printer] {
        &self.printers
    }

    pub fn to_vec(&self) -> Vec<Printer> {
        self.printers.clone()
    }
}
