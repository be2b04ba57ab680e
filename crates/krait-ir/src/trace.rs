//! # Pass trace collector
//!
//! Structured, append-only records of what each optimization pass did and
//! declined to do. Consumed by external logging, by caching layers deciding
//! whether a recompilation changed anything, and by the test suite.

use std::collections::BTreeMap;
use std::fmt;

use krait_frontend::SourceLocation;

/// What a pass did at one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceVerdict {
    /// The pass changed the node (refined a fact or rewrote the subtree).
    Applied,
    /// The pass examined a candidate site and declined (e.g. a fold whose
    /// result would exceed the materialization cap).
    Skipped,
}

/// One immutable trace record. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub pass: &'static str,
    pub location: SourceLocation,
    pub verdict: TraceVerdict,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = match self.verdict {
            TraceVerdict::Applied => "applied",
            TraceVerdict::Skipped => "skipped",
        };
        write!(f, "{} {} at {}", self.pass, verdict, self.location)
    }
}

/// Per-pass verdict counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassCounts {
    pub applied: usize,
    pub skipped: usize,
}

/// Append-only collector of pass events, insertion-ordered.
#[derive(Debug, Clone, Default)]
pub struct TraceCollector {
    events: Vec<TraceEvent>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record. Never fails.
    pub fn record(&mut self, pass: &'static str, location: SourceLocation, verdict: TraceVerdict) {
        self.events.push(TraceEvent {
            pass,
            location,
            verdict,
        });
    }

    /// All events in insertion order.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Per-pass counts, keyed deterministically by pass name.
    pub fn summarize(&self) -> BTreeMap<&'static str, PassCounts> {
        let mut summary: BTreeMap<&'static str, PassCounts> = BTreeMap::new();
        for event in &self.events {
            let counts = summary.entry(event.pass).or_default();
            match event.verdict {
                TraceVerdict::Applied => counts.applied += 1,
                TraceVerdict::Skipped => counts.skipped += 1,
            }
        }
        summary
    }
}
