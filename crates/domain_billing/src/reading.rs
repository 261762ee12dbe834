//! Meter readings
//!
//! A reading is immutable once recorded: it snapshots the meter's previous
//! cumulative value, the new value and their difference.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{MeterId, ReadingId};

use crate::meter::Meter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: ReadingId,
    pub meter_id: MeterId,
    /// Cumulative value before this reading
    pub previous_value: Decimal,
    /// Cumulative value reported by this reading
    pub current_value: Decimal,
    /// `current_value - previous_value`; may be negative
    pub delta: Decimal,
    pub recorded_at: DateTime<Utc>,
    /// Operator who took the reading
    pub operator: Option<String>,
    pub notes: Option<String>,
}

impl Reading {
    /// Records a new cumulative value on the meter
    ///
    /// Updates the meter's cumulative reading and timestamp. Decreasing
    /// values are accepted here and surface as a negative delta.
    pub fn record(
        meter: &mut Meter,
        value: Decimal,
        operator: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let previous = meter.advance_reading(value, at);
        Self {
            id: ReadingId::new_v7(),
            meter_id: meter.id,
            previous_value: previous,
            current_value: value,
            delta: value - previous,
            recorded_at: at,
            operator,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// True if the reading shows consumption
    pub fn has_consumption(&self) -> bool {
        self.delta > Decimal::ZERO
    }
}
