//! Conjunctive inclusive range filtering over numeric fields.
//!
//! A record passes when every constrained field is present and inside its
//! `[min, max]` range; unconstrained fields impose nothing. Applying
//! constraints in any order, or the same constraint twice, yields the same
//! rows in the same relative order. An empty result is a valid terminal
//! state, not an error.

use crate::error::{PipelineError, Result};
use crate::types::{Dataset, Field, PointRecord};
use std::collections::BTreeMap;
use tracing::debug;

/// Most fields an analyst can constrain at once.
pub const MAX_ACTIVE_FIELDS: usize = 4;

/// Inclusive numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeConstraint {
    pub min: f64,
    pub max: f64,
}

impl RangeConstraint {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn intersect(&self, other: &RangeConstraint) -> RangeConstraint {
        RangeConstraint {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }
}

/// A conjunction of range constraints, at most [`MAX_ACTIVE_FIELDS`] of
/// them. The empty spec is the identity filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    constraints: BTreeMap<Field, RangeConstraint>,
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the constraint on `field`.
    pub fn insert(&mut self, field: Field, min: f64, max: f64) -> Result<()> {
        if !field.is_numeric() {
            return Err(PipelineError::Filter(format!(
                "field {field} is not numeric and cannot be range-filtered"
            )));
        }
        if min > max {
            return Err(PipelineError::Filter(format!(
                "inverted range [{min}, {max}] for field {field}"
            )));
        }
        if !self.constraints.contains_key(&field) && self.constraints.len() >= MAX_ACTIVE_FIELDS {
            return Err(PipelineError::Filter(format!(
                "at most {MAX_ACTIVE_FIELDS} fields may be constrained at once"
            )));
        }

        self.constraints.insert(field, RangeConstraint { min, max });
        Ok(())
    }

    /// Conjunction of two specs: shared fields get the intersection of
    /// their ranges. `apply(apply(d, f1), f2) == apply(d, f1.merge(f2))`.
    pub fn merge(&self, other: &FilterSpec) -> Result<FilterSpec> {
        let mut merged = self.clone();
        for (field, constraint) in &other.constraints {
            match merged.constraints.get(field) {
                Some(existing) => {
                    let tight = existing.intersect(constraint);
                    merged.constraints.insert(*field, tight);
                }
                None => {
                    if merged.constraints.len() >= MAX_ACTIVE_FIELDS {
                        return Err(PipelineError::Filter(format!(
                            "merged spec would constrain more than {MAX_ACTIVE_FIELDS} fields"
                        )));
                    }
                    merged.constraints.insert(*field, *constraint);
                }
            }
        }
        Ok(merged)
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &RangeConstraint)> {
        self.constraints.iter()
    }
}

fn passes(record: &PointRecord, spec: &FilterSpec) -> bool {
    spec.iter().all(|(field, constraint)| {
        record
            .numeric(*field)
            .is_some_and(|v| constraint.contains(v))
    })
}

/// Applies the spec, preserving original row order.
pub fn apply(dataset: &Dataset, spec: &FilterSpec) -> Dataset {
    if spec.is_empty() {
        return dataset.clone();
    }

    let records: Vec<PointRecord> = dataset
        .records()
        .iter()
        .filter(|r| passes(r, spec))
        .cloned()
        .collect();

    debug!(
        before = dataset.len(),
        after = records.len(),
        constraints = spec.len(),
        "applied range filter"
    );
    dataset.with_records(records)
}
