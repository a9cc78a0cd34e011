//! Last-writer-wins register

use super::{CrdtError, CrdtOp, CrdtState, MergeOutcome};
use crate::shared::clock::SiteId;
use crate::shared::value::Value;
use serde::{Deserialize, Serialize};

/// Register keeping the write with the highest `(clock, site)` stamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LwwRegister<T> {
    value: Option<T>,
    clock: u64,
    site: SiteId,
}

impl<T: Clone + PartialEq> LwwRegister<T> {
    pub fn new() -> Self {
        Self {
            value: None,
            clock: 0,
            site: SiteId::new(),
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn stamp(&self) -> (u64, &str) {
        (self.clock, &self.site)
    }

    /// Write `value` stamped with `(clock, site)`.
    ///
    /// Returns the value held before the call when the write won, which is the
    /// prior snapshot an inverse write needs. Returns `None` when the write lost
    /// to a newer stamp.
    pub fn write(&mut self, value: T, clock: u64, site: &str) -> Option<Option<T>> {
        if !self.wins(clock, site) {
            return None;
        }
        let prior = self.value.replace(value);
        self.clock = clock;
        self.site = site.to_string();
        Some(prior)
    }

    fn wins(&self, clock: u64, site: &str) -> bool {
        (clock, site) > (self.clock, self.site.as_str())
    }
}

impl<T: Clone + PartialEq> Default for LwwRegister<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl CrdtState for LwwRegister<Value> {
    fn merge(&mut self, other: &Self) -> MergeOutcome {
        match &other.value {
            Some(value) => MergeOutcome::from_changed(
                self.write(value.clone(), other.clock, &other.site).is_some(),
            ),
            None => MergeOutcome::Unchanged,
        }
    }

    fn apply(&mut self, op: &CrdtOp) -> Result<MergeOutcome, CrdtError> {
        match op {
            CrdtOp::RegisterWrite {
                value, clock, site, ..
            } => Ok(MergeOutcome::from_changed(
                self.write(value.clone(), *clock, site).is_some(),
            )),
            other => Err(CrdtError::unsupported(other, "register")),
        }
    }

    fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_higher_clock_wins() {
        let mut reg = LwwRegister::new();
        reg.write(Value::Number(1.0), 5, "a");
        assert!(reg.write(Value::Number(2.0), 4, "z").is_none());
        assert_eq!(reg.value(), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_tie_broken_by_site() {
        let mut left = LwwRegister::new();
        left.write(Value::text("from-a"), 3, "a");
        let mut right = LwwRegister::new();
        right.write(Value::text("from-b"), 3, "b");

        let mut merged_lr = left.clone();
        merged_lr.merge(&right);
        let mut merged_rl = right.clone();
        merged_rl.merge(&left);

        assert_eq!(merged_lr, merged_rl);
        assert_eq!(merged_lr.value(), Some(&Value::text("from-b")));
    }

    #[test]
    fn test_write_returns_prior() {
        let mut reg = LwwRegister::new();
        assert_eq!(reg.write(Value::Number(1.0), 1, "a"), Some(None));
        assert_eq!(
            reg.write(Value::Number(2.0), 2, "a"),
            Some(Some(Value::Number(1.0)))
        );
    }
}
