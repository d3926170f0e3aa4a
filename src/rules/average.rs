//! Average aggregations.
//!
//! [`Average`] is the incremental composite: an internal Sum and Count
//! sharing one grouping key, merged into a single effect per event. It
//! does not store the averaged value itself — consumers divide, or use
//! [`Average::ratio`].
//!
//! [`AverageAccurate`] stores the averaged value in one column by
//! recomputing `avg(source)` on every event. One column instead of two,
//! at the price of a subquery per write.

use crate::error::TallyError;
use crate::schema::ColumnRef;
use crate::snapshot::InstanceSnapshot;
use crate::sql::AggFunc;
use crate::value::Scalar;

use super::{Count, RuleCore, RuleEffect, Sum};

fn merge(a: RuleEffect, b: RuleEffect) -> RuleEffect {
    match (a, b) {
        (RuleEffect::Skip, other) | (other, RuleEffect::Skip) => other,
        (RuleEffect::Set(mut left), RuleEffect::Set(right)) => {
            left.extend(right);
            RuleEffect::Set(left)
        }
    }
}

/// Incremental average over two stored columns (sum and count).
#[derive(Debug, Clone)]
pub struct Average {
    pub(crate) sum: Sum,
    pub(crate) count: Count,
}

impl Average {
    pub(crate) fn new(sum_target: ColumnRef, source: ColumnRef, count_target: ColumnRef) -> Self {
        Average {
            sum: Sum::new(sum_target, source),
            count: Count::new(count_target, None),
        }
    }

    /// The averaged value from a parent row's stored sum and count.
    /// `None` while the group is empty or either column is NULL.
    pub fn ratio(&self, read: impl Fn(&str) -> Scalar) -> Option<f64> {
        let sum = read(&self.sum.core.target.column).as_f64()?;
        let count = read(&self.count.core.target.column).as_f64()?;
        if count == 0.0 {
            return None;
        }
        Some(sum / count)
    }

    pub(crate) fn on_insert(
        &self,
        instance: &dyn InstanceSnapshot,
    ) -> Result<RuleEffect, TallyError> {
        Ok(merge(self.sum.on_insert(instance)?, self.count.on_insert()?))
    }

    pub(crate) fn on_delete(
        &self,
        instance: &dyn InstanceSnapshot,
    ) -> Result<RuleEffect, TallyError> {
        Ok(merge(self.sum.on_delete(instance)?, self.count.on_delete()?))
    }

    pub(crate) fn on_update(
        &self,
        instance: &dyn InstanceSnapshot,
    ) -> Result<RuleEffect, TallyError> {
        Ok(merge(self.sum.on_update(instance)?, self.count.on_update()?))
    }

    pub(crate) fn on_recalc(
        &self,
        instance: &dyn InstanceSnapshot,
        old: bool,
    ) -> Result<RuleEffect, TallyError> {
        Ok(merge(
            self.sum.on_recalc(instance, old)?,
            self.count.on_recalc(instance, old)?,
        ))
    }
}

/// Always-recompute average into a single stored column.
#[derive(Debug, Clone)]
pub struct AverageAccurate {
    pub(crate) core: RuleCore,
}

impl AverageAccurate {
    pub(crate) fn new(target: ColumnRef, source: ColumnRef) -> Self {
        AverageAccurate {
            core: RuleCore::new(target, Some(source)),
        }
    }

    pub(crate) fn on_recalc(
        &self,
        instance: &dyn InstanceSnapshot,
        old: bool,
    ) -> Result<RuleEffect, TallyError> {
        self.core.recalc(AggFunc::Avg, instance, old)
    }
}
