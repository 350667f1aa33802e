use std::ops::ControlFlow;
use std::sync::Arc;

use super::cache::{FieldCache, Hydrate, MemberMap};
use super::coerce::{Coercible, CoercionEngine};
use super::record::Record;
use crate::driver::Cursor;
use crate::error::Result;
use crate::value::Value;

/// Maps rows onto typed values using a member cache and a coercion engine.
#[derive(Debug, Clone)]
pub struct Hydrator {
    cache: Arc<FieldCache>,
    engine: Arc<CoercionEngine>,
}

impl Default for Hydrator {
    fn default() -> Self {
        Self::new(FieldCache::global(), CoercionEngine::standard())
    }
}

// For each column, the member it fills. A member takes its first matching column.
struct Plan<T> {
    members: Arc<MemberMap<T>>,
    targets: Vec<Option<usize>>,
}

impl<T: Hydrate> Plan<T> {
    fn new(members: Arc<MemberMap<T>>, columns: &[String]) -> Self {
        let mut claimed = vec![false; members.len()];
        let targets = columns
            .iter()
            .map(|column| {
                let index = members.position(column)?;
                if claimed[index] {
                    return None;
                }
                claimed[index] = true;
                Some(index)
            })
            .collect();
        Self { members, targets }
    }
}

impl Hydrator {
    pub fn new(cache: Arc<FieldCache>, engine: Arc<CoercionEngine>) -> Self {
        Self { cache, engine }
    }
    pub fn cache(&self) -> &Arc<FieldCache> {
        &self.cache
    }
    pub fn engine(&self) -> &Arc<CoercionEngine> {
        &self.engine
    }
    fn plan<T: Hydrate>(&self, columns: &[String]) -> Plan<T> {
        Plan::new(self.cache.members::<T>(), columns)
    }
    fn fill_planned<T: Hydrate>(&self, plan: &Plan<T>, values: &[Value]) -> T {
        let mut target = T::default();
        for (target_member, raw) in plan.targets.iter().zip(values) {
            let member = match target_member {
                Some(index) => &plan.members.members()[*index],
                None => continue,
            };
            if let Some(value) = self.engine.coerce(member.kind(), raw.clone()) {
                member.assign(&mut target, value);
            }
        }
        target
    }

    /// Fills a fresh `T` from one row. Unmatched members keep their default.
    pub fn fill_one<T: Hydrate>(&self, columns: &[String], values: &[Value]) -> T {
        let plan = self.plan::<T>(columns);
        self.fill_planned(&plan, values)
    }
    /// The first column of a row, coerced to `V`.
    pub fn scalar<V: Coercible>(&self, values: &[Value]) -> Option<V> {
        let raw = values.first()?.clone();
        V::from_value(self.engine.coerce(V::KIND, raw)?)
    }
    pub fn record(&self, columns: &[String], values: &[Value]) -> Record {
        Record::with_engine(columns.to_vec(), values.to_vec(), self.engine.clone())
    }

    pub fn fill_many<T: Hydrate>(&self, cursor: &mut dyn Cursor) -> Result<Vec<T>> {
        let mut filled = Vec::new();
        self.for_each::<T, _>(cursor, |item| {
            filled.push(item);
            ControlFlow::Continue(())
        })?;
        Ok(filled)
    }
    pub fn records(&self, cursor: &mut dyn Cursor) -> Result<Vec<Record>> {
        let columns = cursor.columns().to_vec();
        let mut records = Vec::new();
        while let Some(row) = cursor.next_row()? {
            records.push(self.record(&columns, row));
        }
        Ok(records)
    }
    /// Hands each filled row to `f` until the cursor is exhausted or `f`
    /// breaks. Returns the number of rows handed over.
    pub fn for_each<T, F>(&self, cursor: &mut dyn Cursor, mut f: F) -> Result<usize>
    where
        T: Hydrate,
        F: FnMut(T) -> ControlFlow<()>,
    {
        let plan = self.plan::<T>(cursor.columns());
        let mut count = 0;
        while let Some(row) = cursor.next_row()? {
            count += 1;
            if f(self.fill_planned(&plan, row)).is_break() {
                break;
            }
        }
        Ok(count)
    }
}
