use std::marker::PhantomData;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::config::MissingContextPolicy;
use crate::database::manager::DatabaseError;
use crate::database::storage::Storage;
use crate::filter::{Filter, FilterData, Predicate};
use crate::tenant::{
    Entity, EntityDescriptor, FilterDecision, QueryInterceptor, RecordedDecision, TenancyError, TenantContext,
};

/// Builder for a read query on `E`.
pub struct QueryBuilder<E> {
    storage: Arc<dyn Storage>,
    descriptor: EntityDescriptor,
    policy: MissingContextPolicy,
    filter: Filter,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> QueryBuilder<E> {
    pub(crate) fn new(
        storage: Arc<dyn Storage>,
        descriptor: EntityDescriptor,
        policy: MissingContextPolicy,
    ) -> Result<Self, DatabaseError> {
        let filter = Filter::new(descriptor.table)?;
        Ok(Self {
            storage,
            descriptor,
            policy,
            filter,
            _entity: PhantomData,
        })
    }

    pub fn filter(mut self, filter_data: FilterData) -> Result<Self, DatabaseError> {
        self.filter.assign(filter_data)?;
        Ok(self)
    }

    pub fn where_clause(mut self, conditions: Value) -> Result<Self, DatabaseError> {
        self.filter.where_clause(conditions)?;
        Ok(self)
    }

    pub fn and_where(mut self, predicate: Predicate) -> Self {
        self.filter.and_where(predicate);
        self
    }

    pub fn order(mut self, order_spec: Value) -> Result<Self, DatabaseError> {
        self.filter.order(order_spec)?;
        Ok(self)
    }

    pub fn limit(mut self, limit: i32, offset: Option<i32>) -> Result<Self, DatabaseError> {
        self.filter.limit(limit, offset)?;
        Ok(self)
    }

    /// Freeze the query. Terminal operations live on the result.
    pub fn prepare(self) -> PreparedQuery<E> {
        PreparedQuery {
            storage: self.storage,
            descriptor: self.descriptor,
            interceptor: QueryInterceptor::new(self.policy),
            filter: self.filter,
            decision: OnceCell::new(),
            _entity: PhantomData,
        }
    }

    pub async fn select_all(self) -> Result<Vec<E>, DatabaseError> {
        self.prepare().all().await
    }

    pub async fn select_one(self) -> Result<E, DatabaseError> {
        self.prepare().one().await
    }

    pub async fn select_optional(self) -> Result<Option<E>, DatabaseError> {
        self.prepare().optional().await
    }

    pub async fn count(self) -> Result<i64, DatabaseError> {
        self.prepare().count().await
    }
}

/// A finalized read query.
///
/// The built filter is never modified. The tenant filtering decision is made
/// on the first terminal call and recorded here together with the context it
/// was made under; later terminal calls reuse it, so repeated execution never
/// compounds predicates.
pub struct PreparedQuery<E> {
    storage: Arc<dyn Storage>,
    descriptor: EntityDescriptor,
    interceptor: QueryInterceptor,
    filter: Filter,
    decision: OnceCell<RecordedDecision>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> PreparedQuery<E> {
    pub async fn all(&self) -> Result<Vec<E>, DatabaseError> {
        self.fetch_rows().await?.into_iter().map(decode).collect()
    }

    /// First matching row, `NotFound` when there is none.
    pub async fn one(&self) -> Result<E, DatabaseError> {
        self.optional()
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("No matching row in '{}'", self.descriptor.table)))
    }

    /// First matching row. Only one row is fetched and decoded.
    pub async fn optional(&self) -> Result<Option<E>, DatabaseError> {
        let Some(mut filter) = self.effective_filter()? else {
            return Ok(None);
        };
        let limit = filter.limit_value().map_or(1, |existing| existing.min(1));
        filter.limit(limit, None)?;

        let rows = self.storage.fetch_all(&filter).await?;
        rows.into_iter().next().map(decode).transpose()
    }

    /// Number of rows `all` would return, pagination included.
    pub async fn count(&self) -> Result<i64, DatabaseError> {
        match self.effective_filter()? {
            Some(filter) => self.storage.count(&filter).await,
            None => Ok(0),
        }
    }

    /// Rows decoded one at a time as the stream is polled.
    pub fn stream(&self) -> BoxStream<'_, Result<E, DatabaseError>> {
        stream::once(self.fetch_rows())
            .flat_map(|result| match result {
                Ok(rows) => stream::iter(rows).map(decode::<E>).boxed(),
                Err(err) => stream::once(async move { Err(err) }).boxed(),
            })
            .boxed()
    }

    /// The recorded decision, if a terminal operation has run.
    pub fn decision(&self) -> Option<FilterDecision> {
        self.decision.get().map(|recorded| recorded.decision)
    }

    /// The filter as it would be sent to storage now; `None` when fail-closed to empty.
    pub fn effective_filter(&self) -> Result<Option<Filter>, DatabaseError> {
        let decision = self.resolve_decision()?;
        Ok(QueryInterceptor::apply(decision, &self.descriptor, &self.filter))
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    async fn fetch_rows(&self) -> Result<Vec<Value>, DatabaseError> {
        match self.effective_filter()? {
            Some(filter) => self.storage.fetch_all(&filter).await,
            None => Ok(vec![]),
        }
    }

    fn resolve_decision(&self) -> Result<FilterDecision, TenancyError> {
        let snapshot = TenantContext::snapshot();
        let recorded = match self.decision.get() {
            Some(recorded) => recorded,
            None => {
                let decision = self.interceptor.decide(&self.descriptor, &self.filter, snapshot)?;
                self.decision.get_or_init(|| RecordedDecision { decision, snapshot })
            }
        };
        // A decision made for one context is never reused under another.
        if recorded.snapshot != snapshot {
            return Err(TenancyError::ContextChanged {
                table: self.descriptor.table.to_string(),
            });
        }
        Ok(recorded.decision)
    }
}

fn decode<E: Entity>(row: Value) -> Result<E, DatabaseError> {
    Ok(serde_json::from_value(row)?)
}
