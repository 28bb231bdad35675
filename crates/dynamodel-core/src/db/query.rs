use crate::{
    Error,
    db::{
        expr::{Condition, KeyCondition, RangeCondition},
        record::Record,
        store::{KeySchema, PageOutput, QueryRequest, ScanRequest, StoreError},
    },
    model::Model,
    obs::sink::{ExecKind, Span},
    value::{Item, Value},
};
use std::vec;

///
/// Page
/// One page of records plus the key to continue from, if more remain.
///

#[derive(Clone, Debug)]
pub struct Page {
    pub records: Vec<Record>,
    pub last_evaluated_key: Option<Item>,
}

///
/// Query
///
/// Key-condition query against a table or one of its indexes. Equality on the
/// hash key is required; the first condition on the range key becomes part of
/// the key condition and everything else is a filter.
///

#[derive(Clone, Debug)]
pub struct Query {
    model: Model,
    index: Option<String>,
    hash: Option<Value>,
    range: Option<RangeCondition>,
    filters: Vec<Condition>,
    limit: Option<usize>,
    consistent: bool,
    forward: bool,
    start: Option<Item>,
}

impl Query {
    #[must_use]
    pub const fn new(model: Model) -> Self {
        Self {
            model,
            index: None,
            hash: None,
            range: None,
            filters: Vec::new(),
            limit: None,
            consistent: false,
            forward: true,
            start: None,
        }
    }

    #[must_use]
    pub fn on_index(model: Model, index: impl Into<String>) -> Self {
        Self {
            index: Some(index.into()),
            ..Self::new(model)
        }
    }

    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();

        let keys = self.key_schema();
        let is_hash = keys.as_ref().is_some_and(|k| k.hash == field);
        let is_range = keys
            .as_ref()
            .is_some_and(|k| k.range.as_deref() == Some(field.as_str()));

        if is_hash && self.hash.is_none() {
            self.hash = Some(value);
        } else if is_range && self.range.is_none() {
            self.range = Some(RangeCondition::Eq(value));
        } else {
            self.filters.push(Condition::eq(field, value));
        }
        self
    }

    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.range_or_filter(field.into(), RangeCondition::Lt(value.into()))
    }

    #[must_use]
    pub fn le(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.range_or_filter(field.into(), RangeCondition::Le(value.into()))
    }

    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.range_or_filter(field.into(), RangeCondition::Gt(value.into()))
    }

    #[must_use]
    pub fn ge(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.range_or_filter(field.into(), RangeCondition::Ge(value.into()))
    }

    #[must_use]
    pub fn between(
        self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.range_or_filter(field.into(), RangeCondition::Between(low.into(), high.into()))
    }

    #[must_use]
    pub fn begins_with(self, field: impl Into<String>, prefix: impl Into<Value>) -> Self {
        self.range_or_filter(field.into(), RangeCondition::BeginsWith(prefix.into()))
    }

    /// Filter applied after the key condition.
    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filters.push(condition);
        self
    }

    /// Maximum items evaluated per page.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn consistent(mut self) -> Self {
        self.consistent = true;
        self
    }

    #[must_use]
    pub const fn descending(mut self) -> Self {
        self.forward = false;
        self
    }

    /// Continue from a key returned by an earlier page.
    #[must_use]
    pub fn start_from(mut self, key: Item) -> Self {
        self.start = Some(key);
        self
    }

    fn range_or_filter(mut self, field: String, condition: RangeCondition) -> Self {
        let is_range = self
            .key_schema()
            .is_some_and(|k| k.range.as_deref() == Some(field.as_str()));

        if is_range && self.range.is_none() {
            self.range = Some(condition);
        } else {
            self.filters.push(condition.into_condition(field));
        }
        self
    }

    // Keys of the queried table or index; None for an unknown index.
    fn key_schema(&self) -> Option<KeySchema> {
        match &self.index {
            Some(name) => self
                .model
                .table()
                .index(name)
                .map(|i| i.key_schema().clone()),
            None => Some(self.model.table().key_schema().clone()),
        }
    }

    fn target(&self) -> String {
        match &self.index {
            Some(index) => format!("{}.{index}", self.model.table().name()),
            None => self.model.table().name().to_string(),
        }
    }

    fn request(&self) -> Result<QueryRequest, Error> {
        let keys = self
            .key_schema()
            .ok_or_else(|| Error::invalid_query(self.target(), "unknown index"))?;
        let hash = self.hash.clone().ok_or_else(|| {
            Error::invalid_query(
                self.target(),
                format!("an equality condition on hash key '{}' is required", keys.hash),
            )
        })?;

        let key_condition = KeyCondition {
            hash: (keys.hash.clone(), hash),
            range: keys.range.clone().zip(self.range.clone()),
        };
        let key_condition =
            key_condition.try_map(|field, value| self.model.wire_value(field, value))?;

        let filter = Condition::all(self.filters.iter().cloned())
            .map(|c| self.model.wire_condition(&c))
            .transpose()?;

        Ok(QueryRequest {
            table_name: self.model.table().name().to_string(),
            index_name: self.index.clone(),
            key_condition,
            filter,
            limit: self.limit,
            exclusive_start_key: self.start.clone(),
            consistent_read: self.consistent,
            scan_forward: self.forward,
        })
    }

    /// Fetch one page.
    pub fn page(&self) -> Result<Page, Error> {
        let request = PageRequest::Query(self.request()?);

        fetch_page(&self.model, partial_for(&self.model, self.index.as_deref()), &request)
    }

    /// Every matching record, following continuation keys lazily.
    pub fn recursive(self) -> Results {
        Results::new(self.model.clone(), self.index.clone(), self.request(), true)
    }

    /// Collect every matching record across all pages.
    pub fn all(self) -> Result<Vec<Record>, Error> {
        self.recursive().collect()
    }
}

impl IntoIterator for Query {
    type Item = Result<Record, Error>;
    type IntoIter = Results;

    /// Iterate the first page only; see `recursive`.
    fn into_iter(self) -> Self::IntoIter {
        Results::new(self.model.clone(), self.index.clone(), self.request(), false)
    }
}

///
/// Scan
/// Full read of a table or index with optional filters.
///

#[derive(Clone, Debug)]
pub struct Scan {
    model: Model,
    index: Option<String>,
    filters: Vec<Condition>,
    limit: Option<usize>,
    consistent: bool,
    start: Option<Item>,
}

impl Scan {
    #[must_use]
    pub const fn new(model: Model) -> Self {
        Self {
            model,
            index: None,
            filters: Vec::new(),
            limit: None,
            consistent: false,
            start: None,
        }
    }

    #[must_use]
    pub fn on_index(model: Model, index: impl Into<String>) -> Self {
        Self {
            index: Some(index.into()),
            ..Self::new(model)
        }
    }

    #[must_use]
    pub fn filter(mut self, condition: Condition) -> Self {
        self.filters.push(condition);
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn consistent(mut self) -> Self {
        self.consistent = true;
        self
    }

    #[must_use]
    pub fn start_from(mut self, key: Item) -> Self {
        self.start = Some(key);
        self
    }

    fn request(&self) -> Result<ScanRequest, Error> {
        if let Some(index) = &self.index
            && self.model.table().index(index).is_none()
        {
            return Err(Error::invalid_query(
                format!("{}.{index}", self.model.table().name()),
                "unknown index",
            ));
        }

        let filter = Condition::all(self.filters.iter().cloned())
            .map(|c| self.model.wire_condition(&c))
            .transpose()?;

        Ok(ScanRequest {
            table_name: self.model.table().name().to_string(),
            index_name: self.index.clone(),
            filter,
            limit: self.limit,
            exclusive_start_key: self.start.clone(),
            consistent_read: self.consistent,
        })
    }

    pub fn page(&self) -> Result<Page, Error> {
        let request = PageRequest::Scan(self.request()?);

        fetch_page(&self.model, partial_for(&self.model, self.index.as_deref()), &request)
    }

    pub fn recursive(self) -> Results {
        let request = self.request();
        Results::new(self.model, self.index, request, true)
    }

    pub fn all(self) -> Result<Vec<Record>, Error> {
        self.recursive().collect()
    }
}

impl IntoIterator for Scan {
    type Item = Result<Record, Error>;
    type IntoIter = Results;

    fn into_iter(self) -> Self::IntoIter {
        let request = self.request();
        Results::new(self.model, self.index, request, false)
    }
}

// ============================================================================
// Paging
// ============================================================================

#[derive(Clone, Debug)]
enum PageRequest {
    Query(QueryRequest),
    Scan(ScanRequest),
}

impl PageRequest {
    const fn kind(&self) -> ExecKind {
        match self {
            Self::Query(_) => ExecKind::Query,
            Self::Scan(_) => ExecKind::Scan,
        }
    }

    fn execute(&self, model: &Model) -> Result<PageOutput, StoreError> {
        let store = model.table().store();
        match self {
            Self::Query(request) => store.query(request.clone()),
            Self::Scan(request) => store.scan(request.clone()),
        }
    }

    // Only the start key changes between pages.
    fn continue_from(&mut self, key: Item) {
        match self {
            Self::Query(request) => request.exclusive_start_key = Some(key),
            Self::Scan(request) => request.exclusive_start_key = Some(key),
        }
    }
}

// Index reads may not carry every field unless the index projects all.
fn partial_for(model: &Model, index: Option<&str>) -> bool {
    index
        .and_then(|name| model.table().index(name))
        .is_some_and(|index| !index.projects_all())
}

fn fetch_output(model: &Model, request: &PageRequest) -> Result<PageOutput, Error> {
    let mut span = Span::new(request.kind(), model.table().name());

    let output = request.execute(model)?;
    span.set_rows(output.items.len() as u64);

    tracing::debug!(
        table = %model.table().name(),
        kind = ?request.kind(),
        rows = output.items.len(),
        more = output.last_evaluated_key.is_some(),
        "read page"
    );

    Ok(output)
}

fn fetch_page(model: &Model, partial: bool, request: &PageRequest) -> Result<Page, Error> {
    let output = fetch_output(model, request)?;

    let records = output
        .items
        .iter()
        .map(|item| model.record_from_item(item, partial))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page {
        records,
        last_evaluated_key: output.last_evaluated_key,
    })
}

///
/// Results
///
/// Lazy record iterator over one or all pages of a query or scan. The next
/// page is requested only once the current one is consumed; an error ends
/// the iteration.
///

#[derive(Debug)]
pub struct Results {
    model: Model,
    partial: bool,
    request: Option<PageRequest>,
    pending: Option<Error>,
    buffer: vec::IntoIter<Item>,
    follow: bool,
}

impl Results {
    fn new<R>(model: Model, index: Option<String>, request: Result<R, Error>, follow: bool) -> Self
    where
        R: Into<PageRequest>,
    {
        let partial = partial_for(&model, index.as_deref());
        let (request, pending) = match request {
            Ok(request) => (Some(request.into()), None),
            Err(err) => (None, Some(err)),
        };

        Self {
            model,
            partial,
            request,
            pending,
            buffer: Vec::new().into_iter(),
            follow,
        }
    }

    fn fetch(&mut self) -> Result<(), Error> {
        let Some(mut request) = self.request.take() else {
            return Ok(());
        };

        let output = fetch_output(&self.model, &request)?;
        self.buffer = output.items.into_iter();

        if self.follow
            && let Some(key) = output.last_evaluated_key
        {
            request.continue_from(key);
            self.request = Some(request);
        }

        Ok(())
    }
}

impl Iterator for Results {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(err) = self.pending.take() {
                self.request = None;
                return Some(Err(err));
            }

            if let Some(item) = self.buffer.next() {
                return Some(self.model.record_from_item(&item, self.partial));
            }

            self.request.as_ref()?;
            if let Err(err) = self.fetch() {
                self.pending = Some(err);
            }
        }
    }
}

impl From<QueryRequest> for PageRequest {
    fn from(request: QueryRequest) -> Self {
        Self::Query(request)
    }
}

impl From<ScanRequest> for PageRequest {
    fn from(request: ScanRequest) -> Self {
        Self::Scan(request)
    }
}
