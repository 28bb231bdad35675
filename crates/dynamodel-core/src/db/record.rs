use crate::{
    Error,
    db::{
        expr::{Condition, UpdateAction},
        store::{PutItemRequest, ReturnValues, StoreError},
        tracked::TrackedValues,
    },
    model::Model,
    obs::sink::{ExecKind, MetricsEvent, Span, record},
    schema::ValidationError,
    value::{Value, Values},
};

///
/// SaveOptions
///
/// `partial` sends only the fields changed since load as an update; `unique`
/// makes a full put fail when the primary key already exists; `return_all`
/// merges every attribute of the updated item back into the record.
///

#[derive(Clone, Debug, Default)]
pub struct SaveOptions {
    pub partial: bool,
    pub unique: bool,
    pub return_all: bool,
    pub conditions: Option<Condition>,
}

impl SaveOptions {
    #[must_use]
    pub const fn partial(mut self) -> Self {
        self.partial = true;
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub const fn return_all(mut self) -> Self {
        self.return_all = true;
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions = Some(match self.conditions.take() {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }
}

///
/// Record
///
/// One instance of a model. Field assignments are tracked so a partial save
/// writes only what changed.
///

#[derive(Clone, Debug)]
pub struct Record {
    model: Model,
    values: TrackedValues,
    partial: bool,
}

impl Record {
    pub(crate) const fn new(model: Model, values: TrackedValues, partial: bool) -> Self {
        Self {
            model,
            values,
            partial,
        }
    }

    #[must_use]
    pub const fn model(&self) -> &Model {
        &self.model
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.set(field, value.into());
    }

    /// Remove a field; a partial save then removes it from the stored item.
    pub fn unset(&mut self, field: impl Into<String>) {
        self.values.unset(field);
    }

    #[must_use]
    pub const fn values(&self) -> &Values {
        self.values.values()
    }

    #[must_use]
    pub const fn tracked(&self) -> &TrackedValues {
        &self.values
    }

    #[must_use]
    pub fn is_dirty(&self, field: &str) -> bool {
        self.values.is_dirty(field)
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.values.has_changes()
    }

    /// Whether this record may hold only some of its item's fields.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.partial
    }

    #[must_use]
    pub fn into_values(self) -> Values {
        self.values.into_values()
    }

    /// Validate current values against the schema.
    pub fn validate(&self, partial: bool) -> Result<Values, Error> {
        Ok(self.model.schema().validate(self.values.values(), partial)?)
    }

    /// Primary key values of this record.
    #[must_use]
    pub fn key(&self) -> Values {
        self.model
            .table()
            .key_schema()
            .names()
            .filter_map(|name| Some((name.to_string(), self.values.get(name)?.clone())))
            .collect()
    }

    pub fn save(&mut self) -> Result<(), Error> {
        self.save_with(SaveOptions::default())
    }

    /// Validate, then write. A full save puts every present field; a partial
    /// save of a tracked record updates only its dirty fields. Records holding
    /// only some of their item's fields always save partially.
    pub fn save_with(&mut self, options: SaveOptions) -> Result<(), Error> {
        let partial = options.partial || self.partial;
        let validated = self.validate(partial)?;

        if partial && self.values.is_tracking() {
            self.save_partial(&validated, &options)
        } else {
            self.save_full(validated, &options)
        }
    }

    fn save_full(&mut self, validated: Values, options: &SaveOptions) -> Result<(), Error> {
        let table = self.model.table();
        let mut span = Span::new(ExecKind::Put, table.name());

        let mut conditions = Vec::new();
        if options.unique {
            conditions.extend(table.key_schema().names().map(Condition::not_exists));
        }
        conditions.extend(options.conditions.clone());
        let condition = Condition::all(conditions);

        let request = PutItemRequest {
            table_name: table.name().to_string(),
            item: self.model.to_item(&validated)?,
            condition: condition
                .map(|c| self.model.wire_condition(&c))
                .transpose()?,
        };

        match table.store().put_item(request) {
            Ok(()) => {}
            Err(StoreError::ConditionalCheckFailed { .. }) if options.unique => {
                record(MetricsEvent::ConditionalConflict {
                    table: table.name(),
                });
                return Err(Error::HashKeyExists {
                    table: table.name().to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        }
        span.set_rows(1);

        self.values.normalize(validated);
        self.values.clear_all();

        Ok(())
    }

    fn save_partial(&mut self, validated: &Values, options: &SaveOptions) -> Result<(), Error> {
        let dirty: Vec<String> = self.values.dirty().map(str::to_string).collect();
        if dirty.is_empty() {
            tracing::trace!(model = %self.model.name(), "partial save with no changes");
            return Ok(());
        }

        // key fields address the stored item
        let key_schema = self.model.table().key_schema();
        let mut err = ValidationError::new(self.model.schema().name());
        for field in dirty.iter().filter(|f| key_schema.names().any(|k| k == f.as_str())) {
            err.push(field, "key fields cannot be changed by a partial save");
        }
        if !err.is_empty() {
            return Err(err.into());
        }

        let actions: Vec<UpdateAction> = dirty
            .iter()
            .map(|field| match validated.get(field) {
                Some(value) => UpdateAction::Set(field.clone(), value.clone()),
                None => UpdateAction::Remove(field.clone()),
            })
            .collect();

        let return_values = if options.return_all {
            ReturnValues::AllNew
        } else {
            ReturnValues::UpdatedNew
        };

        let key = self.model.key_item(self.values.values())?;
        let echoed = self.model.update_wire(
            key,
            &actions,
            options.conditions.as_ref(),
            return_values,
        )?;

        self.values.clear(dirty.iter().map(String::as_str));
        if let Some(echoed) = echoed {
            self.values.merge(echoed);
        }

        Ok(())
    }

    /// Apply update actions to the stored item and merge the result.
    pub fn update(
        &mut self,
        actions: &[UpdateAction],
        condition: Option<Condition>,
    ) -> Result<(), Error> {
        let key = self.model.key_item(self.values.values())?;
        let echoed = self.model.update_wire(
            key,
            actions,
            condition.as_ref(),
            ReturnValues::UpdatedNew,
        )?;

        let removed = actions.iter().filter_map(|action| match action {
            UpdateAction::Remove(field) => Some((field.clone(), Value::Null)),
            _ => None,
        });
        let mut merged: Values = removed.collect();
        merged.extend(echoed.unwrap_or_default());
        self.values.merge(merged);

        Ok(())
    }

    /// Delete the stored item.
    pub fn delete(self) -> Result<(), Error> {
        self.delete_with(None)
    }

    pub fn delete_with(self, condition: Option<Condition>) -> Result<(), Error> {
        let key = self.model.key_item(self.values.values())?;

        self.model.delete_item(key, condition.as_ref())
    }
}
