use crate::schema::Field;
use indexmap::IndexMap;

///
/// Fragment
///
/// Reusable, named group of fields. Fragments may extend other fragments;
/// flattening applies parents in declaration order (later parents override
/// earlier ones) and then the fragment's own fields on top.
///

#[derive(Clone, Debug)]
pub struct Fragment {
    name: String,
    parents: Vec<Self>,
    fields: IndexMap<String, Field>,
}

impl Fragment {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
            fields: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn extends(mut self, parent: Self) -> Self {
        self.parents.push(parent);
        self
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve the merged field set.
    #[must_use]
    pub fn flatten(&self) -> IndexMap<String, Field> {
        let mut out = IndexMap::new();
        merge_fragments(&mut out, &self.parents);
        merge_fields(&mut out, &self.fields);

        out
    }
}

pub(crate) fn merge_fragments(out: &mut IndexMap<String, Field>, fragments: &[Fragment]) {
    for fragment in fragments {
        merge_fields(out, &fragment.flatten());
    }
}

// An overriding field keeps the position of the first declaration.
pub(crate) fn merge_fields(out: &mut IndexMap<String, Field>, fields: &IndexMap<String, Field>) {
    for (name, field) in fields {
        out.insert(name.clone(), field.clone());
    }
}
