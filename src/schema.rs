/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Runtime schemas for modeled element types.
//!
//! Each XML element type the crate models is described by an
//! [`ElementClass`], which owns a [`Schema`]: the ordered collection of
//! [`Field`] descriptors, the attribute slots, and the type-level validation
//! hook. Schemas are built by explicit composition rather than inheritance;
//! a derived type's builder starts from its base's schema and appends.
//!
//! Schemas can be changed at runtime (custom extended properties are
//! registered this way). Mutation never alters a live [`Schema`]; it builds
//! a new one and swaps it in atomically, so concurrent readers holding a
//! snapshot are unaffected.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, RwLock};

use crate::{
    extended::ExtendedPropertyDef,
    fields::{Field, FieldKind, Value},
    record::{ParseContext, Record},
    version::ExchangeServerVersion,
    xml::{Namespace, XmlElement},
    Error,
};

/// An ordered, name-unique collection of shared field descriptors.
#[derive(Clone, Debug, Default)]
pub struct FieldCollection {
    fields: Vec<Arc<Field>>,
    by_name: HashMap<String, usize>,
}

impl FieldCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Field>> {
        self.fields.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Field>> {
        self.by_name.get(name).map(|&index| &self.fields[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Appends a field, failing if one with the same name is already present.
    pub fn push(&mut self, field: Arc<Field>) -> Result<(), Error> {
        if self.contains(field.name()) {
            return Err(Error::DuplicateField {
                name: field.name().to_owned(),
            });
        }
        self.by_name
            .insert(field.name().to_owned(), self.fields.len());
        self.fields.push(field);
        Ok(())
    }

    /// Inserts a field at `index`, failing on a duplicate name.
    pub fn insert(&mut self, index: usize, field: Arc<Field>) -> Result<(), Error> {
        if self.contains(field.name()) {
            return Err(Error::DuplicateField {
                name: field.name().to_owned(),
            });
        }
        self.fields.insert(index, field);
        self.reindex();
        Ok(())
    }

    /// Removes the named field, returning the detached descriptor.
    pub fn remove(&mut self, name: &str) -> Option<Arc<Field>> {
        let index = self.index_of(name)?;
        let field = self.fields.remove(index);
        self.reindex();
        Some(field)
    }

    /// Returns a new collection holding the given index range.
    pub fn slice(&self, range: Range<usize>) -> FieldCollection {
        let mut sliced = FieldCollection::new();
        for field in &self.fields[range] {
            // Names are unique here, so re-pushing cannot fail.
            let _ = sliced.push(field.clone());
        }
        sliced
    }

    /// Returns the concatenation of `self` and `other`, failing if the two
    /// collections share a field name.
    pub fn concat(&self, other: &FieldCollection) -> Result<FieldCollection, Error> {
        let mut combined = self.clone();
        for field in other.iter() {
            combined.push(field.clone())?;
        }
        Ok(combined)
    }

    fn reindex(&mut self) {
        self.by_name = self
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| (field.name().to_owned(), index))
            .collect();
    }
}

impl<'a> IntoIterator for &'a FieldCollection {
    type Item = &'a Arc<Field>;
    type IntoIter = std::slice::Iter<'a, Arc<Field>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A type-level validation hook run after all per-field cleaning.
pub type PostCleanFn = fn(&mut Record) -> Result<(), Error>;

/// The immutable description of one modeled element type.
///
/// A schema is never modified in place. [`ElementClass`] mutation builds a
/// replacement schema and swaps it in.
#[derive(Clone)]
pub struct Schema {
    element_name: &'static str,
    namespace: Namespace,
    fields: FieldCollection,
    slots: Vec<String>,
    id_field: Option<&'static str>,
    post_clean: Option<PostCleanFn>,
}

impl Schema {
    pub fn builder(element_name: &'static str, namespace: Namespace) -> SchemaBuilder {
        SchemaBuilder {
            element_name,
            namespace,
            fields: FieldCollection::new(),
            slots: Vec::new(),
            id_field: None,
            post_clean: None,
            error: None,
        }
    }

    pub fn element_name(&self) -> &'static str {
        self.element_name
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn fields(&self) -> &FieldCollection {
        &self.fields
    }

    /// The extra attribute names instances accept beyond their fields.
    pub fn slots(&self) -> &[String] {
        &self.slots
    }

    /// The name of the nested field holding this type's id element, if any.
    pub fn id_field(&self) -> Option<&'static str> {
        self.id_field
    }

    pub(crate) fn post_clean(&self) -> Option<PostCleanFn> {
        self.post_clean
    }

    /// Whether `name` is assignable on instances of this type.
    pub fn accepts_attribute(&self, name: &str) -> bool {
        self.fields.contains(name) || self.slots.iter().any(|slot| slot == name)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("element_name", &self.element_name)
            .field("namespace", &self.namespace)
            .field(
                "fields",
                &self
                    .fields
                    .iter()
                    .map(|field| field.name())
                    .collect::<Vec<_>>(),
            )
            .field("slots", &self.slots)
            .field("id_field", &self.id_field)
            .finish()
    }
}

/// Builds a [`Schema`] by composition.
///
/// Field and slot additions are recorded in declaration order; a derived
/// type extends its base's schema first, so base fields precede local ones.
/// Errors (duplicate field names) are deferred to [`SchemaBuilder::build`]
/// to keep declarations chainable.
pub struct SchemaBuilder {
    element_name: &'static str,
    namespace: Namespace,
    fields: FieldCollection,
    slots: Vec<String>,
    id_field: Option<&'static str>,
    post_clean: Option<PostCleanFn>,
    error: Option<Error>,
}

impl SchemaBuilder {
    /// Copies the base schema's fields, slots, id field and validation hook
    /// into this builder.
    pub fn extend(mut self, base: &Schema) -> Self {
        for field in base.fields.iter() {
            self = self.field_arc(field.clone());
        }
        for slot in &base.slots {
            self = self.slot(slot);
        }
        if self.id_field.is_none() {
            self.id_field = base.id_field;
        }
        if self.post_clean.is_none() {
            self.post_clean = base.post_clean;
        }
        self
    }

    pub fn field(self, field: Field) -> Self {
        self.field_arc(field.build())
    }

    pub fn field_arc(mut self, field: Arc<Field>) -> Self {
        if self.error.is_none() {
            if let Err(err) = self.fields.push(field) {
                self.error = Some(err);
            }
        }
        self
    }

    /// Declares an extra assignable attribute. Repeat declarations are
    /// collapsed, keeping the first occurrence's position.
    pub fn slot(mut self, name: &str) -> Self {
        if !self.slots.iter().any(|slot| slot == name) {
            self.slots.push(name.to_owned());
        }
        self
    }

    pub fn id_field(mut self, name: &'static str) -> Self {
        self.id_field = Some(name);
        self
    }

    pub fn validator(mut self, post_clean: PostCleanFn) -> Self {
        self.post_clean = Some(post_clean);
        self
    }

    pub fn build(self) -> Result<Schema, Error> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(Schema {
            element_name: self.element_name,
            namespace: self.namespace,
            fields: self.fields,
            slots: self.slots,
            id_field: self.id_field,
            post_clean: self.post_clean,
        })
    }
}

/// A modeled element type: a name bound to a swappable [`Schema`].
///
/// Instances of the type ([`Record`]s) hold a reference to their class and
/// read the schema through it. Mutation methods replace the schema
/// atomically; records created before a mutation are unaffected until they
/// next read the schema.
pub struct ElementClass {
    name: &'static str,
    schema: RwLock<Arc<Schema>>,
}

impl ElementClass {
    pub fn new(schema: Schema) -> Self {
        ElementClass {
            name: schema.element_name(),
            schema: RwLock::new(Arc::new(schema)),
        }
    }

    /// The XML element name instances of this class serialize as.
    pub fn element_name(&self) -> &'static str {
        self.name
    }

    /// Returns a snapshot of the current schema. The snapshot is immutable
    /// and unaffected by later class mutation.
    pub fn schema(&self) -> Arc<Schema> {
        self.schema
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Looks up a field by name, failing with the class and field names if
    /// it is not declared.
    pub fn field(&self, name: &str) -> Result<Arc<Field>, Error> {
        self.schema()
            .fields()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidField {
                class_name: self.name,
                name: name.to_owned(),
            })
    }

    /// Checks that the named field exists and is available on the given
    /// server version.
    pub fn validate_field(
        &self,
        name: &str,
        version: ExchangeServerVersion,
    ) -> Result<(), Error> {
        let field = self.field(name)?;
        if !field.supports_version(version) {
            let (supported_from, deprecated_from) = field.version_bounds();
            return Err(Error::InvalidFieldForVersion {
                name: name.to_owned(),
                version,
                supported_from,
                deprecated_from,
            });
        }
        Ok(())
    }

    /// The fields of this class available on the given server version, in
    /// declaration order.
    pub fn supported_fields(&self, version: ExchangeServerVersion) -> Vec<Arc<Field>> {
        self.schema()
            .fields()
            .iter()
            .filter(|field| field.supports_version(version))
            .cloned()
            .collect()
    }

    /// Inserts a field after the named anchor field, swapping in the new
    /// schema. Fails if the anchor is unknown or the name is already taken.
    pub fn add_field(&self, field: Field, insert_after: &str) -> Result<(), Error> {
        self.mutate(|schema| {
            let index = schema.fields.index_of(insert_after).ok_or_else(|| {
                Error::InvalidField {
                    class_name: schema.element_name,
                    name: insert_after.to_owned(),
                }
            })?;
            schema.fields.insert(index + 1, field.build())
        })
    }

    /// Removes the named field, swapping in the new schema.
    pub fn remove_field(&self, name: &str) -> Result<Arc<Field>, Error> {
        let mut removed = None;
        self.mutate(|schema| {
            removed = schema.fields.remove(name);
            match removed {
                Some(_) => Ok(()),
                None => Err(Error::InvalidField {
                    class_name: schema.element_name,
                    name: name.to_owned(),
                }),
            }
        })?;
        removed.ok_or_else(|| Error::InvalidField {
            class_name: self.name,
            name: name.to_owned(),
        })
    }

    /// Registers a custom extended property under `attr_name`, appended
    /// after the class's last field.
    ///
    /// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/extendedfielduri>
    pub fn register(&self, attr_name: &str, def: ExtendedPropertyDef) -> Result<(), Error> {
        def.validate()?;
        self.mutate(|schema| schema.fields.push(Field::extended(attr_name, def).build()))
    }

    /// Removes a previously registered extended property. Fails if the named
    /// field is not an extended property.
    pub fn deregister(&self, attr_name: &str) -> Result<(), Error> {
        self.mutate(|schema| {
            let field = schema.fields.get(attr_name).ok_or_else(|| {
                Error::InvalidField {
                    class_name: schema.element_name,
                    name: attr_name.to_owned(),
                }
            })?;
            if !matches!(field.kind(), FieldKind::ExtendedProperty { .. }) {
                return Err(Error::InvalidExtendedProperty(format!(
                    "'{attr_name}' is not a registered extended property"
                )));
            }
            schema.fields.remove(attr_name);
            Ok(())
        })
    }

    /// Creates an instance from name/value pairs.
    ///
    /// All names must be fields or slots of this class; unknown names are
    /// collected and reported together.
    pub fn create(
        &'static self,
        pairs: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> Result<Record, Error> {
        Record::from_pairs(self, pairs)
    }

    /// Creates an empty instance.
    pub fn empty(&'static self) -> Record {
        Record::empty(self)
    }

    /// Builds an instance from a parsed XML element, consuming it.
    ///
    /// The element's tag must match this class's element name. Child
    /// elements claimed by fields are detached as they are read so their
    /// memory is released eagerly; unclaimed children are ignored.
    pub fn from_xml(
        &'static self,
        mut elem: XmlElement,
        ctx: &ParseContext,
    ) -> Result<Record, Error> {
        if elem.name() != self.name {
            return Err(Error::UnexpectedElement {
                expected: self.name,
                found: elem.name().to_owned(),
            });
        }

        let schema = self.schema();
        let mut record = Record::empty(self);
        for field in schema.fields() {
            if let Some(value) = field.extract(&mut elem, ctx)? {
                record.set_raw(field.name(), value);
            }
        }
        Ok(record)
    }

    /// Applies `mutation` to a copy of the current schema and swaps the
    /// result in. The write lock is held across the copy so concurrent
    /// mutations serialize.
    fn mutate(&self, mutation: impl FnOnce(&mut Schema) -> Result<(), Error>) -> Result<(), Error> {
        let mut guard = self
            .schema
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut next = Schema::clone(&guard);
        mutation(&mut next)?;
        *guard = Arc::new(next);
        Ok(())
    }
}

impl fmt::Debug for ElementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ElementClass").field(&self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::{ElementClass, Schema};
    use crate::{fields::Field, xml::Namespace, Error};

    fn base_schema() -> Schema {
        Schema::builder("Base", Namespace::Types)
            .field(Field::text("first", "First"))
            .field(Field::text("second", "Second"))
            .build()
            .expect("base schema is valid")
    }

    #[test]
    fn extension_preserves_declaration_order() {
        let base = base_schema();
        let derived = Schema::builder("Derived", Namespace::Types)
            .extend(&base)
            .field(Field::text("third", "Third"))
            .build()
            .expect("derived schema is valid");

        let names: Vec<_> = derived.fields().iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            ["first", "second", "third"],
            "base fields should precede local fields in declaration order"
        );
    }

    #[test]
    fn duplicate_field_names_are_rejected_at_build() {
        let base = base_schema();
        let err = Schema::builder("Derived", Namespace::Types)
            .extend(&base)
            .field(Field::int("first", "First"))
            .build()
            .expect_err("shadowing a base field should fail");
        assert!(
            matches!(err, Error::DuplicateField { ref name } if name == "first"),
            "error should name the duplicate, got: {err:?}"
        );
    }

    #[test]
    fn add_field_inserts_after_anchor_and_remove_field_detaches() {
        let class = ElementClass::new(base_schema());

        class
            .add_field(Field::text("inserted", "Inserted"), "first")
            .expect("insertion after a known anchor should succeed");
        let names: Vec<_> = class
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_owned())
            .collect();
        assert_eq!(names, ["first", "inserted", "second"]);

        let removed = class
            .remove_field("inserted")
            .expect("removal of a known field should succeed");
        assert_eq!(removed.name(), "inserted");
        assert!(!class.schema().fields().contains("inserted"));

        let err = class
            .add_field(Field::text("other", "Other"), "missing")
            .expect_err("an unknown anchor should fail");
        assert!(matches!(err, Error::InvalidField { .. }));
    }

    #[test]
    fn schema_snapshots_are_unaffected_by_later_mutation() {
        let class = ElementClass::new(base_schema());
        let snapshot = class.schema();

        class
            .add_field(Field::text("added", "Added"), "second")
            .expect("insertion should succeed");

        assert!(
            !snapshot.fields().contains("added"),
            "a snapshot taken before mutation should not see the new field"
        );
        assert!(class.schema().fields().contains("added"));
    }

    #[test]
    fn create_reports_all_unknown_names_at_once() {
        static CLASS: LazyLock<ElementClass> = LazyLock::new(|| {
            ElementClass::new(
                Schema::builder("Thing", Namespace::Types)
                    .field(Field::text("known", "Known"))
                    .build()
                    .expect("schema is valid"),
            )
        });

        let err = CLASS
            .create([
                ("known", "ok".into()),
                ("bogus", "x".into()),
                ("other", "y".into()),
            ])
            .expect_err("unknown names should be rejected");
        match err {
            Error::InvalidKeywordArguments { class_name, names } => {
                assert_eq!(class_name, "Thing");
                assert!(
                    names.contains("bogus") && names.contains("other"),
                    "all offending names should be listed, got: {names}"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
