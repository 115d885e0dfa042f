/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Runtime instances of modeled element types.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use time::UtcOffset;

use crate::{
    fields::{FieldKind, Value},
    schema::ElementClass,
    version::ExchangeServerVersion,
    xml::XmlElement,
    Error,
};

/// Ambient context for parsing values out of XML.
///
/// Exchange omits the UTC offset from some datetime values; `default_offset`
/// supplies the offset to assume for them (UTC if unset). `version` is the
/// server version the document came from, where known.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParseContext {
    pub version: Option<ExchangeServerVersion>,
    pub default_offset: Option<UtcOffset>,
}

/// An instance of a modeled element type.
///
/// A record stores values keyed by field name and reads its structure from
/// its class's current schema. Assignment is disciplined: only declared
/// fields, declared slots, and the `id`/`changekey` conveniences of
/// id-bearing types are assignable.
#[derive(Clone, Debug)]
pub struct Record {
    class: &'static ElementClass,
    values: HashMap<String, Value>,
}

impl Record {
    pub(crate) fn empty(class: &'static ElementClass) -> Self {
        Record {
            class,
            values: HashMap::new(),
        }
    }

    pub(crate) fn from_pairs(
        class: &'static ElementClass,
        pairs: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> Result<Self, Error> {
        let mut record = Record::empty(class);
        let mut unknown = Vec::new();
        for (name, value) in pairs {
            match record.set(name, value) {
                Ok(()) => {}
                Err(Error::InvalidAttribute { .. }) => unknown.push(name),
                Err(other) => return Err(other),
            }
        }

        if !unknown.is_empty() {
            return Err(Error::InvalidKeywordArguments {
                class_name: class.element_name(),
                names: unknown.join(", "),
            });
        }
        Ok(record)
    }

    pub fn class(&self) -> &'static ElementClass {
        self.class
    }

    /// Returns the stored value for a field or slot, if set.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Assigns a value to a field or slot.
    ///
    /// Names that are neither fields nor slots of the class are rejected
    /// with [`Error::InvalidAttribute`]; misspelled assignments fail rather
    /// than silently storing dead data. On id-bearing types, `id` and
    /// `changekey` assign through to the nested id element.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), Error> {
        let schema = self.class.schema();
        if schema.accepts_attribute(name) {
            self.values.insert(name.to_owned(), value.into());
            return Ok(());
        }

        if name == "id" || name == "changekey" {
            if let Some(id_field_name) = schema.id_field() {
                return self.set_on_id_element(id_field_name, name, value.into());
            }
        }

        Err(Error::InvalidAttribute {
            class_name: self.class.element_name(),
            name: name.to_owned(),
        })
    }

    /// Removes and returns the stored value for a field or slot.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Stores a value without the assignment discipline. Used when reading
    /// from XML, where names come from the schema itself.
    pub(crate) fn set_raw(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_owned(), value);
    }

    /// The Exchange identifier of this record, if present.
    ///
    /// For types whose schema names an id field, this reads through to the
    /// nested id element; for the id element types themselves it reads the
    /// local `id` field.
    pub fn id(&self) -> Option<&str> {
        self.id_component("id")
    }

    /// The change key of this record, if present.
    pub fn changekey(&self) -> Option<&str> {
        self.id_component("changekey")
    }

    fn id_component(&self, name: &str) -> Option<&str> {
        match self.class.schema().id_field() {
            Some(id_field_name) => self
                .values
                .get(id_field_name)?
                .as_element()?
                .get(name)?
                .as_text(),
            None => self.values.get(name)?.as_text(),
        }
    }

    fn set_on_id_element(
        &mut self,
        id_field_name: &str,
        name: &str,
        value: Value,
    ) -> Result<(), Error> {
        let field = self.class.field(id_field_name)?;
        let FieldKind::Element { classes } = field.kind() else {
            return Err(Error::InvalidAttribute {
                class_name: self.class.element_name(),
                name: name.to_owned(),
            });
        };
        let Some(&id_class) = classes.first() else {
            return Err(Error::InvalidAttribute {
                class_name: self.class.element_name(),
                name: name.to_owned(),
            });
        };

        let mut id_record = match self.values.remove(id_field_name) {
            Some(Value::Element(record)) => record,
            _ => Record::empty(id_class),
        };
        id_record.set(name, value)?;
        self.values
            .insert(id_field_name.to_owned(), Value::Element(id_record));
        Ok(())
    }

    /// Validates and normalizes every field value in declaration order, then
    /// runs the type-level validation hook.
    ///
    /// Fields unavailable on `version` are an error if a value is set on
    /// them and are skipped otherwise, so records touching only supported
    /// fields clean successfully against any version. A rejected value is
    /// left in place so the caller can inspect or correct it.
    pub fn clean(&mut self, version: Option<ExchangeServerVersion>) -> Result<(), Error> {
        let schema = self.class.schema();
        for field in schema.fields() {
            if let Some(version) = version {
                if !field.supports_version(version) {
                    if self.values.contains_key(field.name()) {
                        let (supported_from, deprecated_from) = field.version_bounds();
                        return Err(Error::InvalidFieldForVersion {
                            name: field.name().to_owned(),
                            version,
                            supported_from,
                            deprecated_from,
                        });
                    }
                    continue;
                }
            }

            // Entries are only written back once cleaning succeeds.
            let current = self.values.get(field.name()).cloned();
            if let Some(value) = field.clean(current, version)? {
                self.values.insert(field.name().to_owned(), value);
            }
        }

        if let Some(post_clean) = schema.post_clean() {
            post_clean(self)?;
        }
        Ok(())
    }

    /// Cleans this record and serializes it to an XML element.
    ///
    /// Fields are written in declaration order. Read-only fields, fields
    /// unavailable on `version`, unset fields and empty lists are omitted
    /// entirely rather than written as empty elements.
    pub fn to_xml(
        &mut self,
        version: Option<ExchangeServerVersion>,
    ) -> Result<XmlElement, Error> {
        self.clean(version)?;
        self.serialize(version)
    }

    /// Serializes an already-cleaned record. Nested elements are written
    /// through this to avoid re-validating the whole tree.
    pub(crate) fn to_xml_cleaned(&self) -> Result<XmlElement, Error> {
        self.serialize(None)
    }

    fn serialize(&self, version: Option<ExchangeServerVersion>) -> Result<XmlElement, Error> {
        let schema = self.class.schema();
        let mut elem = XmlElement::new(schema.element_name(), schema.namespace());

        for field in schema.fields() {
            if field.is_read_only() {
                continue;
            }
            if let Some(version) = version {
                if !field.supports_version(version) {
                    continue;
                }
            }
            let Some(value) = self.values.get(field.name()) else {
                continue;
            };
            if value.is_empty_list() {
                continue;
            }

            if field.is_attribute() {
                field.write_attribute(&mut elem, value)?;
            } else {
                field.append_children(&mut elem, value)?;
            }
        }

        Ok(elem)
    }
}

/// Records of id-bearing types compare by identity when both sides carry an
/// Exchange id; everything else compares field values structurally.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        if !std::ptr::eq(self.class, other.class) {
            return false;
        }
        if let (Some(self_id), Some(other_id)) = (self.id(), other.id()) {
            return self_id == other_id && self.changekey() == other.changekey();
        }
        self.values == other.values
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.class.element_name().hash(state);
        if let Some(id) = self.id() {
            id.hash(state);
            self.changekey().hash(state);
            return;
        }

        // Field values live in a hash map; sort for a stable digest.
        let mut entries: Vec<_> = self.values.iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::sync::LazyLock;

    use super::Record;
    use crate::{
        fields::{Field, Value},
        schema::{ElementClass, Schema},
        version::ExchangeServerVersion,
        xml::Namespace,
        Error,
    };

    static ID: LazyLock<ElementClass> = LazyLock::new(|| {
        ElementClass::new(
            Schema::builder("ThingId", Namespace::Types)
                .field(Field::id("id", "Id"))
                .field(Field::id("changekey", "ChangeKey"))
                .build()
                .expect("id schema is valid"),
        )
    });

    static THING: LazyLock<ElementClass> = LazyLock::new(|| {
        ElementClass::new(
            Schema::builder("Thing", Namespace::Types)
                .field(Field::element("thing_id", vec![&*ID]).read_only())
                .field(Field::text("subject", "Subject"))
                .field(Field::text("body", "Body"))
                .field(
                    Field::text("flag", "Flag")
                        .supported_from(ExchangeServerVersion::Exchange2013),
                )
                .field(Field::int("size", "Size").read_only())
                .id_field("thing_id")
                .build()
                .expect("thing schema is valid"),
        )
    });

    static UNKEYED: LazyLock<ElementClass> = LazyLock::new(|| {
        ElementClass::new(
            Schema::builder("Unkeyed", Namespace::Types)
                .field(Field::element("thing_id", Vec::new()))
                .field(Field::text("subject", "Subject"))
                .id_field("thing_id")
                .build()
                .expect("unkeyed schema is valid"),
        )
    });

    fn hash_of(record: &Record) -> u64 {
        let mut hasher = DefaultHasher::new();
        record.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn unknown_attribute_assignment_is_rejected() {
        let mut record = THING.empty();
        let err = record
            .set("subjcet", "typo")
            .expect_err("a misspelled field name should be rejected");
        assert!(
            matches!(err, Error::InvalidAttribute { ref name, .. } if name == "subjcet"),
            "error should name the offending attribute, got: {err:?}"
        );
    }

    #[test]
    fn id_and_changekey_assign_through_to_the_nested_id_element() {
        let mut record = THING.empty();
        record.set("id", "AAMk").expect("id should be assignable");
        record
            .set("changekey", "CQAA")
            .expect("changekey should be assignable");

        assert_eq!(record.id(), Some("AAMk"));
        assert_eq!(record.changekey(), Some("CQAA"));

        let nested = record
            .get("thing_id")
            .and_then(Value::as_element)
            .expect("the nested id element should have been created");
        assert_eq!(nested.get("id").and_then(Value::as_text), Some("AAMk"));
    }

    #[test]
    fn serialization_follows_declaration_order_and_omits_unset_fields() {
        let mut record = THING
            .create([("body", "b".into()), ("subject", "a".into())])
            .expect("creation should succeed");

        let xml = record
            .to_xml(None)
            .expect("serialization should succeed")
            .to_xml_string()
            .expect("writing should succeed");
        assert_eq!(
            xml, "<t:Thing><t:Subject>a</t:Subject><t:Body>b</t:Body></t:Thing>",
            "subject must precede body regardless of assignment order, \
             and unset fields must be omitted"
        );
    }

    #[test]
    fn read_only_fields_are_not_serialized() {
        let mut record = THING.empty();
        record.set("id", "AAMk").expect("id should be assignable");
        record.set("size", 512).expect("size should be assignable");
        record
            .set("subject", "s")
            .expect("subject should be assignable");

        let xml = record
            .to_xml(None)
            .expect("serialization should succeed")
            .to_xml_string()
            .expect("writing should succeed");
        assert_eq!(
            xml, "<t:Thing><t:Subject>s</t:Subject></t:Thing>",
            "read-only fields should be omitted from output"
        );
    }

    #[test]
    fn clean_rejects_set_values_on_unsupported_fields_and_skips_unset_ones() {
        let mut record = THING.empty();
        record.set("subject", "s").expect("assignment should succeed");

        // "flag" is unset, so cleaning against an old version passes.
        record
            .clean(Some(ExchangeServerVersion::Exchange2010))
            .expect("unset unsupported fields should be skipped");

        record.set("flag", "f").expect("assignment should succeed");
        let err = record
            .clean(Some(ExchangeServerVersion::Exchange2010))
            .expect_err("a set value on an unsupported field should be rejected");
        assert!(
            matches!(err, Error::InvalidFieldForVersion { ref name, .. } if name == "flag"),
            "error should name the field, got: {err:?}"
        );
        assert_eq!(
            record.get("flag").and_then(Value::as_text),
            Some("f"),
            "a failed clean should leave the offending value in place"
        );

        record
            .clean(Some(ExchangeServerVersion::Exchange2013))
            .expect("the field is supported from Exchange 2013");
    }

    #[test]
    fn failed_clean_leaves_values_in_place() {
        let mut record = THING.empty();
        record.set("subject", 5).expect("assignment should succeed");

        record
            .clean(None)
            .expect_err("a mistyped value should be rejected");
        assert_eq!(
            record.get("subject").and_then(Value::as_int),
            Some(5),
            "the rejected value should survive for the caller to correct"
        );
    }

    #[test]
    fn id_assignment_without_an_id_class_is_rejected() {
        let mut record = UNKEYED.empty();
        let err = record
            .set("id", "AAMk")
            .expect_err("an id field with no element class cannot hold an id");
        assert!(
            matches!(err, Error::InvalidAttribute { ref name, .. } if name == "id"),
            "error should name the offending attribute, got: {err:?}"
        );
    }

    #[test]
    fn records_with_ids_compare_by_identity() {
        let mut a = THING.empty();
        a.set("id", "AAMk").expect("id should be assignable");
        a.set("subject", "draft").expect("assignment should succeed");

        let mut b = THING.empty();
        b.set("id", "AAMk").expect("id should be assignable");
        b.set("subject", "final").expect("assignment should succeed");

        assert_eq!(a, b, "same id should mean the same record");
        assert_eq!(hash_of(&a), hash_of(&b), "equal records should hash alike");

        b.set("id", "BBMk").expect("id should be assignable");
        assert_ne!(a, b, "different ids should mean different records");
    }

    #[test]
    fn records_without_ids_compare_structurally() {
        let a = THING
            .create([("subject", "x".into())])
            .expect("creation should succeed");
        let b = THING
            .create([("subject", "x".into())])
            .expect("creation should succeed");
        let c = THING
            .create([("subject", "y".into())])
            .expect("creation should succeed");

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b), "equal records should hash alike");
        assert_ne!(a, c);
    }
}
