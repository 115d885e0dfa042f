/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Typed field descriptors.
//!
//! A [`Field`] describes one XML attribute or child element of a modeled
//! element type: its semantic kind, wire name, cardinality, lifecycle flags
//! and version bounds. Fields are immutable once constructed and are shared
//! between schemas as [`Arc<Field>`]; the same descriptor backs every
//! instance of every type that declares it.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use time::{
    format_description::well_known::Iso8601, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime, UtcOffset,
};

use crate::{
    extended::ExtendedPropertyDef,
    record::{ParseContext, Record},
    schema::ElementClass,
    version::ExchangeServerVersion,
    xml::{Namespace, XmlElement},
    Error,
};

/// The weekdays valid in recurrence patterns, 1-based per ISO 8601, extended
/// with the EWS day-set pseudo-weekdays.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/daysofweek-daysofweektype>
pub const WEEKDAYS: &[&str] = &[
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
    "Day",
    "Weekday",
    "WeekendDay",
];

/// The week-of-month indices valid in relative recurrence patterns, 1-based.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/dayofweekindex>
pub const WEEK_NUMBERS: &[&str] = &["First", "Second", "Third", "Fourth", "Last"];

/// The months of the year, 1-based.
pub const MONTHS: &[&str] = &[
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A runtime value held by a field slot on a [`Record`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(OffsetDateTime),
    Date(Date),
    List(Vec<Value>),
    Element(Record),
}

impl Value {
    pub fn list(values: impl IntoIterator<Item = Value>) -> Self {
        Value::List(values.into_iter().collect())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<OffsetDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Date> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&Record> {
        match self {
            Value::Element(record) => Some(record),
            _ => None,
        }
    }

    /// Whether this value is treated as unset for serialization purposes.
    ///
    /// An empty list is encoded by omission, exactly like a missing value.
    pub(crate) fn is_empty_list(&self) -> bool {
        matches!(self, Value::List(values) if values.is_empty())
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Text(_) => "Text",
            Value::Bytes(_) => "Bytes",
            Value::DateTime(_) => "DateTime",
            Value::Date(_) => "Date",
            Value::List(_) => "List",
            Value::Element(_) => "Element",
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Text(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::DateTime(dt) => dt.unix_timestamp_nanos().hash(state),
            Value::Date(d) => d.to_julian_day().hash(state),
            Value::List(values) => values.hash(state),
            Value::Element(record) => record.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl From<Date> for Value {
    fn from(value: Date) -> Self {
        Value::Date(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Element(value)
    }
}

/// One permitted value of a choice field.
///
/// Individual choices may be gated on a server version, independently of the
/// field that carries them; e.g. the `GroupMailbox` mailbox type only exists
/// from Exchange 2013 on.
#[derive(Clone, Debug)]
pub struct Choice {
    value: &'static str,
    supported_from: Option<ExchangeServerVersion>,
    deprecated_from: Option<ExchangeServerVersion>,
}

impl Choice {
    pub fn new(value: &'static str) -> Self {
        Choice {
            value,
            supported_from: None,
            deprecated_from: None,
        }
    }

    pub fn supported_from(mut self, version: ExchangeServerVersion) -> Self {
        self.supported_from = Some(version);
        self
    }

    pub fn deprecated_from(mut self, version: ExchangeServerVersion) -> Self {
        self.deprecated_from = Some(version);
        self
    }

    pub fn value(&self) -> &'static str {
        self.value
    }

    pub fn supports_version(&self, version: ExchangeServerVersion) -> bool {
        self.supported_from.map_or(true, |from| version >= from)
            && self.deprecated_from.map_or(true, |until| version < until)
    }
}

/// The semantic kind of a field, carrying the kind-specific validation
/// parameters.
#[derive(Clone, Debug)]
pub enum FieldKind {
    Bool,
    Int {
        min: Option<i64>,
        max: Option<i64>,
    },
    Text {
        max_length: Option<usize>,
    },
    /// An opaque Exchange-generated identifier, e.g. an item or change key.
    Id,
    Base64,
    DateTime,
    Date,
    Choice {
        choices: Vec<Choice>,
    },
    /// A 1-based index into a label table, serialized as the label.
    Enum {
        labels: &'static [&'static str],
    },
    /// A list of 1-based indices, serialized space-separated.
    EnumList {
        labels: &'static [&'static str],
    },
    /// A list of strings, serialized as a container of `String` elements.
    TextList,
    /// A nested element. Multiple classes express a polymorphic slot; the
    /// child tag identifies which class applies.
    Element {
        classes: Vec<&'static ElementClass>,
    },
    /// A container element wrapping a list of nested elements.
    ElementList {
        classes: Vec<&'static ElementClass>,
    },
    /// A custom MAPI property, dynamically registered.
    ExtendedProperty {
        def: ExtendedPropertyDef,
    },
}

/// A typed descriptor for one XML attribute or child element of a modeled
/// type.
#[derive(Clone, Debug)]
pub struct Field {
    name: String,
    field_uri: String,
    kind: FieldKind,
    namespace: Namespace,
    is_attribute: bool,
    is_required: bool,
    is_required_after_save: bool,
    is_read_only: bool,
    is_read_only_after_send: bool,
    is_searchable: bool,
    default: Option<Value>,
    supported_from: Option<ExchangeServerVersion>,
    deprecated_from: Option<ExchangeServerVersion>,
}

impl Field {
    fn new(name: &str, field_uri: &str, kind: FieldKind) -> Self {
        Field {
            name: name.to_owned(),
            field_uri: field_uri.to_owned(),
            kind,
            namespace: Namespace::Types,
            is_attribute: false,
            is_required: false,
            is_required_after_save: false,
            is_read_only: false,
            is_read_only_after_send: false,
            is_searchable: true,
            default: None,
            supported_from: None,
            deprecated_from: None,
        }
    }

    pub fn bool(name: &str, field_uri: &str) -> Self {
        Field::new(name, field_uri, FieldKind::Bool)
    }

    pub fn int(name: &str, field_uri: &str) -> Self {
        Field::new(
            name,
            field_uri,
            FieldKind::Int {
                min: None,
                max: None,
            },
        )
    }

    pub fn text(name: &str, field_uri: &str) -> Self {
        Field::new(name, field_uri, FieldKind::Text { max_length: None })
    }

    /// A string field limited to a single line of at most 255 characters,
    /// Exchange's limit for most short text properties.
    pub fn char(name: &str, field_uri: &str) -> Self {
        Field::new(
            name,
            field_uri,
            FieldKind::Text {
                max_length: Some(255),
            },
        )
    }

    /// An Exchange-generated identifier. Id fields are XML attributes.
    pub fn id(name: &str, field_uri: &str) -> Self {
        let mut field = Field::new(name, field_uri, FieldKind::Id);
        field.is_attribute = true;
        field
    }

    pub fn base64(name: &str, field_uri: &str) -> Self {
        Field::new(name, field_uri, FieldKind::Base64)
    }

    pub fn datetime(name: &str, field_uri: &str) -> Self {
        Field::new(name, field_uri, FieldKind::DateTime)
    }

    pub fn date(name: &str, field_uri: &str) -> Self {
        Field::new(name, field_uri, FieldKind::Date)
    }

    pub fn choice(name: &str, field_uri: &str, choices: Vec<Choice>) -> Self {
        Field::new(name, field_uri, FieldKind::Choice { choices })
    }

    pub fn enumeration(name: &str, field_uri: &str, labels: &'static [&'static str]) -> Self {
        Field::new(name, field_uri, FieldKind::Enum { labels })
    }

    pub fn enum_list(name: &str, field_uri: &str, labels: &'static [&'static str]) -> Self {
        Field::new(name, field_uri, FieldKind::EnumList { labels })
    }

    pub fn text_list(name: &str, field_uri: &str) -> Self {
        Field::new(name, field_uri, FieldKind::TextList)
    }

    /// A nested element field. The child element's tag is the element name of
    /// whichever of `classes` the value belongs to, not `field_uri`.
    pub fn element(name: &str, classes: Vec<&'static ElementClass>) -> Self {
        Field::new(name, "", FieldKind::Element { classes })
    }

    /// A nested element wrapped in a container named `field_uri`, e.g. a
    /// message's `Sender` element wrapping a `Mailbox`.
    pub fn wrapped_element(
        name: &str,
        field_uri: &str,
        classes: Vec<&'static ElementClass>,
    ) -> Self {
        Field::new(name, field_uri, FieldKind::Element { classes })
    }

    /// A list of nested elements, wrapped in a container element named
    /// `field_uri`.
    pub fn element_list(
        name: &str,
        field_uri: &str,
        classes: Vec<&'static ElementClass>,
    ) -> Self {
        Field::new(name, field_uri, FieldKind::ElementList { classes })
    }

    pub fn extended(name: &str, def: ExtendedPropertyDef) -> Self {
        Field::new(name, "ExtendedProperty", FieldKind::ExtendedProperty { def })
    }

    pub fn attribute(mut self) -> Self {
        self.is_attribute = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn required_after_save(mut self) -> Self {
        self.is_required_after_save = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.is_read_only = true;
        self
    }

    pub fn read_only_after_send(mut self) -> Self {
        self.is_read_only_after_send = true;
        self
    }

    pub fn unsearchable(mut self) -> Self {
        self.is_searchable = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Sets the lower bound of an integer field. No-op for other kinds.
    pub fn with_min(mut self, value: i64) -> Self {
        if let FieldKind::Int { min, .. } = &mut self.kind {
            *min = Some(value);
        }
        self
    }

    /// Sets the upper bound of an integer field. No-op for other kinds.
    pub fn with_max(mut self, value: i64) -> Self {
        if let FieldKind::Int { max, .. } = &mut self.kind {
            *max = Some(value);
        }
        self
    }

    /// Sets the maximum length of a text field. No-op for other kinds.
    pub fn with_max_length(mut self, value: usize) -> Self {
        if let FieldKind::Text { max_length } = &mut self.kind {
            *max_length = Some(value);
        }
        self
    }

    pub fn supported_from(mut self, version: ExchangeServerVersion) -> Self {
        self.supported_from = Some(version);
        self
    }

    pub fn deprecated_from(mut self, version: ExchangeServerVersion) -> Self {
        self.deprecated_from = Some(version);
        self
    }

    pub fn in_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Finalizes this field for attachment to a schema.
    pub fn build(self) -> Arc<Field> {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_uri(&self) -> &str {
        &self.field_uri
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn is_attribute(&self) -> bool {
        self.is_attribute
    }

    pub fn is_required(&self) -> bool {
        self.is_required
    }

    pub fn is_required_after_save(&self) -> bool {
        self.is_required_after_save
    }

    pub fn is_read_only(&self) -> bool {
        self.is_read_only
    }

    pub fn is_read_only_after_send(&self) -> bool {
        self.is_read_only_after_send
    }

    pub fn is_searchable(&self) -> bool {
        self.is_searchable
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn supported_from_version(&self) -> Option<ExchangeServerVersion> {
        self.supported_from
    }

    pub fn deprecated_from_version(&self) -> Option<ExchangeServerVersion> {
        self.deprecated_from
    }

    pub fn is_list(&self) -> bool {
        match &self.kind {
            FieldKind::EnumList { .. } | FieldKind::TextList | FieldKind::ElementList { .. } => {
                true
            }
            FieldKind::ExtendedProperty { def } => def.is_array(),
            _ => false,
        }
    }

    pub fn is_extended_property(&self) -> bool {
        matches!(self.kind, FieldKind::ExtendedProperty { .. })
    }

    pub fn supports_version(&self, version: ExchangeServerVersion) -> bool {
        self.supported_from.map_or(true, |from| version >= from)
            && self.deprecated_from.map_or(true, |until| version < until)
    }

    pub(crate) fn version_bounds(&self) -> (String, String) {
        let fmt = |bound: Option<ExchangeServerVersion>| match bound {
            Some(version) => version.to_string(),
            None => "(always)".to_owned(),
        };
        (fmt(self.supported_from), fmt(self.deprecated_from))
    }

    /// Validates and normalizes a value for this field.
    ///
    /// A missing value is substituted with the field's default; a missing
    /// value on a required field without a default is an error. All other
    /// validation is kind-specific. Returns the cleaned value.
    pub fn clean(
        &self,
        value: Option<Value>,
        version: Option<ExchangeServerVersion>,
    ) -> Result<Option<Value>, Error> {
        let value = match value {
            Some(value) => value,
            None => match &self.default {
                Some(default) => default.clone(),
                None if self.is_required => {
                    return Err(Error::MissingRequiredField {
                        name: self.name.clone(),
                    });
                }
                None => return Ok(None),
            },
        };

        self.clean_value(value, version).map(Some)
    }

    fn clean_value(
        &self,
        value: Value,
        version: Option<ExchangeServerVersion>,
    ) -> Result<Value, Error> {
        match &self.kind {
            FieldKind::Bool => match value {
                Value::Bool(_) => Ok(value),
                other => Err(self.unexpected_type(&other, "Bool")),
            },

            FieldKind::Int { min, max } => match value {
                Value::Int(i) => {
                    if min.map_or(false, |min| i < min) || max.map_or(false, |max| i > max) {
                        return Err(Error::ValueOutOfRange {
                            name: self.name.clone(),
                            value: i,
                            min: min.unwrap_or(i64::MIN),
                            max: max.unwrap_or(i64::MAX),
                        });
                    }
                    Ok(Value::Int(i))
                }
                other => Err(self.unexpected_type(&other, "Int")),
            },

            FieldKind::Text { max_length } => match value {
                Value::Text(s) => {
                    if let Some(max_length) = max_length {
                        if s.chars().count() > *max_length {
                            return Err(Error::ValueTooLong {
                                name: self.name.clone(),
                                max_length: *max_length,
                            });
                        }
                    }
                    Ok(Value::Text(s))
                }
                other => Err(self.unexpected_type(&other, "Text")),
            },

            FieldKind::Id => match value {
                Value::Text(_) => Ok(value),
                other => Err(self.unexpected_type(&other, "Text")),
            },

            FieldKind::Base64 => match value {
                Value::Bytes(_) => Ok(value),
                other => Err(self.unexpected_type(&other, "Bytes")),
            },

            FieldKind::DateTime => match value {
                Value::DateTime(_) => Ok(value),
                other => Err(self.unexpected_type(&other, "DateTime")),
            },

            FieldKind::Date => match value {
                Value::Date(_) => Ok(value),
                other => Err(self.unexpected_type(&other, "Date")),
            },

            FieldKind::Choice { choices } => match value {
                Value::Text(s) => {
                    let choice = choices.iter().find(|c| c.value() == s).ok_or_else(|| {
                        Error::InvalidChoice {
                            name: self.name.clone(),
                            value: s.clone(),
                            choices: choices
                                .iter()
                                .map(Choice::value)
                                .collect::<Vec<_>>()
                                .join(", "),
                        }
                    })?;
                    if let Some(version) = version {
                        if !choice.supports_version(version) {
                            return Err(Error::InvalidChoiceForVersion {
                                name: self.name.clone(),
                                value: s.clone(),
                                version,
                            });
                        }
                    }
                    Ok(Value::Text(s))
                }
                other => Err(self.unexpected_type(&other, "Text")),
            },

            FieldKind::Enum { labels } => self.clean_enum_entry(value, labels),

            FieldKind::EnumList { labels } => match value {
                Value::List(values) => {
                    if values.is_empty() {
                        return Err(Error::EmptyList {
                            name: self.name.clone(),
                        });
                    }
                    let mut cleaned = Vec::with_capacity(values.len());
                    for entry in values {
                        let entry = self.clean_enum_entry(entry, labels)?;
                        if cleaned.contains(&entry) {
                            return Err(Error::DuplicateListEntries {
                                name: self.name.clone(),
                            });
                        }
                        cleaned.push(entry);
                    }
                    Ok(Value::List(cleaned))
                }
                other => Err(self.unexpected_type(&other, "List")),
            },

            FieldKind::TextList => match value {
                Value::List(values) => {
                    for entry in &values {
                        if !matches!(entry, Value::Text(_)) {
                            return Err(self.unexpected_type(entry, "Text"));
                        }
                    }
                    Ok(Value::List(values))
                }
                other => Err(self.unexpected_type(&other, "List")),
            },

            FieldKind::Element { classes } => match value {
                Value::Element(mut record) => {
                    self.check_element_class(&record, classes)?;
                    record.clean(version)?;
                    Ok(Value::Element(record))
                }
                other => Err(self.unexpected_type(&other, "Element")),
            },

            FieldKind::ElementList { classes } => match value {
                Value::List(values) => {
                    let mut cleaned = Vec::with_capacity(values.len());
                    for entry in values {
                        match entry {
                            Value::Element(mut record) => {
                                self.check_element_class(&record, classes)?;
                                record.clean(version)?;
                                cleaned.push(Value::Element(record));
                            }
                            other => return Err(self.unexpected_type(&other, "Element")),
                        }
                    }
                    Ok(Value::List(cleaned))
                }
                other => Err(self.unexpected_type(&other, "List")),
            },

            FieldKind::ExtendedProperty { def } => def.clean_value(&self.name, value),
        }
    }

    fn clean_enum_entry(
        &self,
        value: Value,
        labels: &'static [&'static str],
    ) -> Result<Value, Error> {
        match value {
            Value::Int(i) => {
                if i < 1 || i as usize > labels.len() {
                    return Err(Error::ValueOutOfRange {
                        name: self.name.clone(),
                        value: i,
                        min: 1,
                        max: labels.len() as i64,
                    });
                }
                Ok(Value::Int(i))
            }
            // Accept a label and normalize it to its 1-based index.
            Value::Text(s) => match labels.iter().position(|label| *label == s) {
                Some(index) => Ok(Value::Int(index as i64 + 1)),
                None => Err(Error::InvalidChoice {
                    name: self.name.clone(),
                    value: s,
                    choices: labels.join(", "),
                }),
            },
            other => Err(self.unexpected_type(&other, "Int")),
        }
    }

    fn check_element_class(
        &self,
        record: &Record,
        classes: &[&'static ElementClass],
    ) -> Result<(), Error> {
        if classes
            .iter()
            .any(|class| std::ptr::eq(*class, record.class()))
        {
            Ok(())
        } else {
            Err(Error::UnexpectedValueType {
                name: self.name.clone(),
                expected: "an element of a permitted class",
                found: record.class().element_name(),
            })
        }
    }

    fn unexpected_type(&self, value: &Value, expected: &'static str) -> Error {
        Error::UnexpectedValueType {
            name: self.name.clone(),
            expected,
            found: value.kind_name(),
        }
    }

    /// Converts a cleaned value to XML attribute/text form.
    pub(crate) fn value_to_xml_text(&self, value: &Value) -> Result<String, Error> {
        match (&self.kind, value) {
            (FieldKind::Enum { labels }, Value::Int(i)) => Ok(labels[(*i - 1) as usize].into()),
            _ => scalar_to_text(&self.name, value),
        }
    }

    /// Writes a cleaned value as an XML attribute on `elem`.
    pub(crate) fn write_attribute(
        &self,
        elem: &mut XmlElement,
        value: &Value,
    ) -> Result<(), Error> {
        elem.set_attr(self.field_uri.clone(), self.value_to_xml_text(value)?);
        Ok(())
    }

    /// Appends a cleaned value to `parent` as child element(s), in the
    /// field's declared namespace.
    ///
    /// Values are expected to have been cleaned beforehand; nested records
    /// are serialized without re-validation.
    pub(crate) fn append_children(
        &self,
        parent: &mut XmlElement,
        value: &Value,
    ) -> Result<(), Error> {
        match &self.kind {
            FieldKind::Element { .. } => {
                if let Value::Element(record) = value {
                    if self.field_uri.is_empty() {
                        parent.append_child(record.to_xml_cleaned()?);
                    } else {
                        let mut wrapper =
                            XmlElement::new(self.field_uri.clone(), self.namespace);
                        wrapper.append_child(record.to_xml_cleaned()?);
                        parent.append_child(wrapper);
                    }
                }
            }

            FieldKind::ElementList { .. } => {
                if let Value::List(values) = value {
                    let mut container = XmlElement::new(self.field_uri.clone(), self.namespace);
                    for entry in values {
                        if let Value::Element(record) = entry {
                            container.append_child(record.to_xml_cleaned()?);
                        }
                    }
                    parent.append_child(container);
                }
            }

            FieldKind::EnumList { labels } => {
                if let Value::List(values) = value {
                    let joined = values
                        .iter()
                        .filter_map(Value::as_int)
                        .map(|i| labels[(i - 1) as usize])
                        .collect::<Vec<_>>()
                        .join(" ");
                    let mut elem = XmlElement::new(self.field_uri.clone(), self.namespace);
                    elem.append_text(joined);
                    parent.append_child(elem);
                }
            }

            FieldKind::TextList => {
                if let Value::List(values) = value {
                    let mut container = XmlElement::new(self.field_uri.clone(), self.namespace);
                    for entry in values {
                        let mut string_elem = XmlElement::new("String", self.namespace);
                        string_elem.append_text(scalar_to_text(&self.name, entry)?);
                        container.append_child(string_elem);
                    }
                    parent.append_child(container);
                }
            }

            FieldKind::ExtendedProperty { def } => {
                parent.append_child(def.to_property_xml(value)?);
            }

            _ => {
                // A scalar field without a wire name is the element's own
                // text content, e.g. the value of an InternetMessageHeader.
                if self.field_uri.is_empty() {
                    parent.append_text(self.value_to_xml_text(value)?);
                } else {
                    let mut elem = XmlElement::new(self.field_uri.clone(), self.namespace);
                    elem.append_text(self.value_to_xml_text(value)?);
                    parent.append_child(elem);
                }
            }
        }

        Ok(())
    }

    /// Extracts this field's value from an XML element, detaching any child
    /// elements it claims.
    pub(crate) fn extract(
        &self,
        elem: &mut XmlElement,
        ctx: &ParseContext,
    ) -> Result<Option<Value>, Error> {
        if self.is_attribute {
            return match elem.attr(&self.field_uri) {
                Some(text) => self.text_to_value(text, ctx).map(Some),
                None => Ok(None),
            };
        }

        match &self.kind {
            FieldKind::Element { classes } => {
                // Wrapped fields hold the typed element inside a container
                // named by the field; unwrapped ones hold it directly.
                let mut wrapper = if self.field_uri.is_empty() {
                    None
                } else {
                    match elem.take_child(&self.field_uri) {
                        Some(wrapper) => Some(wrapper),
                        None => return Ok(None),
                    }
                };
                let source = wrapper.as_mut().unwrap_or(elem);
                for class in classes {
                    if let Some(child) = source.take_child(class.element_name()) {
                        return Ok(Some(Value::Element(class.from_xml(child, ctx)?)));
                    }
                }
                Ok(None)
            }

            FieldKind::ElementList { classes } => {
                let Some(mut container) = elem.take_child(&self.field_uri) else {
                    return Ok(None);
                };
                let mut values = Vec::new();
                for child in container.take_children() {
                    let Some(class) = classes
                        .iter()
                        .find(|class| class.element_name() == child.name())
                    else {
                        // Tolerate unmodeled entries; the service layer may
                        // see element types this schema does not declare.
                        continue;
                    };
                    values.push(Value::Element(class.from_xml(child, ctx)?));
                }
                Ok(Some(Value::List(values)))
            }

            FieldKind::TextList => {
                let Some(container) = elem.take_child(&self.field_uri) else {
                    return Ok(None);
                };
                let values = container
                    .child_elements("String")
                    .map(|entry| Value::Text(entry.text_content()))
                    .collect();
                Ok(Some(Value::List(values)))
            }

            FieldKind::EnumList { .. } => {
                let Some(child) = elem.take_child(&self.field_uri) else {
                    return Ok(None);
                };
                let text = child.text_content();
                let mut values = Vec::new();
                for part in text.split_whitespace() {
                    values.push(self.text_to_value(part, ctx)?);
                }
                Ok(Some(Value::List(values)))
            }

            FieldKind::ExtendedProperty { def } => def.extract(elem, ctx),

            _ => {
                let text = if self.field_uri.is_empty() {
                    elem.text_content()
                } else {
                    match elem.take_child(&self.field_uri) {
                        Some(child) => child.text_content(),
                        None => return Ok(None),
                    }
                };
                if text.is_empty() {
                    return Ok(None);
                }
                self.text_to_value(&text, ctx).map(Some)
            }
        }
    }

    /// Converts XML attribute/text form to a value of this field's kind.
    pub(crate) fn text_to_value(&self, text: &str, ctx: &ParseContext) -> Result<Value, Error> {
        match &self.kind {
            FieldKind::Bool => match text {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                other => Err(self.unparseable(other, "expected a boolean")),
            },

            FieldKind::Int { .. } => text
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|err| self.unparseable(text, &err.to_string())),

            FieldKind::Text { .. } | FieldKind::Id | FieldKind::Choice { .. } => {
                Ok(Value::Text(text.to_owned()))
            }

            FieldKind::Base64 => BASE64_STANDARD
                .decode(text)
                .map(Value::Bytes)
                .map_err(|err| self.unparseable(text, &err.to_string())),

            FieldKind::DateTime => parse_datetime(text, ctx)
                .map(Value::DateTime)
                .map_err(|reason| self.unparseable(text, &reason)),

            FieldKind::Date => {
                let format = format_description!("[year]-[month]-[day]");
                // Exchange sometimes appends an offset to date-only values.
                let date_part = text.get(..10).unwrap_or(text);
                Date::parse(date_part, &format)
                    .map(Value::Date)
                    .map_err(|err| self.unparseable(text, &err.to_string()))
            }

            FieldKind::Enum { labels } | FieldKind::EnumList { labels } => {
                if let Some(index) = labels.iter().position(|label| *label == text) {
                    return Ok(Value::Int(index as i64 + 1));
                }
                // Exchange is known to return the undocumented value -1 for
                // the week-of-month index; it denotes the last week.
                if text == "-1" {
                    if let Some(index) = labels.iter().position(|label| *label == "Last") {
                        log::warn!(
                            "substituting unknown value -1 for field '{}' with 'Last'",
                            self.name
                        );
                        return Ok(Value::Int(index as i64 + 1));
                    }
                }
                Err(self.unparseable(text, "not a known label"))
            }

            FieldKind::ExtendedProperty { def } => def.text_to_value(&self.name, text, ctx),

            FieldKind::Element { .. } | FieldKind::ElementList { .. } | FieldKind::TextList => {
                Err(self.unparseable(text, "element-valued fields have no text form"))
            }
        }
    }

    fn unparseable(&self, value: &str, reason: &str) -> Error {
        Error::UnparseableValue {
            name: self.name.clone(),
            value: value.to_owned(),
            reason: reason.to_owned(),
        }
    }
}

/// Converts a scalar value to its XML text representation.
pub(crate) fn scalar_to_text(name: &str, value: &Value) -> Result<String, Error> {
    match value {
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.into()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Text(s) => Ok(s.clone()),
        Value::Bytes(b) => Ok(BASE64_STANDARD.encode(b)),
        Value::DateTime(dt) => {
            let format =
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
            dt.to_offset(UtcOffset::UTC)
                .format(&format)
                .map_err(|err| Error::UnparseableValue {
                    name: name.to_owned(),
                    value: format!("{dt:?}"),
                    reason: err.to_string(),
                })
        }
        Value::Date(d) => {
            let format = format_description!("[year]-[month]-[day]");
            d.format(&format).map_err(|err| Error::UnparseableValue {
                name: name.to_owned(),
                value: format!("{d:?}"),
                reason: err.to_string(),
            })
        }
        Value::List(values) => {
            let mut parts = Vec::with_capacity(values.len());
            for entry in values {
                parts.push(scalar_to_text(name, entry)?);
            }
            Ok(parts.join(" "))
        }
        Value::Element(_) => Err(Error::UnexpectedValueType {
            name: name.to_owned(),
            expected: "a scalar value",
            found: "Element",
        }),
    }
}

/// Parses an EWS datetime, tolerating values without an explicit UTC offset
/// by falling back to the context's default offset.
pub(crate) fn parse_datetime(text: &str, ctx: &ParseContext) -> Result<OffsetDateTime, String> {
    if let Ok(dt) = OffsetDateTime::parse(text, &Iso8601::DEFAULT) {
        return Ok(dt);
    }

    let primitive =
        PrimitiveDateTime::parse(text, &Iso8601::DEFAULT).map_err(|err| err.to_string())?;
    let offset = ctx.default_offset.unwrap_or(UtcOffset::UTC);
    Ok(primitive.assume_offset(offset))
}
