/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Custom MAPI properties.
//!
//! Exchange items and folders can carry properties beyond their schema,
//! addressed either through a property set (well-known or by GUID) plus a
//! name or numeric id, or directly by MAPI property tag. A definition is
//! registered on an element class at runtime and then behaves like any
//! other field of the class.

use crate::{
    fields::{scalar_to_text, Value},
    record::ParseContext,
    xml::{Namespace, XmlElement},
    Error,
};

/// A well-known MAPI property set identifier.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/extendedfielduri#distinguishedpropertysetid-attribute>
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DistinguishedPropertySet {
    Address,
    Appointment,
    CalendarAssistant,
    Common,
    InternetHeaders,
    Meeting,
    PublicStrings,
    Sharing,
    Task,
    UnifiedMessaging,
}

impl DistinguishedPropertySet {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistinguishedPropertySet::Address => "Address",
            DistinguishedPropertySet::Appointment => "Appointment",
            DistinguishedPropertySet::CalendarAssistant => "CalendarAssistant",
            DistinguishedPropertySet::Common => "Common",
            DistinguishedPropertySet::InternetHeaders => "InternetHeaders",
            DistinguishedPropertySet::Meeting => "Meeting",
            DistinguishedPropertySet::PublicStrings => "PublicStrings",
            DistinguishedPropertySet::Sharing => "Sharing",
            DistinguishedPropertySet::Task => "Task",
            DistinguishedPropertySet::UnifiedMessaging => "UnifiedMessaging",
        }
    }
}

/// The type of the value of a MAPI property.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/extendedfielduri#propertytype-attribute>
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PropertyType {
    ApplicationTime,
    ApplicationTimeArray,
    Binary,
    BinaryArray,
    Boolean,
    CLSID,
    CLSIDArray,
    Currency,
    CurrencyArray,
    Double,
    DoubleArray,
    Float,
    FloatArray,
    Integer,
    IntegerArray,
    Long,
    LongArray,
    Short,
    ShortArray,
    SystemTime,
    SystemTimeArray,
    String,
    StringArray,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::ApplicationTime => "ApplicationTime",
            PropertyType::ApplicationTimeArray => "ApplicationTimeArray",
            PropertyType::Binary => "Binary",
            PropertyType::BinaryArray => "BinaryArray",
            PropertyType::Boolean => "Boolean",
            PropertyType::CLSID => "CLSID",
            PropertyType::CLSIDArray => "CLSIDArray",
            PropertyType::Currency => "Currency",
            PropertyType::CurrencyArray => "CurrencyArray",
            PropertyType::Double => "Double",
            PropertyType::DoubleArray => "DoubleArray",
            PropertyType::Float => "Float",
            PropertyType::FloatArray => "FloatArray",
            PropertyType::Integer => "Integer",
            PropertyType::IntegerArray => "IntegerArray",
            PropertyType::Long => "Long",
            PropertyType::LongArray => "LongArray",
            PropertyType::Short => "Short",
            PropertyType::ShortArray => "ShortArray",
            PropertyType::SystemTime => "SystemTime",
            PropertyType::SystemTimeArray => "SystemTimeArray",
            PropertyType::String => "String",
            PropertyType::StringArray => "StringArray",
        }
    }

    /// Whether this is a multi-valued type.
    pub fn is_array(&self) -> bool {
        self.as_str().ends_with("Array")
    }

    /// The scalar representation of a single value of this type.
    fn base_kind(&self) -> BaseKind {
        match self {
            PropertyType::Boolean => BaseKind::Bool,
            PropertyType::Integer
            | PropertyType::IntegerArray
            | PropertyType::Long
            | PropertyType::LongArray
            | PropertyType::Short
            | PropertyType::ShortArray => BaseKind::Int,
            PropertyType::Binary | PropertyType::BinaryArray => BaseKind::Bytes,
            PropertyType::SystemTime | PropertyType::SystemTimeArray => BaseKind::DateTime,
            // Fractional and time-span types are carried as text verbatim;
            // the crate models no lossy numeric representation for them.
            _ => BaseKind::Text,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BaseKind {
    Bool,
    Int,
    Text,
    Bytes,
    DateTime,
}

impl BaseKind {
    fn expected(&self) -> &'static str {
        match self {
            BaseKind::Bool => "Bool",
            BaseKind::Int => "Int",
            BaseKind::Text => "Text",
            BaseKind::Bytes => "Bytes",
            BaseKind::DateTime => "DateTime",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (BaseKind::Bool, Value::Bool(_))
                | (BaseKind::Int, Value::Int(_))
                | (BaseKind::Text, Value::Text(_))
                | (BaseKind::Bytes, Value::Bytes(_))
                | (BaseKind::DateTime, Value::DateTime(_))
        )
    }
}

/// The definition of one custom MAPI property.
///
/// A valid definition addresses the property through exactly one scheme:
/// a distinguished property set, a property set GUID, or a property tag.
/// Set-based addressing additionally requires exactly one of a property
/// name or a numeric property id; tag-based addressing allows neither.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/extendedfielduri>
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtendedPropertyDef {
    distinguished_property_set_id: Option<DistinguishedPropertySet>,
    property_set_id: Option<String>,
    property_tag: Option<u16>,
    property_name: Option<String>,
    property_id: Option<i32>,
    property_type: PropertyType,
}

impl ExtendedPropertyDef {
    pub fn new(property_type: PropertyType) -> Self {
        ExtendedPropertyDef {
            distinguished_property_set_id: None,
            property_set_id: None,
            property_tag: None,
            property_name: None,
            property_id: None,
            property_type,
        }
    }

    pub fn distinguished_set(mut self, set: DistinguishedPropertySet) -> Self {
        self.distinguished_property_set_id = Some(set);
        self
    }

    /// Addresses the property through a property set GUID.
    pub fn set_id(mut self, guid: &str) -> Self {
        self.property_set_id = Some(guid.to_owned());
        self
    }

    pub fn tag(mut self, tag: u16) -> Self {
        self.property_tag = Some(tag);
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.property_name = Some(name.to_owned());
        self
    }

    pub fn id(mut self, id: i32) -> Self {
        self.property_id = Some(id);
        self
    }

    pub fn property_type(&self) -> PropertyType {
        self.property_type
    }

    pub fn is_array(&self) -> bool {
        self.property_type.is_array()
    }

    /// Checks the MAPI addressing rules.
    pub fn validate(&self) -> Result<(), Error> {
        let schemes = [
            self.distinguished_property_set_id.is_some(),
            self.property_set_id.is_some(),
            self.property_tag.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count();
        if schemes != 1 {
            return Err(Error::InvalidExtendedProperty(
                "exactly one of a distinguished property set, a property set id or a \
                 property tag must be given"
                    .into(),
            ));
        }

        if let Some(tag) = self.property_tag {
            if self.property_name.is_some() || self.property_id.is_some() {
                return Err(Error::InvalidExtendedProperty(
                    "a property tag cannot be combined with a property name or id".into(),
                ));
            }
            // 0x8000 through 0xFFFE is the named-property range; tags there
            // must be addressed through a property set instead.
            if (0x8000..=0xFFFE).contains(&tag) {
                return Err(Error::InvalidExtendedProperty(format!(
                    "property tag {tag:#06x} is in the reserved named-property range"
                )));
            }
        } else {
            match (self.property_name.is_some(), self.property_id.is_some()) {
                (true, false) | (false, true) => {}
                _ => {
                    return Err(Error::InvalidExtendedProperty(
                        "set-based addressing requires exactly one of a property name or a \
                         property id"
                            .into(),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Validates a value against this definition's property type.
    pub(crate) fn clean_value(&self, name: &str, value: Value) -> Result<Value, Error> {
        let base = self.property_type.base_kind();
        if self.is_array() {
            match value {
                Value::List(values) => {
                    for entry in &values {
                        if !base.accepts(entry) {
                            return Err(Error::UnexpectedValueType {
                                name: name.to_owned(),
                                expected: base.expected(),
                                found: entry.kind_name(),
                            });
                        }
                    }
                    Ok(Value::List(values))
                }
                other => Err(Error::UnexpectedValueType {
                    name: name.to_owned(),
                    expected: "List",
                    found: other.kind_name(),
                }),
            }
        } else if base.accepts(&value) {
            Ok(value)
        } else {
            Err(Error::UnexpectedValueType {
                name: name.to_owned(),
                expected: base.expected(),
                found: value.kind_name(),
            })
        }
    }

    /// Parses one scalar entry of this property's type from XML text.
    pub(crate) fn text_to_value(
        &self,
        name: &str,
        text: &str,
        ctx: &ParseContext,
    ) -> Result<Value, Error> {
        let unparseable = |reason: &str| Error::UnparseableValue {
            name: name.to_owned(),
            value: text.to_owned(),
            reason: reason.to_owned(),
        };

        match self.property_type.base_kind() {
            BaseKind::Bool => match text {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(unparseable("expected a boolean")),
            },
            BaseKind::Int => text
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|err| unparseable(&err.to_string())),
            BaseKind::Text => Ok(Value::Text(text.to_owned())),
            BaseKind::Bytes => {
                use base64::prelude::{Engine as _, BASE64_STANDARD};
                BASE64_STANDARD
                    .decode(text)
                    .map(Value::Bytes)
                    .map_err(|err| unparseable(&err.to_string()))
            }
            BaseKind::DateTime => crate::fields::parse_datetime(text, ctx)
                .map(Value::DateTime)
                .map_err(|reason| unparseable(&reason)),
        }
    }

    /// Builds the `ExtendedFieldURI` element describing this property.
    pub(crate) fn to_field_uri_xml(&self) -> XmlElement {
        let mut uri = XmlElement::new("ExtendedFieldURI", Namespace::Types);
        if let Some(set) = self.distinguished_property_set_id {
            uri.set_attr("DistinguishedPropertySetId", set.as_str());
        }
        if let Some(guid) = &self.property_set_id {
            uri.set_attr("PropertySetId", guid.clone());
        }
        if let Some(tag) = self.property_tag {
            uri.set_attr("PropertyTag", format!("{tag:#06x}"));
        }
        if let Some(name) = &self.property_name {
            uri.set_attr("PropertyName", name.clone());
        }
        if let Some(id) = self.property_id {
            uri.set_attr("PropertyId", id.to_string());
        }
        uri.set_attr("PropertyType", self.property_type.as_str());
        uri
    }

    /// Serializes a cleaned value as an `ExtendedProperty` element.
    pub(crate) fn to_property_xml(&self, value: &Value) -> Result<XmlElement, Error> {
        let mut property = XmlElement::new("ExtendedProperty", Namespace::Types);
        property.append_child(self.to_field_uri_xml());

        if self.is_array() {
            let mut values_elem = XmlElement::new("Values", Namespace::Types);
            if let Value::List(entries) = value {
                for entry in entries {
                    let mut value_elem = XmlElement::new("Value", Namespace::Types);
                    value_elem.append_text(scalar_to_text("ExtendedProperty", entry)?);
                    values_elem.append_child(value_elem);
                }
            }
            property.append_child(values_elem);
        } else {
            let mut value_elem = XmlElement::new("Value", Namespace::Types);
            value_elem.append_text(scalar_to_text("ExtendedProperty", value)?);
            property.append_child(value_elem);
        }

        Ok(property)
    }

    /// Whether the given `ExtendedFieldURI` element addresses this property.
    fn matches(&self, uri: &XmlElement) -> bool {
        let set_matches = match (self.distinguished_property_set_id, uri.attr("DistinguishedPropertySetId")) {
            (Some(set), Some(attr)) => set.as_str() == attr,
            (None, None) => true,
            _ => false,
        };
        let guid_matches = match (&self.property_set_id, uri.attr("PropertySetId")) {
            // GUID comparison is case-insensitive.
            (Some(guid), Some(attr)) => guid.eq_ignore_ascii_case(attr),
            (None, None) => true,
            _ => false,
        };
        let tag_matches = match (self.property_tag, uri.attr("PropertyTag")) {
            (Some(tag), Some(attr)) => parse_property_tag(attr) == Some(tag),
            (None, None) => true,
            _ => false,
        };
        let name_matches = match (&self.property_name, uri.attr("PropertyName")) {
            (Some(name), Some(attr)) => name == attr,
            (None, None) => true,
            _ => false,
        };
        let id_matches = match (self.property_id, uri.attr("PropertyId")) {
            (Some(id), Some(attr)) => attr.parse::<i32>().ok() == Some(id),
            (None, None) => true,
            _ => false,
        };

        set_matches && guid_matches && tag_matches && name_matches && id_matches
    }

    /// Finds and detaches this property's `ExtendedProperty` child of
    /// `elem`, if present, and parses its value.
    pub(crate) fn extract(
        &self,
        elem: &mut XmlElement,
        ctx: &ParseContext,
    ) -> Result<Option<Value>, Error> {
        let mut unclaimed = Vec::new();
        let mut found = None;

        while let Some(property) = elem.take_child("ExtendedProperty") {
            if found.is_none()
                && property
                    .child("ExtendedFieldURI")
                    .is_some_and(|uri| self.matches(uri))
            {
                found = Some(property);
            } else {
                unclaimed.push(property);
            }
        }
        // Put back the properties belonging to other definitions.
        for property in unclaimed {
            elem.append_child(property);
        }

        let Some(property) = found else {
            return Ok(None);
        };

        if self.is_array() {
            let Some(values_elem) = property.child("Values") else {
                return Ok(Some(Value::List(Vec::new())));
            };
            let mut values = Vec::new();
            for value_elem in values_elem.child_elements("Value") {
                values.push(self.text_to_value(
                    "ExtendedProperty",
                    &value_elem.text_content(),
                    ctx,
                )?);
            }
            Ok(Some(Value::List(values)))
        } else {
            match property.child("Value") {
                Some(value_elem) => self
                    .text_to_value("ExtendedProperty", &value_elem.text_content(), ctx)
                    .map(Some),
                None => Ok(None),
            }
        }
    }
}

/// Parses a property tag attribute, which Exchange writes as hex with a
/// `0x` prefix but also accepts as decimal.
fn parse_property_tag(text: &str) -> Option<u16> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse::<u16>().ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::{DistinguishedPropertySet, ExtendedPropertyDef, PropertyType};
    use crate::{
        fields::{Field, Value},
        record::ParseContext,
        schema::{ElementClass, Schema},
        xml::{Namespace, XmlElement},
        Error,
    };

    #[test]
    fn definitions_require_exactly_one_addressing_scheme() {
        let err = ExtendedPropertyDef::new(PropertyType::String)
            .validate()
            .expect_err("a definition with no addressing scheme should be rejected");
        assert!(matches!(err, Error::InvalidExtendedProperty(_)));

        let err = ExtendedPropertyDef::new(PropertyType::String)
            .distinguished_set(DistinguishedPropertySet::PublicStrings)
            .tag(0x007D)
            .validate()
            .expect_err("two addressing schemes should be rejected");
        assert!(matches!(err, Error::InvalidExtendedProperty(_)));
    }

    #[test]
    fn set_based_addressing_requires_a_name_or_an_id_but_not_both() {
        let base = ExtendedPropertyDef::new(PropertyType::String)
            .distinguished_set(DistinguishedPropertySet::PublicStrings);

        base.clone()
            .validate()
            .expect_err("a set without a name or id should be rejected");
        base.clone()
            .name("keywords")
            .validate()
            .expect("a set with a name should be accepted");
        base.clone()
            .id(0x8010)
            .validate()
            .expect("a set with an id should be accepted");
        base.name("keywords")
            .id(0x8010)
            .validate()
            .expect_err("a set with both a name and an id should be rejected");
    }

    #[test]
    fn tags_in_the_named_property_range_are_rejected() {
        ExtendedPropertyDef::new(PropertyType::String)
            .tag(0x007D)
            .validate()
            .expect("an ordinary tag should be accepted");

        let err = ExtendedPropertyDef::new(PropertyType::String)
            .tag(0x8010)
            .validate()
            .expect_err("tags in 0x8000..=0xFFFE should be rejected");
        assert!(matches!(err, Error::InvalidExtendedProperty(_)));
    }

    #[test]
    fn scalar_property_serializes_with_field_uri_and_value() {
        let def = ExtendedPropertyDef::new(PropertyType::String).tag(0x007D);
        let xml = def
            .to_property_xml(&Value::Text("data goes here".into()))
            .expect("serialization should succeed")
            .to_xml_string()
            .expect("writing should succeed");
        assert_eq!(
            xml,
            "<t:ExtendedProperty>\
             <t:ExtendedFieldURI PropertyTag=\"0x007d\" PropertyType=\"String\"/>\
             <t:Value>data goes here</t:Value>\
             </t:ExtendedProperty>"
        );
    }

    #[test]
    fn array_property_serializes_each_entry_in_a_values_container() {
        let def = ExtendedPropertyDef::new(PropertyType::StringArray)
            .distinguished_set(DistinguishedPropertySet::PublicStrings)
            .name("Keywords");
        let xml = def
            .to_property_xml(&Value::list(["red".into(), "green".into()]))
            .expect("serialization should succeed")
            .to_xml_string()
            .expect("writing should succeed");
        assert_eq!(
            xml,
            "<t:ExtendedProperty>\
             <t:ExtendedFieldURI DistinguishedPropertySetId=\"PublicStrings\" \
             PropertyName=\"Keywords\" PropertyType=\"StringArray\"/>\
             <t:Values><t:Value>red</t:Value><t:Value>green</t:Value></t:Values>\
             </t:ExtendedProperty>"
        );
    }

    #[test]
    fn value_validation_follows_the_property_type() {
        let def = ExtendedPropertyDef::new(PropertyType::Integer).tag(0x3007);
        def.clean_value("prop", Value::Int(5))
            .expect("an integer should be accepted");
        let err = def
            .clean_value("prop", Value::Text("five".into()))
            .expect_err("text should be rejected for an integer property");
        assert!(matches!(err, Error::UnexpectedValueType { expected: "Int", .. }));

        let def = ExtendedPropertyDef::new(PropertyType::IntegerArray).tag(0x3008);
        def.clean_value("prop", Value::list([Value::Int(1), Value::Int(2)]))
            .expect("an integer list should be accepted");
        let err = def
            .clean_value("prop", Value::Int(1))
            .expect_err("a bare scalar should be rejected for an array property");
        assert!(matches!(err, Error::UnexpectedValueType { expected: "List", .. }));
    }

    static FLAGGED: LazyLock<ElementClass> = LazyLock::new(|| {
        ElementClass::new(
            Schema::builder("Flagged", Namespace::Types)
                .field(Field::text("subject", "Subject"))
                .build()
                .expect("schema is valid"),
        )
    });

    #[test]
    fn registration_appends_a_field_and_deregistration_removes_it() {
        let def = ExtendedPropertyDef::new(PropertyType::String)
            .distinguished_set(DistinguishedPropertySet::PublicStrings)
            .name("MyProp");

        FLAGGED
            .register("my_prop", def)
            .expect("registration should succeed");
        let names: Vec<_> = FLAGGED
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_owned())
            .collect();
        assert_eq!(
            names,
            ["subject", "my_prop"],
            "the registered property should be appended after the last field"
        );

        let err = FLAGGED
            .deregister("subject")
            .expect_err("deregistering an ordinary field should fail");
        assert!(matches!(err, Error::InvalidExtendedProperty(_)));

        FLAGGED
            .deregister("my_prop")
            .expect("deregistration should succeed");
        assert!(!FLAGGED.schema().fields().contains("my_prop"));

        // Invalid definitions are rejected before touching the schema.
        FLAGGED
            .register("bad", ExtendedPropertyDef::new(PropertyType::String))
            .expect_err("an invalid definition should not register");
    }

    static NOTED: LazyLock<ElementClass> = LazyLock::new(|| {
        ElementClass::new(
            Schema::builder("Noted", Namespace::Types)
                .field(Field::text("subject", "Subject"))
                .build()
                .expect("schema is valid"),
        )
    });

    #[test]
    fn registered_properties_are_assignable_and_serialize_until_deregistered() {
        let def = ExtendedPropertyDef::new(PropertyType::String).tag(0x007D);
        NOTED
            .register("note", def)
            .expect("registration should succeed");

        let mut record = NOTED
            .create([("subject", "s".into()), ("note", "data goes here".into())])
            .expect("the registered property should be assignable");
        let xml = record
            .to_xml(None)
            .expect("serialization should succeed")
            .to_xml_string()
            .expect("writing should succeed");
        assert_eq!(
            xml,
            "<t:Noted><t:Subject>s</t:Subject>\
             <t:ExtendedProperty>\
             <t:ExtendedFieldURI PropertyTag=\"0x007d\" PropertyType=\"String\"/>\
             <t:Value>data goes here</t:Value>\
             </t:ExtendedProperty>\
             </t:Noted>"
        );

        NOTED
            .deregister("note")
            .expect("deregistration should succeed");
        let err = NOTED
            .empty()
            .set("note", "stale")
            .expect_err("a deregistered property should no longer be assignable");
        assert!(matches!(err, Error::InvalidAttribute { .. }));
    }

    #[test]
    fn extraction_claims_only_the_matching_property() {
        let keywords = ExtendedPropertyDef::new(PropertyType::String)
            .distinguished_set(DistinguishedPropertySet::PublicStrings)
            .name("Keywords");
        let other = ExtendedPropertyDef::new(PropertyType::String).tag(0x007D);

        let mut parent = XmlElement::new("Item", Namespace::Types);
        parent.append_child(
            other
                .to_property_xml(&Value::Text("tagged".into()))
                .expect("serialization should succeed"),
        );
        parent.append_child(
            keywords
                .to_property_xml(&Value::Text("urgent".into()))
                .expect("serialization should succeed"),
        );

        let value = keywords
            .extract(&mut parent, &ParseContext::default())
            .expect("extraction should succeed")
            .expect("the matching property should be found");
        assert_eq!(value, Value::Text("urgent".into()));

        // The non-matching property must still be claimable afterwards.
        let value = other
            .extract(&mut parent, &ParseContext::default())
            .expect("extraction should succeed")
            .expect("the other property should still be present");
        assert_eq!(value, Value::Text("tagged".into()));
    }
}
