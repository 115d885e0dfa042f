/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! A declarative field model for Exchange Web Services XML.
//!
//! EWS element types are described by runtime schemas: ordered collections
//! of typed [`Field`] descriptors bound to an [`ElementClass`]. Instances
//! ([`Record`]s) validate against their schema, serialize to the `t:`/`m:`
//! prefixed XML fragments EWS requests are built from, and parse back out
//! of response fragments. Schemas compose by extension and can be amended
//! at runtime to carry custom MAPI properties.

use thiserror::Error;

pub mod extended;
pub mod fields;
pub mod record;
pub mod schema;
pub mod types;
pub mod version;
pub mod xml;

#[cfg(test)]
pub(crate) mod test_utils;

pub use extended::{DistinguishedPropertySet, ExtendedPropertyDef, PropertyType};
pub use fields::{Choice, Field, FieldKind, Value};
pub use record::{ParseContext, Record};
pub use schema::{ElementClass, FieldCollection, Schema, SchemaBuilder};
pub use version::ExchangeServerVersion;
pub use xml::{Namespace, XmlElement, XmlNode};

#[derive(Debug, Error)]
pub enum Error {
    #[error("field '{name}' is already declared")]
    DuplicateField { name: String },

    #[error("'{class_name}' has no field named '{name}'")]
    InvalidField {
        class_name: &'static str,
        name: String,
    },

    #[error(
        "field '{name}' is not available on {version}; it is supported from \
         {supported_from} until {deprecated_from}"
    )]
    InvalidFieldForVersion {
        name: String,
        version: ExchangeServerVersion,
        supported_from: String,
        deprecated_from: String,
    },

    #[error("'{name}' is not a field or slot of '{class_name}'")]
    InvalidAttribute {
        class_name: &'static str,
        name: String,
    },

    #[error("unknown keyword arguments for '{class_name}': {names}")]
    InvalidKeywordArguments {
        class_name: &'static str,
        names: String,
    },

    #[error("required field '{name}' has no value and no default")]
    MissingRequiredField { name: String },

    #[error("invalid value '{value}' for field '{name}'; valid choices are: {choices}")]
    InvalidChoice {
        name: String,
        value: String,
        choices: String,
    },

    #[error("choice '{value}' for field '{name}' is not available on {version}")]
    InvalidChoiceForVersion {
        name: String,
        value: String,
        version: ExchangeServerVersion,
    },

    #[error("value {value} for field '{name}' is outside the range {min}..={max}")]
    ValueOutOfRange {
        name: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("value for field '{name}' exceeds the maximum length of {max_length}")]
    ValueTooLong { name: String, max_length: usize },

    #[error("unexpected {found} value for field '{name}', expected {expected}")]
    UnexpectedValueType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("list field '{name}' contains duplicate entries")]
    DuplicateListEntries { name: String },

    #[error("list field '{name}' must not be empty")]
    EmptyList { name: String },

    #[error("unknown server version identifier '{0}'")]
    UnknownServerVersion(String),

    #[error("failed to parse value '{value}' for field '{name}': {reason}")]
    UnparseableValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("expected element '{expected}', found '{found}'")]
    UnexpectedElement {
        expected: &'static str,
        found: String,
    },

    #[error("malformed XML document: {0}")]
    MalformedDocument(String),

    #[error("error manipulating XML data")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid XML attribute")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("invalid extended property definition: {0}")]
    InvalidExtendedProperty(String),
}
