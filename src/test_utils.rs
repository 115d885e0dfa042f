/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::record::{ParseContext, Record};
use crate::xml::XmlElement;

/// Assert the expected result of serializing a record, cleaning it first.
pub fn assert_serialized_content(record: &mut Record, expected_xml_content: &str) {
    let actual_xml_content = record
        .to_xml(None)
        .expect("record should serialize")
        .to_xml_string()
        .expect("element should write as XML");

    assert_eq!(actual_xml_content, expected_xml_content);
}

/// Assert the result of reading a record of the given class back out of XML.
pub fn assert_deserialized_content(content: &str, expected: &Record) {
    let elem = XmlElement::parse(content.as_bytes()).expect("content should parse as XML");
    let deserialized = expected
        .class()
        .from_xml(elem, &ParseContext::default())
        .expect("element should deserialize into a record");

    assert_eq!(&deserialized, expected);
}
