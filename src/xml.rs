/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! A generic, owned XML element tree.
//!
//! This is the boundary between the field model and the SOAP transport layer:
//! [`crate::Record::to_xml`] produces an [`XmlElement`] ready for insertion
//! into an outbound request body, and `from_xml` consumes one extracted from a
//! response body. Elements are written with the `t:`/`m:` namespace prefixes
//! used throughout EWS; the corresponding `xmlns` declarations are expected to
//! live on the enclosing SOAP envelope.

use std::fmt;

use quick_xml::{
    events::{BytesEnd, BytesStart, BytesText, Event},
    Reader, Writer,
};

use crate::Error;

pub const MESSAGES_NS_URI: &str =
    "http://schemas.microsoft.com/exchange/services/2006/messages";
pub const TYPES_NS_URI: &str = "http://schemas.microsoft.com/exchange/services/2006/types";

/// The XML namespace in which an EWS element or attribute lives.
///
/// EWS defines exactly two namespaces for the element types modeled by this
/// crate, conventionally prefixed `t:` (types) and `m:` (messages).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Namespace {
    #[default]
    Types,
    Messages,
}

impl Namespace {
    pub fn uri(&self) -> &'static str {
        match self {
            Namespace::Types => TYPES_NS_URI,
            Namespace::Messages => MESSAGES_NS_URI,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Types => "t",
            Namespace::Messages => "m",
        }
    }
}

/// A content node within an [`XmlElement`].
#[derive(Clone, Debug, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// A single XML element with its attributes and content, detached from any
/// document.
#[derive(Clone, Debug, PartialEq)]
pub struct XmlElement {
    name: String,
    namespace: Namespace,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>, namespace: Namespace) -> Self {
        XmlElement {
            name: name.into(),
            namespace,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The local name of this element, without any namespace prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// The prefixed tag name used on the wire, e.g. `t:ItemId`.
    pub fn prefixed_name(&self) -> String {
        format!("{}:{}", self.namespace.prefix(), self.name)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((name.into(), value.into()));
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn append_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    pub fn append_text(&mut self, text: impl Into<String>) {
        self.children.push(XmlNode::Text(text.into()));
    }

    pub fn children(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter()
    }

    /// Returns all child elements with the given local name, in document
    /// order.
    pub fn child_elements<'a, 'b: 'a>(
        &'a self,
        name: &'b str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter_map(move |node| match node {
            XmlNode::Element(child) if child.name == name => Some(child),
            _ => None,
        })
    }

    /// Returns the first child element with the given local name. The result
    /// borrows only from `self`, not from `name`.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find_map(|node| match node {
            XmlNode::Element(child) if child.name == name => Some(child),
            _ => None,
        })
    }

    /// Detaches and returns the first child element with the given local
    /// name.
    ///
    /// Response payloads can be large; extraction code claims child elements
    /// with this method so the consumed parts of the tree are dropped as soon
    /// as their values have been pulled out.
    pub fn take_child(&mut self, name: &str) -> Option<XmlElement> {
        let index = self.children.iter().position(|node| {
            matches!(node, XmlNode::Element(child) if child.name == name)
        })?;
        match self.children.remove(index) {
            XmlNode::Element(child) => Some(child),
            _ => unreachable!("position matched an element node"),
        }
    }

    /// Detaches and returns the remaining child elements, in document order.
    pub fn take_children(&mut self) -> Vec<XmlElement> {
        let mut elements = Vec::new();
        self.children.retain_mut(|node| {
            if let XmlNode::Element(child) = node {
                elements.push(std::mem::replace(
                    child,
                    XmlElement::new(String::new(), Namespace::Types),
                ));
                false
            } else {
                true
            }
        });
        elements
    }

    /// The concatenated text content directly below this element.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let XmlNode::Text(text) = node {
                out.push_str(text);
            }
        }
        out
    }

    /// Serializes this element and its content as XML events.
    pub fn write_to<W>(&self, writer: &mut Writer<W>) -> Result<(), Error>
    where
        W: std::io::Write,
    {
        let name = self.prefixed_name();
        let mut start = BytesStart::new(name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for node in &self.children {
            match node {
                XmlNode::Element(child) => child.write_to(writer)?,
                XmlNode::Text(text) => {
                    writer.write_event(Event::Text(BytesText::new(text)))?;
                }
            }
        }
        writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;

        Ok(())
    }

    /// Serializes this element as a standalone XML string.
    ///
    /// Namespace prefixes are emitted without declarations; this output is
    /// intended for insertion into a document which declares them, and for
    /// assertions in tests.
    pub fn to_xml_string(&self) -> Result<String, Error> {
        let mut writer = {
            let inner: Vec<u8> = Default::default();
            Writer::new(inner)
        };
        self.write_to(&mut writer)?;

        String::from_utf8(writer.into_inner())
            .map_err(|err| Error::MalformedDocument(err.to_string()))
    }

    /// Builds an element tree from raw XML.
    ///
    /// Prefixes resolving to the EWS messages namespace map to
    /// [`Namespace::Messages`]; all other prefixes (including none) map to
    /// [`Namespace::Types`], matching the leniency of the response parsing in
    /// the surrounding service layer. Whitespace-only text is discarded.
    pub fn parse(document: &[u8]) -> Result<XmlElement, Error> {
        let mut reader = Reader::from_reader(document);
        let mut buf = Vec::new();

        // The stack of currently-open elements. Closing an element pops it
        // and attaches it to its parent, or returns it if it is the root.
        let mut stack: Vec<XmlElement> = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => {
                    stack.push(element_from_start(&start)?);
                }

                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.append_child(element),
                        None => return Ok(element),
                    }
                }

                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::MalformedDocument("unmatched end tag".into()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.append_child(element),
                        None => return Ok(element),
                    }
                }

                Event::Text(text) => {
                    let text = text.unescape()?;
                    if text.trim().is_empty() {
                        continue;
                    }
                    if let Some(parent) = stack.last_mut() {
                        parent.append_text(text.into_owned());
                    }
                }

                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        parent.append_text(String::from_utf8_lossy(&data).into_owned());
                    }
                }

                Event::Eof => {
                    return Err(Error::MalformedDocument(
                        "document contains no root element".into(),
                    ));
                }

                // Declarations, comments and processing instructions carry no
                // model data.
                _ => continue,
            }

            buf.clear();
        }
    }
}

impl fmt::Display for XmlElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_xml_string() {
            Ok(xml) => f.write_str(&xml),
            Err(_) => Err(fmt::Error),
        }
    }
}

fn element_from_start(start: &BytesStart) -> Result<XmlElement, Error> {
    let qname = start.name();

    let namespace = match qname.prefix() {
        Some(prefix) if prefix.as_ref() == b"m" => Namespace::Messages,
        _ => Namespace::Types,
    };

    let local = std::str::from_utf8(qname.local_name().as_ref())
        .map_err(|err| Error::MalformedDocument(err.to_string()))?
        .to_owned();

    let mut element = XmlElement::new(local, namespace);
    for attribute in start.attributes() {
        let attribute = attribute?;
        // `xmlns` noise from the enclosing document is not model data.
        if attribute.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let key = std::str::from_utf8(attribute.key.local_name().as_ref())
            .map_err(|err| Error::MalformedDocument(err.to_string()))?
            .to_owned();
        let value = attribute.unescape_value()?.into_owned();
        element.set_attr(key, value);
    }

    Ok(element)
}

#[cfg(test)]
mod tests {
    use super::{Namespace, XmlElement};

    #[test]
    fn writes_prefixed_elements_with_attributes() {
        let mut elem = XmlElement::new("ItemId", Namespace::Types);
        elem.set_attr("Id", "AAMkAD");
        elem.set_attr("ChangeKey", "CQAAABYA");

        assert_eq!(
            elem.to_xml_string().expect("serialization should succeed"),
            r#"<t:ItemId Id="AAMkAD" ChangeKey="CQAAABYA"/>"#,
            "attribute-only elements should serialize as empty elements"
        );
    }

    #[test]
    fn writes_nested_content_in_insertion_order() {
        let mut inner = XmlElement::new("Subject", Namespace::Types);
        inner.append_text("a < b");

        let mut outer = XmlElement::new("Message", Namespace::Types);
        outer.append_child(inner);

        assert_eq!(
            outer.to_xml_string().expect("serialization should succeed"),
            "<t:Message><t:Subject>a &lt; b</t:Subject></t:Message>",
            "text content should be escaped on write"
        );
    }

    #[test]
    fn parses_prefixes_and_drops_xmlns_noise() {
        let xml = concat!(
            r#"<m:GetFolderResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages""#,
            r#" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">"#,
            r#"<t:FolderId Id="folder-1"/>"#,
            "</m:GetFolderResponse>"
        );

        let elem = XmlElement::parse(xml.as_bytes()).expect("parsing should succeed");
        assert_eq!(elem.name(), "GetFolderResponse");
        assert_eq!(elem.namespace(), Namespace::Messages);
        assert!(
            elem.attr("m").is_none() && elem.attributes().next().is_none(),
            "xmlns declarations should not be retained as attributes"
        );

        let child = elem.child("FolderId").expect("child should be present");
        assert_eq!(child.namespace(), Namespace::Types);
        assert_eq!(child.attr("Id"), Some("folder-1"));
    }

    #[test]
    fn child_lookup_outlives_the_name_buffer() {
        let xml = r#"<t:Folder><t:DisplayName>Inbox</t:DisplayName></t:Folder>"#;
        let elem = XmlElement::parse(xml.as_bytes()).expect("parsing should succeed");

        // The returned reference must stay valid after the lookup name is
        // dropped.
        let child = {
            let name = String::from("DisplayName");
            elem.child(&name)
        };
        assert_eq!(
            child.expect("child should be present").text_content(),
            "Inbox"
        );
    }

    #[test]
    fn take_child_detaches_the_first_match() {
        let xml = "<t:Recurrence><t:DailyRecurrence><t:Interval>2</t:Interval></t:DailyRecurrence>\
                   <t:NoEndRecurrence/></t:Recurrence>";
        let mut elem = XmlElement::parse(xml.as_bytes()).expect("parsing should succeed");

        let pattern = elem
            .take_child("DailyRecurrence")
            .expect("child should be present");
        assert_eq!(pattern.child("Interval").map(|c| c.text_content()), Some("2".into()));

        assert!(
            elem.take_child("DailyRecurrence").is_none(),
            "detached child should no longer be reachable from its parent"
        );
        assert!(elem.child("NoEndRecurrence").is_some());
    }

    #[test]
    fn round_trips_through_parse() {
        let xml = r#"<t:Mailbox><t:Name>Contoso</t:Name><t:EmailAddress>c@example.com</t:EmailAddress></t:Mailbox>"#;
        let elem = XmlElement::parse(xml.as_bytes()).expect("parsing should succeed");
        assert_eq!(
            elem.to_xml_string().expect("serialization should succeed"),
            xml,
            "parse/write should preserve order and content"
        );
    }
}
