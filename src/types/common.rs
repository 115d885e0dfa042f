/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Identity elements, mailboxes and other shared property types.

use std::sync::LazyLock;

use crate::{
    fields::{Choice, Field, Value},
    record::Record,
    schema::{ElementClass, Schema},
    version::ExchangeServerVersion,
    xml::Namespace,
    Error,
};

/// An identifier for an Exchange item, with `Id` and `ChangeKey` generated
/// by the server.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/itemid>
pub static ITEM_ID: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("ItemId", Namespace::Types)
            .field(Field::id("id", "Id").required())
            .field(Field::id("changekey", "ChangeKey"))
            .build()
            .expect("ItemId schema is statically valid"),
    )
});

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/parentitemid>
pub static PARENT_ITEM_ID: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("ParentItemId", Namespace::Messages)
            .field(Field::id("id", "Id").required())
            .field(Field::id("changekey", "ChangeKey"))
            .build()
            .expect("ParentItemId schema is statically valid"),
    )
});

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/rootitemid>
pub static ROOT_ITEM_ID: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("RootItemId", Namespace::Messages)
            .field(Field::id("id", "RootItemId").required())
            .field(Field::id("changekey", "RootItemChangeKey").required())
            .build()
            .expect("RootItemId schema is statically valid"),
    )
});

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/conversationid>
pub static CONVERSATION_ID: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("ConversationId", Namespace::Types)
            .field(Field::id("id", "Id").required())
            // The ChangeKey attribute is only sometimes required, see MSDN.
            .field(Field::id("changekey", "ChangeKey"))
            .build()
            .expect("ConversationId schema is statically valid"),
    )
});

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/parentfolderid>
pub static PARENT_FOLDER_ID: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("ParentFolderId", Namespace::Types)
            .field(Field::id("id", "Id").required())
            .field(Field::id("changekey", "ChangeKey"))
            .build()
            .expect("ParentFolderId schema is statically valid"),
    )
});

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/folderid>
pub static FOLDER_ID: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("FolderId", Namespace::Types)
            .field(Field::id("id", "Id").required())
            .field(Field::id("changekey", "ChangeKey"))
            .build()
            .expect("FolderId schema is statically valid"),
    )
});

/// An identifier for a well-known folder, optionally scoped to a mailbox.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/distinguishedfolderid>
pub static DISTINGUISHED_FOLDER_ID: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("DistinguishedFolderId", Namespace::Types)
            .extend(&FOLDER_ID.schema())
            .field(Field::element("mailbox", vec![&*MAILBOX]))
            .validator(distinguished_folder_id_post_clean)
            .build()
            .expect("DistinguishedFolderId schema is statically valid"),
    )
});

// Specifying a mailbox together with the public folder root draws
// ErrorInvalidOperation from EWS, so the mailbox is dropped for it.
fn distinguished_folder_id_post_clean(record: &mut Record) -> Result<(), Error> {
    if record.id() == Some("publicfoldersroot") {
        record.take("mailbox");
    }
    Ok(())
}

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/recurringmasteritemid>
pub static RECURRING_MASTER_ITEM_ID: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("RecurringMasterItemId", Namespace::Types)
            .field(Field::id("id", "OccurrenceId").required())
            .field(Field::id("changekey", "ChangeKey"))
            .build()
            .expect("RecurringMasterItemId schema is statically valid"),
    )
});

/// An identifier addressing a single occurrence of a recurring item by its
/// 1-based index within the series.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/occurrenceitemid>
pub static OCCURRENCE_ITEM_ID: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("OccurrenceItemId", Namespace::Types)
            .field(Field::id("id", "RecurringMasterId").required())
            .field(Field::id("changekey", "ChangeKey"))
            .field(
                Field::int("instance_index", "InstanceIndex")
                    .attribute()
                    .required()
                    .with_min(1),
            )
            .build()
            .expect("OccurrenceItemId schema is statically valid"),
    )
});

/// A single transport header of a message. The header value is the element's
/// own text content.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/internetmessageheader>
pub static MESSAGE_HEADER: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("InternetMessageHeader", Namespace::Types)
            .field(Field::text("name", "HeaderName").attribute())
            .field(Field::text("value", ""))
            .build()
            .expect("InternetMessageHeader schema is statically valid"),
    )
});

fn mailbox_fields() -> Vec<Field> {
    vec![
        Field::text("name", "Name"),
        Field::text("email_address", "EmailAddress"),
        // RoutingType values are not restricted, see
        // <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/routingtype-emailaddresstype>
        Field::text("routing_type", "RoutingType").with_default("SMTP"),
        Field::choice(
            "mailbox_type",
            "MailboxType",
            vec![
                Choice::new("Mailbox"),
                Choice::new("PublicDL"),
                Choice::new("PrivateDL"),
                Choice::new("Contact"),
                Choice::new("PublicFolder"),
                Choice::new("Unknown"),
                Choice::new("OneOff"),
                Choice::new("GroupMailbox").supported_from(ExchangeServerVersion::Exchange2013),
            ],
        )
        .with_default("Mailbox"),
        Field::element("item_id", vec![&*ITEM_ID]).read_only(),
    ]
}

// A OneOff mailbox (a one-off member of a personal distribution list) may
// lack an address, but every other kind needs an address or an item id. See
// the Remarks section of the Mailbox MSDN page.
fn mailbox_post_clean(record: &mut Record) -> Result<(), Error> {
    let is_one_off = record.get("mailbox_type").and_then(Value::as_text) == Some("OneOff");
    if !is_one_off && record.get("email_address").is_none() && record.get("item_id").is_none() {
        return Err(Error::MissingRequiredField {
            name: "email_address".to_owned(),
        });
    }
    Ok(())
}

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/mailbox>
pub static MAILBOX: LazyLock<ElementClass> = LazyLock::new(|| {
    let mut builder = Schema::builder("Mailbox", Namespace::Types);
    for field in mailbox_fields() {
        builder = builder.field(field);
    }
    ElementClass::new(
        builder
            .validator(mailbox_post_clean)
            .build()
            .expect("Mailbox schema is statically valid"),
    )
});

/// Like `Mailbox`, but with a different tag name.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/emailaddress-emailaddresstype>
pub static EMAIL_ADDRESS: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("EmailAddress", Namespace::Types)
            .extend(&MAILBOX.schema())
            .build()
            .expect("EmailAddress schema is statically valid"),
    )
});

#[cfg(test)]
mod tests {
    use super::{DISTINGUISHED_FOLDER_ID, ITEM_ID, MAILBOX, MESSAGE_HEADER};
    use crate::{
        fields::Value,
        record::ParseContext,
        test_utils::{assert_deserialized_content, assert_serialized_content},
        Error,
    };

    #[test]
    fn item_id_round_trips_as_attributes() {
        let mut id = ITEM_ID
            .create([("id", "AAMkAD".into()), ("changekey", "CQAAABYA".into())])
            .expect("creation should succeed");
        assert_serialized_content(&mut id, r#"<t:ItemId Id="AAMkAD" ChangeKey="CQAAABYA"/>"#);
        assert_deserialized_content(r#"<t:ItemId Id="AAMkAD" ChangeKey="CQAAABYA"/>"#, &id);
    }

    #[test]
    fn message_header_value_is_the_element_text() {
        let mut header = MESSAGE_HEADER
            .create([
                ("name", "Received".into()),
                ("value", "from mail.example.com".into()),
            ])
            .expect("creation should succeed");
        assert_serialized_content(
            &mut header,
            r#"<t:InternetMessageHeader HeaderName="Received">from mail.example.com</t:InternetMessageHeader>"#,
        );

        let elem = crate::XmlElement::parse(
            br#"<t:InternetMessageHeader HeaderName="Received">from mail.example.com</t:InternetMessageHeader>"#,
        )
        .expect("parsing should succeed");
        let parsed = MESSAGE_HEADER
            .from_xml(elem, &ParseContext::default())
            .expect("reading should succeed");
        assert_eq!(
            parsed.get("value").and_then(Value::as_text),
            Some("from mail.example.com")
        );
    }

    #[test]
    fn mailbox_requires_an_address_unless_one_off() {
        let mut mailbox = MAILBOX
            .create([("name", "Contoso".into())])
            .expect("creation should succeed");
        let err = mailbox
            .clean(None)
            .expect_err("a mailbox without an address should be rejected");
        assert!(matches!(err, Error::MissingRequiredField { .. }));

        let mut one_off = MAILBOX
            .create([
                ("name", "Contoso".into()),
                ("mailbox_type", "OneOff".into()),
            ])
            .expect("creation should succeed");
        one_off
            .clean(None)
            .expect("a OneOff mailbox may lack an address");
    }

    #[test]
    fn mailbox_defaults_apply_on_clean() {
        let mut mailbox = MAILBOX
            .create([("email_address", "c@example.com".into())])
            .expect("creation should succeed");
        mailbox.clean(None).expect("cleaning should succeed");
        assert_eq!(
            mailbox.get("routing_type").and_then(Value::as_text),
            Some("SMTP"),
            "the routing type should default to SMTP"
        );
        assert_eq!(
            mailbox.get("mailbox_type").and_then(Value::as_text),
            Some("Mailbox")
        );
    }

    #[test]
    fn public_folder_root_drops_its_mailbox() {
        let mailbox = MAILBOX
            .create([("email_address", "c@example.com".into())])
            .expect("creation should succeed");
        let mut folder_id = DISTINGUISHED_FOLDER_ID
            .create([
                ("id", "publicfoldersroot".into()),
                ("mailbox", mailbox.into()),
            ])
            .expect("creation should succeed");

        folder_id.clean(None).expect("cleaning should succeed");
        assert!(
            folder_id.get("mailbox").is_none(),
            "the mailbox should be dropped for the public folder root"
        );
    }
}
