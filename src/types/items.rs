/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Item types: the base item schema plus messages, calendar items and
//! contacts.

use std::sync::LazyLock;

use crate::{
    fields::{Choice, Field},
    schema::{ElementClass, Schema, SchemaBuilder},
    types::common::{CONVERSATION_ID, ITEM_ID, MAILBOX, MESSAGE_HEADER, PARENT_FOLDER_ID},
    types::recurrence::{
        DELETED_OCCURRENCE, FIRST_OCCURRENCE, LAST_OCCURRENCE, OCCURRENCE, RECURRENCE,
    },
    version::ExchangeServerVersion,
    xml::Namespace,
};

fn item_builder(element_name: &'static str) -> SchemaBuilder {
    Schema::builder(element_name, Namespace::Types)
        .field(Field::element("item_id", vec![&*ITEM_ID]).read_only())
        .field(Field::element("parent_folder_id", vec![&*PARENT_FOLDER_ID]).read_only())
        .field(Field::char("item_class", "ItemClass").read_only())
        .field(Field::char("subject", "Subject"))
        .field(
            Field::choice(
                "sensitivity",
                "Sensitivity",
                vec![
                    Choice::new("Normal"),
                    Choice::new("Personal"),
                    Choice::new("Private"),
                    Choice::new("Confidential"),
                ],
            )
            .with_default("Normal")
            .required(),
        )
        .field(Field::text("body", "Body"))
        .field(Field::datetime("datetime_received", "DateTimeReceived").read_only())
        .field(Field::int("size", "Size").read_only())
        .field(Field::text_list("categories", "Categories"))
        .field(
            Field::choice(
                "importance",
                "Importance",
                vec![
                    Choice::new("Low"),
                    Choice::new("Normal"),
                    Choice::new("High"),
                ],
            )
            .with_default("Normal")
            .required(),
        )
        .field(Field::text("in_reply_to", "InReplyTo"))
        .field(Field::bool("is_draft", "IsDraft").read_only())
        .field(
            Field::element_list(
                "headers",
                "InternetMessageHeaders",
                vec![&*MESSAGE_HEADER],
            )
            .read_only(),
        )
        .field(Field::datetime("datetime_sent", "DateTimeSent").read_only())
        .field(Field::datetime("datetime_created", "DateTimeCreated").read_only())
        .field(
            Field::bool("reminder_is_set", "ReminderIsSet")
                .with_default(false)
                .required(),
        )
        .field(
            Field::element("conversation_id", vec![&*CONVERSATION_ID])
                .read_only()
                .supported_from(ExchangeServerVersion::Exchange2010),
        )
        .field(Field::char("culture", "Culture"))
        .field(Field::datetime("last_modified_time", "LastModifiedTime").read_only())
        .id_field("item_id")
}

/// The base Exchange item.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/item>
pub static ITEM: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        item_builder("Item")
            .build()
            .expect("Item schema is statically valid"),
    )
});

/// An email message.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/message-ex15websvcsotherref>
pub static MESSAGE: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        item_builder("Message")
            .field(
                Field::wrapped_element("sender", "Sender", vec![&*MAILBOX])
                    .read_only_after_send(),
            )
            .field(Field::element_list("to_recipients", "ToRecipients", vec![&*MAILBOX]))
            .field(Field::element_list("cc_recipients", "CcRecipients", vec![&*MAILBOX]))
            .field(Field::element_list("bcc_recipients", "BccRecipients", vec![&*MAILBOX]))
            .field(
                Field::bool("is_read_receipt_requested", "IsReadReceiptRequested")
                    .with_default(false)
                    .required(),
            )
            .field(
                Field::bool("is_delivery_receipt_requested", "IsDeliveryReceiptRequested")
                    .with_default(false)
                    .required(),
            )
            .field(Field::char("message_id", "InternetMessageId").read_only_after_send())
            .field(
                Field::bool("is_read", "IsRead")
                    .with_default(false)
                    .required(),
            )
            .field(Field::text("references", "References"))
            .field(Field::element_list("reply_to", "ReplyTo", vec![&*MAILBOX]))
            .build()
            .expect("Message schema is statically valid"),
    )
});

/// A meeting participant with their response state.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/attendee>
pub static ATTENDEE: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("Attendee", Namespace::Types)
            .field(Field::element("mailbox", vec![&*MAILBOX]).required())
            .field(
                Field::choice(
                    "response_type",
                    "ResponseType",
                    vec![
                        Choice::new("Unknown"),
                        Choice::new("Organizer"),
                        Choice::new("Tentative"),
                        Choice::new("Accept"),
                        Choice::new("Decline"),
                        Choice::new("NoResponseReceived"),
                    ],
                )
                .with_default("Unknown")
                .read_only(),
            )
            .field(Field::datetime("last_response_time", "LastResponseTime").read_only())
            .build()
            .expect("Attendee schema is statically valid"),
    )
});

/// A calendar event, possibly recurring.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/calendaritem>
pub static CALENDAR_ITEM: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        item_builder("CalendarItem")
            .field(Field::datetime("start", "Start"))
            .field(Field::datetime("end", "End"))
            .field(Field::bool("is_all_day_event", "IsAllDayEvent").with_default(false))
            .field(
                Field::choice(
                    "legacy_free_busy_status",
                    "LegacyFreeBusyStatus",
                    vec![
                        Choice::new("Free"),
                        Choice::new("Tentative"),
                        Choice::new("Busy"),
                        Choice::new("OOF"),
                        Choice::new("NoData"),
                        Choice::new("WorkingElsewhere")
                            .supported_from(ExchangeServerVersion::Exchange2013),
                    ],
                )
                .with_default("Busy")
                .required(),
            )
            .field(Field::char("location", "Location"))
            .field(Field::bool("is_meeting", "IsMeeting").read_only())
            .field(Field::bool("is_cancelled", "IsCancelled").read_only())
            .field(Field::bool("is_recurring", "IsRecurring").read_only())
            .field(Field::element_list(
                "required_attendees",
                "RequiredAttendees",
                vec![&*ATTENDEE],
            ))
            .field(Field::element_list(
                "optional_attendees",
                "OptionalAttendees",
                vec![&*ATTENDEE],
            ))
            .field(Field::element_list("resources", "Resources", vec![&*ATTENDEE]))
            .field(Field::element("recurrence", vec![&*RECURRENCE]))
            .field(Field::element("first_occurrence", vec![&*FIRST_OCCURRENCE]).read_only())
            .field(Field::element("last_occurrence", vec![&*LAST_OCCURRENCE]).read_only())
            .field(
                Field::element_list(
                    "modified_occurrences",
                    "ModifiedOccurrences",
                    vec![&*OCCURRENCE],
                )
                .read_only(),
            )
            .field(
                Field::element_list(
                    "deleted_occurrences",
                    "DeletedOccurrences",
                    vec![&*DELETED_OCCURRENCE],
                )
                .read_only(),
            )
            .build()
            .expect("CalendarItem schema is statically valid"),
    )
});

/// A contact.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/contact>
pub static CONTACT: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        item_builder("Contact")
            .field(Field::text("file_as", "FileAs"))
            .field(Field::choice(
                "file_as_mapping",
                "FileAsMapping",
                vec![
                    Choice::new("None"),
                    Choice::new("LastCommaFirst"),
                    Choice::new("FirstSpaceLast"),
                    Choice::new("Company"),
                    Choice::new("LastCommaFirstCompany"),
                    Choice::new("CompanyLastFirst"),
                    Choice::new("LastFirst"),
                    Choice::new("LastFirstCompany"),
                    Choice::new("CompanyLastCommaFirst"),
                    Choice::new("LastFirstSuffix"),
                    Choice::new("LastSpaceFirstCompany"),
                    Choice::new("CompanyLastSpaceFirst"),
                    Choice::new("LastSpaceFirst"),
                    Choice::new("DisplayName"),
                    Choice::new("FirstName"),
                    Choice::new("LastFirstMiddleSuffix"),
                    Choice::new("LastName"),
                    Choice::new("Empty"),
                ],
            ))
            .field(Field::text("display_name", "DisplayName").required())
            .field(Field::char("given_name", "GivenName"))
            .field(Field::text("initials", "Initials"))
            .field(Field::char("middle_name", "MiddleName"))
            .field(Field::text("nickname", "Nickname"))
            .field(Field::text("company_name", "CompanyName"))
            .field(Field::text("assistant_name", "AssistantName"))
            .field(Field::date("birthday", "Birthday"))
            .field(Field::text("business_homepage", "BusinessHomePage"))
            .field(Field::text_list("children", "Children"))
            .field(Field::text_list("companies", "Companies").unsearchable())
            .field(
                Field::choice(
                    "contact_source",
                    "ContactSource",
                    vec![Choice::new("Store"), Choice::new("ActiveDirectory")],
                )
                .read_only(),
            )
            .field(Field::text("department", "Department"))
            .field(Field::text("generation", "Generation"))
            .field(Field::char("im_addresses", "ImAddresses").read_only())
            .field(Field::text("job_title", "JobTitle"))
            .field(Field::text("manager", "Manager"))
            .field(Field::text("mileage", "Mileage"))
            .field(Field::text("office", "OfficeLocation"))
            .field(
                Field::choice(
                    "postal_address_index",
                    "PostalAddressIndex",
                    vec![
                        Choice::new("Business"),
                        Choice::new("Home"),
                        Choice::new("Other"),
                        Choice::new("None"),
                    ],
                )
                .with_default("None")
                .required_after_save(),
            )
            .field(Field::text("profession", "Profession"))
            .field(Field::text("spouse_name", "SpouseName"))
            .field(Field::char("surname", "Surname"))
            .field(Field::date("wedding_anniversary", "WeddingAnniversary"))
            .field(
                Field::bool("has_picture", "HasPicture")
                    .supported_from(ExchangeServerVersion::Exchange2010)
                    .read_only(),
            )
            .field(
                Field::text("phonetic_full_name", "PhoneticFullName")
                    .supported_from(ExchangeServerVersion::Exchange2013)
                    .read_only(),
            )
            .field(
                Field::text("phonetic_first_name", "PhoneticFirstName")
                    .supported_from(ExchangeServerVersion::Exchange2013)
                    .read_only(),
            )
            .field(
                Field::text("phonetic_last_name", "PhoneticLastName")
                    .supported_from(ExchangeServerVersion::Exchange2013)
                    .read_only(),
            )
            .field(Field::text("email_alias", "Alias").read_only())
            // Documented in MSDN but apparently unused; writing to it draws
            // ErrorInvalidPropertyRequest.
            .field(
                Field::char("notes", "Notes")
                    .supported_from(ExchangeServerVersion::Exchange2013)
                    .read_only(),
            )
            .field(Field::base64("photo", "Photo").read_only())
            .field(
                Field::base64("user_smime_certificate", "UserSMIMECertificate")
                    .supported_from(ExchangeServerVersion::Exchange2010_SP2)
                    .read_only(),
            )
            .field(
                Field::base64("ms_exchange_certificate", "MSExchangeCertificate")
                    .supported_from(ExchangeServerVersion::Exchange2010_SP2)
                    .read_only(),
            )
            .field(
                Field::text("directory_id", "DirectoryId")
                    .supported_from(ExchangeServerVersion::Exchange2013)
                    .read_only(),
            )
            .field(
                Field::char("manager_mailbox", "ManagerMailbox")
                    .supported_from(ExchangeServerVersion::Exchange2010_SP2)
                    .read_only(),
            )
            .field(
                Field::char("direct_reports", "DirectReports")
                    .supported_from(ExchangeServerVersion::Exchange2010_SP2)
                    .read_only(),
            )
            .build()
            .expect("Contact schema is statically valid"),
    )
});

#[cfg(test)]
mod tests {
    use super::{CALENDAR_ITEM, CONTACT, ITEM, MESSAGE};
    use crate::{
        fields::Value, record::ParseContext, types::common::MAILBOX, version::ExchangeServerVersion,
        Error, XmlElement,
    };

    #[test]
    fn message_serializes_recipients_and_defaults() {
        let to = MAILBOX
            .create([("email_address", "a@example.com".into())])
            .expect("creation should succeed");
        let mut message = MESSAGE
            .create([
                ("subject", "hello".into()),
                ("to_recipients", Value::list([to.into()])),
            ])
            .expect("creation should succeed");

        let xml = message
            .to_xml(None)
            .expect("serialization should succeed")
            .to_xml_string()
            .expect("writing should succeed");
        assert_eq!(
            xml,
            "<t:Message><t:Subject>hello</t:Subject>\
             <t:Sensitivity>Normal</t:Sensitivity>\
             <t:Importance>Normal</t:Importance>\
             <t:ReminderIsSet>false</t:ReminderIsSet>\
             <t:ToRecipients><t:Mailbox>\
             <t:EmailAddress>a@example.com</t:EmailAddress>\
             <t:RoutingType>SMTP</t:RoutingType>\
             <t:MailboxType>Mailbox</t:MailboxType>\
             </t:Mailbox></t:ToRecipients>\
             <t:IsReadReceiptRequested>false</t:IsReadReceiptRequested>\
             <t:IsDeliveryReceiptRequested>false</t:IsDeliveryReceiptRequested>\
             <t:IsRead>false</t:IsRead></t:Message>"
        );
    }

    #[test]
    fn message_reads_headers_and_identity_from_a_response_fragment() {
        let xml = r#"<t:Message>
            <t:ItemId Id="AAMk" ChangeKey="CQAA"/>
            <t:Subject>hello</t:Subject>
            <t:IsDraft>false</t:IsDraft>
            <t:InternetMessageHeaders>
                <t:InternetMessageHeader HeaderName="Received">by mail.example.com</t:InternetMessageHeader>
                <t:InternetMessageHeader HeaderName="Message-ID">&lt;abc@example.com&gt;</t:InternetMessageHeader>
            </t:InternetMessageHeaders>
        </t:Message>"#;
        let elem = XmlElement::parse(xml.as_bytes()).expect("parsing should succeed");
        let message = MESSAGE
            .from_xml(elem, &ParseContext::default())
            .expect("reading should succeed");

        assert_eq!(message.id(), Some("AAMk"));
        assert_eq!(message.get("is_draft").and_then(Value::as_bool), Some(false));

        let headers = message
            .get("headers")
            .and_then(Value::as_list)
            .expect("headers should be present");
        assert_eq!(headers.len(), 2);
        let second = headers[1].as_element().expect("entry should be an element");
        assert_eq!(second.get("name").and_then(Value::as_text), Some("Message-ID"));
        assert_eq!(
            second.get("value").and_then(Value::as_text),
            Some("<abc@example.com>"),
            "header values should be unescaped on read"
        );
    }

    #[test]
    fn calendar_item_gates_working_elsewhere_by_version() {
        let mut event = CALENDAR_ITEM
            .create([
                ("subject", "standup".into()),
                ("legacy_free_busy_status", "WorkingElsewhere".into()),
            ])
            .expect("creation should succeed");

        let err = event
            .clean(Some(ExchangeServerVersion::Exchange2010))
            .expect_err("WorkingElsewhere should be rejected before Exchange 2013");
        assert!(matches!(err, Error::InvalidChoiceForVersion { .. }));

        event
            .clean(Some(ExchangeServerVersion::Exchange2013))
            .expect("WorkingElsewhere is valid from Exchange 2013");
    }

    #[test]
    fn contact_version_gated_fields_skip_old_servers_when_unset() {
        let mut contact = CONTACT
            .create([("display_name", "Ada".into())])
            .expect("creation should succeed");
        contact
            .clean(Some(ExchangeServerVersion::Exchange2007))
            .expect("unset version-gated fields should not fail old versions");
    }

    #[test]
    fn base_item_and_subtypes_share_field_declarations() {
        let item_fields: Vec<_> = ITEM
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_owned())
            .collect();
        let message_fields: Vec<_> = MESSAGE
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_owned())
            .collect();
        assert_eq!(
            &message_fields[..item_fields.len()],
            &item_fields[..],
            "subtype fields should start with the base item fields in order"
        );
    }
}
