/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Folder types.

use std::sync::LazyLock;

use crate::{
    fields::Field,
    schema::{ElementClass, Schema},
    types::common::{FOLDER_ID, PARENT_FOLDER_ID},
    xml::Namespace,
};

fn folder(element_name: &'static str) -> ElementClass {
    ElementClass::new(
        Schema::builder(element_name, Namespace::Types)
            .field(Field::element("folder_id", vec![&*FOLDER_ID]).read_only())
            .field(Field::element("parent_folder_id", vec![&*PARENT_FOLDER_ID]).read_only())
            .field(Field::char("folder_class", "FolderClass").required_after_save())
            .field(Field::char("name", "DisplayName"))
            .field(Field::int("total_count", "TotalCount").read_only())
            .field(Field::int("child_folder_count", "ChildFolderCount").read_only())
            .field(Field::int("unread_count", "UnreadCount").read_only())
            .id_field("folder_id")
            .build()
            .expect("folder schema is statically valid"),
    )
}

/// A generic mail folder.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/folder>
pub static FOLDER: LazyLock<ElementClass> = LazyLock::new(|| folder("Folder"));

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/calendarfolder>
pub static CALENDAR_FOLDER: LazyLock<ElementClass> = LazyLock::new(|| folder("CalendarFolder"));

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/contactsfolder>
pub static CONTACTS_FOLDER: LazyLock<ElementClass> = LazyLock::new(|| folder("ContactsFolder"));

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/tasksfolder>
pub static TASKS_FOLDER: LazyLock<ElementClass> = LazyLock::new(|| folder("TasksFolder"));
