/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Recurrence patterns, boundaries and occurrences.
//!
//! A recurrence is the combination of a pattern element (which days the
//! series falls on) and a boundary element (when the series starts and
//! stops). Both slots are polymorphic; the child element's tag selects the
//! concrete type.

use std::sync::LazyLock;

use crate::{
    fields::{Field, MONTHS, WEEKDAYS, WEEK_NUMBERS},
    schema::{ElementClass, Schema},
    types::common::ITEM_ID,
    xml::Namespace,
};

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/absoluteyearlyrecurrence>
pub static ABSOLUTE_YEARLY_RECURRENCE: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("AbsoluteYearlyRecurrence", Namespace::Types)
            // If the month has fewer days than day_of_month, the last day of
            // the month is assumed.
            .field(
                Field::int("day_of_month", "DayOfMonth")
                    .with_min(1)
                    .with_max(31)
                    .required(),
            )
            .field(Field::enumeration("month", "Month", MONTHS).required())
            .build()
            .expect("AbsoluteYearlyRecurrence schema is statically valid"),
    )
});

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/relativeyearlyrecurrence>
pub static RELATIVE_YEARLY_RECURRENCE: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("RelativeYearlyRecurrence", Namespace::Types)
            .field(Field::enumeration("weekday", "DaysOfWeek", WEEKDAYS).required())
            .field(Field::enumeration("week_number", "DayOfWeekIndex", WEEK_NUMBERS).required())
            .field(Field::enumeration("month", "Month", MONTHS).required())
            .build()
            .expect("RelativeYearlyRecurrence schema is statically valid"),
    )
});

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/absolutemonthlyrecurrence>
pub static ABSOLUTE_MONTHLY_RECURRENCE: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("AbsoluteMonthlyRecurrence", Namespace::Types)
            .field(
                Field::int("interval", "Interval")
                    .with_min(1)
                    .with_max(99)
                    .required(),
            )
            .field(
                Field::int("day_of_month", "DayOfMonth")
                    .with_min(1)
                    .with_max(31)
                    .required(),
            )
            .build()
            .expect("AbsoluteMonthlyRecurrence schema is statically valid"),
    )
});

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/relativemonthlyrecurrence>
pub static RELATIVE_MONTHLY_RECURRENCE: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("RelativeMonthlyRecurrence", Namespace::Types)
            .field(
                Field::int("interval", "Interval")
                    .with_min(1)
                    .with_max(99)
                    .required(),
            )
            .field(Field::enumeration("weekday", "DaysOfWeek", WEEKDAYS).required())
            .field(Field::enumeration("week_number", "DayOfWeekIndex", WEEK_NUMBERS).required())
            .build()
            .expect("RelativeMonthlyRecurrence schema is statically valid"),
    )
});

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/weeklyrecurrence>
pub static WEEKLY_RECURRENCE: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("WeeklyRecurrence", Namespace::Types)
            .field(
                Field::int("interval", "Interval")
                    .with_min(1)
                    .with_max(99)
                    .required(),
            )
            .field(Field::enum_list("weekdays", "DaysOfWeek", WEEKDAYS).required())
            .field(
                Field::enumeration("first_day_of_week", "FirstDayOfWeek", WEEKDAYS)
                    .with_default(1)
                    .required(),
            )
            .build()
            .expect("WeeklyRecurrence schema is statically valid"),
    )
});

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/dailyrecurrence>
pub static DAILY_RECURRENCE: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("DailyRecurrence", Namespace::Types)
            .field(
                Field::int("interval", "Interval")
                    .with_min(1)
                    .with_max(999)
                    .required(),
            )
            .build()
            .expect("DailyRecurrence schema is statically valid"),
    )
});

fn regeneration(element_name: &'static str) -> ElementClass {
    ElementClass::new(
        Schema::builder(element_name, Namespace::Types)
            .field(Field::int("interval", "Interval").with_min(1).required())
            .build()
            .expect("regeneration schema is statically valid"),
    )
}

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/yearlyregeneration>
pub static YEARLY_REGENERATION: LazyLock<ElementClass> =
    LazyLock::new(|| regeneration("YearlyRegeneration"));

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/monthlyregeneration>
pub static MONTHLY_REGENERATION: LazyLock<ElementClass> =
    LazyLock::new(|| regeneration("MonthlyRegeneration"));

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/weeklyregeneration>
pub static WEEKLY_REGENERATION: LazyLock<ElementClass> =
    LazyLock::new(|| regeneration("WeeklyRegeneration"));

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/dailyregeneration>
pub static DAILY_REGENERATION: LazyLock<ElementClass> =
    LazyLock::new(|| regeneration("DailyRegeneration"));

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/noendrecurrence>
pub static NO_END_RECURRENCE: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("NoEndRecurrence", Namespace::Types)
            .field(Field::date("start", "StartDate").required())
            .build()
            .expect("NoEndRecurrence schema is statically valid"),
    )
});

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/enddaterecurrence>
pub static END_DATE_RECURRENCE: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("EndDateRecurrence", Namespace::Types)
            .field(Field::date("start", "StartDate").required())
            .field(Field::date("end", "EndDate").required())
            .build()
            .expect("EndDateRecurrence schema is statically valid"),
    )
});

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/numberedrecurrence>
pub static NUMBERED_RECURRENCE: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("NumberedRecurrence", Namespace::Types)
            .field(Field::date("start", "StartDate").required())
            .field(
                Field::int("number", "NumberOfOccurrences")
                    .with_min(1)
                    .with_max(999)
                    .required(),
            )
            .build()
            .expect("NumberedRecurrence schema is statically valid"),
    )
});

fn pattern_classes() -> Vec<&'static ElementClass> {
    vec![
        &*ABSOLUTE_YEARLY_RECURRENCE,
        &*RELATIVE_YEARLY_RECURRENCE,
        &*ABSOLUTE_MONTHLY_RECURRENCE,
        &*RELATIVE_MONTHLY_RECURRENCE,
        &*WEEKLY_RECURRENCE,
        &*DAILY_RECURRENCE,
    ]
}

fn boundary_classes() -> Vec<&'static ElementClass> {
    vec![
        &*NO_END_RECURRENCE,
        &*END_DATE_RECURRENCE,
        &*NUMBERED_RECURRENCE,
    ]
}

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/recurrence-recurrencetype>
pub static RECURRENCE: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("Recurrence", Namespace::Types)
            .field(Field::element("pattern", pattern_classes()))
            .field(Field::element("boundary", boundary_classes()))
            .build()
            .expect("Recurrence schema is statically valid"),
    )
});

/// Like `Recurrence`, but for tasks, which additionally allow regenerating
/// patterns (repeating relative to task completion).
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/recurrence-taskrecurrencetype>
pub static TASK_RECURRENCE: LazyLock<ElementClass> = LazyLock::new(|| {
    let mut patterns = pattern_classes();
    patterns.extend([
        &*YEARLY_REGENERATION,
        &*MONTHLY_REGENERATION,
        &*WEEKLY_REGENERATION,
        &*DAILY_REGENERATION,
    ]);
    ElementClass::new(
        Schema::builder("Recurrence", Namespace::Types)
            .field(Field::element("pattern", patterns))
            .field(Field::element("boundary", boundary_classes()))
            .build()
            .expect("task Recurrence schema is statically valid"),
    )
});

fn occurrence(element_name: &'static str) -> ElementClass {
    ElementClass::new(
        Schema::builder(element_name, Namespace::Types)
            .field(Field::element("item_id", vec![&*ITEM_ID]).read_only())
            .field(Field::datetime("start", "Start"))
            .field(Field::datetime("end", "End"))
            .field(Field::datetime("original_start", "OriginalStart"))
            .id_field("item_id")
            .build()
            .expect("occurrence schema is statically valid"),
    )
}

/// A single modified occurrence of a recurring item.
///
/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/occurrence>
pub static OCCURRENCE: LazyLock<ElementClass> = LazyLock::new(|| occurrence("Occurrence"));

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/firstoccurrence>
pub static FIRST_OCCURRENCE: LazyLock<ElementClass> =
    LazyLock::new(|| occurrence("FirstOccurrence"));

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/lastoccurrence>
pub static LAST_OCCURRENCE: LazyLock<ElementClass> =
    LazyLock::new(|| occurrence("LastOccurrence"));

/// See <https://learn.microsoft.com/en-us/exchange/client-developer/web-service-reference/deletedoccurrence>
pub static DELETED_OCCURRENCE: LazyLock<ElementClass> = LazyLock::new(|| {
    ElementClass::new(
        Schema::builder("DeletedOccurrence", Namespace::Types)
            .field(Field::datetime("start", "Start"))
            .build()
            .expect("DeletedOccurrence schema is statically valid"),
    )
});
