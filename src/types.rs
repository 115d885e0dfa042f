/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Schemas for the built-in EWS element types.
//!
//! Everything in this module tree is declaration, not logic: each type is a
//! `static` [`crate::ElementClass`] built once on first use. Field lists are
//! ordered exactly as EWS expects them to appear in request payloads.

mod common;
mod folders;
mod items;
mod recurrence;

pub use common::*;
pub use folders::*;
pub use items::*;
pub use recurrence::*;
