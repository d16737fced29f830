// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// paperwerk-workflow — The document workflow engine.
//
// The registry reviews documents, claims pages, and publishes typed work
// messages on the tube mail bus. Receivers run the stage handlers on Tokio's
// blocking pool, persist the result, and request another review, so each
// document drains forward until nothing is left to do.

pub mod activity;
pub mod intake;
pub mod message;
pub mod registry;
pub mod tube_mail;

pub use activity::{ActivityGuard, ActivityTracker};
pub use intake::DocumentIntake;
pub use message::{Mailbox, Message, WorkMessage};
pub use registry::{Collaborators, DocumentRegistry, ReviewOutcome};
pub use tube_mail::{Receiver, TubeMail};
