// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Münzwerk Engine — orchestration of the kiosk's credit-ledger and
// print-dispatch transaction.  The dispatcher implements the
// charge-and-print state machine; the service layer wires it to the store
// and the document/printer collaborators and exposes the kiosk operations.

pub mod dispatcher;
pub mod services;
pub mod upload;

pub use dispatcher::{Dispatcher, PrintReceipt};
pub use services::{KioskServices, KioskStatus, UploadReceipt};
