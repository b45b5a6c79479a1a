// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Münzwerk Print — the physical-printer collaborator: a gateway trait the
// dispatcher depends on, and an IPP implementation of it.

pub mod gateway;
pub mod ipp_gateway;

pub use gateway::{PrinterGateway, PrinterTarget, SubmittedJob};
pub use ipp_gateway::IppGateway;
