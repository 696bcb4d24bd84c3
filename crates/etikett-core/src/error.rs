// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Etikett.

use thiserror::Error;

use crate::types::PrinterState;

/// Top-level error type for all Etikett operations.
#[derive(Debug, Error)]
pub enum EtikettError {
    // -- Orchestration outcomes --
    #[error("access rights required: {}", .0.join(", "))]
    AccessRequired(Vec<String>),

    #[error("no printer selected")]
    PrinterNotSelected,

    #[error("printer not reachable")]
    PrinterNotReachable,

    #[error("printer not ready to print: {0}")]
    PrinterNotReadyToPrint(PrinterState),

    #[error("printer discovery cancelled")]
    DiscoveryCancelled,

    #[error("no printer found")]
    NoPrinterFound,

    // -- Transport errors --
    #[error("printer discovery failed: {0}")]
    Discovery(String),

    #[error("printer connection failed: {0}")]
    Connection(String),

    #[error("printer status unreadable: {0}")]
    StatusUnreadable(String),

    #[error("print failed: {0}")]
    Print(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EtikettError>;
