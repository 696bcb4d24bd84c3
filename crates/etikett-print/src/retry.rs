// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error classification and the single forced-reconnection retry.
//
// Classifies errors into Transient (one reconnection may fix it), UserAction
// (someone has to do something first) and Permanent (give up). Only
// transient errors are retried, and only once.

use std::future::Future;

use etikett_core::error::EtikettError;
use etikett_core::types::ErrorClass;
use tracing::{debug, info, warn};

/// Classify an `EtikettError` for retry decisions.
pub fn classify_error(err: &EtikettError) -> ErrorClass {
    match err {
        // Transient: the link dropped or went stale.
        EtikettError::Connection(_) => ErrorClass::Transient,
        EtikettError::PrinterNotReachable => ErrorClass::Transient,

        // User action needed
        EtikettError::AccessRequired(_) => ErrorClass::UserAction,
        EtikettError::PrinterNotSelected => ErrorClass::UserAction,
        EtikettError::PrinterNotReadyToPrint(_) => ErrorClass::UserAction,
        EtikettError::DiscoveryCancelled => ErrorClass::UserAction,
        EtikettError::NoPrinterFound => ErrorClass::UserAction,
        EtikettError::Discovery(_) => ErrorClass::UserAction,

        // Permanent
        EtikettError::StatusUnreadable(_) => ErrorClass::Permanent,
        EtikettError::Print(_) => ErrorClass::Permanent,
        EtikettError::Database(_) => ErrorClass::Permanent,
        EtikettError::Serialization(_) => ErrorClass::Permanent,
        EtikettError::PlatformUnavailable => ErrorClass::Permanent,

        // IO errors depend on the kind
        EtikettError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::Interrupted => ErrorClass::Transient,
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ErrorClass::UserAction
            }
            _ => ErrorClass::Permanent,
        },
    }
}

/// True for failures of the transport link itself.
pub fn is_connectivity_failure(err: &EtikettError) -> bool {
    classify_error(err) == ErrorClass::Transient
}

/// Run `attempt(false)`; on a connectivity failure run `attempt(true)`
/// exactly once and return its outcome.
pub async fn with_forced_reconnect<T, F, Fut>(label: &str, mut attempt: F) -> Result<T, EtikettError>
where
    F: FnMut(bool) -> Fut,
    Fut: Future<Output = Result<T, EtikettError>>,
{
    match attempt(false).await {
        Ok(value) => Ok(value),
        Err(e) if is_connectivity_failure(&e) => {
            warn!(step = label, error = %e, "connectivity failure, retrying with a fresh connection");
            let outcome = attempt(true).await;
            match &outcome {
                Ok(_) => info!(step = label, "succeeded after reconnecting"),
                Err(e) => debug!(step = label, error = %e, "failed again after reconnecting"),
            }
            outcome
        }
        Err(e) => {
            debug!(step = label, class = ?classify_error(&e), "not retrying");
            Err(e)
        }
    }
}
