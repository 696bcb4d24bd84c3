// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the people standing next to the printer.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Front ends use the severity to choose between "try again", "fix the
// printer" and "give up" presentations.

use crate::error::EtikettError;
use crate::types::PrinterState;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Connection blip. Trying again may work.
    Transient,
    /// User must do something (load labels, close the head, pick a printer).
    ActionRequired,
    /// Cannot be fixed by retrying or user action.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether trying the same request again can succeed without user action.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: &str, suggestion: impl Into<String>, retriable: bool, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable,
            severity,
        }
    }
}

/// Convert an `EtikettError` into a `HumanError`.
pub fn humanize_error(err: &EtikettError) -> HumanError {
    match err {
        EtikettError::AccessRequired(missing) => HumanError::new(
            "The app needs permission to look for printers.",
            format!("Grant the requested permissions, then try again. (Missing: {})", missing.join(", ")),
            false,
            Severity::ActionRequired,
        ),

        EtikettError::PrinterNotSelected => HumanError::new(
            "No printer selected.",
            "Search for a printer and choose one, then try again.",
            false,
            Severity::ActionRequired,
        ),

        EtikettError::PrinterNotReachable => HumanError::new(
            "We can't reach your printer.",
            "Check that the printer is switched on and in range, then try again.",
            true,
            Severity::Transient,
        ),

        EtikettError::PrinterNotReadyToPrint(state) => humanize_state(state),

        EtikettError::DiscoveryCancelled => HumanError::new(
            "Printer search cancelled.",
            "Nothing was printed. Start again when you're ready to choose a printer.",
            false,
            Severity::ActionRequired,
        ),

        EtikettError::NoPrinterFound => HumanError::new(
            "We couldn't find any printers.",
            "Make sure the printer is switched on, paired or on the same network, then search again.",
            true,
            Severity::ActionRequired,
        ),

        EtikettError::Discovery(detail) => {
            let lower = detail.to_ascii_lowercase();
            if lower.contains("disabled") {
                HumanError::new(
                    "Bluetooth is switched off.",
                    "Turn Bluetooth on, then search again.",
                    false,
                    Severity::ActionRequired,
                )
            } else if lower.contains("no ") && lower.contains("radio") {
                HumanError::new(
                    "This device has no Bluetooth radio.",
                    "Use a network printer, or disable Bluetooth searches in the settings.",
                    false,
                    Severity::Permanent,
                )
            } else {
                HumanError::new(
                    "We can't search for printers right now.",
                    format!("Check your connections, then try again. ({detail})"),
                    true,
                    Severity::Transient,
                )
            }
        }

        EtikettError::Connection(detail) => {
            if detail.to_ascii_lowercase().contains("timed out") {
                HumanError::new(
                    "The printer didn't respond in time.",
                    "The printer might be asleep, busy or out of range. Check it's on, then try again.",
                    true,
                    Severity::Transient,
                )
            } else {
                HumanError::new(
                    "The connection to the printer was interrupted.",
                    "Move closer to the printer or check its network cable, then try again.",
                    true,
                    Severity::Transient,
                )
            }
        }

        EtikettError::StatusUnreadable(_) => HumanError::new(
            "The printer sent a reply we don't understand.",
            "Make sure this is a supported label printer. Turning it off and on again may help.",
            false,
            Severity::Permanent,
        ),

        EtikettError::Print(detail) => HumanError::new(
            "The label couldn't be printed.",
            format!("Try again. If this keeps happening, restart the printer. (Detail: {detail})"),
            true,
            Severity::Transient,
        ),

        // -- Storage --
        EtikettError::Database(_) => HumanError::new(
            "The app couldn't remember your printer choice.",
            "Try again. You may be asked to choose the printer once more.",
            true,
            Severity::Transient,
        ),

        EtikettError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError::new(
                    "The file couldn't be found.",
                    "It may have been moved or deleted. Try choosing the file again.",
                    false,
                    Severity::ActionRequired,
                )
            } else {
                HumanError::new(
                    "There was a problem reading or writing a file.",
                    "Try again. If this keeps happening, your device's storage may be full.",
                    true,
                    Severity::Transient,
                )
            }
        }

        EtikettError::Serialization(_) => HumanError::new(
            "The app had an internal data problem.",
            "Try again. If this keeps happening, please report it.",
            true,
            Severity::Transient,
        ),

        // -- Platform --
        EtikettError::PlatformUnavailable => HumanError::new(
            "This kind of printer connection isn't available on your device.",
            "Use a network printer instead.",
            false,
            Severity::Permanent,
        ),
    }
}

/// Describe a physical printer fault.
fn humanize_state(state: &PrinterState) -> HumanError {
    let (message, suggestion) = if state.paper_out {
        ("The printer is out of labels.", "Load a new roll of labels, then try again.")
    } else if state.head_open {
        ("The printer's lid is open.", "Close the print head lid until it clicks, then try again.")
    } else if state.ribbon_out {
        ("The printer's ribbon has run out.", "Fit a new ribbon, then try again.")
    } else if state.head_too_hot {
        ("The print head is too hot.", "Let the printer cool down for a few minutes, then try again.")
    } else if state.head_cold {
        ("The print head is too cold.", "Give the printer a minute to warm up, then try again.")
    } else if state.receive_buffer_full {
        ("The printer is still busy with earlier labels.", "Wait for it to finish, then try again.")
    } else if state.paused {
        ("The printer is paused.", "Press the pause button on the printer to resume, then try again.")
    } else {
        ("The printer isn't ready.", "Check the printer's display, then try again.")
    };
    HumanError::new(message, suggestion, false, Severity::ActionRequired)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_transient() {
        let err = EtikettError::Connection("connect to 10.0.0.7:9100 timed out after 15s".into());
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
        assert!(human.message.contains("respond"));
    }

    #[test]
    fn no_printer_selected_is_action_required() {
        let human = humanize_error(&EtikettError::PrinterNotSelected);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
    }

    #[test]
    fn paper_out_names_the_fault() {
        let state = PrinterState { paper_out: true, paused: true, ..Default::default() };
        let human = humanize_error(&EtikettError::PrinterNotReadyToPrint(state));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.message.contains("out of labels"));
    }

    #[test]
    fn disabled_radio_asks_user_to_enable_it() {
        let err = EtikettError::Discovery("Bluetooth radio is currently disabled".into());
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::ActionRequired);
    }

    #[test]
    fn missing_radio_is_permanent() {
        let err = EtikettError::Discovery("no short-range radio found".into());
        assert_eq!(humanize_error(&err).severity, Severity::Permanent);
    }
}
