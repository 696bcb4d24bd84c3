// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Etikett: capability interfaces and platform bridges.
//
// The engine in `etikett-print` talks to radios, stores, pickers and payload
// writers only through the traits in `traits`. Mobile front ends provide
// their own `PlatformBridge`; desktop builds get the radio-less stub.

pub mod stub;
pub mod traits;

use std::sync::Arc;

/// Returns the bridge for the current platform.
pub fn platform_bridge() -> Arc<dyn traits::PlatformBridge> {
    Arc::new(stub::StubBridge)
}
