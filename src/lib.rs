// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Model-image scoring software for Event Horizon Telescope (EHT) VLBI
//! observations.
//!
//! <https://eventhorizontelescope.org>

pub mod cli;
pub mod constants;
pub mod coord;
pub mod fit;
pub mod grrt;
pub mod image;
pub(crate) mod io;
pub(crate) mod math;
pub mod obs;
#[cfg(feature = "plotting")]
pub mod plot;
pub mod sim;
pub mod sources;

pub use cli::{Imfit, ImfitError};

use crossbeam_utils::atomic::AtomicCell;

/// Are progress bars being drawn? The CLI sets this once at startup.
pub(crate) static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
