// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The main eht-imfit binary.

use clap::Parser;

use eht_imfit::{Imfit, ImfitError};

fn main() {
    // Exit with code 1 on an error, printing its Display representation
    // rather than Debug.
    std::process::exit(match main2() {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    });
}

fn main2() -> Result<(), ImfitError> {
    Imfit::parse().run()
}
