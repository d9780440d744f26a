// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Build script for the Krait DVFS engine.

use std::env;

/// The SoCs which have frequency plans and register maps in `src/platform`.
const PLATFORMS: [&str; 2] = ["msm8960", "apq8064"];

fn main() {
    println!(
        "cargo::rustc-check-cfg=cfg(platform, values(\"{}\"))",
        PLATFORMS.join("\", \""),
    );
    println!("cargo::rerun-if-env-changed=LOG_LEVEL");

    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("none") {
        let platform = env::var("CARGO_CFG_PLATFORM").expect("Missing platform name");
        if !PLATFORMS.contains(&platform.as_str()) {
            panic!("Unexpected platform name {platform:?}. Supported platforms: {PLATFORMS:?}");
        }
    }
}
