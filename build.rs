//! Build script embedding build metadata for the startup log line.
//!
//! `VERGEN_GIT_SHA` and `VERGEN_BUILD_TIMESTAMP` are read back with `option_env!`
//! in `logging::build_info`. Builds without a `.git` directory (container images,
//! source tarballs) can pass the values through the environment instead.

use std::error::Error;
use vergen_gix::{Build, Emitter, Gix};

fn main() -> Result<(), Box<dyn Error>> {
    let provided_by_env = std::env::var("VERGEN_GIT_SHA").is_ok()
        || std::env::var("VERGEN_BUILD_TIMESTAMP").is_ok();

    if provided_by_env {
        println!("cargo:warning=Using build metadata from environment variables");
        return Ok(());
    }

    // vergen leaves the values empty when git is unavailable
    let build = Build::all_build();
    let gix = Gix::all_git();
    Emitter::default()
        .add_instructions(&build)?
        .add_instructions(&gix)?
        .emit()?;
    Ok(())
}
