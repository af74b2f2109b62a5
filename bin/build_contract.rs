//! Binary for building WASM contracts from odra modules.
#![doc = "Binary for building WASM contracts from odra modules."]

#[allow(unused_imports)]
use yield_vaults;

fn main() {
    // Compilation to WASM is driven by odra-build
}
