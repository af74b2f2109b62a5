#![cfg_attr(not(test), no_std)]
#![cfg_attr(not(test), no_main)]
extern crate alloc;

// Share accounting shared by every vault kind
pub mod accounting;
pub mod errors;
pub mod events;
pub mod math;
pub mod vault;

// Vault factories
pub mod lending;
pub mod staking;
pub mod delta_neutral;

// Reference markets the strategies plug into
pub mod markets;
pub mod token;

#[cfg(test)]
mod testing;
