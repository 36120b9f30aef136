//! Bindings to the C API of CXXRTL simulations compiled into shared libraries.
//!
//! ```no_run
//! use cxxrtl::{BigUint, Library};
//!
//! # fn main() -> cxxrtl::Result<()> {
//! let library = unsafe { Library::open("build/libtop.so")? };
//! let sim = library.instantiate()?;
//! if let Some(clk) = sim.get("clk")? {
//!     clk.set_curr(&BigUint::from(1u32))?;
//!     sim.step();
//! }
//! # Ok(())
//! # }
//! ```

pub mod capi;
pub mod config;
pub mod value;

mod callback;
mod error;
mod handle;
mod library;
mod object;
mod vcd;

// Re-export public API
pub use capi::Object;
pub use error::{Error, Result};
pub use handle::{Handle, Toplevel};
pub use library::{DEFAULT_DESIGN_NAME, Library, LibraryOptions};
pub use num_bigint::BigUint;
pub use object::ObjectType;
pub use vcd::Vcd;
