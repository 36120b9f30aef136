//! Fixture libraries built from `native/toy_design.c` by the build script.
//!
//! The toy design exposes:
//!
//! | name    | kind   | shape                          |
//! |---------|--------|--------------------------------|
//! | `clk`   | wire   | 1 bit                          |
//! | `d`     | wire   | 1 bit                          |
//! | `q`     | wire   | 1 bit, `q <= d` on rising clk  |
//! | `nq`    | value  | 1 bit, `~q`                    |
//! | `count` | wire   | 65 bits, increments on clk     |
//! | `bus`   | value  | 8 bits in two 4-bit parts      |
//! | `mem`   | memory | 8 bits x 4                     |

use std::path::Path;

/// Design name the named fixture was built with.
pub const NAMED_DESIGN: &str = "blinky";

/// Every object the toy design exposes, in enumeration order.
pub const OBJECTS: &[&str] = &["clk", "d", "q", "nq", "count", "bus", "mem"];

/// The complete toy design.
pub fn toy_design() -> &'static Path {
    Path::new(env!("TOY_DESIGN_LIB"))
}

/// The toy design with its entry point renamed for [`NAMED_DESIGN`].
pub fn named_design() -> &'static Path {
    Path::new(env!("TOY_NAMED_LIB"))
}

/// Built without `cxxrtl_vcd_read`.
pub fn design_without_vcd_read() -> &'static Path {
    Path::new(env!("TOY_NO_READ_LIB"))
}

/// Built without the optional `cxxrtl_vcd_timescale`.
pub fn design_without_timescale() -> &'static Path {
    Path::new(env!("TOY_NO_TIMESCALE_LIB"))
}
