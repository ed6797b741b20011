//! Test support shared by the workspace crates.
//!
//! `fakes` stands in for the data source and renderer, `fixtures` builds
//! models and catalogs shaped like the shipped configuration, and
//! `generators` produces small deterministic grids.

pub mod fakes;
pub mod fixtures;
pub mod generators;

pub use fakes::{RecordingRenderer, ScriptedSource};
pub use fixtures::*;
pub use generators::*;

/// Assert `|left - right| <= epsilon`, comparing as `f64`.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
