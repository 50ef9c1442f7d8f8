//! Immutable membership snapshots ([`View`]) and the shard descriptors
//! ([`SubView`]) built from them. Neither type mutates once constructed;
//! a membership change produces an entirely new `View`.

mod subview;
mod view;

pub use subview::{make_subview, Layout, SubView};
pub use view::View;
