// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Highlight flag shared by every renderable entity.
//!
//! Viewers mark the entities touched by the current event; the algorithms
//! themselves never read the flag.

/// An entity that a viewer can highlight.
pub trait Highlight {
    /// Returns `true` if the entity is currently highlighted.
    fn is_highlighted(&self) -> bool;

    /// Sets or clears the highlight flag.
    fn set_highlight(&mut self, highlight: bool);
}

/// Implements [`Highlight`] for structs with a `highlighted: bool` field.
#[macro_export]
macro_rules! impl_highlight {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Highlight for $ty {
                #[inline]
                fn is_highlighted(&self) -> bool {
                    self.highlighted
                }

                #[inline]
                fn set_highlight(&mut self, highlight: bool) {
                    self.highlighted = highlight;
                }
            }
        )+
    };
}
