// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key types for the skeleton graph arenas.

use slotmap::new_key_type;

new_key_type! {
    /// Key for a skeleton node (a point where wavefront vertices meet).
    pub struct NodeKey;

    /// Key for a skeleton arc (the trace of one wavefront vertex).
    pub struct ArcKey;

    /// Key for a skeleton sheet (the trace of one wavefront edge in 3D).
    pub struct SheetKey;
}
