//! Listing decoder module
//!
//! Upstream listings share one envelope:
//!
//! ```text
//! { "data": { "children": [ { "kind": "t3", "data": { "id": "...", ... } } ],
//!             "after": "t3_xyz" | null } }
//! ```
//!
//! The decoder turns that envelope into a [`Page`](crate::types::Page) and
//! rejects anything else as a `MalformedResponse`.

mod decoders;

pub use decoders::{decode_listing, decode_listing_str, ListingDecoder};
