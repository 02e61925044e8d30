//! Listing envelope decoder

use crate::error::{Error, Result};
use crate::types::{Item, OptionStringExt, Page};
use serde_json::Value;

/// Decoder for the listing envelope
///
/// Stateless; kept as a type so fetchers can hold one and tests can name it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingDecoder;

impl ListingDecoder {
    /// Create a new listing decoder
    pub fn new() -> Self {
        Self
    }

    /// Decode a parsed JSON body
    pub fn decode(&self, body: &Value) -> Result<Page> {
        decode_listing(body)
    }

    /// Decode a raw body
    pub fn decode_str(&self, body: &str) -> Result<Page> {
        decode_listing_str(body)
    }
}

/// Decode a raw listing body
pub fn decode_listing_str(body: &str) -> Result<Page> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| Error::malformed(format!("response is not JSON: {e}")))?;
    decode_listing(&value)
}

/// Decode a parsed listing body into a page
pub fn decode_listing(body: &Value) -> Result<Page> {
    let listing = body
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::malformed("missing object at 'data'"))?;

    let children = listing
        .get("children")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::malformed("missing array at 'data.children'"))?;

    let after = match listing.get("after") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) => None,
        Some(other) => {
            return Err(Error::malformed(format!(
                "'data.after' must be a string or null, got {other}"
            )))
        }
        None => return Err(Error::malformed("missing 'data.after'")),
    };

    let items = children
        .iter()
        .enumerate()
        .map(|(index, child)| decode_child(index, child))
        .collect::<Result<Vec<_>>>()?;

    Ok(Page {
        items,
        next_cursor: after.none_if_empty(),
    })
}

fn decode_child(index: usize, child: &Value) -> Result<Item> {
    let data = child
        .get("data")
        .filter(|d| d.is_object())
        .ok_or_else(|| Error::malformed(format!("children[{index}] has no 'data' object")))?;

    let id = data
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::malformed(format!("children[{index}] has no string 'id'")))?;

    Ok(Item {
        id: id.to_string(),
        kind: child.get("kind").and_then(Value::as_str).map(String::from),
        data: data.clone(),
    })
}
