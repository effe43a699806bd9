//! Access to the frames of encapsulated pixel data.
//!
//! Fragments are recorded by the parser as locations in the file buffer.
//! This module gathers the fragments making up one frame,
//! borrowing from the buffer whenever the frame is a single fragment.
use dcmstack_parser::Fragment;
use std::borrow::Cow;

/// The size of an item header preceding each fragment.
const ITEM_HEADER_LEN: u64 = 8;

/// Obtain the compressed data of one frame.
///
/// When there is one fragment per frame (or a single fragment),
/// the fragment is the frame.
/// Otherwise the basic offset table,
/// holding the offset of each frame's first item
/// relative to the first fragment item,
/// tells which fragments belong to the frame.
/// Without an offset table,
/// all fragments are taken to form a single frame.
///
/// Returns `None` if the frame cannot be located in the buffer.
pub fn frame_data<'a>(
    data: &'a [u8],
    offset_table: &[u32],
    fragments: &[Fragment],
    number_of_frames: u32,
    frame: u32,
) -> Option<Cow<'a, [u8]>> {
    if frame >= number_of_frames || fragments.is_empty() {
        return None;
    }

    if fragments.len() == 1 || fragments.len() == number_of_frames as usize {
        // assuming 1:1 frame-to-fragment mapping
        return fragments
            .get(frame as usize)
            .and_then(|f| f.bytes(data))
            .map(Cow::Borrowed);
    }

    let (start, end) = if offset_table.is_empty() {
        if frame > 0 {
            return None;
        }
        (0, u64::MAX)
    } else {
        let start = u64::from(*offset_table.get(frame as usize)?);
        let end = offset_table
            .get(frame as usize + 1)
            .map_or(u64::MAX, |&o| u64::from(o));
        (start, end)
    };

    let first_item = fragments[0].offset.checked_sub(ITEM_HEADER_LEN)?;
    let mut out = Vec::new();
    for fragment in fragments {
        let item_offset = fragment
            .offset
            .checked_sub(ITEM_HEADER_LEN)?
            .checked_sub(first_item)?;
        if item_offset >= start && item_offset < end {
            out.extend_from_slice(fragment.bytes(data)?);
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(Cow::Owned(out))
    }
}
