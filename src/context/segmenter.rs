//! Segmentation of admitted files into size-bounded groups.

use crate::types::{ContextSegment, EncodedFile, SegmentLimits};

/// Greedily pack files into segments in input order.
///
/// A segment is closed when the next file would push its token or byte
/// total past the limit. Files are never split: a file larger than the limit
/// gets a segment of its own.
pub fn segment(files: Vec<EncodedFile>, limits: SegmentLimits) -> Vec<ContextSegment> {
    let mut segments: Vec<ContextSegment> = Vec::new();
    let mut current: Option<ContextSegment> = None;

    for file in files {
        if let Some(open) = current.as_ref() {
            let fits = open.total_tokens + file.token_count <= limits.max_tokens_per_segment
                && open.total_bytes + file.byte_count <= limits.max_bytes_per_segment;
            if !fits {
                segments.extend(current.take());
            }
        }

        let open = current.get_or_insert_with(|| ContextSegment {
            index: segments.len(),
            files: Vec::new(),
            total_bytes: 0,
            total_tokens: 0,
        });
        open.total_bytes += file.byte_count;
        open.total_tokens += file.token_count;
        open.files.push(file);
    }

    segments.extend(current);
    segments
}
