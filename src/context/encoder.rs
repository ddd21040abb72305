//! Context encoding: byte counts, token estimates, hashes and language tags.

use crate::types::{EncodedFile, LoadedFile};
use crate::workspace::language::language_for_path;
use crate::workspace::snapshot::content_hash;

/// Bytes per estimated token.
///
/// The estimate is `ceil(bytes / BYTES_PER_TOKEN)`. It is an approximation,
/// not a model tokenizer.
pub const BYTES_PER_TOKEN: usize = 4;

/// Estimated token count for a byte length.
pub fn estimate_tokens(byte_count: usize) -> usize {
    byte_count.div_ceil(BYTES_PER_TOKEN)
}

/// Encode one loaded file.
pub fn encode(file: LoadedFile) -> EncodedFile {
    let byte_count = file.contents.len();
    EncodedFile {
        language: language_for_path(&file.path).map(str::to_string),
        byte_count,
        token_count: estimate_tokens(byte_count),
        content_hash: content_hash(file.contents.as_bytes()),
        contents: file.contents,
        relative_path: file.relative_path,
        path: file.path,
        truncation: None,
    }
}

/// Encode files, preserving order.
pub fn encode_all(files: Vec<LoadedFile>) -> Vec<EncodedFile> {
    files.into_iter().map(encode).collect()
}
