// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic document ids for records without a natural stable id.

use sha2::{Digest, Sha256};

/// Id prefix of indexed conversation chunks.
pub const CHUNK_PREFIX: &str = "chunk-";
/// Id prefix of indexed conversation summaries.
pub const SUMMARY_PREFIX: &str = "summary-";

/// Hash a semantic key such as `chunk:<conversationId>:<chunkIndex>` into a
/// stable document id. The key's leading `kind:` is kept as a readable prefix
/// so hits can be routed back to the right table.
pub fn derive_document_id(key: &str) -> String {
    let kind = key.split_once(':').map_or("doc", |(kind, _)| kind);
    let digest = Sha256::digest(key.as_bytes());
    format!("{kind}-{}", hex::encode(digest))
}

/// Document id of a conversation chunk.
pub fn chunk_document_id(conversation_id: &str, chunk_index: i64) -> String {
    derive_document_id(&format!("chunk:{conversation_id}:{chunk_index}"))
}

/// Document id of a conversation summary.
pub fn summary_document_id(agent_id: &str, conversation_id: &str, timestamp: &str) -> String {
    derive_document_id(&format!("summary:{agent_id}:{conversation_id}:{timestamp}"))
}

/// Whether an index id belongs to a memory entry (entries use their own id).
pub fn is_entry_id(id: &str) -> bool {
    !id.starts_with(CHUNK_PREFIX) && !id.starts_with(SUMMARY_PREFIX)
}
