use crate::types::NoteRecord;

/// Overlay of notes the engine has written but the store's query index may
/// not return yet. After a mutation the patched record goes in here; each
/// board rebuild merges a fresh store read with the overlay, and any note
/// the read already reflects is dropped from the overlay.
///
/// Entries keep insertion order so merged reads stay deterministic.
#[derive(Debug, Default)]
pub struct NoteCache {
    notes: Vec<NoteRecord>,
}

impl NoteCache {
    pub fn new() -> Self {
        NoteCache::default()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn find(&self, note_id: &str) -> Option<&NoteRecord> {
        self.notes.iter().find(|n| n.id == note_id)
    }

    /// Insert or replace a note, keeping the slot of an existing entry.
    pub fn upsert(&mut self, note: NoteRecord) {
        match self.notes.iter_mut().find(|n| n.id == note.id) {
            Some(slot) => *slot = note,
            None => self.notes.push(note),
        }
    }

    pub fn remove(&mut self, note_id: &str) {
        self.notes.retain(|n| n.id != note_id);
    }

    /// Merge a fresh store read with the overlay. Notes present in the read
    /// are taken from it and evicted here; the rest of the overlay is
    /// appended. The store read is authoritative once it catches up.
    pub fn merge(&mut self, fresh: Vec<NoteRecord>) -> Vec<NoteRecord> {
        self.notes.retain(|cached| !fresh.iter().any(|n| n.id == cached.id));
        let mut merged = fresh;
        merged.extend(self.notes.iter().cloned());
        merged
    }
}
