use crate::synth::voice::VoiceId;

/// Control-side record of a voice the engine has triggered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveVoice {
    pub id: VoiceId,
    pub note: u8,
    pub velocity: u8,
    pub created_at: u64,
    /// Frame at which the release tail completes, once released.
    pub release_end: Option<u64>,
}

impl ActiveVoice {
    pub fn new(id: VoiceId, note: u8, velocity: u8, created_at: u64) -> Self {
        Self {
            id,
            note,
            velocity,
            created_at,
            release_end: None,
        }
    }

    /// Sounding until the scheduled end of its release tail, regardless of
    /// whether cleanup has run yet.
    pub fn is_active(&self, now: u64) -> bool {
        self.release_end.is_none_or(|end| now < end)
    }

    pub fn is_releasing(&self) -> bool {
        self.release_end.is_some()
    }
}

/// Active Voice Table: note → voice, oldest first, bounded by the polyphony
/// ceiling.
///
/// Releasing voices keep their slot until cleanup removes them, so a release
/// tail counts against polyphony for its whole duration.
pub struct VoiceTable {
    entries: Vec<ActiveVoice>,
    capacity: usize,
}

impl VoiceTable {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Register `voice` as the newest entry. When the table is full the
    /// oldest entry is evicted first and returned.
    ///
    /// The caller is expected to have removed any entry for the same note.
    pub fn admit(&mut self, voice: ActiveVoice) -> Option<ActiveVoice> {
        debug_assert!(self.get(voice.note).is_none(), "note already registered");

        let evicted = if self.entries.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        self.entries.push(voice);
        debug_assert!(self.entries.len() <= self.capacity);
        evicted
    }

    pub fn evict_oldest(&mut self) -> Option<ActiveVoice> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    pub fn get(&self, note: u8) -> Option<&ActiveVoice> {
        self.entries.iter().find(|v| v.note == note)
    }

    pub fn get_mut(&mut self, note: u8) -> Option<&mut ActiveVoice> {
        self.entries.iter_mut().find(|v| v.note == note)
    }

    /// Remove whatever voice is registered for `note`.
    pub fn remove(&mut self, note: u8) -> Option<ActiveVoice> {
        let idx = self.entries.iter().position(|v| v.note == note)?;
        Some(self.entries.remove(idx))
    }

    /// Remove the entry only if it is still the voice `id`.
    pub fn remove_voice(&mut self, id: VoiceId) -> Option<ActiveVoice> {
        let idx = self.entries.iter().position(|v| v.id == id)?;
        Some(self.entries.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveVoice> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ActiveVoice> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
