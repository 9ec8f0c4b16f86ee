use rtrb::Consumer;

use crate::synth::voice::VoiceId;

/// Control → render instructions. Every message carries the audio-clock frame
/// it takes effect at.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum BusMessage {
    NoteOn {
        voice: VoiceId,
        note: u8,
        velocity: u8,
        at: u64,
    },
    NoteOff {
        voice: VoiceId,
        at: u64,
    },
    /// Release every held voice; voices already releasing keep their tails.
    AllNotesOff {
        at: u64,
    },
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<BusMessage>;
}

impl MessageReceiver for Consumer<BusMessage> {
    fn pop(&mut self) -> Option<BusMessage> {
        Consumer::pop(self).ok()
    }
}
