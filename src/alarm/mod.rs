mod assembler;
mod correlator;
mod decoder;

pub use assembler::FrameAssembler;
pub use correlator::{AlarmCorrelator, AlarmKey, AlarmTransition, DEFAULT_STALE_AFTER};
pub use decoder::{
    decode_frame, normalize_event_code, normalize_event_state, DecodedAlarmEvent, ENVELOPE_TAG,
};
