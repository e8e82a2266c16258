use rtrb::Producer;

use crate::handle::ObjectId;

/// Capacity of the audio-to-user event ring. Events beyond it are dropped.
pub(crate) const EVENT_CAPACITY: usize = 1024;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A looping generator wrapped back to the start.
    Looped,
    /// A non-looping generator reached the end of its audio.
    Finished,
}

/// Something that happened on the audio thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    /// The object that raised the event.
    pub source: ObjectId,
}

/// Where a generator reports events during one block.
pub(crate) struct EventSink<'a> {
    producer: Option<&'a mut Producer<Event>>,
    source: ObjectId,
}

impl<'a> EventSink<'a> {
    pub(crate) fn new(producer: &'a mut Producer<Event>, source: ObjectId) -> Self {
        Self {
            producer: Some(producer),
            source,
        }
    }

    /// A sink that discards everything, used while events are disabled.
    pub(crate) fn disabled(source: ObjectId) -> Self {
        Self {
            producer: None,
            source,
        }
    }

    pub(crate) fn emit(&mut self, kind: EventKind) {
        let Some(producer) = self.producer.as_deref_mut() else {
            return;
        };
        let event = Event {
            kind,
            source: self.source,
        };
        if producer.push(event).is_err() {
            tracing::trace!(source = %self.source, ?kind, "event ring full, dropping event");
        }
    }
}
