use irtouch_tracker::{TrackEventKind, TrackId};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle tag carried by a contact in a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Start,
    Move,
    End,
}

impl From<TrackEventKind> for ContactKind {
    fn from(kind: TrackEventKind) -> Self {
        match kind {
            TrackEventKind::Start => ContactKind::Start,
            TrackEventKind::Update => ContactKind::Move,
            TrackEventKind::End => ContactKind::End,
        }
    }
}

/// One touch point in a frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: TrackId,
    pub kind: ContactKind,
    /// Smoothed position in screen units (raw sensor units when the
    /// transform is disabled).
    pub position: Point2<f64>,
    /// `position` divided by the calibrated screen size.
    pub normalized: Point2<f64>,
    /// Normalised width and height.
    pub size: Vector2<f64>,
}

/// The contacts produced by one hardware tick.
///
/// Frames are built in a fresh buffer for every tick and handed to the
/// consumer by value, so nothing the coordinator does afterwards can
/// change a frame already emitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    sequence: u64,
    timestamp: Duration,
    contacts: Vec<Contact>,
}

impl Frame {
    pub(crate) fn new(sequence: u64, timestamp: Duration, contacts: Vec<Contact>) -> Self {
        Self {
            sequence,
            timestamp,
            contacts,
        }
    }

    /// Position of this frame in its session, starting at 0.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Time since the coordinator was created. Strictly increasing.
    #[inline]
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Contacts sorted by id.
    #[inline]
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn contact(&self, id: TrackId) -> Option<&Contact> {
        self.contacts
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &self.contacts[i])
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn into_contacts(self) -> Vec<Contact> {
        self.contacts
    }
}
