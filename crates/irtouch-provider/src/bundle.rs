//! Transport-ready view of a frame, shaped after a TUIO cursor bundle.

use crate::contact::{ContactKind, Frame};
use irtouch_tracker::TrackId;
use serde::{Deserialize, Serialize};

/// One `set` message: a contact's normalised geometry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContactSet {
    pub session_id: TrackId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Everything a transport needs to publish one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContactBundle {
    /// Bundle sequence number, starting at 1 for each sequencer.
    pub fseq: u64,
    /// Ids of contacts still on the surface after this frame.
    pub alive: Vec<TrackId>,
    pub set: Vec<ContactSet>,
}

/// Numbers bundles for one transport session.
#[derive(Clone, Debug, Default)]
pub struct BundleSequencer {
    last: u64,
}

impl BundleSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number of the last bundle produced, `0` before the first.
    pub fn last_fseq(&self) -> u64 {
        self.last
    }

    /// Build the bundle for `frame`. Ended contacts are left out of both
    /// `alive` and `set`.
    pub fn bundle(&mut self, frame: &Frame) -> ContactBundle {
        self.last += 1;
        let live = frame
            .contacts()
            .iter()
            .filter(|c| c.kind != ContactKind::End);

        let mut alive = Vec::new();
        let mut set = Vec::new();
        for c in live {
            alive.push(c.id);
            set.push(ContactSet {
                session_id: c.id,
                x: c.normalized.x as f32,
                y: c.normalized.y as f32,
                width: c.size.x as f32,
                height: c.size.y as f32,
            });
        }

        ContactBundle {
            fseq: self.last,
            alive,
            set,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::Contact;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Point2, Vector2};
    use std::time::Duration;

    fn contact(id: TrackId, kind: ContactKind, x: f64) -> Contact {
        Contact {
            id,
            kind,
            position: Point2::new(x * 100.0, 0.0),
            normalized: Point2::new(x, 0.25),
            size: Vector2::new(0.02, 0.03),
        }
    }

    #[test]
    fn ended_contacts_leave_the_alive_list() {
        let frame = Frame::new(
            0,
            Duration::from_millis(5),
            vec![
                contact(1, ContactKind::Move, 0.5),
                contact(2, ContactKind::End, 0.1),
                contact(3, ContactKind::Start, 0.9),
            ],
        );
        let mut seq = BundleSequencer::new();
        let bundle = seq.bundle(&frame);
        assert_eq!(bundle.fseq, 1);
        assert_eq!(bundle.alive, vec![1, 3]);
        assert_eq!(bundle.set[1].session_id, 3);
        assert_abs_diff_eq!(bundle.set[1].x, 0.9, epsilon = 1e-6);
        assert_abs_diff_eq!(bundle.set[0].height, 0.03, epsilon = 1e-6);
    }

    #[test]
    fn fseq_counts_every_bundle_including_empty_ones() {
        let empty = Frame::new(0, Duration::ZERO, Vec::new());
        let mut seq = BundleSequencer::new();
        seq.bundle(&empty);
        let second = seq.bundle(&empty);
        assert_eq!(second.fseq, 2);
        assert!(second.alive.is_empty());
        assert_eq!(seq.last_fseq(), 2);
        assert_eq!(BundleSequencer::new().bundle(&empty).fseq, 1);
    }
}
