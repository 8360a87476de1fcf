use crate::track::{BlobObservation, Track, TrackId, TrackState};
use crate::TrackerParams;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Lifecycle transition reported for a track on one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackEventKind {
    Start,
    Update,
    End,
}

/// One lifecycle event, carrying the track's state at the end of the tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackEvent {
    pub kind: TrackEventKind,
    pub id: TrackId,
    /// Smoothed position.
    pub position: Point2<f64>,
    /// Most recent matched observation.
    pub raw_position: Point2<f64>,
    pub size: Option<f64>,
    pub state: TrackState,
    /// Tick on which the event was produced.
    pub tick: u64,
}

impl TrackEvent {
    fn of(kind: TrackEventKind, track: &Track, tick: u64) -> Self {
        Self {
            kind,
            id: track.id(),
            position: track.position(),
            raw_position: track.raw_position(),
            size: track.size(),
            state: track.state(),
            tick,
        }
    }
}

/// Frame-to-frame blob classifier.
///
/// Feed it the unordered observations of each tick through
/// [`ContactTracker::process`]; it returns one event per affected track in
/// ascending id order.
#[derive(Clone, Debug)]
pub struct ContactTracker {
    params: TrackerParams,
    /// Live tracks, kept sorted by id.
    tracks: Vec<Track>,
    next_id: TrackId,
    tick: u64,
}

impl Default for ContactTracker {
    fn default() -> Self {
        Self::new(TrackerParams::default())
    }
}

impl ContactTracker {
    pub fn new(params: TrackerParams) -> Self {
        Self {
            params,
            tracks: Vec::new(),
            next_id: 1,
            tick: 0,
        }
    }

    #[inline]
    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    /// Live tracks in ascending id order.
    #[inline]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks
            .binary_search_by_key(&id, Track::id)
            .ok()
            .map(|idx| &self.tracks[idx])
    }

    /// Number of ticks processed so far.
    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Classify one tick of observations.
    ///
    /// Association is greedy nearest-neighbour: all (track, observation)
    /// pairs closer than the gating radius are visited by increasing
    /// distance, ties going to the lower track id, and each side is used at
    /// most once. Unmatched observations open tracks; unmatched tracks coast
    /// for `grace_ticks` and then end.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self, observations), fields(n = observations.len()))
    )]
    pub fn process(&mut self, observations: &[BlobObservation]) -> Vec<TrackEvent> {
        self.tick += 1;
        let tick = self.tick;
        let window = self.params.smoothing_window;

        let observations: Vec<&BlobObservation> = observations
            .iter()
            .filter(|o| {
                let finite = o.position.x.is_finite() && o.position.y.is_finite();
                if !finite {
                    log::debug!("tick {tick}: dropping non-finite observation");
                }
                finite
            })
            .collect();

        let assignment = self.associate(&observations);

        let mut events = Vec::with_capacity(self.tracks.len() + observations.len());
        let mut ended = false;
        for (track, matched) in self.tracks.iter_mut().zip(&assignment) {
            match matched {
                Some(j) => {
                    track.observe(observations[*j], tick, window);
                    events.push(TrackEvent::of(TrackEventKind::Update, track, tick));
                }
                None => {
                    let missed = track.miss();
                    if missed > self.params.grace_ticks {
                        log::trace!("track {} ended after {missed} missed ticks", track.id());
                        events.push(TrackEvent::of(TrackEventKind::End, track, tick));
                        ended = true;
                    } else {
                        events.push(TrackEvent::of(TrackEventKind::Update, track, tick));
                    }
                }
            }
        }
        if ended {
            let grace = self.params.grace_ticks;
            self.tracks.retain(|t| t.missed_ticks() <= grace);
        }

        let mut used = vec![false; observations.len()];
        for j in assignment.iter().flatten() {
            used[*j] = true;
        }
        for (j, obs) in observations.iter().enumerate() {
            if used[j] {
                continue;
            }
            if self.tracks.len() >= self.params.max_tracks {
                log::debug!(
                    "tick {tick}: track limit {} reached, dropping observation",
                    self.params.max_tracks
                );
                break;
            }
            let id = self.allocate_id();
            let track = Track::open(id, obs, tick, window);
            log::trace!("track {id} started at ({:.1}, {:.1})", obs.position.x, obs.position.y);
            events.push(TrackEvent::of(TrackEventKind::Start, &track, tick));
            self.tracks.push(track);
        }

        events.sort_by_key(|e| e.id);
        events
    }

    /// End every live track, returning one synthetic `End` event per track.
    ///
    /// The tick counter keeps running so later ticks never repeat a tick
    /// number already reported.
    pub fn reset(&mut self) -> Vec<TrackEvent> {
        let tick = self.tick;
        let events = self
            .tracks
            .iter()
            .map(|t| TrackEvent::of(TrackEventKind::End, t, tick))
            .collect();
        self.tracks.clear();
        events
    }

    /// Drop every live track without reporting it.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// For each track (in id order) the index of the observation it takes.
    fn associate(&self, observations: &[&BlobObservation]) -> Vec<Option<usize>> {
        let gate = self.params.gating_radius;
        let mut pairs: Vec<(f64, usize, usize)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            for (j, obs) in observations.iter().enumerate() {
                let d = (obs.position - track.raw_position()).norm();
                if d < gate {
                    pairs.push((d, ti, j));
                }
            }
        }
        // Tracks are sorted by id, so ordering by index orders by id.
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut assignment = vec![None; self.tracks.len()];
        let mut taken = vec![false; observations.len()];
        for (_, ti, j) in pairs {
            if assignment[ti].is_none() && !taken[j] {
                assignment[ti] = Some(j);
                taken[j] = true;
            }
        }
        assignment
    }

    fn allocate_id(&mut self) -> TrackId {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if self.track(id).is_none() {
                return id;
            }
        }
    }
}
