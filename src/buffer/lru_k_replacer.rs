use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::common::{FrameId, Result, StrataError, Timestamp};

/// Access history for a single tracked frame
#[derive(Debug)]
struct AccessInfo {
    /// Last up to k access timestamps, most recent at the back
    history: VecDeque<Timestamp>,
    evictable: bool,
}

impl AccessInfo {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            evictable: false,
        }
    }

    /// Backward k-distance at `now`; None means fewer than k accesses,
    /// i.e. +inf.
    fn k_distance(&self, now: Timestamp, k: usize) -> Option<Timestamp> {
        if self.history.len() < k {
            None
        } else {
            Some(now - self.history[self.history.len() - k])
        }
    }

    fn earliest(&self) -> Option<Timestamp> {
        self.history.front().copied()
    }
}

struct ReplacerState {
    frames: HashMap<FrameId, AccessInfo>,
    current_timestamp: Timestamp,
    /// Count of evictable entries in `frames`
    curr_size: usize,
}

/// LRU-K replacement policy.
///
/// Evicts the evictable frame whose backward k-distance (time since the
/// k-th most recent access) is largest. Frames with fewer than k accesses
/// have infinite distance; ties among those break by earliest recorded
/// access, which degrades to classic LRU for cold frames.
pub struct LruKReplacer {
    k: usize,
    /// Frames with ids at or beyond this bound are rejected
    max_frames: usize,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    pub fn new(k: usize, max_frames: usize) -> Self {
        assert!(k > 0, "k must be positive");
        Self {
            k,
            max_frames,
            state: Mutex::new(ReplacerState {
                frames: HashMap::new(),
                current_timestamp: 0,
                curr_size: 0,
            }),
        }
    }

    /// Selects and removes the victim frame, or None when nothing is
    /// evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        if state.curr_size == 0 {
            return None;
        }

        let now = state.current_timestamp;
        let mut victim: Option<FrameId> = None;
        let mut victim_dist: Option<Timestamp> = None;
        let mut victim_earliest: Option<Timestamp> = None;

        for (&frame_id, info) in state.frames.iter() {
            if !info.evictable {
                continue;
            }
            let dist = info.k_distance(now, self.k);
            let earliest = info.earliest();

            let better = match (victim_dist, dist) {
                // Candidate is +inf, victim finite: candidate wins.
                (Some(_), None) => true,
                // Victim is +inf, candidate finite: keep victim.
                (None, Some(_)) => false,
                // Both +inf: earliest first access wins.
                (None, None) => match (victim_earliest, earliest) {
                    (Some(v), Some(c)) => c < v,
                    (None, Some(_)) => true,
                    _ => false,
                },
                (Some(v), Some(c)) => c > v,
            };

            if victim.is_none() || better {
                victim = Some(frame_id);
                victim_dist = dist;
                victim_earliest = earliest;
            }
        }

        if let Some(frame_id) = victim {
            state.frames.remove(&frame_id);
            state.curr_size -= 1;
        }
        victim
    }

    /// Records an access to a frame at the next timestamp. Does not change
    /// evictability.
    pub fn record_access(&self, frame_id: FrameId) -> Result<()> {
        if frame_id.as_usize() >= self.max_frames {
            return Err(StrataError::InvalidFrameId(frame_id));
        }

        let mut state = self.state.lock();
        state.current_timestamp += 1;
        let timestamp = state.current_timestamp;

        let info = state.frames.entry(frame_id).or_insert_with(AccessInfo::new);
        info.history.push_back(timestamp);
        if info.history.len() > self.k {
            info.history.pop_front();
        }
        Ok(())
    }

    /// Toggles a frame's evictability. The frame must be tracked.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<()> {
        if frame_id.as_usize() >= self.max_frames {
            return Err(StrataError::InvalidFrameId(frame_id));
        }

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let info = state
            .frames
            .get_mut(&frame_id)
            .ok_or(StrataError::InvalidFrameId(frame_id))?;
        if info.evictable != evictable {
            info.evictable = evictable;
            if evictable {
                state.curr_size += 1;
            } else {
                state.curr_size -= 1;
            }
        }
        Ok(())
    }

    /// Drops a frame from tracking. Removing a pinned (non-evictable)
    /// frame is a contract violation; removing an untracked frame is a
    /// no-op.
    pub fn remove(&self, frame_id: FrameId) -> Result<()> {
        let mut state = self.state.lock();
        let evictable = match state.frames.get(&frame_id) {
            None => return Ok(()),
            Some(info) => info.evictable,
        };
        if !evictable {
            return Err(StrataError::FrameNotEvictable(frame_id));
        }
        state.frames.remove(&frame_id);
        state.curr_size -= 1;
        Ok(())
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().curr_size
    }

    pub fn k(&self) -> usize {
        self.k
    }
}
