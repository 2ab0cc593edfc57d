//! Lazy iteration over record keys in physical write order.

use crate::pa::models::PaDomain;
use crate::pa::timetuple::TimeLine;

/// The full address of one data record: domain, timestep stamp and 1-based
/// model cell indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordKey {
    pub domain: usize,
    pub date: i32,
    pub time: f32,
    pub i: i32,
    pub j: i32,
    pub k: i32,
}

/// Iterator over every record key of one domain, in write order: time outer,
/// then j, then i, then k innermost. Finite and restartable (each call to
/// [`SeekingDataset::iterate_keys`](crate::pa::seek::SeekingDataset::iterate_keys)
/// produces a fresh iterator); bounds are inclusive on all axes.
#[derive(Debug, Clone)]
pub struct KeysIterator {
    domain_idx: usize,
    domain: PaDomain,
    timeline: TimeLine,
    t: usize,
    j: i32,
    i: i32,
    k: i32,
}

impl KeysIterator {
    pub(crate) fn new(domain_idx: usize, domain: PaDomain, timeline: TimeLine) -> Self {
        let (j, i, k) = (domain.jstart, domain.istart, domain.blay);
        Self {
            domain_idx,
            domain,
            timeline,
            t: 0,
            j,
            i,
            k,
        }
    }
}

impl Iterator for KeysIterator {
    type Item = RecordKey;

    fn next(&mut self) -> Option<Self::Item> {
        if self.t >= self.timeline.nsteps {
            return None;
        }
        let (date, time) = self.timeline.stamp(self.t);
        let key = RecordKey {
            domain: self.domain_idx,
            date,
            time,
            i: self.i,
            j: self.j,
            k: self.k,
        };

        // Advance with k fastest, then i, then j, then the timestep.
        self.k += 1;
        if self.k > self.domain.tlay {
            self.k = self.domain.blay;
            self.i += 1;
            if self.i > self.domain.iend {
                self.i = self.domain.istart;
                self.j += 1;
                if self.j > self.domain.jend {
                    self.j = self.domain.jstart;
                    self.t += 1;
                }
            }
        }
        Some(key)
    }
}
