//! Turn a preset recall into fully-timed per-track ramps.
//!
//! Stagger gives each track its own start offset and duration; the ramps
//! themselves are executed by the scheduler on the tick thread.

use std::collections::HashMap;

use beltane_types::{Position, PresetTransition, Stagger, StaggerPattern, TrackId};

use crate::engine::TrackRamp;
use crate::model::next_random;

/// One track's endpoints, in capture order.
#[derive(Debug, Clone, Copy)]
pub struct RampTarget {
    pub track: TrackId,
    pub from: Position,
    pub to: Position,
}

/// Build the ramp set for a transition over `targets`.
///
/// `ctrl` optionally supplies per-track Bezier control points; tracks
/// without an entry fall back to component-wise interpolation.
pub fn build_ramps(
    targets: &[RampTarget],
    transition: &PresetTransition,
    ctrl: Option<&HashMap<TrackId, (Position, Position)>>,
) -> Vec<TrackRamp> {
    let offsets = stagger_offsets(targets, transition.stagger.as_ref());
    let duration = per_track_duration(transition);
    targets
        .iter()
        .zip(offsets)
        .map(|(target, start_offset)| TrackRamp {
            track: target.track,
            from: Some(target.from),
            to: target.to,
            start_offset,
            duration,
            easing: transition.easing,
            mode: transition.mode,
            ctrl: ctrl.and_then(|map| map.get(&target.track).copied()),
        })
        .collect()
}

/// Overlap shortens every track's duration; 0 keeps the full transition
/// length, 1 collapses it to an instant.
fn per_track_duration(transition: &PresetTransition) -> f32 {
    let overlap = transition
        .stagger
        .map(|s| s.overlap.clamp(0.0, 1.0))
        .unwrap_or(0.0);
    (transition.duration * (1.0 - overlap)).max(0.0)
}

fn stagger_offsets(targets: &[RampTarget], stagger: Option<&Stagger>) -> Vec<f32> {
    let n = targets.len();
    let Some(stagger) = stagger else {
        return vec![0.0; n];
    };
    let delay = stagger.delay.max(0.0);
    match stagger.pattern {
        StaggerPattern::Sequential => (0..n).map(|i| i as f32 * delay).collect(),
        StaggerPattern::ReverseSequential => {
            (0..n).map(|i| (n - 1 - i) as f32 * delay).collect()
        }
        StaggerPattern::Random => {
            // Seeded, so replaying the cue gives identical offsets.
            let mut rng = stagger.seed.max(1);
            (0..n).map(|_| next_random(&mut rng) * delay).collect()
        }
        StaggerPattern::SpatialInOut => spatial_offsets(targets, delay, false),
        StaggerPattern::SpatialOutIn => spatial_offsets(targets, delay, true),
    }
}

/// Rank tracks by distance from the centroid of their source positions;
/// each rank step adds one delay unit.
fn spatial_offsets(targets: &[RampTarget], delay: f32, outside_first: bool) -> Vec<f32> {
    let sources: Vec<Position> = targets.iter().map(|t| t.from).collect();
    let centroid = Position::centroid(&sources);
    let mut order: Vec<usize> = (0..targets.len()).collect();
    order.sort_by(|&a, &b| {
        let da = sources[a].distance(&centroid);
        let db = sources[b].distance(&centroid);
        if outside_first {
            db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        }
    });
    let mut offsets = vec![0.0; targets.len()];
    for (rank, index) in order.into_iter().enumerate() {
        offsets[index] = rank as f32 * delay;
    }
    offsets
}

#[cfg(test)]
mod tests {
    use beltane_types::{Easing, InterpolationMode};

    use super::*;

    fn four_targets() -> Vec<RampTarget> {
        (0..4)
            .map(|i| RampTarget {
                track: i as TrackId,
                from: Position::new(i as f32, 0.0, 0.0),
                to: Position::new(i as f32, 5.0, 0.0),
            })
            .collect()
    }

    fn sequential(duration: f32, delay: f32, overlap: f32) -> PresetTransition {
        PresetTransition {
            duration,
            easing: Easing::Linear,
            mode: InterpolationMode::Cartesian,
            stagger: Some(Stagger {
                pattern: StaggerPattern::Sequential,
                delay,
                overlap,
                seed: 1,
            }),
        }
    }

    #[test]
    fn sequential_finish_times() {
        let ramps = build_ramps(&four_targets(), &sequential(2.0, 0.5, 0.0), None);
        // Track i finishes at 2.0 + i * 0.5 seconds.
        for (i, ramp) in ramps.iter().enumerate() {
            assert_eq!(ramp.start_offset, i as f32 * 0.5);
            assert_eq!(ramp.duration, 2.0);
            assert!((ramp.start_offset + ramp.duration - (2.0 + i as f32 * 0.5)).abs() < 1e-6);
        }
    }

    #[test]
    fn reverse_sequential_flips_order() {
        let targets = four_targets();
        let transition = PresetTransition {
            stagger: Some(Stagger {
                pattern: StaggerPattern::ReverseSequential,
                delay: 1.0,
                overlap: 0.0,
                seed: 1,
            }),
            ..Default::default()
        };
        let ramps = build_ramps(&targets, &transition, None);
        assert_eq!(ramps[0].start_offset, 3.0);
        assert_eq!(ramps[3].start_offset, 0.0);
    }

    #[test]
    fn overlap_shortens_durations() {
        let ramps = build_ramps(&four_targets(), &sequential(2.0, 0.5, 0.5), None);
        for ramp in &ramps {
            assert_eq!(ramp.duration, 1.0);
        }
    }

    #[test]
    fn random_offsets_replay_identically() {
        let targets = four_targets();
        let transition = PresetTransition {
            stagger: Some(Stagger {
                pattern: StaggerPattern::Random,
                delay: 2.0,
                overlap: 0.0,
                seed: 99,
            }),
            ..Default::default()
        };
        let a = build_ramps(&targets, &transition, None);
        let b = build_ramps(&targets, &transition, None);
        for (ra, rb) in a.iter().zip(&b) {
            assert_eq!(ra.start_offset, rb.start_offset);
            assert!(ra.start_offset >= 0.0 && ra.start_offset <= 2.0);
        }
    }

    #[test]
    fn spatial_in_out_orders_by_centroid_distance() {
        let targets = vec![
            RampTarget {
                track: 1,
                from: Position::new(10.0, 0.0, 0.0),
                to: Position::ORIGIN,
            },
            RampTarget {
                track: 2,
                from: Position::new(1.0, 0.0, 0.0),
                to: Position::ORIGIN,
            },
            RampTarget {
                track: 3,
                from: Position::new(4.0, 0.0, 0.0),
                to: Position::ORIGIN,
            },
        ];
        let transition = PresetTransition {
            stagger: Some(Stagger {
                pattern: StaggerPattern::SpatialInOut,
                delay: 1.0,
                overlap: 0.0,
                seed: 1,
            }),
            ..Default::default()
        };
        let ramps = build_ramps(&targets, &transition, None);
        // Centroid is at x=5: track 3 is closest, then track 2, then 1.
        assert_eq!(ramps[2].start_offset, 0.0);
        assert_eq!(ramps[1].start_offset, 1.0);
        assert_eq!(ramps[0].start_offset, 2.0);
    }
}
