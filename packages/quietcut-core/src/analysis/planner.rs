//! Cut planning: fuse removals, apply padding, invert into keep-cuts.
//!
//! The order is fixed: fuse -> shrink -> invert. Padding is symmetric
//! (`padding_ms / 2` per side) and shrinks *removals*, which leaves a margin
//! of kept media around every edit point for the editor to crossfade.

use crate::analysis::fillers::FillerHit;
use crate::timeline::{Cut, Fps, TimeInterval};

/// Plans the keep-cut list for a source of `duration_s` seconds.
///
/// `silences` and `fillers` are merged into one removal list; removals whose
/// gap is at most `padding_ms` fuse (a shared boundary counts as touching).
/// Each fused removal then shrinks inward by `padding_ms / 2` per side and is
/// discarded if nothing remains. The complement of the removals is mapped
/// onto the frame grid; keep-intervals below one frame are dropped, and
/// keeps that meet at the same frame merge into a single cut.
///
/// When everything was classified removable the planner still returns one
/// cut covering the full source, so the editor always receives a playable
/// timeline.
#[must_use]
pub fn plan(
    duration_s: f64,
    silences: &[TimeInterval],
    fillers: &[FillerHit],
    padding_ms: u32,
    fps: Fps,
) -> Vec<Cut> {
    if duration_s <= 0.0 {
        return Vec::new();
    }

    let padding_s = padding_ms as f64 / 1000.0;
    let removals = shrink(fuse(collect_removals(silences, fillers), padding_s), padding_s, duration_s);
    let keeps = invert(&removals, duration_s);
    let cuts = to_frame_grid(&keeps, fps);

    if cuts.is_empty() {
        return vec![full_source_cut(duration_s, fps)];
    }
    cuts
}

/// Merges silences and filler spans into one sorted removal list.
fn collect_removals(silences: &[TimeInterval], fillers: &[FillerHit]) -> Vec<TimeInterval> {
    let mut removals: Vec<TimeInterval> = silences.to_vec();
    for hit in fillers {
        if let Ok(interval) = TimeInterval::new(hit.start_s.max(0.0), hit.end_s) {
            removals.push(interval);
        }
    }
    removals.sort_by(|a, b| {
        a.start_s
            .partial_cmp(&b.start_s)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    removals
}

/// Fuses removals whose gap is at most `max_gap_s`. Overlap and exact shared
/// boundaries are gap zero and always fuse.
fn fuse(removals: Vec<TimeInterval>, max_gap_s: f64) -> Vec<TimeInterval> {
    let mut fused: Vec<TimeInterval> = Vec::with_capacity(removals.len());
    for removal in removals {
        match fused.last_mut() {
            Some(last) if removal.start_s - last.end_s <= max_gap_s => {
                last.end_s = last.end_s.max(removal.end_s);
            }
            _ => fused.push(removal),
        }
    }
    fused
}

/// Shrinks each removal inward by `padding_s / 2` per side, clamped to the
/// source bounds. Removals that collapse to nothing are discarded (a short
/// filler can be fully erased by padding; that is the intended contract).
fn shrink(removals: Vec<TimeInterval>, padding_s: f64, duration_s: f64) -> Vec<TimeInterval> {
    let half = padding_s / 2.0;
    removals
        .into_iter()
        .filter_map(|r| {
            let start = (r.start_s + half).max(0.0);
            let end = (r.end_s - half).min(duration_s);
            TimeInterval::new(start, end).ok()
        })
        .collect()
}

/// Complements a sorted, disjoint removal list against `[0, duration_s)`.
fn invert(removals: &[TimeInterval], duration_s: f64) -> Vec<TimeInterval> {
    let mut keeps = Vec::with_capacity(removals.len() + 1);
    let mut cursor = 0.0f64;
    for removal in removals {
        if removal.start_s > cursor {
            if let Ok(keep) = TimeInterval::new(cursor, removal.start_s.min(duration_s)) {
                keeps.push(keep);
            }
        }
        cursor = cursor.max(removal.end_s);
    }
    if cursor < duration_s {
        if let Ok(keep) = TimeInterval::new(cursor, duration_s) {
            keeps.push(keep);
        }
    }
    keeps
}

/// Maps keep-intervals onto the frame grid, dropping sub-frame keeps and
/// merging keeps that meet at the same frame boundary.
fn to_frame_grid(keeps: &[TimeInterval], fps: Fps) -> Vec<Cut> {
    let mut cuts: Vec<Cut> = Vec::with_capacity(keeps.len());
    for keep in keeps {
        let in_frame = fps.frame_index(keep.start_s);
        let out_frame = fps.frame_index(keep.end_s);
        if out_frame <= in_frame {
            continue;
        }
        match cuts.last_mut() {
            // Padding shrink can land two keeps on the same frame; a
            // zero-length gap is not representable, so they become one cut.
            Some(last) if last.out_frame == in_frame => {
                last.interval.end_s = keep.end_s;
                last.out_frame = out_frame;
            }
            _ => cuts.push(Cut {
                interval: *keep,
                in_frame,
                out_frame,
            }),
        }
    }
    cuts
}

fn full_source_cut(duration_s: f64, fps: Fps) -> Cut {
    let out_frame = fps.frame_index(duration_s).max(1);
    Cut {
        interval: TimeInterval {
            start_s: 0.0,
            end_s: duration_s,
        },
        in_frame: 0,
        out_frame,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{is_sorted_disjoint, total_frames};

    fn fps30() -> Fps {
        Fps::from_nominal(30.0).unwrap()
    }

    fn interval(start: f64, end: f64) -> TimeInterval {
        TimeInterval::new(start, end).unwrap()
    }

    fn hit(start: f64, end: f64, confidence: f64) -> FillerHit {
        FillerHit {
            word: "euh".into(),
            start_s: start,
            end_s: end,
            confidence,
        }
    }

    #[test]
    fn single_silence_pads_symmetrically() {
        // 10 s clip, silence [4, 6), padding 250 ms.
        let cuts = plan(10.0, &[interval(4.0, 6.0)], &[], 250, fps30());
        assert_eq!(cuts.len(), 2);
        assert!((cuts[0].interval.start_s - 0.0).abs() < 1e-9);
        assert!((cuts[0].interval.end_s - 4.125).abs() < 1e-9);
        assert!((cuts[1].interval.start_s - 5.875).abs() < 1e-9);
        assert!((cuts[1].interval.end_s - 10.0).abs() < 1e-9);
        // Legacy sequence duration: 124 + 124 frames.
        assert_eq!(cuts[0].frames(), 124);
        assert_eq!(cuts[1].frames(), 124);
        assert_eq!(total_frames(&cuts), 248);
    }

    #[test]
    fn nearby_silences_fuse_before_shrinking() {
        // Gap of 200 ms <= 250 ms padding: one removal [3.0, 4.8),
        // shrunk to [3.125, 4.675), leaving two keeps around it.
        let cuts = plan(
            10.0,
            &[interval(3.0, 3.6), interval(3.8, 4.8)],
            &[],
            250,
            fps30(),
        );
        assert_eq!(cuts.len(), 2);
        assert!((cuts[0].interval.end_s - 3.125).abs() < 1e-9);
        assert!((cuts[1].interval.start_s - 4.675).abs() < 1e-9);
    }

    #[test]
    fn gap_wider_than_padding_stays_split() {
        let cuts = plan(
            10.0,
            &[interval(3.0, 3.6), interval(4.0, 4.8)],
            &[],
            250,
            fps30(),
        );
        // Two removals survive, so three keeps.
        assert_eq!(cuts.len(), 3);
    }

    #[test]
    fn shared_boundary_fuses() {
        let cuts = plan(10.0, &[interval(3.0, 4.0), interval(4.0, 5.0)], &[], 0, fps30());
        assert_eq!(cuts.len(), 2);
        assert!((cuts[0].interval.end_s - 3.0).abs() < 1e-9);
        assert!((cuts[1].interval.start_s - 5.0).abs() < 1e-9);
    }

    #[test]
    fn padding_can_erase_a_short_filler() {
        // 250 ms filler with 250 ms padding shrinks to nothing: the removal
        // is discarded and the whole source is one cut.
        let cuts = plan(10.0, &[], &[hit(5.10, 5.35, 0.9)], 250, fps30());
        assert_eq!(cuts.len(), 1);
        assert!((cuts[0].interval.start_s - 0.0).abs() < 1e-9);
        assert!((cuts[0].interval.end_s - 10.0).abs() < 1e-9);
        assert_eq!(cuts[0].frames(), 300);
    }

    #[test]
    fn all_silent_source_still_yields_playable_timeline() {
        let cuts = plan(2.0, &[interval(0.0, 2.0)], &[], 0, fps30());
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].in_frame, 0);
        assert_eq!(cuts[0].out_frame, 60);
    }

    #[test]
    fn no_removals_is_one_full_cut() {
        let cuts = plan(10.0, &[], &[], 250, fps30());
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].frames(), 300);
    }

    #[test]
    fn silences_and_fillers_merge_into_one_removal_stream() {
        let cuts = plan(
            20.0,
            &[interval(2.0, 4.0)],
            &[hit(3.9, 4.5, 0.9), hit(10.0, 11.0, 0.8)],
            0,
            fps30(),
        );
        // [2, 4.5) (fused via overlap) and [10, 11) removed: three keeps.
        assert_eq!(cuts.len(), 3);
        assert!((cuts[1].interval.start_s - 4.5).abs() < 1e-9);
        assert!((cuts[1].interval.end_s - 10.0).abs() < 1e-9);
    }

    #[test]
    fn kept_plus_removed_equals_duration() {
        let duration = 30.0;
        let cuts = plan(
            duration,
            &[interval(1.0, 3.0), interval(10.0, 12.5), interval(28.0, 30.0)],
            &[hit(20.0, 20.9, 0.9)],
            200,
            fps30(),
        );
        let keeps: Vec<TimeInterval> = cuts.iter().map(|c| c.interval).collect();
        assert!(is_sorted_disjoint(&keeps));

        let kept: f64 = keeps.iter().map(TimeInterval::duration_s).sum();
        // Removed = complement of keeps; with clamping the sum is exact.
        let mut removed = keeps.first().map(|k| k.start_s).unwrap_or(duration);
        for pair in keeps.windows(2) {
            removed += pair[1].start_s - pair[0].end_s;
        }
        removed += duration - keeps.last().map(|k| k.end_s).unwrap_or(0.0);
        assert!((kept + removed - duration).abs() < 1e-9);
    }

    #[test]
    fn replanning_own_complement_is_stable() {
        let duration = 30.0;
        let original = plan(
            duration,
            &[interval(1.0, 3.0), interval(10.0, 12.5)],
            &[],
            250,
            fps30(),
        );

        // Re-derive the removal list from the planned keeps and plan again
        // with zero padding: the cut set must survive the round trip.
        let keeps: Vec<TimeInterval> = original.iter().map(|c| c.interval).collect();
        let removals = invert(&keeps, duration);
        let replanned = plan(duration, &removals, &[], 0, fps30());

        assert_eq!(original.len(), replanned.len());
        for (a, b) in original.iter().zip(replanned.iter()) {
            assert_eq!(a.in_frame, b.in_frame);
            assert_eq!(a.out_frame, b.out_frame);
        }
    }

    #[test]
    fn padding_growth_cannot_shatter_the_timeline() {
        let silences = [interval(2.0, 3.0), interval(6.0, 7.2), interval(11.0, 12.4)];
        let baseline = plan(20.0, &silences, &[], 0, fps30()).len();
        for padding in [0u32, 100, 250, 500, 1000] {
            let count = plan(20.0, &silences, &[], padding, fps30()).len();
            assert!(
                count + 1 >= baseline,
                "padding {padding} produced {count} cuts against baseline {baseline}"
            );
        }
    }

    #[test]
    fn sub_frame_keeps_are_dropped() {
        // Keep of 10 ms between removals is below one frame at 30 fps.
        let cuts = plan(
            10.0,
            &[interval(2.0, 4.0), interval(4.01, 6.0)],
            &[],
            0,
            fps30(),
        );
        assert_eq!(cuts.len(), 2);
        for cut in &cuts {
            assert!(cut.out_frame > cut.in_frame);
        }
    }

    #[test]
    fn keeps_meeting_at_one_frame_merge() {
        // Two keeps whose boundary rounds to the same frame become one cut.
        let cuts = plan(
            10.0,
            &[interval(4.0, 4.016)], // below one frame after rounding
            &[],
            0,
            fps30(),
        );
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].in_frame, 0);
        assert_eq!(cuts[0].out_frame, 300);
    }
}
