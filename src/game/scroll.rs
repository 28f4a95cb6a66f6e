use crate::game::song::NoteEvent;

// Percentile of the sorted positive note gaps used as the reference spacing.
const GAP_PERCENTILE: f32 = 0.1;

/// Fall speed so one tile height of travel spans the reference note gap.
pub fn adaptive_fall_speed(
    notes: &[NoteEvent],
    bpm: f32,
    tile_height: f32,
    min_speed: f32,
    max_speed: f32,
) -> f32 {
    if notes.len() < 2 || !bpm.is_finite() || bpm <= 0.0 {
        return min_speed;
    }
    let mut gaps: Vec<f32> = notes
        .windows(2)
        .map(|w| w[1].start_beat - w[0].start_beat)
        .filter(|gap| *gap > 0.0)
        .collect();
    if gaps.is_empty() {
        return min_speed;
    }
    gaps.sort_by(f32::total_cmp);
    let idx = ((gaps.len() as f32 * GAP_PERCENTILE) as usize).min(gaps.len() - 1);
    let gap_seconds = gaps[idx] * 60.0 / bpm;
    (tile_height / gap_seconds).clamp(min_speed, max_speed)
}

#[cfg(test)]
mod tests {
    use super::adaptive_fall_speed;
    use crate::game::song::NoteEvent;

    fn evenly_spaced(n: usize, gap: f32) -> Vec<NoteEvent> {
        (0..n)
            .map(|i| NoteEvent::new(60, i as f32 * gap, gap))
            .collect()
    }

    #[test]
    fn one_tile_height_per_reference_gap() {
        // Quarter notes at 120 BPM are 0.5s apart.
        let speed = adaptive_fall_speed(&evenly_spaced(8, 1.0), 120.0, 320.0, 100.0, 5000.0);
        assert!((speed - 640.0).abs() <= 1e-3, "got {speed}");
    }

    #[test]
    fn resists_a_single_grace_note() {
        let mut notes = evenly_spaced(20, 1.0);
        // One grace note 1/16 beat after beat 5.
        notes.insert(6, NoteEvent::new(61, 5.0625, 0.1));
        let speed = adaptive_fall_speed(&notes, 120.0, 320.0, 100.0, 5000.0);
        assert!((speed - 640.0).abs() <= 1e-3, "got {speed}");
    }

    #[test]
    fn clamps_and_degenerate_inputs() {
        let dense = evenly_spaced(8, 0.0625);
        assert!((adaptive_fall_speed(&dense, 240.0, 320.0, 600.0, 2400.0) - 2400.0).abs() <= 1e-3);
        let sparse = evenly_spaced(8, 8.0);
        assert!((adaptive_fall_speed(&sparse, 60.0, 320.0, 600.0, 2400.0) - 600.0).abs() <= 1e-3);
        assert!((adaptive_fall_speed(&evenly_spaced(1, 1.0), 120.0, 320.0, 600.0, 2400.0) - 600.0).abs() <= 1e-3);
        let stacked = vec![NoteEvent::new(60, 2.0, 1.0), NoteEvent::new(64, 2.0, 1.0)];
        assert!((adaptive_fall_speed(&stacked, 120.0, 320.0, 600.0, 2400.0) - 600.0).abs() <= 1e-3);
    }
}
