//! The flake field: particle state plus the per-tick update rule.
//!
//! Every flake carries an integer sub-pixel accumulator instead of a float
//! position: each tick adds the flake's speed, and only when the sum
//! crosses [`SLOWDOWN`] does the flake drop one row. Landing is decided by
//! the alpha channel of the destination cell — settled terrain blocks the
//! fall, and a blocked flake first tries to slide one column down a slope
//! before it settles for good and respawns at the top.
//!
//! The slope check inspects only the immediate left/right neighbors at the
//! destination row, not the full diagonal path, so a flake can slip past a
//! thin overhang in rare layouts. Deliberate: it keeps the rule one memory
//! probe per direction and the motion reads fine on screen.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::pixel::{gray, settled_gray, Bgra8, MAX_SPEED};
use crate::surface::Frame;

/// Accumulator threshold for dropping one row. A flake at full speed moves
/// every tick; slower flakes skip ticks proportionally.
pub const SLOWDOWN: i32 = 200;

/// Vertical band (in rows) that freshly initialized fields scatter flakes
/// across, so they do not all start in lockstep on row zero.
const INIT_BAND: u32 = 40;

/// One falling flake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flake {
    /// Column, always in `[0, width)`.
    pub x: i32,
    /// Row, always in `[0, height)`.
    pub y: i32,
    /// Sub-pixel vertical accumulator, in `[0, SLOWDOWN)` between ticks.
    pub accum: i32,
    /// Fall rate, in `[0, MAX_SPEED)`.
    pub speed: u8,
}

/// The array of flakes and the per-tick update rule.
pub struct FlakeField {
    flakes: Vec<Flake>,
    rng: StdRng,
}

impl FlakeField {
    /// Create a field of `count` flakes scattered over the top band of
    /// `frame`, clearing the frame and drawing the terrain floor.
    pub fn new(count: usize, frame: &mut Frame) -> Self {
        Self::with_rng(count, StdRng::from_entropy(), frame)
    }

    /// Deterministic variant for tests.
    pub fn with_seed(count: usize, seed: u64, frame: &mut Frame) -> Self {
        Self::with_rng(count, StdRng::seed_from_u64(seed), frame)
    }

    fn with_rng(count: usize, rng: StdRng, frame: &mut Frame) -> Self {
        let mut field = FlakeField {
            flakes: Vec::with_capacity(count),
            rng,
        };
        field.flakes.resize(count, Flake::default());
        field.reset(frame);
        field
    }

    pub fn len(&self) -> usize {
        self.flakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flakes.is_empty()
    }

    pub fn flakes(&self) -> &[Flake] {
        &self.flakes
    }

    #[cfg(test)]
    pub(crate) fn flakes_mut(&mut self) -> &mut [Flake] {
        &mut self.flakes
    }

    /// Respawn every flake in the top band and reset the frame to a clear
    /// sky over an opaque floor.
    pub fn reset(&mut self, frame: &mut Frame) {
        let width = frame.width() as i32;
        let band = INIT_BAND.min(frame.height()) as i32;
        for i in 0..self.flakes.len() {
            respawn(&mut self.flakes[i], &mut self.rng, width);
            self.flakes[i].y = self.rng.gen_range(0..band);
            self.flakes[i].accum = 0;
        }
        frame.clear_with_floor();
    }

    /// Grow or shrink the field to `count` flakes. Removed flakes erase
    /// their pixels; added flakes spawn at the top row.
    pub fn set_count(&mut self, count: usize, frame: &mut Frame) {
        let old = self.flakes.len();
        if count < old {
            for f in &self.flakes[count..] {
                frame.put(f.x as u32, f.y as u32, Bgra8::CLEAR);
            }
            self.flakes.truncate(count);
        } else {
            let width = frame.width() as i32;
            for _ in old..count {
                let mut f = Flake::default();
                respawn(&mut f, &mut self.rng, width);
                self.flakes.push(f);
            }
        }
        log::debug!("flake count {} -> {}", old, count);
    }

    /// Advance every flake one tick.
    pub fn tick(&mut self, frame: &mut Frame) {
        let FlakeField { flakes, rng } = self;
        for f in flakes.iter_mut() {
            move_flake(f, frame, rng);
        }
    }

    /// Erase and respawn every flake inside the rectangle
    /// `[x, x+w) x [y, y+h)`. Used before stamping an image so no flake is
    /// trapped inside freshly painted terrain.
    pub fn evict_rect(&mut self, x: i32, y: i32, w: i32, h: i32, frame: &mut Frame) {
        let width = frame.width() as i32;
        for f in self.flakes.iter_mut() {
            if f.x >= x && f.y >= y && f.x < x + w && f.y < y + h {
                frame.put(f.x as u32, f.y as u32, Bgra8::CLEAR);
                respawn(f, &mut self.rng, width);
            }
        }
    }
}

/// New top-row state: random column, random speed, zeroed row and
/// accumulator.
fn respawn(f: &mut Flake, rng: &mut StdRng, width: i32) {
    f.x = rng.gen_range(0..width);
    f.speed = rng.gen_range(0..MAX_SPEED);
    f.y = 0;
    f.accum = 0;
}

fn move_flake(f: &mut Flake, frame: &mut Frame, rng: &mut StdRng) {
    f.accum += f.speed as i32;
    if f.accum < SLOWDOWN {
        return;
    }

    let width = frame.width() as i32;
    let height = frame.height() as i32;

    // Erase the old cell, then drop one row.
    frame.put(f.x as u32, f.y as u32, Bgra8::CLEAR);
    f.accum %= SLOWDOWN;
    f.y += 1;

    // The floor row is normally opaque and stops the fall one row short,
    // but a paint stroke can carve it away. Respawn instead of indexing
    // past the buffer.
    if f.y >= height {
        respawn(f, rng, width);
        frame.put(f.x as u32, f.y as u32, gray(f.speed));
        return;
    }

    if frame.get(f.x as u32, f.y as u32).is_settled() {
        // Blocked below. We might be on a slope: try one column left,
        // then one column right, at the destination row.
        if f.x > 0 && !frame.get((f.x - 1) as u32, f.y as u32).is_settled() {
            f.x -= 1;
        } else if f.x + 1 < width && !frame.get((f.x + 1) as u32, f.y as u32).is_settled() {
            f.x += 1;
        } else {
            // Not on a slope: settle at the pre-move cell, brightened and
            // marked static, and start over as a fresh flake.
            frame.put(f.x as u32, (f.y - 1) as u32, settled_gray(f.speed));
            respawn(f, rng, width);
        }
    }

    frame.put(f.x as u32, f.y as u32, gray(f.speed));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{PixelFormat, PixelSize, ALPHA_SETTLED};
    use crate::surface::Surface;

    fn surface(w: u32, h: u32) -> Surface {
        Surface::new(PixelSize::new(w, h), PixelFormat::Bgra8888).unwrap()
    }

    fn in_bounds(field: &FlakeField, size: PixelSize) -> bool {
        field.flakes().iter().all(|f| {
            f.x >= 0 && (f.x as u32) < size.width && f.y >= 0 && (f.y as u32) < size.height
        })
    }

    #[test]
    fn flakes_stay_in_bounds_over_many_ticks() {
        let s = surface(32, 24);
        let mut frame = s.lock();
        let mut field = FlakeField::with_seed(50, 7, &mut frame);
        for _ in 0..2000 {
            field.tick(&mut frame);
            assert!(in_bounds(&field, frame.size()));
        }
    }

    #[test]
    fn flakes_respawn_when_floor_is_carved_away() {
        let s = surface(8, 6);
        let mut frame = s.lock();
        let mut field = FlakeField::with_seed(10, 3, &mut frame);
        // Remove the terrain line entirely.
        for x in 0..8 {
            frame.put(x, 5, Bgra8::CLEAR);
        }
        for _ in 0..500 {
            field.tick(&mut frame);
            assert!(in_bounds(&field, frame.size()));
        }
    }

    #[test]
    fn full_speed_flake_descends_one_row_per_tick_and_settles() {
        let s = surface(5, 5);
        let mut frame = s.lock();
        let mut field = FlakeField::with_seed(1, 1, &mut frame);
        {
            let f = &mut field.flakes_mut()[0];
            f.x = 2;
            f.y = 0;
            f.accum = 0;
            f.speed = SLOWDOWN as u8;
        }

        for expected_y in 1..4 {
            field.tick(&mut frame);
            assert_eq!(field.flakes()[0].y, expected_y);
        }

        // Fourth tick: row 4 is the opaque floor, so the flake settles at
        // row 3 and respawns at the top.
        field.tick(&mut frame);
        assert_eq!(field.flakes()[0].y, 0);
        assert_eq!(frame.get(2, 3).a, ALPHA_SETTLED);
    }

    #[test]
    fn slow_flake_waits_for_accumulator() {
        let s = surface(5, 8);
        let mut frame = s.lock();
        let mut field = FlakeField::with_seed(1, 1, &mut frame);
        {
            let f = &mut field.flakes_mut()[0];
            f.x = 2;
            f.y = 0;
            f.accum = 0;
            f.speed = 100; // crosses the threshold every second tick
        }

        field.tick(&mut frame);
        assert_eq!(field.flakes()[0].y, 0);
        field.tick(&mut frame);
        assert_eq!(field.flakes()[0].y, 1);
        assert_eq!(field.flakes()[0].accum, 0);
    }

    #[test]
    fn blocked_flake_slides_down_open_slope() {
        let s = surface(5, 5);
        let mut frame = s.lock();
        let mut field = FlakeField::with_seed(1, 1, &mut frame);
        // A one-pixel peak at (2, 3); columns 1 and 3 are open there.
        frame.put(2, 3, Bgra8::TERRAIN);
        {
            let f = &mut field.flakes_mut()[0];
            f.x = 2;
            f.y = 2;
            f.accum = 0;
            f.speed = SLOWDOWN as u8;
        }

        field.tick(&mut frame);
        // Left neighbor is checked first.
        assert_eq!(field.flakes()[0].x, 1);
        assert_eq!(field.flakes()[0].y, 3);
    }

    #[test]
    fn settling_is_idempotent_when_neighbors_are_settled() {
        let s = surface(5, 5);
        let mut frame = s.lock();
        let mut field = FlakeField::with_seed(1, 99, &mut frame);
        // A plateau across the destination row: no slope to follow.
        for x in 1..4 {
            frame.put(x, 3, Bgra8::TERRAIN);
        }
        {
            let f = &mut field.flakes_mut()[0];
            f.x = 2;
            f.y = 2;
            f.accum = 0;
            f.speed = SLOWDOWN as u8;
        }

        field.tick(&mut frame);
        // Settled at the pre-move cell, no horizontal shift.
        assert_eq!(frame.get(2, 2).a, ALPHA_SETTLED);
        assert_eq!(field.flakes()[0].y, 0);
    }

    #[test]
    fn shrinking_erases_removed_flakes() {
        let s = surface(16, 16);
        let mut frame = s.lock();
        let mut field = FlakeField::with_seed(20, 5, &mut frame);
        // Give removed flakes visible pixels first.
        field.tick(&mut frame);

        field.set_count(5, &mut frame);
        assert_eq!(field.len(), 5);

        field.set_count(12, &mut frame);
        assert_eq!(field.len(), 12);
        // New flakes spawn on the top row.
        assert!(field.flakes()[5..].iter().all(|f| f.y == 0));
    }

    #[test]
    fn evict_rect_respawns_covered_flakes() {
        let s = surface(8, 8);
        let mut frame = s.lock();
        let mut field = FlakeField::with_seed(1, 2, &mut frame);
        {
            let f = &mut field.flakes_mut()[0];
            f.x = 0;
            f.y = 0;
        }
        frame.put(0, 0, gray(10));

        field.evict_rect(0, 0, 2, 2, &mut frame);
        let f = field.flakes()[0];
        assert_eq!(f.y, 0);
        assert_eq!(frame.get(0, 0), Bgra8::CLEAR);
        // Position re-randomized across the full width.
        assert!(f.x >= 0 && f.x < 8);
    }
}
