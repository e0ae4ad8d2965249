// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Collecting brightness into histograms.
//!
//! Sampling threads never touch a histogram.  They gather what their
//! orbits deposit into a sparse [`Hits`] set and ship it off as
//! [`Batch`]es; one [`Accumulator`] adds the batches up.  Addition is
//! the only operation, so the order in which batches arrive does not
//! matter.  When sampling is over the accumulator is consumed by
//! [`Accumulator::freeze`], and what comes out has no way to be
//! changed.

use std::collections::HashMap;

use crate::error::{RenderError, Result};
use crate::planes::{IntegralPlane, Pixel};

/// Brightness bound for one cell.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Contribution {
    /// Linear offset of the cell.
    pub offset: usize,
    /// How much to add.
    pub weight: f64,
}

/// A set of contributions for one channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    /// Which histogram the contributions belong to.
    pub channel: usize,
    /// The contributions themselves, at most one per cell.
    pub contributions: Vec<Contribution>,
}

/// Sparse staging area for one sampling thread: per channel, the total
/// weight each touched cell has collected since the last drain.
#[derive(Clone, Debug)]
pub struct Hits {
    channels: Vec<HashMap<usize, f64>>,
}

impl Hits {
    /// Room for `channels` channels.
    pub fn new(channels: usize) -> Self {
        Hits {
            channels: vec![HashMap::new(); channels],
        }
    }

    /// Add `weight` to a cell.
    pub fn add(&mut self, channel: usize, offset: usize, weight: f64) {
        if let Some(cells) = self.channels.get_mut(channel) {
            *cells.entry(offset).or_insert(0.0) += weight;
        }
    }

    /// Whether nothing has been added since the last drain.
    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(HashMap::is_empty)
    }

    /// Empty the staging area into one batch per non-empty channel.
    pub fn drain(&mut self) -> Vec<Batch> {
        self.channels
            .iter_mut()
            .enumerate()
            .filter(|(_, cells)| !cells.is_empty())
            .map(|(channel, cells)| Batch {
                channel,
                contributions: cells
                    .drain()
                    .map(|(offset, weight)| Contribution { offset, weight })
                    .collect(),
            })
            .collect()
    }
}

/// The one writer of the histograms while sampling runs.
#[derive(Debug)]
pub struct Accumulator {
    plane: IntegralPlane,
    channels: Vec<Vec<f64>>,
    scale: f64,
    batches: usize,
}

impl Accumulator {
    /// Zeroed histograms for `channels` channels over `plane`.  Every
    /// weight received is multiplied by `scale` (one over the sample
    /// count gives a per-pixel average; one keeps raw sums).
    pub fn new(plane: IntegralPlane, channels: usize, scale: f64) -> Self {
        let IntegralPlane(width, height) = plane;
        Accumulator {
            plane,
            channels: vec![vec![0.0; width * height]; channels],
            scale,
            batches: 0,
        }
    }

    /// Add one batch.  Contributions for cells or channels that do not
    /// exist, and weights that are negative or not finite, are dropped
    /// so that no cell ever decreases.
    pub fn merge(&mut self, batch: Batch) {
        self.batches += 1;
        let scale = self.scale;
        let cells = match self.channels.get_mut(batch.channel) {
            Some(cells) => cells,
            None => return,
        };
        for Contribution { offset, weight } in batch.contributions {
            let weight = weight * scale;
            if !(weight.is_finite() && weight >= 0.0) {
                continue;
            }
            if let Some(cell) = cells.get_mut(offset) {
                *cell += weight;
            }
        }
    }

    /// Add every batch from `batches`, however many there turn out to be.
    pub fn drain<I>(&mut self, batches: I)
    where
        I: IntoIterator<Item = Batch>,
    {
        for batch in batches {
            self.merge(batch);
        }
    }

    /// Number of batches merged so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// End accumulation and hand the histograms over, read-only.
    pub fn freeze(self) -> Vec<Histogram> {
        let plane = self.plane;
        self.channels
            .into_iter()
            .map(|cells| Histogram { plane, cells })
            .collect()
    }
}

/// A finished, read-only histogram.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    plane: IntegralPlane,
    cells: Vec<f64>,
}

impl Histogram {
    /// A histogram from existing cell values, row by row.
    pub fn from_cells(width: usize, height: usize, cells: Vec<f64>) -> Result<Self> {
        if cells.len() != width * height {
            return Err(RenderError::InvalidConfig(format!(
                "{} cells do not fill a {}x{} histogram",
                cells.len(),
                width,
                height
            )));
        }
        Ok(Histogram {
            plane: IntegralPlane(width, height),
            cells,
        })
    }

    /// Width in cells.
    pub fn width(&self) -> usize {
        self.plane.0
    }

    /// Height in cells.
    pub fn height(&self) -> usize {
        self.plane.1
    }

    /// All cells, row by row.
    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    /// The value at a pixel.  Zero outside the grid.
    pub fn get(&self, pixel: Pixel) -> f64 {
        let Pixel(x, y) = pixel;
        if x >= self.plane.0 || y >= self.plane.1 {
            return 0.0;
        }
        self.cells[y * self.plane.0 + x]
    }

    /// Sum of every cell.
    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }

    /// The largest cell, or zero for an empty histogram.
    pub fn max(&self) -> f64 {
        self.cells.iter().cloned().fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn batches(rng: &mut StdRng) -> Vec<Batch> {
        (0..200)
            .map(|_| Batch {
                channel: rng.gen_range(0..2),
                contributions: (0..rng.gen_range(1..10))
                    .map(|_| Contribution {
                        offset: rng.gen_range(0..16),
                        weight: rng.gen::<f64>(),
                    })
                    .collect(),
            })
            .collect()
    }

    #[test]
    fn order_does_not_change_the_sum() {
        let mut rng = StdRng::seed_from_u64(23);
        let original = batches(&mut rng);

        let mut reference = Accumulator::new(IntegralPlane(4, 4), 2, 1.0);
        reference.drain(original.clone());
        let reference = reference.freeze();

        for _ in 0..10 {
            let mut shuffled = original.clone();
            shuffled.shuffle(&mut rng);
            let mut acc = Accumulator::new(IntegralPlane(4, 4), 2, 1.0);
            acc.drain(shuffled);
            let frozen = acc.freeze();
            for (a, b) in reference.iter().zip(frozen.iter()) {
                for (x, y) in a.cells().iter().zip(b.cells()) {
                    assert!((x - y).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn weights_are_scaled_on_the_way_in() {
        let mut acc = Accumulator::new(IntegralPlane(2, 1), 1, 0.25);
        acc.merge(Batch {
            channel: 0,
            contributions: vec![Contribution { offset: 1, weight: 2.0 }],
        });
        let frozen = acc.freeze();
        assert_eq!(frozen[0].cells(), &[0.0, 0.5]);
    }

    #[test]
    fn strays_are_dropped() {
        let mut acc = Accumulator::new(IntegralPlane(2, 2), 1, 1.0);
        acc.merge(Batch {
            channel: 0,
            contributions: vec![
                Contribution { offset: 4, weight: 1.0 },
                Contribution { offset: 0, weight: -1.0 },
                Contribution { offset: 1, weight: f64::NAN },
                Contribution { offset: 2, weight: 1.5 },
            ],
        });
        acc.merge(Batch {
            channel: 3,
            contributions: vec![Contribution { offset: 0, weight: 1.0 }],
        });
        assert_eq!(acc.batches(), 2);
        let frozen = acc.freeze();
        assert_eq!(frozen.len(), 1);
        assert_eq!(frozen[0].cells(), &[0.0, 0.0, 1.5, 0.0]);
    }

    #[test]
    fn hits_collapse_repeats_and_drain_per_channel() {
        let mut hits = Hits::new(2);
        assert!(hits.is_empty());
        hits.add(0, 3, 1.0);
        hits.add(0, 3, 0.5);
        hits.add(1, 2, 0.25);
        hits.add(7, 2, 9.0);
        let mut drained = hits.drain();
        drained.sort_by_key(|b| b.channel);
        assert_eq!(
            drained,
            vec![
                Batch {
                    channel: 0,
                    contributions: vec![Contribution { offset: 3, weight: 1.5 }],
                },
                Batch {
                    channel: 1,
                    contributions: vec![Contribution { offset: 2, weight: 0.25 }],
                },
            ]
        );
        assert!(hits.is_empty());
        assert!(hits.drain().is_empty());
    }

    #[test]
    fn frozen_histograms_answer_questions() {
        let h = Histogram::from_cells(3, 2, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(h.width(), 3);
        assert_eq!(h.height(), 2);
        assert_eq!(h.get(Pixel(1, 1)), 4.0);
        assert_eq!(h.get(Pixel(3, 0)), 0.0);
        assert_eq!(h.total(), 15.0);
        assert_eq!(h.max(), 5.0);
        assert!(Histogram::from_cells(3, 3, vec![0.0; 4]).is_err());
    }
}
