// ============================================================
// Layer 4 — Datasource (epoch-aware batch stream)
// ============================================================
// The training loop pulls batches one at a time:
//
//   source.start_epoch(epoch);
//   while let Some(batch) = source.next_batch()? { ... }
//
// `None` is the end-of-epoch signal. Order inside an epoch is a
// shuffle seeded by (run seed, epoch), so a resumed run can skip
// the batches it already consumed and see exactly what the
// uninterrupted run would have seen next.
//
// An epoch that cannot produce even its first batch means the
// split is empty: that is a misconfiguration, not an epoch end.

use anyhow::Result;
use burn::{data::dataloader::batcher::Batcher, data::dataset::Dataset, prelude::*};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::batcher::{NecstBatch, NecstBatcher};
use crate::data::dataset::ExampleDataset;
use crate::domain::error::NecstError;

pub struct Datasource<B: Backend> {
    dataset:    ExampleDataset,
    batcher:    NecstBatcher<B>,
    batch_size: usize,
    shuffle:    bool,
    seed:       u64,
    epoch:      usize,
    order:      Vec<usize>,
    cursor:     usize,
    served:     usize,
}

impl<B: Backend> Datasource<B> {
    /// `shuffle = false` keeps dataset order (validation, test, analysis)
    pub fn new(
        dataset:    ExampleDataset,
        batch_size: usize,
        shuffle:    bool,
        seed:       u64,
        device:     B::Device,
    ) -> Self {
        let order = (0..dataset.len()).collect();
        Self {
            dataset,
            batcher: NecstBatcher::new(device),
            batch_size: batch_size.max(1),
            shuffle,
            seed,
            epoch: 0,
            order,
            cursor: 0,
            served: 0,
        }
    }

    /// Reset the stream to the beginning of `epoch`
    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch  = epoch;
        self.cursor = 0;
        self.served = 0;
        self.order  = (0..self.dataset.len()).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(
                self.seed ^ (epoch as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
            );
            self.order.shuffle(&mut rng);
        }
    }

    /// Next batch of the current epoch, `None` once the epoch is done
    pub fn next_batch(&mut self) -> Result<Option<NecstBatch<B>>> {
        if self.cursor >= self.order.len() {
            if self.served == 0 {
                return Err(NecstError::DataExhausted { epoch: self.epoch }.into());
            }
            return Ok(None);
        }

        let end   = (self.cursor + self.batch_size).min(self.order.len());
        let items = self.order[self.cursor..end]
            .iter()
            .filter_map(|&i| self.dataset.get(i))
            .collect::<Vec<_>>();
        self.cursor  = end;
        self.served += 1;

        Ok(Some(self.batcher.batch(items)))
    }

    /// Drop the next `n` batches of the current epoch without building tensors
    pub fn skip_batches(&mut self, n: usize) {
        let remaining = self.order.len().saturating_sub(self.cursor);
        let items     = n.saturating_mul(self.batch_size).min(remaining);
        self.cursor  += items;
        self.served  += items.div_ceil(self.batch_size);
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }
}
