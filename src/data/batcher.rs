// ============================================================
// Layer 4 — Seq2Seq Batcher
// ============================================================
// Stacks padded samples into Int tensors:
//
//   encoder_inputs [batch, 2 × max_input_len]
//   decoder_inputs [batch, max_output_len]
//   targets        [batch, max_output_len]
//
// All samples share their lengths (padding happens when samples
// are built), so each field is one flat Vec reshaped to 2D.

use anyhow::{bail, Result};
use burn::{prelude::*, tensor::TensorData};

use crate::data::dataset::Seq2SeqSample;

#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    pub encoder_inputs: Tensor<B, 2, Int>,
    pub decoder_inputs: Tensor<B, 2, Int>,
    pub targets:        Tensor<B, 2, Int>,
}

impl<B: Backend> Seq2SeqBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.encoder_inputs.dims()[0]
    }
}

#[derive(Clone, Debug)]
pub struct Seq2SeqBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> Seq2SeqBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    pub fn batch(&self, items: &[Seq2SeqSample]) -> Result<Seq2SeqBatch<B>> {
        let Some(first) = items.first() else {
            bail!("cannot batch zero samples");
        };
        let enc_len = first.encoder_ids.len();
        let dec_len = first.decoder_ids.len();
        if items
            .iter()
            .any(|s| s.encoder_ids.len() != enc_len || s.decoder_ids.len() != dec_len || s.target_ids.len() != dec_len)
        {
            bail!("samples in one batch must share their padded lengths");
        }

        let rows = items.len();
        Ok(Seq2SeqBatch {
            encoder_inputs: self.stack(items.iter().map(|s| s.encoder_ids.as_slice()), rows, enc_len),
            decoder_inputs: self.stack(items.iter().map(|s| s.decoder_ids.as_slice()), rows, dec_len),
            targets:        self.stack(items.iter().map(|s| s.target_ids.as_slice()), rows, dec_len),
        })
    }

    fn stack<'a>(
        &self,
        rows:  impl Iterator<Item = &'a [u32]>,
        batch: usize,
        width: usize,
    ) -> Tensor<B, 2, Int> {
        let flat: Vec<i64> = rows.flat_map(|row| row.iter().map(|&id| id as i64)).collect();
        Tensor::from_data(TensorData::new(flat, [batch, width]), &self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::{EOS_ID, GO_ID};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shapes() {
        let batcher = Seq2SeqBatcher::<TestBackend>::new(Default::default());
        let samples = vec![
            Seq2SeqSample::from_ids(&[4], &[5], &[6, 7], 3, 5),
            Seq2SeqSample::from_ids(&[8, 9], &[10], &[11], 3, 5),
        ];
        let batch = batcher.batch(&samples).unwrap();

        assert_eq!(batch.batch_size(), 2);
        assert_eq!(batch.encoder_inputs.dims(), [2, 6]);
        assert_eq!(batch.decoder_inputs.dims(), [2, 5]);
        assert_eq!(batch.targets.dims(), [2, 5]);
    }

    #[test]
    fn test_rows_keep_sample_order() {
        let batcher = Seq2SeqBatcher::<TestBackend>::new(Default::default());
        let samples = vec![Seq2SeqSample::from_ids(&[], &[5], &[6], 1, 3)];
        let batch = batcher.batch(&samples).unwrap();

        let decoder: Vec<i64> = batch
            .decoder_inputs
            .into_data()
            .convert::<i64>()
            .to_vec::<i64>()
            .unwrap();
        assert_eq!(decoder, vec![GO_ID as i64, 6, EOS_ID as i64]);
    }

    #[test]
    fn test_zero_width_rows_keep_the_batch_size() {
        let batcher = Seq2SeqBatcher::<TestBackend>::new(Default::default());
        let samples = vec![
            Seq2SeqSample::from_ids(&[4], &[5], &[6], 2, 0),
            Seq2SeqSample::from_ids(&[7], &[8], &[9], 2, 0),
            Seq2SeqSample::from_ids(&[1], &[2], &[3], 2, 0),
        ];
        let batch = batcher.batch(&samples).unwrap();

        assert_eq!(batch.batch_size(), 3);
        assert_eq!(batch.encoder_inputs.dims(), [3, 4]);
        assert_eq!(batch.decoder_inputs.dims(), [3, 0]);
        assert_eq!(batch.targets.dims(), [3, 0]);
    }

    #[test]
    fn test_empty_or_ragged_batches_fail() {
        let batcher = Seq2SeqBatcher::<TestBackend>::new(Default::default());
        assert!(batcher.batch(&[]).is_err());

        let ragged = vec![
            Seq2SeqSample::from_ids(&[], &[5], &[6], 1, 3),
            Seq2SeqSample::from_ids(&[], &[5], &[6], 2, 3),
        ];
        assert!(batcher.batch(&ragged).is_err());
    }
}
