use burn::data::dataset::Dataset;

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const GO_ID:  u32 = 2;
pub const EOS_ID: u32 = 3;

/// One tokenised, padded training example.
///
///   encoder_ids: [<pad>.. context][<pad>.. input]   2 × max_input_len
///   decoder_ids: <go> target <eos> <pad>..          max_output_len
///   target_ids:  target <eos> <pad>..               max_output_len
#[derive(Debug, Clone, PartialEq)]
pub struct Seq2SeqSample {
    pub encoder_ids: Vec<u32>,
    pub decoder_ids: Vec<u32>,
    pub target_ids:  Vec<u32>,
}

impl Seq2SeqSample {
    pub fn from_ids(
        context:        &[u32],
        input:          &[u32],
        target:         &[u32],
        max_input_len:  usize,
        max_output_len: usize,
    ) -> Self {
        let mut encoder_ids = left_pad(context, max_input_len);
        encoder_ids.extend(left_pad(input, max_input_len));

        let mut decoder_ids = vec![GO_ID];
        decoder_ids.extend(target.iter().take(max_output_len.saturating_sub(2)));
        decoder_ids.push(EOS_ID);
        decoder_ids.truncate(max_output_len);

        let mut target_ids: Vec<u32> = decoder_ids.iter().skip(1).copied().collect();

        decoder_ids.resize(max_output_len, PAD_ID);
        target_ids.resize(max_output_len, PAD_ID);

        Self { encoder_ids, decoder_ids, target_ids }
    }

    /// Encoder-only example for generation: the decoder just gets <go>.
    pub fn for_generation(
        context:        &[u32],
        input:          &[u32],
        max_input_len:  usize,
        max_output_len: usize,
    ) -> Self {
        let mut sample = Self::from_ids(context, input, &[], max_input_len, max_output_len);
        sample.decoder_ids = vec![PAD_ID; max_output_len];
        if let Some(first) = sample.decoder_ids.first_mut() {
            *first = GO_ID;
        }
        sample.target_ids = vec![PAD_ID; max_output_len];
        sample
    }
}

/// Keep the last `len` ids, padding on the left so that the final
/// encoder step always sees real tokens.
fn left_pad(ids: &[u32], len: usize) -> Vec<u32> {
    let kept = &ids[ids.len().saturating_sub(len)..];
    let mut out = vec![PAD_ID; len - kept.len()];
    out.extend_from_slice(kept);
    out
}

pub struct Seq2SeqDataset {
    samples: Vec<Seq2SeqSample>,
}

impl Seq2SeqDataset {
    pub fn new(samples: Vec<Seq2SeqSample>) -> Self { Self { samples } }
}

impl Dataset<Seq2SeqSample> for Seq2SeqDataset {
    fn get(&self, index: usize) -> Option<Seq2SeqSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
