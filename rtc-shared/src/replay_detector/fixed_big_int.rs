/// FixedBigInt is the fix-sized multi-word integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FixedBigInt {
    bits: Vec<u64>,
    n: usize,
    msb_mask: u64,
}

impl FixedBigInt {
    pub(crate) fn new(n: usize) -> Self {
        let mut chunk_size = n.div_ceil(64);
        if chunk_size == 0 {
            chunk_size = 1;
        }

        FixedBigInt {
            bits: vec![0; chunk_size],
            n,
            msb_mask: if n % 64 == 0 {
                u64::MAX
            } else {
                (1 << (n % 64)) - 1
            },
        }
    }

    /// lsh is the left shift operation.
    pub(crate) fn lsh(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let n_chunk = n / 64;
        let n_n = n % 64;

        for i in (0..self.bits.len()).rev() {
            let mut word = 0;
            if i >= n_chunk {
                let src = i - n_chunk;
                word = self.bits[src] << n_n;
                if n_n != 0 && src > 0 {
                    word |= self.bits[src - 1] >> (64 - n_n);
                }
            }
            self.bits[i] = word;
        }

        let last = self.bits.len() - 1;
        self.bits[last] &= self.msb_mask;
    }

    /// bit returns i-th bit of the fixedBigInt.
    pub(crate) fn bit(&self, i: usize) -> usize {
        if i >= self.n {
            return 0;
        }
        let chunk = i / 64;
        let pos = i % 64;
        usize::from(self.bits[chunk] & (1 << pos) != 0)
    }

    /// set_bit sets i-th bit to 1.
    pub(crate) fn set_bit(&mut self, i: usize) {
        if i >= self.n {
            return;
        }
        let chunk = i / 64;
        let pos = i % 64;
        self.bits[chunk] |= 1 << pos;
    }

    pub(crate) fn words(&self) -> &[u64] {
        &self.bits
    }

    pub(crate) fn from_words(n: usize, words: &[u64]) -> Option<Self> {
        let mut f = FixedBigInt::new(n);
        if words.len() != f.bits.len() {
            return None;
        }
        f.bits.copy_from_slice(words);
        let last = f.bits.len() - 1;
        f.bits[last] &= f.msb_mask;
        Some(f)
    }
}
