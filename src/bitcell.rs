/*
    rawtrack
    https://github.com/dbalsom/rawtrack

    Copyright 2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/bitcell.rs

    A bounded ring of 16-bit bitcell words shared between the track engine
    and the drive-emulation front end. Single producer, single consumer:
    the producer only advances `prod`, the consumer only advances `cons`.
    Both counters are in bitcells (16 per word) and wrap modulo 2^32; the
    power-of-two word capacity makes index masking free.
*/

/// Default ring capacity in words. One revolution of an ED track is 25_000
/// words, so the front end always consumes concurrently; the ring only has
/// to cover scheduling jitter plus the largest single emitted field (1 KiB).
pub const DEFAULT_RING_WORDS: usize = 2048;

#[derive(Clone, Debug)]
pub struct BitcellRing {
    words: Vec<u16>,
    /// Producer position, in bitcells.
    pub prod: u32,
    /// Consumer position, in bitcells.
    pub cons: u32,
}

impl Default for BitcellRing {
    fn default() -> Self {
        BitcellRing::new(DEFAULT_RING_WORDS)
    }
}

impl BitcellRing {
    pub fn new(word_capacity: usize) -> Self {
        assert!(word_capacity.is_power_of_two());
        BitcellRing {
            words: vec![0; word_capacity],
            prod: 0,
            cons: 0,
        }
    }

    #[inline]
    fn mask(&self) -> u32 {
        (self.words.len() - 1) as u32
    }

    pub fn word_capacity(&self) -> usize {
        self.words.len()
    }

    pub fn reset(&mut self) {
        self.prod = 0;
        self.cons = 0;
        self.words.fill(0);
    }

    /// Words currently buffered. Counter wrap is interpreted 16-bit, which
    /// caps usable ring sizes at 64K words.
    pub fn used_words(&self) -> usize {
        ((self.prod / 16).wrapping_sub(self.cons / 16) as u16) as usize
    }

    pub fn space_words(&self) -> usize {
        self.words.len() - self.used_words()
    }

    /// Producer side: append one word. The caller is responsible for having
    /// checked `space_words()`; overruns clobber unconsumed data just as
    /// they would on the wire.
    #[inline]
    pub fn push_word(&mut self, w: u16) {
        let idx = (self.prod / 16) & self.mask();
        self.words[idx as usize] = w;
        self.prod = self.prod.wrapping_add(16);
    }

    /// Random access by absolute word index (used by the write-path decoder,
    /// which rewinds on partial sectors).
    #[inline]
    pub fn word_at(&self, word_idx: u32) -> u16 {
        self.words[(word_idx & self.mask()) as usize]
    }

    /// The most recently produced word, or 0 if nothing was produced yet
    /// (the ring starts zeroed).
    #[inline]
    pub fn last_word(&self) -> u16 {
        self.word_at((self.prod / 16).wrapping_sub(1))
    }

    /// Consumer side: pop one word, if available.
    pub fn pop_word(&mut self) -> Option<u16> {
        if self.used_words() == 0 {
            return None;
        }
        let w = self.word_at(self.cons / 16);
        self.cons = self.cons.wrapping_add(16);
        Some(w)
    }

    /// Producer side, bulk: push as many words as fit, returning the count.
    pub fn push_words(&mut self, src: &[u16]) -> usize {
        let n = src.len().min(self.space_words());
        for &w in &src[..n] {
            self.push_word(w);
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_and_drain() {
        let mut ring = BitcellRing::new(8);
        assert_eq!(ring.space_words(), 8);
        for w in 0..8u16 {
            ring.push_word(w);
        }
        assert_eq!(ring.space_words(), 0);
        for w in 0..8u16 {
            assert_eq!(ring.pop_word(), Some(w));
        }
        assert_eq!(ring.pop_word(), None);
    }

    #[test]
    fn counters_wrap() {
        let mut ring = BitcellRing::new(4);
        for w in 0..1000u16 {
            ring.push_word(w);
            assert_eq!(ring.pop_word(), Some(w));
        }
        assert_eq!(ring.used_words(), 0);
        assert_eq!(ring.last_word(), 999);
    }

    #[test]
    fn consumer_positioning_mid_stream() {
        let mut ring = BitcellRing::new(16);
        for w in 0..10u16 {
            ring.push_word(w);
        }
        // Skip the first three words, as the track setup path does when the
        // start position falls mid-field.
        ring.cons = 3 * 16;
        assert_eq!(ring.pop_word(), Some(3));
        assert_eq!(ring.used_words(), 6);
    }
}
