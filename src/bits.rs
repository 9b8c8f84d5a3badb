/// MSB-first bit cursor over one chunk of slice data.
///
/// Keeps a 64 bit shift register topped up so that at least 32 bits
/// can always be peeked. Past the end of the chunk the register is
/// filled with zero bits; a zero run always decodes as end of slice,
/// so the decoder never needs to check for underrun explicitly.
pub(crate) struct BitCursor<'a> {
    data: &'a [u8],
    pos: usize,
    cache: u64,
    avail: u32,
}

impl<'a> BitCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        let mut cursor = BitCursor {
            data,
            pos: 0,
            cache: 0,
            avail: 0,
        };
        cursor.refill();
        cursor
    }

    fn refill(&mut self) {
        while self.avail <= 56 {
            let byte = self.data.get(self.pos).copied().unwrap_or(0);
            self.pos += 1;
            self.cache |= u64::from(byte) << (56 - self.avail);
            self.avail += 8;
        }
    }

    /// Next `n` bits (at most 32) without consuming them.
    #[inline]
    pub fn peek(&self, n: u32) -> u32 {
        debug_assert!(n <= 32);
        if n == 0 {
            return 0;
        }
        (self.cache >> (64 - n)) as u32
    }

    /// Next `n` bits, sign-extended from bit `n - 1`.
    #[inline]
    pub fn peek_signed(&self, n: u32) -> i32 {
        debug_assert!(n > 0 && n <= 32);
        ((self.cache >> 32) as i32) >> (32 - n)
    }

    /// The next 32 bits, used by the table lookups.
    #[inline]
    pub fn window(&self) -> u32 {
        (self.cache >> 32) as u32
    }

    #[inline]
    pub fn consume(&mut self, n: u32) {
        debug_assert!(n <= 32);
        self.cache <<= n;
        self.avail -= n;
        if self.avail < 32 {
            self.refill();
        }
    }

    #[inline]
    pub fn read(&mut self, n: u32) -> u32 {
        let value = self.peek(n);
        self.consume(n);
        value
    }

    #[inline]
    pub fn read_signed(&mut self, n: u32) -> i32 {
        let value = self.peek_signed(n);
        self.consume(n);
        value
    }

    #[inline]
    pub fn read_bit(&mut self) -> bool {
        self.read(1) == 1
    }

    /// Bits consumed so far.
    pub fn position(&self) -> usize {
        self.pos * 8 - self.avail as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peek_and_consume() {
        let data = [0b1011_0011, 0xff, 0x00, 0x81];
        let mut cursor = BitCursor::new(&data);
        assert_eq!(cursor.peek(4), 0b1011);
        assert_eq!(cursor.read(3), 0b101);
        assert_eq!(cursor.read(5), 0b10011);
        assert_eq!(cursor.position(), 8);
        assert_eq!(cursor.read(16), 0xff00);
        assert!(cursor.read_bit());
        assert_eq!(cursor.read(7), 1);
        assert_eq!(cursor.position(), 32);
    }

    #[test]
    fn signed_reads() {
        let data = [0b1111_0000, 0b0111_1111, 0b1111_0000];
        let mut cursor = BitCursor::new(&data);
        assert_eq!(cursor.read_signed(4), -1);
        assert_eq!(cursor.read_signed(4), 0);
        assert_eq!(cursor.read_signed(12), 2047);
        assert_eq!(cursor.peek_signed(4), 0);
    }

    #[test]
    fn zero_bits_past_end() {
        let data = [0xaa];
        let mut cursor = BitCursor::new(&data);
        cursor.consume(8);
        assert_eq!(cursor.peek(32), 0);
        cursor.consume(32);
        cursor.consume(32);
        assert_eq!(cursor.read(24), 0);
        assert_eq!(cursor.position(), 96);
    }

    #[test]
    fn long_chunk_crosses_refills() {
        let data: Vec<u8> = (0..64).map(|i| i as u8).collect();
        let mut cursor = BitCursor::new(&data);
        for expected in 0..64u32 {
            assert_eq!(cursor.read(8), expected);
        }
    }
}
