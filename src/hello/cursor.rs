use thiserror::Error;

/// Read past the end of the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("buffer underflow")]
pub struct Underflow;

/// Bounds-checked sequential reader over a byte view.
///
/// Length-prefixed descents (`nested_l16`) hand out a sub-cursor that is
/// limited to exactly the declared length, so a nested view can never read
/// a byte that belongs to its parent.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes remaining under the current limit.
    pub fn left(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Consume one byte.
    pub fn get_u8(&mut self) -> Result<u8, Underflow> {
        let b = *self.buf.get(self.pos).ok_or(Underflow)?;
        self.pos += 1;
        Ok(b)
    }

    /// Consume two big-endian bytes.
    pub fn get_u16(&mut self) -> Result<u16, Underflow> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Consume three big-endian bytes.
    pub fn get_u24(&mut self) -> Result<u32, Underflow> {
        let b = self.take(3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    /// Borrow the next `n` bytes and advance past them.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], Underflow> {
        if self.left() < n {
            return Err(Underflow);
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    /// Advance `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<(), Underflow> {
        self.take(n).map(|_| ())
    }

    /// Read a 1-byte length prefix, then skip that many bytes.
    pub fn skip_l8(&mut self) -> Result<(), Underflow> {
        let n = self.get_u8()? as usize;
        self.skip(n)
    }

    /// Read a 2-byte length prefix, then skip that many bytes.
    pub fn skip_l16(&mut self) -> Result<(), Underflow> {
        let n = self.get_u16()? as usize;
        self.skip(n)
    }

    /// Read a 2-byte length prefix and return a sub-cursor over exactly that
    /// many bytes, advancing this cursor past them.
    pub fn nested_l16(&mut self) -> Result<ByteCursor<'a>, Underflow> {
        let n = self.get_u16()? as usize;
        Ok(ByteCursor::new(self.take(n)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_big_endian() {
        let mut cur = ByteCursor::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        assert_eq!(cur.get_u8(), Ok(0x01));
        assert_eq!(cur.get_u16(), Ok(0x0203));
        assert_eq!(cur.get_u24(), Ok(0x040506));
        assert_eq!(cur.left(), 0);
    }

    #[test]
    fn test_underflow_on_empty() {
        let mut cur = ByteCursor::new(&[0x01]);
        assert_eq!(cur.get_u16(), Err(Underflow));
        // failed reads consume nothing
        assert_eq!(cur.left(), 1);
        assert_eq!(cur.get_u8(), Ok(0x01));
        assert_eq!(cur.get_u8(), Err(Underflow));
    }

    #[test]
    fn test_skip() {
        let mut cur = ByteCursor::new(&[0; 10]);
        assert!(cur.skip(4).is_ok());
        assert_eq!(cur.left(), 6);
        assert_eq!(cur.skip(7), Err(Underflow));
        assert!(cur.skip(6).is_ok());
    }

    #[test]
    fn test_skip_l8_l16() {
        // 3-byte L8 block, then 2-byte L16 block, then one trailing byte
        let mut cur = ByteCursor::new(&[0x03, 0xaa, 0xbb, 0xcc, 0x00, 0x02, 0xdd, 0xee, 0x7f]);
        assert!(cur.skip_l8().is_ok());
        assert!(cur.skip_l16().is_ok());
        assert_eq!(cur.get_u8(), Ok(0x7f));
    }

    #[test]
    fn test_skip_l8_underflow_in_body() {
        let mut cur = ByteCursor::new(&[0x05, 0xaa]);
        assert_eq!(cur.skip_l8(), Err(Underflow));
    }

    #[test]
    fn test_nested_l16_limits() {
        // nested view of 2 bytes followed by 2 outer bytes
        let mut outer = ByteCursor::new(&[0x00, 0x02, 0x11, 0x22, 0x33, 0x44]);
        let mut inner = outer.nested_l16().unwrap();
        assert_eq!(inner.left(), 2);
        assert_eq!(inner.get_u16(), Ok(0x1122));
        // the nested view never sees the outer bytes
        assert_eq!(inner.get_u8(), Err(Underflow));
        // the outer cursor resumes past the nested block
        assert_eq!(outer.get_u16(), Ok(0x3344));
    }

    #[test]
    fn test_nested_l16_declared_length_too_long() {
        let mut cur = ByteCursor::new(&[0x00, 0x09, 0x01]);
        assert!(cur.nested_l16().is_err());
    }

    #[test]
    fn test_take_borrows_content() {
        let mut cur = ByteCursor::new(b"hello!");
        assert_eq!(cur.take(5), Ok(&b"hello"[..]));
        assert_eq!(cur.left(), 1);
    }
}
