//! Weight data handling
//!
//! The loader owns the decoded weights; parsers only see a [`WeightView`] over them
//! and may claim a prefix. The view never moves backwards and never runs past the end.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{NambError, Result};

/// Non-owning, forward-only view over the weights not yet claimed
#[derive(Debug)]
pub struct WeightView<'a> {
    data: &'a [f32],
    offset: usize,
}

impl<'a> WeightView<'a> {
    /// Create a view over all of `data`
    pub fn new(data: &'a [f32]) -> Self {
        Self { data, offset: 0 }
    }

    /// Number of weights still available
    pub fn len(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many weights have been claimed since the view was created
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The unclaimed weights
    pub fn as_slice(&self) -> &'a [f32] {
        &self.data[self.offset..]
    }

    /// Claim the next `n` weights
    pub fn take(&mut self, n: usize) -> Result<&'a [f32]> {
        let available = self.len();
        if n > available {
            return Err(NambError::InsufficientWeights {
                requested: n,
                available,
            });
        }
        let claimed = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(claimed)
    }

    /// Claim the next `n` weights as an owned vector
    pub fn take_vec(&mut self, n: usize) -> Result<Vec<f32>> {
        self.take(n).map(<[f32]>::to_vec)
    }

    /// Claim a single weight
    pub fn take_one(&mut self) -> Result<f32> {
        Ok(self.take(1)?[0])
    }

    /// Drop the next `n` weights without looking at them
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }
}

/// Decode a run of little-endian `f32` values
pub fn decode_f32_le(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(NambError::InvalidFormat(
            "F32 weight data length not divisible by 4".to_string(),
        ));
    }

    let mut result = vec![0.0f32; bytes.len() / 4];
    LittleEndian::read_f32_into(bytes, &mut result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn take_advances_start_and_shrinks_len() {
        let data: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let mut view = WeightView::new(&data);

        assert_eq!(view.take(4).unwrap(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(view.len(), 6);
        assert_eq!(view.offset(), 4);
        assert_eq!(view.as_slice()[0], 4.0);
        assert_eq!(view.take_one().unwrap(), 4.0);

        view.skip(2).unwrap();
        assert_eq!(view.offset(), 7);
        assert_eq!(view.as_slice(), &[7.0, 8.0, 9.0]);
        assert!(view.skip(4).is_err());
        assert_eq!(view.len(), 3);
    }

    #[test]
    fn over_take_fails_without_moving() {
        let data = [1.0f32, 2.0];
        let mut view = WeightView::new(&data);

        let err = view.take(3).unwrap_err();
        assert!(matches!(
            err,
            NambError::InsufficientWeights {
                requested: 3,
                available: 2
            }
        ));
        assert_eq!(view.offset(), 0);
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn empty_view() {
        let mut view = WeightView::new(&[]);
        assert!(view.is_empty());
        assert_eq!(view.take(0).unwrap(), &[] as &[f32]);
        assert!(view.take_one().is_err());
    }

    #[test]
    fn decodes_weight_block() {
        let mut bytes = Vec::new();
        for v in [0.25f32, -1.0, 3.5] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(decode_f32_le(&bytes).unwrap(), vec![0.25, -1.0, 3.5]);
        assert!(decode_f32_le(&bytes[..5]).is_err());
    }

    proptest! {
        #[test]
        fn view_stays_a_suffix(len in 0usize..64, requests in proptest::collection::vec(0usize..20, 0..16)) {
            let data: Vec<f32> = (0..len).map(|i| i as f32).collect();
            let mut view = WeightView::new(&data);

            for n in requests {
                let before = view.len();
                match view.take(n) {
                    Ok(claimed) => {
                        prop_assert_eq!(claimed.len(), n);
                        prop_assert_eq!(view.len(), before - n);
                    }
                    Err(_) => {
                        prop_assert!(n > before);
                        prop_assert_eq!(view.len(), before);
                    }
                }
                prop_assert_eq!(view.offset() + view.len(), data.len());
                prop_assert_eq!(view.as_slice(), &data[view.offset()..]);
            }
        }
    }
}
