//! Stake-weight arithmetic. Sums are checked; quorum products use u128.

use crate::domain::WarpError;

/// Reject fractions outside `(0, 1]`.
pub fn check_quorum(num: u64, den: u64) -> Result<(), WarpError> {
    if num == 0 || den == 0 || num > den {
        return Err(WarpError::InvalidQuorum { num, den });
    }
    Ok(())
}

/// Sum weights, failing on overflow.
pub fn sum_weights(weights: impl IntoIterator<Item = u64>) -> Result<u64, WarpError> {
    weights
        .into_iter()
        .try_fold(0u64, |acc, w| acc.checked_add(w))
        .ok_or(WarpError::WeightOverflow)
}

/// `floor(total * num / den)`.
pub fn required_weight(total: u64, num: u64, den: u64) -> Result<u64, WarpError> {
    check_quorum(num, den)?;
    let required = (total as u128) * (num as u128) / (den as u128);
    // num <= den keeps the quotient within u64.
    u64::try_from(required).map_err(|_| WarpError::WeightOverflow)
}

/// True if `signed` meets the `num / den` fraction of `total`.
pub fn verify_weight(signed: u64, total: u64, num: u64, den: u64) -> Result<bool, WarpError> {
    Ok(signed >= required_weight(total, num, den)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_weight_floor() {
        assert_eq!(required_weight(300, 67, 100).unwrap(), 201);
        assert_eq!(required_weight(10, 2, 3).unwrap(), 6);
        assert_eq!(required_weight(300, 100, 100).unwrap(), 300);
    }

    #[test]
    fn test_required_weight_no_overflow_near_max() {
        assert_eq!(required_weight(u64::MAX, 1, 1).unwrap(), u64::MAX);
        assert_eq!(required_weight(u64::MAX, 1, 2).unwrap(), u64::MAX / 2);
    }

    #[test]
    fn test_invalid_quorum() {
        assert_eq!(
            check_quorum(0, 100),
            Err(WarpError::InvalidQuorum { num: 0, den: 100 })
        );
        assert!(check_quorum(101, 100).is_err());
        assert!(check_quorum(1, 0).is_err());
    }

    #[test]
    fn test_sum_weights_overflow() {
        assert_eq!(sum_weights([u64::MAX, 1]), Err(WarpError::WeightOverflow));
        assert_eq!(sum_weights([100, 100, 100]).unwrap(), 300);
        assert_eq!(sum_weights(Vec::new()).unwrap(), 0);
    }

    #[test]
    fn test_verify_weight() {
        assert!(!verify_weight(200, 300, 67, 100).unwrap());
        assert!(verify_weight(201, 300, 67, 100).unwrap());
    }
}
