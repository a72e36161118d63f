use crate::domain::request::{Amount, Currency};
use crate::error::ChargeError;
use serde::Serialize;

/// Default minimum card charge in minor units. Card processors reject
/// charges below their published floor; 50 is the common one.
pub const CARD_MINIMUM_DEFAULT: i64 = 50;

/// How one order total splits across the two tenders.
///
/// Both sides are non-negative and always sum to the order total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Share {
    pub stored_value: i64,
    pub card: i64,
}

/// The split a commit would execute right now, as returned by
/// simulation. Plain value; committing takes the original request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    order_total: Amount,
    currency: Currency,
    share: Share,
}

impl Allocation {
    pub fn new(order_total: Amount, currency: Currency, share: Share) -> Self {
        Self {
            order_total,
            currency,
            share,
        }
    }

    pub fn order_total(&self) -> Amount {
        self.order_total
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn share(&self) -> Share {
        self.share
    }

    /// True when committing this allocation will charge the card.
    pub fn needs_card(&self) -> bool {
        self.share.card > 0
    }
}

/// Splits `order_amount` between the stored-value instrument and the
/// card.
///
/// Draws as much as the balance allows from stored value and sends the
/// remainder to the card, then keeps the card side either at zero or at
/// `card_minimum` and above by shifting the shortfall back onto stored
/// value. Fails with `InsufficientValue` when the shift would push the
/// stored-value side negative.
pub fn allocate(
    order_amount: Amount,
    stored_value_balance: i64,
    card_minimum: i64,
) -> Result<Share, ChargeError> {
    let order = order_amount.value();
    // A ledger cannot offer negative spendable value.
    let balance = stored_value_balance.max(0);

    let mut stored_value = order.min(balance);
    let mut card = order - stored_value;

    if 0 < card && card < card_minimum {
        stored_value -= card_minimum - card;
        card = order - stored_value;
    }

    if stored_value < 0 {
        return Err(ChargeError::InsufficientValue(format!(
            "balance of {balance} cannot leave the card leg at zero or at the {card_minimum} minimum for an order of {order}"
        )));
    }

    Ok(Share { stored_value, card })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn amount(value: i64) -> Amount {
        Amount::new(value).unwrap()
    }

    #[test]
    fn test_balance_covers_order() {
        let share = allocate(amount(100), 150, 50).unwrap();
        assert_eq!(share, Share { stored_value: 100, card: 0 });
    }

    #[test]
    fn test_no_balance_goes_all_card() {
        let share = allocate(amount(100), 0, 50).unwrap();
        assert_eq!(share, Share { stored_value: 0, card: 100 });
    }

    #[test]
    fn test_shortfall_shifts_to_stored_value() {
        // Naive card share would be 1, below the minimum of 50.
        let share = allocate(amount(101), 100, 50).unwrap();
        assert_eq!(share, Share { stored_value: 51, card: 50 });
    }

    #[test]
    fn test_card_share_at_minimum_is_untouched() {
        let share = allocate(amount(150), 100, 50).unwrap();
        assert_eq!(share, Share { stored_value: 100, card: 50 });
    }

    #[test]
    fn test_order_below_minimum_with_partial_balance_fails() {
        // 10 from stored value leaves 20 for the card; shifting the
        // 30 shortfall would need more balance than exists.
        assert!(matches!(
            allocate(amount(30), 10, 50),
            Err(ChargeError::InsufficientValue(_))
        ));
    }

    #[test]
    fn test_order_below_large_minimum_fails() {
        assert!(matches!(
            allocate(amount(101), 100, 150),
            Err(ChargeError::InsufficientValue(_))
        ));
    }

    #[test]
    fn test_negative_balance_treated_as_empty() {
        let share = allocate(amount(100), -500, 50).unwrap();
        assert_eq!(share, Share { stored_value: 0, card: 100 });
    }

    #[test]
    fn test_zero_minimum_never_shifts() {
        let share = allocate(amount(101), 100, 0).unwrap();
        assert_eq!(share, Share { stored_value: 100, card: 1 });
    }

    #[test]
    fn test_invariants_hold_over_random_inputs() {
        let mut rng = rand::thread_rng();
        for _ in 0..10_000 {
            let order = rng.gen_range(1..=500);
            let balance = rng.gen_range(0..=600);
            let minimum = rng.gen_range(0..=100);

            match allocate(amount(order), balance, minimum) {
                Ok(share) => {
                    assert_eq!(share.stored_value + share.card, order);
                    assert!(share.stored_value >= 0);
                    assert!(share.card >= 0);
                    assert!(share.stored_value <= balance);
                    assert!(share.card == 0 || share.card >= minimum);
                }
                Err(ChargeError::InsufficientValue(_)) => {
                    assert!(balance < order && order < minimum);
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_needs_card() {
        let currency = Currency::new("USD").unwrap();
        let split = Allocation::new(
            amount(100),
            currency.clone(),
            Share { stored_value: 60, card: 40 },
        );
        assert!(split.needs_card());

        let covered = Allocation::new(
            amount(100),
            currency,
            Share { stored_value: 100, card: 0 },
        );
        assert!(!covered.needs_card());
    }
}
