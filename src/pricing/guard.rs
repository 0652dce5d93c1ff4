use super::error::GuardViolation;
use crate::database::models::Product;

/// Checks a candidate price against the product's floors.
///
/// Order: a non-positive or non-finite price, then the minimum price, then
/// the cost price. The first failure is reported.
pub fn check_guards(product: &Product, price: f64) -> Result<(), GuardViolation> {
    if !price.is_finite() || price <= 0.0 {
        return Err(GuardViolation::InvalidPrice(price));
    }
    if price < product.min_price {
        return Err(GuardViolation::BelowMinPrice {
            price,
            min_price: product.min_price,
        });
    }
    if price < product.cost_price {
        return Err(GuardViolation::BelowCostPrice {
            price,
            cost_price: product.cost_price,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(min_price: f64, cost_price: f64) -> Product {
        Product {
            id: 1,
            name: "Test".to_string(),
            current_price: 1000.0,
            min_price,
            cost_price,
            auto_price_adjustment: true,
            auto_adjustment_margin: None,
            is_active: true,
        }
    }

    #[test]
    fn test_price_at_floor_passes() {
        assert!(check_guards(&product(800.0, 700.0), 800.0).is_ok());
    }

    #[test]
    fn test_below_min_price() {
        let err = check_guards(&product(800.0, 700.0), 650.0).unwrap_err();
        assert_eq!(
            err,
            GuardViolation::BelowMinPrice {
                price: 650.0,
                min_price: 800.0
            }
        );
        assert_eq!(err.guard(), "min_price");
    }

    #[test]
    fn test_below_cost_price() {
        // cost above min: only the cost guard catches it
        let err = check_guards(&product(500.0, 700.0), 690.0).unwrap_err();
        assert!(matches!(err, GuardViolation::BelowCostPrice { .. }));
        assert!(err.to_string().contains("cost price 700.00"));
    }

    #[test]
    fn test_invalid_prices() {
        let p = product(0.0, 0.0);
        assert!(matches!(check_guards(&p, 0.0), Err(GuardViolation::InvalidPrice(_))));
        assert!(matches!(check_guards(&p, -5.0), Err(GuardViolation::InvalidPrice(_))));
        assert!(matches!(
            check_guards(&p, f64::NAN),
            Err(GuardViolation::InvalidPrice(_))
        ));
    }
}
