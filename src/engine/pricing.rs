use crate::models::product::Product;

/// Share of a trip's cost kept as platform revenue, in percent.
pub const REVENUE_PERCENT: u64 = 16;

#[derive(Debug, Clone)]
pub struct Pricer {
    hourly_wage: u64,
    base_product_name: String,
}

impl Pricer {
    pub fn new(hourly_wage: u64, base_product_name: impl Into<String>) -> Self {
        Self {
            hourly_wage,
            base_product_name: base_product_name.into(),
        }
    }

    /// Every class except the no-frills base class earns the fuel surcharge.
    pub fn earns_with_fuel(&self, product: &Product) -> bool {
        !product.name.eq_ignore_ascii_case(&self.base_product_name)
    }

    /// Integer fare for a trip. `work` is a coarse scalar, not a physical unit,
    /// and every division truncates.
    ///
    /// The rating bonus currently mirrors the base cost term.
    pub fn calculate_trip_cost(
        &self,
        weight_class: u64,
        distance_meters: u64,
        earn_with_fuel: bool,
    ) -> u64 {
        let work = weight_class.saturating_mul(distance_meters) / 1_000_000;
        let base_cost = work.saturating_mul(self.hourly_wage);
        let rating_bonus = work.saturating_mul(self.hourly_wage);

        let cost = base_cost.saturating_add(rating_bonus);
        if earn_with_fuel {
            cost.saturating_add((self.hourly_wage / 60).saturating_mul(cost))
        } else {
            cost
        }
    }

    pub fn price_for(&self, product: &Product, distance_meters: u64) -> u64 {
        self.calculate_trip_cost(
            product.weight_class,
            distance_meters,
            self.earns_with_fuel(product),
        )
    }

    /// Platform cut of `trip_cost`, computed as a scaled integer so small fares
    /// do not collapse to zero.
    pub fn calculate_trip_revenue(&self, trip_cost: u64) -> u64 {
        trip_cost.saturating_mul(REVENUE_PERCENT) / 100
    }
}
