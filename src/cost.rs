// 💷 Cost calculator
//
// Prices a set of journeys against a fuelcell's rate plan:
//
//   usage cost  = distance * distance_rate + fuel_used * efficiency * energy_rate
//   base charge = billable days * base_rate
//   total       = base charge + sum of usage costs
//
// All arithmetic is f32. Journeys already billed are skipped and reported.

use crate::dates::Window;
use crate::entities::{Fuelcell, UsageRecord};
use serde::Serialize;

/// One journey's contribution to a bill
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageCharge {
    pub usage_id: String,
    pub component_id: String,
    pub cost: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub window: Window,
    pub billable_days: u32,
    pub base_rate: f32,
    pub base_charge: f32,
    pub usage_total: f32,
    pub total: f32,
    pub currency: String,

    /// Priced journeys, in the order they were summed
    pub charges: Vec<UsageCharge>,

    /// Journeys in scope that an earlier bill already covered
    pub skipped_billed: Vec<String>,
}

impl CostBreakdown {
    pub fn priced_ids(&self) -> impl Iterator<Item = &str> {
        self.charges.iter().map(|charge| charge.usage_id.as_str())
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {:.2} = base {:.2} ({} days x {}) + usage {:.2} ({} journeys, {} already billed)",
            self.currency,
            self.total,
            self.base_charge,
            self.billable_days,
            self.base_rate,
            self.usage_total,
            self.charges.len(),
            self.skipped_billed.len()
        )
    }
}

pub struct CostCalculator<'a> {
    fuelcell: &'a Fuelcell,
    window: Window,
}

impl<'a> CostCalculator<'a> {
    pub fn new(fuelcell: &'a Fuelcell, window: Window) -> Self {
        CostCalculator { fuelcell, window }
    }

    pub fn usage_cost(&self, record: &UsageRecord) -> f32 {
        record.distance as f32 * self.fuelcell.distance_rate
            + record.fuel_used as f32 * record.efficiency * self.fuelcell.energy_rate
    }

    pub fn base_charge(&self) -> f32 {
        self.window.billable_days() as f32 * self.fuelcell.base_rate
    }

    pub fn price(&self, records: &[UsageRecord]) -> CostBreakdown {
        let mut charges = Vec::new();
        let mut skipped_billed = Vec::new();
        let mut usage_total = 0.0_f32;

        for record in records {
            if record.billed {
                skipped_billed.push(record.id.clone());
                continue;
            }

            let cost = self.usage_cost(record);
            usage_total += cost;
            charges.push(UsageCharge {
                usage_id: record.id.clone(),
                component_id: record.component_id.clone(),
                cost,
            });
        }

        let base_charge = self.base_charge();

        CostBreakdown {
            window: self.window,
            billable_days: self.window.billable_days(),
            base_rate: self.fuelcell.base_rate,
            base_charge,
            usage_total,
            total: base_charge + usage_total,
            currency: self.fuelcell.currency.clone(),
            charges,
            skipped_billed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::STILL_ACTIVE;
    use crate::testing::{journey, window};

    const TOLERANCE: f32 = 1e-3;

    fn rate_plan(base_rate: f32, distance_rate: f32, energy_rate: f32) -> Fuelcell {
        Fuelcell {
            id: "FuelCellX".to_string(),
            supplier_id: "Supplier1".to_string(),
            base_rate,
            distance_rate,
            energy_rate,
            currency: "GBP".to_string(),
            received_at: 20200101,
            returned_at: STILL_ACTIVE,
            note: String::new(),
        }
    }

    #[test]
    fn test_thirty_day_window_totals_95() {
        let fuelcell = rate_plan(0.5, 0.1, 1.0);
        let calculator = CostCalculator::new(&fuelcell, window(20210601, 20210630));
        let records = vec![journey("J", "Car1", "C1", 0, 500, 100, 0.3, 20210615)];

        let breakdown = calculator.price(&records);

        assert_eq!(breakdown.billable_days, 30);
        assert!((breakdown.usage_total - 80.0).abs() < TOLERANCE);
        assert!((breakdown.base_charge - 15.0).abs() < TOLERANCE);
        assert!((breakdown.total - 95.0).abs() < TOLERANCE);
        assert_eq!(breakdown.currency, "GBP");

        println!("✅ {}", breakdown.summary());
    }

    #[test]
    fn test_billed_records_are_skipped() {
        let fuelcell = rate_plan(1.0, 0.2, 1.0);
        let calculator = CostCalculator::new(&fuelcell, window(20200101, 20200131));

        let mut already = journey("Journey1", "Car1", "Component1", 0, 500, 100, 0.3, 20200123);
        already.billed = true;
        let fresh = journey("Journey2", "Car1", "Component1", 500, 1000, 150, 0.5, 20200127);

        let breakdown = calculator.price(&[already, fresh]);

        assert_eq!(breakdown.priced_ids().collect::<Vec<_>>(), vec!["Journey2"]);
        assert_eq!(breakdown.skipped_billed, vec!["Journey1".to_string()]);
        assert!((breakdown.usage_total - 275.0).abs() < TOLERANCE);
        assert!((breakdown.total - 306.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_no_usage_still_charges_base() {
        let fuelcell = rate_plan(0.8, 0.2, 1.0);
        let breakdown = CostCalculator::new(&fuelcell, window(20210701, 20210710)).price(&[]);

        assert!(breakdown.charges.is_empty());
        assert_eq!(breakdown.usage_total, 0.0);
        assert!((breakdown.total - 8.0).abs() < TOLERANCE);
    }
}
