use std::collections::HashSet;

use serde::Serialize;

use crate::models::{Cottage, Package};

/// Surcharge rate per guest above the included two.
pub const EXTRA_GUEST_RATE: f64 = 0.20;
pub const INCLUDED_GUESTS: i64 = 2;
pub const TAX_RATE: f64 = 0.18;
pub const SERVICE_FEE_RATE: f64 = 0.05;

/// One selected safari, resolved to its catalog price.
#[derive(Debug, Clone)]
pub struct SafariLine {
    pub safari_type_id: String,
    pub name: String,
    pub unit_price: f64,
    pub participants: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafariLineBreakdown {
    pub safari_type_id: String,
    pub name: String,
    pub unit_price: f64,
    pub participants: i64,
    pub waived: bool,
    pub line_total: i64,
}

/// Price breakdown with every intermediate reported. Each field is
/// rounded to the nearest whole currency unit independently, and only
/// here at the output edge; intermediate math stays unrounded. The
/// displayed components may therefore be off by a unit from the displayed
/// total, which is the shipped billing behavior and must not be
/// "corrected" here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub base_price: f64,
    pub nights: i64,
    pub guests: i64,
    pub base_total: i64,
    pub extra_guest_surcharge: i64,
    pub villa_total: i64,
    pub package_multiplier: Option<f64>,
    pub package_delta: i64,
    pub safari_total: i64,
    pub safaris: Vec<SafariLineBreakdown>,
    pub subtotal: i64,
    pub tax: i64,
    pub service_fee: i64,
    pub grand_total: i64,
}

fn to_unit(value: f64) -> i64 {
    value.round() as i64
}

/// The single pricing implementation. Quotes, booking creation and admin
/// previews all go through here so they can never diverge.
pub fn compute_price(
    cottage: &Cottage,
    nights: i64,
    guests: i64,
    package: Option<&Package>,
    safaris: &[SafariLine],
) -> PriceBreakdown {
    let nights_f = nights as f64;

    let base_total = cottage.base_price * nights_f;
    let extra_guests = (guests - INCLUDED_GUESTS).max(0);
    let surcharge = extra_guests as f64 * cottage.base_price * EXTRA_GUEST_RATE * nights_f;
    let villa_total = base_total + surcharge;

    // Multipliers below 1.0 yield a discount, which is allowed.
    let (priced_villa, package_delta) = match package {
        Some(pkg) => {
            let total = villa_total * pkg.price_multiplier;
            (total, total - villa_total)
        }
        None => (villa_total, 0.0),
    };

    // The package allowance consumes the lowest-priced safari lines
    // first. This favors the house, not the guest; it matches the billing
    // behavior in production and must not be reordered without product
    // sign-off.
    let allowance = package
        .filter(|pkg| pkg.includes_safari)
        .map(|pkg| pkg.max_safaris.max(0) as usize)
        .unwrap_or(0);

    let mut order: Vec<usize> = (0..safaris.len()).collect();
    order.sort_by(|a, b| {
        safaris[*a]
            .unit_price
            .partial_cmp(&safaris[*b].unit_price)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let waived: HashSet<usize> = order.into_iter().take(allowance).collect();

    let mut safari_total = 0.0;
    let lines: Vec<SafariLineBreakdown> = safaris
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let is_waived = waived.contains(&i);
            let line_total = if is_waived {
                0.0
            } else {
                line.unit_price * line.participants as f64
            };
            safari_total += line_total;
            SafariLineBreakdown {
                safari_type_id: line.safari_type_id.clone(),
                name: line.name.clone(),
                unit_price: line.unit_price,
                participants: line.participants,
                waived: is_waived,
                line_total: to_unit(line_total),
            }
        })
        .collect();

    let subtotal = priced_villa + safari_total;
    let tax = subtotal * TAX_RATE;
    let service_fee = subtotal * SERVICE_FEE_RATE;
    let grand_total = subtotal + tax + service_fee;

    PriceBreakdown {
        base_price: cottage.base_price,
        nights,
        guests,
        base_total: to_unit(base_total),
        extra_guest_surcharge: to_unit(surcharge),
        villa_total: to_unit(villa_total),
        package_multiplier: package.map(|pkg| pkg.price_multiplier),
        package_delta: to_unit(package_delta),
        safari_total: to_unit(safari_total),
        safaris: lines,
        subtotal: to_unit(subtotal),
        tax: to_unit(tax),
        service_fee: to_unit(service_fee),
        grand_total: to_unit(grand_total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cottage(base_price: f64) -> Cottage {
        Cottage {
            id: "c-1".to_string(),
            name: "Glass Cottage".to_string(),
            cottage_type: "glass-cottage".to_string(),
            description: None,
            base_price,
            max_guests: 6,
            amenities: vec![],
            is_active: true,
        }
    }

    fn package(multiplier: f64, includes_safari: bool, max_safaris: i64) -> Package {
        Package {
            id: "p-1".to_string(),
            name: "Safari Adventure".to_string(),
            description: None,
            price_multiplier: multiplier,
            includes_safari,
            max_safaris,
            is_active: true,
        }
    }

    fn safari(id: &str, unit_price: f64, participants: i64) -> SafariLine {
        SafariLine {
            safari_type_id: id.to_string(),
            name: id.to_string(),
            unit_price,
            participants,
        }
    }

    #[test]
    fn test_base_scenario_no_package() {
        // 15000 x 2 nights, 2 guests: no surcharge, 18% tax, 5% fee
        let breakdown = compute_price(&cottage(15000.0), 2, 2, None, &[]);
        assert_eq!(breakdown.base_total, 30000);
        assert_eq!(breakdown.extra_guest_surcharge, 0);
        assert_eq!(breakdown.villa_total, 30000);
        assert_eq!(breakdown.subtotal, 30000);
        assert_eq!(breakdown.tax, 5400);
        assert_eq!(breakdown.service_fee, 1500);
        assert_eq!(breakdown.grand_total, 36900);
    }

    #[test]
    fn test_extra_guest_surcharge() {
        // Third guest: 1 * 15000 * 0.2 * 2 nights = 6000
        let breakdown = compute_price(&cottage(15000.0), 2, 3, None, &[]);
        assert_eq!(breakdown.extra_guest_surcharge, 6000);
        assert_eq!(breakdown.villa_total, 36000);
    }

    #[test]
    fn test_two_guests_no_surcharge_boundary() {
        let breakdown = compute_price(&cottage(15000.0), 2, 2, None, &[]);
        assert_eq!(breakdown.extra_guest_surcharge, 0);
    }

    #[test]
    fn test_package_multiplier_and_delta() {
        let pkg = package(1.5, false, 0);
        let breakdown = compute_price(&cottage(10000.0), 1, 2, Some(&pkg), &[]);
        assert_eq!(breakdown.villa_total, 10000);
        assert_eq!(breakdown.package_delta, 5000);
        assert_eq!(breakdown.subtotal, 15000);
    }

    #[test]
    fn test_discount_multiplier_allowed() {
        let pkg = package(0.9, false, 0);
        let breakdown = compute_price(&cottage(10000.0), 1, 2, Some(&pkg), &[]);
        assert_eq!(breakdown.package_delta, -1000);
        assert_eq!(breakdown.subtotal, 9000);
    }

    #[test]
    fn test_safari_priced_without_package() {
        let safaris = [safari("night", 800.0, 2)];
        let breakdown = compute_price(&cottage(10000.0), 1, 2, None, &safaris);
        assert_eq!(breakdown.safari_total, 1600);
        assert!(!breakdown.safaris[0].waived);
    }

    #[test]
    fn test_package_waives_cheapest_safaris_first() {
        let pkg = package(1.0, true, 1);
        let safaris = [safari("full-day", 1200.0, 2), safari("morning", 500.0, 2)];
        let breakdown = compute_price(&cottage(10000.0), 1, 2, Some(&pkg), &safaris);

        // The cheaper morning safari is consumed by the allowance; the
        // expensive one stays billable.
        assert!(!breakdown.safaris[0].waived);
        assert_eq!(breakdown.safaris[0].line_total, 2400);
        assert!(breakdown.safaris[1].waived);
        assert_eq!(breakdown.safaris[1].line_total, 0);
        assert_eq!(breakdown.safari_total, 2400);
    }

    #[test]
    fn test_allowance_capped_at_max_safaris() {
        let pkg = package(1.0, true, 2);
        let safaris = [
            safari("a", 500.0, 1),
            safari("b", 800.0, 1),
            safari("c", 1200.0, 1),
        ];
        let breakdown = compute_price(&cottage(10000.0), 1, 2, Some(&pkg), &safaris);
        let waived = breakdown.safaris.iter().filter(|l| l.waived).count();
        assert_eq!(waived, 2);
        assert_eq!(breakdown.safari_total, 1200);
    }

    #[test]
    fn test_no_waiver_when_package_excludes_safaris() {
        let pkg = package(1.2, false, 3);
        let safaris = [safari("a", 500.0, 1)];
        let breakdown = compute_price(&cottage(10000.0), 1, 2, Some(&pkg), &safaris);
        assert!(!breakdown.safaris[0].waived);
        assert_eq!(breakdown.safari_total, 500);
    }

    #[test]
    fn test_deterministic() {
        let pkg = package(1.3, true, 1);
        let safaris = [safari("a", 500.0, 2), safari("b", 800.0, 3)];
        let first = compute_price(&cottage(12345.0), 3, 4, Some(&pkg), &safaris);
        let second = compute_price(&cottage(12345.0), 3, 4, Some(&pkg), &safaris);
        assert_eq!(first.grand_total, second.grand_total);
        assert_eq!(first.subtotal, second.subtotal);
        assert_eq!(first.tax, second.tax);
    }

    #[test]
    fn test_fields_rounded_independently() {
        // 0.18 and 0.05 of an odd subtotal round on their own; the
        // rounded parts need not sum to the rounded total.
        let breakdown = compute_price(&cottage(333.33), 1, 2, None, &[]);
        let recomputed: f64 = 333.33 + 333.33 * 0.18 + 333.33 * 0.05;
        assert_eq!(breakdown.grand_total, recomputed.round() as i64);
    }
}
