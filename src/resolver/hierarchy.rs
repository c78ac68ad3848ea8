//! Turning raw candidate divisions into one province / city / district.
//!
//! Candidates may overlap at the same level (bounding boxes overapproximate
//! real borders) and may include bookkeeping records that are not real
//! administrative tiers. Resolution runs these rules, first match wins:
//!
//! 1. A districtless city whose bbox center is closer to the point than
//!    every district candidate's center wins outright.
//! 2. Otherwise the district whose bbox center is nearest wins.
//! 3. A district that is really a stale record for a districtless city is
//!    re-homed to that city.
//! 4. The city comes from the district's `city_code`; placeholder and
//!    province-administered records are dropped.
//! 5. The province comes from the `province_code` chain.
//! 6. Municipalities never report a city.
//! 7. With no district candidates, the nearest city is used the same way.

use std::cmp::Ordering;
use tracing::{debug, warn};

use super::rules;
use crate::models::{
    AdminName, Division, DivisionLevel, ResolutionResult, MEMO_NOT_FOUND,
};
use crate::store::DivisionStore;

const MAX_PARENT_HOPS: usize = 3;

/// Resolves candidate sets into a three-level result.
///
/// Stateless: the result depends only on the candidates, the point and the
/// store contents used for ancestor lookups.
pub struct HierarchyResolver<'a> {
    store: &'a dyn DivisionStore,
}

impl<'a> HierarchyResolver<'a> {
    pub fn new(store: &'a dyn DivisionStore) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, candidates: &[Division], lat: f64, lon: f64) -> ResolutionResult {
        if candidates.is_empty() {
            return ResolutionResult::failed(MEMO_NOT_FOUND);
        }

        let ancestors = Ancestors {
            candidates,
            store: self.store,
        };

        let districts = at_level(candidates, DivisionLevel::District);
        let cities = at_level(candidates, DivisionLevel::City);

        let nearest_district = nearest(&districts, lat, lon);
        let nearest_districtless = nearest(
            &cities
                .iter()
                .copied()
                .filter(|c| rules::is_districtless_city(&c.code))
                .collect::<Vec<_>>(),
            lat,
            lon,
        );

        let result = match (nearest_districtless, nearest_district) {
            (Some(city), district)
                if city.center_distance_sq(lat, lon)
                    < district.map_or(f64::INFINITY, |d| d.center_distance_sq(lat, lon)) =>
            {
                debug!("Districtless city {} wins at ({}, {})", city.code, lat, lon);
                self.resolve_city_point(city, &ancestors).await
            }
            (_, Some(district)) => self.resolve_district_point(district, &ancestors).await,
            (_, None) => {
                let real_cities: Vec<&Division> = cities
                    .iter()
                    .copied()
                    .filter(|c| !rules::is_placeholder_city(c))
                    .collect();

                if let Some(city) = nearest(&real_cities, lat, lon) {
                    self.resolve_city_point(city, &ancestors).await
                } else {
                    self.resolve_province_point(candidates, lat, lon, &ancestors)
                        .await
                }
            }
        };

        if result.is_empty() {
            return ResolutionResult::failed(MEMO_NOT_FOUND);
        }
        result
    }

    /// Steps 3-6 for a chosen district candidate
    async fn resolve_district_point(
        &self,
        district: &Division,
        ancestors: &Ancestors<'_>,
    ) -> ResolutionResult {
        if let Some(city) = self.districtless_owner(district, ancestors).await {
            debug!(
                "District {} is a stale record for districtless city {}",
                district.code, city.code
            );
            return self.resolve_city_point(&city, ancestors).await;
        }

        let city = match district.city_code.as_deref() {
            Some(code) if rules::is_province_administered_city_code(code) => None,
            Some(code) => ancestors
                .get(code, DivisionLevel::City)
                .await
                .filter(|c| !rules::is_placeholder_city(c)),
            None => None,
        };

        let province = ancestors.province_of(district).await;

        let mut result = ResolutionResult {
            province: province.as_ref().map(AdminName::from_division).unwrap_or_default(),
            city: city.as_ref().map(AdminName::from_division).unwrap_or_default(),
            district: AdminName::from_division(district),
            memo: String::new(),
        };
        apply_municipality_override(&mut result, province.as_ref(), district);
        result
    }

    /// A city-level answer: district is empty by construction
    async fn resolve_city_point(
        &self,
        city: &Division,
        ancestors: &Ancestors<'_>,
    ) -> ResolutionResult {
        let province = ancestors.province_of(city).await;

        let mut result = ResolutionResult {
            province: province.as_ref().map(AdminName::from_division).unwrap_or_default(),
            city: if rules::is_placeholder_city(city) {
                AdminName::default()
            } else {
                AdminName::from_division(city)
            },
            district: AdminName::default(),
            memo: String::new(),
        };
        apply_municipality_override(&mut result, province.as_ref(), city);
        result
    }

    /// Only province-level (or placeholder city) candidates matched
    async fn resolve_province_point(
        &self,
        candidates: &[Division],
        lat: f64,
        lon: f64,
        ancestors: &Ancestors<'_>,
    ) -> ResolutionResult {
        let provinces = at_level(candidates, DivisionLevel::Province);
        let province = match nearest(&provinces, lat, lon) {
            Some(p) => Some(p.clone()),
            None => match nearest(&candidates.iter().collect::<Vec<_>>(), lat, lon) {
                Some(any) => ancestors.province_of(any).await,
                None => None,
            },
        };

        ResolutionResult {
            province: province.as_ref().map(AdminName::from_division).unwrap_or_default(),
            ..Default::default()
        }
    }

    /// The districtless city a district record duplicates, if any.
    ///
    /// A district is redundant when its own code or its declared city is
    /// districtless, or when its name matches a districtless city candidate.
    async fn districtless_owner(
        &self,
        district: &Division,
        ancestors: &Ancestors<'_>,
    ) -> Option<Division> {
        let owner_code = if rules::is_districtless_city(&district.code) {
            Some(district.code.as_str())
        } else {
            district
                .city_code
                .as_deref()
                .filter(|c| rules::is_districtless_city(c))
        };

        if let Some(code) = owner_code {
            return match ancestors.get(code, DivisionLevel::City).await {
                Some(city) if city.level == DivisionLevel::City => Some(city),
                // Only the stale record itself is known; promote it
                _ => Some(Division {
                    level: DivisionLevel::City,
                    ..district.clone()
                }),
            };
        }

        ancestors
            .candidates
            .iter()
            .filter(|c| c.level == DivisionLevel::City && rules::is_districtless_city(&c.code))
            .find(|c| rules::names_share_prefix(&c.name, &district.name))
            .cloned()
    }
}

/// Step 6: direct-administered municipalities have no city tier.
fn apply_municipality_override(
    result: &mut ResolutionResult,
    province: Option<&Division>,
    anchor: &Division,
) {
    let province_code = province
        .map(|p| p.code.clone())
        .or_else(|| anchor.province_code.clone())
        .or_else(|| rules::province_code_of(&anchor.code));

    if province_code.map_or(false, |c| rules::is_municipality(&c)) {
        result.city = AdminName::default();
    }
}

fn at_level(candidates: &[Division], level: DivisionLevel) -> Vec<&Division> {
    candidates.iter().filter(|d| d.level == level).collect()
}

/// Candidate whose bbox center is nearest the point; ties go to the lowest code.
fn nearest<'d>(candidates: &[&'d Division], lat: f64, lon: f64) -> Option<&'d Division> {
    candidates.iter().copied().min_by(|a, b| {
        a.center_distance_sq(lat, lon)
            .partial_cmp(&b.center_distance_sq(lat, lon))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.code.cmp(&b.code))
    })
}

/// Ancestor lookups: the fetched candidates first, then the store.
struct Ancestors<'a> {
    candidates: &'a [Division],
    store: &'a dyn DivisionStore,
}

impl Ancestors<'_> {
    async fn get(&self, code: &str, level: DivisionLevel) -> Option<Division> {
        let in_batch = self
            .candidates
            .iter()
            .find(|d| d.code == code && d.level == level)
            .or_else(|| self.candidates.iter().find(|d| d.code == code));
        if let Some(found) = in_batch {
            return Some(found.clone());
        }

        match self.store.find_by_code(code).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Lookup of division {} failed: {}", code, e);
                None
            }
        }
    }

    /// Province for a division: `province_code`, then the parent chain,
    /// then the code prefix.
    async fn province_of(&self, division: &Division) -> Option<Division> {
        if division.level == DivisionLevel::Province {
            return Some(division.clone());
        }

        if let Some(code) = division.province_code.as_deref() {
            if let Some(p) = self.get(code, DivisionLevel::Province).await {
                return Some(p);
            }
        }

        let mut parent_code = division.parent_code.clone();
        for _ in 0..MAX_PARENT_HOPS {
            let Some(code) = parent_code.take() else {
                break;
            };
            let Some(parent) = self.get(&code, DivisionLevel::Province).await else {
                break;
            };
            if parent.level == DivisionLevel::Province {
                return Some(parent);
            }
            parent_code = parent.parent_code;
        }

        let derived = rules::province_code_of(&division.code)?;
        self.get(&derived, DivisionLevel::Province)
            .await
            .filter(|p| p.level == DivisionLevel::Province)
    }
}
