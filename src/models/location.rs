//! Resolution results and the provider-facing location record.

use serde::{Deserialize, Serialize};

use super::Division;

/// Memo for a point that matched nothing.
pub const MEMO_NOT_FOUND: &str = "not found";

/// Memo for a coordinate outside the WGS84 range.
pub const MEMO_INVALID_COORDINATE: &str = "invalid coordinate";

/// Local and English display name for one administrative level.
///
/// An empty name means the level does not apply to the point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminName {
    pub name: String,
    pub name_en: String,
}

impl AdminName {
    pub fn from_division(division: &Division) -> Self {
        Self {
            name: division.name.clone(),
            name_en: division.name_en.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// Province / city / district for a point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub province: AdminName,
    pub city: AdminName,
    pub district: AdminName,
    /// Empty on success, a short diagnostic otherwise
    pub memo: String,
}

impl ResolutionResult {
    /// All-empty result carrying a diagnostic
    pub fn failed(memo: &str) -> Self {
        Self {
            memo: memo.to_string(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.province.is_empty() && self.city.is_empty() && self.district.is_empty()
    }
}

/// Flat location record shared by every geocoding provider.
///
/// Road fields are part of the shared contract; the local resolver never
/// fills them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub province: String,
    pub city: String,
    pub district: String,
    pub province_en: String,
    pub city_en: String,
    pub district_en: String,
    pub road_name: String,
    pub road_num: String,
    pub road_name_en: String,
    pub memo: String,
}

impl LocationInfo {
    /// Empty record with only a memo set
    pub fn with_memo(memo: &str) -> Self {
        Self {
            memo: memo.to_string(),
            ..Default::default()
        }
    }
}

impl From<ResolutionResult> for LocationInfo {
    fn from(result: ResolutionResult) -> Self {
        Self {
            province: result.province.name,
            city: result.city.name,
            district: result.district.name,
            province_en: result.province.name_en,
            city_en: result.city.name_en,
            district_en: result.district.name_en,
            road_name: String::new(),
            road_num: String::new(),
            road_name_en: String::new(),
            memo: result.memo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_info_has_all_keys() {
        let info = LocationInfo::from(ResolutionResult::failed(MEMO_NOT_FOUND));
        let value = serde_json::to_value(&info).unwrap();
        let obj = value.as_object().unwrap();

        for key in [
            "province",
            "city",
            "district",
            "province_en",
            "city_en",
            "district_en",
            "road_name",
            "road_num",
            "road_name_en",
            "memo",
        ] {
            assert!(obj.contains_key(key), "missing key {}", key);
        }
        assert_eq!(obj.len(), 10);
        assert_eq!(obj["memo"], "not found");
        assert_eq!(obj["province_en"], "");
    }

    #[test]
    fn test_conversion_keeps_english_names() {
        let result = ResolutionResult {
            province: AdminName {
                name: "广东省".into(),
                name_en: "Guangdong".into(),
            },
            city: AdminName {
                name: "东莞市".into(),
                name_en: "Dongguan".into(),
            },
            ..Default::default()
        };
        let info = LocationInfo::from(result);
        assert_eq!(info.city_en, "Dongguan");
        assert!(info.district.is_empty());
        assert!(info.road_name.is_empty());
        assert!(info.memo.is_empty());
    }
}
