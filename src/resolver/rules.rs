//! Fixed exceptions in China's administrative hierarchy.
//!
//! The division data does not flag these cases explicitly, so they are
//! recognised by code and name conventions of the national code table.

use crate::models::Division;

/// Province code prefixes of the direct-administered municipalities:
/// Beijing, Tianjin, Shanghai, Chongqing.
pub const MUNICIPALITY_PREFIXES: &[&str] = &["11", "12", "31", "50"];

/// Prefecture-level cities without a district tier:
/// Dongguan, Zhongshan, Danzhou, Jiayuguan.
pub const DISTRICTLESS_CITY_CODES: &[&str] = &["441900", "442000", "460400", "620200"];

/// Names the code table uses for city-level bookkeeping records.
pub const PLACEHOLDER_CITY_NAMES: &[&str] = &[
    "市辖区",
    "县",
    "省直辖县级行政区划",
    "自治区直辖县级行政区划",
];

fn is_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

/// Province-level code (`xx0000`) for any division code
pub fn province_code_of(code: &str) -> Option<String> {
    if !is_code(code) {
        return None;
    }
    Some(format!("{}0000", &code[..2]))
}

/// Whether a province code belongs to a direct-administered municipality.
pub fn is_municipality(province_code: &str) -> bool {
    is_code(province_code) && MUNICIPALITY_PREFIXES.contains(&&province_code[..2])
}

pub fn is_districtless_city(code: &str) -> bool {
    DISTRICTLESS_CITY_CODES.contains(&code)
}

/// City codes of the form `xx9000` stand for "county-level units governed
/// directly by the province" (e.g. 429000, 469000, 659000).
// TODO: replace with an explicit flag once the import pipeline carries one;
// this digit convention only holds for the current national code table.
pub fn is_province_administered_city_code(code: &str) -> bool {
    is_code(code) && &code[2..4] == "90" && &code[4..] == "00"
}

/// Whether a city-level record is a placeholder rather than a real city.
pub fn is_placeholder_city(division: &Division) -> bool {
    PLACEHOLDER_CITY_NAMES.contains(&division.name.as_str())
        || is_province_administered_city_code(&division.code)
}

/// Name without the trailing administrative suffix
fn name_stem(name: &str) -> &str {
    ["市", "区", "县"]
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .unwrap_or(name)
}

/// Whether two division names refer to the same place (one is a prefix of
/// the other once suffixes are dropped).
pub fn names_share_prefix(a: &str, b: &str) -> bool {
    let (a, b) = (name_stem(a), name_stem(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.starts_with(b) || b.starts_with(a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DivisionLevel;

    #[test]
    fn test_municipalities() {
        assert!(is_municipality("110000"));
        assert!(is_municipality("500000"));
        assert!(!is_municipality("440000"));
        assert!(!is_municipality("11"));
    }

    #[test]
    fn test_province_code_of() {
        assert_eq!(province_code_of("469001").as_deref(), Some("460000"));
        assert_eq!(province_code_of("abc"), None);
    }

    #[test]
    fn test_province_administered_pattern() {
        assert!(is_province_administered_city_code("429000"));
        assert!(is_province_administered_city_code("659000"));
        assert!(!is_province_administered_city_code("429004"));
        assert!(!is_province_administered_city_code("441900"));
        assert!(!is_province_administered_city_code("4290"));
    }

    #[test]
    fn test_placeholder_city() {
        let shixiaqu = Division::new("110100", "市辖区", DivisionLevel::City);
        let virtual_city = Division::new("469000", "海南直辖", DivisionLevel::City);
        let real = Division::new("440300", "深圳市", DivisionLevel::City);
        assert!(is_placeholder_city(&shixiaqu));
        assert!(is_placeholder_city(&virtual_city));
        assert!(!is_placeholder_city(&real));
    }

    #[test]
    fn test_names_share_prefix() {
        assert!(names_share_prefix("东莞市", "东莞"));
        assert!(names_share_prefix("中山市", "中山市区"));
        assert!(!names_share_prefix("东莞市", "深圳市"));
        assert!(!names_share_prefix("", "深圳市"));
    }
}
