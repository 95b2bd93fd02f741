//! Country name mapping
//!
//! Server node lists label locations by name ("Japan", "香港", "USA").
//! These are mapped to ISO 3166 alpha-2 codes for flags and grouping.

/// Known names and aliases.
///
/// Order matters for the containment pass: names that contain another entry
/// ("South Korea", "印度尼西亚", "Ukraine") come before it, and two-letter
/// aliases come last.
const COUNTRY_NAMES: &[(&str, &str)] = &[
    ("United States", "US"),
    ("美国", "US"),
    ("United Kingdom", "GB"),
    ("英国", "GB"),
    ("United Arab Emirates", "AE"),
    ("阿联酋", "AE"),
    ("Hong Kong", "HK"),
    ("香港", "HK"),
    ("Taiwan", "TW"),
    ("台湾", "TW"),
    ("China", "CN"),
    ("中国", "CN"),
    ("Japan", "JP"),
    ("日本", "JP"),
    ("Singapore", "SG"),
    ("新加坡", "SG"),
    ("South Korea", "KR"),
    ("Korea", "KR"),
    ("韩国", "KR"),
    ("South Africa", "ZA"),
    ("南非", "ZA"),
    ("Germany", "DE"),
    ("德国", "DE"),
    ("France", "FR"),
    ("法国", "FR"),
    ("Canada", "CA"),
    ("加拿大", "CA"),
    ("Australia", "AU"),
    ("澳大利亚", "AU"),
    ("澳洲", "AU"),
    ("Russia", "RU"),
    ("俄罗斯", "RU"),
    ("Indonesia", "ID"),
    ("印度尼西亚", "ID"),
    ("印尼", "ID"),
    ("India", "IN"),
    ("印度", "IN"),
    ("Brazil", "BR"),
    ("巴西", "BR"),
    ("Netherlands", "NL"),
    ("荷兰", "NL"),
    ("Italy", "IT"),
    ("意大利", "IT"),
    ("Spain", "ES"),
    ("西班牙", "ES"),
    ("Turkey", "TR"),
    ("土耳其", "TR"),
    ("Vietnam", "VN"),
    ("越南", "VN"),
    ("Thailand", "TH"),
    ("泰国", "TH"),
    ("Malaysia", "MY"),
    ("马来西亚", "MY"),
    ("Philippines", "PH"),
    ("菲律宾", "PH"),
    ("Switzerland", "CH"),
    ("瑞士", "CH"),
    ("Sweden", "SE"),
    ("瑞典", "SE"),
    ("Norway", "NO"),
    ("挪威", "NO"),
    ("Denmark", "DK"),
    ("丹麦", "DK"),
    ("Finland", "FI"),
    ("芬兰", "FI"),
    ("Poland", "PL"),
    ("波兰", "PL"),
    ("Austria", "AT"),
    ("奥地利", "AT"),
    ("Belgium", "BE"),
    ("比利时", "BE"),
    ("Ireland", "IE"),
    ("爱尔兰", "IE"),
    ("Portugal", "PT"),
    ("葡萄牙", "PT"),
    ("Greece", "GR"),
    ("希腊", "GR"),
    ("Ukraine", "UA"),
    ("乌克兰", "UA"),
    ("Israel", "IL"),
    ("以色列", "IL"),
    ("Saudi Arabia", "SA"),
    ("沙特阿拉伯", "SA"),
    ("Argentina", "AR"),
    ("阿根廷", "AR"),
    ("Mexico", "MX"),
    ("墨西哥", "MX"),
    ("New Zealand", "NZ"),
    ("新西兰", "NZ"),
    ("USA", "US"),
    ("UAE", "AE"),
    ("UK", "GB"),
    ("HK", "HK"),
    ("TW", "TW"),
];

/// ISO code for a country name.
///
/// Tries an exact match on the trimmed name, then the first entry the name
/// contains, ignoring case. `None` for empty or unknown names.
pub fn iso_code_for_name(name: &str) -> Option<&'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some((_, code)) = COUNTRY_NAMES.iter().find(|(known, _)| *known == trimmed) {
        return Some(code);
    }

    let lowered = trimmed.to_lowercase();
    COUNTRY_NAMES
        .iter()
        .find(|(known, _)| lowered.contains(&known.to_lowercase()))
        .map(|(_, code)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_names() {
        assert_eq!(iso_code_for_name("Japan"), Some("JP"));
        assert_eq!(iso_code_for_name("  USA\n"), Some("US"));
        assert_eq!(iso_code_for_name("香港"), Some("HK"));
        assert_eq!(iso_code_for_name("UK"), Some("GB"));
    }

    #[test]
    fn test_contained_names() {
        assert_eq!(iso_code_for_name("Tokyo, Japan 02"), Some("JP"));
        assert_eq!(iso_code_for_name("singapore-premium"), Some("SG"));
        assert_eq!(iso_code_for_name("中国香港 01"), Some("HK"));
        assert_eq!(iso_code_for_name("South Korea Seoul"), Some("KR"));
    }

    #[test]
    fn test_overlapping_aliases() {
        assert_eq!(iso_code_for_name("Ukraine Kyiv"), Some("UA"));
        assert_eq!(iso_code_for_name("印度尼西亚 雅加达"), Some("ID"));
        assert_eq!(iso_code_for_name("India Mumbai"), Some("IN"));
        assert_eq!(iso_code_for_name("Indonesia"), Some("ID"));
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(iso_code_for_name(""), None);
        assert_eq!(iso_code_for_name("   "), None);
        assert_eq!(iso_code_for_name("Atlantis"), None);
    }
}
