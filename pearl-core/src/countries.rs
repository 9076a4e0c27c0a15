//! The fixed list of 100 countries used for comparative runs and the auto-runner.
//!
//! Order is stable: the auto-runner cursor indexes into [`TOP100`].

use serde::Serialize;

/// A country entry with Spanish and English names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Country {
    pub code: &'static str,
    pub name_es: &'static str,
    pub name_en: &'static str,
    pub region: &'static str,
}

const fn country(
    code: &'static str,
    name_es: &'static str,
    name_en: &'static str,
    region: &'static str,
) -> Country {
    Country {
        code,
        name_es,
        name_en,
        region,
    }
}

/// Regional mix, no duplicates, stable order.
pub static TOP100: [Country; 100] = [
    country("GB", "Reino Unido", "United Kingdom", "EU"),
    country("DE", "Alemania", "Germany", "EU"),
    country("FR", "Francia", "France", "EU"),
    country("ES", "España", "Spain", "EU"),
    country("IT", "Italia", "Italy", "EU"),
    country("NL", "Países Bajos", "Netherlands", "EU"),
    country("SE", "Suecia", "Sweden", "EU"),
    country("PL", "Polonia", "Poland", "EU"),
    country("BE", "Bélgica", "Belgium", "EU"),
    country("CH", "Suiza", "Switzerland", "EU"),
    country("AT", "Austria", "Austria", "EU"),
    country("NO", "Noruega", "Norway", "EU"),
    country("IE", "Irlanda", "Ireland", "EU"),
    country("DK", "Dinamarca", "Denmark", "EU"),
    country("FI", "Finlandia", "Finland", "EU"),
    country("PT", "Portugal", "Portugal", "EU"),
    country("GR", "Grecia", "Greece", "EU"),
    country("CZ", "República Checa", "Czech Republic", "EU"),
    country("RO", "Rumania", "Romania", "EU"),
    country("HU", "Hungría", "Hungary", "EU"),
    country("UA", "Ucrania", "Ukraine", "EU"),
    country("HR", "Croacia", "Croatia", "EU"),
    country("SK", "Eslovaquia", "Slovakia", "EU"),
    country("BG", "Bulgaria", "Bulgaria", "EU"),
    country("RS", "Serbia", "Serbia", "EU"),
    country("SI", "Eslovenia", "Slovenia", "EU"),
    country("LT", "Lituania", "Lithuania", "EU"),
    country("LV", "Letonia", "Latvia", "EU"),
    country("EE", "Estonia", "Estonia", "EU"),
    country("LU", "Luxemburgo", "Luxembourg", "EU"),
    country("IS", "Islandia", "Iceland", "EU"),
    country("MT", "Malta", "Malta", "EU"),
    country("CY", "Chipre", "Cyprus", "EU"),
    country("US", "Estados Unidos", "United States", "AM"),
    country("CA", "Canadá", "Canada", "AM"),
    country("BR", "Brasil", "Brazil", "AM"),
    country("MX", "México", "Mexico", "AM"),
    country("AR", "Argentina", "Argentina", "AM"),
    country("CO", "Colombia", "Colombia", "AM"),
    country("CL", "Chile", "Chile", "AM"),
    country("PE", "Perú", "Peru", "AM"),
    country("EC", "Ecuador", "Ecuador", "AM"),
    country("DO", "República Dominicana", "Dominican Republic", "AM"),
    country("GT", "Guatemala", "Guatemala", "AM"),
    country("CR", "Costa Rica", "Costa Rica", "AM"),
    country("PA", "Panamá", "Panama", "AM"),
    country("UY", "Uruguay", "Uruguay", "AM"),
    country("PY", "Paraguay", "Paraguay", "AM"),
    country("BO", "Bolivia", "Bolivia", "AM"),
    country("CN", "China", "China", "AS"),
    country("JP", "Japón", "Japan", "AS"),
    country("IN", "India", "India", "AS"),
    country("KR", "Corea del Sur", "South Korea", "AS"),
    country("AU", "Australia", "Australia", "OC"),
    country("ID", "Indonesia", "Indonesia", "AS"),
    country("SG", "Singapur", "Singapore", "AS"),
    country("MY", "Malasia", "Malaysia", "AS"),
    country("TH", "Tailandia", "Thailand", "AS"),
    country("VN", "Vietnam", "Vietnam", "AS"),
    country("PH", "Filipinas", "Philippines", "AS"),
    country("NZ", "Nueva Zelanda", "New Zealand", "OC"),
    country("HK", "Hong Kong", "Hong Kong", "AS"),
    country("TW", "Taiwán", "Taiwan", "AS"),
    country("PK", "Pakistán", "Pakistan", "AS"),
    country("BD", "Bangladesh", "Bangladesh", "AS"),
    country("LK", "Sri Lanka", "Sri Lanka", "AS"),
    country("KZ", "Kazajistán", "Kazakhstan", "AS"),
    country("TR", "Turquía", "Turkey", "ME"),
    country("SA", "Arabia Saudita", "Saudi Arabia", "ME"),
    country("AE", "Emiratos Árabes Unidos", "United Arab Emirates", "ME"),
    country("IL", "Israel", "Israel", "ME"),
    country("EG", "Egipto", "Egypt", "ME"),
    country("QA", "Catar", "Qatar", "ME"),
    country("KW", "Kuwait", "Kuwait", "ME"),
    country("OM", "Omán", "Oman", "ME"),
    country("BH", "Baréin", "Bahrain", "ME"),
    country("ZA", "Sudáfrica", "South Africa", "AF"),
    country("NG", "Nigeria", "Nigeria", "AF"),
    country("KE", "Kenia", "Kenya", "AF"),
    country("MA", "Marruecos", "Morocco", "AF"),
    country("DZ", "Argelia", "Algeria", "AF"),
    country("TN", "Túnez", "Tunisia", "AF"),
    country("GH", "Ghana", "Ghana", "AF"),
    country("ET", "Etiopía", "Ethiopia", "AF"),
    country("TZ", "Tanzania", "Tanzania", "AF"),
    country("GE", "Georgia", "Georgia", "EU"),
    country("AM", "Armenia", "Armenia", "EU"),
    country("AZ", "Azerbaiyán", "Azerbaijan", "AS"),
    country("BY", "Bielorrusia", "Belarus", "EU"),
    country("MD", "Moldavia", "Moldova", "EU"),
    country("BA", "Bosnia y Herzegovina", "Bosnia", "EU"),
    country("AL", "Albania", "Albania", "EU"),
    country("MK", "Macedonia del Norte", "North Macedonia", "EU"),
    country("NP", "Nepal", "Nepal", "AS"),
    country("JM", "Jamaica", "Jamaica", "AM"),
    country("TT", "Trinidad y Tobago", "Trinidad and Tobago", "AM"),
    country("BS", "Bahamas", "Bahamas", "AM"),
    country("MU", "Mauricio", "Mauritius", "AF"),
    country("JO", "Jordania", "Jordan", "ME"),
    country("LB", "Líbano", "Lebanon", "ME"),
];

/// All countries in runner order.
pub fn all() -> &'static [Country] {
    &TOP100
}

/// Look up a country by ISO code, ignoring case and surrounding whitespace.
pub fn find_by_code(code: &str) -> Option<&'static Country> {
    let code = code.trim();
    TOP100.iter().find(|c| c.code.eq_ignore_ascii_case(code))
}

/// Look up a country by its exact Spanish or English name, ignoring case.
pub fn find_by_name(name: &str) -> Option<&'static Country> {
    let lower = name.trim().to_lowercase();
    TOP100
        .iter()
        .find(|c| c.name_es.to_lowercase() == lower || c.name_en.to_lowercase() == lower)
}

/// Substring search over the Spanish name and code. At most 10 results;
/// an empty query yields nothing.
pub fn search(query: &str) -> Vec<&'static Country> {
    let lower = query.trim().to_lowercase();
    if lower.is_empty() {
        return Vec::new();
    }
    TOP100
        .iter()
        .filter(|c| {
            c.name_es.to_lowercase().contains(&lower) || c.code.to_lowercase().contains(&lower)
        })
        .take(10)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_exactly_100_unique_codes() {
        let codes: HashSet<_> = TOP100.iter().map(|c| c.code).collect();
        assert_eq!(TOP100.len(), 100);
        assert_eq!(codes.len(), 100);
    }

    #[test]
    fn test_find_by_code_case_insensitive() {
        let es = find_by_code("es").unwrap();
        assert_eq!(es.name_en, "Spain");
        assert_eq!(find_by_code(" GB ").unwrap().name_es, "Reino Unido");
        assert!(find_by_code("ZZ").is_none());
        assert!(find_by_code("").is_none());
    }

    #[test]
    fn test_find_by_name() {
        assert_eq!(find_by_name("alemania").unwrap().code, "DE");
        assert_eq!(find_by_name("Germany").unwrap().code, "DE");
        assert!(find_by_name("Atlantis").is_none());
    }

    #[test]
    fn test_search_empty_query() {
        assert!(search("").is_empty());
        assert!(search("   ").is_empty());
    }

    #[test]
    fn test_search_matches_spanish_name_and_code() {
        let hits = search("espa");
        assert!(hits.iter().any(|c| c.code == "ES"));
        let by_code = search("de");
        assert!(by_code.iter().any(|c| c.code == "DE"));
    }

    #[test]
    fn test_search_capped_at_ten() {
        // "a" appears in most Spanish names.
        assert_eq!(search("a").len(), 10);
    }

    #[test]
    fn test_order_is_stable() {
        assert_eq!(all()[0].code, "GB");
    }
}
