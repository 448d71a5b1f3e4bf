// src/services/normalize.rs
//
// Query normalization: commodity spelling expansion, display casing and
// cache-key construction. Everything here is pure and synchronous.

/// Hard cap on records a caller can request in one API call.
pub const MAX_LIMIT: usize = 20;
/// Larger cap used for bulk upstream calls (dataset pagination).
pub const MAX_UPSTREAM_LIMIT: usize = 50;

/// Defaults substituted for empty input. The engine always answers; a voice
/// caller cannot easily be shown a retry prompt.
pub const DEFAULT_STATE: &str = "All";
pub const DEFAULT_COMMODITY: &str = "Wheat";

/// Known spelling/script variants per canonical crop, uppercased. AGMARKNET
/// filters are exact-match, so each variant is worth a separate query.
const COMMODITY_VARIANTS: &[(&str, &[&str])] = &[
    ("WHEAT", &["WHEAT", "GEHUN", "GEHU", "KANAK"]),
    ("RICE", &["RICE", "PADDY", "PADDY(DHAN)(COMMON)", "CHAWAL", "DHAN"]),
    ("MAIZE", &["MAIZE", "MAKKA", "CORN", "MAKAI"]),
    ("COTTON", &["COTTON", "KAPAS", "NARMA"]),
    ("ONION", &["ONION", "PYAZ", "PYAAJ", "KANDA"]),
    ("POTATO", &["POTATO", "ALOO", "ALU", "BATATA"]),
    ("TOMATO", &["TOMATO", "TAMATAR"]),
    ("SOYBEAN", &["SOYBEAN", "SOYABEAN", "SOYABIN"]),
    ("MUSTARD", &["MUSTARD", "SARSON", "RAI", "MUSTARD SEED"]),
    ("GROUNDNUT", &["GROUNDNUT", "MOONGPHALI", "PEANUT"]),
    ("SUGARCANE", &["SUGARCANE", "GANNA"]),
    ("GRAM", &["GRAM", "BENGAL GRAM", "CHANA", "CHICKPEA"]),
    ("TURMERIC", &["TURMERIC", "HALDI"]),
    ("CHILLI", &["CHILLI", "MIRCH", "RED CHILLI", "DRY CHILLIES"]),
    ("BAJRA", &["BAJRA", "PEARL MILLET", "CUMBU"]),
    ("JOWAR", &["JOWAR", "SORGHUM", "CHOLAM"]),
    ("TUR", &["TUR", "ARHAR", "PIGEON PEA", "RED GRAM"]),
    ("MOONG", &["MOONG", "GREEN GRAM", "MUNG"]),
    ("BANANA", &["BANANA", "KELA"]),
    ("APPLE", &["APPLE", "SEB"]),
];

/// Expand a commodity into its canonical uppercase form plus all known
/// alternate spellings. Unknown crops return just the uppercased input.
pub fn expand_commodity(commodity: &str) -> Vec<String> {
    let upper = commodity.trim().to_uppercase();
    for (canonical, variants) in COMMODITY_VARIANTS {
        if *canonical == upper || variants.contains(&upper.as_str()) {
            let mut out: Vec<String> = vec![(*canonical).to_string()];
            for v in *variants {
                if *v != *canonical {
                    out.push((*v).to_string());
                }
            }
            return out;
        }
    }
    vec![upper]
}

/// Clamp a requested limit into `[1, max]`. Out-of-range limits must not
/// fragment the cache, so clamping happens before key construction.
pub fn clamp_limit(limit: usize, max: usize) -> usize {
    limit.clamp(1, max)
}

/// Build the cache key: trimmed, lowercased state and commodity joined with
/// the (already clamped) limit. Casing and whitespace differences collapse
/// onto one key.
pub fn cache_key(state: &str, commodity: &str, limit: usize) -> String {
    format!(
        "{}:{}:{}",
        state.trim().to_lowercase(),
        commodity.trim().to_lowercase(),
        limit
    )
}

/// Substitute defaults for blank input and trim the rest.
pub fn normalize_query(state: &str, commodity: &str) -> (String, String) {
    let state = state.trim();
    let commodity = commodity.trim();
    (
        if state.is_empty() { DEFAULT_STATE } else { state }.to_string(),
        if commodity.is_empty() { DEFAULT_COMMODITY } else { commodity }.to_string(),
    )
}

/// Title-case a name for display ("GEHUN" -> "Gehun", "uttar pradesh" ->
/// "Uttar Pradesh").
pub fn display_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
