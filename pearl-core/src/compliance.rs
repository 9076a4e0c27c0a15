//! Marketing-copy compliance: neutralizes promise and legal/tax claims in
//! generated text and stamps the fixed disclaimer onto experiment packs.

use serde_json::Value;

/// Disclaimer forced into every experiment pack's `compliance_block`.
pub const COMPLIANCE_DISCLAIMER: &str = "AVISO LEGAL: Esta información es de carácter general y no constituye asesoría legal, financiera ni inmobiliaria personalizada. Resultados no garantizados. Sujeto a condiciones de mercado. Para decisiones específicas, consulta con profesionales licenciados en tu jurisdicción. Cumplimos con Fair Housing Act - No discriminamos.";

/// Prohibited phrase and its neutral replacement, applied in order.
pub const PROHIBITED_REPLACEMENTS: &[(&str, &str)] = &[
    ("garantizado", "diseñado para mejorar"),
    ("garantizada", "diseñada para mejorar"),
    ("garantizamos", "buscamos"),
    ("garantiza", "busca"),
    ("en 72h", "con estrategias optimizadas"),
    ("en 3 días", "con estrategias optimizadas"),
    ("seguro que", "puede que"),
    ("te aseguro", "exploramos opciones para"),
    ("te aseguramos", "exploramos opciones para"),
    ("al mejor precio", "a precio competitivo"),
    ("mejor precio", "precio competitivo"),
    ("venta rápida", "proceso optimizado"),
    ("rápidamente", "de manera eficiente"),
    ("evita asesorías legales", "(consulta con profesional)"),
    ("evita abogados", "(consulta con profesional)"),
    ("bajar impuestos", "estrategias fiscales (consulta profesional)"),
    ("ahorra impuestos", "estrategias fiscales (consulta profesional)"),
    ("asesoría", "información general"),
];

/// Replace every case-insensitive occurrence of `needle` in `haystack`.
///
/// Returns `None` when there is no match.
fn replace_ignore_case(haystack: &str, needle: &str, replacement: &str) -> Option<String> {
    let lower_hay = haystack.to_lowercase();
    let lower_needle = needle.to_lowercase();
    // Lowercasing can change byte lengths for some scripts; fall back to an
    // exact-case search when offsets would not line up.
    if lower_hay.len() != haystack.len() {
        return haystack
            .contains(needle)
            .then(|| haystack.replace(needle, replacement));
    }

    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    let mut found = false;
    for (start, _) in lower_hay.match_indices(&lower_needle) {
        out.push_str(&haystack[last..start]);
        out.push_str(replacement);
        last = start + lower_needle.len();
        found = true;
    }
    if !found {
        return None;
    }
    out.push_str(&haystack[last..]);
    Some(out)
}

/// Sanitize one string. Returns the cleaned text and a note per replaced phrase.
pub fn sanitize_text(text: &str) -> (String, Vec<String>) {
    let mut result = text.to_string();
    let mut mods = Vec::new();
    for (prohibited, replacement) in PROHIBITED_REPLACEMENTS {
        if let Some(replaced) = replace_ignore_case(&result, prohibited, replacement) {
            result = replaced;
            mods.push(format!("Replaced \"{prohibited}\" with \"{replacement}\""));
        }
    }
    (result, mods)
}

/// Sanitize every string in a JSON tree, then force the disclaimer.
///
/// Non-object packs are wrapped so the disclaimer always has a home.
pub fn enforce_compliance(pack: Value) -> (Value, Vec<String>) {
    let mut mods = Vec::new();
    let mut sanitized = sanitize_value(pack, &mut mods);
    if !sanitized.is_object() {
        sanitized = serde_json::json!({ "content": sanitized });
    }
    if let Some(obj) = sanitized.as_object_mut() {
        obj.insert(
            "compliance_block".to_string(),
            Value::String(COMPLIANCE_DISCLAIMER.to_string()),
        );
    }
    (sanitized, mods)
}

fn sanitize_value(value: Value, mods: &mut Vec<String>) -> Value {
    match value {
        Value::String(s) => {
            let (clean, changes) = sanitize_text(&s);
            mods.extend(changes);
            Value::String(clean)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| sanitize_value(item, mods))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, sanitize_value(v, mods)))
                .collect(),
        ),
        other => other,
    }
}
