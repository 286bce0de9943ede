//! Type-string utilities shared by the harvester, the enricher and the
//! validator.

/// Normalize a host type string: keep leading `[]`/`*` wrappers verbatim,
/// shorten the package path to its last segment.
///
/// `[]*github.com/acme/app/models.User` becomes `[]*models.User`; map types
/// are normalized on both sides of the bracket.
pub fn normalize(type_str: &str) -> String {
    let (prefix, base) = split_prefix(type_str);
    if let Some((key, value)) = split_map(base) {
        return format!("{}map[{}]{}", prefix, normalize(key), normalize(value));
    }
    let short = match base.rfind('/') {
        Some(idx) => &base[idx + 1..],
        None => base,
    };
    format!("{}{}", prefix, short)
}

/// Split the `[]`/`*` wrapper prefix from the base type.
pub fn split_prefix(type_str: &str) -> (&str, &str) {
    let mut rest = type_str;
    loop {
        if let Some(stripped) = rest.strip_prefix("[]") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('*') {
            rest = stripped;
        } else {
            break;
        }
    }
    let split_at = type_str.len() - rest.len();
    (&type_str[..split_at], rest)
}

/// `true` when the written type carries a slice/array wrapper.
pub fn is_slice(type_str: &str) -> bool {
    split_prefix(type_str).0.contains("[]")
}

/// Split `map[K]V` into `(K, V)` with a bracket depth counter, so nested map
/// keys (`map[map[string]int]T`) split at the right bracket.
pub fn split_map(type_str: &str) -> Option<(&str, &str)> {
    let inner = type_str.strip_prefix("map[")?;
    let mut depth = 1usize;
    for (i, ch) in inner.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&inner[..i], &inner[i + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}
