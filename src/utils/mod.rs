use std::collections::HashSet;

pub fn parse_length_menu_csv(value: &str) -> Result<Vec<i64>, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err("length menu is empty".to_string());
    }
    let mut out: Vec<i64> = Vec::new();
    let mut seen: HashSet<i64> = HashSet::new();
    for part in raw.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let length: i64 = item
            .parse()
            .map_err(|_| format!("invalid page length '{item}'"))?;
        if length == 0 || length < -1 {
            return Err(format!("invalid page length '{item}', expected positive or -1"));
        }
        if seen.insert(length) {
            out.push(length);
        }
    }
    if out.is_empty() {
        return Err("length menu is empty".to_string());
    }
    Ok(out)
}

/// Label shown in the page-length selector; `-1` is the "show everything" entry.
pub fn length_menu_label(length: i64) -> String {
    if length == -1 {
        "All".to_string()
    } else {
        length.to_string()
    }
}

pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Lowercase, whitespace runs become `-`, everything else non-alphanumeric is dropped.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut in_space = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_alphanumeric() || c == '-' {
            out.push(c);
        }
    }
    out
}

pub fn humansize(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
