/// Parse a boolean flag from a string value, or return the given default value otherwise.
///
/// Accepts the usual spellings an operator might put in an environment file: `1`, `true`, `yes`, `y`, `t`, `on`
/// (and their negative counterparts), case-insensitively.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "t" | "on" => true,
        "0" | "false" | "no" | "n" | "f" | "off" => false,
        _ => default,
    }
}
