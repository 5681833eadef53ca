/// Replace `${ENV_VAR}` placeholders in raw config text.
///
/// Unresolvable or malformed placeholders are left untouched.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match lookup(name).filter(|_| is_var_name(name)) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "CHATBRIDGE_TOKEN" => Some("123:ABC".to_string()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_with(r#"telegram_token = "${CHATBRIDGE_TOKEN}""#, lookup),
            r#"telegram_token = "123:ABC""#
        );
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(substitute_with("${NOPE_NOT_SET}", lookup), "${NOPE_NOT_SET}");
    }

    #[test]
    fn leaves_unterminated_placeholder() {
        assert_eq!(substitute_with("a ${CHATBRIDGE_TOKEN", lookup), "a ${CHATBRIDGE_TOKEN");
    }

    #[test]
    fn handles_multiple_placeholders() {
        assert_eq!(
            substitute_with("${CHATBRIDGE_TOKEN}/${X}/${CHATBRIDGE_TOKEN}", lookup),
            "123:ABC/${X}/123:ABC"
        );
    }
}
