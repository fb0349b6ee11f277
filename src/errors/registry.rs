//! Error message registry.
//!
//! # Responsibilities
//! - Map `(language, code)` to a message template
//! - Fall back to the `default` language when a translation is missing
//! - Render templates with positional `{}` placeholders
//!
//! # Design Decisions
//! - Registration is all-or-nothing: a batch containing a duplicate code is rejected
//! - Built-in messages are installed lazily on first access

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::errors::code::DEFAULT_MESSAGES;

/// Language used when the caller does not ask for one.
pub const DEFAULT_LANG: &str = "default";

type Messages = HashMap<String, HashMap<i32, String>>;

/// Error returned when registering messages.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("error code duplicate. lang: {lang}, code: {code}")]
    Duplicate { lang: String, code: i32 },
}

fn registry() -> &'static RwLock<Messages> {
    static REGISTRY: OnceLock<RwLock<Messages>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let defaults = DEFAULT_MESSAGES
            .iter()
            .map(|(code, message)| (*code, message.to_string()))
            .collect();
        let mut messages = HashMap::new();
        messages.insert(DEFAULT_LANG.to_string(), defaults);
        RwLock::new(messages)
    })
}

/// Register message templates for a language.
pub fn register<I, S>(lang: &str, codes: I) -> Result<(), RegistryError>
where
    I: IntoIterator<Item = (i32, S)>,
    S: Into<String>,
{
    let batch: Vec<(i32, String)> = codes.into_iter().map(|(c, m)| (c, m.into())).collect();

    let mut messages = registry().write().unwrap_or_else(|e| e.into_inner());
    let lang_codes = messages.entry(lang.to_string()).or_default();

    let mut seen = std::collections::HashSet::new();
    for (code, _) in &batch {
        if lang_codes.contains_key(code) || !seen.insert(*code) {
            return Err(RegistryError::Duplicate {
                lang: lang.to_string(),
                code: *code,
            });
        }
    }

    lang_codes.extend(batch);
    Ok(())
}

/// Look up the template for `code`, falling back to the default language.
///
/// Returns an empty string when no language knows the code.
pub fn lookup(lang: &str, code: i32) -> String {
    let messages = registry().read().unwrap_or_else(|e| e.into_inner());
    messages
        .get(lang)
        .and_then(|codes| codes.get(&code))
        .or_else(|| messages.get(DEFAULT_LANG).and_then(|codes| codes.get(&code)))
        .cloned()
        .unwrap_or_default()
}

/// Fill `{}` placeholders in order. Placeholders without an argument stay literal.
pub fn render(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut rest = template;

    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => out.push_str(arg),
            None => out.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::code;

    #[test]
    fn test_default_messages_present() {
        assert_eq!(
            lookup(DEFAULT_LANG, code::JSON_DECODE),
            "request body decode error. err: {}"
        );
    }

    #[test]
    fn test_lookup_falls_back_to_default_lang() {
        assert_eq!(
            lookup("zh", code::FILE_NOT_FOUND),
            "file not found. file name: {}"
        );
        assert_eq!(lookup("zh", 999_999), "");
    }

    #[test]
    fn test_register_language() {
        register("test-lang-fr", [(90_001, "introuvable: {}")]).unwrap();
        assert_eq!(lookup("test-lang-fr", 90_001), "introuvable: {}");
        // Other codes still come from the default language.
        assert_eq!(lookup("test-lang-fr", code::RAW_ERR_WRAP), "raw error wrap: {}");
    }

    #[test]
    fn test_register_duplicate_rejected() {
        register("test-lang-dup", [(90_010, "first")]).unwrap();
        let err = register("test-lang-dup", [(90_011, "ok"), (90_010, "again")]).unwrap_err();
        assert_eq!(
            err,
            RegistryError::Duplicate {
                lang: "test-lang-dup".into(),
                code: 90_010
            }
        );
        // Nothing from the rejected batch was applied.
        assert_eq!(lookup("test-lang-dup", 90_011), "");
    }

    #[test]
    fn test_render() {
        let args = vec!["a".to_string(), "b".to_string()];
        assert_eq!(render("x: {}, y: {}", &args), "x: a, y: b");
        assert_eq!(render("x: {}, y: {}", &args[..1]), "x: a, y: {}");
        assert_eq!(render("no placeholders", &args), "no placeholders");
    }
}
