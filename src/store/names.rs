//! Display names for language and platform codes

/// Maps a language code to a human-readable name
///
/// Implementations return `None` for codes they do not recognize; the store then
/// falls back to a title-cased rendering of the code.
pub trait LanguageNames: Send + Sync {
    /// Display name for `code`, e.g. "Deutsch" for "de"
    fn display_name(&self, code: &str) -> Option<String>;
}

/// Built-in autonym table covering the languages the upstream archive ships
#[derive(Clone, Copy, Debug, Default)]
pub struct AutonymTable;

const AUTONYMS: &[(&str, &str)] = &[
    ("ar", "العربية"),
    ("bg", "Български"),
    ("bn", "বাংলা"),
    ("bs", "Bosanski"),
    ("ca", "Català"),
    ("cs", "Čeština"),
    ("da", "Dansk"),
    ("de", "Deutsch"),
    ("el", "Ελληνικά"),
    ("en", "English"),
    ("es", "Español"),
    ("fa", "فارسی"),
    ("fi", "Suomi"),
    ("fr", "Français"),
    ("gl", "Galego"),
    ("he", "עברית"),
    ("hi", "हिन्दी"),
    ("hu", "Magyar"),
    ("id", "Indonesia"),
    ("it", "Italiano"),
    ("ja", "日本語"),
    ("ko", "한국어"),
    ("lo", "ລາວ"),
    ("ml", "മലയാളം"),
    ("ne", "नेपाली"),
    ("nl", "Nederlands"),
    ("no", "Norsk"),
    ("pl", "Polski"),
    ("pt", "Português"),
    ("pt_BR", "Português (Brasil)"),
    ("pt_PT", "Português (Portugal)"),
    ("ro", "Română"),
    ("ru", "Русский"),
    ("sh", "Srpskohrvatski"),
    ("sk", "Slovenčina"),
    ("sl", "Slovenščina"),
    ("sr", "Српски"),
    ("sv", "Svenska"),
    ("sw", "Kiswahili"),
    ("ta", "தமிழ்"),
    ("te", "తెలుగు"),
    ("th", "ไทย"),
    ("tl", "Tagalog"),
    ("tr", "Türkçe"),
    ("uk", "Українська"),
    ("uz", "Oʻzbek"),
    ("vi", "Tiếng Việt"),
    ("zh", "中文"),
    ("zh_TW", "中文 (台灣)"),
];

impl LanguageNames for AutonymTable {
    fn display_name(&self, code: &str) -> Option<String> {
        let lookup = |c: &str| {
            AUTONYMS
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(c))
                .map(|(_, name)| (*name).to_string())
        };

        lookup(code).or_else(|| {
            // "es_MX" / "es-MX" fall back to the base language
            code.split(['_', '-'])
                .next()
                .filter(|base| base.len() < code.len())
                .and_then(lookup)
        })
    }
}

const PLATFORM_NAMES: &[(&str, &str)] = &[
    ("osx", "macOS"),
    ("sunos", "SunOS"),
    ("cisco-ios", "Cisco iOS"),
    ("dos", "DOS"),
    ("freebsd", "FreeBSD"),
    ("netbsd", "NetBSD"),
    ("openbsd", "OpenBSD"),
    ("android", "Android"),
    ("windows", "Windows"),
    ("linux", "Linux"),
    ("common", "Common"),
];

/// Pretty name for a platform directory, title-casing unlisted codes
pub fn platform_display_name(code: &str) -> String {
    PLATFORM_NAMES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| title_case(&code.replace('-', " ")))
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest
///
/// `"pt_BR"` becomes `"Pt_Br"`, `"cisco ios"` becomes `"Cisco Ios"`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
