//! Language selection and script detection.
//!
//! Nine supported recognition languages (English plus eight Indian
//! languages), addressed by BCP-47 tags. Script detection looks at Unicode
//! blocks only; Marathi shares Devanagari with Hindi and resolves to Hindi.

/// One selectable language: tag sent to the recognition service, English
/// name, and native-script name for the menu.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Language {
    pub tag: &'static str,
    pub name: &'static str,
    pub native: &'static str,
}

pub const LANGUAGES: &[Language] = &[
    Language {
        tag: "en-US",
        name: "English",
        native: "English",
    },
    Language {
        tag: "hi-IN",
        name: "Hindi",
        native: "हिन्दी",
    },
    Language {
        tag: "te-IN",
        name: "Telugu",
        native: "తెలుగు",
    },
    Language {
        tag: "ta-IN",
        name: "Tamil",
        native: "தமிழ்",
    },
    Language {
        tag: "bn-IN",
        name: "Bengali",
        native: "বাংলা",
    },
    Language {
        tag: "mr-IN",
        name: "Marathi",
        native: "मराठी",
    },
    Language {
        tag: "gu-IN",
        name: "Gujarati",
        native: "ગુજરાતી",
    },
    Language {
        tag: "kn-IN",
        name: "Kannada",
        native: "ಕನ್ನಡ",
    },
    Language {
        tag: "ml-IN",
        name: "Malayalam",
        native: "മലയാളം",
    },
];

/// Look up a language by menu number (1-based) as shown by the CLI.
pub fn by_menu_index(index: usize) -> Option<&'static Language> {
    (1..=LANGUAGES.len())
        .contains(&index)
        .then(|| &LANGUAGES[index - 1])
}

/// Look up a language by its tag, ignoring case.
pub fn by_tag(tag: &str) -> Option<&'static Language> {
    LANGUAGES
        .iter()
        .find(|lang| lang.tag.eq_ignore_ascii_case(tag))
}

/// Guess the language of transcribed text from its Unicode script.
///
/// Returns the matching tag from [`LANGUAGES`]; anything without a
/// recognized Indic block falls back to English.
pub fn detect_script(text: &str) -> &'static str {
    for ch in text.chars() {
        let code = ch as u32;
        let tag = match code {
            0x0900..=0x097F => Some("hi-IN"),
            0x0980..=0x09FF => Some("bn-IN"),
            0x0A80..=0x0AFF => Some("gu-IN"),
            0x0B80..=0x0BFF => Some("ta-IN"),
            0x0C00..=0x0C7F => Some("te-IN"),
            0x0C80..=0x0CFF => Some("kn-IN"),
            0x0D00..=0x0D7F => Some("ml-IN"),
            _ => None,
        };
        if let Some(tag) = tag {
            return tag;
        }
    }
    "en-US"
}

/// Prompt asking the user to speak the selected language, in that language.
fn wrong_language_prompt(tag: &str) -> String {
    match tag {
        "hi-IN" => "कृपया हिंदी में बोलें".to_string(),
        "te-IN" => "దయచేసి తెలుగులో మాట్లాడండి".to_string(),
        "ta-IN" => "தயவுசெய்து தமிழில் பேசவும்".to_string(),
        "bn-IN" => "অনুগ্রহ করে বাংলায় কথা বলুন".to_string(),
        "mr-IN" => "कृपया मराठीत बोला".to_string(),
        "gu-IN" => "કૃપા કરીને ગુજરાતીમાં બોલો".to_string(),
        "kn-IN" => "ದಯವಿಟ್ಟು ಕನ್ನಡದಲ್ಲಿ ಮಾತನಾಡಿ".to_string(),
        "ml-IN" => "ദയവായി മലയാളത്തിൽ സംസാರിക്കുക".to_string(),
        _ => {
            let name = by_tag(tag).map(|lang| lang.name).unwrap_or("English");
            format!("Please speak in {name}")
        }
    }
}

/// Voice-to-voice response: echo the transcript when its script matches the
/// selected language, otherwise ask (in the selected language) to switch.
pub fn echo_response(text: &str, selected_tag: &str) -> String {
    let detected = detect_script(text);
    // Marathi and Hindi share Devanagari; treat either as a match for both.
    let matches = detected.eq_ignore_ascii_case(selected_tag)
        || (detected == "hi-IN" && selected_tag.eq_ignore_ascii_case("mr-IN"));
    if matches {
        text.to_string()
    } else {
        wrong_language_prompt(selected_tag)
    }
}
