/// Languages the image ships translations for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    Japanese,
    French,
    German,
    Italian,
    Spanish,
    Korean,
    BrazilianPortuguese,
    Portuguese,
    Russian,
    Swedish,
    Polish,
    Dutch,
    Danish,
    Norwegian,
    Finnish,
    #[default]
    English,
}

impl Language {
    /// Locale tag passed to the init hook. These are the image's own tags,
    /// not necessarily valid POSIX locales.
    pub fn tag(self) -> &'static str {
        match self {
            Language::Japanese => "ja_JP",
            Language::French => "fr_FR",
            Language::German => "de_DE",
            Language::Italian => "it_IT",
            Language::Spanish => "es_ES",
            Language::Korean => "ko_KR",
            Language::BrazilianPortuguese => "pt_BR",
            Language::Portuguese => "pt_PT",
            Language::Russian => "ru_RU",
            Language::Swedish => "sw_SW",
            Language::Polish => "pl_PL",
            Language::Dutch => "nl_NL",
            Language::Danish => "da_DN",
            Language::Norwegian => "no_NW",
            Language::Finnish => "fi_FI",
            Language::English => "en_GB",
        }
    }

    /// Parses a POSIX locale such as `pt_BR.UTF-8`. Anything unmapped is
    /// English.
    pub fn from_posix(locale: &str) -> Self {
        let name = locale.split(['.', '@']).next().unwrap_or_default();
        let (language, region) = name.split_once('_').unwrap_or((name, ""));
        match language {
            "ja" => Language::Japanese,
            "fr" => Language::French,
            "de" => Language::German,
            "it" => Language::Italian,
            "es" => Language::Spanish,
            "ko" => Language::Korean,
            "pt" if region == "BR" => Language::BrazilianPortuguese,
            "pt" => Language::Portuguese,
            "ru" => Language::Russian,
            "sv" => Language::Swedish,
            "pl" => Language::Polish,
            "nl" => Language::Dutch,
            "da" => Language::Danish,
            "no" | "nb" | "nn" => Language::Norwegian,
            "fi" => Language::Finnish,
            _ => Language::English,
        }
    }

    /// Reads `LC_ALL`, then `LANG`.
    pub fn from_env() -> Self {
        ["LC_ALL", "LANG"]
            .into_iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|value| !value.is_empty())
            .map(|value| Self::from_posix(&value))
            .unwrap_or_default()
    }
}
