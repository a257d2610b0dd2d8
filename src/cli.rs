use crate::config::AppConfigOverrides;
use anyhow::{anyhow, bail, Context, Result};
use std::env;

const USAGE: &str = "Supported flags: --width, --height, --vsync, --sprites, --merge-duplicates.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    width: Option<u32>,
    height: Option<u32>,
    vsync: Option<bool>,
    sprites: Option<u32>,
    merge_duplicates: Option<bool>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // program name
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. {USAGE}");
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "width" => overrides.width = Some(parse_u32(flag, &value)?),
                "height" => overrides.height = Some(parse_u32(flag, &value)?),
                "sprites" => overrides.sprites = Some(parse_u32(flag, &value)?),
                "vsync" => overrides.vsync = Some(parse_bool_flag("vsync", &value)?),
                "merge-duplicates" => {
                    overrides.merge_duplicates = Some(parse_bool_flag("merge-duplicates", &value)?)
                }
                _ => bail!("Unknown flag '{flag}'. {USAGE}"),
            }
        }
        Ok(overrides)
    }

    pub fn into_config_overrides(self) -> AppConfigOverrides {
        AppConfigOverrides {
            width: self.width,
            height: self.height,
            vsync: self.vsync,
            sprite_count: self.sprites,
            merge_duplicates: self.merge_duplicates,
        }
    }
}

fn parse_u32(flag: &str, value: &str) -> Result<u32> {
    value.parse::<u32>().with_context(|| format!("Invalid value '{value}' for {flag}"))
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_window_and_sprite_flags() {
        let args = ["app", "--width", "1600", "--sprites", "50000", "--merge-duplicates", "on"];
        let overrides = CliOverrides::parse(args).expect("parse overrides").into_config_overrides();
        assert_eq!(overrides.width, Some(1600));
        assert_eq!(overrides.height, None);
        assert_eq!(overrides.sprite_count, Some(50_000));
        assert_eq!(overrides.merge_duplicates, Some(true));
    }

    #[test]
    fn latest_flag_wins() {
        let args = ["app", "--sprites", "10", "--sprites", "20", "--vsync", "on", "--vsync", "off"];
        let overrides = CliOverrides::parse(args).expect("parse overrides").into_config_overrides();
        assert_eq!(overrides.sprite_count, Some(20));
        assert_eq!(overrides.vsync, Some(false));
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOverrides::parse(["app", "--sprites"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags_and_bad_numbers() {
        let err = CliOverrides::parse(["app", "--foo", "bar"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
        let err = CliOverrides::parse(["app", "--sprites", "many"]).unwrap_err();
        assert!(err.to_string().contains("Invalid value"), "non-numeric counts should error");
    }
}
