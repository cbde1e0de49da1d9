use anyhow::{Result, bail};
use std::fmt;
use std::str::FromStr;

/// Seasons exported when none are requested explicitly.
pub const DEFAULT_SEASONS: [&str; 3] = ["23S", "24S", "25S"];

/// A spring/summer season and the posting-month window queried for it.
///
/// For season `yyS` in year `Y = 20yy`:
///
/// | Field                  | Value      |
/// |------------------------|------------|
/// | `period_start`         | `Y03`      |
/// | `period_end`           | `Y08`      |
/// | `current_season_start` | `(Y-1)01`  |
///
/// Months are `YYYYMM` strings, matching `PST_YYYYMM` in the warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Season {
    pub code: String,
    pub period_start: String,
    pub period_end: String,
    pub current_season_start: String,
    year: u16,
}

impl Season {
    pub fn parse(code: &str) -> Result<Self> {
        let code = code.trim().to_ascii_uppercase();
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes[..2].iter().all(u8::is_ascii_digit) || bytes[2] != b'S' {
            bail!("Invalid season '{}': expected two digits followed by 'S', e.g. 24S", code);
        }

        let year = 2000 + code[..2].parse::<u16>()?;
        Ok(Self {
            period_start: format!("{year}03"),
            period_end: format!("{year}08"),
            current_season_start: format!("{}01", year - 1),
            code,
            year,
        })
    }

    /// February of the season year. Apparel whose season window covers this
    /// month belongs to the previous season.
    pub fn previous_season_probe(&self) -> String {
        format!("{}02", self.year)
    }
}

impl FromStr for Season {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

pub fn default_seasons() -> Vec<Season> {
    DEFAULT_SEASONS
        .iter()
        .filter_map(|code| Season::parse(code).ok())
        .collect()
}

/// Drops repeated seasons, keeping the first occurrence of each code.
pub fn unique_seasons(seasons: &[Season]) -> Vec<Season> {
    let mut unique: Vec<Season> = Vec::with_capacity(seasons.len());
    for season in seasons {
        if !unique.iter().any(|s| s.code == season.code) {
            unique.push(season.clone());
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_season_windows() {
        let seasons = default_seasons();
        let windows: Vec<_> = seasons
            .iter()
            .map(|s| {
                (
                    s.code.as_str(),
                    s.period_start.as_str(),
                    s.period_end.as_str(),
                    s.current_season_start.as_str(),
                )
            })
            .collect();

        assert_eq!(
            windows,
            vec![
                ("23S", "202303", "202308", "202201"),
                ("24S", "202403", "202408", "202301"),
                ("25S", "202503", "202508", "202401"),
            ]
        );
    }

    #[test]
    fn test_previous_season_probe() {
        assert_eq!(Season::parse("24S").unwrap().previous_season_probe(), "202402");
    }

    #[test]
    fn test_parse_accepts_lowercase() {
        let season: Season = "26s".parse().unwrap();
        assert_eq!(season.code, "26S");
        assert_eq!(season.current_season_start, "202501");
        assert_eq!(season.to_string(), "26S");
    }

    #[test]
    fn test_parse_rejects_bad_codes() {
        for bad in ["24F", "2024S", "S24", "", "4S", "aaS"] {
            assert!(Season::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_unique_seasons_keeps_first_occurrence() {
        let seasons: Vec<Season> = ["25S", "24S", "24s", "25S"]
            .iter()
            .map(|c| c.parse().unwrap())
            .collect();

        let codes: Vec<_> = unique_seasons(&seasons)
            .into_iter()
            .map(|s| s.code)
            .collect();
        assert_eq!(codes, vec!["25S", "24S"]);
    }
}
