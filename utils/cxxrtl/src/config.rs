//! Run configuration for `cxxrtl-sim`, read from YAML.

use std::collections::BTreeMap;

use anyhow::{Context, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use num_bigint::{BigUint, ParseBigIntError};
use num_traits::Num;
use serde::Deserialize;

use crate::library::DEFAULT_DESIGN_NAME;

pub const DEFAULT_CYCLES: u64 = 10;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub library: Option<Utf8PathBuf>,
    pub design: Option<String>,
    pub clock: Option<String>,
    pub cycles: Option<u64>,
    #[serde(default)]
    pub pokes: BTreeMap<String, Literal>,
    #[serde(default)]
    pub peeks: Vec<String>,
    pub trace: Option<TraceConfig>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct TraceConfig {
    pub path: Utf8PathBuf,
    #[serde(default = "default_memories")]
    pub memories: bool,
    pub timescale: Option<String>,
}

fn default_memories() -> bool {
    true
}

/// A value written to a signal: a plain YAML integer or a string literal
/// such as `"0x1f"` for values wider than 64 bits.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Literal {
    Int(u64),
    Text(String),
}

impl Literal {
    pub fn to_biguint(&self) -> Result<BigUint, ParseBigIntError> {
        match self {
            Literal::Int(value) => Ok(BigUint::from(*value)),
            Literal::Text(text) => parse_literal(text),
        }
    }
}

impl RunConfig {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn load(path: &Utf8Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_yaml(&text).with_context(|| format!("Failed to parse YAML config: {path}"))
    }
}

/// Settings given on the command line. Each one that is set replaces the
/// matching value from the config file; pokes and peeks are appended.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub library: Option<Utf8PathBuf>,
    pub design: Option<String>,
    pub clock: Option<String>,
    pub cycles: Option<u64>,
    pub pokes: Vec<(String, BigUint)>,
    pub peeks: Vec<String>,
    pub vcd: Option<Utf8PathBuf>,
    pub no_memories: bool,
    pub timescale: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub path: Utf8PathBuf,
    pub memories: bool,
    pub timescale: Option<(i32, String)>,
}

/// Settings after merging the config file with command-line flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub library: Utf8PathBuf,
    pub design: String,
    pub clock: Option<String>,
    pub cycles: u64,
    pub pokes: Vec<(String, BigUint)>,
    pub peeks: Vec<String>,
    pub trace: Option<Trace>,
}

impl RunConfig {
    pub fn merge(self, overrides: Overrides) -> anyhow::Result<Run> {
        let library = overrides
            .library
            .or(self.library)
            .ok_or_else(|| anyhow!("LIBRARY argument is required"))?;

        let mut pokes = self
            .pokes
            .iter()
            .map(|(name, literal)| {
                let value = literal
                    .to_biguint()
                    .with_context(|| format!("Invalid poke value for {name}"))?;
                Ok((name.clone(), value))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        pokes.extend(overrides.pokes);

        let mut peeks = self.peeks;
        peeks.extend(overrides.peeks);

        let timescale = overrides
            .timescale
            .or_else(|| self.trace.as_ref().and_then(|trace| trace.timescale.clone()))
            .map(|text| {
                parse_timescale(&text).ok_or_else(|| anyhow!("Invalid timescale: {text:?}"))
            })
            .transpose()?;

        let trace = match overrides.vcd {
            Some(path) => Some(Trace {
                path,
                memories: !overrides.no_memories,
                timescale,
            }),
            None => self.trace.map(|trace| Trace {
                path: trace.path,
                memories: trace.memories && !overrides.no_memories,
                timescale,
            }),
        };

        Ok(Run {
            library,
            design: overrides
                .design
                .or(self.design)
                .unwrap_or_else(|| DEFAULT_DESIGN_NAME.to_owned()),
            clock: overrides.clock.or(self.clock),
            cycles: overrides.cycles.or(self.cycles).unwrap_or(DEFAULT_CYCLES),
            pokes,
            peeks,
            trace,
        })
    }
}

/// Parse a decimal, `0x` hexadecimal or `0b` binary literal. Underscores are
/// ignored.
pub fn parse_literal(text: &str) -> Result<BigUint, ParseBigIntError> {
    let text = text.trim().replace('_', "");
    if let Some(hex) = text.strip_prefix("0x") {
        BigUint::from_str_radix(hex, 16)
    } else if let Some(bin) = text.strip_prefix("0b") {
        BigUint::from_str_radix(bin, 2)
    } else {
        text.parse()
    }
}

/// Split a VCD timescale such as `"10 ns"` or `"1ps"` into number and unit.
pub fn parse_timescale(text: &str) -> Option<(i32, String)> {
    let text = text.trim();
    let split = text.find(|c: char| !c.is_ascii_digit())?;
    let (number, unit) = text.split_at(split);
    let number = number.parse().ok()?;
    let unit = unit.trim();
    matches!(unit, "s" | "ms" | "us" | "ns" | "ps" | "fs").then(|| (number, unit.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = RunConfig::from_yaml(
            r#"
library: build/libtop.so
design: top
clock: clk
cycles: 100
pokes:
  rst: 0
  wide: "0x1_0000_0000_0000_0000"
peeks: [count]
trace:
  path: trace.vcd
  memories: false
  timescale: "1 ns"
"#,
        )
        .unwrap();

        assert_eq!(config.library.as_deref(), Some(Utf8Path::new("build/libtop.so")));
        assert_eq!(config.design.as_deref(), Some("top"));
        assert_eq!(config.cycles, Some(100));
        assert_eq!(config.pokes["rst"], Literal::Int(0));
        assert_eq!(
            config.pokes["wide"].to_biguint().unwrap(),
            BigUint::from(1u32) << 64
        );
        assert_eq!(config.peeks, ["count"]);
        let trace = config.trace.unwrap();
        assert!(!trace.memories);
        assert_eq!(trace.timescale.as_deref(), Some("1 ns"));
    }

    #[test]
    fn trace_includes_memories_by_default() {
        let config = RunConfig::from_yaml("trace: { path: out.vcd }").unwrap();
        assert!(config.trace.unwrap().memories);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(RunConfig::from_yaml("clock: clk\ncycels: 3").is_err());
    }

    const FULL: &str = r#"
library: build/libtop.so
design: top
clock: clk
cycles: 100
pokes: { rst: 1 }
peeks: [count]
trace:
  path: trace.vcd
  memories: true
  timescale: "1 ns"
"#;

    fn big(value: u32) -> BigUint {
        BigUint::from(value)
    }

    #[test]
    fn config_values_apply_without_flags() {
        let run = RunConfig::from_yaml(FULL)
            .unwrap()
            .merge(Overrides::default())
            .unwrap();

        assert_eq!(run.library, "build/libtop.so");
        assert_eq!(run.design, "top");
        assert_eq!(run.clock.as_deref(), Some("clk"));
        assert_eq!(run.cycles, 100);
        assert_eq!(run.pokes, [("rst".to_owned(), big(1))]);
        assert_eq!(run.peeks, ["count"]);
        assert_eq!(
            run.trace,
            Some(Trace {
                path: "trace.vcd".into(),
                memories: true,
                timescale: Some((1, "ns".to_owned())),
            })
        );
    }

    #[test]
    fn flags_override_config_values() {
        let run = RunConfig::from_yaml(FULL)
            .unwrap()
            .merge(Overrides {
                library: Some("other.so".into()),
                design: Some("blinky".to_owned()),
                clock: Some("sys_clk".to_owned()),
                cycles: Some(3),
                pokes: vec![("rst".to_owned(), big(0))],
                peeks: vec!["q".to_owned()],
                vcd: Some("flags.vcd".into()),
                no_memories: false,
                timescale: Some("10 ps".to_owned()),
            })
            .unwrap();

        assert_eq!(run.library, "other.so");
        assert_eq!(run.design, "blinky");
        assert_eq!(run.clock.as_deref(), Some("sys_clk"));
        assert_eq!(run.cycles, 3);
        // Flag pokes run after the file's, so the flag value wins.
        assert_eq!(
            run.pokes,
            [("rst".to_owned(), big(1)), ("rst".to_owned(), big(0))]
        );
        assert_eq!(run.peeks, ["count", "q"]);
        let trace = run.trace.unwrap();
        assert_eq!(trace.path, "flags.vcd");
        assert!(trace.memories);
        assert_eq!(trace.timescale, Some((10, "ps".to_owned())));
    }

    #[test]
    fn defaults_without_config() {
        let run = RunConfig::default()
            .merge(Overrides {
                library: Some("libtop.so".into()),
                ..Overrides::default()
            })
            .unwrap();

        assert_eq!(run.design, DEFAULT_DESIGN_NAME);
        assert_eq!(run.cycles, DEFAULT_CYCLES);
        assert_eq!(run.clock, None);
        assert_eq!(run.trace, None);
    }

    #[test]
    fn library_is_required() {
        assert!(RunConfig::default().merge(Overrides::default()).is_err());
    }

    #[test]
    fn no_memories_flag_clears_config_trace_memories() {
        let run = RunConfig::from_yaml(FULL)
            .unwrap()
            .merge(Overrides {
                no_memories: true,
                ..Overrides::default()
            })
            .unwrap();
        let trace = run.trace.unwrap();
        assert_eq!(trace.path, "trace.vcd");
        assert!(!trace.memories);

        let run = RunConfig::from_yaml(FULL)
            .unwrap()
            .merge(Overrides {
                vcd: Some("flags.vcd".into()),
                no_memories: true,
                ..Overrides::default()
            })
            .unwrap();
        assert!(!run.trace.unwrap().memories);

        // The flag cannot turn memories back on.
        let config = "library: a.so\ntrace: { path: t.vcd, memories: false }";
        let run = RunConfig::from_yaml(config)
            .unwrap()
            .merge(Overrides::default())
            .unwrap();
        assert!(!run.trace.unwrap().memories);
    }

    #[test]
    fn config_timescale_applies_to_flag_trace() {
        let run = RunConfig::from_yaml(FULL)
            .unwrap()
            .merge(Overrides {
                vcd: Some("flags.vcd".into()),
                ..Overrides::default()
            })
            .unwrap();
        assert_eq!(run.trace.unwrap().timescale, Some((1, "ns".to_owned())));
    }

    #[test]
    fn invalid_timescale_is_rejected() {
        let error = RunConfig::from_yaml(FULL)
            .unwrap()
            .merge(Overrides {
                timescale: Some("1 parsec".to_owned()),
                ..Overrides::default()
            })
            .unwrap_err();
        assert!(error.to_string().contains("Invalid timescale"));

        let config = "library: a.so\ntrace: { path: t.vcd, timescale: fortnight }";
        assert!(
            RunConfig::from_yaml(config)
                .unwrap()
                .merge(Overrides::default())
                .is_err()
        );
    }

    #[test]
    fn invalid_config_poke_is_rejected() {
        let config = "library: a.so\npokes: { rst: \"0xzz\" }";
        let error = RunConfig::from_yaml(config)
            .unwrap()
            .merge(Overrides::default())
            .unwrap_err();
        assert!(format!("{error:#}").contains("Invalid poke value for rst"));
    }

    #[test]
    fn literals() {
        assert_eq!(parse_literal("42").unwrap(), BigUint::from(42u32));
        assert_eq!(parse_literal("0xff").unwrap(), BigUint::from(255u32));
        assert_eq!(parse_literal("0b1010").unwrap(), BigUint::from(10u32));
        assert_eq!(parse_literal("1_000").unwrap(), BigUint::from(1000u32));
        assert!(parse_literal("0xzz").is_err());
        assert!(parse_literal("-1").is_err());
    }

    #[test]
    fn timescales() {
        assert_eq!(parse_timescale("1 ns"), Some((1, "ns".to_owned())));
        assert_eq!(parse_timescale("10ps"), Some((10, "ps".to_owned())));
        assert_eq!(parse_timescale("ns"), None);
        assert_eq!(parse_timescale("1 parsec"), None);
    }
}
