use anyhow::{Context, anyhow, bail};
use foundation::{Category, GeoBounds, ParamIntent, TimePreset, Timestamp};

use crate::cli::{parse_categories, parse_since};

/// One line typed while following the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Intent(ParamIntent),
    /// Goes through the session's debouncer like a map pan would.
    Viewport(GeoBounds),
    Help,
    Quit,
    Blank,
}

pub const HELP: &str = "\
commands:
  toggle <category>       add or remove one category
  only <a,b,...>          select exactly these categories
  all | none              select every known category / nothing
  since <24h|7d|30d|timestamp|none>
  preset <24h|7d|30d>     toggle a time preset
  bbox <minLon,minLat,maxLon,maxLat> | bbox none
  refetch | help | quit";

pub fn parse_line(line: &str, now: Timestamp) -> anyhow::Result<Line> {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let parsed = match verb {
        "" => Line::Blank,
        "toggle" => {
            if rest.is_empty() {
                bail!("toggle needs a category");
            }
            Line::Intent(ParamIntent::ToggleCategory(Category::from(rest)))
        }
        "only" => Line::Intent(ParamIntent::SetCategories(
            parse_categories(rest).into_iter().collect(),
        )),
        "all" => Line::Intent(ParamIntent::SelectAllCategories),
        "none" => Line::Intent(ParamIntent::ClearCategories),
        "since" => Line::Intent(ParamIntent::SetSince(parse_since(rest, now)?)),
        "preset" => {
            let preset: TimePreset = rest
                .parse()
                .map_err(|_| anyhow!("unknown preset {rest:?}, expected 24h, 7d or 30d"))?;
            Line::Intent(ParamIntent::TogglePreset { preset, now })
        }
        "bbox" if rest.eq_ignore_ascii_case("none") => {
            Line::Intent(ParamIntent::SetViewport(None))
        }
        "bbox" => {
            let bounds: GeoBounds = rest
                .replace(' ', "")
                .parse()
                .with_context(|| format!("invalid bbox {rest:?}"))?;
            Line::Viewport(bounds)
        }
        "refetch" => Line::Intent(ParamIntent::Refetch),
        "help" | "?" => Line::Help,
        "quit" | "exit" => Line::Quit,
        other => bail!("unknown command {other:?}, try `help`"),
    };
    Ok(parsed)
}
