// Opponent resolution for live lines.
//
// A structured opponent on the line always wins. Otherwise the free-form game
// description is parsed as a fallback. Only a handful of separators are
// understood; anything else resolves to no opponent.

use sweetspot_core::model::LiveLine;

/// Feed abbreviations that differ from the canonical three-letter codes.
const ALIASES: &[(&str, &str)] = &[
    ("GS", "GSW"),
    ("GOL", "GSW"),
    ("NY", "NYK"),
    ("SA", "SAS"),
    ("NO", "NOP"),
    ("NOR", "NOP"),
    ("PHO", "PHX"),
    ("UTAH", "UTA"),
    ("WSH", "WAS"),
    ("BRK", "BKN"),
    ("CHO", "CHA"),
];

/// Uppercase and map known aliases onto canonical codes.
pub fn canonical_team(raw: &str) -> String {
    let upper = raw.trim().to_ascii_uppercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == upper)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(upper)
}

/// Split a description into `(away, home)`.
///
/// `AWAY @ HOME` and `AWAY at HOME` list the visitor first; `HOME vs AWAY`,
/// `HOME vs. AWAY` and `HOME v AWAY` list the home side first.
pub fn parse_matchup(description: &str) -> Option<(String, String)> {
    let lower = description.to_ascii_lowercase();
    // Longer separators first so " vs. " is not read as " vs ".
    const SEPARATORS: &[(&str, bool)] = &[
        (" @ ", true),
        (" at ", true),
        (" vs. ", false),
        (" vs ", false),
        (" v ", false),
    ];
    for (sep, away_first) in SEPARATORS {
        let Some(idx) = lower.find(sep) else {
            continue;
        };
        let left = description[..idx].trim();
        let right = description[idx + sep.len()..].trim();
        if left.is_empty() || right.is_empty() {
            return None;
        }
        let (left, right) = (canonical_team(left), canonical_team(right));
        return Some(if *away_first { (left, right) } else { (right, left) });
    }
    // "@" without surrounding spaces, e.g. "BOS@NYK".
    let (left, right) = description.split_once('@')?;
    let (left, right) = (left.trim(), right.trim());
    if left.is_empty() || right.is_empty() {
        return None;
    }
    Some((canonical_team(left), canonical_team(right)))
}

/// The side of `description` that is not `team`.
pub fn opponent_from_description(description: &str, team: &str) -> Option<String> {
    let (away, home) = parse_matchup(description)?;
    let team = canonical_team(team);
    if away == team {
        Some(home)
    } else if home == team {
        Some(away)
    } else {
        None
    }
}

/// Resolve a line's opponent, preferring the structured field.
pub fn resolve_opponent(line: &LiveLine, team: Option<&str>) -> Option<String> {
    if let Some(opponent) = line.opponent.as_deref().filter(|o| !o.trim().is_empty()) {
        return Some(canonical_team(opponent));
    }
    let description = line.game_description.as_deref()?;
    opponent_from_description(description, team?)
}
