//! Enable/disable manifest (`modlist.txt`) parsing.

/// One qualifying manifest line: a `+`/`-` sign and the mod name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLine {
    /// Manifest key, trimmed.
    pub name: String,
    /// `true` for `+`, `false` for `-`.
    pub enabled: bool,
}

impl ManifestLine {
    /// Parse a single line, returning `None` when it does not qualify.
    pub fn parse(line: &str) -> Option<Self> {
        let enabled = match line.chars().next()? {
            '+' => true,
            '-' => false,
            _ => return None,
        };

        Some(Self {
            name: line[1..].trim().to_string(),
            enabled,
        })
    }
}

/// Parse the manifest text into its ordered lines.
///
/// Lines whose first character is neither `+` nor `-` are ignored. A name
/// appearing twice keeps its first position and flag.
pub fn parse_manifest(text: &str) -> Vec<ManifestLine> {
    let mut lines: Vec<ManifestLine> = Vec::new();

    for line in text.split('\n').filter_map(ManifestLine::parse) {
        if lines.iter().any(|l| l.name == line.name) {
            continue;
        }
        lines.push(line);
    }

    lines
}
