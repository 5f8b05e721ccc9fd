/// A fenced block found in an agent response.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FencedBlock<'a> {
    tag: &'a str,
    body: String,
}

/// Split `text` into its ``` fenced blocks. An unterminated block runs to the
/// end of the text.
fn fenced_blocks(text: &str) -> Vec<FencedBlock<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<(&str, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim_start();
        match (&mut current, trimmed.strip_prefix("```")) {
            (None, Some(tag)) => current = Some((tag.trim(), Vec::new())),
            (Some(_), Some(_)) => {
                if let Some((tag, lines)) = current.take() {
                    blocks.push(FencedBlock {
                        tag,
                        body: lines.join("\n"),
                    });
                }
            }
            (Some((_, lines)), None) => lines.push(line),
            (None, None) => {}
        }
    }
    if let Some((tag, lines)) = current {
        blocks.push(FencedBlock {
            tag,
            body: lines.join("\n"),
        });
    }
    blocks
}

/// Pull source code out of a free-text agent response.
///
/// Preference order: the first block tagged with one of `languages`
/// (case-insensitive), then the first fenced block of any kind, then the
/// whole response. Returns `None` when the chosen text is blank.
pub fn extract_code(response: &str, languages: &[&str]) -> Option<String> {
    let blocks = fenced_blocks(response);

    let tagged = blocks.iter().find(|b| {
        languages
            .iter()
            .any(|lang| b.tag.eq_ignore_ascii_case(lang))
    });

    let code = match tagged.or_else(|| blocks.first()) {
        Some(block) => block.body.trim().to_string(),
        None => response.trim().to_string(),
    };

    (!code.is_empty()).then_some(code)
}

/// Reviewer verdict parsed from a `PASS: yes|no` / `REASON: ...` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub reason: String,
}

impl Verdict {
    const MAX_REASON: usize = 300;

    pub fn parse(response: &str) -> Self {
        let lower = response.to_ascii_lowercase();
        let compact: String = lower.split_whitespace().collect::<Vec<_>>().join(" ");
        let passed = compact.contains("pass: yes");

        let reason = response
            .lines()
            .find_map(|l| {
                let t = l.trim();
                t.get(..7)
                    .filter(|p| p.eq_ignore_ascii_case("reason:"))
                    .map(|_| t[7..].trim().to_string())
            })
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| response.trim().chars().take(Self::MAX_REASON).collect());

        Self { passed, reason }
    }
}
