//! Line-numbered text for tool output.

/// Gutter width: digits of the last line number, at least 4.
fn gutter(line_count: usize) -> usize {
    line_count.to_string().len().max(4)
}

/// Lines `start..end` (0-indexed, end exclusive) with 1-indexed numbers.
pub(super) fn numbered_lines(content: &str, start: usize, end: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let width = gutter(lines.len());

    lines
        .iter()
        .enumerate()
        .skip(start)
        .take(end.saturating_sub(start))
        .map(|(i, line)| format!("{:>width$}→ {}", i + 1, line, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Two lines either side of the byte range `pos..pos + len`, numbered.
pub(super) fn context_around(content: &str, pos: usize, len: usize) -> String {
    let first = content[..pos.min(content.len())].matches('\n').count();
    let last_byte = (pos + len).min(content.len());
    let last = content[..last_byte].matches('\n').count();

    let start = first.saturating_sub(2);
    let end = last + 3;
    numbered_lines(content, start, end)
}
