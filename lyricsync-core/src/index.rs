//! Position lookups over a sorted sequence of lyric lines.

use crate::lrc::LyricLine;

/// A line inside a context window, flagged when it is the one showing now
#[derive(Debug, Clone, PartialEq)]
pub struct WindowLine {
    pub line: LyricLine,
    pub is_current: bool,
}

/// Sorted time index over the lines of one track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeIndex {
    lines: Vec<LyricLine>,
}

impl TimeIndex {
    /// Build an index, stable-sorting the lines if they are out of order
    #[must_use]
    pub fn new(mut lines: Vec<LyricLine>) -> Self {
        let sorted = lines
            .windows(2)
            .all(|w| w[0].time_seconds <= w[1].time_seconds);
        if !sorted {
            lines.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));
        }
        Self { lines }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&LyricLine> {
        self.lines.get(index)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[LyricLine] {
        &self.lines
    }

    /// Index of the last line starting at or before `position_seconds`.
    ///
    /// Returns `None` before the first line. Past the last line, the last
    /// line stays current.
    #[must_use]
    pub fn resolve_current(&self, position_seconds: f64) -> Option<usize> {
        self.lines
            .partition_point(|line| line.time_seconds <= position_seconds)
            .checked_sub(1)
    }

    /// Start time of the first line after `position_seconds`, if any
    #[must_use]
    pub fn next_change_after(&self, position_seconds: f64) -> Option<f64> {
        let next = self
            .lines
            .partition_point(|line| line.time_seconds <= position_seconds);
        self.lines.get(next).map(|line| line.time_seconds)
    }

    /// Lines within `radius` of `index`.
    ///
    /// With no current index the first `2 * radius + 1` lines are returned
    /// and none is marked current. An index past the end is clamped to the
    /// last line.
    #[must_use]
    pub fn context_window(&self, index: Option<usize>, radius: usize) -> Vec<WindowLine> {
        let Some(last) = self.lines.len().checked_sub(1) else {
            return Vec::new();
        };

        let Some(index) = index else {
            let count = radius.saturating_mul(2).saturating_add(1);
            return self
                .lines
                .iter()
                .take(count)
                .map(|line| WindowLine {
                    line: line.clone(),
                    is_current: false,
                })
                .collect();
        };

        let current = index.min(last);
        let start = current.saturating_sub(radius);
        let end = current.saturating_add(radius).saturating_add(1).min(self.lines.len());

        self.lines[start..end]
            .iter()
            .enumerate()
            .map(|(offset, line)| WindowLine {
                line: line.clone(),
                is_current: start + offset == current,
            })
            .collect()
    }

    /// Every line in order. Call again to restart.
    pub fn all_lines(&self) -> impl ExactSizeIterator<Item = &LyricLine> + Clone + '_ {
        self.lines.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lrc::LrcDocument;

    fn index_of(input: &str) -> TimeIndex {
        TimeIndex::new(LrcDocument::parse(input).lines)
    }

    fn five_lines() -> TimeIndex {
        index_of(
            r"
[00:05.00]Line 1
[00:10.00]Line 2
[00:15.00]Line 3
[00:20.00]Line 4
[00:25.00]Line 5
",
        )
    }

    fn texts(window: &[WindowLine]) -> Vec<&str> {
        window.iter().map(|w| &*w.line.text).collect()
    }

    #[test]
    fn test_resolve_example() {
        let index = index_of("[00:01.00][00:05.00]Hello\n[00:03.00]World");

        let current = index.resolve_current(4.0).and_then(|i| index.get(i));
        assert_eq!(current.map(|l| &*l.text), Some("World"));
        assert_eq!(index.resolve_current(0.5), None);
    }

    #[test]
    fn test_resolve_boundaries() {
        let index = five_lines();

        assert_eq!(index.resolve_current(0.0), None);
        assert_eq!(index.resolve_current(4.99), None);
        assert_eq!(index.resolve_current(5.0), Some(0));
        assert_eq!(index.resolve_current(12.0), Some(1));
        assert_eq!(index.resolve_current(25.0), Some(4));
        // Last line stays up until the song ends
        assert_eq!(index.resolve_current(10_000.0), Some(4));
    }

    #[test]
    fn test_resolve_empty_and_single() {
        assert_eq!(TimeIndex::default().resolve_current(3.0), None);

        let single = index_of("[00:02.00]Only");
        assert_eq!(single.resolve_current(1.0), None);
        assert_eq!(single.resolve_current(2.0), Some(0));
        assert_eq!(single.resolve_current(600.0), Some(0));
    }

    #[test]
    fn test_resolve_tie_prefers_later_declaration() {
        let index = index_of("[00:05.00]first\n[00:05.00]second\n[00:08.00]third");
        let current = index.resolve_current(5.0).and_then(|i| index.get(i));
        assert_eq!(current.map(|l| &*l.text), Some("second"));
    }

    #[test]
    fn test_resolve_matches_linear_scan() {
        let index = index_of(
            "[00:00.50]a\n[00:02.00]b\n[00:02.00]c\n[00:03.25]d\n[00:09.99]e\n[01:00.00]f",
        );

        for step in 0..700 {
            let position = f64::from(step) * 0.1;
            let expected = index
                .all_lines()
                .enumerate()
                .filter(|(_, line)| line.time_seconds <= position)
                .map(|(i, _)| i)
                .last();
            assert_eq!(index.resolve_current(position), expected, "at {position}");
        }
    }

    #[test]
    fn test_context_window_at_start() {
        let index = five_lines();
        let window = index.context_window(Some(0), 2);

        assert_eq!(texts(&window), vec!["Line 1", "Line 2", "Line 3"]);
        assert!(window[0].is_current);
        assert!(!window[1].is_current && !window[2].is_current);
    }

    #[test]
    fn test_context_window_middle_and_end() {
        let index = five_lines();

        let window = index.context_window(Some(2), 1);
        assert_eq!(texts(&window), vec!["Line 2", "Line 3", "Line 4"]);
        assert!(window[1].is_current);

        let window = index.context_window(Some(4), 2);
        assert_eq!(texts(&window), vec!["Line 3", "Line 4", "Line 5"]);
        assert!(window[2].is_current);
    }

    #[test]
    fn test_context_window_before_first_line() {
        let index = five_lines();
        let window = index.context_window(None, 1);

        assert_eq!(texts(&window), vec!["Line 1", "Line 2", "Line 3"]);
        assert!(window.iter().all(|w| !w.is_current));
    }

    #[test]
    fn test_context_window_exactly_one_current() {
        let index = five_lines();
        for i in 0..index.len() {
            for radius in 0..4 {
                let window = index.context_window(Some(i), radius);
                assert_eq!(window.iter().filter(|w| w.is_current).count(), 1);
            }
        }
    }

    #[test]
    fn test_context_window_clamps_index() {
        let index = five_lines();
        let window = index.context_window(Some(99), 0);
        assert_eq!(texts(&window), vec!["Line 5"]);
        assert!(window[0].is_current);

        assert!(TimeIndex::default().context_window(Some(0), 3).is_empty());
    }

    #[test]
    fn test_next_change_after() {
        let index = five_lines();
        assert_eq!(index.next_change_after(0.0), Some(5.0));
        assert_eq!(index.next_change_after(5.0), Some(10.0));
        assert_eq!(index.next_change_after(25.0), None);
    }

    #[test]
    fn test_new_sorts_unsorted_input_stably() {
        let index = TimeIndex::new(vec![
            LyricLine::new(3.0, "c"),
            LyricLine::new(1.0, "a"),
            LyricLine::new(3.0, "d"),
            LyricLine::new(2.0, "b"),
        ]);
        let order: Vec<_> = index.all_lines().map(|l| &*l.text).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_all_lines_restartable() {
        let index = five_lines();
        let lines = index.all_lines();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines.clone().count(), index.all_lines().count());
    }
}
