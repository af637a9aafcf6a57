//! Context Window Manager (C7)
//!
//! Token estimation, sliding-window splitting, and overlap-aware merge —
//! the overflow path `build_context` (C8) falls back to when assembled
//! context exceeds the token budget.

/// One contiguous slice produced by [`create_windows`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// `⌈len(text) / avg_token_len⌉`.
pub fn estimate_tokens(text: &str, avg_token_len: usize) -> usize {
    let avg = avg_token_len.max(1);
    text.chars().count().div_ceil(avg)
}

/// `clamp(estimate_tokens(text) · 1.2, min_window, max_window)`.
pub fn window_size(text: &str, min_window: usize, max_window: usize, avg_token_len: usize) -> usize {
    let estimated = (estimate_tokens(text, avg_token_len) as f64 * 1.2).round() as usize;
    estimated.clamp(min_window, max_window)
}

/// Split `text` into overlapping windows of size `w` characters, striding
/// by `w - floor(w * overlap_ratio)`.
///
/// The natural loop termination (advance until a window's end reaches the
/// text's end) always yields a final window that covers the tail, so no
/// separate tail-only window is ever needed.
pub fn create_windows(text: &str, w: usize, overlap_ratio: f32) -> Vec<Window> {
    if text.is_empty() || w == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let overlap = ((w as f32) * overlap_ratio).floor() as usize;
    let stride = w.saturating_sub(overlap).max(1);

    let mut windows = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + w).min(len);
        windows.push(Window { text: chars[start..end].iter().collect(), start, end });
        if end >= len {
            break;
        }
        start += stride;
    }
    windows
}

/// Longest boundary-preferring match between the suffix of `tail` and the
/// prefix of `head`, searched from `max_overlap` down to `min_overlap`.
fn find_overlap(tail: &[char], head: &[char], min_overlap: usize, max_overlap: usize) -> usize {
    let max_overlap = max_overlap.min(tail.len()).min(head.len());
    if max_overlap == 0 {
        return 0;
    }
    let min_overlap = min_overlap.min(max_overlap);

    let matches = |size: usize| -> bool { tail[tail.len() - size..] == head[..size] };

    let is_word_boundary = |size: usize| -> bool {
        let tail_ok = size == tail.len() || tail[tail.len() - size - 1].is_whitespace();
        let head_ok = size == head.len() || head[size].is_whitespace();
        tail_ok && head_ok
    };

    for size in (min_overlap..=max_overlap).rev() {
        if matches(size) && is_word_boundary(size) {
            return size;
        }
    }
    for size in (min_overlap..=max_overlap).rev() {
        if matches(size) {
            return size;
        }
    }
    0
}

/// Reconstruct a single string from overlapping `windows`, stitching each
/// successive window onto the running result via [`find_overlap`].
pub fn merge(windows: &[Window], min_window: usize, max_window: usize, overlap_ratio: f32) -> String {
    let Some(first) = windows.first() else { return String::new() };
    let mut result: Vec<char> = first.text.chars().collect();

    let min_overlap = ((min_window as f32) * overlap_ratio).floor() as usize;

    for window in &windows[1..] {
        let head: Vec<char> = window.text.chars().collect();
        let tail_bound = max_window.min(result.len());
        let tail = &result[result.len() - tail_bound..];

        let overlap = find_overlap(tail, &head, min_overlap, max_window);
        result.extend_from_slice(&head[overlap..]);
    }

    result.into_iter().collect()
}
