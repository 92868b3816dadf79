use std::path::{Path, PathBuf};

use diffscope_core::{ChangeType, DiffHunk, DiffScopeError, LineChange, DEV_NULL};
use tracing::warn;

/// A complete diff for a single file, containing one or more hunks.
///
/// # Examples
///
/// ```
/// use diffscope_difflens::parser::{parse_unified_diff, FileDiff};
///
/// let diff = "diff --git a/hello.rs b/hello.rs\n\
///             --- a/hello.rs\n\
///             +++ b/hello.rs\n\
///             @@ -1,2 +1,3 @@\n\
///             \x20fn main() {\n\
///             +    println!(\"hello\");\n\
///             \x20}\n";
/// let files = parse_unified_diff(diff);
/// assert_eq!(files.len(), 1);
/// assert_eq!(files[0].hunks.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct FileDiff {
    /// Path in the old version.
    pub old_path: PathBuf,
    /// Path in the new version, `/dev/null` for deleted files.
    pub new_path: PathBuf,
    /// Parsed hunks for this file.
    pub hunks: Vec<DiffHunk>,
    /// Whether this is a newly created file.
    pub is_new_file: bool,
    /// Whether this file was deleted.
    pub is_deleted_file: bool,
    /// Whether this file was renamed.
    pub is_rename: bool,
    /// Headers of hunks that could not be interpreted and were skipped.
    pub skipped_hunks: Vec<String>,
}

impl FileDiff {
    fn empty() -> Self {
        Self {
            old_path: PathBuf::new(),
            new_path: PathBuf::new(),
            hunks: Vec::new(),
            is_new_file: false,
            is_deleted_file: false,
            is_rename: false,
            skipped_hunks: Vec::new(),
        }
    }

    /// Returns `true` when the file is absent from the post-change tree.
    pub fn is_deleted(&self) -> bool {
        self.is_deleted_file || self.new_path == Path::new(DEV_NULL)
    }

    /// Line numbers of every addition and deletion across all hunks.
    pub fn changed_lines(&self) -> impl Iterator<Item = u32> + '_ {
        self.hunks.iter().flat_map(DiffHunk::changed_lines)
    }
}

/// Position inside the hunk currently being read.
struct HunkCursor {
    hunk: DiffHunk,
    old_line: u32,
    new_line: u32,
    old_remaining: u32,
    new_remaining: u32,
}

impl HunkCursor {
    fn new(hunk: DiffHunk) -> Self {
        Self {
            old_line: hunk.old_start,
            new_line: hunk.new_start,
            old_remaining: hunk.old_lines,
            new_remaining: hunk.new_lines,
            hunk,
        }
    }

    fn is_exhausted(&self) -> bool {
        self.old_remaining == 0 && self.new_remaining == 0
    }

    /// Consume one body line. Returns `false` if the line does not belong to
    /// the hunk body.
    fn push(&mut self, line: &str) -> bool {
        match line.as_bytes().first() {
            Some(b'+') => {
                self.hunk.changes.push(LineChange::Add {
                    line: self.new_line,
                });
                self.new_line = self.new_line.saturating_add(1);
                self.new_remaining = self.new_remaining.saturating_sub(1);
            }
            Some(b'-') => {
                self.hunk.changes.push(LineChange::Delete {
                    line: self.old_line,
                });
                self.old_line = self.old_line.saturating_add(1);
                self.old_remaining = self.old_remaining.saturating_sub(1);
            }
            // Some tools strip the leading space of blank context lines.
            Some(b' ') | None => {
                self.hunk.changes.push(LineChange::Context {
                    old_line: self.old_line,
                    new_line: self.new_line,
                });
                self.old_line = self.old_line.saturating_add(1);
                self.new_line = self.new_line.saturating_add(1);
                self.old_remaining = self.old_remaining.saturating_sub(1);
                self.new_remaining = self.new_remaining.saturating_sub(1);
            }
            _ => return false,
        }
        true
    }
}

/// Parse a unified diff string (as produced by `git diff`) into structured [`FileDiff`] entries.
///
/// Handles standard unified diff format including new files, deleted files,
/// renamed files, and binary files (which are skipped). Hunk bodies are read
/// according to the line counts in their header.
///
/// A hunk whose header cannot be interpreted is skipped and its header is
/// recorded in [`FileDiff::skipped_hunks`]; the rest of the diff is still
/// parsed.
///
/// # Examples
///
/// ```
/// use diffscope_difflens::parser::parse_unified_diff;
///
/// let files = parse_unified_diff("");
/// assert!(files.is_empty());
/// ```
pub fn parse_unified_diff(input: &str) -> Vec<FileDiff> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current: Option<FileDiff> = None;
    let mut cursor: Option<HunkCursor> = None;
    let mut skipping_hunk = false;
    let mut is_binary = false;

    for line in input.lines() {
        if let Some(active) = cursor.as_mut() {
            if line.starts_with('\\') {
                continue;
            }
            if !active.is_exhausted() && active.push(line) {
                continue;
            }
            flush_hunk(&mut current, &mut cursor);
        }

        if line.starts_with("diff --git ") {
            finish_file(&mut files, &mut current, is_binary);
            is_binary = false;
            skipping_hunk = false;
            let mut file = FileDiff::empty();
            if let Some((old, new)) = parse_git_header(line) {
                file.old_path = old;
                file.new_path = new;
            }
            current = Some(file);
            continue;
        }

        if skipping_hunk {
            if line.starts_with('+') || line.starts_with(' ') || line.is_empty() {
                continue;
            }
            if line.starts_with('-') && !line.starts_with("--- ") {
                continue;
            }
            skipping_hunk = false;
        }

        // Plain patches carry no "diff --git" line; a new "---" header after
        // hunks have been read starts the next file.
        if line.starts_with("--- ")
            && current
                .as_ref()
                .map_or(true, |file| !file.hunks.is_empty() || !file.skipped_hunks.is_empty())
        {
            finish_file(&mut files, &mut current, is_binary);
            is_binary = false;
            current = Some(FileDiff::empty());
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if line.starts_with("Binary files ") && line.ends_with(" differ") {
            is_binary = true;
            continue;
        }

        if line.starts_with("new file mode") {
            file.is_new_file = true;
            continue;
        }

        if line.starts_with("deleted file mode") {
            file.is_deleted_file = true;
            continue;
        }

        if let Some(path) = line.strip_prefix("rename from ") {
            file.is_rename = true;
            file.old_path = PathBuf::from(unquote(path));
            continue;
        }

        if let Some(path) = line.strip_prefix("rename to ") {
            file.is_rename = true;
            file.new_path = PathBuf::from(unquote(path));
            continue;
        }

        if line.starts_with("index ") || line.starts_with("similarity index") {
            continue;
        }

        if let Some(path) = line.strip_prefix("--- ") {
            file.old_path = parse_path(path);
            continue;
        }

        if let Some(path) = line.strip_prefix("+++ ") {
            file.new_path = parse_path(path);
            if file.new_path == Path::new(DEV_NULL) {
                file.is_deleted_file = true;
            }
            continue;
        }

        if line.starts_with("@@") {
            match parse_hunk_header(line) {
                Ok((old_start, old_lines, new_start, new_lines)) => {
                    let file_path = if file.is_deleted() {
                        file.old_path.clone()
                    } else {
                        file.new_path.clone()
                    };
                    let change_type = if file.is_new_file || old_lines == 0 {
                        ChangeType::Add
                    } else if file.is_deleted() || new_lines == 0 {
                        ChangeType::Delete
                    } else {
                        ChangeType::Modify
                    };
                    cursor = Some(HunkCursor::new(DiffHunk {
                        file_path,
                        old_start,
                        old_lines,
                        new_start,
                        new_lines,
                        changes: Vec::new(),
                        change_type,
                    }));
                }
                Err(e) => {
                    warn!(file = %file.new_path.display(), "skipping hunk: {e}");
                    file.skipped_hunks.push(line.to_string());
                    skipping_hunk = true;
                }
            }
            continue;
        }
    }

    flush_hunk(&mut current, &mut cursor);
    finish_file(&mut files, &mut current, is_binary);

    files
}

fn flush_hunk(current: &mut Option<FileDiff>, cursor: &mut Option<HunkCursor>) {
    if let Some(c) = cursor.take() {
        if let Some(file) = current.as_mut() {
            file.hunks.push(c.hunk);
        }
    }
}

fn finish_file(files: &mut Vec<FileDiff>, current: &mut Option<FileDiff>, is_binary: bool) {
    if let Some(file) = current.take() {
        if !is_binary {
            files.push(file);
        }
    }
}

/// Extract both paths from `diff --git a/<old> b/<new>`.
///
/// Unquoted paths containing `" b/"` are split at the first occurrence; the
/// `---`/`+++` or `rename` lines that follow override these defaults.
fn parse_git_header(line: &str) -> Option<(PathBuf, PathBuf)> {
    let rest = line.strip_prefix("diff --git ")?;
    let (old, new) = if rest.starts_with('"') {
        let end = closing_quote(rest)?;
        (&rest[..=end], rest[end + 1..].trim_start())
    } else if let Some(idx) = rest.find(" \"b/") {
        (&rest[..idx], &rest[idx + 1..])
    } else {
        let idx = rest.find(" b/")?;
        (&rest[..idx], &rest[idx + 1..])
    };

    let old = unquote(old);
    let new = unquote(new);
    Some((
        PathBuf::from(old.strip_prefix("a/")?),
        PathBuf::from(new.strip_prefix("b/")?),
    ))
}

/// Byte index of the `"` closing the quoted string that starts `s`.
fn closing_quote(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, b) in s.bytes().enumerate().skip(1) {
        match b {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b'"' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Decode a path git wrote in C-style quotes (`"caf\303\251.ts"`).
/// Unquoted input is returned as is.
///
/// Octal escapes are raw bytes and are reassembled into UTF-8.
fn unquote(raw: &str) -> String {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    else {
        return raw.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut input = inner.bytes().peekable();
    while let Some(b) = input.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        match input.next() {
            Some(d @ b'0'..=b'7') => {
                let mut value = u32::from(d - b'0');
                for _ in 0..2 {
                    match input.peek() {
                        Some(&n @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(n - b'0');
                            input.next();
                        }
                        _ => break,
                    }
                }
                bytes.push((value & 0xff) as u8);
            }
            Some(b'a') => bytes.push(0x07),
            Some(b'b') => bytes.push(0x08),
            Some(b't') => bytes.push(b'\t'),
            Some(b'n') => bytes.push(b'\n'),
            Some(b'v') => bytes.push(0x0b),
            Some(b'f') => bytes.push(0x0c),
            Some(b'r') => bytes.push(b'\r'),
            Some(other) => bytes.push(other),
            None => bytes.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn parse_path(raw: &str) -> PathBuf {
    // git appends a tab and timestamp in some modes; tabs inside quoted
    // paths are always escaped
    let raw = raw.split('\t').next().unwrap_or(raw);
    let normalized = unquote(raw);

    if normalized == DEV_NULL {
        return PathBuf::from(DEV_NULL);
    }

    let stripped = normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(&normalized);

    PathBuf::from(stripped)
}

fn parse_hunk_header(line: &str) -> Result<(u32, u32, u32, u32), DiffScopeError> {
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| {
            let end = s.find(" @@")?;
            Some(&s[..end])
        })
        .ok_or_else(|| DiffScopeError::Parse(format!("invalid hunk header: {line}")))?;

    let parts: Vec<&str> = inner.split(' ').collect();
    if parts.len() != 2 {
        return Err(DiffScopeError::Parse(format!("invalid hunk header: {line}")));
    }

    let old = parts[0]
        .strip_prefix('-')
        .ok_or_else(|| DiffScopeError::Parse(format!("invalid old range in hunk: {line}")))?;
    let new = parts[1]
        .strip_prefix('+')
        .ok_or_else(|| DiffScopeError::Parse(format!("invalid new range in hunk: {line}")))?;

    let (old_start, old_lines) = parse_range(old, line)?;
    let (new_start, new_lines) = parse_range(new, line)?;

    Ok((old_start, old_lines, new_start, new_lines))
}

/// Parse `start[,count]`. The range must end within `u32`.
fn parse_range(range: &str, context: &str) -> Result<(u32, u32), DiffScopeError> {
    let (start, count) = match range.split_once(',') {
        Some((start, count)) => (start, Some(count)),
        None => (range, None),
    };
    let start: u32 = start
        .parse()
        .map_err(|_| DiffScopeError::Parse(format!("invalid range number in: {context}")))?;
    let count: u32 = match count {
        Some(count) => count
            .parse()
            .map_err(|_| DiffScopeError::Parse(format!("invalid range count in: {context}")))?,
        None => 1,
    };

    if count > 0 && start.checked_add(count - 1).is_none() {
        return Err(DiffScopeError::Parse(format!(
            "hunk range out of bounds in: {context}"
        )));
    }
    Ok((start, count))
}
