//! Flattened storage names
//!
//! Recordings live in the logical tree as nested directories
//! (`Show/2024-01-01.rec/00001.ts`), but on the physical volumes every
//! payload file is stored flat under the volume root. [`flat_path`]
//! derives the storage-safe flat name from a logical relative path;
//! [`is_video_file`] separates payload files from auxiliary recording
//! metadata.

/// Characters replaced with `_` in flattened names.
const UNSAFE_CHARS: &[char] = &[
    '?', '\'', '*', ':', ';', ',', '<', '>', '!', '\\', '|',
];

/// Derive the flat storage name for a logical relative path.
///
/// Strips one `.rec` or `.del` recording-state marker (the last one
/// found), turns path separators into `~`, replaces every `.` outside
/// the preserved extension with `_` (the extension is the final three
/// characters for `.ts` files, otherwise the final four), and finally
/// substitutes filesystem-unsafe characters with `_`.
pub fn flat_path(path: &str) -> String {
    let mut s = path.to_string();

    // drop the active/deleted marker segment suffix
    let marker = s.rfind(".rec/").or_else(|| s.rfind(".del/"));
    if let Some(p) = marker {
        s.replace_range(p..p + 4, "");
    }

    s = s.replace('/', "~");

    // replace dots, preserving the last extension
    let ext_len = if s.ends_with(".ts") { 3 } else { 4 };
    let stem_end = s.len().saturating_sub(ext_len);
    let flattened: String = s
        .char_indices()
        .map(|(i, c)| if c == '.' && i < stem_end { '_' } else { c })
        .collect();

    flattened
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Whether a file name carries recording payload (as opposed to
/// auxiliary metadata living next to it).
///
/// `.ts` streams are always payload. Legacy `.vdr` files are payload
/// unless they are one of the well-known metadata files.
pub fn is_video_file(name: &str) -> bool {
    if name.ends_with(".ts") {
        return true;
    }
    if name.ends_with(".vdr") {
        const METADATA: &[&str] = &[
            "index.vdr",
            "info.vdr",
            "resume.vdr",
            "marks.vdr",
            "summary.vdr",
        ];
        return !METADATA.iter().any(|m| name.ends_with(m));
    }
    false
}
