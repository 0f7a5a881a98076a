//! Unix-style path handling in the manner of the Luau CLI's file utilities.

/// Splits on both `/` and `\`, keeping empty components.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).collect()
}

/// `/x`, `\x`, `C:/x` and `C:\x` are absolute.
pub fn is_absolute_path(path: &str) -> bool {
    let bytes = path.as_bytes();

    if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'/' | b'\\')
    {
        return true;
    }

    matches!(bytes.first(), Some(b'/' | b'\\'))
}

/// Resolves `.` and `..` and unifies separators.
///
/// Relative results are prefixed with `./` unless they start with `..`, and a
/// result ending in `..` gets a trailing slash.
pub fn normalize_path(path: &str) -> String {
    let components = split_path(path);
    let absolute = is_absolute_path(path);

    let mut normalized: Vec<&str> = Vec::with_capacity(components.len());

    for &component in components.iter().skip(usize::from(absolute)) {
        match component {
            ".." => match normalized.last() {
                None if absolute => {}
                None | Some(&"..") => normalized.push(".."),
                Some(_) => {
                    normalized.pop();
                }
            },
            "" | "." => {}
            other => normalized.push(other),
        }
    }

    let mut out = String::with_capacity(path.len() + 2);

    if absolute {
        out.push_str(components[0]);
        out.push('/');
    } else if normalized.first() != Some(&"..") {
        out.push_str("./");
    }

    out.push_str(&normalized.join("/"));

    if out.ends_with("..") {
        out.push('/');
    }

    out
}
